use checkout_common::Secret;
use log::*;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9000";
pub const DEFAULT_PROCESSOR_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Sent as a bearer token on every request, if present.
    pub access_token: Option<Secret<String>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BACKEND_URL.to_string(), access_token: None }
    }
}

impl BackendConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self { base_url: base_url.into(), access_token: None }
    }

    pub fn with_access_token(mut self, token: Secret<String>) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = url_from_env("CHECKOUT_BACKEND_URL", DEFAULT_BACKEND_URL);
        let access_token = std::env::var("CHECKOUT_BACKEND_ACCESS_TOKEN").ok().map(Secret::new);
        if access_token.is_none() {
            info!("🪛️ CHECKOUT_BACKEND_ACCESS_TOKEN is not set. Backend requests will be unauthenticated.");
        }
        Self { base_url, access_token }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub api_url: String,
    pub publishable_key: Secret<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_PROCESSOR_API_URL.to_string(), publishable_key: Secret::default() }
    }
}

impl ProcessorConfig {
    pub fn new<S: Into<String>>(api_url: S, publishable_key: Secret<String>) -> Self {
        Self { api_url: api_url.into(), publishable_key }
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = url_from_env("CHECKOUT_PROCESSOR_API_URL", DEFAULT_PROCESSOR_API_URL);
        let publishable_key = Secret::new(std::env::var("CHECKOUT_PROCESSOR_PUBLIC_KEY").unwrap_or_else(|_| {
            warn!("🪛️ CHECKOUT_PROCESSOR_PUBLIC_KEY is not set. Card payments will be refused until it is set.");
            String::default()
        }));
        Self { api_url, publishable_key }
    }
}

fn url_from_env(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(s) if Url::parse(&s).is_ok() => s,
        Ok(s) => {
            error!("🪛️ {var} is not a valid URL ({s}). Using the default, {default}");
            default.to_string()
        },
        Err(_) => {
            warn!("🪛️ {var} is not set. Using the default, {default}");
            default.to_string()
        },
    }
}

/// Joins `path` onto `base`, keeping any path prefix `base` already has.
pub(crate) fn join_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}
