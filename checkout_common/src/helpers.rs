/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads a positive integer from an environment variable value, falling back to `default` for missing, zero or
/// unparseable values.
pub fn parse_positive_usize(value: Option<String>, default: usize) -> usize {
    value.and_then(|v| v.trim().parse::<usize>().ok()).filter(|v| *v > 0).unwrap_or(default)
}

/// The payment intent a processor client secret belongs to. Secrets have the form `{intent_id}_secret_{nonce}`.
pub fn intent_id_from_secret(secret: &str) -> Option<&str> {
    match secret.split_once("_secret_") {
        Some((id, _)) if !id.is_empty() => Some(id),
        _ => None,
    }
}
