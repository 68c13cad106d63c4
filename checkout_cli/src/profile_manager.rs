use std::{
    fs,
    io,
    io::{Error, ErrorKind},
    path::{Path, PathBuf},
};

use checkout_engine::{purchase_types::Buyer, IdentityError, IdentityProvider};
use dirs::home_dir;
use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserData {
    pub buyer: Option<Buyer>,
}

/// The signed-in buyer, persisted in the user's profile file.
#[derive(Debug, Clone)]
pub struct ProfileIdentity {
    path: PathBuf,
    data: UserData,
}

impl ProfileIdentity {
    /// Loads the profile from `~/.checkout/config.toml`, creating it if necessary.
    pub fn load_default() -> io::Result<Self> {
        let path = get_config_path()?;
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() { read_config(&path)? } else { UserData::default() };
        Ok(Self { path, data })
    }

    pub fn sign_in(&mut self, buyer: Buyer) -> io::Result<()> {
        info!("👤️ Signing in as {}", buyer.email);
        self.data.buyer = Some(buyer);
        write_config(&self.path, &self.data)
    }
}

impl IdentityProvider for ProfileIdentity {
    fn current_buyer(&self) -> Option<Buyer> {
        self.data.buyer.clone()
    }

    fn sign_out(&mut self) -> Result<(), IdentityError> {
        let buyer = self.data.buyer.take().ok_or(IdentityError::NotSignedIn)?;
        info!("👤️ Signing out {}", buyer.email);
        write_config(&self.path, &self.data).map_err(|e| IdentityError::Storage(e.to_string()))
    }
}

pub fn get_config_path() -> io::Result<PathBuf> {
    let home = home_dir().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Home directory not found"))?;
    let config_dir = home.join(".checkout");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
        set_permissions(&config_dir, 0o700)?;
    }
    Ok(config_dir.join("config.toml"))
}

fn set_permissions(path: &Path, perms: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(perms);
        fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    let _ = (path, perms);
    Ok(())
}

pub fn read_config(path: &Path) -> io::Result<UserData> {
    let config_str = fs::read_to_string(path)?;
    let config: UserData =
        toml::from_str(&config_str).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &UserData) -> io::Result<()> {
    let config_str = toml::to_string(config).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
    fs::write(path, config_str)?;
    set_permissions(path, 0o600)?;
    debug!("👤️ Profile saved to {}", path.display());
    Ok(())
}
