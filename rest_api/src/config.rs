// rest_api/src/config.rs

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use engine::{AccessConfig, Credentials};

/// Server configuration, loaded from `ops_config.yaml` next to the binary
/// (or the path in `OPS_CONFIG`). Every field has a development default so
/// a missing file still boots a local instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub host: String,
    pub port: u16,
    pub data_directory: String,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    /// `Secure` on the identity cookie; off only for local development.
    pub secure_cookies: bool,
    /// Recompute later ledger entries when one is amended (see DESIGN.md).
    pub cascade_amend: bool,
    pub bootstrap_admin: Credentials,
    pub staff: Vec<Credentials>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        OpsConfig {
            host: "127.0.0.1".to_string(),
            port: 8082,
            data_directory: "ops_data".to_string(),
            jwt_secret: "development-only-signing-secret-change-me".to_string(),
            token_ttl_hours: 24,
            secure_cookies: false,
            cascade_amend: false,
            bootstrap_admin: Credentials {
                name: "admin".to_string(),
                password: "admin".to_string(),
            },
            staff: Vec::new(),
        }
    }
}

// Wrapper matching the top-level `ops:` key in the YAML file.
#[derive(Debug, Deserialize)]
struct OpsConfigWrapper {
    ops: OpsConfig,
}

/// Loads the config file, falling back to defaults when it is absent. The
/// JWT secret can always be overridden through `OPS_JWT_SECRET`.
pub fn load_config(path: Option<PathBuf>) -> Result<OpsConfig> {
    let path = path
        .or_else(|| std::env::var_os("OPS_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("ops_config.yaml"));

    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let wrapper: OpsConfigWrapper = serde_yaml2::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        wrapper.ops
    } else {
        OpsConfig::default()
    };

    if let Ok(secret) = std::env::var("OPS_JWT_SECRET") {
        if !secret.is_empty() {
            config.jwt_secret = secret;
        }
    }
    Ok(config)
}

impl OpsConfig {
    pub fn access_config(&self) -> AccessConfig {
        AccessConfig {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: self.token_ttl_hours,
            bootstrap_admin: self.bootstrap_admin.clone(),
            staff: self.staff.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_development_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/ops_config.yaml"))).unwrap();
        assert_eq!(config.port, 8082);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops_config.yaml");
        fs::write(
            &path,
            "ops:\n  port: 9000\n  secure_cookies: true\n",
        )
        .unwrap();
        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.secure_cookies);
        // Unspecified fields keep their defaults.
        assert_eq!(config.host, "127.0.0.1");
    }
}
