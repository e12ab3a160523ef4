//! Server configuration.
//!
//! Loaded from (highest precedence first):
//! 1. Environment variables prefixed with `LIFELINE_`, nested with `__`
//!    (e.g. `LIFELINE_DATABASE__URI`)
//! 2. A TOML file, `lifeline.toml` or the path in `LIFELINE_CONFIG`
//! 3. Default values

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "lifeline.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub dispatch: DispatchConfig,
    pub files: FilesConfig,
    /// Default tracing level when `RUST_LOG` is not set.
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Parameters of the nearest-volunteer matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub volunteer_radius_meters: f64,
    pub volunteer_limit: i64,
    pub hospital_radius_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            name: "lifeline".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("./keys/private_access.key"),
            public_key_path: PathBuf::from("./keys/public_access.pem"),
            issuer: "Lifeline".to_string(),
            audience: "http://localhost:8000".to_string(),
            access_ttl_secs: 86_400,
            refresh_ttl_secs: 30 * 86_400,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            volunteer_radius_meters: 5_000.0,
            volunteer_limit: 2,
            hospital_radius_meters: 10_000.0,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./files"),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self> {
        let path = std::env::var("LIFELINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(path)
    }

    /// Load configuration using the given TOML file (which may be absent).
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LIFELINE_").ignore(&["config"]).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be greater than 0".to_string()));
        }
        if !(self.dispatch.volunteer_radius_meters > 0.0) {
            return Err(Error::Config(
                "dispatch.volunteer_radius_meters must be greater than 0".to_string(),
            ));
        }
        if !(self.dispatch.hospital_radius_meters > 0.0) {
            return Err(Error::Config(
                "dispatch.hospital_radius_meters must be greater than 0".to_string(),
            ));
        }
        if self.dispatch.volunteer_limit <= 0 {
            return Err(Error::Config(
                "dispatch.volunteer_limit must be greater than 0".to_string(),
            ));
        }
        if self.auth.access_ttl_secs <= 0 || self.auth.refresh_ttl_secs <= 0 {
            return Err(Error::Config("auth token lifetimes must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_dispatch_config() {
        let dispatch = DispatchConfig::default();

        assert_eq!(dispatch.volunteer_radius_meters, 5_000.0);
        assert_eq!(dispatch.volunteer_limit, 2);
        assert_eq!(dispatch.hospital_radius_meters, 10_000.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = Config::default();
        config.dispatch.volunteer_limit = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_negative_radius() {
        let mut config = Config::default();
        config.dispatch.volunteer_radius_meters = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lifeline.toml",
                r#"
                [database]
                name = "lifeline-test"

                [dispatch]
                volunteer_limit = 3
                "#,
            )?;
            jail.set_env("LIFELINE_SERVER__PORT", "9090");

            let config = Config::load_from(PathBuf::from("lifeline.toml")).expect("config");
            assert_eq!(config.database.name, "lifeline-test");
            assert_eq!(config.database.uri, "mongodb://localhost:27017");
            assert_eq!(config.dispatch.volunteer_limit, 3);
            assert_eq!(config.server.port, 9090);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config = Config::load_from(PathBuf::from("missing.toml")).expect("config");
            assert_eq!(config, Config::default());
            Ok(())
        });
    }
}
