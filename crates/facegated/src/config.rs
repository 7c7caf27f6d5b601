use axum::http::HeaderName;
use facegate_core::AllowedOrigins;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Which collaborators back the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Rekognition + S3.
    Aws,
    /// In-process fakes, for local development only.
    Memory,
}

/// Daemon configuration: optional TOML file, then `FACEGATE_*` overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address to listen on (default: 127.0.0.1:8080).
    pub listen_addr: String,
    /// Origins allowed to read responses; the first is the fallback.
    pub allowed_origins: Vec<String>,
    /// Object store bucket holding profile and liveness images.
    pub bucket: Option<String>,
    /// Audit frames kept per liveness session (0..=4).
    pub audit_images: u8,
    /// Header carrying the identity verified by the fronting authenticator.
    pub identity_header: String,
    pub backend: BackendKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            bucket: None,
            audit_images: 0,
            identity_header: "x-facegate-identity".to_string(),
            backend: BackendKind::Aws,
        }
    }
}

impl Config {
    /// Load from `FACEGATE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FACEGATE_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(addr) = lookup("FACEGATE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(origins) = lookup("FACEGATE_ALLOWED_ORIGINS") {
            self.allowed_origins = origins.split(',').map(str::to_string).collect();
        }
        if let Some(bucket) = lookup("FACEGATE_BUCKET") {
            self.bucket = Some(bucket);
        }
        if let Some(raw) = lookup("FACEGATE_AUDIT_IMAGES") {
            self.audit_images = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "FACEGATE_AUDIT_IMAGES",
                value: raw.clone(),
            })?;
        }
        if let Some(header) = lookup("FACEGATE_IDENTITY_HEADER") {
            self.identity_header = header;
        }
        if let Some(raw) = lookup("FACEGATE_BACKEND") {
            self.backend = match raw.trim().to_ascii_lowercase().as_str() {
                "aws" => BackendKind::Aws,
                "memory" => BackendKind::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "FACEGATE_BACKEND",
                        value: raw,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origins()?;
        self.identity_header_name()?;
        if self.backend == BackendKind::Aws && self.bucket.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Invalid(
                "FACEGATE_BUCKET is required for the aws backend".into(),
            ));
        }
        Ok(())
    }

    pub fn origins(&self) -> Result<AllowedOrigins, ConfigError> {
        let origins = AllowedOrigins::new(self.allowed_origins.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        // Every configured origin must be usable as a header value.
        if let Some(bad) = origins
            .as_slice()
            .iter()
            .find(|o| axum::http::HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::InvalidValue {
                key: "allowed_origins",
                value: bad.clone(),
            });
        }
        Ok(origins)
    }

    pub fn identity_header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.identity_header.trim().to_ascii_lowercase().as_bytes())
            .map_err(|_| ConfigError::InvalidValue {
                key: "identity_header",
                value: self.identity_header.clone(),
            })
    }

    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.backend, BackendKind::Aws);
        // aws backend without a bucket is rejected
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("FACEGATE_ALLOWED_ORIGINS", "https://a.example,https://b.example"),
                ("FACEGATE_BUCKET", "faces"),
                ("FACEGATE_AUDIT_IMAGES", "2"),
                ("FACEGATE_BACKEND", "Memory"),
            ]))
            .unwrap();

        assert_eq!(config.origins().unwrap().as_slice().len(), 2);
        assert_eq!(config.bucket_name(), "faces");
        assert_eq!(config.audit_images, 2);
        assert_eq!(config.backend, BackendKind::Memory);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("FACEGATE_AUDIT_IMAGES", "lots")])).is_err());
        assert!(config.apply_env(env(&[("FACEGATE_BACKEND", "gcp")])).is_err());
    }

    #[test]
    fn test_toml_with_env_precedence() {
        let mut config: Config = toml::from_str(
            r#"
            listen_addr = "0.0.0.0:9000"
            allowed_origins = ["https://app.example"]
            bucket = "from-file"
            "#,
        )
        .unwrap();
        config
            .apply_env(env(&[("FACEGATE_BUCKET", "from-env")]))
            .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.identity_header, "x-facegate-identity");
        assert_eq!(config.bucket_name(), "from-env");
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_origins_rejected() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("FACEGATE_ALLOWED_ORIGINS", " , "), ("FACEGATE_BACKEND", "memory")]))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_header_normalized() {
        let config = Config {
            identity_header: "X-Verified-Identity".into(),
            ..Config::default()
        };
        assert_eq!(config.identity_header_name().unwrap().as_str(), "x-verified-identity");
    }
}
