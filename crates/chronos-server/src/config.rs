use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    /// Read `CHRONOS_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("CHRONOS_JWT_SECRET").unwrap_or_default();
        let is_placeholder =
            jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str());
        let jwt_secret = if is_placeholder {
            if cfg!(debug_assertions) {
                warn!("CHRONOS_JWT_SECRET is unset or a placeholder; using the dev secret");
                DEV_SECRET.to_string()
            } else {
                bail!("CHRONOS_JWT_SECRET is unset or still a placeholder");
            }
        } else {
            jwt_secret
        };

        let db_path: PathBuf = lookup("CHRONOS_DB_PATH")
            .unwrap_or_else(|| "chronos.db".into())
            .into();
        let host = lookup("CHRONOS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("CHRONOS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CHRONOS_PORT must be a port number")?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("CHRONOS_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.db_path, PathBuf::from("chronos.db"));
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("CHRONOS_JWT_SECRET", "s3cret"),
            ("CHRONOS_DB_PATH", "/var/lib/chronos/state.db"),
            ("CHRONOS_HOST", "127.0.0.1"),
            ("CHRONOS_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/chronos/state.db"));
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(config(&[("CHRONOS_JWT_SECRET", "s3cret"), ("CHRONOS_PORT", "http")]).is_err());
    }

    #[test]
    fn placeholder_secret_handling() {
        let result = config(&[("CHRONOS_JWT_SECRET", "change-me-to-a-random-string")]);
        if cfg!(debug_assertions) {
            assert_eq!(result.unwrap().jwt_secret, DEV_SECRET);
        } else {
            assert!(result.is_err());
        }
    }
}
