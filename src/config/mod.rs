use crate::errors::{FeedError, FeedResult};

pub const DEFAULT_USER_AGENT: &str = "Saitama";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub listen: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<std::path::PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> FeedResult<Self> {
        // Try to load .env from executable's directory first
        if let Some(dir) = Self::exe_dir() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FeedResult<Self> {
        let defaults = Self::default();

        let user_agent = lookup("COMICFEED_USER_AGENT")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.user_agent);

        let timeout_secs = match lookup("COMICFEED_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                FeedError::Config(format!("COMICFEED_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => defaults.timeout_secs,
        };

        let listen = lookup("COMICFEED_LISTEN")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.listen);

        Ok(Self {
            user_agent,
            timeout_secs,
            listen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.user_agent, "Saitama");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("COMICFEED_USER_AGENT", "Tester/1.0"),
            ("COMICFEED_TIMEOUT_SECS", "5"),
            ("COMICFEED_LISTEN", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(config.user_agent, "Tester/1.0");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.listen, "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = Config::from_lookup(lookup_from(&[("COMICFEED_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }
}
