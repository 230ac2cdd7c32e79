use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use thiserror::Error;

use crate::chain::Network;

pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:3002/mcp";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_WALLET_RPC_URL: &str = "http://127.0.0.1:1248";
pub const DEFAULT_SITE_URL: &str = "https://builder-kit.vercel.app";
pub const DEFAULT_MAX_STEPS: usize = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Unknown environment: {0} (expected development or production)")]
    UnknownEnvironment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Settings persisted between TUI sessions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ClientSettings {
    pub server_url: Option<String>,
    pub wallet_address: Option<String>,
}

impl ClientSettings {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: ClientSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn save_wallet_address(address: &str) -> Result<()> {
        let mut settings = Self::load().unwrap_or_default();
        settings.wallet_address = Some(address.to_string());
        settings.save()
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("shapekit").join("config.json"))
    }
}

/// Runtime configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub chain_id: u64,
    pub alchemy_key: String,
    pub wallet_connect_project_id: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub mcp_server_url: String,
    pub wallet_rpc_url: String,
    pub site_url: String,
    pub max_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            chain_id: Network::ShapeSepolia.chain_id(),
            alchemy_key: String::new(),
            wallet_connect_project_id: String::new(),
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            wallet_rpc_url: DEFAULT_WALLET_RPC_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Which process is loading the config; each validates only the keys it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Server,
    Client,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Config for the terminal client: chain and RPC keys only.
    pub fn client_from_env() -> Result<Self, ConfigError> {
        Self::client_from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the server config from any key lookup and validate it.
    ///
    /// Problems are collected rather than reported one at a time. In development
    /// they are logged and the defaults stand in; in production they are fatal.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, Side::Server)
    }

    /// Like [`Config::from_lookup`], without the model and WalletConnect keys
    /// the client never uses.
    pub fn client_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, Side::Client)
    }

    fn load<F>(lookup: F, side: Side) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("SHAPEKIT_ENV") {
            Some(value) => Environment::from_str(&value)
                .ok_or(ConfigError::UnknownEnvironment(value))?,
            None => Environment::Development,
        };

        let mut config = Config {
            environment,
            ..Config::default()
        };
        let mut problems = Vec::new();

        match get("CHAIN_ID") {
            Some(raw) => match raw.trim().parse::<u64>().ok().and_then(Network::from_chain_id) {
                Some(network) => config.chain_id = network.chain_id(),
                None => problems.push(format!(
                    "CHAIN_ID must be {} (Shape) or {} (Shape Sepolia), got {}",
                    Network::Shape.chain_id(),
                    Network::ShapeSepolia.chain_id(),
                    raw
                )),
            },
            None => problems.push("CHAIN_ID is not set".to_string()),
        }

        match get("ALCHEMY_KEY") {
            Some(key) => config.alchemy_key = key,
            None => problems.push("ALCHEMY_KEY is not set".to_string()),
        }

        match get("WALLET_CONNECT_PROJECT_ID") {
            Some(id) => config.wallet_connect_project_id = id,
            None if side == Side::Server => problems.push("WALLET_CONNECT_PROJECT_ID is not set".to_string()),
            None => {}
        }

        match get("OPENAI_API_KEY") {
            Some(key) => config.openai_api_key = key,
            None if side == Side::Server => problems.push("OPENAI_API_KEY is not set".to_string()),
            None => {}
        }

        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.openai_model = model;
        }
        if let Some(url) = get("MCP_SERVER_URL") {
            config.mcp_server_url = url;
        }
        if let Some(url) = get("WALLET_RPC_URL") {
            config.wallet_rpc_url = url;
        }
        if let Some(url) = get("SITE_URL") {
            config.site_url = url.trim_end_matches('/').to_string();
        }

        if let Some(raw) = get("CHAT_MAX_STEPS").filter(|_| side == Side::Server) {
            match raw.trim().parse::<usize>() {
                Ok(steps) if steps > 0 => config.max_steps = steps,
                _ => problems.push(format!("CHAT_MAX_STEPS must be a positive integer, got {}", raw)),
            }
        }

        if problems.is_empty() {
            return Ok(config);
        }

        match config.environment {
            Environment::Production => Err(ConfigError::Invalid(problems)),
            Environment::Development => {
                for problem in &problems {
                    tracing::warn!("config: {} (using development fallback)", problem);
                }
                Ok(config)
            }
        }
    }

    pub fn network(&self) -> Network {
        Network::from_chain_id(self.chain_id).unwrap_or(Network::ShapeSepolia)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
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
        move |key: &str| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CHAIN_ID", "360"),
            ("ALCHEMY_KEY", "alchemy-test"),
            ("WALLET_CONNECT_PROJECT_ID", "wc-test"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
    }

    #[test]
    fn test_complete_env_loads() {
        let config = Config::from_lookup(lookup_from(&full_env())).unwrap();
        assert_eq!(config.chain_id, 360);
        assert_eq!(config.network(), Network::Shape);
        assert_eq!(config.alchemy_key, "alchemy-test");
        assert_eq!(config.mcp_server_url, DEFAULT_MCP_SERVER_URL);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_development_falls_back() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.network(), Network::ShapeSepolia);
        assert!(config.alchemy_key.is_empty());
    }

    #[test]
    fn test_production_fails_hard_with_every_problem() {
        let err = Config::from_lookup(lookup_from(&[
            ("SHAPEKIT_ENV", "production"),
            ("CHAIN_ID", "1"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Invalid(problems) => {
                assert!(problems.iter().any(|p| p.contains("CHAIN_ID")));
                assert!(problems.iter().any(|p| p.contains("ALCHEMY_KEY")));
                assert!(problems.iter().any(|p| p.contains("OPENAI_API_KEY")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_client_ignores_server_only_keys() {
        let config = Config::client_from_lookup(lookup_from(&[
            ("SHAPEKIT_ENV", "production"),
            ("CHAIN_ID", "11011"),
            ("ALCHEMY_KEY", "alchemy-test"),
            ("WALLET_RPC_URL", "http://127.0.0.1:8545"),
        ]))
        .unwrap();
        assert_eq!(config.network(), Network::ShapeSepolia);
        assert_eq!(config.wallet_rpc_url, "http://127.0.0.1:8545");

        // The same environment is not enough to run the server.
        let server = Config::from_lookup(lookup_from(&[
            ("SHAPEKIT_ENV", "production"),
            ("CHAIN_ID", "11011"),
            ("ALCHEMY_KEY", "alchemy-test"),
        ]));
        assert!(matches!(server, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_client_still_checks_chain_keys() {
        let err = Config::client_from_lookup(lookup_from(&[("SHAPEKIT_ENV", "production")])).unwrap_err();
        match err {
            ConfigError::Invalid(problems) => {
                assert_eq!(problems.len(), 2);
                assert!(problems.iter().any(|p| p.contains("CHAIN_ID")));
                assert!(problems.iter().any(|p| p.contains("ALCHEMY_KEY")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let result = Config::from_lookup(lookup_from(&[("SHAPEKIT_ENV", "staging")]));
        assert!(matches!(result, Err(ConfigError::UnknownEnvironment(_))));
    }

    #[test]
    fn test_overrides_applied() {
        let mut env = full_env();
        env.push(("MCP_SERVER_URL", "http://mcp.internal/mcp"));
        env.push(("CHAT_MAX_STEPS", "10"));
        env.push(("OPENAI_BASE_URL", "http://llm.internal/v1/"));
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.mcp_server_url, "http://mcp.internal/mcp");
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.openai_base_url, "http://llm.internal/v1");
    }

    #[test]
    fn test_client_settings_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapekit").join("config.json");

        let missing = ClientSettings::load_from(&path).unwrap();
        assert!(missing.wallet_address.is_none());

        let settings = ClientSettings {
            server_url: Some("http://127.0.0.1:4000".to_string()),
            wallet_address: Some("0x1111111111111111111111111111111111111111".to_string()),
        };
        settings.save_to(&path).unwrap();

        let loaded = ClientSettings::load_from(&path).unwrap();
        assert_eq!(loaded.server_url.as_deref(), Some("http://127.0.0.1:4000"));
        assert_eq!(loaded.wallet_address, settings.wallet_address);
    }
}
