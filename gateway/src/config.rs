//! Gateway configuration

use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// External collaborator endpoints
    pub providers: ProvidersConfig,

    /// Process-wide cache settings
    pub cache: CacheConfig,

    /// Frontend base URL used in referral links
    pub frontend_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// External collaborator endpoints and call bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Exchange-rate provider base URL
    pub coingecko_url: String,

    /// Solana JSON-RPC endpoint
    pub solana_rpc_url: String,

    /// Ethereum JSON-RPC endpoint
    pub ethereum_rpc_url: String,

    /// Polygon JSON-RPC endpoint
    pub polygon_rpc_url: String,

    /// Bound on every upstream call, seconds
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            solana_rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            ethereum_rpc_url: "https://eth.llamarpc.com".to_string(),
            polygon_rpc_url: "https://polygon-rpc.com".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for exchange-rate and confirmation caches, seconds
    pub ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load defaults with environment variable overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("COINGECKO_API_URL") {
            config.providers.coingecko_url = url;
        }
        if let Ok(url) = std::env::var("SOLANA_RPC_URL") {
            config.providers.solana_rpc_url = url;
        }
        if let Ok(url) = std::env::var("ETHEREUM_RPC_URL") {
            config.providers.ethereum_rpc_url = url;
        }
        if let Ok(url) = std::env::var("POLYGON_RPC_URL") {
            config.providers.polygon_rpc_url = url;
        }
        if let Ok(url) = std::env::var("FRONTEND_URL") {
            config.frontend_url = url;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.providers.request_timeout_secs > 0);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let encoded = toml::to_string(&config).unwrap();
        let decoded: Config = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.server.host, config.server.host);
        assert_eq!(decoded.providers.coingecko_url, config.providers.coingecko_url);
    }
}
