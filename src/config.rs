//! Configuration loading
//!
//! Sources, lowest precedence first:
//! 1. optional TOML file (`config.toml` by default)
//! 2. `BRIDGE__<SECTION>__<KEY>` environment variables
//! 3. the well-known unprefixed variables (`TELEGRAM_BOT_TOKEN`, `APTOS_NETWORK`, ...)

use crate::error::{BotError, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

/// Unprefixed environment variables and the config keys they set
pub const ENV_ALIASES: &[(&str, &str)] = &[
    ("APP_URL", "app_url"),
    ("PORT", "server.port"),
    ("APTOS_NETWORK", "aptos.network"),
    ("APTOS_NODE_URL", "aptos.node_url"),
    ("APTOS_API_KEY", "aptos.api_key"),
    ("APTOS_PRIVATE_KEY", "aptos.signer_private_key"),
    ("PREDICTION_MARKET_ADDRESS", "aptos.contract_address"),
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_WEBHOOK_SECRET", "telegram.webhook_secret"),
    ("TWITTER_CLIENT_ID", "twitter.client_id"),
    ("TWITTER_CLIENT_SECRET", "twitter.client_secret"),
    ("TWITTER_BEARER_TOKEN", "twitter.bearer_token"),
    ("TWITTER_ACCESS_TOKEN", "twitter.access_token"),
    ("TWITTER_CONSUMER_SECRET", "twitter.consumer_secret"),
    ("TWITTER_BOT_USER_ID", "twitter.bot_user_id"),
    ("TWITTER_REDIRECT_URI", "twitter.redirect_uri"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Public base URL of the web app (wallet connect and signing pages)
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default)]
    pub server: ServerConfig,
    pub aptos: AptosConfig,
    pub telegram: Option<TelegramConfig>,
    pub twitter: Option<TwitterConfig>,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout applied to every outbound HTTP call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AptosNetwork {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Local,
}

impl AptosNetwork {
    pub fn default_node_url(&self) -> &'static str {
        match self {
            AptosNetwork::Mainnet => "https://fullnode.mainnet.aptoslabs.com/v1",
            AptosNetwork::Testnet => "https://fullnode.testnet.aptoslabs.com/v1",
            AptosNetwork::Devnet => "https://fullnode.devnet.aptoslabs.com/v1",
            AptosNetwork::Local => "http://127.0.0.1:8080/v1",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AptosConfig {
    #[serde(default)]
    pub network: AptosNetwork,
    /// Overrides the network's public fullnode
    pub node_url: Option<String>,
    /// Aptos Labs API key, sent as a bearer token
    pub api_key: Option<String>,
    /// Account the prediction market module is published under
    #[serde(default)]
    pub contract_address: String,
    #[serde(default = "default_module_name")]
    pub module_name: String,
    /// Fallback signer when a bet request carries no key
    pub signer_private_key: Option<String>,
    #[serde(default = "default_max_gas")]
    pub max_gas_amount: u64,
    /// Fixed gas unit price; estimated from the node when unset
    pub gas_unit_price: Option<u64>,
    #[serde(default = "default_expiration")]
    pub expiration_secs: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

impl AptosConfig {
    pub fn node_url(&self) -> String {
        self.node_url
            .clone()
            .unwrap_or_else(|| self.network.default_node_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Fully qualified `buy_tokens` entry function id
    pub fn buy_tokens_function(&self) -> String {
        format!("{}::{}::buy_tokens", self.contract_address, self.module_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header on webhook calls
    pub webhook_secret: Option<String>,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// App-only token for reading mentions and search
    pub bearer_token: Option<String>,
    /// OAuth 2.0 user token for posting replies
    pub access_token: Option<String>,
    /// Consumer secret used to answer webhook CRC challenges
    pub consumer_secret: Option<String>,
    pub bot_user_id: Option<String>,
    #[serde(default)]
    pub bot_username: String,
    #[serde(default = "default_hashtags")]
    pub hashtags: Vec<String>,
    pub redirect_uri: Option<String>,
    #[serde(default = "default_twitter_api")]
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WalletStoreKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub store: WalletStoreKind,
    #[serde(default = "default_wallet_db")]
    pub database_path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            store: WalletStoreKind::default(),
            database_path: default_wallet_db(),
        }
    }
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_module_name() -> String {
    "prediction_market".to_string()
}

fn default_max_gas() -> u64 {
    10_000
}

fn default_expiration() -> u64 {
    600
}

fn default_confirm_timeout() -> u64 {
    60
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_twitter_api() -> String {
    "https://api.twitter.com".to_string()
}

fn default_hashtags() -> Vec<String> {
    vec!["PredictionMarket".to_string()]
}

fn default_wallet_db() -> String {
    "data/wallets.db".to_string()
}

impl Config {
    /// Load config from a TOML file (optional) and the process environment
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BRIDGE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("twitter.hashtags")
                    .try_parsing(true),
            );

        Self::finish(builder, |key| std::env::var(key).ok())
    }

    /// Build from an in-memory TOML document and an env lookup
    pub fn from_toml_with_env<F>(toml: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let builder =
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder, env)
    }

    fn finish<F>(mut builder: ConfigBuilder<DefaultState>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in ENV_ALIASES {
            let value = env(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.aptos.contract_address.trim().is_empty() {
            return Err(BotError::Config(
                "aptos.contract_address (PREDICTION_MARKET_ADDRESS) is required".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 || self.aptos.confirm_timeout_secs == 0 {
            return Err(BotError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    /// `host:port` for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
