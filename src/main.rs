//! Aptos Prediction Market Bridge
//!
//! HTTP relay for on-chain bets plus Telegram and Twitter bot gateways.

use anyhow::Context;
use aptos_market_bridge::{
    api::{self, AppState, TelegramState, TwitterState},
    aptos::AptosClient,
    bet::BetService,
    config::Config,
    telegram::{TelegramApi, TelegramBot, TelegramClient},
    twitter::{OAuthFlow, SharedToken, TwitterBot, TwitterClient},
    wallet,
};
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "market-bridge")]
#[command(about = "Bet relay and bot gateways for an Aptos prediction market")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Register the Telegram webhook URL
    SetWebhook {
        /// Public URL; defaults to <app_url>/api/telegram/webhook
        #[arg(long)]
        url: Option<String>,
    },
    /// Check the Aptos node and bot credentials
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::SetWebhook { url } => set_webhook(config, url).await,
        Commands::Status => show_status(config).await,
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let timeout = config.server.request_timeout_secs;

    let aptos = AptosClient::new(&config.aptos, timeout)?;
    let bets = BetService::new(Arc::new(aptos), config.aptos.buy_tokens_function());
    let wallets = wallet::open_store(&config.wallet).await?;

    let telegram = match &config.telegram {
        Some(tg) => {
            let client = TelegramClient::new(tg, timeout)?;
            tracing::info!("Telegram bot enabled");
            Some(TelegramState {
                bot: TelegramBot::new(Arc::new(client), wallets.clone(), config.app_url.clone()),
                webhook_secret: tg.webhook_secret.clone(),
            })
        }
        None => {
            tracing::warn!("Telegram not configured, Telegram endpoints disabled");
            None
        }
    };

    let twitter = match &config.twitter {
        Some(tw) => {
            let token: SharedToken = Arc::new(RwLock::new(tw.access_token.clone()));
            let client = TwitterClient::new(tw, token.clone(), timeout)?;
            tracing::info!("Twitter bot enabled (hashtags: {})", tw.hashtags.join(", "));
            Some(TwitterState {
                bot: Arc::new(TwitterBot::new(Arc::new(client), tw, config.app_url.clone())),
                oauth: OAuthFlow::new(tw, &config.app_url, token, timeout)?,
                consumer_secret: tw.consumer_secret.clone(),
            })
        }
        None => {
            tracing::warn!("Twitter not configured, Twitter endpoints disabled");
            None
        }
    };

    Ok(AppState {
        bets,
        wallets,
        telegram,
        twitter,
    })
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting market bridge on {:?} ({})",
        config.aptos.network,
        config.aptos.buy_tokens_function()
    );

    let state = Arc::new(build_state(&config).await?);
    api::serve(state, &config.listen_addr()).await?;
    Ok(())
}

async fn set_webhook(config: Config, url: Option<String>) -> anyhow::Result<()> {
    let tg = config
        .telegram
        .as_ref()
        .context("Telegram is not configured (TELEGRAM_BOT_TOKEN)")?;
    let client = TelegramClient::new(tg, config.server.request_timeout_secs)?;

    let url = url.unwrap_or_else(|| {
        format!("{}/api/telegram/webhook", config.app_url.trim_end_matches('/'))
    });
    client
        .set_webhook(&url, tg.webhook_secret.as_deref())
        .await
        .context("setWebhook failed")?;

    println!("✅ Telegram webhook set to {}", url);
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let timeout = config.server.request_timeout_secs;

    println!("📊 Market Bridge Status\n");
    println!("Network:   {:?}", config.aptos.network);
    println!("Node:      {}", config.aptos.node_url());
    println!("Function:  {}", config.aptos.buy_tokens_function());

    let aptos = AptosClient::new(&config.aptos, timeout)?;
    match aptos.estimate_gas_price().await {
        Ok(price) => println!("Gas price: {} octas", price),
        Err(e) => println!("Gas price: ❌ {}", e),
    }

    match &config.telegram {
        Some(tg) => {
            let client = TelegramClient::new(tg, timeout)?;
            match client.get_me().await {
                Ok(bot) => println!(
                    "Telegram:  ✅ @{}",
                    bot.username.unwrap_or(bot.first_name)
                ),
                Err(e) => println!("Telegram:  ❌ {}", e),
            }
        }
        None => println!("Telegram:  not configured"),
    }

    match &config.twitter {
        Some(tw) => println!(
            "Twitter:   configured (@{}, #{})",
            tw.bot_username,
            tw.hashtags.join(" #")
        ),
        None => println!("Twitter:   not configured"),
    }

    Ok(())
}
