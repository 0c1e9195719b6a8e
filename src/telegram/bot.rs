//! Telegram command handling
//!
//! Supports /start, /help, /connect, /wallet, /disconnect, /bet.
//! The bot never asks for keys: bets are signed in the web app.

use super::{escape_html, TelegramApi, Update};
use crate::bet::BetSide;
use crate::error::Result;
use crate::wallet::{app_link, truncate_address, WalletLinkStore};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Commands users can send to the bot
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    Start,
    Help,
    /// Get a wallet connection link
    Connect,
    /// Show the linked wallet
    Wallet,
    /// Remove the wallet link
    Disconnect,
    /// Get a signing link for a bet
    Bet {
        market_id: String,
        side: BetSide,
        amount: Decimal,
    },
    /// Recognised command with unusable arguments
    Usage(&'static str),
    Unknown(String),
}

const BET_USAGE: &str = "❌ Usage: /bet &lt;market_id&gt; &lt;yes|no&gt; &lt;amount&gt;";

impl BotCommand {
    /// Parse a message; `None` for anything that is not a command
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let mut parts = body.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or("");
        let cmd = head.split('@').next().unwrap_or(head).to_lowercase(); // drop @botname
        let args = parts.next().unwrap_or("").trim();

        let command = match cmd.as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "connect" => BotCommand::Connect,
            "wallet" => BotCommand::Wallet,
            "disconnect" => BotCommand::Disconnect,
            "bet" => parse_bet_args(args).unwrap_or(BotCommand::Usage(BET_USAGE)),
            _ => BotCommand::Unknown(cmd),
        };
        Some(command)
    }
}

fn parse_bet_args(args: &str) -> Option<BotCommand> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }
    let side = BetSide::parse(parts[1])?;
    let amount: Decimal = parts[2].parse().ok()?;
    if amount <= Decimal::ZERO {
        return None;
    }
    Some(BotCommand::Bet {
        market_id: parts[0].to_string(),
        side,
        amount,
    })
}

/// Webhook-driven Telegram bot
pub struct TelegramBot {
    api: Arc<dyn TelegramApi>,
    wallets: Arc<dyn WalletLinkStore>,
    app_url: String,
}

impl TelegramBot {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        wallets: Arc<dyn WalletLinkStore>,
        app_url: String,
    ) -> Self {
        Self {
            api,
            wallets,
            app_url,
        }
    }

    pub fn api(&self) -> &Arc<dyn TelegramApi> {
        &self.api
    }

    /// Handle one webhook update
    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        let Some(msg) = update.message.as_ref().or(update.edited_message.as_ref()) else {
            tracing::debug!("Ignoring update {} without a message", update.update_id);
            return Ok(());
        };
        let Some(text) = msg.text.as_deref() else {
            return Ok(());
        };
        let Some(command) = BotCommand::parse(text) else {
            return Ok(()); // not a command
        };

        let chat_id = msg.chat.id.to_string();
        let user_id = msg
            .from
            .as_ref()
            .map(|u| u.id)
            .unwrap_or(msg.chat.id)
            .to_string();

        tracing::info!("Telegram command from {}: {:?}", user_id, command);

        let reply = self.respond(&user_id, command).await?;
        self.api.send_message(&chat_id, &reply).await
    }

    async fn respond(&self, user_id: &str, command: BotCommand) -> Result<String> {
        let reply = match command {
            BotCommand::Start => format!(
                "👋 <b>Welcome to the Aptos prediction market bot</b>\n\n\
                Connect your wallet to start betting:\n{}\n\n\
                Use /help to see all commands.",
                self.connect_link(user_id)
            ),
            BotCommand::Help => HELP_TEXT.to_string(),
            BotCommand::Connect => match self.wallets.lookup(user_id).await? {
                Some(address) => format!(
                    "🔗 Wallet <code>{}</code> is already connected.\n\
                    To switch wallets, connect again:\n{}",
                    escape_html(&truncate_address(&address)),
                    self.connect_link(user_id)
                ),
                None => format!(
                    "🔗 Connect your wallet here:\n{}",
                    self.connect_link(user_id)
                ),
            },
            BotCommand::Wallet => match self.wallets.lookup(user_id).await? {
                Some(address) => format!(
                    "👛 Connected wallet: <code>{}</code>",
                    escape_html(&truncate_address(&address))
                ),
                None => "👛 No wallet connected. Use /connect first.".to_string(),
            },
            BotCommand::Disconnect => match self.wallets.unlink(user_id).await? {
                Some(address) => format!(
                    "🔌 Wallet <code>{}</code> disconnected.",
                    escape_html(&truncate_address(&address))
                ),
                None => "👛 No wallet connected.".to_string(),
            },
            BotCommand::Bet {
                market_id,
                side,
                amount,
            } => match self.wallets.lookup(user_id).await? {
                Some(address) => {
                    let amount = amount.to_string();
                    let link = app_link(
                        &self.app_url,
                        "bet",
                        &[
                            ("market", market_id.as_str()),
                            ("side", side.as_str()),
                            ("amount", amount.as_str()),
                            ("address", address.as_str()),
                            ("user", user_id),
                        ],
                    );
                    format!(
                        "🎯 <b>{} {} on market {}</b>\n\n\
                        Sign the transaction in your wallet:\n{}",
                        side.as_str().to_uppercase(),
                        amount,
                        escape_html(&market_id),
                        escape_html(&link)
                    )
                }
                None => format!(
                    "👛 Connect a wallet before betting:\n{}",
                    self.connect_link(user_id)
                ),
            },
            BotCommand::Usage(usage) => usage.to_string(),
            BotCommand::Unknown(cmd) => format!(
                "❓ Unknown command: /{}\nUse /help for available commands",
                escape_html(&cmd)
            ),
        };
        Ok(reply)
    }

    /// Connect link, escaped for HTML replies
    fn connect_link(&self, user_id: &str) -> String {
        escape_html(&app_link(&self.app_url, "connect", &[("user", user_id)]))
    }
}

const HELP_TEXT: &str = r#"🤖 <b>Prediction Market Bot</b>

<b>Wallet</b>
/connect - Connect your Aptos wallet
/wallet - Show the connected wallet
/disconnect - Remove the wallet link

<b>Betting</b>
/bet &lt;market_id&gt; &lt;yes|no&gt; &lt;amount&gt; - Place a bet

/help - Show this message"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{Chat, Message, MockTelegramApi, User};
    use crate::wallet::InMemoryWalletLinks;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    fn update(text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(Message {
                message_id: 10,
                from: Some(User {
                    id: 42,
                    is_bot: false,
                    first_name: "Ada".to_string(),
                    username: None,
                }),
                chat: Chat {
                    id: 1000,
                    chat_type: Some("private".to_string()),
                },
                text: Some(text.to_string()),
            }),
            edited_message: None,
        }
    }

    fn bot(api: MockTelegramApi, wallets: Arc<InMemoryWalletLinks>) -> TelegramBot {
        TelegramBot::new(Arc::new(api), wallets, "https://market.example".to_string())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/HELP@market_bot"), Some(BotCommand::Help));
        assert_eq!(BotCommand::parse("hello there"), None);
        assert_eq!(
            BotCommand::parse("/bet 7 YES 2.5"),
            Some(BotCommand::Bet {
                market_id: "7".to_string(),
                side: BetSide::Yes,
                amount: dec!(2.5),
            })
        );
        assert_eq!(BotCommand::parse("/bet 7 maybe 2"), Some(BotCommand::Usage(BET_USAGE)));
        assert_eq!(BotCommand::parse("/bet 7 no -1"), Some(BotCommand::Usage(BET_USAGE)));
        assert_eq!(
            BotCommand::parse("/frobnicate"),
            Some(BotCommand::Unknown("frobnicate".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_replies_with_link_to_chat() {
        let mut api = MockTelegramApi::new();
        api.expect_send_message()
            .with(
                eq("1000"),
                mockall::predicate::function(|text: &str| {
                    text.contains("https://market.example/connect?user=42")
                }),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let bot = bot(api, Arc::new(InMemoryWalletLinks::new()));
        bot.handle_update(&update("/connect")).await.unwrap();
    }

    #[tokio::test]
    async fn test_wallet_shows_linked_address() {
        let wallets = Arc::new(InMemoryWalletLinks::new());
        wallets
            .link("42", "0x1234567890abcdef1234567890abcdef")
            .await
            .unwrap();

        let mut api = MockTelegramApi::new();
        api.expect_send_message()
            .withf(|_, text| text.contains("0x1234...cdef"))
            .times(1)
            .returning(|_, _| Ok(()));

        bot(api, wallets).handle_update(&update("/wallet")).await.unwrap();
    }

    #[tokio::test]
    async fn test_bet_requires_wallet() {
        let mut api = MockTelegramApi::new();
        api.expect_send_message()
            .withf(|_, text| text.contains("Connect a wallet before betting"))
            .times(1)
            .returning(|_, _| Ok(()));

        bot(api, Arc::new(InMemoryWalletLinks::new()))
            .handle_update(&update("/bet 7 yes 10"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bet_link_carries_parameters() {
        let wallets = Arc::new(InMemoryWalletLinks::new());
        wallets.link("42", "0xabc").await.unwrap();

        let mut api = MockTelegramApi::new();
        api.expect_send_message()
            .withf(|_, text| {
                text.contains(
                    "https://market.example/bet?market=7&amp;side=no&amp;amount=10&amp;address=0xabc&amp;user=42",
                )
            })
            .times(1)
            .returning(|_, _| Ok(()));

        bot(api, wallets).handle_update(&update("/bet 7 no 10")).await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_removes_link() {
        let wallets = Arc::new(InMemoryWalletLinks::new());
        wallets.link("42", "0xabc").await.unwrap();

        let mut api = MockTelegramApi::new();
        api.expect_send_message().times(1).returning(|_, _| Ok(()));

        bot(api, wallets.clone())
            .handle_update(&update("/disconnect"))
            .await
            .unwrap();
        assert_eq!(wallets.lookup("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_plain_text_ignored() {
        let mut api = MockTelegramApi::new();
        api.expect_send_message().times(0);

        bot(api, Arc::new(InMemoryWalletLinks::new()))
            .handle_update(&update("gm"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_user_text_is_escaped() {
        let wallets = Arc::new(InMemoryWalletLinks::new());
        wallets.link("42", "<i>0xabc").await.unwrap();

        let mut api = MockTelegramApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_send_message()
            .withf(|_, text| text.contains("<b>YES 1 on market &lt;x&gt;</b>") && !text.contains("<x>"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_send_message()
            .withf(|_, text| text.contains("<code>&lt;i&gt;0xabc</code>"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_send_message()
            .withf(|_, text| text.contains("/x&lt;y"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let bot = bot(api, wallets);
        bot.handle_update(&update("/bet <x> yes 1")).await.unwrap();
        bot.handle_update(&update("/wallet")).await.unwrap();
        bot.handle_update(&update("/x<y")).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let mut api = MockTelegramApi::new();
        api.expect_send_message().returning(|_, _| {
            Err(crate::error::BotError::upstream(
                crate::error::Provider::Telegram,
                "Forbidden: bot was blocked by the user",
            ))
        });

        let err = bot(api, Arc::new(InMemoryWalletLinks::new()))
            .handle_update(&update("/help"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blocked"));
    }
}
