use crate::bot::MetricSink;
use crate::config::TelegramConfig;
use crate::error::Result as TokenResult;
use crate::logger::{format_amount, shorten_address, BalanceChange};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const CHATS_FILE: &str = "telegram_chats.json";

/// A chat that asked for alerts, keyed by the username that registered it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedChat {
    chat_id: i64,
    user_id: i64,
    username: String,
}

/// JSON file holding the subscribed chats across restarts
#[derive(Debug, Clone)]
struct ChatStore {
    path: PathBuf,
}

impl ChatStore {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing or unreadable files mean no chats
    fn load(&self) -> Vec<SavedChat> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring corrupt chat store");
            Vec::new()
        })
    }

    fn save<'a>(&self, chats: impl Iterator<Item = &'a SavedChat>) -> Result<()> {
        let chats: Vec<_> = chats.collect();
        fs::write(&self.path, serde_json::to_string_pretty(&chats)?)?;
        Ok(())
    }
}

/// Telegram alerts for balance metrics
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chats: Arc<RwLock<HashMap<ChatId, SavedChat>>>,
    latest: Arc<RwLock<BTreeMap<String, BigDecimal>>>,
    allowed_users: Vec<String>,
    store: ChatStore,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let store = ChatStore::new(CHATS_FILE);

        // chats of users removed from the whitelist are forgotten
        let chats: HashMap<ChatId, SavedChat> = store
            .load()
            .into_iter()
            .filter(|chat| config.allowed_users.contains(&chat.username))
            .map(|chat| (ChatId(chat.chat_id), chat))
            .collect();
        if !chats.is_empty() {
            info!(chats = chats.len(), "restored telegram subscriptions");
        }

        Self {
            bot: Bot::new(&config.bot_token),
            chats: Arc::new(RwLock::new(chats)),
            latest: Arc::new(RwLock::new(BTreeMap::new())),
            allowed_users: config.allowed_users.clone(),
            store,
        }
    }

    /// Check if user is allowed to use the bot
    pub fn is_user_allowed(&self, username: Option<&str>) -> bool {
        username.is_some_and(|username| self.allowed_users.iter().any(|u| u == username))
    }

    /// Subscribe a chat to alerts
    pub async fn register_chat(&self, chat_id: ChatId, user: &teloxide::types::User) {
        let chat = SavedChat {
            chat_id: chat_id.0,
            user_id: user.id.0 as i64,
            username: user.username.clone().unwrap_or_default(),
        };

        let mut chats = self.chats.write().await;
        if chats.insert(chat_id, chat).is_none() {
            self.persist(&chats);
        }
    }

    pub async fn is_registered(&self, chat_id: ChatId) -> bool {
        self.chats.read().await.contains_key(&chat_id)
    }

    pub async fn unregister_chat(&self, chat_id: ChatId) {
        let mut chats = self.chats.write().await;
        if chats.remove(&chat_id).is_some() {
            self.persist(&chats);
        }
    }

    fn persist(&self, chats: &HashMap<ChatId, SavedChat>) {
        if let Err(e) = self.store.save(chats.values()) {
            error!(error = %e, "failed to save telegram chats");
        }
    }

    /// Send a balance alert to all registered chats
    pub async fn send_alert(&self, message: String) {
        let chats = self.chats.read().await;

        for (&chat_id, chat) in chats.iter() {
            if !self.allowed_users.contains(&chat.username) {
                warn!(%chat_id, user = %chat.username, "skipping alert, user no longer authorized");
                continue;
            }

            if let Err(e) = self
                .bot
                .send_message(chat_id, message.clone())
                .parse_mode(teloxide::types::ParseMode::Html)
                .await
            {
                error!(%chat_id, error = %e, "failed to send alert");
            }
        }
    }

    pub async fn latest_balances(&self) -> BTreeMap<String, BigDecimal> {
        self.latest.read().await.clone()
    }

    fn format_change_message(name: &str, old: Option<&BigDecimal>, new: &BigDecimal) -> String {
        let (symbol, account) = name.rsplit_once('/').unwrap_or((name, ""));
        let mut message = String::from("🔔 <b>Balance Alert</b>\n\n");
        message.push_str(&format!("📍 <b>{}</b>\n", symbol));
        message.push_str(&format!("<code>{}</code>\n\n", shorten_address(account)));

        match old {
            Some(old) => {
                let icon = match BalanceChange::between(old, new) {
                    BalanceChange::Increase => "📈",
                    BalanceChange::Decrease => "📉",
                    BalanceChange::NoChange => "➖",
                };
                message.push_str(&format!(
                    "{} {} → <b>{}</b>\n",
                    icon,
                    format_amount(old),
                    format_amount(new)
                ));
            }
            None => message.push_str(&format!("💵 <b>{}</b>\n", format_amount(new))),
        }

        message.push_str(&format!("\n🕒 {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
        message
    }

    fn format_balance_message(balances: &BTreeMap<String, BigDecimal>) -> String {
        if balances.is_empty() {
            return "No balance data available yet.".to_string();
        }

        let mut message = String::from("💰 <b>Current Balances</b>\n\n");
        for (name, value) in balances {
            let (symbol, account) = name.rsplit_once('/').unwrap_or((name, ""));
            message.push_str(&format!(
                "💵 {} <code>{}</code>: <b>{}</b>\n",
                symbol,
                shorten_address(account),
                format_amount(value)
            ));
        }
        message
    }

    /// Start bot command handler in background
    pub fn spawn_command_handler(self) {
        tokio::spawn(async move {
            let handler = Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command);

            let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
                .dependencies(dptree::deps![self.clone()])
                .default_handler(|_| async {})
                .build();

            dispatcher.dispatch().await;
        });
    }
}

#[async_trait]
impl MetricSink for TelegramNotifier {
    async fn record(&self, name: &str, value: &BigDecimal) -> TokenResult<()> {
        let old = self
            .latest
            .write()
            .await
            .insert(name.to_string(), value.clone());

        if old.as_ref() == Some(value) {
            return Ok(());
        }

        let message = Self::format_change_message(name, old.as_ref(), value);
        self.send_alert(message).await;
        Ok(())
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
enum Command {
    #[command(description = "Start bot and register for alerts")]
    Start,
    #[command(description = "Show current balances")]
    Balance,
    #[command(description = "Show help")]
    Help,
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    notifier: TelegramNotifier,
) -> Result<(), teloxide::RequestError> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    if !matches!(cmd, Command::Help) && !notifier.is_user_allowed(user.username.as_deref()) {
        let message = if user.username.is_none() {
            "❌ Sorry, you need to set a Telegram username to use this bot."
        } else {
            "❌ Sorry, you are not authorized to use this bot."
        };
        bot.send_message(msg.chat.id, message).await?;
        notifier.unregister_chat(msg.chat.id).await;
        return Ok(());
    }

    match cmd {
        Command::Start => {
            notifier.register_chat(msg.chat.id, user).await;
            let welcome_text = "👋 <b>Welcome to Token Watcher!</b>\n\n\
                                You will now receive alerts when tracked balances change.\n\n\
                                Use /balance to see cached balances.\n\
                                Use /help for more information.";
            bot.send_message(msg.chat.id, welcome_text)
                .parse_mode(teloxide::types::ParseMode::Html)
                .await?;
        }
        Command::Balance => {
            if !notifier.is_registered(msg.chat.id).await {
                bot.send_message(
                    msg.chat.id,
                    "Please start the bot first with /start to receive updates.",
                )
                .await?;
                return Ok(());
            }

            let balances = notifier.latest_balances().await;
            let message = TelegramNotifier::format_balance_message(&balances);
            bot.send_message(msg.chat.id, message)
                .parse_mode(teloxide::types::ParseMode::Html)
                .await?;
        }
        Command::Help => {
            let help_text = "🤖 <b>Token Watcher Bot</b>\n\n\
                             Available commands:\n\
                             /start - Register for balance alerts\n\
                             /balance - Show cached balances\n\
                             /help - Show this message\n\n\
                             Alerts are sent whenever a transfer changes a tracked balance.";
            bot.send_message(msg.chat.id, help_text)
                .parse_mode(teloxide::types::ParseMode::Html)
                .await?;
        }
    }

    Ok(())
}
