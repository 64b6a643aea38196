//! Command router — wires Telegram updates to the store and the raffle
//! engine.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use jarbot_core::config::JarbotConfig;
use jarbot_core::types::{ChatKind, ChatRoom, Participant, display_name};
use jarbot_core::{Result, Store};
use jarbot_raffle::{RaffleRunner, StartOptions};
use jarbot_scheduler::Schedule;

use crate::api::{TelegramApi, TgUpdate, TgUser};
use crate::texts;

/// Command menu registered on startup.
pub const BOT_COMMANDS: &[(&str, &str)] = &[
    ("start", "Як користуватися"),
    ("register", "Зареєструватися"),
    ("eject", "Видалити себе"),
    ("list", "Показати зареєстрованих"),
    ("configure", "Налаштувати банку, тригери, автореєстрацію"),
    ("raffle", "Запустити розіграш"),
    ("cancel", "Скасувати активний розіграш"),
    ("stats", "Топ переможців"),
    ("info", "Про бота"),
    ("help", "Показати довідку"),
];

pub struct RaffleBot {
    api: TelegramApi,
    store: Arc<dyn Store>,
    runner: RaffleRunner,
    config: JarbotConfig,
    me: Option<TgUser>,
    last_update_id: i64,
}

impl RaffleBot {
    pub fn new(
        api: TelegramApi,
        store: Arc<dyn Store>,
        runner: RaffleRunner,
        config: JarbotConfig,
    ) -> Self {
        Self {
            api,
            store,
            runner,
            config,
            me: None,
            last_update_id: 0,
        }
    }

    /// Long-polling loop. Runs until the process stops.
    pub async fn run(&mut self) -> Result<()> {
        let me = self.api.get_me().await?;
        tracing::info!(
            "Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        );
        if let Err(e) = self.api.set_my_commands(BOT_COMMANDS).await {
            tracing::warn!("Failed to register command menu: {e}");
        }
        self.me = Some(me);

        loop {
            match self.api.get_updates(self.last_update_id + 1).await {
                Ok(updates) => {
                    for update in updates {
                        self.last_update_id = self.last_update_id.max(update.update_id);
                        if let Err(e) = self.handle_update(&update).await {
                            tracing::warn!("Failed to handle update {}: {e}", update.update_id);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Polling error: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
            tokio::time::sleep(Duration::from_secs(self.config.telegram.poll_interval)).await;
        }
    }

    pub async fn handle_update(&self, update: &TgUpdate) -> Result<()> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        let chat = ChatRoom::new(message.chat.id, ChatKind::from_api(&message.chat.chat_type));

        // Greet the group when the bot itself is added.
        if let Some(me) = &self.me
            && chat.kind.is_group()
            && message.new_chat_members.iter().any(|m| m.id == me.id)
        {
            self.reply(chat.id, &texts::greeting(me.username.as_deref()))
                .await;
            return Ok(());
        }

        let Some(from) = &message.from else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if text.starts_with('/') {
            let me_username = self.me.as_ref().and_then(|me| me.username.as_deref());
            if let Some((name, args)) = parse_command(text, me_username) {
                tracing::info!(chat_id = chat.id, from = from.id, command = name, "Command");
                self.handle_command(&chat, from, name, &args).await?;
            }
            return Ok(());
        }

        self.handle_chat_message(&chat, from, text).await
    }

    async fn handle_command(
        &self,
        chat: &ChatRoom,
        from: &TgUser,
        name: &str,
        args: &[&str],
    ) -> Result<()> {
        match name {
            "start" => self.reply(chat.id, texts::START_TEXT).await,
            "info" => self.reply(chat.id, texts::INFO_TEXT).await,
            "help" => {
                let help = if args.first() == Some(&"schedule") {
                    texts::SCHEDULE_HELP
                } else {
                    texts::COMMAND_HELP
                };
                self.reply(chat.id, help).await;
            }
            "register" => self.handle_register(chat, from).await?,
            "eject" => self.handle_eject(chat, from).await?,
            "list" => self.handle_list(chat).await?,
            "stats" => self.handle_stats(chat).await?,
            "raffle" => {
                self.runner.start(chat, StartOptions::manual()).await;
            }
            "cancel" => {
                if self.runner.cancel(chat.id).await {
                    self.reply(chat.id, texts::RAFFLE_CANCELLED).await;
                } else {
                    self.reply(chat.id, texts::NO_ACTIVE_RAFFLE).await;
                }
            }
            "configure" => self.handle_configure(chat, from, args).await?,
            _ => {}
        }
        Ok(())
    }

    async fn handle_register(&self, chat: &ChatRoom, from: &TgUser) -> Result<()> {
        if from.is_bot {
            self.reply(chat.id, texts::BOTS_CANNOT_REGISTER).await;
            return Ok(());
        }
        let users = self.store.participants(chat.id).await?;
        if users.iter().any(|user| user.id == from.id) {
            self.reply(chat.id, texts::ALREADY_REGISTERED).await;
            return Ok(());
        }
        let participant = self.ensure_user(chat.id, from).await?;
        self.reply(chat.id, &texts::registered(&participant.mention()))
            .await;
        Ok(())
    }

    async fn handle_eject(&self, chat: &ChatRoom, from: &TgUser) -> Result<()> {
        let removed = self.store.opt_out(chat.id, from.id).await?;
        if removed {
            self.reply(chat.id, texts::EJECTED).await;
        } else {
            self.reply(chat.id, texts::NOT_REGISTERED).await;
        }
        Ok(())
    }

    async fn handle_list(&self, chat: &ChatRoom) -> Result<()> {
        let users = self.store.participants(chat.id).await?;
        if users.is_empty() {
            self.reply(chat.id, texts::EMPTY_LIST).await;
            return Ok(());
        }
        let lines: Vec<String> = users
            .iter()
            .enumerate()
            .map(|(index, user)| format!("{}. {}", index + 1, user.mention()))
            .collect();
        self.reply(
            chat.id,
            &texts::participant_list(&lines.join("\n"), users.len()),
        )
        .await;
        Ok(())
    }

    async fn handle_stats(&self, chat: &ChatRoom) -> Result<()> {
        let users = self.store.participants(chat.id).await?;
        self.reply(chat.id, &build_stats_message(&users)).await;
        Ok(())
    }

    async fn handle_configure(
        &self,
        chat: &ChatRoom,
        from: &TgUser,
        args: &[&str],
    ) -> Result<()> {
        if !chat.kind.is_group() {
            self.reply(chat.id, texts::NEED_GROUP_CONFIGURE).await;
            return Ok(());
        }
        let admin = match self.api.is_chat_admin(chat.id, from.id).await {
            Ok(admin) => admin,
            Err(e) => {
                tracing::warn!(chat_id = chat.id, "Admin check failed: {e}");
                false
            }
        };
        if !admin {
            self.reply(chat.id, texts::ADMINS_ONLY).await;
            return Ok(());
        }

        match parse_configure(args) {
            ConfigureAction::Usage => self.reply(chat.id, texts::CONFIGURE_USAGE).await,
            ConfigureAction::AutoRegisterShow => {
                let enabled = self.store.auto_register(chat.id).await?;
                self.reply(chat.id, &texts::auto_register_state(enabled)).await;
            }
            ConfigureAction::AutoRegisterSet(enabled) => {
                self.store.set_auto_register(chat.id, enabled).await?;
                self.reply(chat.id, &texts::auto_register_set(enabled)).await;
            }
            ConfigureAction::ScheduleShow => {
                let current = self.store.schedule(chat.id).await?;
                self.reply(chat.id, &texts::current_schedule(current.as_deref()))
                    .await;
            }
            ConfigureAction::ScheduleSet(input) => match Schedule::parse(&input) {
                None => self.reply(chat.id, texts::SCHEDULE_HELP).await,
                Some(Schedule::Off) => {
                    self.store.set_schedule(chat.id, None).await?;
                    self.reply(chat.id, texts::SCHEDULE_DISABLED).await;
                }
                Some(schedule) => {
                    let normalized = schedule.to_string();
                    self.store.set_schedule(chat.id, Some(&normalized)).await?;
                    if self.store.schedule_timezone(chat.id).await?.is_none() {
                        self.store
                            .set_schedule_timezone(
                                chat.id,
                                &self.config.schedule.default_timezone,
                            )
                            .await?;
                    }
                    self.reply(chat.id, &texts::schedule_saved(&normalized)).await;
                }
            },
            ConfigureAction::TriggerList => {
                let words = self.store.trigger_words(chat.id).await?;
                if words.is_empty() {
                    self.reply(chat.id, texts::NO_TRIGGERS).await;
                } else {
                    self.reply(chat.id, &texts::trigger_list(&words)).await;
                }
            }
            ConfigureAction::TriggerAdd(word) => {
                let added = self.store.add_trigger_word(chat.id, &word).await?;
                let reply = if added {
                    texts::trigger_added(&word)
                } else {
                    texts::trigger_exists(&word)
                };
                self.reply(chat.id, &reply).await;
            }
            ConfigureAction::TriggerRemove(word) => {
                let removed = self.store.remove_trigger_word(chat.id, &word).await?;
                let reply = if removed {
                    texts::trigger_removed(&word)
                } else {
                    texts::trigger_missing(&word)
                };
                self.reply(chat.id, &reply).await;
            }
            ConfigureAction::TriggerUsage => self.reply(chat.id, texts::TRIGGER_USAGE).await,
            ConfigureAction::Limits(min, max) => {
                self.store.set_donation_limits(chat.id, min, max).await?;
                self.reply(chat.id, &texts::limits_saved(min, max)).await;
            }
            ConfigureAction::BadLimits => self.reply(chat.id, texts::BAD_LIMITS).await,
            ConfigureAction::JarUrl(jar_url) => {
                self.store.set_jar_url(chat.id, &jar_url).await?;
                self.reply(chat.id, &texts::jar_saved(&jar_url)).await;
            }
            ConfigureAction::BadJarUrl => self.reply(chat.id, texts::BAD_JAR_URL).await,
        }
        Ok(())
    }

    /// Non-command group message: trigger matching, then auto-registration.
    async fn handle_chat_message(&self, chat: &ChatRoom, from: &TgUser, text: &str) -> Result<()> {
        if !chat.kind.is_group() || from.is_bot {
            return Ok(());
        }

        let words = self.store.trigger_words(chat.id).await?;
        if !words.is_empty() {
            let normalized = text.to_lowercase();
            if let Some(word) = words.iter().find(|word| normalized.contains(word.as_str())) {
                let outcome = self.runner.start(chat, StartOptions::triggered(word)).await;
                tracing::debug!(chat_id = chat.id, ?outcome, %word, "Trigger-activated start");
            }
        }

        if !self.store.auto_register(chat.id).await? {
            return Ok(());
        }
        if self.store.is_opted_out(chat.id, from.id).await? {
            return Ok(());
        }
        if self.store.participant(chat.id, from.id).await?.is_some() {
            return Ok(());
        }
        let participant = self.ensure_user(chat.id, from).await?;
        self.reply(chat.id, &texts::auto_registered(&participant.mention()))
            .await;
        Ok(())
    }

    /// Upsert a user into the registry, preserving their statistics and
    /// clearing any earlier opt-out.
    async fn ensure_user(&self, chat_id: i64, user: &TgUser) -> Result<Participant> {
        let existing = self.store.participant(chat_id, user.id).await?;
        let participant = Participant {
            id: user.id,
            name: display_name(
                &user.first_name,
                user.last_name.as_deref(),
                user.username.as_deref(),
            ),
            username: user.username.clone(),
            wins: existing.as_ref().map_or(0, |p| p.wins),
            donated: existing.as_ref().map_or(0, |p| p.donated),
        };
        self.store.upsert_participant(chat_id, &participant).await?;
        self.store.clear_opt_out(chat_id, user.id).await?;
        Ok(participant)
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text).await {
            tracing::warn!(chat_id, "Failed to send reply: {e}");
        }
    }
}

/// Split `/name@Bot arg1 arg2` into the command name and its arguments.
/// Commands addressed to a different bot return `None`.
fn parse_command<'a>(text: &'a str, bot_username: Option<&str>) -> Option<(&'a str, Vec<&'a str>)> {
    let mut tokens = text.split_whitespace();
    let head = tokens.next()?.strip_prefix('/')?;
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    if let Some(target) = target {
        match bot_username {
            Some(me) if target.eq_ignore_ascii_case(me) => {}
            _ => return None,
        }
    }
    Some((name, tokens.collect()))
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigureAction {
    Usage,
    AutoRegisterShow,
    AutoRegisterSet(bool),
    ScheduleShow,
    ScheduleSet(String),
    TriggerList,
    TriggerAdd(String),
    TriggerRemove(String),
    TriggerUsage,
    Limits(i64, i64),
    BadLimits,
    JarUrl(String),
    BadJarUrl,
}

/// Classify `/configure` arguments. All IO-free so the dispatch table is
/// testable on its own.
fn parse_configure(args: &[&str]) -> ConfigureAction {
    match args {
        [] => ConfigureAction::Usage,
        ["auto-register"] => ConfigureAction::AutoRegisterShow,
        ["auto-register", "on"] => ConfigureAction::AutoRegisterSet(true),
        ["auto-register", "off"] => ConfigureAction::AutoRegisterSet(false),
        ["auto-register", ..] => ConfigureAction::AutoRegisterShow,
        ["schedule"] => ConfigureAction::ScheduleShow,
        ["schedule", rest @ ..] => ConfigureAction::ScheduleSet(rest.join(" ")),
        ["trigger"] => ConfigureAction::TriggerList,
        ["trigger", action, word @ ..]
            if (*action == "+" || *action == "-") && !word.is_empty() =>
        {
            let word = word.join(" ").trim().to_string();
            if word.is_empty() {
                ConfigureAction::TriggerUsage
            } else if *action == "+" {
                ConfigureAction::TriggerAdd(word)
            } else {
                ConfigureAction::TriggerRemove(word)
            }
        }
        ["trigger", ..] => ConfigureAction::TriggerUsage,
        [min, max] if is_number(min) && is_number(max) => {
            match (min.parse::<i64>(), max.parse::<i64>()) {
                (Ok(min), Ok(max)) if min > 0 && max > 0 && min <= max => {
                    ConfigureAction::Limits(min, max)
                }
                _ => ConfigureAction::BadLimits,
            }
        }
        [single] => {
            if Url::parse(single).is_ok() {
                ConfigureAction::JarUrl(single.to_string())
            } else {
                ConfigureAction::BadJarUrl
            }
        }
        _ => ConfigureAction::Usage,
    }
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Top-10 winners ranked by wins, then by donated total, plus the chat-wide
/// donation sum.
fn build_stats_message(participants: &[Participant]) -> String {
    let mut ranked: Vec<&Participant> = participants.iter().filter(|p| p.wins > 0).collect();
    ranked.sort_by(|a, b| b.wins.cmp(&a.wins).then(b.donated.cmp(&a.donated)));
    ranked.truncate(10);

    if ranked.is_empty() {
        return texts::NO_WINNERS_YET.to_string();
    }

    let lines: Vec<String> = ranked
        .iter()
        .enumerate()
        .map(|(index, p)| format!("{}. {} — {} / {} грн", index + 1, p.mention(), p.wins, p.donated))
        .collect();
    let total: i64 = participants.iter().map(|p| p.donated).sum();
    format!(
        "Топ переможців:\n{}\n\nВсього донатів: {total} грн 💛",
        lines.join("\n")
    )
}
