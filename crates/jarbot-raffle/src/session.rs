//! Raffle session orchestration.
//!
//! Per chat room the runner is a two-state machine: Idle (no entry in the
//! session map) and Running (entry present, steps pending). `start` moves
//! Idle → Running after its preconditions pass; the final step or an
//! explicit `cancel` moves Running → Idle. The session slot lock is held
//! across the whole precondition sequence, so two concurrent starts for the
//! same chat can never both pass the existence check.
//!
//! Every delayed step re-checks that its (chat, generation) pair is still
//! the live session before acting. Cancellation aborts the step tasks *and*
//! bumps the slot out of the map, so a step already queued for execution
//! when cancel lands becomes a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use jarbot_core::config::RaffleConfig;
use jarbot_core::types::{ChatRoom, DonationLimits, Participant, build_jar_url};
use jarbot_core::{Outbound, RandomSource, Store};

use crate::texts;

/// How a start attempt is qualified.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Gate the start on the per-chat trigger cooldown window and record a
    /// new mark on success.
    pub enforce_cooldown: bool,
    /// Suppress precondition-failure replies (schedule- and trigger-driven
    /// starts never message about declines).
    pub silent: bool,
    /// Trigger word to echo in the opening message.
    pub trigger_word: Option<String>,
    /// Skip the group-type check (schedule-driven starts act on a stored
    /// chat id without a live room object).
    pub skip_group_check: bool,
}

impl StartOptions {
    /// The `/raffle` command: verbose, ungated.
    pub fn manual() -> Self {
        Self::default()
    }

    /// A trigger-word match: silent, cooldown-gated.
    pub fn triggered(word: &str) -> Self {
        Self {
            enforce_cooldown: true,
            silent: true,
            trigger_word: Some(word.to_string()),
            skip_group_check: false,
        }
    }

    /// A schedule firing: silent, no cooldown, no room object to check.
    pub fn scheduled() -> Self {
        Self {
            enforce_cooldown: false,
            silent: true,
            trigger_word: None,
            skip_group_check: true,
        }
    }
}

/// Outcome of a start attempt. Declines are ordinary results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    NotAGroup,
    AlreadyRunning,
    CoolingDown,
    NoParticipants,
}

impl StartOutcome {
    pub fn started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

/// One live session: its generation plus the handles of all pending steps.
struct Session {
    generation: u64,
    steps: Vec<JoinHandle<()>>,
}

struct RunnerInner {
    store: Arc<dyn Store>,
    outbound: Arc<dyn Outbound>,
    random: Arc<dyn RandomSource>,
    config: RaffleConfig,
    sessions: Mutex<HashMap<i64, Session>>,
    generation: AtomicU64,
}

/// Drives raffle sessions. Cheap to clone; all clones share one session
/// map.
#[derive(Clone)]
pub struct RaffleRunner {
    inner: Arc<RunnerInner>,
}

enum StepKind {
    Phrase,
    Selecting,
}

impl RaffleRunner {
    pub fn new(
        store: Arc<dyn Store>,
        outbound: Arc<dyn Outbound>,
        random: Arc<dyn RandomSource>,
        config: RaffleConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                store,
                outbound,
                random,
                config,
                sessions: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(1),
            }),
        }
    }

    /// Try to start a raffle in a chat. Preconditions are checked in order
    /// and each failure declines with no side effects: the room must be a
    /// group (unless bypassed), the chat must be Idle, the cooldown window
    /// must have passed (when enforced), and the participant list must be
    /// non-empty.
    pub async fn start(&self, chat: &ChatRoom, opts: StartOptions) -> StartOutcome {
        let inner = &self.inner;
        let chat_id = chat.id;

        if !opts.skip_group_check && !chat.kind.is_group() {
            self.decline(chat_id, &opts, texts::NOT_A_GROUP).await;
            return StartOutcome::NotAGroup;
        }

        let mut sessions = inner.sessions.lock().await;
        if sessions.contains_key(&chat_id) {
            drop(sessions);
            self.decline(chat_id, &opts, texts::ALREADY_RUNNING).await;
            return StartOutcome::AlreadyRunning;
        }

        if opts.enforce_cooldown {
            let window_ms = inner.config.trigger_cooldown_secs as i64 * 1000;
            match inner.store.cooldown_mark(chat_id).await {
                Ok(Some(mark)) if Utc::now().timestamp_millis() - mark < window_ms => {
                    return StartOutcome::CoolingDown;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(chat_id, "Cooldown lookup failed, not gating: {e}");
                }
            }
        }

        let participants = match inner.store.participants(chat_id).await {
            Ok(list) => list,
            Err(e) => {
                drop(sessions);
                tracing::error!(chat_id, "Participant lookup failed: {e}");
                self.decline(chat_id, &opts, texts::NO_PARTICIPANTS).await;
                return StartOutcome::NoParticipants;
            }
        };
        if participants.is_empty() {
            drop(sessions);
            self.decline(chat_id, &opts, texts::NO_PARTICIPANTS).await;
            return StartOutcome::NoParticipants;
        }

        if opts.enforce_cooldown {
            // Marked before any delayed step runs, so a burst of trigger
            // messages inside the announcement window cannot re-arm.
            let now_ms = Utc::now().timestamp_millis();
            if let Err(e) = inner.store.set_cooldown_mark(chat_id, now_ms).await {
                tracing::warn!(chat_id, "Failed to record cooldown mark: {e}");
            }
        }

        let generation = inner.generation.fetch_add(1, Ordering::Relaxed);
        let base = inner.config.step_interval_ms;
        let mut steps = Vec::with_capacity(5);
        for i in 1..=3 {
            steps.push(self.spawn_step(chat_id, generation, base * i, StepKind::Phrase));
        }
        steps.push(self.spawn_step(chat_id, generation, base * 4, StepKind::Selecting));
        steps.push(self.spawn_resolution(chat_id, generation, base * 5, participants));
        sessions.insert(chat_id, Session { generation, steps });
        drop(sessions);

        tracing::info!(chat_id, generation, "Raffle started");
        let opening = match &opts.trigger_word {
            Some(word) => texts::trigger_start(word),
            None => texts::START.to_string(),
        };
        self.say(chat_id, &opening).await;

        StartOutcome::Started
    }

    /// Cancel the live session, if any: aborts every pending step and frees
    /// the chat's slot. Idempotent.
    pub async fn cancel(&self, chat_id: i64) -> bool {
        let session = self.inner.sessions.lock().await.remove(&chat_id);
        match session {
            Some(session) => {
                for step in session.steps {
                    step.abort();
                }
                tracing::info!(chat_id, "Raffle cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a session is currently Running for this chat.
    pub async fn is_running(&self, chat_id: i64) -> bool {
        self.inner.sessions.lock().await.contains_key(&chat_id)
    }

    fn spawn_step(
        &self,
        chat_id: i64,
        generation: u64,
        delay_ms: u64,
        kind: StepKind,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if !runner.is_live(chat_id, generation).await {
                return;
            }
            let text = match kind {
                StepKind::Phrase => runner.pick_phrase(),
                StepKind::Selecting => texts::SELECTING.to_string(),
            };
            runner.say(chat_id, &text).await;
        })
    }

    fn spawn_resolution(
        &self,
        chat_id: i64,
        generation: u64,
        delay_ms: u64,
        participants: Vec<Participant>,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if !runner.is_live(chat_id, generation).await {
                return;
            }
            runner.resolve(chat_id, &participants).await;
            runner.release(chat_id, generation).await;
        })
    }

    /// Draw the winner from the list captured at start time, record the win
    /// and prize, announce. A draw that yields nobody ends the session
    /// without touching any statistics.
    async fn resolve(&self, chat_id: i64, participants: &[Participant]) {
        let inner = &self.inner;

        let picked = if participants.is_empty() {
            None
        } else {
            participants.get(inner.random.pick_index(participants.len()))
        };
        let Some(winner) = picked else {
            self.say(chat_id, texts::NO_ONE_TO_PICK).await;
            return;
        };

        let limits = match inner.store.donation_limits(chat_id).await {
            Ok(limits) => limits,
            Err(e) => {
                tracing::warn!(chat_id, "Donation limits lookup failed, using defaults: {e}");
                DonationLimits::default()
            }
        };
        let lo = limits.min.min(limits.max);
        let hi = limits.min.max(limits.max);
        let amount = inner.random.int_between(lo, hi);

        if let Err(e) = inner.store.record_win(chat_id, winner.id, 1, amount).await {
            tracing::error!(chat_id, winner = winner.id, "Failed to record win: {e}");
        }

        let jar_url = match inner.store.jar_url(chat_id).await {
            Ok(Some(url)) => url,
            Ok(None) => inner.config.default_jar_url.clone(),
            Err(e) => {
                tracing::warn!(chat_id, "Jar link lookup failed, using default: {e}");
                inner.config.default_jar_url.clone()
            }
        };
        let jar_url = build_jar_url(&jar_url, amount);

        tracing::info!(chat_id, winner = winner.id, amount, "Raffle resolved");
        self.say(chat_id, &texts::winner(&winner.mention(), amount, &jar_url))
            .await;
    }

    /// Liveness check run at the top of every delayed step.
    async fn is_live(&self, chat_id: i64, generation: u64) -> bool {
        self.inner
            .sessions
            .lock()
            .await
            .get(&chat_id)
            .is_some_and(|s| s.generation == generation)
    }

    /// Free the chat's slot, but only for the generation that owns it.
    async fn release(&self, chat_id: i64, generation: u64) {
        let mut sessions = self.inner.sessions.lock().await;
        if sessions.get(&chat_id).is_some_and(|s| s.generation == generation) {
            sessions.remove(&chat_id);
        }
    }

    fn pick_phrase(&self) -> String {
        let phrases = &self.inner.config.phrases;
        if phrases.is_empty() {
            texts::DEFAULT_PHRASES[self.inner.random.pick_index(texts::DEFAULT_PHRASES.len())]
                .to_string()
        } else {
            phrases[self.inner.random.pick_index(phrases.len())].clone()
        }
    }

    async fn say(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.inner.outbound.send(chat_id, text).await {
            tracing::warn!(chat_id, "Failed to send message: {e}");
        }
    }

    async fn decline(&self, chat_id: i64, opts: &StartOptions, text: &str) {
        if !opts.silent {
            self.say(chat_id, text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jarbot_core::Result;
    use jarbot_core::types::ChatKind;
    use jarbot_store::SqliteStore;
    use std::sync::Mutex as StdMutex;

    /// Records every outbound message.
    #[derive(Default)]
    struct RecordingOutbound {
        sent: StdMutex<Vec<(i64, String)>>,
    }

    impl RecordingOutbound {
        fn messages(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// Always picks index 0 and the lower donation bound.
    struct ZeroRandom;

    impl RandomSource for ZeroRandom {
        fn pick_index(&self, _len: usize) -> usize {
            0
        }

        fn int_between(&self, lo: i64, _hi: i64) -> i64 {
            lo
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        outbound: Arc<RecordingOutbound>,
        runner: RaffleRunner,
    }

    const CHAT: ChatRoom = ChatRoom {
        id: 100,
        kind: ChatKind::Supergroup,
    };

    fn participant(id: i64, name: &str) -> Participant {
        Participant {
            id,
            name: name.to_string(),
            username: None,
            wins: 0,
            donated: 0,
        }
    }

    async fn fixture_with_participants(names: &[(i64, &str)]) -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for (id, name) in names {
            store
                .upsert_participant(CHAT.id, &participant(*id, name))
                .await
                .unwrap();
        }
        let outbound = Arc::new(RecordingOutbound::default());
        let runner = RaffleRunner::new(
            store.clone(),
            outbound.clone(),
            Arc::new(ZeroRandom),
            RaffleConfig::default(),
        );
        Fixture {
            store,
            outbound,
            runner,
        }
    }

    /// Long enough for every step of a default-config session to fire.
    async fn run_out_the_clock() {
        tokio::time::sleep(Duration::from_millis(1200 * 5 + 100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_sequence_picks_winner_and_records_prize() {
        let fx = fixture_with_participants(&[(300, "A"), (301, "B")]).await;

        let outcome = fx.runner.start(&CHAT, StartOptions::manual()).await;
        assert!(outcome.started());
        run_out_the_clock().await;

        // Opening + 3 phrases + selecting + winner announcement.
        let messages = fx.outbound.messages();
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].1, texts::START);
        assert_eq!(messages[4].1, texts::SELECTING);
        assert!(messages[5].1.contains("Переможець: A"));
        assert!(messages[5].1.contains("10 грн"));

        // Deterministic draw: first participant, lower bound prize.
        let winner = fx.store.participant(CHAT.id, 300).await.unwrap().unwrap();
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.donated, 10);
        let other = fx.store.participant(CHAT.id, 301).await.unwrap().unwrap();
        assert_eq!(other.wins, 0);

        // Slot released.
        assert!(!fx.runner.is_running(CHAT.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_declined_while_running() {
        let fx = fixture_with_participants(&[(300, "A")]).await;

        let (first, second) = tokio::join!(
            fx.runner.start(&CHAT, StartOptions::manual()),
            fx.runner.start(&CHAT, StartOptions::manual()),
        );
        let outcomes = [first, second];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| o.started())
                .count(),
            1
        );
        assert!(outcomes.contains(&StartOutcome::AlreadyRunning));

        run_out_the_clock().await;
        // Exactly one full sequence ran: one decline reply plus six
        // sequence messages.
        let winner_messages = fx
            .outbound
            .messages()
            .iter()
            .filter(|(_, text)| text.contains("Переможець"))
            .count();
        assert_eq!(winner_messages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn declines_without_participants() {
        let fx = fixture_with_participants(&[]).await;

        let outcome = fx.runner.start(&CHAT, StartOptions::manual()).await;
        assert_eq!(outcome, StartOutcome::NoParticipants);
        assert!(!fx.runner.is_running(CHAT.id).await);
        assert_eq!(fx.outbound.messages().len(), 1);
        assert_eq!(fx.outbound.messages()[0].1, texts::NO_PARTICIPANTS);
    }

    #[tokio::test(start_paused = true)]
    async fn declines_outside_group_chats() {
        let fx = fixture_with_participants(&[(300, "A")]).await;
        let private = ChatRoom::new(7, ChatKind::Private);

        let outcome = fx.runner.start(&private, StartOptions::manual()).await;
        assert_eq!(outcome, StartOutcome::NotAGroup);
        assert_eq!(fx.outbound.messages()[0].1, texts::NOT_A_GROUP);

        // Schedule-driven starts bypass the room-type check: the stored
        // chat id is trusted even without a live room object.
        let stored = ChatRoom::new(CHAT.id, ChatKind::Unknown);
        let outcome = fx.runner.start(&stored, StartOptions::scheduled()).await;
        assert!(outcome.started());
        fx.runner.cancel(CHAT.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_cooldown_gates_repeat_triggers_but_not_manual_starts() {
        let fx = fixture_with_participants(&[(300, "A")]).await;

        let outcome = fx.runner.start(&CHAT, StartOptions::triggered("донат")).await;
        assert!(outcome.started());
        fx.runner.cancel(CHAT.id).await;

        // Within the window: trigger starts decline silently.
        let outcome = fx.runner.start(&CHAT, StartOptions::triggered("донат")).await;
        assert_eq!(outcome, StartOutcome::CoolingDown);

        // Manual starts are never gated.
        let outcome = fx.runner.start(&CHAT, StartOptions::manual()).await;
        assert!(outcome.started());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_steps_fire_sends_nothing_further() {
        let fx = fixture_with_participants(&[(300, "A")]).await;

        let outcome = fx.runner.start(&CHAT, StartOptions::manual()).await;
        assert!(outcome.started());
        let sent_at_cancel = fx.outbound.messages().len();

        assert!(fx.runner.cancel(CHAT.id).await);
        assert!(!fx.runner.is_running(CHAT.id).await);

        run_out_the_clock().await;
        assert_eq!(fx.outbound.messages().len(), sent_at_cancel);

        // No statistics were touched.
        let participant = fx.store.participant(CHAT.id, 300).await.unwrap().unwrap();
        assert_eq!(participant.wins, 0);
        assert_eq!(participant.donated, 0);

        // Cancel on an Idle chat is a no-op.
        assert!(!fx.runner.cancel(CHAT.id).await);

        // The slot is free for a fresh session.
        let outcome = fx.runner.start(&CHAT, StartOptions::manual()).await;
        assert!(outcome.started());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_start_echoes_the_word() {
        let fx = fixture_with_participants(&[(300, "A")]).await;

        fx.runner.start(&CHAT, StartOptions::triggered("донат")).await;
        let messages = fx.outbound.messages();
        assert!(messages[0].1.contains("донат"));
    }
}
