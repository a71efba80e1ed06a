//! The conversation turn controller.
//!
//! [`TurnController`] owns the transcript, the preferences and the
//! [`TurnStatus`] state machine.  It is the only writer of that state; render
//! sinks observe it through [`TurnController::subscribe`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::config::TurnConfig;
use crate::conversation::{ConversationRecord, Preferences, RecordId};
use crate::llm::{LanguageModel, LlmError, ModelReply};
use crate::store::PreferenceStore;
use crate::voice::{CaptureEvent, VoiceIo};

use super::state::{TurnSnapshot, TurnStatus};

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// Mutable controller state.  Guarded by one mutex that is never held across
/// an `.await`.
struct TurnState {
    status: TurnStatus,
    transcript: Vec<ConversationRecord>,
    preferences: Preferences,
    next_id: RecordId,
    /// Bumped by every submit and every capture start.  A speaking timer or
    /// capture session only acts while its generation is current.
    generation: u64,
    /// Bumped by `clear_history`.  A turn started under an older epoch drops
    /// its reply.
    epoch: u64,
    subscribers: Vec<mpsc::UnboundedSender<TurnSnapshot>>,
}

impl TurnState {
    fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            status: self.status,
            transcript: self.transcript.clone(),
            preferences: self.preferences.clone(),
        }
    }

    /// Send the current snapshot to every live subscriber.
    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn set_status(&mut self, status: TurnStatus) {
        if self.status != status {
            log::debug!("turn: {} → {}", self.status, status);
        }
        self.status = status;
        self.publish();
    }

    /// A fresh id and a timestamp no earlier than the last record's.
    fn stamp(&mut self) -> (RecordId, DateTime<Utc>) {
        let id = self.next_id;
        self.next_id = id.next();

        let now = Utc::now();
        let timestamp = match self.transcript.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        (id, timestamp)
    }

    /// Store writes are synchronous and made under the state lock, so the
    /// persisted transcript always matches an observed snapshot.
    fn append(&mut self, store: &dyn PreferenceStore, record: ConversationRecord) {
        self.transcript.push(record);
        store.save_history(&self.transcript);
    }
}

// ---------------------------------------------------------------------------
// TurnController
// ---------------------------------------------------------------------------

struct Inner {
    store: Arc<dyn PreferenceStore>,
    llm: Arc<dyn LanguageModel>,
    voice: Arc<dyn VoiceIo>,
    config: TurnConfig,
    state: Mutex<TurnState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_speaking(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation && state.status == TurnStatus::Speaking {
            state.set_status(TurnStatus::Idle);
        } else {
            log::debug!("turn: speaking timer of generation {generation} is stale, ignored");
        }
    }
}

/// Drives one conversational turn at a time.
///
/// Cheap to clone; all clones share the same state.  Operations that start
/// background work (`submit_text`, `toggle_listening`) must run inside a
/// Tokio runtime.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use shohayok::config::AppConfig;
/// use shohayok::store::{KvPreferenceStore, MemoryBackend};
/// use shohayok::turn::TurnController;
/// use shohayok::voice::NullVoice;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let controller = TurnController::new(
///     Arc::new(KvPreferenceStore::new(MemoryBackend::new())),
///     shohayok::llm::from_config(&config),
///     Arc::new(NullVoice),
///     config.turn.clone(),
/// );
///
/// let mut updates = controller.subscribe();
/// controller.submit_text("Chrome open koro").await;
/// while let Ok(snapshot) = updates.try_recv() {
///     println!("{}", snapshot.status);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct TurnController {
    inner: Arc<Inner>,
}

impl TurnController {
    /// Create a controller, loading preferences and history from `store`.
    ///
    /// Record ids continue after the largest id found in the loaded history.
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        llm: Arc<dyn LanguageModel>,
        voice: Arc<dyn VoiceIo>,
        config: TurnConfig,
    ) -> Self {
        let preferences = store.get_preferences();
        let mut transcript = store.get_history();
        let next_id = match transcript.iter().map(|r| r.id).max() {
            None => RecordId(1),
            Some(max) => match max.checked_next() {
                Some(next) => next,
                None => {
                    log::warn!(
                        "turn: stored record ids are exhausted, renumbering {} records",
                        transcript.len()
                    );
                    for (n, record) in transcript.iter_mut().enumerate() {
                        record.id = RecordId(n as u64 + 1);
                    }
                    RecordId(transcript.len() as u64 + 1)
                }
            },
        };
        log::info!("turn: loaded {} records from history", transcript.len());

        let state = TurnState {
            status: TurnStatus::Idle,
            transcript,
            preferences,
            next_id,
            generation: 0,
            epoch: 0,
            subscribers: Vec::new(),
        };

        Self {
            inner: Arc::new(Inner {
                store,
                llm,
                voice,
                config,
                state: Mutex::new(state),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn status(&self) -> TurnStatus {
        self.inner.lock().status
    }

    pub fn transcript(&self) -> Vec<ConversationRecord> {
        self.inner.lock().transcript.clone()
    }

    pub fn preferences(&self) -> Preferences {
        self.inner.lock().preferences.clone()
    }

    pub fn snapshot(&self) -> TurnSnapshot {
        self.inner.lock().snapshot()
    }

    /// Receive a snapshot after every state change, in order.
    ///
    /// The current snapshot is sent immediately.  Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TurnSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        if tx.send(state.snapshot()).is_ok() {
            state.subscribers.push(tx);
        }
        rx
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Run one turn for `text`.
    ///
    /// Blank text and submissions while a request is in flight are ignored.
    /// The user record and the `Processing` status are applied before the
    /// first suspension point, so a concurrent second call always sees them.
    /// Resolves once the reply (or failure) has been recorded; the return to
    /// `Idle` after `Speaking` happens later on a timer.
    ///
    /// The model receives at most `history_limit` prior records.  The request
    /// runs on its own task: dropping this future does not abandon the turn,
    /// and a panicking model is recorded as a failure.
    pub async fn submit_text(&self, text: &str) {
        let text = text.trim();

        let (history, prefs, epoch) = {
            let mut state = self.inner.lock();
            if text.is_empty() {
                log::debug!("turn: blank submission ignored");
                return;
            }
            if state.status.is_busy() {
                log::debug!("turn: submission while processing ignored");
                return;
            }

            let start = state
                .transcript
                .len()
                .saturating_sub(self.inner.config.history_limit);
            let history = state.transcript[start..].to_vec();
            let (id, timestamp) = state.stamp();
            state.append(&*self.inner.store, ConversationRecord::user(id, text, timestamp));
            state.generation += 1;
            state.set_status(TurnStatus::Processing);
            (history, state.preferences.clone(), state.epoch)
        };

        let llm = Arc::clone(&self.inner.llm);
        let message = text.to_string();
        let call = tokio::spawn(async move { llm.send(&history, &message, &prefs).await });

        let this = self.clone();
        let turn = tokio::spawn(async move {
            let result = call.await.unwrap_or_else(|e| {
                log::error!("turn: model request task failed: {e}");
                Err(LlmError::Interrupted(e.to_string()))
            });
            this.complete_turn(epoch, result);
        });
        if let Err(e) = turn.await {
            log::error!("turn: turn task failed: {e}");
        }
    }

    /// Record the outcome of the request started under `epoch`.
    fn complete_turn(&self, epoch: u64, result: Result<ModelReply, LlmError>) {
        let mut state = self.inner.lock();
        if state.epoch != epoch {
            log::info!("turn: history was cleared during the request, reply discarded");
            state.set_status(TurnStatus::Idle);
            return;
        }

        match result {
            Ok(reply) => {
                log::debug!(
                    "turn: reply with {} chars and {} tool invocations",
                    reply.text.chars().count(),
                    reply.tool_invocations.len()
                );
                let spoken = reply.text.clone();
                let (id, timestamp) = state.stamp();
                state.append(
                    &*self.inner.store,
                    ConversationRecord::model(id, reply.text, reply.tool_invocations, timestamp),
                );

                if spoken.is_empty() {
                    state.set_status(TurnStatus::Idle);
                    return;
                }

                state.set_status(TurnStatus::Speaking);
                if state.preferences.voice_enabled {
                    self.inner.voice.speak(&spoken);
                }
                let generation = state.generation;
                drop(state);
                self.schedule_idle(generation, speaking_duration(&self.inner.config, &spoken));
            }
            Err(e) => {
                log::warn!("turn: model request failed ({:?}): {e}", e.kind());
                let (id, timestamp) = state.stamp();
                let content = format!("WARNING: {}.", e.user_message());
                state.append(
                    &*self.inner.store,
                    ConversationRecord::error(id, content, timestamp),
                );
                state.set_status(TurnStatus::Idle);
            }
        }
    }

    /// Open a capture session.
    ///
    /// Ignored while `Listening` or `Processing`.  From `Speaking` the
    /// pending speaking timer is superseded.  A recognised transcript is
    /// submitted as if typed.
    pub fn toggle_listening(&self) {
        let generation = {
            let mut state = self.inner.lock();
            if matches!(state.status, TurnStatus::Listening | TurnStatus::Processing) {
                log::debug!("turn: listen request ignored while {}", state.status);
                return;
            }
            state.generation += 1;
            state.set_status(TurnStatus::Listening);
            state.generation
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.inner.voice.start_capture(tx);

        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                this.handle_capture(generation, event).await;
            }
        });
    }

    /// Empty the transcript and its persisted copy.
    ///
    /// Status and preferences are untouched.  A request still in flight will
    /// discard its reply when it completes.
    pub fn clear_history(&self) {
        let mut state = self.inner.lock();
        self.inner.store.clear_history();
        state.transcript.clear();
        state.epoch += 1;
        log::info!("turn: history cleared");
        state.publish();
    }

    /// Replace and persist the preferences.  Applies from the next turn.
    pub fn update_preferences(&self, preferences: Preferences) {
        let mut state = self.inner.lock();
        // written under the lock, like the transcript
        self.inner.store.save_preferences(&preferences);
        state.preferences = preferences;
        state.publish();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn handle_capture(&self, generation: u64, event: CaptureEvent) {
        match event {
            CaptureEvent::Result(text) => {
                if self.session_is_current(generation) {
                    self.submit_text(&text).await;
                }
            }
            CaptureEvent::Error(err) => {
                let mut state = self.inner.lock();
                if state.generation != generation || state.status != TurnStatus::Listening {
                    log::debug!("turn: error from stale capture session ignored: {err}");
                    return;
                }
                log::warn!("turn: capture failed: {err}");
                let (id, timestamp) = state.stamp();
                state.append(
                    &*self.inner.store,
                    ConversationRecord::error(id, err.to_string(), timestamp),
                );
                state.set_status(TurnStatus::Idle);
            }
            CaptureEvent::End => {
                let mut state = self.inner.lock();
                if state.generation == generation && state.status == TurnStatus::Listening {
                    state.set_status(TurnStatus::Idle);
                }
            }
        }
    }

    fn session_is_current(&self, generation: u64) -> bool {
        let state = self.inner.lock();
        state.generation == generation && state.status == TurnStatus::Listening
    }

    fn schedule_idle(&self, generation: u64, after: Duration) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = inner.upgrade() {
                inner.finish_speaking(generation);
            }
        });
    }
}

/// How long the speaking indicator stays up for `text`.
///
/// Grows with the character count and is capped at `speaking_max_ms`.
pub fn speaking_duration(config: &TurnConfig, text: &str) -> Duration {
    let chars = text.chars().count() as u64;
    let ms = chars
        .saturating_mul(config.speaking_ms_per_char)
        .min(config.speaking_max_ms);
    Duration::from_millis(ms)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Role, ToolInvocation};
    use crate::store::{KvPreferenceStore, MemoryBackend};
    use crate::voice::{CaptureError, NullVoice};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// What the controller passed to the model.
    #[derive(Debug, Clone)]
    struct Call {
        history_len: usize,
        message: String,
        ai_name: String,
    }

    /// Model that answers from a queue after a per-reply delay.
    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<VecDeque<(Duration, Result<ModelReply, LlmError>)>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedModel {
        fn with(replies: Vec<(u64, Result<ModelReply, LlmError>)>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|(ms, r)| (Duration::from_millis(ms), r))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn send(
            &self,
            transcript: &[ConversationRecord],
            new_message: &str,
            prefs: &Preferences,
        ) -> Result<ModelReply, LlmError> {
            self.calls.lock().unwrap().push(Call {
                history_len: transcript.len(),
                message: new_message.to_string(),
                ai_name: prefs.ai_name.clone(),
            });
            let next = self.replies.lock().unwrap().pop_front();
            let (delay, reply) =
                next.unwrap_or((Duration::from_millis(100), Ok(ModelReply::text("ঠিক আছে"))));
            tokio::time::sleep(delay).await;
            reply
        }
    }

    /// Model that panics mid-request.
    struct PanickingModel;

    #[async_trait]
    impl LanguageModel for PanickingModel {
        async fn send(
            &self,
            _transcript: &[ConversationRecord],
            _new_message: &str,
            _prefs: &Preferences,
        ) -> Result<ModelReply, LlmError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            panic!("model exploded");
        }
    }

    /// Voice whose capture sessions replay scripted events.  A session with
    /// no script stays open until the test ends.
    #[derive(Default)]
    struct ScriptedVoice {
        sessions: Mutex<VecDeque<Vec<CaptureEvent>>>,
        open: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
        started: Mutex<usize>,
        spoken: Mutex<Vec<String>>,
    }

    impl ScriptedVoice {
        fn with(sessions: Vec<Vec<CaptureEvent>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into_iter().collect()),
                ..Self::default()
            }
        }

        fn started(&self) -> usize {
            *self.started.lock().unwrap()
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl VoiceIo for ScriptedVoice {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }

        fn start_capture(&self, events: mpsc::UnboundedSender<CaptureEvent>) {
            *self.started.lock().unwrap() += 1;
            match self.sessions.lock().unwrap().pop_front() {
                Some(script) => {
                    for event in script {
                        let _ = events.send(event);
                    }
                }
                None => self.open.lock().unwrap().push(events),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    type TestStore = KvPreferenceStore<MemoryBackend>;

    struct Harness {
        controller: TurnController,
        store: Arc<TestStore>,
        model: Arc<ScriptedModel>,
        voice: Arc<ScriptedVoice>,
    }

    fn harness_with_store(store: Arc<TestStore>, model: ScriptedModel, voice: ScriptedVoice) -> Harness {
        build_harness(store, TurnConfig::default(), model, voice)
    }

    fn harness_with_config(config: TurnConfig, model: ScriptedModel, voice: ScriptedVoice) -> Harness {
        build_harness(
            Arc::new(KvPreferenceStore::new(MemoryBackend::new())),
            config,
            model,
            voice,
        )
    }

    fn build_harness(
        store: Arc<TestStore>,
        config: TurnConfig,
        model: ScriptedModel,
        voice: ScriptedVoice,
    ) -> Harness {
        let model = Arc::new(model);
        let voice = Arc::new(voice);
        let controller =
            TurnController::new(store.clone(), model.clone(), voice.clone(), config);
        Harness {
            controller,
            store,
            model,
            voice,
        }
    }

    fn harness(model: ScriptedModel, voice: ScriptedVoice) -> Harness {
        harness_with_store(
            Arc::new(KvPreferenceStore::new(MemoryBackend::new())),
            model,
            voice,
        )
    }

    /// Statuses seen so far, with consecutive repeats collapsed.
    fn statuses(rx: &mut mpsc::UnboundedReceiver<TurnSnapshot>) -> Vec<TurnStatus> {
        let mut seen: Vec<TurnStatus> = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            if seen.last() != Some(&snapshot.status) {
                seen.push(snapshot.status);
            }
        }
        seen
    }

    fn open_app_reply() -> ModelReply {
        let mut args = std::collections::BTreeMap::new();
        args.insert("appName".to_string(), serde_json::json!("Chrome"));
        ModelReply::from_parts(
            "Chrome খোলা হচ্ছে, স্যার।",
            vec![ToolInvocation::new("openApp", args)],
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn happy_path_passes_through_speaking() {
        let h = harness(
            ScriptedModel::with(vec![(100, Ok(open_app_reply()))]),
            ScriptedVoice::default(),
        );
        let mut rx = h.controller.subscribe();

        h.controller.submit_text("Chrome open koro").await;
        assert_eq!(h.controller.status(), TurnStatus::Speaking);

        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[0].content, "Chrome open koro");
        assert_eq!(transcript[1].role, Role::Model);
        assert!(!transcript[1].is_error);
        assert!(!transcript[1].content.is_empty());
        assert_eq!(transcript[1].tool_invocations[0].name, "openApp");
        assert_eq!(transcript[1].tool_invocations[0].arg_str("appName"), Some("Chrome"));

        settle().await;
        assert_eq!(h.controller.status(), TurnStatus::Idle);
        assert_eq!(
            statuses(&mut rx),
            vec![
                TurnStatus::Idle,
                TurnStatus::Processing,
                TurnStatus::Speaking,
                TurnStatus::Idle
            ]
        );
        assert_eq!(h.store.get_history(), transcript);
        // voice disabled by default
        assert!(h.voice.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_never_visits_speaking() {
        let h = harness(
            ScriptedModel::with(vec![(100, Ok(ModelReply::default()))]),
            ScriptedVoice::default(),
        );
        let mut rx = h.controller.subscribe();

        h.controller.submit_text("hello").await;

        assert_eq!(h.controller.status(), TurnStatus::Idle);
        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, Role::Model);
        assert!(!transcript[1].is_error);
        assert_eq!(
            statuses(&mut rx),
            vec![TurnStatus::Idle, TurnStatus::Processing, TurnStatus::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_appends_error_record() {
        let h = harness(
            ScriptedModel::with(vec![(
                100,
                Err(LlmError::Network("connection refused".into())),
            )]),
            ScriptedVoice::default(),
        );

        h.controller.submit_text("hello").await;

        assert_eq!(h.controller.status(), TurnStatus::Idle);
        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Model);
        assert!(transcript[1].is_error);
        assert!(transcript[1].content.starts_with("WARNING: "));
        assert!(transcript[1].content.ends_with('.'));
        assert!(transcript[1].content.len() > "WARNING: .".len());
        assert_eq!(h.store.get_history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_processing_is_ignored() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());

        tokio::join!(
            h.controller.submit_text("first"),
            h.controller.submit_text("second")
        );

        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "first");
        assert_eq!(h.model.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submit_is_ignored() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());

        h.controller.submit_text("   \n").await;

        assert!(h.controller.transcript().is_empty());
        assert_eq!(h.controller.status(), TurnStatus::Idle);
        assert!(h.model.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn model_sees_prior_transcript_and_current_preferences() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());

        h.controller.submit_text("one").await;
        settle().await;
        h.controller.update_preferences(Preferences {
            ai_name: "Jarvis".into(),
            ..Preferences::default()
        });
        h.controller.submit_text("two").await;

        let calls = h.model.calls();
        assert_eq!(calls[0].history_len, 0);
        assert_eq!(calls[0].ai_name, "Shohayok");
        assert_eq!(calls[1].history_len, 2);
        assert_eq!(calls[1].message, "two");
        assert_eq!(calls[1].ai_name, "Jarvis");
    }

    #[tokio::test(start_paused = true)]
    async fn model_context_is_limited_to_history_window() {
        let config = TurnConfig {
            history_limit: 2,
            ..TurnConfig::default()
        };
        let h = harness_with_config(config, ScriptedModel::default(), ScriptedVoice::default());

        for text in ["one", "two", "three"] {
            h.controller.submit_text(text).await;
            settle().await;
        }

        let lens: Vec<usize> = h.model.calls().iter().map(|c| c.history_len).collect();
        assert_eq!(lens, vec![0, 2, 2]);
        assert_eq!(h.controller.transcript().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_submit_still_completes_the_turn() {
        let h = harness(
            ScriptedModel::with(vec![(60_000, Ok(ModelReply::text("late reply")))]),
            ScriptedVoice::default(),
        );

        let waited =
            tokio::time::timeout(Duration::from_secs(1), h.controller.submit_text("hello")).await;
        assert!(waited.is_err());
        assert_eq!(h.controller.status(), TurnStatus::Processing);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.controller.status(), TurnStatus::Idle);
        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, "late reply");

        h.controller.submit_text("again").await;
        assert_eq!(h.controller.transcript().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_model_is_recorded_as_failure() {
        let controller = TurnController::new(
            Arc::new(KvPreferenceStore::new(MemoryBackend::new())),
            Arc::new(PanickingModel),
            Arc::new(NullVoice),
            TurnConfig::default(),
        );

        controller.submit_text("hello").await;

        assert_eq!(controller.status(), TurnStatus::Idle);
        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].is_error);
        assert!(transcript[1].content.contains("interrupted"));
    }

    #[tokio::test(start_paused = true)]
    async fn file_store_matches_transcript_after_each_turn() {
        use crate::store::FileBackend;

        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(KvPreferenceStore::new(FileBackend::new(dir.path())));
        let controller = TurnController::new(
            store.clone(),
            Arc::new(ScriptedModel::default()),
            Arc::new(NullVoice),
            TurnConfig::default(),
        );

        controller.submit_text("one").await;
        assert_eq!(store.get_history(), controller.transcript());
        controller.update_preferences(Preferences {
            theme: "crimson".into(),
            ..Preferences::default()
        });
        assert_eq!(store.get_preferences(), controller.preferences());

        let reopened = KvPreferenceStore::new(FileBackend::new(dir.path()));
        assert_eq!(reopened.get_history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_is_spoken_when_voice_enabled() {
        let h = harness(
            ScriptedModel::with(vec![(100, Ok(ModelReply::text("রোদ")))]),
            ScriptedVoice::default(),
        );
        h.controller.update_preferences(Preferences {
            voice_enabled: true,
            ..Preferences::default()
        });

        h.controller.submit_text("আবহাওয়া কেমন").await;

        assert_eq!(h.voice.spoken(), vec!["রোদ".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Speaking timer
    // -----------------------------------------------------------------------

    #[test]
    fn speaking_duration_grows_and_is_capped() {
        let config = TurnConfig::default();
        assert_eq!(speaking_duration(&config, "ok"), Duration::from_millis(100));
        assert_eq!(speaking_duration(&config, "রোদ"), Duration::from_millis(150));
        assert_eq!(
            speaking_duration(&config, &"x".repeat(1000)),
            Duration::from_millis(5000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_interrupt_next_turn() {
        let h = harness(
            ScriptedModel::with(vec![
                (100, Ok(ModelReply::text("ok"))),
                (10_000, Ok(ModelReply::text("done"))),
            ]),
            ScriptedVoice::default(),
        );

        h.controller.submit_text("one").await;
        assert_eq!(h.controller.status(), TurnStatus::Speaking);

        let controller = h.controller.clone();
        let second = tokio::spawn(async move { controller.submit_text("two").await });

        // the first turn's timer fires while the second request is in flight
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.controller.status(), TurnStatus::Processing);

        second.await.unwrap();
        assert_eq!(h.controller.status(), TurnStatus::Speaking);
        settle().await;
        assert_eq!(h.controller.status(), TurnStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn listening_from_speaking_outlives_old_timer() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());

        h.controller.submit_text("one").await;
        assert_eq!(h.controller.status(), TurnStatus::Speaking);

        h.controller.toggle_listening();
        settle().await;

        assert_eq!(h.controller.status(), TurnStatus::Listening);
        assert_eq!(h.voice.started(), 1);
    }

    // -----------------------------------------------------------------------
    // Listening
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn toggle_while_listening_is_noop() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());

        h.controller.toggle_listening();
        h.controller.toggle_listening();

        assert_eq!(h.controller.status(), TurnStatus::Listening);
        assert_eq!(h.voice.started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_while_processing_is_noop() {
        let h = harness(
            ScriptedModel::with(vec![(5_000, Ok(ModelReply::text("late")))]),
            ScriptedVoice::default(),
        );
        let controller = h.controller.clone();
        let turn = tokio::spawn(async move { controller.submit_text("hello").await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.controller.toggle_listening();
        assert_eq!(h.controller.status(), TurnStatus::Processing);
        assert_eq!(h.voice.started(), 0);

        turn.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn capture_error_appends_one_error_record() {
        let h = harness(
            ScriptedModel::default(),
            ScriptedVoice::with(vec![vec![
                CaptureEvent::Error(CaptureError::from_code("no-speech")),
                CaptureEvent::End,
            ]]),
        );
        let mut rx = h.controller.subscribe();

        h.controller.toggle_listening();
        settle().await;

        assert_eq!(
            statuses(&mut rx),
            vec![TurnStatus::Idle, TurnStatus::Listening, TurnStatus::Idle]
        );
        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].is_error);
        assert!(transcript[0].content.starts_with("NO_INPUT_DETECTED"));
        assert!(h.model.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_result_is_submitted() {
        let h = harness(
            ScriptedModel::with(vec![(100, Ok(ModelReply::text("রোদ")))]),
            ScriptedVoice::with(vec![vec![
                CaptureEvent::Result("আবহাওয়া কেমন".into()),
                CaptureEvent::End,
            ]]),
        );
        let mut rx = h.controller.subscribe();

        h.controller.toggle_listening();
        settle().await;

        assert_eq!(
            statuses(&mut rx),
            vec![
                TurnStatus::Idle,
                TurnStatus::Listening,
                TurnStatus::Processing,
                TurnStatus::Speaking,
                TurnStatus::Idle
            ]
        );
        let transcript = h.controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "আবহাওয়া কেমন");
        assert_eq!(transcript[1].content, "রোদ");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_result_and_repeated_end_return_to_idle_once() {
        let h = harness(
            ScriptedModel::default(),
            ScriptedVoice::with(vec![vec![
                CaptureEvent::Result("  ".into()),
                CaptureEvent::End,
                CaptureEvent::End,
            ]]),
        );
        let mut rx = h.controller.subscribe();

        h.controller.toggle_listening();
        settle().await;

        assert_eq!(
            statuses(&mut rx),
            vec![TurnStatus::Idle, TurnStatus::Listening, TurnStatus::Idle]
        );
        assert!(h.controller.transcript().is_empty());
        assert!(h.model.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_capture_is_surfaced_per_attempt() {
        let store = Arc::new(KvPreferenceStore::new(MemoryBackend::new()));
        let controller = TurnController::new(
            store,
            Arc::new(ScriptedModel::default()),
            Arc::new(NullVoice),
            TurnConfig::default(),
        );

        controller.toggle_listening();
        settle().await;
        controller.toggle_listening();
        settle().await;

        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript
            .iter()
            .all(|r| r.is_error && r.content == CaptureError::Unavailable.to_string()));
        assert_eq!(controller.status(), TurnStatus::Idle);
    }

    // -----------------------------------------------------------------------
    // Clear / preferences / loading
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn clear_history_keeps_status_and_preferences() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());
        h.controller.update_preferences(Preferences {
            user_name: "Rafi".into(),
            ..Preferences::default()
        });
        h.controller.submit_text("hello").await;
        assert_eq!(h.controller.status(), TurnStatus::Speaking);

        h.controller.clear_history();

        assert!(h.controller.transcript().is_empty());
        assert!(h.store.get_history().is_empty());
        assert_eq!(h.controller.status(), TurnStatus::Speaking);
        assert_eq!(h.controller.preferences().user_name, "Rafi");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_during_processing_discards_reply() {
        let h = harness(
            ScriptedModel::with(vec![(5_000, Ok(ModelReply::text("stale")))]),
            ScriptedVoice::default(),
        );
        let controller = h.controller.clone();
        let turn = tokio::spawn(async move { controller.submit_text("hello").await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.controller.status(), TurnStatus::Processing);

        h.controller.clear_history();
        turn.await.unwrap();

        assert!(h.controller.transcript().is_empty());
        assert!(h.store.get_history().is_empty());
        assert_eq!(h.controller.status(), TurnStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn update_preferences_persists() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());
        let prefs = Preferences {
            voice_enabled: true,
            theme: "crimson".into(),
            ..Preferences::default()
        };

        h.controller.update_preferences(prefs.clone());

        assert_eq!(h.controller.preferences(), prefs);
        assert_eq!(h.store.get_preferences(), prefs);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_and_timestamps_continue_after_loaded_history() {
        let store = Arc::new(KvPreferenceStore::new(MemoryBackend::new()));
        let future = Utc::now() + chrono::Duration::hours(1);
        store.save_history(&[
            ConversationRecord::user(RecordId(1), "a", future),
            ConversationRecord::model(RecordId(3), "b", Vec::new(), future),
        ]);
        let h = harness_with_store(store, ScriptedModel::default(), ScriptedVoice::default());

        h.controller.submit_text("c").await;

        let transcript = h.controller.transcript();
        let ids: Vec<RecordId> = transcript.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(3), RecordId(4), RecordId(5)]);
        assert!(transcript
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_loaded_ids_are_renumbered() {
        let store = Arc::new(KvPreferenceStore::new(MemoryBackend::new()));
        let now = Utc::now();
        store.save_history(&[
            ConversationRecord::user(RecordId(7), "a", now),
            ConversationRecord::model(RecordId(u64::MAX), "b", Vec::new(), now),
        ]);
        let h = harness_with_store(store, ScriptedModel::default(), ScriptedVoice::default());

        h.controller.submit_text("c").await;

        let ids: Vec<RecordId> = h.controller.transcript().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(2), RecordId(3), RecordId(4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_sends_current_snapshot_first() {
        let h = harness(ScriptedModel::default(), ScriptedVoice::default());
        let mut rx = h.controller.subscribe();

        let first = rx.try_recv().unwrap();
        assert_eq!(first, h.controller.snapshot());
        assert_eq!(first.status, TurnStatus::Idle);
    }
}
