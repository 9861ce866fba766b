//! The session manager: owns the chat-session collection, orders every
//! exchange, and reconciles replies (real or degraded) into the record.
//!
//! All mutation of sessions funnels through this type. The presentation
//! layer holds read-only snapshots and re-fetches after every mutating call;
//! a [`subscribe`](SessionManager::subscribe) watch channel tells it when.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::RequestParameters;
use crate::core::message::ChatMessage;
use crate::core::params::ModelParameters;
use crate::core::session::{ChatSession, IdSource};
use crate::generation::{ExchangeRequest, GenerationBackend, GenerationError};
use crate::persistence::HistoryStore;

/// Shown in place of generated text when the request never produced a
/// readable response. The only reply content synthesized here rather than
/// derived from the provider exchange.
pub const NETWORK_ERROR_REPLY: &str =
    "Sorry, I encountered a network error. Please check your connection and try again.";

/// Per-session exchange lifecycle: `Idle -> AwaitingResponse -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// What [`SessionManager::submit`] did with the input.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// User message appended and persisted; the caller must now run the
    /// request and feed the result to [`SessionManager::complete`].
    Started(ExchangeRequest),
    /// The session already has an exchange awaiting its response.
    Busy,
    /// Empty input or unknown session; nothing happened.
    Ignored,
}

/// Field-wise patch for [`SessionManager::update_session`]. `None` leaves
/// the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub model: Option<String>,
    pub parameters: Option<ModelParameters>,
}

pub struct SessionManager {
    sessions: Vec<ChatSession>,
    exchanges: HashMap<String, ExchangeState>,
    active: Option<String>,
    ids: IdSource,
    store: HistoryStore,
    revision: watch::Sender<u64>,
}

impl SessionManager {
    /// Manager hydrated from the durable store. Corrupt or missing history
    /// yields an empty collection; the most recent session becomes active.
    pub fn hydrate(store: HistoryStore) -> Self {
        let sessions = store.load_sessions();
        debug!(count = sessions.len(), "hydrated session collection");
        let active = sessions.first().map(|s| s.id.clone());
        let (revision, _) = watch::channel(0);
        SessionManager {
            sessions,
            exchanges: HashMap::new(),
            active,
            ids: IdSource::new(),
            store,
            revision,
        }
    }

    /// Allocate a new empty session, prepend it to the collection, persist,
    /// and make it active.
    pub fn create_session(&mut self, model: &str, parameters: ModelParameters) -> &ChatSession {
        let now = Utc::now();
        let id = self.ids.next(now);
        let session = ChatSession::new(id.clone(), model, parameters, now);
        self.sessions.insert(0, session);
        self.active = Some(id);
        self.persist();
        self.notify();
        &self.sessions[0]
    }

    /// Start one exchange: append the user message, persist, and hand back
    /// the request for the caller to run.
    ///
    /// The append and persist happen before the outbound call is issued, so
    /// a restart after this point never loses the user's sent text even if
    /// the reply never arrives.
    pub fn submit(&mut self, session_id: &str, user_text: &str) -> SubmitOutcome {
        if user_text.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.is_awaiting(session_id) {
            return SubmitOutcome::Busy;
        }
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return SubmitOutcome::Ignored;
        };

        let now = Utc::now();
        let message_id = self.ids.next(now);
        session
            .messages
            .push(ChatMessage::user(message_id, user_text, now));
        session.touch(now);

        let request = ExchangeRequest {
            session_id: session.id.clone(),
            message: user_text.to_string(),
            model: session.model.clone(),
            parameters: RequestParameters::from(session.parameters),
        };

        self.persist();
        self.exchanges
            .insert(session_id.to_string(), ExchangeState::AwaitingResponse);
        self.notify();
        SubmitOutcome::Started(request)
    }

    /// Finish one exchange: append exactly one assistant message (provider
    /// text, a degraded fallback, or the fixed network apology), persist,
    /// and release the session back to `Idle`.
    ///
    /// The release is unconditional: every path through this function ends
    /// with the exchange state back at `Idle`, so a failed reply can never
    /// leave a session stuck awaiting.
    pub fn complete(&mut self, session_id: &str, reply: Result<String, GenerationError>) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            let content = match &reply {
                Ok(text) => text.clone(),
                Err(error) => session
                    .last_user_text()
                    .and_then(|user_text| error.degraded_reply(user_text))
                    .unwrap_or_else(|| NETWORK_ERROR_REPLY.to_string()),
            };

            let now = Utc::now();
            let message_id = self.ids.next(now);
            let model = session.model.clone();
            let parameters = session.parameters;
            session
                .messages
                .push(ChatMessage::assistant(message_id, content, now, model, parameters));
            session.touch(now);
            self.persist();
        }

        self.exchanges
            .insert(session_id.to_string(), ExchangeState::Idle);
        self.notify();
    }

    /// Merge a patch into the session with the given id; no-op when absent.
    /// Always refreshes `updated_at`.
    pub fn update_session(&mut self, session_id: &str, patch: SessionPatch) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return;
        };

        if let Some(title) = patch.title {
            session.title = title;
        }
        if let Some(model) = patch.model {
            session.model = model;
        }
        if let Some(parameters) = patch.parameters {
            session.parameters = parameters;
        }
        session.touch(Utc::now());
        self.persist();
        self.notify();
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn session(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active
            .as_deref()
            .and_then(|id| self.sessions.iter().find(|s| s.id == id))
    }

    pub fn set_active(&mut self, session_id: &str) -> bool {
        if self.sessions.iter().any(|s| s.id == session_id) {
            self.active = Some(session_id.to_string());
            self.notify();
            true
        } else {
            false
        }
    }

    pub fn exchange_state(&self, session_id: &str) -> ExchangeState {
        self.exchanges
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_awaiting(&self, session_id: &str) -> bool {
        self.exchange_state(session_id) == ExchangeState::AwaitingResponse
    }

    /// Observe mutations: the value increments on every change to the
    /// collection or exchange states.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn persist(&self) {
        if let Err(e) = self.store.save_sessions(&self.sessions) {
            warn!(error = %e, "failed to persist session collection");
        }
    }

    fn notify(&self) {
        let next = *self.revision.borrow() + 1;
        self.revision.send_replace(next);
    }
}

/// Submit, run the backend, and reconcile: the whole exchange in one await.
/// Used by flows without an event loop, like the one-shot CLI.
///
/// Returns `None` when the submission was a no-op, otherwise the backend's
/// raw result (the session record already carries the mapped reply).
pub async fn run_exchange(
    manager: &mut SessionManager,
    backend: &dyn GenerationBackend,
    session_id: &str,
    user_text: &str,
) -> Option<Result<String, GenerationError>> {
    match manager.submit(session_id, user_text) {
        SubmitOutcome::Started(request) => {
            let reply = backend.generate(&request).await;
            manager.complete(session_id, reply.clone());
            Some(reply)
        }
        SubmitOutcome::Busy | SubmitOutcome::Ignored => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::DEFAULT_MODEL_ID;
    use crate::core::message::Role;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CannedBackend(Result<String, GenerationError>);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate(&self, _request: &ExchangeRequest) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn manager() -> (SessionManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = HistoryStore::at(temp_dir.path());
        (SessionManager::hydrate(store), temp_dir)
    }

    fn started(outcome: SubmitOutcome) -> ExchangeRequest {
        match outcome {
            SubmitOutcome::Started(request) => request,
            other => panic!("expected Started, got {:?}", other),
        }
    }

    #[test]
    fn create_session_prepends_and_persists() {
        let (mut mgr, temp_dir) = manager();
        let first = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();
        let second = mgr
            .create_session("gemini-pro", ModelParameters::default())
            .id
            .clone();

        let ids: Vec<_> = mgr.sessions().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, [second.clone(), first]);
        assert_eq!(mgr.active_session_id(), Some(second.as_str()));

        let reloaded = HistoryStore::at(temp_dir.path()).load_sessions();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded[0].messages.is_empty());
    }

    #[test]
    fn submit_appends_the_user_message_before_the_call_is_issued() {
        let (mut mgr, temp_dir) = manager();
        let id = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();

        let request = started(mgr.submit(&id, "Hello"));
        assert_eq!(request.message, "Hello");
        assert_eq!(request.model, DEFAULT_MODEL_ID);

        // Appended and durable before any reply exists.
        let session = mgr.session(&id).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);

        let reloaded = HistoryStore::at(temp_dir.path()).load_sessions();
        assert_eq!(reloaded[0].messages.len(), 1);
        assert_eq!(reloaded[0].messages[0].content, "Hello");
    }

    #[test]
    fn whitespace_only_input_is_ignored() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();

        assert_eq!(mgr.submit(&id, ""), SubmitOutcome::Ignored);
        assert_eq!(mgr.submit(&id, "   \n\t"), SubmitOutcome::Ignored);
        assert!(mgr.session(&id).unwrap().messages.is_empty());
        assert!(!mgr.is_awaiting(&id));
    }

    #[test]
    fn unknown_session_is_ignored() {
        let (mut mgr, _temp_dir) = manager();
        assert_eq!(mgr.submit("nope", "Hello"), SubmitOutcome::Ignored);
    }

    #[test]
    fn second_submit_on_an_awaiting_session_is_refused() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();

        started(mgr.submit(&id, "first"));
        assert_eq!(mgr.submit(&id, "second"), SubmitOutcome::Busy);
        assert_eq!(mgr.session(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn exchange_state_is_per_session_not_global() {
        let (mut mgr, _temp_dir) = manager();
        let first = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();
        let second = mgr
            .create_session(DEFAULT_MODEL_ID, ModelParameters::default())
            .id
            .clone();

        started(mgr.submit(&first, "one"));
        assert!(mgr.is_awaiting(&first));
        assert!(!mgr.is_awaiting(&second));
        started(mgr.submit(&second, "two"));
    }

    #[tokio::test]
    async fn successful_exchange_appends_exactly_one_pair() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();

        let backend = CannedBackend(Ok("Hi there!".to_string()));
        let result = run_exchange(&mut mgr, &backend, &id, "Hello").await;
        assert_eq!(result, Some(Ok("Hi there!".to_string())));

        let session = mgr.session(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "Hello");
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.messages[1].content, "Hi there!");
        assert_eq!(session.messages[1].model.as_deref(), Some("gemini-flash"));
        assert_eq!(
            session.messages[1].parameters,
            Some(ModelParameters::default())
        );
    }

    #[tokio::test]
    async fn network_failure_appends_the_fixed_apology() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();

        let backend = CannedBackend(Err(GenerationError::Network("refused".to_string())));
        run_exchange(&mut mgr, &backend, &id, "Hello").await;

        let session = mgr.session(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, NETWORK_ERROR_REPLY);
    }

    #[tokio::test]
    async fn provider_degradation_appends_the_encouraging_fallback() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();

        let backend = CannedBackend(Err(GenerationError::RateLimited("429".to_string())));
        run_exchange(&mut mgr, &backend, &id, "explain traits").await;

        let session = mgr.session(&id).unwrap();
        let reply = &session.messages[1].content;
        assert!(reply.starts_with("I've reached my daily request limit."));
        assert!(reply.contains("\"explain traits\""));
    }

    #[tokio::test]
    async fn session_returns_to_idle_after_every_exchange() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();

        let failing = CannedBackend(Err(GenerationError::Network("down".to_string())));
        run_exchange(&mut mgr, &failing, &id, "first").await;
        assert_eq!(mgr.exchange_state(&id), ExchangeState::Idle);

        // A subsequent submit on the same session is accepted.
        let ok = CannedBackend(Ok("second reply".to_string()));
        let result = run_exchange(&mut mgr, &ok, &id, "second").await;
        assert!(result.is_some());
        assert_eq!(mgr.session(&id).unwrap().messages.len(), 4);
    }

    #[test]
    fn complete_for_an_unknown_session_still_releases() {
        let (mut mgr, _temp_dir) = manager();
        mgr.complete("ghost", Ok("text".to_string()));
        assert_eq!(mgr.exchange_state("ghost"), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn message_order_and_timestamps_are_monotonic() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();

        let backend = CannedBackend(Ok("reply".to_string()));
        run_exchange(&mut mgr, &backend, &id, "one").await;
        run_exchange(&mut mgr, &backend, &id, "two").await;

        let session = mgr.session(&id).unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "reply", "two", "reply"]);
        for pair in session.messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn update_session_merges_and_refreshes_updated_at() {
        let (mut mgr, _temp_dir) = manager();
        let id = mgr
            .create_session("gemini-flash", ModelParameters::default())
            .id
            .clone();
        let before = mgr.session(&id).unwrap().updated_at;

        mgr.update_session(
            &id,
            SessionPatch {
                title: Some("Traits deep dive".to_string()),
                ..Default::default()
            },
        );

        let session = mgr.session(&id).unwrap();
        assert_eq!(session.title, "Traits deep dive");
        assert_eq!(session.model, "gemini-flash");
        assert!(session.updated_at >= before);

        // Unknown ids are a no-op.
        mgr.update_session("ghost", SessionPatch::default());
    }

    #[test]
    fn hydrate_restores_what_was_saved() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        {
            let mut mgr = SessionManager::hydrate(HistoryStore::at(temp_dir.path()));
            mgr.create_session("gemini-pro", ModelParameters::default());
        }

        let mgr = SessionManager::hydrate(HistoryStore::at(temp_dir.path()));
        assert_eq!(mgr.sessions().len(), 1);
        assert_eq!(mgr.sessions()[0].model, "gemini-pro");
        assert_eq!(mgr.active_session_id(), Some(mgr.sessions()[0].id.as_str()));
    }

    #[test]
    fn mutations_bump_the_revision() {
        let (mut mgr, _temp_dir) = manager();
        let rx = mgr.subscribe();
        let before = *rx.borrow();

        mgr.create_session("gemini-flash", ModelParameters::default());
        assert!(*rx.borrow() > before);
    }
}
