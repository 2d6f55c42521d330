//! Conversation session management.
//!
//! A [`ChatSession`] owns the message log, the loading flag and the session
//! identifier of one conversation.  It exposes two mutating operations,
//! [`ChatSession::send_message`] and [`ChatSession::clear_messages`], and
//! reports user-visible events to a [`Notifier`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;

use crate::client::ChatTransport;
use crate::observability::{EXCHANGE_FAILURES, SESSION_CLEARS, SESSION_MESSAGES};
use crate::types::{ChatRequest, Message, MessageId, Notification};

/// Assistant text appended in place of a reply when an exchange fails.
pub const PLACEHOLDER_REPLY: &str =
    "Sorry, I'm having trouble connecting to the server. Please try again later.";

const SESSION_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SESSION_ID_HALF_LEN: usize = 13;

/// Receives the transient notices a session raises.
///
/// Delivery is fire-and-forget: the session never waits on, or learns the
/// fate of, a notification.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, notification: Notification);
}

/// A notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _: Notification) {}
}

impl Notifier for UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // A closed receiver means nobody is displaying notices any more.
        let _ = self.send(notification);
    }
}

/// Generate an opaque identifier for a new session.
///
/// The result is 26 lowercase base-36 characters.  It is unique enough to
/// keep concurrently running clients apart but is not meant to be
/// unguessable.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..2 * SESSION_ID_HALF_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

/// Point-in-time summary of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The session identifier.
    pub session_id: String,
    /// The number of messages in the log.
    pub message_count: usize,
    /// Exchanges started since the session was created.
    pub total_exchanges: u64,
    /// Exchanges that ended in the placeholder reply.
    pub failed_exchanges: u64,
    /// Whether an exchange is currently in flight.
    pub loading: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<Message>,
    last_id: Option<MessageId>,
    in_flight: usize,
    total_exchanges: u64,
    failed_exchanges: u64,
}

impl SessionState {
    fn append(&mut self, is_user: bool, content: impl Into<String>) {
        let now = OffsetDateTime::now_utc();
        let id = MessageId::next(self.last_id, now);
        self.last_id = Some(id);
        let message = if is_user {
            Message::user(id, content, now)
        } else {
            Message::assistant(id, content, now)
        };
        self.messages.push(message);
        SESSION_MESSAGES.click();
    }
}

/// A chat session that manages conversation state and exchanges.
///
/// All state lives behind a mutex that is never held across an `.await`, so
/// a session can be shared (e.g. in an `Arc`) and several
/// [`send_message`](Self::send_message) calls may overlap.  Nothing prevents
/// that; callers that want one exchange at a time should check
/// [`is_loading`](Self::is_loading) before submitting.
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    notifier: Arc<dyn Notifier>,
    session_id: String,
    state: Mutex<SessionState>,
}

impl<T: ChatTransport> ChatSession<T> {
    /// Creates a new session over `transport` with a fresh identifier.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            notifier: Arc::new(SilentNotifier),
            session_id: generate_session_id(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Routes notifications to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Submits a user message and waits for the assistant's turn.
    ///
    /// The user message is appended immediately.  Exactly one assistant
    /// message follows once the exchange resolves: the reply text on
    /// success, or [`PLACEHOLDER_REPLY`] together with a connection-error
    /// notification on any failure.  Failures never propagate to the caller
    /// and the user message is never removed.
    ///
    /// Callers are expected to reject empty or whitespace-only input before
    /// calling this.
    ///
    /// Dropping the returned future abandons the exchange: no assistant
    /// message is appended and the loading flag is released.
    pub async fn send_message(&self, content: &str) {
        let request = {
            let mut state = self.state();
            state.append(true, content);
            state.in_flight += 1;
            state.total_exchanges += 1;
            ChatRequest::new(content, self.session_id.as_str())
        };
        let _in_flight = InFlight { state: &self.state };

        tracing::debug!(session_id = %self.session_id, "sending chat message");
        match self.transport.exchange(&request).await {
            Ok(reply) => {
                let text = reply.text();
                tracing::debug!(session_id = %self.session_id, len = text.len(), "received reply");
                self.state().append(false, text);
            }
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "chat exchange failed");
                EXCHANGE_FAILURES.click();
                self.notifier.notify(Notification::connection_error());
                let mut state = self.state();
                state.failed_exchanges += 1;
                state.append(false, PLACEHOLDER_REPLY);
            }
        }
    }

    /// Empties the message log.
    ///
    /// The session identifier and loading flag are untouched.  A
    /// confirmation notification is raised even when the log was already
    /// empty.
    pub fn clear_messages(&self) {
        let cleared = {
            let mut state = self.state();
            let cleared = state.messages.len();
            state.messages = Vec::new();
            cleared
        };
        SESSION_CLEARS.click();
        tracing::info!(session_id = %self.session_id, cleared, "chat cleared");
        self.notifier.notify(Notification::chat_cleared());
    }

    /// Returns a snapshot of the message log, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// Returns the messages from index `start` onwards.
    ///
    /// Handy for presenting only what is new since the last render.
    pub fn messages_since(&self, start: usize) -> Vec<Message> {
        self.state()
            .messages
            .get(start..)
            .map(<[Message]>::to_vec)
            .unwrap_or_default()
    }

    /// Returns the number of messages in the log.
    pub fn message_count(&self) -> usize {
        self.state().messages.len()
    }

    /// Returns true while at least one exchange is in flight.
    pub fn is_loading(&self) -> bool {
        self.state().in_flight > 0
    }

    /// Returns the session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let state = self.state();
        SessionStats {
            session_id: self.session_id.clone(),
            message_count: state.messages.len(),
            total_exchanges: state.total_exchanges,
            failed_exchanges: state.failed_exchanges,
            loading: state.in_flight > 0,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // The state is consistent after every statement, so a poisoned lock is
    // still safe to use.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the loading flag up for one exchange.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::error::{Error, Result};
    use crate::types::{ChatReply, NotificationKind};

    /// Replays canned outcomes in order and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<ChatReply>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: impl IntoIterator<Item = Result<ChatReply>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::connection("script exhausted", None)))
        }
    }

    /// Holds each exchange open until the test releases it by query text.
    #[derive(Default)]
    struct GatedTransport {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<ChatReply>>>>,
    }

    impl GatedTransport {
        fn gate(&self, query: &str) -> oneshot::Sender<Result<ChatReply>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(query.to_string(), rx);
            tx
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for GatedTransport {
        async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply> {
            let rx = self.gates.lock().unwrap().remove(&request.user_query);
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(Error::connection("gate dropped", None))),
                None => Err(Error::connection("no gate", None)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn seen(&self) -> Vec<Notification> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    fn text(s: &str) -> Result<ChatReply> {
        Ok(ChatReply::Text(s.to_string()))
    }

    fn structured(value: serde_json::Value) -> Result<ChatReply> {
        ChatReply::from_value(value)
    }

    fn session_with<T: ChatTransport>(transport: T) -> (ChatSession<T>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let session = ChatSession::new(transport).with_notifier(notifier.clone());
        (session, notifier)
    }

    #[test]
    fn new_session_empty() {
        let session = ChatSession::new(ScriptedTransport::default());
        assert_eq!(session.message_count(), 0);
        assert!(session.messages().is_empty());
        assert!(!session.is_loading());
    }

    #[test]
    fn session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), 26);
        assert!(id.bytes().all(|b| SESSION_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn session_id_stable_within_session() {
        let session = ChatSession::new(ScriptedTransport::default());
        let first = session.session_id().to_string();
        assert_eq!(session.session_id(), first);
        session.clear_messages();
        assert_eq!(session.session_id(), first);
    }

    #[test]
    fn session_ids_differ_across_sessions() {
        let a = ChatSession::new(ScriptedTransport::default());
        let b = ChatSession::new(ScriptedTransport::default());
        assert_ne!(a.session_id(), b.session_id());
    }

    #[tokio::test]
    async fn successful_exchange_appends_reply() {
        let (session, notifier) = session_with(ScriptedTransport::new([structured(
            serde_json::json!({"output": "hello"}),
        )]));

        session.send_message("Hi there").await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].content, "Hi there");
        assert!(!messages[1].is_user);
        assert_eq!(messages[1].content, "hello");
        assert!(messages[0].id < messages[1].id);
        assert!(messages[0].timestamp <= messages[1].timestamp);
        assert!(!session.is_loading());
        assert!(notifier.seen().is_empty());
    }

    #[tokio::test]
    async fn request_carries_query_and_session() {
        let transport = ScriptedTransport::new([text("ok"), text("ok")]);
        let session = ChatSession::new(transport);

        session.send_message("first").await;
        session.send_message("second").await;

        let requests = session.transport.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                ChatRequest::new("first", session.session_id()),
                ChatRequest::new("second", session.session_id()),
            ]
        );
    }

    #[tokio::test]
    async fn content_is_sent_verbatim() {
        let session = ChatSession::new(ScriptedTransport::new([text("ok")]));
        session.send_message("  padded\n").await;
        assert_eq!(session.messages()[0].content, "  padded\n");
        let requests = session.transport.requests.lock().unwrap().clone();
        assert_eq!(requests[0].user_query, "  padded\n");
    }

    #[tokio::test]
    async fn reply_fallback_chain() {
        let (session, _) = session_with(ScriptedTransport::new([
            structured(serde_json::json!({"response": "hi"})),
            structured(serde_json::json!({"message": "yo"})),
            text("ok"),
            structured(serde_json::json!({"foo": "bar"})),
        ]));

        for query in ["a", "b", "c", "d"] {
            session.send_message(query).await;
        }

        let replies: Vec<String> = session
            .messages()
            .into_iter()
            .filter(|m| !m.is_user)
            .map(|m| m.content)
            .collect();
        assert_eq!(replies, vec!["hi", "yo", "ok", r#"{"foo":"bar"}"#]);
    }

    #[tokio::test]
    async fn protocol_failure_appends_placeholder() {
        let (session, notifier) =
            session_with(ScriptedTransport::new([Err(Error::api(500, "boom"))]));

        session.send_message("Hello").await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].content, "Hello");
        let last = messages.last().unwrap();
        assert!(!last.is_user);
        assert_eq!(last.content, PLACEHOLDER_REPLY);

        let seen = notifier.seen();
        assert_eq!(seen, vec![Notification::connection_error()]);
        assert_eq!(seen[0].kind, NotificationKind::Destructive);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn transport_failure_matches_protocol_failure() {
        let (session, notifier) = session_with(ScriptedTransport::new([Err(
            Error::connection("refused", None),
        )]));

        session.send_message("Hello").await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, PLACEHOLDER_REPLY);
        assert!(!messages[1].is_user);
        assert_eq!(notifier.seen(), vec![Notification::connection_error()]);
    }

    #[tokio::test]
    async fn decode_failure_matches_protocol_failure() {
        let (session, notifier) =
            session_with(ScriptedTransport::new([ChatReply::from_slice(b"null")]));

        session.send_message("Hello").await;

        assert_eq!(session.messages()[1].content, PLACEHOLDER_REPLY);
        assert_eq!(notifier.seen().len(), 1);
    }

    #[tokio::test]
    async fn error_details_never_reach_the_log() {
        let (session, _) = session_with(ScriptedTransport::new([Err(Error::api(
            502,
            "secret upstream detail",
        ))]));

        session.send_message("Hello").await;

        assert!(
            session
                .messages()
                .iter()
                .all(|m| !m.content.contains("secret"))
        );
    }

    #[tokio::test]
    async fn session_usable_after_failure() {
        let (session, notifier) = session_with(ScriptedTransport::new([
            Err(Error::timeout("slow", None)),
            text("back online"),
        ]));

        session.send_message("one").await;
        session.send_message("two").await;

        let contents: Vec<String> = session.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(
            contents,
            vec!["one", PLACEHOLDER_REPLY, "two", "back online"]
        );
        assert_eq!(notifier.seen().len(), 1);

        let stats = session.stats();
        assert_eq!(stats.total_exchanges, 2);
        assert_eq!(stats.failed_exchanges, 1);
        assert_eq!(stats.message_count, 4);
        assert!(!stats.loading);
    }

    #[tokio::test]
    async fn user_message_visible_while_loading() {
        let transport = GatedTransport::default();
        let gate = transport.gate("Hello");
        let session = ChatSession::new(transport);

        let driver = async {
            while session.message_count() == 0 {
                tokio::task::yield_now().await;
            }
            assert_eq!(session.message_count(), 1);
            assert!(session.messages()[0].is_user);
            assert!(session.is_loading());
            gate.send(text("Hi!")).unwrap();
        };
        tokio::join!(session.send_message("Hello"), driver);

        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages()[1].content, "Hi!");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn overlapping_sends_append_replies_as_they_resolve() {
        let transport = GatedTransport::default();
        let first = transport.gate("first");
        let second = transport.gate("second");
        let session = ChatSession::new(transport);

        let driver = async {
            while session.message_count() < 2 {
                tokio::task::yield_now().await;
            }
            second.send(text("second reply")).unwrap();
            while session.message_count() < 3 {
                tokio::task::yield_now().await;
            }
            // One exchange is still open.
            assert!(session.is_loading());
            first.send(text("first reply")).unwrap();
        };
        tokio::join!(
            session.send_message("first"),
            session.send_message("second"),
            driver
        );

        let contents: Vec<String> = session.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(
            contents,
            vec!["first", "second", "second reply", "first reply"]
        );
        assert!(!session.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_exchange_releases_loading() {
        let transport = GatedTransport::default();
        let _gate = transport.gate("Hello");
        let (session, notifier) = session_with(transport);

        let outcome =
            tokio::time::timeout(Duration::from_secs(1), session.send_message("Hello")).await;
        assert!(outcome.is_err());

        assert_eq!(session.message_count(), 1);
        assert!(session.messages()[0].is_user);
        assert!(!session.is_loading());
        assert!(notifier.seen().is_empty());
    }

    #[tokio::test]
    async fn clear_after_sends() {
        let (session, notifier) = session_with(ScriptedTransport::new([text("a"), text("b")]));
        let session_id = session.session_id().to_string();

        session.send_message("one").await;
        session.send_message("two").await;
        assert_eq!(session.message_count(), 4);

        session.clear_messages();

        assert_eq!(session.message_count(), 0);
        assert_eq!(session.session_id(), session_id);
        assert!(!session.is_loading());
        assert_eq!(notifier.seen(), vec![Notification::chat_cleared()]);
    }

    #[test]
    fn clear_empty_still_notifies() {
        let (session, notifier) = session_with(ScriptedTransport::default());

        session.clear_messages();
        session.clear_messages();

        assert_eq!(session.message_count(), 0);
        assert_eq!(
            notifier.seen(),
            vec![Notification::chat_cleared(), Notification::chat_cleared()]
        );
    }

    #[tokio::test]
    async fn clear_while_loading_keeps_pending_reply() {
        let transport = GatedTransport::default();
        let gate = transport.gate("Hello");
        let (session, notifier) = session_with(transport);
        let session_id = session.session_id().to_string();

        let driver = async {
            while session.message_count() == 0 {
                tokio::task::yield_now().await;
            }
            session.clear_messages();
            assert!(session.is_loading());
            assert_eq!(session.message_count(), 0);
            assert_eq!(session.session_id(), session_id);
            gate.send(text("late")).unwrap();
        };
        tokio::join!(session.send_message("Hello"), driver);

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "late");
        assert!(!messages[0].is_user);
        assert!(!session.is_loading());
        assert_eq!(notifier.seen(), vec![Notification::chat_cleared()]);
    }

    #[tokio::test]
    async fn ids_keep_increasing_across_clear() {
        let session = ChatSession::new(ScriptedTransport::new([text("a"), text("b")]));

        session.send_message("one").await;
        let before = session.messages().last().unwrap().id;
        session.clear_messages();
        session.send_message("two").await;

        let after = session.messages();
        assert!(after[0].id > before);
        assert!(after[0].id < after[1].id);
    }

    #[tokio::test]
    async fn messages_since() {
        let session = ChatSession::new(ScriptedTransport::new([text("a")]));
        session.send_message("one").await;

        assert_eq!(session.messages_since(0).len(), 2);
        assert_eq!(session.messages_since(1)[0].content, "a");
        assert!(session.messages_since(2).is_empty());
        assert!(session.messages_since(9).is_empty());
    }

    #[tokio::test]
    async fn channel_notifier_delivers() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Notification>();
        let session = ChatSession::new(ScriptedTransport::new([Err(Error::api(503, ""))]))
            .with_notifier(Arc::new(tx));

        session.send_message("Hello").await;
        session.clear_messages();

        assert_eq!(rx.recv().await, Some(Notification::connection_error()));
        assert_eq!(rx.recv().await, Some(Notification::chat_cleared()));
    }
}
