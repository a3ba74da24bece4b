use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::provider::CompletionProvider;
use crate::settings::Settings;
use crate::transcript::{ChatMessage, Draft, Transcript};

/// Reply shown when a send fails for any reason. The underlying error goes
/// to the log, not the transcript.
pub const ERROR_REPLY: &str = "Error fetching data from the API";

/// Result of one send, delivered back to the event loop by the task that
/// ran the provider call. `seq` identifies the send for logging; outcomes
/// are applied in whatever order they arrive.
#[derive(Debug)]
pub struct SendOutcome {
    pub seq: u64,
    pub result: Result<String>,
}

/// One chat session: the transcript, the draft being typed, and the
/// machinery for running sends against the provider.
///
/// Each submit spawns its own task, so several sends can be in flight at
/// once. The user message is appended before the task starts; the reply
/// (or [`ERROR_REPLY`]) is appended when the outcome is applied.
pub struct ChatSession {
    transcript: Transcript,
    pub draft: Draft,
    provider: Arc<dyn CompletionProvider>,
    outcome_tx: mpsc::UnboundedSender<SendOutcome>,
    next_seq: u64,
    in_flight: usize,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        outcome_tx: mpsc::UnboundedSender<SendOutcome>,
    ) -> Self {
        Self {
            transcript: Transcript::new(),
            draft: Draft::default(),
            provider,
            outcome_tx,
            next_seq: 0,
            in_flight: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight > 0
    }

    /// Submit the current draft. A draft that is empty or only whitespace
    /// is left untouched and nothing is sent. Otherwise the draft text is
    /// appended to the transcript as-is, the draft is cleared, and a task
    /// is spawned to fetch the reply. Returns whether a send started.
    pub fn submit(&mut self, settings: &Settings) -> bool {
        if self.draft.is_blank() {
            return false;
        }

        let text = self.draft.take();
        self.transcript.append(ChatMessage::user(text.clone()));

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight += 1;
        tracing::info!("send {} started ({} chars)", seq, text.chars().count());

        let provider = Arc::clone(&self.provider);
        let settings = settings.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = provider.complete(&settings, &text).await;
            // The receiver only goes away on shutdown
            let _ = tx.send(SendOutcome { seq, result });
        });
        true
    }

    /// Append the reply for a finished send. Failures all surface as the
    /// same fixed reply text; the cause is logged.
    pub fn apply_outcome(&mut self, outcome: SendOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome.result {
            Ok(reply) => {
                tracing::info!(
                    "send {} completed ({} chars)",
                    outcome.seq,
                    reply.chars().count()
                );
                self.transcript.append(ChatMessage::assistant(reply));
            }
            Err(err) => {
                tracing::error!("send {} failed: {:#}", outcome.seq, err);
                self.transcript.append(ChatMessage::assistant(ERROR_REPLY));
            }
        }
    }

    /// Empty the transcript. Sends already in flight are not cancelled;
    /// their replies will land in the now-empty transcript.
    pub fn clear_chat(&mut self) {
        tracing::debug!("chat cleared ({} messages dropped)", self.transcript.len());
        self.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::provider::MockProvider;
    use crate::transcript::ChatRole;

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _settings: &Settings, _user_text: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    /// Provider whose replies are held until the test releases them, keyed
    /// by the prompt text so resolution order is under test control.
    struct GatedProvider {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<String>>>>,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                gates: Mutex::new(HashMap::new()),
            }
        }

        fn gate(&self, prompt: &str) -> oneshot::Sender<Result<String>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(prompt.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl CompletionProvider for GatedProvider {
        async fn complete(&self, _settings: &Settings, user_text: &str) -> Result<String> {
            let gate = {
                let mut gates = self.gates.lock().unwrap();
                gates
                    .remove(user_text)
                    .unwrap_or_else(|| panic!("no gate for prompt {:?}", user_text))
            };
            gate.await?
        }
    }

    fn session_with(
        provider: Arc<dyn CompletionProvider>,
    ) -> (ChatSession, mpsc::UnboundedReceiver<SendOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatSession::new(provider, tx), rx)
    }

    fn type_draft(session: &mut ChatSession, text: &str) {
        for c in text.chars() {
            session.draft.insert_char(c);
        }
    }

    #[tokio::test]
    async fn test_blank_draft_is_not_sent() {
        let (mut session, mut rx) = session_with(Arc::new(MockProvider::new()));
        type_draft(&mut session, "   ");

        assert!(!session.submit(&Settings::default()));
        assert!(session.messages().is_empty());
        assert!(!session.is_waiting());
        // The whitespace draft stays put
        assert_eq!(session.draft.text(), "   ");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_appends_user_message_and_clears_draft() {
        let (mut session, _rx) = session_with(Arc::new(MockProvider::new()));
        type_draft(&mut session, "  hello  ");

        assert!(session.submit(&Settings::default()));

        // Appended before the provider has had any chance to run, with
        // surrounding whitespace kept
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, ChatRole::User);
        assert_eq!(session.messages()[0].content, "  hello  ");
        assert_eq!(session.draft.text(), "");
        assert!(session.is_waiting());
    }

    #[tokio::test]
    async fn test_reply_is_appended_after_user_message() {
        let (mut session, mut rx) = session_with(Arc::new(MockProvider::with_reply("Hi there")));
        type_draft(&mut session, "hello");
        session.submit(&Settings::default());

        let outcome = rx.recv().await.unwrap();
        session.apply_outcome(outcome);

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "Hi there");
        assert!(!session.is_waiting());
    }

    #[tokio::test]
    async fn test_failed_send_appends_error_reply() {
        let (mut session, mut rx) = session_with(Arc::new(FailingProvider));
        type_draft(&mut session, "hello");
        session.submit(&Settings::default());

        let outcome = rx.recv().await.unwrap();
        assert!(outcome.result.is_err());
        session.apply_outcome(outcome);

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_clear_chat_empties_transcript() {
        let (mut session, mut rx) = session_with(Arc::new(MockProvider::new()));
        type_draft(&mut session, "hello");
        session.submit(&Settings::default());
        let outcome = rx.recv().await.unwrap();
        session.apply_outcome(outcome);
        assert_eq!(session.messages().len(), 2);

        session.clear_chat();
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_sends_append_in_resolution_order() {
        let provider = Arc::new(GatedProvider::new());
        let first_gate = provider.gate("first");
        let second_gate = provider.gate("second");
        let (mut session, mut rx) = session_with(provider);
        let settings = Settings::default();

        type_draft(&mut session, "first");
        session.submit(&settings);
        type_draft(&mut session, "second");
        session.submit(&settings);

        assert_eq!(session.messages().len(), 2);
        assert!(session.is_waiting());

        // Release the second send before the first
        second_gate.send(Ok("reply two".to_string())).unwrap();
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.seq, 1);
        session.apply_outcome(outcome);

        first_gate.send(Ok("reply one".to_string())).unwrap();
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.seq, 0);
        session.apply_outcome(outcome);

        let contents: Vec<&str> = session
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["first", "second", "reply two", "reply one"]);

        let assistants = session
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .count();
        assert_eq!(assistants, 2);
        assert!(!session.is_waiting());
    }

    #[tokio::test]
    async fn test_reply_after_clear_lands_in_empty_transcript() {
        let provider = Arc::new(GatedProvider::new());
        let gate = provider.gate("hello");
        let (mut session, mut rx) = session_with(provider);

        type_draft(&mut session, "hello");
        session.submit(&Settings::default());
        session.clear_chat();
        assert!(session.messages().is_empty());

        gate.send(Ok("late reply".to_string())).unwrap();
        let outcome = rx.recv().await.unwrap();
        session.apply_outcome(outcome);

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "late reply");
    }
}
