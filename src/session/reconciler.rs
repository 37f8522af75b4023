use crate::llm::{ChunkDecoder, CompanionError, ConversationTurn, Result, Speaker};
use crate::session::accumulator::{AnalysisResult, MessageAccumulator};
use crate::session::markers::{HighlightRange, HighlightTracker};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a finished reply is folded into the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Merge into a trailing assistant turn, or start one
    Chat,
    /// Always append a new assistant turn with the whole reply
    OneShot,
    /// Leave the conversation untouched
    Detached,
}

impl ReconcileMode {
    /// Highlights only come from analysis replies
    pub fn scans_markers(self) -> bool {
        matches!(self, ReconcileMode::OneShot)
    }
}

/// Ordered conversation history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation opened by an assistant greeting
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::assistant(greeting)],
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Fold assistant content into the history according to `mode`
    pub fn reconcile(&mut self, mode: ReconcileMode, content: &str) {
        match mode {
            ReconcileMode::Chat => match self.turns.last_mut() {
                Some(turn) if turn.role == Speaker::Assistant => turn.content.push_str(content),
                // No reply bubble until something arrives
                _ if content.is_empty() => {}
                _ => self.turns.push(ConversationTurn::assistant(content)),
            },
            ReconcileMode::OneShot => self.turns.push(ConversationTurn::assistant(content)),
            ReconcileMode::Detached => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Streaming,
}

/// State of one outstanding streamed request.
///
/// Terminal transitions consume the session, so a finished or failed session
/// can never be fed again.
#[derive(Debug)]
pub struct StreamSession {
    mode: ReconcileMode,
    phase: SessionPhase,
    accumulator: MessageAccumulator,
    highlights: Vec<HighlightRange>,
    tracker: HighlightTracker,
}

/// Everything a finished session produced
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub raw_text: String,
    pub result: AnalysisResult,
    pub highlights: Vec<HighlightRange>,
}

impl StreamSession {
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            phase: SessionPhase::Idle,
            accumulator: MessageAccumulator::new(),
            highlights: Vec::new(),
            tracker: HighlightTracker::new(),
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    pub fn raw_buffer(&self) -> &str {
        self.accumulator.as_str()
    }

    pub fn highlights(&self) -> &[HighlightRange] {
        &self.highlights
    }

    /// Idle → Streaming, once the request has been dispatched
    pub fn begin(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Idle {
            return Err(CompanionError::InvalidState(
                "session has already started".to_string(),
            ));
        }
        self.phase = SessionPhase::Streaming;
        Ok(())
    }

    /// Append a fragment and return highlights that became visible with it
    pub fn push_fragment(&mut self, fragment: &str) -> Result<Vec<HighlightRange>> {
        self.ensure_streaming()?;
        self.accumulator.append(fragment);

        if !self.mode.scans_markers() {
            return Ok(Vec::new());
        }
        let fresh = self.tracker.update(self.accumulator.as_str());
        self.highlights.extend_from_slice(&fresh);
        Ok(fresh)
    }

    /// Release highlights held back at the end of the buffer
    pub fn flush_highlights(&mut self) -> Vec<HighlightRange> {
        if !self.mode.scans_markers() {
            return Vec::new();
        }
        let fresh = self.tracker.flush(self.accumulator.as_str());
        self.highlights.extend_from_slice(&fresh);
        fresh
    }

    /// Streaming → Finished: commit the reply to `conversation`
    pub fn finish(mut self, conversation: &mut Conversation) -> Result<SessionOutcome> {
        self.ensure_streaming()?;
        self.flush_highlights();

        let result = self.accumulator.finish();
        conversation.reconcile(self.mode, self.accumulator.as_str());
        debug!(
            "Session finished ({:?}): {} bytes, {} highlight(s)",
            self.mode,
            self.accumulator.len(),
            self.highlights.len()
        );

        Ok(SessionOutcome {
            raw_text: self.accumulator.into_string(),
            result,
            highlights: self.highlights,
        })
    }

    /// Streaming → Failed: drop the partial reply and hand back the error
    pub fn fail(self, error: CompanionError) -> CompanionError {
        warn!(
            "Session failed after {} bytes, discarding partial reply: {}",
            self.accumulator.len(),
            error
        );
        error
    }

    fn ensure_streaming(&self) -> Result<()> {
        if self.phase != SessionPhase::Streaming {
            return Err(CompanionError::InvalidState(format!(
                "session is {:?}, not streaming",
                self.phase
            )));
        }
        Ok(())
    }
}

/// Progress notifications emitted while a session streams
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Fragment(String),
    Highlight(HighlightRange),
}

pub type SessionCallback = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Consume `decoder` fragment by fragment and reconcile the finished reply.
///
/// Each fragment's effects are applied before the next one is awaited. On a
/// transport error the conversation is left exactly as it was.
pub async fn drive_session(
    mut decoder: ChunkDecoder,
    mode: ReconcileMode,
    conversation: &mut Conversation,
    callback: Option<&SessionCallback>,
) -> Result<SessionOutcome> {
    let mut session = StreamSession::new(mode);
    session.begin()?;

    let notify = |event: SessionEvent| {
        if let Some(callback) = callback {
            callback(&event);
        }
    };

    loop {
        match decoder.next_fragment().await {
            Ok(Some(fragment)) => {
                let fresh = session.push_fragment(&fragment)?;
                notify(SessionEvent::Fragment(fragment));
                for range in fresh {
                    notify(SessionEvent::Highlight(range));
                }
            }
            Ok(None) => break,
            Err(e) => return Err(session.fail(e)),
        }
    }

    for range in session.flush_highlights() {
        notify(SessionEvent::Highlight(range));
    }
    session.finish(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use std::sync::{Arc, Mutex};

    fn decoder_for(fragments: Vec<&'static str>) -> ChunkDecoder {
        ChunkDecoder::new(stream::iter(
            fragments
                .into_iter()
                .map(|f| Ok::<_, std::io::Error>(Bytes::from_static(f.as_bytes()))),
        ))
    }

    fn failing_decoder(fragments: Vec<&'static str>) -> ChunkDecoder {
        let mut items: Vec<std::result::Result<Bytes, std::io::Error>> = fragments
            .into_iter()
            .map(|f| Ok(Bytes::from_static(f.as_bytes())))
            .collect();
        items.push(Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "stream closed early",
        )));
        ChunkDecoder::new(stream::iter(items))
    }

    fn collector() -> (SessionCallback, Arc<Mutex<Vec<SessionEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: SessionCallback = Box::new(move |event: &SessionEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        (callback, events)
    }

    #[test]
    fn test_chat_fragments_build_single_turn() {
        let mut conversation = Conversation::with_greeting("Hello!");
        conversation.push(ConversationTurn::user("hi"));

        for fragment in ["Sure", ", here", " you go"] {
            conversation.reconcile(ReconcileMode::Chat, fragment);
        }

        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.last(),
            Some(&ConversationTurn::assistant("Sure, here you go"))
        );
    }

    #[test]
    fn test_one_shot_appends_after_assistant_turn() {
        let mut conversation = Conversation::with_greeting("Hello!");
        conversation.reconcile(ReconcileMode::OneShot, "analysis");
        conversation.reconcile(ReconcileMode::OneShot, "another");

        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.turns()[1].content, "analysis");
        assert_eq!(conversation.turns()[2].content, "another");
    }

    #[tokio::test]
    async fn test_empty_chat_reply_adds_no_turn() {
        let mut conversation = Conversation::with_greeting("Hello!");
        conversation.push(ConversationTurn::user("hi"));
        let before = conversation.clone();

        let outcome = drive_session(
            decoder_for(vec![]),
            ReconcileMode::Chat,
            &mut conversation,
            None,
        )
        .await
        .unwrap();

        assert!(outcome.raw_text.is_empty());
        assert_eq!(conversation, before);
    }

    #[test]
    fn test_detached_leaves_conversation_alone() {
        let mut conversation = Conversation::with_greeting("Hello!");
        conversation.reconcile(ReconcileMode::Detached, "output");
        assert_eq!(conversation, Conversation::with_greeting("Hello!"));
    }

    #[test]
    fn test_session_rejects_fragments_before_begin() {
        let mut session = StreamSession::new(ReconcileMode::Chat);
        assert!(!session.is_active());
        assert!(matches!(
            session.push_fragment("early"),
            Err(CompanionError::InvalidState(_))
        ));
        session.begin().unwrap();
        assert!(session.is_active());
        assert!(session.begin().is_err());
    }

    #[tokio::test]
    async fn test_chat_session_merges_reply() {
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::system("be nice"));
        conversation.push(ConversationTurn::user("hi"));

        let outcome = drive_session(
            decoder_for(vec!["Hel", "lo ", "there"]),
            ReconcileMode::Chat,
            &mut conversation,
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome.raw_text, "Hello there");
        assert!(outcome.highlights.is_empty());
        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.last(),
            Some(&ConversationTurn::assistant("Hello there"))
        );
    }

    #[tokio::test]
    async fn test_chat_mode_ignores_markers() {
        let mut conversation = Conversation::new();
        let outcome = drive_session(
            decoder_for(vec!["START_POS: 1\nEND_POS: 2\n"]),
            ReconcileMode::Chat,
            &mut conversation,
            None,
        )
        .await
        .unwrap();
        assert!(outcome.highlights.is_empty());
    }

    #[tokio::test]
    async fn test_one_shot_session_reports_highlights_and_result() {
        let mut conversation = Conversation::with_greeting("Hello!");
        let (callback, events) = collector();

        let outcome = drive_session(
            decoder_for(vec![
                "Error Analysis:\n❌ [Line 1] typo\nSTART_POS: ",
                "3\nEND_POS: 1",
                "2\n\nCORRECTED CODE:\nlet x = 1;",
            ]),
            ReconcileMode::OneShot,
            &mut conversation,
            Some(&callback),
        )
        .await
        .unwrap();

        let range = HighlightRange { start: 3, end: 12 };
        assert_eq!(outcome.highlights, vec![range]);
        assert_eq!(outcome.result.corrected_code.as_deref(), Some("let x = 1;"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().content, outcome.raw_text);

        let events = events.lock().unwrap();
        let highlight_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Highlight(_)))
            .collect();
        assert_eq!(highlight_events, vec![&SessionEvent::Highlight(range)]);
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Fragment(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, outcome.raw_text);
    }

    #[tokio::test]
    async fn test_failed_session_commits_nothing() {
        let mut conversation = Conversation::with_greeting("Hello!");
        conversation.push(ConversationTurn::user("hi"));
        let before = conversation.clone();

        let err = drive_session(
            failing_decoder(vec!["partial ", "reply"]),
            ReconcileMode::Chat,
            &mut conversation,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CompanionError::Transport(_)));
        assert_eq!(conversation, before);
    }
}
