//! Streamed reply processing: marker scanning, accumulation and
//! reconciliation into the conversation history.

pub mod accumulator;
pub mod markers;
pub mod reconciler;

pub use accumulator::{apply_fix, parse_streamed_analysis, AnalysisResult, MessageAccumulator};
pub use markers::{HighlightRange, HighlightTracker};
pub use reconciler::{
    drive_session, Conversation, ReconcileMode, SessionCallback, SessionEvent, SessionOutcome,
    SessionPhase, StreamSession,
};
