//! User-facing flows: code analysis, mock execution, chat and applying fixes.

use crate::llm::{ChatEndpoint, CompanionError, ConversationTurn, Result};
use crate::persistence::{KeyValueStore, Stats};
use crate::session::{
    apply_fix, drive_session, parse_streamed_analysis, AnalysisResult, Conversation,
    HighlightRange, ReconcileMode, SessionCallback,
};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const GREETING: &str = "Hello! I'm your coding companion. Need help with your code or just want a motivational quote? I'm here to help! 💻✨";

const CHAT_SYSTEM_PROMPT: &str = "You are a friendly coding assistant that provides help with code, debugging, and shares motivational programming quotes. Keep responses concise and helpful. Include emojis occasionally to make the conversation engaging.";

const EXECUTION_SYSTEM_PROMPT: &str = "You are a code execution simulator. Only output exactly what would appear in the console/terminal. No explanations, no markdown, no additional text.";

pub fn analysis_prompt(language: &str, code: &str) -> String {
    format!(
        "Analyze this {language} code and provide corrections. Include the exact character positions of each error.

First provide your analysis in this exact format:
Error Analysis:
[For each error include:
❌ [Line X] Error description
START_POS: <number>
END_POS: <number>
]

Then provide the corrected code without any comments or language markers:
CORRECTED CODE:
[corrected code without any comments or formatting]

Original code:
{code}"
    )
}

pub fn execution_prompt(language: &str, code: &str) -> String {
    format!("Execute this {language} code and show ONLY the console/terminal output:\n\n{code}")
}

/// Loose per-language shape checks, case-insensitive
const LANGUAGE_PATTERNS: &[(&str, &str)] = &[
    ("c", r"(#include|int\s+main|void\s+main)"),
    (
        "python",
        r#"(def\s+|import\s+|print\(|if\s+__name__\s*==\s*('|")__main__('|"))"#,
    ),
    ("java", r"(class\s+|public\s+static|void\s+main)"),
    ("javascript", r"(const|let|var|function|=>)"),
    ("cpp", r"(#include|using\s+namespace|class\s+.*\{)"),
    ("html", r"(<html|<!DOCTYPE|<head|<body)"),
    ("css", r"([.#][a-zA-Z].*\{|\}|@media)"),
    ("php", r"(<\?php|\$[a-zA-Z_])"),
    ("ruby", r"(def\s+|require|puts\s|class\s)"),
    ("swift", r"(import\s+Foundation|var\s+|func\s+|class\s+)"),
    ("kotlin", r"(fun\s+|class\s+|val\s+|var\s+)"),
    ("rust", r"(fn\s+|use\s+|let\s+mut|impl)"),
    ("go", r"(package\s+|func\s+|import\s+)"),
    ("sql", r"(SELECT|INSERT|UPDATE|DELETE|CREATE|DROP)"),
    ("typescript", r"(interface|type|class\s+.*\{)"),
];

fn language_regex(language: &str) -> Option<&'static Regex> {
    static PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            LANGUAGE_PATTERNS
                .iter()
                .map(|(language, pattern)| {
                    let regex = Regex::new(&format!("(?i){pattern}")).expect("valid pattern");
                    (*language, regex)
                })
                .collect()
        })
        .get(language)
}

/// Reject empty input and code that does not look like `language` at all
pub fn validate_code(code: &str, language: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(CompanionError::Validation(
            "Please enter some code first.".to_string(),
        ));
    }
    let Some(regex) = language_regex(language) else {
        return Ok(());
    };
    if !regex.is_match(code) {
        return Err(CompanionError::Validation(format!(
            "This doesn't appear to be valid {language} code. Please check your code or select the correct language."
        )));
    }
    Ok(())
}

/// What an analysis run produced
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub raw_text: String,
    pub result: AnalysisResult,
    pub highlights: Vec<HighlightRange>,
}

/// Owns the conversation and statistics shared by all flows.
///
/// At most one stream runs at a time: every flow borrows the companion
/// mutably for its whole duration.
pub struct Companion {
    endpoint: Box<dyn ChatEndpoint>,
    store: Box<dyn KeyValueStore>,
    conversation: Conversation,
    stats: Stats,
}

impl Companion {
    pub fn new(endpoint: Box<dyn ChatEndpoint>, store: Box<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let stats = Stats::load(store.as_ref())?;
        Ok(Self {
            endpoint,
            store,
            conversation: Conversation::with_greeting(GREETING),
            stats,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Stream an error analysis of `code` and append the reply as a new turn
    pub async fn analyze(
        &mut self,
        code: &str,
        language: &str,
        callback: Option<&SessionCallback>,
    ) -> Result<AnalysisReport> {
        validate_code(code, language)?;

        let request = vec![ConversationTurn::user(analysis_prompt(language, code))];
        let decoder = self.endpoint.stream(request).await?;
        self.stats.record_analysis(Utc::now());
        self.persist_stats();

        let outcome =
            drive_session(decoder, ReconcileMode::OneShot, &mut self.conversation, callback)
                .await?;
        info!(
            "Analysis finished with {} highlight(s), corrected code: {}",
            outcome.highlights.len(),
            outcome.result.corrected_code.is_some()
        );

        Ok(AnalysisReport {
            raw_text: outcome.raw_text,
            result: outcome.result,
            highlights: outcome.highlights,
        })
    }

    /// Ask the simulator for the console output of `code`
    pub async fn execute(
        &mut self,
        code: &str,
        language: &str,
        callback: Option<&SessionCallback>,
    ) -> Result<String> {
        if code.trim().is_empty() {
            return Err(CompanionError::Validation(
                "Please enter some code first.".to_string(),
            ));
        }

        let request = vec![
            ConversationTurn::system(EXECUTION_SYSTEM_PROMPT),
            ConversationTurn::user(execution_prompt(language, code)),
        ];
        let decoder = self.endpoint.stream(request).await?;
        let outcome =
            drive_session(decoder, ReconcileMode::Detached, &mut self.conversation, callback)
                .await?;
        Ok(outcome.raw_text)
    }

    /// Send a chat message; the reply is merged into one assistant turn
    pub async fn send_chat(
        &mut self,
        message: &str,
        callback: Option<&SessionCallback>,
    ) -> Result<String> {
        if message.trim().is_empty() {
            return Err(CompanionError::Validation(
                "Please enter a message.".to_string(),
            ));
        }

        self.conversation.push(ConversationTurn::user(message));
        let mut request = vec![ConversationTurn::system(CHAT_SYSTEM_PROMPT)];
        request.extend(self.conversation.turns().iter().cloned());

        let decoder = self.endpoint.stream(request).await?;
        let outcome =
            drive_session(decoder, ReconcileMode::Chat, &mut self.conversation, callback).await?;
        Ok(outcome.raw_text)
    }

    /// Clean corrected code out of the last turn, counting a correction
    pub fn apply_fix(&mut self) -> Option<String> {
        let last = self.conversation.last()?;
        let corrected = parse_streamed_analysis(&last.content).corrected_code?;
        let fixed = apply_fix(&corrected);
        if fixed.is_empty() {
            return None;
        }

        self.stats.record_correction(Utc::now());
        self.persist_stats();
        Some(fixed)
    }

    fn persist_stats(&mut self) {
        if let Err(e) = self.stats.save(self.store.as_mut()) {
            warn!("Failed to save statistics: {}", e);
        }
    }
}
