use serde::{Deserialize, Serialize};

/// Delimiter between the analysis and the corrected code in a model reply
pub const CORRECTED_CODE_MARKER: &str = "CORRECTED CODE:";

/// Analysis and corrected code extracted from a finished reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_text: String,
    pub corrected_code: Option<String>,
}

/// Growing buffer of streamed text
#[derive(Debug, Default, Clone)]
pub struct MessageAccumulator {
    text: String,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn finish(&self) -> AnalysisResult {
        parse_streamed_analysis(&self.text)
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Split a finished reply on the first `CORRECTED CODE:` marker.
///
/// This is a textual heuristic: a reply without the marker is all analysis,
/// and empty halves are valid results.
pub fn parse_streamed_analysis(buffer: &str) -> AnalysisResult {
    match buffer.split_once(CORRECTED_CODE_MARKER) {
        Some((analysis, code)) => AnalysisResult {
            analysis_text: analysis.trim().to_string(),
            corrected_code: Some(code.trim().to_string()),
        },
        None => AnalysisResult {
            analysis_text: buffer.trim().to_string(),
            corrected_code: None,
        },
    }
}

/// Strip blank lines and lines opening with a comment token from corrected code.
///
/// Works line by line on text only, so a line that starts inside a
/// multi-line string literal with `//` is dropped as well.
pub fn apply_fix(corrected_code: &str) -> String {
    corrected_code
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("//")
                && !trimmed.starts_with("/*")
                && !trimmed.starts_with("*/")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
