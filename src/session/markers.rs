use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Half-open character range into the source code that was analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"START_POS: (\d+)\nEND_POS: (\d+)").expect("marker pattern is valid")
    })
}

/// A marker pair found in the buffer, with the byte offset where it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch {
    pub range: HighlightRange,
    pub end_offset: usize,
}

/// Rescan the whole accumulated buffer for `START_POS`/`END_POS` pairs.
///
/// Markers can straddle chunk boundaries, so the scan always covers the full
/// buffer rather than the text added since `previous_len`. Pairs whose numbers
/// do not fit or whose end lies before the start are skipped.
pub fn scan_matches(previous_len: usize, buffer: &str) -> Vec<MarkerMatch> {
    trace!(
        "Scanning {} bytes for markers ({} new)",
        buffer.len(),
        buffer.len().saturating_sub(previous_len)
    );

    marker_regex()
        .captures_iter(buffer)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let start = caps[1].parse::<usize>().ok()?;
            let end = caps[2].parse::<usize>().ok()?;
            if end < start {
                debug!("Ignoring inverted marker pair {}..{}", start, end);
                return None;
            }
            Some(MarkerMatch {
                range: HighlightRange { start, end },
                end_offset: whole.end(),
            })
        })
        .collect()
}

/// Ranges found so far, in order of first appearance
pub fn scan(previous_len: usize, buffer: &str) -> Vec<HighlightRange> {
    scan_matches(previous_len, buffer)
        .into_iter()
        .map(|m| m.range)
        .collect()
}

/// Reports each highlight range exactly once across repeated rescans.
///
/// A match ending exactly at the end of the buffer is held back: its
/// `END_POS` digits may continue in the next chunk. It is released once more
/// text follows it, or by [`HighlightTracker::flush`] when the stream ends.
#[derive(Debug, Default, Clone)]
pub struct HighlightTracker {
    reported: usize,
    scanned_len: usize,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranges reported so far
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Rescan `buffer` and return the ranges not reported before
    pub fn update(&mut self, buffer: &str) -> Vec<HighlightRange> {
        let matches = scan_matches(self.scanned_len, buffer);
        self.scanned_len = buffer.len();

        let settled = matches
            .iter()
            .take_while(|m| m.end_offset < buffer.len())
            .count();
        self.take_new(&matches[..settled])
    }

    /// Release everything left once the stream has finished
    pub fn flush(&mut self, buffer: &str) -> Vec<HighlightRange> {
        let matches = scan_matches(self.scanned_len, buffer);
        self.scanned_len = buffer.len();
        self.take_new(&matches)
    }

    fn take_new(&mut self, settled: &[MarkerMatch]) -> Vec<HighlightRange> {
        if settled.len() <= self.reported {
            return Vec::new();
        }
        let fresh: Vec<HighlightRange> = settled[self.reported..]
            .iter()
            .map(|m| m.range)
            .collect();
        self.reported = settled.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = "Error Analysis:\n\
❌ [Line 1] Missing semicolon\n\
START_POS: 10\n\
END_POS: 15\n\
❌ [Line 3] Undefined variable\n\
START_POS: 42\n\
END_POS: 47\n\
\n\
CORRECTED CODE:\n\
let x = 1;";

    fn feed(tracker: &mut HighlightTracker, fragments: &[&str]) -> Vec<HighlightRange> {
        let mut buffer = String::new();
        let mut ranges = Vec::new();
        for fragment in fragments {
            buffer.push_str(fragment);
            ranges.extend(tracker.update(&buffer));
        }
        ranges.extend(tracker.flush(&buffer));
        ranges
    }

    #[test]
    fn test_scan_finds_all_pairs_in_order() {
        assert_eq!(
            scan(0, ANALYSIS),
            vec![
                HighlightRange { start: 10, end: 15 },
                HighlightRange { start: 42, end: 47 },
            ]
        );
    }

    #[test]
    fn test_malformed_pair_does_not_stop_scan() {
        let text = "START_POS: 1\nEND_POS: x\nSTART_POS: 5\nSTART_POS: 3\nEND_POS: 9\n";
        assert_eq!(scan(0, text), vec![HighlightRange { start: 3, end: 9 }]);
    }

    #[test]
    fn test_inverted_pair_is_skipped() {
        let text = "START_POS: 9\nEND_POS: 3\nSTART_POS: 1\nEND_POS: 2\n";
        assert_eq!(scan(0, text), vec![HighlightRange { start: 1, end: 2 }]);
    }

    #[test]
    fn test_every_split_point_reports_each_pair_once() {
        let expected = scan(0, ANALYSIS);
        for split in 1..ANALYSIS.len() {
            if !ANALYSIS.is_char_boundary(split) {
                continue;
            }
            let (head, tail) = ANALYSIS.split_at(split);
            let mut tracker = HighlightTracker::new();
            assert_eq!(
                feed(&mut tracker, &[head, tail]),
                expected,
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_character_by_character_stream() {
        let fragments: Vec<String> = ANALYSIS.chars().map(|c| c.to_string()).collect();
        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let mut tracker = HighlightTracker::new();
        assert_eq!(feed(&mut tracker, &fragments), scan(0, ANALYSIS));
        assert_eq!(tracker.reported(), 2);
    }

    #[test]
    fn test_digits_split_across_chunks_are_not_truncated() {
        let mut tracker = HighlightTracker::new();
        let ranges = feed(&mut tracker, &["START_POS: 1\nEND_POS: 2", "3\nmore"]);
        assert_eq!(ranges, vec![HighlightRange { start: 1, end: 23 }]);
    }

    #[test]
    fn test_trailing_match_released_on_flush() {
        let mut tracker = HighlightTracker::new();
        let buffer = "START_POS: 4\nEND_POS: 8";
        assert!(tracker.update(buffer).is_empty());
        assert_eq!(
            tracker.flush(buffer),
            vec![HighlightRange { start: 4, end: 8 }]
        );
        assert!(tracker.flush(buffer).is_empty());
    }
}
