use regex::Regex;
use std::sync::OnceLock;

/// Piece of an assistant message, for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text(String),
    Code { language: String, content: String },
}

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").expect("valid pattern"))
}

/// Split message content into plain text and fenced code blocks
pub fn split_message_content(content: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let mut last_index = 0;

    for caps in code_block_regex().captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last_index {
            parts.push(MessagePart::Text(
                content[last_index..whole.start()].to_string(),
            ));
        }
        parts.push(MessagePart::Code {
            language: caps
                .get(1)
                .map_or("plaintext", |m| m.as_str())
                .to_string(),
            content: caps[2].trim().to_string(),
        });
        last_index = whole.end();
    }

    if last_index < content.len() {
        parts.push(MessagePart::Text(content[last_index..].to_string()));
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_single_part() {
        assert_eq!(
            split_message_content("just words"),
            vec![MessagePart::Text("just words".into())]
        );
        assert!(split_message_content("").is_empty());
    }

    #[test]
    fn test_code_blocks_are_extracted() {
        let content = "Try this:\n```rust\nfn main() {}\n```\nand\n```\n  x = 1\n```";
        assert_eq!(
            split_message_content(content),
            vec![
                MessagePart::Text("Try this:\n".into()),
                MessagePart::Code {
                    language: "rust".into(),
                    content: "fn main() {}".into(),
                },
                MessagePart::Text("\nand\n".into()),
                MessagePart::Code {
                    language: "plaintext".into(),
                    content: "x = 1".into(),
                },
            ]
        );
    }

    #[test]
    fn test_unterminated_fence_stays_text() {
        let content = "```python\nprint(1)";
        assert_eq!(
            split_message_content(content),
            vec![MessagePart::Text(content.into())]
        );
    }
}
