use crate::llm::error::{CompanionError, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Response;
use std::str;
use tracing::trace;

/// Turns a byte stream into ordered text fragments.
///
/// The decoder is forward-only: once the source signals completion (or fails)
/// every further call to [`ChunkDecoder::next_fragment`] returns `Ok(None)`.
/// A multi-byte character split across two network chunks is held back until
/// its remaining bytes arrive; invalid sequences decode to U+FFFD.
pub struct ChunkDecoder {
    source: BoxStream<'static, Result<Bytes>>,
    pending: Vec<u8>,
    finished: bool,
}

impl ChunkDecoder {
    pub fn new<S, E>(source: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self {
            source: source
                .map(|item| item.map_err(|e| CompanionError::Transport(e.to_string())))
                .boxed(),
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Decode the body of a streamed HTTP response
    pub fn from_response(response: Response) -> Self {
        Self::new(response.bytes_stream())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Await the next non-empty fragment, `None` once the stream has ended
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        while !self.finished {
            match self.source.next().await {
                Some(Ok(chunk)) => {
                    trace!("Received chunk of {} bytes", chunk.len());
                    self.pending.extend_from_slice(&chunk);
                    let text = self.drain_complete();
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.pending.clear();
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    if !self.pending.is_empty() {
                        // Truncated character at the very end of the body
                        let text = String::from_utf8_lossy(&self.pending).into_owned();
                        self.pending.clear();
                        return Ok(Some(text));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Decode every complete character in `pending`, keeping an incomplete tail
    fn drain_complete(&mut self) -> String {
        let mut text = String::new();
        loop {
            match str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(invalid_len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid_len);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn decoder_for(chunks: Vec<&'static [u8]>) -> ChunkDecoder {
        ChunkDecoder::new(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c))),
        ))
    }

    async fn collect(decoder: &mut ChunkDecoder) -> Result<Vec<String>> {
        let mut fragments = Vec::new();
        while let Some(fragment) = decoder.next_fragment().await? {
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    #[tokio::test]
    async fn test_passes_fragments_through_in_order() {
        let mut decoder = decoder_for(vec![b"Hello", b", ", b"world"]);
        let fragments = collect(&mut decoder).await.unwrap();
        assert_eq!(fragments, vec!["Hello", ", ", "world"]);
        assert!(decoder.is_finished());
    }

    #[tokio::test]
    async fn test_stays_finished_after_end() {
        let mut decoder = decoder_for(vec![b"only"]);
        assert_eq!(decoder.next_fragment().await.unwrap().as_deref(), Some("only"));
        assert!(decoder.next_fragment().await.unwrap().is_none());
        assert!(decoder.next_fragment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_joins_split_multibyte_character() {
        // "✅" is e2 9c 85
        let mut decoder = decoder_for(vec![b"ok \xe2\x9c", b"\x85 done"]);
        let fragments = collect(&mut decoder).await.unwrap();
        assert_eq!(fragments, vec!["ok ", "✅ done"]);
    }

    #[tokio::test]
    async fn test_invalid_bytes_are_replaced() {
        let mut decoder = decoder_for(vec![b"a\xffb"]);
        let fragments = collect(&mut decoder).await.unwrap();
        assert_eq!(fragments, vec!["a\u{FFFD}b"]);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let items: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(Bytes::from_static(b"never seen")),
        ];
        let mut decoder = ChunkDecoder::new(stream::iter(items));

        assert_eq!(
            decoder.next_fragment().await.unwrap().as_deref(),
            Some("partial")
        );
        let err = decoder.next_fragment().await.unwrap_err();
        assert!(matches!(err, CompanionError::Transport(ref msg) if msg.contains("connection reset")));
        assert!(decoder.next_fragment().await.unwrap().is_none());
    }
}
