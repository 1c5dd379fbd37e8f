//! Server-Sent Events (SSE) framing for the event channel.
//!
//! This module turns the raw byte stream of `GET /api/chat_stream` into a stream of record
//! payloads: the joined `data:` lines of each blank-line-terminated record.  Decoding the
//! payload into a [`StreamEvent`](crate::StreamEvent) is left to the connection manager so
//! that one bad record never costs more than itself.

use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::{Error, Result};

/// Process a stream of bytes into a stream of SSE data payloads.
///
/// Errors from the byte stream are surfaced as [`Error::Streaming`] and are fatal for the
/// transport.  A record that is not valid UTF-8 is surfaced as [`Error::Encoding`]; the
/// stream keeps going after it.  Records without any `data:` line are skipped.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            Error::streaming(format!("Error in event stream: {e}"), Some(Box::new(e)))
        })
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                // First drain any complete record already buffered.
                while let Some(record) = extract_record(&mut buffer) {
                    if let Some(item) = record {
                        return Some((item, (stream, buffer)));
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // A trailing record without its blank line is incomplete; drop it.
                        if !buffer.is_empty() {
                            tracing::debug!(bytes = buffer.len(), "discarding partial SSE record");
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Remove one complete record from the front of `buffer`.
///
/// Returns `None` when no complete record is buffered, `Some(None)` for a record that
/// carries no data, and `Some(Some(payload))` otherwise.
fn extract_record(buffer: &mut Vec<u8>) -> Option<Option<Result<String>>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let record: Vec<u8> = buffer.drain(..end + 2).take(end).collect();

    let text = match std::str::from_utf8(&record) {
        Ok(text) => text,
        Err(e) => {
            return Some(Some(Err(Error::encoding(
                format!("Invalid UTF-8 in event record: {e}"),
                Some(Box::new(e)),
            ))));
        }
    };

    Some(parse_record(text).map(Ok))
}

/// Join the `data:` fields of a single record.
fn parse_record(text: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field != "data" {
            continue;
        }
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunks(
        parts: Vec<&'static [u8]>,
    ) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin + Send {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    #[tokio::test]
    async fn parse_single_record() {
        let mut sse = Box::pin(process_sse(chunks(vec![
            &b"data: {\"type\":\"connected\",\"session_id\":\"abc\"}\n\n"[..],
        ])));
        let payload = sse.next().await.unwrap().unwrap();
        assert_eq!(payload, r#"{"type":"connected","session_id":"abc"}"#);
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_multiple_records_in_one_chunk() {
        let mut sse = Box::pin(process_sse(chunks(vec![&b"data: one\n\ndata: two\n\n"[..]])));
        assert_eq!(sse.next().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next().await.unwrap().unwrap(), "two");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_split_record() {
        let mut sse = Box::pin(process_sse(chunks(vec![
            &b"data: {\"type\":"[..],
            &b"\"error\"}\n"[..],
            &b"\n"[..],
        ])));
        assert_eq!(sse.next().await.unwrap().unwrap(), r#"{"type":"error"}"#);
    }

    #[tokio::test]
    async fn handle_multibyte_char_split_across_chunks() {
        // "Ответ" split in the middle of the first Cyrillic character.
        let text = "data: Ответ\n\n".as_bytes();
        let (head, tail) = text.split_at(7);
        let head: &'static [u8] = Box::leak(head.to_vec().into_boxed_slice());
        let tail: &'static [u8] = Box::leak(tail.to_vec().into_boxed_slice());
        let mut sse = Box::pin(process_sse(chunks(vec![head, tail])));
        assert_eq!(sse.next().await.unwrap().unwrap(), "Ответ");
    }

    #[tokio::test]
    async fn crlf_and_comments_are_tolerated() {
        let mut sse = Box::pin(process_sse(chunks(vec![
            &b": keep-alive\r\n\r\nevent: message\r\ndata: a\r\ndata: b\r\n\r\n"[..],
        ])));
        assert_eq!(sse.next().await.unwrap().unwrap(), "a\nb");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_record_error_not_the_end() {
        let mut sse = Box::pin(process_sse(chunks(vec![
            &b"data: \xff\xfe\n\ndata: ok\n\n"[..],
        ])));
        let first = sse.next().await.unwrap();
        assert!(matches!(first, Err(ref e) if e.is_encoding()));
        assert_eq!(sse.next().await.unwrap().unwrap(), "ok");
    }

    #[tokio::test]
    async fn transport_error_is_streaming_error() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: first\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut sse = Box::pin(process_sse(stream::iter(parts)));
        assert_eq!(sse.next().await.unwrap().unwrap(), "first");
        let err = sse.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Streaming { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn partial_trailing_record_is_dropped() {
        let mut sse = Box::pin(process_sse(chunks(vec![&b"data: done\n\ndata: half"[..]])));
        assert_eq!(sse.next().await.unwrap().unwrap(), "done");
        assert!(sse.next().await.is_none());
    }
}
