//! Streaming chat consumption
//!
//! The chat endpoint answers with a newline-delimited event stream. Each
//! line is optionally prefixed `data: `; the literal `[DONE]` sentinel ends
//! the stream, `{"content": ...}` frames extend the cumulative answer, and
//! `{"type":"resources", ...}` frames replace the source list wholesale.
//! Chunks arrive at arbitrary byte boundaries, so the trailing partial line
//! of every read is buffered and re-joined with the next chunk; a line is
//! never parsed before its newline has been seen, except for the final
//! flush when the transport ends without the sentinel.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{WidgetError, WidgetResult};
use crate::models::{ChatReply, RawResource, Source};
use crate::sources::resolve_sources;

/// Wall-clock budget for one streamed exchange, measured from the start of
/// consumption.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

enum StreamFrame {
    Done,
    Content(String),
    Resources(Vec<RawResource>),
}

/// Parses one complete line. Undecodable lines are partial fragments, not
/// errors; only a server-signaled `{"error": ...}` frame fails.
fn parse_stream_line(line: &str) -> WidgetResult<Option<StreamFrame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let payload = line.strip_prefix("data: ").unwrap_or(line);
    if payload == "[DONE]" {
        return Ok(Some(StreamFrame::Done));
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    if let Some(err) = value.get("error") {
        let message = err
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(WidgetError::Stream(message));
    }

    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return Ok(Some(StreamFrame::Content(content.to_string())));
    }

    if value.get("type").and_then(Value::as_str) == Some("resources") {
        if let Some(resources) = value.get("resources") {
            if let Ok(raw) = serde_json::from_value::<Vec<RawResource>>(resources.clone()) {
                return Ok(Some(StreamFrame::Resources(raw)));
            }
        }
    }

    Ok(None)
}

/// Applies one line to the running answer/source state. Returns `true` when
/// the `[DONE]` sentinel was seen.
///
/// Errors from line handling are swallowed like any other partial fragment
/// unless they render with the `Stream error` substring, the wrapping
/// convention every real stream failure in this crate carries. Do not lean
/// on this guard for new error kinds.
fn apply_stream_line(
    line: &str,
    answer: &mut String,
    sources: &mut Vec<Source>,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> WidgetResult<bool> {
    match parse_stream_line(line) {
        Ok(Some(StreamFrame::Done)) => Ok(true),
        Ok(Some(StreamFrame::Content(delta))) => {
            answer.push_str(&delta);
            on_chunk(answer);
            Ok(false)
        }
        Ok(Some(StreamFrame::Resources(raw))) => {
            *sources = resolve_sources(raw);
            Ok(false)
        }
        Ok(None) => Ok(false),
        Err(err) => {
            if err.to_string().contains("Stream error") {
                Err(err)
            } else {
                Ok(false)
            }
        }
    }
}

/// Consumes a chat byte stream to completion.
///
/// `on_chunk` receives the cumulative answer after every content frame. The
/// final [`ChatReply`] is the completion value; it is produced by the
/// `[DONE]` sentinel or, as a recovery path, by the transport ending
/// without one. Cancellation drops the reader and surfaces
/// [`WidgetError::Cancelled`]; text already delivered through `on_chunk`
/// stays with the caller.
pub async fn consume_chat_stream<S, C, E>(
    mut byte_stream: S,
    cancel: CancellationToken,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> WidgetResult<ChatReply>
where
    S: Stream<Item = Result<C, E>> + Unpin,
    C: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let deadline = tokio::time::Instant::now() + STREAM_TIMEOUT;
    let mut answer = String::new();
    let mut sources: Vec<Source> = Vec::new();
    let mut buffer = String::new();
    let mut done = false;

    'read: loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(WidgetError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(WidgetError::Timeout),
            next = byte_stream.next() => next,
        };

        let Some(result) = next else {
            break 'read;
        };
        let chunk = match result {
            Ok(bytes) => bytes,
            Err(e) => return Err(WidgetError::Stream(e.to_string())),
        };
        buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));

        while let Some(line_end) = buffer.find('\n') {
            let line = buffer[..line_end].to_string();
            buffer = buffer[line_end + 1..].to_string();
            if apply_stream_line(&line, &mut answer, &mut sources, on_chunk)? {
                done = true;
                break 'read;
            }
        }
    }

    // Transport ended without a trailing newline: flush what is left.
    if !done && !buffer.trim().is_empty() {
        apply_stream_line(&buffer, &mut answer, &mut sources, on_chunk)?;
    }

    Ok(ChatReply { answer, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;

    type Item = Result<Vec<u8>, Infallible>;

    fn chunked(input: &str, size: usize) -> Vec<Item> {
        input
            .as_bytes()
            .chunks(size)
            .map(|c| Ok(c.to_vec()))
            .collect()
    }

    async fn run(items: Vec<Item>) -> (WidgetResult<ChatReply>, Vec<String>) {
        let mut seen = Vec::new();
        let result = consume_chat_stream(
            stream::iter(items),
            CancellationToken::new(),
            &mut |cumulative: &str| seen.push(cumulative.to_string()),
        )
        .await;
        (result, seen)
    }

    #[tokio::test]
    async fn reassembles_lines_across_arbitrary_chunk_boundaries() {
        let input = "data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\ndata: [DONE]\n";
        for size in [1, 3, 7, 11, input.len()] {
            let (result, seen) = run(chunked(input, size)).await;
            let reply = result.unwrap();
            assert_eq!(seen, vec!["a", "ab"], "chunk size {}", size);
            assert_eq!(reply.answer, "ab");
            assert!(reply.sources.is_empty());
        }
    }

    #[tokio::test]
    async fn resources_frames_replace_wholesale() {
        let input = concat!(
            "data: {\"type\":\"resources\",\"resources\":[{\"type\":\"url\",\"url\":\"/a.html\"}]}\n",
            "data: {\"content\":\"x\"}\n",
            "data: {\"type\":\"resources\",\"resources\":[{\"type\":\"image\",\"url\":\"https://x/y/img\"}]}\n",
            "data: [DONE]\n",
        );
        let (result, _) = run(chunked(input, 13)).await;
        let reply = result.unwrap();
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(
            reply.sources[0].url,
            format!("{}/y/img.png", crate::sources::RESOURCE_CENTER_BASE)
        );
        assert_eq!(reply.sources[0].kind, crate::models::SourceKind::Image);
    }

    #[tokio::test]
    async fn error_frame_aborts_the_stream() {
        let input = "data: {\"content\":\"a\"}\ndata: {\"error\":\"boom\"}\n";
        let (result, seen) = run(chunked(input, 5)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, WidgetError::Stream(_)));
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().starts_with("Stream error"));
        assert_eq!(seen, vec!["a"]);
    }

    #[tokio::test]
    async fn transport_end_without_done_still_completes() {
        let input = "data: {\"content\":\"par\"}\ndata: {\"content\":\"tial\"}\n";
        let (result, seen) = run(chunked(input, 4)).await;
        let reply = result.unwrap();
        assert_eq!(reply.answer, "partial");
        assert_eq!(seen.last().map(String::as_str), Some("partial"));
    }

    #[tokio::test]
    async fn final_unterminated_line_is_flushed() {
        let input = "data: {\"content\":\"head\"}\ndata: {\"content\":\"tail\"}";
        let (result, _) = run(chunked(input, 9)).await;
        assert_eq!(result.unwrap().answer, "headtail");
    }

    #[tokio::test]
    async fn unrecognized_and_malformed_lines_are_ignored() {
        let input = concat!(
            "data: {\"someOtherField\":1}\n",
            "data: {not even json\n",
            ": comment line\n",
            "data: {\"content\":\"ok\"}\n",
            "data: [DONE]\n",
        );
        let (result, seen) = run(chunked(input, 6)).await;
        assert_eq!(result.unwrap().answer, "ok");
        assert_eq!(seen, vec!["ok"]);
    }

    #[tokio::test]
    async fn nothing_after_done_is_processed() {
        let input = "data: {\"content\":\"a\"}\ndata: [DONE]\ndata: {\"content\":\"late\"}\n";
        let (result, seen) = run(chunked(input, 8)).await;
        assert_eq!(result.unwrap().answer, "a");
        assert_eq!(seen, vec!["a"]);
    }

    #[tokio::test]
    async fn chunk_read_error_surfaces_as_stream_error() {
        let items: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"content\":\"a\"}\n".to_vec()),
            Err("connection reset".to_string()),
        ];
        let mut sink = |_: &str| {};
        let err = consume_chat_stream(stream::iter(items), CancellationToken::new(), &mut sink)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Stream error"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn cancellation_releases_the_reader() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pending = stream::pending::<Item>();
        let mut sink = |_: &str| panic!("no delivery after cancellation");
        let err = consume_chat_stream(pending, cancel, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, WidgetError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_expires() {
        let pending = stream::pending::<Item>();
        let mut sink = |_: &str| {};
        let err = consume_chat_stream(pending, CancellationToken::new(), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, WidgetError::Timeout));
    }
}
