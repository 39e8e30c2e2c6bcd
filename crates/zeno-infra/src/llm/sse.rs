//! Shared server-sent-event plumbing for the provider adapters.
//!
//! Both families answer a streaming request with `text/event-stream`. Each
//! event's `data` is handed to a family-specific decoder which turns it into
//! a text fragment, a skip, an end marker or a failure. Undecodable events
//! are skipped; a non-success status or a transport error ends the stream
//! with an `Err`.

use std::time::Duration;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use tracing::{debug, warn};

use zeno_core::llm::provider::FragmentStream;
use zeno_types::llm::LlmError;

/// Longest upstream error body kept in an `LlmError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Outcome of decoding one event payload.
#[derive(Debug, PartialEq)]
pub(crate) enum Decoded {
    Text(String),
    Skip,
    Done,
    Fail(LlmError),
}

/// Send `request` and decode its SSE body into fragments.
///
/// `timeout` bounds the whole exchange, body included.
pub(crate) fn fragment_stream(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    provider: &'static str,
    decode: fn(&str) -> Decoded,
) -> FragmentStream {
    Box::pin(async_stream::try_stream! {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider, status = %status, "upstream rejected stream request");
            Err::<(), _>(LlmError::Status {
                status: status.as_u16(),
                body: truncate(body),
            })?;
        } else {
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(EventStreamError::Transport(e)) => {
                        Err::<(), _>(transport_error(e, timeout))?;
                        continue;
                    }
                    Err(e) => {
                        debug!(provider, error = %e, "skipping undecodable event");
                        continue;
                    }
                };

                match decode(&event.data) {
                    Decoded::Text(text) => yield text,
                    Decoded::Skip => {}
                    Decoded::Done => break,
                    Decoded::Fail(e) => Err::<(), _>(e)?,
                }
            }
        }
    })
}

pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Transport(e.without_url().to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// One-shot HTTP server for adapter tests: answers the first connection
/// with `response` verbatim and closes it.
#[cfg(test)]
pub(crate) async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 64 * 1024];
        let mut received = Vec::new();
        // read headers and body; requests in tests are small
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&received).to_string()
    });
    (format!("http://{addr}"), handle)
}

/// A `200 text/event-stream` response with the given raw body.
#[cfg(test)]
pub(crate) fn sse_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
    )
}
