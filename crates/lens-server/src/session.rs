//! Per-connection RPC handling over WebSocket.
//!
//! A connection carries exactly one call. The first binary frame names the
//! method. Unary methods get one reply frame and a close. For `streamLogs`
//! the first frame only opens the stream; every following frame carries one
//! `LogRecord` until a frame marked `end_of_stream`. A Close frame or EOF
//! before that marker is a transport failure.

use std::sync::Arc;

use futures::stream::{self, Stream};
use futures::{SinkExt, StreamExt};
use lens_proto::{LogRecord, RpcFrame, RpcMethod};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::service::LogService;

/// Get the size of a WebSocket message in bytes.
#[must_use]
pub fn ws_message_size(ws_msg: &WsMessage) -> usize {
    match ws_msg {
        WsMessage::Text(text) => text.len(),
        WsMessage::Binary(data) | WsMessage::Ping(data) | WsMessage::Pong(data) => data.len(),
        WsMessage::Close(frame) => frame.as_ref().map_or(0, |f| f.reason.len() + 2),
        WsMessage::Frame(frame) => frame.len(),
    }
}

/// Decodes one inbound WebSocket message into an RPC frame.
///
/// Control frames yield `Ok(None)`. A Close frame yields
/// [`ServerError::ConnectionClosed`].
///
/// # Errors
///
/// Returns an error for text frames, oversized frames, or undecodable bytes.
pub fn decode_ws_message(ws_msg: &WsMessage, config: &ServerConfig) -> ServerResult<Option<RpcFrame>> {
    let size = ws_message_size(ws_msg);
    if !config.is_message_size_valid(size) {
        return Err(ServerError::MessageTooLarge {
            size,
            limit: config.max_message_size,
        });
    }

    match ws_msg {
        WsMessage::Binary(data) => Ok(Some(RpcFrame::from_bytes(data)?)),
        WsMessage::Text(_) => Err(ServerError::Protocol(
            "text frames are not supported".to_string(),
        )),
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => Ok(None),
        WsMessage::Close(_) => {
            debug!("Received close frame");
            Err(ServerError::ConnectionClosed)
        }
    }
}

/// Encodes a reply frame for sending.
#[must_use]
pub fn frame_to_ws(frame: &RpcFrame) -> WsMessage {
    WsMessage::Binary(frame.to_bytes())
}

/// Turns the remaining inbound messages into a stream of records.
///
/// An `end_of_stream` frame ends the stream. Read errors, protocol
/// violations, frames for another method, and a close before the end marker
/// are yielded once as `Err`, after which the stream ends.
pub fn record_stream<R>(
    inbound: R,
    config: Arc<ServerConfig>,
) -> impl Stream<Item = ServerResult<LogRecord>>
where
    R: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    stream::unfold(Some(inbound), move |state| {
        let config = config.clone();
        async move {
            let mut inbound = state?;
            loop {
                let msg = match inbound.next().await {
                    None => return Some((Err(closed_early()), None)),
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return Some((Err(ServerError::from(e)), None)),
                };

                let frame = match decode_ws_message(&msg, &config) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(ServerError::ConnectionClosed) => return Some((Err(closed_early()), None)),
                    Err(e) => return Some((Err(e), None)),
                };

                let item = match frame.rpc_method() {
                    Ok(RpcMethod::StreamLogs) if frame.end_of_stream => return None,
                    Ok(RpcMethod::StreamLogs) => frame.body::<LogRecord>().map_err(ServerError::from),
                    Ok(other) => Err(ServerError::Protocol(format!(
                        "unexpected {other} frame inside streamLogs"
                    ))),
                    Err(e) => Err(e.into()),
                };
                let next = if item.is_ok() { Some(inbound) } else { None };
                return Some((item, next));
            }
        }
    })
}

fn closed_early() -> ServerError {
    ServerError::Protocol("connection closed before end of stream".to_string())
}

/// Serves one call on an accepted WebSocket connection.
///
/// # Errors
///
/// Returns an error if the connection breaks or the peer violates the
/// protocol before a reply could be sent.
pub async fn run_session<S>(
    ws_stream: WebSocketStream<S>,
    service: Arc<LogService>,
    config: Arc<ServerConfig>,
) -> ServerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut outbound, mut inbound) = ws_stream.split();

    let header = loop {
        let Some(msg) = inbound.next().await else {
            return Ok(());
        };
        match decode_ws_message(&msg?, &config) {
            Ok(Some(frame)) => break frame,
            Ok(None) => {}
            Err(ServerError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                reject(&mut outbound, &e).await;
                return Err(e);
            }
        }
    };

    let method = match header.rpc_method() {
        Ok(method) => method,
        Err(e) => {
            let e = ServerError::from(e);
            reject(&mut outbound, &e).await;
            return Err(e);
        }
    };
    debug!(%method, "Call started");

    let reply = if method.is_streaming() {
        let response = service
            .stream_logs(record_stream(inbound, config.clone()))
            .await;
        RpcFrame::wrap(method, &response)
    } else {
        match service.call(&header) {
            Ok(reply) => reply,
            Err(e) => {
                reject(&mut outbound, &e).await;
                return Err(e);
            }
        }
    };

    outbound.send(frame_to_ws(&reply)).await?;
    outbound.close().await?;
    debug!(%method, "Call completed");
    Ok(())
}

/// Closes the connection with a protocol-error close frame.
async fn reject<W>(outbound: &mut W, err: &ServerError)
where
    W: futures::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    warn!(error = %err, "Rejecting call");
    let frame = CloseFrame {
        code: CloseCode::Protocol,
        reason: err.to_string().into(),
    };
    if let Err(e) = outbound.send(WsMessage::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send close frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_proto::EmptyRequest;

    fn binary(frame: &RpcFrame) -> Result<WsMessage, tokio_tungstenite::tungstenite::Error> {
        Ok(frame_to_ws(frame))
    }

    fn record_frame(message: &str) -> RpcFrame {
        RpcFrame::wrap(
            RpcMethod::StreamLogs,
            &LogRecord {
                timestamp: 1,
                message: message.to_string(),
                ..LogRecord::default()
            },
        )
    }

    async fn collect(
        messages: Vec<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>,
        config: ServerConfig,
    ) -> Vec<ServerResult<LogRecord>> {
        record_stream(stream::iter(messages), Arc::new(config))
            .collect()
            .await
    }

    // ===== Frame Decoding Tests =====

    #[test]
    fn decode_binary_frame() {
        let frame = RpcFrame::wrap(RpcMethod::GetLogLevels, &EmptyRequest {});
        let decoded = decode_ws_message(&frame_to_ws(&frame), &ServerConfig::default())
            .expect("decode")
            .expect("frame");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_rejects_text() {
        let result = decode_ws_message(&WsMessage::Text("{}".into()), &ServerConfig::default());
        assert!(matches!(result, Err(ServerError::Protocol(_))));
    }

    #[test]
    fn decode_rejects_oversized() {
        let config = ServerConfig::default().with_max_message_size(8);
        let result = decode_ws_message(&WsMessage::Binary(vec![0; 9]), &config);
        assert!(matches!(
            result,
            Err(ServerError::MessageTooLarge { size: 9, limit: 8 })
        ));
    }

    #[test]
    fn decode_skips_control_frames() {
        let result = decode_ws_message(&WsMessage::Ping(vec![1, 2]), &ServerConfig::default());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn decode_close_is_connection_closed() {
        let result = decode_ws_message(&WsMessage::Close(None), &ServerConfig::default());
        assert!(matches!(result, Err(ServerError::ConnectionClosed)));
    }

    // ===== Record Stream Tests =====

    #[tokio::test]
    async fn record_stream_ends_at_marker() {
        let items = collect(
            vec![
                binary(&record_frame("a")),
                Ok(WsMessage::Pong(Vec::new())),
                binary(&record_frame("b")),
                binary(&RpcFrame::end_of_stream(RpcMethod::StreamLogs)),
                binary(&record_frame("after end")),
            ],
            ServerConfig::default(),
        )
        .await;

        let messages: Vec<String> = items
            .into_iter()
            .map(|item| item.expect("record").message)
            .collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn record_stream_close_before_marker_is_error() {
        let items = collect(
            vec![binary(&record_frame("a")), Ok(WsMessage::Close(None))],
            ServerConfig::default(),
        )
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ServerError::Protocol(ref m)) if m.contains("before end of stream")));
    }

    #[tokio::test]
    async fn record_stream_eof_before_marker_is_error() {
        let items = collect(vec![binary(&record_frame("a"))], ServerConfig::default()).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ServerError::Protocol(_))));
    }

    #[tokio::test]
    async fn record_stream_yields_error_once() {
        let items = collect(
            vec![
                binary(&record_frame("a")),
                Ok(WsMessage::Text("oops".into())),
                binary(&record_frame("b")),
            ],
            ServerConfig::default(),
        )
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ServerError::Protocol(_))));
    }

    #[tokio::test]
    async fn record_stream_rejects_other_methods() {
        let items = collect(
            vec![binary(&RpcFrame::wrap(RpcMethod::SearchLogs, &EmptyRequest {}))],
            ServerConfig::default(),
        )
        .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ServerError::Protocol(ref m)) if m.contains("searchLogs")));
    }

    #[tokio::test]
    async fn record_stream_surfaces_read_errors() {
        let items = collect(
            vec![
                binary(&record_frame("a")),
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed),
            ],
            ServerConfig::default(),
        )
        .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ServerError::WebSocket(_))));
    }
}
