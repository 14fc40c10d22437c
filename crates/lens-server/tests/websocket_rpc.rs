//! End-to-end RPC calls against a live server over WebSocket.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use lens_proto::{
    DeleteRequest, DeleteResponse, EmptyRequest, LogIdRequest, LogLevelRequest, LogRecord,
    LogResponse, PatternRequest, PatternsResponse, RpcFrame, RpcMethod, SearchRequest,
    SearchResponse, ValuesResponse,
};
use lens_server::{LogServer, ServerConfig, frame_to_ws};
use prost::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = LogServer::new(config);

    tokio::spawn(async move {
        let _ = server.serve_listener(listener, std::future::pending()).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    ws
}

/// Reads until the next binary frame, or `None` once the server closes.
async fn next_frame(ws: &mut Client) -> Option<RpcFrame> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(WsMessage::Binary(data)) => return Some(RpcFrame::from_bytes(&data).expect("frame")),
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

async fn call<Req: Message, Resp: Message + Default>(
    addr: SocketAddr,
    method: RpcMethod,
    request: &Req,
) -> Resp {
    let mut ws = connect(addr).await;
    ws.send(frame_to_ws(&RpcFrame::wrap(method, request)))
        .await
        .expect("send");

    let reply = next_frame(&mut ws).await.expect("reply frame");
    assert_eq!(reply.rpc_method().ok(), Some(method));
    reply.body().expect("reply body")
}

async fn ingest(addr: SocketAddr, records: Vec<LogRecord>) -> LogResponse {
    let mut ws = connect(addr).await;
    ws.send(frame_to_ws(&RpcFrame::wrap(RpcMethod::StreamLogs, &EmptyRequest {})))
        .await
        .expect("open stream");
    for record in &records {
        ws.send(frame_to_ws(&RpcFrame::wrap(RpcMethod::StreamLogs, record)))
            .await
            .expect("send record");
    }
    ws.send(frame_to_ws(&RpcFrame::end_of_stream(RpcMethod::StreamLogs)))
        .await
        .expect("end stream");

    next_frame(&mut ws)
        .await
        .expect("summary frame")
        .body()
        .expect("summary body")
}

fn record(timestamp: i64, level: &str, message: &str) -> LogRecord {
    LogRecord {
        timestamp,
        level: level.to_string(),
        message: message.to_string(),
        source: "it".to_string(),
        ..LogRecord::default()
    }
}

#[tokio::test]
async fn ingest_then_search_delete_and_mine() {
    let addr = start_server(ServerConfig::default()).await;

    let summary = ingest(
        addr,
        (0..25)
            .map(|i| {
                let level = if i % 5 == 0 { "ERROR" } else { "INFO" };
                record(1_000 + i, level, &format!("request {i} served"))
            })
            .collect(),
    )
    .await;
    assert!(summary.success);
    assert_eq!(summary.processed_count, 25);
    assert_eq!(summary.message, "Successfully processed 25 logs");

    let page: SearchResponse = call(
        addr,
        RpcMethod::SearchLogs,
        &SearchRequest {
            query: "REQUEST".to_string(),
            sort_field: "timestamp".to_string(),
            sort_ascending: true,
            page: 2,
            size: 10,
            ..SearchRequest::default()
        },
    )
    .await;
    assert_eq!(page.total_results, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.logs.len(), 5);
    assert_eq!(page.logs[0].timestamp, 1_020);

    let fetched: LogRecord = call(
        addr,
        RpcMethod::GetLogById,
        &LogIdRequest {
            id: page.logs[0].id.clone(),
        },
    )
    .await;
    assert_eq!(fetched, page.logs[0]);

    let patterns: PatternsResponse =
        call(addr, RpcMethod::GetMostCommonPatterns, &PatternRequest::default()).await;
    assert_eq!(patterns.patterns.len(), 1);
    assert_eq!(patterns.patterns[0].template, "request {{NUMBER}} served");
    assert_eq!(patterns.patterns[0].count, 25);

    let levels: ValuesResponse = call(addr, RpcMethod::GetLogLevels, &EmptyRequest {}).await;
    assert_eq!(levels.values, vec!["ERROR", "INFO"]);

    let errors: SearchResponse = call(
        addr,
        RpcMethod::GetLogsByLevel,
        &LogLevelRequest {
            level: "error".to_string(),
        },
    )
    .await;
    assert_eq!(errors.total_results, 5);
    assert!(errors.logs.iter().all(|r| r.level == "ERROR"));

    let deleted: DeleteResponse = call(
        addr,
        RpcMethod::DeleteLogs,
        &DeleteRequest {
            query: "request 1".to_string(),
            ..DeleteRequest::default()
        },
    )
    .await;
    // "request 1", "request 10" .. "request 19"
    assert_eq!(deleted.deleted_count, 11);
    assert!(deleted.success);

    let remaining: SearchResponse = call(addr, RpcMethod::SearchLogs, &SearchRequest::default()).await;
    assert_eq!(remaining.total_results, 14);
}

#[tokio::test]
async fn missing_id_returns_empty_record() {
    let addr = start_server(ServerConfig::default()).await;

    let fetched: LogRecord = call(
        addr,
        RpcMethod::GetLogById,
        &LogIdRequest {
            id: "does-not-exist".to_string(),
        },
    )
    .await;
    assert_eq!(fetched, LogRecord::default());
}

#[tokio::test]
async fn empty_stream_reports_zero() {
    let addr = start_server(ServerConfig::default()).await;
    let summary = ingest(addr, Vec::new()).await;

    assert!(summary.success);
    assert_eq!(summary.processed_count, 0);
}

#[tokio::test]
async fn protocol_violation_mid_stream_keeps_saved_records() {
    let addr = start_server(ServerConfig::default()).await;

    let mut ws = connect(addr).await;
    ws.send(frame_to_ws(&RpcFrame::wrap(RpcMethod::StreamLogs, &EmptyRequest {})))
        .await
        .expect("open");
    ws.send(frame_to_ws(&RpcFrame::wrap(RpcMethod::StreamLogs, &record(1, "INFO", "kept"))))
        .await
        .expect("record");
    ws.send(WsMessage::Text("not a frame".into())).await.expect("text");

    let summary: LogResponse = next_frame(&mut ws)
        .await
        .expect("summary frame")
        .body()
        .expect("summary body");
    assert!(!summary.success);
    assert_eq!(summary.processed_count, 1);
    assert!(summary.message.starts_with("Error processing logs: "));

    let all: SearchResponse = call(addr, RpcMethod::SearchLogs, &SearchRequest::default()).await;
    assert_eq!(all.total_results, 1);
}

#[tokio::test]
async fn unknown_method_is_closed_without_reply() {
    let addr = start_server(ServerConfig::default()).await;

    let mut ws = connect(addr).await;
    let frame = RpcFrame {
        method: "tailLogs".to_string(),
        ..RpcFrame::default()
    };
    ws.send(frame_to_ws(&frame)).await.expect("send");

    assert!(next_frame(&mut ws).await.is_none());
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let addr = start_server(ServerConfig::default().with_max_message_size(64)).await;

    let mut ws = connect(addr).await;
    let request = SearchRequest {
        query: "x".repeat(256),
        ..SearchRequest::default()
    };
    ws.send(frame_to_ws(&RpcFrame::wrap(RpcMethod::SearchLogs, &request)))
        .await
        .expect("send");

    assert!(next_frame(&mut ws).await.is_none());
}
