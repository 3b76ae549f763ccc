#![cfg(unix)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use aquabridge_ipc::{event_to_notification, IpcError, IpcHandler, RpcClient, ServerBuilder};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

struct Counter;

impl IpcHandler for Counter {
    fn handle(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
        let method = method.to_string();
        Box::pin(async move {
            match method.as_str() {
                "len" => {
                    let items = params.and_then(|p| p.as_array().cloned()).unwrap_or_default();
                    Ok(json!(items.len()))
                }
                other => Err(format!("no such method: {}", other)),
            }
        })
    }
}

async fn connect(
    path: &str,
) -> (RpcClient, tokio::sync::mpsc::Receiver<aquabridge_ipc::RpcNotification>) {
    for _ in 0..50 {
        if let Ok(conn) = RpcClient::connect_unix(path).await {
            return conn;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not come up at {}", path);
}

#[tokio::test]
async fn test_request_response_and_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("duplex.sock");
    let socket = socket.to_str().unwrap().to_string();

    let builder = ServerBuilder::new(&socket).namespace("list", Arc::new(Counter));
    let events = builder.event_sender();
    let server = tokio::spawn(builder.run());

    let (client, mut notifications) = connect(&socket).await;

    let len = client.request("list.len", Some(json!([1, 2, 3]))).await.unwrap();
    assert_eq!(len, json!(3));

    let err = client.request("list.sum", None).await.unwrap_err();
    assert!(matches!(err, IpcError::Remote { code: -32000, .. }));

    events
        .send(event_to_notification("particle.call_service", json!({"call_id": 9})))
        .unwrap();
    let note = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(note.method, "particle.call_service");
    assert_eq!(note.params.unwrap()["call_id"], 9);

    client.close();
    assert!(matches!(
        client.request("list.len", None).await,
        Err(IpcError::ConnectionClosed)
    ));
    server.abort();
}

#[tokio::test]
async fn test_pending_request_fails_when_server_hangs_up() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("hangup.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        // Drop the connection without answering.
    });

    let (client, _notifications) = RpcClient::connect_unix(socket.to_str().unwrap()).await.unwrap();
    let result = client.request("anything", None).await;
    assert!(matches!(result, Err(IpcError::ConnectionClosed)));
    assert!(client.is_closed());
}

#[cfg(feature = "websocket")]
fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[cfg(feature = "websocket")]
#[tokio::test]
async fn test_websocket_round_trip_with_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("ws.sock");
    let port = free_port();

    let builder = ServerBuilder::new(socket.to_str().unwrap())
        .with_websocket(port)
        .with_api_key("secret".to_string())
        .namespace("list", Arc::new(Counter));
    let events = builder.event_sender();
    let server = tokio::spawn(builder.run());

    let url = format!("ws://127.0.0.1:{}/ws?key=secret", port);
    let mut connected = None;
    for _ in 0..50 {
        if let Ok(conn) = RpcClient::connect_ws(&url).await {
            connected = Some(conn);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let (client, mut notifications) = connected.expect("websocket server did not come up");

    let len = client.request("list.len", Some(json!(["a", "b"]))).await.unwrap();
    assert_eq!(len, json!(2));

    events
        .send(event_to_notification("particle.call_service", json!({"call_id": 3})))
        .unwrap();
    let note = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(note.method, "particle.call_service");

    let wrong_key = format!("ws://127.0.0.1:{}/ws?key=wrong", port);
    assert!(matches!(
        RpcClient::connect_ws(&wrong_key).await,
        Err(IpcError::Unreachable(_))
    ));
    let no_key = format!("ws://127.0.0.1:{}/ws", port);
    assert!(RpcClient::connect_ws(&no_key).await.is_err());

    client.close();
    server.abort();
}
