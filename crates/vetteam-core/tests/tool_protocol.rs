//! Client-side protocol behaviour against scripted fake hosts.
//!
//! Each test drives the host end of a duplex pipe by hand so it can
//! reorder, withhold or interleave messages.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;

use vetteam_core::error::{SessionStatus, ToolClientError, TransportError};
use vetteam_core::rpc::protocol::PROTOCOL_VERSION;
use vetteam_core::rpc::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use vetteam_core::tools::{vet_market_host, InProcessConnector, ToolClient, ToolConnector};
use vetteam_core::transport::{FrameReader, Transport};

fn pipe() -> (Transport, Transport) {
    let (client_io, host_io) = tokio::io::duplex(64 * 1024);
    let (cr, cw) = tokio::io::split(client_io);
    let (hr, hw) = tokio::io::split(host_io);
    (
        Transport::from_io("client", cr, cw),
        Transport::from_io("fake-host", hr, hw),
    )
}

async fn accept_handshake(host: &Transport) {
    let JsonRpcMessage::Request(init) = host.receive().await.expect("initialize") else {
        panic!("expected initialize request");
    };
    assert_eq!(init.method, "initialize");
    host.send(&JsonRpcMessage::from(JsonRpcResponse::success(
        init.id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {"name": "fake", "version": "0.0.0"},
            "capabilities": {"tools": {}}
        }),
    )))
    .await
    .unwrap();

    let note = host.receive().await.expect("initialized notification");
    assert_eq!(note.method(), Some("notifications/initialized"));
}

async fn next_call(host: &Transport) -> JsonRpcRequest {
    loop {
        match host.receive().await.expect("tools/call") {
            JsonRpcMessage::Request(req) if req.method == "tools/call" => return req,
            _ => continue,
        }
    }
}

fn text_result(id: Option<Value>, text: &str) -> JsonRpcMessage {
    JsonRpcMessage::from(JsonRpcResponse::success(
        id,
        json!({"content": [{"type": "text", "text": text}], "isError": false}),
    ))
}

fn query(q: &str) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("query".to_string(), json!(q));
    args
}

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    let (client_end, host_end) = pipe();
    let host = tokio::spawn(async move {
        accept_handshake(&host_end).await;
        let first = next_call(&host_end).await;
        let second = next_call(&host_end).await;
        for req in [second, first] {
            let q = req.params.as_ref().unwrap()["arguments"]["query"]
                .as_str()
                .unwrap()
                .to_string();
            host_end.send(&text_result(req.id, &format!("answer to {}", q))).await.unwrap();
        }
        host_end
    });

    let session = ToolClient::default().connect(client_end).await.unwrap();
    let (a, b) = tokio::join!(
        session.invoke("echo", query("alpha")),
        session.invoke("echo", query("beta"))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.text(), "answer to alpha");
    assert_eq!(b.text(), "answer to beta");
    assert_ne!(a.correlation_id, b.correlation_id);

    session.close().await;
    host.await.unwrap();
}

#[tokio::test]
async fn test_invoke_on_unready_session_fails_fast() {
    let (client_end, _host_end) = pipe();
    let session = ToolClient::default().attach(client_end);

    let result = tokio::time::timeout(Duration::from_secs(1), session.invoke("echo", query("x")))
        .await
        .expect("invoke must not hang");
    assert!(matches!(
        result,
        Err(ToolClientError::State {
            actual: SessionStatus::Uninitialized
        })
    ));
}

#[tokio::test]
async fn test_close_fails_in_flight_invocation() {
    let (client_end, host_end) = pipe();
    let host = tokio::spawn(async move {
        accept_handshake(&host_end).await;
        let _withheld = next_call(&host_end).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = Arc::new(ToolClient::default().connect(client_end).await.unwrap());
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.invoke("slow", query("x")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.close().await;

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("in-flight invoke must resolve after close")
        .unwrap();
    assert!(matches!(result, Err(ToolClientError::Transport(TransportError::Closed))));
    assert_eq!(session.status(), SessionStatus::Closed);
    host.abort();
}

#[tokio::test]
async fn test_host_exit_mid_call_closes_session() {
    let (client_end, host_end) = pipe();
    tokio::spawn(async move {
        accept_handshake(&host_end).await;
        let _ = next_call(&host_end).await;
        drop(host_end);
    });

    let session = ToolClient::default().connect(client_end).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), session.invoke("echo", query("x")))
        .await
        .expect("must not hang when the host goes away");
    assert!(matches!(result, Err(ToolClientError::Transport(TransportError::Closed))));
    assert_eq!(session.status(), SessionStatus::Closed);
}

#[tokio::test]
async fn test_stray_responses_and_host_pings_are_handled() {
    let (client_end, host_end) = pipe();
    let host = tokio::spawn(async move {
        accept_handshake(&host_end).await;
        let call = next_call(&host_end).await;

        // Unknown id first, then a ping of our own, then the real answer.
        host_end.send(&text_result(Some(json!(9999)), "stray")).await.unwrap();
        host_end
            .send(&JsonRpcMessage::from(JsonRpcRequest::new(77, "ping", json!({}))))
            .await
            .unwrap();
        let pong = loop {
            if let JsonRpcMessage::Response(resp) = host_end.receive().await.unwrap() {
                break resp;
            }
        };
        assert_eq!(pong.id, Some(json!(77)));
        assert_eq!(pong.result, Some(json!({})));

        host_end.send(&text_result(call.id, "real")).await.unwrap();
        host_end
    });

    let session = ToolClient::default().connect(client_end).await.unwrap();
    let result = session.invoke("echo", query("x")).await.unwrap();
    assert_eq!(result.text(), "real");
    assert_eq!(session.status(), SessionStatus::Ready);

    session.close().await;
    host.await.unwrap();
}

#[tokio::test]
async fn test_handshake_error_is_a_connect_error() {
    let (client_end, host_end) = pipe();
    tokio::spawn(async move {
        if let Ok(JsonRpcMessage::Request(init)) = host_end.receive().await {
            host_end
                .send(&JsonRpcMessage::from(JsonRpcResponse::error(
                    init.id,
                    -32600,
                    "unsupported protocol version",
                )))
                .await
                .unwrap();
        }
        host_end
    });

    let err = ToolClient::default().connect(client_end).await.unwrap_err();
    assert!(err.to_string().contains("handshake rejected"));
    assert!(err.to_string().contains("unsupported protocol version"));
}

#[tokio::test]
async fn test_closing_one_session_twice_leaves_others_alone() {
    let connector = InProcessConnector::new(vet_market_host().unwrap());
    let client = ToolClient::default();
    let a = connector.connect(&client).await.unwrap();
    let b = connector.connect(&client).await.unwrap();

    a.close().await;
    a.close().await;

    assert_eq!(a.status(), SessionStatus::Closed);
    assert_eq!(b.status(), SessionStatus::Ready);
    let result = b
        .invoke("search_vet_market_data", query("2020-2025"))
        .await
        .unwrap();
    assert!(result.text().contains("Veterinary Market Overview"));
    b.close().await;
}

#[tokio::test]
async fn test_invoke_during_handshake_fails_fast() {
    let (client_end, host_end) = pipe();
    let host = tokio::spawn(async move {
        // Read the initialize request and never answer it.
        let _init = host_end.receive().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let session = Arc::new(ToolClient::default().attach(client_end));
    let handshake = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };

    tokio::time::timeout(Duration::from_secs(1), async {
        while session.status() != SessionStatus::Initializing {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session should enter initializing");

    let result = tokio::time::timeout(Duration::from_secs(1), session.invoke("echo", query("x")))
        .await
        .expect("invoke must not hang");
    assert!(matches!(
        result,
        Err(ToolClientError::State {
            actual: SessionStatus::Initializing
        })
    ));

    session.close().await;
    let outcome = tokio::time::timeout(Duration::from_secs(2), handshake)
        .await
        .expect("handshake must resolve after close")
        .unwrap();
    assert!(outcome.is_err());
    host.abort();
}

#[tokio::test]
async fn test_invalid_utf8_from_host_is_skipped() {
    let (client_io, host_io) = tokio::io::duplex(64 * 1024);
    let (cr, cw) = tokio::io::split(client_io);
    let (hr, mut hw) = tokio::io::split(host_io);

    let host = tokio::spawn(async move {
        let mut reader = FrameReader::new(hr);
        let init = reader.read_value().await.unwrap().unwrap();
        hw.write_all(b"\xff\xfe noise\n").await.unwrap();
        let reply = json!({
            "jsonrpc": "2.0",
            "id": init["id"],
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {"name": "fake", "version": "0.0.0"},
                "capabilities": {"tools": {}}
            }
        });
        hw.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();

        loop {
            let msg = reader.read_value().await.unwrap().unwrap();
            if msg["method"] == "tools/call" {
                hw.write_all(b"\xc3\x28\n").await.unwrap();
                let result = json!({
                    "jsonrpc": "2.0",
                    "id": msg["id"],
                    "result": {"content": [{"type": "text", "text": "clean"}], "isError": false}
                });
                hw.write_all(format!("{}\n", result).as_bytes()).await.unwrap();
                break;
            }
        }
        (reader, hw)
    });

    let session = ToolClient::default()
        .connect(Transport::from_io("client", cr, cw))
        .await
        .unwrap();
    let result = session.invoke("echo", query("x")).await.unwrap();
    assert_eq!(result.text(), "clean");
    assert_eq!(session.status(), SessionStatus::Ready);

    session.close().await;
    host.await.unwrap();
}
