//! Endpoint journey: boot the activation server against a live store
//! and exercise the HTTP contract end to end.

use std::sync::Arc;

use floop_e2e_tests::{behavior, fresh_store};
use floop_core::{EdgeKind, NewEdge};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

async fn get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!(
                "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
                path, addr
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn activation_endpoint_contract() {
    let (store, _dir) = fresh_store();
    store.add_node(behavior("b1", "one", "local")).unwrap();
    store.add_node(behavior("b2", "two", "local")).unwrap();
    store
        .add_edge(NewEdge::new("b1", "b2", EdgeKind::Requires, 0.9))
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = floop_server::start(Arc::new(store), 0, cancel.clone())
        .await
        .unwrap();
    let addr = handle.addr();

    // Known seed: 200 with a snapshot array, first step carries the seed,
    // last step is final
    let ok = get(addr, "/api/activate?seed=b1").await;
    assert!(ok.starts_with("HTTP/1.1 200"), "got: {}", ok);
    let body = ok.split("\r\n\r\n").nth(1).unwrap();
    let json_start = body.find('[').unwrap();
    let json_end = body.rfind(']').unwrap();
    let steps: serde_json::Value = serde_json::from_str(&body[json_start..=json_end]).unwrap();
    let steps = steps.as_array().unwrap();
    assert!(steps[0]["activation"]["b1"].as_f64().unwrap() > 0.0);
    assert_eq!(steps.last().unwrap()["final"], true);

    // Unknown seed: 404
    let missing = get(addr, "/api/activate?seed=missing").await;
    assert!(missing.starts_with("HTTP/1.1 404"), "got: {}", missing);

    // Missing query: 400
    let bad = get(addr, "/api/activate").await;
    assert!(bad.starts_with("HTTP/1.1 400"), "got: {}", bad);

    // The cached page embeds its own API base
    let page = get(addr, "/").await;
    assert!(page.starts_with("HTTP/1.1 200"));
    assert!(page.contains(&format!("http://{}", addr)));

    cancel.cancel();
    handle.wait().await;
}
