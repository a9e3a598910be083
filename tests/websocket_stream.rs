use std::{
    fs::OpenOptions,
    io::Write,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use axum::{body::Body, http::Request, http::StatusCode};
use futures_util::StreamExt;
use sampletail::{
    server, spawn_tailer, HistoryStore, SampleFeed, TailOptions, TailReader, TailerHandle,
    WatchOptions, WatchTarget,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    _dir: TempDir,
    path: PathBuf,
    addr: SocketAddr,
    tailer: TailerHandle,
}

async fn start(initial_content: &str) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classic-td.log");
    if !initial_content.is_empty() {
        std::fs::write(&path, initial_content).unwrap();
    }

    let target = WatchTarget::resolve(&path).unwrap();
    let mut history = HistoryStore::new();
    let reader = TailReader::initialize(target.file(), TailOptions::default(), &mut history).unwrap();
    let feed = SampleFeed::new(history, 64);
    let options = WatchOptions {
        settle: Duration::from_millis(20),
    };
    let tailer = spawn_tailer(target, reader, feed.clone(), options, CancellationToken::new()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::app(feed)).await.unwrap();
    });

    Running {
        _dir: dir,
        path,
        addr,
        tailer,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

/// Next JSON text frame, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    tokio::time::timeout(WAIT, async {
        loop {
            let message = client.next().await.unwrap().unwrap();
            if message.is_text() {
                return serde_json::from_str(message.to_text().unwrap()).unwrap();
            }
        }
    })
    .await
    .expect("no message from server")
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clients_get_history_then_new_batches() {
    let running = start("").await;
    assert!(running.path.is_file());

    let mut first = connect(running.addr).await;
    assert_eq!(
        next_json(&mut first).await,
        json!({"event": "initial_data", "data": []})
    );

    append(&running.path, "1 1 1 1 10.0\n1 1 1 1 20.0\n");
    assert_eq!(
        next_json(&mut first).await,
        json!({"event": "new_data", "data": [10.0, 20.0]})
    );

    let mut second = connect(running.addr).await;
    assert_eq!(
        next_json(&mut second).await,
        json!({"event": "initial_data", "data": [10.0, 20.0]})
    );

    append(&running.path, "1 1 1 1 30.0\n");
    let batch = json!({"event": "new_data", "data": [30.0]});
    assert_eq!(next_json(&mut first).await, batch);
    assert_eq!(next_json(&mut second).await, batch);

    running.tailer.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn existing_content_and_malformed_lines() {
    let running = start("a b c d 1.5\nbroken\n\na b c d 2.5\n").await;

    let mut client = connect(running.addr).await;
    assert_eq!(
        next_json(&mut client).await,
        json!({"event": "initial_data", "data": [1.5, 2.5]})
    );

    // malformed lines alone must not produce a message, the next valid line comes through alone
    append(&running.path, "x y\na b c d notanumber\n");
    tokio::time::sleep(Duration::from_millis(200)).await;
    append(&running.path, "a b c d 3.14\n");
    assert_eq!(
        next_json(&mut client).await,
        json!({"event": "new_data", "data": [3.14]})
    );

    running.tailer.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn truncation_restarts_history() {
    let running = start("1 1 1 1 10.0\n1 1 1 1 20.0\n1 1 1 1 30.0\n").await;
    let mut client = connect(running.addr).await;
    next_json(&mut client).await;

    std::fs::write(&running.path, "1 1 1 1 5.0\n").unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"event": "new_data", "data": [5.0]})
    );

    let mut late = connect(running.addr).await;
    assert_eq!(
        next_json(&mut late).await,
        json!({"event": "initial_data", "data": [5.0]})
    );

    running.tailer.shutdown().await;
}

#[tokio::test]
async fn health_and_index_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let mut history = HistoryStore::new();
    TailReader::initialize(dir.path().join("data.log"), TailOptions::default(), &mut history).unwrap();
    let app = server::app(SampleFeed::new(history, 4));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("/ws"));
}
