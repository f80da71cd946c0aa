//! Tests for the dashboard client against a canned local HTTP responder

use dashboard_client::{ApiError, DEFAULT_TIMEOUT, DashboardClient, ResourceScope, Stats};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve exactly one HTTP response and report the request line.
async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (request_tx, request_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = stream.read(&mut buf).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        let request = String::from_utf8_lossy(&request);
        let request_line = request.lines().next().unwrap_or_default().to_string();
        let _ = request_tx.send(request_line);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    (base_url, request_rx)
}

#[tokio::test]
async fn test_get_resources_sends_scope() {
    let body = r#"[{"group":"apps","kind":"Deployment","version":"v1","list":true,"watch":true}]"#;
    let (base_url, request) = serve_once("200 OK", body.to_string()).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    let resources = client.get_resources(ResourceScope::Namespaced).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].watcher_resource(), "apps.v1.Deployment");
    assert!(resources[0].namespaced);
    assert_eq!(request.await.unwrap(), "GET /resources?scope=namespace HTTP/1.1");
}

#[tokio::test]
async fn test_cluster_scope_sends_empty_scope() {
    let body = r#"[{"group":"","kind":"Node","version":"v1","list":true,"watch":true}]"#;
    let (base_url, request) = serve_once("200 OK", body.to_string()).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    let resources = client.get_resources(ResourceScope::Cluster).await.unwrap();
    assert_eq!(resources[0].watcher_resource(), "v1.Node");
    assert!(!resources[0].namespaced);
    assert_eq!(request.await.unwrap(), "GET /resources?scope= HTTP/1.1");
}

#[tokio::test]
async fn test_get_stats() {
    let (base_url, request) =
        serve_once("200 OK", r#"{"total":5,"running":3,"stopped":2}"#.to_string()).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    let stats = client.get_stats().await.unwrap();
    assert_eq!(
        stats,
        Stats {
            total: 5,
            running: 3,
            stopped: 2
        }
    );
    assert_eq!(request.await.unwrap(), "GET /stats HTTP/1.1");
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let (base_url, _request) = serve_once("404 Not Found", String::new()).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    assert!(matches!(client.get_stats().await, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_server_error_includes_status_and_body() {
    let (base_url, _request) =
        serve_once("500 Internal Server Error", "cache not ready".to_string()).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    match client.get_resources(ResourceScope::Cluster).await {
        Err(ApiError::Api(message)) => {
            assert!(message.contains("500"), "{}", message);
            assert!(message.contains("cache not ready"), "{}", message);
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_decode_error_truncates_body() {
    let body = format!("<html>{}</html>", "x".repeat(2000));
    let (base_url, _request) = serve_once("200 OK", body).await;
    let client = DashboardClient::new(base_url, DEFAULT_TIMEOUT).unwrap();

    match client.get_stats().await {
        Err(ApiError::Api(message)) => {
            assert!(message.starts_with("error decoding response body"));
            let shown = message.split("(first 500 chars): ").nth(1).unwrap();
            assert_eq!(shown.chars().count(), 500);
        }
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
#[ignore] // Requires a running dashboard producer
async fn test_live_producer_catalog() {
    let url = std::env::var("DASHBOARD_API_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:1234".to_string());
    let client = DashboardClient::new(url, DEFAULT_TIMEOUT).expect("Failed to create client");

    let catalog = client.get_catalog().await.expect("Failed to fetch catalog");
    let stats = client.get_stats().await.expect("Failed to fetch stats");

    println!(
        "Found {} resource kinds, {} watchers ({} running)",
        catalog.len(),
        stats.total,
        stats.running
    );
    assert_eq!(stats.total, stats.running + stats.stopped);
}
