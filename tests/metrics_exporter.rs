use sealed_relay::metrics::{record_submission_accepted, render_metrics, start_metrics_server};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration, Instant};

async fn free_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return stream,
            Err(e) if Instant::now() >= deadline => {
                panic!("metrics exporter is not listening on {}: {}", addr, e)
            }
            Err(_) => sleep(Duration::from_millis(20)).await,
        }
    }
}

/// Exporter binds its address and serves recorded counters
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exporter_serves_scrapes() {
    let addr = free_addr().await;
    start_metrics_server(addr).unwrap();

    // Second call keeps the running exporter
    start_metrics_server(addr).unwrap();

    record_submission_accepted();

    let mut stream = connect_with_retry(addr).await;
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains("relay_submissions_accepted_total"));
    assert!(render_metrics()
        .unwrap()
        .contains("relay_submissions_accepted_total"));
}
