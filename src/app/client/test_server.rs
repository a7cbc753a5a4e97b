//! Minimal HTTP/1.1 server for exercising the remote code paths in tests

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Serve fixed responses keyed by request path; unknown paths get 404
pub async fn serve(routes: Vec<(&'static str, u16, Vec<u8>)>) -> SocketAddr {
    let routes: HashMap<&'static str, (u16, Vec<u8>)> = routes
        .into_iter()
        .map(|(path, status, body)| (path, (status, body)))
        .collect();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

            let (status, body) = routes
                .get(path.as_str())
                .cloned()
                .unwrap_or((404, b"not found".to_vec()));
            let header = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = socket.write_all(header.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

/// Base URL `http://<addr>/pub/pmc/` of a test server
pub fn base_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}/pub/pmc/", addr)).unwrap()
}
