//! 테스트용 최소 HTTP 응답기 (TcpListener 기반)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// 고정 응답 라우트
#[derive(Clone)]
pub(crate) struct Route {
    method: String,
    path: String,
    status: u16,
    body: String,
}

impl Route {
    pub(crate) fn new(method: &str, path: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.into(),
        }
    }

    pub(crate) fn json(method: &str, path: &str, body: impl Into<String>) -> Self {
        Self::new(method, path, 200, body)
    }
}

pub(crate) struct TestServer {
    pub(crate) base_url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// 처리한 요청 수
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// 라우트를 서빙하는 서버 시작 (쿼리 문자열은 무시)
pub(crate) async fn serve(routes: Vec<Route>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|r| (format!("{} {}", r.method, r.path), r))
            .collect(),
    );
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let mut parts = request.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let target = parts.next().unwrap_or("/");
                let path = target.split('?').next().unwrap_or(target);

                let (status, body) = match routes.get(&format!("{} {}", method, path)) {
                    Some(route) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        (route.status, route.body.clone())
                    }
                    None => (404, "{\"error\":\"not found\"}".to_string()),
                };

                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer {
        base_url: format!("http://{}", addr),
        hits,
    }
}

/// 헤더 + Content-Length 만큼의 본문을 읽음
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
