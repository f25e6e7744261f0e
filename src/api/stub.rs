//! In-process HTTP server for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

enum Script {
    /// Next canned response per connection, then 500s
    Sequence(Mutex<VecDeque<(u16, String)>>),
    /// Response by exact request path, 404 otherwise
    Routes(Vec<(String, u16, String)>),
    /// Read the request and never answer
    Silent,
}

impl Script {
    fn respond(&self, path: &str) -> (u16, String) {
        match self {
            Self::Sequence(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((500, "{}".to_string())),
            Self::Routes(routes) => routes
                .iter()
                .find(|(p, _, _)| p == path)
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or((404, "{}".to_string())),
            Self::Silent => (0, String::new()),
        }
    }
}

pub struct StubServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn sequence(responses: Vec<(u16, &str)>) -> Self {
        let queue = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();
        Self::start(Script::Sequence(Mutex::new(queue))).await
    }

    pub async fn routes(routes: Vec<(&str, u16, &str)>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(path, status, body)| (path.to_string(), status, body.to_string()))
            .collect();
        Self::start(Script::Routes(routes)).await
    }

    pub async fn silent() -> Self {
        Self::start(Script::Silent).await
    }

    async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let (counter, log) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (counter, log, script) = (counter.clone(), log.clone(), script.clone());
                tokio::spawn(async move {
                    serve(stream, &script, &counter, &log).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            requests,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn request(&self, i: usize) -> String {
        self.requests.lock().unwrap()[i].clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| request_path(r).to_string())
            .collect()
    }
}

async fn serve(
    mut stream: TcpStream,
    script: &Script,
    counter: &AtomicUsize,
    log: &Mutex<Vec<String>>,
) {
    let request = read_request(&mut stream).await;
    let (status, body) = script.respond(request_path(&request));
    counter.fetch_add(1, Ordering::SeqCst);
    log.lock().unwrap().push(request);

    if matches!(script, Script::Silent) {
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    let reply = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn request_path(request: &str) -> &str {
    request.split_whitespace().nth(1).unwrap_or("")
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
