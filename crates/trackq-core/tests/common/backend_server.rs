//! Scripted music-library backend for integration tests.
//!
//! Speaks just enough HTTP/1.1 for reqwest. `POST .../download/track` answers
//! from a per-track reply script; `GET .../download/progress/{id}` streams
//! scripted server-sent events and can then keep the connection open with
//! keepalive comments until the client goes away, so tests can tell when a
//! progress channel was closed.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SubmitReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl SubmitReply {
    pub fn downloading() -> Self {
        Self::ok(r#"{"status":"downloading"}"#.to_string())
    }

    pub fn exists(filename: &str) -> Self {
        Self::ok(serde_json::json!({"status": "exists", "filename": filename}).to_string())
    }

    pub fn error(status: u16, detail: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "detail": detail }).to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn ok(body: String) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    fn starts_download(&self) -> bool {
        self.status == 200 && self.body.contains("\"downloading\"")
    }
}

/// What one progress connection gets.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// 200 event stream with these JSON payloads; then either hold the
    /// connection open with keepalives or close it.
    Events { events: Vec<String>, hold_open: bool },
    /// Plain error response.
    Status(u16),
}

impl StreamScript {
    pub fn events(events: &[&str]) -> Self {
        StreamScript::Events {
            events: events.iter().map(|e| e.to_string()).collect(),
            hold_open: true,
        }
    }

    pub fn events_then_close(events: &[&str]) -> Self {
        StreamScript::Events {
            events: events.iter().map(|e| e.to_string()).collect(),
            hold_open: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct State {
    submits: HashMap<i64, VecDeque<SubmitReply>>,
    streams: HashMap<i64, VecDeque<StreamScript>>,
    stream_after: HashMap<i64, StreamScript>,
    gated: HashSet<i64>,
    downloading: HashSet<i64>,
    requests: Vec<Request>,
    closed: HashMap<i64, usize>,
}

#[derive(Clone)]
pub struct Backend {
    state: Arc<Mutex<State>>,
    base_url: String,
}

impl Backend {
    /// Starts the server on an ephemeral port. Runs until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            state,
            base_url: format!("http://127.0.0.1:{}/api/", port),
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Replies to successive submissions for `id`; afterwards "downloading".
    pub fn script_submit(&self, id: i64, replies: Vec<SubmitReply>) {
        self.state.lock().unwrap().submits.insert(id, replies.into());
    }

    /// Scripts for successive progress connections for `id`.
    pub fn script_stream(&self, id: i64, scripts: Vec<StreamScript>) {
        self.state.lock().unwrap().streams.insert(id, scripts.into());
    }

    /// Script for every progress connection once the scripted ones are used up.
    /// Without one, connections get no events and are held open.
    pub fn stream_after(&self, id: i64, script: StreamScript) {
        self.state.lock().unwrap().stream_after.insert(id, script);
    }

    /// Progress events for `id` wait until a submission for it was answered
    /// with "downloading".
    pub fn gate_progress(&self, id: i64) {
        self.state.lock().unwrap().gated.insert(id);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Bodies of every submission, in arrival order.
    pub fn submissions(&self) -> Vec<serde_json::Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .map(|r| serde_json::from_str(&r.body).unwrap())
            .collect()
    }

    pub fn progress_opens(&self, id: i64) -> usize {
        let path = format!("/api/download/progress/{}", id);
        self.requests()
            .iter()
            .filter(|r| r.method == "GET" && r.path == path)
            .count()
    }

    /// Progress connections for `id` the client closed while held open.
    pub fn closed_streams(&self, id: i64) -> usize {
        self.state.lock().unwrap().closed.get(&id).copied().unwrap_or(0)
    }

    pub async fn wait_closed(&self, id: i64, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.closed_streams(id) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

fn handle(stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&stream) else {
        return;
    };
    state.lock().unwrap().requests.push(request.clone());
    let mut stream = stream;

    if request.method == "POST" && request.path.ends_with("/download/track") {
        let id = serde_json::from_str::<serde_json::Value>(&request.body)
            .ok()
            .and_then(|v| v["track_id"].as_i64())
            .unwrap_or_default();
        let reply = state
            .lock()
            .unwrap()
            .submits
            .get_mut(&id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(SubmitReply::downloading);
        thread::sleep(reply.delay);
        respond(&mut stream, reply.status, &reply.body);
        if reply.starts_download() {
            state.lock().unwrap().downloading.insert(id);
        }
        return;
    }

    if request.method == "GET" {
        if let Some(id) = request
            .path
            .rsplit_once("/download/progress/")
            .and_then(|(_, id)| id.parse::<i64>().ok())
        {
            stream_progress(&mut stream, state, id);
            return;
        }
    }

    respond(&mut stream, 404, r#"{"detail":"Not Found"}"#);
}

fn stream_progress(stream: &mut TcpStream, state: &Mutex<State>, id: i64) {
    let script = {
        let mut st = state.lock().unwrap();
        st.streams
            .get_mut(&id)
            .and_then(|q| q.pop_front())
            .or_else(|| st.stream_after.get(&id).cloned())
            .unwrap_or(StreamScript::Events {
                events: Vec::new(),
                hold_open: true,
            })
    };
    let (events, hold_open) = match script {
        StreamScript::Status(code) => {
            respond(stream, code, "");
            return;
        }
        StreamScript::Events { events, hold_open } => (events, hold_open),
    };

    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    let _ = stream.flush();

    if state.lock().unwrap().gated.contains(&id) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !state.lock().unwrap().downloading.contains(&id) {
            if Instant::now() > deadline {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(30));
    }

    for event in &events {
        let frame = format!("data: {}\n\n", event);
        if stream.write_all(frame.as_bytes()).is_err() {
            return;
        }
        let _ = stream.flush();
        thread::sleep(Duration::from_millis(10));
    }
    if !hold_open {
        return;
    }
    loop {
        thread::sleep(Duration::from_millis(25));
        if stream.write_all(b": keepalive\n\n").is_err() || stream.flush().is_err() {
            *state.lock().unwrap().closed.entry(id).or_default() += 1;
            return;
        }
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            } else if name == "authorization" {
                authorization = Some(value.to_string());
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(Request {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
        authorization,
    })
}

fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
