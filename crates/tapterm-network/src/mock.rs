//! Scripted in-memory transport for tests and the simulator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tapterm_core::ConnectivityError;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

type Reply = Result<HttpResponse, ConnectivityError>;

#[derive(Debug, Default)]
struct Script {
    standing: Vec<(String, Reply)>,
    once: VecDeque<(String, Reply)>,
    requests: Vec<HttpRequest>,
    delay: Option<Duration>,
}

impl Script {
    fn reply_for(&mut self, request: &HttpRequest) -> Reply {
        let path = request_path(&request.url);

        if let Some(pos) = self.once.iter().position(|(p, _)| path.ends_with(p.as_str())) {
            if let Some((_, reply)) = self.once.remove(pos) {
                return reply;
            }
        }

        self.standing
            .iter()
            .rev()
            .find(|(p, _)| path.ends_with(p.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| {
                Err(ConnectivityError::transport(format!(
                    "no scripted reply for {path}"
                )))
            })
    }
}

fn request_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Transport that answers from a script and records every request.
///
/// Replies are matched by path suffix. One-shot replies are consumed first,
/// then the most recent standing reply for the path applies.
///
/// # Examples
///
/// ```
/// use tapterm_network::mock::ScriptedTransport;
/// use tapterm_network::{HttpRequest, HttpTransport, Method};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let (transport, handle) = ScriptedTransport::new();
///     handle.on_json("/terminal/authenticate", 200, r#"{"success": true}"#);
///
///     let request = HttpRequest {
///         method: Method::Post,
///         url: "http://backend/terminal/authenticate".into(),
///         headers: vec![],
///         body: None,
///         timeout: Duration::from_secs(1),
///     };
///     let response = transport.execute(request).await.unwrap();
///     assert_eq!(response.status, 200);
///     assert_eq!(handle.request_count(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptedTransportHandle) {
        let script = Arc::new(Mutex::new(Script::default()));
        (
            Self {
                script: script.clone(),
            },
            ScriptedTransportHandle { script },
        )
    }
}

impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ConnectivityError> {
        let (reply, delay) = {
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            let reply = script.reply_for(&request);
            script.requests.push(request);
            (reply, script.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

/// Control side of a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct ScriptedTransportHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransportHandle {
    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Answer every request to `path` with this status and body.
    pub fn on_json(&self, path: &str, status: u16, body: &str) {
        self.on(path, Ok(HttpResponse::new(status, body)));
    }

    pub fn on(&self, path: &str, reply: Result<HttpResponse, ConnectivityError>) {
        self.with(|s| s.standing.push((path.to_string(), reply)));
    }

    /// Answer the next request to `path` only.
    pub fn once_json(&self, path: &str, status: u16, body: &str) {
        self.once(path, Ok(HttpResponse::new(status, body)));
    }

    pub fn once(&self, path: &str, reply: Result<HttpResponse, ConnectivityError>) {
        self.with(|s| s.once.push_back((path.to_string(), reply)));
    }

    /// Hold every reply for `delay` before returning it.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.with(|s| s.delay = delay);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.with(|s| s.requests.clone())
    }

    pub fn request_count(&self) -> usize {
        self.with(|s| s.requests.len())
    }

    /// Requests whose path ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.with(|s| {
            s.requests
                .iter()
                .filter(|r| request_path(&r.url).ends_with(path))
                .cloned()
                .collect()
        })
    }

    pub fn clear_requests(&self) {
        self.with(|s| s.requests.clear());
    }
}
