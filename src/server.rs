// CLASSIFICATION: COMMUNITY
// Filename: server.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Blocking HTTP front hosting the provisioning gate.
//!
//! One thread accepts requests and hands them to a fixed pool of workers
//! over a bounded queue. A long dependency install occupies one worker and
//! never stalls unrelated traffic; when every worker is busy and the queue
//! is full, new requests are answered with 503.

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use tiny_http::{Header, Request, Response, Server};

use crate::error::ServerError;
use crate::gate::{GateOutcome, ProvisioningGate};
use crate::proxy::{is_forwardable, Upstream};

type Reply = Response<Cursor<Vec<u8>>>;

/// Worker threads serving requests when none is configured.
pub const DEFAULT_WORKERS: usize = 16;

/// HTTP server wrapping a [`ProvisioningGate`].
pub struct GateServer {
    server: Arc<Server>,
    gate: Arc<ProvisioningGate>,
    upstream: Option<Arc<Upstream>>,
    workers: usize,
}

impl GateServer {
    pub fn bind(
        addr: &str,
        gate: ProvisioningGate,
        upstream: Option<Upstream>,
    ) -> Result<Self, ServerError> {
        let server = Server::http(addr).map_err(|e| ServerError::Bind {
            addr: addr.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            server: Arc::new(server),
            gate: Arc::new(gate),
            upstream: upstream.map(Arc::new),
            workers: DEFAULT_WORKERS,
        })
    }

    /// Serve with `workers` threads; requests beyond them plus an equally
    /// deep queue are rejected.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the listener is unblocked or fails.
    pub fn run(&self) {
        let (queue, pending) = mpsc::sync_channel::<Request>(self.workers);
        let pending = Arc::new(Mutex::new(pending));
        let mut pool = Vec::with_capacity(self.workers);
        for n in 0..self.workers {
            let gate = Arc::clone(&self.gate);
            let upstream = self.upstream.clone();
            let pending = Arc::clone(&pending);
            let spawned = thread::Builder::new()
                .name(format!("nbprovision-worker-{n}"))
                .spawn(move || work(&gate, upstream.as_deref(), &pending));
            match spawned {
                Ok(handle) => pool.push(handle),
                Err(err) => error!("failed to spawn worker {n}: {err}"),
            }
        }
        if pool.is_empty() {
            error!("no request workers available; not serving");
            return;
        }

        for request in self.server.incoming_requests() {
            match queue.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => {
                    warn!("all workers busy; rejecting {} {}", request.method(), request.url());
                    let _ = request.respond(empty(503));
                }
                Err(TrySendError::Disconnected(request)) => {
                    error!("request workers exited; stopping");
                    let _ = request.respond(empty(503));
                    break;
                }
            }
        }
        drop(queue);
        for handle in pool {
            let _ = handle.join();
        }
    }

    /// Run on a background thread; the returned handle stops the server on drop.
    pub fn spawn(self) -> Result<ServerHandle, ServerError> {
        let server = Arc::clone(&self.server);
        let addr = self.local_addr();
        let thread = thread::Builder::new()
            .name("nbprovision-accept".into())
            .spawn(move || self.run())?;
        Ok(ServerHandle {
            server,
            addr,
            thread: Some(thread),
        })
    }
}

/// Running background server.
pub struct ServerHandle {
    server: Arc<Server>,
    addr: Option<SocketAddr>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn work(gate: &ProvisioningGate, upstream: Option<&Upstream>, pending: &Mutex<Receiver<Request>>) {
    loop {
        let next = match pending.lock() {
            Ok(pending) => pending.recv(),
            Err(_) => return,
        };
        match next {
            Ok(request) => serve(gate, upstream, request),
            Err(_) => return,
        }
    }
}

fn serve(gate: &ProvisioningGate, upstream: Option<&Upstream>, mut request: Request) {
    let url = request.url().to_owned();
    let outcome = gate.handle(&url);
    debug!("{} {url} -> {outcome:?}", request.method());
    let reply = match outcome {
        GateOutcome::PassThrough => pass_through(upstream, &mut request),
        other => outcome_reply(&other),
    };
    if let Err(err) = request.respond(reply) {
        warn!("failed to respond to {url}: {err}");
    }
}

/// Map a terminal gate state to its HTTP response.
pub fn outcome_reply(outcome: &GateOutcome) -> Reply {
    match outcome {
        GateOutcome::AlreadyProvisioned { location } | GateOutcome::Provisioned { location } => {
            with_header(empty(307), "Location", location)
        }
        GateOutcome::NotFound => empty(404),
        GateOutcome::Failed(err) => with_header(
            Response::from_string(err.public_reason()).with_status_code(err.status_code()),
            "Content-Type",
            "text/plain; charset=utf-8",
        ),
        GateOutcome::PassThrough => empty(404),
    }
}

fn pass_through(upstream: Option<&Upstream>, request: &mut Request) -> Reply {
    let Some(upstream) = upstream else {
        return empty(404);
    };
    if is_upgrade(request) {
        warn!("refusing protocol upgrade for {}", request.url());
        return with_header(
            Response::from_string("protocol upgrade not supported").with_status_code(501),
            "Content-Type",
            "text/plain; charset=utf-8",
        );
    }
    let method = request.method().as_str().to_owned();
    let url = request.url().to_owned();
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|h| (h.field.as_str().as_str().to_owned(), h.value.as_str().to_owned()))
        .collect();
    let mut body = Vec::new();
    if let Err(err) = request.as_reader().read_to_end(&mut body) {
        warn!("failed to read body of {method} {url}: {err}");
        return empty(400);
    }

    match upstream.forward(&method, &url, &headers, &body) {
        Ok(resp) => {
            let mut reply = Response::from_data(resp.body).with_status_code(resp.status);
            for (name, value) in resp.headers.iter().filter(|(n, _)| is_forwardable(n)) {
                reply = with_header(reply, name, value);
            }
            reply
        }
        Err(err) => {
            error!("{err}");
            empty(502)
        }
    }
}

/// True when the client asks to switch protocols, e.g. for a websocket.
fn is_upgrade(request: &Request) -> bool {
    request
        .headers()
        .iter()
        .any(|h| h.field.as_str().as_str().eq_ignore_ascii_case("upgrade"))
}

fn empty(status: u16) -> Reply {
    Response::from_data(Vec::new()).with_status_code(status)
}

fn with_header(reply: Reply, name: &str, value: &str) -> Reply {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => reply.with_header(header),
        Err(()) => {
            warn!("dropping malformed header {name}");
            reply
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;

    fn header<'a>(reply: &'a Reply, name: &str) -> Option<&'a str> {
        reply
            .headers()
            .iter()
            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[test]
    fn redirects_use_temporary_redirect() {
        let reply = outcome_reply(&GateOutcome::Provisioned {
            location: "/app/m_foo".into(),
        });
        assert_eq!(reply.status_code().0, 307);
        assert_eq!(header(&reply, "Location"), Some("/app/m_foo"));
    }

    #[test]
    fn not_found_has_empty_body() {
        let reply = outcome_reply(&GateOutcome::NotFound);
        assert_eq!(reply.status_code().0, 404);
        assert_eq!(reply.data_length(), Some(0));
    }

    #[test]
    fn failures_expose_only_the_failure_class() {
        let reply = outcome_reply(&GateOutcome::Failed(ProvisionError::Fetch {
            url: "http://internal.example/secret".into(),
            reason: "status 500".into(),
        }));
        assert_eq!(reply.status_code().0, 502);
        assert_eq!(reply.data_length(), Some("notebook source fetch failed".len()));
    }
}
