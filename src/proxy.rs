// CLASSIFICATION: COMMUNITY
// Filename: proxy.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Forwarding of pass-through requests to the app-serving runtime.

use std::io::Read;
use std::time::Duration;

use log::debug;

use crate::error::ServerError;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Response relayed back from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Blocking client for the app-serving runtime.
pub struct Upstream {
    base: String,
    agent: ureq::Agent,
}

impl Upstream {
    pub fn new(base: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .build();
        Self {
            base: base.trim_end_matches('/').to_owned(),
            agent,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute upstream URL for a request path (with query).
    pub fn target_url(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base, path_and_query)
        } else {
            format!("{}/{}", self.base, path_and_query)
        }
    }

    /// Replay a request upstream and collect the full response.
    ///
    /// Non-success statuses are relayed like any other response; only
    /// transport failures are errors.
    pub fn forward(
        &self,
        method: &str,
        path_and_query: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<UpstreamResponse, ServerError> {
        let url = self.target_url(path_and_query);
        debug!("forwarding {method} {url}");
        let mut req = self.agent.request(method, &url);
        for (name, value) in headers.iter().filter(|(name, _)| is_forwardable(name)) {
            req = req.set(name, value);
        }
        let sent = if body.is_empty() {
            req.call()
        } else {
            req.send_bytes(body)
        };
        let resp = match sent {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => {
                return Err(ServerError::Upstream {
                    url,
                    reason: t.to_string(),
                })
            }
        };

        let status = resp.status();
        let mut relayed = Vec::new();
        for name in resp.headers_names() {
            if !is_forwardable(&name) {
                continue;
            }
            for value in resp.all(&name) {
                relayed.push((name.clone(), value.to_owned()));
            }
        }
        let mut payload = Vec::new();
        resp.into_reader()
            .read_to_end(&mut payload)
            .map_err(|e| ServerError::Upstream {
                url: url.clone(),
                reason: format!("read body: {e}"),
            })?;
        Ok(UpstreamResponse {
            status,
            headers: relayed,
            body: payload,
        })
    }
}

/// True for end-to-end headers that survive a proxy hop.
pub fn is_forwardable(name: &str) -> bool {
    !HOP_BY_HOP
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        assert!(!is_forwardable("Connection"));
        assert!(!is_forwardable("Transfer-Encoding"));
        assert!(!is_forwardable("HOST"));
        assert!(is_forwardable("Content-Type"));
        assert!(is_forwardable("Cookie"));
    }

    #[test]
    fn target_url_joins_base_and_path() {
        let up = Upstream::new("http://127.0.0.1:2718/", Duration::from_secs(1));
        assert_eq!(up.base(), "http://127.0.0.1:2718");
        assert_eq!(up.target_url("/app/m_foo?x=1"), "http://127.0.0.1:2718/app/m_foo?x=1");
        assert_eq!(up.target_url("favicon.ico"), "http://127.0.0.1:2718/favicon.ico");
    }
}
