//! Origin allow-list enforcement (spec §4.6, §9 supplement; DNS-rebinding
//! defense per the MCP transport specification).

use std::collections::HashSet;
use std::net::IpAddr;

/// Which origins a Streamable-HTTP server will accept connections from.
#[derive(Clone, Debug)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
    allow_localhost: bool,
    allow_any: bool,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self {
            allowed: HashSet::new(),
            allow_localhost: true,
            allow_any: false,
        }
    }
}

impl OriginPolicy {
    /// A policy that allows only `allow_localhost` origins by default (no
    /// explicitly allowed origins yet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that accepts every origin, including a missing one. Only
    /// appropriate for local development or tests.
    #[must_use]
    pub fn allow_any() -> Self {
        Self {
            allow_any: true,
            ..Self::default()
        }
    }

    /// Adds `origin` to the allow-list.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed.insert(origin.into());
        self
    }

    /// Sets whether `http(s)://localhost` and `http(s)://127.0.0.1` origins
    /// are accepted regardless of the explicit allow-list.
    #[must_use]
    pub fn with_allow_localhost(mut self, allow: bool) -> Self {
        self.allow_localhost = allow;
        self
    }

    /// Decides whether a request is acceptable.
    ///
    /// A DNS-rebinding attack requires a remote attacker to make a
    /// same-origin-policy-exempt browser request appear to come from
    /// `localhost`; that only works if the request traveled over the
    /// network with a forged `Origin`. A request with *no* `Origin` header
    /// from a loopback peer did not travel the network at all, so it is
    /// treated as safe even though a missing `Origin` from a remote peer is
    /// not.
    #[must_use]
    pub fn check(&self, origin: Option<&str>, peer_ip: Option<IpAddr>) -> bool {
        if self.allow_any {
            return true;
        }
        match origin {
            Some(origin) => {
                if self.allowed.contains(origin) {
                    return true;
                }
                if self.allow_localhost {
                    const LOCALHOST_PREFIXES: [&str; 4] = [
                        "http://localhost",
                        "https://localhost",
                        "http://127.0.0.1",
                        "https://127.0.0.1",
                    ];
                    if LOCALHOST_PREFIXES.iter().any(|p| origin.starts_with(p)) {
                        return true;
                    }
                }
                false
            }
            None => peer_ip.is_some_and(|ip| ip.is_loopback()),
        }
    }
}
