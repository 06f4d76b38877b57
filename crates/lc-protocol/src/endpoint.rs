//! Socket endpoint construction
//!
//! Both sockets are addressed relative to the origin the console was loaded
//! from. A secure origin (`https`) maps to `wss`, anything else to `ws`.

use std::fmt;

use url::Url;

use crate::error::ProtocolError;
use crate::ids::{LabId, NodeId};

/// Scheme and authority of the hosting page
///
/// Only constructed through [`Origin::parse`], so the socket base it holds
/// is always a valid `ws`/`wss` URL with a host and no credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    secure: bool,
    /// `ws(s)://host[:port]/`
    base: Url,
}

impl Origin {
    /// Parse an origin such as `https://lab.example.com`
    ///
    /// Surrounding whitespace and any path, query or fragment are ignored.
    /// `ws` and `wss` are accepted as well so a socket URL can be used
    /// directly. Origins carrying a username or password are rejected.
    pub fn parse(origin: &str) -> Result<Self, ProtocolError> {
        let invalid = |reason| ProtocolError::InvalidOrigin {
            origin: origin.to_string(),
            reason,
        };

        let parsed = Url::parse(origin.trim()).map_err(|_| invalid("not a valid URL"))?;

        let secure = match parsed.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            _ => return Err(invalid("unsupported scheme")),
        };

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host"))?;

        let scheme = if secure { "wss" } else { "ws" };
        let mut base =
            Url::parse(&format!("{}://{}/", scheme, host)).map_err(|_| invalid("invalid host"))?;
        base.set_port(parsed.port())
            .map_err(|()| invalid("invalid port"))?;

        Ok(Self { secure, base })
    }

    /// Whether the page was served over a secure scheme
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Host without the port
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// Explicit port, `None` for the scheme default
    pub fn port(&self) -> Option<u16> {
        self.base.port()
    }

    /// WebSocket scheme matching this origin
    pub fn ws_scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Socket URL for `segments` below this origin
    ///
    /// Each segment is percent-encoded on its own. An absent or blank
    /// token leaves the query empty; `?token=` is never sent without a
    /// value.
    fn socket_url(&self, segments: &[&str], token: Option<&str>) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("token", token);
        }
        url.into()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        match self.port() {
            Some(port) => write!(f, "{}://{}:{}", scheme, self.host(), port),
            None => write!(f, "{}://{}", scheme, self.host()),
        }
    }
}

/// URL of the console socket for one node
pub fn console_url(origin: &Origin, lab: &LabId, node: &NodeId, token: Option<&str>) -> String {
    origin.socket_url(
        &["labs", lab.as_str(), "nodes", node.as_str(), "console"],
        token,
    )
}

/// URL of the state-sync socket for one lab
pub fn state_sync_url(origin: &Origin, lab: &LabId, token: Option<&str>) -> String {
    origin.socket_url(&["ws", "labs", lab.as_str(), "state"], token)
}
