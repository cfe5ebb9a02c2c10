//! Parsed connection targets

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt;
use url::{Host, ParseError, Url};

use crate::error::{ConnectError, ConnectResult};

/// An absolute URL naming something to connect to, e.g. `tcp://[::1]:8080`
/// or `etcd:///services/api`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Parse a target string.
    ///
    /// Relative references fail with [`ConnectError::AbsoluteUrlRequired`];
    /// every other parse failure is returned as the underlying
    /// [`url::ParseError`].
    pub fn parse(input: &str) -> ConnectResult<Self> {
        match Url::parse(input) {
            Ok(url) => Ok(Self { url }),
            Err(ParseError::RelativeUrlWithoutBase) => Err(ConnectError::AbsoluteUrlRequired),
            Err(e) => Err(ConnectError::InvalidUrl(e)),
        }
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host as it appears in the URL, IPv6 literals bracketed
    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|host| !host.is_empty())
    }

    /// Host without brackets, suitable for [`join_host_port`]
    pub fn hostname(&self) -> Option<String> {
        match self.url.host()? {
            Host::Domain(domain) if domain.is_empty() => None,
            Host::Domain(domain) => Some(domain.to_string()),
            Host::Ipv4(addr) => Some(addr.to_string()),
            Host::Ipv6(addr) => Some(addr.to_string()),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Percent-decoded path, e.g. `/services/my api` for
    /// `etcd:///services/my%20api`
    pub fn path(&self) -> Cow<'_, str> {
        percent_decode_str(self.url.path()).decode_utf8_lossy()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

/// Combine host and port into `host:port`, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: impl fmt::Display) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
