//! Construction and canonicalization of `sqrl://` URLs.
//!
//! The login invitation is a URL of the form
//! `sqrl://host[:port][/path]?nut=<base64url>[&x=<int>]`. The factory
//! renders it; [`SqrlUrl`] parses one back into canonical form, which is
//! the byte sequence clients sign against.

use crate::base64url;
use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A freshly issued URL together with the nut it carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlAndNut {
    /// The full `sqrl://` URL.
    pub url: String,
    /// The nut in its wire (string) form.
    pub nut: String,
    /// The raw nut bytes, when the nut was generated rather than supplied
    /// pre-encoded.
    pub nut_raw: Option<Vec<u8>>,
}

/// Builds canonical `sqrl://` URLs for one site.
///
/// The optional domain-extension length is the `x=` hint telling clients how
/// many leading characters of the path participate in per-site key
/// derivation, which gives sub-sites on one domain distinct identities.
#[derive(Clone, Debug)]
pub struct UrlFactory {
    domain: String,
    port: Option<u16>,
    path: Option<String>,
    domain_extension: Option<usize>,
}

impl UrlFactory {
    /// Create a factory for a domain, optional port, optional path, and
    /// optional domain-extension length.
    ///
    /// The path is normalized to start with `/`; a trailing `?` (a caller
    /// convenience marker) is stripped.
    pub fn new(
        domain: impl Into<String>,
        port: Option<u16>,
        path: Option<&str>,
        domain_extension: Option<usize>,
    ) -> Self {
        let path = path.map(normalize_path).filter(|p| !p.is_empty());
        Self {
            domain: domain.into(),
            port,
            path,
            domain_extension,
        }
    }

    /// Issue a URL carrying freshly generated nut bytes, rendered as
    /// unpadded base64url.
    pub fn url_and_nut_from_bytes(&self, nut_bytes: &[u8]) -> UrlAndNut {
        let nut = base64url::encode(nut_bytes);
        UrlAndNut {
            url: self.render(&nut),
            nut,
            nut_raw: Some(nut_bytes.to_vec()),
        }
    }

    /// Issue a URL carrying a caller-supplied, already-encoded nut value.
    pub fn url_and_nut(&self, nut: &str) -> UrlAndNut {
        UrlAndNut {
            url: self.render(nut),
            nut: nut.to_string(),
            nut_raw: None,
        }
    }

    fn render(&self, nut: &str) -> String {
        let mut url = format!("sqrl://{}", self.domain);
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        if let Some(path) = &self.path {
            url.push_str(path);
        }
        url.push_str("?nut=");
        url.push_str(nut);
        // The x= hint only makes sense when there is a path to extend over.
        if let (Some(x), Some(path)) = (self.domain_extension, &self.path) {
            url.push_str(&format!("&x={}", x.min(path.len())));
        }
        url
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.strip_suffix('?').unwrap_or(path);
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// A parsed `sqrl://` URL in canonical form: lowercase scheme and host, no
/// userinfo, no explicit port, path and query preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqrlUrl {
    host: String,
    path: String,
    query: String,
}

impl SqrlUrl {
    /// Parse and canonicalize. Rejects anything that is not `sqrl://`.
    pub fn parse(input: &str) -> Result<Self, WireError> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| WireError::InvalidUrl(input.to_string()))?;
        if !scheme.eq_ignore_ascii_case("sqrl") {
            return Err(WireError::NotSqrlScheme(input.to_string()));
        }

        let (authority, tail) = match rest.find(['/', '?']) {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        let (path, query) = match tail.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (tail.to_string(), String::new()),
        };

        // Strip userinfo, then any explicit port.
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let host = host_port.split_once(':').map_or(host_port, |(h, _)| h);
        if host.is_empty() {
            return Err(WireError::InvalidUrl(input.to_string()));
        }

        Ok(Self {
            host: host.to_ascii_lowercase(),
            path,
            query,
        })
    }

    /// Canonical host (lowercased, no port, no userinfo).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path component, verbatim. Empty when the URL has none.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.split('&').find_map(|pair| {
            let (n, v) = pair.split_once('=')?;
            (n == name).then_some(v)
        })
    }

    /// The nut carried in the query, if any.
    pub fn nut(&self) -> Option<&str> {
        self.query_param("nut")
    }
}

impl fmt::Display for SqrlUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sqrl://{}{}", self.host, self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}
