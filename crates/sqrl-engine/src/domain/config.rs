//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// Everything the engine needs to know about the site it serves.
///
/// All of this is injected; the engine keeps no other process-wide state
/// besides the nut registry.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Host placed in issued `sqrl://` URLs.
    pub local_domain_name: String,
    /// Port in issued URLs; omitted when standard.
    pub port: Option<u16>,
    /// Path of the SQRL endpoint, also the base of every `qry=` value.
    pub url_path: String,
    /// The `x=` per-site key-derivation hint, in path characters.
    pub domain_extension: Option<usize>,
    /// Where a browser is sent after a completed login.
    pub client_login_success_url: String,
    /// Where a browser is sent on a cancelled authentication (`can=`).
    pub client_cancel_auth_url: Option<String>,
    /// Nut record lifetime in seconds.
    pub nut_ttl_secs: u64,
}

impl EngineConfig {
    /// Nut record lifetime.
    pub fn nut_ttl(&self) -> Duration {
        Duration::from_secs(self.nut_ttl_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_domain_name: "localhost".to_string(),
            port: None,
            url_path: "/sqrl".to_string(),
            domain_extension: None,
            client_login_success_url: "/loggedIn".to_string(),
            client_cancel_auth_url: None,
            // 12 hours
            nut_ttl_secs: 12 * 60 * 60,
        }
    }
}
