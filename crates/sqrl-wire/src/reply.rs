//! The server reply block.
//!
//! Replies are CRLF name-value blocks, base64url-framed, emitted in a fixed
//! field order: `ver`, `nut`, `tif`, `qry`, then the optional fields.

use crate::base64url;
use crate::error::WireError;
use crate::nv;
use crate::tif::Tif;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const VER_KEY: &str = "ver";
const NUT_KEY: &str = "nut";
const TIF_KEY: &str = "tif";
const QRY_KEY: &str = "qry";
const URL_KEY: &str = "url";
const CAN_KEY: &str = "can";
const SIN_KEY: &str = "sin";
const SUK_KEY: &str = "suk";
const ASK_KEY: &str = "ask";

/// One server reply, the payload of every HTTP 200 (and error) response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReply {
    /// Protocol revisions the server supports (ver).
    pub supported_versions: Vec<u32>,
    /// The freshly minted nut the client must present next (nut).
    pub nut: String,
    /// Transaction Information Flags, rendered as lowercase hex (tif).
    pub tif: Tif,
    /// Relative URL the client must POST its next message to (qry).
    pub query_path: String,
    /// Browser redirect after a client-provided-session success (url).
    pub success_url: Option<String>,
    /// Redirect for a cancelled authentication (can).
    pub cancel_url: Option<String>,
    /// Secret index request (sin).
    pub secret_index: Option<String>,
    /// The stored session unlock key, when the client asked for it (suk).
    pub server_unlock_key: Option<String>,
    /// Free-text prompt or failure cause for the client to display (ask).
    pub ask: Option<String>,
}

impl ServerReply {
    /// A reply for protocol revision 1 with no optional fields.
    pub fn new(nut: impl Into<String>, tif: Tif, query_path: impl Into<String>) -> Self {
        Self {
            supported_versions: vec![1],
            nut: nut.into(),
            tif,
            query_path: query_path.into(),
            success_url: None,
            cancel_url: None,
            secret_index: None,
            server_unlock_key: None,
            ask: None,
        }
    }

    /// Encode for the wire: CRLF block, base64url-framed, no padding.
    pub fn to_base64(&self) -> String {
        base64url::encode(self.to_string().as_bytes())
    }

    /// Decode a wire reply (exercised by clients and tests).
    pub fn from_base64(encoded: &str) -> Result<Self, WireError> {
        Self::from_str(&base64url::decode_str(encoded)?)
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ver = self
            .supported_versions
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let tif = self.tif.to_hex();

        let mut pairs: Vec<(&str, &str)> = vec![
            (VER_KEY, ver.as_str()),
            (NUT_KEY, self.nut.as_str()),
            (TIF_KEY, tif.as_str()),
            (QRY_KEY, self.query_path.as_str()),
        ];
        if let Some(url) = &self.success_url {
            pairs.push((URL_KEY, url));
        }
        if let Some(can) = &self.cancel_url {
            pairs.push((CAN_KEY, can));
        }
        if let Some(sin) = &self.secret_index {
            pairs.push((SIN_KEY, sin));
        }
        if let Some(suk) = &self.server_unlock_key {
            pairs.push((SUK_KEY, suk));
        }
        if let Some(ask) = &self.ask {
            pairs.push((ASK_KEY, ask));
        }
        write!(f, "{}", nv::encode(pairs))
    }
}

impl FromStr for ServerReply {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let map = nv::parse(s)?;

        let ver = nv::required(&map, VER_KEY)?;
        let supported_versions = ver
            .split(',')
            .map(|v| {
                v.parse::<u32>().map_err(|_| WireError::InvalidFieldValue {
                    field: VER_KEY,
                    value: ver.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let nut = nv::required(&map, NUT_KEY)?.to_string();
        let tif = Tif::from_hex(nv::required(&map, TIF_KEY)?)?;
        let query_path = nv::required(&map, QRY_KEY)?.to_string();

        Ok(Self {
            supported_versions,
            nut,
            tif,
            query_path,
            success_url: map.get(URL_KEY).cloned(),
            cancel_url: map.get(CAN_KEY).cloned(),
            secret_index: map.get(SIN_KEY).cloned(),
            server_unlock_key: map.get(SUK_KEY).cloned(),
            ask: map.get(ASK_KEY).cloned(),
        })
    }
}
