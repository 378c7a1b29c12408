//! The client message envelope.
//!
//! A client POST body carries three or four form fields:
//!
//! - `client`: base64url block of CRLF name-value lines (the parameters)
//! - `server`: base64url echo of what the server last sent, either the
//!   original `sqrl://` URL or a previous reply block
//! - `ids`: Ed25519 signature over the still-encoded `client` + `server`
//!   strings, concatenated
//! - `pids` (optional): same signature by the previous identity key
//! - `urs` (optional): unlock request signature, transported but not
//!   evaluated here

use crate::base64url;
use crate::error::WireError;
use crate::nv;
use crate::url::SqrlUrl;
use ed25519_dalek::VerifyingKey;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// POST body field: the client parameter block.
pub const CLIENT_FIELD: &str = "client";
/// POST body field: the echoed server data.
pub const SERVER_FIELD: &str = "server";
/// POST body field: the identity signature.
pub const IDS_FIELD: &str = "ids";
/// POST body field: the previous-identity signature.
pub const PIDS_FIELD: &str = "pids";
/// POST body field: the unlock request signature.
pub const URS_FIELD: &str = "urs";

// Keys inside the client parameter block
const VER_KEY: &str = "ver";
const CMD_KEY: &str = "cmd";
const IDK_KEY: &str = "idk";
const PIDK_KEY: &str = "pidk";
const OPT_KEY: &str = "opt";
const BTN_KEY: &str = "btn";
const SUK_KEY: &str = "suk";
const VUK_KEY: &str = "vuk";
const INS_KEY: &str = "ins";
const PINS_KEY: &str = "pins";

/// The five commands a client may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Probe which of the presented identities the server knows.
    Query,
    /// Assert the identity: create, update, or rotate, and log in.
    Ident,
    /// Disable SQRL authentication for the identity.
    Disable,
    /// Re-enable a disabled identity.
    Enable,
    /// Remove the identity entirely.
    Remove,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Query => "query",
            Command::Ident => "ident",
            Command::Disable => "disable",
            Command::Enable => "enable",
            Command::Remove => "remove",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Command {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Command::Query),
            "ident" => Ok(Command::Ident),
            "disable" => Ok(Command::Disable),
            "enable" => Ok(Command::Enable),
            "remove" => Ok(Command::Remove),
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }
}

/// Option flags carried in the `~`-separated `opt` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptFlag {
    /// Ask the site to accept only SQRL authentication.
    SqrlOnly,
    /// Ask the site to refuse side-channel identity changes.
    HardLock,
    /// The client holds a secure return path to the browser and will
    /// redirect it itself on success.
    Cps,
    /// Ask the server to return the stored session unlock key.
    Suk,
}

impl fmt::Display for OptFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptFlag::SqrlOnly => "sqrlonly",
            OptFlag::HardLock => "hardlock",
            OptFlag::Cps => "cps",
            OptFlag::Suk => "suk",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OptFlag {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqrlonly" => Ok(OptFlag::SqrlOnly),
            "hardlock" => Ok(OptFlag::HardLock),
            "cps" => Ok(OptFlag::Cps),
            "suk" => Ok(OptFlag::Suk),
            other => Err(WireError::UnknownOption(other.to_string())),
        }
    }
}

/// Parse a `~`-separated option list. An unknown flag is fatal.
pub fn parse_opt_list(opt: &str) -> Result<Vec<OptFlag>, WireError> {
    opt.split('~').map(OptFlag::from_str).collect()
}

fn encode_opt_list(flags: &[OptFlag]) -> String {
    flags
        .iter()
        .map(OptFlag::to_string)
        .collect::<Vec<_>>()
        .join("~")
}

/// The decoded `client` parameter block.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientParameters {
    /// Protocol revision the client speaks (ver).
    pub protocol_version: u32,
    /// The requested command (cmd).
    pub command: Command,
    /// The per-site primary identity public key (idk).
    pub identity_key: VerifyingKey,
    /// The retiring identity key during rotation (pidk).
    pub previous_identity_key: Option<VerifyingKey>,
    /// Session unlock key deposited with the server (suk).
    pub server_unlock_key: Option<String>,
    /// Verify unlock key deposited with the server (vuk).
    pub verify_unlock_key: Option<String>,
    /// Indexed secret for the current identity (ins).
    pub index_secret: Option<String>,
    /// Indexed secret for the previous identity (pins).
    pub previous_index_secret: Option<String>,
    /// Option flags (opt).
    pub options: Vec<OptFlag>,
    /// Button selection answering a server `ask=` prompt (btn).
    pub button: Option<u8>,
}

impl ClientParameters {
    /// Build a minimal parameter block for a command and identity key.
    pub fn new(command: Command, identity_key: VerifyingKey) -> Self {
        Self {
            protocol_version: 1,
            command,
            identity_key,
            previous_identity_key: None,
            server_unlock_key: None,
            verify_unlock_key: None,
            index_secret: None,
            previous_index_secret: None,
            options: Vec::new(),
            button: None,
        }
    }

    /// Decode a base64url-framed parameter block.
    pub fn from_base64(encoded: &str) -> Result<Self, WireError> {
        Self::from_str(&base64url::decode_str(encoded)?)
    }

    /// Encode as a base64url-framed parameter block.
    pub fn to_base64(&self) -> String {
        base64url::encode(self.to_string().as_bytes())
    }
}

impl fmt::Display for ClientParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ver = self.protocol_version.to_string();
        let cmd = self.command.to_string();
        let idk = base64url::encode(self.identity_key.as_bytes());
        let pidk = self
            .previous_identity_key
            .as_ref()
            .map(|k| base64url::encode(k.as_bytes()));
        let opt = (!self.options.is_empty()).then(|| encode_opt_list(&self.options));
        let btn = self.button.map(|b| b.to_string());

        let mut pairs: Vec<(&str, &str)> = vec![
            (VER_KEY, ver.as_str()),
            (CMD_KEY, cmd.as_str()),
            (IDK_KEY, idk.as_str()),
        ];
        if let Some(pidk) = &pidk {
            pairs.push((PIDK_KEY, pidk));
        }
        if let Some(opt) = &opt {
            pairs.push((OPT_KEY, opt));
        }
        if let Some(btn) = &btn {
            pairs.push((BTN_KEY, btn));
        }
        if let Some(suk) = &self.server_unlock_key {
            pairs.push((SUK_KEY, suk));
        }
        if let Some(vuk) = &self.verify_unlock_key {
            pairs.push((VUK_KEY, vuk));
        }
        if let Some(ins) = &self.index_secret {
            pairs.push((INS_KEY, ins));
        }
        if let Some(pins) = &self.previous_index_secret {
            pairs.push((PINS_KEY, pins));
        }
        write!(f, "{}", nv::encode(pairs))
    }
}

impl FromStr for ClientParameters {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let map = nv::parse(s)?;

        let ver = nv::required(&map, VER_KEY)?;
        let protocol_version =
            ver.parse::<u32>()
                .map_err(|_| WireError::InvalidFieldValue {
                    field: VER_KEY,
                    value: ver.to_string(),
                })?;

        let command = nv::required(&map, CMD_KEY)?.parse::<Command>()?;
        let identity_key = base64url::decode_public_key(nv::required(&map, IDK_KEY)?)?;

        let previous_identity_key = map
            .get(PIDK_KEY)
            .map(|v| base64url::decode_public_key(v))
            .transpose()?;

        let options = map
            .get(OPT_KEY)
            .map(|v| parse_opt_list(v))
            .transpose()?
            .unwrap_or_default();

        let button = map
            .get(BTN_KEY)
            .map(|v| match v.parse::<u8>() {
                Ok(b @ 1..=3) => Ok(b),
                _ => Err(WireError::InvalidFieldValue {
                    field: BTN_KEY,
                    value: v.to_string(),
                }),
            })
            .transpose()?;

        Ok(Self {
            protocol_version,
            command,
            identity_key,
            previous_identity_key,
            server_unlock_key: map.get(SUK_KEY).cloned(),
            verify_unlock_key: map.get(VUK_KEY).cloned(),
            index_secret: map.get(INS_KEY).cloned(),
            previous_index_secret: map.get(PINS_KEY).cloned(),
            options,
            button,
        })
    }
}

/// The decoded `server` field: what the server last handed the client.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerData {
    /// First message of a conversation: the original `sqrl://` URL.
    Url(SqrlUrl),
    /// Later messages: the previous reply block, parsed into fields.
    Reply(HashMap<String, String>),
}

impl ServerData {
    /// Decode the base64url `server` field. Anything starting with `sqrl`
    /// is treated as a URL; everything else as a name-value block.
    pub fn from_base64(encoded: &str) -> Result<Self, WireError> {
        let data = base64url::decode_str(encoded)?;
        if data.to_ascii_lowercase().starts_with("sqrl") {
            Ok(ServerData::Url(SqrlUrl::parse(&data)?))
        } else {
            Ok(ServerData::Reply(nv::parse(&data)?))
        }
    }

    /// The nut the client is replying against.
    pub fn nut(&self) -> Option<&str> {
        match self {
            ServerData::Url(url) => url.nut(),
            ServerData::Reply(fields) => fields.get("nut").map(String::as_str),
        }
    }
}
