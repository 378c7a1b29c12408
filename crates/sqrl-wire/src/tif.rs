//! Transaction Information Flags.
//!
//! Every server reply carries a `tif=` field: a bit-packed integer rendered
//! as lowercase hexadecimal without prefix.

use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of Transaction Information Flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tif(u16);

impl Tif {
    /// The presented identity key matches a known identity.
    pub const CURRENT_ID_MATCH: Tif = Tif(0x001);
    /// The presented previous identity key matches a known identity.
    pub const PREVIOUS_ID_MATCH: Tif = Tif(0x002);
    /// The request came from the same IP address that was issued the nut.
    pub const IP_ADDRESSES_MATCH: Tif = Tif(0x004);
    /// SQRL authentication is disabled for the matched identity.
    pub const ID_DISABLED: Tif = Tif(0x008);
    /// The server does not implement the requested function.
    pub const FUNCTION_NOT_SUPPORTED: Tif = Tif(0x010);
    /// The server hit a transient failure; the client should retry.
    pub const TRANSIENT_ERROR: Tif = Tif(0x020);
    /// The requested command was not executed.
    pub const COMMAND_FAILED: Tif = Tif(0x040);
    /// The failure was caused by the client's request.
    pub const CLIENT_FAILURE: Tif = Tif(0x080);
    /// The identity presented does not belong to this conversation.
    pub const BAD_ID_ASSOCIATION: Tif = Tif(0x100);

    /// The empty flag set.
    pub const fn empty() -> Self {
        Tif(0)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Tif) -> bool {
        self.0 & other.0 == other.0
    }

    /// Render as lowercase hex, the wire form of the `tif=` field.
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse the wire form back into a bit set.
    pub fn from_hex(value: &str) -> Result<Self, WireError> {
        u16::from_str_radix(value, 16)
            .map(Tif)
            .map_err(|_| WireError::InvalidTif(value.to_string()))
    }
}

impl BitOr for Tif {
    type Output = Tif;

    fn bitor(self, rhs: Tif) -> Tif {
        Tif(self.0 | rhs.0)
    }
}

impl BitOrAssign for Tif {
    fn bitor_assign(&mut self, rhs: Tif) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Tif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}
