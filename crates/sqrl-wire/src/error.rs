//! Error types for wire-format encoding and decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding SQRL wire data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// The input was not valid base64url.
    #[error("invalid base64url data")]
    InvalidBase64,

    /// Decoded bytes were not valid UTF-8.
    #[error("decoded data is not valid UTF-8")]
    InvalidUtf8,

    /// A name-value line had no `=` separator.
    #[error("malformed line in name-value block: {0:?}")]
    MalformedLine(String),

    /// A required field was absent from a name-value block.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but its value could not be parsed.
    #[error("invalid value for {field}: {value:?}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
    },

    /// The bytes did not form a valid Ed25519 public key.
    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,

    /// The bytes did not form a 64-byte Ed25519 signature.
    #[error("invalid Ed25519 signature")]
    InvalidSignature,

    /// The `cmd` field named a command this protocol revision does not know.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// The `opt` field carried a flag this protocol revision does not know.
    #[error("unknown option flag: {0:?}")]
    UnknownOption(String),

    /// The URL scheme was not `sqrl`.
    #[error("not an sqrl:// url: {0:?}")]
    NotSqrlScheme(String),

    /// The URL could not be split into its components.
    #[error("unparseable url: {0:?}")]
    InvalidUrl(String),

    /// The `tif` field was not lowercase hexadecimal.
    #[error("invalid tif value: {0:?}")]
    InvalidTif(String),
}
