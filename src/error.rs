use thiserror::Error;

/// Why an advertisement produced no reading.
///
/// `decode` swallows all of these; `try_decode` exposes them for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No 0x181A marker at a known offset. The normal case for unrelated devices.
    #[error("no sensor marker in advertisement")]
    NoMarkerFound,
    /// Marker found but the payload is too short for its layout.
    #[error("malformed payload: need {needed} bytes after marker, have {available}")]
    MalformedPayload { needed: usize, available: usize },
    /// Hex input with odd length or non-hex characters.
    #[error("invalid hex input")]
    InvalidHex,
    /// Marker found but no layout matched. Cannot happen while length alone
    /// picks the layout.
    #[error("unknown payload layout ({0} bytes)")]
    UnknownDialect(usize),
}
