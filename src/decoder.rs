use crate::dialect;
use crate::error::DecodeError;
use crate::hexutil;
use crate::locator::{self, MARKER};
use crate::reading::DecodedReading;
use serde::Deserialize;

/// How to read the ATC1441 battery voltage field.
///
/// Firmware revisions disagree: some publish millivolts, some a value that
/// needs dividing by ten. Nothing in the payload says which.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AtcVoltage {
    /// Publish the field as sent.
    #[default]
    Raw,
    /// Divide the field by 10.
    Tenths,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub atc_voltage: AtcVoltage,
}

/// Decode a raw advertisement with default options.
///
/// Returns `None` for anything that is not a well-formed sensor packet.
/// Never panics, whatever the input.
pub fn decode(raw: &[u8]) -> Option<DecodedReading> {
    decode_with(raw, &DecodeOptions::default())
}

pub fn decode_with(raw: &[u8], opts: &DecodeOptions) -> Option<DecodedReading> {
    try_decode(raw, opts).ok()
}

/// Decode the lowercase hex form of an advertisement.
pub fn decode_hex(hex: &str) -> Option<DecodedReading> {
    try_decode_hex(hex, &DecodeOptions::default()).ok()
}

pub fn try_decode_hex(hex: &str, opts: &DecodeOptions) -> Result<DecodedReading, DecodeError> {
    let raw = hexutil::from_hex(hex).ok_or(DecodeError::InvalidHex)?;
    try_decode(&raw, opts)
}

/// Like [`decode_with`], but says why nothing came out.
pub fn try_decode(raw: &[u8], opts: &DecodeOptions) -> Result<DecodedReading, DecodeError> {
    let offset = locator::locate(raw, MARKER).ok_or(DecodeError::NoMarkerFound)?;
    let section = raw.get(offset..).ok_or(DecodeError::NoMarkerFound)?;
    let dialect = dialect::classify(section.len());
    dialect::extract(section, dialect, opts)
}
