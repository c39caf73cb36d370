//! Layout classification and field extraction for ATC1441 and PVVX payloads.
//!
//! Both firmwares send service data under UUID 0x181A and there is no
//! version byte, so the number of bytes after the marker is the only thing
//! that tells them apart.
//!
//! ATC1441 (13 bytes, big-endian):
//!
//! | Offset | Field | Type |
//! |--------|-------|------|
//! | 0-5 | MAC | 6 bytes |
//! | 6-7 | Temperature | i16 BE, x0.1 °C |
//! | 8 | Humidity | u8, % |
//! | 9 | Battery level | u8, % |
//! | 10-11 | Battery voltage | u16 BE, mV |
//! | 12 | Counter | u8 |
//!
//! PVVX custom (15 bytes or more, little-endian):
//!
//! | Offset | Field | Type |
//! |--------|-------|------|
//! | 0-5 | MAC | 6 bytes, reversed |
//! | 6-7 | Temperature | i16 LE, x0.01 °C |
//! | 8-9 | Humidity | u16 LE, x0.01 % |
//! | 10-11 | Battery voltage | u16 LE, mV |
//! | 12 | Battery level | u8, % |
//! | 13 | Counter | u8 |
//! | 14 | Flags | u8 |

use crate::decoder::{AtcVoltage, DecodeOptions};
use crate::error::DecodeError;
use crate::hexutil::{be_u16, le_u16, reverse_bytes};
use crate::reading::{DecodedReading, Dialect, Scaled};

/// Exact section length of an ATC1441 advertisement.
pub const ATC1441_LEN: usize = 13;

/// Minimum section length of a PVVX advertisement.
pub const PVVX_MIN_LEN: usize = 15;

/// Pick the layout for a section of `len` bytes following the marker.
pub fn classify(len: usize) -> Dialect {
    if len == ATC1441_LEN {
        Dialect::Atc1441
    } else {
        Dialect::Pvvx
    }
}

/// Bytes a layout needs after the marker.
pub fn required_len(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Atc1441 => ATC1441_LEN,
        Dialect::Pvvx => PVVX_MIN_LEN,
    }
}

/// Decode `section` (everything after the marker) as `dialect`.
pub fn extract(
    section: &[u8],
    dialect: Dialect,
    opts: &DecodeOptions,
) -> Result<DecodedReading, DecodeError> {
    let needed = required_len(dialect);
    let malformed = || DecodeError::MalformedPayload {
        needed,
        available: section.len(),
    };
    if section.len() < needed {
        return Err(malformed());
    }

    match dialect {
        Dialect::Atc1441 => extract_atc1441(section, opts).ok_or_else(malformed),
        Dialect::Pvvx => extract_pvvx(section).ok_or_else(malformed),
    }
}

fn mac_at_start(section: &[u8]) -> Option<[u8; 6]> {
    section.get(..6)?.try_into().ok()
}

fn extract_atc1441(section: &[u8], opts: &DecodeOptions) -> Option<DecodedReading> {
    let mac = mac_at_start(section)?;
    let temperature = be_u16(section, 6)? as i16;
    let millivolts = i32::from(be_u16(section, 10)?);

    let battery_millivolts = match opts.atc_voltage {
        AtcVoltage::Raw => Scaled::whole(millivolts),
        AtcVoltage::Tenths => Scaled::new(millivolts, 1),
    };

    Some(DecodedReading {
        dialect: Dialect::Atc1441,
        mac,
        temperature: Scaled::new(i32::from(temperature), 1),
        humidity: Scaled::whole(i32::from(*section.get(8)?)),
        battery_percent: *section.get(9)?,
        battery_millivolts,
        counter: *section.get(12)?,
        flag: None,
    })
}

fn extract_pvvx(section: &[u8]) -> Option<DecodedReading> {
    // PVVX sends the MAC least significant byte first
    let mac: [u8; 6] = reverse_bytes(section.get(..6)?).try_into().ok()?;
    let temperature = le_u16(section, 6)? as i16;

    Some(DecodedReading {
        dialect: Dialect::Pvvx,
        mac,
        temperature: Scaled::new(i32::from(temperature), 2),
        humidity: Scaled::new(i32::from(le_u16(section, 8)?), 2),
        battery_percent: *section.get(12)?,
        battery_millivolts: Scaled::whole(i32::from(le_u16(section, 10)?)),
        counter: *section.get(13)?,
        flag: Some(*section.get(14)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0xa4, 0xc1, 0x38, 0x5b, 0x0e, 0xdf];

    fn atc(temp: [u8; 2], hum: u8, batt: u8, mv: [u8; 2], counter: u8) -> Vec<u8> {
        let mut v = MAC.to_vec();
        v.extend_from_slice(&temp);
        v.extend_from_slice(&[hum, batt]);
        v.extend_from_slice(&mv);
        v.push(counter);
        v
    }

    #[test]
    fn length_is_the_only_discriminant() {
        assert_eq!(classify(13), Dialect::Atc1441);
        assert_eq!(classify(15), Dialect::Pvvx);
        assert_eq!(classify(19), Dialect::Pvvx);
        assert_eq!(classify(0), Dialect::Pvvx);
        assert_eq!(classify(12), Dialect::Pvvx);
    }

    #[test]
    fn atc1441_fields() {
        let section = atc([0x00, 0xe7], 40, 89, [0x0b, 0xb8], 42);
        let r = extract(&section, Dialect::Atc1441, &DecodeOptions::default()).unwrap();
        assert_eq!(r.mac, MAC);
        assert_eq!(r.temperature, Scaled::new(231, 1));
        assert_eq!(r.humidity, Scaled::whole(40));
        assert_eq!(r.battery_percent, 89);
        assert_eq!(r.battery_millivolts, Scaled::whole(3000));
        assert_eq!(r.counter, 42);
        assert_eq!(r.flag, None);
    }

    #[test]
    fn atc1441_voltage_in_tenths() {
        let section = atc([0x00, 0xe7], 40, 89, [0x0b, 0xb8], 42);
        let opts = DecodeOptions {
            atc_voltage: AtcVoltage::Tenths,
        };
        let r = extract(&section, Dialect::Atc1441, &opts).unwrap();
        assert_eq!(r.battery_millivolts, Scaled::new(3000, 1));
        assert_eq!(r.battery_millivolts.to_string(), "300.0");
    }

    #[test]
    fn atc1441_negative_temperature() {
        let section = atc([0xff, 0xce], 40, 89, [0, 0], 0);
        let r = extract(&section, Dialect::Atc1441, &DecodeOptions::default()).unwrap();
        assert_eq!(r.temperature.to_f64(), -5.0);
    }

    #[test]
    fn pvvx_fields() {
        let section = [
            0xdf, 0x0e, 0x5b, 0x38, 0xc1, 0xa4, // MAC, reversed
            0x06, 0x09, // 2310 -> 23.10 °C
            0xa0, 0x0f, // 4000 -> 40.00 %
            0x3a, 0x0c, // 3130 mV
            0x64, // 100 %
            0x03, // counter
            0x05, // flags
        ];
        let r = extract(&section, Dialect::Pvvx, &DecodeOptions::default()).unwrap();
        assert_eq!(r.mac, MAC);
        assert_eq!(r.temperature, Scaled::new(2310, 2));
        assert_eq!(r.humidity, Scaled::new(4000, 2));
        assert_eq!(r.battery_millivolts, Scaled::whole(3130));
        assert_eq!(r.battery_percent, 100);
        assert_eq!(r.counter, 3);
        assert_eq!(r.flag, Some(5));
    }

    #[test]
    fn pvvx_negative_temperature() {
        let mut section = [0u8; 15];
        section[6] = 0xda;
        section[7] = 0xfd;
        let r = extract(&section, Dialect::Pvvx, &DecodeOptions::default()).unwrap();
        assert_eq!(r.temperature.to_string(), "-5.50");
    }

    #[test]
    fn short_sections_are_malformed() {
        let err = extract(&[0u8; 14], Dialect::Pvvx, &DecodeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedPayload {
                needed: 15,
                available: 14
            }
        );
        assert!(extract(&[0u8; 12], Dialect::Atc1441, &DecodeOptions::default()).is_err());
        assert!(extract(&[], Dialect::Pvvx, &DecodeOptions::default()).is_err());
    }
}
