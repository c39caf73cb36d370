use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Formatter};

/// Which firmware layout a reading was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ATC1441 custom firmware, 13 bytes, big-endian.
    Atc1441,
    /// PVVX custom firmware, 15+ bytes, little-endian.
    Pvvx,
}

/// An exact fixed-point number: `raw / 10^exp`.
///
/// Keeps the integer the sensor sent so `25.0` never turns into
/// `24.999999`. Serialized as an integer when `exp` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaled {
    pub raw: i32,
    pub exp: u8,
}

impl Scaled {
    pub const fn new(raw: i32, exp: u8) -> Self {
        Self { raw, exp }
    }

    pub const fn whole(raw: i32) -> Self {
        Self { raw, exp: 0 }
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.raw) / 10f64.powi(i32::from(self.exp))
    }
}

impl Display for Scaled {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.exp == 0 {
            return write!(f, "{}", self.raw);
        }
        let Some(div) = 10u32.checked_pow(u32::from(self.exp)) else {
            return write!(f, "{}", self.to_f64());
        };
        let abs = self.raw.unsigned_abs();
        let sign = if self.raw < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / div,
            abs % div,
            width = usize::from(self.exp)
        )
    }
}

impl Serialize for Scaled {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.exp == 0 {
            serializer.serialize_i32(self.raw)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

/// A fully decoded sensor advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedReading {
    pub dialect: Dialect,
    /// Sensor MAC as carried in the payload, most significant byte first.
    #[serde(serialize_with = "serialize_mac")]
    pub mac: [u8; 6],
    /// Degrees Celsius.
    pub temperature: Scaled,
    /// Relative humidity, percent.
    pub humidity: Scaled,
    pub battery_percent: u8,
    pub battery_millivolts: Scaled,
    /// Rolling advertisement counter, lets receivers drop retransmissions.
    pub counter: u8,
    /// PVVX status flags; absent for ATC1441.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<u8>,
}

/// Format a MAC as lowercase colon-separated hex (`a4:c1:38:5b:0e:df`).
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn serialize_mac<S: Serializer>(mac: &[u8; 6], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_mac(mac))
}

impl Display for DecodedReading {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} {}: {} °C, {}%, battery {}% ({} mV), counter {}",
            self.dialect,
            format_mac(&self.mac),
            self.temperature,
            self.humidity,
            self.battery_percent,
            self.battery_millivolts,
            self.counter
        )?;
        if let Some(flag) = self.flag {
            write!(f, ", flag {flag:#04x}")?;
        }
        Ok(())
    }
}
