use crate::decoder::{self, DecodeOptions};
use crate::error::DecodeError;
use crate::hexutil;
use crate::reading::DecodedReading;
use log::debug;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One advertisement as published over MQTT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvertisementRecord {
    /// Lowercase colon-separated device address, also the topic suffix.
    pub addr: String,
    pub rssi: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub raw_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DecodedReading>,
    pub timestamp: String,
}

impl AdvertisementRecord {
    /// Decode `raw` and wrap it with the scan metadata.
    ///
    /// A failed decode still yields a record, just without `data`.
    pub fn from_advertisement(
        addr: &str,
        rssi: i16,
        name: Option<String>,
        raw: &[u8],
        opts: &DecodeOptions,
        seen_at: OffsetDateTime,
    ) -> Self {
        let data = match decoder::try_decode(raw, opts) {
            Ok(reading) => Some(reading),
            Err(DecodeError::NoMarkerFound) => None,
            Err(e) => {
                debug!("{addr}: {e}");
                None
            }
        };

        Self {
            addr: addr.to_lowercase(),
            rssi,
            name,
            raw_data: hexutil::to_hex(raw),
            data,
            timestamp: seen_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| seen_at.unix_timestamp().to_string()),
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.data.is_some()
    }

    pub fn topic(&self, prefix: &str) -> String {
        format!("{prefix}/{}", self.addr)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(raw: &[u8]) -> AdvertisementRecord {
        AdvertisementRecord::from_advertisement(
            "A4:C1:38:5B:0E:DF",
            -71,
            Some("ATC_5B0EDF".into()),
            raw,
            &DecodeOptions::default(),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn decoded_record() {
        let raw = hexutil::from_hex("10161a18a4c1385b0edf00fa32640bb801").unwrap();
        let rec = record(&raw);
        assert!(rec.is_decoded());
        assert_eq!(rec.addr, "a4:c1:38:5b:0e:df");
        assert_eq!(rec.topic("ble"), "ble/a4:c1:38:5b:0e:df");
        assert_eq!(rec.timestamp, "1970-01-01T00:00:00Z");

        let json: serde_json::Value = serde_json::from_slice(&rec.to_json().unwrap()).unwrap();
        assert_eq!(json["rssi"], -71);
        assert_eq!(json["name"], "ATC_5B0EDF");
        assert_eq!(json["raw_data"], "10161a18a4c1385b0edf00fa32640bb801");
        assert_eq!(json["data"]["temperature"], 25.0);
        assert_eq!(json["data"]["counter"], 1);
    }

    #[test]
    fn undecoded_record_omits_data() {
        let rec = record(&[0x02, 0x01, 0x06]);
        assert!(!rec.is_decoded());
        let json: serde_json::Value = serde_json::from_slice(&rec.to_json().unwrap()).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["raw_data"], "020106");
    }
}
