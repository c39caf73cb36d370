// Locates the 0x181A service-data marker inside a raw advertisement.

/// Environmental Sensing service UUID 0x181A as transmitted (little-endian).
pub const MARKER: [u8; 2] = [0x1a, 0x18];

/// Marker offset when the service-data AD structure comes first:
/// `len, 0x16, 1a 18, ...`
const MARKER_AT_NO_FLAGS: usize = 2;

/// Marker offset behind a 3-byte flags AD structure:
/// `02 01 06, len, 0x16, 1a 18, ...`
const MARKER_AT_AFTER_FLAGS: usize = 5;

/// Return the offset right after `marker`, or `None` if it sits at neither
/// known position. The lower offset is checked first and wins.
pub fn locate(raw: &[u8], marker: [u8; 2]) -> Option<usize> {
    [MARKER_AT_NO_FLAGS, MARKER_AT_AFTER_FLAGS]
        .into_iter()
        .find(|&at| raw.get(at..at + 2) == Some(&marker[..]))
        .map(|at| at + 2)
}

/// Rebuild the service-data AD structure for a 16-bit UUID.
///
/// BlueZ hands out service data already split per UUID, so this puts the
/// bytes back in the layout they had on air (no flags prefix).
pub fn service_data_ad(uuid16: u16, payload: &[u8]) -> Option<Vec<u8>> {
    // length covers the AD type, the UUID and the payload
    let len = u8::try_from(payload.len() + 3).ok()?;
    let mut ad = Vec::with_capacity(payload.len() + 4);
    ad.push(len);
    ad.push(0x16);
    ad.extend_from_slice(&uuid16.to_le_bytes());
    ad.extend_from_slice(payload);
    Some(ad)
}
