/// Lowercase hex encoding of a byte buffer, as published in `raw_data`.
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Parse a hex string back into bytes.
///
/// Odd-length input or any non-hex character is rejected, never truncated.
pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    hex::decode(s).ok()
}

/// Reverse whole bytes, turning a little-endian field into big-endian order.
pub fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

/// Read two bytes at `at` as a big-endian u16, if they fit.
pub fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read two bytes at `at` as a little-endian u16, if they fit.
pub fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at.checked_add(2)?)?;
    let swapped = reverse_bytes(bytes);
    Some(u16::from_be_bytes([swapped[0], swapped[1]]))
}
