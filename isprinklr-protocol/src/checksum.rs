//! Fletcher-16 checksum with modulus 255.
//!
//! Both accumulators start at zero. For each byte, `sum1 = (sum1 + byte) % 255`
//! and then `sum2 = (sum2 + sum1) % 255`. The result is `(sum2 << 8) | sum1`.
//!
//! Because of the modulus, a byte of `0xFF` contributes the same as `0x00`.

const MODULUS: u16 = 255;

/// Computes the checksum over the half-open range `bytes[start..end]`.
///
/// Panics if the range is out of bounds, like slice indexing.
pub fn checksum(bytes: &[u8], start: usize, end: usize) -> u16 {
    fletcher16(&bytes[start..end])
}

/// Computes the checksum over a whole slice.
pub fn fletcher16(data: &[u8]) -> u16 {
    let (sum1, sum2) = data.iter().fold((0u16, 0u16), |(sum1, sum2), &byte| {
        let sum1 = (sum1 + byte as u16) % MODULUS;
        (sum1, (sum2 + sum1) % MODULUS)
    });
    (sum2 << 8) | sum1
}
