// src/utils/conversion.rs
//! PCM conversion utilities
//!
//! The transport delivers raw little-endian int16 bytes and expects the same back.
//! Everything in between runs in `f64`; conversions back to int16 saturate.

/// Bytes per int16 PCM sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert little-endian int16 PCM bytes to samples. A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Convert samples to little-endian int16 PCM bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Truncate toward zero into the int16 range. NaN maps to 0.
#[inline]
pub fn to_i16_saturating(value: f64) -> i16 {
    value as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 1234];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(bytes_to_samples(&bytes), samples);
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(bytes_to_samples(&[0x34, 0x12]), vec![0x1234]);
        assert_eq!(samples_to_bytes(&[0x1234]), vec![0x34, 0x12]);
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        assert_eq!(bytes_to_samples(&[1, 0, 7]), vec![1]);
    }

    #[test]
    fn test_saturating_conversion() {
        assert_eq!(to_i16_saturating(40_000.0), i16::MAX);
        assert_eq!(to_i16_saturating(-40_000.0), i16::MIN);
        assert_eq!(to_i16_saturating(12.9), 12);
        assert_eq!(to_i16_saturating(-12.9), -12);
        assert_eq!(to_i16_saturating(f64::NAN), 0);
    }
}
