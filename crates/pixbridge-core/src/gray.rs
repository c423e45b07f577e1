//! Reflected binary (Gray) code.
//!
//! Queue pointers are handed to the other domain only in this encoding.
//! Incrementing a counter flips exactly one bit of its Gray image, so an
//! observer that samples mid-update decodes either the old or the new
//! position and never a third one.

/// Encode a binary counter value.
#[inline]
pub const fn to_gray(value: u32) -> u32 {
    value ^ (value >> 1)
}

/// Decode a Gray value back to binary.
#[inline]
pub const fn from_gray(gray: u32) -> u32 {
    let mut value = gray;
    value ^= value >> 16;
    value ^= value >> 8;
    value ^= value >> 4;
    value ^= value >> 2;
    value ^= value >> 1;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inverts_encode() {
        for value in (0..4096).chain([u32::MAX - 1, u32::MAX]) {
            assert_eq!(from_gray(to_gray(value)), value);
        }
    }

    #[test]
    fn successive_values_differ_in_one_bit() {
        for value in 0..4095u32 {
            let diff = to_gray(value) ^ to_gray(value + 1);
            assert_eq!(diff.count_ones(), 1, "step {value} -> {}", value + 1);
        }
    }

    #[test]
    fn wrap_of_a_pointer_width_is_single_bit() {
        // A 4-bit pointer (capacity 8) wraps from 15 back to 0.
        let mask = 0xF;
        assert_eq!((to_gray(mask) ^ to_gray(0)).count_ones(), 1);
    }
}
