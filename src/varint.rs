//! SMILE's variable-length integer. Continuation bytes keep their high bit
//! clear and contribute 7 bits each, most significant group first; the final
//! byte sets its high bit and contributes only its low 6 bits.

use byteorder::ReadBytesExt;

use crate::bits;
use crate::error::{Error, Result};

/// Longest legal encoding: nine continuation bytes plus the terminator cover
/// the full 64-bit range.
const MAX_LEN: usize = 10;

/// Append the encoding of `n`. Values below 64 take a single byte.
pub fn write_unsigned(buf: &mut Vec<u8>, n: u64) {
    let mut tmp = [0u8; MAX_LEN];
    let mut i = MAX_LEN - 1;
    tmp[i] = 0x80 | (n as u8 & 0x3F);
    let mut n = n >> 6;
    while n != 0 {
        i -= 1;
        tmp[i] = (n & 0x7F) as u8;
        n >>= 7;
    }
    buf.extend_from_slice(&tmp[i..]);
}

/// Consume one varint from the front of `buf`. Fails if the terminator does
/// not arrive within ten bytes or the value overflows 64 bits.
pub fn read_unsigned(buf: &mut &[u8], step: &'static str) -> Result<u64> {
    let mut acc: u64 = 0;
    for _ in 0..MAX_LEN {
        let byte = buf.read_u8().map_err(|_| Error::LengthTooShort {
            step,
            actual: 0,
            expected: 1,
        })?;
        if byte & 0x80 != 0 {
            if acc >> 58 != 0 {
                return Err(Error::BadDecode(format!(
                    "varint overflows 64 bits in {}",
                    step
                )));
            }
            return Ok((acc << 6) | u64::from(byte & 0x3F));
        }
        if acc >> 57 != 0 {
            return Err(Error::BadDecode(format!(
                "varint overflows 64 bits in {}",
                step
            )));
        }
        acc = (acc << 7) | u64::from(byte);
    }
    Err(Error::BadDecode(format!(
        "varint did not terminate within {} bytes in {}",
        MAX_LEN, step
    )))
}

/// Append the zigzag-then-varint encoding of `n`.
pub fn write_signed(buf: &mut Vec<u8>, n: i64) {
    write_unsigned(buf, bits::zigzag_encode(n));
}

/// Consume a zigzag varint from the front of `buf`.
pub fn read_signed(buf: &mut &[u8], step: &'static str) -> Result<i64> {
    Ok(bits::zigzag_decode(read_unsigned(buf, step)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_unsigned() {
        for s in 0..64 {
            for delta in [0u64, 1, 2] {
                let mut buf = Vec::new();
                let n = (1u64 << s).wrapping_sub(delta);
                write_unsigned(&mut buf, n);
                let mut read = &buf[..];
                assert_eq!(read_unsigned(&mut read, "test").unwrap(), n);
                assert!(read.is_empty(), "all bytes should be consumed");
            }
        }
    }

    #[test]
    fn encoded_lengths() {
        let cases: &[(u64, usize)] = &[
            (0, 1),
            (63, 1),
            (64, 2),
            (1 << 13, 3),
            ((1 << 13) - 1, 2),
            (u64::from(u32::MAX), 5),
            (u64::MAX, 10),
        ];
        for &(n, len) in cases {
            let mut buf = Vec::new();
            write_unsigned(&mut buf, n);
            assert_eq!(buf.len(), len, "length of {}", n);
        }
    }

    #[test]
    fn terminator_carries_low_bits() {
        let mut buf = Vec::new();
        write_unsigned(&mut buf, 0x27);
        assert_eq!(buf, &[0x80 | 0x27]);

        let mut buf = Vec::new();
        write_unsigned(&mut buf, 0x40);
        assert_eq!(buf, &[0x01, 0x80]);
    }

    #[test]
    fn unterminated_input() {
        let mut buf = &[0x01u8, 0x02, 0x03][..];
        assert!(matches!(
            read_unsigned(&mut buf, "test"),
            Err(Error::LengthTooShort { .. })
        ));

        let mut buf = &[0x01u8; 16][..];
        assert!(matches!(
            read_unsigned(&mut buf, "test"),
            Err(Error::BadDecode(_))
        ));
    }

    #[test]
    fn encode_decode_signed() {
        for n in [0i64, 1, -1, 15, -16, i32::MAX as i64, i64::MIN, i64::MAX] {
            let mut buf = Vec::new();
            write_signed(&mut buf, n);
            assert_eq!(read_signed(&mut &buf[..], "test").unwrap(), n);
        }
    }
}
