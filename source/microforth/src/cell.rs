//! The cell codec.
//!
//! Cells are stored in the dictionary either with a self-describing variable
//! length encoding, or with an explicit fixed width:
//!
//! ```text
//! 0     ..= 127     0xxxxxxx
//! 128   ..= 16383   10xxxxxx xxxxxxxx
//! anything else     11111111 <raw little-endian cell>
//! ```
//!
//! Small literals, which make up most compiled code, cost a single byte.

use crate::{
    word::{Cell, CELL_BYTES},
    Error,
};

const TAG_TWO: u8 = 0x80;
const TAG_RAW: u8 = 0xff;
const TWO_MASK: u8 = 0x3f;

/// The width used for a dictionary access.
///
/// The discriminants are the values forth code passes as the `size` operand
/// of `@@`, `!!`, `,,` and `##`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemSize {
    /// Variable length: 1, 2 or `1 + CELL_BYTES` bytes.
    Var = 0,
    /// A raw native cell.
    Cell = 1,
    U8 = 2,
    U16 = 3,
    U32 = 4,
    S8 = 5,
    S16 = 6,
    S32 = 7,
    /// Variable length, always in the widest form. Used for placeholders
    /// that get patched later, so patching never changes the code size.
    VarMax = 64,
}

impl TryFrom<Cell> for MemSize {
    type Error = Error;

    fn try_from(value: Cell) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MemSize::Var,
            1 => MemSize::Cell,
            2 => MemSize::U8,
            3 => MemSize::U16,
            4 => MemSize::U32,
            5 => MemSize::S8,
            6 => MemSize::S16,
            7 => MemSize::S32,
            64 => MemSize::VarMax,
            _ => return Err(Error::InvalidSize),
        })
    }
}

/// Returns the number of bytes `v` occupies when written with `size`.
pub fn encoded_len(v: Cell, size: MemSize) -> usize {
    match size {
        MemSize::Var => match v {
            0..=127 => 1,
            128..=16383 => 2,
            _ => 1 + CELL_BYTES,
        },
        MemSize::VarMax => 1 + CELL_BYTES,
        MemSize::Cell | MemSize::U32 | MemSize::S32 => 4,
        MemSize::U16 | MemSize::S16 => 2,
        MemSize::U8 | MemSize::S8 => 1,
    }
}

#[inline]
fn span(buf_len: usize, addr: usize, len: usize) -> Result<core::ops::Range<usize>, Error> {
    match addr.checked_add(len) {
        Some(end) if end <= buf_len => Ok(addr..end),
        _ => Err(Error::OutsideMem),
    }
}

/// Writes `v` at `addr`, returning the number of bytes written.
pub fn encode(buf: &mut [u8], addr: usize, v: Cell, size: MemSize) -> Result<usize, Error> {
    let mut scratch = [0u8; 1 + CELL_BYTES];
    let len = encoded_len(v, size);
    match (size, len) {
        (MemSize::Var, 1) => scratch[0] = v as u8,
        (MemSize::Var, 2) => {
            scratch[0] = ((v >> 8) as u8) | TAG_TWO;
            scratch[1] = v as u8;
        }
        (MemSize::Var | MemSize::VarMax, _) => {
            scratch[0] = TAG_RAW;
            scratch[1..].copy_from_slice(&v.to_le_bytes());
        }
        (MemSize::Cell | MemSize::U32 | MemSize::S32, _) => {
            scratch[..4].copy_from_slice(&v.to_le_bytes());
        }
        (MemSize::U16 | MemSize::S16, _) => {
            scratch[..2].copy_from_slice(&(v as u16).to_le_bytes());
        }
        (MemSize::U8 | MemSize::S8, _) => scratch[0] = v as u8,
    }
    let range = span(buf.len(), addr, len)?;
    buf[range].copy_from_slice(&scratch[..len]);
    Ok(len)
}

/// Reads the cell at `addr`, returning the value and the number of bytes it
/// occupied.
pub fn decode(buf: &[u8], addr: usize, size: MemSize) -> Result<(Cell, usize), Error> {
    let fixed = |len: usize| span(buf.len(), addr, len).map(|r| &buf[r]);

    match size {
        MemSize::Var | MemSize::VarMax => {
            let t0 = fixed(1)?[0];
            if t0 & TAG_TWO == 0 {
                Ok((Cell::from(t0), 1))
            } else if t0 == TAG_RAW {
                let raw = &buf[span(buf.len(), addr + 1, CELL_BYTES)?];
                let mut bytes = [0u8; CELL_BYTES];
                bytes.copy_from_slice(raw);
                Ok((Cell::from_le_bytes(bytes), 1 + CELL_BYTES))
            } else {
                let t = fixed(2)?;
                Ok(((Cell::from(t0 & TWO_MASK) << 8) + Cell::from(t[1]), 2))
            }
        }
        MemSize::Cell | MemSize::U32 | MemSize::S32 => {
            let t = fixed(4)?;
            Ok((Cell::from_le_bytes([t[0], t[1], t[2], t[3]]), 4))
        }
        MemSize::U16 => {
            let t = fixed(2)?;
            Ok((Cell::from(u16::from_le_bytes([t[0], t[1]])), 2))
        }
        MemSize::S16 => {
            let t = fixed(2)?;
            Ok((Cell::from(i16::from_le_bytes([t[0], t[1]])), 2))
        }
        MemSize::U8 => Ok((Cell::from(fixed(1)?[0]), 1)),
        MemSize::S8 => Ok((Cell::from(fixed(1)?[0] as i8), 1)),
    }
}

#[cfg(test)]
pub mod test {
    use super::{decode, encode, encoded_len, MemSize};
    use crate::{word::Cell, Error};

    #[test]
    fn var_lengths() {
        let mut buf = [0u8; 16];
        let cases: &[(Cell, usize)] = &[
            (0, 1),
            (127, 1),
            (128, 2),
            (16383, 2),
            (16384, 5),
            (-1, 5),
            (Cell::MIN, 5),
            (Cell::MAX, 5),
        ];
        for &(v, len) in cases {
            assert_eq!(encoded_len(v, MemSize::Var), len);
            assert_eq!(encode(&mut buf, 3, v, MemSize::Var), Ok(len));
            assert_eq!(decode(&buf, 3, MemSize::Var), Ok((v, len)));
        }
    }

    #[test]
    fn var_bit_patterns() {
        let mut buf = [0u8; 8];
        encode(&mut buf, 0, 0x1234, MemSize::Var).unwrap();
        assert_eq!(&buf[..2], &[0x92, 0x34]);
        encode(&mut buf, 0, -2, MemSize::Var).unwrap();
        assert_eq!(&buf[..5], &[0xff, 0xfe, 0xff, 0xff, 0xff]);
        encode(&mut buf, 0, 5, MemSize::VarMax).unwrap();
        assert_eq!(&buf[..5], &[0xff, 5, 0, 0, 0]);
        assert_eq!(decode(&buf, 0, MemSize::Var), Ok((5, 5)));
    }

    #[test]
    fn fixed_widths_truncate_and_extend() {
        let mut buf = [0u8; 8];
        assert_eq!(encode(&mut buf, 0, 0x1ff, MemSize::U8), Ok(1));
        assert_eq!(decode(&buf, 0, MemSize::U8), Ok((0xff, 1)));
        assert_eq!(decode(&buf, 0, MemSize::S8), Ok((-1, 1)));

        assert_eq!(encode(&mut buf, 0, -2, MemSize::S16), Ok(2));
        assert_eq!(decode(&buf, 0, MemSize::S16), Ok((-2, 2)));
        assert_eq!(decode(&buf, 0, MemSize::U16), Ok((0xfffe, 2)));

        assert_eq!(encode(&mut buf, 0, -7, MemSize::Cell), Ok(4));
        assert_eq!(decode(&buf, 0, MemSize::Cell), Ok((-7, 4)));
        assert_eq!(decode(&buf, 0, MemSize::S32), Ok((-7, 4)));
    }

    #[test]
    fn every_narrow_value_survives() {
        let mut buf = [0u8; 4];
        let widths: &[(MemSize, Cell, Cell)] = &[
            (MemSize::U8, 0, 0xff),
            (MemSize::S8, -0x80, 0x7f),
            (MemSize::U16, 0, 0xffff),
            (MemSize::S16, -0x8000, 0x7fff),
        ];
        for &(size, lo, hi) in widths {
            let len = encoded_len(0, size);
            for v in lo..=hi {
                assert_eq!(encode(&mut buf, 0, v, size), Ok(len), "{size:?} {v}");
                assert_eq!(decode(&buf, 0, size), Ok((v, len)), "{size:?} {v}");
            }
        }
    }

    #[test]
    fn var_length_boundaries() {
        let mut buf = [0u8; 8];
        let edges = [
            0, 127, 128, 16383, 16384, Cell::MAX, Cell::MIN, -1, -128, -16384,
        ];
        for edge in edges {
            for v in (-2..=2).map(|d: Cell| edge.wrapping_add(d)) {
                let len = encoded_len(v, MemSize::Var);
                assert_eq!(encode(&mut buf, 1, v, MemSize::Var), Ok(len), "{v}");
                assert_eq!(decode(&buf, 1, MemSize::Var), Ok((v, len)), "{v}");

                assert_eq!(encode(&mut buf, 1, v, MemSize::VarMax), Ok(5), "{v}");
                assert_eq!(decode(&buf, 1, MemSize::Var), Ok((v, 5)), "{v}");
            }
        }
    }

    #[test]
    fn bounds() {
        let mut buf = [0u8; 4];
        assert_eq!(encode(&mut buf, 3, 1, MemSize::U8), Ok(1));
        assert_eq!(encode(&mut buf, 3, 1, MemSize::U16), Err(Error::OutsideMem));
        assert_eq!(
            encode(&mut buf, 0, -1, MemSize::Var),
            Err(Error::OutsideMem)
        );
        assert_eq!(decode(&buf, 4, MemSize::Var), Err(Error::OutsideMem));
        assert_eq!(
            decode(&buf, usize::MAX, MemSize::Cell),
            Err(Error::OutsideMem)
        );

        buf[3] = 0x81;
        assert_eq!(decode(&buf, 3, MemSize::Var), Err(Error::OutsideMem));
    }

    #[test]
    fn sizes_from_cells() {
        assert_eq!(MemSize::try_from(0), Ok(MemSize::Var));
        assert_eq!(MemSize::try_from(64), Ok(MemSize::VarMax));
        assert_eq!(MemSize::try_from(8), Err(Error::InvalidSize));
        assert_eq!(MemSize::try_from(-1), Err(Error::InvalidSize));
    }
}
