use crate::{Error, ReplaceErr};

/// The engine's native integer value. Everything on the stacks and every
/// value stored in the dictionary is a `Cell`.
pub type Cell = i32;

/// Size in bytes of a raw cell in the dictionary.
pub const CELL_BYTES: usize = core::mem::size_of::<Cell>();

/// Header flag: the word executes even while compiling.
pub const FLAG_IMMEDIATE: u8 = 1 << 6;
/// Header flag: the body is `opcode, exit` and compiles to the bare opcode.
pub const FLAG_PRIM: u8 = 1 << 5;
/// The low bits of the length+flags byte hold the name length.
pub const LEN_MASK: u8 = 0x1f;
/// Longest name a header can record.
pub const MAX_NAME_LEN: usize = LEN_MASK as usize;

/// A decoded word header.
///
/// In the dictionary a header is laid out as
/// `{ length|flags, link, name bytes..., body... }`, where the first two
/// fields use the variable-length cell encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Address of the length+flags cell.
    pub addr: usize,
    pub flags: u8,
    /// Address of the previous header, 0 terminates the list.
    pub link: usize,
    pub name_addr: usize,
    pub name_len: usize,
    /// Execution token: the address of the first body byte.
    pub xt: usize,
}

impl Header {
    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.flags & FLAG_IMMEDIATE != 0
    }

    #[inline]
    pub fn is_prim(&self) -> bool {
        self.flags & FLAG_PRIM != 0
    }
}

/// Converts a cell into a dictionary address.
#[inline]
pub fn to_addr(cell: Cell) -> Result<usize, Error> {
    usize::try_from(cell).replace_err(Error::OutsideMem)
}

/// Converts a dictionary address into a cell.
///
/// Dictionaries are capped at `Cell::MAX` bytes when they are created, so
/// every in-range address fits.
#[inline]
pub fn to_cell(addr: usize) -> Cell {
    addr as Cell
}
