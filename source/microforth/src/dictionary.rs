//! The dictionary store.
//!
//! A single caller-provided byte region holds everything the engine knows:
//!
//! ```text
//! 0               28                                        HERE          len
//! +---------------+-----------------------------------------+-------------+
//! | user var slots| header, body, header, body, ...         | free        |
//! +---------------+-----------------------------------------+-------------+
//! ```
//!
//! User variable slots are raw little-endian cells. Word headers and code use
//! the [cell codec](crate::cell). Words are chained through their link field,
//! newest first, starting at `latest`.

use crate::{
    cell::{self, MemSize},
    word::{to_addr, to_cell, Cell, Header, CELL_BYTES, FLAG_IMMEDIATE, LEN_MASK, MAX_NAME_LEN},
    Error,
};

pub const USERVAR_COUNT: usize = 7;
/// Bytes reserved for the user variable slots. This is also the initial HERE.
pub const USERVAR_BYTES: usize = USERVAR_COUNT * CELL_BYTES;

/// Engine settings that are visible to (and writable from) forth code.
///
/// Forth code refers to a user variable by its id, which is also the
/// value the matching bootstrap word pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UserVar {
    /// The compilation cursor.
    Here = 0,
    /// Header address of the most recent definition.
    Latest = 1,
    Trace = 2,
    Compiling = 3,
    /// Set by `postpone`: compile the next word even if it is immediate.
    Postpone = 4,
    /// Data stack depth.
    Dsp = 5,
    /// Return stack depth.
    Rsp = 6,
}

impl UserVar {
    pub const ALL: [UserVar; USERVAR_COUNT] = [
        UserVar::Here,
        UserVar::Latest,
        UserVar::Trace,
        UserVar::Compiling,
        UserVar::Postpone,
        UserVar::Dsp,
        UserVar::Rsp,
    ];

    /// The name of the word that pushes this variable's id.
    pub fn name(self) -> &'static str {
        match self {
            UserVar::Here => "h",
            UserVar::Latest => "latest",
            UserVar::Trace => "trace",
            UserVar::Compiling => "compiling",
            UserVar::Postpone => "_postpone",
            UserVar::Dsp => "dsp",
            UserVar::Rsp => "rsp",
        }
    }

    #[inline]
    pub fn id(self) -> usize {
        self as usize
    }

    /// Byte offset of this variable's slot.
    #[inline]
    pub fn slot(self) -> usize {
        self.id() * CELL_BYTES
    }
}

impl TryFrom<usize> for UserVar {
    type Error = Error;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        UserVar::ALL.get(id).copied().ok_or(Error::InvalidUservar)
    }
}

pub struct Dictionary<'buf> {
    mem: &'buf mut [u8],
}

impl<'buf> Dictionary<'buf> {
    /// Wraps `mem` without touching its contents.
    ///
    /// The region must at least hold the user variable slots, and must be
    /// addressable by a [`Cell`].
    pub fn new(mem: &'buf mut [u8]) -> Result<Self, Error> {
        if mem.len() < USERVAR_BYTES || mem.len() > Cell::MAX as usize {
            return Err(Error::OutsideMem);
        }
        Ok(Self { mem })
    }

    /// Zeroes the whole region and points HERE just past the user variables.
    pub fn reset(&mut self) {
        self.mem.fill(0);
        self.set_here(USERVAR_BYTES);
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.mem
    }

    /// Reads a user variable slot.
    pub fn var(&self, var: UserVar) -> Cell {
        let at = var.slot();
        let mut raw = [0u8; CELL_BYTES];
        raw.copy_from_slice(&self.mem[at..at + CELL_BYTES]);
        Cell::from_le_bytes(raw)
    }

    pub fn set_var(&mut self, var: UserVar, val: Cell) {
        let at = var.slot();
        let slot = &mut self.mem[at..at + CELL_BYTES];
        slot.copy_from_slice(&val.to_le_bytes());
    }

    #[inline]
    pub fn here(&self) -> Result<usize, Error> {
        to_addr(self.var(UserVar::Here))
    }

    #[inline]
    pub fn set_here(&mut self, addr: usize) {
        self.set_var(UserVar::Here, to_cell(addr));
    }

    #[inline]
    pub fn latest(&self) -> Result<usize, Error> {
        to_addr(self.var(UserVar::Latest))
    }

    #[inline]
    pub fn is_compiling(&self) -> bool {
        self.var(UserVar::Compiling) != 0
    }

    #[inline]
    pub fn get(&self, addr: usize, size: MemSize) -> Result<(Cell, usize), Error> {
        cell::decode(self.mem, addr, size)
    }

    #[inline]
    pub fn put(&mut self, addr: usize, val: Cell, size: MemSize) -> Result<usize, Error> {
        cell::encode(self.mem, addr, val, size)
    }

    /// Returns `len` bytes starting at `addr`.
    pub fn bytes(&self, addr: usize, len: usize) -> Result<&[u8], Error> {
        let end = addr.checked_add(len).ok_or(Error::OutsideMem)?;
        self.mem.get(addr..end).ok_or(Error::OutsideMem)
    }

    pub fn put_bytes(&mut self, addr: usize, bytes: &[u8]) -> Result<(), Error> {
        let end = addr.checked_add(bytes.len()).ok_or(Error::OutsideMem)?;
        self.mem
            .get_mut(addr..end)
            .ok_or(Error::OutsideMem)?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Appends `val` at HERE with the given width and advances HERE.
    pub fn add_cell_typed(&mut self, val: Cell, size: MemSize) -> Result<usize, Error> {
        let here = self.here()?;
        let len = self.put(here, val, size)?;
        self.set_here(here + len);
        Ok(len)
    }

    #[inline]
    pub fn add_cell(&mut self, val: Cell) -> Result<usize, Error> {
        self.add_cell_typed(val, MemSize::Var)
    }

    #[inline]
    pub fn add_op(&mut self, op: u8) -> Result<usize, Error> {
        self.add_cell(Cell::from(op))
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let here = self.here()?;
        self.put_bytes(here, bytes)?;
        self.set_here(here + bytes.len());
        Ok(())
    }

    /// Appends a new header and makes it the latest word. The body is
    /// whatever gets appended next.
    pub fn create(&mut self, name: &[u8], flags: u8) -> Result<usize, Error> {
        if name.len() > MAX_NAME_LEN {
            return Err(Error::InternalError);
        }
        let start = self.here()?;
        let link = self.var(UserVar::Latest);
        self.add_cell(Cell::from(name.len() as u8 | (flags & !LEN_MASK)))?;
        self.add_cell(link)?;
        self.add_bytes(name)?;
        self.set_var(UserVar::Latest, to_cell(start));
        Ok(start)
    }

    /// Decodes the header at `addr`.
    pub fn header(&self, addr: usize) -> Result<Header, Error> {
        let (lenflags, n0) = self.get(addr, MemSize::Var)?;
        let (link, n1) = self.get(addr + n0, MemSize::Var)?;
        let flags = lenflags as u8;
        let name_addr = addr + n0 + n1;
        let name_len = usize::from(flags & LEN_MASK);
        // the name must be in bounds, the body may be empty
        self.bytes(name_addr, name_len)?;
        Ok(Header {
            addr,
            flags: flags & !LEN_MASK,
            link: to_addr(link)?,
            name_addr,
            name_len,
            xt: name_addr + name_len,
        })
    }

    #[inline]
    pub fn name(&self, hdr: &Header) -> Result<&[u8], Error> {
        self.bytes(hdr.name_addr, hdr.name_len)
    }

    /// Walks the word list, newest first.
    pub fn headers(&self) -> Headers<'_, 'buf> {
        Headers {
            dict: self,
            next: self.latest(),
            bound: usize::MAX,
        }
    }

    /// Looks up the newest word called `name`.
    pub fn find(&self, name: &[u8]) -> Result<Option<Header>, Error> {
        for hdr in self.headers() {
            let hdr = hdr?;
            if self.name(&hdr)? == name {
                return Ok(Some(hdr));
            }
        }
        Ok(None)
    }

    /// Sets the immediate flag on the latest word.
    pub fn make_immediate(&mut self) -> Result<(), Error> {
        let latest = self.latest()?;
        if latest == 0 {
            return Err(Error::InternalError);
        }
        let (lenflags, _) = self.get(latest, MemSize::Var)?;
        self.put(latest, lenflags | Cell::from(FLAG_IMMEDIATE), MemSize::Var)?;
        Ok(())
    }

    /// The bytes worth persisting: everything below HERE.
    pub fn image(&self) -> Result<&[u8], Error> {
        self.bytes(0, self.here()?)
    }

    /// Replaces the whole dictionary with a saved image.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), Error> {
        if image.len() < USERVAR_BYTES || image.len() > self.mem.len() {
            return Err(Error::OutsideMem);
        }
        let (used, free) = self.mem.split_at_mut(image.len());
        used.copy_from_slice(image);
        free.fill(0);
        self.set_here(image.len());
        Ok(())
    }
}

/// Iterator over the word list. Only follows links that point strictly
/// backwards, so a damaged chain always terminates.
pub struct Headers<'a, 'buf> {
    dict: &'a Dictionary<'buf>,
    next: Result<usize, Error>,
    bound: usize,
}

impl<'a, 'buf> Iterator for Headers<'a, 'buf> {
    type Item = Result<Header, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = match core::mem::replace(&mut self.next, Ok(0)) {
            Ok(0) => return None,
            Ok(addr) if addr >= self.bound => return None,
            Ok(addr) => addr,
            Err(e) => return Some(Err(e)),
        };
        self.bound = addr;
        let hdr = self.dict.header(addr);
        if let Ok(h) = hdr {
            self.next = Ok(h.link);
        }
        Some(hdr)
    }
}

#[cfg(test)]
pub mod test {
    use super::{Dictionary, UserVar, USERVAR_BYTES};
    use crate::{
        cell::MemSize,
        word::{Cell, FLAG_PRIM},
        Error,
    };

    #[test]
    fn construction() {
        let mut small = [0u8; USERVAR_BYTES - 1];
        assert!(matches!(
            Dictionary::new(&mut small),
            Err(Error::OutsideMem)
        ));

        let mut buf = [0xAAu8; 64];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        assert_eq!(dict.here(), Ok(USERVAR_BYTES));
        assert_eq!(dict.latest(), Ok(0));
        assert!(dict.as_bytes()[USERVAR_BYTES..].iter().all(|&b| b == 0));
        assert_eq!(&dict.as_bytes()[..4], &[28, 0, 0, 0]);
    }

    #[test]
    fn uservar_ids() {
        assert_eq!(UserVar::try_from(0), Ok(UserVar::Here));
        assert_eq!(UserVar::try_from(6), Ok(UserVar::Rsp));
        assert_eq!(UserVar::try_from(7), Err(Error::InvalidUservar));
        assert_eq!(UserVar::Postpone.name(), "_postpone");
        assert_eq!(UserVar::Rsp.slot(), 24);
    }

    #[test]
    fn create_and_find() {
        let mut buf = [0u8; 256];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();

        let a = dict.create(b"dup", FLAG_PRIM).unwrap();
        dict.add_op(11).unwrap();
        dict.add_op(0).unwrap();
        let b = dict.create(b"double", 0).unwrap();
        dict.add_cell(300).unwrap();

        assert_eq!(a, USERVAR_BYTES);
        // 1 byte length+flags, 1 byte link, 3 name bytes, 2 body bytes
        assert_eq!(b, a + 7);
        assert_eq!(dict.latest(), Ok(b));

        let hdr = dict.find(b"dup").unwrap().unwrap();
        assert_eq!(hdr.addr, a);
        assert!(hdr.is_prim());
        assert!(!hdr.is_immediate());
        assert_eq!(hdr.xt, a + 5);
        assert_eq!(dict.get(hdr.xt, MemSize::Var), Ok((11, 1)));

        let hdr = dict.find(b"double").unwrap().unwrap();
        assert_eq!(hdr.link, a);
        assert_eq!(dict.get(hdr.xt, MemSize::Var), Ok((300, 2)));

        assert_eq!(dict.find(b"du").unwrap(), None);
        assert_eq!(dict.find(b"DUP").unwrap(), None);
    }

    #[test]
    fn shadowing_and_immediate() {
        let mut buf = [0u8; 256];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();

        let old = dict.create(b"x", 0).unwrap();
        dict.add_op(0).unwrap();
        let new = dict.create(b"x", 0).unwrap();
        dict.add_op(0).unwrap();
        dict.make_immediate().unwrap();

        let hdr = dict.find(b"x").unwrap().unwrap();
        assert_eq!(hdr.addr, new);
        assert!(hdr.is_immediate());
        assert!(!dict.header(old).unwrap().is_immediate());
        assert_eq!(dict.headers().count(), 2);
    }

    #[test]
    fn immediate_needs_a_word() {
        let mut buf = [0u8; 64];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        assert_eq!(dict.make_immediate(), Err(Error::InternalError));
        assert_eq!(dict.here(), Ok(USERVAR_BYTES));
        assert_eq!(&dict.as_bytes()[..4], &[28, 0, 0, 0]);
    }

    #[test]
    fn long_names_are_rejected() {
        let mut buf = [0u8; 256];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        assert_eq!(dict.create(&[b'a'; 32], 0), Err(Error::InternalError));
        assert!(dict.create(&[b'a'; 31], 0).is_ok());
    }

    #[test]
    fn damaged_chain_terminates() {
        let mut buf = [0u8; 256];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        let a = dict.create(b"a", 0).unwrap();
        // point the link back at the header itself
        dict.put(a + 1, a as Cell, MemSize::Var).unwrap();
        assert_eq!(dict.find(b"zz").unwrap(), None);
        assert_eq!(dict.headers().count(), 1);

        dict.set_var(UserVar::Latest, 300);
        assert!(dict.find(b"zz").is_err());
    }

    #[test]
    fn here_bounds() {
        let mut buf = [0u8; 32];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        assert_eq!(dict.add_cell_typed(1, MemSize::Cell), Ok(4));
        assert_eq!(dict.add_cell(1), Err(Error::OutsideMem));
        dict.set_var(UserVar::Here, -4);
        assert_eq!(dict.add_cell(1), Err(Error::OutsideMem));
    }

    #[test]
    fn images() {
        let mut buf = [0u8; 128];
        let mut dict = Dictionary::new(&mut buf).unwrap();
        dict.reset();
        dict.create(b"w", 0).unwrap();
        dict.add_op(0).unwrap();
        let image = dict.image().unwrap().to_vec();
        assert_eq!(image.len(), USERVAR_BYTES + 4);

        let mut buf2 = [0x55u8; 64];
        let mut dict2 = Dictionary::new(&mut buf2).unwrap();
        dict2.load_image(&image).unwrap();
        assert_eq!(dict2.here(), Ok(image.len()));
        assert!(dict2.find(b"w").unwrap().is_some());
        assert!(dict2.as_bytes()[image.len()..].iter().all(|&b| b == 0));

        let mut buf3 = [0u8; 30];
        let mut dict3 = Dictionary::new(&mut buf3).unwrap();
        assert_eq!(dict3.load_image(&image), Err(Error::OutsideMem));
        assert_eq!(dict3.load_image(&image[..4]), Err(Error::OutsideMem));
    }
}
