use crate::{host::Host, Error};

/// A fixed-capacity byte sink over a caller-provided buffer.
pub struct OutputBuf<'buf> {
    buf: &'buf mut [u8],
    cur: usize,
}

#[derive(Debug, PartialEq)]
pub enum OutputError {
    OutputFull,
}

impl<'buf> OutputBuf<'buf> {
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self { buf, cur: 0 }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.cur
    }

    pub fn push_bstr(&mut self, bstr: &[u8]) -> Result<(), OutputError> {
        let new_end = self.cur + bstr.len();
        let dest = self
            .buf
            .get_mut(self.cur..new_end)
            .ok_or(OutputError::OutputFull)?;
        dest.copy_from_slice(bstr);
        self.cur = new_end;
        Ok(())
    }

    #[inline]
    pub fn push_str(&mut self, stir: &str) -> Result<(), OutputError> {
        self.push_bstr(stir.as_bytes())
    }

    pub fn clear(&mut self) {
        self.cur = 0;
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.cur]
    }

    /// Forth code can emit arbitrary bytes, so the contents are only a
    /// `str` if they happen to be UTF-8.
    pub fn as_str(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(self.as_bytes())
    }
}

impl<'buf> core::fmt::Write for OutputBuf<'buf> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.push_str(s).map_err(|_| core::fmt::Error)
    }
}

/// A host that only knows how to write into an [`OutputBuf`].
///
/// Useful for embedding without any application-specific syscalls.
pub struct BufHost<'buf> {
    pub output: OutputBuf<'buf>,
}

impl<'buf> BufHost<'buf> {
    pub fn new(output: OutputBuf<'buf>) -> Self {
        Self { output }
    }
}

impl<'buf> Host for BufHost<'buf> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.output.push_bstr(bytes)?;
        Ok(())
    }
}
