use core::fmt::Debug;

use crate::word::MAX_NAME_LEN;

/// Longest token the tokenizer keeps. Extra characters are dropped.
pub const TOKEN_MAX: usize = MAX_NAME_LEN;

/// What the outer interpreter does with the next piece of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    /// Tokens are looked up and compiled or executed.
    #[default]
    Interpret,
    /// A suspended primitive wants the next whole token verbatim.
    PassWord,
    /// A suspended primitive wants the next raw character.
    PassChar,
}

/// Raw input delivered to a suspended primitive or syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Word(&'a [u8]),
    Char(u8),
}

impl<'a> Input<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Input::Word(w) => w,
            Input::Char(c) => core::slice::from_ref(c),
        }
    }

    #[inline]
    pub fn first_byte(&self) -> Option<u8> {
        self.as_bytes().first().copied()
    }
}

/// Token delimiters. NUL terminates the input and also flushes a token.
#[inline]
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'\0' | b' ' | b'\t' | b'\n' | b'\r')
}

/// A name-sized inline byte string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Token {
    buf: [u8; TOKEN_MAX],
    len: u8,
}

impl Token {
    pub const fn new() -> Self {
        Self {
            buf: [0; TOKEN_MAX],
            len: 0,
        }
    }

    /// Builds a token from `bytes`, truncating at [`TOKEN_MAX`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut tok = Self::new();
        for &b in bytes {
            tok.push(b);
        }
        tok
    }

    /// Appends `c`. Returns `false`, dropping the byte, if the token is full.
    #[inline]
    pub fn push(&mut self, c: u8) -> bool {
        match self.buf.get_mut(usize::from(self.len)) {
            Some(slot) => {
                *slot = c;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.len)]
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()).ok()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.as_str() {
            Some(s) => s.fmt(f),
            None => self.as_bytes().fmt(f),
        }
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &b in self.as_bytes() {
            core::fmt::Write::write_char(f, char::from(b))?;
        }
        Ok(())
    }
}

/// Accumulates characters into the token currently being read.
#[derive(Debug, Default)]
pub struct WordBuf {
    cur: Token,
}

impl WordBuf {
    pub const fn new() -> Self {
        Self { cur: Token::new() }
    }

    /// Adds a non-delimiter character. Overlong tokens are silently truncated.
    #[inline]
    pub fn push(&mut self, c: u8) {
        let _ = self.cur.push(c);
    }

    /// Takes the finished token, if any characters were collected.
    pub fn take(&mut self) -> Option<Token> {
        if self.cur.is_empty() {
            None
        } else {
            Some(core::mem::take(&mut self.cur))
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cur = Token::new();
    }
}
