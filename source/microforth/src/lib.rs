//! # microforth
//!
//! A tiny forth runtime where *everything* lives in one fixed-size byte
//! dictionary: user variables, word headers and compiled bytecode. The engine
//! never allocates and never performs I/O on its own, all output, number
//! parsing and application commands go through the [`Host`] trait.
//!
//! ```rust
//! use microforth::{output::{BufHost, OutputBuf}, prelude, Cell, Forth};
//!
//! let mut dict = [0u8; 4096];
//! let mut dstack = [0 as Cell; 32];
//! let mut rstack = [0 as Cell; 32];
//! let mut out = [0u8; 64];
//!
//! let host = BufHost::new(OutputBuf::new(&mut out));
//! let mut forth = Forth::new(&mut dict, &mut dstack, &mut rstack, host).unwrap();
//! forth.bootstrap().unwrap();
//! forth.eval(prelude::CORE).unwrap();
//!
//! forth.eval(": double 2 * ; 5 double .").unwrap();
//! assert_eq!(forth.host_ctxt.output.as_str(), Ok("10 "));
//! ```
#![cfg_attr(not(any(test, feature = "use-std")), no_std)]

// Language-level tracing. Only compiled in with the `trace` feature, and
// only emitted while the `trace` user variable is non-zero.
cfg_if::cfg_if! {
    if #[cfg(feature = "trace")] {
        macro_rules! vm_trace {
            ($vm:expr, $($arg:tt)*) => {
                $vm.trace(format_args!($($arg)*))
            };
        }
    } else {
        macro_rules! vm_trace {
            ($vm:expr, $($arg:tt)*) => {
                if false {
                    let _ = &$vm;
                    ::core::mem::drop(format_args!($($arg)*));
                }
            };
        }
    }
}

pub mod cell;
pub mod dictionary;
pub mod host;
pub mod input;
pub mod number;
pub mod output;
pub mod prelude;
pub mod stack;
pub mod vm;
pub mod word;

#[cfg(any(test, feature = "use-std"))]
pub mod leakbox;

#[cfg(any(test, feature = "_force_test_utils"))]
pub mod testutil;

pub use crate::{
    host::{Host, Syscall},
    input::{Input, InputState},
    vm::Forth,
    word::Cell,
};

/// Abort reasons.
///
/// Every fault inside the engine unwinds to [`Forth::eval`] carrying one of
/// these. The numeric codes are stable and can be handed to hosts that only
/// understand integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    InternalError = 1,
    OutsideMem = 2,
    DstackUnderrun = 3,
    DstackOverrun = 4,
    RstackUnderrun = 5,
    RstackOverrun = 6,
    NotAWord = 7,
    CompileOnlyWord = 8,
    InvalidSize = 9,
    DivisionByZero = 10,
    InvalidUservar = 11,
    External = 12,
}

impl Error {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Error::InternalError => "INTERNAL_ERROR",
            Error::OutsideMem => "OUTSIDE_MEM",
            Error::DstackUnderrun => "DSTACK_UNDERRUN",
            Error::DstackOverrun => "DSTACK_OVERRUN",
            Error::RstackUnderrun => "RSTACK_UNDERRUN",
            Error::RstackOverrun => "RSTACK_OVERRUN",
            Error::NotAWord => "NOT_A_WORD",
            Error::CompileOnlyWord => "COMPILE_ONLY_WORD",
            Error::InvalidSize => "INVALID_SIZE",
            Error::DivisionByZero => "DIVISION_BY_ZERO",
            Error::InvalidUservar => "INVALID_USERVAR",
            Error::External => "EXTERNAL",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<output::OutputError> for Error {
    fn from(_oe: output::OutputError) -> Self {
        Error::External
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_fe: core::fmt::Error) -> Self {
        Error::External
    }
}

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::Error;

    #[test]
    fn error_codes_are_stable() {
        let all = [
            Error::InternalError,
            Error::OutsideMem,
            Error::DstackUnderrun,
            Error::DstackOverrun,
            Error::RstackUnderrun,
            Error::RstackOverrun,
            Error::NotAWord,
            Error::CompileOnlyWord,
            Error::InvalidSize,
            Error::DivisionByZero,
            Error::InvalidUservar,
            Error::External,
        ];
        for (i, e) in all.iter().enumerate() {
            assert_eq!(usize::from(e.code()), i + 1);
        }
        assert_eq!(format!("{}", Error::DivisionByZero), "DIVISION_BY_ZERO");
    }
}
