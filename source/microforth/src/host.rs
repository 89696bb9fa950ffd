//! The embedding contract.
//!
//! The engine performs no I/O itself. Everything that leaves the VM goes
//! through a [`Host`], which is stored in [`Forth::host_ctxt`]. Callbacks are
//! associated functions taking the whole engine, so a host can inspect and
//! modify the stacks and the dictionary while it handles a syscall.

use core::fmt::{self, Write};

use crate::{
    input::{Input, InputState},
    number,
    word::{to_addr, Cell},
    Error, Forth,
};

/// Syscall ids at or above this value belong to the application.
pub const USER_SYSCALL_BASE: Cell = 128;

/// A decoded `sys` id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    /// ( c -- ) write one byte.
    Emit,
    /// ( n -- ) write a number and a space.
    Print,
    /// ( addr len -- ) write a dictionary byte range.
    Tell,
    /// An id below [`USER_SYSCALL_BASE`] with no meaning yet.
    Reserved(Cell),
    /// An application syscall, numbered from 0.
    User(Cell),
}

impl From<Cell> for Syscall {
    fn from(id: Cell) -> Self {
        match id {
            0 => Syscall::Emit,
            1 => Syscall::Print,
            2 => Syscall::Tell,
            USER_SYSCALL_BASE.. => Syscall::User(id - USER_SYSCALL_BASE),
            _ => Syscall::Reserved(id),
        }
    }
}

pub trait Host: Sized {
    /// Writes raw bytes to the host's output channel.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Handles `sys`.
    ///
    /// `input` is `None` on the first call. Returning anything other than
    /// [`InputState::Interpret`] suspends the calling word until the next
    /// token or character arrives, at which point this is called again with
    /// the same id and `input` set.
    fn sys(
        forth: &mut Forth<'_, Self>,
        id: Syscall,
        input: Option<Input<'_>>,
    ) -> Result<InputState, Error> {
        match id {
            Syscall::Emit => {
                let c = forth.pop()?;
                forth.host_ctxt.write(&[c as u8])?;
            }
            Syscall::Print => {
                let n = forth.pop()?;
                write!(HostWriter(&mut forth.host_ctxt), "{n} ")?;
            }
            Syscall::Tell => {
                let len = to_addr(forth.pop()?)?;
                let addr = to_addr(forth.pop()?)?;
                forth.with_dict_slice(addr, len, |host, bytes| host.write(bytes))??;
            }
            Syscall::User(n) => return Self::user_sys(forth, n, input),
            Syscall::Reserved(_) => return Err(Error::InternalError),
        }
        Ok(InputState::Interpret)
    }

    /// Handles application syscalls, `id` being relative to
    /// [`USER_SYSCALL_BASE`].
    fn user_sys(
        _forth: &mut Forth<'_, Self>,
        _id: Cell,
        _input: Option<Input<'_>>,
    ) -> Result<InputState, Error> {
        Err(Error::External)
    }

    /// Turns a token that is not a word into a number.
    fn parse_num(_forth: &mut Forth<'_, Self>, token: &str) -> Result<Cell, Error> {
        number::parse(token)
    }

    /// Receives language-level trace output. Only called with the `trace`
    /// feature enabled, while the `trace` user variable is set.
    fn trace(&mut self, _args: fmt::Arguments<'_>) {}
}

struct HostWriter<'a, H>(&'a mut H);

impl<'a, H: Host> Write for HostWriter<'a, H> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
