use crate::{
    cell::MemSize,
    dictionary::{UserVar, USERVAR_COUNT},
    host::{Host, Syscall},
    input::{Input, InputState, Token},
    word::{to_addr, to_cell, Cell},
    Error, Forth,
};

/// The built-in operations, numbered by opcode.
///
/// The numbering is baked into compiled code and saved images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Primitive {
    Exit = 0,
    Lit,
    Ltz,
    Col,
    Semicol,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Drop,
    Dup,
    PickR,
    Immediate,
    Peek,
    Poke,
    Swap,
    Rot,
    Jmp,
    Jmp0,
    Tick,
    Comment,
    PushR,
    PopR,
    Equal,
    Sys,
    Pick,
    Comma,
    Key,
    Lits,
    Len,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Number of primitives. Code cells up to and including this value are
/// dispatched as opcodes, anything larger is a call.
pub const PRIM_COUNT: usize = 36;

pub struct PrimEntry {
    pub name: &'static str,
    pub prim: Primitive,
    pub immediate: bool,
}

macro_rules! builtin {
    ($name:literal, $prim:ident) => {
        PrimEntry {
            name: $name,
            prim: Primitive::$prim,
            immediate: false,
        }
    };
    ($name:literal, $prim:ident, immediate) => {
        PrimEntry {
            name: $name,
            prim: Primitive::$prim,
            immediate: true,
        }
    };
}

/// Installed by bootstrap, in opcode order.
pub const PRIMITIVES: &[PrimEntry; PRIM_COUNT] = &[
    builtin!("exit", Exit),
    builtin!("lit", Lit),
    builtin!("<0", Ltz),
    builtin!(":", Col),
    builtin!(";", Semicol, immediate),
    builtin!("+", Add),
    builtin!("-", Sub),
    builtin!("*", Mul),
    builtin!("/", Div),
    builtin!("%", Mod),
    builtin!("drop", Drop),
    builtin!("dup", Dup),
    builtin!("pickr", PickR),
    builtin!("immediate", Immediate, immediate),
    builtin!("@@", Peek),
    builtin!("!!", Poke),
    builtin!("swap", Swap),
    builtin!("rot", Rot),
    builtin!("jmp", Jmp),
    builtin!("jmp0", Jmp0),
    builtin!("'", Tick),
    builtin!("(", Comment, immediate),
    builtin!(">r", PushR),
    builtin!("r>", PopR),
    builtin!("=", Equal),
    builtin!("sys", Sys),
    builtin!("pick", Pick),
    builtin!(",,", Comma),
    builtin!("key", Key),
    builtin!("lits", Lits),
    builtin!("##", Len),
    builtin!("&", And),
    builtin!("|", Or),
    builtin!("^", Xor),
    builtin!("<<", Shl),
    builtin!(">>", Shr),
];

impl Primitive {
    /// Decodes an opcode. `None` for anything outside the table.
    pub fn from_op(op: Cell) -> Option<Self> {
        let idx = usize::try_from(op).ok()?;
        PRIMITIVES.get(idx).map(|e| e.prim)
    }

    #[inline]
    pub fn op(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn name(self) -> &'static str {
        PRIMITIVES[self as usize].name
    }
}

impl<'buf, H: Host> Forth<'buf, H> {
    pub(crate) fn do_prim(
        &mut self,
        prim: Primitive,
        input: Option<Input<'_>>,
    ) -> Result<(), Error> {
        match prim {
            Primitive::Exit => {
                let ret = self.popr()?;
                self.ip = to_addr(ret)?;
            }
            Primitive::Lit => {
                let v = self.read_inline()?;
                self.push(v)?;
            }
            Primitive::Ltz => {
                let a = self.pop()?;
                self.push(Cell::from(a < 0))?;
            }
            Primitive::Col => match input {
                None => self.input_state = InputState::PassWord,
                Some(name) => {
                    self.dict.create(name.as_bytes(), 0)?;
                    self.dict.set_var(UserVar::Compiling, 1);
                    let tok = Token::from_bytes(name.as_bytes());
                    vm_trace!(self, "\n=== {}", tok);
                }
            },
            Primitive::Semicol => {
                if !self.dict.is_compiling() {
                    return Err(Error::CompileOnlyWord);
                }
                self.dict.add_op(Primitive::Exit.op())?;
                self.dict.set_var(UserVar::Compiling, 0);
                vm_trace!(self, "\n===");
            }
            Primitive::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            Primitive::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            Primitive::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            Primitive::Div => self.binary(|a, b| match b {
                0 => Err(Error::DivisionByZero),
                b => Ok(a.wrapping_div(b)),
            })?,
            Primitive::Mod => self.binary(|a, b| match b {
                0 => Err(Error::DivisionByZero),
                b => Ok(a.wrapping_rem(b)),
            })?,
            Primitive::Drop => {
                self.pop()?;
            }
            Primitive::Dup => {
                let a = self.pop()?;
                self.push(a)?;
                self.push(a)?;
            }
            Primitive::PickR => {
                let n = self.pop()?;
                let v = self.pickr(index(n, Error::RstackUnderrun)?)?;
                self.push(v)?;
            }
            Primitive::Immediate => self.dict.make_immediate()?,
            Primitive::Peek => {
                let size = self.pop()?;
                let addr = to_addr(self.pop()?)?;
                let v = self.peek(addr, size)?.0;
                self.push(v)?;
            }
            Primitive::Poke => {
                let size = self.pop()?;
                let addr = to_addr(self.pop()?)?;
                let v = self.pop()?;
                self.poke(addr, v, size)?;
            }
            Primitive::Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)?;
            }
            Primitive::Rot => {
                let c = self.pop()?;
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(c)?;
                self.push(a)?;
            }
            Primitive::Jmp => {
                let target = self.read_inline()?;
                self.jump(target)?;
            }
            Primitive::Jmp0 => {
                let target = self.read_inline()?;
                if self.pop()? == 0 {
                    self.jump(target)?;
                }
            }
            Primitive::Tick => {
                if self.dict.is_compiling() {
                    let v = self.read_inline()?;
                    self.push(v)?;
                } else {
                    match input {
                        None => self.input_state = InputState::PassWord,
                        Some(name) => {
                            let hdr = self
                                .dict
                                .find(name.as_bytes())?
                                .ok_or(Error::InternalError)?;
                            self.push(to_cell(hdr.xt))?;
                        }
                    }
                }
            }
            Primitive::Comment => {
                if input.and_then(|i| i.first_byte()) != Some(b')') {
                    self.input_state = InputState::PassChar;
                }
            }
            Primitive::PushR => {
                let v = self.pop()?;
                self.pushr(v)?;
            }
            Primitive::PopR => {
                let v = self.popr()?;
                self.push(v)?;
            }
            Primitive::Equal => self.binary(|a, b| Ok(Cell::from(a == b)))?,
            Primitive::Sys => {
                let id = self.pop()?;
                let state = H::sys(self, Syscall::from(id), input)?;
                self.input_state = state;
                if state != InputState::Interpret {
                    // resumed once the requested input arrives
                    self.push(id)?;
                }
            }
            Primitive::Pick => {
                let n = self.pop()?;
                let v = self.pick(index(n, Error::DstackUnderrun)?)?;
                self.push(v)?;
            }
            Primitive::Comma => {
                let size = MemSize::try_from(self.pop()?)?;
                let v = self.pop()?;
                self.dict.add_cell_typed(v, size)?;
            }
            Primitive::Key => match input {
                None => self.input_state = InputState::PassChar,
                Some(c) => self.push(Cell::from(c.first_byte().unwrap_or(0)))?,
            },
            Primitive::Lits => {
                let len = self.read_inline()?;
                let start = self.ip;
                self.push(to_cell(start))?;
                self.push(len)?;
                self.ip = start
                    .checked_add(to_addr(len)?)
                    .ok_or(Error::OutsideMem)?;
            }
            Primitive::Len => {
                let size = self.pop()?;
                let addr = to_addr(self.pop()?)?;
                let len = self.peek(addr, size)?.1;
                self.push(to_cell(len))?;
            }
            Primitive::And => self.binary(|a, b| Ok(a & b))?,
            Primitive::Or => self.binary(|a, b| Ok(a | b))?,
            Primitive::Xor => self.binary(|a, b| Ok(a ^ b))?,
            Primitive::Shl => self.binary(|a, b| {
                Ok(match u32::try_from(b) {
                    Ok(n @ 0..=31) => a << n,
                    _ => 0,
                })
            })?,
            Primitive::Shr => self.binary(|a, b| {
                Ok(match u32::try_from(b) {
                    Ok(n @ 0..=31) => a >> n,
                    _ if a < 0 => -1,
                    _ => 0,
                })
            })?,
        }
        Ok(())
    }

    /// ( a b -- f(a, b) )
    #[inline]
    fn binary(&mut self, f: impl FnOnce(Cell, Cell) -> Result<Cell, Error>) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b)?)
    }

    /// Reads the variable-length cell at ip and steps over it.
    fn read_inline(&mut self) -> Result<Cell, Error> {
        let (v, len) = self.dict.get(self.ip, MemSize::Var)?;
        self.ip += len;
        Ok(v)
    }

    fn jump(&mut self, target: Cell) -> Result<(), Error> {
        let from = self.ip;
        vm_trace!(self, "ip {:04x}=>{:04x}", from, target);
        self.ip = to_addr(target)?;
        Ok(())
    }

    /// Memory read for `@@` and `##`, returning the value and its encoded
    /// length. Addresses below the user variable count name user variables.
    fn peek(&self, addr: usize, size: Cell) -> Result<(Cell, usize), Error> {
        if addr < USERVAR_COUNT {
            return Ok((self.uservar_get(addr)?, 1));
        }
        self.dict.get(addr, MemSize::try_from(size)?)
    }

    fn poke(&mut self, addr: usize, val: Cell, size: Cell) -> Result<(), Error> {
        if addr < USERVAR_COUNT {
            return self.uservar_set(addr, val);
        }
        self.dict.put(addr, val, MemSize::try_from(size)?)?;
        Ok(())
    }

    /// Installs every primitive and user variable word into an empty
    /// dictionary.
    pub(crate) fn install_builtins(&mut self) -> Result<(), Error> {
        for entry in PRIMITIVES.iter() {
            self.add_prim(entry)?;
        }
        for var in UserVar::ALL {
            self.add_uservar(var)?;
        }
        Ok(())
    }

    fn add_prim(&mut self, entry: &PrimEntry) -> Result<(), Error> {
        self.dict
            .create(entry.name.as_bytes(), crate::word::FLAG_PRIM)?;
        self.dict.add_op(entry.prim.op())?;
        self.dict.add_op(Primitive::Exit.op())?;
        if entry.immediate {
            self.dict.make_immediate()?;
        }
        Ok(())
    }

    fn add_uservar(&mut self, var: UserVar) -> Result<(), Error> {
        self.dict.create(var.name().as_bytes(), 0)?;
        self.compile_lit(to_cell(var.id()))?;
        self.dict.add_op(Primitive::Exit.op())?;
        Ok(())
    }

    /// Appends `lit v`.
    pub(crate) fn compile_lit(&mut self, v: Cell) -> Result<(), Error> {
        self.dict.add_op(Primitive::Lit.op())?;
        self.dict.add_cell(v)?;
        Ok(())
    }
}

/// Converts a `pick` operand. Negative indexes can never be in range.
#[inline]
fn index(n: Cell, err: Error) -> Result<usize, Error> {
    usize::try_from(n).map_err(|_| err)
}
