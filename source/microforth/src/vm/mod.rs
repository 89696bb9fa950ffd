use crate::{
    cell::MemSize,
    dictionary::{Dictionary, UserVar},
    host::Host,
    input::{is_delimiter, Input, InputState, Token, WordBuf},
    stack::Stack,
    word::{to_addr, to_cell, Cell, Header},
    Error, ReplaceErr,
};

pub mod builtins;

use self::builtins::{Primitive, PRIMITIVES, PRIM_COUNT};

/// Forth is the "context" of the VM/interpreter.
///
/// All storage is borrowed from the caller for `'buf`. The host is owned and
/// reachable through [`Forth::host_ctxt`].
pub struct Forth<'buf, H> {
    dict: Dictionary<'buf>,
    data_stack: Stack<'buf, Cell>,
    return_stack: Stack<'buf, Cell>,
    words: WordBuf,
    input_state: InputState,
    ip: usize,
    pub host_ctxt: H,
}

impl<'buf, H: Host> Forth<'buf, H> {
    /// Creates an engine over the given buffers and initializes it with
    /// tracing off. The dictionary is empty until [`Forth::bootstrap`] or
    /// [`Forth::load_image`] is called.
    pub fn new(
        dict: &'buf mut [u8],
        dstack: &'buf mut [Cell],
        rstack: &'buf mut [Cell],
        host_ctxt: H,
    ) -> Result<Self, Error> {
        let mut forth = Self {
            dict: Dictionary::new(dict)?,
            data_stack: Stack::new(dstack),
            return_stack: Stack::new(rstack),
            words: WordBuf::new(),
            input_state: InputState::Interpret,
            ip: 0,
            host_ctxt,
        };
        forth.init(false);
        Ok(forth)
    }

    /// Wipes the dictionary and all volatile state.
    pub fn init(&mut self, trace: bool) {
        self.dict.reset();
        self.dict.set_var(UserVar::Trace, Cell::from(trace));
        self.reset_volatile();
    }

    /// Installs the primitives and user variables.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn bootstrap(&mut self) -> Result<(), Error> {
        self.install_builtins()?;
        tracing::debug!(here = self.dict.here()?, "bootstrapped");
        Ok(())
    }

    /// Restores a dictionary saved with [`Forth::dict_image`]. The image must
    /// come from a build with the same primitive table.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), Error> {
        self.dict.load_image(image)?;
        self.reset_volatile();
        tracing::debug!(len = image.len(), "loaded image");
        Ok(())
    }

    /// Evaluates forth source text.
    ///
    /// On error, the engine is reset to a usable state: compiling mode is
    /// left, both stacks are emptied and any half-read token or pending
    /// input request is dropped. Whatever was already compiled stays.
    pub fn eval(&mut self, text: &str) -> Result<(), Error> {
        self.eval_bytes(text.as_bytes())
    }

    /// Like [`Forth::eval`], for text that may not be UTF-8. Processing stops
    /// at the first NUL byte.
    pub fn eval_bytes(&mut self, text: &[u8]) -> Result<(), Error> {
        let end = text.iter().position(|&c| c == 0).unwrap_or(text.len());
        let res = (|| {
            for &c in &text[..end] {
                self.handle_char(c)?;
            }
            self.handle_char(0)
        })();
        match res {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "evaluation aborted");
                self.abort();
                Err(e)
            }
        }
    }

    fn abort(&mut self) {
        self.dict.set_var(UserVar::Compiling, 0);
        self.reset_volatile();
    }

    fn reset_volatile(&mut self) {
        self.data_stack.clear();
        self.return_stack.clear();
        self.input_state = InputState::Interpret;
        self.ip = 0;
        self.words.clear();
    }

    fn handle_char(&mut self, c: u8) -> Result<(), Error> {
        if self.input_state == InputState::PassChar {
            self.input_state = InputState::Interpret;
            return self.run(Some(Input::Char(c)));
        }
        if !is_delimiter(c) {
            self.words.push(c);
            return Ok(());
        }
        match self.words.take() {
            Some(tok) => self.handle_word(&tok),
            None => Ok(()),
        }
    }

    fn handle_word(&mut self, tok: &Token) -> Result<(), Error> {
        tracing::trace!(word = ?tok, state = ?self.input_state);
        vm_trace!(self, "\n{} ", tok);

        if self.input_state == InputState::PassWord {
            self.input_state = InputState::Interpret;
            return self.run(Some(Input::Word(tok.as_bytes())));
        }

        match self.dict.find(tok.as_bytes())? {
            Some(hdr) => {
                let postpone = self.dict.var(UserVar::Postpone) != 0;
                if self.dict.is_compiling() && (postpone || !hdr.is_immediate()) {
                    if hdr.is_prim() {
                        let (op, _) = self.dict.get(hdr.xt, MemSize::Var)?;
                        self.dict.add_cell(op)?;
                    } else {
                        self.dict.add_cell(to_cell(hdr.xt))?;
                    }
                    self.dict.set_var(UserVar::Postpone, 0);
                    Ok(())
                } else {
                    self.execute(hdr.xt)
                }
            }
            None => {
                let s = tok.as_str().ok_or(Error::NotAWord)?;
                let v = H::parse_num(self, s)?;
                if self.dict.is_compiling() {
                    self.compile_lit(v)
                } else {
                    self.push(v)
                }
            }
        }
    }

    fn execute(&mut self, xt: usize) -> Result<(), Error> {
        self.ip = xt;
        self.return_stack.clear();
        self.pushr(0)?;
        self.run(None)
    }

    /// The inner interpreter. Runs until ip reaches 0, or until a primitive
    /// asks for more input; in that case ip is left on that primitive so it
    /// runs again when the input arrives.
    fn run(&mut self, mut input: Option<Input<'_>>) -> Result<(), Error> {
        while self.ip != 0 {
            let ip_org = self.ip;
            let (code, len) = self.dict.get(ip_org, MemSize::Var)?;
            self.ip = ip_org + len;

            if (0..=PRIM_COUNT as Cell).contains(&code) {
                let prim = Primitive::from_op(code).ok_or(Error::InternalError)?;
                let depth = self.return_stack.depth();
                vm_trace!(self, "\n[{}/{:04x}] {:>2} ", prim.name(), ip_org, depth);
                self.do_prim(prim, input)?;
                if self.input_state != InputState::Interpret {
                    self.ip = ip_org;
                    break;
                }
            } else {
                let ret = self.ip;
                vm_trace!(self, "\n[call/{:04x}] -> {:04x} ", ip_org, code);
                self.pushr(to_cell(ret))?;
                self.ip = to_addr(code)?;
            }
            input = None;
        }
        Ok(())
    }

    pub fn push(&mut self, v: Cell) -> Result<(), Error> {
        vm_trace!(self, "»{} ", v);
        self.data_stack.push(v).replace_err(Error::DstackOverrun)
    }

    pub fn pop(&mut self) -> Result<Cell, Error> {
        let v = self
            .data_stack
            .try_pop()
            .replace_err(Error::DstackUnderrun)?;
        vm_trace!(self, "«{} ", v);
        Ok(v)
    }

    /// Reads the data stack `n` items below the top.
    pub fn pick(&self, n: usize) -> Result<Cell, Error> {
        self.data_stack
            .try_peek_back_n(n)
            .replace_err(Error::DstackUnderrun)
    }

    /// Reads the return stack `n` items below the top.
    pub fn pickr(&self, n: usize) -> Result<Cell, Error> {
        self.return_stack
            .try_peek_back_n(n)
            .replace_err(Error::RstackUnderrun)
    }

    pub(crate) fn pushr(&mut self, v: Cell) -> Result<(), Error> {
        vm_trace!(self, "r»{} ", v);
        self.return_stack.push(v).replace_err(Error::RstackOverrun)
    }

    pub(crate) fn popr(&mut self) -> Result<Cell, Error> {
        let v = self
            .return_stack
            .try_pop()
            .replace_err(Error::RstackUnderrun)?;
        vm_trace!(self, "r«{} ", v);
        Ok(v)
    }

    /// Reads user variable `id`. `dsp` and `rsp` report the stack depths.
    pub fn uservar_get(&self, id: usize) -> Result<Cell, Error> {
        Ok(match UserVar::try_from(id)? {
            UserVar::Dsp => to_cell(self.data_stack.depth()),
            UserVar::Rsp => to_cell(self.return_stack.depth()),
            var => self.dict.var(var),
        })
    }

    /// Writes user variable `id`. Writing `dsp` or `rsp` moves the stack top,
    /// which must stay within the stack's capacity.
    pub fn uservar_set(&mut self, id: usize, val: Cell) -> Result<(), Error> {
        match UserVar::try_from(id)? {
            UserVar::Dsp => self
                .data_stack
                .set_depth(to_addr(val)?)
                .replace_err(Error::OutsideMem),
            UserVar::Rsp => self
                .return_stack
                .set_depth(to_addr(val)?)
                .replace_err(Error::OutsideMem),
            var => {
                self.dict.set_var(var, val);
                Ok(())
            }
        }
    }

    /// The whole dictionary region.
    #[inline]
    pub fn dictionary(&self) -> &[u8] {
        self.dict.as_bytes()
    }

    /// The used part of the dictionary, suitable for [`Forth::load_image`].
    pub fn dict_image(&self) -> Result<&[u8], Error> {
        self.dict.image()
    }

    #[inline]
    pub fn here(&self) -> Result<usize, Error> {
        self.dict.here()
    }

    #[inline]
    pub fn input_state(&self) -> InputState {
        self.input_state
    }

    #[inline]
    pub fn data_depth(&self) -> usize {
        self.data_stack.depth()
    }

    #[inline]
    pub fn return_depth(&self) -> usize {
        self.return_stack.depth()
    }

    #[inline]
    pub fn is_compiling(&self) -> bool {
        self.dict.is_compiling()
    }

    pub fn find_word(&self, name: &str) -> Result<Option<Header>, Error> {
        self.dict.find(name.as_bytes())
    }

    /// Names the word `addr` refers to, whether `addr` is a primitive
    /// opcode, a header address or an execution token.
    pub fn word_name(&self, addr: usize) -> Result<Option<Token>, Error> {
        for hdr in self.dict.headers() {
            let hdr = hdr?;
            if hdr.addr == addr || hdr.xt == addr {
                return Ok(Some(Token::from_bytes(self.dict.name(&hdr)?)));
            }
        }
        Ok(PRIMITIVES
            .get(addr)
            .map(|entry| Token::from_bytes(entry.name.as_bytes())))
    }

    /// Lends a bounds-checked dictionary range to `f` along with the host.
    pub fn with_dict_slice<R>(
        &mut self,
        addr: usize,
        len: usize,
        f: impl FnOnce(&mut H, &[u8]) -> R,
    ) -> Result<R, Error> {
        let bytes = self.dict.bytes(addr, len)?;
        Ok(f(&mut self.host_ctxt, bytes))
    }

    #[cfg(feature = "trace")]
    pub(crate) fn trace(&mut self, args: core::fmt::Arguments<'_>) {
        if self.dict.var(UserVar::Trace) != 0 {
            self.host_ctxt.trace(args);
        }
    }
}
