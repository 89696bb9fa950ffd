//! # Test Utilities
//!
//! A recording [`Host`] plus helpers for running "ui tests", or executing
//! forth code at test time.
//!
//! ## UI Tests
//!
//! Forth code provided as a str will have one of the following things for
//! each line:
//!
//! * Configuration values for the VM, specified as "frontmatter comments".
//!   These must appear before any other non-comment lines. Currently accepted:
//!     * `( data_stack_elems USIZE )`
//!     * `( return_stack_elems USIZE )`
//!     * `( dict_buf_elems USIZE )`
//! * Comment lines. These are any lines just containing a `( ... )` style forth comment.
//! * Successful input lines, starting with `> ...`.
//! * Successful output lines, starting with `< ...`.
//!     * Any successful input line can have zero or more output lines
//!     * If *no* output lines are specified, ANY successful output is accepted/ignored.
//! * Unsuccessful input lines, starting with `x ...`.
//!     * This line is expected to abort, i.e. `eval` returns an `Err()`.
//!     * Unsuccessful input lines may not have any successful output
//!
//! `blocking_runtest` only bootstraps the primitives, so output is produced
//! with `0 sys` (emit) and `1 sys` (print).
//!
//! ### Example
//!
//! This is a forth ui-test doctest. It will be run with `cargo test --all-features`.
//!
//! ```rust
//! # use microforth::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( specify VM settings with frontmatter )
//! ( data_stack_elems 2 )
//!
//! ( specify input with no output )
//! > : star 42 0 sys ;
//!
//! ( specify input and output )
//! > star star
//! < **
//!
//! ( specify lines that cause aborts )
//! x starb
//! x 1 2 3
//! # "#)
//! ```

use std::fmt::Write;

use crate::{
    host::Host,
    input::{Input, InputState},
    leakbox::{LBForth, LBForthParams},
    Cell, Error, Forth,
};

/// A host that records everything the VM sends it.
///
/// User syscalls (`128 sys` and up):
///
/// * `0`: ( n -- ) appends `n` to [`TestHost::syscalls`]
/// * `1`: ( -- len ) reads the next word and pushes its length
/// * `2`: ( -- c ) reads the next character and pushes it
/// * anything else fails with [`Error::External`]
#[derive(Debug, Default)]
pub struct TestHost {
    pub output: String,
    pub syscalls: Vec<Cell>,
    pub trace: String,
}

impl Host for TestHost {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.output.push_str(&String::from_utf8_lossy(bytes));
        Ok(())
    }

    fn user_sys(
        forth: &mut Forth<'_, Self>,
        id: Cell,
        input: Option<Input<'_>>,
    ) -> Result<InputState, Error> {
        match (id, input) {
            (0, _) => {
                let v = forth.pop()?;
                forth.host_ctxt.syscalls.push(v);
            }
            (1, None) => return Ok(InputState::PassWord),
            (1, Some(word)) => forth.push(word.as_bytes().len() as Cell)?,
            (2, None) => return Ok(InputState::PassChar),
            (2, Some(c)) => forth.push(Cell::from(c.first_byte().unwrap_or(0)))?,
            _ => return Err(Error::External),
        }
        Ok(InputState::Interpret)
    }

    fn trace(&mut self, args: core::fmt::Arguments<'_>) {
        let _ = self.trace.write_fmt(args);
    }
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    #[cfg(test)]
    {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    }
}

/// Run the given forth ui test against a freshly bootstrapped vm
///
/// Does accept any/all/none of the frontmatter settings listed above.
pub fn blocking_runtest(contents: &str) {
    init_tracing();
    let tokd = tokenize(contents, true).unwrap();
    let host = TestHost::default();
    let mut forth = LBForth::from_params(tokd.settings, host).unwrap();
    blocking_steps_with(tokd.steps.as_slice(), &mut forth.forth);
}

/// Run the given forth ui-test against the given forth vm.
///
/// Does not accept ui-tests with frontmatter configuration (will panic)
pub fn blocking_runtest_with(forth: &mut Forth<'_, TestHost>, contents: &str) {
    let tokd = tokenize(contents, false).unwrap();
    blocking_steps_with(tokd.steps.as_slice(), forth);
}

fn check_output(res: Result<(), Error>, outcome: &Outcome, output: &str) {
    #[cfg(not(miri))]
    println!("< {output}");
    match (res, outcome) {
        (Ok(()), Outcome::OkAnyOutput) => {}
        (Ok(()), Outcome::OkWithOutput(exp)) => {
            let act_lines = output.lines().collect::<Vec<&str>>();
            assert_eq!(act_lines.len(), exp.len(), "output: {output:?}");
            act_lines.iter().zip(exp.iter()).for_each(|(a, e)| {
                assert_eq!(a.trim(), e.trim());
            })
        }
        (Err(_e), Outcome::FatalError) => {}
        (res, exp) => {
            eprintln!("Error!");
            eprintln!("Expected: {exp:?}");
            eprintln!("Got: {res:?}");
            if res.is_ok() {
                eprintln!("Output:\n{output}");
            }
            panic!();
        }
    }
}

// Runs the given steps against the given forth VM.
//
// Panics on any mismatch
fn blocking_steps_with(steps: &[Step], forth: &mut Forth<'_, TestHost>) {
    for Step { input, output: outcome } in steps {
        #[cfg(not(miri))]
        println!("> {input}");
        let res = forth.eval(input);
        check_output(res, outcome, &forth.host_ctxt.output);
        forth.host_ctxt.output.clear();
    }
}

#[derive(Debug)]
enum Outcome {
    OkAnyOutput,
    OkWithOutput(Vec<String>),
    FatalError,
}

#[derive(Debug)]
struct Step {
    input: String,
    output: Outcome,
}

#[derive(Default, Debug)]
struct Tokenized {
    settings: LBForthParams,
    steps: Vec<Step>,
}

fn tokenize(contents: &str, allow_frontmatter: bool) -> Result<Tokenized, ()> {
    let mut output = Tokenized::default();
    let mut frontmatter_done = !allow_frontmatter;

    for line in contents.lines() {
        let Some((tok, remain)) = line.trim_start().split_once(' ') else {
            continue;
        };

        match tok {
            ">" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::OkAnyOutput,
                });
            }
            "<" => {
                frontmatter_done = true;
                let cur_step = output.steps.last_mut().ok_or(())?;
                let expected_out = remain.to_string();
                match &mut cur_step.output {
                    Outcome::OkAnyOutput => {
                        cur_step.output = Outcome::OkWithOutput(vec![expected_out]);
                    }
                    Outcome::OkWithOutput(o) => o.push(expected_out),
                    Outcome::FatalError => panic!("Fatal error can't set output"),
                }
            }
            "x" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::FatalError,
                });
            }
            "(" => {
                let mut split = remain.split_whitespace();
                let setting = match split.next() {
                    Some("data_stack_elems") => &mut output.settings.data_stack_elems,
                    Some("return_stack_elems") => &mut output.settings.return_stack_elems,
                    Some("dict_buf_elems") => &mut output.settings.dict_buf_elems,
                    Some(_) => continue,
                    None => return Err(()),
                };
                assert!(!frontmatter_done, "Unexpected frontmatter settings!");
                *setting = split.next().ok_or(())?.parse::<usize>().map_err(drop)?;
                assert_eq!(Some(")"), split.next());
            }
            _ => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
pub mod test {
    use super::{tokenize, Outcome};

    #[test]
    fn frontmatter_and_steps() {
        let tokd = tokenize(
            r#"
            ( dict_buf_elems 512 )
            ( a plain comment )
            > 1 2
            > 3 1 sys
            < 3
            < more
            x foo
            "#,
            true,
        )
        .unwrap();
        assert_eq!(tokd.settings.dict_buf_elems, 512);
        assert_eq!(tokd.steps.len(), 3);
        assert!(matches!(tokd.steps[0].output, Outcome::OkAnyOutput));
        assert!(matches!(
            &tokd.steps[1].output,
            Outcome::OkWithOutput(o) if o.len() == 2
        ));
        assert!(matches!(tokd.steps[2].output, Outcome::FatalError));
        assert_eq!(tokd.steps[2].input, "foo");
    }

    #[test]
    #[should_panic]
    fn late_frontmatter() {
        let _ = tokenize("> 1\n( data_stack_elems 4 )", true);
    }
}
