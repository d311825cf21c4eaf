// ABOUTME: The streaming expansion engine: a byte-driven state machine over a
// ABOUTME: bounded evaluation stack and two alternating workspace arenas

use crate::config::{
    is_white, BEGIN1_QUOTE_ARG, BEGIN2_QUOTE_ARG, END1_QUOTE_ARG, END2_QUOTE_ARG, EVAL_ARG_DELIM,
    LEAD, LEFT_DELIM, MAX_NEST, RIGHT_DELIM, SIZE_RES_BUF,
};
use crate::error::EngineError;
use crate::table::{BuiltinFn, MacroTable, MacroValue};
use crate::workspace::Arena;
use std::rc::Rc;

/// States of the per-byte recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    LeadSeen,
    LeadAgain,
    WaitName,
    GettingArgNo,
    WaitArgEnd,
    GettingName,
    DelimSeenEvalArg,
    WaitArgOrMacroEnd,
    Begin1QuoteArgSeen,
    GettingQuotedArg,
    Begin1SeenWithinArg,
    End1QuoteArgSeen,
}

/// One level of the evaluation stack.
///
/// `args` is the frame's positional-reference environment (`args[0]` is the
/// macro name). `pending_*` stage the invocation currently being collected
/// by this frame: the base index and count of its strings in the
/// opposite-selector arena.
#[derive(Debug)]
struct Frame {
    state: State,
    select: usize,
    args: Rc<Vec<Vec<u8>>>,
    arg_eval: bool,
    pending_base: usize,
    pending_count: usize,
}

impl Frame {
    fn new(state: State, select: usize, args: Rc<Vec<Vec<u8>>>, arg_eval: bool) -> Self {
        Frame {
            state,
            select,
            args,
            arg_eval,
            pending_base: 0,
            pending_count: 0,
        }
    }
}

/// The macro expansion engine. Owns the macro table, the two workspace
/// arenas, the evaluation stack, the result sink and the loop-break flag;
/// strictly single-threaded and synchronous.
pub struct Engine {
    table: MacroTable,
    arenas: [Arena; 2],
    frames: Vec<Frame>,
    /// Nesting units: +1 per text body, +2 per eager argument or built-in
    /// call
    nest: usize,
    /// Argument number being accumulated in `GettingArgNo`
    arg_no: u32,
    /// Depth of `(=` nesting inside a quoted argument
    quote_depth: u32,
    /// Set by the `break` built-in, consumed by `loop`
    break_flag: bool,
    output: Vec<u8>,
}

const INT_MAX: u32 = i32::MAX as u32;

impl Engine {
    pub fn new() -> Self {
        let mut engine = Engine {
            table: MacroTable::new(),
            arenas: [Arena::new(), Arena::new()],
            frames: Vec::with_capacity(MAX_NEST),
            nest: 0,
            arg_no: 0,
            quote_depth: 0,
            break_flag: false,
            output: Vec::new(),
        };
        engine.start_expand(Vec::new());
        engine
    }

    // ========================================================================
    // Host API
    // ========================================================================

    /// Reset all expansion state and install the top-level argument vector
    /// (typically the process command line) referenced by `$(N)` at the
    /// outermost level. The macro table is untouched.
    pub fn start_expand(&mut self, argv: Vec<Vec<u8>>) {
        self.frames.clear();
        self.frames
            .push(Frame::new(State::Normal, 0, Rc::new(argv), false));
        self.nest = 0;
        self.arg_no = 0;
        self.quote_depth = 0;
        self.break_flag = false;
        self.arenas[0].reset();
        self.arenas[1].reset();
        self.output.clear();
    }

    /// Define a string macro (empty body deletes).
    pub fn define_text(&mut self, name: &[u8], body: &[u8]) -> Result<(), EngineError> {
        self.table.define_text(name, body)
    }

    /// Register a built-in macro.
    pub fn define_builtin(&mut self, name: &[u8], handler: BuiltinFn) -> Result<(), EngineError> {
        self.table.define_builtin(name, handler)
    }

    /// True while a macro expansion spans the current input position.
    pub fn expanding(&self) -> bool {
        self.frames[0].state != State::Normal
    }

    /// Drain the result sink. The host calls this after every fed byte;
    /// letting output accumulate past the sink bound is an error.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Diagnostic listing of the macro table.
    pub fn dump_table(&self) -> String {
        self.table.dump()
    }

    // ========================================================================
    // Primitives shared with the built-ins
    // ========================================================================

    /// Append a byte to the current sink without evaluating it.
    pub fn emit_literal(&mut self, c: u8) -> Result<(), EngineError> {
        let select = self.cur().select;
        self.add_char(select, c)
    }

    /// Feed every byte of `text` through the recognizer (re-expansion).
    pub fn feed_bytes(&mut self, text: &[u8]) -> Result<(), EngineError> {
        for &c in text {
            self.feed(c)?;
        }
        Ok(())
    }

    pub fn set_break(&mut self) {
        self.break_flag = true;
    }

    pub fn clear_break(&mut self) {
        self.break_flag = false;
    }

    pub fn break_pending(&self) -> bool {
        self.break_flag
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn cur(&self) -> &Frame {
        self.frames.last().expect("evaluation stack is never empty")
    }

    fn cur_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("evaluation stack is never empty")
    }

    /// Append a byte to the frame's result: the external sink when arena 0
    /// holds no string, the arena's current string otherwise.
    fn add_char(&mut self, select: usize, c: u8) -> Result<(), EngineError> {
        if select == 0 && self.arenas[0].no_strings() {
            if self.output.len() >= SIZE_RES_BUF {
                return Err(EngineError::ResultOverflow);
            }
            self.output.push(c);
            Ok(())
        } else {
            self.arenas[select].push_byte(c)
        }
    }

    /// Feed the next input byte to the recognizer.
    ///
    /// After an error the expansion state is indeterminate; the host reports
    /// the diagnostic and either aborts or calls `start_expand` again.
    pub fn feed(&mut self, c: u8) -> Result<(), EngineError> {
        if c == 0 {
            return Err(EngineError::NulByteInInput);
        }

        match self.cur().state {
            State::Normal => {
                if c == LEAD {
                    self.cur_mut().state = State::LeadSeen;
                } else if self.cur().arg_eval && c == EVAL_ARG_DELIM {
                    self.cur_mut().state = State::DelimSeenEvalArg;
                } else {
                    let select = self.cur().select;
                    self.add_char(select, c)?;
                }
            }

            State::DelimSeenEvalArg => {
                if c == EVAL_ARG_DELIM {
                    // escaped delimiter
                    let select = self.cur().select;
                    self.add_char(select, EVAL_ARG_DELIM)?;
                    self.cur_mut().state = State::Normal;
                } else {
                    // the eager argument is fully evaluated; resume the
                    // collecting frame and reprocess this byte there
                    self.frames.pop();
                    self.nest -= 2;
                    return self.feed(c);
                }
            }

            State::LeadSeen => {
                if c == LEAD {
                    self.cur_mut().state = State::LeadAgain;
                } else if c == LEFT_DELIM {
                    self.cur_mut().state = State::WaitName;
                } else {
                    // isolated lead byte
                    let select = self.cur().select;
                    self.add_char(select, LEAD)?;
                    self.cur_mut().state = State::Normal;
                    return self.feed(c);
                }
            }

            State::LeadAgain => {
                if c == LEFT_DELIM {
                    // the escape: $$( becomes literal $(
                    let select = self.cur().select;
                    self.add_char(select, LEAD)?;
                    self.add_char(select, LEFT_DELIM)?;
                    self.cur_mut().state = State::Normal;
                } else {
                    let select = self.cur().select;
                    self.add_char(select, LEAD)?;
                    self.cur_mut().state = State::LeadSeen;
                    return self.feed(c);
                }
            }

            State::WaitName => {
                if c.is_ascii_digit() {
                    self.cur_mut().state = State::GettingArgNo;
                    self.arg_no = (c - b'0') as u32;
                } else if !is_white(c) {
                    let select = self.cur().select;
                    let other = 1 - select;
                    let base = self.arenas[other].count();
                    self.arenas[other].new_string()?;
                    {
                        let frame = self.cur_mut();
                        frame.state = State::GettingName;
                        frame.pending_base = base;
                        frame.pending_count = 1;
                    }
                    self.add_char(other, c)?;
                }
            }

            State::GettingArgNo => {
                if c.is_ascii_digit() {
                    self.arg_no = self.arg_no * 10 + (c - b'0') as u32;
                    if self.arg_no > INT_MAX / 10 {
                        return Err(EngineError::ArgumentNumberTooLarge);
                    }
                } else {
                    let args = self.cur().args.clone();
                    let select = self.cur().select;
                    if (self.arg_no as usize) < args.len() {
                        for &b in &args[self.arg_no as usize] {
                            self.add_char(select, b)?;
                        }
                    }
                    // an out-of-range reference is silently empty
                    self.cur_mut().state = State::WaitArgEnd;
                    return self.feed(c);
                }
            }

            State::WaitArgEnd => {
                if c == RIGHT_DELIM {
                    self.cur_mut().state = State::Normal;
                } else if !is_white(c) {
                    return Err(EngineError::GarbageInArgumentReference);
                }
            }

            State::GettingName => {
                if !is_white(c) && c != RIGHT_DELIM {
                    let other = 1 - self.cur().select;
                    self.add_char(other, c)?;
                } else {
                    self.cur_mut().state = State::WaitArgOrMacroEnd;
                    return self.feed(c);
                }
            }

            State::WaitArgOrMacroEnd => {
                if c == EVAL_ARG_DELIM {
                    let select = self.cur().select;
                    let args = self.cur().args.clone();
                    self.cur_mut().pending_count += 1;
                    self.arenas[1 - select].new_string()?;
                    if self.nest >= MAX_NEST - 2 {
                        return Err(EngineError::NestingTooDeep);
                    }
                    // evaluate the argument with the caller's environment,
                    // emitting into the argument string just opened
                    self.frames
                        .push(Frame::new(State::Normal, 1 - select, args, true));
                    self.nest += 2;
                } else if c == RIGHT_DELIM {
                    self.invoke()?;
                } else if c == BEGIN1_QUOTE_ARG {
                    self.cur_mut().state = State::Begin1QuoteArgSeen;
                } else if !is_white(c) {
                    // a bare argument: collected verbatim like a name,
                    // terminated by whitespace or the closing delimiter
                    let select = self.cur().select;
                    self.cur_mut().pending_count += 1;
                    self.arenas[1 - select].new_string()?;
                    self.cur_mut().state = State::GettingName;
                    self.add_char(1 - select, c)?;
                }
            }

            State::Begin1QuoteArgSeen => {
                if c == BEGIN2_QUOTE_ARG {
                    let select = self.cur().select;
                    self.cur_mut().pending_count += 1;
                    self.arenas[1 - select].new_string()?;
                    self.quote_depth = 1;
                    self.cur_mut().state = State::GettingQuotedArg;
                } else {
                    return Err(EngineError::GarbageInInvocation);
                }
            }

            State::GettingQuotedArg => {
                if c == END1_QUOTE_ARG {
                    self.cur_mut().state = State::End1QuoteArgSeen;
                } else {
                    if c == BEGIN1_QUOTE_ARG {
                        self.cur_mut().state = State::Begin1SeenWithinArg;
                    }
                    let other = 1 - self.cur().select;
                    self.add_char(other, c)?;
                }
            }

            State::Begin1SeenWithinArg => {
                let other = 1 - self.cur().select;
                self.add_char(other, c)?;
                if c == BEGIN2_QUOTE_ARG {
                    self.quote_depth += 1;
                }
                // consecutive open bytes keep the state armed
                if c != BEGIN1_QUOTE_ARG {
                    self.cur_mut().state = State::GettingQuotedArg;
                }
            }

            State::End1QuoteArgSeen => {
                let other = 1 - self.cur().select;
                if c == END2_QUOTE_ARG {
                    if self.quote_depth == 1 {
                        // the argument is complete
                        self.cur_mut().state = State::WaitArgOrMacroEnd;
                    } else {
                        self.add_char(other, END1_QUOTE_ARG)?;
                        self.add_char(other, END2_QUOTE_ARG)?;
                        self.quote_depth -= 1;
                        self.cur_mut().state = State::GettingQuotedArg;
                    }
                } else {
                    // false alarm: the bytes were ordinary content
                    self.add_char(other, END1_QUOTE_ARG)?;
                    self.add_char(other, c)?;
                    if c != END1_QUOTE_ARG {
                        self.cur_mut().state = State::GettingQuotedArg;
                    }
                }
            }
        }

        Ok(())
    }

    /// Invocation: the collecting frame saw `)` in `WaitArgOrMacroEnd`.
    fn invoke(&mut self) -> Result<(), EngineError> {
        if self.nest == MAX_NEST - 1 {
            return Err(EngineError::NestingTooDeep);
        }

        let select = self.cur().select;
        let other = 1 - select;
        let (base, count) = {
            let frame = self.cur();
            (frame.pending_base, frame.pending_count)
        };
        // publish the collected strings as this invocation's argument
        // vector; their arena slots are reclaimed immediately
        let args = self.arenas[other].take_strings(base, count);

        let looked_up = self.table.lookup(&args[0]).cloned();
        match looked_up {
            Some(MacroValue::Builtin(handler)) => {
                if self.nest >= MAX_NEST - 2 {
                    return Err(EngineError::NestingTooDeep);
                }
                // re-create the caller's environment so text the built-in
                // re-expands resolves $(N) against the caller's arguments
                let caller_args = self.cur().args.clone();
                self.frames
                    .push(Frame::new(State::Normal, select, caller_args, false));
                self.nest += 2;

                handler(self, &args)?;

                self.frames.pop();
                self.nest -= 2;
            }
            Some(MacroValue::Text(body)) => {
                self.expand_body(select, args, &body)?;
            }
            // an undefined macro expands as the empty body
            None => {
                self.expand_body(select, args, &[])?;
            }
        }

        self.cur_mut().state = State::Normal;
        Ok(())
    }

    /// Feed a text body through the recognizer in a fresh frame whose
    /// result flows to the caller's sink.
    fn expand_body(
        &mut self,
        select: usize,
        args: Vec<Vec<u8>>,
        body: &[u8],
    ) -> Result<(), EngineError> {
        self.frames
            .push(Frame::new(State::Normal, select, Rc::new(args), false));
        self.nest += 1;

        for &b in body {
            self.feed(b)?;
        }

        self.frames.pop();
        self.nest -= 1;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
