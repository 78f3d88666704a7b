use std::fmt;
use std::io::Write;

use tracing::Level;

use crate::chunk::{Chunk, OpCode};
use crate::compiler::{self, CompileError, GlobalNames};
use crate::debug;
use crate::object::Heap;
use crate::value::Value;

// ── Results and errors ───────────────────────────────────────────────

/// Outcome of one `interpret` call, as the embedding driver sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

impl InterpretResult {
    /// sysexits-style process status: 0, `EX_DATAERR` (65), `EX_SOFTWARE` (70).
    pub fn exit_code(self) -> i32 {
        match self {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError => 65,
            InterpretResult::RuntimeError => 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted(InterpretResult),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    // Malformed bytecode. The compiler never produces these.
    #[error("Stack underflow.")]
    StackUnderflow,
    #[error("Unknown opcode {0}.")]
    UnknownOpcode(u8),
    #[error("Constant index {0} out of range.")]
    ConstantOutOfRange(usize),
    #[error("Global slot {0} out of range.")]
    GlobalOutOfRange(usize),
    #[error("Local slot {0} out of range.")]
    LocalOutOfRange(usize),
    #[error("Instruction at offset {0} is truncated.")]
    TruncatedInstruction(usize),
    #[error("Reached end of chunk without OP_RETURN.")]
    MissingReturn,
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl RuntimeErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeErrorKind::OperandsMustBeNumbers => "LOX-R001",
            RuntimeErrorKind::OperandsMustBeNumbersOrStrings => "LOX-R002",
            RuntimeErrorKind::OperandMustBeNumber => "LOX-R003",
            RuntimeErrorKind::UndefinedVariable(_) => "LOX-R004",
            RuntimeErrorKind::Output(_) => "LOX-R005",
            _ => "LOX-R900",
        }
    }

    /// True for errors that mean the chunk itself is broken rather than the
    /// program misbehaving.
    pub fn is_internal(&self) -> bool {
        self.code() == "LOX-R900"
    }
}

/// A runtime error and the source line of the instruction that raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}\n[line {line}] in script")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpretError {
    #[error("{}", join_lines(.0))]
    Compile(Vec<CompileError>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn join_lines(errors: &[CompileError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}

impl InterpretError {
    pub fn result(&self) -> InterpretResult {
        match self {
            InterpretError::Compile(_) => InterpretResult::CompileError,
            InterpretError::Runtime(_) => InterpretResult::RuntimeError,
        }
    }
}

// ── VM ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VmOptions {
    /// Write the disassembled chunk to the output before running it.
    pub disassemble: bool,
}

enum Flow {
    Continue,
    Return,
}

type Step = Result<Flow, RuntimeErrorKind>;

/// A stack-based bytecode interpreter.
///
/// Owns everything a running script touches: the current chunk, the operand
/// stack, the global slots, the heap and the global-name table the compiler
/// resolves against. Globals and heap objects survive from one `interpret`
/// call to the next, which is what a REPL needs. `print` output goes to `W`.
pub struct Vm<W: Write> {
    chunk: Chunk,
    ip: usize,
    stack: Vec<Value>,
    /// Indexed by the constant index of a global's name. `Invalid` marks a
    /// reserved but not yet defined slot.
    globals: Vec<Value>,
    names: GlobalNames,
    heap: Heap,
    out: W,
    options: VmOptions,
    state: VmState,
}

impl<W: Write> Vm<W> {
    pub fn new(out: W) -> Self {
        Self::with_options(out, VmOptions::default())
    }

    pub fn with_options(out: W, options: VmOptions) -> Self {
        Vm {
            chunk: Chunk::new(),
            ip: 0,
            stack: Vec::new(),
            globals: Vec::new(),
            names: GlobalNames::new(),
            heap: Heap::new(),
            out,
            options,
            state: VmState::Ready,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Needed to intern strings for hand-assembled chunks.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Compile and run `source`. Globals defined by earlier calls stay visible.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        self.state = VmState::Ready;
        tracing::debug!(bytes = source.len(), "interpret");

        let script = match compiler::compile(source, &mut self.heap, &self.names) {
            Ok(script) => script,
            Err(errors) => {
                tracing::debug!(errors = errors.len(), "compile failed");
                self.state = VmState::Halted(InterpretResult::CompileError);
                return Err(InterpretError::Compile(errors));
            }
        };
        self.names = script.globals;

        if self.options.disassemble {
            let listing = debug::disassemble_chunk(&script.chunk, "script");
            self.out
                .write_all(listing.as_bytes())
                .map_err(|e| RuntimeError { kind: RuntimeErrorKind::Output(e.to_string()), line: 0 })?;
        }

        self.interpret_chunk(script.chunk)
    }

    /// Run an already-built chunk. Its constant indices address the global
    /// slots, exactly as for compiled source.
    pub fn interpret_chunk(&mut self, chunk: Chunk) -> Result<(), InterpretError> {
        self.chunk = chunk;
        self.ip = 0;
        self.stack.clear();
        let needed = self.chunk.constants().len();
        if self.globals.len() < needed {
            tracing::debug!(from = self.globals.len(), to = needed, "grow globals");
            self.globals.resize(needed, Value::Invalid);
        }

        self.state = VmState::Running;
        match self.run() {
            Ok(()) => {
                self.state = VmState::Halted(InterpretResult::Ok);
                tracing::debug!(stack = self.stack.len(), "halted");
                Ok(())
            }
            Err(e) => {
                self.stack.clear();
                self.state = VmState::Halted(InterpretResult::RuntimeError);
                tracing::debug!(error = %e.kind, line = e.line, "runtime error");
                Err(e.into())
            }
        }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if tracing::enabled!(Level::TRACE) {
                self.trace_instruction();
            }
            let offset = self.ip;
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return) => return Ok(()),
                Err(kind) => {
                    let line = self
                        .chunk
                        .line_at(offset)
                        .or_else(|| self.chunk.lines().last().copied())
                        .unwrap_or(0);
                    return Err(RuntimeError { kind, line });
                }
            }
        }
    }

    /// Executes one instruction.
    fn step(&mut self) -> Step {
        let byte = self.read_byte()?;
        let op = OpCode::from_byte(byte).ok_or(RuntimeErrorKind::UnknownOpcode(byte))?;

        match op {
            OpCode::Constant => {
                let index = usize::from(self.read_byte()?);
                let value = self.read_constant(index)?;
                self.push(value);
            }
            OpCode::ConstantLong => {
                let index = self.read_u24()?;
                let value = self.read_constant(index)?;
                self.push(value);
            }
            OpCode::Nil => self.push(Value::Nil),
            OpCode::True => self.push(Value::Bool(true)),
            OpCode::False => self.push(Value::Bool(false)),

            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b));
            }
            OpCode::Greater => self.binary_number(|a, b| Value::Bool(a > b))?,
            OpCode::Less => self.binary_number(|a, b| Value::Bool(a < b))?,

            OpCode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                let sum = match (&a, &b) {
                    (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
                    _ => match (a.as_string(), b.as_string()) {
                        (Some(x), Some(y)) => {
                            let mut chars = String::with_capacity(x.len() + y.len());
                            chars.push_str(x.as_str());
                            chars.push_str(y.as_str());
                            Value::Obj(self.heap.take_string(chars))
                        }
                        _ => return Err(RuntimeErrorKind::OperandsMustBeNumbersOrStrings),
                    },
                };
                self.push(sum);
            }
            OpCode::Subtract => self.binary_number(|a, b| Value::Number(a - b))?,
            OpCode::Multiply => self.binary_number(|a, b| Value::Number(a * b))?,
            // IEEE-754: dividing by zero yields inf or NaN.
            OpCode::Divide => self.binary_number(|a, b| Value::Number(a / b))?,

            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Bool(value.is_falsey()));
            }
            OpCode::Negate => {
                let n = self.pop()?.as_number().ok_or(RuntimeErrorKind::OperandMustBeNumber)?;
                self.push(Value::Number(-n));
            }

            OpCode::Print => {
                let value = self.pop()?;
                writeln!(self.out, "{}", value).map_err(|e| RuntimeErrorKind::Output(e.to_string()))?;
            }
            OpCode::Pop => {
                self.pop()?;
            }

            OpCode::DefineGlobal => {
                let slot = self.read_u24()?;
                let value = self.pop()?;
                *self.global_mut(slot)? = value;
            }
            OpCode::GetGlobal => {
                let slot = self.read_u24()?;
                let value = self.defined_global(slot)?.clone();
                self.push(value);
            }
            OpCode::SetGlobal => {
                let slot = self.read_u24()?;
                self.defined_global(slot)?;
                let value = self.peek(0)?.clone();
                *self.global_mut(slot)? = value;
            }

            OpCode::GetLocal => {
                let slot = self.read_u24()?;
                let value = self
                    .stack
                    .get(slot)
                    .cloned()
                    .ok_or(RuntimeErrorKind::LocalOutOfRange(slot))?;
                self.push(value);
            }
            OpCode::SetLocal => {
                let slot = self.read_u24()?;
                let value = self.peek(0)?.clone();
                let target = self
                    .stack
                    .get_mut(slot)
                    .ok_or(RuntimeErrorKind::LocalOutOfRange(slot))?;
                *target = value;
            }

            OpCode::Return => return Ok(Flow::Return),
        }
        Ok(Flow::Continue)
    }

    // ── Decoding ────────────────────────────────────────────────────

    fn read_byte(&mut self) -> Result<u8, RuntimeErrorKind> {
        let byte = match self.chunk.code().get(self.ip) {
            Some(&b) => b,
            None if self.ip == self.chunk.len() => return Err(RuntimeErrorKind::MissingReturn),
            None => return Err(RuntimeErrorKind::TruncatedInstruction(self.ip)),
        };
        self.ip += 1;
        Ok(byte)
    }

    fn read_u24(&mut self) -> Result<usize, RuntimeErrorKind> {
        let operand = self
            .chunk
            .read_u24(self.ip)
            .ok_or(RuntimeErrorKind::TruncatedInstruction(self.ip - 1))?;
        self.ip += 3;
        Ok(operand)
    }

    fn read_constant(&self, index: usize) -> Result<Value, RuntimeErrorKind> {
        self.chunk
            .constant(index)
            .cloned()
            .ok_or(RuntimeErrorKind::ConstantOutOfRange(index))
    }

    // ── Stack ───────────────────────────────────────────────────────

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn peek(&self, distance: usize) -> Result<&Value, RuntimeErrorKind> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn binary_number(&mut self, op: fn(f64, f64) -> Value) -> Result<(), RuntimeErrorKind> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                self.push(op(x, y));
                Ok(())
            }
            _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
        }
    }

    // ── Globals ─────────────────────────────────────────────────────

    fn global_mut(&mut self, slot: usize) -> Result<&mut Value, RuntimeErrorKind> {
        self.globals.get_mut(slot).ok_or(RuntimeErrorKind::GlobalOutOfRange(slot))
    }

    /// The slot's value, or `Undefined variable` naming the constant that
    /// shares the slot's index.
    fn defined_global(&self, slot: usize) -> Result<&Value, RuntimeErrorKind> {
        let value = self.globals.get(slot).ok_or(RuntimeErrorKind::GlobalOutOfRange(slot))?;
        if value.is_invalid() {
            let name = self.chunk.constant(slot).map(|v| v.to_string()).unwrap_or_default();
            return Err(RuntimeErrorKind::UndefinedVariable(name));
        }
        Ok(value)
    }

    fn trace_instruction(&self) {
        let stack = StackDump(&self.stack);
        let mut listing = String::new();
        debug::disassemble_instruction(&self.chunk, self.ip, &mut listing);
        tracing::trace!(stack = %stack, "{}", listing.trim_end());
    }
}

struct StackDump<'a>(&'a [Value]);

impl fmt::Display for StackDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in self.0 {
            write!(f, "[ {} ]", value)?;
        }
        Ok(())
    }
}

impl<W: Write> Drop for Vm<W> {
    /// Releases the stack, the globals, then the intern table and every heap
    /// object.
    fn drop(&mut self) {
        tracing::debug!(
            stack = self.stack.len(),
            globals = self.globals.len(),
            objects = self.heap.object_count(),
            "teardown"
        );
        self.stack.clear();
        self.globals.clear();
        self.names = GlobalNames::new();
        self.chunk = Chunk::new();
        self.heap.free_objects();
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn vm() -> Vm<Vec<u8>> {
        Vm::new(Vec::new())
    }

    fn output(vm: &Vm<Vec<u8>>) -> String {
        String::from_utf8(vm.output().clone()).unwrap()
    }

    fn run(source: &str) -> String {
        let mut vm = vm();
        vm.interpret(source).unwrap_or_else(|e| panic!("{e}"));
        output(&vm)
    }

    fn runtime_error(source: &str) -> RuntimeError {
        let mut vm = vm();
        match vm.interpret(source) {
            Err(InterpretError::Runtime(e)) => {
                assert!(vm.stack().is_empty());
                assert_eq!(vm.state(), VmState::Halted(InterpretResult::RuntimeError));
                e
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    // ---- hand-assembled chunks ----

    #[test]
    fn add_numbers_leaves_sum() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1).unwrap();
        chunk.write_constant(Value::Number(2.0), 1).unwrap();
        chunk.write_op(OpCode::Add, 1);
        chunk.write_op(OpCode::Return, 1);

        let mut vm = vm();
        vm.interpret_chunk(chunk).unwrap();
        assert_eq!(vm.stack(), &[Value::Number(3.0)]);
        assert_eq!(vm.state(), VmState::Halted(InterpretResult::Ok));
        assert_eq!(vm.stack()[0].to_string(), "3");
    }

    #[test]
    fn add_strings_concatenates_and_interns() {
        let mut vm = vm();
        let a = vm.heap_mut().copy_string("a");
        let b = vm.heap_mut().copy_string("b");
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Obj(a), 1).unwrap();
        chunk.write_constant(Value::Obj(b), 1).unwrap();
        chunk.write_op(OpCode::Add, 1);
        chunk.write_op(OpCode::Print, 1);
        chunk.write_op(OpCode::Return, 1);

        vm.interpret_chunk(chunk).unwrap();
        assert_eq!(output(&vm), "ab\n");
        let ab = vm.heap_mut().copy_string("ab");
        assert_eq!(vm.heap().object_count(), 3);
        assert!(vm.heap().strings().find_string("ab", ab.hash_value()).is_some_and(|s| Rc::ptr_eq(&s, &ab)));
    }

    #[test]
    fn add_bool_and_number_is_runtime_error() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::True, 3);
        chunk.write_constant(Value::Number(1.0), 3).unwrap();
        chunk.write_op(OpCode::Add, 3);
        chunk.write_op(OpCode::Return, 3);

        let mut vm = vm();
        let err = vm.interpret_chunk(chunk).unwrap_err();
        assert_eq!(err.result(), InterpretResult::RuntimeError);
        assert_eq!(err.to_string(), "Operands must be two numbers or two strings.\n[line 3] in script");
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn global_slot_lifecycle() {
        let mut vm = vm();
        let name = vm.heap_mut().copy_string("g");
        let mut chunk = Chunk::new();
        let slot = chunk.add_constant(Value::Obj(name));
        chunk.write_op_u24(OpCode::GetGlobal, slot, 1).unwrap();
        chunk.write_op(OpCode::Return, 1);
        let err = vm.interpret_chunk(chunk.clone()).unwrap_err();
        assert_eq!(
            err,
            InterpretError::Runtime(RuntimeError {
                kind: RuntimeErrorKind::UndefinedVariable("g".into()),
                line: 1,
            })
        );

        let mut set = Chunk::with_constants(chunk.constants().to_vec());
        set.write_op(OpCode::Nil, 1);
        set.write_op_u24(OpCode::SetGlobal, slot, 1).unwrap();
        set.write_op(OpCode::Return, 1);
        assert!(vm.interpret_chunk(set).is_err());

        let mut define = Chunk::with_constants(chunk.constants().to_vec());
        define.write_constant(Value::Number(7.0), 2).unwrap();
        define.write_op_u24(OpCode::DefineGlobal, slot, 2).unwrap();
        define.write_op_u24(OpCode::GetGlobal, slot, 2).unwrap();
        define.write_op(OpCode::Return, 2);
        vm.interpret_chunk(define).unwrap();
        assert_eq!(vm.stack(), &[Value::Number(7.0)]);
        assert_eq!(vm.globals()[slot], Value::Number(7.0));
    }

    #[test]
    fn long_constants_execute() {
        let mut chunk = Chunk::new();
        for i in 0..300 {
            chunk.write_constant(Value::Number(i as f64), 1).unwrap();
            if i > 0 {
                chunk.write_op(OpCode::Add, 1);
            }
        }
        chunk.write_op(OpCode::Return, 1);
        let mut vm = vm();
        vm.interpret_chunk(chunk).unwrap();
        assert_eq!(vm.stack(), &[Value::Number((0..300).sum::<i32>() as f64)]);
    }

    #[test]
    fn malformed_chunks_are_internal_errors() {
        let cases: Vec<(Vec<u8>, RuntimeErrorKind)> = vec![
            (vec![OpCode::Pop as u8], RuntimeErrorKind::StackUnderflow),
            (vec![250], RuntimeErrorKind::UnknownOpcode(250)),
            (vec![OpCode::Nil as u8], RuntimeErrorKind::MissingReturn),
            (vec![OpCode::Constant as u8, 9, OpCode::Return as u8], RuntimeErrorKind::ConstantOutOfRange(9)),
            (vec![OpCode::GetLocal as u8, 4, 0, 0, OpCode::Return as u8], RuntimeErrorKind::LocalOutOfRange(4)),
            (vec![OpCode::Nil as u8, OpCode::DefineGlobal as u8, 1, 0, 0], RuntimeErrorKind::GlobalOutOfRange(1)),
            (vec![OpCode::GetGlobal as u8, 0], RuntimeErrorKind::TruncatedInstruction(0)),
        ];
        for (code, expected) in cases {
            let mut chunk = Chunk::new();
            for byte in &code {
                chunk.write(*byte, 5);
            }
            let mut vm = vm();
            match vm.interpret_chunk(chunk) {
                Err(InterpretError::Runtime(e)) => {
                    assert_eq!(e.kind, expected, "bytes {code:?}");
                    assert!(e.kind.is_internal());
                    assert_eq!(e.line, 5);
                }
                other => panic!("bytes {code:?}: expected runtime error, got {other:?}"),
            }
            assert!(vm.stack().is_empty());
        }
    }

    // ---- source programs ----

    #[test]
    fn prints_arithmetic() {
        assert_eq!(run("print 1 + 2;"), "3\n");
        assert_eq!(run("print (5 - (3 - 1)) * -2 / 4;"), "-1.5\n");
        assert_eq!(run("print 10 / 4;"), "2.5\n");
    }

    #[test]
    fn division_by_zero_is_ieee() {
        assert_eq!(run("print 1 / 0; print -1 / 0; print 0 / 0;"), "inf\n-inf\nnan\n");
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(
            run("print 1 < 2; print 2 <= 1; print 3 >= 3; print 1 == 1; print \"a\" != \"a\"; print nil == false;"),
            "true\nfalse\ntrue\ntrue\nfalse\nfalse\n"
        );
        assert_eq!(run("print 0 / 0 == 0 / 0;"), "false\n");
    }

    #[test]
    fn falsiness() {
        assert_eq!(
            run("print !nil; print !false; print !0; print !\"\"; print !true;"),
            "true\ntrue\nfalse\nfalse\nfalse\n"
        );
    }

    #[test]
    fn string_concatenation_interns_result() {
        assert_eq!(run("print \"con\" + \"cat\" == \"concat\";"), "true\n");
        let mut vm = vm();
        vm.interpret("var a = \"x\" + \"y\"; var b = \"xy\";").unwrap();
        // "a", "x", "y", "b" and "xy": the concatenation reused the literal's object
        assert_eq!(vm.heap().object_count(), 5);
    }

    #[test]
    fn globals_and_assignment() {
        assert_eq!(
            run("var a = 1; var b; print b; b = a = 3; print a + b; a = \"s\"; print a;"),
            "nil\n6\ns\n"
        );
    }

    #[test]
    fn redefining_a_global_overwrites_it() {
        assert_eq!(run("var a = 1; var a = 2; print a;"), "2\n");
    }

    #[test]
    fn locals_and_shadowing() {
        let source = "
            var a = \"global\";
            {
                var a = \"outer\";
                {
                    var a = \"inner\";
                    print a;
                }
                print a;
                a = \"changed\";
                print a;
            }
            print a;
        ";
        assert_eq!(run(source), "inner\nouter\nchanged\nglobal\n");
    }

    #[test]
    fn block_pops_its_locals() {
        let mut vm = vm();
        vm.interpret("{ var a = 1; var b = 2; print a + b; }").unwrap();
        assert!(vm.stack().is_empty());
        assert_eq!(output(&vm), "3\n");
    }

    #[test]
    fn undefined_variable_reports_name_and_line() {
        let err = runtime_error("var a = 1;\nprint a;\nprint nope;");
        assert_eq!(err.kind, RuntimeErrorKind::UndefinedVariable("nope".into()));
        assert_eq!(err.line, 3);
        assert_eq!(err.to_string(), "Undefined variable 'nope'.\n[line 3] in script");
    }

    #[test]
    fn assigning_undefined_global_fails() {
        let err = runtime_error("x = 1;");
        assert_eq!(err.kind, RuntimeErrorKind::UndefinedVariable("x".into()));
    }

    #[test]
    fn type_errors() {
        assert_eq!(runtime_error("print -\"a\";").kind, RuntimeErrorKind::OperandMustBeNumber);
        assert_eq!(runtime_error("print 1 < true;").kind, RuntimeErrorKind::OperandsMustBeNumbers);
        assert_eq!(runtime_error("print nil * 2;").kind, RuntimeErrorKind::OperandsMustBeNumbers);
        assert_eq!(runtime_error("print \"a\" + 1;").kind, RuntimeErrorKind::OperandsMustBeNumbersOrStrings);
    }

    #[test]
    fn output_before_error_is_kept() {
        let mut vm = vm();
        let err = vm.interpret("print 1;\nprint 2;\nprint -nil;\nprint 4;").unwrap_err();
        assert_eq!(output(&vm), "1\n2\n");
        assert!(matches!(err, InterpretError::Runtime(RuntimeError { line: 3, .. })));
    }

    #[test]
    fn compile_error_halts_before_running() {
        let mut vm = vm();
        let err = vm.interpret("print 1; print ;").unwrap_err();
        assert_eq!(err.result(), InterpretResult::CompileError);
        assert_eq!(err.to_string(), "[line 1] Error at ';': Expect expression.");
        assert_eq!(vm.state(), VmState::Halted(InterpretResult::CompileError));
        assert!(output(&vm).is_empty());
    }

    #[test]
    fn globals_persist_between_calls() {
        let mut vm = vm();
        vm.interpret("var count = 1;").unwrap();
        vm.interpret("count = count + 1;").unwrap();
        assert!(vm.interpret("print undefined_here;").is_err());
        vm.interpret("var other = 10;").unwrap();
        vm.interpret("print count + other;").unwrap();
        assert_eq!(output(&vm), "12\n");
    }

    #[test]
    fn long_addition_chain_runs() {
        let source = format!("print {};", vec!["1"; 200_000].join(" + "));
        assert_eq!(run(&source), "200000\n");
    }

    #[test]
    fn repeated_lines_do_not_grow_globals() {
        let mut vm = vm();
        vm.interpret("var total = 0;").unwrap();
        for _ in 0..1000 {
            vm.interpret("total = total + 1;").unwrap();
        }
        vm.interpret("print total;").unwrap();
        assert_eq!(output(&vm), "1000\n");
        assert_eq!(vm.names.pool().len(), 1);
        assert!(vm.globals().len() <= 3, "globals: {}", vm.globals().len());
        assert_eq!(vm.chunk().code()[0], OpCode::GetGlobal as u8);

        vm.interpret("print 7;").unwrap();
        assert_eq!(vm.chunk().code()[0], OpCode::Constant as u8);
        assert_eq!(vm.chunk().code()[1], 1);
    }

    #[test]
    fn failed_compile_does_not_disturb_globals() {
        let mut vm = vm();
        vm.interpret("var a = 1;").unwrap();
        assert!(vm.interpret("var b = 2; print ;").is_err());
        vm.interpret("print a;").unwrap();
        assert!(vm.interpret("print b;").is_err());
        assert_eq!(output(&vm), "1\n");
    }

    #[test]
    fn disassemble_option_writes_listing_first() {
        let mut vm = Vm::with_options(Vec::new(), VmOptions { disassemble: true });
        vm.interpret("print 1;").unwrap();
        let out = output(&vm);
        assert!(out.starts_with("== script ==\n0000    1 OP_CONSTANT"), "{out}");
        assert!(out.ends_with("OP_RETURN\n1\n"), "{out}");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(InterpretResult::Ok.exit_code(), 0);
        assert_eq!(InterpretResult::CompileError.exit_code(), 65);
        assert_eq!(InterpretResult::RuntimeError.exit_code(), 70);
    }

    #[test]
    fn runtime_error_codes() {
        assert_eq!(RuntimeErrorKind::UndefinedVariable("x".into()).code(), "LOX-R004");
        assert!(!RuntimeErrorKind::OperandMustBeNumber.is_internal());
        assert!(RuntimeErrorKind::MissingReturn.is_internal());
    }
}
