//! A stack-based bytecode virtual machine for Lox.
//!
//! Source goes through [`lexer`] and [`parser`] into an [`ast`], the
//! [`compiler`] lowers that to a [`chunk::Chunk`], and [`vm::Vm`] runs it.
//! Values, heap objects and the hash table used for string interning and
//! global-name resolution live in [`value`], [`object`] and [`table`].

pub mod ast;
pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod diagnostic;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod table;
pub mod value;
pub mod vm;

pub use vm::{InterpretError, InterpretResult, Vm, VmOptions};

/// Compile and run `source` in a fresh VM, writing `print` output to `out`.
pub fn interpret<W: std::io::Write>(source: &str, out: W) -> Result<(), InterpretError> {
    Vm::new(out).interpret(source)
}
