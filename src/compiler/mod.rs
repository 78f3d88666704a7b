//! Turns Lox source text into a [`Chunk`].
//!
//! Lexing and parsing produce a spanned [`Program`]; this module walks it and
//! emits bytecode. Global variables are addressed by the constant-pool index
//! of their name, so each distinct name gets exactly one constant and that
//! index doubles as the VM's global slot. [`GlobalNames`] carries the
//! name-to-slot table from one compile to the next so that a REPL session
//! keeps its globals.

use std::fmt;
use std::rc::Rc;

use crate::ast::*;
use crate::chunk::{Chunk, ChunkError, MAX_U24, OpCode};
use crate::lexer::{self, LexError};
use crate::object::{Heap, Obj};
use crate::parser::{self, ParseError};
use crate::table::Table;
use crate::value::Value;

// ---- Errors ----

/// Where a compile error points, rendered after `Error` in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// ` at 'lexeme'`
    Token(String),
    /// ` at end`
    End,
    /// Lexical errors carry no location part.
    None,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::Token(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::End => f.write_str(" at end"),
            ErrorLocation::None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct CompileError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    pub line: usize,
    pub location: ErrorLocation,
}

impl CompileError {
    fn from_lex(e: &LexError, source_map: &SourceMap) -> Self {
        CompileError {
            code: e.code,
            message: e.message.to_string(),
            span: e.span,
            line: source_map.line(e.span.start),
            location: ErrorLocation::None,
        }
    }

    fn from_parse(e: &ParseError, source: &str, source_map: &SourceMap) -> Self {
        let location = if e.at_end {
            ErrorLocation::End
        } else {
            ErrorLocation::Token(lexeme(source, e.span).to_string())
        };
        CompileError {
            code: e.code,
            message: e.message.to_string(),
            span: e.span,
            line: source_map.line(e.span.start),
            location,
        }
    }
}

fn lexeme(source: &str, span: Span) -> &str {
    source.get(span.start..span.end).unwrap_or("")
}

// ---- Global name resolution ----

/// Global names seen so far and the constant pool prefix that holds them.
///
/// A chunk compiled against a `GlobalNames` starts from [`GlobalNames::pool`],
/// so every name keeps the constant index (and therefore the global slot) it
/// was first given.
#[derive(Debug, Clone, Default)]
pub struct GlobalNames {
    /// Interned name → `Number(slot)`.
    slots: Table,
    pool: Vec<Value>,
}

impl GlobalNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct global names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot of an interned name, if the name has been seen.
    pub fn slot(&self, name: &Rc<Obj>) -> Option<usize> {
        self.slots
            .get(&Value::Obj(Rc::clone(name)))
            .and_then(Value::as_number)
            .map(|n| n as usize)
    }

    /// Constants every subsequent chunk is seeded with.
    pub fn pool(&self) -> &[Value] {
        &self.pool
    }
}

// ---- Code generation ----

struct Local {
    name: String,
    /// `None` between declaration and the end of the initializer.
    depth: Option<usize>,
}

enum Target {
    Local(usize),
    Global(usize),
}

/// Output of a successful compile.
#[derive(Debug)]
pub struct CompiledScript {
    pub chunk: Chunk,
    /// Name table to compile the next script against.
    pub globals: GlobalNames,
}

struct Compiler<'a> {
    heap: &'a mut Heap,
    source: &'a str,
    source_map: SourceMap,
    chunk: Chunk,
    globals: GlobalNames,
    locals: Vec<Local>,
    scope_depth: usize,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    fn new(heap: &'a mut Heap, source: &'a str, globals: &GlobalNames) -> Self {
        Compiler {
            heap,
            source,
            source_map: SourceMap::new(source),
            chunk: Chunk::with_constants(globals.pool.clone()),
            globals: globals.clone(),
            locals: Vec::new(),
            scope_depth: 0,
            errors: Vec::new(),
        }
    }

    fn compile_program(mut self, program: &Program) -> Result<CompiledScript, Vec<CompileError>> {
        self.reserve_globals(&program.statements);
        let names = self.globals.len();

        for stmt in &program.statements {
            self.compile_stmt(stmt);
        }
        let end = program.statements.last().map(|s| s.span).unwrap_or(Span::UNKNOWN);
        self.emit(OpCode::Return, end);

        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        // Literals follow the names and are not carried into the next chunk.
        self.globals.pool = self.chunk.constants().get(..names).map(<[Value]>::to_vec).unwrap_or_default();
        tracing::debug!(
            bytes = self.chunk.len(),
            constants = self.chunk.constants().len(),
            globals = self.globals.len(),
            "compiled script"
        );
        Ok(CompiledScript { chunk: self.chunk, globals: self.globals })
    }

    /// Source line of the last byte covered by `span`. Instructions are
    /// attributed to the line where the construct that emits them ends.
    fn line(&self, span: Span) -> u32 {
        let offset = if span.end > span.start { span.end - 1 } else { span.start };
        self.source_map.line(offset) as u32
    }

    fn error_at(&mut self, span: Span, code: &'static str, message: impl Into<String>) {
        self.errors.push(CompileError {
            code,
            message: message.into(),
            span,
            line: self.source_map.line(span.start),
            location: ErrorLocation::Token(lexeme(self.source, span).to_string()),
        });
    }

    fn chunk_error(&mut self, span: Span, e: ChunkError) {
        self.error_at(span, "LOX-C001", e.to_string());
    }

    fn emit(&mut self, op: OpCode, span: Span) {
        let line = self.line(span);
        self.chunk.write_op(op, line);
    }

    fn emit_u24(&mut self, op: OpCode, operand: usize, span: Span) {
        let line = self.line(span);
        if let Err(e) = self.chunk.write_op_u24(op, operand, line) {
            self.chunk_error(span, e);
        }
    }

    fn emit_constant(&mut self, value: Value, span: Span) {
        let line = self.line(span);
        if let Err(e) = self.chunk.write_constant(value, line) {
            self.chunk_error(span, e);
        }
    }

    // ---- Statements ----

    fn compile_stmt(&mut self, stmt: &Spanned<Stmt>) {
        match &stmt.node {
            Stmt::Var { name, initializer } => self.compile_var(name, initializer.as_ref(), stmt.span),
            Stmt::Print(expr) => {
                self.compile_expr(expr);
                self.emit(OpCode::Print, stmt.span);
            }
            Stmt::Expr(expr) => {
                self.compile_expr(expr);
                self.emit(OpCode::Pop, stmt.span);
            }
            Stmt::Block { statements, close } => {
                self.scope_depth += 1;
                for s in statements {
                    self.compile_stmt(s);
                }
                self.end_scope(*close);
            }
        }
    }

    fn compile_var(&mut self, name: &Spanned<String>, initializer: Option<&Spanned<Expr>>, span: Span) {
        if self.scope_depth > 0 {
            self.declare_local(name);
            self.compile_initializer(name, initializer);
            let depth = self.scope_depth;
            if let Some(local) = self.locals.last_mut() {
                local.depth = Some(depth);
            }
            return;
        }

        let slot = self.global_slot(&name.node, name.span);
        self.compile_initializer(name, initializer);
        if let Some(slot) = slot {
            self.emit_u24(OpCode::DefineGlobal, slot, span);
        }
    }

    fn compile_initializer(&mut self, name: &Spanned<String>, initializer: Option<&Spanned<Expr>>) {
        match initializer {
            Some(expr) => self.compile_expr(expr),
            None => self.emit(OpCode::Nil, name.span),
        }
    }

    fn declare_local(&mut self, name: &Spanned<String>) {
        let duplicate = self
            .locals
            .iter()
            .rev()
            .take_while(|l| l.depth.is_none_or(|d| d >= self.scope_depth))
            .any(|l| l.name == name.node);
        if duplicate {
            self.error_at(name.span, "LOX-C003", "Already a variable with this name in this scope.");
        }
        if self.locals.len() > MAX_U24 {
            self.error_at(name.span, "LOX-C002", "Too many local variables in function.");
            return;
        }
        self.locals.push(Local { name: name.node.clone(), depth: None });
    }

    /// Closes the innermost scope, popping its locals off the stack.
    fn end_scope(&mut self, close: Span) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth.is_some_and(|d| d <= self.scope_depth) {
                break;
            }
            self.locals.pop();
            self.emit(OpCode::Pop, close);
        }
    }

    // ---- Variables ----

    /// Constant index of a global name, adding the name to the pool the
    /// first time it is seen. Reading a name that is never defined still
    /// gets a slot; the VM reports it as undefined.
    fn global_slot(&mut self, name: &str, span: Span) -> Option<usize> {
        let key = Value::Obj(self.heap.copy_string(name));
        if let Some(slot) = self.globals.slots.get(&key).and_then(Value::as_number) {
            return Some(slot as usize);
        }
        if self.chunk.constants().len() > MAX_U24 {
            self.chunk_error(span, ChunkError::TooManyConstants);
            return None;
        }
        let slot = self.chunk.add_constant(key.clone());
        self.globals.slots.set(key, Value::Number(slot as f64));
        Some(slot)
    }

    /// Gives every global the program names a slot before any literal is
    /// added, so the names form a dense prefix of the constant pool. Scopes
    /// are tracked the same way [`Compiler::resolve`] sees them; names that
    /// resolve to locals get no slot.
    fn reserve_globals(&mut self, statements: &[Spanned<Stmt>]) {
        let mut scopes: Vec<Vec<String>> = Vec::new();
        for stmt in statements {
            self.reserve_in_stmt(stmt, &mut scopes);
        }
    }

    fn reserve_in_stmt(&mut self, stmt: &Spanned<Stmt>, scopes: &mut Vec<Vec<String>>) {
        match &stmt.node {
            Stmt::Var { name, initializer } => {
                match scopes.last_mut() {
                    Some(scope) => scope.push(name.node.clone()),
                    None => {
                        self.global_slot(&name.node, name.span);
                    }
                }
                if let Some(expr) = initializer {
                    self.reserve_in_expr(expr, scopes);
                }
            }
            Stmt::Print(expr) | Stmt::Expr(expr) => self.reserve_in_expr(expr, scopes),
            Stmt::Block { statements, .. } => {
                scopes.push(Vec::new());
                for s in statements {
                    self.reserve_in_stmt(s, scopes);
                }
                scopes.pop();
            }
        }
    }

    fn reserve_in_expr(&mut self, expr: &Spanned<Expr>, scopes: &mut Vec<Vec<String>>) {
        match &expr.node {
            Expr::Literal(_) => {}
            Expr::Variable(name) => self.reserve_unless_local(name, expr.span, scopes),
            Expr::Assign { name, value } => {
                let name_span = Span::new(expr.span.start, expr.span.start + name.len());
                self.reserve_unless_local(name, name_span, scopes);
                self.reserve_in_expr(value, scopes);
            }
            Expr::Unary { operand, .. } => self.reserve_in_expr(operand, scopes),
            Expr::Binary { first, rest } => {
                self.reserve_in_expr(first, scopes);
                for (_, operand) in rest {
                    self.reserve_in_expr(operand, scopes);
                }
            }
            Expr::Grouping(inner) => self.reserve_in_expr(inner, scopes),
        }
    }

    fn reserve_unless_local(&mut self, name: &str, span: Span, scopes: &[Vec<String>]) {
        if !scopes.iter().flatten().any(|local| local == name) {
            self.global_slot(name, span);
        }
    }

    fn resolve(&mut self, name: &str, name_span: Span) -> Option<Target> {
        let found = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.name == name)
            .map(|(slot, l)| (slot, l.depth.is_some()));
        match found {
            Some((slot, initialized)) => {
                if !initialized {
                    self.error_at(name_span, "LOX-C004", "Can't read local variable in its own initializer.");
                }
                Some(Target::Local(slot))
            }
            None => self.global_slot(name, name_span).map(Target::Global),
        }
    }

    // ---- Expressions ----

    fn compile_expr(&mut self, expr: &Spanned<Expr>) {
        let span = expr.span;
        match &expr.node {
            Expr::Literal(lit) => self.compile_literal(lit, span),
            Expr::Variable(name) => match self.resolve(name, span) {
                Some(Target::Local(slot)) => self.emit_u24(OpCode::GetLocal, slot, span),
                Some(Target::Global(slot)) => self.emit_u24(OpCode::GetGlobal, slot, span),
                None => {}
            },
            Expr::Assign { name, value } => {
                let name_span = Span::new(span.start, span.start + name.len());
                let target = self.resolve(name, name_span);
                self.compile_expr(value);
                match target {
                    Some(Target::Local(slot)) => self.emit_u24(OpCode::SetLocal, slot, span),
                    Some(Target::Global(slot)) => self.emit_u24(OpCode::SetGlobal, slot, span),
                    None => {}
                }
            }
            Expr::Unary { op, operand } => {
                self.compile_expr(operand);
                let code = match op.node {
                    UnaryOp::Not => OpCode::Not,
                    UnaryOp::Negate => OpCode::Negate,
                };
                self.emit(code, span);
            }
            Expr::Binary { first, rest } => {
                self.compile_expr(first);
                for (op, operand) in rest {
                    self.compile_expr(operand);
                    // Attributed to the end of the partial expression so far.
                    let upto = Span::new(first.span.start, operand.span.end);
                    for &code in binary_ops(op.node) {
                        self.emit(code, upto);
                    }
                }
            }
            Expr::Grouping(inner) => self.compile_expr(inner),
        }
    }

    fn compile_literal(&mut self, lit: &Literal, span: Span) {
        match lit {
            Literal::Number(n) => self.emit_constant(Value::Number(*n), span),
            Literal::String(s) => {
                let obj = self.heap.copy_string(s);
                self.emit_constant(Value::Obj(obj), span);
            }
            Literal::Bool(true) => self.emit(OpCode::True, span),
            Literal::Bool(false) => self.emit(OpCode::False, span),
            Literal::Nil => self.emit(OpCode::Nil, span),
        }
    }
}

/// Instruction sequence for a binary operator. The three operators without
/// an opcode of their own are emitted as the negated complement.
fn binary_ops(op: BinaryOp) -> &'static [OpCode] {
    match op {
        BinaryOp::Add => &[OpCode::Add],
        BinaryOp::Subtract => &[OpCode::Subtract],
        BinaryOp::Multiply => &[OpCode::Multiply],
        BinaryOp::Divide => &[OpCode::Divide],
        BinaryOp::Equal => &[OpCode::Equal],
        BinaryOp::NotEqual => &[OpCode::Equal, OpCode::Not],
        BinaryOp::Greater => &[OpCode::Greater],
        BinaryOp::GreaterEqual => &[OpCode::Less, OpCode::Not],
        BinaryOp::Less => &[OpCode::Less],
        BinaryOp::LessEqual => &[OpCode::Greater, OpCode::Not],
    }
}

// ---- Entry points ----

/// Lex and parse `source`, reporting every error found.
pub fn parse_source(source: &str) -> Result<Program, Vec<CompileError>> {
    let source_map = SourceMap::new(source);
    let tokens = lexer::lex(source).map_err(|e| vec![CompileError::from_lex(&e, &source_map)])?;
    let (mut program, errors) = parser::parse(tokens, source.len());
    if !errors.is_empty() {
        return Err(errors
            .iter()
            .map(|e| CompileError::from_parse(e, source, &source_map))
            .collect());
    }
    program.source = Some(source.to_string());
    Ok(program)
}

/// Compile `source` against the globals of earlier scripts. String literals
/// and global names are interned in `heap`.
pub fn compile(source: &str, heap: &mut Heap, globals: &GlobalNames) -> Result<CompiledScript, Vec<CompileError>> {
    let program = parse_source(source)?;
    Compiler::new(heap, source, globals).compile_program(&program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile_str(source: &str) -> (Chunk, GlobalNames, Heap) {
        let mut heap = Heap::new();
        let script = compile(source, &mut heap, &GlobalNames::new())
            .unwrap_or_else(|e| panic!("compile failed: {e:?}"));
        (script.chunk, script.globals, heap)
    }

    fn compile_errors(source: &str) -> Vec<String> {
        let mut heap = Heap::new();
        match compile(source, &mut heap, &GlobalNames::new()) {
            Ok(_) => panic!("expected compile errors for {source:?}"),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Decodes the chunk into (opcode, operand) pairs.
    fn ops(chunk: &Chunk) -> Vec<(OpCode, Option<usize>)> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < chunk.len() {
            let op = OpCode::from_byte(chunk.code()[offset]).unwrap();
            let operand = match op.operand_width() {
                0 => None,
                1 => Some(usize::from(chunk.code()[offset + 1])),
                _ => chunk.read_u24(offset + 1),
            };
            out.push((op, operand));
            offset += 1 + op.operand_width();
        }
        out
    }

    #[test]
    fn arithmetic_expression() {
        let (chunk, _, _) = compile_str("print 1 + 2 * 3;");
        assert_eq!(
            ops(&chunk),
            vec![
                (OpCode::Constant, Some(0)),
                (OpCode::Constant, Some(1)),
                (OpCode::Constant, Some(2)),
                (OpCode::Multiply, None),
                (OpCode::Add, None),
                (OpCode::Print, None),
                (OpCode::Return, None),
            ]
        );
    }

    #[test]
    fn missing_comparisons_are_desugared() {
        let (chunk, _, _) = compile_str("!(1 != 2); 1 >= 2; 1 <= 2;");
        let codes: Vec<OpCode> = ops(&chunk).into_iter().map(|(op, _)| op).collect();
        use OpCode::*;
        assert_eq!(
            codes,
            vec![
                Constant, Constant, Equal, Not, Not, Pop,
                Constant, Constant, Less, Not, Pop,
                Constant, Constant, Greater, Not, Pop,
                Return,
            ]
        );
    }

    #[test]
    fn global_name_is_constant_and_slot() {
        let (chunk, globals, _) = compile_str("var a = 1; a = a + 1; print a;");
        assert_eq!(
            ops(&chunk),
            vec![
                (OpCode::Constant, Some(1)),
                (OpCode::DefineGlobal, Some(0)),
                (OpCode::GetGlobal, Some(0)),
                (OpCode::Constant, Some(2)),
                (OpCode::Add, None),
                (OpCode::SetGlobal, Some(0)),
                (OpCode::Pop, None),
                (OpCode::GetGlobal, Some(0)),
                (OpCode::Print, None),
                (OpCode::Return, None),
            ]
        );
        assert_eq!(globals.len(), 1);
        assert_eq!(chunk.constant(0).map(|v| v.to_string()), Some("a".to_string()));
    }

    #[test]
    fn undefined_global_still_gets_a_slot() {
        let (chunk, globals, _) = compile_str("print missing;");
        assert_eq!(ops(&chunk)[0], (OpCode::GetGlobal, Some(0)));
        assert_eq!(globals.len(), 1);
    }

    #[test]
    fn globals_keep_their_slot_across_compiles() {
        let mut heap = Heap::new();
        let first = compile("var x = 10; var y = 20;", &mut heap, &GlobalNames::new()).unwrap();
        let y = heap.copy_string("y");
        let y_slot = first.globals.slot(&y).unwrap();

        let second = compile("print y; var z = 1;", &mut heap, &first.globals).unwrap();
        assert_eq!(ops(&second.chunk)[0], (OpCode::GetGlobal, Some(y_slot)));
        assert_eq!(second.globals.len(), 3);
        assert_eq!(second.globals.slot(&y), Some(y_slot));
        assert_eq!(second.globals.slot(&heap.copy_string("z")), Some(2));
    }

    #[test]
    fn names_come_before_literals() {
        let (chunk, globals, _) = compile_str("var a = 1; print 2; var b = 3; { var c = a; print c + b; }");
        assert_eq!(globals.len(), 2);
        let names: Vec<String> = globals.pool().iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(chunk.constants().len(), 5);
        assert_eq!(ops(&chunk)[0], (OpCode::Constant, Some(2)));
        assert_eq!(ops(&chunk)[1], (OpCode::DefineGlobal, Some(0)));
    }

    #[test]
    fn literals_do_not_pile_up_across_compiles() {
        let mut heap = Heap::new();
        let mut names = GlobalNames::new();
        for _ in 0..1000 {
            let script = compile("print 1;", &mut heap, &names).unwrap();
            assert_eq!(ops(&script.chunk)[0], (OpCode::Constant, Some(0)));
            names = script.globals;
        }
        assert!(names.pool().is_empty());

        let script = compile("var n = 1;", &mut heap, &names).unwrap();
        let script = compile("print 2; n = n + 3;", &mut heap, &script.globals).unwrap();
        assert_eq!(script.globals.pool().len(), 1);
        assert_eq!(script.chunk.constants().len(), 3);
    }

    #[test]
    fn block_local_used_before_declaration_is_global() {
        let (chunk, globals, _) = compile_str("{ print a; var a = 1; print a; }");
        assert_eq!(globals.len(), 1);
        let decoded = ops(&chunk);
        assert_eq!(decoded[0], (OpCode::GetGlobal, Some(0)));
        assert!(decoded.contains(&(OpCode::GetLocal, Some(0))));
    }

    #[test]
    fn long_operator_chain_compiles_flat() {
        let source = format!("print {};", vec!["1"; 200_000].join(" + "));
        let (chunk, _, _) = compile_str(&source);
        let adds = ops(&chunk).iter().filter(|(op, _)| *op == OpCode::Add).count();
        assert_eq!(adds, 199_999);
        assert_eq!(chunk.constants().len(), 200_000);
    }

    #[test]
    fn failed_compile_leaves_globals_untouched() {
        let mut heap = Heap::new();
        let names = GlobalNames::new();
        assert!(compile("var a = 1; print ;", &mut heap, &names).is_err());
        assert!(names.is_empty());
        assert!(names.pool().is_empty());
    }

    #[test]
    fn locals_use_stack_slots_and_are_popped() {
        let (chunk, globals, _) = compile_str("{ var a = 1; var b = a; print b; }");
        assert_eq!(
            ops(&chunk),
            vec![
                (OpCode::Constant, Some(0)),
                (OpCode::GetLocal, Some(0)),
                (OpCode::GetLocal, Some(1)),
                (OpCode::Print, None),
                (OpCode::Pop, None),
                (OpCode::Pop, None),
                (OpCode::Return, None),
            ]
        );
        assert!(globals.is_empty());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let (chunk, _, _) = compile_str("{ var a = 1; { var a = 2; a = 3; print a; } print a; }");
        let decoded = ops(&chunk);
        assert!(decoded.contains(&(OpCode::SetLocal, Some(1))));
        assert!(decoded.contains(&(OpCode::GetLocal, Some(1))));
        assert!(decoded.contains(&(OpCode::GetLocal, Some(0))));
        assert_eq!(decoded.iter().filter(|(op, _)| *op == OpCode::Pop).count(), 3);
    }

    #[test]
    fn uninitialized_local_defaults_to_nil() {
        let (chunk, _, _) = compile_str("{ var a; }");
        assert_eq!(
            ops(&chunk),
            vec![(OpCode::Nil, None), (OpCode::Pop, None), (OpCode::Return, None)]
        );
    }

    #[test]
    fn long_constants_in_expressions() {
        let terms: Vec<String> = (0..300).map(|i| i.to_string()).collect();
        let source = format!("print {};", terms.join(" + "));
        let (chunk, _, _) = compile_str(&source);
        let decoded = ops(&chunk);
        assert!(decoded.contains(&(OpCode::Constant, Some(255))));
        assert!(decoded.contains(&(OpCode::ConstantLong, Some(256))));
        assert!(decoded.contains(&(OpCode::ConstantLong, Some(299))));
    }

    #[test]
    fn string_literals_are_interned() {
        let (chunk, _, heap) = compile_str("print \"hi\" == \"hi\";");
        assert_eq!(heap.object_count(), 1);
        assert_eq!(chunk.constant(0), chunk.constant(1));
    }

    #[test]
    fn lines_follow_source() {
        let (chunk, _, _) = compile_str("print 1;\n\nprint\n  true;");
        let code = chunk.code();
        let print_lines: Vec<u32> = (0..code.len())
            .filter(|&i| code[i] == OpCode::Print as u8)
            .map(|i| chunk.lines()[i])
            .collect();
        assert_eq!(print_lines, vec![1, 4]);
        assert_eq!(chunk.lines()[0], 1);
    }

    #[test]
    fn empty_program_just_returns() {
        let (chunk, _, _) = compile_str("// nothing\n");
        assert_eq!(ops(&chunk), vec![(OpCode::Return, None)]);
        assert_eq!(chunk.lines(), &[1]);
    }

    #[test]
    fn duplicate_local_in_same_scope() {
        assert_eq!(
            compile_errors("{\n  var a = 1;\n  var a = 2;\n}"),
            vec!["[line 3] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn local_read_in_own_initializer() {
        assert_eq!(
            compile_errors("{ var a = 1; { var a = a; } }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn global_self_reference_is_allowed() {
        compile_str("var a = a;");
    }

    #[test]
    fn parse_errors_render_like_clox() {
        assert_eq!(compile_errors("print 1"), vec!["[line 1] Error at end: Expect ';' after value."]);
        assert_eq!(compile_errors("print ;"), vec!["[line 1] Error at ';': Expect expression."]);
        assert_eq!(
            compile_errors("var a = 1;\na + 1 = 2;"),
            vec!["[line 2] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn multiple_parse_errors_are_all_reported() {
        let errors = compile_errors("print ;\nvar 1;\nprint 2;");
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at ';': Expect expression.",
                "[line 2] Error at '1': Expect variable name.",
            ]
        );
    }

    #[test]
    fn lexical_errors_have_no_location() {
        assert_eq!(compile_errors("print @;"), vec!["[line 1] Error: Unexpected character."]);
        let errors = compile_errors("\nprint \"open");
        assert_eq!(errors, vec!["[line 2] Error: Unterminated string."]);
    }

    #[test]
    fn compile_error_carries_code_and_span() {
        let mut heap = Heap::new();
        let errors = compile("print ;", &mut heap, &GlobalNames::new()).unwrap_err();
        assert_eq!(errors[0].code, "LOX-P001");
        assert_eq!(errors[0].span, Span::new(6, 7));
        assert_eq!(errors[0].location, ErrorLocation::Token(";".into()));
    }

    #[test]
    fn parse_source_keeps_source() {
        let program = parse_source("print 1;").unwrap();
        assert_eq!(program.source.as_deref(), Some("print 1;"));
        assert_eq!(program.statements.len(), 1);
    }
}
