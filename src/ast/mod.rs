use serde::Serialize;

pub mod source_map;
pub use source_map::SourceMap;

// ---- Span infrastructure ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span { start: range.start, end: range.end }
    }
}

/// Wraps a node with its source span. Transparent to serde (serializes as inner node only).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Spanned { node, span }
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T: Serialize> Serialize for Spanned<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.serialize(serializer)
    }
}

// ---- Syntax tree ----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// `var name = initializer;`, initializer defaults to nil
    Var {
        name: Spanned<String>,
        initializer: Option<Spanned<Expr>>,
    },

    /// `print expr;`
    Print(Spanned<Expr>),

    /// `expr;`, value is discarded
    Expr(Spanned<Expr>),

    /// `{ declarations }`, opens a local scope
    Block {
        statements: Vec<Spanned<Stmt>>,
        /// Span of the closing brace; scope cleanup is attributed to it.
        #[serde(skip)]
        close: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal),

    /// Variable reference
    Variable(String),

    /// `name = value`
    Assign {
        name: String,
        value: Box<Spanned<Expr>>,
    },

    /// `!operand` or `-operand`
    Unary {
        op: Spanned<UnaryOp>,
        operand: Box<Spanned<Expr>>,
    },

    /// A run of infix operators of one precedence level,
    /// `first op operand op operand ...`, grouped to the left. Each `op`
    /// carries the operator token's span.
    ///
    /// Kept flat so that a long chain like `1 + 2 + ... + n` is one node
    /// rather than `n` nested ones.
    Binary {
        first: Box<Spanned<Expr>>,
        rest: Vec<(Spanned<BinaryOp>, Spanned<Expr>)>,
    },

    /// `( expr )`
    Grouping(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// A script: top-level declarations in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Spanned<Stmt>>,
    #[serde(skip)]
    pub source: Option<String>,
}
