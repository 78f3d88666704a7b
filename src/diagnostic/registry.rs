/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,  // brief description for tooling
    pub long: &'static str,   // full explanation for --explain
}

/// All stable error codes reported by `lox`.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Lexer ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-L001",
        short: "unexpected character",
        long: r#"## LOX-L001: unexpected character

A character was found that cannot start any token.

**Example:**

    print 1 # 2;

`#` is not a Lox operator. Comments start with `//`.
"#,
    },
    ErrorEntry {
        code: "LOX-L002",
        short: "unterminated string",
        long: r#"## LOX-L002: unterminated string

A string literal was opened with `"` but the file ended before the
closing quote. String literals may span several lines, so the missing
quote can be far above the end of the file.

**Example:**

    print "hello;
"#,
    },

    // ── Parser ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-P001",
        short: "expected an expression",
        long: r#"## LOX-P001: expected an expression

The parser needed the start of an expression (a literal, a variable
name, `(`, `!` or `-`) and found something else.

**Example:**

    print ;
    var a = * 2;
"#,
    },
    ErrorEntry {
        code: "LOX-P002",
        short: "missing ';' after print value",
        long: r#"## LOX-P002: missing ';' after value

Every `print` statement ends with a semicolon.

**Example:**

    print 1 + 2

**Fix:**

    print 1 + 2;
"#,
    },
    ErrorEntry {
        code: "LOX-P003",
        short: "missing ';' after expression statement",
        long: r#"## LOX-P003: missing ';' after expression

An expression used as a statement must end with a semicolon. This is
often reported one token late, when two expressions are written next
to each other.

**Example:**

    a = 1 b = 2;
"#,
    },
    ErrorEntry {
        code: "LOX-P004",
        short: "missing variable name",
        long: r#"## LOX-P004: expected variable name

`var` must be followed by an identifier.

**Example:**

    var = 3;
    var 1x = 3;
"#,
    },
    ErrorEntry {
        code: "LOX-P005",
        short: "missing ';' after variable declaration",
        long: r#"## LOX-P005: missing ';' after variable declaration

**Example:**

    var a = 1

**Fix:**

    var a = 1;
"#,
    },
    ErrorEntry {
        code: "LOX-P006",
        short: "missing ')'",
        long: r#"## LOX-P006: expected ')' after expression

A parenthesised group was not closed.

**Example:**

    print (1 + 2;
"#,
    },
    ErrorEntry {
        code: "LOX-P007",
        short: "missing '}'",
        long: r#"## LOX-P007: expected '}' after block

A block opened with `{` was still open at the end of the file.
"#,
    },
    ErrorEntry {
        code: "LOX-P008",
        short: "invalid assignment target",
        long: r#"## LOX-P008: invalid assignment target

Only a variable can appear on the left of `=`.

**Example:**

    1 + 2 = 3;
    (a) = 3;
"#,
    },

    // ── Code generation ─────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-C001",
        short: "too many constants in one chunk",
        long: r#"## LOX-C001: too many constants in one chunk

A chunk can address 16,777,216 constants (24-bit operands). Every
literal and every distinct global name takes one.
"#,
    },
    ErrorEntry {
        code: "LOX-C002",
        short: "too many local variables",
        long: r#"## LOX-C002: too many local variables

Local variables live in operand-stack slots addressed by a 24-bit
operand, so at most 16,777,216 can be in scope at once.
"#,
    },
    ErrorEntry {
        code: "LOX-C003",
        short: "variable already declared in this scope",
        long: r#"## LOX-C003: variable already declared in this scope

Inside a block, a name can be declared once per scope. Shadowing a
variable from an enclosing scope is fine. At top level, redeclaring a
global is allowed and simply overwrites it.

**Example:**

    {
      var a = 1;
      var a = 2;
    }
"#,
    },
    ErrorEntry {
        code: "LOX-C004",
        short: "local read in its own initializer",
        long: r#"## LOX-C004: can't read local variable in its own initializer

A local variable is not usable until its initializer has finished.

**Example:**

    var a = "outer";
    {
      var a = a;
    }
"#,
    },

    // ── Runtime ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-R001",
        short: "operands must be numbers",
        long: r#"## LOX-R001: operands must be numbers

`-`, `*`, `/`, `<`, `<=`, `>` and `>=` only work on numbers.

**Example:**

    print "a" < "b";
"#,
    },
    ErrorEntry {
        code: "LOX-R002",
        short: "operands must be two numbers or two strings",
        long: r#"## LOX-R002: operands must be two numbers or two strings

`+` adds two numbers or concatenates two strings. Mixing the two is an
error; there is no implicit conversion.

**Example:**

    print "count: " + 3;
"#,
    },
    ErrorEntry {
        code: "LOX-R003",
        short: "operand must be a number",
        long: r#"## LOX-R003: operand must be a number

Unary `-` only negates numbers.

**Example:**

    print -"a";
"#,
    },
    ErrorEntry {
        code: "LOX-R004",
        short: "undefined variable",
        long: r#"## LOX-R004: undefined variable

A global variable was read or assigned before any `var` declaration
for it ran. Assignment does not declare a variable.

**Example:**

    x = 1;
"#,
    },
    ErrorEntry {
        code: "LOX-R005",
        short: "could not write output",
        long: r#"## LOX-R005: could not write output

Writing the result of `print` failed, usually because standard output
was closed.
"#,
    },
    ErrorEntry {
        code: "LOX-R900",
        short: "malformed bytecode",
        long: r#"## LOX-R900: malformed bytecode

The VM met an instruction stream the compiler never produces: an
unknown opcode, an operand past the end of the chunk, a constant or
variable slot out of range, a pop from an empty stack, or a chunk
without a final `OP_RETURN`. The stack is cleared and the script stops.
"#,
    },
];

/// Look up an error code; case-insensitive.
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}
