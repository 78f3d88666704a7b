use crate::value::Value;

/// Largest index a 24-bit operand can carry.
pub const MAX_U24: usize = (1 << 24) - 1;
/// Constant indices below this use the one-byte `Constant` form.
pub const SHORT_CONSTANT_LIMIT: usize = 256;

// ── Opcode table ─────────────────────────────────────────────────────
//
// Single source of truth for the byte value, mnemonic and operand width of
// every instruction. The encoder, the VM and the disassembler all read it.

macro_rules! opcodes {
    ($($variant:ident = $byte:literal, $name:literal, $width:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $($variant = $byte,)*
        }

        impl OpCode {
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant,)*];

            /// Disassembly mnemonic, e.g. `OP_CONSTANT`.
            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$variant => $name,)*
                }
            }

            /// Number of operand bytes following the opcode.
            pub fn operand_width(self) -> usize {
                match self {
                    $(OpCode::$variant => $width,)*
                }
            }

            pub fn from_byte(byte: u8) -> Option<OpCode> {
                match byte {
                    $($byte => Some(OpCode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Constant     = 0,  "OP_CONSTANT",      1;
    ConstantLong = 1,  "OP_CONSTANT_LONG", 3;
    Nil          = 2,  "OP_NIL",           0;
    True         = 3,  "OP_TRUE",          0;
    False        = 4,  "OP_FALSE",         0;
    Equal        = 5,  "OP_EQUAL",         0;
    Greater      = 6,  "OP_GREATER",       0;
    Less         = 7,  "OP_LESS",          0;
    Add          = 8,  "OP_ADD",           0;
    Subtract     = 9,  "OP_SUBTRACT",      0;
    Multiply     = 10, "OP_MULTIPLY",      0;
    Divide       = 11, "OP_DIVIDE",        0;
    Not          = 12, "OP_NOT",           0;
    Negate       = 13, "OP_NEGATE",        0;
    Print        = 14, "OP_PRINT",         0;
    Pop          = 15, "OP_POP",           0;
    GetGlobal    = 16, "OP_GET_GLOBAL",    3;
    DefineGlobal = 17, "OP_DEFINE_GLOBAL", 3;
    SetGlobal    = 18, "OP_SET_GLOBAL",    3;
    GetLocal     = 19, "OP_GET_LOCAL",     3;
    SetLocal     = 20, "OP_SET_LOCAL",     3;
    Return       = 21, "OP_RETURN",        0;
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("operand {0} does not fit in 24 bits")]
    OperandTooLarge(usize),
}

/// Bytecode plus the source line of every byte and the constant pool.
///
/// `lines[i]` is the line that emitted `code[i]`. Constants are only ever
/// appended and are addressed by their index.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<u32>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chunk whose pool starts out with `constants`, keeping their indices.
    pub fn with_constants(constants: Vec<Value>) -> Self {
        Chunk { code: Vec::new(), lines: Vec::new(), constants }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Writes `value` as three little-endian bytes.
    pub fn write_u24(&mut self, value: usize, line: u32) -> Result<(), ChunkError> {
        if value > MAX_U24 {
            return Err(ChunkError::OperandTooLarge(value));
        }
        self.write((value & 0xFF) as u8, line);
        self.write(((value >> 8) & 0xFF) as u8, line);
        self.write(((value >> 16) & 0xFF) as u8, line);
        Ok(())
    }

    /// Emits `op` followed by its 24-bit operand.
    pub fn write_op_u24(&mut self, op: OpCode, operand: usize, line: u32) -> Result<(), ChunkError> {
        if operand > MAX_U24 {
            return Err(ChunkError::OperandTooLarge(operand));
        }
        self.write_op(op, line);
        self.write_u24(operand, line)
    }

    /// Reads the 24-bit little-endian operand starting at `offset`.
    pub fn read_u24(&self, offset: usize) -> Option<usize> {
        let bytes = self.code.get(offset..offset + 3)?;
        Some(usize::from(bytes[0]) | usize::from(bytes[1]) << 8 | usize::from(bytes[2]) << 16)
    }

    /// Appends to the pool without emitting any instruction.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Appends `value` to the pool and emits the load for it: `Constant` with a
    /// one-byte index while the index fits, `ConstantLong` with three bytes
    /// after that.
    pub fn write_constant(&mut self, value: Value, line: u32) -> Result<usize, ChunkError> {
        if self.constants.len() > MAX_U24 {
            return Err(ChunkError::TooManyConstants);
        }
        let index = self.add_constant(value);
        if index < SHORT_CONSTANT_LIMIT {
            self.write_op(OpCode::Constant, line);
            self.write(index as u8, line);
        } else {
            self.write_op_u24(OpCode::ConstantLong, index, line)?;
        }
        Ok(index)
    }
}
