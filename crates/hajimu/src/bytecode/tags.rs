//! Node tags

// Statements
pub const STMT_EXPR: u8 = 0x01;
pub const STMT_VAR: u8 = 0x02;
pub const STMT_FUNCTION: u8 = 0x03;
pub const STMT_CLASS: u8 = 0x04;
pub const STMT_IF: u8 = 0x05;
pub const STMT_WHILE: u8 = 0x06;
pub const STMT_FOR_EACH: u8 = 0x07;
pub const STMT_FOR_RANGE: u8 = 0x08;
pub const STMT_RETURN: u8 = 0x09;
pub const STMT_BREAK: u8 = 0x0A;
pub const STMT_CONTINUE: u8 = 0x0B;
pub const STMT_THROW: u8 = 0x0C;
pub const STMT_TRY: u8 = 0x0D;
pub const STMT_BLOCK: u8 = 0x0E;
pub const STMT_IMPORT: u8 = 0x0F;
pub const STMT_WITH_LOCK: u8 = 0x10;

// Expressions
pub const EXPR_NULL: u8 = 0x20;
pub const EXPR_BOOL: u8 = 0x21;
pub const EXPR_NUMBER: u8 = 0x22;
pub const EXPR_STR: u8 = 0x23;
pub const EXPR_INTERPOLATED: u8 = 0x24;
pub const EXPR_ARRAY: u8 = 0x25;
pub const EXPR_MAP: u8 = 0x26;
pub const EXPR_IDENT: u8 = 0x27;
pub const EXPR_SELF: u8 = 0x28;
pub const EXPR_BINARY: u8 = 0x29;
pub const EXPR_LOGICAL: u8 = 0x2A;
pub const EXPR_UNARY: u8 = 0x2B;
pub const EXPR_INDEX: u8 = 0x2C;
pub const EXPR_MEMBER: u8 = 0x2D;
pub const EXPR_CALL: u8 = 0x2E;
pub const EXPR_PARTICLE: u8 = 0x2F;
pub const EXPR_FUNCTION: u8 = 0x30;
pub const EXPR_ASSIGN: u8 = 0x31;
pub const EXPR_AWAIT: u8 = 0x32;
pub const EXPR_ASYNC: u8 = 0x33;
pub const EXPR_AS_INTEGER: u8 = 0x34;

// Structure
pub const BLOCK: u8 = 0x40;
pub const FUNCTION_DEF: u8 = 0x41;
pub const CLASS_DEF: u8 = 0x42;
pub const CATCH: u8 = 0x43;
pub const PROGRAM: u8 = 0x50;
pub const MANIFEST: u8 = 0x51;

// Interpolation parts (not nodes)
pub const PART_TEXT: u8 = 0;
pub const PART_EXPR: u8 = 1;
