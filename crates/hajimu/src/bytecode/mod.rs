//! HJPB: the binary container for compiled programs and plugin manifests
//!
//! ```text
//! "HJPB" | major u16 | minor u16 | flags u32
//! string pool: count u32, then (len u32, UTF-8 bytes)*
//! payload:     a tree of nodes; each node is
//!              tag u8 | span start u32 | span end u32 | children
//! ```
//!
//! All integers are little-endian. Leaves refer to strings by pool index;
//! the pool lists strings in the order the encoder first meets them, so
//! encoding is deterministic and re-encoding a decoded program reproduces
//! the same bytes.

mod decode;
mod encode;
mod tags;

use crate::ast::Program;
use crate::error::BytecodeError;

pub use decode::{decode_manifest, decode_program};
pub use encode::{encode_manifest, encode_program};

/// Container magic.
pub const MAGIC: &[u8; 4] = b"HJPB";

/// Major format version written and accepted.
pub const VERSION_MAJOR: u16 = 1;

/// Minor format version written.
pub const VERSION_MINOR: u16 = 0;

/// Payload is a plugin manifest rather than a program.
pub const FLAG_MANIFEST: u32 = 1 << 0;

/// Payload is compressed. Reserved; this reader rejects it.
pub const FLAG_COMPRESSED: u32 = 1 << 1;

/// Bytes before the string pool.
pub const HEADER_LEN: usize = 12;

/// Whether `bytes` start with the HJPB magic.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Whether `bytes` hold an HJPB header flagged as a plugin manifest.
pub fn is_manifest(bytes: &[u8]) -> bool {
    is_container(bytes)
        && bytes.len() >= HEADER_LEN
        && u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) & FLAG_MANIFEST != 0
}

/// Metadata describing a native plugin without loading it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    /// Plugin name
    pub name: String,
    /// Version string
    pub version: String,
    /// Author; empty when unknown
    pub author: String,
    /// One-line description; empty when absent
    pub description: String,
    /// Shared library path, relative to the manifest's directory
    pub library: String,
    /// Exported entries
    pub entries: Vec<ManifestEntry>,
}

/// One entry listed in a [`Manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Entry name
    pub name: String,
    /// Fewest accepted arguments
    pub min_args: u32,
    /// Most accepted arguments; `None` for variadic
    pub max_args: Option<u32>,
}

/// Compile source text straight to HJPB bytes.
pub fn compile(src: &str) -> Result<Vec<u8>, crate::error::ParseError> {
    let program: Program = crate::parser::parse(src)?;
    Ok(encode_program(&program))
}

/// Validate the fixed header and return its flags.
fn read_header(bytes: &[u8]) -> Result<u32, BytecodeError> {
    if !is_container(bytes) {
        return Err(BytecodeError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(BytecodeError::Truncated(bytes.len()));
    }
    let major = u16::from_le_bytes([bytes[4], bytes[5]]);
    let minor = u16::from_le_bytes([bytes[6], bytes[7]]);
    if major != VERSION_MAJOR {
        return Err(BytecodeError::UnsupportedVersion { major, minor });
    }
    let flags = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if flags & !FLAG_MANIFEST != 0 {
        return Err(BytecodeError::UnsupportedFlags(flags));
    }
    Ok(flags)
}

#[cfg(test)]
mod tests;
