//! Instruction-word classification for the D3D8/D3D9 pixel shader token stream.

use std::fmt;

use thiserror::Error;

use crate::shader_limits::{
    ShaderModelLimits, MAX_PS_BYTECODE_BYTES, MAX_PS_TOKEN_COUNT, PS_1_4_LIMITS, PS_1_X_LIMITS,
    PS_2_X_LIMITS, PS_3_X_LIMITS,
};

/// The word that terminates every token stream.
pub const END_TOKEN: u32 = 0x0000_FFFF;

pub(crate) const OPCODE_MASK: u32 = 0x0000_FFFF;
pub(crate) const COMMENT_OPCODE: u32 = 0xFFFE;
pub(crate) const PARAM_FLAG: u32 = 0x8000_0000;

const COMMENT_SIZE_MASK: u32 = 0x7FFF_0000;
const COMMENT_SIZE_SHIFT: u32 = 16;
const PIXEL_VERSION_PREFIX: u32 = 0xFFFF_0000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("shader bytecode length {len} exceeds maximum {max} bytes")]
    BytecodeTooLarge { len: usize, max: usize },
    #[error("shader bytecode length {0} is not a multiple of 4")]
    UnalignedLength(usize),
}

/// Pixel shader model version as carried by the version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShaderVersion {
    pub major: u8,
    pub minor: u8,
}

impl ShaderVersion {
    /// Used when the stream does not begin with a version token.
    pub const UNVERSIONED: Self = Self::new(0, 0);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// `(major << 8) | minor`, the form version ranges are compared in.
    pub const fn packed(self) -> u16 {
        ((self.major as u16) << 8) | self.minor as u16
    }

    pub fn from_token(token: u32) -> Option<Self> {
        if token & PIXEL_VERSION_PREFIX != PIXEL_VERSION_PREFIX {
            return None;
        }
        Some(Self::new(((token >> 8) & 0xFF) as u8, (token & 0xFF) as u8))
    }

    /// Register budget and program header for this model.
    ///
    /// Majors the translator has no table for fall back to the ps_1_x budget.
    pub fn limits(self) -> &'static ShaderModelLimits {
        match (self.major, self.minor) {
            (1, 4) => &PS_1_4_LIMITS,
            (0, _) | (1, _) => &PS_1_X_LIMITS,
            (2, _) => &PS_2_X_LIMITS,
            (3, _) => &PS_3_X_LIMITS,
            _ => &PS_1_X_LIMITS,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(
            (self.major, self.minor),
            (0, 0) | (1, 0..=4) | (2, 0 | 1) | (3, 0)
        )
    }
}

impl fmt::Display for ShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ps_{}_{}", self.major, self.minor)
    }
}

/// Coarse classification of a single instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Version(ShaderVersion),
    /// Comment block header followed by `len` payload words.
    Comment { len: usize },
    End,
    /// Parameter (operand) word, bit 31 set.
    Parameter,
    Instruction { opcode: u16 },
}

pub fn classify(token: u32) -> TokenKind {
    if token == END_TOKEN {
        return TokenKind::End;
    }
    if let Some(version) = ShaderVersion::from_token(token) {
        return TokenKind::Version(version);
    }
    if token & OPCODE_MASK == COMMENT_OPCODE {
        let len = ((token & COMMENT_SIZE_MASK) >> COMMENT_SIZE_SHIFT) as usize;
        return TokenKind::Comment { len };
    }
    if is_parameter(token) {
        return TokenKind::Parameter;
    }
    TokenKind::Instruction {
        opcode: (token & OPCODE_MASK) as u16,
    }
}

pub fn is_parameter(token: u32) -> bool {
    token & PARAM_FLAG != 0
}

/// Number of words up to and including the end sentinel, or the whole slice when the sentinel is
/// missing.
///
/// Comment payloads are skipped as a unit so a payload word equal to the sentinel does not end
/// the stream early.
pub fn stream_len(words: &[u32]) -> usize {
    let mut pos = 0;
    while let Some(&word) = words.get(pos) {
        match classify(word) {
            TokenKind::End => return pos + 1,
            TokenKind::Comment { len } => pos = pos.saturating_add(1 + len),
            _ => pos += 1,
        }
    }
    words.len()
}

/// Version token of a stream, which must be its first token other than comment blocks.
pub fn leading_version(words: &[u32]) -> Option<ShaderVersion> {
    let mut pos = 0;
    while let Some(&word) = words.get(pos) {
        match classify(word) {
            TokenKind::Comment { len } => pos = pos.saturating_add(1 + len),
            TokenKind::Version(version) => return Some(version),
            _ => return None,
        }
    }
    None
}

/// Converts a little-endian byte blob into instruction words.
pub fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, TokenError> {
    if bytes.len() > MAX_PS_BYTECODE_BYTES {
        return Err(TokenError::BytecodeTooLarge {
            len: bytes.len(),
            max: MAX_PS_BYTECODE_BYTES,
        });
    }
    if bytes.len() % 4 != 0 {
        return Err(TokenError::UnalignedLength(bytes.len()));
    }
    let mut words = Vec::with_capacity((bytes.len() / 4).min(MAX_PS_TOKEN_COUNT));
    for chunk in bytes.chunks_exact(4) {
        words.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(words)
}

/// Inverse of [`words_from_le_bytes`].
pub fn words_to_le_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
