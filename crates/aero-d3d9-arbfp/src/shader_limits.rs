//! Centralized limits for pixel shader intake and fragment program generation.
//!
//! Shader bytecode handed to [`crate::PixelShader::set_function`] comes straight from the guest
//! and must be treated as untrusted. These limits bound the allocations made while copying,
//! walking and translating it.

/// Maximum accepted pixel shader bytecode length in bytes.
pub(crate) const MAX_PS_BYTECODE_BYTES: usize = 256 * 1024; // 256 KiB

/// Maximum accepted pixel shader token count (DWORDs / `u32`s).
pub(crate) const MAX_PS_TOKEN_COUNT: usize = MAX_PS_BYTECODE_BYTES / 4;

/// Default capacity of the generated program text, including the terminating NUL handed to the
/// backend. The text itself is therefore at most one byte shorter.
pub const DEFAULT_PROGRAM_CAPACITY: usize = 65_535;

/// Upper bound accepted for a configured program capacity.
pub(crate) const MAX_PROGRAM_CAPACITY: usize = 1024 * 1024; // 1 MiB

/// Number of constant registers tracked by [`crate::register::ConstantTable`].
///
/// The parameter token can encode indices up to 2047, but no pixel shader model exposes more
/// than 224 float constants. Indices past the table are never considered declared.
pub const CONSTANT_TABLE_SIZE: usize = 256;

/// Number of `TEX`-row registers a `texm3x3*` sequence may accumulate before the final row.
pub(crate) const MAX_TEXM3X3_PAD_ROWS: usize = 2;

/// Per-shader-model register budget and program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderModelLimits {
    pub header: &'static str,
    /// `r#` registers, declared as `TEMP R<n>`.
    pub temps: u32,
    /// `t#` registers, declared as `TEMP T<n>`.
    pub texture_regs: u32,
    /// Texture coordinate sets copied into `T<n>` by the prologue.
    pub texcoord_stages: u32,
    /// `c#` float constants.
    pub constants: u32,
}

pub(crate) const PS_1_X_LIMITS: ShaderModelLimits = ShaderModelLimits {
    header: "!!ARBfp1.0",
    temps: 6,
    texture_regs: 6,
    texcoord_stages: 4,
    constants: 8,
};

pub(crate) const PS_1_4_LIMITS: ShaderModelLimits = ShaderModelLimits {
    header: "!!ARBfp1.0",
    temps: 6,
    texture_regs: 6,
    texcoord_stages: 6,
    constants: 8,
};

pub(crate) const PS_2_X_LIMITS: ShaderModelLimits = ShaderModelLimits {
    header: "!!ARBfp2.0",
    temps: 12,
    texture_regs: 8,
    texcoord_stages: 8,
    constants: 32,
};

pub(crate) const PS_3_X_LIMITS: ShaderModelLimits = ShaderModelLimits {
    header: "!!ARBfp3.0",
    temps: 32,
    texture_regs: 8,
    texcoord_stages: 8,
    constants: 224,
};
