//! Register naming in the fragment program namespace.

use thiserror::Error;

use crate::operand::{Operand, RegisterType};
use crate::shader_limits::CONSTANT_TABLE_SIZE;

/// Fragment program outputs addressed by rasterizer-out / colour-out index; depth is last.
pub const SPECIAL_OUTPUTS: [&str; 5] = [
    "result.color",
    "result.color[1]",
    "result.color[2]",
    "result.color[3]",
    "result.depth",
];

const DEPTH_OUTPUT: u16 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("special output index {0} out of range")]
    SpecialOutputOutOfRange(u16),
    #[error("register type {0:?} has no fragment program name")]
    Unhandled(RegisterType),
}

/// Tracks which constant registers the shader defined inline with `def`.
///
/// Defined constants are named `C<n>` and declared as `PARAM`s; everything else reads from
/// `program.env[<n>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstantTable {
    bits: [u64; CONSTANT_TABLE_SIZE / 64],
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `index` as defined. Returns `false` if it lies past the table.
    pub fn declare(&mut self, index: u16) -> bool {
        let index = usize::from(index);
        if index >= CONSTANT_TABLE_SIZE {
            return false;
        }
        self.bits[index / 64] |= 1 << (index % 64);
        true
    }

    pub fn is_declared(&self, index: u16) -> bool {
        let index = usize::from(index);
        index < CONSTANT_TABLE_SIZE && self.bits[index / 64] & (1 << (index % 64)) != 0
    }
}

/// Name of `operand`'s register in the generated program, without mask, swizzle or modifier.
pub fn resolve(operand: &Operand, constants: &ConstantTable) -> Result<String, ResolveError> {
    let index = operand.index;
    let name = match operand.reg_type {
        RegisterType::Temp => format!("R{index}"),
        RegisterType::Input if index == 0 => "fragment.color.primary".to_owned(),
        RegisterType::Input => "fragment.color.secondary".to_owned(),
        RegisterType::Const if constants.is_declared(index) => format!("C{index}"),
        RegisterType::Const => format!("program.env[{index}]"),
        RegisterType::Texture => format!("T{index}"),
        RegisterType::RastOut | RegisterType::ColorOut if index < DEPTH_OUTPUT => {
            SPECIAL_OUTPUTS[usize::from(index)].to_owned()
        }
        RegisterType::RastOut if index == DEPTH_OUTPUT => {
            SPECIAL_OUTPUTS[usize::from(DEPTH_OUTPUT)].to_owned()
        }
        RegisterType::RastOut | RegisterType::ColorOut => {
            return Err(ResolveError::SpecialOutputOutOfRange(index))
        }
        RegisterType::DepthOut => SPECIAL_OUTPUTS[usize::from(DEPTH_OUTPUT)].to_owned(),
        other => return Err(ResolveError::Unhandled(other)),
    };
    Ok(name)
}
