//! Source and destination modifier lowering.
//!
//! Fragment programs only understand negation on sources, so most D3D source modifiers become
//! an auxiliary instruction computing the modified value into a scratch register. The instruction
//! then reads the scratch register instead of the original one.

use tracing::debug;

use crate::operand::{Operand, ResultShift, SrcModifier};

/// Scratch register for each source position of an instruction.
pub const SCRATCH_REGISTERS: [&str; 3] = ["TA", "TB", "TC"];

/// Constant blocks the expansions below reference. Declared once by the prologue.
pub(crate) const MODIFIER_PARAMS: [&str; 3] = [
    "PARAM coefdiv[2] = { { 0.5, 0.25, 0.125, 0.0625 }, { 0.03125, 0.015625, 0.0078125, 0.00390625 } };",
    "PARAM coefmul[2] = { { 2, 4, 8, 16 }, { 32, 64, 128, 256 } };",
    "PARAM one = { 1.0, 1.0, 1.0, 1.0 };",
];

/// Constant multiplied into the destination for each result shift nibble; index 0 is unused.
const SHIFT_CONSTANTS: [&str; 16] = [
    "",
    "coefmul[0].x",
    "coefmul[0].y",
    "coefmul[0].z",
    "coefmul[0].w",
    "coefmul[1].x",
    "coefmul[1].y",
    "coefmul[1].z",
    "coefdiv[1].w",
    "coefdiv[1].z",
    "coefdiv[1].y",
    "coefdiv[1].x",
    "coefdiv[0].w",
    "coefdiv[0].z",
    "coefdiv[0].y",
    "coefdiv[0].x",
];

pub fn scratch_register(position: usize) -> Option<&'static str> {
    SCRATCH_REGISTERS.get(position).copied()
}

/// A source operand ready to be spliced into an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExpansion {
    /// Lines that must be emitted before the consuming instruction.
    pub aux: Vec<String>,
    /// Operand text including the swizzle suffix.
    pub text: String,
}

/// Expands `operand`'s source modifier. `name` is the resolved register name and `scratch` the
/// register any auxiliary line writes to.
pub fn expand_source(operand: &Operand, name: &str, scratch: &str) -> SourceExpansion {
    let s = scratch;
    let (aux, substitute): (Vec<String>, String) = match operand.src_modifier() {
        SrcModifier::None => (Vec::new(), name.to_owned()),
        SrcModifier::Negate => (Vec::new(), format!("-{name}")),
        SrcModifier::Comp => (Vec::new(), format!("1-{name}")),
        SrcModifier::Bias => (
            vec![format!("ADD {s}, {name}, -coefdiv[0].x;")],
            s.to_owned(),
        ),
        SrcModifier::BiasNegate => (
            vec![format!("ADD {s}, -{name}, coefdiv[0].x;")],
            s.to_owned(),
        ),
        SrcModifier::Sign => (
            vec![format!("MAD {s}, {name}, coefmul[0].x, -one.x;")],
            s.to_owned(),
        ),
        SrcModifier::SignNegate => (
            vec![format!("MAD {s}, {name}, -coefmul[0].x, one.x;")],
            s.to_owned(),
        ),
        SrcModifier::X2 => (vec![format!("ADD {s}, {name}, {name};")], s.to_owned()),
        SrcModifier::X2Negate => (vec![format!("ADD {s}, -{name}, -{name};")], s.to_owned()),
        SrcModifier::Dz => (
            vec![
                format!("RCP {s}, {name}.z;"),
                format!("MUL {s}, {name}, {s};"),
            ],
            s.to_owned(),
        ),
        SrcModifier::Dw => (
            vec![
                format!("RCP {s}, {name}.w;"),
                format!("MUL {s}, {name}, {s};"),
            ],
            s.to_owned(),
        ),
        SrcModifier::Abs => (vec![format!("ABS {s}, {name};")], s.to_owned()),
        SrcModifier::AbsNegate => (vec![format!("ABS {s}, {name};")], format!("-{s}")),
        other => {
            debug!(modifier = ?other, register = name, "source modifier has no fragment program form");
            (Vec::new(), name.to_owned())
        }
    };
    SourceExpansion {
        aux,
        text: substitute + &operand.swizzle().suffix(),
    }
}

/// Destination handling derived from the result modifier and shift of a destination operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationModifiers {
    /// Mnemonic suffix, `"_SAT"` or empty.
    pub saturate_suffix: &'static str,
    /// Constant for a trailing `MUL dst, dst, <constant>;`.
    pub scale: Option<&'static str>,
}

pub fn shift_constant(shift: ResultShift) -> Option<&'static str> {
    if shift.is_none() {
        return None;
    }
    Some(SHIFT_CONSTANTS[usize::from(shift.0 & 0xF)])
}

/// Saturation is only expressed when no shift is present.
pub fn destination_modifiers(dst: &Operand) -> DestinationModifiers {
    let scale = shift_constant(dst.shift());
    let saturate_suffix = if dst.saturate() && scale.is_none() {
        "_SAT"
    } else {
        ""
    };
    if dst.saturate() && scale.is_some() {
        debug!(
            shift = dst.shift().exponent(),
            "saturate dropped on shifted destination"
        );
    }
    DestinationModifiers {
        saturate_suffix,
        scale,
    }
}

/// Line applying the result shift to an already-written destination.
pub fn scale_line(dst_name: &str, mask_suffix: &str, constant: &str) -> String {
    format!("MUL {dst_name}{mask_suffix}, {dst_name}, {constant};")
}
