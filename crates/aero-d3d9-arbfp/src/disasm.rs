//! Human-readable listing of a pixel shader token stream.
//!
//! Used for trace logging and by `ps_dump`. It walks the same [`TokenStream`] as the translator
//! but keeps no state of its own, so listing a shader never affects how it translates.

use std::fmt::Write as _;

use crate::opcode::{self, Lowering, ArbTarget};
use crate::operand::{DeclKind, Declaration, Operand, RegisterType, SrcModifier};
use crate::stream::{Instruction, ShaderToken, TokenStream};

const COISSUE: u32 = 0x4000_0000;
const XYZW: [char; 4] = ['x', 'y', 'z', 'w'];

pub fn disassemble(words: &[u32]) -> String {
    let mut out = String::new();
    let mut stream = TokenStream::new(words);
    while let Some(token) = stream.next() {
        match token {
            ShaderToken::Version { version, .. } => {
                let _ = writeln!(out, "{version}");
            }
            ShaderToken::MisplacedVersion { at, version } => {
                let _ = writeln!(out, "// ignored version token {version} at word {at}");
            }
            ShaderToken::Comment { payload, .. } => {
                for line in comment_text(payload).lines() {
                    let _ = writeln!(out, "// {line}");
                }
            }
            ShaderToken::Instruction(inst) => {
                let _ = writeln!(out, "{}", instruction(&inst));
            }
            ShaderToken::Unrecognized {
                token,
                continuation,
                ..
            } => {
                let raw = (token & 0xFFFF) as u16;
                let _ = write!(out, "// unknown opcode 0x{raw:04x}");
                if let Some(desc) = opcode::descriptors_for(raw).first() {
                    let _ = write!(out, " ({} is not valid in {})", desc.name, stream.version());
                }
                for word in continuation {
                    let _ = write!(out, " 0x{word:08x}");
                }
                out.push('\n');
            }
            ShaderToken::Truncated {
                needed, available, ..
            } => {
                let _ = writeln!(
                    out,
                    "// truncated: {needed} words needed, {available} available"
                );
            }
            ShaderToken::End { .. } => out.push_str("end\n"),
        }
    }
    out
}

fn comment_text(payload: &[u32]) -> String {
    let bytes: Vec<u8> = payload.iter().flat_map(|w| w.to_le_bytes()).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn instruction(inst: &Instruction<'_>) -> String {
    let desc = inst.descriptor;
    let prefix = if inst.token & COISSUE != 0 { "+" } else { "" };

    match desc.target {
        ArbTarget::Lowered(Lowering::DefineConstant) => {
            let dst = inst.operand(0).map(|op| register(&op)).unwrap_or_default();
            let values: Vec<String> = inst.params[1..]
                .iter()
                .map(|&w| format!("{:?}", f32::from_bits(w)))
                .collect();
            return format!("def {dst}, {}", values.join(", "));
        }
        ArbTarget::Lowered(Lowering::Declaration) => {
            if let [semantic, reg] = inst.params {
                return declaration(&Declaration::decode(*semantic, *reg));
            }
        }
        _ => {}
    }

    let Some(dst) = inst.operand(0) else {
        return format!("{prefix}{}", desc.name);
    };
    let mut line = format!("{prefix}{}", desc.name);
    if dst.saturate() {
        line.push_str("_sat");
    }
    if dst.partial_precision() {
        line.push_str("_pp");
    }
    if dst.centroid() {
        line.push_str("_centroid");
    }
    line.push_str(&dst.shift().suffix());
    let _ = write!(line, " {}{}", register(&dst), mask(&dst));
    for &word in &inst.params[1..] {
        let _ = write!(line, ", {}", source(&Operand::decode(word)));
    }
    line
}

fn declaration(decl: &Declaration) -> String {
    let reg = register(&decl.register);
    match decl.kind {
        DeclKind::Sampler(texture_type) => format!("dcl_{} {reg}", texture_type.name()),
        DeclKind::Usage { usage, index } => {
            let index = if index == 0 {
                String::new()
            } else {
                index.to_string()
            };
            format!(
                "dcl_{}{index} {reg}{}",
                usage.name(),
                mask(&decl.register)
            )
        }
    }
}

fn register(op: &Operand) -> String {
    let index = op.index;
    let base = match op.reg_type {
        RegisterType::RastOut if index >= 4 => return "oDepth".to_owned(),
        RegisterType::DepthOut => return "oDepth".to_owned(),
        RegisterType::Loop => return "aL".to_owned(),
        other => other.short_name(),
    };
    if op.relative {
        format!("{base}[a0.x + {index}]")
    } else {
        format!("{base}{index}")
    }
}

fn mask(op: &Operand) -> String {
    let mask = op.write_mask();
    if mask.is_full() {
        return String::new();
    }
    let mut out = String::from(".");
    for (bit, letter) in XYZW.iter().enumerate() {
        if mask.0 & (1 << bit) != 0 {
            out.push(*letter);
        }
    }
    out
}

fn source(op: &Operand) -> String {
    let modifier = op.src_modifier();
    let prefix = match modifier {
        SrcModifier::Negate
        | SrcModifier::BiasNegate
        | SrcModifier::SignNegate
        | SrcModifier::X2Negate
        | SrcModifier::AbsNegate => "-",
        SrcModifier::Comp => "1-",
        SrcModifier::Not => "!",
        _ => "",
    };
    let suffix = match modifier {
        SrcModifier::Bias | SrcModifier::BiasNegate => "_bias",
        SrcModifier::Sign | SrcModifier::SignNegate => "_bx2",
        SrcModifier::X2 | SrcModifier::X2Negate => "_x2",
        SrcModifier::Dz => "_dz",
        SrcModifier::Dw => "_dw",
        SrcModifier::Abs | SrcModifier::AbsNegate => "_abs",
        _ => "",
    };

    let swizzle = op.swizzle();
    let mut out = format!("{prefix}{}{suffix}", register(op));
    if !swizzle.is_identity() {
        let lanes = [0, 1, 2, 3].map(|lane| swizzle.component(lane));
        out.push('.');
        if lanes.iter().all(|&c| c == lanes[0]) {
            out.push(XYZW[lanes[0]]);
        } else {
            out.extend(lanes.iter().map(|&c| XYZW[c]));
        }
    }
    out
}
