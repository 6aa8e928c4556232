//! Pixel shader opcode table.
//!
//! Each raw opcode id may appear more than once with disjoint version ranges (e.g. `texcoord`
//! becomes `texcrd` in ps_1_4). Lookup walks the entries for an id in declaration order and the
//! first one whose range covers the shader version wins.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::software::{self, Executor};
use crate::token::ShaderVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Mad,
    Mul,
    Rcp,
    Rsq,
    Dp3,
    Dp4,
    Min,
    Max,
    Slt,
    Sge,
    Exp,
    Log,
    Lit,
    Dst,
    Lrp,
    Frc,
    M4x4,
    M4x3,
    M3x4,
    M3x3,
    M3x2,
    Call,
    CallNz,
    Loop,
    Ret,
    EndLoop,
    Label,
    Dcl,
    Pow,
    Crs,
    Sgn,
    Abs,
    Nrm,
    SinCos,
    Rep,
    EndRep,
    If,
    Ifc,
    Else,
    EndIf,
    Break,
    BreakC,
    Mova,
    DefB,
    DefI,
    /// `texcoord` before ps_1_4, `texcrd` in ps_1_4.
    TexCoord,
    TexKill,
    /// `tex` before ps_1_4, `texld` in ps_1_4.
    Tex,
    TexBem,
    TexBemL,
    TexReg2Ar,
    TexReg2Gb,
    TexM3x2Pad,
    TexM3x2Tex,
    TexM3x3Pad,
    TexM3x3Tex,
    TexM3x3Diff,
    TexM3x3Spec,
    TexM3x3VSpec,
    ExpP,
    LogP,
    Cnd,
    Def,
    TexReg2Rgb,
    TexDp3Tex,
    TexM3x2Depth,
    TexDp3,
    TexM3x3,
    TexDepth,
    Cmp,
    Bem,
    Dp2Add,
    Dsx,
    Dsy,
    TexLdd,
    SetP,
    TexLdl,
    BreakP,
    Phase,
}

impl Opcode {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0 => Self::Nop,
            1 => Self::Mov,
            2 => Self::Add,
            3 => Self::Sub,
            4 => Self::Mad,
            5 => Self::Mul,
            6 => Self::Rcp,
            7 => Self::Rsq,
            8 => Self::Dp3,
            9 => Self::Dp4,
            10 => Self::Min,
            11 => Self::Max,
            12 => Self::Slt,
            13 => Self::Sge,
            14 => Self::Exp,
            15 => Self::Log,
            16 => Self::Lit,
            17 => Self::Dst,
            18 => Self::Lrp,
            19 => Self::Frc,
            20 => Self::M4x4,
            21 => Self::M4x3,
            22 => Self::M3x4,
            23 => Self::M3x3,
            24 => Self::M3x2,
            25 => Self::Call,
            26 => Self::CallNz,
            27 => Self::Loop,
            28 => Self::Ret,
            29 => Self::EndLoop,
            30 => Self::Label,
            31 => Self::Dcl,
            32 => Self::Pow,
            33 => Self::Crs,
            34 => Self::Sgn,
            35 => Self::Abs,
            36 => Self::Nrm,
            37 => Self::SinCos,
            38 => Self::Rep,
            39 => Self::EndRep,
            40 => Self::If,
            41 => Self::Ifc,
            42 => Self::Else,
            43 => Self::EndIf,
            44 => Self::Break,
            45 => Self::BreakC,
            46 => Self::Mova,
            47 => Self::DefB,
            48 => Self::DefI,
            64 => Self::TexCoord,
            65 => Self::TexKill,
            66 => Self::Tex,
            67 => Self::TexBem,
            68 => Self::TexBemL,
            69 => Self::TexReg2Ar,
            70 => Self::TexReg2Gb,
            71 => Self::TexM3x2Pad,
            72 => Self::TexM3x2Tex,
            73 => Self::TexM3x3Pad,
            74 => Self::TexM3x3Tex,
            75 => Self::TexM3x3Diff,
            76 => Self::TexM3x3Spec,
            77 => Self::TexM3x3VSpec,
            78 => Self::ExpP,
            79 => Self::LogP,
            80 => Self::Cnd,
            81 => Self::Def,
            82 => Self::TexReg2Rgb,
            83 => Self::TexDp3Tex,
            84 => Self::TexM3x2Depth,
            85 => Self::TexDp3,
            86 => Self::TexM3x3,
            87 => Self::TexDepth,
            88 => Self::Cmp,
            89 => Self::Bem,
            90 => Self::Dp2Add,
            91 => Self::Dsx,
            92 => Self::Dsy,
            93 => Self::TexLdd,
            94 => Self::SetP,
            95 => Self::TexLdl,
            96 => Self::BreakP,
            0xFFFD => Self::Phase,
            _ => return None,
        })
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Nop => 0,
            Self::Mov => 1,
            Self::Add => 2,
            Self::Sub => 3,
            Self::Mad => 4,
            Self::Mul => 5,
            Self::Rcp => 6,
            Self::Rsq => 7,
            Self::Dp3 => 8,
            Self::Dp4 => 9,
            Self::Min => 10,
            Self::Max => 11,
            Self::Slt => 12,
            Self::Sge => 13,
            Self::Exp => 14,
            Self::Log => 15,
            Self::Lit => 16,
            Self::Dst => 17,
            Self::Lrp => 18,
            Self::Frc => 19,
            Self::M4x4 => 20,
            Self::M4x3 => 21,
            Self::M3x4 => 22,
            Self::M3x3 => 23,
            Self::M3x2 => 24,
            Self::Call => 25,
            Self::CallNz => 26,
            Self::Loop => 27,
            Self::Ret => 28,
            Self::EndLoop => 29,
            Self::Label => 30,
            Self::Dcl => 31,
            Self::Pow => 32,
            Self::Crs => 33,
            Self::Sgn => 34,
            Self::Abs => 35,
            Self::Nrm => 36,
            Self::SinCos => 37,
            Self::Rep => 38,
            Self::EndRep => 39,
            Self::If => 40,
            Self::Ifc => 41,
            Self::Else => 42,
            Self::EndIf => 43,
            Self::Break => 44,
            Self::BreakC => 45,
            Self::Mova => 46,
            Self::DefB => 47,
            Self::DefI => 48,
            Self::TexCoord => 64,
            Self::TexKill => 65,
            Self::Tex => 66,
            Self::TexBem => 67,
            Self::TexBemL => 68,
            Self::TexReg2Ar => 69,
            Self::TexReg2Gb => 70,
            Self::TexM3x2Pad => 71,
            Self::TexM3x2Tex => 72,
            Self::TexM3x3Pad => 73,
            Self::TexM3x3Tex => 74,
            Self::TexM3x3Diff => 75,
            Self::TexM3x3Spec => 76,
            Self::TexM3x3VSpec => 77,
            Self::ExpP => 78,
            Self::LogP => 79,
            Self::Cnd => 80,
            Self::Def => 81,
            Self::TexReg2Rgb => 82,
            Self::TexDp3Tex => 83,
            Self::TexM3x2Depth => 84,
            Self::TexDp3 => 85,
            Self::TexM3x3 => 86,
            Self::TexDepth => 87,
            Self::Cmp => 88,
            Self::Bem => 89,
            Self::Dp2Add => 90,
            Self::Dsx => 91,
            Self::Dsy => 92,
            Self::TexLdd => 93,
            Self::SetP => 94,
            Self::TexLdl => 95,
            Self::BreakP => 96,
            Self::Phase => 0xFFFD,
        }
    }
}

/// Opcodes the code generator lowers with a dedicated routine instead of a 1:1 mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    NoOp,
    Declaration,
    DefineConstant,
    TexCoord,
    TexCrd,
    Tex,
    TexLd,
    TexBem,
    TexReg2Ar,
    TexReg2Gb,
    TexM3x2Pad,
    TexM3x2Tex,
    TexM3x3Pad,
    TexM3x3Tex,
    TexM3x3Spec,
    TexM3x3VSpec,
    /// `cmp`: `src0 >= 0 ? src1 : src2`.
    Compare,
    /// `cnd`: `src0 > 0.5 ? src1 : src2`.
    ConditionalSelect,
}

/// What the fragment program target can do with an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbTarget {
    /// Emitted as the named instruction with operands in bytecode order.
    Instruction(&'static str),
    Lowered(Lowering),
    /// Recognized, but the fragment program target has no equivalent.
    Unsupported,
    /// Needs flow control or other features of a high-level shading language.
    RequiresGlsl,
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeDescriptor {
    pub opcode: Opcode,
    /// Assembly mnemonic, e.g. `texcrd`.
    pub name: &'static str,
    pub target: ArbTarget,
    /// Parameter words following the opcode word.
    pub arity: usize,
    pub min_version: ShaderVersion,
    pub max_version: ShaderVersion,
    pub executor: Executor,
}

impl OpcodeDescriptor {
    /// A zero-to-zero range marks an entry valid for every version.
    pub fn supports(&self, version: ShaderVersion) -> bool {
        let all_versions = self.min_version == ShaderVersion::UNVERSIONED
            && self.max_version == ShaderVersion::UNVERSIONED;
        all_versions || (self.min_version <= version && version <= self.max_version)
    }

    pub fn raw(&self) -> u16 {
        self.opcode.raw()
    }
}

const ALL: ((u8, u8), (u8, u8)) = ((0, 0), (0, 0));

const fn op(
    opcode: Opcode,
    name: &'static str,
    target: ArbTarget,
    arity: usize,
    versions: ((u8, u8), (u8, u8)),
    executor: Executor,
) -> OpcodeDescriptor {
    OpcodeDescriptor {
        opcode,
        name,
        target,
        arity,
        min_version: ShaderVersion::new(versions.0 .0, versions.0 .1),
        max_version: ShaderVersion::new(versions.1 .0, versions.1 .1),
        executor,
    }
}

use ArbTarget::{Instruction as Arb, Lowered, RequiresGlsl, Unsupported};
use Executor::{Binary, Matrix, Nop, Stub, Ternary, Unary};

/// All pixel shader opcodes in lookup order.
pub static PS_OPCODES: &[OpcodeDescriptor] = &[
    op(Opcode::Nop, "nop", Lowered(Lowering::NoOp), 0, ALL, Nop),
    op(Opcode::Mov, "mov", Arb("MOV"), 2, ALL, Unary(software::mov)),
    op(Opcode::Add, "add", Arb("ADD"), 3, ALL, Binary(software::add)),
    op(Opcode::Sub, "sub", Arb("SUB"), 3, ALL, Binary(software::sub)),
    op(Opcode::Mad, "mad", Arb("MAD"), 4, ALL, Ternary(software::mad)),
    op(Opcode::Mul, "mul", Arb("MUL"), 3, ALL, Binary(software::mul)),
    op(Opcode::Rcp, "rcp", Arb("RCP"), 2, ALL, Unary(software::rcp)),
    op(Opcode::Rsq, "rsq", Arb("RSQ"), 2, ALL, Unary(software::rsq)),
    op(Opcode::Dp3, "dp3", Arb("DP3"), 3, ALL, Binary(software::dp3)),
    op(Opcode::Dp4, "dp4", Arb("DP4"), 3, ALL, Binary(software::dp4)),
    op(Opcode::Min, "min", Arb("MIN"), 3, ALL, Binary(software::min)),
    op(Opcode::Max, "max", Arb("MAX"), 3, ALL, Binary(software::max)),
    op(Opcode::Slt, "slt", Arb("SLT"), 3, ALL, Binary(software::slt)),
    op(Opcode::Sge, "sge", Arb("SGE"), 3, ALL, Binary(software::sge)),
    op(Opcode::Abs, "abs", Arb("ABS"), 2, ALL, Unary(software::abs)),
    op(Opcode::Exp, "exp", Arb("EX2"), 2, ALL, Unary(software::exp)),
    op(Opcode::Log, "log", Arb("LG2"), 2, ALL, Unary(software::log)),
    op(Opcode::Lit, "lit", Arb("LIT"), 2, ALL, Unary(software::lit)),
    op(Opcode::Dst, "dst", Arb("DST"), 3, ALL, Binary(software::dst)),
    op(Opcode::Lrp, "lrp", Arb("LRP"), 4, ALL, Ternary(software::lrp)),
    op(Opcode::Frc, "frc", Arb("FRC"), 2, ALL, Unary(software::frc)),
    op(Opcode::M4x4, "m4x4", Unsupported, 3, ALL, Matrix { rows: 4, f: software::m4x4 }),
    op(Opcode::M4x3, "m4x3", Unsupported, 3, ALL, Matrix { rows: 3, f: software::m4x3 }),
    op(Opcode::M3x4, "m3x4", Unsupported, 3, ALL, Matrix { rows: 4, f: software::m3x4 }),
    op(Opcode::M3x3, "m3x3", Unsupported, 3, ALL, Matrix { rows: 3, f: software::m3x3 }),
    op(Opcode::M3x2, "m3x2", Unsupported, 3, ALL, Matrix { rows: 2, f: software::m3x2 }),
    op(Opcode::Call, "call", RequiresGlsl, 1, ALL, Stub),
    op(Opcode::CallNz, "callnz", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::Loop, "loop", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::Ret, "ret", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::EndLoop, "endloop", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::Label, "label", RequiresGlsl, 1, ALL, Stub),
    op(Opcode::Dcl, "dcl", Lowered(Lowering::Declaration), 2, ALL, Nop),
    op(Opcode::Pow, "pow", Arb("POW"), 3, ALL, Stub),
    op(Opcode::Crs, "crs", Arb("XPD"), 3, ALL, Binary(software::crs)),
    op(Opcode::Sgn, "sgn", Unsupported, 2, ALL, Stub),
    op(Opcode::Nrm, "nrm", Unsupported, 2, ALL, Stub),
    op(Opcode::SinCos, "sincos", Unsupported, 4, ((2, 0), (2, 255)), Stub),
    op(Opcode::SinCos, "sincos", Unsupported, 2, ((3, 0), (3, 255)), Stub),
    op(Opcode::Rep, "rep", RequiresGlsl, 1, ALL, Stub),
    op(Opcode::EndRep, "endrep", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::If, "if", RequiresGlsl, 1, ALL, Stub),
    op(Opcode::Ifc, "ifc", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::Else, "else", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::EndIf, "endif", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::Break, "break", RequiresGlsl, 0, ALL, Stub),
    op(Opcode::BreakC, "breakc", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::Mova, "mova", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::DefB, "defb", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::DefI, "defi", RequiresGlsl, 5, ALL, Stub),
    op(Opcode::TexCoord, "texcoord", Lowered(Lowering::TexCoord), 1, ((0, 0), (1, 3)), Stub),
    op(Opcode::TexCoord, "texcrd", Lowered(Lowering::TexCrd), 2, ((1, 4), (1, 4)), Stub),
    op(Opcode::TexKill, "texkill", Arb("KIL"), 1, ((1, 0), (1, 4)), Stub),
    op(Opcode::Tex, "tex", Lowered(Lowering::Tex), 1, ((0, 0), (1, 3)), Stub),
    op(Opcode::Tex, "texld", Lowered(Lowering::TexLd), 2, ((1, 4), (1, 4)), Stub),
    op(Opcode::TexBem, "texbem", Lowered(Lowering::TexBem), 2, ((0, 0), (1, 3)), Stub),
    op(Opcode::TexBemL, "texbeml", RequiresGlsl, 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexReg2Ar, "texreg2ar", Lowered(Lowering::TexReg2Ar), 2, ((1, 1), (1, 3)), Stub),
    op(Opcode::TexReg2Gb, "texreg2gb", Lowered(Lowering::TexReg2Gb), 2, ((1, 2), (1, 3)), Stub),
    op(Opcode::TexM3x2Pad, "texm3x2pad", Lowered(Lowering::TexM3x2Pad), 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x2Tex, "texm3x2tex", Lowered(Lowering::TexM3x2Tex), 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x3Pad, "texm3x3pad", Lowered(Lowering::TexM3x3Pad), 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x3Tex, "texm3x3tex", Lowered(Lowering::TexM3x3Tex), 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x3Diff, "texm3x3diff", RequiresGlsl, 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x3Spec, "texm3x3spec", Lowered(Lowering::TexM3x3Spec), 3, ((1, 0), (1, 3)), Stub),
    op(Opcode::TexM3x3VSpec, "texm3x3vspec", Lowered(Lowering::TexM3x3VSpec), 2, ((1, 0), (1, 3)), Stub),
    op(Opcode::ExpP, "expp", Arb("EX2"), 2, ALL, Unary(software::expp)),
    op(Opcode::LogP, "logp", Arb("LG2"), 2, ALL, Unary(software::logp)),
    op(Opcode::Cnd, "cnd", Lowered(Lowering::ConditionalSelect), 4, ((1, 1), (1, 4)), Stub),
    op(Opcode::Def, "def", Lowered(Lowering::DefineConstant), 5, ALL, Nop),
    op(Opcode::TexReg2Rgb, "texreg2rgb", RequiresGlsl, 2, ((1, 2), (1, 3)), Stub),
    op(Opcode::TexDp3Tex, "texdp3tex", RequiresGlsl, 2, ((1, 2), (1, 3)), Stub),
    op(Opcode::TexM3x2Depth, "texm3x2depth", RequiresGlsl, 2, ((1, 3), (1, 3)), Stub),
    op(Opcode::TexDp3, "texdp3", RequiresGlsl, 2, ((1, 2), (1, 3)), Stub),
    op(Opcode::TexM3x3, "texm3x3", RequiresGlsl, 2, ((1, 2), (1, 3)), Stub),
    op(Opcode::TexDepth, "texdepth", RequiresGlsl, 1, ((1, 4), (1, 4)), Stub),
    op(Opcode::Cmp, "cmp", Lowered(Lowering::Compare), 4, ((1, 1), (3, 0)), Stub),
    op(Opcode::Bem, "bem", RequiresGlsl, 3, ((1, 4), (1, 4)), Stub),
    op(Opcode::Dp2Add, "dp2add", RequiresGlsl, 4, ALL, Stub),
    op(Opcode::Dsx, "dsx", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::Dsy, "dsy", RequiresGlsl, 2, ALL, Stub),
    op(Opcode::TexLdd, "texldd", RequiresGlsl, 5, ALL, Stub),
    op(Opcode::SetP, "setp", RequiresGlsl, 3, ALL, Stub),
    op(Opcode::TexLdl, "texldl", RequiresGlsl, 3, ALL, Stub),
    op(Opcode::BreakP, "breakp", RequiresGlsl, 1, ALL, Stub),
    op(Opcode::Phase, "phase", Lowered(Lowering::NoOp), 0, ALL, Nop),
];

fn index() -> &'static HashMap<u16, Vec<&'static OpcodeDescriptor>> {
    static INDEX: OnceLock<HashMap<u16, Vec<&'static OpcodeDescriptor>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map: HashMap<u16, Vec<&'static OpcodeDescriptor>> = HashMap::new();
        for desc in PS_OPCODES {
            map.entry(desc.raw()).or_default().push(desc);
        }
        map
    })
}

/// Finds the descriptor for `raw` valid in `version`.
pub fn lookup(raw: u16, version: ShaderVersion) -> Option<&'static OpcodeDescriptor> {
    index()
        .get(&raw)?
        .iter()
        .copied()
        .find(|desc| desc.supports(version))
}

/// Every entry sharing the raw id, regardless of version.
pub fn descriptors_for(raw: u16) -> &'static [&'static OpcodeDescriptor] {
    index().get(&raw).map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS_1_1: ShaderVersion = ShaderVersion::new(1, 1);
    const PS_1_4: ShaderVersion = ShaderVersion::new(1, 4);

    #[test]
    fn raw_ids_round_trip() {
        for desc in PS_OPCODES {
            assert_eq!(Opcode::from_raw(desc.raw()), Some(desc.opcode), "{}", desc.name);
        }
        assert_eq!(Opcode::from_raw(49), None);
    }

    #[test]
    fn version_selects_texcoord_or_texcrd() {
        assert_eq!(lookup(64, PS_1_1).unwrap().name, "texcoord");
        assert_eq!(lookup(64, PS_1_4).unwrap().name, "texcrd");
        assert_eq!(lookup(64, PS_1_4).unwrap().arity, 2);
        assert_eq!(lookup(64, ShaderVersion::UNVERSIONED).unwrap().name, "texcoord");
        assert!(lookup(64, ShaderVersion::new(2, 0)).is_none());
    }

    #[test]
    fn zero_range_matches_every_version() {
        for version in [
            ShaderVersion::UNVERSIONED,
            PS_1_1,
            ShaderVersion::new(3, 0),
        ] {
            assert_eq!(lookup(1, version).unwrap().target, ArbTarget::Instruction("MOV"));
        }
    }

    #[test]
    fn texm3x2pad_is_gated_to_ps_1_3() {
        assert!(lookup(71, ShaderVersion::new(1, 3)).is_some());
        assert!(lookup(71, PS_1_4).is_none());
    }

    #[test]
    fn sincos_arity_depends_on_model() {
        assert_eq!(lookup(37, ShaderVersion::new(2, 0)).unwrap().arity, 4);
        assert_eq!(lookup(37, ShaderVersion::new(3, 0)).unwrap().arity, 2);
    }

    #[test]
    fn declaration_order_is_kept_per_id() {
        let names: Vec<_> = descriptors_for(66).iter().map(|d| d.name).collect();
        assert_eq!(names, ["tex", "texld"]);
        assert!(descriptors_for(0x1234).is_empty());
    }
}
