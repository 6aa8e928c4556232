//! Parameter-word decoding.
//!
//! A parameter word is read either as a destination (write mask, result modifiers, shift) or as a
//! source (swizzle, source modifier). Both views share the register type and index bits, so
//! [`Operand`] keeps the raw word and exposes each field through an accessor.

const REGNUM_MASK: u32 = 0x0000_07FF;
const REGTYPE_MASK: u32 = 0x7000_0000;
const REGTYPE_SHIFT: u32 = 28;
const REGTYPE_MASK2: u32 = 0x0000_1800;
const REGTYPE_SHIFT2: u32 = 8;
const RELATIVE: u32 = 0x0000_2000;

const WRITEMASK_MASK: u32 = 0x000F_0000;
const WRITEMASK_SHIFT: u32 = 16;
const DSTMOD_SATURATE: u32 = 0x0010_0000;
const DSTMOD_PARTIAL_PRECISION: u32 = 0x0020_0000;
const DSTMOD_CENTROID: u32 = 0x0040_0000;
const DSTSHIFT_MASK: u32 = 0x0F00_0000;
const DSTSHIFT_SHIFT: u32 = 24;

const SWIZZLE_MASK: u32 = 0x00FF_0000;
const SWIZZLE_SHIFT: u32 = 16;
const SRCMOD_MASK: u32 = 0x0F00_0000;
const SRCMOD_SHIFT: u32 = 24;

const DCL_USAGE_MASK: u32 = 0x0000_001F;
const DCL_USAGE_INDEX_MASK: u32 = 0x000F_0000;
const DCL_USAGE_INDEX_SHIFT: u32 = 16;
const DCL_TEXTURE_TYPE_MASK: u32 = 0x7800_0000;
const DCL_TEXTURE_TYPE_SHIFT: u32 = 27;

/// Component letters used for masks and swizzles in the generated program.
pub(crate) const COMPONENT_LETTERS: [char; 4] = ['r', 'g', 'b', 'a'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterType {
    Temp,
    Input,
    Const,
    /// `t#`; shares its id with the vertex shader address register.
    Texture,
    RastOut,
    AttrOut,
    TexCrdOut,
    ConstInt,
    ColorOut,
    DepthOut,
    Sampler,
    Const2,
    Const3,
    Const4,
    ConstBool,
    Loop,
    TempFloat16,
    Misc,
    Label,
    Predicate,
    Unknown(u8),
}

impl RegisterType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Temp,
            1 => Self::Input,
            2 => Self::Const,
            3 => Self::Texture,
            4 => Self::RastOut,
            5 => Self::AttrOut,
            6 => Self::TexCrdOut,
            7 => Self::ConstInt,
            8 => Self::ColorOut,
            9 => Self::DepthOut,
            10 => Self::Sampler,
            11 => Self::Const2,
            12 => Self::Const3,
            13 => Self::Const4,
            14 => Self::ConstBool,
            15 => Self::Loop,
            16 => Self::TempFloat16,
            17 => Self::Misc,
            18 => Self::Label,
            19 => Self::Predicate,
            other => Self::Unknown(other),
        }
    }

    /// Assembly prefix, e.g. `r` for `r0`.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Temp => "r",
            Self::Input => "v",
            Self::Const | Self::Const2 | Self::Const3 | Self::Const4 => "c",
            Self::Texture => "t",
            Self::RastOut => "oC",
            Self::AttrOut => "oD",
            Self::TexCrdOut => "oT",
            Self::ConstInt => "i",
            Self::ColorOut => "oC",
            Self::DepthOut => "oDepth",
            Self::Sampler => "s",
            Self::ConstBool => "b",
            Self::Loop => "aL",
            Self::TempFloat16 => "half",
            Self::Misc => "misc",
            Self::Label => "l",
            Self::Predicate => "p",
            Self::Unknown(_) => "?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMask(pub u8);

impl WriteMask {
    /// An encoded mask of zero behaves like a full mask.
    pub fn is_full(&self) -> bool {
        matches!(self.0 & 0xF, 0 | 0xF)
    }

    /// `""` for a full mask, otherwise `.` followed by the enabled lanes in `rgba` order.
    pub fn suffix(&self) -> String {
        if self.is_full() {
            return String::new();
        }
        let mut out = String::from(".");
        for (bit, letter) in COMPONENT_LETTERS.iter().enumerate() {
            if self.0 & (1 << bit) != 0 {
                out.push(*letter);
            }
        }
        out
    }
}

/// Raw swizzle byte: two bits per destination lane, x in the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swizzle(pub u8);

impl Swizzle {
    pub const IDENTITY: Self = Self(0xE4);

    pub fn component(&self, lane: usize) -> usize {
        ((self.0 >> (lane * 2)) & 0x3) as usize
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// `""` for identity, a single letter when every lane reads the same component, otherwise
    /// all four letters.
    pub fn suffix(&self) -> String {
        if self.is_identity() {
            return String::new();
        }
        let lanes = [0, 1, 2, 3].map(|lane| self.component(lane));
        if lanes.iter().all(|&c| c == lanes[0]) {
            return format!(".{}", COMPONENT_LETTERS[lanes[0]]);
        }
        let mut out = String::from(".");
        out.extend(lanes.iter().map(|&c| COMPONENT_LETTERS[c]));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrcModifier {
    None,
    Negate,
    Bias,
    BiasNegate,
    Sign,
    SignNegate,
    Comp,
    X2,
    X2Negate,
    Dz,
    Dw,
    Abs,
    AbsNegate,
    Not,
    Unknown(u8),
}

impl SrcModifier {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Negate,
            2 => Self::Bias,
            3 => Self::BiasNegate,
            4 => Self::Sign,
            5 => Self::SignNegate,
            6 => Self::Comp,
            7 => Self::X2,
            8 => Self::X2Negate,
            9 => Self::Dz,
            10 => Self::Dw,
            11 => Self::Abs,
            12 => Self::AbsNegate,
            13 => Self::Not,
            other => Self::Unknown(other),
        }
    }
}

/// Destination result shift, a 4-bit signed scale exponent.
///
/// 1..=7 scale by 2..=128, 8..=15 divide by 256..=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultShift(pub u8);

impl ResultShift {
    pub fn is_none(&self) -> bool {
        self.0 & 0xF == 0
    }

    /// Signed exponent: `x2` is 1, `d2` is -1.
    pub fn exponent(&self) -> i8 {
        let nibble = (self.0 & 0xF) as i8;
        if nibble >= 8 {
            nibble - 16
        } else {
            nibble
        }
    }

    /// Assembly suffix such as `_x4` or `_d2`.
    pub fn suffix(&self) -> String {
        match self.exponent() {
            0 => String::new(),
            e if e > 0 => format!("_x{}", 1u32 << e),
            e => format!("_d{}", 1u32 << e.unsigned_abs()),
        }
    }
}

/// Decoded view over one parameter word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub raw: u32,
    pub reg_type: RegisterType,
    pub index: u16,
    pub relative: bool,
}

impl Operand {
    pub fn decode(token: u32) -> Self {
        let regtype_raw = (((token & REGTYPE_MASK) >> REGTYPE_SHIFT)
            | ((token & REGTYPE_MASK2) >> REGTYPE_SHIFT2)) as u8;
        Self {
            raw: token,
            reg_type: RegisterType::from_raw(regtype_raw),
            index: (token & REGNUM_MASK) as u16,
            relative: token & RELATIVE != 0,
        }
    }

    pub fn write_mask(&self) -> WriteMask {
        WriteMask(((self.raw & WRITEMASK_MASK) >> WRITEMASK_SHIFT) as u8)
    }

    pub fn saturate(&self) -> bool {
        self.raw & DSTMOD_SATURATE != 0
    }

    pub fn partial_precision(&self) -> bool {
        self.raw & DSTMOD_PARTIAL_PRECISION != 0
    }

    pub fn centroid(&self) -> bool {
        self.raw & DSTMOD_CENTROID != 0
    }

    pub fn shift(&self) -> ResultShift {
        ResultShift(((self.raw & DSTSHIFT_MASK) >> DSTSHIFT_SHIFT) as u8)
    }

    pub fn swizzle(&self) -> Swizzle {
        Swizzle(((self.raw & SWIZZLE_MASK) >> SWIZZLE_SHIFT) as u8)
    }

    pub fn src_modifier(&self) -> SrcModifier {
        SrcModifier::from_raw(((self.raw & SRCMOD_MASK) >> SRCMOD_SHIFT) as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DclUsage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    PointSize,
    TexCoord,
    Tangent,
    Binormal,
    TessFactor,
    PositionT,
    Color,
    Fog,
    Depth,
    Sample,
    Unknown(u8),
}

impl DclUsage {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Position,
            1 => Self::BlendWeight,
            2 => Self::BlendIndices,
            3 => Self::Normal,
            4 => Self::PointSize,
            5 => Self::TexCoord,
            6 => Self::Tangent,
            7 => Self::Binormal,
            8 => Self::TessFactor,
            9 => Self::PositionT,
            10 => Self::Color,
            11 => Self::Fog,
            12 => Self::Depth,
            13 => Self::Sample,
            other => Self::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::BlendWeight => "blendweight",
            Self::BlendIndices => "blendindices",
            Self::Normal => "normal",
            Self::PointSize => "psize",
            Self::TexCoord => "texcoord",
            Self::Tangent => "tangent",
            Self::Binormal => "binormal",
            Self::TessFactor => "tessfactor",
            Self::PositionT => "positiont",
            Self::Color => "color",
            Self::Fog => "fog",
            Self::Depth => "depth",
            Self::Sample => "sample",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    Texture2D,
    TextureCube,
    Texture3D,
    Unknown(u8),
}

impl TextureType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Texture2D => "2d",
            Self::TextureCube => "cube",
            Self::Texture3D => "volume",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Semantic carried by the first parameter of `dcl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Usage { usage: DclUsage, index: u8 },
    Sampler(TextureType),
}

/// A `dcl` instruction: semantic word plus the declared register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub register: Operand,
}

impl Declaration {
    pub fn decode(semantic: u32, register: u32) -> Self {
        let register = Operand::decode(register);
        let kind = if register.reg_type == RegisterType::Sampler {
            let raw = ((semantic & DCL_TEXTURE_TYPE_MASK) >> DCL_TEXTURE_TYPE_SHIFT) as u8;
            DeclKind::Sampler(match raw {
                2 => TextureType::Texture2D,
                3 => TextureType::TextureCube,
                4 => TextureType::Texture3D,
                other => TextureType::Unknown(other),
            })
        } else {
            DeclKind::Usage {
                usage: DclUsage::from_raw((semantic & DCL_USAGE_MASK) as u8),
                index: ((semantic & DCL_USAGE_INDEX_MASK) >> DCL_USAGE_INDEX_SHIFT) as u8,
            }
        };
        Self { kind, register }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_register_type_bits_are_combined() {
        // oC0: low three bits 0, extension bits carry 8.
        let op = Operand::decode(0x800F_0800);
        assert_eq!(op.reg_type, RegisterType::ColorOut);
        assert_eq!(op.index, 0);
        assert!(op.write_mask().is_full());

        let op = Operand::decode(0xA0E4_0003);
        assert_eq!(op.reg_type, RegisterType::Const);
        assert_eq!(op.index, 3);
        assert!(op.swizzle().is_identity());
    }

    #[test]
    fn write_mask_lists_enabled_lanes() {
        assert_eq!(WriteMask(0x7).suffix(), ".rgb");
        assert_eq!(WriteMask(0x8).suffix(), ".a");
        assert_eq!(WriteMask(0xF).suffix(), "");
        assert_eq!(WriteMask(0x0).suffix(), "");
    }

    #[test]
    fn swizzle_collapses_replicated_component() {
        assert_eq!(Swizzle(0xFF).suffix(), ".a");
        assert_eq!(Swizzle(0x00).suffix(), ".r");
        assert_eq!(Swizzle(0x1B).suffix(), ".abgr");
        assert_eq!(Swizzle::IDENTITY.suffix(), "");
    }

    #[test]
    fn result_shift_is_signed() {
        assert_eq!(ResultShift(1).exponent(), 1);
        assert_eq!(ResultShift(15).exponent(), -1);
        assert_eq!(ResultShift(8).exponent(), -8);
        assert_eq!(ResultShift(2).suffix(), "_x4");
        assert_eq!(ResultShift(15).suffix(), "_d2");
    }

    #[test]
    fn destination_modifier_bits() {
        let op = Operand::decode(0x8011_0000 | (1 << 24));
        assert!(op.saturate());
        assert!(!op.partial_precision());
        assert_eq!(op.shift(), ResultShift(1));
        assert_eq!(op.write_mask(), WriteMask(0x1));
    }

    #[test]
    fn sampler_declaration_reads_texture_type() {
        let decl = Declaration::decode(0x9000_0000, 0xA000_0800);
        assert_eq!(decl.register.reg_type, RegisterType::Sampler);
        assert_eq!(decl.kind, DeclKind::Sampler(TextureType::Texture2D));

        let decl = Declaration::decode(0x8001_0005, 0x800F_0000 | (3 << 28));
        assert_eq!(
            decl.kind,
            DeclKind::Usage {
                usage: DclUsage::TexCoord,
                index: 1
            }
        );
    }
}
