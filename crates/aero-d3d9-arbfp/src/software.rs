//! Reference arithmetic for the software execution path.
//!
//! When a shader cannot be lowered to a fragment program the caller interprets the token stream
//! instead. Each opcode table entry carries an [`Executor`] pointing at one of the pure functions
//! below. Texture addressing opcodes have no arithmetic meaning here and are [`Executor::Stub`].

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    /// Reinterprets a flat constant file (`c0.x, c0.y, ...`) as registers.
    ///
    /// Returns `None` when the slice length is not a multiple of four.
    pub fn slice_from_floats(values: &[f32]) -> Option<&[Vec4]> {
        bytemuck::try_cast_slice(values).ok()
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z), f(self.w))
    }

    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(
            f(self.x, other.x),
            f(self.y, other.y),
            f(self.z, other.z),
            f(self.w, other.w),
        )
    }

    fn dot3(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn dot4(self, other: Self) -> f32 {
        self.dot3(other) + self.w * other.w
    }
}

/// How an opcode is evaluated on the software path.
#[derive(Debug, Clone, Copy)]
pub enum Executor {
    /// Produces no result.
    Nop,
    Unary(fn(Vec4) -> Vec4),
    Binary(fn(Vec4, Vec4) -> Vec4),
    Ternary(fn(Vec4, Vec4, Vec4) -> Vec4),
    /// Vector times `rows` consecutive constant registers.
    Matrix {
        rows: usize,
        f: fn(Vec4, &[Vec4]) -> Vec4,
    },
    /// No software implementation.
    Stub,
}

impl Executor {
    /// Evaluates the opcode on already-modified source values.
    ///
    /// For [`Executor::Matrix`] the first source is the vector and the following `rows` sources
    /// are the matrix rows. Returns `None` for `Nop`/`Stub` or when too few sources are given.
    pub fn execute(&self, sources: &[Vec4]) -> Option<Vec4> {
        match *self {
            Self::Nop | Self::Stub => None,
            Self::Unary(f) => sources.first().map(|&a| f(a)),
            Self::Binary(f) => match sources {
                [a, b, ..] => Some(f(*a, *b)),
                _ => None,
            },
            Self::Ternary(f) => match sources {
                [a, b, c, ..] => Some(f(*a, *b, *c)),
                _ => None,
            },
            Self::Matrix { rows, f } => {
                let (vector, rest) = sources.split_first()?;
                let rows = rest.get(..rows)?;
                Some(f(*vector, rows))
            }
        }
    }
}

pub fn mov(a: Vec4) -> Vec4 {
    a
}

pub fn add(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, |a, b| a + b)
}

pub fn sub(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, |a, b| a - b)
}

pub fn mul(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, |a, b| a * b)
}

pub fn mad(a: Vec4, b: Vec4, c: Vec4) -> Vec4 {
    add(mul(a, b), c)
}

pub fn min(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, f32::min)
}

pub fn max(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, f32::max)
}

pub fn slt(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, |a, b| if a < b { 1.0 } else { 0.0 })
}

pub fn sge(a: Vec4, b: Vec4) -> Vec4 {
    a.zip(b, |a, b| if a >= b { 1.0 } else { 0.0 })
}

pub fn abs(a: Vec4) -> Vec4 {
    a.map(f32::abs)
}

pub fn dp3(a: Vec4, b: Vec4) -> Vec4 {
    Vec4::splat(a.dot3(b))
}

pub fn dp4(a: Vec4, b: Vec4) -> Vec4 {
    Vec4::splat(a.dot4(b))
}

pub fn rcp(a: Vec4) -> Vec4 {
    let r = if a.w == 0.0 { f32::INFINITY } else { 1.0 / a.w };
    Vec4::splat(r)
}

pub fn rsq(a: Vec4) -> Vec4 {
    let w = a.w.abs();
    let r = if w == 0.0 {
        f32::INFINITY
    } else {
        1.0 / w.sqrt()
    };
    Vec4::splat(r)
}

pub fn exp(a: Vec4) -> Vec4 {
    Vec4::splat(a.w.exp2())
}

pub fn log(a: Vec4) -> Vec4 {
    let w = a.w.abs();
    let r = if w == 0.0 {
        f32::NEG_INFINITY
    } else {
        w.log2()
    };
    Vec4::splat(r)
}

/// Partial-precision `exp`: `(2^floor(w), fract(w), ~2^w, 1)`.
pub fn expp(a: Vec4) -> Vec4 {
    let floor = a.w.floor();
    let approx = f32::from_bits(a.w.exp2().to_bits() & 0xFFFF_FF00);
    Vec4::new(floor.exp2(), a.w - floor, approx, 1.0)
}

/// Partial-precision `log`: `(exponent, mantissa, log2|w|, 1)`.
pub fn logp(a: Vec4) -> Vec4 {
    let w = a.w.abs();
    if w == 0.0 {
        return Vec4::new(f32::NEG_INFINITY, 1.0, f32::NEG_INFINITY, 1.0);
    }
    let exponent = w.log2().floor();
    Vec4::new(exponent, w / exponent.exp2(), w.log2(), 1.0)
}

pub fn lit(a: Vec4) -> Vec4 {
    let diffuse = a.x.max(0.0);
    let specular = if a.x > 0.0 {
        a.y.max(0.0).powf(a.w.clamp(-128.0, 128.0))
    } else {
        0.0
    };
    Vec4::new(1.0, diffuse, specular, 1.0)
}

pub fn dst(a: Vec4, b: Vec4) -> Vec4 {
    Vec4::new(1.0, a.y * b.y, a.z, b.w)
}

pub fn lrp(a: Vec4, b: Vec4, c: Vec4) -> Vec4 {
    add(mul(a, sub(b, c)), c)
}

pub fn frc(a: Vec4) -> Vec4 {
    Vec4::new(a.x - a.x.floor(), a.y - a.y.floor(), 0.0, 1.0)
}

pub fn crs(a: Vec4, b: Vec4) -> Vec4 {
    Vec4::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
        0.0,
    )
}

pub fn m4x4(v: Vec4, rows: &[Vec4]) -> Vec4 {
    let d = |i: usize| rows.get(i).map_or(0.0, |r| v.dot4(*r));
    Vec4::new(d(0), d(1), d(2), d(3))
}

pub fn m4x3(v: Vec4, rows: &[Vec4]) -> Vec4 {
    let d = |i: usize| rows.get(i).map_or(0.0, |r| v.dot4(*r));
    Vec4::new(d(0), d(1), d(2), 1.0)
}

pub fn m3x4(v: Vec4, rows: &[Vec4]) -> Vec4 {
    let d = |i: usize| rows.get(i).map_or(0.0, |r| v.dot3(*r));
    Vec4::new(d(0), d(1), d(2), d(3))
}

pub fn m3x3(v: Vec4, rows: &[Vec4]) -> Vec4 {
    let d = |i: usize| rows.get(i).map_or(0.0, |r| v.dot3(*r));
    Vec4::new(d(0), d(1), d(2), 1.0)
}

pub fn m3x2(v: Vec4, rows: &[Vec4]) -> Vec4 {
    let d = |i: usize| rows.get(i).map_or(0.0, |r| v.dot3(*r));
    Vec4::new(d(0), d(1), 0.0, 1.0)
}
