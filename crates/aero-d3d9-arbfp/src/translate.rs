//! Pixel shader bytecode to `!!ARBfp1.0` fragment program text.
//!
//! Translation is a single pass over [`TokenStream`]. Every emitted line goes through
//! [`ProgramText`], which enforces the configured capacity; running out of room aborts the pass
//! and the partial text is reported as [`TranslateOutcome::Exhausted`] so the caller never
//! uploads a truncated program.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CString;

use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::modifier::{
    destination_modifiers, expand_source, scale_line, scratch_register, SourceExpansion,
    MODIFIER_PARAMS, SCRATCH_REGISTERS,
};
use crate::opcode::{ArbTarget, Lowering};
use crate::operand::{Declaration, Operand, RegisterType};
use crate::register::{self, ConstantTable};
use crate::shader_limits::{DEFAULT_PROGRAM_CAPACITY, MAX_TEXM3X3_PAD_ROWS};
use crate::stream::{Instruction, ShaderToken, TokenStream};
use crate::token::ShaderVersion;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramTextError {
    #[error("fragment program text needs {required} bytes but capacity is {capacity}")]
    Exhausted { capacity: usize, required: usize },
}

/// Bounded program text. `capacity` counts the terminating NUL handed to the backend.
#[derive(Debug, Clone)]
pub struct ProgramText {
    text: String,
    capacity: usize,
    lines: usize,
}

impl ProgramText {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity,
            lines: 0,
        }
    }

    /// Appends `line` and a newline, or fails without modifying the text.
    pub fn push_line(&mut self, line: &str) -> Result<(), ProgramTextError> {
        let required = self.text.len() + line.len() + 2;
        if required > self.capacity {
            return Err(ProgramTextError::Exhausted {
                capacity: self.capacity,
                required,
            });
        }
        self.text.push_str(line);
        self.text.push('\n');
        self.lines += 1;
        trace!(line_number = self.lines, length = self.text.len(), "{line}");
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// What the translator learned about the shader while generating code.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramInfo {
    pub version: ShaderVersion,
    pub has_version_token: bool,
    /// Values of constants defined inline with `def`.
    pub constants: BTreeMap<u16, [f32; 4]>,
    pub declarations: Vec<Declaration>,
    pub temps: BTreeSet<u16>,
    pub texture_regs: BTreeSet<u16>,
    /// Constants read from `program.env`.
    pub env_constants: BTreeSet<u16>,
    /// Instructions that produced program text.
    pub translated: usize,
    pub unrecognized: usize,
    /// Mnemonics of recognized opcodes the target cannot express, in stream order.
    pub unsupported: Vec<&'static str>,
    /// Instructions dropped because an operand had no name in the target namespace.
    pub rejected: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutcome {
    Complete,
    Exhausted(ProgramTextError),
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub info: ProgramInfo,
    pub outcome: TranslateOutcome,
}

impl Translation {
    pub fn is_complete(&self) -> bool {
        self.outcome == TranslateOutcome::Complete
    }

    /// NUL-terminated program text for the backend.
    pub fn to_c_string(&self) -> Option<CString> {
        CString::new(self.text.as_bytes()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    pub program_capacity: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            program_capacity: DEFAULT_PROGRAM_CAPACITY,
        }
    }
}

/// Per-translation state threaded through code generation.
#[derive(Debug, Clone, Default)]
pub struct CodeGenState {
    pub version: ShaderVersion,
    pub prologue_emitted: bool,
    pub constants: ConstantTable,
    /// Texture registers written by the pending `texm3x3pad` rows.
    texm3x3_rows: [u16; MAX_TEXM3X3_PAD_ROWS],
    texm3x3_row: usize,
}

pub fn translate(words: &[u32], options: &TranslateOptions) -> Translation {
    let mut gen = Generator {
        state: CodeGenState::default(),
        text: ProgramText::new(options.program_capacity),
        info: ProgramInfo::default(),
    };
    let outcome = match gen.run(words) {
        Ok(()) => TranslateOutcome::Complete,
        Err(err) => {
            error!(
                error = %err,
                written = gen.text.len(),
                "fragment program translation aborted"
            );
            TranslateOutcome::Exhausted(err)
        }
    };
    gen.info.lines = gen.text.line_count();
    Translation {
        text: gen.text.into_string(),
        info: gen.info,
        outcome,
    }
}

struct Operands {
    dst: Operand,
    dst_name: String,
    sources: Vec<SourceExpansion>,
}

struct Generator {
    state: CodeGenState,
    text: ProgramText,
    info: ProgramInfo,
}

impl Generator {
    fn emit(&mut self, line: &str) -> Result<(), ProgramTextError> {
        self.text.push_line(line)
    }

    fn run(&mut self, words: &[u32]) -> Result<(), ProgramTextError> {
        let mut ended = false;
        for token in TokenStream::new(words) {
            match token {
                ShaderToken::Version { version, .. } => {
                    if !version.is_known() {
                        warn!(%version, "unknown pixel shader version; using nearest limits");
                    }
                    self.info.has_version_token = true;
                    self.prologue(version)?;
                }
                ShaderToken::MisplacedVersion { .. } | ShaderToken::Comment { .. } => {}
                ShaderToken::Instruction(inst) => {
                    self.prologue(ShaderVersion::UNVERSIONED)?;
                    self.instruction(&inst)?;
                }
                ShaderToken::Unrecognized {
                    at,
                    token,
                    continuation,
                } => {
                    self.prologue(ShaderVersion::UNVERSIONED)?;
                    warn!(
                        token_index = at,
                        opcode = token & 0xFFFF,
                        version = %self.state.version,
                        skipped = continuation.len(),
                        "unrecognized pixel shader opcode"
                    );
                    self.info.unrecognized += 1;
                }
                ShaderToken::Truncated {
                    at,
                    needed,
                    available,
                } => {
                    warn!(
                        token_index = at,
                        needed, available, "pixel shader token stream truncated"
                    );
                }
                ShaderToken::End { .. } => {
                    self.prologue(ShaderVersion::UNVERSIONED)?;
                    self.epilogue()?;
                    ended = true;
                }
            }
        }
        if !ended {
            warn!("pixel shader has no end token");
            self.prologue(ShaderVersion::UNVERSIONED)?;
            self.epilogue()?;
        }
        Ok(())
    }

    /// Emits the header and declarations once; later calls are no-ops.
    fn prologue(&mut self, version: ShaderVersion) -> Result<(), ProgramTextError> {
        if self.state.prologue_emitted {
            return Ok(());
        }
        self.state.prologue_emitted = true;
        self.state.version = version;
        self.info.version = version;

        let limits = version.limits();
        self.emit(limits.header)?;
        for i in 0..limits.texture_regs {
            self.emit(&format!("TEMP T{i};"))?;
        }
        for i in 0..limits.temps {
            self.emit(&format!("TEMP R{i};"))?;
        }
        for name in ["TMP", "TMP2"].into_iter().chain(SCRATCH_REGISTERS) {
            self.emit(&format!("TEMP {name};"))?;
        }
        for param in MODIFIER_PARAMS {
            self.emit(param)?;
        }
        for i in 0..limits.texcoord_stages {
            self.emit(&format!("MOV T{i}, fragment.texcoord[{i}];"))?;
        }
        Ok(())
    }

    fn epilogue(&mut self) -> Result<(), ProgramTextError> {
        self.emit("MOV result.color, R0;")?;
        self.emit("END")
    }

    fn instruction(&mut self, inst: &Instruction<'_>) -> Result<(), ProgramTextError> {
        let desc = inst.descriptor;
        match desc.target {
            ArbTarget::Instruction(mnemonic) => self.generic(inst, mnemonic),
            ArbTarget::Lowered(lowering) => self.lowered(inst, lowering),
            ArbTarget::Unsupported | ArbTarget::RequiresGlsl => {
                debug!(
                    token_index = inst.at,
                    opcode = desc.name,
                    version = %self.state.version,
                    requires_glsl = desc.target == ArbTarget::RequiresGlsl,
                    "opcode has no fragment program lowering"
                );
                self.info.unsupported.push(desc.name);
                Ok(())
            }
        }
    }

    /// Records register usage and returns the register's program name.
    fn name_of(&mut self, operand: &Operand, at: usize) -> Option<String> {
        if operand.relative {
            debug!(token_index = at, "relative addressing ignored");
        }
        let name = match register::resolve(operand, &self.state.constants) {
            Ok(name) => name,
            Err(err) => {
                warn!(token_index = at, error = %err, "dropping instruction");
                return None;
            }
        };

        let limits = self.state.version.limits();
        let index = operand.index;
        let limit = match operand.reg_type {
            RegisterType::Temp => {
                self.info.temps.insert(index);
                Some(limits.temps)
            }
            RegisterType::Texture => {
                self.info.texture_regs.insert(index);
                Some(limits.texture_regs)
            }
            RegisterType::Const => {
                if !self.state.constants.is_declared(index) {
                    self.info.env_constants.insert(index);
                }
                Some(limits.constants)
            }
            _ => None,
        };
        if let Some(limit) = limit.filter(|&limit| u32::from(index) >= limit) {
            let reg_name = format!("{}{index}", operand.reg_type.short_name());
            warn!(
                token_index = at,
                register = %reg_name,
                limit,
                version = %self.state.version,
                "register index exceeds shader model limit"
            );
        }
        Some(name)
    }

    /// Resolves the destination and expands every source into its scratch register.
    fn gather(&mut self, inst: &Instruction<'_>) -> Option<Operands> {
        let dst = inst.operand(0)?;
        let dst_name = self.name_of(&dst, inst.at)?;
        let mut sources = Vec::with_capacity(inst.params.len().saturating_sub(1));
        for (position, &word) in inst.params.iter().skip(1).enumerate() {
            let operand = Operand::decode(word);
            let name = self.name_of(&operand, inst.at)?;
            let Some(scratch) = scratch_register(position) else {
                warn!(token_index = inst.at, position, "no scratch register for source");
                return None;
            };
            sources.push(expand_source(&operand, &name, scratch));
        }
        Some(Operands {
            dst,
            dst_name,
            sources,
        })
    }

    fn emit_aux(&mut self, sources: &[SourceExpansion]) -> Result<(), ProgramTextError> {
        for line in sources.iter().flat_map(|s| s.aux.iter()) {
            self.emit(line)?;
        }
        Ok(())
    }

    /// Emits `mnemonic dst, operands;` with destination modifiers applied.
    fn emit_with_destination(
        &mut self,
        mnemonic: &str,
        ops: &Operands,
        operands: &[&str],
    ) -> Result<(), ProgramTextError> {
        let mods = destination_modifiers(&ops.dst);
        let mask = ops.dst.write_mask().suffix();
        self.emit(&format!(
            "{mnemonic}{} {}{mask}, {};",
            mods.saturate_suffix,
            ops.dst_name,
            operands.join(", ")
        ))?;
        if let Some(constant) = mods.scale {
            self.emit(&scale_line(&ops.dst_name, &mask, constant))?;
        }
        self.info.translated += 1;
        Ok(())
    }

    fn reject(&mut self) -> Result<(), ProgramTextError> {
        self.info.rejected += 1;
        Ok(())
    }

    fn generic(&mut self, inst: &Instruction<'_>, mnemonic: &str) -> Result<(), ProgramTextError> {
        if inst.params.len() == 1 {
            // Single-operand instructions (texkill) name their register as a source.
            let Some(operand) = inst.operand(0) else {
                return self.reject();
            };
            let Some(name) = self.name_of(&operand, inst.at) else {
                return self.reject();
            };
            self.emit(&format!("{mnemonic} {name};"))?;
            self.info.translated += 1;
            return Ok(());
        }

        let Some(ops) = self.gather(inst) else {
            return self.reject();
        };
        self.emit_aux(&ops.sources)?;
        let sources: Vec<&str> = ops.sources.iter().map(|s| s.text.as_str()).collect();
        self.emit_with_destination(mnemonic, &ops, &sources)
    }

    fn lowered(
        &mut self,
        inst: &Instruction<'_>,
        lowering: Lowering,
    ) -> Result<(), ProgramTextError> {
        match lowering {
            Lowering::NoOp => Ok(()),
            Lowering::Declaration => {
                if let [semantic, register] = inst.params {
                    self.info
                        .declarations
                        .push(Declaration::decode(*semantic, *register));
                }
                Ok(())
            }
            Lowering::DefineConstant => self.define_constant(inst),
            Lowering::Compare | Lowering::ConditionalSelect => self.select(inst, lowering),
            _ => self.texture_op(inst, lowering),
        }
    }

    fn define_constant(&mut self, inst: &Instruction<'_>) -> Result<(), ProgramTextError> {
        let Some(dst) = inst.operand(0) else {
            return self.reject();
        };
        if dst.reg_type != RegisterType::Const {
            warn!(token_index = inst.at, register = ?dst.reg_type, "def target is not a constant");
            return self.reject();
        }
        let mut values = [0.0f32; 4];
        for (value, word) in values.iter_mut().zip(&inst.params[1..]) {
            *value = f32::from_bits(*word);
        }
        let index = dst.index;
        let [x, y, z, w] = values;
        self.emit(&format!("PARAM C{index} = {{ {x:?}, {y:?}, {z:?}, {w:?} }};"))?;
        if !self.state.constants.declare(index) {
            warn!(token_index = inst.at, index, "constant index past constant table");
        }
        self.info.constants.insert(index, values);
        self.info.translated += 1;
        Ok(())
    }

    /// `cmp` and `cnd`. The fragment program `CMP` picks its second operand where the first is
    /// negative.
    fn select(&mut self, inst: &Instruction<'_>, lowering: Lowering) -> Result<(), ProgramTextError> {
        let Some(ops) = self.gather(inst) else {
            return self.reject();
        };
        let [s0, s1, s2] = match ops.sources.as_slice() {
            [a, b, c] => [a.text.clone(), b.text.clone(), c.text.clone()],
            _ => return self.reject(),
        };
        self.emit_aux(&ops.sources)?;
        if lowering == Lowering::ConditionalSelect {
            self.emit(&format!("ADD TMP, {}, coefdiv[0].x;", negate(&s0)))?;
            self.emit_with_destination("CMP", &ops, &["TMP", s1.as_str(), s2.as_str()])
        } else {
            self.emit_with_destination("CMP", &ops, &[s0.as_str(), s2.as_str(), s1.as_str()])
        }
    }

    /// ps_1_x texture addressing. `n` is the destination register index, which is also the
    /// texture stage sampled.
    fn texture_op(
        &mut self,
        inst: &Instruction<'_>,
        lowering: Lowering,
    ) -> Result<(), ProgramTextError> {
        let Some(dst) = inst.operand(0) else {
            return self.reject();
        };
        let n = dst.index;
        let mask = dst.write_mask().suffix();

        match lowering {
            Lowering::Tex => {
                self.info.texture_regs.insert(n);
                self.emit(&format!("TEX T{n}{mask}, T{n}, texture[{n}], 2D;"))?;
            }
            Lowering::TexCoord => {
                self.info.texture_regs.insert(n);
                self.emit(&format!("MOV T{n}{mask}, fragment.texcoord[{n}];"))?;
            }
            Lowering::TexLd => {
                let Some(ops) = self.gather(inst) else {
                    return self.reject();
                };
                let Some(src) = ops.sources.first() else {
                    return self.reject();
                };
                self.emit_aux(&ops.sources)?;
                self.emit(&format!(
                    "TEX {}{mask}, {}, texture[{n}], 2D;",
                    ops.dst_name, src.text
                ))?;
            }
            Lowering::TexCrd => {
                let Some(dst_name) = self.name_of(&dst, inst.at) else {
                    return self.reject();
                };
                let Some(src) = inst.operand(1) else {
                    return self.reject();
                };
                self.emit(&format!(
                    "MOV {dst_name}{mask}, fragment.texcoord[{}];",
                    src.index
                ))?;
            }
            Lowering::TexBem | Lowering::TexReg2Ar | Lowering::TexReg2Gb => {
                let Some(src) = inst.operand(1) else {
                    return self.reject();
                };
                let m = src.index;
                self.info.texture_regs.extend([n, m]);
                match lowering {
                    Lowering::TexBem => {
                        self.emit(&format!("ADD TMP.rg, fragment.texcoord[{n}], T{m};"))?;
                    }
                    Lowering::TexReg2Ar => {
                        self.emit(&format!("MOV TMP.r, T{m}.a;"))?;
                        self.emit(&format!("MOV TMP.g, T{m}.r;"))?;
                    }
                    _ => {
                        self.emit(&format!("MOV TMP.r, T{m}.g;"))?;
                        self.emit(&format!("MOV TMP.g, T{m}.b;"))?;
                    }
                }
                self.emit(&format!("TEX T{n}, TMP, texture[{n}], 2D;"))?;
            }
            _ => return self.matrix_texture_op(inst, lowering, n),
        }
        self.info.translated += 1;
        Ok(())
    }

    /// `texm3x2*` and `texm3x3*`: one `DP3` row per instruction, the last row samples.
    ///
    /// A closing `texm3x3` instruction ends the pending pad sequence even when it is rejected.
    fn matrix_texture_op(
        &mut self,
        inst: &Instruction<'_>,
        lowering: Lowering,
        n: u16,
    ) -> Result<(), ProgramTextError> {
        let result = self.matrix_row(inst, lowering, n);
        if matches!(
            lowering,
            Lowering::TexM3x3Tex | Lowering::TexM3x3VSpec | Lowering::TexM3x3Spec
        ) {
            self.state.texm3x3_row = 0;
        }
        result
    }

    fn matrix_row(
        &mut self,
        inst: &Instruction<'_>,
        lowering: Lowering,
        n: u16,
    ) -> Result<(), ProgramTextError> {
        let Some(src_word) = inst.params.get(1) else {
            return self.reject();
        };
        let operand = Operand::decode(*src_word);
        let Some(name) = self.name_of(&operand, inst.at) else {
            return self.reject();
        };
        let src = expand_source(&operand, &name, SCRATCH_REGISTERS[0]);
        self.info.texture_regs.insert(n);

        // Row written by this instruction.
        let row = match lowering {
            Lowering::TexM3x2Pad => 'x',
            Lowering::TexM3x2Tex => 'y',
            Lowering::TexM3x3Pad => {
                let row = self.state.texm3x3_row;
                if row >= MAX_TEXM3X3_PAD_ROWS {
                    warn!(token_index = inst.at, "texm3x3pad without a closing texm3x3 row");
                    return self.reject();
                }
                self.state.texm3x3_rows[row] = n;
                self.state.texm3x3_row += 1;
                ['x', 'y'][row]
            }
            _ => 'z',
        };
        let eye = match lowering {
            Lowering::TexM3x3Spec => {
                let Some(eye) = inst.operand(2) else {
                    return self.reject();
                };
                let Some(eye) = self.name_of(&eye, inst.at) else {
                    return self.reject();
                };
                Some(eye)
            }
            _ => None,
        };

        self.emit_aux(std::slice::from_ref(&src))?;
        self.emit(&format!("DP3 TMP.{row}, T{n}, {};", src.text))?;
        match lowering {
            Lowering::TexM3x2Tex => {
                self.emit(&format!("TEX T{n}, TMP, texture[{n}], 2D;"))?;
            }
            Lowering::TexM3x3Tex => {
                self.emit(&format!("TEX T{n}, TMP, texture[{n}], CUBE;"))?;
            }
            Lowering::TexM3x3VSpec => {
                let [r0, r1] = self.state.texm3x3_rows;
                self.emit(&format!("MOV TMP2.x, fragment.texcoord[{r0}].w;"))?;
                self.emit(&format!("MOV TMP2.y, fragment.texcoord[{r1}].w;"))?;
                self.emit(&format!("MOV TMP2.z, fragment.texcoord[{n}].w;"))?;
                self.reflect("TMP2", n)?;
            }
            Lowering::TexM3x3Spec => {
                let eye = eye.unwrap_or_default();
                self.reflect(&eye, n)?;
            }
            _ => {}
        }
        self.info.translated += 1;
        Ok(())
    }

    /// Reflects the eye vector about the normal accumulated in `TMP` and samples the cube map.
    fn reflect(&mut self, eye: &str, n: u16) -> Result<(), ProgramTextError> {
        self.emit(&format!("DP3 TMP.w, TMP, {eye};"))?;
        self.emit("MUL TMP, TMP.w, TMP;")?;
        self.emit(&format!("MAD TMP, coefmul[0].x, TMP, -{eye};"))?;
        self.emit(&format!("TEX T{n}, TMP, texture[{n}], CUBE;"))
    }
}

fn negate(operand: &str) -> String {
    match operand.strip_prefix('-') {
        Some(positive) => positive.to_owned(),
        None => format!("-{operand}"),
    }
}
