//! Restartable walk over a pixel shader token stream.
//!
//! The translator and the disassembler both consume [`TokenStream`], so operand counting, comment
//! skipping and version tracking only exist here.

use tracing::warn;

use crate::opcode::{self, OpcodeDescriptor};
use crate::operand::Operand;
use crate::token::{classify, is_parameter, ShaderVersion, TokenKind};

/// An instruction whose opcode is known for the active shader version.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    /// Word index of the opcode word.
    pub at: usize,
    pub token: u32,
    pub descriptor: &'static OpcodeDescriptor,
    /// Exactly `descriptor.arity` parameter words.
    pub params: &'a [u32],
}

impl Instruction<'_> {
    pub fn operand(&self, index: usize) -> Option<Operand> {
        self.params.get(index).copied().map(Operand::decode)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ShaderToken<'a> {
    Version {
        at: usize,
        version: ShaderVersion,
    },
    /// A version word after the stream already started. Ignored.
    MisplacedVersion {
        at: usize,
        version: ShaderVersion,
    },
    Comment {
        at: usize,
        payload: &'a [u32],
    },
    Instruction(Instruction<'a>),
    /// Opcode with no table entry for this version; `continuation` holds the parameter-flagged
    /// words that followed it.
    Unrecognized {
        at: usize,
        token: u32,
        continuation: &'a [u32],
    },
    /// The stream ended inside an instruction or comment. Nothing follows.
    Truncated {
        at: usize,
        needed: usize,
        available: usize,
    },
    End {
        at: usize,
    },
}

#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    words: &'a [u32],
    pos: usize,
    version: Option<ShaderVersion>,
    started: bool,
    finished: bool,
}

impl<'a> TokenStream<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self {
            words,
            pos: 0,
            version: None,
            started: false,
            finished: false,
        }
    }

    /// Version governing opcode lookup, [`ShaderVersion::UNVERSIONED`] until one is seen.
    pub fn version(&self) -> ShaderVersion {
        self.version.unwrap_or(ShaderVersion::UNVERSIONED)
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }

    /// Word index of the next token.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn note_instruction(&mut self, at: usize) {
        if !self.started && self.version.is_none() {
            warn!(token_index = at, "pixel shader has no version token; assuming ps_0_0");
        }
        self.started = true;
    }

    fn truncated(&mut self, at: usize, needed: usize) -> ShaderToken<'a> {
        self.finished = true;
        let available = self.words.len() - at;
        self.pos = self.words.len();
        ShaderToken::Truncated {
            at,
            needed,
            available,
        }
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = ShaderToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let at = self.pos;
        let Some(&word) = self.words.get(at) else {
            self.finished = true;
            return None;
        };

        let item = match classify(word) {
            TokenKind::End => {
                self.finished = true;
                self.pos += 1;
                ShaderToken::End { at }
            }
            TokenKind::Version(version) => {
                self.pos += 1;
                if self.started || self.version.is_some() {
                    warn!(token_index = at, %version, "ignoring misplaced version token");
                    ShaderToken::MisplacedVersion { at, version }
                } else {
                    self.version = Some(version);
                    ShaderToken::Version { at, version }
                }
            }
            TokenKind::Comment { len } => {
                let start = at + 1;
                let Some(payload) = self.words.get(start..start + len) else {
                    return Some(self.truncated(at, len + 1));
                };
                self.pos = start + len;
                ShaderToken::Comment { at, payload }
            }
            kind @ (TokenKind::Parameter | TokenKind::Instruction { .. }) => {
                self.note_instruction(at);
                let start = at + 1;
                let descriptor = match kind {
                    TokenKind::Instruction { opcode } => opcode::lookup(opcode, self.version()),
                    _ => None,
                };
                match descriptor {
                    Some(descriptor) => {
                        let Some(params) = self.words.get(start..start + descriptor.arity) else {
                            return Some(self.truncated(at, descriptor.arity + 1));
                        };
                        self.pos = start + descriptor.arity;
                        ShaderToken::Instruction(Instruction {
                            at,
                            token: word,
                            descriptor,
                            params,
                        })
                    }
                    None => {
                        let len = self.words[start..]
                            .iter()
                            .take_while(|&&w| is_parameter(w))
                            .count();
                        self.pos = start + len;
                        ShaderToken::Unrecognized {
                            at,
                            token: word,
                            continuation: &self.words[start..start + len],
                        }
                    }
                }
            }
        };
        Some(item)
    }
}
