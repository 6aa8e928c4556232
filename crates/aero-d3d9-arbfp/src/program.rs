//! Compiled pixel shader objects.
//!
//! A [`PixelShader`] owns a copy of the guest's token stream, the generated fragment program
//! text and the backend handle of the uploaded program. Replacing the function releases the old
//! handle before anything else happens, so a shader never holds more than one upload.

use std::ffi::CStr;

use thiserror::Error;
use tracing::{debug, trace, warn, Level};

use crate::config::{ShaderMode, TranslatorConfig};
use crate::disasm::disassemble;
use crate::opcode;
use crate::software::Executor;
use crate::token::{
    leading_version, stream_len, words_from_le_bytes, words_to_le_bytes, ShaderVersion, TokenError, OPCODE_MASK,
};
use crate::translate::{translate, ProgramInfo, ProgramTextError, TranslateOutcome, Translation};

/// Backend identifier of an uploaded fragment program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("fragment program rejected: {message}")]
pub struct UploadError {
    /// Byte offset of the first error in the program text, when the backend reports one.
    pub position: Option<usize>,
    pub message: String,
}

/// Compiles fragment program text into something the GPU can run.
pub trait FragmentProgramBackend {
    fn upload(&mut self, source: &CStr) -> Result<ProgramHandle, UploadError>;
    fn release(&mut self, handle: ProgramHandle);
}

/// Whether the shader can run on the hardware path after the last `set_function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareStatus {
    NoFunction,
    /// Software mode is configured; nothing was translated.
    Disabled,
    Uploaded(ProgramHandle),
    TranslationFailed(ProgramTextError),
    UploadRejected(UploadError),
}

impl HardwareStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Uploaded(_))
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        match self {
            Self::Uploaded(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Result of the two-phase function query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionQuery {
    /// No destination was given; the function needs this many bytes.
    Size(usize),
    /// The destination is too small. Nothing was copied.
    MoreData { required: usize },
    Copied(usize),
}

#[derive(Debug)]
pub struct PixelShader {
    config: TranslatorConfig,
    function: Option<Box<[u32]>>,
    version: ShaderVersion,
    translation: Option<Translation>,
    status: HardwareStatus,
}

impl PixelShader {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            config,
            function: None,
            version: ShaderVersion::UNVERSIONED,
            translation: None,
            status: HardwareStatus::NoFunction,
        }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Installs a new token stream, replacing any previous one.
    ///
    /// The stream is copied up to and including its end token. In hardware mode it is then
    /// translated and, if the program text fit, uploaded through `backend`.
    pub fn set_function(
        &mut self,
        function: Option<&[u32]>,
        backend: &mut dyn FragmentProgramBackend,
    ) -> &HardwareStatus {
        self.release(backend);

        let Some(words) = function else {
            return &self.status;
        };
        let words: Box<[u32]> = words[..stream_len(words)].into();
        let version = leading_version(&words);
        debug!(
            words = words.len(),
            version = ?version,
            "pixel shader function set"
        );
        if tracing::enabled!(Level::TRACE) {
            trace!("pixel shader disassembly:\n{}", disassemble(&words));
        }

        self.status = match self.config.mode {
            ShaderMode::Software => HardwareStatus::Disabled,
            ShaderMode::Hardware => {
                let translation = translate(&words, &self.config.translate_options());
                let status = upload(&translation, backend);
                self.translation = Some(translation);
                status
            }
        };
        self.function = Some(words);
        self.version = version.unwrap_or(ShaderVersion::UNVERSIONED);
        &self.status
    }

    /// [`Self::set_function`] for little-endian bytecode.
    pub fn set_function_bytes(
        &mut self,
        bytes: &[u8],
        backend: &mut dyn FragmentProgramBackend,
    ) -> Result<&HardwareStatus, TokenError> {
        let words = words_from_le_bytes(bytes)?;
        Ok(self.set_function(Some(&words), backend))
    }

    /// Copies the installed function into `dst` as little-endian bytes.
    pub fn get_function(&self, dst: Option<&mut [u8]>) -> FunctionQuery {
        let required = self.function_len();
        let Some(dst) = dst else {
            return FunctionQuery::Size(required);
        };
        if dst.len() < required {
            return FunctionQuery::MoreData { required };
        }
        let bytes = words_to_le_bytes(self.function().unwrap_or_default());
        dst[..required].copy_from_slice(&bytes);
        FunctionQuery::Copied(required)
    }

    pub fn function(&self) -> Option<&[u32]> {
        self.function.as_deref()
    }

    /// Function length in bytes, zero without a function.
    pub fn function_len(&self) -> usize {
        self.function.as_ref().map_or(0, |words| words.len() * 4)
    }

    /// Generated program text, also available when translation ran out of room.
    pub fn arb_source(&self) -> Option<&str> {
        self.translation.as_ref().map(|t| t.text.as_str())
    }

    pub fn info(&self) -> Option<&ProgramInfo> {
        self.translation.as_ref().map(|t| &t.info)
    }

    pub fn status(&self) -> &HardwareStatus {
        &self.status
    }

    /// Version the function declared, [`ShaderVersion::UNVERSIONED`] without one.
    pub fn version(&self) -> ShaderVersion {
        self.version
    }

    /// Software executor for an opcode word, resolved against this shader's version.
    pub fn software_executor(&self, token: u32) -> Option<Executor> {
        opcode::lookup((token & OPCODE_MASK) as u16, self.version()).map(|desc| desc.executor)
    }

    /// Returns the uploaded program to `backend` and forgets the function.
    pub fn release(&mut self, backend: &mut dyn FragmentProgramBackend) {
        if let Some(handle) = self.status.handle() {
            debug!(handle = handle.0, "releasing fragment program");
            backend.release(handle);
        }
        self.function = None;
        self.version = ShaderVersion::UNVERSIONED;
        self.translation = None;
        self.status = HardwareStatus::NoFunction;
    }
}

fn upload(translation: &Translation, backend: &mut dyn FragmentProgramBackend) -> HardwareStatus {
    if let TranslateOutcome::Exhausted(err) = &translation.outcome {
        return HardwareStatus::TranslationFailed(err.clone());
    }
    let Some(source) = translation.to_c_string() else {
        return HardwareStatus::UploadRejected(UploadError {
            position: None,
            message: "program text contains a NUL byte".to_owned(),
        });
    };
    match backend.upload(&source) {
        Ok(handle) => {
            debug!(handle = handle.0, lines = translation.info.lines, "fragment program uploaded");
            HardwareStatus::Uploaded(handle)
        }
        Err(err) => {
            warn!(
                position = ?err.position,
                message = %err.message,
                "fragment program rejected; falling back to software"
            );
            HardwareStatus::UploadRejected(err)
        }
    }
}
