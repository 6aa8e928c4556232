//! D3D8/D3D9 pixel shader bytecode to `!!ARBfp1.0` fragment program translation.
//!
//! The crate covers the ps_1_x models fixed-function-era drivers expose: the token stream is
//! walked once, each instruction is lowered to fragment program text, and the result is handed to
//! a [`FragmentProgramBackend`]. Shaders the target cannot express report a non-usable
//! [`HardwareStatus`] and run through the [`software`] executors instead.

pub mod config;
pub mod disasm;
pub mod modifier;
pub mod opcode;
pub mod operand;
pub mod program;
pub mod register;
pub mod shader_limits;
pub mod software;
pub mod stream;
pub mod token;
pub mod translate;

pub use config::{ConfigError, ShaderMode, TranslatorConfig};
pub use disasm::disassemble;
pub use program::{
    FragmentProgramBackend, FunctionQuery, HardwareStatus, PixelShader, ProgramHandle,
    UploadError,
};
pub use token::{ShaderVersion, END_TOKEN};
pub use translate::{translate, ProgramInfo, TranslateOptions, TranslateOutcome, Translation};
