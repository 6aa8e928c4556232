use std::fs;
use std::path::PathBuf;

use aero_d3d9_arbfp::shader_limits::DEFAULT_PROGRAM_CAPACITY;
use aero_d3d9_arbfp::token::words_from_le_bytes;
use aero_d3d9_arbfp::{disassemble, translate, TranslateOptions, TranslateOutcome};
use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ps_dump",
    about = "Disassemble a D3D8/D3D9 pixel shader token stream and show its fragment program."
)]
struct Args {
    /// Raw little-endian shader bytecode (starting at the version token)
    input: PathBuf,

    /// Print the generated fragment program
    #[arg(long, action = clap::ArgAction::SetTrue)]
    arb: bool,

    /// Skip the disassembly listing
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_disasm: bool,

    /// Program text capacity in bytes, including the terminating NUL
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PROGRAM_CAPACITY)]
    capacity: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.capacity < 2 {
        bail!("--capacity must be at least 2 bytes");
    }

    let bytes = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let words = words_from_le_bytes(&bytes)
        .with_context(|| format!("invalid shader bytecode in {}", args.input.display()))?;

    if !args.no_disasm {
        print!("{}", disassemble(&words));
    }

    if args.arb {
        let translation = translate(
            &words,
            &TranslateOptions {
                program_capacity: args.capacity,
            },
        );
        if !args.no_disasm {
            println!();
        }
        print!("{}", translation.text);
        let info = &translation.info;
        eprintln!(
            "{}: {} lines, {} translated, {} unsupported, {} unrecognized, {} rejected",
            info.version,
            info.lines,
            info.translated,
            info.unsupported.len(),
            info.unrecognized,
            info.rejected
        );
        if let TranslateOutcome::Exhausted(err) = translation.outcome {
            bail!("translation incomplete: {err}");
        }
    }

    Ok(())
}
