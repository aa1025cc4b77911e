//! Tape Assembler Driver
//!
//! `tasm compile` turns assembly into a tape program; `tasm run` compiles
//! and executes it, or executes a ready-made tape program.

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tasm_backend::compile;
use tasm_common::{CompilerError, CompilerResult};
use tasm_interp::{Debugger, Interpreter};

#[derive(Parser)]
#[command(name = "tasm")]
#[command(about = "Register assembly to tape machine compiler")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an assembly file into a tape program
    Compile {
        /// Input assembly file
        input: PathBuf,

        /// Output file (defaults to the input with a .bf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print compilation statistics as JSON
        #[arg(long)]
        stats: bool,
    },

    /// Run an assembly file, or a tape program ending in .bf
    Run {
        input: PathBuf,

        /// Step budget; the run stops early when it is used up
        #[arg(long, default_value_t = 1_000_000_000)]
        max_steps: u64,

        /// Text fed to the program's input
        #[arg(long = "input", default_value = "")]
        input_text: String,

        /// Print the public registers of the final window
        #[arg(long)]
        dump: bool,

        /// Cell range for .bf programs
        #[arg(long, default_value_t = 256)]
        cell_range: u32,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, output, stats } => compile_file(&input, output.as_deref(), stats),
        Commands::Run {
            input,
            max_steps,
            input_text,
            dump,
            cell_range,
        } => run_file(&input, max_steps, input_text.as_bytes(), dump, cell_range),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn compile_file(input: &Path, output: Option<&Path>, stats: bool) -> CompilerResult<()> {
    let source = fs::read_to_string(input)?;
    let compiled = compile(&source, &input.display().to_string())?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("bf"));
    fs::write(&output, &compiled.code)?;
    info!("tape program written to {}", output.display());

    if stats {
        let json = serde_json::to_string_pretty(&compiled.stats)
            .map_err(|e| CompilerError::internal(format!("cannot serialize statistics: {e}")))?;
        println!("{json}");
    }
    Ok(())
}

fn run_file(input: &Path, max_steps: u64, input_text: &[u8], dump: bool, cell_range: u32) -> CompilerResult<()> {
    let source = fs::read_to_string(input)?;
    let is_tape_program = input.extension().is_some_and(|ext| ext == "bf");

    let finished = if is_tape_program {
        let mut interp = Interpreter::new(&strip_comments(&source), cell_range)?;
        interp.set_input(input_text.to_vec());
        let report = interp.run(max_steps)?;
        info!("{} steps", report.steps);
        write_output(interp.output())?;
        if dump {
            warn!("--dump needs the machine layout and is ignored for tape programs");
        }
        interp.finished()
    } else {
        let compiled = compile(&source, &input.display().to_string())?;
        let mut interp = Interpreter::new(&compiled.code, compiled.geometry.config.cell_range)?;
        interp.set_input(input_text.to_vec());
        let mut debugger = Debugger::new(interp, compiled.geometry).with_final_cursor(compiled.final_cursor);
        let report = debugger.run(max_steps)?;
        info!("{} steps", report.steps);
        write_output(debugger.interpreter().output())?;
        if dump && debugger.finished() {
            for (name, value) in debugger.public_registers() {
                eprintln!("{name}: {value}");
            }
        }
        debugger.finished()
    };

    if !finished {
        warn!("step budget of {max_steps} used up before the program finished");
    }
    Ok(())
}

fn write_output(bytes: &[u8]) -> CompilerResult<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}

/// Drop everything but the eight primitives, keeping `{...}` escapes intact
fn strip_comments(source: &str) -> String {
    let mut code = String::with_capacity(source.len());
    let mut in_escape = false;
    for c in source.chars() {
        match c {
            '{' => {
                in_escape = true;
                code.push(c);
            }
            '}' if in_escape => {
                in_escape = false;
                code.push(c);
            }
            _ if in_escape => code.push(c),
            '+' | '-' | '<' | '>' | ',' | '.' | '[' | ']' => code.push(c),
            _ => {}
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("add two: ++ [ -> + < ]\n"), "++[->+<]");
        assert_eq!(strip_comments("+{print a b}x-"), "+{print a b}-");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "tasm", "run", "prog.tasm", "--max-steps", "10", "--dump", "--input", "hi",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { input, max_steps, dump, input_text, .. } => {
                assert_eq!(input, PathBuf::from("prog.tasm"));
                assert_eq!(max_steps, 10);
                assert_eq!(input_text, "hi");
                assert!(dump);
            }
            Commands::Compile { .. } => panic!("parsed the wrong subcommand"),
        }
    }
}
