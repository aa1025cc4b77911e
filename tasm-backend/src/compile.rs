//! Whole-program compilation

use crate::lower::lower_instruction;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use tasm_codegen::Emitter;
use tasm_common::{CompilerError, CompilerResult, TapeGeometry};
use tasm_frontend::{parse_program, Program};

/// Size figures of one compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    pub instructions: usize,
    pub basic_blocks: usize,
    /// Length of the generated program in characters
    pub code_length: usize,
    pub window_stride: usize,
    /// Most temporaries booked at once
    pub temp_high_water: usize,
    /// Generated characters per opcode
    pub code_by_opcode: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub code: String,
    pub geometry: TapeGeometry,
    /// The emitter's cursor after the last character, relative to the final window
    pub final_cursor: isize,
    pub block_count: usize,
    pub stats: CompileStats,
}

/// Parse and compile assembly source
pub fn compile(source: &str, filename: &str) -> CompilerResult<CompiledProgram> {
    let program = parse_program(source, filename)?;
    compile_program(&program)
}

pub fn compile_program(program: &Program) -> CompilerResult<CompiledProgram> {
    let mut e = Emitter::new(program.layout.clone());
    let mut stats = CompileStats {
        instructions: program.instructions.len(),
        basic_blocks: program.block_count,
        window_stride: program.layout.stride() as usize,
        ..CompileStats::default()
    };

    if let Some(last) = program.instructions.last() {
        e.opening_code();
        let mut open_block = None;
        for insn in &program.instructions {
            if open_block != Some(insn.block) {
                e.basic_block_start();
                open_block = Some(insn.block);
            }
            let before = e.code().len();
            e.debug_print(&insn.text);
            lower_instruction(&mut e, program, insn)?;
            // code after a block ender sits outside the block and runs on every dispatch pass
            if !insn.ends_basic_block() {
                e.debug_mem();
            }
            if e.temps_booked() != 0 {
                return Err(CompilerError::internal(format!(
                    "{}: '{insn}' left {} temporaries booked",
                    insn.location,
                    e.temps_booked()
                )));
            }
            *stats.code_by_opcode.entry(insn.opcode.to_string()).or_default() += e.code().len() - before;
            debug!("'{insn}' lowered to {} characters", e.code().len() - before);
        }
        if !last.ends_basic_block() {
            e.goto_block(1);
        }
        e.closing_code();
    }

    stats.temp_high_water = e.temps_high_water();
    stats.code_length = e.code().len();
    let final_cursor = e.cursor();
    let code = e.into_code();
    info!(
        "compiled {} instructions in {} blocks to {} characters",
        stats.instructions, stats.basic_blocks, stats.code_length
    );
    Ok(CompiledProgram {
        code,
        geometry: program.layout.geometry(),
        final_cursor,
        block_count: program.block_count,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_program_compiles_to_nothing() {
        let compiled = compile("# header only\n4 256 14 5\n", "empty.tasm").unwrap();
        assert_eq!(compiled.code, "");
        assert_eq!(compiled.final_cursor, 0);
        assert_eq!(compiled.stats.instructions, 0);
    }

    #[test]
    fn test_only_primitives_without_diagnostics() {
        let compiled = compile("2 256 4 2\nmov r0 5\nadd r1 r0 r0\nlabel x\njnz r1 x\n", "t").unwrap();
        assert!(compiled.code.chars().all(|c| "+-<>,.[]".contains(c)));
        let opens = compiled.code.matches('[').count();
        assert_eq!(opens, compiled.code.matches(']').count());
        assert_eq!(compiled.stats.code_length, compiled.code.len());
        let total: usize = compiled.stats.code_by_opcode.values().sum();
        assert!(total < compiled.code.len());
        assert!(compiled.stats.temp_high_water >= 2);
    }

    #[test]
    fn test_diagnostics_print_each_instruction() {
        let compiled = compile("2 256 4 2 True\nmov r0   5\nneg r0\n", "t").unwrap();
        assert!(compiled.code.contains("{print mov r0 5}"));
        assert!(compiled.code.contains("{print neg r0}"));
        assert_eq!(compiled.code.matches("{mem}").count(), 2);
    }

    #[test]
    fn test_window_dumps_skip_block_enders() {
        let compiled = compile("2 256 4 2 True
mov r0 1
label a
jnz r0 a
", "t").unwrap();
        assert_eq!(compiled.code.matches("{print ").count(), 3);
        assert_eq!(compiled.code.matches("{mem}").count(), 1);
        let plain = compile("2 256 4 2
mov r0 1
", "t").unwrap();
        assert!(!plain.code.contains('{'));
    }

    #[test]
    fn test_negative_immediate_address_is_rejected() {
        let err = compile("2 256 4 2\nstore -1 5\n", "t").unwrap_err();
        assert!(matches!(err, CompilerError::Semantic { .. }), "{err}");
    }

    #[test]
    fn test_stats_serialize() {
        let compiled = compile("2 256 4 2\nmov r0 1\n", "t").unwrap();
        let json = serde_json::to_value(&compiled.stats).unwrap();
        assert_eq!(json["instructions"], 1);
        assert_eq!(json["basic_blocks"], 1);
        assert!(json["code_by_opcode"]["mov"].as_u64().unwrap() > 0);
    }
}
