//! Source reader
//!
//! A source file is a machine header line followed by one instruction per
//! line. `#` starts a comment that runs to the end of the line.

use crate::instruction::Instruction;
use crate::opcode::Opcode;
use log::debug;
use std::collections::BTreeMap;
use tasm_codegen::Layout;
use tasm_common::{CompilerError, CompilerResult, MachineConfig, SourceLocation};

/// Block every program starts in
pub const START_LABEL: &str = "start";
/// Virtual block one past the last real one; reaching it ends the program
pub const EXIT_LABEL: &str = "exit";

/// A parsed program with its basic-block structure
#[derive(Debug, Clone)]
pub struct Program {
    pub config: MachineConfig,
    pub layout: Layout,
    pub instructions: Vec<Instruction>,
    /// Label name to the block it starts
    pub labels: BTreeMap<String, usize>,
    pub block_count: usize,
}

impl Program {
    pub fn label_block(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Index of the virtual exit block
    pub fn exit_block(&self) -> usize {
        self.block_count
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Parse `num_size cell_range temp_count register_count [True|False]`
pub fn parse_header(line: &str, location: &SourceLocation) -> CompilerResult<MachineConfig> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if !(4..=5).contains(&tokens.len()) {
        return Err(CompilerError::semantic(
            format!("machine header needs 4 numbers and an optional True/False, got '{line}'"),
            location.clone(),
        ));
    }
    let number = |index: usize| -> CompilerResult<u64> {
        tokens[index].parse().map_err(|_| {
            CompilerError::semantic(
                format!("machine header field {} is not a number: '{}'", index + 1, tokens[index]),
                location.clone(),
            )
        })
    };
    let too_large = |what: &str| CompilerError::semantic(format!("{what} is too large"), location.clone());
    let num_size = usize::try_from(number(0)?).map_err(|_| too_large("num_size"))?;
    let cell_range = u32::try_from(number(1)?).map_err(|_| too_large("cell_range"))?;
    let temp_count = usize::try_from(number(2)?).map_err(|_| too_large("temp_count"))?;
    let register_count = usize::try_from(number(3)?).map_err(|_| too_large("register_count"))?;
    let diagnostics = match tokens.get(4) {
        None | Some(&"False") => false,
        Some(&"True") => true,
        Some(other) => {
            return Err(CompilerError::semantic(
                format!("diagnostics flag must be True or False, got '{other}'"),
                location.clone(),
            ))
        }
    };
    let config = MachineConfig::new(num_size, cell_range, temp_count, register_count)?;
    Ok(config.with_diagnostics(diagnostics))
}

/// Parse a whole source file
pub fn parse_program(source: &str, filename: &str) -> CompilerResult<Program> {
    let mut lines = source.lines().enumerate().filter_map(|(index, raw)| {
        let code = raw.split_once('#').map_or(raw, |(code, _)| code);
        let column = code.len() - code.trim_start().len() + 1;
        let code = code.trim();
        (!code.is_empty()).then(|| (code, SourceLocation::new(filename, index as u32 + 1, column as u32)))
    });

    let (header, header_location) = lines.next().ok_or_else(|| {
        CompilerError::semantic("missing machine header", SourceLocation::new(filename, 1, 1))
    })?;
    let config = parse_header(header, &header_location)?;
    let layout = Layout::new(config);

    let mut labels = BTreeMap::new();
    labels.insert(START_LABEL.to_string(), 0);
    let mut instructions = Vec::new();
    let mut block = 0;
    for (line, location) in lines {
        let instruction = Instruction::parse(line, &layout, block, location)?;
        if instruction.opcode == Opcode::Label {
            let name = instruction.label(0)?;
            if name == EXIT_LABEL || labels.contains_key(name) {
                return Err(CompilerError::semantic(
                    format!("label '{name}' is already defined"),
                    instruction.location.clone(),
                ));
            }
            labels.insert(name.to_string(), block + 1);
        }
        if instruction.ends_basic_block() {
            block += 1;
        }
        instructions.push(instruction);
    }

    let block_count = match instructions.last() {
        Some(last) if !last.ends_basic_block() => block + 1,
        _ => block,
    };
    labels.insert(EXIT_LABEL.to_string(), block_count);

    // the longest jump, a backward one from the last block, covers block_count + 1
    if block_count as i128 + 1 >= config.num_range() {
        return Err(CompilerError::semantic(
            format!(
                "{block_count} basic blocks do not fit a jump distance into a num of range {}",
                config.num_range()
            ),
            header_location,
        ));
    }

    for instruction in &instructions {
        if matches!(instruction.opcode, Opcode::Jmp | Opcode::Jnz | Opcode::Call) {
            let name = instruction.label(instruction.operands.len() - 1)?;
            if !labels.contains_key(name) {
                return Err(CompilerError::semantic(
                    format!("undefined label '{name}'"),
                    instruction.location.clone(),
                ));
            }
        }
    }

    debug!(
        "parsed {} instructions in {} blocks, {} labels",
        instructions.len(),
        block_count,
        labels.len()
    );
    Ok(Program {
        config,
        layout,
        instructions,
        labels,
        block_count,
    })
}
