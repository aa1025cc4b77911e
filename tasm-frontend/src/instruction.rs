//! A checked assembly instruction

use crate::opcode::{Opcode, OperandClass};
use crate::operand::{is_identifier, Operand, OperandKind};
use std::fmt;
use tasm_codegen::Layout;
use tasm_common::{CompilerError, CompilerResult, SourceLocation};

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// Index of the basic block the instruction belongs to
    pub block: usize,
    pub location: SourceLocation,
    /// The instruction as written, whitespace-normalized
    pub text: String,
}

impl Instruction {
    /// Parse one comment-free, non-empty line
    pub fn parse(line: &str, layout: &Layout, block: usize, location: SourceLocation) -> CompilerResult<Self> {
        let mut tokens = line.split_whitespace();
        let mnemonic = tokens
            .next()
            .ok_or_else(|| CompilerError::semantic("empty instruction", location.clone()))?;
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| CompilerError::semantic(format!("unknown opcode '{mnemonic}'"), location.clone()))?;
        let operands: Vec<Operand> = tokens.map(|token| Operand::resolve(token, layout)).collect();

        let signature = opcode.signature();
        if operands.len() != signature.len() {
            return Err(CompilerError::semantic(
                format!(
                    "'{opcode}' takes {} operand(s), got {}",
                    signature.len(),
                    operands.len()
                ),
                location,
            ));
        }
        for (position, (operand, class)) in operands.iter().zip(signature).enumerate() {
            check_operand(opcode, position, operand, *class, &location)?;
        }

        Ok(Self {
            opcode,
            operands,
            block,
            location,
            text: line.split_whitespace().collect::<Vec<_>>().join(" "),
        })
    }

    pub fn ends_basic_block(&self) -> bool {
        self.opcode.ends_basic_block()
    }

    /// Register offset at `index`
    pub fn register(&self, index: usize) -> CompilerResult<isize> {
        match self.operands.get(index) {
            Some(Operand::Register(offset)) => Ok(*offset),
            _ => Err(self.operand_mismatch(index, OperandKind::Register)),
        }
    }

    /// Label name at `index`
    pub fn label(&self, index: usize) -> CompilerResult<&str> {
        match self.operands.get(index) {
            Some(Operand::Label(name)) => Ok(name),
            _ => Err(self.operand_mismatch(index, OperandKind::Label)),
        }
    }

    /// Register-or-immediate operand at `index`
    pub fn value(&self, index: usize) -> CompilerResult<&Operand> {
        match self.operands.get(index) {
            Some(operand @ (Operand::Register(_) | Operand::Immediate(_))) => Ok(operand),
            _ => Err(self.operand_mismatch(index, OperandKind::Immediate)),
        }
    }

    fn operand_mismatch(&self, index: usize, expected: OperandKind) -> CompilerError {
        CompilerError::internal(format!(
            "{}: operand {index} of '{}' is not a {expected}",
            self.location, self.text
        ))
    }
}

fn check_operand(
    opcode: Opcode,
    position: usize,
    operand: &Operand,
    class: OperandClass,
    location: &SourceLocation,
) -> CompilerResult<()> {
    let accepted = match (class, operand) {
        (OperandClass::Register, Operand::Register(_)) => true,
        (OperandClass::Value, Operand::Register(_) | Operand::Immediate(_)) => true,
        (OperandClass::Label, Operand::Label(name)) => is_identifier(name),
        _ => false,
    };
    if accepted {
        return Ok(());
    }
    let expected = match class {
        OperandClass::Register => "a register",
        OperandClass::Value => "a register or an immediate",
        OperandClass::Label => "a label name",
    };
    let found = match operand {
        Operand::Label(name) => format!("'{name}'"),
        other => other.kind().to_string(),
    };
    Err(CompilerError::semantic(
        format!("operand {} of '{opcode}' must be {expected}, found {found}", position + 1),
        location.clone(),
    ))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
