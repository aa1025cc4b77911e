//! Tape Assembler - Frontend
//!
//! This crate turns assembly source into a checked [`Program`]:
//! - Operand classification against the register layout
//! - Opcode table with operand signatures
//! - Source reader with basic-block numbering and the label table

pub mod instruction;
pub mod opcode;
pub mod operand;
pub mod parser;

pub use instruction::Instruction;
pub use opcode::{Opcode, OperandClass};
pub use operand::{is_identifier, Operand, OperandKind};
pub use parser::{parse_header, parse_program, Program, EXIT_LABEL, START_LABEL};
