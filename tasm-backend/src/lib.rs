//! Tape Assembler - Backend
//!
//! Lowers a parsed [`tasm_frontend::Program`] into a tape program. The
//! program is one dispatch loop: every pass counts a command counter down
//! once per basic block and runs the block where it reaches zero.

pub mod compile;
pub mod lower;

pub use compile::{compile, compile_program, CompileStats, CompiledProgram};
pub use lower::lower_instruction;
