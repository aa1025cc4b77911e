//! Tape Assembler - Common Types and Utilities
//! 
//! This crate contains the error taxonomy, source locations and the machine
//! configuration shared by every stage of the tape assembler.

pub mod config;
pub mod error;
pub mod source_loc;

pub use config::{MachineConfig, SlotInfo, TapeGeometry};
pub use error::{CompilerError, CompilerResult};
pub use source_loc::SourceLocation;
