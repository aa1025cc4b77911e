//! Tape Assembler - Tape Machine Interpreter
//!
//! Runs programs over the eight tape primitives with a step budget, and
//! reads the emulated machine's registers and memory back out of the tape.

pub mod inspect;
pub mod interpreter;

pub use inspect::{Debugger, TapeInspector};
pub use interpreter::{Interpreter, RunReport, Step, TAPE_CHUNK};
