//! Tape Assembler - Code Generation
//!
//! This crate knows how the emulated register machine is laid out on the
//! tape and how to express its operations as tape code:
//!
//! - Window layout (slot offsets, preserved slots, stride)
//! - Temporary slot booking
//! - Byte, num, boolean, memory and dispatch code emission

pub mod emitter;
pub mod layout;
pub mod temps;

pub use emitter::{block_distance, Emitter, Source};
pub use layout::{Layout, LayoutError, Slot};
pub use temps::{Temp, TempPool};
