//! Machine configuration shared by the compiler and the interpreter

use crate::error::{CompilerError, CompilerResult};
use serde::{Deserialize, Serialize};

/// Shape of the emulated machine, as declared by the source header line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Cells per number
    pub num_size: usize,
    /// One plus the largest value a cell can hold, i.e. 256
    pub cell_range: u32,
    /// Scratch slots per window
    pub temp_count: usize,
    /// Public registers `r0..`
    pub register_count: usize,
    /// Emit `{...}` diagnostic escapes into the generated program
    #[serde(default)]
    pub diagnostics: bool,
}

impl MachineConfig {
    pub fn new(num_size: usize, cell_range: u32, temp_count: usize, register_count: usize) -> CompilerResult<Self> {
        let config = Self {
            num_size,
            cell_range,
            temp_count,
            register_count,
            diagnostics: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn validate(&self) -> CompilerResult<()> {
        if self.num_size == 0 {
            return Err(CompilerError::config("num_size must be at least 1"));
        }
        if self.cell_range < 2 {
            return Err(CompilerError::config(format!(
                "cell_range must be at least 2, got {}",
                self.cell_range
            )));
        }
        if self.temp_count == 0 {
            return Err(CompilerError::config("temp_count must be at least 1"));
        }
        match u32::try_from(self.num_size)
            .ok()
            .and_then(|n| (self.cell_range as u128).checked_pow(n))
        {
            Some(range) if range <= 1u128 << 64 => Ok(()),
            _ => Err(CompilerError::config(format!(
                "{}^{} does not fit in 64 bits",
                self.cell_range, self.num_size
            ))),
        }
    }

    /// Number of distinct values a num can hold (`cell_range ^ num_size`)
    pub fn num_range(&self) -> i128 {
        (self.cell_range as i128).pow(self.num_size as u32)
    }

    /// Reduce `value` into the unsigned representation of a num
    pub fn wrap(&self, value: i128) -> i128 {
        value.rem_euclid(self.num_range())
    }

    /// Reinterpret an unsigned num as a two's-complement signed value
    pub fn to_signed(&self, unsigned: i128) -> i128 {
        let range = self.num_range();
        if unsigned >= range / 2 {
            unsigned - range
        } else {
            unsigned
        }
    }

    /// Big-endian cell digits of `value`, most significant first
    pub fn digits(&self, value: i128) -> Vec<u32> {
        let radix = self.cell_range as i128;
        let mut remaining = self.wrap(value);
        let mut digits = vec![0u32; self.num_size];
        for digit in digits.iter_mut().rev() {
            *digit = (remaining % radix) as u32;
            remaining /= radix;
        }
        digits
    }
}

/// A named slot of the window, as seen by tape inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub name: String,
    pub offset: usize,
    pub is_public: bool,
}

/// Everything needed to decode a tape produced by the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeGeometry {
    pub config: MachineConfig,
    /// Width of one window in cells
    pub stride: usize,
    /// Offset of the heap-value slot inside a window
    pub heap_offset: usize,
    /// Offset of the stack-value slot inside a window
    pub stack_offset: usize,
    pub slots: Vec<SlotInfo>,
}

impl TapeGeometry {
    pub fn slot(&self, name: &str) -> Option<&SlotInfo> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_digits_big_endian() {
        let config = MachineConfig::new(4, 256, 14, 5).unwrap();
        assert_eq!(config.digits(0x01020304), vec![1, 2, 3, 4]);
        assert_eq!(config.digits(-1), vec![255, 255, 255, 255]);
        assert_eq!(config.digits(256), vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_signed_reinterpretation() {
        let config = MachineConfig::new(2, 256, 4, 2).unwrap();
        assert_eq!(config.num_range(), 65536);
        assert_eq!(config.to_signed(65535), -1);
        assert_eq!(config.to_signed(32767), 32767);
        assert_eq!(config.to_signed(32768), -32768);
        assert_eq!(config.wrap(-2), 65534);
    }

    #[test]
    fn test_validation() {
        assert!(MachineConfig::new(0, 256, 4, 2).is_err());
        assert!(MachineConfig::new(4, 1, 4, 2).is_err());
        assert!(MachineConfig::new(4, 256, 0, 2).is_err());
        assert!(MachineConfig::new(9, 256, 4, 2).is_err());
        assert!(MachineConfig::new(8, 256, 4, 2).is_ok());
        assert!(MachineConfig::new(3, 10, 1, 0).is_ok());
    }
}
