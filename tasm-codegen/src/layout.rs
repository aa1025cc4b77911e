//! Window layout
//!
//! A window (VMC) is a fixed-width record of named slots repeated along the
//! tape. Seven slots are bookkeeping for the machine itself; the rest are the
//! public registers `r0..` and the private temporaries `t0..`.

use tasm_common::{MachineConfig, SlotInfo, TapeGeometry};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Register not found: {0}")]
    RegisterNotFound(String),

    #[error("Register is not public: {0}")]
    RegisterNotPublic(String),
}

pub const HEAP_VALUE: &str = "r_heap_value";
pub const STACK_VALUE: &str = "r_stack_value";
pub const CELL_INDEX: &str = "r_cell_index";
pub const TARGET_CELL: &str = "r_target_cell";
pub const CUR_CMD: &str = "r_cur_cmd";
pub const STACK_POINTER: &str = "r_stack_pointer";
pub const FLOW_RESERVED: &str = "r_flow_reserved";

/// One named slot of the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    /// Copied to the neighbouring window whenever the window moves
    pub is_preserved: bool,
    /// Reachable from assembly operands
    pub is_public: bool,
    /// Width in cells
    pub size: usize,
}

impl Slot {
    pub fn new(name: impl Into<String>, is_preserved: bool, is_public: bool, size: usize) -> Self {
        Self {
            name: name.into(),
            is_preserved,
            is_public,
            size,
        }
    }
}

/// The slot list of a window, plus cached offsets of the well-known slots
#[derive(Debug, Clone)]
pub struct Layout {
    config: MachineConfig,
    slots: Vec<Slot>,
    heap_value: isize,
    stack_value: isize,
    cell_index: isize,
    target_cell: isize,
    cur_cmd: isize,
    stack_pointer: isize,
    flow_reserved: isize,
    registers: Vec<isize>,
    temps: Vec<isize>,
}

impl Layout {
    pub fn new(config: MachineConfig) -> Self {
        let width = config.num_size;
        let mut slots = vec![
            Slot::new(HEAP_VALUE, false, false, width),
            Slot::new(STACK_VALUE, false, false, width),
            Slot::new(CELL_INDEX, false, false, width),
            Slot::new(TARGET_CELL, true, false, width),
            Slot::new(CUR_CMD, false, false, width),
            Slot::new(STACK_POINTER, true, false, width),
            Slot::new(FLOW_RESERVED, false, false, width),
        ];
        slots.extend((0..config.register_count).map(|i| Slot::new(format!("r{i}"), true, true, width)));
        slots.extend((0..config.temp_count).map(|i| Slot::new(format!("t{i}"), false, false, width)));

        let offset = |name: &str| -> isize {
            let mut total = 0;
            for slot in &slots {
                if slot.name == name {
                    break;
                }
                total += slot.size;
            }
            total as isize
        };

        Self {
            heap_value: offset(HEAP_VALUE),
            stack_value: offset(STACK_VALUE),
            cell_index: offset(CELL_INDEX),
            target_cell: offset(TARGET_CELL),
            cur_cmd: offset(CUR_CMD),
            stack_pointer: offset(STACK_POINTER),
            flow_reserved: offset(FLOW_RESERVED),
            registers: (0..config.register_count).map(|i| offset(&format!("r{i}"))).collect(),
            temps: (0..config.temp_count).map(|i| offset(&format!("t{i}"))).collect(),
            config,
            slots,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn num_size(&self) -> usize {
        self.config.num_size
    }

    /// Offset of the named slot inside the window.
    ///
    /// With `public_only`, private slots are refused with
    /// [`LayoutError::RegisterNotPublic`].
    pub fn offset_of(&self, name: &str, public_only: bool) -> Result<isize, LayoutError> {
        let mut total = 0;
        for slot in &self.slots {
            if slot.name == name {
                if public_only && !slot.is_public {
                    return Err(LayoutError::RegisterNotPublic(name.to_string()));
                }
                return Ok(total as isize);
            }
            total += slot.size;
        }
        Err(LayoutError::RegisterNotFound(name.to_string()))
    }

    /// Total width of a window, the stride between consecutive windows
    pub fn stride(&self) -> isize {
        self.slots.iter().map(|slot| slot.size).sum::<usize>() as isize
    }

    /// Offsets of every slot that travels with the window
    pub fn preserved_offsets(&self) -> Vec<isize> {
        let mut offsets = Vec::new();
        let mut total = 0;
        for slot in &self.slots {
            if slot.is_preserved {
                offsets.push(total as isize);
            }
            total += slot.size;
        }
        offsets
    }

    pub fn heap_value(&self) -> isize {
        self.heap_value
    }

    pub fn stack_value(&self) -> isize {
        self.stack_value
    }

    pub fn cell_index(&self) -> isize {
        self.cell_index
    }

    pub fn target_cell(&self) -> isize {
        self.target_cell
    }

    pub fn cur_cmd(&self) -> isize {
        self.cur_cmd
    }

    pub fn stack_pointer(&self) -> isize {
        self.stack_pointer
    }

    pub fn flow_reserved(&self) -> isize {
        self.flow_reserved
    }

    /// Offset of public register `r{index}`
    pub fn register(&self, index: usize) -> isize {
        self.registers[index]
    }

    pub fn register_offsets(&self) -> &[isize] {
        &self.registers
    }

    pub fn temp_offsets(&self) -> &[isize] {
        &self.temps
    }

    /// Offset of the boolean byte (least significant cell) of a num slot
    pub fn bool_byte(&self, num_offset: isize) -> isize {
        num_offset + self.config.num_size as isize - 1
    }

    /// Description of the window used by tape inspection
    pub fn geometry(&self) -> TapeGeometry {
        let mut total = 0;
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                let info = SlotInfo {
                    name: slot.name.clone(),
                    offset: total,
                    is_public: slot.is_public,
                };
                total += slot.size;
                info
            })
            .collect();
        TapeGeometry {
            config: self.config,
            stride: self.stride() as usize,
            heap_offset: self.heap_value as usize,
            stack_offset: self.stack_value as usize,
            slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layout() -> Layout {
        Layout::new(MachineConfig::new(4, 256, 14, 5).unwrap())
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let layout = layout();
        assert_eq!(layout.heap_value(), 0);
        assert_eq!(layout.stack_value(), 4);
        assert_eq!(layout.flow_reserved(), 24);
        assert_eq!(layout.register(0), 28);
        assert_eq!(layout.register(4), 44);
        assert_eq!(layout.temp_offsets()[0], 48);
        assert_eq!(layout.stride(), 4 * (7 + 5 + 14));
    }

    #[test]
    fn test_public_lookup() {
        let layout = layout();
        assert_eq!(layout.offset_of("r2", true), Ok(36));
        assert_eq!(
            layout.offset_of("r_heap_value", true),
            Err(LayoutError::RegisterNotPublic("r_heap_value".to_string()))
        );
        assert_eq!(layout.offset_of("r_heap_value", false), Ok(0));
        assert_eq!(
            layout.offset_of("r5", true),
            Err(LayoutError::RegisterNotFound("r5".to_string()))
        );
    }

    #[test]
    fn test_preserved_offsets() {
        let layout = layout();
        let mut expected = vec![layout.target_cell(), layout.stack_pointer()];
        expected.extend_from_slice(layout.register_offsets());
        assert_eq!(layout.preserved_offsets(), expected);
    }

    #[test]
    fn test_geometry() {
        let layout = layout();
        let geometry = layout.geometry();
        assert_eq!(geometry.stride, 104);
        assert_eq!(geometry.slot("r1").map(|s| s.offset), Some(32));
        assert!(geometry.slot("r1").unwrap().is_public);
        assert!(!geometry.slot("t0").unwrap().is_public);
    }
}
