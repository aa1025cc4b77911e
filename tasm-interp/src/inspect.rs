//! Reading compiled-program state back out of the tape
//!
//! [`TapeInspector`] decodes nums from a tape snapshot. [`Debugger`] runs an
//! interpreter one step at a time, acting on the diagnostic escapes as they
//! appear, and locates the window the program finished in.

use crate::interpreter::{Interpreter, RunReport, Step};
use log::info;
use tasm_common::{CompilerError, CompilerResult, TapeGeometry};

/// Decodes big-endian nums out of a tape
pub struct TapeInspector<'a> {
    geometry: &'a TapeGeometry,
    tape: &'a [u32],
}

impl<'a> TapeInspector<'a> {
    pub fn new(geometry: &'a TapeGeometry, tape: &'a [u32]) -> Self {
        Self { geometry, tape }
    }

    /// Unsigned num starting at `position`; cells past the tape read as 0
    pub fn num_unsigned(&self, position: usize) -> i128 {
        let config = &self.geometry.config;
        (0..config.num_size).fold(0i128, |acc, i| {
            let cell = self.tape.get(position + i).copied().unwrap_or(0);
            acc * config.cell_range as i128 + cell as i128
        })
    }

    pub fn num_signed(&self, position: usize) -> i128 {
        self.geometry.config.to_signed(self.num_unsigned(position))
    }

    /// Signed value of the slot at `offset` in window `window`
    pub fn window_value(&self, window: usize, offset: usize) -> i128 {
        self.num_signed(window * self.geometry.stride + offset)
    }

    /// Heap cell `index`, unsigned
    pub fn memory_value(&self, index: usize) -> i128 {
        self.num_unsigned(index * self.geometry.stride + self.geometry.heap_offset)
    }

    /// Stack cell `index`, unsigned
    pub fn stack_value(&self, index: usize) -> i128 {
        self.num_unsigned(index * self.geometry.stride + self.geometry.stack_offset)
    }
}

/// Interpreter driver that understands `move_vmc`, `mem` and `print` escapes
pub struct Debugger {
    interpreter: Interpreter,
    geometry: TapeGeometry,
    /// Window tracked through `move_vmc` escapes
    window: isize,
    final_cursor: Option<isize>,
    steps: u64,
}

impl Debugger {
    pub fn new(interpreter: Interpreter, geometry: TapeGeometry) -> Self {
        Self {
            interpreter,
            geometry,
            window: 0,
            final_cursor: None,
            steps: 0,
        }
    }

    /// Where the compiler left its mirrored cursor at the end of the program,
    /// relative to the final window
    pub fn with_final_cursor(mut self, cursor: isize) -> Self {
        self.final_cursor = Some(cursor);
        self
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn finished(&self) -> bool {
        self.interpreter.finished()
    }

    pub fn inspector(&self) -> TapeInspector<'_> {
        TapeInspector::new(&self.geometry, self.interpreter.tape())
    }

    /// Run at most `max_steps` primitives, handling escapes as they come
    pub fn run(&mut self, max_steps: u64) -> CompilerResult<RunReport> {
        let mut report = RunReport::default();
        loop {
            if report.steps == max_steps && !self.at_escape() {
                break;
            }
            match self.interpreter.step()? {
                Step::Executed => report.steps += 1,
                Step::Diagnostic(payload) => {
                    self.process_flag(&payload)?;
                    report.diagnostics.push(payload);
                }
                Step::Finished => break,
            }
        }
        self.steps += report.steps;
        Ok(report)
    }

    fn at_escape(&self) -> bool {
        let ip = self.interpreter.instruction_pointer();
        self.interpreter.code().get(ip) == Some(&b'{')
    }

    fn process_flag(&mut self, payload: &str) -> CompilerResult<()> {
        let ip = self.interpreter.instruction_pointer();
        let (directive, rest) = payload.split_once(' ').unwrap_or((payload, ""));
        match directive {
            "move_vmc" => {
                let k: isize = rest.trim().parse().map_err(|_| {
                    CompilerError::structural(format!("bad window shift {rest:?}"), ip)
                })?;
                self.window += k;
                if self.window < 0 {
                    return Err(CompilerError::runtime("window index below zero", ip));
                }
            }
            "mem" => self.log_window(),
            "print" => info!("{rest}"),
            other => {
                return Err(CompilerError::structural(
                    format!("unrecognized diagnostic {other:?}"),
                    ip,
                ))
            }
        }
        Ok(())
    }

    /// Log every slot of the tracked window as a signed value, matching `--dump`
    fn log_window(&self) {
        let Ok(window) = usize::try_from(self.window) else {
            return;
        };
        let inspector = self.inspector();
        info!("data pointer: {}", self.interpreter.data_pointer());
        for slot in &self.geometry.slots {
            info!("{}: {}", slot.name, inspector.window_value(window, slot.offset));
        }
    }

    /// The window the program runs in.
    ///
    /// Once the program has finished and the final cursor is known, the window
    /// is derived from the data pointer. Otherwise it is the one tracked through
    /// `move_vmc` escapes, which needs a program compiled with diagnostics.
    pub fn current_window(&self) -> usize {
        if let (true, Some(cursor)) = (self.finished(), self.final_cursor) {
            let base = self.interpreter.data_pointer() as isize - cursor;
            return base.div_euclid(self.geometry.stride as isize).max(0) as usize;
        }
        self.window.max(0) as usize
    }

    /// Signed value of a named slot in the current window
    pub fn register(&self, name: &str) -> Option<i128> {
        let slot = self.geometry.slot(name)?;
        Some(self.inspector().window_value(self.current_window(), slot.offset))
    }

    /// Signed values of every public slot in the current window
    pub fn public_registers(&self) -> Vec<(String, i128)> {
        let window = self.current_window();
        let inspector = self.inspector();
        self.geometry
            .slots
            .iter()
            .filter(|slot| slot.is_public)
            .map(|slot| (slot.name.clone(), inspector.window_value(window, slot.offset)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tasm_common::{MachineConfig, SlotInfo};

    fn geometry() -> TapeGeometry {
        TapeGeometry {
            config: MachineConfig::new(2, 256, 1, 1).unwrap(),
            stride: 6,
            heap_offset: 0,
            stack_offset: 2,
            slots: vec![
                SlotInfo { name: "heap".to_string(), offset: 0, is_public: false },
                SlotInfo { name: "stack".to_string(), offset: 2, is_public: false },
                SlotInfo { name: "r0".to_string(), offset: 4, is_public: true },
            ],
        }
    }

    #[test]
    fn test_decodes_big_endian() {
        let geometry = geometry();
        let tape = [1, 2, 0, 7, 255, 255, 0, 9];
        let inspector = TapeInspector::new(&geometry, &tape);
        assert_eq!(inspector.num_unsigned(0), 258);
        assert_eq!(inspector.window_value(0, 4), -1);
        assert_eq!(inspector.stack_value(0), 7);
        assert_eq!(inspector.memory_value(1), 9);
        // past the end of the tape
        assert_eq!(inspector.memory_value(5), 0);
    }

    #[test]
    fn test_tracks_windows_from_escapes() {
        let code = ">>>>>>{move_vmc 1}>>>>>+{mem}{print done}";
        let interp = Interpreter::new(code, 256).unwrap();
        let mut debugger = Debugger::new(interp, geometry());
        let report = debugger.run(1_000).unwrap();
        assert_eq!(report.steps, 12);
        assert!(debugger.finished());
        assert_eq!(debugger.current_window(), 1);
        assert_eq!(debugger.register("r0"), Some(1));
        assert_eq!(debugger.public_registers(), vec![("r0".to_string(), 1)]);
    }

    #[test]
    fn test_final_cursor_locates_window() {
        let code = ">>>>>>>>>>>+";
        let interp = Interpreter::new(code, 256).unwrap();
        let mut debugger = Debugger::new(interp, geometry()).with_final_cursor(5);
        debugger.run(1_000).unwrap();
        assert_eq!(debugger.current_window(), 1);
        assert_eq!(debugger.register("r0"), Some(1));
    }

    #[test]
    fn test_unknown_escape_is_structural() {
        let interp = Interpreter::new("+{frobnicate}", 256).unwrap();
        let mut debugger = Debugger::new(interp, geometry());
        assert!(debugger.run(10).unwrap_err().is_structural());
    }
}
