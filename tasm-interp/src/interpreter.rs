//! Step-bounded tape machine

use log::{debug, trace};
use tasm_common::{CompilerError, CompilerResult};

/// The tape grows by this many cells whenever the data pointer walks off its end
pub const TAPE_CHUNK: usize = 10_000;

/// What a single call to [`Interpreter::step`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// One primitive was executed
    Executed,
    /// A `{...}` escape was skipped; carries the payload
    Diagnostic(String),
    /// The instruction pointer is past the end of the program
    Finished,
}

/// Result of a bounded run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Primitives executed; escapes do not count
    pub steps: u64,
    /// Escape payloads met during the run, in order
    pub diagnostics: Vec<String>,
}

pub struct Interpreter {
    code: Vec<u8>,
    /// For `[`, `]` and `{`: the index of the matching bracket or of the closing `}`
    jumps: Vec<usize>,
    ip: usize,
    tape: Vec<u32>,
    ptr: usize,
    cell_range: u32,
    input: Vec<u8>,
    input_ptr: usize,
    output: Vec<u8>,
}

impl Interpreter {
    /// Check the program and build its bracket table
    pub fn new(code: &str, cell_range: u32) -> CompilerResult<Self> {
        if cell_range < 2 {
            return Err(CompilerError::config(format!(
                "cell_range must be at least 2, got {cell_range}"
            )));
        }
        let code = code.as_bytes().to_vec();
        let jumps = Self::map_brackets(&code)?;
        debug!("loaded tape program of {} characters", code.len());
        Ok(Self {
            code,
            jumps,
            ip: 0,
            tape: vec![0; TAPE_CHUNK],
            ptr: 0,
            cell_range,
            input: Vec::new(),
            input_ptr: 0,
            output: Vec::new(),
        })
    }

    fn map_brackets(code: &[u8]) -> CompilerResult<Vec<usize>> {
        let mut jumps = vec![0; code.len()];
        let mut open = Vec::new();
        let mut i = 0;
        while i < code.len() {
            match code[i] {
                b'[' => open.push(i),
                b']' => {
                    let start = open
                        .pop()
                        .ok_or_else(|| CompilerError::structural("unmatched ']'", i))?;
                    jumps[start] = i;
                    jumps[i] = start;
                }
                b'{' => {
                    let end = code[i..]
                        .iter()
                        .position(|&c| c == b'}')
                        .map(|len| i + len)
                        .ok_or_else(|| CompilerError::structural("unterminated '{'", i))?;
                    jumps[i] = end;
                    i = end;
                }
                b'+' | b'-' | b'<' | b'>' | b',' | b'.' => {}
                other => {
                    return Err(CompilerError::structural(
                        format!("unrecognized symbol {:?}", other as char),
                        i,
                    ))
                }
            }
            i += 1;
        }
        match open.pop() {
            Some(start) => Err(CompilerError::structural("unmatched '['", start)),
            None => Ok(jumps),
        }
    }

    pub fn set_input(&mut self, input: Vec<u8>) {
        self.input = input;
        self.input_ptr = 0;
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn tape(&self) -> &[u32] {
        &self.tape
    }

    pub fn data_pointer(&self) -> usize {
        self.ptr
    }

    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    pub fn finished(&self) -> bool {
        self.ip >= self.code.len()
    }

    /// Execute one primitive, or skip one escape
    pub fn step(&mut self) -> CompilerResult<Step> {
        let Some(&op) = self.code.get(self.ip) else {
            return Ok(Step::Finished);
        };
        match op {
            b'{' => {
                let end = self.jumps[self.ip];
                let payload = String::from_utf8_lossy(&self.code[self.ip + 1..end]).into_owned();
                trace!("escape at {}: {payload}", self.ip);
                self.ip = end + 1;
                return Ok(Step::Diagnostic(payload));
            }
            b'+' => {
                let cell = &mut self.tape[self.ptr];
                *cell = if *cell + 1 == self.cell_range { 0 } else { *cell + 1 };
            }
            b'-' => {
                let cell = &mut self.tape[self.ptr];
                *cell = if *cell == 0 { self.cell_range - 1 } else { *cell - 1 };
            }
            b'>' => {
                self.ptr += 1;
                if self.ptr == self.tape.len() {
                    self.tape.resize(self.tape.len() + TAPE_CHUNK, 0);
                }
            }
            b'<' => {
                if self.ptr == 0 {
                    return Err(CompilerError::runtime("negative data pointer", self.ip));
                }
                self.ptr -= 1;
            }
            b',' => {
                let byte = self.input.get(self.input_ptr).copied().unwrap_or(0);
                if self.input_ptr < self.input.len() {
                    self.input_ptr += 1;
                }
                self.tape[self.ptr] = byte as u32 % self.cell_range;
            }
            b'.' => {
                self.output.push((self.tape[self.ptr] & 0xFF) as u8);
            }
            b'[' => {
                if self.tape[self.ptr] == 0 {
                    self.ip = self.jumps[self.ip];
                }
            }
            b']' => {
                if self.tape[self.ptr] != 0 {
                    self.ip = self.jumps[self.ip];
                }
            }
            _ => {
                return Err(CompilerError::internal(format!(
                    "unchecked symbol {:?} at {}",
                    op as char, self.ip
                )))
            }
        }
        self.ip += 1;
        Ok(Step::Executed)
    }

    /// Execute at most `max_steps` primitives. Running out of steps is not an
    /// error; call `run` again to resume.
    pub fn run(&mut self, max_steps: u64) -> CompilerResult<RunReport> {
        let mut report = RunReport::default();
        while report.steps < max_steps {
            match self.step()? {
                Step::Executed => report.steps += 1,
                Step::Diagnostic(payload) => report.diagnostics.push(payload),
                Step::Finished => break,
            }
        }
        // escapes right before the end do not need a step of their own
        while !self.finished() && self.code[self.ip] == b'{' {
            if let Step::Diagnostic(payload) = self.step()? {
                report.diagnostics.push(payload);
            }
        }
        debug!("ran {} steps, finished: {}", report.steps, self.finished());
        Ok(report)
    }
}
