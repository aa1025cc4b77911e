//! Tape code emission
//!
//! The [`Emitter`] is the machine description: it knows the window layout
//! and turns byte, num, boolean, memory and dispatch operations into runs of
//! the eight tape primitives.
//!
//! It mirrors the position of the interpreter's data pointer in `cursor`,
//! relative to the base of the window the program currently runs in. Window
//! moves rebase the cursor instead of emitting moves, and every loop closes
//! at the offset it opened at, so the mirror stays exact no matter how many
//! times a loop body runs.
//!
//! One emitter belongs to one compilation. It shares its [`TempPool`] with
//! the [`Temp`] guards it hands out through an `Rc`, which also keeps it on
//! a single thread.

use crate::layout::Layout;
use crate::temps::{Temp, TempPool};
use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

/// A value operand of a memory operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A preserved slot of the current window
    Register(isize),
    Immediate(i64),
}

/// Distance the command counter must be set to in order to run `target`
/// after `current`.
///
/// Forward targets are reached directly. Everything else goes through the
/// virtual `exit` block one past the last real block, where the dispatcher
/// wraps around to block 0.
pub fn block_distance(current: usize, target: usize, exit: usize) -> i128 {
    if target > current {
        (target - current) as i128
    } else {
        (exit - current + target + 1) as i128
    }
}

pub struct Emitter {
    layout: Layout,
    temps: Rc<RefCell<TempPool>>,
    cursor: isize,
    code: String,
}

impl Emitter {
    pub fn new(layout: Layout) -> Self {
        let temps = TempPool::new(layout.stride(), layout.temp_offsets().to_vec());
        Self {
            layout,
            temps: Rc::new(RefCell::new(temps)),
            cursor: 0,
            code: String::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Where the emitter believes the data pointer is, relative to the current window
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }

    /// Book a scratch slot for the lifetime of the returned guard
    pub fn temp(&self) -> Temp {
        Temp::acquire(&self.temps)
    }

    pub fn temps_booked(&self) -> usize {
        self.temps.borrow().booked()
    }

    pub fn temps_high_water(&self) -> usize {
        self.temps.borrow().high_water()
    }

    fn num_size(&self) -> isize {
        self.layout.num_size() as isize
    }

    fn cell_range(&self) -> u32 {
        self.layout.config().cell_range
    }

    fn push_repeated(&mut self, ch: char, count: usize) {
        self.code.extend(std::iter::repeat(ch).take(count));
    }

    // ---- diagnostics ----

    fn diagnostic(&mut self, payload: &str) {
        if self.layout.config().diagnostics {
            self.code.push('{');
            self.code.push_str(payload);
            self.code.push('}');
        }
    }

    /// Ask the debugger to dump the current window
    pub fn debug_mem(&mut self) {
        self.diagnostic("mem");
    }

    /// Ask the debugger to print `text`
    pub fn debug_print(&mut self, text: &str) {
        self.diagnostic(&format!("print {text}"));
    }

    // ---- byte primitives ----

    pub fn move_to(&mut self, offset: isize) {
        let delta = offset - self.cursor;
        let ch = if delta > 0 { '>' } else { '<' };
        self.push_repeated(ch, delta.unsigned_abs());
        self.cursor = offset;
    }

    /// Open a loop on `offset`. Must be closed by [`Emitter::while_end`] on the same offset.
    pub fn while_start(&mut self, offset: isize) {
        self.move_to(offset);
        self.code.push('[');
    }

    pub fn while_end(&mut self, offset: isize) {
        self.move_to(offset);
        self.code.push(']');
    }

    /// `while (cell[offset]) { body }`
    pub fn while_byte(&mut self, offset: isize, body: impl FnOnce(&mut Self)) {
        self.while_start(offset);
        body(self);
        self.while_end(offset);
    }

    pub fn increment_byte(&mut self, offset: isize, delta: i64) {
        if delta == 0 {
            return;
        }
        self.move_to(offset);
        let ch = if delta > 0 { '+' } else { '-' };
        self.push_repeated(ch, delta.unsigned_abs() as usize);
    }

    pub fn input_byte(&mut self, offset: isize) {
        self.move_to(offset);
        self.code.push(',');
    }

    pub fn output_byte(&mut self, offset: isize) {
        self.move_to(offset);
        self.code.push('.');
    }

    pub fn clear_byte(&mut self, offset: isize) {
        self.while_byte(offset, |e| e.increment_byte(offset, -1));
    }

    /// Set a cell, counting up or down whichever is shorter
    pub fn set_byte(&mut self, offset: isize, value: u32) {
        let range = self.cell_range();
        let value = value % range;
        self.clear_byte(offset);
        if value <= range / 2 {
            self.increment_byte(offset, value as i64);
        } else {
            self.increment_byte(offset, value as i64 - range as i64);
        }
    }

    /// Add `from` into every cell of `to`, zeroing `from`
    pub fn move_byte(&mut self, from: isize, to: &[isize]) {
        debug_assert!(!to.contains(&from), "move_byte onto its own source");
        for &target in to {
            self.clear_byte(target);
        }
        self.while_byte(from, |e| {
            e.increment_byte(from, -1);
            for &target in to {
                e.increment_byte(target, 1);
            }
        });
    }

    pub fn copy_byte(&mut self, from: isize, to: &[isize]) {
        let scratch = self.temp();
        let mut targets = vec![scratch.offset()];
        targets.extend_from_slice(to);
        self.move_byte(from, &targets);
        self.move_byte(scratch.offset(), &[from]);
    }

    // ---- conditionals ----

    /// Run `body` once when `cond` is nonzero. `cond` itself is not consumed.
    pub fn if_byte(&mut self, cond: isize, body: impl FnOnce(&mut Self)) {
        let flag = self.temp();
        let f = flag.offset();
        self.copy_byte(cond, &[f]);
        self.while_byte(f, |e| {
            body(e);
            e.clear_byte(f);
        });
    }

    /// Run `then` when `cond` is nonzero, `otherwise` when it is zero.
    ///
    /// `cond` guards the positive branch directly, so `then` must not move
    /// the window. `cond` is parked in a temporary to leave that branch and
    /// restored before `otherwise` runs.
    pub fn if_else_byte(&mut self, cond: isize, then: impl FnOnce(&mut Self), otherwise: impl FnOnce(&mut Self)) {
        let flag = self.temp();
        let f = flag.offset();
        {
            let parked = self.temp();
            let p = parked.offset();
            self.clear_byte(p);
            self.set_byte(f, 1);
            self.while_byte(cond, |e| {
                then(e);
                e.increment_byte(f, -1);
                e.move_byte(cond, &[p]);
            });
            self.move_byte(p, &[cond]);
        }
        self.while_byte(f, |e| {
            otherwise(e);
            e.increment_byte(f, -1);
        });
    }

    /// Run `body` once when `cond` is zero
    pub fn if_not_byte(&mut self, cond: isize, body: impl FnOnce(&mut Self)) {
        self.if_else_byte(cond, |_| {}, body);
    }

    // ---- num primitives ----

    pub fn clear_num(&mut self, offset: isize) {
        for i in 0..self.num_size() {
            self.clear_byte(offset + i);
        }
    }

    /// Store `value` big-endian; negative values are written as `R^N + value`
    pub fn set_num(&mut self, offset: isize, value: i128) {
        let digits = self.layout.config().digits(value);
        for (i, digit) in digits.into_iter().enumerate() {
            self.set_byte(offset + i as isize, digit);
        }
    }

    pub fn move_num(&mut self, from: isize, to: &[isize]) {
        for i in 0..self.num_size() {
            let targets: Vec<isize> = to.iter().map(|t| t + i).collect();
            self.move_byte(from + i, &targets);
        }
    }

    pub fn copy_num(&mut self, from: isize, to: &[isize]) {
        for i in 0..self.num_size() {
            let targets: Vec<isize> = to.iter().map(|t| t + i).collect();
            self.copy_byte(from + i, &targets);
        }
    }

    /// After `cell` moved by `sign`, ripple an overflow into the `depth`
    /// more significant cells to its left.
    fn carry_check(&mut self, cell: isize, depth: isize, sign: i64) {
        if depth == 0 {
            return;
        }
        if sign < 0 {
            // a borrow leaves the cell at R-1; shift it to 0 for the test
            self.increment_byte(cell, 1);
        }
        self.if_not_byte(cell, |e| {
            e.increment_byte(cell - 1, sign);
            e.carry_check(cell - 1, depth - 1, sign);
        });
        if sign < 0 {
            self.increment_byte(cell, -1);
        }
    }

    fn add_byte(&mut self, to: isize, from: isize, carry: isize, sign: i64) {
        self.while_byte(from, |e| {
            e.increment_byte(from, -1);
            e.increment_byte(to, sign);
            e.carry_check(to, carry, sign);
        });
    }

    fn add_num_signed(&mut self, to: isize, from: isize, sign: i64) {
        for i in (0..self.num_size()).rev() {
            self.add_byte(to + i, from + i, i, sign);
        }
    }

    /// `to += from`, zeroing `from`
    pub fn add_num(&mut self, to: isize, from: isize) {
        self.add_num_signed(to, from, 1);
    }

    /// `to -= from`, zeroing `from`
    pub fn sub_num(&mut self, to: isize, from: isize) {
        self.add_num_signed(to, from, -1);
    }

    pub fn increment_num(&mut self, offset: isize, delta: i128) {
        if delta == 0 {
            return;
        }
        let sign = if delta > 0 { 1 } else { -1 };
        if delta.abs() == 1 {
            let low = self.layout.bool_byte(offset);
            self.increment_byte(low, sign);
            self.carry_check(low, self.num_size() - 1, sign);
            return;
        }
        let amount = self.temp();
        self.set_num(amount.offset(), delta.abs());
        self.add_num_signed(offset, amount.offset(), sign);
    }

    fn binary_not_byte(&mut self, offset: isize) {
        let saved = self.temp();
        let s = saved.offset();
        self.move_byte(offset, &[s]);
        self.set_byte(offset, self.cell_range() - 1);
        self.while_byte(s, |e| {
            e.increment_byte(s, -1);
            e.increment_byte(offset, -1);
        });
    }

    /// Complement every cell: `x -> R^N - 1 - x`
    pub fn binary_not_num(&mut self, offset: isize) {
        for i in 0..self.num_size() {
            self.binary_not_byte(offset + i);
        }
    }

    /// Two's-complement negation
    pub fn negate_num(&mut self, offset: isize) {
        self.binary_not_num(offset);
        self.increment_num(offset, 1);
    }

    /// Add `R^N / 2` so that signed order becomes unsigned order
    pub fn bias_num(&mut self, offset: isize) {
        let range = self.cell_range();
        if range % 2 == 0 {
            self.increment_byte(offset, (range / 2) as i64);
        } else {
            let total = self.layout.config().num_range();
            self.increment_num(offset, total - total / 2);
        }
    }

    /// `result = left < right` on single cells; `result` must be distinct
    pub fn less_byte(&mut self, left: isize, right: isize, result: isize) {
        let l = self.temp();
        let r = self.temp();
        let (lo, ro) = (l.offset(), r.offset());
        self.clear_byte(result);
        self.copy_byte(right, &[ro]);
        self.copy_byte(left, &[lo]);
        self.while_byte(ro, |e| {
            e.increment_byte(ro, -1);
            e.if_not_byte(lo, |e| e.set_byte(result, 1));
            e.increment_byte(lo, -1);
        });
    }

    /// `result = left == right` on single cells; `result` must be distinct
    pub fn equal_byte(&mut self, left: isize, right: isize, result: isize) {
        let diff = self.temp();
        let d = diff.offset();
        self.clear_byte(result);
        self.copy_byte(left, &[d]);
        {
            let rhs = self.temp();
            let r = rhs.offset();
            self.copy_byte(right, &[r]);
            self.while_byte(r, |e| {
                e.increment_byte(r, -1);
                e.increment_byte(d, -1);
            });
        }
        self.if_not_byte(d, |e| e.set_byte(result, 1));
    }

    fn less_num_bytes(&mut self, left: isize, right: isize, result: isize, bytes_left: isize) {
        self.less_byte(left, right, result);
        if bytes_left == 1 {
            return;
        }
        self.if_not_byte(result, |e| {
            let equal = e.temp();
            let q = equal.offset();
            e.equal_byte(left, right, q);
            e.if_else_byte(
                q,
                |e| e.less_num_bytes(left + 1, right + 1, result, bytes_left - 1),
                |e| e.clear_byte(result),
            );
        });
    }

    /// `result = left < right`, unsigned and most significant cell first.
    /// Neither operand is modified.
    pub fn less_num(&mut self, left: isize, right: isize, result: isize) {
        let n = self.num_size();
        self.less_num_bytes(left, right, result, n);
    }

    fn equal_num_bytes(&mut self, left: isize, right: isize, result: isize, bytes_left: isize) {
        self.equal_byte(left, right, result);
        if bytes_left > 1 {
            self.if_byte(result, |e| e.equal_num_bytes(left + 1, right + 1, result, bytes_left - 1));
        }
    }

    /// `result = left == right`. Neither operand is modified.
    pub fn equal_num(&mut self, left: isize, right: isize, result: isize) {
        let n = self.num_size();
        self.equal_num_bytes(left, right, result, n);
    }

    pub fn num_is_zero(&mut self, offset: isize, result: isize) {
        self.set_byte(result, 1);
        for i in 0..self.num_size() {
            self.if_byte(offset + i, |e| e.clear_byte(result));
        }
    }

    pub fn num_is_nonzero(&mut self, offset: isize, result: isize) {
        self.clear_byte(result);
        for i in 0..self.num_size() {
            self.if_byte(offset + i, |e| e.set_byte(result, 1));
        }
    }

    // ---- boolean bytes ----

    pub fn logic_not_byte(&mut self, offset: isize) {
        let negated = self.temp();
        let n = negated.offset();
        self.set_byte(n, 1);
        self.if_byte(offset, |e| e.clear_byte(n));
        self.move_byte(n, &[offset]);
    }

    pub fn logic_and_bytes(&mut self, a: isize, b: isize, result: isize) {
        self.clear_byte(result);
        self.if_byte(a, |e| e.if_byte(b, |e| e.set_byte(result, 1)));
    }

    pub fn logic_or_bytes(&mut self, a: isize, b: isize, result: isize) {
        self.clear_byte(result);
        self.if_byte(a, |e| e.set_byte(result, 1));
        self.if_byte(b, |e| e.set_byte(result, 1));
    }

    // ---- windows and memory ----

    /// Carry the preserved slots `k` windows along and make that window current
    pub fn move_window(&mut self, k: isize) {
        if k == 0 {
            return;
        }
        let stride = self.layout.stride();
        let shift = stride * k;
        for slot in self.layout.preserved_offsets() {
            self.move_num(slot, &[slot + shift]);
        }
        if k > 0 {
            let index = self.layout.cell_index();
            for _ in 0..k {
                self.copy_num(index, &[index + stride]);
                self.cursor -= stride;
                self.diagnostic("move_vmc 1");
                self.increment_num(index, 1);
            }
        } else {
            self.diagnostic(&format!("move_vmc {k}"));
            self.cursor -= shift;
        }
    }

    /// Walk window by window until the current index equals the target slot
    pub fn goto_target_window(&mut self) {
        let index = self.layout.cell_index();
        let target = self.layout.target_cell();
        let flag = self.temp();
        let f = flag.offset();
        self.less_num(index, target, f);
        self.while_byte(f, |e| {
            e.move_window(1);
            e.less_num(index, target, f);
        });
        self.less_num(target, index, f);
        self.while_byte(f, |e| {
            e.move_window(-1);
            e.less_num(target, index, f);
        });
    }

    fn set_target(&mut self, address: Source) {
        let target = self.layout.target_cell();
        match address {
            Source::Register(offset) => self.copy_num(offset, &[target]),
            Source::Immediate(value) => self.set_num(target, value as i128),
        }
    }

    /// `dest = slot@[address]`. The window stays at `address` afterwards.
    pub fn load_memory(&mut self, address: Source, dest: isize, slot: isize) {
        trace!("load_memory {address:?} -> {dest} via slot {slot}");
        self.set_target(address);
        self.goto_target_window();
        self.copy_num(slot, &[dest]);
    }

    /// `slot@[address] = value`. The window stays at `address` afterwards.
    pub fn store_memory(&mut self, address: Source, value: Source, slot: isize) {
        trace!("store_memory {value:?} -> {address:?} via slot {slot}");
        self.set_target(address);
        self.goto_target_window();
        match value {
            Source::Register(offset) => {
                debug_assert!(self.layout.preserved_offsets().contains(&offset));
                self.copy_num(offset, &[slot]);
            }
            Source::Immediate(value) => self.set_num(slot, value as i128),
        }
    }

    // ---- basic-block dispatch ----

    /// Enter the dispatch loop with the command counter pointing at block 0
    pub fn opening_code(&mut self) {
        let cur_cmd = self.layout.cur_cmd();
        let flow = self.layout.flow_reserved();
        self.set_num(cur_cmd, 1);
        self.set_byte(flow, 1);
        self.while_start(flow);
    }

    /// Count the command counter down and open the block when it reaches zero
    pub fn basic_block_start(&mut self) {
        let cur_cmd = self.layout.cur_cmd();
        let flow = self.layout.flow_reserved();
        self.increment_num(cur_cmd, -1);
        self.num_is_zero(cur_cmd, flow);
        self.while_start(flow);
    }

    pub fn basic_block_end(&mut self) {
        let flow = self.layout.flow_reserved();
        self.clear_byte(flow);
        self.while_end(flow);
    }

    /// Leave the current block so that the block `diff` positions on runs next
    pub fn goto_block(&mut self, diff: i128) {
        let cur_cmd = self.layout.cur_cmd();
        self.set_num(cur_cmd, diff);
        self.basic_block_end();
    }

    /// One more count for the virtual exit block; leave the loop when it hits zero
    pub fn closing_code(&mut self) {
        let cur_cmd = self.layout.cur_cmd();
        let flow = self.layout.flow_reserved();
        self.increment_num(cur_cmd, -1);
        self.num_is_nonzero(cur_cmd, flow);
        self.while_end(flow);
    }
}
