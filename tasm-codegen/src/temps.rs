//! Temporary slot allocation
//!
//! Temporaries are numbered. Id `i` lives in temp slot `i % temp_count` of
//! the window `i / temp_count` windows to the right of the current one, so
//! the pool never runs out; it only reaches further along the tape.
//!
//! Slots are handed out as [`Temp`] guards which give their slot back when
//! dropped. A temporary can therefore neither leak nor be freed twice, even
//! when a lowering routine returns early.

use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub struct TempPool {
    stride: isize,
    offsets: Vec<isize>,
    /// Booking table indexed by temp id
    booked: Vec<bool>,
}

impl TempPool {
    pub fn new(stride: isize, offsets: Vec<isize>) -> Self {
        assert!(!offsets.is_empty(), "a temp pool needs at least one temp slot");
        Self {
            stride,
            offsets,
            booked: Vec::new(),
        }
    }

    pub fn id_to_offset(&self, id: usize) -> isize {
        let per_window = self.offsets.len();
        (id / per_window) as isize * self.stride + self.offsets[id % per_window]
    }

    /// Inverse of [`TempPool::id_to_offset`], `None` for offsets no id maps to
    pub fn offset_to_id(&self, offset: isize) -> Option<usize> {
        let window = offset.div_euclid(self.stride);
        let within = offset.rem_euclid(self.stride);
        if window < 0 {
            return None;
        }
        let slot = self.offsets.iter().position(|&o| o == within)?;
        Some(window as usize * self.offsets.len() + slot)
    }

    /// Book the lowest free id and return its offset
    pub fn alloc(&mut self) -> isize {
        let id = match self.booked.iter().position(|booked| !booked) {
            Some(id) => {
                self.booked[id] = true;
                id
            }
            None => {
                self.booked.push(true);
                self.booked.len() - 1
            }
        };
        trace!("temp {id} booked at offset {}", self.id_to_offset(id));
        self.id_to_offset(id)
    }

    /// Release the id behind `offset`. Returns false when it was not booked.
    pub fn free(&mut self, offset: isize) -> bool {
        match self.offset_to_id(offset) {
            Some(id) if self.booked.get(id).copied().unwrap_or(false) => {
                self.booked[id] = false;
                trace!("temp {id} released");
                true
            }
            _ => false,
        }
    }

    /// Number of ids currently booked
    pub fn booked(&self) -> usize {
        self.booked.iter().filter(|booked| **booked).count()
    }

    /// Largest number of ids that were ever booked at the same time
    pub fn high_water(&self) -> usize {
        self.booked.len()
    }
}

/// A booked temporary; the slot is released when the guard is dropped
#[derive(Debug)]
pub struct Temp {
    offset: isize,
    pool: Rc<RefCell<TempPool>>,
}

impl Temp {
    pub fn acquire(pool: &Rc<RefCell<TempPool>>) -> Self {
        let offset = pool.borrow_mut().alloc();
        Self {
            offset,
            pool: Rc::clone(pool),
        }
    }

    pub fn offset(&self) -> isize {
        self.offset
    }
}

impl Drop for Temp {
    fn drop(&mut self) {
        let released = self.pool.borrow_mut().free(self.offset);
        debug_assert!(released, "temp at offset {} was not booked", self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool() -> Rc<RefCell<TempPool>> {
        Rc::new(RefCell::new(TempPool::new(10, vec![6, 8])))
    }

    #[test]
    fn test_id_mapping_spans_windows() {
        let pool = TempPool::new(10, vec![6, 8]);
        assert_eq!(pool.id_to_offset(0), 6);
        assert_eq!(pool.id_to_offset(1), 8);
        assert_eq!(pool.id_to_offset(2), 16);
        assert_eq!(pool.id_to_offset(5), 28);
        for id in 0..8 {
            assert_eq!(pool.offset_to_id(pool.id_to_offset(id)), Some(id));
        }
        assert_eq!(pool.offset_to_id(7), None);
        assert_eq!(pool.offset_to_id(-4), None);
    }

    #[test]
    fn test_guards_release_on_drop() {
        let pool = pool();
        {
            let a = Temp::acquire(&pool);
            let b = Temp::acquire(&pool);
            let c = Temp::acquire(&pool);
            assert_eq!((a.offset(), b.offset(), c.offset()), (6, 8, 16));
            assert_eq!(pool.borrow().booked(), 3);
        }
        assert_eq!(pool.borrow().booked(), 0);
        assert_eq!(pool.borrow().high_water(), 3);
    }

    #[test]
    fn test_lowest_free_slot_is_reused() {
        let pool = pool();
        let a = Temp::acquire(&pool);
        let b = Temp::acquire(&pool);
        drop(a);
        let c = Temp::acquire(&pool);
        assert_eq!(c.offset(), 6);
        assert_ne!(b.offset(), c.offset());
    }

    #[test]
    fn test_double_free_is_refused() {
        let mut pool = TempPool::new(10, vec![6, 8]);
        let offset = pool.alloc();
        assert!(pool.free(offset));
        assert!(!pool.free(offset));
        assert!(!pool.free(7));
    }
}
