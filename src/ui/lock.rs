// src/ui/lock.rs

use tracing::warn;

/// Reference-counted input lock.
///
/// Input is blocked while the count is positive. `acquire` and `release`
/// report the 0→1 and 1→0 edges so callers toggle the overlay only then.
#[derive(Debug, Default)]
pub struct InputLock {
    count: usize,
}

impl InputLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this acquire engaged the lock.
    pub fn acquire(&mut self) -> bool {
        self.count += 1;
        self.count == 1
    }

    /// Returns `true` if this release disengaged the lock.
    pub fn release(&mut self) -> bool {
        if self.count == 0 {
            warn!("input lock released more often than acquired; ignoring");
            return false;
        }
        self.count -= 1;
        self.count == 0
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_engaged(&self) -> bool {
        self.count > 0
    }
}
