//! Ctrl-C handling for deploys.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};

/// Shared flag set when the user interrupts the process.
///
/// The deploy loop checks it before every entry and turns a set flag into a
/// rolled-back failure.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag that is only set by [`trigger`](Self::trigger).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag set by Ctrl-C. May only be called once per process.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub fn install() -> Result<Self> {
        let interrupt = Self::new();
        let flag = Arc::clone(&interrupt.flag);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
        Ok(interrupt)
    }

    /// Set the flag.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the flag is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        assert!(!clone.is_set());
        interrupt.trigger();
        assert!(clone.is_set());
    }
}
