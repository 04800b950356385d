use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{Result, SageErr};

/// A shared switch that stops a training run from another thread.
///
/// Clones observe the same state.
#[derive(Debug, Clone)]
pub struct TerminationFlag {
    running: Arc<AtomicBool>,
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::running()
    }
}

impl TerminationFlag {
    /// Creates a new flag in the running state.
    pub fn running() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Requests every holder of this flag to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// # Returns
    /// `SageErr::Terminated` once the flag was stopped.
    pub fn assert_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SageErr::Terminated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_state() {
        let flag = TerminationFlag::default();
        let clone = flag.clone();

        assert!(clone.assert_running().is_ok());
        flag.stop();

        assert!(!clone.is_running());
        assert!(matches!(clone.assert_running(), Err(SageErr::Terminated)));
    }
}
