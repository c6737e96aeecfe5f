use super::driver::FormSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Advanced,
    /// Consecutive unchanged snapshots reached the threshold.
    Stalled,
}

/// Detects actions that left the form container unchanged.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    previous: Option<FormSnapshot>,
    stall_count: u32,
    stall_threshold: u32,
}

impl ProgressTracker {
    /// A threshold of zero is treated as one.
    pub fn new(stall_threshold: u32) -> Self {
        Self {
            previous: None,
            stall_count: 0,
            stall_threshold: stall_threshold.max(1),
        }
    }

    /// Records the state seen before an action without judging it.
    pub fn baseline(&mut self, snapshot: FormSnapshot) {
        self.previous = Some(snapshot);
    }

    /// Compares the state after an action with the previous one.
    pub fn observe(&mut self, snapshot: FormSnapshot) -> Progress {
        let unchanged = self.previous.as_ref() == Some(&snapshot);
        self.previous = Some(snapshot);

        if !unchanged {
            self.stall_count = 0;
            return Progress::Advanced;
        }

        self.stall_count += 1;
        if self.stall_count >= self.stall_threshold {
            Progress::Stalled
        } else {
            Progress::Advanced
        }
    }

    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.stall_count = 0;
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(1)
    }
}
