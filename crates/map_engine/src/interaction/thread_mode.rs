use serde::{Deserialize, Serialize};

/// Where an interaction call does its work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ThreadMode {
    /// Build on the calling thread; return once the commands are queued
    Current,
    /// As [`ThreadMode::Current`], then block until the render thread has
    /// applied the drain cycle carrying the commands
    CurrentWaitApplied,
    /// Hand the work to the layer's background worker and return at once
    #[default]
    Any,
}

impl ThreadMode {
    /// True when the call runs on the calling thread
    pub const fn is_synchronous(self) -> bool {
        !matches!(self, Self::Any)
    }
}
