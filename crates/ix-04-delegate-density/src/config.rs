//! # Density Configuration

use serde::{Deserialize, Serialize};

use crate::domain::DensityError;

/// Rotation parameters of the running node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DposConfig {
    /// Seconds per slot.
    pub period: u64,
    /// Consecutive slots a delegate holds before the turn passes on.
    pub turn_block_count: u64,
    /// Seats in the rotation.
    pub delegate_count: u64,
}

impl Default for DposConfig {
    fn default() -> Self {
        Self {
            period: 1,
            turn_block_count: 6,
            delegate_count: 2,
        }
    }
}

impl DposConfig {
    /// Zero in any parameter leaves no one scheduled.
    pub fn is_defined(&self) -> bool {
        self.period > 0 && self.turn_block_count > 0 && self.delegate_count > 0
    }
}

/// Density engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Trailing windows in seconds.
    pub windows: Vec<u64>,
    pub dpos: DposConfig,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            windows: vec![5 * 60, 60 * 60],
            dpos: DposConfig::default(),
        }
    }
}

impl DensityConfig {
    /// Windows sorted ascending without duplicates.
    ///
    /// # Errors
    ///
    /// `DensityError::InvalidWindows` for an empty list or a zero window.
    pub fn normalized_windows(&self) -> Result<Vec<u64>, DensityError> {
        normalize_windows(&self.windows)
    }
}

/// See [`DensityConfig::normalized_windows`].
pub fn normalize_windows(windows: &[u64]) -> Result<Vec<u64>, DensityError> {
    if windows.is_empty() {
        return Err(DensityError::InvalidWindows(
            "at least one window is required".to_string(),
        ));
    }
    if windows.contains(&0) {
        return Err(DensityError::InvalidWindows(
            "windows must be at least one second".to_string(),
        ));
    }
    let mut sorted = windows.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    Ok(sorted)
}
