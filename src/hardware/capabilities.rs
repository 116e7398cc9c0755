//! Atomic module capabilities.
//!
//! Fine-grained capability traits a detector module implements. Instead of
//! one monolithic `Module` trait, each concern gets its own contract:
//!
//! - `DacAccess` - bias DAC write/readback
//! - `TimerAccess` - acquisition timers and counters
//! - `AcquisitionControl` - start/stop/status of a run
//! - `RegisterAccess` - raw FPGA register pokes
//! - `SensorRead` - read-only ADC channels (temperatures)
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! The handles in [`crate::detector`] hold `Arc<DetectorModule>` today, but
//! operate through these traits so a networked backend can slot in without
//! touching the handle layer.

use anyhow::Result;
use async_trait::async_trait;

use crate::defs::{DacIndex, RunStatus, TimerIndex};

/// Capability: bias DAC access.
///
/// # Contract
/// - Values are DAC units in the 12-bit hardware range 0..=4095, or
///   millivolts when `millivolts` is set
/// - `set_dac` returns the value read back after the write
/// - Writing an ADC index (see [`DacIndex::is_adc`]) is an error
#[async_trait]
pub trait DacAccess: Send + Sync {
    /// Write a DAC and return the readback value.
    async fn set_dac(&self, index: DacIndex, value: i32, millivolts: bool) -> Result<i32>;

    /// Read a DAC.
    async fn get_dac(&self, index: DacIndex, millivolts: bool) -> Result<i32>;
}

/// Capability: acquisition timers.
///
/// Duration-valued timers hold nanoseconds, count-valued timers hold plain
/// counts (see [`TimerIndex::is_count`]). Negative durations and counts
/// below 1 are rejected.
#[async_trait]
pub trait TimerAccess: Send + Sync {
    /// Write a timer and return the value read back.
    async fn set_timer(&self, index: TimerIndex, value: i64) -> Result<i64>;

    /// Read a timer.
    async fn get_timer(&self, index: TimerIndex) -> Result<i64>;
}

/// Capability: run control.
///
/// # Contract
/// - `start_acquisition` on a module that is already running is an error
/// - `stop_acquisition` on an idle module is a no-op
/// - `wait_for_idle` blocks until the run finishes; it has an internal
///   timeout to avoid blocking forever
#[async_trait]
pub trait AcquisitionControl: Send + Sync {
    /// Begin a run with the currently programmed timers.
    async fn start_acquisition(&self) -> Result<()>;

    /// Abort the run in progress, if any.
    async fn stop_acquisition(&self) -> Result<()>;

    /// Current run state.
    async fn run_status(&self) -> Result<RunStatus>;

    /// Frames caught since power-on.
    async fn frames_caught(&self) -> Result<u64>;

    /// Block until the module reports idle.
    async fn wait_for_idle(&self) -> Result<()>;
}

/// Capability: raw register access.
#[async_trait]
pub trait RegisterAccess: Send + Sync {
    /// Write a 32-bit register and return the readback.
    async fn write_register(&self, addr: u32, value: u32) -> Result<u32>;

    /// Read a 32-bit register.
    async fn read_register(&self, addr: u32) -> Result<u32>;

    /// Set one bit of a register.
    async fn set_bit(&self, addr: u32, bit: u8) -> Result<()>;

    /// Clear one bit of a register.
    async fn clear_bit(&self, addr: u32, bit: u8) -> Result<()>;
}

/// Capability: read-only ADC channels.
///
/// Temperature channels report millidegrees Celsius.
#[async_trait]
pub trait SensorRead: Send + Sync {
    /// Sample an ADC channel.
    async fn read_adc(&self, index: DacIndex) -> Result<i32>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedDacs {
        value: Mutex<i32>,
    }

    #[async_trait]
    impl DacAccess for FixedDacs {
        async fn set_dac(&self, _index: DacIndex, value: i32, _mv: bool) -> Result<i32> {
            *self.value.lock().unwrap() = value;
            Ok(value)
        }

        async fn get_dac(&self, _index: DacIndex, _mv: bool) -> Result<i32> {
            Ok(*self.value.lock().unwrap())
        }
    }

    #[test]
    fn dac_access_is_object_safe() {
        tokio_test::block_on(async {
            let dacs: std::sync::Arc<dyn DacAccess> = std::sync::Arc::new(FixedDacs {
                value: Mutex::new(0),
            });
            dacs.set_dac(DacIndex::VrefDs, 480, false).await.unwrap();
            assert_eq!(dacs.get_dac(DacIndex::VrefDs, false).await.unwrap(), 480);
        });
    }
}
