//! Position-addressed detector API.
//!
//! [`ExperimentalDetector`] is the newer handle generation: every operation
//! takes an explicit position list (`&[]` selects all modules) and returns
//! per-module [`ModuleResults`]. It also exposes the low-level surface the
//! stable facade hides: raw register access and the starting frame number.

use std::sync::Arc;
use std::time::Duration;

use crate::defs::{DacIndex, DetectorType, RunStatus, TimerIndex};
use crate::detector::{Detector, DetectorImpl, ModuleResults};
use crate::error::{DetError, DetResult};
use crate::hardware::capabilities::{
    AcquisitionControl, DacAccess, RegisterAccess, TimerAccess,
};

/// Position-addressed handle over the same module kind as [`Detector`].
pub struct ExperimentalDetector {
    inner: Arc<DetectorImpl>,
}

impl ExperimentalDetector {
    /// A handle over one simulated generic module.
    pub fn new() -> Self {
        Self {
            inner: DetectorImpl::sim(DetectorType::Generic, 1),
        }
    }

    pub(crate) fn from_inner(inner: Arc<DetectorImpl>) -> Self {
        Self {
            inner,
        }
    }

    pub(crate) fn inner(&self) -> &Arc<DetectorImpl> {
        &self.inner
    }

    /// View the same modules through the stable facade.
    pub fn detector(&self) -> Detector {
        Detector::from_inner(Arc::clone(&self.inner))
    }

    /// Number of modules behind this handle.
    pub fn num_modules(&self) -> usize {
        self.inner.modules().len()
    }

    async fn get_duration_at(
        &self,
        timer: TimerIndex,
        pos: &[usize],
    ) -> DetResult<ModuleResults<Duration>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            let ns = module.get_timer(timer).await?;
            values.push(Duration::from_nanos(ns.max(0) as u64));
        }
        Ok(ModuleResults::from_vec(values))
    }

    async fn set_duration_at(
        &self,
        timer: TimerIndex,
        value: Duration,
        pos: &[usize],
    ) -> DetResult<()> {
        let ns = i64::try_from(value.as_nanos()).map_err(|_| DetError::InvalidTimer {
            timer: timer.name(),
            value: i64::MAX,
        })?;
        for module in self.inner.modules_at(pos)? {
            module.set_timer(timer, ns).await?;
        }
        Ok(())
    }

    /// Exposure time, per selected module.
    pub async fn exptime(&self, pos: &[usize]) -> DetResult<ModuleResults<Duration>> {
        self.get_duration_at(TimerIndex::AcquisitionTime, pos).await
    }

    /// Program the exposure time on the selected modules.
    pub async fn set_exptime(&self, value: Duration, pos: &[usize]) -> DetResult<()> {
        self.set_duration_at(TimerIndex::AcquisitionTime, value, pos)
            .await
    }

    /// Frame period, per selected module.
    pub async fn period(&self, pos: &[usize]) -> DetResult<ModuleResults<Duration>> {
        self.get_duration_at(TimerIndex::FramePeriod, pos).await
    }

    /// Program the frame period on the selected modules.
    pub async fn set_period(&self, value: Duration, pos: &[usize]) -> DetResult<()> {
        self.set_duration_at(TimerIndex::FramePeriod, value, pos)
            .await
    }

    /// Subframe exposure time (relevant on Eiger), per selected module.
    pub async fn sub_exptime(&self, pos: &[usize]) -> DetResult<ModuleResults<Duration>> {
        self.get_duration_at(TimerIndex::SubframeAcquisitionTime, pos)
            .await
    }

    /// Program the subframe exposure time on the selected modules.
    pub async fn set_sub_exptime(&self, value: Duration, pos: &[usize]) -> DetResult<()> {
        self.set_duration_at(TimerIndex::SubframeAcquisitionTime, value, pos)
            .await
    }

    /// Starting frame number, per selected module.
    pub async fn starting_frame_number(&self, pos: &[usize]) -> DetResult<ModuleResults<u64>> {
        let values = self
            .inner
            .modules_at(pos)?
            .iter()
            .map(|m| m.starting_frame_number())
            .collect();
        Ok(ModuleResults::from_vec(values))
    }

    /// Program the starting frame number on the selected modules.
    pub async fn set_starting_frame_number(&self, value: u64, pos: &[usize]) -> DetResult<()> {
        for module in self.inner.modules_at(pos)? {
            module.set_starting_frame_number(value)?;
        }
        Ok(())
    }

    /// Read a raw register on the selected modules.
    pub async fn get_register(&self, addr: u32, pos: &[usize]) -> DetResult<ModuleResults<u32>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            values.push(module.read_register(addr).await?);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// Write a raw register on the selected modules.
    pub async fn set_register(&self, addr: u32, value: u32, pos: &[usize]) -> DetResult<()> {
        for module in self.inner.modules_at(pos)? {
            module.write_register(addr, value).await?;
        }
        Ok(())
    }

    /// Set one register bit on the selected modules.
    pub async fn set_bit(&self, addr: u32, bit: u8, pos: &[usize]) -> DetResult<()> {
        for module in self.inner.modules_at(pos)? {
            module.set_bit(addr, bit).await?;
        }
        Ok(())
    }

    /// Clear one register bit on the selected modules.
    pub async fn clear_bit(&self, addr: u32, bit: u8, pos: &[usize]) -> DetResult<()> {
        for module in self.inner.modules_at(pos)? {
            module.clear_bit(addr, bit).await?;
        }
        Ok(())
    }

    /// Raw DAC readback on the selected modules.
    pub async fn get_dac(
        &self,
        index: DacIndex,
        millivolts: bool,
        pos: &[usize],
    ) -> DetResult<ModuleResults<i32>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            values.push(module.get_dac(index, millivolts).await?);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// Raw DAC write on the selected modules.
    pub async fn set_dac(
        &self,
        index: DacIndex,
        value: i32,
        millivolts: bool,
        pos: &[usize],
    ) -> DetResult<()> {
        for module in self.inner.modules_at(pos)? {
            module.set_dac(index, value, millivolts).await?;
        }
        Ok(())
    }

    /// Run state of the selected modules.
    pub async fn status(&self, pos: &[usize]) -> DetResult<ModuleResults<RunStatus>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            values.push(module.run_status().await?);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// Frames caught by the selected modules since power-on.
    pub async fn frames_caught(&self, pos: &[usize]) -> DetResult<ModuleResults<u64>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            values.push(module.frames_caught().await?);
        }
        Ok(ModuleResults::from_vec(values))
    }
}

impl Default for ExperimentalDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExperimentalDetector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_position_list_selects_all_modules() {
        let e = ExperimentalDetector::new();
        let times = e.exptime(&[]).await.unwrap();
        assert_eq!(times.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_position_is_an_error() {
        let e = ExperimentalDetector::new();
        let err = e.exptime(&[5]).await.unwrap_err();
        assert!(matches!(
            err,
            DetError::PositionOutOfRange {
                position: 5,
                count: 1
            }
        ));
    }

    #[tokio::test]
    async fn register_bits_via_positions() {
        let e = ExperimentalDetector::new();
        e.set_bit(0x5d, 16, &[0]).await.unwrap();
        assert_eq!(e.get_register(0x5d, &[0]).await.unwrap()[0], 1 << 16);
        e.clear_bit(0x5d, 16, &[0]).await.unwrap();
        assert_eq!(e.get_register(0x5d, &[0]).await.unwrap()[0], 0);
    }

    #[tokio::test]
    async fn facade_and_positional_views_share_state() {
        let e = ExperimentalDetector::new();
        let d = e.detector();
        d.set_exptime(Duration::from_millis(7)).await.unwrap();
        assert_eq!(
            e.exptime(&[]).await.unwrap()[0],
            Duration::from_millis(7)
        );
    }

    #[tokio::test]
    async fn starting_frame_number_roundtrip() {
        let e = ExperimentalDetector::new();
        assert_eq!(e.starting_frame_number(&[]).await.unwrap()[0], 1);
        e.set_starting_frame_number(1000, &[]).await.unwrap();
        assert_eq!(e.starting_frame_number(&[]).await.unwrap()[0], 1000);
        assert!(e.set_starting_frame_number(0, &[]).await.is_err());
    }
}
