//! DAC accessors.
//!
//! A [`Dac`] binds one [`DacIndex`] plus calibration bounds and a default
//! value to a detector handle. Writes are validated against the accessor's
//! own [low, high] window before they reach the modules, so a miscalibrated
//! value never lands on hardware.

use std::fmt;
use std::sync::Arc;

use crate::defs::DacIndex;
use crate::detector::experimental::ExperimentalDetector;
use crate::detector::{DetectorImpl, ModuleResults};
use crate::error::{DetError, DetResult};
use crate::hardware::capabilities::DacAccess;
use crate::hardware::{mv_to_units, units_to_mv};

/// Range-checked accessor for one DAC of a detector.
pub struct Dac {
    index: DacIndex,
    low: i32,
    high: i32,
    default: i32,
    inner: Arc<DetectorImpl>,
}

impl Dac {
    /// Bind `index` to `detector` with bounds `[low, high]` and a default.
    pub fn new(
        index: DacIndex,
        low: i32,
        high: i32,
        default: i32,
        detector: &ExperimentalDetector,
    ) -> Self {
        Self::bound(index, low, high, default, Arc::clone(detector.inner()))
    }

    pub(crate) fn bound(
        index: DacIndex,
        low: i32,
        high: i32,
        default: i32,
        inner: Arc<DetectorImpl>,
    ) -> Self {
        Self {
            index,
            low,
            high,
            default,
            inner,
        }
    }

    /// The DAC this accessor addresses.
    pub fn index(&self) -> DacIndex {
        self.index
    }

    /// Command-line name of the DAC.
    pub fn name(&self) -> &'static str {
        self.index.name()
    }

    /// Lower bound in DAC units.
    pub fn low(&self) -> i32 {
        self.low
    }

    /// Upper bound in DAC units.
    pub fn high(&self) -> i32 {
        self.high
    }

    /// Default value in DAC units.
    pub fn default_value(&self) -> i32 {
        self.default
    }

    fn check(&self, value: i32) -> DetResult<()> {
        if value < self.low || value > self.high {
            return Err(DetError::DacOutOfRange {
                name: self.index.name(),
                value,
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// Read the DAC, requiring all modules to agree.
    pub async fn get(&self) -> DetResult<i32> {
        self.get_at(&[]).await?.consistent(self.index.name())
    }

    /// Read the DAC on the selected modules.
    pub async fn get_at(&self, pos: &[usize]) -> DetResult<ModuleResults<i32>> {
        let mut values = Vec::new();
        for module in self.inner.modules_at(pos)? {
            values.push(module.get_dac(self.index, false).await?);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// Write the DAC on every module, after bounds validation.
    pub async fn set(&self, value: i32) -> DetResult<()> {
        self.set_at(value, &[]).await
    }

    /// Write the DAC on the selected modules, after bounds validation.
    pub async fn set_at(&self, value: i32, pos: &[usize]) -> DetResult<()> {
        self.check(value)?;
        for module in self.inner.modules_at(pos)? {
            module.set_dac(self.index, value, false).await?;
        }
        Ok(())
    }

    /// Write the accessor's default value on every module.
    pub async fn set_default(&self) -> DetResult<()> {
        self.set(self.default).await
    }

    /// Read the DAC in millivolts.
    pub async fn get_mv(&self) -> DetResult<i32> {
        Ok(units_to_mv(self.get().await?))
    }

    /// Write the DAC in millivolts; bounds still apply in DAC units.
    pub async fn set_mv(&self, millivolts: i32) -> DetResult<()> {
        self.set(mv_to_units(millivolts)).await
    }
}

impl fmt::Display for Dac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}..={} (default {})",
            self.index.name(),
            self.index.as_index(),
            self.low,
            self.high,
            self.default
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vref_prech(detector: &ExperimentalDetector) -> Dac {
        Dac::new(DacIndex::VrefPrech, 0, 4000, 2000, detector)
    }

    #[tokio::test]
    async fn set_get_roundtrip_within_bounds() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        dac.set(1234).await.unwrap();
        assert_eq!(dac.get().await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn out_of_bounds_write_leaves_value_untouched() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        dac.set(100).await.unwrap();

        let err = dac.set(4001).await.unwrap_err();
        assert!(matches!(err, DetError::DacOutOfRange { value: 4001, .. }));
        assert!(dac.set(-1).await.is_err());
        assert_eq!(dac.get().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn set_default_applies_the_default() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        dac.set_default().await.unwrap();
        assert_eq!(dac.get().await.unwrap(), 2000);
    }

    #[tokio::test]
    async fn millivolt_writes_respect_unit_bounds() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        dac.set_mv(1000).await.unwrap();
        let units = dac.get().await.unwrap();
        assert_eq!(units, mv_to_units(1000));
        // 2500 mV converts above the 4000-unit bound.
        assert!(dac.set_mv(2500).await.is_err());
    }

    #[tokio::test]
    async fn accessor_shares_state_with_the_handle() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        dac.set(777).await.unwrap();
        assert_eq!(
            e.get_dac(DacIndex::VrefPrech, false, &[]).await.unwrap()[0],
            777
        );
    }

    #[test]
    fn display_names_the_dac() {
        let e = ExperimentalDetector::new();
        let dac = vref_prech(&e);
        assert_eq!(dac.to_string(), "vref_prech [3]: 0..=4000 (default 2000)");
    }
}
