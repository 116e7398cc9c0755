//! Named detector-class handles.
//!
//! A class handle presets the module type and exposes the operations that
//! only make sense on that type: gain settings and the high-voltage supply
//! on Jungfrau, subframe timing on Eiger. The whole-detector surface stays
//! available through [`Jungfrau::detector`] / [`Eiger::detector`].

use std::sync::Arc;
use std::time::Duration;

use crate::dacs::Dac;
use crate::defs::{DacIndex, DetectorSettings, DetectorType};
use crate::detector::experimental::ExperimentalDetector;
use crate::detector::{Detector, DetectorImpl, ModuleResults};
use crate::error::{DetError, DetResult};
use crate::hardware::capabilities::{DacAccess, SensorRead};
use crate::hardware::power_on_dac;

/// Jungfrau detector handle.
pub struct Jungfrau {
    inner: Arc<DetectorImpl>,
}

impl Jungfrau {
    /// A Jungfrau over one simulated module.
    pub fn new() -> Self {
        Self::with_modules(1)
    }

    /// A Jungfrau over `module_count` simulated modules.
    pub fn with_modules(module_count: usize) -> Self {
        Self {
            inner: DetectorImpl::sim(DetectorType::Jungfrau, module_count),
        }
    }

    /// Whole-detector facade over the same modules.
    pub fn detector(&self) -> Detector {
        Detector::from_inner(Arc::clone(&self.inner))
    }

    /// Position-addressed view over the same modules.
    pub fn experimental(&self) -> ExperimentalDetector {
        ExperimentalDetector::from_inner(Arc::clone(&self.inner))
    }

    /// Gain settings, which all modules must agree on.
    pub async fn settings(&self) -> DetResult<DetectorSettings> {
        let mut values = Vec::new();
        for module in self.inner.modules() {
            values.push(module.settings().await);
        }
        ModuleResults::from_vec(values).consistent("settings")
    }

    /// Select gain settings on every module.
    pub async fn set_settings(&self, settings: DetectorSettings) -> DetResult<()> {
        if !DetectorSettings::allowed_for(DetectorType::Jungfrau).contains(&settings) {
            return Err(DetError::SettingsNotSupported(settings.to_string()));
        }
        for module in self.inner.modules() {
            module.set_settings(settings).await?;
        }
        Ok(())
    }

    /// High-voltage supply in volts (0 = off).
    pub async fn high_voltage(&self) -> DetResult<i32> {
        let mut values = Vec::new();
        for module in self.inner.modules() {
            values.push(module.get_dac(DacIndex::HighVoltage, false).await?);
        }
        ModuleResults::from_vec(values).consistent("high voltage")
    }

    /// Program the high-voltage supply (0, or 60..=200 V).
    pub async fn set_high_voltage(&self, volts: i32) -> DetResult<()> {
        for module in self.inner.modules() {
            module.set_dac(DacIndex::HighVoltage, volts, false).await?;
        }
        Ok(())
    }

    /// FPGA temperature per module, in degrees Celsius.
    pub async fn temperature_fpga(&self) -> DetResult<ModuleResults<f64>> {
        let mut values = Vec::new();
        for module in self.inner.modules() {
            let milli = module.read_adc(DacIndex::TemperatureFpga).await?;
            values.push(f64::from(milli) / 1000.0);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// ADC temperature per module, in degrees Celsius.
    pub async fn temperature_adc(&self) -> DetResult<ModuleResults<f64>> {
        let mut values = Vec::new();
        for module in self.inner.modules() {
            let milli = module.read_adc(DacIndex::TemperatureAdc).await?;
            values.push(f64::from(milli) / 1000.0);
        }
        Ok(ModuleResults::from_vec(values))
    }

    /// DAC accessor with this type's power-on value as default.
    pub fn dac(&self, index: DacIndex) -> DetResult<Dac> {
        if index.is_adc() {
            return Err(DetError::Configuration(format!(
                "{index} is an ADC channel, not a DAC"
            )));
        }
        let high = if index == DacIndex::HighVoltage { 200 } else { 4095 };
        Ok(Dac::bound(
            index,
            0,
            high,
            power_on_dac(DetectorType::Jungfrau, index),
            Arc::clone(&self.inner),
        ))
    }
}

impl Default for Jungfrau {
    fn default() -> Self {
        Self::new()
    }
}

/// Eiger detector handle.
pub struct Eiger {
    inner: Arc<DetectorImpl>,
}

impl Eiger {
    /// An Eiger over one simulated module.
    pub fn new() -> Self {
        Self::with_modules(1)
    }

    /// An Eiger over `module_count` simulated modules.
    pub fn with_modules(module_count: usize) -> Self {
        Self {
            inner: DetectorImpl::sim(DetectorType::Eiger, module_count),
        }
    }

    /// Whole-detector facade over the same modules.
    pub fn detector(&self) -> Detector {
        Detector::from_inner(Arc::clone(&self.inner))
    }

    /// Position-addressed view over the same modules.
    pub fn experimental(&self) -> ExperimentalDetector {
        ExperimentalDetector::from_inner(Arc::clone(&self.inner))
    }

    /// Gain settings, which all modules must agree on.
    pub async fn settings(&self) -> DetResult<DetectorSettings> {
        let mut values = Vec::new();
        for module in self.inner.modules() {
            values.push(module.settings().await);
        }
        ModuleResults::from_vec(values).consistent("settings")
    }

    /// Select gain settings on every module.
    pub async fn set_settings(&self, settings: DetectorSettings) -> DetResult<()> {
        if !DetectorSettings::allowed_for(DetectorType::Eiger).contains(&settings) {
            return Err(DetError::SettingsNotSupported(settings.to_string()));
        }
        for module in self.inner.modules() {
            module.set_settings(settings).await?;
        }
        Ok(())
    }

    /// Subframe exposure time, which all modules must agree on.
    pub async fn sub_exptime(&self) -> DetResult<Duration> {
        self.experimental()
            .sub_exptime(&[])
            .await?
            .consistent("subexptime")
    }

    /// Program the subframe exposure time on every module.
    pub async fn set_sub_exptime(&self, value: Duration) -> DetResult<()> {
        self.experimental().set_sub_exptime(value, &[]).await
    }
}

impl Default for Eiger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jungfrau_boots_in_dynamic_gain() {
        let j = Jungfrau::new();
        assert_eq!(j.settings().await.unwrap(), DetectorSettings::DynamicGain);
        assert_eq!(
            j.detector().detector_type().unwrap(),
            DetectorType::Jungfrau
        );
    }

    #[tokio::test]
    async fn jungfrau_rejects_eiger_settings() {
        let j = Jungfrau::new();
        let err = j.set_settings(DetectorSettings::Standard).await.unwrap_err();
        assert!(matches!(err, DetError::SettingsNotSupported(_)));
        // Unchanged after the rejected write.
        assert_eq!(j.settings().await.unwrap(), DetectorSettings::DynamicGain);
    }

    #[tokio::test]
    async fn jungfrau_high_voltage_roundtrip() {
        let j = Jungfrau::new();
        assert_eq!(j.high_voltage().await.unwrap(), 0);
        j.set_high_voltage(120).await.unwrap();
        assert_eq!(j.high_voltage().await.unwrap(), 120);
        assert!(j.set_high_voltage(42).await.is_err());
    }

    #[tokio::test]
    async fn jungfrau_dac_accessor_uses_power_on_default() {
        let j = Jungfrau::new();
        let vref = j.dac(DacIndex::VrefPrech).unwrap();
        assert_eq!(vref.default_value(), 1450);
        assert_eq!(vref.get().await.unwrap(), 1450);
        assert!(j.dac(DacIndex::TemperatureFpga).is_err());
    }

    #[tokio::test]
    async fn eiger_boots_with_standard_settings_and_subframe() {
        let e = Eiger::new();
        assert_eq!(e.settings().await.unwrap(), DetectorSettings::Standard);
        assert_eq!(
            e.sub_exptime().await.unwrap(),
            Duration::from_nanos(2_621_440)
        );
        e.set_sub_exptime(Duration::from_millis(1)).await.unwrap();
        assert_eq!(e.sub_exptime().await.unwrap(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn multi_module_jungfrau_fans_out() {
        let j = Jungfrau::with_modules(3);
        assert_eq!(j.detector().num_modules(), 3);
        j.set_settings(DetectorSettings::FixGain1).await.unwrap();
        assert_eq!(j.settings().await.unwrap(), DetectorSettings::FixGain1);
    }
}
