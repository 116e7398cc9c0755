//! Detector definitions shared across the crate.
//!
//! The enums here mirror what the detector firmware speaks: detector types,
//! index-addressed DACs, run status, timer channels and gain settings. The
//! numeric discriminants of [`DacIndex`] are part of the public contract,
//! since callers address DACs by raw index (`DacIndex::from_index(3)`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DetError, DetResult};

/// Detector classes understood by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectorType {
    /// Placeholder type used before a module reports what it is.
    #[default]
    Generic,
    Eiger,
    Gotthard,
    Moench,
    Jungfrau,
    ChipTestBoard,
}

impl DetectorType {
    /// Sensor geometry as (channels_x, channels_y) for one module.
    ///
    /// `Generic` has no fixed geometry and reports (0, 0).
    pub fn channels(&self) -> (u32, u32) {
        match self {
            DetectorType::Generic => (0, 0),
            DetectorType::Eiger => (1024, 512),
            DetectorType::Gotthard => (1280, 1),
            DetectorType::Moench => (400, 400),
            DetectorType::Jungfrau => (1024, 512),
            DetectorType::ChipTestBoard => (36, 1),
        }
    }

    /// Wire id used in raw-file frame headers.
    pub fn as_u8(&self) -> u8 {
        match self {
            DetectorType::Generic => 0,
            DetectorType::Eiger => 1,
            DetectorType::Gotthard => 2,
            DetectorType::Moench => 3,
            DetectorType::Jungfrau => 4,
            DetectorType::ChipTestBoard => 5,
        }
    }

    /// Inverse of [`DetectorType::as_u8`].
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DetectorType::Generic),
            1 => Some(DetectorType::Eiger),
            2 => Some(DetectorType::Gotthard),
            3 => Some(DetectorType::Moench),
            4 => Some(DetectorType::Jungfrau),
            5 => Some(DetectorType::ChipTestBoard),
            _ => None,
        }
    }
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorType::Generic => "generic",
            DetectorType::Eiger => "eiger",
            DetectorType::Gotthard => "gotthard",
            DetectorType::Moench => "moench",
            DetectorType::Jungfrau => "jungfrau",
            DetectorType::ChipTestBoard => "chiptestboard",
        };
        write!(f, "{name}")
    }
}

/// Index-addressed DAC identifiers.
///
/// Indices 0..=7 are the on-chip bias DACs in firmware order; the indices
/// from 100 upwards address auxiliary channels (high voltage supply and the
/// temperature ADCs, which are read-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DacIndex {
    VbComp = 0,
    VddProt = 1,
    VinCom = 2,
    VrefPrech = 3,
    VbPixbuf = 4,
    VbDs = 5,
    VrefDs = 6,
    VrefComp = 7,
    HighVoltage = 100,
    TemperatureAdc = 101,
    TemperatureFpga = 102,
}

impl DacIndex {
    /// All known indices, in firmware order.
    pub const ALL: [DacIndex; 11] = [
        DacIndex::VbComp,
        DacIndex::VddProt,
        DacIndex::VinCom,
        DacIndex::VrefPrech,
        DacIndex::VbPixbuf,
        DacIndex::VbDs,
        DacIndex::VrefDs,
        DacIndex::VrefComp,
        DacIndex::HighVoltage,
        DacIndex::TemperatureAdc,
        DacIndex::TemperatureFpga,
    ];

    /// Resolve a raw firmware index.
    pub fn from_index(index: i32) -> DetResult<Self> {
        Self::ALL
            .into_iter()
            .find(|dac| dac.as_index() == index)
            .ok_or(DetError::UnknownDacIndex(index))
    }

    /// Resolve the command-line name of a DAC (e.g. `vref_ds`).
    pub fn from_name(name: &str) -> DetResult<Self> {
        Self::ALL
            .into_iter()
            .find(|dac| dac.name() == name)
            .ok_or_else(|| DetError::UnknownDacName(name.to_string()))
    }

    /// Raw firmware index.
    pub fn as_index(self) -> i32 {
        self as i32
    }

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            DacIndex::VbComp => "vb_comp",
            DacIndex::VddProt => "vdd_prot",
            DacIndex::VinCom => "vin_com",
            DacIndex::VrefPrech => "vref_prech",
            DacIndex::VbPixbuf => "vb_pixbuf",
            DacIndex::VbDs => "vb_ds",
            DacIndex::VrefDs => "vref_ds",
            DacIndex::VrefComp => "vref_comp",
            DacIndex::HighVoltage => "vhighvoltage",
            DacIndex::TemperatureAdc => "temp_adc",
            DacIndex::TemperatureFpga => "temp_fpga",
        }
    }

    /// True for read-only ADC channels (temperatures).
    pub fn is_adc(self) -> bool {
        matches!(self, DacIndex::TemperatureAdc | DacIndex::TemperatureFpga)
    }
}

impl fmt::Display for DacIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Run state reported by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Idle,
    Error,
    Waiting,
    RunFinished,
    Transmitting,
    Running,
    Stopped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Idle => "idle",
            RunStatus::Error => "error",
            RunStatus::Waiting => "waiting",
            RunStatus::RunFinished => "finished",
            RunStatus::Transmitting => "data",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// Timer channels on a module.
///
/// Duration-valued timers hold nanoseconds; `FrameNumber` and `CyclesNumber`
/// hold counts. Power-on values are 1 frame, 1 cycle and zero durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerIndex {
    FrameNumber,
    AcquisitionTime,
    FramePeriod,
    DelayAfterTrigger,
    CyclesNumber,
    SubframeAcquisitionTime,
    SubframeDeadTime,
}

impl TimerIndex {
    /// True for the count-valued timers (frames, cycles).
    pub fn is_count(self) -> bool {
        matches!(self, TimerIndex::FrameNumber | TimerIndex::CyclesNumber)
    }

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            TimerIndex::FrameNumber => "frames",
            TimerIndex::AcquisitionTime => "exptime",
            TimerIndex::FramePeriod => "period",
            TimerIndex::DelayAfterTrigger => "delay",
            TimerIndex::CyclesNumber => "cycles",
            TimerIndex::SubframeAcquisitionTime => "subexptime",
            TimerIndex::SubframeDeadTime => "subdeadtime",
        }
    }

    /// Power-on value of this timer.
    pub fn power_on_value(self) -> i64 {
        if self.is_count() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for TimerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Gain settings. Which subset applies depends on the detector type:
/// Jungfrau uses the dynamic/fixed/forced gain family, Eiger the
/// standard/high/low family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorSettings {
    Undefined,
    Standard,
    HighGain,
    LowGain,
    VeryHighGain,
    VeryLowGain,
    DynamicGain,
    DynamicHg0,
    FixGain1,
    FixGain2,
    ForceSwitchG1,
    ForceSwitchG2,
}

impl DetectorSettings {
    /// Settings selectable for a given detector type.
    pub fn allowed_for(det_type: DetectorType) -> &'static [DetectorSettings] {
        match det_type {
            DetectorType::Jungfrau => &[
                DetectorSettings::DynamicGain,
                DetectorSettings::DynamicHg0,
                DetectorSettings::FixGain1,
                DetectorSettings::FixGain2,
                DetectorSettings::ForceSwitchG1,
                DetectorSettings::ForceSwitchG2,
            ],
            DetectorType::Eiger => &[
                DetectorSettings::Standard,
                DetectorSettings::HighGain,
                DetectorSettings::LowGain,
                DetectorSettings::VeryHighGain,
                DetectorSettings::VeryLowGain,
            ],
            _ => &[],
        }
    }

    /// Power-on settings for a detector type.
    pub fn power_on_for(det_type: DetectorType) -> DetectorSettings {
        match det_type {
            DetectorType::Jungfrau => DetectorSettings::DynamicGain,
            DetectorType::Eiger => DetectorSettings::Standard,
            _ => DetectorSettings::Undefined,
        }
    }
}

impl fmt::Display for DetectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorSettings::Undefined => "undefined",
            DetectorSettings::Standard => "standard",
            DetectorSettings::HighGain => "highgain",
            DetectorSettings::LowGain => "lowgain",
            DetectorSettings::VeryHighGain => "veryhighgain",
            DetectorSettings::VeryLowGain => "verylowgain",
            DetectorSettings::DynamicGain => "dynamicgain",
            DetectorSettings::DynamicHg0 => "dynamichg0",
            DetectorSettings::FixGain1 => "fixgain1",
            DetectorSettings::FixGain2 => "fixgain2",
            DetectorSettings::ForceSwitchG1 => "forceswitchg1",
            DetectorSettings::ForceSwitchG2 => "forceswitchg2",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dac_index_roundtrip() {
        for dac in DacIndex::ALL {
            assert_eq!(DacIndex::from_index(dac.as_index()).unwrap(), dac);
            assert_eq!(DacIndex::from_name(dac.name()).unwrap(), dac);
        }
    }

    #[test]
    fn dac_index_3_is_vref_prech() {
        assert_eq!(DacIndex::from_index(3).unwrap(), DacIndex::VrefPrech);
    }

    #[test]
    fn unknown_dac_index_is_rejected() {
        assert!(matches!(
            DacIndex::from_index(42),
            Err(DetError::UnknownDacIndex(42))
        ));
        assert!(DacIndex::from_name("vcmp_ll").is_err());
    }

    #[test]
    fn detector_type_wire_id_roundtrip() {
        for t in [
            DetectorType::Generic,
            DetectorType::Eiger,
            DetectorType::Gotthard,
            DetectorType::Moench,
            DetectorType::Jungfrau,
            DetectorType::ChipTestBoard,
        ] {
            assert_eq!(DetectorType::from_u8(t.as_u8()), Some(t));
        }
        assert_eq!(DetectorType::from_u8(200), None);
    }

    #[test]
    fn timer_power_on_values() {
        assert_eq!(TimerIndex::FrameNumber.power_on_value(), 1);
        assert_eq!(TimerIndex::CyclesNumber.power_on_value(), 1);
        assert_eq!(TimerIndex::AcquisitionTime.power_on_value(), 0);
    }

    #[test]
    fn jungfrau_settings_exclude_eiger_family() {
        let allowed = DetectorSettings::allowed_for(DetectorType::Jungfrau);
        assert!(allowed.contains(&DetectorSettings::DynamicGain));
        assert!(!allowed.contains(&DetectorSettings::Standard));
    }

    #[test]
    fn run_status_display_matches_cli_names() {
        assert_eq!(RunStatus::RunFinished.to_string(), "finished");
        assert_eq!(RunStatus::Transmitting.to_string(), "data");
    }
}
