//! Simulated detector module.
//!
//! Implements every capability trait against in-process state so the handle
//! layer, the CLI and the tests run without detector hardware. Power-on
//! state matches what a freshly booted module reports: per-type DAC tables,
//! 1 frame, 1 cycle, zero-length timers.
//!
//! Acquisition timing is simulated with tokio sleeps (never std::thread
//! sleeps) and capped at [`MAX_SIM_ACQUISITION`] so a misprogrammed exposure
//! cannot wedge a test run.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration, Instant};

use crate::defs::{DacIndex, DetectorSettings, DetectorType, RunStatus, TimerIndex};
use crate::hardware::capabilities::{
    AcquisitionControl, DacAccess, RegisterAccess, SensorRead, TimerAccess,
};

/// Upper bound on simulated run length, whatever the timers say.
pub const MAX_SIM_ACQUISITION: Duration = Duration::from_secs(2);

const IDLE_POLL: Duration = Duration::from_millis(2);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// 12-bit DAC over a 2.5 V reference.
const DAC_FULL_SCALE: i32 = 4095;
const DAC_FULL_SCALE_MV: i32 = 2500;

/// Date-coded version ids reported by the simulated firmware.
const FIRMWARE_VERSION: i64 = 0x190723;
const SERVER_VERSION: i64 = 0x190723;

/// DAC units to millivolts at the hardware full scale.
pub fn units_to_mv(value: i32) -> i32 {
    (i64::from(value) * i64::from(DAC_FULL_SCALE_MV) / i64::from(DAC_FULL_SCALE)) as i32
}

/// Millivolts to DAC units at the hardware full scale.
pub fn mv_to_units(mv: i32) -> i32 {
    (i64::from(mv) * i64::from(DAC_FULL_SCALE) / i64::from(DAC_FULL_SCALE_MV)) as i32
}

/// Power-on value of a DAC for a given detector type.
///
/// Types without a calibrated table boot with everything at zero.
pub fn power_on_dac(det_type: DetectorType, index: DacIndex) -> i32 {
    if det_type == DetectorType::Jungfrau {
        return match index {
            DacIndex::VbComp => 1220,
            DacIndex::VddProt => 3000,
            DacIndex::VinCom => 1053,
            DacIndex::VrefPrech => 1450,
            DacIndex::VbPixbuf => 750,
            DacIndex::VbDs => 1000,
            DacIndex::VrefDs => 480,
            DacIndex::VrefComp => 420,
            _ => 0,
        };
    }
    0
}

/// One simulated detector module.
///
/// State lives behind `Arc<RwLock>` / atomics so the acquisition task spawned
/// by [`AcquisitionControl::start_acquisition`] can outlive the borrow.
pub struct DetectorModule {
    det_type: DetectorType,
    hostname: String,
    serial_number: i64,
    dacs: Arc<RwLock<HashMap<DacIndex, i32>>>,
    timers: Arc<RwLock<HashMap<TimerIndex, i64>>>,
    registers: Arc<RwLock<HashMap<u32, u32>>>,
    settings: Arc<RwLock<DetectorSettings>>,
    status: Arc<RwLock<RunStatus>>,
    frames_caught: Arc<AtomicU64>,
    starting_frame_number: AtomicU64,
    /// Bumped on every start/stop; a finishing run only commits its result
    /// if the token it captured is still current.
    run_token: Arc<AtomicU64>,
}

impl DetectorModule {
    /// Create a simulated module at power-on state.
    ///
    /// `module_id` distinguishes modules of one detector; it feeds the
    /// hostname (`sim<module_id>`) and the serial number.
    pub fn new(det_type: DetectorType, module_id: usize) -> Self {
        Self::with_hostname(det_type, module_id, format!("sim{module_id}"))
    }

    /// Create a simulated module answering under a configured hostname.
    pub fn with_hostname(det_type: DetectorType, module_id: usize, hostname: String) -> Self {
        Self {
            det_type,
            hostname,
            serial_number: 0x18_0000 + module_id as i64,
            dacs: Arc::new(RwLock::new(Self::power_on_dacs(det_type))),
            timers: Arc::new(RwLock::new(Self::power_on_timers(det_type))),
            registers: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(DetectorSettings::power_on_for(det_type))),
            status: Arc::new(RwLock::new(RunStatus::Idle)),
            frames_caught: Arc::new(AtomicU64::new(0)),
            starting_frame_number: AtomicU64::new(1),
            run_token: Arc::new(AtomicU64::new(0)),
        }
    }

    fn power_on_dacs(det_type: DetectorType) -> HashMap<DacIndex, i32> {
        DacIndex::ALL
            .into_iter()
            .filter(|dac| !dac.is_adc())
            .map(|dac| (dac, power_on_dac(det_type, dac)))
            .collect()
    }

    fn power_on_timers(det_type: DetectorType) -> HashMap<TimerIndex, i64> {
        let mut timers: HashMap<TimerIndex, i64> = [
            TimerIndex::FrameNumber,
            TimerIndex::AcquisitionTime,
            TimerIndex::FramePeriod,
            TimerIndex::DelayAfterTrigger,
            TimerIndex::CyclesNumber,
            TimerIndex::SubframeAcquisitionTime,
            TimerIndex::SubframeDeadTime,
        ]
        .into_iter()
        .map(|t| (t, t.power_on_value()))
        .collect();
        if det_type == DetectorType::Eiger {
            // Eiger boots with a 2.62144 ms subframe exposure.
            timers.insert(TimerIndex::SubframeAcquisitionTime, 2_621_440);
        }
        timers
    }

    /// Detector type of this module.
    pub fn det_type(&self) -> DetectorType {
        self.det_type
    }

    /// Hostname the module answers under.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Module serial number.
    pub fn serial_number(&self) -> i64 {
        self.serial_number
    }

    /// Firmware version, date-coded.
    pub fn firmware_version(&self) -> i64 {
        FIRMWARE_VERSION
    }

    /// On-board server version, date-coded.
    pub fn server_version(&self) -> i64 {
        SERVER_VERSION
    }

    /// Frame number the next run starts counting from.
    pub fn starting_frame_number(&self) -> u64 {
        self.starting_frame_number.load(Ordering::SeqCst)
    }

    /// Program the frame number the next run starts counting from.
    pub fn set_starting_frame_number(&self, value: u64) -> Result<()> {
        if value == 0 {
            bail!("starting frame number must be >= 1");
        }
        self.starting_frame_number.store(value, Ordering::SeqCst);
        Ok(())
    }

    /// Current gain settings.
    pub async fn settings(&self) -> DetectorSettings {
        *self.settings.read().await
    }

    /// Select gain settings, rejecting combinations the type cannot run.
    pub async fn set_settings(&self, settings: DetectorSettings) -> Result<()> {
        if !DetectorSettings::allowed_for(self.det_type).contains(&settings) {
            bail!("settings {settings} not supported on {}", self.det_type);
        }
        *self.settings.write().await = settings;
        Ok(())
    }
}

#[async_trait]
impl DacAccess for DetectorModule {
    async fn set_dac(&self, index: DacIndex, value: i32, millivolts: bool) -> Result<i32> {
        if index.is_adc() {
            bail!("{index} is a read-only ADC channel");
        }
        if index == DacIndex::HighVoltage {
            if millivolts {
                bail!("high voltage is programmed in volts, not millivolts");
            }
            // Jungfrau HV supply: off, or 60-200 V.
            if value != 0 && !(60..=200).contains(&value) {
                bail!("high voltage {value} V outside 0|60..=200");
            }
            self.dacs.write().await.insert(index, value);
            return Ok(value);
        }
        let units = if millivolts { mv_to_units(value) } else { value };
        if !(0..=DAC_FULL_SCALE).contains(&units) {
            bail!("DAC {index} value {units} outside hardware range 0..={DAC_FULL_SCALE}");
        }
        self.dacs.write().await.insert(index, units);
        Ok(if millivolts { units_to_mv(units) } else { units })
    }

    async fn get_dac(&self, index: DacIndex, millivolts: bool) -> Result<i32> {
        if index.is_adc() {
            bail!("{index} is a read-only ADC channel, use read_adc");
        }
        let units = *self.dacs.read().await.get(&index).unwrap_or(&0);
        if index == DacIndex::HighVoltage {
            return Ok(units);
        }
        Ok(if millivolts { units_to_mv(units) } else { units })
    }
}

#[async_trait]
impl TimerAccess for DetectorModule {
    async fn set_timer(&self, index: TimerIndex, value: i64) -> Result<i64> {
        if index.is_count() && value < 1 {
            bail!("{index} must be >= 1, got {value}");
        }
        if !index.is_count() && value < 0 {
            bail!("{index} must be a non-negative duration, got {value} ns");
        }
        self.timers.write().await.insert(index, value);
        Ok(value)
    }

    async fn get_timer(&self, index: TimerIndex) -> Result<i64> {
        Ok(*self
            .timers
            .read()
            .await
            .get(&index)
            .unwrap_or(&index.power_on_value()))
    }
}

#[async_trait]
impl AcquisitionControl for DetectorModule {
    async fn start_acquisition(&self) -> Result<()> {
        {
            let mut status = self.status.write().await;
            if *status == RunStatus::Running {
                bail!("acquisition already running on {}", self.hostname);
            }
            *status = RunStatus::Running;
        }

        let (frames, cycles, exptime_ns, period_ns, delay_ns) = {
            let timers = self.timers.read().await;
            (
                *timers.get(&TimerIndex::FrameNumber).unwrap_or(&1),
                *timers.get(&TimerIndex::CyclesNumber).unwrap_or(&1),
                *timers.get(&TimerIndex::AcquisitionTime).unwrap_or(&0),
                *timers.get(&TimerIndex::FramePeriod).unwrap_or(&0),
                *timers.get(&TimerIndex::DelayAfterTrigger).unwrap_or(&0),
            )
        };
        let total_frames = (frames.max(1) as u64).saturating_mul(cycles.max(1) as u64);
        let per_frame_ns = (exptime_ns.max(0) as u64).saturating_add(period_ns.max(0) as u64);
        let run_ns = per_frame_ns
            .saturating_mul(total_frames)
            .saturating_add(delay_ns.max(0) as u64);
        let run = Duration::from_nanos(run_ns).min(MAX_SIM_ACQUISITION);

        let token = self.run_token.fetch_add(1, Ordering::SeqCst) + 1;
        let status = Arc::clone(&self.status);
        let caught = Arc::clone(&self.frames_caught);
        let run_token = Arc::clone(&self.run_token);
        tokio::spawn(async move {
            sleep(run).await;
            // A stop (or a newer start) invalidates this run's token.
            if run_token.load(Ordering::SeqCst) == token {
                caught.fetch_add(total_frames, Ordering::SeqCst);
                let mut st = status.write().await;
                if *st == RunStatus::Running {
                    *st = RunStatus::RunFinished;
                }
            }
        });
        Ok(())
    }

    async fn stop_acquisition(&self) -> Result<()> {
        self.run_token.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.write().await;
        if *status == RunStatus::Running {
            *status = RunStatus::Stopped;
        }
        Ok(())
    }

    async fn run_status(&self) -> Result<RunStatus> {
        Ok(*self.status.read().await)
    }

    async fn frames_caught(&self) -> Result<u64> {
        Ok(self.frames_caught.load(Ordering::SeqCst))
    }

    async fn wait_for_idle(&self) -> Result<()> {
        let deadline = Instant::now() + IDLE_TIMEOUT;
        loop {
            {
                let mut status = self.status.write().await;
                match *status {
                    RunStatus::Idle => return Ok(()),
                    // Acknowledging end-of-run returns the module to idle.
                    RunStatus::RunFinished | RunStatus::Stopped => {
                        *status = RunStatus::Idle;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            if Instant::now() >= deadline {
                bail!("timed out waiting for {} to go idle", self.hostname);
            }
            sleep(IDLE_POLL).await;
        }
    }
}

#[async_trait]
impl RegisterAccess for DetectorModule {
    async fn write_register(&self, addr: u32, value: u32) -> Result<u32> {
        self.registers.write().await.insert(addr, value);
        Ok(value)
    }

    async fn read_register(&self, addr: u32) -> Result<u32> {
        Ok(*self.registers.read().await.get(&addr).unwrap_or(&0))
    }

    async fn set_bit(&self, addr: u32, bit: u8) -> Result<()> {
        if bit > 31 {
            bail!("bit {bit} out of range for a 32-bit register");
        }
        let mut registers = self.registers.write().await;
        let value = registers.entry(addr).or_insert(0);
        *value |= 1 << bit;
        Ok(())
    }

    async fn clear_bit(&self, addr: u32, bit: u8) -> Result<()> {
        if bit > 31 {
            bail!("bit {bit} out of range for a 32-bit register");
        }
        let mut registers = self.registers.write().await;
        let value = registers.entry(addr).or_insert(0);
        *value &= !(1 << bit);
        Ok(())
    }
}

#[async_trait]
impl SensorRead for DetectorModule {
    async fn read_adc(&self, index: DacIndex) -> Result<i32> {
        // Millidegrees with a little thermal jitter.
        let base = match index {
            DacIndex::TemperatureAdc => 34_000,
            DacIndex::TemperatureFpga => 43_000,
            other => bail!("{other} is not an ADC channel"),
        };
        let jitter = rand::thread_rng().gen_range(0..500);
        Ok(base + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn power_on_dacs_match_type() {
        let jf = DetectorModule::new(DetectorType::Jungfrau, 0);
        assert_eq!(jf.get_dac(DacIndex::VrefPrech, false).await.unwrap(), 1450);

        let generic = DetectorModule::new(DetectorType::Generic, 0);
        assert_eq!(
            generic.get_dac(DacIndex::VrefPrech, false).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn dac_rejects_out_of_hardware_range() {
        let module = DetectorModule::new(DetectorType::Jungfrau, 0);
        assert!(module.set_dac(DacIndex::VrefDs, 4096, false).await.is_err());
        assert!(module.set_dac(DacIndex::VrefDs, -1, false).await.is_err());
        // Value untouched after the failed writes.
        assert_eq!(module.get_dac(DacIndex::VrefDs, false).await.unwrap(), 480);
    }

    #[tokio::test]
    async fn dac_millivolt_conversion_roundtrips() {
        let module = DetectorModule::new(DetectorType::Generic, 0);
        module.set_dac(DacIndex::VrefDs, 1250, true).await.unwrap();
        let units = module.get_dac(DacIndex::VrefDs, false).await.unwrap();
        assert_eq!(units, mv_to_units(1250));
        let mv = module.get_dac(DacIndex::VrefDs, true).await.unwrap();
        assert!((mv - 1250).abs() <= 1, "lossy conversion drifted: {mv}");
    }

    #[tokio::test]
    async fn high_voltage_accepts_only_supply_range() {
        let module = DetectorModule::new(DetectorType::Jungfrau, 0);
        module.set_dac(DacIndex::HighVoltage, 0, false).await.unwrap();
        module
            .set_dac(DacIndex::HighVoltage, 120, false)
            .await
            .unwrap();
        assert!(module.set_dac(DacIndex::HighVoltage, 30, false).await.is_err());
        assert!(module
            .set_dac(DacIndex::HighVoltage, 250, false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn timers_validate_counts_and_durations() {
        let module = DetectorModule::new(DetectorType::Generic, 0);
        assert!(module.set_timer(TimerIndex::FrameNumber, 0).await.is_err());
        assert!(module
            .set_timer(TimerIndex::AcquisitionTime, -5)
            .await
            .is_err());
        module.set_timer(TimerIndex::FrameNumber, 10).await.unwrap();
        assert_eq!(module.get_timer(TimerIndex::FrameNumber).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn acquisition_counts_frames_and_returns_to_idle() {
        let module = DetectorModule::new(DetectorType::Jungfrau, 0);
        module.set_timer(TimerIndex::FrameNumber, 3).await.unwrap();
        module.set_timer(TimerIndex::CyclesNumber, 2).await.unwrap();
        module
            .set_timer(TimerIndex::AcquisitionTime, 5_000_000)
            .await
            .unwrap();

        module.start_acquisition().await.unwrap();
        assert_eq!(module.run_status().await.unwrap(), RunStatus::Running);
        assert!(module.start_acquisition().await.is_err());

        module.wait_for_idle().await.unwrap();
        assert_eq!(module.run_status().await.unwrap(), RunStatus::Idle);
        assert_eq!(module.frames_caught().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn finished_run_reports_run_finished_until_acknowledged() {
        let module = DetectorModule::new(DetectorType::Generic, 0);
        module
            .set_timer(TimerIndex::AcquisitionTime, 20_000_000)
            .await
            .unwrap();
        module.start_acquisition().await.unwrap();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(module.run_status().await.unwrap(), RunStatus::RunFinished);
        module.wait_for_idle().await.unwrap();
        assert_eq!(module.run_status().await.unwrap(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn stop_aborts_without_counting_frames() {
        let module = DetectorModule::new(DetectorType::Jungfrau, 0);
        module
            .set_timer(TimerIndex::AcquisitionTime, 500_000_000)
            .await
            .unwrap();
        module.start_acquisition().await.unwrap();
        module.stop_acquisition().await.unwrap();
        assert_eq!(module.run_status().await.unwrap(), RunStatus::Stopped);
        module.wait_for_idle().await.unwrap();
        assert_eq!(module.frames_caught().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn register_bit_twiddling() {
        let module = DetectorModule::new(DetectorType::Generic, 0);
        module.set_bit(0x64, 3).await.unwrap();
        module.set_bit(0x64, 0).await.unwrap();
        assert_eq!(module.read_register(0x64).await.unwrap(), 0b1001);
        module.clear_bit(0x64, 3).await.unwrap();
        assert_eq!(module.read_register(0x64).await.unwrap(), 0b0001);
        assert!(module.set_bit(0x64, 32).await.is_err());
    }

    #[tokio::test]
    async fn temperatures_read_as_millidegrees() {
        let module = DetectorModule::new(DetectorType::Jungfrau, 0);
        let fpga = module.read_adc(DacIndex::TemperatureFpga).await.unwrap();
        assert!((43_000..44_000).contains(&fpga));
        assert!(module.read_adc(DacIndex::VrefDs).await.is_err());
    }
}
