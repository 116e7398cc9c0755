//! Detector handles.
//!
//! A handle owns a list of simulated modules and fans every operation out
//! over them, the way a multi-module detector is driven as one unit. Results
//! come back per module in a [`ModuleResults`], which can be squashed when
//! the caller expects all modules to agree.
//!
//! [`Detector`] is the stable facade (whole-detector operations only);
//! [`ExperimentalDetector`](experimental::ExperimentalDetector) adds the
//! position-addressed API, and [`classes`] holds the named detector-class
//! handles.

pub mod classes;
pub mod experimental;

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::defs::{DetectorType, RunStatus, TimerIndex};
use crate::error::{DetError, DetResult};
use crate::hardware::capabilities::{AcquisitionControl, TimerAccess};
use crate::hardware::DetectorModule;

/// Per-module results of a fanned-out operation.
///
/// Indexing order matches module positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleResults<T>(Vec<T>);

impl<T> ModuleResults<T> {
    pub(crate) fn from_vec(values: Vec<T>) -> Self {
        Self(values)
    }

    /// Iterate results in module order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Number of modules that answered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no module answered (empty detector).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying vector.
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: PartialEq + Clone> ModuleResults<T> {
    /// Collapse to one value when every module agrees.
    pub fn squash(&self) -> Option<T> {
        let first = self.0.first()?;
        if self.0.iter().all(|v| v == first) {
            Some(first.clone())
        } else {
            None
        }
    }

    /// Collapse to one value, erroring when modules disagree.
    pub fn consistent(&self, what: &'static str) -> DetResult<T> {
        self.squash().ok_or(DetError::Inconsistent(what))
    }
}

impl<T> std::ops::Index<usize> for ModuleResults<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.0[index]
    }
}

impl<T> IntoIterator for ModuleResults<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ModuleResults<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Output file settings shared by all modules of a detector.
#[derive(Debug, Clone)]
pub struct FileSettings {
    /// File name prefix.
    pub name: String,
    /// Output directory.
    pub path: PathBuf,
    /// Whether output files get written at all.
    pub write: bool,
    /// Whether existing files get overwritten.
    pub overwrite: bool,
    /// Run counter appended to file names.
    pub index: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            name: "run".to_string(),
            path: PathBuf::from("."),
            write: true,
            overwrite: true,
            index: 0,
        }
    }
}

/// Shared state behind every handle kind.
pub(crate) struct DetectorImpl {
    modules: Vec<Arc<DetectorModule>>,
    file: RwLock<FileSettings>,
}

impl DetectorImpl {
    pub(crate) fn sim(det_type: DetectorType, module_count: usize) -> Arc<Self> {
        let modules = (0..module_count.max(1))
            .map(|id| Arc::new(DetectorModule::new(det_type, id)))
            .collect();
        Arc::new(Self {
            modules,
            file: RwLock::new(FileSettings::default()),
        })
    }

    pub(crate) fn modules(&self) -> &[Arc<DetectorModule>] {
        &self.modules
    }

    /// Modules at the given positions; empty selects all.
    pub(crate) fn modules_at(&self, pos: &[usize]) -> DetResult<Vec<Arc<DetectorModule>>> {
        if pos.is_empty() {
            return Ok(self.modules.clone());
        }
        pos.iter()
            .map(|&position| {
                self.modules
                    .get(position)
                    .cloned()
                    .ok_or(DetError::PositionOutOfRange {
                        position,
                        count: self.modules.len(),
                    })
            })
            .collect()
    }

}

fn duration_to_ns(timer: TimerIndex, value: Duration) -> DetResult<i64> {
    i64::try_from(value.as_nanos()).map_err(|_| DetError::InvalidTimer {
        timer: timer.name(),
        value: i64::MAX,
    })
}

/// Generic detector handle.
///
/// Constructed with no arguments it drives a single simulated module;
/// [`Detector::with_config`] builds the module layout a config file
/// describes.
pub struct Detector {
    inner: Arc<DetectorImpl>,
}

impl Detector {
    /// A detector over one simulated generic module.
    pub fn new() -> Self {
        Self {
            inner: DetectorImpl::sim(DetectorType::Generic, 1),
        }
    }

    pub(crate) fn from_inner(inner: Arc<DetectorImpl>) -> Self {
        Self { inner }
    }

    /// Position-addressed view over the same modules.
    pub fn experimental(&self) -> experimental::ExperimentalDetector {
        experimental::ExperimentalDetector::from_inner(Arc::clone(&self.inner))
    }

    /// Build the module layout described by a config file and apply its
    /// acquisition defaults.
    pub async fn with_config(config: &Config) -> DetResult<Self> {
        config.validate().map_err(DetError::Configuration)?;
        let modules: Vec<Arc<DetectorModule>> = config
            .enabled_modules()
            .enumerate()
            .map(|(id, def)| {
                Arc::new(DetectorModule::with_hostname(
                    def.detector_type,
                    id,
                    def.hostname.clone(),
                ))
            })
            .collect();
        let inner = Arc::new(DetectorImpl {
            modules,
            file: RwLock::new(FileSettings::default()),
        });
        let detector = Self { inner };
        if detector.num_modules() == 0 {
            return Err(DetError::Configuration(
                "no enabled modules in configuration".to_string(),
            ));
        }
        let acq = &config.acquisition;
        detector.set_frames(acq.frames).await?;
        detector.set_cycles(acq.cycles).await?;
        detector.set_exptime(acq.exptime).await?;
        detector.set_period(acq.period).await?;
        info!(modules = detector.num_modules(), "detector configured");
        Ok(detector)
    }

    /// Number of modules behind this handle.
    pub fn num_modules(&self) -> usize {
        self.inner.modules().len()
    }

    /// Hostname of every module.
    pub fn hostname(&self) -> ModuleResults<String> {
        ModuleResults::from_vec(
            self.inner
                .modules()
                .iter()
                .map(|m| m.hostname().to_string())
                .collect(),
        )
    }

    /// Detector type, which all modules must share.
    pub fn detector_type(&self) -> DetResult<DetectorType> {
        ModuleResults::from_vec(self.inner.modules().iter().map(|m| m.det_type()).collect())
            .consistent("detector type")
    }

    /// Total channel geometry, modules stacked along y.
    pub fn total_channels(&self) -> DetResult<(u32, u32)> {
        let (x, y) = self.detector_type()?.channels();
        Ok((x, y * self.num_modules() as u32))
    }

    /// Firmware version of every module.
    pub fn firmware_version(&self) -> ModuleResults<i64> {
        ModuleResults::from_vec(
            self.inner
                .modules()
                .iter()
                .map(|m| m.firmware_version())
                .collect(),
        )
    }

    /// On-board server version of every module.
    pub fn server_version(&self) -> ModuleResults<i64> {
        ModuleResults::from_vec(
            self.inner
                .modules()
                .iter()
                .map(|m| m.server_version())
                .collect(),
        )
    }

    /// Serial number of every module.
    pub fn serial_number(&self) -> ModuleResults<i64> {
        ModuleResults::from_vec(
            self.inner
                .modules()
                .iter()
                .map(|m| m.serial_number())
                .collect(),
        )
    }

    async fn get_duration(&self, timer: TimerIndex) -> DetResult<Duration> {
        let mut values = Vec::with_capacity(self.num_modules());
        for module in self.inner.modules() {
            values.push(module.get_timer(timer).await?);
        }
        let ns = ModuleResults::from_vec(values).consistent(timer.name())?;
        Ok(Duration::from_nanos(ns.max(0) as u64))
    }

    async fn set_duration(&self, timer: TimerIndex, value: Duration) -> DetResult<()> {
        let ns = duration_to_ns(timer, value)?;
        for module in self.inner.modules() {
            module.set_timer(timer, ns).await?;
        }
        debug!(timer = %timer, ns, "timer programmed");
        Ok(())
    }

    async fn get_count(&self, timer: TimerIndex) -> DetResult<u64> {
        let mut values = Vec::with_capacity(self.num_modules());
        for module in self.inner.modules() {
            values.push(module.get_timer(timer).await?);
        }
        let count = ModuleResults::from_vec(values).consistent(timer.name())?;
        Ok(count.max(0) as u64)
    }

    async fn set_count(&self, timer: TimerIndex, value: u64) -> DetResult<()> {
        let value = i64::try_from(value).map_err(|_| DetError::InvalidTimer {
            timer: timer.name(),
            value: i64::MAX,
        })?;
        for module in self.inner.modules() {
            module.set_timer(timer, value).await?;
        }
        Ok(())
    }

    /// Exposure time per frame.
    pub async fn exptime(&self) -> DetResult<Duration> {
        self.get_duration(TimerIndex::AcquisitionTime).await
    }

    /// Program the exposure time per frame.
    pub async fn set_exptime(&self, value: Duration) -> DetResult<()> {
        self.set_duration(TimerIndex::AcquisitionTime, value).await
    }

    /// Frame period.
    pub async fn period(&self) -> DetResult<Duration> {
        self.get_duration(TimerIndex::FramePeriod).await
    }

    /// Program the frame period.
    pub async fn set_period(&self, value: Duration) -> DetResult<()> {
        self.set_duration(TimerIndex::FramePeriod, value).await
    }

    /// Delay after trigger.
    pub async fn delay(&self) -> DetResult<Duration> {
        self.get_duration(TimerIndex::DelayAfterTrigger).await
    }

    /// Program the delay after trigger.
    pub async fn set_delay(&self, value: Duration) -> DetResult<()> {
        self.set_duration(TimerIndex::DelayAfterTrigger, value).await
    }

    /// Frames per cycle.
    pub async fn frames(&self) -> DetResult<u64> {
        self.get_count(TimerIndex::FrameNumber).await
    }

    /// Program frames per cycle (>= 1).
    pub async fn set_frames(&self, value: u64) -> DetResult<()> {
        self.set_count(TimerIndex::FrameNumber, value).await
    }

    /// Trigger cycles.
    pub async fn cycles(&self) -> DetResult<u64> {
        self.get_count(TimerIndex::CyclesNumber).await
    }

    /// Program trigger cycles (>= 1).
    pub async fn set_cycles(&self, value: u64) -> DetResult<()> {
        self.set_count(TimerIndex::CyclesNumber, value).await
    }

    /// Run state of every module, queried in parallel.
    pub async fn status(&self) -> DetResult<ModuleResults<RunStatus>> {
        let values =
            try_join_all(self.inner.modules().iter().map(|m| m.run_status())).await?;
        Ok(ModuleResults::from_vec(values))
    }

    /// Frames caught by every module since power-on.
    pub async fn frames_caught(&self) -> DetResult<ModuleResults<u64>> {
        let values =
            try_join_all(self.inner.modules().iter().map(|m| m.frames_caught())).await?;
        Ok(ModuleResults::from_vec(values))
    }

    /// Start a run on every module without waiting for it.
    pub async fn start_acquisition(&self) -> DetResult<()> {
        try_join_all(
            self.inner
                .modules()
                .iter()
                .map(|m| m.start_acquisition()),
        )
        .await?;
        Ok(())
    }

    /// Abort the run on every module.
    pub async fn stop_acquisition(&self) -> DetResult<()> {
        try_join_all(
            self.inner
                .modules()
                .iter()
                .map(|m| m.stop_acquisition()),
        )
        .await?;
        Ok(())
    }

    /// Run one acquisition to completion on every module.
    ///
    /// Bumps the file index afterwards when file writing is enabled, so
    /// consecutive runs land in distinct files.
    pub async fn acquire(&self) -> DetResult<()> {
        info!("starting acquisition");
        self.start_acquisition().await?;
        try_join_all(self.inner.modules().iter().map(|m| m.wait_for_idle())).await?;
        let mut file = self.inner.file.write().await;
        if file.write {
            file.index += 1;
        }
        info!("acquisition finished");
        Ok(())
    }

    /// Output file name prefix.
    pub async fn file_name(&self) -> String {
        self.inner.file.read().await.name.clone()
    }

    /// Set the output file name prefix.
    pub async fn set_file_name(&self, name: &str) -> DetResult<()> {
        if name.is_empty() || name.contains('/') {
            return Err(DetError::Configuration(format!(
                "invalid file name '{name}'"
            )));
        }
        self.inner.file.write().await.name = name.to_string();
        Ok(())
    }

    /// Output directory.
    pub async fn file_path(&self) -> PathBuf {
        self.inner.file.read().await.path.clone()
    }

    /// Set the output directory.
    pub async fn set_file_path(&self, path: &Path) -> DetResult<()> {
        self.inner.file.write().await.path = path.to_path_buf();
        Ok(())
    }

    /// Whether modules write output files.
    pub async fn file_write(&self) -> bool {
        self.inner.file.read().await.write
    }

    /// Enable or disable output file writing.
    pub async fn set_file_write(&self, enable: bool) {
        self.inner.file.write().await.write = enable;
    }

    /// Whether existing output files get overwritten.
    pub async fn file_overwrite(&self) -> bool {
        self.inner.file.read().await.overwrite
    }

    /// Enable or disable overwriting of existing output files.
    pub async fn set_file_overwrite(&self, enable: bool) {
        self.inner.file.write().await.overwrite = enable;
    }

    /// Current file index (bumped after each written acquisition).
    pub async fn file_index(&self) -> u64 {
        self.inner.file.read().await.index
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Detector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squash_requires_agreement() {
        let same = ModuleResults::from_vec(vec![3, 3, 3]);
        assert_eq!(same.squash(), Some(3));
        assert_eq!(same.consistent("value").unwrap(), 3);

        let mixed = ModuleResults::from_vec(vec![3, 4]);
        assert_eq!(mixed.squash(), None);
        assert!(matches!(
            mixed.consistent("value"),
            Err(DetError::Inconsistent("value"))
        ));
    }

    #[test]
    fn empty_results_squash_to_none() {
        let empty: ModuleResults<i32> = ModuleResults::from_vec(Vec::new());
        assert_eq!(empty.squash(), None);
    }

    #[tokio::test]
    async fn detector_defaults() {
        let d = Detector::new();
        assert_eq!(d.num_modules(), 1);
        assert_eq!(d.detector_type().unwrap(), DetectorType::Generic);
        assert_eq!(d.frames().await.unwrap(), 1);
        assert_eq!(d.cycles().await.unwrap(), 1);
        assert_eq!(d.exptime().await.unwrap(), Duration::ZERO);
        assert_eq!(d.file_name().await, "run");
        assert!(d.file_write().await);
    }

    #[tokio::test]
    async fn exposure_roundtrip() {
        let d = Detector::new();
        d.set_exptime(Duration::from_millis(10)).await.unwrap();
        assert_eq!(d.exptime().await.unwrap(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn file_name_rejects_separators() {
        let d = Detector::new();
        assert!(d.set_file_name("runs/background").await.is_err());
        assert!(d.set_file_name("").await.is_err());
        d.set_file_name("background").await.unwrap();
        assert_eq!(d.file_name().await, "background");
    }

    #[tokio::test]
    async fn acquire_bumps_file_index_only_when_writing() {
        let d = Detector::new();
        d.acquire().await.unwrap();
        assert_eq!(d.file_index().await, 1);

        d.set_file_write(false).await;
        d.acquire().await.unwrap();
        assert_eq!(d.file_index().await, 1);
    }
}
