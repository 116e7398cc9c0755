//! # Detector Control Library
//!
//! Client library for controlling SLS-style pixel detectors (Jungfrau,
//! Eiger, Gotthard, Moench, chip test boards). It provides typed handles
//! over one or more detector modules, range-checked DAC accessors, and a
//! decoder for the vendor raw-frame file format.
//!
//! The on-wire protocol of real detector servers is out of scope: the
//! handles talk to capability traits, and the crate ships an in-process
//! simulated module behind them, so everything here runs without hardware.
//!
//! ## Crate Structure
//!
//! - **`config`**: Figment-based configuration (TOML + `DETCON_` env
//!   overrides) describing the module layout and acquisition defaults.
//! - **`dacs`**: The [`Dac`] accessor binding a DAC index plus bounds and a
//!   default value to a detector handle.
//! - **`defs`**: Detector definitions: detector types, DAC indices, run
//!   status, timers and gain settings.
//! - **`detector`**: The handles. [`Detector`] is the stable facade,
//!   [`ExperimentalDetector`] the position-addressed API, [`Jungfrau`] and
//!   [`Eiger`] the named detector classes.
//! - **`error`**: The [`DetError`] enum used across the library.
//! - **`hardware`**: Capability traits and the simulated module backend.
//! - **`io`**: Raw-file decoding ([`io::read_my302_file`]).
//! - **`logging`**: Tracing setup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use detcon::defs::DacIndex;
//! use detcon::{Dac, Detector, ExperimentalDetector, Jungfrau};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let d = Detector::new();
//! let e = ExperimentalDetector::new();
//! let c = Dac::new(DacIndex::from_index(3)?, 0, 4000, 2000, &e);
//! let j = Jungfrau::new();
//!
//! c.set_default().await?;
//! j.detector().acquire().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dacs;
pub mod defs;
pub mod detector;
pub mod error;
pub mod hardware;
pub mod io;
pub mod logging;

pub use dacs::Dac;
pub use detector::classes::{Eiger, Jungfrau};
pub use detector::experimental::ExperimentalDetector;
pub use detector::{Detector, ModuleResults};
pub use error::{DetError, DetResult};
