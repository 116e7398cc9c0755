//! Hardware seam: capability traits and the simulated module backend.
//!
//! The on-wire protocol of real detector servers is out of scope for this
//! crate; everything above this module talks to a [`capabilities`] trait
//! object and never to a socket. [`sim`] provides the in-process module
//! implementation used by the handles, the CLI and the tests.

pub mod capabilities;
pub mod sim;

pub use capabilities::{
    AcquisitionControl, DacAccess, RegisterAccess, SensorRead, TimerAccess,
};
pub use sim::{mv_to_units, power_on_dac, units_to_mv, DetectorModule};
