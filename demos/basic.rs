//! Construct the standard handle zoo: a generic detector, the experimental
//! position-addressed API, a DAC accessor over it, and a Jungfrau.
//!
//! Run with `cargo run --example basic`.

use detcon::defs::DacIndex;
use detcon::{Dac, Detector, ExperimentalDetector, Jungfrau};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let d = Detector::new();
    let e = ExperimentalDetector::new();
    let c = Dac::new(DacIndex::from_index(3)?, 0, 4000, 2000, &e);
    let j = Jungfrau::new();

    println!(
        "detector: {} module(s), type {}",
        d.num_modules(),
        d.detector_type()?
    );

    c.set_default().await?;
    println!("{c} -> {} dacu", c.get().await?);

    println!("jungfrau settings: {}", j.settings().await?);
    for status in j.detector().status().await?.iter() {
        println!("jungfrau status: {status}");
    }

    Ok(())
}
