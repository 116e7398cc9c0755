//! Acquisition flow through the public handles: program timers, run,
//! observe status transitions and frame counters.

use std::time::Duration;

use detcon::defs::RunStatus;
use detcon::{Detector, Jungfrau};

#[tokio::test]
async fn acquire_counts_frames_times_cycles() {
    let d = Detector::new();
    d.set_frames(4).await.unwrap();
    d.set_cycles(2).await.unwrap();
    d.set_exptime(Duration::from_millis(2)).await.unwrap();

    d.acquire().await.unwrap();

    assert_eq!(d.status().await.unwrap().squash(), Some(RunStatus::Idle));
    assert_eq!(d.frames_caught().await.unwrap().squash(), Some(8));
}

#[tokio::test]
async fn status_is_running_during_a_run() {
    let d = Detector::new();
    d.set_exptime(Duration::from_millis(100)).await.unwrap();

    d.start_acquisition().await.unwrap();
    assert_eq!(d.status().await.unwrap().squash(), Some(RunStatus::Running));

    // A second start while running must fail.
    assert!(d.start_acquisition().await.is_err());

    d.stop_acquisition().await.unwrap();
    assert_eq!(d.status().await.unwrap().squash(), Some(RunStatus::Stopped));
}

#[tokio::test]
async fn counters_reject_zero() {
    let d = Detector::new();
    assert!(d.set_frames(0).await.is_err());
    assert!(d.set_cycles(0).await.is_err());
    // Unchanged after the rejected writes.
    assert_eq!(d.frames().await.unwrap(), 1);
    assert_eq!(d.cycles().await.unwrap(), 1);
}

#[tokio::test]
async fn multi_module_acquisition_fans_out() {
    let j = Jungfrau::with_modules(2);
    let d = j.detector();
    d.set_frames(3).await.unwrap();
    d.set_exptime(Duration::from_millis(1)).await.unwrap();

    d.acquire().await.unwrap();

    let caught = d.frames_caught().await.unwrap();
    assert_eq!(caught.len(), 2);
    assert_eq!(caught.squash(), Some(3));
}

#[tokio::test]
async fn consecutive_written_runs_bump_the_file_index() {
    let d = Detector::new();
    assert_eq!(d.file_index().await, 0);
    d.acquire().await.unwrap();
    d.acquire().await.unwrap();
    assert_eq!(d.file_index().await, 2);
}
