/// Scheduler loop: a dedicated OS thread that ticks the engine at frame cadence.
///
///   Idle   → parked on the engine's doorbell, no ticks
///   Armed  → woken by an activation, first tick pending
///   Active → tick, sleep one frame (fallback cadence when no frame time), repeat
///   Active → Idle once a tick settles the store
///
/// `stop()` (or drop) wakes the thread, joins it and leaves the motors off.

use crate::engine::RumbleEngine;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Cadence used when the host has no frame time.
pub const DEFAULT_FALLBACK_CADENCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Active,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Armed,
            2 => Phase::Active,
            _ => Phase::Idle,
        }
    }
}

/// Sleep between ticks: one host frame, or `fallback` when the frame time is
/// missing, zero or garbage. Never longer than `fallback`, since an active
/// sleep only wakes early for a stop.
pub fn cadence(frame_delta: f32, fallback: Duration) -> Duration {
    if frame_delta.is_finite() && frame_delta > 0.0 {
        Duration::try_from_secs_f32(frame_delta)
            .unwrap_or(fallback)
            .min(fallback)
    } else {
        fallback
    }
}

pub struct Scheduler {
    engine: Arc<RumbleEngine>,
    phase: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the scheduler thread for `engine`.
    pub fn start(engine: Arc<RumbleEngine>, fallback: Duration) -> std::io::Result<Self> {
        engine.wake().clear_stop();
        let phase = Arc::new(AtomicU8::new(Phase::Idle as u8));
        let thread = {
            let engine = Arc::clone(&engine);
            let phase = Arc::clone(&phase);
            std::thread::Builder::new()
                .name("rumble-scheduler".into())
                .spawn(move || run(&engine, &phase, fallback))?
        };
        log::info!("Rumble scheduler started (fallback cadence {}ms)", fallback.as_millis());
        Ok(Self {
            engine,
            phase,
            thread: Some(thread),
        })
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Signal the thread to exit and wait for it. Idempotent.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.engine.wake().request_stop();
        if thread.join().is_err() {
            log::error!("Rumble scheduler thread panicked");
            self.engine.silence();
        }
        log::info!("Rumble scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(engine: &RumbleEngine, phase: &AtomicU8, fallback: Duration) {
    loop {
        if !engine.is_active() {
            phase.store(Phase::Idle as u8, Ordering::Relaxed);
            if !engine.wake().wait_armed(fallback) {
                break;
            }
            if !engine.is_active() {
                continue;
            }
            phase.store(Phase::Armed as u8, Ordering::Relaxed);
        }

        let delta = engine.clock().frame_delta();
        match engine.tick(delta) {
            Ok(tick) if !tick.keep_running => {
                phase.store(Phase::Idle as u8, Ordering::Relaxed);
                continue;
            }
            Ok(_) => phase.store(Phase::Active as u8, Ordering::Relaxed),
            Err(e) => log::warn!("Rumble tick failed: {e}"),
        }

        if !engine.wake().sleep(cadence(delta, fallback)) {
            break;
        }
    }
    engine.silence();
    phase.store(Phase::Idle as u8, Ordering::Relaxed);
}
