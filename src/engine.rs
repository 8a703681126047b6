/// Blend/decay engine: owns the state store and the actuation sink.
///
/// One tick:
///   host paused or frame delta unavailable → send 0, leave the store untouched
///   otherwise                              → snapshot + decay, send the blend
///   blend is 0 and nothing pending         → settle the store (scheduler goes idle)

use crate::channel::{Channel, ChannelTable};
use crate::error::Result;
use crate::host::FrameClock;
use crate::sink::RumbleSink;
use crate::store::RumbleStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Value sent to the sink, 0..=1.
    pub intensity: f32,
    /// False once the store has settled and the scheduler may idle.
    pub keep_running: bool,
}

pub struct RumbleEngine {
    store: RumbleStore,
    clock: Arc<dyn FrameClock>,
    sink: Mutex<Box<dyn RumbleSink>>,
    wake: Wake,
    /// Set while the sink is failing, so an outage is reported once.
    sink_down: AtomicBool,
}

impl RumbleEngine {
    pub fn new(table: ChannelTable, clock: Arc<dyn FrameClock>, sink: Box<dyn RumbleSink>) -> Self {
        Self {
            store: RumbleStore::new(table),
            clock,
            sink: Mutex::new(sink),
            wake: Wake::default(),
            sink_down: AtomicBool::new(false),
        }
    }

    /// Start or extend a channel's pulse. Safe to call from any thread.
    /// Wakes the scheduler if it was idle.
    pub fn activate(&self, channel: Channel, scale: f32) -> Result<()> {
        let armed = self.store.activate(channel, scale)?;
        log::debug!("Activate {channel} (scale {scale:.2})");
        if armed {
            log::debug!("Rumble armed");
            self.wake.arm();
        }
        Ok(())
    }

    pub fn store(&self) -> &RumbleStore {
        &self.store
    }

    pub fn clock(&self) -> &dyn FrameClock {
        self.clock.as_ref()
    }

    /// True while the scheduler should keep ticking.
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    pub(crate) fn tick(&self, delta: f32) -> Result<Tick> {
        if !self.clock.is_simulation_active() || delta == 0.0 {
            self.emit(0.0);
            return Ok(Tick { intensity: 0.0, keep_running: true });
        }

        let intensity = self.store.snapshot_and_decay(delta)?;
        self.emit(intensity);

        if intensity == 0.0 && self.store.settle() {
            log::debug!("Rumble settled, going idle");
        }
        Ok(Tick {
            intensity,
            keep_running: self.store.is_active(),
        })
    }

    /// Turn the motors off without touching the store.
    pub(crate) fn silence(&self) {
        self.emit(0.0);
    }

    pub(crate) fn wake(&self) -> &Wake {
        &self.wake
    }

    fn emit(&self, intensity: f32) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.set_intensity(intensity) {
            Ok(()) => {
                if self.sink_down.swap(false, Ordering::Relaxed) {
                    log::info!("Rumble output restored");
                }
            }
            Err(e) => {
                if !self.sink_down.swap(true, Ordering::Relaxed) {
                    log::warn!("Rumble output unavailable: {e}. State keeps updating.");
                } else {
                    log::trace!("Rumble output still unavailable: {e}");
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct WakeFlags {
    armed: bool,
    stopping: bool,
}

/// Doorbell between activations, the scheduler thread and shutdown.
#[derive(Debug, Default)]
pub(crate) struct Wake {
    flags: Mutex<WakeFlags>,
    cv: Condvar,
}

impl Wake {
    fn arm(&self) {
        self.lock().armed = true;
        self.cv.notify_all();
    }

    pub(crate) fn request_stop(&self) {
        self.lock().stopping = true;
        self.cv.notify_all();
    }

    pub(crate) fn clear_stop(&self) {
        self.lock().stopping = false;
    }

    /// Block until armed, stopping, or `timeout`. Consumes the armed flag.
    /// Returns false when a stop was requested.
    pub(crate) fn wait_armed(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut flags, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |f| !f.armed && !f.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        flags.armed = false;
        !flags.stopping
    }

    /// Sleep for `cadence` unless a stop is requested first.
    /// Returns false when a stop was requested.
    pub(crate) fn sleep(&self, cadence: Duration) -> bool {
        let guard = self.lock();
        let (flags, _) = self
            .cv
            .wait_timeout_while(guard, cadence, |f| !f.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        !flags.stopping
    }

    fn lock(&self) -> MutexGuard<'_, WakeFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RumbleError;
    use crate::host::SharedClock;
    use crate::sink::{DisconnectedSink, RecordingSink};
    use approx::assert_abs_diff_eq;
    use std::time::Instant;

    fn engine_with(clock: Arc<SharedClock>) -> (RumbleEngine, RecordingSink) {
        let sink = RecordingSink::default();
        let engine = RumbleEngine::new(ChannelTable::default(), clock, Box::new(sink.clone()));
        (engine, sink)
    }

    #[test]
    fn tick_emits_blend_and_decays() {
        let clock = Arc::new(SharedClock::new(0.1));
        let (engine, sink) = engine_with(clock);
        engine.activate(Channel::Pain, 1.0).unwrap();

        let t = engine.tick(0.1).unwrap();
        assert_eq!(t.intensity, 0.75);
        assert!(t.keep_running);
        assert_abs_diff_eq!(engine.store().remaining(Channel::Pain), 0.4, epsilon = 1e-6);
        assert_eq!(sink.values(), vec![0.75]);
    }

    #[test]
    fn runs_until_settled_then_stops() {
        let clock = Arc::new(SharedClock::new(0.1));
        let (engine, sink) = engine_with(clock);
        engine.activate(Channel::Hit, 1.0).unwrap();

        let mut ticks = 0;
        loop {
            let t = engine.tick(0.1).unwrap();
            ticks += 1;
            if !t.keep_running {
                assert_eq!(t.intensity, 0.0);
                break;
            }
            assert!(ticks < 20, "engine never settled");
        }
        assert!(!engine.is_active());
        assert_eq!(sink.values().last().copied(), Some(0.0));
        for c in Channel::ALL {
            assert_eq!(engine.store().remaining(c), 0.0);
        }
    }

    #[test]
    fn paused_host_forces_zero_and_preserves_state() {
        let clock = Arc::new(SharedClock::new(0.1));
        let (engine, sink) = engine_with(Arc::clone(&clock));
        engine.activate(Channel::Pain, 1.0).unwrap();
        engine.tick(0.1).unwrap();

        clock.set_simulation_active(false);
        for _ in 0..3 {
            let t = engine.tick(0.1).unwrap();
            assert_eq!(t.intensity, 0.0);
            assert!(t.keep_running);
        }
        assert_abs_diff_eq!(engine.store().remaining(Channel::Pain), 0.4, epsilon = 1e-6);

        // Resumes at the residual level.
        clock.set_simulation_active(true);
        let t = engine.tick(0.1).unwrap();
        assert_abs_diff_eq!(t.intensity, 0.75 * 0.8, epsilon = 1e-5);
        assert_eq!(&sink.values()[1..4], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn unavailable_frame_delta_holds_state() {
        let clock = Arc::new(SharedClock::new(0.0));
        let (engine, _sink) = engine_with(clock);
        engine.activate(Channel::Struck, 1.0).unwrap();
        let t = engine.tick(0.0).unwrap();
        assert_eq!(t, Tick { intensity: 0.0, keep_running: true });
        assert_eq!(engine.store().remaining(Channel::Struck), 0.3);
    }

    #[test]
    fn negative_delta_tick_fails_without_emitting() {
        let clock = Arc::new(SharedClock::new(0.1));
        let (engine, sink) = engine_with(clock);
        engine.activate(Channel::Pain, 1.0).unwrap();
        assert!(matches!(engine.tick(-0.1), Err(RumbleError::InvalidInput(_))));
        assert!(sink.values().is_empty());
        assert_eq!(engine.store().remaining(Channel::Pain), 0.5);
    }

    #[test]
    fn missing_controller_does_not_stop_state_updates() {
        let clock = Arc::new(SharedClock::new(0.1));
        let engine = RumbleEngine::new(ChannelTable::default(), clock, Box::new(DisconnectedSink));
        engine.activate(Channel::HitBlocked, 1.0).unwrap();
        let t = engine.tick(0.1).unwrap();
        assert_eq!(t.intensity, 1.0);
        assert_abs_diff_eq!(engine.store().remaining(Channel::HitBlocked), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn activation_rings_an_idle_scheduler() {
        let clock = Arc::new(SharedClock::new(0.1));
        let (engine, _sink) = engine_with(clock);
        engine.activate(Channel::Block, 1.0).unwrap();
        let start = Instant::now();
        assert!(engine.wake().wait_armed(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stop_interrupts_sleep() {
        let wake = Wake::default();
        wake.request_stop();
        let start = Instant::now();
        assert!(!wake.sleep(Duration::from_secs(5)));
        assert!(!wake.wait_armed(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        wake.clear_stop();
        assert!(wake.sleep(Duration::from_millis(1)));
    }
}
