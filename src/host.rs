/// Host boundary: the frame clock the engine reads, and the JSON-lines
/// protocol the daemon uses to receive events from a game-side bridge.
///
/// One message per line, tagged by `type`:
///   {"type":"combat","event":{"kind":"hit_landed","target_blocking":true}}
///   {"type":"activate","channel":"pain","scale":0.5}
///   {"type":"frame_time","seconds":0.016}
///   {"type":"pause"} / {"type":"resume"}

use crate::adapter::{Adapter, CombatEvent};
use crate::channel::Channel;
use crate::engine::RumbleEngine;
use crate::error::{Result, RumbleError};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// What the engine needs to know about the host each tick.
pub trait FrameClock: Send + Sync {
    /// Seconds of the last frame, 0 when unavailable.
    fn frame_delta(&self) -> f32;
    /// False while paused or in a menu.
    fn is_simulation_active(&self) -> bool;
}

/// Clock whose values are pushed by the host from any thread.
#[derive(Debug)]
pub struct SharedClock {
    frame_delta_bits: AtomicU32,
    simulation_active: AtomicBool,
}

impl SharedClock {
    pub fn new(frame_delta: f32) -> Self {
        Self {
            frame_delta_bits: AtomicU32::new(frame_delta.to_bits()),
            simulation_active: AtomicBool::new(true),
        }
    }

    /// Clock ticking at a fixed frame rate. A rate of 0 means "no frame time yet".
    pub fn from_frame_rate(hz: f32) -> Self {
        let delta = if hz.is_finite() && hz > 0.0 { 1.0 / hz } else { 0.0 };
        Self::new(delta)
    }

    pub fn set_frame_delta(&self, seconds: f32) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(RumbleError::invalid(format!(
                "frame time must be a finite number of seconds >= 0, got {seconds}"
            )));
        }
        self.frame_delta_bits.store(seconds.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn set_simulation_active(&self, active: bool) {
        self.simulation_active.store(active, Ordering::Relaxed);
    }
}

impl FrameClock for SharedClock {
    fn frame_delta(&self) -> f32 {
        f32::from_bits(self.frame_delta_bits.load(Ordering::Relaxed))
    }

    fn is_simulation_active(&self) -> bool {
        self.simulation_active.load(Ordering::Relaxed)
    }
}

fn full_scale() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Combat {
        event: CombatEvent,
    },
    /// Direct activation, bypassing the combat mapping.
    Activate {
        channel: String,
        #[serde(default = "full_scale")]
        scale: f32,
    },
    FrameTime {
        seconds: f32,
    },
    Pause,
    Resume,
}

impl HostMessage {
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Routes host messages into the clock, the adapter and the engine.
pub struct Bridge {
    engine: Arc<RumbleEngine>,
    clock: Arc<SharedClock>,
    adapter: Adapter,
}

impl Bridge {
    pub fn new(engine: Arc<RumbleEngine>, clock: Arc<SharedClock>) -> Self {
        Self {
            engine,
            clock,
            adapter: Adapter::new(),
        }
    }

    /// Handle one protocol line. Blank lines are ignored.
    pub fn handle_line(&self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.handle(HostMessage::parse(line)?)
    }

    pub fn handle(&self, msg: HostMessage) -> Result<()> {
        match msg {
            HostMessage::Combat { event } => {
                if let Some(a) = self.adapter.dispatch(&self.engine, &event)? {
                    log::debug!("{event:?} → {} (scale {:.2})", a.channel, a.scale);
                }
            }
            HostMessage::Activate { channel, scale } => {
                let channel = Channel::parse(&channel)?;
                self.engine.activate(channel, scale)?;
            }
            HostMessage::FrameTime { seconds } => self.clock.set_frame_delta(seconds)?,
            HostMessage::Pause => {
                log::debug!("Host paused");
                self.clock.set_simulation_active(false);
            }
            HostMessage::Resume => {
                log::debug!("Host resumed");
                self.clock.set_simulation_active(true);
            }
        }
        Ok(())
    }
}
