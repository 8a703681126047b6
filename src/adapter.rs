/// Event-to-channel adapter: combat/physics notifications → channel activations.
///
///   FallImpact                      → Pain
///   Struck (tracked actor is target) → Block if blocking, else Struck (actor) or Pain (no actor)
///   HitLanded (tracked actor attacks) → HitBlocked / Hit, only after a valid melee attack
///   AttackExecuted / RangedDrawn    → no rumble, arm or disarm the melee-attack gate
///   Release                         → CustomPulse, scaled by 1 / weapon speed for weapons,
///                                     full strength for spells
///
/// The host does the object-model work (who hit whom, what is equipped) and
/// reports it in the event fields.

use crate::channel::Channel;
use crate::engine::RumbleEngine;
use crate::error::Result;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponClass {
    BladeOneHand,
    BladeTwoHand,
    BluntOneHand,
    BluntTwoHand,
    Staff,
    Bow,
}

impl WeaponClass {
    fn is_melee(self) -> bool {
        !matches!(self, WeaponClass::Staff | WeaponClass::Bow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Weapon {
    pub class: WeaponClass,
    /// Attack speed multiplier, 1.0 = normal.
    #[serde(default = "normal_speed")]
    pub speed: f32,
}

fn normal_speed() -> f32 {
    1.0
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatEvent {
    FallImpact,
    AttackExecuted {
        #[serde(default)]
        weapon: Option<Weapon>,
        #[serde(default)]
        casting: bool,
    },
    RangedDrawn,
    Release {
        #[serde(default)]
        weapon: Option<Weapon>,
        #[serde(default)]
        casting: bool,
    },
    HitLanded {
        #[serde(default)]
        target_blocking: bool,
    },
    Struck {
        #[serde(default = "yes")]
        by_actor: bool,
        #[serde(default)]
        blocking: bool,
    },
}

/// One `activate(channel, scale)` request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    pub channel: Channel,
    pub scale: f32,
}

impl Activation {
    fn full(channel: Channel) -> Self {
        Self { channel, scale: 1.0 }
    }
}

/// Maps events to activations. Shared across host callback threads.
#[derive(Debug, Default)]
pub struct Adapter {
    /// Last attack was a melee swing that may land a hit.
    valid_attack: AtomicBool,
}

impl Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one event. Returns None for events that only update the attack gate
    /// or that are filtered out.
    pub fn map(&self, event: &CombatEvent) -> Option<Activation> {
        match *event {
            CombatEvent::FallImpact => Some(Activation::full(Channel::Pain)),
            CombatEvent::Struck { blocking: true, .. } => Some(Activation::full(Channel::Block)),
            CombatEvent::Struck { by_actor: true, .. } => Some(Activation::full(Channel::Struck)),
            CombatEvent::Struck { by_actor: false, .. } => Some(Activation::full(Channel::Pain)),
            CombatEvent::HitLanded { target_blocking } => {
                if !self.valid_attack.load(Ordering::Relaxed) {
                    log::trace!("Hit ignored: no valid melee attack in progress");
                    return None;
                }
                let channel = if target_blocking { Channel::HitBlocked } else { Channel::Hit };
                Some(Activation::full(channel))
            }
            CombatEvent::AttackExecuted { weapon, casting } => {
                let valid = !casting && weapon.is_some_and(|w| w.class.is_melee());
                self.valid_attack.store(valid, Ordering::Relaxed);
                None
            }
            CombatEvent::RangedDrawn => {
                self.valid_attack.store(false, Ordering::Relaxed);
                None
            }
            CombatEvent::Release { weapon, casting } => {
                let scale = match weapon {
                    Some(w) if w.class != WeaponClass::Staff && !casting => swing_scale(w.speed),
                    _ => 1.0,
                };
                Some(Activation { channel: Channel::CustomPulse, scale })
            }
        }
    }

    /// Map `event` and apply the result to `engine`.
    pub fn dispatch(&self, engine: &RumbleEngine, event: &CombatEvent) -> Result<Option<Activation>> {
        let Some(activation) = self.map(event) else {
            return Ok(None);
        };
        engine.activate(activation.channel, activation.scale)?;
        Ok(Some(activation))
    }
}

/// Faster weapons get shorter pulses. The store clamps anything above 1.
fn swing_scale(speed: f32) -> f32 {
    if speed.is_finite() && speed > 0.0 { 1.0 / speed } else { 1.0 }
}
