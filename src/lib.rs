//! Combat rumble engine: turns combat events into time-decaying gamepad rumble.
//!
//! A host owns one [`RumbleEngine`], starts a [`Scheduler`] for it, and feeds it
//! events either directly (`RumbleEngine::activate`) or through the [`Adapter`].

pub mod adapter;
pub mod channel;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod host;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use adapter::{Activation, Adapter, CombatEvent, Weapon, WeaponClass};
pub use channel::{Channel, ChannelParams, ChannelTable};
pub use engine::{RumbleEngine, Tick};
pub use error::{Result, RumbleError};
pub use host::{Bridge, FrameClock, HostMessage, SharedClock};
pub use scheduler::{Phase, Scheduler};
pub use sink::{DisconnectedSink, RumbleSink};
pub use store::RumbleStore;
