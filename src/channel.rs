/// Rumble channels: named decaying intensity contributors and their static parameters.
///
/// Default table:
///   Block        0.50 peak, 0.30 s
///   HitBlocked   1.00 peak, 0.30 s
///   Hit          0.50 peak, 0.30 s
///   Pain         0.75 peak, 0.50 s
///   Struck       0.75 peak, 0.30 s
///   CustomPulse  0.25 peak, 0.25 s  (weapon swing / spell release)

use crate::error::{Result, RumbleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Block,
    HitBlocked,
    Hit,
    Pain,
    Struck,
    CustomPulse,
}

impl Channel {
    pub const COUNT: usize = 6;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Block,
        Channel::HitBlocked,
        Channel::Hit,
        Channel::Pain,
        Channel::Struck,
        Channel::CustomPulse,
    ];

    /// Slot in the fixed-size state arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::Block => 0,
            Channel::HitBlocked => 1,
            Channel::Hit => 2,
            Channel::Pain => 3,
            Channel::Struck => 4,
            Channel::CustomPulse => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Block => "block",
            Channel::HitBlocked => "hit_blocked",
            Channel::Hit => "hit",
            Channel::Pain => "pain",
            Channel::Struck => "struck",
            Channel::CustomPulse => "custom_pulse",
        }
    }

    /// Parse a channel name. Trims whitespace, case-insensitive, accepts `-` for `_`.
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Channel::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| RumbleError::invalid(format!("unknown rumble channel '{}'", s.trim())))
    }
}

impl std::str::FromStr for Channel {
    type Err = RumbleError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::parse(s)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Peak contribution and decay length of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParams {
    /// Weight when freshly activated, 0..=1.
    pub peak_strength: f32,
    /// Seconds to decay from peak to zero, > 0.
    pub full_duration: f32,
}

impl ChannelParams {
    pub fn new(peak_strength: f32, full_duration: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&peak_strength) {
            return Err(RumbleError::invalid(format!(
                "peak strength must be within 0..=1, got {peak_strength}"
            )));
        }
        if !full_duration.is_finite() || full_duration <= 0.0 {
            return Err(RumbleError::invalid(format!(
                "full duration must be a positive number of seconds, got {full_duration}"
            )));
        }
        Ok(Self { peak_strength, full_duration })
    }

    pub fn default_for(channel: Channel) -> Self {
        let (peak_strength, full_duration) = match channel {
            Channel::Block => (0.5, 0.3),
            Channel::HitBlocked => (1.0, 0.3),
            Channel::Hit => (0.5, 0.3),
            Channel::Pain => (0.75, 0.5),
            Channel::Struck => (0.75, 0.3),
            Channel::CustomPulse => (0.25, 0.25),
        };
        Self { peak_strength, full_duration }
    }
}

/// Immutable parameters for every channel, fixed at engine construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTable {
    params: [ChannelParams; Channel::COUNT],
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self {
            params: Channel::ALL.map(ChannelParams::default_for),
        }
    }
}

impl ChannelTable {
    pub fn get(&self, channel: Channel) -> ChannelParams {
        self.params[channel.index()]
    }

    /// Replace one channel's parameters.
    pub fn with(mut self, channel: Channel, params: ChannelParams) -> Self {
        self.params[channel.index()] = params;
        self
    }

    pub(crate) fn as_array(&self) -> &[ChannelParams; Channel::COUNT] {
        &self.params
    }
}
