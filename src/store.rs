/// Rumble state store: per-channel remaining times behind a readers-writer lock.
///
/// Both mutating operations (`activate`, `snapshot_and_decay`) take the lock
/// exclusively. Every critical section is a fixed-size array walk with no
/// allocation, so lock hold time is constant.

use crate::channel::{Channel, ChannelTable};
use crate::error::{Result, RumbleError};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Levels {
    /// Seconds left per channel, indexed by `Channel::index`.
    remaining: [f32; Channel::COUNT],
    /// Whether the scheduler should keep ticking.
    active: bool,
}

impl Levels {
    fn any_pending(&self) -> bool {
        self.remaining.iter().any(|&t| t > 0.0)
    }
}

pub struct RumbleStore {
    table: ChannelTable,
    levels: RwLock<Levels>,
}

impl RumbleStore {
    pub fn new(table: ChannelTable) -> Self {
        Self {
            table,
            levels: RwLock::new(Levels::default()),
        }
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// Raise `channel` to `full_duration * scale` unless it already holds more.
    /// `scale` is clamped to 0..=1 so a channel never exceeds its full duration.
    ///
    /// Returns true when this call armed a store that was idle.
    pub fn activate(&self, channel: Channel, scale: f32) -> Result<bool> {
        if scale.is_nan() || scale < 0.0 {
            return Err(RumbleError::invalid(format!(
                "magnitude scale must be >= 0, got {scale}"
            )));
        }
        let target = self.table.get(channel).full_duration * scale.min(1.0);

        let mut levels = self.write();
        let slot = &mut levels.remaining[channel.index()];
        *slot = slot.max(target);
        let armed = !levels.active;
        levels.active = true;
        Ok(armed)
    }

    /// Blend all channels from their pre-decay ratios, then decay each by `delta`.
    /// Read and decay happen under one exclusive lock so a concurrent activation
    /// is neither lost nor applied twice. Returns the intensity clamped to 0..=1.
    pub fn snapshot_and_decay(&self, delta: f32) -> Result<f32> {
        if delta.is_nan() || delta < 0.0 {
            return Err(RumbleError::invalid(format!(
                "decay delta must be >= 0 seconds, got {delta}"
            )));
        }

        let mut levels = self.write();
        let mut sum = 0.0f32;
        for (remaining, params) in levels.remaining.iter_mut().zip(self.table.as_array()) {
            sum += params.peak_strength * (*remaining / params.full_duration);
            *remaining = (*remaining - delta).max(0.0);
        }
        Ok(sum.min(1.0))
    }

    /// Clear the active flag if nothing is pending. Returns true when the store went idle.
    ///
    /// Re-checks pending channels under the exclusive lock, so an activation that
    /// lands after the last tick keeps the store active.
    pub fn settle(&self) -> bool {
        let mut levels = self.write();
        if levels.any_pending() {
            return false;
        }
        levels.remaining = [0.0; Channel::COUNT];
        let was_active = levels.active;
        levels.active = false;
        was_active
    }

    pub fn remaining(&self, channel: Channel) -> f32 {
        self.read().remaining[channel.index()]
    }

    pub fn is_active(&self) -> bool {
        self.read().active
    }

    pub fn has_pending(&self) -> bool {
        self.read().any_pending()
    }

    // A panic while holding the lock cannot leave `Levels` half-written (plain
    // float stores), so a poisoned lock is recovered.
    fn read(&self) -> RwLockReadGuard<'_, Levels> {
        self.levels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Levels> {
        self.levels.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelParams;
    use approx::assert_abs_diff_eq;

    fn store() -> RumbleStore {
        RumbleStore::new(ChannelTable::default())
    }

    #[test]
    fn starts_idle_and_zeroed() {
        let s = store();
        assert!(!s.is_active());
        assert!(!s.has_pending());
        for c in Channel::ALL {
            assert_eq!(s.remaining(c), 0.0);
        }
    }

    #[test]
    fn full_activation_sets_full_duration() {
        let s = store();
        for c in Channel::ALL {
            s.activate(c, 1.0).unwrap();
            assert_eq!(s.remaining(c), s.table().get(c).full_duration, "{c}");
        }
        assert!(s.is_active());
    }

    #[test]
    fn activation_reports_arming_once() {
        let s = store();
        assert!(s.activate(Channel::Hit, 1.0).unwrap());
        assert!(!s.activate(Channel::Pain, 1.0).unwrap());
    }

    #[test]
    fn repeated_activation_never_exceeds_full_duration() {
        let s = store();
        s.activate(Channel::Struck, 1.0).unwrap();
        s.activate(Channel::Struck, 1.0).unwrap();
        s.activate(Channel::Struck, 4.0).unwrap();
        assert_eq!(s.remaining(Channel::Struck), 0.3);
    }

    #[test]
    fn smaller_pulse_does_not_shorten_a_longer_one() {
        let s = store();
        s.activate(Channel::CustomPulse, 1.0).unwrap();
        s.activate(Channel::CustomPulse, 0.2).unwrap();
        assert_eq!(s.remaining(Channel::CustomPulse), 0.25);

        let s = store();
        s.activate(Channel::CustomPulse, 0.2).unwrap();
        assert_abs_diff_eq!(s.remaining(Channel::CustomPulse), 0.05, epsilon = 1e-6);
        s.activate(Channel::CustomPulse, 0.8).unwrap();
        assert_abs_diff_eq!(s.remaining(Channel::CustomPulse), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn invalid_scale_is_rejected_without_side_effects() {
        let s = store();
        assert!(matches!(s.activate(Channel::Hit, -0.5), Err(RumbleError::InvalidInput(_))));
        assert!(s.activate(Channel::Hit, f32::NAN).is_err());
        assert_eq!(s.remaining(Channel::Hit), 0.0);
        assert!(!s.is_active());
    }

    #[test]
    fn decay_floors_at_zero() {
        let s = store();
        s.activate(Channel::Hit, 1.0).unwrap();
        s.activate(Channel::Pain, 1.0).unwrap();
        s.snapshot_and_decay(0.4).unwrap();
        assert_eq!(s.remaining(Channel::Hit), 0.0);
        assert_abs_diff_eq!(s.remaining(Channel::Pain), 0.1, epsilon = 1e-6);
        for c in Channel::ALL {
            assert!(s.remaining(c) >= 0.0);
        }
    }

    #[test]
    fn fully_decayed_store_is_stable() {
        let s = store();
        s.activate(Channel::Block, 1.0).unwrap();
        s.snapshot_and_decay(1.0).unwrap();
        for _ in 0..5 {
            assert_eq!(s.snapshot_and_decay(0.1).unwrap(), 0.0);
            for c in Channel::ALL {
                assert_eq!(s.remaining(c), 0.0);
            }
        }
    }

    #[test]
    fn intensity_stays_within_unit_range_with_everything_active() {
        let s = store();
        for c in Channel::ALL {
            s.activate(c, 1.0).unwrap();
        }
        let mut delta = 0.0;
        for _ in 0..20 {
            let i = s.snapshot_and_decay(delta).unwrap();
            assert!((0.0..=1.0).contains(&i), "intensity {i}");
            delta = 0.05;
        }
    }

    #[test]
    fn pain_snapshot_then_full_decay() {
        let s = store();
        s.activate(Channel::Pain, 1.0).unwrap();
        assert_eq!(s.snapshot_and_decay(0.0).unwrap(), 0.75);
        // The returned value is the pre-decay snapshot.
        assert_eq!(s.snapshot_and_decay(0.5).unwrap(), 0.75);
        assert_eq!(s.remaining(Channel::Pain), 0.0);
        assert_eq!(s.snapshot_and_decay(0.0).unwrap(), 0.0);
    }

    #[test]
    fn two_half_strength_channels_clamp_at_one() {
        let s = store();
        s.activate(Channel::Block, 1.0).unwrap();
        s.activate(Channel::Hit, 1.0).unwrap();
        assert_eq!(s.snapshot_and_decay(0.0).unwrap(), 1.0);

        s.activate(Channel::HitBlocked, 1.0).unwrap();
        assert_eq!(s.snapshot_and_decay(0.0).unwrap(), 1.0);
    }

    #[test]
    fn hit_blocked_half_decay() {
        let s = store();
        s.activate(Channel::HitBlocked, 1.0).unwrap();
        assert_eq!(s.snapshot_and_decay(0.15).unwrap(), 1.0);
        assert_abs_diff_eq!(s.remaining(Channel::HitBlocked), 0.15, epsilon = 1e-6);
        assert_abs_diff_eq!(s.snapshot_and_decay(0.0).unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn negative_delta_is_rejected_and_state_unchanged() {
        let s = store();
        s.activate(Channel::Pain, 1.0).unwrap();
        assert!(matches!(s.snapshot_and_decay(-0.1), Err(RumbleError::InvalidInput(_))));
        assert!(s.snapshot_and_decay(f32::NAN).is_err());
        assert_eq!(s.remaining(Channel::Pain), 0.5);
        assert!(s.is_active());
    }

    #[test]
    fn settle_only_when_nothing_pending() {
        let s = store();
        s.activate(Channel::Hit, 1.0).unwrap();
        assert!(!s.settle());
        assert!(s.is_active());

        s.snapshot_and_decay(1.0).unwrap();
        assert!(s.settle());
        assert!(!s.is_active());
        // Already idle: nothing to report.
        assert!(!s.settle());
        // Next activation revives it.
        assert!(s.activate(Channel::Hit, 1.0).unwrap());
    }

    #[test]
    fn custom_table_is_used_for_blend() {
        let table = ChannelTable::default()
            .with(Channel::Pain, ChannelParams::new(0.4, 1.0).unwrap());
        let s = RumbleStore::new(table);
        s.activate(Channel::Pain, 1.0).unwrap();
        assert_abs_diff_eq!(s.snapshot_and_decay(0.5).unwrap(), 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(s.snapshot_and_decay(0.0).unwrap(), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn concurrent_activations_and_decay_respect_bounds() {
        use std::sync::Arc;
        use std::thread;

        let s = Arc::new(store());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    for n in 0..500 {
                        let c = Channel::ALL[(i + n) % Channel::COUNT];
                        s.activate(c, 1.0).unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..500 {
            let i = s.snapshot_and_decay(0.01).unwrap();
            assert!((0.0..=1.0).contains(&i));
        }
        for w in writers {
            w.join().unwrap();
        }
        for c in Channel::ALL {
            let r = s.remaining(c);
            assert!(r >= 0.0 && r <= s.table().get(c).full_duration);
        }
    }
}
