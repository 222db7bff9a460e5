//! Alert thresholds for bosses and swords
//!
//! Each threshold is a typed point on an entity's timeline at which exactly
//! one notification fires per death.

use crate::snapshot::{BossRecord, EpochMillis, SwordRecord};
use std::fmt::Debug;
use std::hash::Hash;

const MINUTE_MS: i64 = 60 * 1000;

/// Common behaviour of threshold enumerations
pub trait Threshold: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every variant, in firing order
    const ALL: &'static [Self];

    /// Short label used in logs
    fn label(&self) -> &'static str;
}

/// Countdown thresholds before a boss spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BossThreshold {
    /// At most five minutes until spawn
    FiveMinutes,
    /// At most three minutes until spawn
    ThreeMinutes,
    /// Spawn time has passed
    Spawned,
}

impl Threshold for BossThreshold {
    const ALL: &'static [Self] = &[
        BossThreshold::FiveMinutes,
        BossThreshold::ThreeMinutes,
        BossThreshold::Spawned,
    ];

    fn label(&self) -> &'static str {
        match self {
            BossThreshold::FiveMinutes => "5min",
            BossThreshold::ThreeMinutes => "3min",
            BossThreshold::Spawned => "spawned",
        }
    }
}

impl BossThreshold {
    /// Whether the threshold condition holds for the time remaining until spawn
    ///
    /// Conditions are independent and stay true once crossed, so a boss first
    /// seen after its spawn time still reaches both countdown thresholds.
    pub fn is_reached(&self, diff_ms: i64) -> bool {
        match self {
            BossThreshold::FiveMinutes => diff_ms <= 5 * MINUTE_MS,
            BossThreshold::ThreeMinutes => diff_ms <= 3 * MINUTE_MS,
            BossThreshold::Spawned => diff_ms <= 0,
        }
    }

    /// Thresholds whose condition holds for `record` at `now`
    pub fn reached(record: &BossRecord, now: EpochMillis) -> impl Iterator<Item = Self> {
        let diff = record.spawn_time().saturating_sub(now);
        Self::ALL.iter().copied().filter(move |t| t.is_reached(diff))
    }
}

/// Elapsed-time thresholds after a sword boss's minimum cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SwordThreshold {
    /// Minimum cooldown completed
    AtMin,
    /// 30 minutes after minimum cooldown
    Plus30,
    /// 60 minutes after minimum cooldown
    Plus60,
    /// 90 minutes after minimum cooldown
    Plus90,
    /// Maximum cooldown completed
    AtMax,
}

impl Threshold for SwordThreshold {
    const ALL: &'static [Self] = &[
        SwordThreshold::AtMin,
        SwordThreshold::Plus30,
        SwordThreshold::Plus60,
        SwordThreshold::Plus90,
        SwordThreshold::AtMax,
    ];

    fn label(&self) -> &'static str {
        match self {
            SwordThreshold::AtMin => "+0",
            SwordThreshold::Plus30 => "+30",
            SwordThreshold::Plus60 => "+60",
            SwordThreshold::Plus90 => "+90",
            SwordThreshold::AtMax => "+max",
        }
    }
}

impl SwordThreshold {
    /// Time after death at which this threshold is reached, in milliseconds
    pub fn offset_ms(&self, record: &SwordRecord) -> i64 {
        match self {
            SwordThreshold::AtMin => record.cooldown_min_ms,
            SwordThreshold::Plus30 => record.cooldown_min_ms.saturating_add(30 * MINUTE_MS),
            SwordThreshold::Plus60 => record.cooldown_min_ms.saturating_add(60 * MINUTE_MS),
            SwordThreshold::Plus90 => record.cooldown_min_ms.saturating_add(90 * MINUTE_MS),
            SwordThreshold::AtMax => record.cooldown_max_ms,
        }
    }

    /// Whole minutes between minimum cooldown completion and this threshold
    pub fn minutes_after_min(&self, record: &SwordRecord) -> i64 {
        match self {
            SwordThreshold::AtMin => 0,
            SwordThreshold::Plus30 => 30,
            SwordThreshold::Plus60 => 60,
            SwordThreshold::Plus90 => 90,
            SwordThreshold::AtMax => {
                record.cooldown_max_ms.saturating_sub(record.cooldown_min_ms) / MINUTE_MS
            }
        }
    }

    /// Thresholds whose offset has elapsed for `record` at `now`
    pub fn reached(record: &SwordRecord, now: EpochMillis) -> impl Iterator<Item = Self> + '_ {
        let elapsed = now.saturating_sub(record.last_death);
        Self::ALL
            .iter()
            .copied()
            .filter(move |t| elapsed >= t.offset_ms(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boss(cooldown_s: i64, last_death: i64) -> BossRecord {
        BossRecord {
            last_death,
            cooldown_ms: cooldown_s * 1000,
            owner: None,
        }
    }

    fn sword(min_s: i64, max_s: i64, last_death: i64) -> SwordRecord {
        SwordRecord {
            last_death,
            cooldown_min_ms: min_s * 1000,
            cooldown_max_ms: max_s * 1000,
        }
    }

    #[test]
    fn test_boss_threshold_boundaries() {
        assert!(BossThreshold::FiveMinutes.is_reached(300_000));
        assert!(!BossThreshold::FiveMinutes.is_reached(300_001));
        assert!(BossThreshold::FiveMinutes.is_reached(-1));

        assert!(BossThreshold::ThreeMinutes.is_reached(180_000));
        assert!(!BossThreshold::ThreeMinutes.is_reached(180_001));
        assert!(BossThreshold::ThreeMinutes.is_reached(-1));

        assert!(BossThreshold::Spawned.is_reached(0));
        assert!(BossThreshold::Spawned.is_reached(-1));
        assert!(!BossThreshold::Spawned.is_reached(1));
    }

    #[test]
    fn test_boss_reached_five_minutes_out() {
        let now = 1_000_000;
        let reached: Vec<_> = BossThreshold::reached(&boss(300, now), now).collect();
        assert_eq!(reached, vec![BossThreshold::FiveMinutes]);
    }

    #[test]
    fn test_boss_reached_exactly_at_spawn() {
        let now = 1_000_000;
        let reached: Vec<_> = BossThreshold::reached(&boss(60, now - 60_000), now).collect();
        assert_eq!(reached, BossThreshold::ALL.to_vec());
    }

    #[test]
    fn test_boss_reached_after_spawn() {
        let now = 1_000_000;
        let reached: Vec<_> = BossThreshold::reached(&boss(60, now - 61_000), now).collect();
        assert_eq!(reached, BossThreshold::ALL.to_vec());
    }

    #[test]
    fn test_sword_offsets_saturate_on_huge_cooldowns() {
        let record = SwordRecord {
            last_death: 0,
            cooldown_min_ms: i64::MAX,
            cooldown_max_ms: i64::MAX,
        };
        assert_eq!(SwordThreshold::Plus90.offset_ms(&record), i64::MAX);
        assert_eq!(SwordThreshold::AtMax.minutes_after_min(&record), 0);

        let inverted = SwordRecord {
            last_death: 0,
            cooldown_min_ms: i64::MAX,
            cooldown_max_ms: i64::MIN,
        };
        assert!(SwordThreshold::AtMax.minutes_after_min(&inverted) < 0);
        assert_eq!(SwordThreshold::reached(&inverted, 0).count(), 1);
    }

    #[test]
    fn test_sword_offsets_are_minutes_after_min_cooldown() {
        let record = sword(3600, 3 * 3600, 0);
        assert_eq!(SwordThreshold::AtMin.offset_ms(&record), 3_600_000);
        assert_eq!(SwordThreshold::Plus30.offset_ms(&record), 3_600_000 + 1_800_000);
        assert_eq!(SwordThreshold::Plus90.offset_ms(&record), 3_600_000 + 5_400_000);
        assert_eq!(SwordThreshold::AtMax.offset_ms(&record), 10_800_000);
    }

    #[test]
    fn test_sword_minutes_after_min() {
        let record = sword(3600, 3 * 3600 + 59, 0);
        assert_eq!(SwordThreshold::AtMin.minutes_after_min(&record), 0);
        assert_eq!(SwordThreshold::Plus60.minutes_after_min(&record), 60);
        assert_eq!(SwordThreshold::AtMax.minutes_after_min(&record), 120);
    }

    #[test]
    fn test_sword_reached_progression() {
        let record = sword(3600, 3 * 3600, 0);

        assert_eq!(SwordThreshold::reached(&record, 3_599_999).count(), 0);

        let reached: Vec<_> = SwordThreshold::reached(&record, 3_600_000).collect();
        assert_eq!(reached, vec![SwordThreshold::AtMin]);

        let reached: Vec<_> = SwordThreshold::reached(&record, 3_600_000 + 3_600_000).collect();
        assert_eq!(
            reached,
            vec![
                SwordThreshold::AtMin,
                SwordThreshold::Plus30,
                SwordThreshold::Plus60
            ]
        );

        assert_eq!(SwordThreshold::reached(&record, 10_800_000).count(), 5);
    }

    #[test]
    fn test_labels() {
        let labels: Vec<_> = BossThreshold::ALL.iter().map(|t| t.label()).collect();
        assert_eq!(labels, vec!["5min", "3min", "spawned"]);

        let labels: Vec<_> = SwordThreshold::ALL.iter().map(|t| t.label()).collect();
        assert_eq!(labels, vec!["+0", "+30", "+60", "+90", "+max"]);
    }
}
