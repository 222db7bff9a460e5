//! Chat message rendering for fired alerts

use crate::alerts::thresholds::{BossThreshold, SwordThreshold};
use crate::error::RecordError;
use crate::snapshot::{BossRecord, Category, EpochMillis, SwordRecord};
use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Default display offset: UTC+7 (Asia/Bangkok, no daylight saving)
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// Renders alert messages with timestamps in a fixed UTC offset
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    offset: FixedOffset,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::with_offset_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|| Self::new(Utc.fix()))
    }
}

impl MessageFormatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Formatter for a whole-hour offset, `None` if the offset is out of range
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(Self::new)
    }

    /// Render an epoch timestamp as `HH:MM น.` in the configured offset
    pub fn format_time(&self, ts: EpochMillis) -> String {
        match DateTime::from_timestamp_millis(ts) {
            Some(utc) => utc
                .with_timezone(&self.offset)
                .format("%H:%M น.")
                .to_string(),
            None => "--:-- น.".to_string(),
        }
    }

    pub fn boss_message(
        &self,
        name: &str,
        record: &BossRecord,
        threshold: BossThreshold,
    ) -> String {
        let spawn = self.format_time(record.spawn_time());
        let owner = format_owner(record.owner.as_deref());

        match threshold {
            BossThreshold::FiveMinutes => format!(
                "⏰ **[แจ้งเตือน]** บอส **{}** จะเกิดใน 5 นาที ({}) ⚔️{}",
                name, spawn, owner
            ),
            BossThreshold::ThreeMinutes => format!(
                "⌛ **[เตือนอีกครั้ง]** บอส **{}** จะเกิดใน 3 นาที ({}) 🛡️{}",
                name, spawn, owner
            ),
            BossThreshold::Spawned => format!(
                "🎉 **[แจ้งเตือน]** บอส **{}** เกิดแล้วเมื่อ {} 💥{}",
                name, spawn, owner
            ),
        }
    }

    pub fn sword_message(
        &self,
        name: &str,
        record: &SwordRecord,
        threshold: SwordThreshold,
        now: EpochMillis,
    ) -> String {
        let mut message = format!(
            "🗡️ บอสดาบ! {}\n\n\
             🕒 บอสตายล่าสุด: {}\n\
             ⏳ คูลดาวน์ขั้นต่ำครบเวลา: {}\n\
             🕔 แจ้งเตือนตอนนี้: {} (ผ่านมา {} นาทีหลัง cooldown ขั้นต่ำ)",
            name,
            self.format_time(record.last_death),
            self.format_time(record.cooldown_min_done()),
            self.format_time(now),
            threshold.minutes_after_min(record),
        );

        if threshold == SwordThreshold::AtMax {
            message.push_str("\n\n⚠️ หากยังไม่เกิด แสดงว่า ถูกฆ่าไปแล้ว");
        }

        message
    }

    /// One-time notice that an entity's record cannot be evaluated
    pub fn invalid_record_message(&self, category: Category, name: &str, error: &RecordError) -> String {
        let kind = match category {
            Category::Boss => "บอส",
            Category::Sword => "บอสดาบ",
        };
        format!(
            "⚠️ **[ข้อมูลไม่ถูกต้อง]** {} **{}**: {}",
            kind, name, error
        )
    }
}

/// Owner annotation appended to boss messages, empty when there is no owner
pub fn format_owner(owner: Option<&str>) -> String {
    match owner.map(str::trim).filter(|o| !o.is_empty()) {
        Some(owner) => format!("\n\n👑 เจ้าของบอส: **{}**", owner),
        None => String::new(),
    }
}
