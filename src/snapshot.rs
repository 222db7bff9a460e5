//! Snapshot and entity record types
//!
//! A snapshot is the JSON document fetched from the data source in one poll
//! cycle. Entity records are kept as raw JSON until the alert engine asks for
//! a typed view, so one malformed record never poisons the whole snapshot.

use crate::error::{FetchError, RecordError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Epoch timestamp in milliseconds
pub type EpochMillis = i64;

/// Raw entity records of one category, keyed by entity name
pub type RecordMap = BTreeMap<String, Value>;

/// Full payload fetched in one poll cycle
///
/// A category that is absent from the payload is `None`, which is different
/// from a category that is present but empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub bosses: Option<RecordMap>,
    #[serde(default)]
    pub swords: Option<RecordMap>,
}

impl Snapshot {
    /// Decode a snapshot from a response body
    ///
    /// A JSON `null` body (an empty realtime database) decodes to an empty
    /// snapshot. Unknown top-level keys are ignored.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let snapshot: Option<Snapshot> =
            serde_json::from_str(body).map_err(|e| FetchError::DecodeError(e.to_string()))?;
        Ok(snapshot.unwrap_or_default())
    }

    /// Records for a category, if the category was present in the payload
    pub fn category(&self, category: Category) -> Option<&RecordMap> {
        match category {
            Category::Boss => self.bosses.as_ref(),
            Category::Sword => self.swords.as_ref(),
        }
    }

    /// Total number of entity records across both categories
    pub fn entity_count(&self) -> usize {
        Category::ALL
            .iter()
            .filter_map(|c| self.category(*c))
            .map(|records| records.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }
}

/// Kind of tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Boss with a fixed cooldown
    Boss,
    /// Sword boss with a cooldown window
    Sword,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Boss, Category::Sword];

    /// Top-level key of this category in the snapshot payload
    pub fn key(&self) -> &'static str {
        match self {
            Category::Boss => "bosses",
            Category::Sword => "swords",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Boss => write!(f, "boss"),
            Category::Sword => write!(f, "sword"),
        }
    }
}

/// Validated boss record
#[derive(Debug, Clone, PartialEq)]
pub struct BossRecord {
    /// When the boss last died
    pub last_death: EpochMillis,
    /// Respawn cooldown in milliseconds
    pub cooldown_ms: i64,
    /// Who claimed the boss, if anyone
    pub owner: Option<String>,
}

impl BossRecord {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let object = value.as_object().ok_or(RecordError::NotAnObject)?;
        let cooldown_ms = seconds_field_as_millis(object, "cooldown")?;
        let last_death = epoch_field(object, "lastDeath")?;

        Ok(Self {
            last_death,
            cooldown_ms,
            owner: owner_field(object),
        })
    }

    pub fn spawn_time(&self) -> EpochMillis {
        self.last_death.saturating_add(self.cooldown_ms)
    }
}

/// Validated sword record
#[derive(Debug, Clone, PartialEq)]
pub struct SwordRecord {
    /// When the sword boss last died
    pub last_death: EpochMillis,
    /// Earliest respawn after death, in milliseconds
    pub cooldown_min_ms: i64,
    /// Latest respawn after death, in milliseconds
    pub cooldown_max_ms: i64,
}

impl SwordRecord {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let object = value.as_object().ok_or(RecordError::NotAnObject)?;
        let last_death = epoch_field(object, "lastDeath")?;
        let cooldown_min_ms = seconds_field_as_millis(object, "cooldownMin")?;
        let cooldown_max_ms = seconds_field_as_millis(object, "cooldownMax")?;

        Ok(Self {
            last_death,
            cooldown_min_ms,
            cooldown_max_ms,
        })
    }

    /// When the minimum cooldown completes
    pub fn cooldown_min_done(&self) -> EpochMillis {
        self.last_death.saturating_add(self.cooldown_min_ms)
    }
}

/// Strip an entity key down to the characters shown in chat messages
///
/// Keeps letters, digits, underscores, whitespace and the Thai block, then
/// trims surrounding whitespace.
pub fn display_name(key: &str) -> String {
    key.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || *c == '_'
                || c.is_whitespace()
                || ('\u{0E01}'..='\u{0E59}').contains(c)
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn present<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, RecordError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn invalid(field: &'static str, value: &Value) -> RecordError {
    RecordError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// Read an epoch-millisecond field; floats are truncated, strings must be integers
fn epoch_field(object: &Map<String, Value>, field: &'static str) -> Result<EpochMillis, RecordError> {
    let value = present(object, field)?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| invalid(field, value)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid(field, value)),
        _ => Err(invalid(field, value)),
    }
}

/// Read a duration given in (possibly fractional) seconds and convert to milliseconds
fn seconds_field_as_millis(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<i64, RecordError> {
    let value = present(object, field)?;
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
    .ok_or_else(|| invalid(field, value))?;

    Ok((seconds * 1000.0).round() as i64)
}

fn owner_field(object: &Map<String, Value>) -> Option<String> {
    object
        .get("owner")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_json() {
        let body = r#"{
            "bosses": {"Kraken": {"cooldown": 3600, "lastDeath": 1700000000000, "owner": "Guild A"}},
            "swords": {"Blade": {"cooldownMin": 7200, "cooldownMax": 14400, "lastDeath": 1700000000000}},
            "meta": {"version": 2}
        }"#;

        let snapshot = Snapshot::from_json(body).unwrap();
        assert_eq!(snapshot.entity_count(), 2);
        assert!(snapshot.category(Category::Boss).unwrap().contains_key("Kraken"));
        assert!(snapshot.category(Category::Sword).unwrap().contains_key("Blade"));
    }

    #[test]
    fn test_snapshot_null_body_is_empty() {
        let snapshot = Snapshot::from_json("null").unwrap();
        assert_eq!(snapshot, Snapshot::default());
        assert!(snapshot.is_empty());
        assert!(snapshot.category(Category::Boss).is_none());
    }

    #[test]
    fn test_snapshot_missing_category_differs_from_empty() {
        let snapshot = Snapshot::from_json(r#"{"bosses": {}}"#).unwrap();
        assert_eq!(snapshot.category(Category::Boss), Some(&RecordMap::new()));
        assert_eq!(snapshot.category(Category::Sword), None);
    }

    #[test]
    fn test_snapshot_invalid_body() {
        let result = Snapshot::from_json("<html>502 Bad Gateway</html>");
        assert!(matches!(result, Err(FetchError::DecodeError(_))));
    }

    #[test]
    fn test_boss_record_parsing() {
        let record = BossRecord::from_value(&json!({
            "cooldown": 300,
            "lastDeath": 1_000_000,
            "owner": "  Guild A  "
        }))
        .unwrap();

        assert_eq!(record.cooldown_ms, 300_000);
        assert_eq!(record.last_death, 1_000_000);
        assert_eq!(record.owner.as_deref(), Some("Guild A"));
        assert_eq!(record.spawn_time(), 1_300_000);
    }

    #[test]
    fn test_boss_record_accepts_numeric_strings_and_floats() {
        let record = BossRecord::from_value(&json!({
            "cooldown": "90.5",
            "lastDeath": 1234.9
        }))
        .unwrap();

        assert_eq!(record.cooldown_ms, 90_500);
        assert_eq!(record.last_death, 1234);
        assert_eq!(record.owner, None);

        let record = BossRecord::from_value(&json!({
            "cooldown": 60,
            "lastDeath": "5000",
            "owner": "   "
        }))
        .unwrap();
        assert_eq!(record.last_death, 5000);
        assert_eq!(record.owner, None);
    }

    #[test]
    fn test_boss_record_missing_fields() {
        assert_eq!(
            BossRecord::from_value(&json!({"lastDeath": 1})),
            Err(RecordError::MissingField("cooldown"))
        );
        assert_eq!(
            BossRecord::from_value(&json!({"cooldown": 1, "lastDeath": null})),
            Err(RecordError::MissingField("lastDeath"))
        );
        assert_eq!(
            BossRecord::from_value(&json!("Kraken")),
            Err(RecordError::NotAnObject)
        );
    }

    #[test]
    fn test_boss_record_non_numeric_fields() {
        let result = BossRecord::from_value(&json!({"cooldown": "soon", "lastDeath": 1}));
        assert!(matches!(
            result,
            Err(RecordError::InvalidField { field: "cooldown", .. })
        ));

        let result = BossRecord::from_value(&json!({"cooldown": 1, "lastDeath": "1.5"}));
        assert!(matches!(
            result,
            Err(RecordError::InvalidField { field: "lastDeath", .. })
        ));

        let result = BossRecord::from_value(&json!({"cooldown": true, "lastDeath": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_sword_record_parsing() {
        let record = SwordRecord::from_value(&json!({
            "cooldownMin": 3600,
            "cooldownMax": "7200",
            "lastDeath": 10_000
        }))
        .unwrap();

        assert_eq!(record.cooldown_min_ms, 3_600_000);
        assert_eq!(record.cooldown_max_ms, 7_200_000);
        assert_eq!(record.cooldown_min_done(), 3_610_000);

        assert_eq!(
            SwordRecord::from_value(&json!({"cooldownMin": 1, "lastDeath": 1})),
            Err(RecordError::MissingField("cooldownMax"))
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("  Kraken!! "), "Kraken");
        assert_eq!(display_name("Sea_Lord [v2]"), "Sea_Lord v2");
        assert_eq!(display_name("บอส*ใหญ่"), "บอสใหญ่");
        assert_eq!(display_name("🔥"), "");
    }

    #[test]
    fn test_category_keys() {
        assert_eq!(Category::Boss.key(), "bosses");
        assert_eq!(Category::Sword.key(), "swords");
        assert_eq!(Category::Sword.to_string(), "sword");
    }
}
