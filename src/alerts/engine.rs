use crate::alerts::message::MessageFormatter;
use crate::alerts::thresholds::{BossThreshold, SwordThreshold, Threshold};
use crate::error::RecordError;
use crate::snapshot::{
    display_name, BossRecord, Category, EpochMillis, RecordMap, Snapshot, SwordRecord,
};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Alerting progress of a single entity within one death epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    /// No threshold has fired yet
    Idle,
    /// Some thresholds have fired
    PartiallyAlerted,
    /// Every threshold has fired; nothing more until the entity dies again
    FullyAlerted,
}

/// What a fired alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Boss(BossThreshold),
    Sword(SwordThreshold),
    /// The entity's record could not be evaluated
    InvalidRecord,
}

/// A notification requested by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Category of the entity
    pub category: Category,
    /// Entity key as it appears in the snapshot
    pub entity: String,
    /// Which threshold fired
    pub kind: AlertKind,
    /// Death epoch the alert belongs to, `None` for invalid-record alerts
    pub last_death: Option<EpochMillis>,
    /// Rendered chat message
    pub message: String,
}

impl Alert {
    /// Short label for logs, e.g. `5min` or `+max`
    pub fn label(&self) -> &'static str {
        match self.kind {
            AlertKind::Boss(t) => t.label(),
            AlertKind::Sword(t) => t.label(),
            AlertKind::InvalidRecord => "invalid",
        }
    }
}

/// Fired thresholds of one entity, valid only for `last_death`
#[derive(Debug, Clone)]
struct EntityState<T: Threshold> {
    last_death: EpochMillis,
    fired: HashSet<T>,
}

impl<T: Threshold> EntityState<T> {
    fn new(last_death: EpochMillis) -> Self {
        Self {
            last_death,
            fired: HashSet::new(),
        }
    }

    fn phase(&self) -> AlertPhase {
        if self.fired.is_empty() {
            AlertPhase::Idle
        } else if self.fired.len() >= T::ALL.len() {
            AlertPhase::FullyAlerted
        } else {
            AlertPhase::PartiallyAlerted
        }
    }

    /// Mark a threshold as fired, returning `false` if it already was
    fn fire(&mut self, threshold: T) -> bool {
        self.fired.insert(threshold)
    }
}

/// Look up the state of `key`, resetting it if the entity died again since
fn sync_state<'a, T: Threshold>(
    states: &'a mut HashMap<String, EntityState<T>>,
    category: Category,
    key: &str,
    last_death: EpochMillis,
) -> &'a mut EntityState<T> {
    let state = states.entry(key.to_string()).or_insert_with(|| {
        info!("Tracking new {} {} (lastDeath {})", category, key, last_death);
        EntityState::new(last_death)
    });

    if state.last_death != last_death {
        info!(
            "Reset alert state for {} {} (lastDeath {} -> {})",
            category, key, state.last_death, last_death
        );
        *state = EntityState::new(last_death);
    }

    state
}

/// Per-entity alert threshold state machine
///
/// For every entity in a snapshot the engine decides which thresholds fire
/// during this poll. A threshold fires at most once per death epoch; a new
/// `lastDeath` value clears the entity's fired set before evaluation.
/// Thresholds are evaluated independently, so a poll that lands late can
/// fire several of them at once instead of silently skipping any.
#[derive(Debug)]
pub struct AlertEngine {
    bosses: HashMap<String, EntityState<BossThreshold>>,
    swords: HashMap<String, EntityState<SwordThreshold>>,
    /// Entities that currently have an invalid record and were already reported
    invalid: HashSet<(Category, String)>,
    formatter: MessageFormatter,
    notify_invalid_records: bool,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(MessageFormatter::default())
    }
}

impl AlertEngine {
    pub fn new(formatter: MessageFormatter) -> Self {
        Self {
            bosses: HashMap::new(),
            swords: HashMap::new(),
            invalid: HashSet::new(),
            formatter,
            notify_invalid_records: false,
        }
    }

    /// Also emit a one-time alert per entity whose record is malformed
    pub fn with_invalid_record_alerts(mut self, enabled: bool) -> Self {
        self.notify_invalid_records = enabled;
        self
    }

    /// Evaluate a snapshot at `now` and return the alerts that fire
    ///
    /// Categories missing from the snapshot are left untouched. For a present
    /// category, state of entities no longer listed is dropped.
    pub fn evaluate(&mut self, snapshot: &Snapshot, now: EpochMillis) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(records) = snapshot.category(Category::Boss) {
            self.prune(Category::Boss, records);
            for (key, value) in records {
                match BossRecord::from_value(value) {
                    Ok(record) => self.evaluate_boss(key, &record, now, &mut alerts),
                    Err(e) => self.reject(Category::Boss, key, e, &mut alerts),
                }
            }
        }

        if let Some(records) = snapshot.category(Category::Sword) {
            self.prune(Category::Sword, records);
            for (key, value) in records {
                match SwordRecord::from_value(value) {
                    Ok(record) => self.evaluate_sword(key, &record, now, &mut alerts),
                    Err(e) => self.reject(Category::Sword, key, e, &mut alerts),
                }
            }
        }

        debug!(
            "Evaluated {} entities at {}, {} alerts fired",
            snapshot.entity_count(),
            now,
            alerts.len()
        );

        alerts
    }

    fn evaluate_boss(
        &mut self,
        key: &str,
        record: &BossRecord,
        now: EpochMillis,
        alerts: &mut Vec<Alert>,
    ) {
        self.invalid.remove(&(Category::Boss, key.to_string()));

        let name = display_name(key);
        let state = sync_state(&mut self.bosses, Category::Boss, key, record.last_death);

        for threshold in BossThreshold::reached(record, now) {
            if state.fire(threshold) {
                alerts.push(Alert {
                    category: Category::Boss,
                    entity: key.to_string(),
                    kind: AlertKind::Boss(threshold),
                    last_death: Some(record.last_death),
                    message: self.formatter.boss_message(&name, record, threshold),
                });
            }
        }
    }

    fn evaluate_sword(
        &mut self,
        key: &str,
        record: &SwordRecord,
        now: EpochMillis,
        alerts: &mut Vec<Alert>,
    ) {
        self.invalid.remove(&(Category::Sword, key.to_string()));

        if record.cooldown_max_ms < record.cooldown_min_ms {
            debug!(
                "Sword {} has cooldownMax below cooldownMin ({} < {})",
                key, record.cooldown_max_ms, record.cooldown_min_ms
            );
        }

        let name = display_name(key);
        let state = sync_state(&mut self.swords, Category::Sword, key, record.last_death);

        for threshold in SwordThreshold::reached(record, now) {
            if state.fire(threshold) {
                alerts.push(Alert {
                    category: Category::Sword,
                    entity: key.to_string(),
                    kind: AlertKind::Sword(threshold),
                    last_death: Some(record.last_death),
                    message: self.formatter.sword_message(&name, record, threshold, now),
                });
            }
        }
    }

    /// Skip a malformed record, reporting it once if enabled
    fn reject(&mut self, category: Category, key: &str, error: RecordError, alerts: &mut Vec<Alert>) {
        warn!("Skipping {} {}: {}", category, key, error);

        if !self.notify_invalid_records {
            return;
        }

        if self.invalid.insert((category, key.to_string())) {
            alerts.push(Alert {
                category,
                entity: key.to_string(),
                kind: AlertKind::InvalidRecord,
                last_death: None,
                message: self
                    .formatter
                    .invalid_record_message(category, &display_name(key), &error),
            });
        }
    }

    fn prune(&mut self, category: Category, records: &RecordMap) {
        let before = self.tracked_count();
        match category {
            Category::Boss => self.bosses.retain(|key, _| records.contains_key(key)),
            Category::Sword => self.swords.retain(|key, _| records.contains_key(key)),
        }
        self.invalid
            .retain(|(c, key)| *c != category || records.contains_key(key));

        let removed = before - self.tracked_count();
        if removed > 0 {
            debug!("Dropped state for {} {} entities no longer listed", removed, category);
        }
    }

    /// Undo the firing of an alert so it fires again on the next evaluation
    ///
    /// Has no effect if the entity has died again since the alert fired or is
    /// no longer tracked. Returns whether anything was rearmed.
    pub fn rearm(&mut self, alert: &Alert) -> bool {
        let rearmed = match alert.kind {
            AlertKind::Boss(threshold) => self
                .bosses
                .get_mut(&alert.entity)
                .filter(|state| Some(state.last_death) == alert.last_death)
                .map(|state| state.fired.remove(&threshold))
                .unwrap_or(false),
            AlertKind::Sword(threshold) => self
                .swords
                .get_mut(&alert.entity)
                .filter(|state| Some(state.last_death) == alert.last_death)
                .map(|state| state.fired.remove(&threshold))
                .unwrap_or(false),
            AlertKind::InvalidRecord => self
                .invalid
                .remove(&(alert.category, alert.entity.clone())),
        };

        if rearmed {
            debug!("Rearmed {} alert for {} {}", alert.label(), alert.category, alert.entity);
        }
        rearmed
    }

    /// Current phase of an entity, `None` if it is not tracked
    pub fn phase(&self, category: Category, key: &str) -> Option<AlertPhase> {
        match category {
            Category::Boss => self.bosses.get(key).map(EntityState::phase),
            Category::Sword => self.swords.get(key).map(EntityState::phase),
        }
    }

    /// Number of entities with alert state
    pub fn tracked_count(&self) -> usize {
        self.bosses.len() + self.swords.len()
    }
}


/// Minimal logger that keeps warnings so tests can assert on them
#[cfg(test)]
mod test_logger {
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::{Mutex, Once};

    static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
    static INIT: Once = Once::new();

    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Warn
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    pub fn init() {
        INIT.call_once(|| {
            if log::set_boxed_logger(Box::new(CaptureLogger)).is_ok() {
                log::set_max_level(LevelFilter::Warn);
            }
        });
    }

    pub fn warned(message: &str) -> bool {
        WARNINGS.lock().unwrap().iter().any(|w| w == message)
    }
}
