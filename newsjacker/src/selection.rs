use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ingestion::{HeadlineKey, HeadlineRecord};

/// Which aggregated headlines are active for title generation.
///
/// Transitions consume the set and return the new state; the caller decides
/// when to redraw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    default_state: bool,
    #[serde(with = "flag_entries")]
    flags: HashMap<HeadlineKey, bool>,
}

impl SelectionSet {
    /// A fresh selection with one entry per record, each set to `default_state`.
    pub fn new(default_state: bool, records: &[HeadlineRecord]) -> Self {
        Self {
            default_state,
            flags: HashMap::new(),
        }
        .apply_bulk(default_state, records)
    }

    /// Overwrites every flag with `active`. Entries for records no longer in
    /// scope are dropped so the set tracks exactly `records`.
    pub fn apply_bulk(mut self, active: bool, records: &[HeadlineRecord]) -> Self {
        self.default_state = active;
        self.flags = records.iter().map(|r| (r.key(), active)).collect();
        self
    }

    /// Sets a single record's flag, inserting it if it was not tracked yet.
    pub fn toggle(mut self, record: &HeadlineRecord, active: bool) -> Self {
        self.flags.insert(record.key(), active);
        self
    }

    /// Records whose flag is set, in the order given.
    pub fn active_subset(&self, records: &[HeadlineRecord]) -> Vec<HeadlineRecord> {
        records
            .iter()
            .filter(|r| self.is_active(r))
            .cloned()
            .collect()
    }

    pub fn is_active(&self, record: &HeadlineRecord) -> bool {
        self.flags.get(&record.key()).copied().unwrap_or(false)
    }

    pub fn default_state(&self) -> bool {
        self.default_state
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.flags.values().filter(|active| **active).count()
    }
}

// JSON object keys must be strings, so flags travel as a list of entries.
mod flag_entries {
    use super::HeadlineKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        #[serde(flatten)]
        key: HeadlineKey,
        active: bool,
    }

    pub fn serialize<S: Serializer>(flags: &HashMap<HeadlineKey, bool>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<Entry> = flags
            .iter()
            .map(|(key, active)| Entry {
                key: key.clone(),
                active: *active,
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.key.source, &a.key.title, &a.key.link).cmp(&(&b.key.source, &b.key.title, &b.key.link))
        });
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<HeadlineKey, bool>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.active)).collect())
    }
}
