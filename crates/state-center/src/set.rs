use std::collections::HashSet;

use actharvest_core_types::{Record, RecordIdentity};
use chrono::{DateTime, Utc};

/// Identities already handled, plus the time of the last change.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessedSet {
    identities: HashSet<RecordIdentity>,
    last_updated: Option<DateTime<Utc>>,
}

/// Outcome of merging a batch of records into a [`ProcessedSet`].
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    /// Records whose identity was not yet present, in input order.
    pub accepted: Vec<Record>,
    /// Records dropped because the identity was already known or repeated in the batch.
    pub duplicates: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        identities: HashSet<RecordIdentity>,
        last_updated: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            identities,
            last_updated,
        }
    }

    pub fn contains(&self, identity: &RecordIdentity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Identities in ascending order, the form used on disk.
    pub fn sorted(&self) -> Vec<RecordIdentity> {
        let mut out: Vec<_> = self.identities.iter().cloned().collect();
        out.sort();
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordIdentity> {
        self.identities.iter()
    }

    /// Adds one identity. Returns `false` when it was already present.
    pub fn insert(&mut self, identity: RecordIdentity) -> bool {
        let inserted = self.identities.insert(identity);
        if inserted {
            self.touch();
        }
        inserted
    }

    /// Adds every record whose identity is new; first occurrence wins.
    pub fn merge<'a, I>(&mut self, records: I) -> MergeReport
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut report = MergeReport::default();
        for record in records {
            if self.identities.insert(record.identity().clone()) {
                report.accepted.push(record.clone());
            } else {
                report.duplicates += 1;
            }
        }
        if !report.accepted.is_empty() {
            self.touch();
        }
        report
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str) -> Record {
        Record::new(RecordIdentity::new(name, url).unwrap(), "Container Hero").unwrap()
    }

    #[test]
    fn merging_known_record_is_idempotent() {
        let mut set = ProcessedSet::new();
        set.merge([&record("A", "u1")]);
        let before = set.clone();

        let report = set.merge([&record("A", "u1")]);
        assert!(report.is_noop());
        assert_eq!(report.duplicates, 1);
        assert_eq!(set, before);
    }

    #[test]
    fn batch_duplicates_collapse() {
        let base = ProcessedSet::new();
        let r = record("B", "u2");

        let mut once = base.clone();
        once.merge([&r]);
        let mut twice = base.clone();
        let report = twice.merge([&r, &r]);

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(once.sorted(), twice.sorted());
    }

    #[test]
    fn merge_matches_trimmed_identity() {
        let mut set = ProcessedSet::new();
        set.merge([&record("A", "u1")]);
        assert!(set.contains(&RecordIdentity::new(" A ", "u1  ").unwrap()));
    }

    #[test]
    fn noop_merge_keeps_timestamp() {
        let mut set = ProcessedSet::new();
        assert!(set.last_updated().is_none());
        set.merge(std::iter::empty());
        assert!(set.last_updated().is_none());
        assert!(set.insert(RecordIdentity::new("C", "D").unwrap()));
        assert!(set.last_updated().is_some());
        assert!(!set.insert(RecordIdentity::new("C", "D").unwrap()));
    }

    #[test]
    fn sorted_is_ascending() {
        let mut set = ProcessedSet::new();
        set.merge([&record("b", "2"), &record("a", "9"), &record("a", "1")]);
        let names: Vec<_> = set
            .sorted()
            .into_iter()
            .map(|id| format!("{}{}", id.primary(), id.secondary()))
            .collect();
        assert_eq!(names, vec!["a1", "a9", "b2"]);
    }
}
