//! Generated record ids: a kind prefix and a Snowflake sequence, e.g.
//! `ALR-7192837465012345`.
//!
//! Ids supplied by clients or seed files are kept verbatim; only records
//! created without one get a generated id.

use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static SEQUENCE: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Record kinds that get generated ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Equipment,
    Connection,
    Threshold,
    Alert,
    Sample,
}

impl IdKind {
    const ALL: [IdKind; 5] = [
        IdKind::Equipment,
        IdKind::Connection,
        IdKind::Threshold,
        IdKind::Alert,
        IdKind::Sample,
    ];

    pub const fn prefix(self) -> &'static str {
        match self {
            IdKind::Equipment => "EQ",
            IdKind::Connection => "CONN",
            IdKind::Threshold => "THR",
            IdKind::Alert => "ALR",
            IdKind::Sample => "SMP",
        }
    }

    /// A fresh id of this kind.
    pub fn generate(self) -> String {
        format!("{}-{}", self.prefix(), next_sequence())
    }

    /// Kind of a generated id, or `None` for ids chosen elsewhere.
    pub fn of(id: &str) -> Option<IdKind> {
        let (prefix, sequence) = id.split_once('-')?;
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

/// Sets the Snowflake worker identity; both values must be in `0..=31`.
///
/// Without a call the sequence starts as worker `(1, 1)`.
pub fn init(machine_id: i32, node_id: i32) {
    let mut sequence = SEQUENCE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *sequence = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

fn next_sequence() -> i64 {
    let mut sequence = SEQUENCE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    sequence
        .get_or_insert_with(|| SnowflakeIdBucket::new(1, 1))
        .get_id()
}

pub fn equipment_id() -> String {
    IdKind::Equipment.generate()
}

pub fn connection_id() -> String {
    IdKind::Connection.generate()
}

pub fn threshold_id() -> String {
    IdKind::Threshold.generate()
}

pub fn alert_id() -> String {
    IdKind::Alert.generate()
}

pub fn sample_id() -> String {
    IdKind::Sample.generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_across_kinds() {
        init(1, 1);
        let mut sequences = HashSet::new();
        for _ in 0..500 {
            for id in [alert_id(), threshold_id()] {
                let (_, sequence) = id.split_once('-').unwrap();
                assert!(sequences.insert(sequence.to_string()), "reused sequence in {id}");
            }
        }
    }

    #[test]
    fn generated_ids_carry_their_kind() {
        assert!(alert_id().starts_with("ALR-"));
        assert!(sample_id().starts_with("SMP-"));
        assert_eq!(IdKind::of(&equipment_id()), Some(IdKind::Equipment));
        assert_eq!(IdKind::of(&connection_id()), Some(IdKind::Connection));
        assert_eq!(IdKind::of(&threshold_id()), Some(IdKind::Threshold));
    }

    #[test]
    fn client_ids_have_no_kind() {
        for id in ["SEP-01", "ALR-", "ALR-12x", "12345", "XYZ-42"] {
            assert_eq!(IdKind::of(id), None, "{id}");
        }
    }
}
