//! Blocking-key registry.
//!
//! A [`BlockingKey`] is a cheap, low-cardinality derivation from a
//! [`PIIRecord`] that narrows the set of existing patients a new record must
//! be compared against. Every patient gets a `BlockingValue` row per key per
//! distinct derived value at insert time; a linkage pass only has to query
//! for patients sharing at least one derived value per blocked-on field,
//! instead of scoring every patient in the index.
//!
//! The six keys below, and their numeric ids, are wire-stable: they are
//! persisted in the `blockingkey` column, so a future key can be added but
//! an existing one must never be renumbered or removed.

use crate::error::{Error, Result};
use crate::pii::{Feature, PIIRecord};

/// The longest a derived blocking value is allowed to be. Chosen to comfortably
/// fit "first/last 4 characters" and ISO dates/zip-code-prefixes while keeping
/// the indexed column narrow.
pub const BLOCKING_VALUE_MAX_LENGTH: usize = 20;

/// A blocking key, identified by a frozen numeric id persisted alongside
/// every derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockingKey {
    Birthdate,
    Mrn,
    Sex,
    Zip,
    FirstName,
    LastName,
}

impl BlockingKey {
    /// All keys the index derives values for, in frozen-id order.
    pub const ALL: [BlockingKey; 6] = [
        BlockingKey::Birthdate,
        BlockingKey::Mrn,
        BlockingKey::Sex,
        BlockingKey::Zip,
        BlockingKey::FirstName,
        BlockingKey::LastName,
    ];

    /// The frozen wire id. Never derive this from enum discriminant order —
    /// that would silently renumber existing persisted rows if a variant is
    /// ever inserted or reordered.
    pub fn id(&self) -> i16 {
        match self {
            BlockingKey::Birthdate => 1,
            BlockingKey::Mrn => 2,
            BlockingKey::Sex => 3,
            BlockingKey::Zip => 4,
            BlockingKey::FirstName => 5,
            BlockingKey::LastName => 6,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BlockingKey::Birthdate => "Date of Birth",
            BlockingKey::Mrn => "Last 4 chars of MRN",
            BlockingKey::Sex => "Sex",
            BlockingKey::Zip => "Zip Code",
            BlockingKey::FirstName => "First 4 chars of First Name",
            BlockingKey::LastName => "First 4 chars of Last Name",
        }
    }

    /// The [`Feature`] this key is derived from.
    fn feature(&self) -> Feature {
        match self {
            BlockingKey::Birthdate => Feature::Birthdate,
            BlockingKey::Mrn => Feature::Mrn,
            BlockingKey::Sex => Feature::Sex,
            BlockingKey::Zip => Feature::Zipcode,
            BlockingKey::FirstName => Feature::FirstName,
            BlockingKey::LastName => Feature::LastName,
        }
    }

    /// Apply this key's intrinsic transformation (if any) to a single raw
    /// feature value, producing the comparable, storable derived value.
    pub(crate) fn derive_single(&self, raw: &str) -> String {
        match self {
            BlockingKey::Mrn => last_n_chars(raw, 4),
            BlockingKey::FirstName | BlockingKey::LastName => first_n_chars(raw, 4),
            BlockingKey::Birthdate | BlockingKey::Sex | BlockingKey::Zip => raw.to_string(),
        }
    }

    /// Every distinct derived value this key produces for `record`. A
    /// record missing the backing field entirely yields an empty set, which
    /// is not an error — it just means this key contributes nothing to
    /// blocking for this record.
    pub fn to_values(&self, record: &PIIRecord) -> Result<Vec<String>> {
        let mut values: Vec<String> = record
            .field_iter(self.feature())
            .iter()
            .map(|raw| self.derive_single(raw))
            .collect();
        values.sort();
        values.dedup();

        if let Some(oversized) = values.iter().find(|v| v.len() > BLOCKING_VALUE_MAX_LENGTH) {
            return Err(Error::internal(format!(
                "blocking key {self:?} derived a value longer than {BLOCKING_VALUE_MAX_LENGTH} chars: {oversized}"
            )));
        }
        Ok(values)
    }
}

impl TryFrom<i16> for BlockingKey {
    type Error = Error;

    fn try_from(id: i16) -> Result<Self> {
        match id {
            1 => Ok(BlockingKey::Birthdate),
            2 => Ok(BlockingKey::Mrn),
            3 => Ok(BlockingKey::Sex),
            4 => Ok(BlockingKey::Zip),
            5 => Ok(BlockingKey::FirstName),
            6 => Ok(BlockingKey::LastName),
            other => Err(Error::internal(format!("unknown blocking key id {other}"))),
        }
    }
}

impl From<BlockingKey> for i16 {
    fn from(key: BlockingKey) -> i16 {
        key.id()
    }
}

fn first_n_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn last_n_chars(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if len <= n {
        s.to_string()
    } else {
        s.chars().skip(len - n).collect()
    }
}

/// Map a [`Feature`] onto the [`BlockingKey`] it backs, if any. Not every
/// feature is blockable — `address`, `city`, and `state` are matched on but
/// never blocked on, since they are too high-cardinality and too noisy to
/// narrow a candidate set usefully.
pub fn blocking_key_for_feature(feature: Feature) -> Option<BlockingKey> {
    match feature {
        Feature::Birthdate => Some(BlockingKey::Birthdate),
        Feature::Mrn => Some(BlockingKey::Mrn),
        Feature::Sex => Some(BlockingKey::Sex),
        Feature::Zipcode => Some(BlockingKey::Zip),
        Feature::FirstName => Some(BlockingKey::FirstName),
        Feature::LastName => Some(BlockingKey::LastName),
        Feature::Address | Feature::City | Feature::State => None,
    }
}
