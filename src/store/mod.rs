//! MPI store: the persistence boundary between the linkage engine and
//! whatever database backs the index.
//!
//! [`MpiStore`] is the component boundary. Two implementations ship with
//! this crate: [`postgres::DieselMpiStore`] for production use, and
//! [`memory::InMemoryMpiStore`] for tests and the seed scenarios that
//! exercise the linkage pipeline end-to-end without a live database.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::blocking::BlockingKey;
use crate::error::Result;
use crate::pii::{Feature, PIIRecord};

pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;

/// An identity: one real-world patient, possibly represented by several
/// `Patient` rows contributed by different source systems over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub internal_id: Uuid,
}

/// One ingested record, scrubbed and attached to a [`Person`]. The
/// `external_*` fields are the columns that used to live on a separate
/// `external_person` table before that table was folded into this one.
#[derive(Debug, Clone)]
pub struct Patient {
    pub id: i64,
    pub person_id: i64,
    pub record: PIIRecord,
    pub external_patient_id: Option<String>,
    pub external_person_id: Option<String>,
    pub external_person_source: Option<String>,
}

/// One derived blocking value for one patient.
#[derive(Debug, Clone)]
pub struct BlockingValue {
    pub id: i64,
    pub patient_id: i64,
    pub blockingkey: BlockingKey,
    pub value: String,
}

/// A candidate returned by [`MpiStore::get_block_data`]: a patient sharing
/// at least one derived blocking value with the query, paired with the
/// person it belongs to and its full canonical record (so the engine can
/// run the configured matchers against any feature, not just the ones that
/// were blocked on).
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub patient_id: i64,
    pub person_id: i64,
    pub record: PIIRecord,
}

/// A literal value to filter `get_block_data` on for one field. The
/// field's intrinsic blocking-key transformation (first4/last4/identity) is
/// always applied before comparison — see
/// [`crate::blocking::BlockingKey::to_values`] for the derivation every
/// stored value already went through.
#[derive(Debug, Clone)]
pub struct BlockFilter {
    pub value: String,
}

/// The MPI store's write/read surface. Every write the linkage engine
/// performs for one incoming record — the new `Patient` row, its derived
/// `BlockingValue` rows, and, if a new identity is needed, the `Person` row
/// — happens inside [`link_patient`](MpiStore::link_patient), atomically.
#[cfg_attr(test, mockall::automock)]
pub trait MpiStore {
    /// Create a fresh, empty identity.
    fn insert_person(&self) -> Result<Person>;

    /// Persist `record` under `person_id`, deriving and storing every
    /// `BlockingValue` the record's fields produce. Not required to be
    /// atomic with person creation — use [`link_patient`](MpiStore::link_patient)
    /// for the full ingest path.
    fn insert_patient(
        &self,
        person_id: i64,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<Patient>;

    fn select_person_by_id(&self, id: i64) -> Result<Option<Person>>;

    fn select_patient_by_id(&self, id: i64) -> Result<Option<Patient>>;

    fn patients_for_person(&self, person_id: i64) -> Result<Vec<Patient>>;

    /// Every patient whose blocking values satisfy every filter (AND across
    /// fields; each field's stored value need only equal the filter's
    /// derived value — there is exactly one derived value per field here,
    /// since filters carry a single literal input).
    fn get_block_data(&self, filters: &BTreeMap<Feature, BlockFilter>) -> Result<Vec<CandidateRow>>;

    /// The full ingest path for one incoming record: create a person if
    /// `person_id` is `None`, then insert the patient and fan out its
    /// blocking values, all in one transaction.
    fn link_patient(
        &self,
        person_id: Option<i64>,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<(Person, Patient)>;
}

/// Recursively strip `null`, `[]`, and `{}` leaves from `value` before
/// persistence — there is no reason to store a field that carries no
/// information. Idempotent: scrubbing an already-scrubbed value is a no-op.
pub fn scrub(value: Value) -> Value {
    fn is_empty(value: &Value) -> bool {
        matches!(value, Value::Null)
            || matches!(value, Value::Array(a) if a.is_empty())
            || matches!(value, Value::Object(o) if o.is_empty())
    }

    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, scrub(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(scrub)
                .filter(|v| !is_empty(v))
                .collect(),
        ),
        other => other,
    }
}

/// Rewrite a `(header-row, data-rows)` table so a `given_name` column
/// holding a list of given names becomes a `first_name` column holding
/// those names joined with a single space. `data` includes the header as
/// its first row, matching the tabular shape candidate rows are sometimes
/// flattened to for callers that want one string per cell rather than a
/// typed [`CandidateRow`]. A table with no `given_name` column is returned
/// unchanged.
pub fn flatten_given_names(mut data: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let Some(header) = data.first() else {
        return data;
    };
    let Some(idx) = header.iter().position(|cell| cell.as_str() == Some("given_name")) else {
        return data;
    };

    data[0][idx] = Value::String("first_name".to_string());
    for row in data.iter_mut().skip(1) {
        if let Some(Value::Array(items)) = row.get(idx) {
            let joined = items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            row[idx] = Value::String(joined);
        }
    }
    data
}
