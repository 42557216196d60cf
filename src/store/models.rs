//! Diesel row types for the `postgres` backend. Kept separate from the
//! domain types in `store::mod` the same way the teacher split
//! `db::models` from the domain-facing repository layer: these exist only
//! to satisfy `Queryable`/`Insertable` and are converted to/from domain
//! types at the store boundary.

use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{mpi_blocking_value, mpi_patient, mpi_person};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = mpi_person)]
pub struct DbPerson {
    pub id: i64,
    pub internal_id: Uuid,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mpi_person)]
pub struct NewDbPerson {
    pub internal_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = mpi_patient)]
pub struct DbPatient {
    pub id: i64,
    pub person_id: i64,
    pub data: serde_json::Value,
    pub external_patient_id: Option<String>,
    pub external_person_id: Option<String>,
    pub external_person_source: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mpi_patient)]
pub struct NewDbPatient {
    pub person_id: i64,
    pub data: serde_json::Value,
    pub external_patient_id: Option<String>,
    pub external_person_id: Option<String>,
    pub external_person_source: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = mpi_blocking_value)]
pub struct DbBlockingValue {
    pub id: i64,
    pub patient_id: i64,
    pub blockingkey: i16,
    pub value: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mpi_blocking_value)]
pub struct NewDbBlockingValue {
    pub patient_id: i64,
    pub blockingkey: i16,
    pub value: String,
}
