//! Diesel + r2d2 backed `MpiStore`, the production persistence layer.

use std::collections::{BTreeMap, HashSet};
use std::convert::TryFrom;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use uuid::Uuid;

use crate::blocking::{blocking_key_for_feature, BlockingKey};
use crate::error::{Error, Result};
use crate::pii::{Feature, PIIRecord};

use super::models::{DbBlockingValue, DbPatient, DbPerson, NewDbBlockingValue, NewDbPatient, NewDbPerson};
use super::schema::{mpi_blocking_value, mpi_patient, mpi_person};
use super::{scrub, BlockFilter, CandidateRow, MpiStore, Patient, Person};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool against `database_url`. Pool sizing and
/// connection lifecycle are the caller's concern (see `config`); this is
/// just the `ConnectionManager` wiring diesel expects.
pub fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::Pool(e.to_string()))
}

fn db_person_to_domain(db: DbPerson) -> Person {
    Person { id: db.id, internal_id: db.internal_id }
}

fn db_patient_to_domain(db: DbPatient) -> Result<Patient> {
    Ok(Patient {
        id: db.id,
        person_id: db.person_id,
        record: PIIRecord::try_from(db.data)?,
        external_patient_id: db.external_patient_id,
        external_person_id: db.external_person_id,
        external_person_source: db.external_person_source,
    })
}

/// A Postgres-backed `MpiStore`.
pub struct DieselMpiStore {
    pool: DbPool,
}

impl DieselMpiStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| Error::Pool(e.to_string()))
    }

    fn derive_blocking_value_rows(patient_id: i64, record: &PIIRecord) -> Result<Vec<NewDbBlockingValue>> {
        let mut rows = Vec::new();
        for key in BlockingKey::ALL {
            for value in key.to_values(record)? {
                rows.push(NewDbBlockingValue { patient_id, blockingkey: key.id(), value });
            }
        }
        Ok(rows)
    }
}

impl MpiStore for DieselMpiStore {
    fn insert_person(&self) -> Result<Person> {
        let mut conn = self.conn()?;
        let db: DbPerson = diesel::insert_into(mpi_person::table)
            .values(NewDbPerson { internal_id: Uuid::new_v4() })
            .get_result(&mut conn)?;
        Ok(db_person_to_domain(db))
    }

    fn insert_patient(
        &self,
        person_id: i64,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<Patient> {
        let mut conn = self.conn()?;
        let data = scrub(
            serde_json::to_value(record).map_err(|e| Error::internal(format!("failed to serialize record: {e}")))?,
        );
        let new_patient = NewDbPatient {
            person_id,
            data: data.clone(),
            external_patient_id,
            external_person_id,
            external_person_source,
        };
        let db_patient: DbPatient = diesel::insert_into(mpi_patient::table)
            .values(&new_patient)
            .get_result(&mut conn)?;

        let record = PIIRecord::try_from(data)?;
        let rows = Self::derive_blocking_value_rows(db_patient.id, &record)?;
        if !rows.is_empty() {
            diesel::insert_into(mpi_blocking_value::table).values(&rows).execute(&mut conn)?;
        }

        db_patient_to_domain(db_patient)
    }

    fn select_person_by_id(&self, id: i64) -> Result<Option<Person>> {
        let mut conn = self.conn()?;
        let db: Option<DbPerson> = mpi_person::table.find(id).first(&mut conn).optional()?;
        Ok(db.map(db_person_to_domain))
    }

    fn select_patient_by_id(&self, id: i64) -> Result<Option<Patient>> {
        let mut conn = self.conn()?;
        let db: Option<DbPatient> = mpi_patient::table.find(id).first(&mut conn).optional()?;
        db.map(db_patient_to_domain).transpose()
    }

    fn patients_for_person(&self, person_id: i64) -> Result<Vec<Patient>> {
        let mut conn = self.conn()?;
        let rows: Vec<DbPatient> = mpi_patient::table
            .filter(mpi_patient::person_id.eq(person_id))
            .load(&mut conn)?;
        rows.into_iter().map(db_patient_to_domain).collect()
    }

    fn get_block_data(&self, filters: &BTreeMap<Feature, BlockFilter>) -> Result<Vec<CandidateRow>> {
        let mut conn = self.conn()?;

        let mut matching_ids: Option<HashSet<i64>> = None;
        for (feature, filter) in filters {
            let key = blocking_key_for_feature(*feature).ok_or_else(|| {
                Error::invalid_config(format!("{} is not a supported blocking field", feature.name()))
            })?;
            let derived = key.derive_single(&filter.value);
            let rows: Vec<DbBlockingValue> = mpi_blocking_value::table
                .filter(mpi_blocking_value::blockingkey.eq(key.id()))
                .filter(mpi_blocking_value::value.eq(derived))
                .load(&mut conn)?;
            let ids: HashSet<i64> = rows.into_iter().map(|r| r.patient_id).collect();
            matching_ids = Some(match matching_ids {
                None => ids,
                Some(prev) => prev.intersection(&ids).copied().collect(),
            });
        }

        let ids: Vec<i64> = matching_ids.unwrap_or_default().into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbPatient> = mpi_patient::table.filter(mpi_patient::id.eq_any(ids)).load(&mut conn)?;
        rows.into_iter()
            .map(|db| {
                Ok(CandidateRow {
                    patient_id: db.id,
                    person_id: db.person_id,
                    record: PIIRecord::try_from(db.data)?,
                })
            })
            .collect()
    }

    fn link_patient(
        &self,
        person_id: Option<i64>,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<(Person, Patient)> {
        let mut conn = self.conn()?;
        conn.transaction::<(Person, Patient), Error, _>(|conn| {
            let person = match person_id {
                Some(id) => {
                    let db: DbPerson = mpi_person::table.find(id).first(conn)?;
                    db_person_to_domain(db)
                }
                None => {
                    let db: DbPerson = diesel::insert_into(mpi_person::table)
                        .values(NewDbPerson { internal_id: Uuid::new_v4() })
                        .get_result(conn)?;
                    db_person_to_domain(db)
                }
            };

            let data = scrub(
                serde_json::to_value(record)
                    .map_err(|e| Error::internal(format!("failed to serialize record: {e}")))?,
            );
            let new_patient = NewDbPatient {
                person_id: person.id,
                data: data.clone(),
                external_patient_id,
                external_person_id,
                external_person_source,
            };
            let db_patient: DbPatient = diesel::insert_into(mpi_patient::table)
                .values(&new_patient)
                .get_result(conn)?;

            let canonical_record = PIIRecord::try_from(data)?;
            let rows = Self::derive_blocking_value_rows(db_patient.id, &canonical_record)?;
            if !rows.is_empty() {
                diesel::insert_into(mpi_blocking_value::table).values(&rows).execute(conn)?;
            }

            let patient = Patient {
                id: db_patient.id,
                person_id: db_patient.person_id,
                record: canonical_record,
                external_patient_id: db_patient.external_patient_id,
                external_person_id: db_patient.external_person_id,
                external_person_source: db_patient.external_person_source,
            };
            Ok((person, patient))
        })
    }
}
