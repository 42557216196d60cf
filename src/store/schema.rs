//! Diesel table definitions for the persisted MPI schema.
//!
//! This mirrors the schema's current shape after its one documented
//! evolution: `mpi_external_person` was folded into `mpi_patient` as two
//! nullable columns (`external_person_id`, `external_person_source`)
//! alongside the pre-existing `external_patient_id`, and
//! `idx_blocking_value_patient_key_value` replaced the narrower index that
//! preceded it. There is no migration runner in this crate — schema
//! management is an out-of-scope deployment concern — but the column and
//! index shapes here are binding.

diesel::table! {
    mpi_person (id) {
        id -> BigInt,
        internal_id -> Uuid,
    }
}

diesel::table! {
    mpi_patient (id) {
        id -> BigInt,
        person_id -> BigInt,
        data -> Jsonb,
        external_patient_id -> Nullable<Varchar>,
        external_person_id -> Nullable<Varchar>,
        external_person_source -> Nullable<Varchar>,
    }
}

diesel::table! {
    mpi_blocking_value (id) {
        id -> BigInt,
        patient_id -> BigInt,
        blockingkey -> SmallInt,
        value -> Varchar,
    }
}

diesel::joinable!(mpi_patient -> mpi_person (person_id));
diesel::joinable!(mpi_blocking_value -> mpi_patient (patient_id));

diesel::allow_tables_to_appear_in_same_query!(mpi_person, mpi_patient, mpi_blocking_value);
