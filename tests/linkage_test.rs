//! End-to-end linkage-pipeline scenarios against `InMemoryMpiStore`.

mod common;

use std::collections::HashMap;

use master_patient_index::algorithm::{dibbs_basic, dibbs_enhanced};
use master_patient_index::engine::LinkageEngine;
use master_patient_index::store::memory::InMemoryMpiStore;
use master_patient_index::store::MpiStore;

fn cluster_sizes(person_ids: &[i64]) -> Vec<usize> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for id in person_ids {
        *counts.entry(*id).or_insert(0) += 1;
    }
    let mut sizes: Vec<usize> = counts.into_values().collect();
    sizes.sort_unstable();
    sizes
}

#[test]
fn dibbs_basic_links_a_six_patient_bundle() {
    let engine = LinkageEngine::new(InMemoryMpiStore::new());
    let algorithm = dibbs_basic();

    let mut matched = Vec::new();
    let mut person_ids = Vec::new();
    for record in common::six_patient_bundle() {
        let (is_match, person_id) = engine.link_record(record, &algorithm).unwrap();
        matched.push(is_match);
        person_ids.push(person_id);
    }

    assert_eq!(matched, vec![false, true, false, false, false, false]);
    assert_eq!(cluster_sizes(&person_ids), vec![1, 1, 1, 1, 2]);
}

#[test]
fn dibbs_enhanced_links_a_seven_patient_bundle() {
    let engine = LinkageEngine::new(InMemoryMpiStore::new());
    let algorithm = dibbs_enhanced();

    let mut matched = Vec::new();
    let mut person_ids = Vec::new();
    for record in common::seven_patient_bundle() {
        let (is_match, person_id) = engine.link_record(record, &algorithm).unwrap();
        matched.push(is_match);
        person_ids.push(person_id);
    }

    assert_eq!(matched, vec![false, true, false, true, false, false, true]);
    assert_eq!(cluster_sizes(&person_ids), vec![1, 1, 1, 4]);
}

#[test]
fn empty_index_always_creates_a_new_person_for_the_first_record() {
    let engine = LinkageEngine::new(InMemoryMpiStore::new());
    let algorithm = dibbs_basic();
    let (matched, person_id) = engine
        .link_record(
            serde_json::json!({"mrn": "1", "sex": "M", "birth_date": "2000-01-01"}),
            &algorithm,
        )
        .unwrap();
    assert!(!matched);
    assert!(engine.store().select_person_by_id(person_id).unwrap().is_some());
}

#[test]
fn an_all_null_record_still_creates_a_person_with_no_blocking_values() {
    let engine = LinkageEngine::new(InMemoryMpiStore::new());
    let algorithm = dibbs_basic();
    let (matched, person_id) = engine.link_record(serde_json::json!({}), &algorithm).unwrap();
    assert!(!matched);

    let patients = engine.store().patients_for_person(person_id).unwrap();
    assert_eq!(patients.len(), 1);
}
