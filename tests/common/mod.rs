//! Shared fixtures for the linkage-pipeline integration tests.

use serde_json::{json, Value};

/// Six records exercising `DIBBS_BASIC`: record 2 is a near-duplicate of
/// record 1 (same MRN, sex, birthdate, and name) and is expected to attach to
/// the same person; record 4 shares record 1's name and address but not its
/// MRN/birthdate, and is close enough in birthdate to score a cluster match
/// under log-odds scoring without an exact-match rule ever agreeing with it.
/// Records 3, 5, and 6 share nothing with any other record in the bundle.
pub fn six_patient_bundle() -> Vec<Value> {
    vec![
        json!({
            "mrn": "1234567",
            "sex": "M",
            "birth_date": "1980-01-01",
            "name": [{"family": "Shepard", "given": ["John"]}],
            "address": [{"line": ["1234 Silversun Strip"], "city": "Boston", "state": "MA", "postal_code": "99999"}],
        }),
        json!({
            "mrn": "1234567",
            "sex": "M",
            "birth_date": "1980-01-01",
            "name": [{"family": "Shepard", "given": ["John"]}],
            "address": [{"line": ["1234 Silversun Strip"], "city": "Boston", "state": "MA", "postal_code": "99999"}],
        }),
        json!({
            "mrn": "2222222",
            "sex": "F",
            "birth_date": "1991-05-05",
            "name": [{"family": "Williams", "given": ["Jane"]}],
            "address": [{"line": ["1 Williams Way"], "city": "Columbus", "state": "OH", "postal_code": "11111"}],
        }),
        json!({
            "mrn": "9999990",
            "sex": "M",
            "birth_date": "1980-01-02",
            "name": [{"family": "Shepard", "given": ["John"]}],
            "address": [{"line": ["1234 Silversun Strip"], "city": "Boston", "state": "MA", "postal_code": "99999"}],
        }),
        json!({
            "mrn": "4444444",
            "sex": "F",
            "birth_date": "1960-03-03",
            "name": [{"family": "Davis", "given": ["Sara"]}],
            "address": [{"line": ["3 Davis Ave"], "city": "Denver", "state": "CO", "postal_code": "33333"}],
        }),
        json!({
            "mrn": "5555555",
            "sex": "M",
            "birth_date": "1988-09-09",
            "name": [{"family": "Garcia", "given": ["Luis"]}],
            "address": [{"line": ["4 Garcia Blvd"], "city": "Miami", "state": "FL", "postal_code": "44444"}],
        }),
    ]
}

/// The [`six_patient_bundle`] plus a 7th record: a fuzzy "Jhon" copy of
/// record 1, sharing its birthdate/MRN/sex exactly but misspelling the given
/// name. It is expected to attach to record 1's person under log-odds
/// scoring (high Jaro-Winkler similarity on the name) but to block-and-fail
/// under exact matching.
pub fn seven_patient_bundle() -> Vec<Value> {
    let mut bundle = six_patient_bundle();
    bundle.push(json!({
        "mrn": "1234567",
        "sex": "M",
        "birth_date": "1980-01-01",
        "name": [{"family": "Shepard", "given": ["Jhon"]}],
        "address": [{"line": ["1234 Silversun Strip"], "city": "Boston", "state": "MA", "postal_code": "99999"}],
    }));
    bundle
}
