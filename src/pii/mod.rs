//! Canonical PII record model.
//!
//! Incoming records arrive as loosely-typed JSON — field names vary in case
//! and punctuation, dates show up in a handful of common human formats, and
//! scalar identifiers arrive as either strings or numbers. [`PIIRecord`] is
//! the strict, canonical shape everything downstream (blocking, matching,
//! persistence) is built against; [`PIIRecord::try_from`] is the one place
//! that loose shape gets normalized or rejected.

use std::convert::TryFrom;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A person's biological sex as recorded on the incoming record.
///
/// Serializes to the single-letter codes used throughout the persisted
/// schema and the blocking-key derivation (`SEX` blocks on this code
/// directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "U")]
    Unknown,
}

impl Sex {
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "U",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            "U" | "UNKNOWN" => Ok(Sex::Unknown),
            other => Err(Error::invalid_input(format!("invalid sex code: {other}"))),
        }
    }
}

/// A single name entry. Records may carry more than one (e.g. a legal name
/// and an alias); all of them contribute to `FIRST_NAME`/`LAST_NAME` feature
/// extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Name {
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

/// A single address entry. Only the first address line is used for
/// matching; the rest is carried for display/storage purposes only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A phone number, email, or other point of contact. Not matched on; kept
/// for completeness of the persisted record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Telecom {
    pub value: Option<String>,
}

/// The canonical, validated shape of an incoming patient's demographic data.
///
/// Every field is optional except the ones the caller is required to supply
/// out of band (there is no PII field this type treats as mandatory — an
/// empty record is valid, just useless for matching).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PIIRecord {
    pub external_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub mrn: Option<String>,
    #[serde(default)]
    pub name: Vec<Name>,
    #[serde(default)]
    pub address: Vec<Address>,
    #[serde(default)]
    pub telecom: Vec<Telecom>,
}

/// The closed set of demographic attributes the linkage engine can compare
/// or block on. `external_id` is deliberately excluded — it identifies the
/// record's source system, not a demographic fact about the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Birthdate,
    Mrn,
    Sex,
    FirstName,
    LastName,
    Address,
    City,
    State,
    Zipcode,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Birthdate => "birthdate",
            Feature::Mrn => "mrn",
            Feature::Sex => "sex",
            Feature::FirstName => "first_name",
            Feature::LastName => "last_name",
            Feature::Address => "address",
            Feature::City => "city",
            Feature::State => "state",
            Feature::Zipcode => "zip",
        }
    }
}

impl TryFrom<&str> for Feature {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "birthdate" => Ok(Feature::Birthdate),
            "mrn" => Ok(Feature::Mrn),
            "sex" => Ok(Feature::Sex),
            "first_name" => Ok(Feature::FirstName),
            "last_name" => Ok(Feature::LastName),
            "address" => Ok(Feature::Address),
            "city" => Ok(Feature::City),
            "state" => Ok(Feature::State),
            "zip" => Ok(Feature::Zipcode),
            other => Err(Error::invalid_feature(format!(
                "{other} is not a recognized feature"
            ))),
        }
    }
}

const BIRTHDATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d %Y", "%m/%d/%Y"];

fn parse_birth_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    for fmt in BIRTHDATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date);
        }
    }
    Err(Error::invalid_input(format!(
        "unparseable birth date: {raw}"
    )))
}

fn obj<'a>(map: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a serde_json::Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::invalid_input(format!("{what} must be a JSON object")))
}

fn as_string_field(value: &Value, field: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::invalid_input(format!("{field} must be a string"))),
    }
}

fn optional_string(map: &serde_json::Map<String, Value>, keys: &[&str], field: &str) -> Result<Option<String>> {
    match obj(map, keys) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(as_string_field(v, field)?)),
    }
}

fn string_array(map: &serde_json::Map<String, Value>, key: &str, field: &str) -> Result<Vec<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| as_string_field(v, field))
            .collect::<Result<Vec<_>>>(),
        Some(_) => Err(Error::invalid_input(format!("{field} must be an array"))),
    }
}

fn object_array<'a>(map: &'a serde_json::Map<String, Value>, key: &str, field: &str) -> Result<Vec<&'a serde_json::Map<String, Value>>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|v| as_object(v, field)).collect(),
        Some(_) => Err(Error::invalid_input(format!("{field} must be an array"))),
    }
}

impl TryFrom<Value> for PIIRecord {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let map = as_object(&value, "record")?;

        let external_id = optional_string(map, &["external_id"], "external_id")?;

        let birth_date = match obj(map, &["birth_date", "birthDate"]) {
            None | Some(Value::Null) => None,
            Some(v) => {
                let raw = as_string_field(v, "birth_date")?;
                Some(parse_birth_date(&raw)?)
            }
        };

        let sex = match obj(map, &["sex"]) {
            None | Some(Value::Null) => None,
            Some(v) => Some(Sex::parse(&as_string_field(v, "sex")?)?),
        };

        let mrn = optional_string(map, &["mrn"], "mrn")?;

        let mut name = Vec::new();
        for entry in object_array(map, "name", "name")? {
            let family = optional_string(entry, &["family"], "name.family")?;
            let given = string_array(entry, "given", "name.given")?;
            name.push(Name { family, given });
        }

        let mut address = Vec::new();
        for entry in object_array(map, "address", "address")? {
            let line = string_array(entry, "line", "address.line")?;
            let city = optional_string(entry, &["city"], "address.city")?;
            let state = optional_string(entry, &["state"], "address.state")?;
            let postal_code =
                optional_string(entry, &["postal_code", "postalCode"], "address.postal_code")?;
            let country = optional_string(entry, &["country"], "address.country")?;
            address.push(Address {
                line,
                city,
                state,
                postal_code,
                country,
            });
        }

        let mut telecom = Vec::new();
        for entry in object_array(map, "telecom", "telecom")? {
            let value = optional_string(entry, &["value"], "telecom.value")?;
            telecom.push(Telecom { value });
        }

        Ok(PIIRecord {
            external_id,
            birth_date,
            sex,
            mrn,
            name,
            address,
            telecom,
        })
    }
}

impl PIIRecord {
    /// Extract every value this record carries for `feature`, in record
    /// order. Multi-valued fields (names, addresses) contribute one entry
    /// per source entry; callers that need "does any candidate value match
    /// any incoming value" build that on top of this (see `matching`).
    pub fn field_iter(&self, feature: Feature) -> Vec<String> {
        match feature {
            Feature::Birthdate => self
                .birth_date
                .map(|d| vec![d.format("%Y-%m-%d").to_string()])
                .unwrap_or_default(),
            Feature::Mrn => self.mrn.iter().cloned().collect(),
            Feature::Sex => self.sex.map(|s| vec![s.code().to_string()]).unwrap_or_default(),
            Feature::FirstName => self
                .name
                .iter()
                .flat_map(|n| n.given.iter().cloned())
                .collect(),
            Feature::LastName => self.name.iter().filter_map(|n| n.family.clone()).collect(),
            Feature::Address => self
                .address
                .iter()
                .filter_map(|a| a.line.first().cloned())
                .collect(),
            Feature::City => self.address.iter().filter_map(|a| a.city.clone()).collect(),
            Feature::State => self.address.iter().filter_map(|a| a.state.clone()).collect(),
            Feature::Zipcode => self
                .address
                .iter()
                .filter_map(|a| a.postal_code.as_ref().map(|z| z.chars().take(5).collect()))
                .collect(),
        }
    }

    /// As [`field_iter`](Self::field_iter), but takes a field name as it
    /// would appear in an algorithm config's `blocks`/`funcs` maps.
    /// Requesting `external_id`, or any name that isn't a [`Feature`],
    /// fails — `external_id` identifies a source system, not a demographic
    /// attribute, so it was never a feature to begin with.
    pub fn field_iter_named(&self, name: &str) -> Result<Vec<String>> {
        let feature = Feature::try_from(name)?;
        Ok(self.field_iter(feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_external_id_from_string_or_number() {
        let record = PIIRecord::try_from(json!({"external_id": 12345})).unwrap();
        assert_eq!(record.external_id.as_deref(), Some("12345"));

        let record = PIIRecord::try_from(json!({"external_id": "12345"})).unwrap();
        assert_eq!(record.external_id.as_deref(), Some("12345"));

        let record = PIIRecord::try_from(json!({})).unwrap();
        assert!(record.external_id.is_none());
    }

    #[test]
    fn parses_birth_date_in_several_formats() {
        for raw in ["1980-01-01", "January 1, 1980", "Jan 1 1980", "1/1/1980"] {
            let record = PIIRecord::try_from(json!({"birth_date": raw})).unwrap();
            assert_eq!(record.birth_date, Some(NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()));
        }
        let record = PIIRecord::try_from(json!({})).unwrap();
        assert!(record.birth_date.is_none());
    }

    #[test]
    fn rejects_unparseable_birth_date() {
        let err = PIIRecord::try_from(json!({"birth_date": "1 de enero de 1980"}));
        assert!(err.is_err());
    }

    #[test]
    fn normalizes_sex_codes() {
        for (raw, expected) in [
            ("M", Sex::Male),
            ("m", Sex::Male),
            ("Male", Sex::Male),
            ("F", Sex::Female),
            ("FEMALE", Sex::Female),
            ("U", Sex::Unknown),
            ("Unknown", Sex::Unknown),
        ] {
            let record = PIIRecord::try_from(json!({"sex": raw})).unwrap();
            assert_eq!(record.sex, Some(expected));
        }
    }

    fn sample_record() -> PIIRecord {
        PIIRecord::try_from(json!({
            "external_id": "99",
            "birth_date": "1980-2-1",
            "sex": "male",
            "mrn": "123456",
            "address": [
                {"line": ["123 Main St"], "city": "Anytown", "state": "NY", "postalCode": "12345", "country": "US"},
                {"line": ["456 Elm St", "Apt 2"], "city": "Somecity", "state": "CA", "postal_code": "98765-4321", "country": "US"},
            ],
            "name": [
                {"family": "Doe", "given": ["John", "L"]},
                {"family": "Smith", "given": ["Jane"]},
            ],
            "telecom": [{"value": "555-123-4567"}, {"value": "555-987-6543"}],
        }))
        .unwrap()
    }

    #[test]
    fn field_iter_covers_every_feature() {
        let record = sample_record();
        assert_eq!(record.field_iter(Feature::Birthdate), vec!["1980-02-01"]);
        assert_eq!(record.field_iter(Feature::Mrn), vec!["123456"]);
        assert_eq!(record.field_iter(Feature::Sex), vec!["M"]);
        assert_eq!(record.field_iter(Feature::Address), vec!["123 Main St", "456 Elm St"]);
        assert_eq!(record.field_iter(Feature::City), vec!["Anytown", "Somecity"]);
        assert_eq!(record.field_iter(Feature::State), vec!["NY", "CA"]);
        assert_eq!(record.field_iter(Feature::Zipcode), vec!["12345", "98765"]);
        assert_eq!(record.field_iter(Feature::FirstName), vec!["John", "L", "Jane"]);
        assert_eq!(record.field_iter(Feature::LastName), vec!["Doe", "Smith"]);
    }

    #[test]
    fn field_iter_named_rejects_external_id_and_unknown_names() {
        let record = sample_record();
        assert!(record.field_iter_named("external_id").is_err());
        assert!(record.field_iter_named("not_a_feature").is_err());
        assert_eq!(record.field_iter_named("mrn").unwrap(), vec!["123456"]);
    }
}
