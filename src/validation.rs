//! Input validation for write requests.
//!
//! Validation failures are caller-correctable and never retried; they are
//! surfaced before any storage or publish work happens.

use crate::models::person::{NewPerson, PersonPatch};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length for a person name.
const MAX_NAME_LENGTH: usize = 100;

/// Inclusive upper bound for age.
const MAX_AGE: i32 = 150;

/// Incoming create payload, pre-validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePersonRequest {
    pub name: String,
    pub age: i32,
}

/// Incoming update payload; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePersonRequest {
    pub name: Option<String>,
    pub age: Option<i32>,
}

/// One failed constraint on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// All constraint failures for one request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect();
        write!(f, "{}", details.join("; "))
    }
}

fn check_name(name: &str, errors: &mut Vec<ValidationError>) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.push(ValidationError::new("name", "must not be blank"));
    } else if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.push(ValidationError::new(
            "name",
            format!("must be at most {MAX_NAME_LENGTH} characters"),
        ));
    }
}

fn check_age(age: i32, errors: &mut Vec<ValidationError>) {
    if !(0..=MAX_AGE).contains(&age) {
        errors.push(ValidationError::new(
            "age",
            format!("must be between 0 and {MAX_AGE}"),
        ));
    }
}

/// Validate a create request into storage-ready fields.
pub fn validate_create(request: &CreatePersonRequest) -> Result<NewPerson, ValidationErrors> {
    let mut errors = Vec::new();
    check_name(&request.name, &mut errors);
    check_age(request.age, &mut errors);

    if errors.is_empty() {
        Ok(NewPerson {
            name: request.name.trim().to_string(),
            age: request.age,
        })
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Validate an update request into a patch. An empty request is rejected:
/// there is nothing to persist or publish.
pub fn validate_update(request: &UpdatePersonRequest) -> Result<PersonPatch, ValidationErrors> {
    let mut errors = Vec::new();

    if request.name.is_none() && request.age.is_none() {
        errors.push(ValidationError::new("request", "no fields to update"));
    }
    if let Some(name) = &request.name {
        check_name(name, &mut errors);
    }
    if let Some(age) = request.age {
        check_age(age, &mut errors);
    }

    if errors.is_empty() {
        Ok(PersonPatch {
            name: request.name.as_ref().map(|n| n.trim().to_string()),
            age: request.age,
        })
    } else {
        Err(ValidationErrors(errors))
    }
}
