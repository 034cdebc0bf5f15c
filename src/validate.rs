//! Client-side form validation. This is UX only; the backend revalidates
//! everything. Rules mirror the server's minimums so a request that
//! passes here is not bounced for length.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::EventInput;

/// A validation error in a submitted form
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn validate_login(email: &str, password: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !EMAIL_RE.is_match(email.trim()) {
        errors.push(ValidationError::new("email", "Enter a valid email address"));
    }
    if password.is_empty() {
        errors.push(ValidationError::new("password", "Password is required"));
    }
    errors
}

pub fn validate_registration(email: &str, password: &str, name: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if name.trim().len() < 2 {
        errors.push(ValidationError::new(
            "name",
            "Name must be at least 2 characters",
        ));
    }
    if !EMAIL_RE.is_match(email.trim()) {
        errors.push(ValidationError::new("email", "Enter a valid email address"));
    }
    if password.len() < 8 {
        errors.push(ValidationError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    errors
}

/// Minimums match the server's binding rules; the date check keeps users
/// from creating events that are already over.
pub fn validate_event(input: &EventInput, now: DateTime<Utc>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if input.name.trim().len() < 3 {
        errors.push(ValidationError::new(
            "name",
            "Event name must be at least 3 characters",
        ));
    }
    if input.description.trim().len() < 10 {
        errors.push(ValidationError::new(
            "description",
            "Description must be at least 10 characters",
        ));
    }
    if input.location.trim().len() < 3 {
        errors.push(ValidationError::new(
            "location",
            "Location must be at least 3 characters",
        ));
    }
    if input.date_time < now {
        errors.push(ValidationError::new(
            "dateTime",
            "Event date must be in the future",
        ));
    }
    errors
}
