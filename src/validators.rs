/// Input validators for the public request surface.
///
/// All free-form input crosses one of these before touching the database:
/// length limits (DoS protection), format checks, and control-character
/// rejection. Passwords have their own strength rules in `auth::password`.

use lazy_static::lazy_static;
use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
const MIN_NAME_LENGTH: usize = 3;

/// Listing categories accepted by the marketplace
pub const CATEGORIES: [&str; 10] = [
    "Automotive",
    "Beauty",
    "Electronics",
    "Fashion",
    "Fitness",
    "Furniture",
    "Home Appliances",
    "Sports",
    "Tools",
    "Toys",
];

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
    SuspiciousContent(&'static str),
    InvalidCategory,
    NotPositive(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is missing!", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)!", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)!", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "Invalid {}!", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains invalid characters!", field)
            }
            ValidationError::InvalidCategory => write!(f, "Invalid category!"),
            ValidationError::NotPositive(field) => write!(f, "{} must be positive!", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates and normalizes an email address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("Email"));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("Email", MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("Email", MAX_EMAIL_LENGTH));
    }
    if trimmed.matches('@').count() != 1 || !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }
    // Extremely long local parts are a phishing indicator
    if trimmed.split('@').next().map_or(false, |local| local.len() > 64) {
        return Err(ValidationError::SuspiciousContent("Email"));
    }

    Ok(trimmed.to_string())
}

/// Validates and normalizes a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("Name"));
    }
    if trimmed.len() < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort("Name", MIN_NAME_LENGTH));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("Name", MAX_NAME_LENGTH));
    }
    if trimmed.contains('\0') || trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("Name"));
    }

    Ok(trimmed.to_string())
}

/// Checks a listing category against the fixed list
pub fn is_valid_category(category: &str) -> Result<String, ValidationError> {
    let trimmed = category.trim();
    if CATEGORIES.contains(&trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidCategory)
    }
}
