use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::transaction::AMOUNT_SCALE;
use crate::domain::NewTransaction;
use crate::error::AppError;

pub const TX_ID_MAX_LEN: usize = 100;
pub const ACCOUNT_MAX_LEN: usize = 50;
pub const CURRENCY_LEN: usize = 3;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
pub const MAX_AMOUNT: i64 = 1_000_000;

/// Stripped from descriptions before storage.
const DESCRIPTION_FORBIDDEN_CHARS: &[char] = &['<', '>', '"', '\'', ';', '&'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
            value: None,
        }
    }

    /// Keeps the offending value for the internal log record only.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: Some(err.field.to_string()),
            value: err.value,
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Identifiers (`tx_id`, account ids) are limited to ASCII letters, digits, `_` and `-`.
pub fn validate_identifier(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)?;

    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(ValidationError::new(
            field,
            "must contain only letters, digits, '_' or '-'",
        )
        .with_value(value));
    }

    Ok(())
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(
            ValidationError::new("currency", "must be a 3-letter uppercase currency code")
                .with_value(currency),
        );
    }

    Ok(())
}

pub fn parse_amount(raw: &str) -> Result<BigDecimal, ValidationError> {
    let raw = raw.trim();
    if raw.len() > AMOUNT_INPUT_MAX_LEN {
        return Err(ValidationError::new(
            "amount",
            format!("must be at most {} characters", AMOUNT_INPUT_MAX_LEN),
        ));
    }

    // Exponent notation would let a short input carry an unbounded scale.
    if !is_plain_decimal(raw) {
        return Err(ValidationError::new("amount", "must be a decimal number").with_value(raw));
    }

    let amount = BigDecimal::from_str(raw)
        .map_err(|_| ValidationError::new("amount", "must be a decimal number").with_value(raw))?;

    validate_positive_amount(&amount).map_err(|e| e.with_value(raw))?;

    if amount > BigDecimal::from(MAX_AMOUNT) {
        return Err(
            ValidationError::new("amount", format!("must not exceed {}", MAX_AMOUNT))
                .with_value(raw),
        );
    }

    if amount.with_scale(AMOUNT_SCALE) != amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_SCALE),
        )
        .with_value(raw));
    }

    Ok(amount.with_scale(AMOUNT_SCALE))
}

/// Optional sign, digits, at most one `.`; no exponent.
fn is_plain_decimal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(raw);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    !(int_part.is_empty() && frac_part.is_empty())
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Strips markup/statement characters; blank results become `None`.
pub fn sanitize_description(description: Option<String>) -> Option<String> {
    let cleaned: String = description?
        .chars()
        .filter(|ch| !DESCRIPTION_FORBIDDEN_CHARS.contains(ch))
        .collect();

    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Incoming webhook body. Unknown fields are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookPayload {
    pub tx_id: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: String,
    pub currency: String,
    pub sender_account: String,
    pub receiver_account: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Accepts JSON numbers and numeric strings, keeping the textual form so
/// no precision is lost before decimal parsing.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(serde::de::Error::custom(format!(
            "amount must be a number, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl WebhookPayload {
    /// Parses the raw (already signature-checked) body.
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(raw_body)
            .map_err(|e| AppError::validation(describe_json_error(&e), "body"))
    }

    pub fn validate(self) -> Result<NewTransaction, ValidationError> {
        validate_identifier("tx_id", &self.tx_id, TX_ID_MAX_LEN)?;
        let amount = parse_amount(&self.amount)?;
        validate_currency(&self.currency)?;
        validate_identifier("sender_account", &self.sender_account, ACCOUNT_MAX_LEN)?;
        validate_identifier("receiver_account", &self.receiver_account, ACCOUNT_MAX_LEN)?;

        if let Some(description) = &self.description {
            validate_max_len("description", description, DESCRIPTION_MAX_LEN)?;
        }

        Ok(NewTransaction {
            tx_id: self.tx_id,
            amount,
            currency: self.currency,
            sender_account: self.sender_account,
            receiver_account: self.receiver_account,
            description: sanitize_description(self.description),
        })
    }
}

/// Client-facing description of a body parse failure. serde's "invalid
/// type/value" messages echo the offending value, so only the field-name
/// forms are passed through.
fn describe_json_error(err: &serde_json::Error) -> String {
    use serde_json::error::Category;

    match err.classify() {
        Category::Syntax | Category::Eof | Category::Io => "Malformed JSON body".to_string(),
        Category::Data => {
            let text = err.to_string();
            let head = text.split(" at line").next().unwrap_or_default();
            if head.starts_with("unknown field") || head.starts_with("missing field") {
                let head = head.split(", expected").next().unwrap_or(head);
                format!("Invalid payload: {}", head)
            } else if head.starts_with("amount must be") {
                format!("Invalid payload: {}", head)
            } else {
                "Invalid payload: field has the wrong type".to_string()
            }
        }
    }
}
