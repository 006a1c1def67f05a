//! Fiscal year configuration
//!
//! Read once at startup from the first document of the `accounts` collection
//! in the document store (Firestore REST shape). Any failure here aborts
//! startup rather than serving with a wrong fiscal calendar.

use serde::Serialize;
use serde_json::Value;

use crate::settings::FiscalSettings;

#[derive(Debug, thiserror::Error)]
pub enum FiscalError {
    #[error("failed to fetch account document: {0}")]
    Fetch(String),
    #[error("could not fetch account from the document store")]
    NoAccount,
    #[error("invalid fiscal start month: {0}, must be 1-12")]
    InvalidStartMonth(i64),
    #[error("malformed account document: {0}")]
    Malformed(String),
}

/// Fiscal year start and the month offset used to shift dates into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiscalYear {
    pub start_month: u8,
    pub offset: u8,
}

impl Default for FiscalYear {
    fn default() -> Self {
        Self {
            start_month: 1,
            offset: 12,
        }
    }
}

impl FiscalYear {
    /// # Errors
    ///
    /// Returns [`FiscalError::InvalidStartMonth`] outside 1-12
    pub fn from_start_month(start_month: i64) -> Result<Self, FiscalError> {
        match u8::try_from(start_month) {
            Ok(month @ 1..=12) => Ok(Self {
                start_month: month,
                offset: 13 - month,
            }),
            _ => Err(FiscalError::InvalidStartMonth(start_month)),
        }
    }

    /// Interpret a `documents` listing of the accounts collection
    ///
    /// Only a `fiscal_year` map with `custom = true` moves the start month
    /// away from January.
    ///
    /// # Errors
    ///
    /// Returns an error when there is no account document, when a custom
    /// fiscal year has no usable start month, or the month is out of range
    pub fn from_accounts_response(response: &Value) -> Result<Self, FiscalError> {
        let account = response
            .get("documents")
            .and_then(Value::as_array)
            .and_then(|documents| documents.first())
            .ok_or(FiscalError::NoAccount)?;

        let Some(fiscal_year) = account
            .pointer("/fields/fiscal_year/mapValue/fields")
            .and_then(Value::as_object)
        else {
            return Self::from_start_month(1);
        };

        let custom = fiscal_year
            .get("custom")
            .and_then(|value| value.get("booleanValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !custom {
            return Self::from_start_month(1);
        }

        let start_month = fiscal_year
            .get("start_month")
            .ok_or_else(|| FiscalError::Malformed("custom fiscal year without start_month".to_string()))
            .and_then(integer_value)?;
        Self::from_start_month(start_month)
    }
}

/// Firestore encodes 64-bit integers as strings, but be lenient about numbers
fn integer_value(value: &Value) -> Result<i64, FiscalError> {
    let raw = value
        .get("integerValue")
        .ok_or_else(|| FiscalError::Malformed(format!("start_month is not a number: {value}")))?;

    match raw {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| FiscalError::Malformed(format!("start_month '{s}': {e}"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| FiscalError::Malformed(format!("start_month {n} is not an integer"))),
        other => Err(FiscalError::Malformed(format!(
            "start_month is not a number: {other}"
        ))),
    }
}

/// Read the fiscal year from the configured document store
///
/// # Errors
///
/// Returns an error if the request fails or the response cannot be interpreted
pub async fn fetch_fiscal_year(
    http: &reqwest::Client,
    settings: &FiscalSettings,
) -> Result<FiscalYear, FiscalError> {
    log::info!("Fetching fiscal year from {}", settings.documents_url);

    let mut request = http
        .get(&settings.documents_url)
        .query(&[("pageSize", "1")]);
    match std::env::var(&settings.access_token_env) {
        Ok(token) if !token.is_empty() => request = request.bearer_auth(token),
        _ => log::warn!(
            "{} is not set, reading account document without credentials",
            settings.access_token_env
        ),
    }

    let response = request
        .send()
        .await
        .map_err(|e| FiscalError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(FiscalError::Fetch(format!(
            "document store returned status: {}",
            response.status()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| FiscalError::Malformed(e.to_string()))?;

    let fiscal_year = FiscalYear::from_accounts_response(&body)?;
    log::info!(
        "Fiscal year starts in month {} (offset {})",
        fiscal_year.start_month,
        fiscal_year.offset
    );
    Ok(fiscal_year)
}
