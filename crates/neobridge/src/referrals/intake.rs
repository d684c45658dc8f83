use chrono::{DateTime, Local, NaiveDate};
use url::Url;

use super::age::{calculate_age, AgeBreakdown};
use super::domain::CaseSubmission;
use super::error::ReferralError;

/// Submission after field validation, ready to become a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedSubmission {
    pub(crate) patient_name: String,
    pub(crate) date_of_birth: NaiveDate,
    pub(crate) age: AgeBreakdown,
    pub(crate) contact_phone: String,
    pub(crate) other_contact_phone: Option<String>,
    pub(crate) contact_email: String,
    pub(crate) referring_hospital: String,
    pub(crate) has_insurance: bool,
    pub(crate) medical_report_url: Option<String>,
    pub(crate) identity_document_url: Option<String>,
}

/// Checks fields in form order and reports the first one that fails.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IntakeGuard;

impl IntakeGuard {
    pub(crate) fn validate(
        &self,
        submission: CaseSubmission,
        today: NaiveDate,
    ) -> Result<ValidatedSubmission, ReferralError> {
        let patient_name = required_text(&submission.patient_name, "patient_name")?;

        let date_of_birth = parse_birth_date(&submission.date_of_birth)
            .ok_or(ReferralError::Validation {
                field: "date_of_birth",
            })?;
        let age = calculate_age(date_of_birth, today).ok_or(ReferralError::Validation {
            field: "date_of_birth",
        })?;

        let contact_phone = required_text(&submission.contact_phone, "contact_phone")?;
        let other_contact_phone = optional_text(submission.other_contact_phone);

        let contact_email = submission.contact_email.trim().to_string();
        if !is_plausible_email(&contact_email) {
            return Err(ReferralError::Validation {
                field: "contact_email",
            });
        }

        let referring_hospital =
            required_text(&submission.referring_hospital, "referring_hospital")?;

        let medical_report_url =
            optional_url(submission.medical_report_url, "medical_report_url")?;
        let identity_document_url =
            optional_url(submission.identity_document_url, "identity_document_url")?;

        Ok(ValidatedSubmission {
            patient_name,
            date_of_birth,
            age,
            contact_phone,
            other_contact_phone,
            contact_email,
            referring_hospital,
            has_insurance: submission.has_insurance,
            medical_report_url,
            identity_document_url,
        })
    }
}

fn required_text(value: &str, field: &'static str) -> Result<String, ReferralError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReferralError::Validation { field });
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn optional_url(
    value: Option<String>,
    field: &'static str,
) -> Result<Option<String>, ReferralError> {
    let Some(raw) = optional_text(value) else {
        return Ok(None);
    };
    match Url::parse(&raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(Some(raw))
        }
        _ => Err(ReferralError::Validation { field }),
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; timestamps are read as local calendar dates.
pub(crate) fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Local).date_naive())
    })
}

fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
