use axum::http::StatusCode;

use super::domain::{Locale, ServiceType};
use super::repository::RepositoryError;

/// Failure taxonomy of the referral engine.
///
/// `Display` is the internal, log-oriented description; [`ReferralError::user_message`] is the
/// localized text shown to people.
#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("invalid or missing field `{field}`")]
    Validation { field: &'static str },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("hospital `{0}` could not be provisioned")]
    ProvisioningFailed(String),
    #[error("case `{id}` is incomplete: missing `{field}`")]
    IncompleteRecord { id: String, field: &'static str },
    #[error("no free case identifier after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },
    #[error("case `{0}` is already assigned")]
    AlreadyAssigned(String),
    #[error("hospital `{hospital}` has no free {unit} beds")]
    NoCapacity { hospital: String, unit: ServiceType },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl ReferralError {
    pub(crate) fn case_not_found(id: impl Into<String>) -> Self {
        ReferralError::NotFound {
            entity: "case",
            id: id.into(),
        }
    }

    pub(crate) fn hospital_not_found(id: impl Into<String>) -> Self {
        ReferralError::NotFound {
            entity: "hospital",
            id: id.into(),
        }
    }

    /// Translate a storage failure for an operation on a single entity.
    pub(crate) fn from_repository(
        err: RepositoryError,
        on_missing: impl FnOnce() -> ReferralError,
    ) -> Self {
        match err {
            RepositoryError::NotFound => on_missing(),
            RepositoryError::Conflict => {
                ReferralError::BackendUnavailable("unexpected write conflict".to_string())
            }
            RepositoryError::Unavailable(reason) => ReferralError::BackendUnavailable(reason),
        }
    }

    /// Stable machine-readable kind for API payloads and metrics labels.
    pub const fn kind(&self) -> &'static str {
        match self {
            ReferralError::Validation { .. } => "validation_error",
            ReferralError::NotFound { .. } => "not_found",
            ReferralError::InvalidInput(_) => "invalid_input",
            ReferralError::ProvisioningFailed(_) => "provisioning_failed",
            ReferralError::IncompleteRecord { .. } => "incomplete_record",
            ReferralError::IdSpaceExhausted { .. } => "id_space_exhausted",
            ReferralError::AlreadyAssigned(_) => "already_assigned",
            ReferralError::NoCapacity { .. } => "no_capacity",
            ReferralError::BackendUnavailable(_) => "backend_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReferralError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ReferralError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ReferralError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReferralError::AlreadyAssigned(_) | ReferralError::NoCapacity { .. } => {
                StatusCode::CONFLICT
            }
            ReferralError::ProvisioningFailed(_) | ReferralError::IncompleteRecord { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ReferralError::IdSpaceExhausted { .. } | ReferralError::BackendUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    pub fn user_message(&self, locale: Locale) -> String {
        match locale {
            Locale::Arabic => self.arabic_message(),
            Locale::English => self.english_message(),
        }
    }

    fn arabic_message(&self) -> String {
        match self {
            ReferralError::Validation { field } => format!(
                "البيانات المدخلة غير صالحة: يرجى التحقق من الحقل ({}).",
                field_label(field, Locale::Arabic)
            ),
            ReferralError::NotFound { entity: "hospital", .. } => {
                "لم يتم العثور على المستشفى.".to_string()
            }
            ReferralError::NotFound { .. } => {
                "لم يتم العثور على حالة بهذا الرقم. يرجى التحقق من الرقم والمحاولة مرة أخرى."
                    .to_string()
            }
            ReferralError::InvalidInput(_) => {
                "القيم المدخلة غير صالحة. يرجى التحقق منها والمحاولة مرة أخرى.".to_string()
            }
            ReferralError::ProvisioningFailed(_) => {
                "تعذر إنشاء سجل المستشفى. يرجى المحاولة مرة أخرى لاحقًا.".to_string()
            }
            ReferralError::IncompleteRecord { .. } => {
                "بيانات الحالة غير مكتملة. يرجى الاتصال بالدعم الفني.".to_string()
            }
            ReferralError::IdSpaceExhausted { .. } => {
                "تعذر إنشاء رقم للحالة. يرجى المحاولة مرة أخرى لاحقًا.".to_string()
            }
            ReferralError::AlreadyAssigned(_) => {
                "تم تعيين هذه الحالة إلى مستشفى بالفعل.".to_string()
            }
            ReferralError::NoCapacity { .. } => {
                "لا توجد أسرّة شاغرة من النوع المطلوب في هذا المستشفى.".to_string()
            }
            ReferralError::BackendUnavailable(_) => {
                "فشل الاتصال بالخادم. يرجى المحاولة مرة أخرى لاحقًا.".to_string()
            }
        }
    }

    fn english_message(&self) -> String {
        match self {
            ReferralError::Validation { field } => format!(
                "The submitted data is invalid: please check the {} field.",
                field_label(field, Locale::English)
            ),
            ReferralError::NotFound { entity: "hospital", .. } => {
                "The hospital could not be found.".to_string()
            }
            ReferralError::NotFound { .. } => {
                "No case was found with this number. Please check it and try again.".to_string()
            }
            ReferralError::InvalidInput(_) => {
                "The submitted values are invalid. Please check them and try again.".to_string()
            }
            ReferralError::ProvisioningFailed(_) => {
                "The hospital record could not be created. Please try again later.".to_string()
            }
            ReferralError::IncompleteRecord { .. } => {
                "The case data is incomplete. Please contact support.".to_string()
            }
            ReferralError::IdSpaceExhausted { .. } => {
                "A case number could not be generated. Please try again later.".to_string()
            }
            ReferralError::AlreadyAssigned(_) => {
                "This case has already been assigned to a hospital.".to_string()
            }
            ReferralError::NoCapacity { .. } => {
                "This hospital has no free beds of the required type.".to_string()
            }
            ReferralError::BackendUnavailable(_) => {
                "The service is unreachable. Please try again later.".to_string()
            }
        }
    }
}

fn field_label(field: &str, locale: Locale) -> &str {
    match (locale, field) {
        (Locale::Arabic, "patient_name") => "اسم المريض",
        (Locale::Arabic, "date_of_birth") => "تاريخ الميلاد",
        (Locale::Arabic, "contact_phone") => "رقم هاتف التواصل",
        (Locale::Arabic, "other_contact_phone") => "رقم هاتف إضافي",
        (Locale::Arabic, "contact_email") => "البريد الإلكتروني",
        (Locale::Arabic, "referring_hospital") => "المستشفى المحيل",
        (Locale::Arabic, "hospital_id") => "معرف المستشفى",
        (Locale::Arabic, "assigned_by") => "المسؤول عن التعيين",
        (Locale::English, "patient_name") => "patient name",
        (Locale::English, "date_of_birth") => "date of birth",
        (Locale::English, "contact_phone") => "contact phone",
        (Locale::English, "other_contact_phone") => "additional contact phone",
        (Locale::English, "contact_email") => "contact email",
        (Locale::English, "referring_hospital") => "referring hospital",
        (Locale::English, "hospital_id") => "hospital identifier",
        (Locale::English, "assigned_by") => "assigning operator",
        _ => field,
    }
}
