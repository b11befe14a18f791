//! Resource services.
//!
//! Each service owns the collections it works on and applies the
//! authorization policy in a fixed order: role gate, input validation,
//! existence, then ownership.

mod appointments;
mod blogs;
mod doctors;
mod lab_reports;
mod records;
mod users;

pub use appointments::AppointmentService;
pub use blogs::{BlogInput, BlogService};
pub use doctors::DoctorService;
pub use lab_reports::{LabReportService, UpdateReportInput, UploadReportInput};
pub use records::{RecordInput, RecordService};
pub use users::{SaveUserInput, UserService};

use medportal_api::ApiError;
use medportal_auth::{Action, Identity, Operation, ResourceKind, authorize, check_role};
use medportal_core::{Document, User, UserSummary, validate_id};
use medportal_storage::{Collection, Stored};
use serde_json::Value;

/// Role check for `resource.action`, before anything is read.
pub(crate) fn gate(resource: ResourceKind, action: Action, caller: &Identity) -> Result<(), ApiError> {
    check_role(Operation::new(resource, action), &caller.id, caller.role)
        .into_result()
        .map_err(ApiError::from)
}

/// Full policy decision against a loaded resource's owner.
pub(crate) fn ensure_access(
    resource: ResourceKind,
    action: Action,
    caller: &Identity,
    owner: &str,
) -> Result<(), ApiError> {
    authorize(Operation::new(resource, action), caller, Some(owner))
        .into_result()
        .map_err(ApiError::from)
}

/// Path ids that cannot name a document are reported as missing.
pub(crate) fn checked_id<'a>(id: &'a str, not_found: &str) -> Result<&'a str, ApiError> {
    validate_id(id).map_err(|_| ApiError::not_found(not_found))?;
    Ok(id)
}

/// Lists that come back empty are reported as not found.
pub(crate) fn non_empty<T>(items: Vec<T>, not_found: &str) -> Result<Vec<T>, ApiError> {
    if items.is_empty() {
        Err(ApiError::not_found(not_found))
    } else {
        Ok(items)
    }
}

/// Serializes `docs`, replacing each `userId` with a summary of the User it
/// references, or `null` when that User no longer exists.
pub(crate) async fn populate_users<T, F>(
    users: &Collection<User>,
    docs: Vec<Stored<T>>,
    user_id: F,
    include_identity: bool,
) -> Result<Vec<Value>, ApiError>
where
    T: Document,
    F: Fn(&T) -> &str,
{
    let found = users
        .find_by_ids(docs.iter().map(|d| user_id(&d.data).to_string()))
        .await?;
    docs.iter()
        .map(|doc| {
            let summary = found
                .get(user_id(&doc.data))
                .map(|u| UserSummary::from_user(&u.id, &u.data, include_identity));
            let mut value = serde_json::to_value(doc)
                .map_err(|e| ApiError::internal(format!("serialize {}: {e}", T::COLLECTION)))?;
            value["userId"] = serde_json::to_value(summary)
                .map_err(|e| ApiError::internal(format!("serialize user summary: {e}")))?;
            Ok(value)
        })
        .collect()
}
