//! HTTP routes, one module per resource.
//!
//! Handlers stay thin: they extract the caller and request body, hand both to
//! the matching service and shape the JSON response.
//!
//! - `users` - `/user` and `/api/users`
//! - `doctors` - `/doctor`
//! - `appointments` - `/appointment`
//! - `lab_reports` - `/api/reports`
//! - `records` - `/record`
//! - `blogs` - `/blog`

pub mod appointments;
pub mod blogs;
pub mod doctors;
pub mod lab_reports;
pub mod records;
pub mod users;

use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};

use crate::form::RequestForm;
use crate::services::gate;

/// Resolves the request body once the caller has passed the role gate, so a
/// caller without the role sees 403 even when the body is malformed.
pub(crate) fn gated_form(
    resource: ResourceKind,
    action: Action,
    caller: &Identity,
    form: Result<RequestForm, ApiError>,
) -> Result<RequestForm, ApiError> {
    gate(resource, action, caller)?;
    form
}
