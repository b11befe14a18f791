//! Notification hook fired after a lab report changes.
//!
//! [`NotificationDispatcher::dispatch`] hands an event to every registered
//! [`Notifier`] on its own tokio task and returns immediately. Failures are
//! logged and never reach the request that triggered them.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod notifiers;

pub use dispatcher::{DispatchHandle, NotificationDispatcher};
pub use error::NotificationError;
pub use event::{LabReportUpdated, NotificationEvent};
pub use notifiers::{DoctorNotifier, Notifier, PatientNotifier, WebhookNotifier};
