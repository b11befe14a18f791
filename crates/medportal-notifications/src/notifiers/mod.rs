pub mod log;
pub mod webhook;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::event::NotificationEvent;

/// Receiver of portal events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns an error if delivery failed. The dispatcher logs it and moves on.
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

pub use log::{DoctorNotifier, PatientNotifier};
pub use webhook::WebhookNotifier;
