//! In-process notifiers that record events in the service log.

use async_trait::async_trait;

use super::Notifier;
use crate::error::NotificationError;
use crate::event::NotificationEvent;

/// Tells the doctors on a report that it changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoctorNotifier;

#[async_trait]
impl Notifier for DoctorNotifier {
    fn name(&self) -> &'static str {
        "doctor"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let NotificationEvent::LabReportUpdated(e) = event;
        tracing::info!(
            target: "medportal::notify",
            audience = "doctor",
            report_id = %e.report_id,
            report = %e.report_ref,
            doctors = ?e.doctor_names,
            "lab report updated"
        );
        Ok(())
    }
}

/// Tells the patient that their report changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientNotifier;

#[async_trait]
impl Notifier for PatientNotifier {
    fn name(&self) -> &'static str {
        "patient"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let NotificationEvent::LabReportUpdated(e) = event;
        tracing::info!(
            target: "medportal::notify",
            audience = "patient",
            report_id = %e.report_id,
            report = %e.report_ref,
            patient = %e.patient_identity_id,
            "lab report updated"
        );
        Ok(())
    }
}
