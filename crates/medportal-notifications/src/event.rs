use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Events the portal publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum NotificationEvent {
    #[serde(rename = "lab_report.updated")]
    LabReportUpdated(LabReportUpdated),
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::LabReportUpdated(_) => "lab_report.updated",
        }
    }
}

/// A lab report was modified through the update route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReportUpdated {
    /// Document id of the report.
    pub report_id: String,
    /// The human-facing `reportID`.
    pub report_ref: String,
    /// Identity id of the patient who owns the report.
    pub patient_identity_id: String,
    /// Identity id of the doctor or admin who made the change.
    pub updated_by: String,
    /// Doctors who have commented on the report, in comment order.
    pub doctor_names: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    /// The full updated document.
    pub report: Value,
}

impl From<LabReportUpdated> for NotificationEvent {
    fn from(event: LabReportUpdated) -> Self {
        NotificationEvent::LabReportUpdated(event)
    }
}
