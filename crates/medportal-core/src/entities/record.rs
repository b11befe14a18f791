use serde::{Deserialize, Serialize};

use super::Document;

/// Medical record authored by a doctor for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    /// Identity of the authoring doctor.
    pub doctor_id: String,
    /// Id of the patient's `User` document.
    pub user_id: String,
    pub records: serde_json::Value,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub special_notes: String,
}

impl Document for MedicalRecord {
    const COLLECTION: &'static str = "records";
    const OWNER_FIELD: Option<&'static str> = Some("doctorId");
}

impl MedicalRecord {
    pub const USER_FIELD: &'static str = "userId";
}
