use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::{MedicalRecord, User};
use medportal_storage::{Collection, DynStore, Filter, Stored};
use serde_json::Value;

use super::{gate, non_empty, populate_users};
use crate::form::RequestForm;
use crate::validation::{Issues, sanitize};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordInput {
    /// Id of the patient's User document.
    pub user_id: String,
    pub records: Value,
    pub prescription: String,
    pub special_notes: String,
}

impl RecordInput {
    pub fn parse(form: &RequestForm) -> Result<Self, ApiError> {
        let mut issues = Issues::new();
        let user_id = issues.required_text(form, "userId", "User ID is required");
        let records = form
            .value("records")
            .filter(|v| v.is_object() || v.is_array())
            .cloned();
        if records.is_none() {
            issues.push("records", "Records are required");
        }
        let prescription = issues.optional_text(form, "prescription");
        let special_notes = issues.optional_text(form, "specialNotes");
        issues.finish()?;

        let (Some(user_id), Some(records)) = (user_id, records) else {
            return Err(ApiError::internal("validated record fields missing"));
        };
        Ok(Self {
            user_id,
            records,
            prescription: prescription.as_deref().map(sanitize).unwrap_or_default(),
            special_notes: special_notes.as_deref().map(sanitize).unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct RecordService {
    records: Collection<MedicalRecord>,
    users: Collection<User>,
}

impl RecordService {
    pub fn new(store: DynStore) -> Self {
        Self {
            records: Collection::new(store.clone()),
            users: Collection::new(store),
        }
    }

    /// A doctor writes a record for a patient.
    pub async fn create(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<MedicalRecord>, ApiError> {
        gate(ResourceKind::Record, Action::Create, caller)?;
        let input = RecordInput::parse(form)?;
        let record = MedicalRecord {
            doctor_id: caller.id.clone(),
            user_id: input.user_id,
            records: input.records,
            prescription: input.prescription,
            special_notes: input.special_notes,
        };
        let stored = self.records.insert(record).await?;
        tracing::info!(record_id = %stored.id, patient = %stored.data.user_id, "medical record created");
        Ok(stored)
    }

    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<Value>, ApiError> {
        gate(ResourceKind::Record, Action::ListAll, caller)?;
        let records = non_empty(self.records.find(&Filter::all()).await?, "No records found.")?;
        populate_users(&self.users, records, |r| r.user_id.as_str(), false).await
    }

    pub async fn list_for_patient(&self, caller: &Identity, user_id: &str) -> Result<Vec<Value>, ApiError> {
        gate(ResourceKind::Record, Action::ListForPatient, caller)?;
        let filter = Filter::all().eq(MedicalRecord::USER_FIELD, user_id);
        let records = non_empty(
            self.records.find(&filter).await?,
            "No records found for this patient.",
        )?;
        populate_users(&self.users, records, |r| r.user_id.as_str(), false).await
    }

    /// Records targeting the caller's own User.
    pub async fn list_own(&self, caller: &Identity) -> Result<Vec<Stored<MedicalRecord>>, ApiError> {
        gate(ResourceKind::Record, Action::ListOwn, caller)?;
        let user = self
            .users
            .find_one_owned_by(&caller.id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        let filter = Filter::all().eq(MedicalRecord::USER_FIELD, user.id);
        non_empty(self.records.find(&filter).await?, "No records found")
    }
}
