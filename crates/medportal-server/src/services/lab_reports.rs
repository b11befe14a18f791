use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::{DoctorComment, Document, FileRef, LabReport, User};
use medportal_notifications::{LabReportUpdated, NotificationDispatcher};
use medportal_storage::{
    ArrayPull, CascadeOutcome, Collection, DynStore, Filter, StorageResult, Stored,
};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

use super::{checked_id, ensure_access, gate, non_empty, populate_users};
use crate::form::{RequestForm, UploadedFile};
use crate::uploads::{DynFileStore, is_report_mime, remove_quietly};
use crate::validation::Issues;

const REPORT_FIELD: &str = "report";
const FILE_TYPE_MESSAGE: &str = "Only PDF, JPG, and PNG files are allowed";
const READ_NOT_FOUND: &str = "Report not found";
const WRITE_NOT_FOUND: &str = "Lab report not found";

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReportInput {
    pub report_id: String,
    pub doctor_name: String,
    pub comment: String,
    /// Identity of the patient the report belongs to.
    pub patient_id: Option<String>,
}

impl UploadReportInput {
    fn parse(form: &RequestForm, issues: &mut Issues) -> Option<Self> {
        let report_id = issues.required_text(form, "reportID", "Report ID is required");
        let doctor_name = issues.required_text(form, "doctorName", "Doctor name is required");
        let comment = issues.required_text(form, "comment", "Comment is required");
        let patient_id = issues.optional_text(form, "patientId").filter(|p| !p.is_empty());
        Some(Self {
            report_id: report_id?,
            doctor_name: doctor_name?,
            comment: comment?,
            patient_id,
        })
    }
}

/// Optional changes accepted by the update route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReportInput {
    pub report_id: Option<String>,
    /// `(doctorName, comment)`, appended when both are present.
    pub comment: Option<(String, String)>,
}

impl UpdateReportInput {
    fn parse(form: &RequestForm, issues: &mut Issues) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let report_id = non_empty(issues.optional_text(form, "reportID"));
        let doctor_name = non_empty(issues.optional_text(form, "doctorName"));
        let comment = non_empty(issues.optional_text(form, "comment"));
        Self {
            report_id,
            comment: doctor_name.zip(comment),
        }
    }
}

#[derive(Clone)]
pub struct LabReportService {
    store: DynStore,
    reports: Collection<LabReport>,
    users: Collection<User>,
    files: DynFileStore,
    max_file_bytes: usize,
    notifications: Option<NotificationDispatcher>,
}

impl LabReportService {
    pub fn new(store: DynStore, files: DynFileStore, max_file_bytes: usize) -> Self {
        Self {
            reports: Collection::new(store.clone()),
            users: Collection::new(store.clone()),
            store,
            files,
            max_file_bytes,
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.notifications = Some(dispatcher);
        self
    }

    /// Checks a report file part. `None` when the part is absent.
    fn check_file<'a>(
        &self,
        form: &'a RequestForm,
        issues: &mut Issues,
    ) -> Result<Option<&'a UploadedFile>, ApiError> {
        let Some(file) = form.file(REPORT_FIELD) else {
            return Ok(None);
        };
        if !is_report_mime(&file.content_type) {
            return Err(ApiError::bad_request(FILE_TYPE_MESSAGE));
        }
        if file.size() > self.max_file_bytes {
            issues.push(REPORT_FIELD, format!("File exceeds {} bytes", self.max_file_bytes));
        }
        Ok(Some(file))
    }

    /// Stores the uploaded report for a patient and links it to their User.
    pub async fn upload(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<LabReport>, ApiError> {
        gate(ResourceKind::LabReport, Action::Create, caller)?;

        let mut issues = Issues::new();
        let input = UploadReportInput::parse(form, &mut issues);
        let file = self.check_file(form, &mut issues)?;
        if file.is_none() {
            issues.push(REPORT_FIELD, "Report file is required");
        }
        issues.finish()?;
        let (Some(input), Some(file)) = (input, file) else {
            return Err(ApiError::internal("validated upload fields missing"));
        };

        let patient_identity = input.patient_id.as_deref().unwrap_or(&caller.id);
        let patient = self
            .users
            .find_one_owned_by(patient_identity)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let file_ref = self.files.save(file).await?;
        let mut report = LabReport::new(
            input.report_id,
            file_ref.clone(),
            patient.id.clone(),
            patient_identity,
        );
        report.add_comment(input.doctor_name, input.comment);

        let stored = match self.reports.insert(report).await {
            Ok(stored) => stored,
            Err(e) => {
                remove_quietly(self.files.as_ref(), &file_ref.path).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .users
            .push(&patient.id, User::LAB_REPORTS_FIELD, &stored.id)
            .await
        {
            tracing::warn!(report_id = %stored.id, error = %e, "linking report failed; rolling back");
            if let Err(rollback) = self.reports.delete(&stored.id).await {
                tracing::error!(report_id = %stored.id, error = %rollback, "report rollback failed");
            }
            remove_quietly(self.files.as_ref(), &file_ref.path).await;
            return Err(e.into());
        }

        tracing::info!(
            report_id = %stored.id,
            patient = %patient_identity,
            uploaded_by = %caller.id,
            "lab report uploaded"
        );
        Ok(stored)
    }

    async fn load(&self, id: &str, not_found: &str) -> Result<Stored<LabReport>, ApiError> {
        let id = checked_id(id, not_found)?;
        self.reports
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(not_found))
    }

    pub async fn get(&self, caller: &Identity, id: &str) -> Result<Stored<LabReport>, ApiError> {
        gate(ResourceKind::LabReport, Action::Read, caller)?;
        let report = self.load(id, READ_NOT_FOUND).await?;
        ensure_access(ResourceKind::LabReport, Action::Read, caller, &report.data.identity_id)?;
        Ok(report)
    }

    pub async fn list_own(&self, caller: &Identity) -> Result<Vec<Stored<LabReport>>, ApiError> {
        gate(ResourceKind::LabReport, Action::ListOwn, caller)?;
        non_empty(self.reports.find_owned_by(&caller.id).await?, "No lab reports found")
    }

    /// All reports, each with its patient's summary in `userId`.
    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<Value>, ApiError> {
        gate(ResourceKind::LabReport, Action::ListAll, caller)?;
        let reports = non_empty(self.reports.find(&Filter::all()).await?, "No reports found")?;
        populate_users(&self.users, reports, |r| r.user_id.as_str(), true).await
    }

    /// Appends a doctor comment. Any doctor may comment on any report.
    pub async fn comment(
        &self,
        caller: &Identity,
        id: &str,
        form: &RequestForm,
    ) -> Result<Stored<LabReport>, ApiError> {
        gate(ResourceKind::LabReport, Action::Comment, caller)?;
        let mut issues = Issues::new();
        let doctor_name = issues.required_text(form, "doctorName", "Doctor name is required");
        let comment = issues.required_text(form, "comment", "Comment is required");
        issues.finish()?;
        let (Some(doctor_name), Some(comment)) = (doctor_name, comment) else {
            return Err(ApiError::internal("validated comment fields missing"));
        };

        let report = self.load(id, READ_NOT_FOUND).await?;
        let entry = DoctorComment::new(doctor_name, comment);
        Ok(self
            .reports
            .push(&report.id, LabReport::COMMENTS_FIELD, &entry)
            .await?)
    }

    /// Applies the provided changes, then fires the update notification.
    pub async fn update(
        &self,
        caller: &Identity,
        id: &str,
        form: &RequestForm,
    ) -> Result<Stored<LabReport>, ApiError> {
        gate(ResourceKind::LabReport, Action::Update, caller)?;
        let mut issues = Issues::new();
        let input = UpdateReportInput::parse(form, &mut issues);
        let file = self.check_file(form, &mut issues)?;
        issues.finish()?;

        let report = self.load(id, WRITE_NOT_FOUND).await?;
        let mut fields = Map::new();
        if let Some(report_id) = input.report_id {
            fields.insert(LabReport::REPORT_ID_FIELD.into(), json!(report_id));
        }
        let mut replaced: Option<(FileRef, FileRef)> = None;
        if let Some(file) = file {
            let new_ref = self.files.save(file).await?;
            fields.extend(LabReport::file_fields(&new_ref));
            replaced = Some((report.data.file(), new_ref));
        }

        let saved = match self.apply_update(report, fields, input.comment).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Some((_, new_ref)) = &replaced {
                    remove_quietly(self.files.as_ref(), &new_ref.path).await;
                }
                return Err(e.into());
            }
        };
        if let Some((old_ref, _)) = &replaced {
            remove_quietly(self.files.as_ref(), &old_ref.path).await;
        }

        self.notify_updated(caller, &saved);
        Ok(saved)
    }

    /// Writes only the changed fields, then appends the comment. Comments
    /// added concurrently by other requests are kept.
    async fn apply_update(
        &self,
        report: Stored<LabReport>,
        fields: Map<String, Value>,
        comment: Option<(String, String)>,
    ) -> StorageResult<Stored<LabReport>> {
        let mut current = report;
        if !fields.is_empty() {
            current = self.reports.set_fields(&current.id, fields).await?;
        }
        if let Some((doctor_name, comment)) = comment {
            let entry = DoctorComment::new(doctor_name, comment);
            current = self
                .reports
                .push(&current.id, LabReport::COMMENTS_FIELD, &entry)
                .await?;
        }
        Ok(current)
    }

    fn notify_updated(&self, caller: &Identity, report: &Stored<LabReport>) {
        let Some(dispatcher) = &self.notifications else {
            return;
        };
        let snapshot = match serde_json::to_value(report) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(report_id = %report.id, error = %e, "notification skipped");
                return;
            }
        };
        let event = LabReportUpdated {
            report_id: report.id.clone(),
            report_ref: report.data.report_id.clone(),
            patient_identity_id: report.data.identity_id.clone(),
            updated_by: caller.id.clone(),
            doctor_names: report
                .data
                .doctor_comments
                .iter()
                .map(|c| c.doctor_name.clone())
                .collect(),
            occurred_at: OffsetDateTime::now_utc(),
            report: snapshot,
        };
        let handle = dispatcher.dispatch(event.into());
        tracing::debug!(
            report_id = %report.id,
            notifiers = handle.task_count(),
            "lab report update dispatched"
        );
    }

    /// Deletes the report and removes its id from every User.
    pub async fn delete(&self, caller: &Identity, id: &str) -> Result<(), ApiError> {
        gate(ResourceKind::LabReport, Action::Delete, caller)?;
        let report = self.load(id, WRITE_NOT_FOUND).await?;
        ensure_access(ResourceKind::LabReport, Action::Delete, caller, &report.data.identity_id)?;

        let pull = ArrayPull::new(User::COLLECTION, User::LAB_REPORTS_FIELD);
        let outcome = self
            .store
            .delete_and_pull(LabReport::COLLECTION, &report.id, &pull)
            .await;
        match outcome {
            Ok(CascadeOutcome::NotFound) => Err(ApiError::not_found(WRITE_NOT_FOUND)),
            Ok(CascadeOutcome::Deleted { unlinked }) => {
                tracing::info!(report_id = %report.id, unlinked, "lab report deleted");
                remove_quietly(self.files.as_ref(), &report.data.file_url).await;
                Ok(())
            }
            Err(e) => {
                if e.is_partial_write() {
                    remove_quietly(self.files.as_ref(), &report.data.file_url).await;
                }
                Err(e.into())
            }
        }
    }
}
