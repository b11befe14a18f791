use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Document, IDENTITY_FIELD};

/// Reference to a file held by the upload store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub path: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorComment {
    pub doctor_name: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    #[serde(rename = "reportID")]
    pub report_id: String,
    pub file_url: String,
    pub file_size: u64,
    pub file_type: String,
    /// Id of the owning `User` document.
    pub user_id: String,
    /// External identity of the owning patient.
    #[serde(rename = "clerkUserId")]
    pub identity_id: String,
    #[serde(default)]
    pub doctor_comments: Vec<DoctorComment>,
}

impl Document for LabReport {
    const COLLECTION: &'static str = "labreports";
    const OWNER_FIELD: Option<&'static str> = Some(IDENTITY_FIELD);
}

impl LabReport {
    pub const REPORT_ID_FIELD: &'static str = "reportID";
    pub const COMMENTS_FIELD: &'static str = "doctorComments";

    pub fn new(
        report_id: impl Into<String>,
        file: FileRef,
        user_id: impl Into<String>,
        identity_id: impl Into<String>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            file_url: file.path,
            file_size: file.size,
            file_type: file.mime_type,
            user_id: user_id.into(),
            identity_id: identity_id.into(),
            doctor_comments: Vec::new(),
        }
    }

    pub fn file(&self) -> FileRef {
        FileRef {
            path: self.file_url.clone(),
            size: self.file_size,
            mime_type: self.file_type.clone(),
        }
    }

    /// Stored top-level fields describing `file`, for partial updates.
    pub fn file_fields(file: &FileRef) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("fileUrl".into(), json!(file.path));
        fields.insert("fileSize".into(), json!(file.size));
        fields.insert("fileType".into(), json!(file.mime_type));
        fields
    }

    /// Comments are append-only.
    pub fn add_comment(&mut self, doctor_name: impl Into<String>, comment: impl Into<String>) {
        self.doctor_comments
            .push(DoctorComment::new(doctor_name, comment));
    }
}

impl DoctorComment {
    pub fn new(doctor_name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            doctor_name: doctor_name.into(),
            comment: comment.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileRef {
        FileRef {
            path: path.into(),
            size: 10,
            mime_type: "application/pdf".into(),
        }
    }

    #[test]
    fn comments_keep_insertion_order() {
        let mut report = LabReport::new("R-1", file("uploads/a.pdf"), "u1", "p1");
        report.add_comment("Dr A", "first");
        report.add_comment("Dr B", "second");
        assert_eq!(report.doctor_comments.len(), 2);
        assert_eq!(report.doctor_comments[0].comment, "first");
        assert_eq!(report.doctor_comments[1].doctor_name, "Dr B");
    }

    #[test]
    fn file_fields_match_the_stored_shape() {
        let report = LabReport::new("R-1", file("uploads/a.pdf"), "u1", "p1");
        let stored = serde_json::to_value(&report).unwrap();
        let fields = LabReport::file_fields(&file("uploads/b.pdf"));
        assert_eq!(fields.len(), 3);
        for key in fields.keys() {
            assert!(stored.get(key).is_some(), "{key} is not a stored field");
        }
        assert_eq!(fields["fileUrl"], "uploads/b.pdf");
        assert!(stored.get(LabReport::COMMENTS_FIELD).is_some());
        assert!(stored.get(LabReport::REPORT_ID_FIELD).is_some());
    }

    #[test]
    fn wire_shape() {
        let report = LabReport::new("R-1", file("uploads/a.pdf"), "u1", "p1");
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["reportID"], "R-1");
        assert_eq!(v["fileUrl"], "uploads/a.pdf");
        assert_eq!(v["fileType"], "application/pdf");
        assert_eq!(v["userId"], "u1");
        assert_eq!(v["doctorComments"], serde_json::json!([]));
    }
}
