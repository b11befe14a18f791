use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::{Doctor, IDENTITY_FIELD};
use medportal_storage::{Collection, DynStore, Filter, Stored};
use serde_json::Value;

use super::{gate, non_empty};
use crate::form::RequestForm;
use crate::validation::Issues;

#[derive(Clone)]
pub struct DoctorService {
    doctors: Collection<Doctor>,
}

impl DoctorService {
    pub fn new(store: DynStore) -> Self {
        Self {
            doctors: Collection::new(store),
        }
    }

    pub async fn init(&self) -> Result<(), ApiError> {
        self.doctors.ensure_unique(IDENTITY_FIELD).await?;
        Ok(())
    }

    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<Stored<Doctor>>, ApiError> {
        Ok(self.doctors.find_one_owned_by(identity).await?)
    }

    /// Creates the caller's doctor profile. Name and email come from the token.
    pub async fn create(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<Doctor>, ApiError> {
        gate(ResourceKind::Doctor, Action::Create, caller)?;

        let mut issues = Issues::new();
        let day = string_list(form.value("day"));
        let slot = string_list(form.value("slot"));
        if day.is_none() || slot.is_none() {
            issues.push("day", "Day and slot should be arrays");
        }
        let experience = form.text("experience").filter(|s| !s.trim().is_empty());
        if experience.is_none() {
            issues.push("experience", "Experience is required and should be a string");
        }
        let bio = form.text("bio").filter(|s| !s.trim().is_empty());
        if bio.is_none() {
            issues.push("bio", "Bio is required and should be a string");
        }
        issues.finish()?;

        let doctor = Doctor {
            identity_id: caller.id.clone(),
            name: caller.display_name(),
            email: caller.email.clone(),
            bio: bio.unwrap_or_default().to_string(),
            experience: experience.unwrap_or_default().to_string(),
            day: day.unwrap_or_default(),
            slot: slot.unwrap_or_default(),
        };

        if self.find_by_identity(&caller.id).await?.is_some() {
            return Err(ApiError::conflict("Doctor profile already exists"));
        }
        match self.doctors.insert(doctor).await {
            Ok(stored) => {
                tracing::info!(identity = %caller.id, doctor_id = %stored.id, "doctor profile created");
                Ok(stored)
            }
            Err(e) if e.is_already_exists() => Err(ApiError::conflict("Doctor profile already exists")),
            Err(e) => Err(e.into()),
        }
    }

    /// Every doctor; an empty directory is an empty list.
    pub async fn list_all(&self) -> Result<Vec<Stored<Doctor>>, ApiError> {
        Ok(self.doctors.find(&Filter::all()).await?)
    }

    /// Doctors whose name contains `name`, ignoring case.
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<Stored<Doctor>>, ApiError> {
        let found = self
            .doctors
            .find(&Filter::all().text_contains(Doctor::NAME_FIELD, name))
            .await?;
        non_empty(found, "No doctors found with that name")
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medportal_core::Role;
    use serde_json::json;

    fn doctor_identity(id: &str, first: &str, last: &str) -> Identity {
        Identity {
            first_name: first.into(),
            last_name: last.into(),
            ..Identity::new(id, Some(Role::Doctor))
        }
    }

    fn body() -> RequestForm {
        RequestForm::from_json(json!({
            "bio": "Cardiologist",
            "experience": "10 years",
            "day": ["Mon", "Wed"],
            "slot": ["09:00", "10:00"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_duplicate_conflicts() {
        let svc = DoctorService::new(medportal_db_memory::create_store());
        svc.init().await.unwrap();
        let caller = doctor_identity("doc_1", "Greg", "House");
        let created = svc.create(&caller, &body()).await.unwrap();
        assert_eq!(created.data.name, "Greg House");
        assert_eq!(created.data.day, vec!["Mon", "Wed"]);

        let err = svc.create(&caller, &body()).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn reports_all_shape_violations() {
        let svc = DoctorService::new(medportal_db_memory::create_store());
        let caller = doctor_identity("doc_1", "Greg", "House");
        let form = RequestForm::from_json(json!({"day": "Mon", "slot": [], "bio": 5})).unwrap();
        let body = svc.create(&caller, &form).await.unwrap_err().to_body();
        let msgs: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["msg"].as_str().unwrap())
            .collect();
        assert_eq!(
            msgs,
            vec![
                "Day and slot should be arrays",
                "Experience is required and should be a string",
                "Bio is required and should be a string"
            ]
        );
    }

    #[tokio::test]
    async fn name_lookup_is_literal_and_case_insensitive() {
        let svc = DoctorService::new(medportal_db_memory::create_store());
        svc.create(&doctor_identity("d1", "Greg", "House"), &body()).await.unwrap();
        svc.create(&doctor_identity("d2", "Lisa", "Cuddy"), &body()).await.unwrap();

        assert_eq!(svc.find_by_name("hOuSe").await.unwrap().len(), 1);
        assert!(matches!(svc.find_by_name(".*").await, Err(ApiError::NotFound(_))));
        assert_eq!(svc.list_all().await.unwrap().len(), 2);
    }
}
