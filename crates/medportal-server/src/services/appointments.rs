use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::time::{format_storage, parse_iso8601, utc_day_bounds};
use medportal_core::{Appointment, AppointmentStatus, Doctor};
use medportal_storage::{Collection, DynStore, Filter, Stored};
use time::OffsetDateTime;

use super::{checked_id, ensure_access, gate, non_empty};
use crate::form::RequestForm;
use crate::validation::Issues;

const NOT_FOUND: &str = "Appointment not found";
const NONE_FOUND: &str = "No appointments found";

#[derive(Clone)]
pub struct AppointmentService {
    appointments: Collection<Appointment>,
    doctors: Collection<Doctor>,
}

impl AppointmentService {
    pub fn new(store: DynStore) -> Self {
        Self {
            appointments: Collection::new(store.clone()),
            doctors: Collection::new(store),
        }
    }

    pub async fn create(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<Appointment>, ApiError> {
        gate(ResourceKind::Appointment, Action::Create, caller)?;

        let mut issues = Issues::new();
        let date = form.text("date").and_then(|d| parse_iso8601(d).ok());
        if date.is_none() {
            issues.push("date", "Invalid or missing date");
        }
        let time = issues.required_text(form, "time", "Time is required");
        let doctor_id = issues.required_text(form, "doctorId", "Doctor ID is required");
        issues.finish()?;

        let (Some(date), Some(time), Some(doctor_id)) = (date, time, doctor_id) else {
            return Err(ApiError::internal("validated appointment fields missing"));
        };
        let appointment = Appointment::new(&caller.id, format_storage(date), time, doctor_id);
        let stored = self.appointments.insert(appointment).await?;
        tracing::info!(appointment_id = %stored.id, doctor_id = %stored.data.doctor_id, "appointment created");
        Ok(stored)
    }

    /// Today's pending appointments addressed to the calling doctor.
    pub async fn list_for_doctor(&self, caller: &Identity) -> Result<Vec<Stored<Appointment>>, ApiError> {
        self.list_for_doctor_on(caller, OffsetDateTime::now_utc()).await
    }

    async fn list_for_doctor_on(
        &self,
        caller: &Identity,
        day: OffsetDateTime,
    ) -> Result<Vec<Stored<Appointment>>, ApiError> {
        gate(ResourceKind::Appointment, Action::ListAssigned, caller)?;

        // Appointments may reference the doctor by identity or by profile id.
        let mut doctor_ids = vec![caller.id.clone()];
        if let Some(profile) = self.doctors.find_one_owned_by(&caller.id).await? {
            doctor_ids.push(profile.id);
        }
        let (start, end) = utc_day_bounds(day);
        let filter = Filter::all()
            .any_of(Appointment::DOCTOR_FIELD, doctor_ids)
            .eq(Appointment::STATUS_FIELD, AppointmentStatus::Pending.as_str())
            .range(
                Appointment::DATE_FIELD,
                Some(format_storage(start)),
                Some(format_storage(end)),
            );
        let found = self.appointments.find(&filter).await?;
        non_empty(found, "No pending appointments for today.")
    }

    pub async fn list_own(&self, caller: &Identity) -> Result<Vec<Stored<Appointment>>, ApiError> {
        gate(ResourceKind::Appointment, Action::ListOwn, caller)?;
        non_empty(self.appointments.find_owned_by(&caller.id).await?, NONE_FOUND)
    }

    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<Stored<Appointment>>, ApiError> {
        gate(ResourceKind::Appointment, Action::ListAll, caller)?;
        non_empty(self.appointments.find(&Filter::all()).await?, NONE_FOUND)
    }

    async fn load_owned(&self, caller: &Identity, id: &str, action: Action) -> Result<Stored<Appointment>, ApiError> {
        gate(ResourceKind::Appointment, action, caller)?;
        let id = checked_id(id, NOT_FOUND)?;
        let appointment = self
            .appointments
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        ensure_access(ResourceKind::Appointment, action, caller, &appointment.data.identity_id)?;
        Ok(appointment)
    }

    /// Marks the appointment completed. Completed is terminal.
    pub async fn complete(&self, caller: &Identity, id: &str) -> Result<Stored<Appointment>, ApiError> {
        let mut appointment = self.load_owned(caller, id, Action::Update).await?;
        appointment.data.complete();
        Ok(self.appointments.save(&appointment).await?)
    }

    pub async fn delete(&self, caller: &Identity, id: &str) -> Result<(), ApiError> {
        let appointment = self.load_owned(caller, id, Action::Delete).await?;
        if !self.appointments.delete(&appointment.id).await? {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        Ok(())
    }
}
