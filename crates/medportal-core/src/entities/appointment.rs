use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Document, IDENTITY_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Appointment instant in the fixed-width UTC storage layout.
    pub date: String,
    pub time: String,
    pub doctor_id: String,
    /// Patient who booked the appointment.
    #[serde(rename = "clerkUserId")]
    pub identity_id: String,
    pub status: AppointmentStatus,
}

impl Document for Appointment {
    const COLLECTION: &'static str = "appointments";
    const OWNER_FIELD: Option<&'static str> = Some(IDENTITY_FIELD);
}

impl Appointment {
    pub const DATE_FIELD: &'static str = "date";
    pub const DOCTOR_FIELD: &'static str = "doctorId";
    pub const STATUS_FIELD: &'static str = "status";

    pub fn new(
        identity_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        doctor_id: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            doctor_id: doctor_id.into(),
            identity_id: identity_id.into(),
            status: AppointmentStatus::Pending,
        }
    }

    /// Moves the appointment to `Completed`. There is no way back to `Pending`.
    pub fn complete(&mut self) {
        self.status = AppointmentStatus::Completed;
    }
}
