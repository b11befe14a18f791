pub mod entities;
pub mod error;
pub mod id;
pub mod role;
pub mod time;

pub use entities::{
    Appointment, AppointmentStatus, Blog, Doctor, DoctorComment, Document, FileRef, LabReport,
    IDENTITY_FIELD, MedicalRecord, User, UserProfile, UserSummary,
};
pub use error::{CoreError, Result};
pub use id::{IdError, generate_id, validate_id};
pub use role::Role;
pub use time::{Timestamp, now_utc};
