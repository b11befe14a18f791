//! Persisted domain entities.
//!
//! Each entity serializes with camelCase field names. Store-managed fields
//! (`_id`, `createdAt`, `updatedAt`) are not part of the entity; the storage
//! layer wraps entities in a `Stored<T>` envelope that adds them.

mod appointment;
mod blog;
mod doctor;
mod lab_report;
mod record;
mod user;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use appointment::{Appointment, AppointmentStatus};
pub use blog::Blog;
pub use doctor::Doctor;
pub use lab_report::{DoctorComment, FileRef, LabReport};
pub use record::MedicalRecord;
pub use user::{User, UserProfile, UserSummary};

/// A type persisted in its own document collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (table) name.
    const COLLECTION: &'static str;

    /// Field holding the owning external identity, if the entity has one.
    const OWNER_FIELD: Option<&'static str> = None;
}

/// Wire name of the external identity id on every owned entity.
pub const IDENTITY_FIELD: &str = "clerkUserId";
