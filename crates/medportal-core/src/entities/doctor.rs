use serde::{Deserialize, Serialize};

use super::{Document, IDENTITY_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(rename = "clerkUserId")]
    pub identity_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub bio: String,
    pub experience: String,
    /// Available days.
    #[serde(default)]
    pub day: Vec<String>,
    /// Available time slots.
    #[serde(default)]
    pub slot: Vec<String>,
}

impl Document for Doctor {
    const COLLECTION: &'static str = "doctors";
    const OWNER_FIELD: Option<&'static str> = Some(IDENTITY_FIELD);
}

impl Doctor {
    pub const NAME_FIELD: &'static str = "name";
}
