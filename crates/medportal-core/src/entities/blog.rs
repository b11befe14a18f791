use serde::{Deserialize, Serialize};

use super::{Document, IDENTITY_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub title: String,
    pub content: String,
    #[serde(rename = "clerkUserId")]
    pub identity_id: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

impl Document for Blog {
    const COLLECTION: &'static str = "blogs";
    const OWNER_FIELD: Option<&'static str> = Some(IDENTITY_FIELD);
}
