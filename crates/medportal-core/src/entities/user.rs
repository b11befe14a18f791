use serde::{Deserialize, Serialize};

use super::{Document, IDENTITY_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "clerkUserId")]
    pub identity_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub additional_data: String,
    /// Ids of lab reports belonging to this user.
    #[serde(default)]
    pub lab_reports: Vec<String>,
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    const OWNER_FIELD: Option<&'static str> = Some(IDENTITY_FIELD);
}

impl User {
    pub const LAB_REPORTS_FIELD: &'static str = "labReports";

    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            ..Default::default()
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            additional_data: self.additional_data.clone(),
        }
    }
}

/// Self-service view returned by `get-user-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub additional_data: String,
}

/// User fields embedded into joined documents (reports, records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(rename = "clerkUserId", skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
}

impl UserSummary {
    pub fn from_user(id: &str, user: &User, include_identity: bool) -> Self {
        Self {
            id: id.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            identity_id: include_identity.then(|| user.identity_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_wire_names() {
        let mut user = User::new("user_1");
        user.first_name = "Ada".into();
        user.lab_reports.push("r1".into());
        let v = serde_json::to_value(&user).unwrap();
        assert_eq!(v["clerkUserId"], "user_1");
        assert_eq!(v["firstName"], "Ada");
        assert_eq!(v["labReports"], json!(["r1"]));
    }

    #[test]
    fn missing_fields_default() {
        let user: User = serde_json::from_value(json!({"clerkUserId": "u"})).unwrap();
        assert_eq!(user.email, "");
        assert!(user.lab_reports.is_empty());
    }

    #[test]
    fn summary_omits_identity_unless_requested() {
        let user = User::new("u");
        let v = serde_json::to_value(UserSummary::from_user("id1", &user, false)).unwrap();
        assert!(v.get("clerkUserId").is_none());
        assert_eq!(v["_id"], "id1");
        let v = serde_json::to_value(UserSummary::from_user("id1", &user, true)).unwrap();
        assert_eq!(v["clerkUserId"], "u");
    }
}
