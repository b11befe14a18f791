use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::{IDENTITY_FIELD, User, UserProfile};
use medportal_storage::{Collection, DynStore, Filter, Stored};
use serde_json::{Map, Value};

use super::{gate, non_empty};
use crate::form::RequestForm;
use crate::validation::{Issues, is_valid_email, sanitize};

/// Fields accepted by `save-user`. Absent or empty values leave the stored
/// field untouched on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub additional_data: Option<String>,
}

impl SaveUserInput {
    pub fn parse(form: &RequestForm) -> Result<Self, ApiError> {
        let mut issues = Issues::new();
        let email = issues.optional_text(form, "email");
        if let Some(email) = &email
            && !is_valid_email(email)
        {
            issues.push("email", "Invalid email format");
        }
        let first_name = issues.optional_text(form, "firstName");
        let last_name = issues.optional_text(form, "lastName");
        let additional_data = issues.optional_text(form, "additionalData");
        issues.finish()?;

        Ok(Self {
            email,
            first_name: first_name.as_deref().map(sanitize),
            last_name: last_name.as_deref().map(sanitize),
            additional_data: additional_data.as_deref().map(sanitize),
        })
    }

    /// Stored fields to set, keyed by their stored names. Empty values are
    /// left out.
    fn fields(&self) -> Map<String, Value> {
        [
            ("email", &self.email),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("additionalData", &self.additional_data),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            let value = value.as_ref().filter(|v| !v.is_empty())?;
            Some((key.to_string(), Value::String(value.clone())))
        })
        .collect()
    }

    fn apply(&self, user: &mut User) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                target.clone_from(v);
            }
        }
        set(&mut user.email, &self.email);
        set(&mut user.first_name, &self.first_name);
        set(&mut user.last_name, &self.last_name);
        set(&mut user.additional_data, &self.additional_data);
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Collection<User>,
}

impl UserService {
    pub fn new(store: DynStore) -> Self {
        Self {
            users: Collection::new(store),
        }
    }

    pub fn collection(&self) -> &Collection<User> {
        &self.users
    }

    /// Declares the identity id unique.
    pub async fn init(&self) -> Result<(), ApiError> {
        self.users.ensure_unique(IDENTITY_FIELD).await?;
        Ok(())
    }

    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<Stored<User>>, ApiError> {
        Ok(self.users.find_one_owned_by(identity).await?)
    }

    /// Creates the caller's User or sets the provided fields on it. Fields
    /// the form does not carry, `labReports` among them, are never written.
    pub async fn save(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<User>, ApiError> {
        gate(ResourceKind::User, Action::Update, caller)?;
        let input = SaveUserInput::parse(form)?;

        if let Some(existing) = self.find_by_identity(&caller.id).await? {
            return self.update_existing(existing, &input).await;
        }

        let mut user = User::new(&caller.id);
        input.apply(&mut user);
        match self.users.insert(user).await {
            Ok(stored) => {
                tracing::info!(identity = %caller.id, user_id = %stored.id, "user created");
                Ok(stored)
            }
            Err(e) if e.is_already_exists() => {
                // A concurrent save created the user first.
                let existing = self
                    .find_by_identity(&caller.id)
                    .await?
                    .ok_or_else(|| ApiError::internal(e.to_string()))?;
                self.update_existing(existing, &input).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_existing(
        &self,
        existing: Stored<User>,
        input: &SaveUserInput,
    ) -> Result<Stored<User>, ApiError> {
        let fields = input.fields();
        if fields.is_empty() {
            return Ok(existing);
        }
        Ok(self.users.set_fields(&existing.id, fields).await?)
    }

    pub async fn profile(&self, caller: &Identity) -> Result<UserProfile, ApiError> {
        gate(ResourceKind::User, Action::Read, caller)?;
        self.find_by_identity(&caller.id)
            .await?
            .map(|u| u.data.profile())
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn list_all(&self, caller: &Identity) -> Result<Vec<Stored<User>>, ApiError> {
        gate(ResourceKind::User, Action::ListAll, caller)?;
        let users = self.users.find(&Filter::all()).await?;
        non_empty(users, "No users found.")
    }
}
