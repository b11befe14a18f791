//! Role and ownership rules per resource type.
//!
//! Evaluation has two phases. The role gate depends only on the caller and
//! runs before any input is read. The ownership check needs the owner of the
//! loaded resource, so it runs after the existence check; a missing resource
//! therefore reports not-found before forbidden.

use std::fmt;

use medportal_core::Role;
use serde::Serialize;

use crate::identity::Identity;

// =============================================================================
// Operations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    User,
    Doctor,
    Appointment,
    LabReport,
    Record,
    Blog,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Doctor => "doctor",
            Self::Appointment => "appointment",
            Self::LabReport => "lab_report",
            Self::Record => "record",
            Self::Blog => "blog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    /// Every document of the collection.
    ListAll,
    /// Documents owned by the caller.
    ListOwn,
    /// Documents assigned to the caller (a doctor's appointments).
    ListAssigned,
    /// Documents about a given patient.
    ListForPatient,
    Count,
    Update,
    Comment,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::ListAll => "list_all",
            Self::ListOwn => "list_own",
            Self::ListAssigned => "list_assigned",
            Self::ListForPatient => "list_for_patient",
            Self::Count => "count",
            Self::Update => "update",
            Self::Comment => "comment",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub resource: ResourceKind,
    pub action: Action,
}

impl Operation {
    pub const fn new(resource: ResourceKind, action: Action) -> Self {
        Self { resource, action }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource.as_str(), self.action.as_str())
    }
}

// =============================================================================
// Access Decision
// =============================================================================

/// Result of policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }

    /// Converts into a `Result`, keeping the deny reason as the error.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}

/// Reason for access denial.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    pub code: String,

    /// Human-readable message returned to the client.
    pub message: String,

    /// The operation that was denied, e.g. `lab_report.delete`.
    pub policy_id: String,
}

impl DenyReason {
    fn new(code: &str, message: impl Into<String>, operation: Operation) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            policy_id: operation.to_string(),
        }
    }

    /// No authenticated caller.
    #[must_use]
    pub fn unauthenticated(operation: Operation) -> Self {
        Self::new("unauthenticated", "Unauthenticated", operation)
    }

    /// Caller's role is not permitted.
    #[must_use]
    pub fn role_required(operation: Operation, message: impl Into<String>) -> Self {
        Self::new("role_required", message, operation)
    }

    /// Caller does not own the resource.
    #[must_use]
    pub fn not_owner(operation: Operation, message: impl Into<String>) -> Self {
        Self::new("not_owner", message, operation)
    }

    /// Ownership rule applies but no owner was supplied.
    #[must_use]
    pub fn owner_unknown(operation: Operation) -> Self {
        Self::new("owner_unknown", "Forbidden", operation)
    }

    /// The operation does not exist for this resource type.
    #[must_use]
    pub fn unsupported(operation: Operation) -> Self {
        Self::new("unsupported_operation", "Forbidden", operation)
    }

    /// `true` when the denial means the caller is not authenticated.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        self.code == "unauthenticated"
    }
}

// =============================================================================
// Rules
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum RoleGate {
    Public,
    Authenticated,
    AnyOf(&'static [Role], &'static str),
}

#[derive(Debug, Clone, Copy)]
enum Ownership {
    NotChecked,
    Owner(&'static str),
    OwnerOrAdmin(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    gate: RoleGate,
    ownership: Ownership,
}

const ADMINS_ONLY: RoleGate = RoleGate::AnyOf(&[Role::Admin], "Forbidden: Admins only");
const DOCTORS_ONLY: RoleGate = RoleGate::AnyOf(&[Role::Doctor], "Forbidden: Doctors only");
const PATIENTS_ONLY: RoleGate = RoleGate::AnyOf(&[Role::Patient], "Forbidden: Patients only");

const fn rule(gate: RoleGate, ownership: Ownership) -> Option<Rule> {
    Some(Rule { gate, ownership })
}

fn rule_for(op: Operation) -> Option<Rule> {
    use Action::*;
    use Ownership::*;
    use ResourceKind::*;
    use RoleGate::*;

    match (op.resource, op.action) {
        // Users manage their own profile; reads are scoped to the caller.
        (User, Create | Update | Read) => rule(Authenticated, NotChecked),
        (User, ListAll) => rule(ADMINS_ONLY, NotChecked),

        (Doctor, Create) => rule(Authenticated, NotChecked),
        (Doctor, Read | ListAll) => rule(Public, NotChecked),

        (Appointment, Create) => rule(Authenticated, NotChecked),
        (Appointment, ListOwn) => rule(PATIENTS_ONLY, NotChecked),
        (Appointment, ListAssigned) => rule(DOCTORS_ONLY, NotChecked),
        (Appointment, ListAll) => rule(ADMINS_ONLY, NotChecked),
        (Appointment, Update | Delete) => rule(
            Authenticated,
            Owner("Forbidden: You do not own this appointment"),
        ),

        (LabReport, Create | Comment) => rule(DOCTORS_ONLY, NotChecked),
        (LabReport, Read) => rule(Authenticated, OwnerOrAdmin("Forbidden")),
        (LabReport, ListAll) => rule(ADMINS_ONLY, NotChecked),
        (LabReport, ListOwn) => rule(PATIENTS_ONLY, NotChecked),
        // Any doctor may update any report; there is no authorship check.
        (LabReport, Update) => rule(
            AnyOf(
                &[Role::Doctor, Role::Admin],
                "Forbidden: Only doctor or admin can update",
            ),
            NotChecked,
        ),
        (LabReport, Delete) => rule(ADMINS_ONLY, OwnerOrAdmin("Forbidden")),

        (Record, Create) => rule(DOCTORS_ONLY, NotChecked),
        (Record, ListAll) => rule(ADMINS_ONLY, NotChecked),
        (Record, ListForPatient) => rule(
            AnyOf(
                &[Role::Doctor, Role::Admin],
                "Forbidden: Only doctors or admin can access",
            ),
            NotChecked,
        ),
        (Record, ListOwn) => rule(Authenticated, NotChecked),

        (Blog, Create | ListOwn | Count) => rule(Authenticated, NotChecked),
        (Blog, Read | ListAll) => rule(Public, NotChecked),
        (Blog, Update | Delete) => rule(
            Authenticated,
            Owner("Forbidden: You cannot modify this blog"),
        ),

        _ => None,
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluates only the role gate of `operation`.
///
/// An empty `caller_id` means the request is anonymous.
#[must_use]
pub fn check_role(operation: Operation, caller_id: &str, caller_role: Option<Role>) -> AccessDecision {
    let Some(rule) = rule_for(operation) else {
        return AccessDecision::Deny(DenyReason::unsupported(operation));
    };
    match rule.gate {
        RoleGate::Public => AccessDecision::Allow,
        _ if caller_id.is_empty() => AccessDecision::Deny(DenyReason::unauthenticated(operation)),
        RoleGate::Authenticated => AccessDecision::Allow,
        RoleGate::AnyOf(roles, message) => match caller_role {
            Some(role) if roles.contains(&role) => AccessDecision::Allow,
            _ => AccessDecision::Deny(DenyReason::role_required(operation, message)),
        },
    }
}

/// Decides whether the caller may perform `operation` on a resource owned by
/// `resource_owner_id`.
///
/// Pass `None` as the owner only for operations without an ownership rule;
/// for owner-gated operations a missing owner is denied.
#[must_use]
pub fn decide(
    operation: Operation,
    caller_id: &str,
    caller_role: Option<Role>,
    resource_owner_id: Option<&str>,
) -> AccessDecision {
    let gate = check_role(operation, caller_id, caller_role);
    if gate.is_denied() {
        return gate;
    }
    let Some(rule) = rule_for(operation) else {
        return AccessDecision::Deny(DenyReason::unsupported(operation));
    };

    let (message, admin_override) = match rule.ownership {
        Ownership::NotChecked => return AccessDecision::Allow,
        Ownership::Owner(message) => (message, false),
        Ownership::OwnerOrAdmin(message) => (message, true),
    };
    let Some(owner) = resource_owner_id else {
        return AccessDecision::Deny(DenyReason::owner_unknown(operation));
    };
    if owner == caller_id || (admin_override && caller_role == Some(Role::Admin)) {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny(DenyReason::not_owner(operation, message))
    }
}

/// [`decide`] for a verified caller.
#[must_use]
pub fn authorize(
    operation: Operation,
    caller: &Identity,
    resource_owner_id: Option<&str>,
) -> AccessDecision {
    decide(operation, &caller.id, caller.role, resource_owner_id)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const P: Option<Role> = Some(Role::Patient);
    const D: Option<Role> = Some(Role::Doctor);
    const A: Option<Role> = Some(Role::Admin);

    fn op(resource: ResourceKind, action: Action) -> Operation {
        Operation::new(resource, action)
    }

    #[test]
    fn owner_gated_resources_deny_strangers() {
        for resource in [ResourceKind::Appointment, ResourceKind::Blog] {
            for action in [Action::Update, Action::Delete] {
                let o = op(resource, action);
                assert!(decide(o, "owner", P, Some("owner")).is_allowed(), "{o}");
                let denied = decide(o, "other", P, Some("owner"));
                assert_eq!(denied.deny_reason().unwrap().code, "not_owner", "{o}");
                // No admin override on owner-only resources.
                assert!(decide(o, "admin", A, Some("owner")).is_denied(), "{o}");
            }
        }
    }

    #[test]
    fn lab_report_read_is_owner_or_admin() {
        let o = op(ResourceKind::LabReport, Action::Read);
        assert!(decide(o, "p1", P, Some("p1")).is_allowed());
        assert!(decide(o, "a1", A, Some("p1")).is_allowed());
        let denied = decide(o, "p2", P, Some("p1"));
        assert_eq!(denied.deny_reason().unwrap().message, "Forbidden");
        assert!(decide(o, "d1", D, Some("p1")).is_denied());
    }

    #[test]
    fn lab_report_delete_is_admin_gated() {
        let o = op(ResourceKind::LabReport, Action::Delete);
        assert!(decide(o, "a1", A, Some("p1")).is_allowed());
        // The owner is still turned away by the admin gate.
        let denied = decide(o, "p1", P, Some("p1"));
        assert_eq!(denied.deny_reason().unwrap().message, "Forbidden: Admins only");
    }

    #[test]
    fn lab_report_comment_and_update_skip_ownership() {
        let comment = op(ResourceKind::LabReport, Action::Comment);
        assert!(decide(comment, "d2", D, Some("p1")).is_allowed());
        assert!(decide(comment, "a1", A, Some("p1")).is_denied());

        let update = op(ResourceKind::LabReport, Action::Update);
        assert!(decide(update, "d2", D, Some("p1")).is_allowed());
        assert!(decide(update, "a1", A, None).is_allowed());
        let denied = decide(update, "p1", P, Some("p1"));
        assert_eq!(
            denied.deny_reason().unwrap().message,
            "Forbidden: Only doctor or admin can update"
        );
    }

    #[test]
    fn role_gated_creation() {
        let report = op(ResourceKind::LabReport, Action::Create);
        assert!(check_role(report, "d1", D).is_allowed());
        assert_eq!(
            check_role(report, "p1", P).deny_reason().unwrap().message,
            "Forbidden: Doctors only"
        );
        let record = op(ResourceKind::Record, Action::Create);
        assert!(check_role(record, "d1", D).is_allowed());
        assert!(check_role(record, "a1", A).is_denied());

        for resource in [ResourceKind::Blog, ResourceKind::Appointment, ResourceKind::Doctor] {
            let o = op(resource, Action::Create);
            assert!(check_role(o, "anyone", None).is_allowed(), "{o}");
        }
    }

    #[test]
    fn admin_only_listings() {
        for resource in [
            ResourceKind::User,
            ResourceKind::Appointment,
            ResourceKind::LabReport,
            ResourceKind::Record,
        ] {
            let o = op(resource, Action::ListAll);
            assert!(check_role(o, "a1", A).is_allowed(), "{o}");
            let denied = check_role(o, "d1", D);
            assert_eq!(denied.deny_reason().unwrap().message, "Forbidden: Admins only");
        }
    }

    #[test]
    fn self_scoped_lists() {
        let appts = op(ResourceKind::Appointment, Action::ListOwn);
        assert!(check_role(appts, "p1", P).is_allowed());
        assert!(check_role(appts, "d1", D).is_denied());
        let assigned = op(ResourceKind::Appointment, Action::ListAssigned);
        assert!(check_role(assigned, "d1", D).is_allowed());
        assert!(check_role(assigned, "p1", P).is_denied());
        let records = op(ResourceKind::Record, Action::ListOwn);
        assert!(check_role(records, "p1", None).is_allowed());
        let per_patient = op(ResourceKind::Record, Action::ListForPatient);
        assert!(check_role(per_patient, "d1", D).is_allowed());
        assert!(check_role(per_patient, "a1", A).is_allowed());
        assert!(check_role(per_patient, "p1", P).is_denied());
    }

    #[test]
    fn public_operations_need_no_caller() {
        for o in [
            op(ResourceKind::Doctor, Action::ListAll),
            op(ResourceKind::Doctor, Action::Read),
            op(ResourceKind::Blog, Action::ListAll),
            op(ResourceKind::Blog, Action::Read),
        ] {
            assert!(decide(o, "", None, None).is_allowed(), "{o}");
        }
    }

    #[test]
    fn anonymous_callers_are_unauthenticated() {
        let denied = check_role(op(ResourceKind::Blog, Action::Create), "", None);
        assert!(denied.deny_reason().unwrap().is_unauthenticated());
    }

    #[test]
    fn owner_gated_operation_without_owner_is_denied() {
        let denied = decide(op(ResourceKind::Blog, Action::Update), "u1", P, None);
        assert_eq!(denied.deny_reason().unwrap().code, "owner_unknown");
    }

    #[test]
    fn unsupported_operations_are_denied() {
        let o = op(ResourceKind::Doctor, Action::Delete);
        let denied = decide(o, "a1", A, Some("a1"));
        assert_eq!(denied.deny_reason().unwrap().code, "unsupported_operation");
        assert_eq!(denied.deny_reason().unwrap().policy_id, "doctor.delete");
    }

    #[test]
    fn authorize_uses_identity_fields() {
        let caller = Identity::new("p1", P);
        let o = op(ResourceKind::Appointment, Action::Delete);
        assert!(authorize(o, &caller, Some("p1")).is_allowed());
        assert!(authorize(o, &caller, Some("p2")).is_denied());
    }

    #[test]
    fn unknown_role_fails_role_gates() {
        let o = op(ResourceKind::User, Action::ListAll);
        assert!(check_role(o, "x", None).is_denied());
    }
}
