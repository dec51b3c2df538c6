use chatdesk_core::RoleName;

use super::{core::Identity, errors::ApiFailure};

pub(crate) const DASHBOARD_ROLES: &[RoleName] = &[RoleName::Admin, RoleName::Support];
pub(crate) const USER_ADMIN_ROLES: &[RoleName] = &[RoleName::Admin];
pub(crate) const USER_DELETE_ROLES: &[RoleName] = &[RoleName::Admin, RoleName::Support];

/// Route-level allow list. Callers with none of the listed roles are
/// rejected before any handler work happens.
pub(crate) fn require_any_role(
    identity: &Identity,
    allowed: &[RoleName],
) -> Result<(), ApiFailure> {
    if allowed.iter().any(|role| identity.roles.contains(role)) {
        Ok(())
    } else {
        tracing::warn!(
            event = "authz.denied",
            profile_id = %identity.profile_id,
        );
        Err(ApiFailure::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chatdesk_core::{ProfileId, RoleName};

    use super::{require_any_role, DASHBOARD_ROLES, USER_ADMIN_ROLES};
    use crate::server::core::Identity;

    fn identity_with(roles: &[RoleName]) -> Identity {
        Identity {
            profile_id: ProfileId::new(),
            email: String::from("who@example.com"),
            name: String::from("Who"),
            roles: roles.iter().copied().collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn dashboard_admits_admin_and_support_only() {
        assert!(require_any_role(&identity_with(&[RoleName::Admin]), DASHBOARD_ROLES).is_ok());
        assert!(require_any_role(&identity_with(&[RoleName::Support]), DASHBOARD_ROLES).is_ok());
        assert!(require_any_role(&identity_with(&[RoleName::Operator]), DASHBOARD_ROLES).is_err());
        assert!(require_any_role(&identity_with(&[]), DASHBOARD_ROLES).is_err());
    }

    #[test]
    fn user_admin_routes_require_admin() {
        assert!(require_any_role(&identity_with(&[RoleName::Admin]), USER_ADMIN_ROLES).is_ok());
        assert!(require_any_role(&identity_with(&[RoleName::Support]), USER_ADMIN_ROLES).is_err());
    }
}
