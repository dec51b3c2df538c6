use std::collections::HashSet;

use crate::{ProfileId, RoleName};

/// The shape of a proposed profile mutation, as far as the rule engine
/// cares: whether any field is touched is implied by the call itself, the
/// only discriminating fact is whether the caller asks for a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileChange {
    /// Field-only update (name, email, password) or a delete.
    Fields,
    /// Update that includes a role reassignment.
    FieldsAndRole,
}

/// Why a profile mutation was rejected. All variants surface to callers as
/// a plain Forbidden; the distinction exists for tests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationDenied {
    /// Rule 1: operators may only touch their own profile.
    OperatorForeignTarget,
    /// Rule 2: operators may never change a role, including their own.
    OperatorRoleChange,
    /// Rule 3: support may not update or delete admin profiles.
    SupportTargetsAdmin,
}

/// Evaluates the role-hierarchy rules for a profile update or delete.
/// Rules run in order and the first failure wins; admins pass all three.
///
/// # Errors
/// Returns the first violated rule.
pub fn check_profile_mutation(
    caller_id: ProfileId,
    caller_roles: &HashSet<RoleName>,
    target_id: ProfileId,
    target_roles: &HashSet<RoleName>,
    change: ProfileChange,
) -> Result<(), MutationDenied> {
    if caller_roles.contains(&RoleName::Operator) {
        if caller_id != target_id {
            return Err(MutationDenied::OperatorForeignTarget);
        }
        if change == ProfileChange::FieldsAndRole {
            return Err(MutationDenied::OperatorRoleChange);
        }
    }

    if caller_roles.contains(&RoleName::Support) && target_roles.contains(&RoleName::Admin) {
        return Err(MutationDenied::SupportTargetsAdmin);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{check_profile_mutation, MutationDenied, ProfileChange};
    use crate::{ProfileId, RoleName};

    fn roles(names: &[RoleName]) -> HashSet<RoleName> {
        names.iter().copied().collect()
    }

    #[test]
    fn operator_cannot_touch_other_profiles() {
        let caller = ProfileId::new();
        let target = ProfileId::new();
        let denied = check_profile_mutation(
            caller,
            &roles(&[RoleName::Operator]),
            target,
            &roles(&[RoleName::Operator]),
            ProfileChange::Fields,
        )
        .unwrap_err();
        assert_eq!(denied, MutationDenied::OperatorForeignTarget);
    }

    #[test]
    fn operator_cannot_change_own_role() {
        let caller = ProfileId::new();
        let denied = check_profile_mutation(
            caller,
            &roles(&[RoleName::Operator]),
            caller,
            &roles(&[RoleName::Operator]),
            ProfileChange::FieldsAndRole,
        )
        .unwrap_err();
        assert_eq!(denied, MutationDenied::OperatorRoleChange);
    }

    #[test]
    fn operator_may_edit_own_fields() {
        let caller = ProfileId::new();
        check_profile_mutation(
            caller,
            &roles(&[RoleName::Operator]),
            caller,
            &roles(&[RoleName::Operator]),
            ProfileChange::Fields,
        )
        .unwrap();
    }

    #[test]
    fn support_cannot_mutate_admin_profiles() {
        let caller = ProfileId::new();
        let target = ProfileId::new();
        for change in [ProfileChange::Fields, ProfileChange::FieldsAndRole] {
            let denied = check_profile_mutation(
                caller,
                &roles(&[RoleName::Support]),
                target,
                &roles(&[RoleName::Admin]),
                change,
            )
            .unwrap_err();
            assert_eq!(denied, MutationDenied::SupportTargetsAdmin);
        }
    }

    #[test]
    fn support_may_mutate_non_admin_profiles() {
        check_profile_mutation(
            ProfileId::new(),
            &roles(&[RoleName::Support]),
            ProfileId::new(),
            &roles(&[RoleName::Operator]),
            ProfileChange::FieldsAndRole,
        )
        .unwrap();
    }

    #[test]
    fn admin_is_unrestricted() {
        let caller = ProfileId::new();
        for target_role in RoleName::ALL {
            check_profile_mutation(
                caller,
                &roles(&[RoleName::Admin]),
                ProfileId::new(),
                &roles(&[target_role]),
                ProfileChange::FieldsAndRole,
            )
            .unwrap();
        }
    }
}
