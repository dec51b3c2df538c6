use std::collections::HashSet;

use crate::{ProfileId, RoleName};

/// Row-visibility predicate derived from a caller's role set.
///
/// Every conversation read and every analytics query goes through one of
/// these values; there is deliberately no way to ask "is this caller an
/// operator" anywhere else, so call sites must handle both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationScope {
    /// Admin and support see every conversation.
    Unrestricted,
    /// Operators see only conversations assigned to them.
    OwnedBy(ProfileId),
}

impl ConversationScope {
    #[must_use]
    pub fn for_roles(caller: ProfileId, roles: &HashSet<RoleName>) -> Self {
        if roles.contains(&RoleName::Operator) {
            Self::OwnedBy(caller)
        } else {
            Self::Unrestricted
        }
    }

    /// Whether a conversation with the given owner is visible under this
    /// scope. Unassigned conversations are invisible to operators.
    #[must_use]
    pub fn allows(self, operator_id: Option<ProfileId>) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::OwnedBy(caller) => operator_id == Some(caller),
        }
    }

    /// The owner filter to push down to a storage query, if any.
    #[must_use]
    pub const fn owner_filter(self) -> Option<ProfileId> {
        match self {
            Self::Unrestricted => None,
            Self::OwnedBy(caller) => Some(caller),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::ConversationScope;
    use crate::{ProfileId, RoleName};

    fn roles(names: &[RoleName]) -> HashSet<RoleName> {
        names.iter().copied().collect()
    }

    #[test]
    fn operator_role_narrows_to_owned_conversations() {
        let caller = ProfileId::new();
        let scope = ConversationScope::for_roles(caller, &roles(&[RoleName::Operator]));
        assert_eq!(scope, ConversationScope::OwnedBy(caller));
        assert!(scope.allows(Some(caller)));
        assert!(!scope.allows(Some(ProfileId::new())));
        assert!(!scope.allows(None));
        assert_eq!(scope.owner_filter(), Some(caller));
    }

    #[test]
    fn elevated_roles_are_unrestricted() {
        let caller = ProfileId::new();
        for role in [RoleName::Admin, RoleName::Support] {
            let scope = ConversationScope::for_roles(caller, &roles(&[role]));
            assert_eq!(scope, ConversationScope::Unrestricted);
            assert!(scope.allows(Some(ProfileId::new())));
            assert!(scope.allows(None));
            assert_eq!(scope.owner_filter(), None);
        }
    }
}
