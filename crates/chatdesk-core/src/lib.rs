#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use ulid::Ulid;

mod analytics;
mod participant;
mod rules;
mod scope;

pub use analytics::{trend, ReplyLatency};
pub use participant::{format_brazilian_phone, parse_participant_identifier, ExternalParticipant};
pub use rules::{check_profile_mutation, MutationDenied, ProfileChange};
pub use scope::ConversationScope;

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "chatdesk"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("profile id is invalid")]
    InvalidProfileId,
    #[error("role name is unknown")]
    UnknownRole,
    #[error("message source is invalid")]
    InvalidMessageSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(Ulid);

impl ProfileId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for ProfileId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = Ulid::from_string(&value).map_err(|_| DomainError::InvalidProfileId)?;
        Ok(Self(parsed))
    }
}

impl core::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical role spelling is `operator`; the system recognizes no
/// other variant anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    Admin,
    Support,
    Operator,
}

impl RoleName {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Support, Self::Operator];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Support => "support",
            Self::Operator => "operator",
        }
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Self::Admin),
            "support" => Ok(Self::Support),
            "operator" => Ok(Self::Operator),
            _ => Err(DomainError::UnknownRole),
        }
    }
}

/// Origin of a message: customer-sent or staff-sent. The pairing scan in
/// [`ReplyLatency`] measures EXTERNAL followed immediately by OPERATOR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageSource {
    External,
    Operator,
}

impl MessageSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::External => "EXTERNAL",
            Self::Operator => "OPERATOR",
        }
    }
}

impl TryFrom<String> for MessageSource {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "EXTERNAL" => Ok(Self::External),
            "OPERATOR" => Ok(Self::Operator),
            _ => Err(DomainError::InvalidMessageSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, MessageSource, ProfileId, RoleName};

    #[test]
    fn profile_id_round_trip_and_parse_validation() {
        let id = ProfileId::new();
        let parsed = ProfileId::try_from(id.to_string()).unwrap();
        assert_eq!(id, parsed);

        let invalid = ProfileId::try_from(String::from("not-a-ulid")).unwrap_err();
        assert_eq!(invalid, DomainError::InvalidProfileId);
    }

    #[test]
    fn role_names_are_stable_and_exhaustive() {
        for role in RoleName::ALL {
            let parsed = RoleName::try_from(role.as_str().to_owned()).unwrap();
            assert_eq!(parsed, role);
        }
        assert_eq!(
            RoleName::try_from(String::from("operador")).unwrap_err(),
            DomainError::UnknownRole
        );
    }

    #[test]
    fn message_source_parses_wire_spelling() {
        assert_eq!(
            MessageSource::try_from(String::from("EXTERNAL")).unwrap(),
            MessageSource::External
        );
        assert_eq!(
            MessageSource::try_from(String::from("OPERATOR")).unwrap(),
            MessageSource::Operator
        );
        assert_eq!(
            MessageSource::try_from(String::from("external")).unwrap_err(),
            DomainError::InvalidMessageSource
        );
    }
}
