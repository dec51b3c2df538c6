/// Parsed form of a conversation's `external_participant_identifier`,
/// which the inbound channel encodes as `"name;phone"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalParticipant {
    pub name: String,
    pub phone: String,
}

#[must_use]
pub fn parse_participant_identifier(raw: &str) -> ExternalParticipant {
    match raw.split_once(';') {
        Some((name, phone)) => ExternalParticipant {
            name: name.to_owned(),
            phone: phone.to_owned(),
        },
        None => ExternalParticipant {
            name: raw.to_owned(),
            phone: String::new(),
        },
    }
}

/// Formats a raw phone segment into the fixed Brazilian display pattern
/// `+55 (DD) DDDDD-DDDD` by character offsets. Input must be the full
/// 13-digit form including the country code (e.g. `5511999998888`);
/// anything else yields an empty string rather than an error.
#[must_use]
pub fn format_brazilian_phone(phone: &str) -> String {
    if phone.len() != 13 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return String::new();
    }
    format!("+55 ({}) {}-{}", &phone[2..4], &phone[4..9], &phone[9..])
}

#[cfg(test)]
mod tests {
    use super::{format_brazilian_phone, parse_participant_identifier};

    #[test]
    fn identifier_splits_into_name_and_phone() {
        let participant = parse_participant_identifier("John Doe;5511999998888");
        assert_eq!(participant.name, "John Doe");
        assert_eq!(participant.phone, "5511999998888");
    }

    #[test]
    fn identifier_without_separator_has_empty_phone() {
        let participant = parse_participant_identifier("John Doe");
        assert_eq!(participant.name, "John Doe");
        assert_eq!(participant.phone, "");
    }

    #[test]
    fn full_length_phone_formats_to_display_pattern() {
        assert_eq!(
            format_brazilian_phone("5511999998888"),
            "+55 (11) 99999-8888"
        );
    }

    #[test]
    fn short_or_malformed_phones_format_to_empty() {
        assert_eq!(format_brazilian_phone(""), "");
        assert_eq!(format_brazilian_phone("99998888"), "");
        assert_eq!(format_brazilian_phone("55119999988889"), "");
        assert_eq!(format_brazilian_phone("55119999x8888"), "");
    }
}
