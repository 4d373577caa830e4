use std::fmt;

/// Machine-readable error codes for operator-friendly reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MissingCreationEvent,
    ActorNotFound,
    SubjectTypeMismatch,
    UnknownFieldKey,
    PersistenceFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingCreationEvent => "E2001",
            Self::ActorNotFound => "E2002",
            Self::SubjectTypeMismatch => "E2003",
            Self::UnknownFieldKey => "E2004",
            Self::PersistenceFailed => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingCreationEvent => "Creation event missing from change log",
            Self::ActorNotFound => "Actor not found",
            Self::SubjectTypeMismatch => "Event subject type mismatch",
            Self::UnknownFieldKey => "Unknown payload field key",
            Self::PersistenceFailed => "Authorship write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `byl init` to create the store."),
            Self::ConfigParseError => Some("Fix syntax in bylines.toml and retry."),
            Self::MissingCreationEvent => {
                Some("First-version gaps are reported, not repaired; inspect the source log.")
            }
            Self::ActorNotFound => {
                Some("The identity record was deleted upstream; the group is skipped.")
            }
            Self::SubjectTypeMismatch => {
                Some("Caller passed an event to the wrong wrapper; this is a bug.")
            }
            Self::UnknownFieldKey => Some("Unknown keys are dropped; check the source schema."),
            Self::PersistenceFailed => Some("Check constraints on the authorships table."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::MissingCreationEvent,
            ErrorCode::ActorNotFound,
            ErrorCode::SubjectTypeMismatch,
            ErrorCode::UnknownFieldKey,
            ErrorCode::PersistenceFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::MissingCreationEvent.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
