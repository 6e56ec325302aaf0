//! Static action table for the command channel.

use std::str::FromStr;

/// Reply sent for an action missing from the table.
pub const ACTION_NOT_ALLOWED: &str = "ACTION_NOT_ALLOWED";

/// Actions the relay knows how to acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenCase,
    OpenPatient,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::OpenCase => "OPEN_CASE",
            Action::OpenPatient => "OPEN_PATIENT",
        }
    }

    /// Name of the event the action translates to.
    #[must_use]
    pub fn reply(self) -> &'static str {
        match self {
            Action::OpenCase => "CASE_OPENED",
            Action::OpenPatient => "PATIENT_OPENED",
        }
    }
}

impl FromStr for Action {
    type Err = &'static str;

    /// Surrounding whitespace is trimmed and case ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN_CASE" => Ok(Action::OpenCase),
            "OPEN_PATIENT" => Ok(Action::OpenPatient),
            _ => Err(ACTION_NOT_ALLOWED),
        }
    }
}

/// Translate a raw action name into the text sent back to the client.
#[must_use]
pub fn reply_for(raw: &str) -> &'static str {
    raw.parse::<Action>()
        .map(Action::reply)
        .unwrap_or(ACTION_NOT_ALLOWED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_actions() {
        assert_eq!(reply_for("OPEN_CASE"), "CASE_OPENED");
        assert_eq!(reply_for("open_patient\n"), "PATIENT_OPENED");
        assert_eq!("  Open_Case ".parse::<Action>(), Ok(Action::OpenCase));
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(reply_for("DELETE_CASE"), ACTION_NOT_ALLOWED);
        assert_eq!(reply_for(""), ACTION_NOT_ALLOWED);
    }

    #[test]
    fn test_wire_name_round_trips() {
        for action in [Action::OpenCase, Action::OpenPatient] {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
    }
}
