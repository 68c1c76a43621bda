//! Local command interpreter
//!
//! Classifies recognized text into a local command reply or a forward to the
//! remote responder. Pure: never errors, unmatched input always forwards.

use chrono::{DateTime, Local};

/// Result of interpreting recognized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Answered locally; the reply text is ready to speak
    Reply(String),
    /// Not a local command; forward to the remote responder
    Forward,
}

/// Interpret recognized text against the local command set.
///
/// Case-insensitive substring match, first match wins: "time", then "date",
/// then "owner". Time and date replies are formatted from `now`.
#[must_use]
pub fn interpret(text: &str, now: DateTime<Local>, owner: &str) -> Interpretation {
    let normalized = text.to_lowercase();

    if normalized.contains("time") {
        Interpretation::Reply(format!("The time is {}", now.format("%-I:%M %p")))
    } else if normalized.contains("date") {
        Interpretation::Reply(format!("Today's date is {}", now.format("%B %-e, %Y")))
    } else if normalized.contains("owner") {
        Interpretation::Reply(format!("My owner is {owner}"))
    } else {
        Interpretation::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 23, hour, min, 0).unwrap()
    }

    #[test]
    fn test_time_command_case_insensitive() {
        let result = interpret("What TIME is it", at(15, 4), "Ada");
        assert_eq!(result, Interpretation::Reply("The time is 3:04 PM".to_string()));
    }

    #[test]
    fn test_date_command() {
        let result = interpret("tell me the date please", at(9, 0), "Ada");
        assert_eq!(
            result,
            Interpretation::Reply("Today's date is August 23, 2026".to_string())
        );
    }

    #[test]
    fn test_owner_command() {
        let result = interpret("who is your OWNER?", at(9, 0), "Ada");
        assert_eq!(result, Interpretation::Reply("My owner is Ada".to_string()));
    }

    #[test]
    fn test_time_precedes_date_and_owner() {
        // All three keywords present; "time" is tested first
        let result = interpret("owner date time", at(12, 30), "Ada");
        assert_eq!(result, Interpretation::Reply("The time is 12:30 PM".to_string()));
    }

    #[test]
    fn test_forward_fallback() {
        assert_eq!(interpret("tell me a joke", at(9, 0), "Ada"), Interpretation::Forward);
        assert_eq!(interpret("", at(9, 0), "Ada"), Interpretation::Forward);
    }
}
