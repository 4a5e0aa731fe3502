//! Request Validator (4.D): parses a switch request body once and carries
//! the parsed duration values forward so handlers never reparse them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::PushSubscription;
use crate::domain::duration::parse_duration;
use crate::error::{Error, Result};
use crate::notify::NotifierRegistry;

/// The wire shape of a create/update request body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPayload {
    pub message: String,
    pub notifiers: Vec<String>,
    pub check_in_interval: String,
    #[serde(default)]
    pub delete_after_triggered: bool,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub push_subscription: Option<PushSubscription>,
    #[serde(default)]
    pub reminder_threshold: Option<String>,
}

/// A request body after structural and grammar validation, with durations
/// already parsed exactly once.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub payload: SwitchPayload,
    pub check_in_duration: Duration,
    pub reminder_threshold_duration: Option<Duration>,
}

/// Validates a create/update request body per §4.D:
/// 1. `check_in_interval` must parse with the duration grammar.
/// 2. `reminder_threshold`, if present and non-empty, must parse the same way.
/// 3. `message` must be non-empty, `notifiers` must have at least one
///    entry, and every notifier URL must be recognized by the registry.
pub fn validate(payload: SwitchPayload, notifiers: &NotifierRegistry) -> Result<ValidatedRequest> {
    if payload.message.trim().is_empty() {
        return Err(Error::validation("message must not be empty"));
    }
    if payload.notifiers.is_empty() {
        return Err(Error::validation("at least one notifier is required"));
    }
    for url in &payload.notifiers {
        if !notifiers.recognizes(url) {
            return Err(Error::validation(format!("unrecognized notifier URL: {url}")));
        }
    }

    let check_in_duration = parse_duration(&payload.check_in_interval)
        .map_err(|e| Error::validation(format!("invalid checkInInterval: {e}")))?;

    let reminder_threshold_duration = match payload.reminder_threshold.as_deref() {
        Some(s) if !s.is_empty() => {
            Some(parse_duration(s).map_err(|e| Error::validation(format!("invalid reminderThreshold: {e}")))?)
        }
        _ => None,
    };

    Ok(ValidatedRequest {
        payload,
        check_in_duration,
        reminder_threshold_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NotifierRegistry {
        NotifierRegistry::with_builtins()
    }

    fn payload() -> SwitchPayload {
        SwitchPayload {
            message: "ping".into(),
            notifiers: vec!["logger://".into()],
            check_in_interval: "24h".into(),
            delete_after_triggered: false,
            encrypted: false,
            push_subscription: None,
            reminder_threshold: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let req = validate(payload(), &registry()).unwrap();
        assert_eq!(req.check_in_duration, Duration::from_secs(86_400));
        assert!(req.reminder_threshold_duration.is_none());
    }

    #[test]
    fn rejects_empty_message() {
        let mut p = payload();
        p.message = "   ".into();
        assert!(validate(p, &registry()).is_err());
    }

    #[test]
    fn rejects_no_notifiers() {
        let mut p = payload();
        p.notifiers = vec![];
        assert!(validate(p, &registry()).is_err());
    }

    #[test]
    fn rejects_unrecognized_notifier_scheme() {
        let mut p = payload();
        p.notifiers = vec!["bogus://nope".into()];
        assert!(validate(p, &registry()).is_err());
    }

    #[test]
    fn rejects_malformed_duration() {
        let mut p = payload();
        p.check_in_interval = "soon".into();
        assert!(validate(p, &registry()).is_err());
    }

    #[test]
    fn parses_reminder_threshold_when_present() {
        let mut p = payload();
        p.reminder_threshold = Some("35m".into());
        let req = validate(p, &registry()).unwrap();
        assert_eq!(req.reminder_threshold_duration, Some(Duration::from_secs(2_100)));
    }
}
