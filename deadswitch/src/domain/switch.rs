//! The `Switch` entity and its status state machine.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle status of a switch. `Active` is the only status from which the
/// worker can move a switch on its own; every other transition is an
/// explicit user action (reset/disable) or a terminal worker outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Triggered,
    Disabled,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Triggered => "triggered",
            Status::Disabled => "disabled",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Status::Active),
            "triggered" => Some(Status::Triggered),
            "disabled" => Some(Status::Disabled),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }

    /// Whether `self` is a terminal status that a reset re-activates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Triggered | Status::Disabled | Status::Failed)
    }

    /// Validates a status transition per the state-transition rules in
    /// the switch service (§4.E): reset and disable may be applied from
    /// any status, the worker may only move a switch out of `Active`.
    pub fn can_transition_to(&self, target: Status) -> bool {
        match (self, target) {
            (_, Status::Active) => true,
            (_, Status::Disabled) => true,
            (Status::Active, Status::Triggered) => true,
            (Status::Active, Status::Failed) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }
}

/// A Web Push subscription, stored verbatim (never redacted on disk, only
/// on API responses).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: Option<String>,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

impl PushSubscription {
    /// A subscription is usable only if it carries a non-empty endpoint.
    pub fn is_usable(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// The central entity: a deadline that, unless checked in before it
/// elapses, causes notifications to fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Switch {
    pub id: i64,
    pub user_id: String,
    pub message: String,
    pub notifiers: Vec<String>,
    pub check_in_interval: String,
    pub trigger_at: i64,
    pub status: Status,
    pub delete_after_triggered: bool,
    pub encrypted: bool,
    pub push_subscription: Option<PushSubscription>,
    pub reminder_threshold: Option<String>,
    pub reminder_enabled: bool,
    pub reminder_sent: bool,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Switch {
    /// Derives `reminder_enabled` per invariant 4: a push subscription must
    /// be present *and* the reminder threshold must parse to a positive
    /// duration. "Present" means non-null, not necessarily usable — a
    /// subscription with a null `endpoint` still counts here; whether it's
    /// usable enough to actually deliver a push is a dispatch-time concern
    /// (see `PushSubscription::is_usable`), not an eligibility one.
    pub fn derive_reminder_enabled(
        push_subscription: &Option<PushSubscription>,
        reminder_threshold: &Option<String>,
    ) -> bool {
        let has_push = push_subscription.is_some();
        let has_threshold = reminder_threshold
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| crate::domain::duration::parse_duration(s).ok())
            .is_some_and(|d| d.as_nanos() > 0);
        has_push && has_threshold
    }

    /// Drops `push_subscription` before a response leaves the service, per
    /// the redaction rule in §4.E.
    pub fn redacted(mut self) -> Self {
        self.push_subscription = None;
        self
    }

    pub fn validate_transition(&self, target: Status) -> Result<(), Error> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "cannot transition switch {} from {} to {}",
                self.id,
                self.status.as_str(),
                target.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_enabled_requires_both_push_and_positive_threshold() {
        let push = Some(PushSubscription {
            endpoint: Some("https://push.example/abc".into()),
            p256dh: Some("k".into()),
            auth: Some("a".into()),
        });
        assert!(Switch::derive_reminder_enabled(&push, &Some("5m".into())));
        assert!(!Switch::derive_reminder_enabled(&push, &None));
        assert!(!Switch::derive_reminder_enabled(&None, &Some("5m".into())));
        assert!(!Switch::derive_reminder_enabled(&push, &Some("0s".into())));
    }

    #[test]
    fn reminder_enabled_is_a_null_check_not_a_usability_check() {
        let push_without_endpoint = Some(PushSubscription {
            endpoint: None,
            p256dh: Some("k".into()),
            auth: Some("a".into()),
        });
        assert!(!push_without_endpoint.as_ref().unwrap().is_usable());
        assert!(Switch::derive_reminder_enabled(&push_without_endpoint, &Some("5m".into())));
    }

    #[test]
    fn worker_cannot_move_switch_out_of_active_more_than_once_terms() {
        assert!(Status::Active.can_transition_to(Status::Triggered));
        assert!(Status::Active.can_transition_to(Status::Failed));
        assert!(!Status::Triggered.can_transition_to(Status::Failed));
        assert!(!Status::Failed.can_transition_to(Status::Triggered));
    }

    #[test]
    fn disable_and_reset_are_always_legal() {
        for s in [Status::Active, Status::Triggered, Status::Disabled, Status::Failed] {
            assert!(s.can_transition_to(Status::Disabled));
            assert!(s.can_transition_to(Status::Active));
        }
    }
}
