//! Switch Service (4.E): the state-transition rules for create / update /
//! reset / disable, and response redaction.

use std::sync::Arc;

use crate::domain::duration::parse_duration;
use crate::domain::{Status, Switch};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::validation::ValidatedRequest;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct SwitchService {
    store: Arc<Store>,
}

impl SwitchService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Builds a fresh, active switch from a validated request and persists
    /// it, returning the redacted response.
    pub async fn create(&self, principal: &str, req: ValidatedRequest) -> Result<Switch> {
        let p = req.payload;
        let reminder_enabled =
            Switch::derive_reminder_enabled(&p.push_subscription, &p.reminder_threshold);

        let sw = Switch {
            id: 0,
            user_id: principal.to_string(),
            message: p.message,
            notifiers: p.notifiers,
            check_in_interval: p.check_in_interval,
            trigger_at: now() + req.check_in_duration.as_secs() as i64,
            status: Status::Active,
            delete_after_triggered: p.delete_after_triggered,
            encrypted: p.encrypted,
            push_subscription: p.push_subscription,
            reminder_threshold: p.reminder_threshold,
            reminder_enabled,
            reminder_sent: false,
            failure_reason: None,
            created_at: 0,
            updated_at: 0,
        };

        let created = self.store.create(sw).await?;
        Ok(created.redacted())
    }

    /// Loads the previous row (404 if absent/not owned), applies the
    /// payload, recomputes `trigger_at` only when `check_in_interval`
    /// actually changed, and recomputes `reminder_enabled`.
    pub async fn update(&self, principal: &str, id: i64, req: ValidatedRequest) -> Result<Switch> {
        let previous = self.store.get_by_id(principal, id).await?;
        let p = req.payload;

        let trigger_at = if p.check_in_interval != previous.check_in_interval {
            now() + req.check_in_duration.as_secs() as i64
        } else {
            previous.trigger_at
        };

        let reminder_enabled =
            Switch::derive_reminder_enabled(&p.push_subscription, &p.reminder_threshold);

        let updated = Switch {
            id,
            user_id: principal.to_string(),
            message: p.message,
            notifiers: p.notifiers,
            check_in_interval: p.check_in_interval,
            trigger_at,
            status: previous.status,
            delete_after_triggered: p.delete_after_triggered,
            encrypted: p.encrypted,
            push_subscription: p.push_subscription,
            reminder_threshold: p.reminder_threshold,
            reminder_enabled,
            reminder_sent: previous.reminder_sent,
            failure_reason: previous.failure_reason,
            created_at: previous.created_at,
            updated_at: 0,
        };

        let saved = self.store.update(id, updated).await?;
        Ok(saved.redacted())
    }

    /// Re-activates a switch regardless of its current status, using its
    /// own `check_in_interval` to compute a fresh `trigger_at`. Loads the
    /// row decrypted: `update` re-encrypts unconditionally, so starting
    /// from plaintext here is the only way to avoid encrypting an
    /// already-ciphertext field a second time.
    pub async fn reset(&self, principal: &str, id: i64) -> Result<Switch> {
        let mut sw = self.store.get_by_id_decrypted(principal, id).await?;
        let duration = parse_duration(&sw.check_in_interval)
            .map_err(|e| Error::validation(format!("stored checkInInterval is invalid: {e}")))?;

        sw.status = Status::Active;
        sw.trigger_at = now() + duration.as_secs() as i64;
        sw.reminder_sent = false;
        sw.failure_reason = None;

        let saved = self.store.update(id, sw).await?;
        Ok(saved.redacted())
    }

    /// Disables a switch without touching `trigger_at`. Loads the row
    /// decrypted for the same reason `reset` does — see its doc comment.
    pub async fn disable(&self, principal: &str, id: i64) -> Result<Switch> {
        let mut sw = self.store.get_by_id_decrypted(principal, id).await?;
        sw.status = Status::Disabled;
        let saved = self.store.update(id, sw).await?;
        Ok(saved.redacted())
    }

    pub async fn get(&self, principal: &str, id: i64) -> Result<Switch> {
        Ok(self.store.get_by_id(principal, id).await?.redacted())
    }

    pub async fn list(&self, principal: &str, limit: i64) -> Result<Vec<Switch>> {
        let all = self.store.get_all(principal, limit).await?;
        Ok(all.into_iter().map(Switch::redacted).collect())
    }

    pub async fn delete(&self, principal: &str, id: i64) -> Result<()> {
        self.store.delete(principal, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Codec;
    use crate::notify::NotifierRegistry;
    use crate::store::{Store, init_pool};
    use crate::validation::{SwitchPayload, validate};

    async fn service() -> SwitchService {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        let store = Store::new(pool, Codec::new([9u8; 32]));
        store.init().await.unwrap();
        SwitchService::new(Arc::new(store))
    }

    fn payload(check_in: &str) -> SwitchPayload {
        SwitchPayload {
            message: "ping".into(),
            notifiers: vec!["logger://".into()],
            check_in_interval: check_in.into(),
            delete_after_triggered: false,
            encrypted: false,
            push_subscription: None,
            reminder_threshold: None,
        }
    }

    #[tokio::test]
    async fn create_sets_active_status_and_owner() {
        let svc = service().await;
        let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
        let sw = svc.create("alice", req).await.unwrap();
        assert_eq!(sw.status, Status::Active);
        assert_eq!(sw.user_id, "alice");
        assert!(sw.push_subscription.is_none());
    }

    #[tokio::test]
    async fn update_keeps_trigger_at_when_interval_unchanged() {
        let svc = service().await;
        let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
        let created = svc.create("alice", req).await.unwrap();

        let mut p2 = payload("1h");
        p2.message = "updated".into();
        let req2 = validate(p2, &NotifierRegistry::with_builtins()).unwrap();
        let updated = svc.update("alice", created.id, req2).await.unwrap();

        assert_eq!(updated.trigger_at, created.trigger_at);
        assert_eq!(updated.message, "updated");
    }

    #[tokio::test]
    async fn update_recomputes_trigger_at_when_interval_changes() {
        let svc = service().await;
        let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
        let created = svc.create("alice", req).await.unwrap();

        let req2 = validate(payload("2h"), &NotifierRegistry::with_builtins()).unwrap();
        let updated = svc.update("alice", created.id, req2).await.unwrap();

        assert!(updated.trigger_at > created.trigger_at);
    }

    #[tokio::test]
    async fn reset_reactivates_a_terminal_switch() {
        let svc = service().await;
        let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
        let created = svc.create("alice", req).await.unwrap();
        svc.disable("alice", created.id).await.unwrap();

        let reset = svc.reset("alice", created.id).await.unwrap();
        assert_eq!(reset.status, Status::Active);
        assert!(!reset.reminder_sent);
        assert!(reset.trigger_at > chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn disable_does_not_clear_trigger_at() {
        let svc = service().await;
        let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
        let created = svc.create("alice", req).await.unwrap();
        let disabled = svc.disable("alice", created.id).await.unwrap();
        assert_eq!(disabled.trigger_at, created.trigger_at);
        assert_eq!(disabled.status, Status::Disabled);
    }
}
