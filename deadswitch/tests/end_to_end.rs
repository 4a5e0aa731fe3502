//! End-to-end scenarios driving the Store, Switch Service, Dispatcher, and
//! Worker together against a real (file-based) SQLite database, mirroring
//! the literal scenarios in the switch lifecycle design.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use deadswitch::crypto::Codec;
use deadswitch::domain::{PushSubscription, Status};
use deadswitch::notify::{Dispatcher, NoopPushSender, NotifierRegistry, PushSender};
use deadswitch::service::SwitchService;
use deadswitch::store::{Store, init_pool};
use deadswitch::validation::{SwitchPayload, validate};
use deadswitch::worker::{Worker, WorkerConfig};

struct Harness {
    _dir: TempDir,
    store: Arc<Store>,
    service: SwitchService,
    worker: Worker,
}

async fn harness(push: Arc<dyn PushSender>) -> Harness {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("switches.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy().replace('\\', "/"));

    let pool = init_pool(&db_url).await.unwrap();
    let store = Arc::new(Store::new(pool, Codec::new([11u8; 32])));
    store.init().await.unwrap();

    let registry = NotifierRegistry::with_builtins();
    let dispatcher = Arc::new(Dispatcher::new(registry, push));
    let worker = Worker::new(
        store.clone(),
        dispatcher,
        WorkerConfig {
            interval: std::time::Duration::from_secs(60),
            batch_size: 100,
        },
        CancellationToken::new(),
    );

    Harness {
        _dir: dir,
        service: SwitchService::new(store.clone()),
        store,
        worker,
    }
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

struct CountingPushSender {
    calls: AtomicUsize,
}

#[async_trait]
impl PushSender for CountingPushSender {
    async fn send(&self, _sub: &PushSubscription, _title: &str, _body: &str) -> deadswitch::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scenario 1: create + expire + notify.
#[tokio::test]
async fn create_then_expire_triggers_via_sweep() {
    let h = harness(Arc::new(NoopPushSender)).await;

    let req = validate(payload("1ms"), &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("admin", req).await.unwrap();
    assert_eq!(created.status, Status::Active);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.worker.sweep().await.unwrap();

    let fetched = h.store.get_by_id("admin", created.id).await.unwrap();
    assert_eq!(fetched.status, Status::Triggered);
    assert_eq!(fetched.trigger_at, created.trigger_at, "trigger_at is not touched by a trigger");
}

/// Scenario 2: a reminder fires once per eligible window and is not
/// re-sent on the next sweep.
#[tokio::test]
async fn reminder_fires_once_then_is_suppressed() {
    let counting = Arc::new(CountingPushSender { calls: AtomicUsize::new(0) });
    let h = harness(counting.clone()).await;

    let mut p = payload("30m");
    p.push_subscription = Some(PushSubscription {
        endpoint: Some("https://push.example/abc".into()),
        p256dh: Some("k".into()),
        auth: Some("a".into()),
    });
    p.reminder_threshold = Some("35m".into());

    let req = validate(p, &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("admin", req).await.unwrap();
    assert!(created.reminder_enabled);

    h.worker.sweep().await.unwrap();
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

    let after_first = h.store.get_by_id("admin", created.id).await.unwrap();
    assert!(after_first.reminder_sent);

    h.worker.sweep().await.unwrap();
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1, "no second reminder attempt");
}

/// Scenario 3: tenant isolation — another principal cannot read, write, or
/// observe a switch it does not own.
#[tokio::test]
async fn cross_tenant_access_is_not_found() {
    let h = harness(Arc::new(NoopPushSender)).await;

    let req = validate(payload("1h"), &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("alice", req).await.unwrap();

    assert!(matches!(h.service.get("bob", created.id).await, Err(deadswitch::Error::NotFound)));

    let mut intruding_payload = payload("1h");
    intruding_payload.message = "hijacked".into();
    let req2 = validate(intruding_payload, &NotifierRegistry::with_builtins()).unwrap();
    assert!(matches!(
        h.service.update("bob", created.id, req2).await,
        Err(deadswitch::Error::NotFound)
    ));

    let still_alices = h.service.get("alice", created.id).await.unwrap();
    assert_eq!(still_alices.message, "ping");
}

/// Scenario 4: an encrypted switch's sensitive fields are ciphertext on
/// disk, and the worker sees plaintext when it dispatches.
#[tokio::test]
async fn encrypted_switch_round_trips_through_a_sweep() {
    let h = harness(Arc::new(NoopPushSender)).await;

    let mut p = payload("1ms");
    p.encrypted = true;
    p.message = "top-secret".into();
    p.notifiers = vec!["webhook://127.0.0.1:1/unreachable".into()];

    let req = validate(p, &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("admin", req).await.unwrap();

    let row: (String, String) =
        sqlx::query_as("SELECT message, notifiers FROM switches WHERE id = ?")
            .bind(created.id)
            .fetch_one(h.store.pool())
            .await
            .unwrap();
    assert_ne!(row.0, "top-secret");
    assert!(!row.0.contains("://"));
    assert!(!row.1.contains("://"));

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.worker.sweep().await.unwrap();

    // The stored notifier URL was recognized at create time (it had to
    // parse as `webhook://` before encryption), so the worker's decrypted
    // dispatch attempt reaches an actual connection, which is refused
    // (nothing listens on 127.0.0.1:1) — confirming the dispatcher worked
    // from plaintext, not the ciphertext blob stored on disk.
    let fetched = h.store.get_by_id("admin", created.id).await.unwrap();
    assert_eq!(fetched.status, Status::Failed);
    assert!(fetched.failure_reason.is_some());
}

/// Scenario 5: reset clears terminal state and re-activates the switch.
#[tokio::test]
async fn reset_clears_terminal_state() {
    let h = harness(Arc::new(NoopPushSender)).await;

    let req = validate(payload("1ms"), &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("admin", req).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.worker.sweep().await.unwrap();
    let triggered = h.store.get_by_id("admin", created.id).await.unwrap();
    assert_eq!(triggered.status, Status::Triggered);

    let before_reset = chrono::Utc::now().timestamp();
    let reset = h.service.reset("admin", created.id).await.unwrap();
    assert_eq!(reset.status, Status::Active);
    assert!(!reset.reminder_sent);
    assert!(reset.trigger_at >= before_reset);
}

/// Regression test for a double-encryption bug: `reset`/`disable` used to
/// load the row via the non-decrypting `get_by_id` and write it back through
/// `update` (which unconditionally re-encrypts), encrypting the already-
/// ciphertext `message`/`notifiers`/`push_subscription` a second time on
/// every reset or disable of an encrypted switch.
#[tokio::test]
async fn reset_and_disable_do_not_double_encrypt_an_encrypted_switch() {
    let codec = Codec::new([11u8; 32]);
    let h = harness(Arc::new(NoopPushSender)).await;

    let mut p = payload("1h");
    p.encrypted = true;
    p.message = "top-secret".into();
    p.push_subscription = Some(PushSubscription {
        endpoint: Some("https://push.example/abc".into()),
        p256dh: Some("k".into()),
        auth: Some("a".into()),
    });

    let req = validate(p, &NotifierRegistry::with_builtins()).unwrap();
    let created = h.service.create("admin", req).await.unwrap();

    h.service.disable("admin", created.id).await.unwrap();
    h.service.reset("admin", created.id).await.unwrap();

    let row: (String, String, String) =
        sqlx::query_as("SELECT message, notifiers, push_subscription FROM switches WHERE id = ?")
            .bind(created.id)
            .fetch_one(h.store.pool())
            .await
            .unwrap();

    let decrypted_message = codec.decrypt(&row.0).unwrap();
    assert_eq!(
        String::from_utf8(decrypted_message).unwrap(),
        "top-secret",
        "a single decryption pass must recover the original plaintext, not a layer of stale ciphertext"
    );

    let stored_notifiers: Vec<String> = serde_json::from_str(&row.1).unwrap();
    let decrypted_notifiers = codec.decrypt(&stored_notifiers[0]).unwrap();
    let notifiers: Vec<String> = serde_json::from_slice(&decrypted_notifiers).unwrap();
    assert_eq!(notifiers, vec!["logger://".to_string()]);

    let stored_sub: PushSubscription = serde_json::from_str(&row.2).unwrap();
    let decrypted_sub = codec.decrypt(stored_sub.endpoint.as_deref().unwrap()).unwrap();
    let sub: PushSubscription = serde_json::from_slice(&decrypted_sub).unwrap();
    assert_eq!(sub.endpoint.as_deref(), Some("https://push.example/abc"));
}

/// Scenario 6: a mix of a valid and an invalid notifier taints the whole
/// dispatch; `delete_after_triggered` is not honored on the failure path.
#[tokio::test]
async fn partial_notifier_failure_marks_failed_and_keeps_the_row() {
    let h = harness(Arc::new(NoopPushSender)).await;

    let mut p = payload("1ms");
    p.notifiers = vec!["logger://".into(), "bogus://nope".into()];
    // bogus:// is not a registered scheme, so validation would normally
    // reject it; drive the worker directly against a row inserted through
    // the store to exercise the dispatcher's partial-failure path without
    // going through request validation.
    let sw = deadswitch::domain::Switch {
        id: 0,
        user_id: "admin".into(),
        message: p.message,
        notifiers: p.notifiers,
        check_in_interval: p.check_in_interval,
        trigger_at: chrono::Utc::now().timestamp() - 1,
        status: Status::Active,
        delete_after_triggered: true,
        encrypted: false,
        push_subscription: None,
        reminder_threshold: None,
        reminder_enabled: false,
        reminder_sent: false,
        failure_reason: None,
        created_at: 0,
        updated_at: 0,
    };
    let created = h.store.create(sw).await.unwrap();

    h.worker.sweep().await.unwrap();

    let fetched = h.store.get_by_id("admin", created.id).await.unwrap();
    assert_eq!(fetched.status, Status::Failed);
    let reason = fetched.failure_reason.expect("failure_reason must be set");
    assert!(reason.chars().next().unwrap().is_uppercase());
}
