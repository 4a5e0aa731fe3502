//! Service Container (4.L): the composition root. Owns every long-lived
//! resource and wires startup/shutdown in construction order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::auth::{AuthMode, JwtService};
use crate::config::Config;
use crate::crypto::{self, Codec};
use crate::error::Result;
use crate::notify::{Dispatcher, NoopPushSender, NotifierRegistry, PushSender, VapidPushSender};
use crate::service::SwitchService;
use crate::store::{self, Store};
use crate::worker::{Worker, WorkerConfig};

pub struct ServiceContainer {
    pub config: Config,
    store: Arc<Store>,
    service: Arc<SwitchService>,
    notifiers: Arc<NotifierRegistry>,
    vapid_public_key: Arc<str>,
    auth: AuthMode,
    cancel: CancellationToken,
    worker: Option<Worker>,
    worker_task: Option<tokio::task::JoinHandle<()>>,
}

impl ServiceContainer {
    /// Builds every owned resource: the pool, the key material, the store,
    /// the notifier registry and push sender, and the worker. Does not yet
    /// run migrations or start the worker loop — call [`initialize`].
    pub async fn build(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_dir)?;

        let (_, symmetric_key) = crypto::load_or_create_symmetric_key(&config.symmetric_key_path())?;
        let codec = Codec::new(symmetric_key);

        let pool = store::init_pool(&config.database_url).await?;
        let store = Arc::new(Store::new(pool, codec));

        let notifiers = Arc::new(NotifierRegistry::with_builtins());

        let vapid_keys = crypto::load_or_create_vapid(&config.vapid_private_key_path(), &config.vapid_public_key_path())?;
        let vapid_public_key: Arc<str> = Arc::from(vapid_keys.public_key_b64.as_str());

        let push_sender: Arc<dyn PushSender> = match config.contact_email.clone() {
            Some(subject) => Arc::new(VapidPushSender::new(vapid_keys.private_key_raw, vapid_keys.public_key_b64.clone(), format!("mailto:{subject}"))?),
            None => Arc::new(NoopPushSender),
        };

        let dispatcher = Arc::new(Dispatcher::new((*notifiers).clone(), push_sender));

        let service = Arc::new(SwitchService::new(store.clone()));

        let auth = match config.auth_hmac_secret.as_deref() {
            Some(secret) if config.auth_enabled => AuthMode::Enabled(JwtService::new(secret)),
            _ => AuthMode::Disabled,
        };

        let cancel = CancellationToken::new();
        let worker = Worker::new(
            store.clone(),
            dispatcher,
            WorkerConfig {
                interval: config.worker_interval,
                batch_size: config.worker_batch_size,
            },
            cancel.clone(),
        );

        Ok(Self {
            config,
            store,
            service,
            notifiers,
            vapid_public_key,
            auth,
            cancel,
            worker: Some(worker),
            worker_task: None,
        })
    }

    /// Runs migrations and spawns the worker loop as a background task.
    pub async fn initialize(&mut self) -> Result<()> {
        self.store.init().await?;
        if let Some(worker) = self.worker.take() {
            self.worker_task = Some(tokio::spawn(worker.run()));
        }
        Ok(())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            service: self.service.clone(),
            store: self.store.clone(),
            notifiers: self.notifiers.clone(),
            auth: self.auth.clone(),
            vapid_public_key: self.vapid_public_key.clone(),
            auth_issuer_url: self.config.auth_issuer_url.as_deref().map(Arc::from),
            auth_audience: self.config.auth_audience.as_deref().map(Arc::from),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the worker, awaits its shutdown, and closes the store.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.worker_task.take() {
            if let Err(e) = task.await {
                tracing::error!("worker task panicked during shutdown: {e}");
            }
        }
        self.store.close().await;
    }
}
