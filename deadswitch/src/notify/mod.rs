//! Notifier Dispatcher (4.F): resolves a switch's notifier URLs to
//! capabilities and fans a message out to all of them plus an optional
//! Web Push channel.

mod logger;
mod push;
mod webhook;

pub use push::{NoopPushSender, PushSender, VapidPushSender};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::domain::Switch;
use crate::error::{Error, Result};

/// A capability that accepts a URL and a message body and delivers it to a
/// downstream channel. Kept minimal by design: adding a scheme is a single
/// registry registration, not a trait change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, url: &str, body: &str) -> Result<()>;
}

/// Resolves notifier URLs to [`Notifier`] capabilities by scheme.
#[derive(Clone)]
pub struct NotifierRegistry {
    by_scheme: Arc<HashMap<String, Arc<dyn Notifier>>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            by_scheme: Arc::new(HashMap::new()),
        }
    }

    /// The built-in schemes this service recognizes out of the box: a
    /// structured-log sink, generic webhooks, and thin adapters over a few
    /// common chat services (stand-ins for the out-of-core message-service
    /// URL library).
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        let registry = Arc::get_mut(&mut reg.by_scheme).expect("registry is uniquely owned during construction");
        let logger: Arc<dyn Notifier> = Arc::new(logger::LoggerNotifier);
        let webhook: Arc<dyn Notifier> = Arc::new(webhook::WebhookNotifier::new());
        registry.insert("logger".to_string(), logger);
        registry.insert("webhook".to_string(), webhook.clone());
        registry.insert("webhooks".to_string(), webhook.clone());
        registry.insert("discord".to_string(), Arc::new(webhook::DiscordNotifier::new()));
        registry.insert("slack".to_string(), Arc::new(webhook::SlackNotifier::new()));
        registry.insert("telegram".to_string(), Arc::new(webhook::TelegramNotifier::new()));
        reg
    }

    fn scheme_of(url: &str) -> Option<String> {
        Url::parse(url).ok().map(|u| u.scheme().to_string())
    }

    /// The "Locate" test used by the request validator: does a URL parse
    /// and resolve to a registered scheme?
    pub fn recognizes(&self, url: &str) -> bool {
        Self::scheme_of(url).is_some_and(|scheme| self.by_scheme.contains_key(&scheme))
    }

    pub fn resolve(&self, url: &str) -> Result<Arc<dyn Notifier>> {
        let scheme = Self::scheme_of(url)
            .ok_or_else(|| Error::validation(format!("malformed notifier URL: {url}")))?;
        self.by_scheme
            .get(&scheme)
            .cloned()
            .ok_or_else(|| Error::validation(format!("no notifier registered for scheme '{scheme}'")))
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Fans a switch's message out to every configured notifier plus its
/// optional push subscription, with "all or error" aggregation.
pub struct Dispatcher {
    registry: NotifierRegistry,
    push: Arc<dyn PushSender>,
}

impl Dispatcher {
    pub fn new(registry: NotifierRegistry, push: Arc<dyn PushSender>) -> Self {
        Self { registry, push }
    }

    /// Delivers `body` to every notifier on `sw`. A single failure taints
    /// the whole dispatch (used by the worker to decide `triggered` vs
    /// `failed`). An empty/missing push subscription is a no-op, not an
    /// error.
    pub async fn dispatch(&self, sw: &Switch, body: &str) -> Result<()> {
        let mut failures = Vec::new();

        for url in &sw.notifiers {
            match self.registry.resolve(url) {
                Ok(notifier) => {
                    if let Err(e) = notifier.send(url, body).await {
                        failures.push(format!("{url}: {e}"));
                    }
                }
                Err(e) => failures.push(format!("{url}: {e}")),
            }
        }

        if let Some(sub) = &sw.push_subscription {
            if sub.is_usable() {
                if let Err(e) = self.push.send(sub, "Dead-man switch triggered", body).await {
                    failures.push(format!("push: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::notify(failures.join("; ")))
        }
    }

    /// Sends the early-warning reminder push only; failure here simply
    /// means "retry next tick", it never fails the switch.
    pub async fn dispatch_reminder(&self, sw: &Switch, body: &str) -> Result<()> {
        let Some(sub) = &sw.push_subscription else {
            return Ok(());
        };
        if !sub.is_usable() {
            return Ok(());
        }
        self.push.send(sub, "Dead-man switch reminder", body).await
    }
}
