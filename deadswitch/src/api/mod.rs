//! HTTP API (4.I): an axum router binding the external interface in §6 to
//! the Request Validator, Switch Service, and Principal Extractor.

pub mod error;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::auth::AuthMode;
use crate::notify::NotifierRegistry;
use crate::service::SwitchService;
use crate::store::Store;

/// Shared handler state. Cheap to clone: every field is an `Arc` or a
/// small value type, never a lock over the whole application.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SwitchService>,
    pub store: Arc<Store>,
    pub notifiers: Arc<NotifierRegistry>,
    pub auth: AuthMode,
    pub vapid_public_key: Arc<str>,
    pub auth_issuer_url: Option<Arc<str>>,
    pub auth_audience: Option<Arc<str>>,
}

pub use server::build_router;
