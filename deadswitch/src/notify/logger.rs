//! A `logger://` notifier: writes the message to the structured log
//! instead of an external channel. Used in tests and demo setups, and as
//! the simplest possible notifier to ground the capability trait on.

use async_trait::async_trait;
use tracing::info;

use super::Notifier;
use crate::error::Result;

pub struct LoggerNotifier;

#[async_trait]
impl Notifier for LoggerNotifier {
    async fn send(&self, url: &str, body: &str) -> Result<()> {
        info!(target: "deadswitch::notify", %url, %body, "sent");
        Ok(())
    }
}
