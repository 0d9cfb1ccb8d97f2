pub mod session;

pub use session::Session;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Per-chat failures. Everything here is caught by the workflow's retry loop
/// and degrades to a logged failure; nothing aborts the run.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("chat did not become ready within {}s", .0.as_secs())]
    ReadinessTimeout(Duration),
    #[error("phone number rejected by WhatsApp Web")]
    InvalidDestination,
    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not reach WebDriver endpoint {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: thirtyfour::error::WebDriverError,
    },
    #[error("failed to configure browser capabilities: {0}")]
    Capabilities(#[source] thirtyfour::error::WebDriverError),
    #[error("failed to open {url}: {source}")]
    Home {
        url: String,
        #[source]
        source: thirtyfour::error::WebDriverError,
    },
}

/// The browser capability the workflow drives a chat through. Kept narrow so
/// tests can substitute a deterministic double for the real WebDriver
/// session.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Navigate to the deep link for `phone` (digits only).
    async fn open_chat(&self, phone: &str) -> Result<(), ChatError>;

    /// Poll until the chat composer is rendered and visible, or until the
    /// invalid-number banner shows, or until `timeout` expires.
    async fn await_composer(&self, timeout: Duration) -> Result<(), ChatError>;

    /// Click the composer so subsequent keystrokes land in it.
    async fn focus_composer(&self) -> Result<(), ChatError>;
}
