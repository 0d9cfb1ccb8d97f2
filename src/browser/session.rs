use async_trait::async_trait;
use std::time::{Duration, Instant};
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

use super::{ChatError, ChatSurface, SessionError};

const CHROME_ARGS: &[&str] = &[
    "--start-maximized",
    "--disable-notifications",
    "--disable-popup-blocking",
];

/// Selectors that indicate the chat composer is rendered. WhatsApp Web has
/// shipped several DOM variants; the first visible match wins.
fn composer_selectors() -> Vec<By> {
    vec![
        By::XPath("//div[@title='Type a message']"),
        By::XPath("//div[@data-testid='conversation-compose-box-input']"),
        By::XPath("//div[contains(@class, 'copyable-text') and @contenteditable='true']"),
        By::XPath("//footer//div[@contenteditable='true']"),
        By::Css("div.copyable-text[contenteditable='true']"),
        By::Css("footer div[contenteditable='true']"),
    ]
}

fn chat_list_selectors() -> Vec<By> {
    vec![
        By::Css("div[data-testid='chat-list']"),
        By::Css("div[aria-label='Chat list']"),
        By::Css("#side"),
    ]
}

fn invalid_number_selector() -> By {
    By::XPath("//div[contains(text(), 'Phone number shared via url is invalid.')]")
}

fn composer_click_selector() -> By {
    By::XPath("//footer//div[@contenteditable='true']")
}

/// Owns the one browser instance for the whole run.
pub struct Session {
    driver: WebDriver,
    home_url: String,
    poll_interval: Duration,
}

impl Session {
    /// Starts a Chrome session against the given WebDriver endpoint.
    pub async fn connect(
        webdriver_url: &str,
        home_url: &str,
        poll_interval: Duration,
    ) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in CHROME_ARGS {
            caps.add_arg(arg).map_err(SessionError::Capabilities)?;
        }

        let driver = WebDriver::new(webdriver_url, caps)
            .await
            .map_err(|source| SessionError::Connect {
                url: webdriver_url.to_string(),
                source,
            })?;

        let mut home_url = home_url.to_string();
        if !home_url.ends_with('/') {
            home_url.push('/');
        }

        info!("Browser session started via {}", webdriver_url);
        Ok(Self {
            driver,
            home_url,
            poll_interval,
        })
    }

    /// Opens the WhatsApp Web home page and waits for manual QR
    /// authentication by polling for the chat-list marker. Times out with a
    /// warning rather than an error; the per-chat readiness poll is the
    /// backstop for a session that never authenticated.
    pub async fn authenticate(&self, ceiling: Duration) -> Result<(), SessionError> {
        self.driver
            .goto(self.home_url.as_str())
            .await
            .map_err(|source| SessionError::Home {
                url: self.home_url.clone(),
                source,
            })?;

        info!(
            "Scan the QR code if prompted; waiting up to {}s for WhatsApp Web to log in",
            ceiling.as_secs()
        );

        let start = Instant::now();
        while start.elapsed() < ceiling {
            for selector in chat_list_selectors() {
                if self.is_visible(selector).await {
                    info!("WhatsApp Web authenticated");
                    return Ok(());
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(
            "Chat list not visible after {}s; continuing anyway",
            ceiling.as_secs()
        );
        Ok(())
    }

    /// Quits the browser. Close-time errors are swallowed; there is nothing
    /// useful to do with them at the end of a run.
    pub async fn close(self) {
        if let Err(err) = self.driver.quit().await {
            warn!("Failed to close browser session: {}", err);
        } else {
            info!("Browser session closed");
        }
    }

    async fn is_visible(&self, selector: By) -> bool {
        match self.driver.find(selector).await {
            Ok(element) => element.is_displayed().await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ChatSurface for Session {
    async fn open_chat(&self, phone: &str) -> Result<(), ChatError> {
        let url = format!("{}send?phone={}", self.home_url, phone);
        debug!("Opening chat deep link: {}", url);
        self.driver
            .goto(url.as_str())
            .await
            .map_err(|err| ChatError::Navigation(err.to_string()))
    }

    async fn await_composer(&self, timeout: Duration) -> Result<(), ChatError> {
        debug!("Waiting up to {}s for chat to load", timeout.as_secs());
        let start = Instant::now();

        while start.elapsed() < timeout {
            for selector in composer_selectors() {
                if self.is_visible(selector).await {
                    debug!("Chat composer is visible");
                    return Ok(());
                }
            }

            if self.is_visible(invalid_number_selector()).await {
                return Err(ChatError::InvalidDestination);
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(ChatError::ReadinessTimeout(timeout))
    }

    async fn focus_composer(&self) -> Result<(), ChatError> {
        let element = self
            .driver
            .find(composer_click_selector())
            .await
            .map_err(|err| ChatError::Send(format!("could not find composer: {err}")))?;
        element
            .click()
            .await
            .map_err(|err| ChatError::Send(format!("could not focus composer: {err}")))?;
        debug!("Composer focused");
        Ok(())
    }
}
