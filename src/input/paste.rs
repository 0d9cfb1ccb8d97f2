use anyhow::{Context, Result};
use arboard::{Clipboard, ImageData};
use async_trait::async_trait;
use enigo::{Keyboard, Settings};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::browser::ChatError;

/// Capability the workflow sends an image through. The real implementation
/// drives the OS clipboard and keyboard; tests substitute a scripted double.
#[async_trait]
pub trait ImageSender: Send {
    async fn send(&mut self, image: &Path, caption: &str) -> Result<(), ChatError>;
}

/// Pastes an image plus caption into whatever window currently has input
/// focus and presses Enter. This routine has no idea which chat is focused;
/// correctness depends entirely on the caller having just navigated there.
///
/// There is no rollback: if the caption or send step fails after the image
/// paste, a retry in a fresh chat load can deliver the image twice. WhatsApp
/// Web exposes no send-confirmation the OS layer can read, so that risk is
/// documented rather than worked around.
pub struct ClipboardPaster {
    clipboard: Clipboard,
    preview_delay: Duration,
    settle_delay: Duration,
}

impl ClipboardPaster {
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new().context("Failed to initialize clipboard")?;
        Ok(Self {
            clipboard,
            preview_delay: Duration::from_secs(2),
            settle_delay: Duration::from_secs(2),
        })
    }

    async fn run_sequence(&mut self, image: &Path, caption: &str) -> Result<()> {
        info!("Sending image {} ({} caption chars)", image.display(), caption.len());

        // Clear any stale text so the image paste cannot race an old entry.
        self.clipboard
            .set_text("")
            .context("Failed to clear clipboard")?;

        let image_data = load_clipboard_image(image)?;
        self.clipboard
            .set_image(image_data)
            .context("Failed to copy image to clipboard")?;
        debug!("Image copied to clipboard");

        // Let the clipboard owner change propagate before pasting.
        tokio::time::sleep(Duration::from_millis(300)).await;
        press_paste()?;
        debug!("Pasted image into composer");

        // The attachment preview has no observable completion signal at the
        // OS layer, so this stays a bounded fixed delay.
        tokio::time::sleep(self.preview_delay).await;

        if !caption.is_empty() {
            self.clipboard
                .set_text(caption)
                .context("Failed to copy caption to clipboard")?;
            tokio::time::sleep(Duration::from_millis(200)).await;
            press_paste()?;
            debug!("Pasted caption");
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        press_send()?;
        debug!("Pressed Enter to send");
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl ImageSender for ClipboardPaster {
    async fn send(&mut self, image: &Path, caption: &str) -> Result<(), ChatError> {
        self.run_sequence(image, caption)
            .await
            .map_err(|err| ChatError::Send(format!("{err:#}")))
    }
}

fn load_clipboard_image(path: &Path) -> Result<ImageData<'static>> {
    let decoded = image::open(path)
        .with_context(|| format!("Failed to decode image {}", path.display()))?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(ImageData {
        width: width as usize,
        height: height as usize,
        bytes: Cow::Owned(decoded.into_raw()),
    })
}

fn press_paste() -> Result<()> {
    use enigo::{Direction, Key};
    let mut enigo = enigo::Enigo::new(&Settings::default())
        .context("Failed to initialize Enigo for paste")?;

    enigo
        .key(Key::Control, Direction::Press)
        .context("Failed to press Ctrl")?;
    enigo
        .key(Key::Unicode('v'), Direction::Click)
        .context("Failed to press V")?;
    enigo
        .key(Key::Control, Direction::Release)
        .context("Failed to release Ctrl")?;
    Ok(())
}

fn press_send() -> Result<()> {
    use enigo::{Direction, Key};
    let mut enigo = enigo::Enigo::new(&Settings::default())
        .context("Failed to initialize Enigo for send")?;

    enigo
        .key(Key::Return, Direction::Click)
        .context("Failed to press Enter")?;
    Ok(())
}
