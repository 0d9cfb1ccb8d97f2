use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{ChatError, ChatSurface};
use crate::caption::CaptionTemplate;
use crate::config::{Config, InvalidNumberPolicy};
use crate::contacts::Contact;
use crate::feedback::FeedbackLog;
use crate::input::{CancelToken, ImageSender};

/// Failure reasons are clipped to keep feedback lines single-line.
const STATUS_CLIP: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub stopped: bool,
}

impl RunSummary {
    pub fn remaining(&self) -> usize {
        self.total - self.successes - self.failures
    }
}

/// The per-contact and pacing knobs of a run, extracted from `Config` so the
/// workflow can be exercised without touching files or the CLI.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub image: PathBuf,
    pub chat_timeout: Duration,
    pub retry_pause: Duration,
    pub contact_pause: Duration,
    pub max_retries: u32,
    pub invalid_number_policy: InvalidNumberPolicy,
}

impl CampaignSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: config.image_file.clone(),
            chat_timeout: config.chat_timeout(),
            retry_pause: config.retry_pause(),
            contact_pause: config.contact_pause(),
            max_retries: config.max_retries,
            invalid_number_policy: config.invalid_number_policy,
        }
    }
}

/// Runs the whole campaign: one contact at a time, bounded retries, exactly
/// one feedback line per contact, cancel checked only at contact boundaries.
pub async fn run_campaign<S>(
    surface: &S,
    sender: &mut dyn ImageSender,
    contacts: &[Contact],
    template: &CaptionTemplate,
    settings: &CampaignSettings,
    feedback: &FeedbackLog,
    cancel: &CancelToken,
) -> RunSummary
where
    S: ChatSurface + ?Sized,
{
    let total = contacts.len();
    let mut summary = RunSummary {
        total,
        successes: 0,
        failures: 0,
        stopped: false,
    };

    for (position, contact) in contacts.iter().enumerate() {
        if cancel.is_stopped() {
            info!("Stop requested; {} contact(s) not processed", summary.remaining());
            summary.stopped = true;
            return summary;
        }

        let index = position + 1;
        info!(
            "Processing contact {}/{}: {} ({})",
            index, total, contact.name, contact.phone
        );

        let caption = template.render(&contact.name);
        let status = match deliver(surface, sender, contact, &caption, settings).await {
            Ok(()) => {
                summary.successes += 1;
                info!("Sent to {} ({})", contact.name, contact.phone);
                "successfully sent".to_string()
            }
            Err(err) => {
                summary.failures += 1;
                warn!("Giving up on {} ({}): {}", contact.name, contact.phone, err);
                clip_status(&format!("failed - {err}"))
            }
        };

        if let Err(err) = feedback.record(index, total, &contact.name, &contact.phone, &status) {
            warn!("Failed to write feedback line: {}", err);
        }

        if index < total && !cancel.is_stopped() {
            tokio::time::sleep(settings.contact_pause).await;
        }
    }

    summary.stopped = cancel.is_stopped();
    summary
}

/// One contact through the NAVIGATE -> WAIT_READY -> SEND machine, retrying
/// from NAVIGATE on any failure up to the attempt budget.
async fn deliver<S>(
    surface: &S,
    sender: &mut dyn ImageSender,
    contact: &Contact,
    caption: &str,
    settings: &CampaignSettings,
) -> Result<(), ChatError>
where
    S: ChatSurface + ?Sized,
{
    let max_attempts = settings.max_retries as usize + 1;

    for attempt in 1..=max_attempts {
        match attempt_send(surface, sender, contact, caption, settings).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                let retryable = settings.invalid_number_policy == InvalidNumberPolicy::Retry
                    || !matches!(err, ChatError::InvalidDestination);

                if retryable && attempt < max_attempts {
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {}s",
                        attempt,
                        max_attempts,
                        contact.phone,
                        err,
                        settings.retry_pause.as_secs()
                    );
                    tokio::time::sleep(settings.retry_pause).await;
                    continue;
                }

                return Err(err);
            }
        }
    }

    unreachable!("attempt loop always returns")
}

async fn attempt_send<S>(
    surface: &S,
    sender: &mut dyn ImageSender,
    contact: &Contact,
    caption: &str,
    settings: &CampaignSettings,
) -> Result<(), ChatError>
where
    S: ChatSurface + ?Sized,
{
    surface.open_chat(&contact.phone).await?;
    surface.await_composer(settings.chat_timeout).await?;
    surface.focus_composer().await?;
    sender.send(&settings.image, caption).await
}

fn clip_status(status: &str) -> String {
    if status.chars().count() <= STATUS_CLIP {
        return status.to_string();
    }
    status.chars().take(STATUS_CLIP).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_counts_unprocessed_contacts() {
        let summary = RunSummary {
            total: 7,
            successes: 3,
            failures: 1,
            stopped: true,
        };
        assert_eq!(summary.remaining(), 3);
    }

    #[test]
    fn clip_status_bounds_long_reasons() {
        let long = "x".repeat(500);
        assert_eq!(clip_status(&long).chars().count(), STATUS_CLIP);
        assert_eq!(clip_status("short"), "short");
    }
}
