use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wablast_rs::browser::Session;
use wablast_rs::cli::Cli;
use wablast_rs::input::{CancelToken, ClipboardPaster};
use wablast_rs::workflow::{self, CampaignSettings};
use wablast_rs::{CaptionTemplate, Config, ContactTable, FeedbackLog, RunSummary};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wablast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {:#}", err);
            return ExitCode::from(1);
        }
    };
    config.apply_cli(&cli);

    info!("wablast-rs starting up");
    info!("{}", "=".repeat(50));
    info!("   Contacts: {}", config.contacts_file.display());
    info!("   Image: {}", config.image_file.display());
    info!("   WebDriver: {}", config.webdriver_url);
    info!("   Stop shortcut: {}", config.stop_shortcut);

    match run(config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Run failed: {:#}", err);
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> Result<RunSummary> {
    // Startup checks: everything that must exist before a browser is worth
    // launching.
    if !config.image_file.exists() {
        anyhow::bail!("Image file not found: {}", config.image_file.display());
    }

    let template = match CaptionTemplate::load(&config.caption_file) {
        Ok(template) if !template.is_empty() => template,
        Ok(_) => {
            warn!("Caption template is empty; proceeding without a caption");
            CaptionTemplate::empty()
        }
        Err(err) => {
            warn!("Could not read caption template: {:#}; proceeding without a caption", err);
            CaptionTemplate::empty()
        }
    };

    let table = ContactTable::load(&config.contacts_file).context("Failed to load contacts")?;
    let contacts = table.contacts();
    if contacts.is_empty() {
        anyhow::bail!(
            "No sendable contacts in {} (no rows with phone digits)",
            config.contacts_file.display()
        );
    }
    info!("Processing {} contact(s)", contacts.len());

    let feedback = FeedbackLog::new(&config.feedback_file);
    feedback.start()?;

    let cancel = CancelToken::new();
    spawn_signal_handler(cancel.clone());

    #[cfg(target_os = "linux")]
    let _stop_listener = match wablast_rs::input::StopListener::spawn(
        &config.stop_shortcut,
        cancel.clone(),
    ) {
        Ok(listener) => Some(listener),
        Err(err) => {
            warn!("Stop hotkey unavailable: {:#}; use Ctrl+C instead", err);
            None
        }
    };
    #[cfg(not(target_os = "linux"))]
    info!("Stop hotkey not supported on this platform; use Ctrl+C");

    let mut sender = ClipboardPaster::new().context("Failed to initialize clipboard paster")?;
    let settings = CampaignSettings::from_config(&config);

    // Session init failure is fatal to the run but still leaves a feedback
    // trail: one synthetic SYSTEM entry plus the summary block.
    let session = match Session::connect(
        &config.webdriver_url,
        &config.home_url,
        config.poll_interval(),
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            let summary = RunSummary {
                total: contacts.len(),
                successes: 0,
                failures: 0,
                stopped: false,
            };
            record_fatal(&feedback, &summary, &format!("Browser initialization failed: {err}"));
            return Err(err).context("Failed to start browser session");
        }
    };

    if let Err(err) = session.authenticate(config.auth_wait()).await {
        let summary = RunSummary {
            total: contacts.len(),
            successes: 0,
            failures: 0,
            stopped: false,
        };
        record_fatal(&feedback, &summary, &format!("WhatsApp Web did not open: {err}"));
        session.close().await;
        return Err(err).context("Failed to open WhatsApp Web");
    }

    let summary = workflow::run_campaign(
        &session,
        &mut sender,
        &contacts,
        &template,
        &settings,
        &feedback,
        &cancel,
    )
    .await;

    // The session closes exactly once, whatever the campaign outcome.
    session.close().await;

    if let Err(err) = feedback.summary(&summary) {
        warn!("Failed to write summary block: {:#}", err);
    }

    info!(
        "Done: {} sent, {} failed out of {}",
        summary.successes, summary.failures, summary.total
    );
    if summary.stopped {
        info!("Stopped by user; {} contact(s) remaining", summary.remaining());
    }
    info!("Detailed feedback saved to {}", config.feedback_file.display());

    Ok(summary)
}

fn record_fatal(feedback: &FeedbackLog, summary: &RunSummary, message: &str) {
    if let Err(err) = feedback.record_system_error(summary.total, message) {
        warn!("Failed to write system error entry: {:#}", err);
    }
    if let Err(err) = feedback.summary(summary) {
        warn!("Failed to write summary block: {:#}", err);
    }
}

fn spawn_signal_handler(cancel: CancelToken) {
    #[cfg(unix)]
    tokio::spawn(async move {
        let ctrl_c = signal::ctrl_c();
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                warn!("Failed to set up SIGTERM handler: {}", err);
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C); stopping after the current contact");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM; stopping after the current contact");
            }
        }

        cancel.request_stop();
    });

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C; stopping after the current contact");
            cancel.request_stop();
        }
    });
}
