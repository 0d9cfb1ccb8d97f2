use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wablast-rs", version, about = "Bulk WhatsApp Web image sender driven through WebDriver and the OS clipboard")]
pub struct Cli {
    /// Path to a JSONC config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Contacts spreadsheet (.xlsx, .xls or .csv)
    #[arg(long)]
    pub contacts: Option<PathBuf>,

    /// Image file to send to every contact
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Caption template file containing an optional {name} token
    #[arg(long)]
    pub caption: Option<PathBuf>,

    /// Feedback log file (truncated at run start)
    #[arg(long)]
    pub feedback: Option<PathBuf>,

    /// WebDriver endpoint, e.g. http://localhost:9515
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Retries per contact on top of the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Ceiling in seconds for the manual QR authentication wait
    #[arg(long)]
    pub auth_wait_secs: Option<u64>,

    /// Global hotkey that stops the run at the next contact boundary
    #[arg(long)]
    pub stop_shortcut: Option<String>,

    /// Keep retrying contacts whose number WhatsApp reports as invalid
    #[arg(long)]
    pub retry_invalid: bool,
}
