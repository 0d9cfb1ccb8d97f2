pub mod browser;
pub mod caption;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod feedback;
pub mod input;
pub mod workflow;

pub use caption::CaptionTemplate;
pub use config::{Config, InvalidNumberPolicy};
pub use contacts::{Contact, ContactTable};
pub use feedback::FeedbackLog;
pub use workflow::RunSummary;
