use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use wablast_rs::browser::{ChatError, ChatSurface};
use wablast_rs::input::{CancelToken, ImageSender};
use wablast_rs::workflow::{run_campaign, CampaignSettings};
use wablast_rs::{CaptionTemplate, Contact, ContactTable, FeedbackLog, InvalidNumberPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Invalid,
    Timeout,
}

/// Deterministic stand-in for the WebDriver session: scripted readiness per
/// phone number, navigation counting for the retry-bound assertions.
struct FakeSurface {
    readiness: HashMap<String, Readiness>,
    navigations: Mutex<Vec<String>>,
}

impl FakeSurface {
    fn new(readiness: &[(&str, Readiness)]) -> Self {
        Self {
            readiness: readiness
                .iter()
                .map(|(phone, r)| (phone.to_string(), *r))
                .collect(),
            navigations: Mutex::new(Vec::new()),
        }
    }

    fn all_ready() -> Self {
        Self {
            readiness: HashMap::new(),
            navigations: Mutex::new(Vec::new()),
        }
    }

    fn navigation_count(&self, phone: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == phone)
            .count()
    }

    fn navigated_phones(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSurface for FakeSurface {
    async fn open_chat(&self, phone: &str) -> Result<(), ChatError> {
        self.navigations.lock().unwrap().push(phone.to_string());
        Ok(())
    }

    async fn await_composer(&self, timeout: Duration) -> Result<(), ChatError> {
        let phone = self
            .navigations
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("await_composer before open_chat");
        match self.readiness.get(&phone).copied().unwrap_or(Readiness::Ready) {
            Readiness::Ready => Ok(()),
            Readiness::Invalid => Err(ChatError::InvalidDestination),
            Readiness::Timeout => Err(ChatError::ReadinessTimeout(timeout)),
        }
    }

    async fn focus_composer(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Scripted clipboard double. Records every caption it "sent" and can flip a
/// cancel token mid-send to exercise the stop-at-boundary guarantee.
struct FakeSender {
    fail: bool,
    sent_captions: Vec<String>,
    cancel_during_send: Option<CancelToken>,
}

impl FakeSender {
    fn succeeding() -> Self {
        Self {
            fail: false,
            sent_captions: Vec::new(),
            cancel_during_send: None,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            sent_captions: Vec::new(),
            cancel_during_send: None,
        }
    }
}

#[async_trait]
impl ImageSender for FakeSender {
    async fn send(&mut self, _image: &Path, caption: &str) -> Result<(), ChatError> {
        if let Some(token) = &self.cancel_during_send {
            token.request_stop();
        }
        if self.fail {
            return Err(ChatError::Send("paste sequence failed".to_string()));
        }
        self.sent_captions.push(caption.to_string());
        Ok(())
    }
}

fn settings() -> CampaignSettings {
    CampaignSettings {
        image: PathBuf::from("image.png"),
        chat_timeout: Duration::from_secs(1),
        retry_pause: Duration::ZERO,
        contact_pause: Duration::ZERO,
        max_retries: 3,
        invalid_number_policy: InvalidNumberPolicy::FailFast,
    }
}

fn contact(row_index: usize, phone: &str, name: &str) -> Contact {
    Contact {
        row_index,
        phone: phone.to_string(),
        name: name.to_string(),
    }
}

fn temp_feedback() -> (tempfile::TempDir, PathBuf, FeedbackLog) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("feedback.txt");
    let log = FeedbackLog::new(&path);
    log.start().expect("start feedback");
    (dir, path, log)
}

#[tokio::test]
async fn failing_send_uses_exactly_the_attempt_budget() {
    let surface = FakeSurface::all_ready();
    let mut sender = FakeSender::failing();
    let contacts = vec![contact(0, "1234567", "Alice")];
    let (_dir, path, feedback) = temp_feedback();

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &CaptionTemplate::empty(),
        &settings(),
        &feedback,
        &CancelToken::new(),
    )
    .await;

    // max_retries = 3 means 4 total attempts, each starting with a navigation
    assert_eq!(surface.navigation_count("1234567"), 4);
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.failures, 1);

    let content = std::fs::read_to_string(&path).expect("read feedback");
    let failure_lines = content
        .lines()
        .filter(|line| line.starts_with("[1/1] Alice"))
        .count();
    assert_eq!(failure_lines, 1);
}

#[tokio::test]
async fn invalid_number_fails_fast_by_default() {
    let surface = FakeSurface::new(&[("999", Readiness::Invalid)]);
    let mut sender = FakeSender::succeeding();
    let contacts = vec![contact(0, "999", "Nobody")];
    let (_dir, path, feedback) = temp_feedback();

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &CaptionTemplate::empty(),
        &settings(),
        &feedback,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(surface.navigation_count("999"), 1);
    assert_eq!(summary.failures, 1);

    let content = std::fs::read_to_string(&path).expect("read feedback");
    assert!(content.contains("[1/1] Nobody -- 999 : failed - phone number rejected"));
}

#[tokio::test]
async fn invalid_number_retry_policy_burns_the_full_budget() {
    let surface = FakeSurface::new(&[("999", Readiness::Invalid)]);
    let mut sender = FakeSender::succeeding();
    let contacts = vec![contact(0, "999", "Nobody")];
    let (_dir, _path, feedback) = temp_feedback();

    let mut retry_settings = settings();
    retry_settings.invalid_number_policy = InvalidNumberPolicy::Retry;

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &CaptionTemplate::empty(),
        &retry_settings,
        &feedback,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(surface.navigation_count("999"), 4);
    assert_eq!(summary.failures, 1);
}

#[tokio::test]
async fn readiness_timeout_is_retried() {
    let surface = FakeSurface::new(&[("555", Readiness::Timeout)]);
    let mut sender = FakeSender::succeeding();
    let contacts = vec![contact(0, "555", "Slow")];
    let (_dir, path, feedback) = temp_feedback();

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &CaptionTemplate::empty(),
        &settings(),
        &feedback,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(surface.navigation_count("555"), 4);
    assert_eq!(summary.failures, 1);

    let content = std::fs::read_to_string(&path).expect("read feedback");
    assert!(content.contains("did not become ready"));
}

#[tokio::test]
async fn stop_during_a_contact_lets_it_finish_but_starts_no_more() {
    let surface = FakeSurface::all_ready();
    let cancel = CancelToken::new();
    let mut sender = FakeSender::succeeding();
    sender.cancel_during_send = Some(cancel.clone());

    let contacts = vec![
        contact(0, "1111111", "One"),
        contact(1, "2222222", "Two"),
        contact(2, "3333333", "Three"),
    ];
    let (_dir, path, feedback) = temp_feedback();

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &CaptionTemplate::empty(),
        &settings(),
        &feedback,
        &cancel,
    )
    .await;

    // contact one completes despite the stop landing mid-send
    assert_eq!(summary.successes, 1);
    assert_eq!(summary.failures, 0);
    assert!(summary.stopped);
    assert_eq!(summary.remaining(), 2);
    assert_eq!(surface.navigated_phones(), vec!["1111111"]);

    let content = std::fs::read_to_string(&path).expect("read feedback");
    assert!(content.contains("[1/3] One"));
    assert!(!content.contains("Two"));
    assert!(!content.contains("Three"));
}

#[tokio::test]
async fn three_row_spreadsheet_scenario() {
    use std::io::Write;

    let mut csv = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("temp csv");
    csv.write_all(b"Phone,Name\n1234567,Alice\n,Bob\n7654321,\n")
        .expect("write csv");

    let table = ContactTable::load(csv.path()).expect("load table");
    let contacts = table.contacts();

    // Bob has no phone digits and is skipped before the run starts; the
    // nameless row falls back to its phone number.
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[1].name, "7654321");

    let surface = FakeSurface::all_ready();
    let mut sender = FakeSender::succeeding();
    let template = CaptionTemplate::new("Hi {name}!");
    let (_dir, path, feedback) = temp_feedback();

    let summary = run_campaign(
        &surface,
        &mut sender,
        &contacts,
        &template,
        &settings(),
        &feedback,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(summary.successes + summary.failures, 2);
    assert_eq!(summary.total, 2);
    assert!(!summary.stopped);
    assert_eq!(sender.sent_captions, vec!["Hi Alice!", "Hi 7654321!"]);

    let content = std::fs::read_to_string(&path).expect("read feedback");
    assert!(content.contains("[1/2] Alice -- 1234567 : successfully sent"));
    assert!(content.contains("[2/2] 7654321 -- 7654321 : successfully sent"));
}
