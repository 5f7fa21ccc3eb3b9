use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry on the question form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Where the submission's content can be fetched.
    pub link: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// Polling side of the question form.
///
/// Implementations are expected to block; they run on the scheduler thread.
pub trait SubmissionSource {
    /// All submissions with a timestamp strictly after `since`, or every
    /// submission when `since` is `None`.
    fn list_since(&self, since: Option<DateTime<FixedOffset>>) -> Result<Vec<Submission>>;

    /// Content of one submission. Must be safe to call repeatedly.
    fn fetch_content(&self, submission: &Submission) -> Result<String>;
}

/// Validates a listed submission
pub fn validate_submission(submission: &Submission) -> std::result::Result<(), String> {
    if submission.link.trim().is_empty() {
        return Err(format!("submission at {} has no link", submission.timestamp));
    }
    Ok(())
}
