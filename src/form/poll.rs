use chrono::{DateTime, FixedOffset};
use tracing::{error, info, warn};

use super::submission::{validate_submission, Submission, SubmissionSource};
use crate::display::submission_message;
use crate::error::Result;
use crate::notify::NotificationSink;

/// Outcome of one polling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub relayed: usize,
    /// Submissions left for the next pass because fetching or sending failed.
    pub pending: usize,
    /// Timestamp of the newest submission relayed so far.
    pub cursor: Option<DateTime<FixedOffset>>,
}

/// Relays every submission newer than `cursor` to the sink, oldest first.
///
/// The cursor only moves over the contiguous prefix of successfully relayed
/// submissions, so a failure leaves the rest for the next pass. Listing
/// failures are returned to the caller.
pub fn relay_new_submissions(
    source: &dyn SubmissionSource,
    sink: &dyn NotificationSink,
    cursor: Option<DateTime<FixedOffset>>,
) -> Result<RelayReport> {
    let mut submissions: Vec<Submission> = source
        .list_since(cursor)?
        .into_iter()
        .filter(|s| cursor.map_or(true, |c| s.timestamp > c))
        .filter(|s| match validate_submission(s) {
            Ok(()) => true,
            Err(reason) => {
                warn!(%reason, "skipping invalid submission");
                false
            }
        })
        .collect();
    submissions.sort_by_key(|s| s.timestamp);
    info!(count = submissions.len(), "got new submissions");

    let mut report = RelayReport {
        relayed: 0,
        pending: 0,
        cursor,
    };

    for (i, submission) in submissions.iter().enumerate() {
        let delivered = source
            .fetch_content(submission)
            .and_then(|content| sink.send(&submission_message(submission, &content)));
        if let Err(e) = delivered {
            error!(link = %submission.link, error = %e, "failed to relay submission");
            report.pending = submissions.len() - i;
            break;
        }
        report.relayed += 1;
        // Sorted oldest first, so this is the newest relayed timestamp so far.
        report.cursor = Some(submission.timestamp);
    }

    Ok(report)
}
