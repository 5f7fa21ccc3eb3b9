pub mod submission;
pub mod poll;

pub use submission::{Submission, SubmissionSource};
pub use poll::{relay_new_submissions, RelayReport};
