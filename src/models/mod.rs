pub mod submission;

pub use submission::{FormData, Submission, SubmissionRecord, SubmissionStatus};
