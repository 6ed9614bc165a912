use thiserror::Error;

use crate::subject::SubjectId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error fetching subjects: {0}")]
    Load(#[source] BoxError),

    #[error("Error submitting attendance for subject {subject_id}: {source}")]
    Submit {
        subject_id: SubjectId,
        #[source]
        source: BoxError,
    },

    #[error("Unknown subject: {0}")]
    UnknownSubject(SubjectId),

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("Terminal error: {0}")]
    Io(#[from] std::io::Error),
}
