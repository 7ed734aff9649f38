//! Error types for the offer wizard.

use thiserror::Error;

use crate::validation::FieldErrors;
use crate::wizard::{WizardEvent, WizardStep};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("cannot apply {event:?} in step {from:?}")]
    InvalidTransition { from: WizardStep, event: WizardEvent },

    #[error("the exchange terms must be accepted before continuing")]
    TermsNotAccepted,

    #[error("step {0:?} has no editable section")]
    NotEditable(WizardStep),

    #[error("image slot {0} is out of range")]
    ImageSlot(usize),

    #[error("no attachment at index {0}")]
    AttachmentIndex(usize),

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("payload encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("submission failed: {0}")]
    Submission(#[from] SubmitError),
}

/// Failure of the creation request.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("creation endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure to build a data-URL preview. Never surfaced to the user.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("file {0} is empty")]
    Empty(String),

    #[error("file {name} ({mime}) cannot be previewed")]
    NotAnImage { name: String, mime: String },

    #[error("preview task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, WizardError>;
