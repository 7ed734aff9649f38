//! # Campus exchange offer flow
//!
//! Client-side core of the product-for-product exchange wizard: the user
//! describes what they offer, then what they expect in return, and both
//! sides are sent to the creation endpoint in one multipart request.
//!
//! | Concern               | Module                                   |
//! |-----------------------|------------------------------------------|
//! | Offer document        | [`types`], [`files`]                     |
//! | Validation rules      | [`validation`]                           |
//! | Field edits, touched  | [`form_state`]                           |
//! | Image previews        | [`preview`]                              |
//! | Step machine          | [`wizard`]                               |
//! | Request body          | [`payload`]                              |
//! | Creation endpoint     | [`client`]                               |
//!
//! ## Architecture
//!
//! [`wizard::WizardController`] owns both offer drafts. Field edits go
//! through [`form_state::FieldUpdate`]; nothing else writes to a draft.
//! Validation is a table of rules evaluated over a draft, shared with the
//! backend, which checks the decoded JSON records against the same table.

pub mod client;
pub mod errors;
pub mod files;
pub mod form_state;
pub mod payload;
pub mod preview;
pub mod types;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_submission;
#[cfg(test)]
mod test_wizard;
#[cfg(test)]
mod testutil;

pub use client::{ClientConfig, ExchangeTransport, HttpTransport};
pub use errors::{PreviewError, SubmitError, WizardError};
pub use files::{FileAttachment, FileKind, FileRef};
pub use form_state::{FieldUpdate, FormState};
pub use payload::{assemble, describe, SubmissionPayload, UploadLayout};
pub use types::{ExchangeDrafts, Offer, OfferDetails, OfferDraft, Side};
pub use validation::{validate, FieldErrors};
pub use wizard::{WizardConfig, WizardController, WizardEvent, WizardStep};
