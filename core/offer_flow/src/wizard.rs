//! Multi-step wizard controller.
//!
//! ## States
//!
//! ```text
//! Introduction ──Advance──► OfferedDetails ──Advance──► ExpectedRequirements
//!      ▲                                                   │        ▲
//!      │                                    SubmissionSucceeded  SubmissionFailed
//!      │                                                   ▼        │
//!      └──────────────ResetElapsed──────────────────── Submitted    └─(stays)
//! ```
//!
//! There is no backward navigation. Advancing out of a details step requires
//! that side to validate; leaving `ExpectedRequirements` happens only through
//! a successful submission.
//!
//! The return from `Submitted` to `Introduction` is a scheduled transition
//! owned by the controller: it survives view teardown and can be cancelled.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::ExchangeTransport;
use crate::errors::{Result, WizardError};
use crate::form_state::{FieldUpdate, FormState, PreviewChange};
use crate::payload::{assemble, SubmissionPayload, UploadLayout};
use crate::preview::{PreviewCache, PreviewJob, PreviewOutcome};
use crate::types::{ExchangeDrafts, Side};
use crate::validation::{validate, FieldErrors};

/// Delay between a successful submission and the return to the first step.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    /// Step 0: the user acknowledges how exchanges work.
    Introduction,
    /// Step 1: what is offered.
    OfferedDetails,
    /// Step 2: what is expected in return.
    ExpectedRequirements,
    /// Step 3: confirmation shown after a successful submission.
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Advance,
    SubmissionSucceeded,
    SubmissionFailed,
    ResetElapsed,
}

impl WizardStep {
    pub fn index(self) -> usize {
        match self {
            WizardStep::Introduction => 0,
            WizardStep::OfferedDetails => 1,
            WizardStep::ExpectedRequirements => 2,
            WizardStep::Submitted => 3,
        }
    }

    /// The offer side edited in this step.
    pub fn side(self) -> Option<Side> {
        match self {
            WizardStep::OfferedDetails => Some(Side::Offered),
            WizardStep::ExpectedRequirements => Some(Side::Expected),
            WizardStep::Introduction | WizardStep::Submitted => None,
        }
    }

    /// The transition table.
    pub fn transition(self, event: WizardEvent) -> Result<WizardStep> {
        use WizardEvent::*;
        use WizardStep::*;
        match (self, event) {
            (Introduction, Advance) => Ok(OfferedDetails),
            (OfferedDetails, Advance) => Ok(ExpectedRequirements),
            (ExpectedRequirements, SubmissionSucceeded) => Ok(Submitted),
            (ExpectedRequirements, SubmissionFailed) => Ok(ExpectedRequirements),
            (Submitted, ResetElapsed) => Ok(Introduction),
            (from, event) => Err(WizardError::InvalidTransition { from, event }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub reset_delay: Duration,
    pub upload_layout: UploadLayout,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            reset_delay: DEFAULT_RESET_DELAY,
            upload_layout: UploadLayout::default(),
        }
    }
}

/// One wizard session: the step, both drafts, and the per-step view state.
pub struct WizardController {
    config: WizardConfig,
    step: WizardStep,
    drafts: ExchangeDrafts,
    terms_accepted: bool,
    offered_form: FormState,
    expected_form: FormState,
    previews: PreviewCache,
    reset_at: Option<Instant>,
}

impl WizardController {
    pub fn new(config: WizardConfig) -> Self {
        Self {
            config,
            step: WizardStep::Introduction,
            drafts: ExchangeDrafts::default(),
            terms_accepted: false,
            offered_form: FormState::default(),
            expected_form: FormState::default(),
            previews: PreviewCache::new(0),
            reset_at: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Read-only view of both drafts.
    pub fn drafts(&self) -> &ExchangeDrafts {
        &self.drafts
    }

    pub fn form_state(&self, side: Side) -> &FormState {
        match side {
            Side::Offered => &self.offered_form,
            Side::Expected => &self.expected_form,
        }
    }

    pub fn previews(&self) -> &PreviewCache {
        &self.previews
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    /// When the pending return to step 0 is due, if one is scheduled.
    pub fn reset_deadline(&self) -> Option<Instant> {
        self.reset_at
    }

    pub fn accept_terms(&mut self, accepted: bool) -> Result<()> {
        if self.step != WizardStep::Introduction {
            return Err(WizardError::NotEditable(self.step));
        }
        self.terms_accepted = accepted;
        Ok(())
    }

    fn form_mut(&mut self, side: Side) -> &mut FormState {
        match side {
            Side::Offered => &mut self.offered_form,
            Side::Expected => &mut self.expected_form,
        }
    }

    /// Apply one field edit to the side of the current step.
    ///
    /// Returns the preview to compute when the edit picked an image; run it
    /// with [`PreviewJob::run`] and pass the outcome to
    /// [`WizardController::finish_preview`].
    pub fn apply(&mut self, update: FieldUpdate) -> Result<Option<PreviewJob>> {
        let side = self.step.side().ok_or(WizardError::NotEditable(self.step))?;
        let path = update.path();
        let preview = update.preview_change();

        update.apply(self.drafts.side_mut(side))?;
        let draft = self.drafts.side(side);
        match side {
            Side::Offered => self.offered_form.record(path, draft),
            Side::Expected => self.expected_form.record(path, draft),
        }
        debug!(?side, field = path, "field updated");

        Ok(match preview {
            Some(PreviewChange::Render(slot, file)) => Some(PreviewJob {
                ticket: self.previews.begin(slot),
                file,
            }),
            Some(PreviewChange::Clear(slot)) => {
                self.previews.clear(slot);
                None
            }
            None => None,
        })
    }

    /// Store a finished preview; stale or failed previews are dropped.
    pub fn finish_preview(&mut self, outcome: PreviewOutcome) -> bool {
        self.previews.complete(outcome)
    }

    /// Errors to display for the current step.
    pub fn visible_errors(&self) -> FieldErrors {
        match self.step.side() {
            Some(side) => self.form_state(side).visible_errors(self.drafts.side(side)),
            None => FieldErrors::new(),
        }
    }

    /// Submit the current (non-final) step and move forward.
    pub fn advance(&mut self) -> Result<WizardStep> {
        let next = self.step.transition(WizardEvent::Advance)?;
        match self.step {
            WizardStep::Introduction if !self.terms_accepted => {
                return Err(WizardError::TermsNotAccepted);
            }
            WizardStep::OfferedDetails => self.check_side(Side::Offered)?,
            _ => {}
        }
        self.enter(next);
        Ok(next)
    }

    fn check_side(&mut self, side: Side) -> Result<()> {
        if let Err(errors) = validate(self.drafts.side(side)) {
            self.form_mut(side).mark_submit_attempted();
            debug!(?side, invalid = errors.len(), "section failed validation");
            return Err(WizardError::Validation(errors));
        }
        Ok(())
    }

    /// Payload the final submit would send, without sending it.
    pub fn preview_payload(&self) -> Result<SubmissionPayload> {
        Ok(assemble(&self.drafts, &self.config.upload_layout)?)
    }

    /// Final submit from `ExpectedRequirements`.
    ///
    /// On success both drafts are discarded, the wizard shows `Submitted`
    /// and a return to step 0 is scheduled. On failure nothing changes so the
    /// user can correct and resubmit.
    pub async fn submit<T: ExchangeTransport>(&mut self, transport: &T) -> Result<Value> {
        // Reject early when not on the final details step.
        self.step.transition(WizardEvent::SubmissionSucceeded)?;
        self.check_side(Side::Expected)?;

        let payload = assemble(&self.drafts, &self.config.upload_layout)?;
        info!(parts = payload.len(), "submitting exchange offer");

        match transport.create(&payload).await {
            Ok(body) => {
                let next = self.step.transition(WizardEvent::SubmissionSucceeded)?;
                self.drafts = ExchangeDrafts::default();
                self.offered_form = FormState::default();
                self.expected_form = FormState::default();
                self.terms_accepted = false;
                self.enter(next);
                self.reset_at = Some(Instant::now() + self.config.reset_delay);
                info!("exchange offer submitted");
                Ok(body)
            }
            Err(e) => {
                error!("Exchange submission failed: {e}");
                let next = self.step.transition(WizardEvent::SubmissionFailed)?;
                self.step = next;
                Err(e.into())
            }
        }
    }

    /// Cancel a scheduled return to step 0. Returns whether one was pending.
    pub fn cancel_reset(&mut self) -> bool {
        self.reset_at.take().is_some()
    }

    /// Apply the scheduled return to step 0 if it is due at `now`.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(at) if at <= now => {
                self.reset_at = None;
                match self.step.transition(WizardEvent::ResetElapsed) {
                    Ok(next) => {
                        self.enter(next);
                        true
                    }
                    Err(e) => {
                        debug!("scheduled reset ignored: {e}");
                        false
                    }
                }
            }
            _ => false,
        }
    }

    /// Wait for the scheduled reset and apply it, unless `cancel` fires
    /// first (which also drops the schedule).
    pub async fn run_reset_timer(&mut self, cancel: CancellationToken) -> bool {
        let Some(deadline) = self.reset_at else {
            return false;
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                self.reset_at = None;
                debug!("scheduled reset cancelled");
                false
            }
            _ = tokio::time::sleep_until(deadline) => self.tick(Instant::now()),
        }
    }

    fn enter(&mut self, next: WizardStep) {
        info!(from = ?self.step, to = ?next, "wizard step changed");
        self.step = next;
        self.previews = PreviewCache::new(self.previews.epoch() + 1);
    }
}

impl Default for WizardController {
    fn default() -> Self {
        Self::new(WizardConfig::default())
    }
}
