use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::ExchangeTransport;
use crate::errors::{SubmitError, WizardError};
use crate::form_state::FieldUpdate;
use crate::payload::SubmissionPayload;
use crate::preview::PreviewSlot;
use crate::testutil::{file, valid_draft, valid_drafts};
use crate::types::{ExchangeDrafts, OfferDraft, Side, YesNo};
use crate::wizard::{WizardConfig, WizardController, WizardStep};

// ───────────────────────────────────────────────────────────
// Helpers
// ───────────────────────────────────────────────────────────

struct MockTransport {
    calls: AtomicUsize,
    fail: bool,
}

impl MockTransport {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExchangeTransport for MockTransport {
    async fn create(&self, payload: &SubmissionPayload) -> Result<Value, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SubmitError::Rejected {
                status: 500,
                body: "database unavailable".into(),
            });
        }
        Ok(json!({ "id": 1, "status": "pending", "parts": payload.len() }))
    }
}

/// The edits a user would make to arrive at `draft` from an empty form.
fn updates_for(draft: &OfferDraft) -> Vec<FieldUpdate> {
    let mc = &draft.material_conditions;
    let dc = &draft.delivery_conditions;
    let mut updates = vec![
        FieldUpdate::ZoneOneBanner(draft.zone_one_banner.clone()),
        FieldUpdate::Title(draft.title.clone()),
    ];
    for (slot, file) in draft.images.iter().enumerate() {
        updates.push(FieldUpdate::Image {
            slot,
            file: file.clone(),
        });
    }
    updates.extend([
        FieldUpdate::OfferType(draft.offer_type),
        FieldUpdate::Category(draft.category.clone()),
        FieldUpdate::Subcategory(draft.subcategory.clone()),
        FieldUpdate::ProductStatus(draft.featured_product_status),
        FieldUpdate::AdditionalDescription(draft.additional_description.clone()),
        FieldUpdate::StartDate(draft.start_date),
        FieldUpdate::EndDate(draft.end_date),
        FieldUpdate::FormOfExchange(draft.form_of_exchange),
        FieldUpdate::EstimatedValue(mc.estimated_value),
        FieldUpdate::DepositDecision(mc.decision),
        FieldUpdate::DepositPercentage(mc.deposit_payment.percentage),
        FieldUpdate::OtherCoverage(mc.other_contingent_coverage_required.clone()),
        FieldUpdate::MoneyBackGuarantee(draft.guarantees.money_back_guarantee),
        FieldUpdate::SatisfactionGuarantee(draft.guarantees.satisfaction_guarantee),
        FieldUpdate::PaymentForm(draft.payment_details.desired_payment_form),
        FieldUpdate::PaymentType(draft.payment_details.desired_payment_type),
        FieldUpdate::PickupAllowed(dc.pickup.allowed),
    ]);
    if let Some(p) = &dc.pickup.details {
        updates.extend([
            FieldUpdate::PickupAddress(p.address.clone()),
            FieldUpdate::PickupCountry(p.country.clone()),
            FieldUpdate::PickupCity(p.city.clone()),
            FieldUpdate::PickupCampus(p.campus.clone()),
        ]);
    }
    updates.push(FieldUpdate::DeliveryAllowed(dc.delivery.allowed));
    if let Some(d) = &dc.delivery.details {
        updates.extend([
            FieldUpdate::DeliveryCost(d.cost),
            FieldUpdate::DeliveryCountry(d.country.clone()),
            FieldUpdate::DeliveryCity(d.city.clone()),
        ]);
    }
    updates.extend([
        FieldUpdate::Campus(draft.geolocation.campus.clone()),
        FieldUpdate::Country(draft.geolocation.country.clone()),
        FieldUpdate::SpecialDescription(
            draft
                .other_special_conditions
                .additional_description
                .clone(),
        ),
    ]);
    for file in &draft.other_special_conditions.uploaded_files {
        updates.push(FieldUpdate::AddAttachment(file.clone()));
    }
    updates
}

fn fill(ctl: &mut WizardController, draft: &OfferDraft) {
    for update in updates_for(draft) {
        ctl.apply(update).unwrap();
    }
}

/// A controller on the final details step with both sides filled in.
fn ready_to_submit() -> (WizardController, ExchangeDrafts) {
    let drafts = valid_drafts();
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();
    fill(&mut ctl, &drafts.offered);
    ctl.advance().unwrap();
    fill(&mut ctl, &drafts.expected);
    (ctl, drafts)
}

// ───────────────────────────────────────────────────────────
// Navigation
// ───────────────────────────────────────────────────────────

#[test]
fn introduction_requires_terms() {
    let mut ctl = WizardController::default();
    assert_eq!(ctl.step(), WizardStep::Introduction);
    assert!(matches!(ctl.advance(), Err(WizardError::TermsNotAccepted)));

    ctl.accept_terms(true).unwrap();
    assert_eq!(ctl.advance().unwrap(), WizardStep::OfferedDetails);
    assert!(matches!(
        ctl.accept_terms(false),
        Err(WizardError::NotEditable(WizardStep::OfferedDetails))
    ));
}

#[test]
fn introduction_has_no_editable_side() {
    let mut ctl = WizardController::default();
    let err = ctl.apply(FieldUpdate::Title("Bike".into())).unwrap_err();
    assert!(matches!(
        err,
        WizardError::NotEditable(WizardStep::Introduction)
    ));
}

#[test]
fn invalid_offered_side_blocks_advance() {
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();

    assert!(ctl.visible_errors().is_empty());
    let err = ctl.advance().unwrap_err();
    let WizardError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert_eq!(errors.get("title"), Some("Title is required"));
    assert_eq!(ctl.step(), WizardStep::OfferedDetails);
    assert!(ctl.form_state(Side::Offered).submit_attempted());
    assert!(!ctl.visible_errors().is_empty());
}

#[test]
fn edits_land_on_the_current_side_only() {
    let (ctl, drafts) = ready_to_submit();
    assert_eq!(ctl.step(), WizardStep::ExpectedRequirements);
    assert_eq!(ctl.drafts().offered, drafts.offered);
    assert_eq!(ctl.drafts().expected, drafts.expected);
}

#[test]
fn touched_fields_show_errors_before_submit() {
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();
    ctl.apply(FieldUpdate::Title(String::new())).unwrap();
    ctl.apply(FieldUpdate::Category("Electronics".into()))
        .unwrap();

    let visible = ctl.visible_errors();
    assert_eq!(visible.len(), 1);
    assert!(visible.contains("title"));
}

#[test]
fn deposit_branch_is_per_side() {
    let (mut ctl, _) = ready_to_submit();
    // The offered side declined a deposit; the expected side asks for one.
    ctl.apply(FieldUpdate::DepositPercentage(None)).unwrap();
    let errors = ctl.visible_errors();
    assert_eq!(
        errors.get("materialConditions.depositPayment.percentage"),
        Some("Deposit percentage is required")
    );

    ctl.apply(FieldUpdate::DepositDecision(Some(YesNo::No)))
        .unwrap();
    assert!(ctl.visible_errors().is_empty());
}

// ───────────────────────────────────────────────────────────
// Previews
// ───────────────────────────────────────────────────────────

#[tokio::test]
async fn preview_is_stored_for_the_current_step() {
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();

    let job = ctl
        .apply(FieldUpdate::ZoneOneBanner(Some(file("b.png", "image/png", 8))))
        .unwrap()
        .expect("banner edits request a preview");
    assert!(ctl.finish_preview(job.run().await));
    assert!(ctl
        .previews()
        .display(PreviewSlot::Banner)
        .starts_with("data:image/png;base64,"));

    ctl.apply(FieldUpdate::ZoneOneBanner(None)).unwrap();
    assert_eq!(
        ctl.previews().display(PreviewSlot::Banner),
        crate::preview::PLACEHOLDER_IMAGE
    );
}

#[tokio::test]
async fn preview_finishing_after_a_step_change_is_dropped() {
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();
    fill(&mut ctl, &valid_draft());

    let job = ctl
        .apply(FieldUpdate::Image {
            slot: 2,
            file: Some(file("late.png", "image/png", 8)),
        })
        .unwrap()
        .unwrap();
    ctl.advance().unwrap();

    assert!(!ctl.finish_preview(job.run().await));
    assert!(ctl.previews().get(PreviewSlot::Image(2)).is_none());
}

// ───────────────────────────────────────────────────────────
// Submission
// ───────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_submission_clears_drafts_and_schedules_reset() {
    let (mut ctl, _) = ready_to_submit();
    let transport = MockTransport::ok();

    let body = ctl.submit(&transport).await.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(transport.calls(), 1);
    assert_eq!(ctl.step(), WizardStep::Submitted);
    assert_eq!(*ctl.drafts(), ExchangeDrafts::default());
    assert!(!ctl.terms_accepted());
    assert!(ctl.reset_deadline().is_some());
}

#[tokio::test]
async fn second_submission_is_rejected_without_a_request() {
    let (mut ctl, _) = ready_to_submit();
    let transport = MockTransport::ok();
    ctl.submit(&transport).await.unwrap();

    let err = ctl.submit(&transport).await.unwrap_err();
    assert!(matches!(
        err,
        WizardError::InvalidTransition {
            from: WizardStep::Submitted,
            ..
        }
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn failed_submission_keeps_everything() {
    let (mut ctl, drafts) = ready_to_submit();
    let transport = MockTransport::failing();

    let err = ctl.submit(&transport).await.unwrap_err();
    assert!(matches!(
        err,
        WizardError::Submission(SubmitError::Rejected { status: 500, .. })
    ));
    assert_eq!(ctl.step(), WizardStep::ExpectedRequirements);
    assert_eq!(*ctl.drafts(), drafts);
    assert!(ctl.reset_deadline().is_none());

    // The user may retry.
    let transport = MockTransport::ok();
    ctl.submit(&transport).await.unwrap();
    assert_eq!(ctl.step(), WizardStep::Submitted);
}

#[tokio::test]
async fn invalid_expected_side_is_not_sent() {
    let mut ctl = WizardController::default();
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();
    fill(&mut ctl, &valid_draft());
    ctl.advance().unwrap();

    let transport = MockTransport::ok();
    let err = ctl.submit(&transport).await.unwrap_err();
    assert!(matches!(err, WizardError::Validation(_)));
    assert_eq!(transport.calls(), 0);
    assert!(ctl.form_state(Side::Expected).submit_attempted());
}

#[tokio::test]
async fn submit_is_only_available_on_the_last_details_step() {
    let mut ctl = WizardController::default();
    let transport = MockTransport::ok();
    assert!(matches!(
        ctl.submit(&transport).await,
        Err(WizardError::InvalidTransition { .. })
    ));
    assert_eq!(transport.calls(), 0);
}

// ───────────────────────────────────────────────────────────
// Scheduled reset
// ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reset_returns_to_introduction_after_delay() {
    let (mut ctl, _) = ready_to_submit();
    ctl.submit(&MockTransport::ok()).await.unwrap();

    assert!(!ctl.tick(Instant::now()));
    assert_eq!(ctl.step(), WizardStep::Submitted);

    let started = Instant::now();
    assert!(ctl.run_reset_timer(CancellationToken::new()).await);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(ctl.step(), WizardStep::Introduction);
    assert!(ctl.reset_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn reset_delay_is_configurable() {
    let drafts = valid_drafts();
    let mut ctl = WizardController::new(WizardConfig {
        reset_delay: Duration::from_millis(500),
        ..WizardConfig::default()
    });
    ctl.accept_terms(true).unwrap();
    ctl.advance().unwrap();
    fill(&mut ctl, &drafts.offered);
    ctl.advance().unwrap();
    fill(&mut ctl, &drafts.expected);
    ctl.submit(&MockTransport::ok()).await.unwrap();

    assert!(ctl.tick(Instant::now() + Duration::from_millis(500)));
    assert_eq!(ctl.step(), WizardStep::Introduction);
}

#[tokio::test]
async fn cancelled_reset_never_fires() {
    let (mut ctl, _) = ready_to_submit();
    ctl.submit(&MockTransport::ok()).await.unwrap();

    assert!(ctl.cancel_reset());
    assert!(!ctl.cancel_reset());
    assert!(!ctl.tick(Instant::now() + Duration::from_secs(60)));
    assert_eq!(ctl.step(), WizardStep::Submitted);
}

#[tokio::test]
async fn cancellation_token_stops_the_timer() {
    let (mut ctl, _) = ready_to_submit();
    ctl.submit(&MockTransport::ok()).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert!(!ctl.run_reset_timer(token).await);
    assert_eq!(ctl.step(), WizardStep::Submitted);
    assert!(ctl.reset_deadline().is_none());
}
