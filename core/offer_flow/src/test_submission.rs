use crate::invariants::assert_all_invariants;
use crate::payload::{assemble, describe, PartBody, UploadLayout};
use crate::testutil::{valid_draft, valid_drafts};
use crate::types::{ExchangeDrafts, OfferDetails, Side, YesNo};
use crate::validation::validate;

fn decode(json: &str) -> OfferDetails {
    serde_json::from_str(json).unwrap()
}

#[test]
fn details_parts_decode_to_the_described_records() {
    let drafts = valid_drafts();
    let layout = UploadLayout::default();
    let payload = assemble(&drafts, &layout).unwrap();

    for side in Side::ALL {
        let decoded = decode(payload.details_json(side).unwrap());
        assert_eq!(decoded, describe(drafts.side(side), &layout));
        assert_all_invariants(&decoded);
        // The backend re-checks the decoded record with the same rules.
        validate(&decoded).unwrap();
    }
}

#[test]
fn bike_offer_scenario() {
    let drafts = ExchangeDrafts {
        offered: valid_draft(),
        expected: valid_drafts().expected,
    };
    let payload = assemble(&drafts, &UploadLayout::default()).unwrap();
    let offered = decode(payload.details_json(Side::Offered).unwrap());

    assert_eq!(offered.title, "Bike");
    assert_eq!(
        offered.zone_one_banner.as_deref(),
        Some("/uploads/banner/banner.png")
    );
    assert_eq!(offered.material_conditions.decision, Some(YesNo::No));
    assert_eq!(offered.material_conditions.deposit_payment.percentage, None);
    assert!(offered.delivery_conditions.pickup.details.is_none());
    assert!(offered.delivery_conditions.delivery.details.is_none());

    let expected = decode(payload.details_json(Side::Expected).unwrap());
    assert_eq!(
        expected.material_conditions.deposit_payment.percentage,
        Some(20.0)
    );
    assert_eq!(
        expected.images,
        vec![None, Some("/uploads/images/stand.png".to_string()), None]
    );
    assert_eq!(
        expected
            .delivery_conditions
            .pickup
            .details
            .as_ref()
            .map(|d| d.campus.as_str()),
        Some("Main")
    );
}

#[test]
fn stale_branches_are_not_sent() {
    let mut drafts = valid_drafts();
    // Percentage and delivery details typed, then their branches switched off.
    let expected = &mut drafts.expected;
    expected.material_conditions.decision = Some(YesNo::No);
    expected.delivery_conditions.delivery.details_mut().city = "Z".into();

    let payload = assemble(&drafts, &UploadLayout::default()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(payload.details_json(Side::Expected).unwrap()).unwrap();
    assert!(json["materialConditions"]["depositPayment"]
        .get("percentage")
        .is_none());
    assert!(json["deliveryConditions"]["delivery"].get("details").is_none());
    assert_all_invariants(&decode(payload.details_json(Side::Expected).unwrap()));
}

#[test]
fn deposit_without_percentage_fails_validation() {
    let mut draft = valid_draft();
    draft.material_conditions.decision = Some(YesNo::Yes);
    let errors = validate(&draft).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.get("materialConditions.depositPayment.percentage"),
        Some("Deposit percentage is required")
    );
}

#[test]
fn file_parts_carry_original_names_and_types() {
    let payload = assemble(&valid_drafts(), &UploadLayout::default()).unwrap();
    let files: Vec<(&str, &str)> = payload
        .named("expectedUploadedFiles")
        .filter_map(|p| match &p.body {
            PartBody::File(f) => Some((f.name.as_str(), f.mime_type.as_str())),
            PartBody::Json(_) => None,
        })
        .collect();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].0, "manual.docx");
    assert_eq!(files[1], ("photo.jpg", "image/jpeg"));
}
