//! Shared fixtures for the crate's unit tests.

use chrono::NaiveDate;

use crate::files::FileAttachment;
use crate::types::{
    ExchangeDrafts, FormOfExchange, OfferDraft, OfferType, PaymentForm, PaymentType,
    ProductStatus, YesNo,
};

/// A file whose declared size is `size`, with a few bytes of content.
pub fn file(name: &str, mime: &str, size: u64) -> FileAttachment {
    FileAttachment {
        name: name.to_string(),
        mime_type: mime.to_string(),
        size,
        bytes: b"\x89PNG-ish".to_vec(),
    }
}

/// The "Bike" offer: every required field filled, deposit declined, both
/// delivery channels disabled, one image and one attachment.
pub fn valid_draft() -> OfferDraft {
    let mut draft = OfferDraft::default();
    draft.zone_one_banner = Some(file("banner.png", "image/png", 2048));
    draft.title = "Bike".into();
    draft.images = vec![Some(file("bike.jpg", "image/jpeg", 4096)), None, None];
    draft.offer_type = Some(OfferType::Good);
    draft.category = "Electronics".into();
    draft.subcategory = "Accessories".into();
    draft.featured_product_status = Some(ProductStatus::New);
    draft.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
    draft.end_date = NaiveDate::from_ymd_opt(2024, 1, 10);
    draft.form_of_exchange = Some(FormOfExchange::Exchange);
    draft.material_conditions.estimated_value = Some(50.0);
    draft.material_conditions.decision = Some(YesNo::No);
    draft.guarantees.money_back_guarantee = Some(YesNo::Yes);
    draft.guarantees.satisfaction_guarantee = Some(YesNo::No);
    draft.payment_details.desired_payment_form = Some(PaymentForm::ExchangeSum);
    draft.payment_details.desired_payment_type = Some(PaymentType::HandToHand);
    draft.delivery_conditions.pickup.allowed = Some(YesNo::No);
    draft.delivery_conditions.delivery.allowed = Some(YesNo::No);
    draft.geolocation.campus = "Main".into();
    draft.geolocation.country = "X".into();
    draft.other_special_conditions.uploaded_files =
        vec![file("terms.pdf", "application/pdf", 1024)];
    draft
}

/// A valid pair where the expected side asks for a deposit and a pickup.
pub fn valid_drafts() -> ExchangeDrafts {
    let mut expected = valid_draft();
    expected.title = "Laptop stand".into();
    expected.zone_one_banner = Some(file("wanted.png", "image/png", 1024));
    expected.images = vec![None, Some(file("stand.png", "image/png", 512)), None];
    expected.material_conditions.decision = Some(YesNo::Yes);
    expected.material_conditions.deposit_payment.percentage = Some(20.0);
    expected.delivery_conditions.pickup.allowed = Some(YesNo::Yes);
    let pickup = expected.delivery_conditions.pickup.details_mut();
    pickup.address = "1 Campus Road".into();
    pickup.country = "X".into();
    pickup.city = "Y".into();
    pickup.campus = "Main".into();
    expected.other_special_conditions.uploaded_files = vec![
        file("manual.docx", crate::files::ATTACHMENT_MIME_TYPES[4], 2048),
        file("photo.jpg", "image/jpeg", 2048),
    ];
    ExchangeDrafts {
        offered: valid_draft(),
        expected,
    }
}
