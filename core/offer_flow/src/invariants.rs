#![allow(dead_code)]

use crate::types::{Offer, MAX_IMAGE_SLOTS};

/// A percentage is only carried when the deposit decision is `yes`.
pub fn assert_deposit_consistent<F>(offer: &Offer<F>) {
    let mc = &offer.material_conditions;
    if !mc.deposit_required() {
        assert!(
            mc.deposit_payment.percentage.is_none(),
            "deposit percentage {:?} present while decision is {:?}",
            mc.deposit_payment.percentage,
            mc.decision
        );
    }
}

/// Channel details are only carried for allowed channels.
pub fn assert_channels_consistent<F>(offer: &Offer<F>) {
    let dc = &offer.delivery_conditions;
    if !dc.pickup.is_allowed() {
        assert!(dc.pickup.details.is_none(), "pickup details on a closed channel");
    }
    if !dc.delivery.is_allowed() {
        assert!(
            dc.delivery.details.is_none(),
            "delivery details on a closed channel"
        );
    }
}

pub fn assert_image_slots_bounded<F>(offer: &Offer<F>) {
    assert!(
        offer.images.len() <= MAX_IMAGE_SLOTS,
        "{} image slots exceed the maximum of {}",
        offer.images.len(),
        MAX_IMAGE_SLOTS
    );
}

pub fn assert_dates_ordered<F>(offer: &Offer<F>) {
    if let (Some(start), Some(end)) = (offer.start_date, offer.end_date) {
        assert!(end >= start, "end date {end} precedes start date {start}");
    }
}

/// Every invariant a submitted record must satisfy.
pub fn assert_all_invariants<F>(offer: &Offer<F>) {
    assert_deposit_consistent(offer);
    assert_channels_consistent(offer);
    assert_image_slots_bounded(offer);
    assert_dates_ordered(offer);
}
