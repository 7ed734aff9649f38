//! Field updates and the per-step form projection.
//!
//! The wizard session owns the only copy of each offer document. Every user
//! input becomes one [`FieldUpdate`] applied to that copy; [`FormState`] is
//! what the validation layer derives from it (which fields were touched,
//! whether a submit was attempted) to decide which errors to show.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::errors::{Result, WizardError};
use crate::files::{FileAttachment, FileRef};
use crate::preview::PreviewSlot;
use crate::types::{
    FormOfExchange, Offer, OfferDraft, OfferType, PaymentForm, PaymentType, ProductStatus, YesNo,
};
use crate::validation::{rules, validate, FieldErrors};

/// One user edit of one field.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    ZoneOneBanner(Option<FileAttachment>),
    Title(String),
    Image {
        slot: usize,
        file: Option<FileAttachment>,
    },
    OfferType(Option<OfferType>),
    Category(String),
    Subcategory(String),
    ProductStatus(Option<ProductStatus>),
    AdditionalDescription(String),
    StartDate(Option<NaiveDate>),
    EndDate(Option<NaiveDate>),
    FormOfExchange(Option<FormOfExchange>),
    EstimatedValue(Option<f64>),
    DepositDecision(Option<YesNo>),
    DepositPercentage(Option<f64>),
    OtherCoverage(String),
    MoneyBackGuarantee(Option<YesNo>),
    SatisfactionGuarantee(Option<YesNo>),
    PaymentForm(Option<PaymentForm>),
    PaymentType(Option<PaymentType>),
    PickupAllowed(Option<YesNo>),
    PickupAddress(String),
    PickupCountry(String),
    PickupCity(String),
    PickupCampus(String),
    DeliveryAllowed(Option<YesNo>),
    DeliveryCost(Option<f64>),
    DeliveryCountry(String),
    DeliveryCity(String),
    Campus(String),
    Country(String),
    SpecialDescription(String),
    AddAttachment(FileAttachment),
    RemoveAttachment(usize),
}

/// Preview work implied by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewChange {
    Render(PreviewSlot, FileAttachment),
    Clear(PreviewSlot),
}

impl FieldUpdate {
    /// Field path the update writes, as used by validation.
    pub fn path(&self) -> &'static str {
        use FieldUpdate::*;
        match self {
            ZoneOneBanner(_) => "zoneOneBanner",
            Title(_) => "title",
            Image { .. } => "images",
            OfferType(_) => "offerType",
            Category(_) => "category",
            Subcategory(_) => "subcategory",
            ProductStatus(_) => "featuredProductStatus",
            AdditionalDescription(_) => "additionalDescription",
            StartDate(_) => "startDate",
            EndDate(_) => "endDate",
            FormOfExchange(_) => "formOfExchange",
            EstimatedValue(_) => "materialConditions.estimatedValue",
            DepositDecision(_) => "materialConditions.decision",
            DepositPercentage(_) => "materialConditions.depositPayment.percentage",
            OtherCoverage(_) => "materialConditions.otherContingentCoverageRequired",
            MoneyBackGuarantee(_) => "guarantees.moneyBackGuarantee",
            SatisfactionGuarantee(_) => "guarantees.satisfactionGuarantee",
            PaymentForm(_) => "paymentDetails.desiredPaymentForm",
            PaymentType(_) => "paymentDetails.desiredPaymentType",
            PickupAllowed(_) => "deliveryConditions.pickup.allowed",
            PickupAddress(_) => "deliveryConditions.pickup.details.address",
            PickupCountry(_) => "deliveryConditions.pickup.details.country",
            PickupCity(_) => "deliveryConditions.pickup.details.city",
            PickupCampus(_) => "deliveryConditions.pickup.details.campus",
            DeliveryAllowed(_) => "deliveryConditions.delivery.allowed",
            DeliveryCost(_) => "deliveryConditions.delivery.details.cost",
            DeliveryCountry(_) => "deliveryConditions.delivery.details.country",
            DeliveryCity(_) => "deliveryConditions.delivery.details.city",
            Campus(_) => "geolocation.campus",
            Country(_) => "geolocation.country",
            SpecialDescription(_) => "otherSpecialConditions.additionalDescription",
            AddAttachment(_) | RemoveAttachment(_) => "otherSpecialConditions.uploadedFiles",
        }
    }

    /// The preview this update asks for, if it touches a previewed file.
    pub fn preview_change(&self) -> Option<PreviewChange> {
        match self {
            FieldUpdate::ZoneOneBanner(Some(file)) => {
                Some(PreviewChange::Render(PreviewSlot::Banner, file.clone()))
            }
            FieldUpdate::ZoneOneBanner(None) => Some(PreviewChange::Clear(PreviewSlot::Banner)),
            FieldUpdate::Image {
                slot,
                file: Some(file),
            } => Some(PreviewChange::Render(PreviewSlot::Image(*slot), file.clone())),
            FieldUpdate::Image { slot, file: None } => {
                Some(PreviewChange::Clear(PreviewSlot::Image(*slot)))
            }
            _ => None,
        }
    }

    /// Write the value into `offer`. Out-of-range indices are rejected
    /// without modifying the document.
    pub fn apply(self, offer: &mut OfferDraft) -> Result<()> {
        use FieldUpdate::*;
        let mc = &mut offer.material_conditions;
        let dc = &mut offer.delivery_conditions;
        match self {
            ZoneOneBanner(file) => offer.zone_one_banner = file,
            Title(v) => offer.title = v,
            Image { slot, file } => {
                let target = offer.images.get_mut(slot).ok_or(WizardError::ImageSlot(slot))?;
                *target = file;
            }
            OfferType(v) => offer.offer_type = v,
            Category(v) => offer.category = v,
            Subcategory(v) => offer.subcategory = v,
            ProductStatus(v) => offer.featured_product_status = v,
            AdditionalDescription(v) => offer.additional_description = v,
            StartDate(v) => offer.start_date = v,
            EndDate(v) => offer.end_date = v,
            FormOfExchange(v) => offer.form_of_exchange = v,
            EstimatedValue(v) => mc.estimated_value = v,
            DepositDecision(v) => mc.decision = v,
            DepositPercentage(v) => mc.deposit_payment.percentage = v,
            OtherCoverage(v) => mc.other_contingent_coverage_required = v,
            MoneyBackGuarantee(v) => offer.guarantees.money_back_guarantee = v,
            SatisfactionGuarantee(v) => offer.guarantees.satisfaction_guarantee = v,
            PaymentForm(v) => offer.payment_details.desired_payment_form = v,
            PaymentType(v) => offer.payment_details.desired_payment_type = v,
            PickupAllowed(v) => dc.pickup.allowed = v,
            PickupAddress(v) => dc.pickup.details_mut().address = v,
            PickupCountry(v) => dc.pickup.details_mut().country = v,
            PickupCity(v) => dc.pickup.details_mut().city = v,
            PickupCampus(v) => dc.pickup.details_mut().campus = v,
            DeliveryAllowed(v) => dc.delivery.allowed = v,
            DeliveryCost(v) => dc.delivery.details_mut().cost = v,
            DeliveryCountry(v) => dc.delivery.details_mut().country = v,
            DeliveryCity(v) => dc.delivery.details_mut().city = v,
            Campus(v) => offer.geolocation.campus = v,
            Country(v) => offer.geolocation.country = v,
            SpecialDescription(v) => offer.other_special_conditions.additional_description = v,
            AddAttachment(file) => offer.other_special_conditions.uploaded_files.push(file),
            RemoveAttachment(index) => {
                let files = &mut offer.other_special_conditions.uploaded_files;
                if index >= files.len() {
                    return Err(WizardError::AttachmentIndex(index));
                }
                files.remove(index);
            }
        }
        Ok(())
    }
}

/// Touched fields and submit state of one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    touched: BTreeSet<String>,
    submit_attempted: bool,
}

impl FormState {
    /// Record that `path` was edited. When `path` controls conditional
    /// rules whose branch is now off, those dependents are untouched so that
    /// switching the branch back on starts from a clean slate.
    pub fn record<F: FileRef>(&mut self, path: &str, offer: &Offer<F>) {
        self.touched.insert(path.to_string());
        for rule in rules::<F>() {
            let Some(cond) = &rule.when else { continue };
            if cond.on == path && !(cond.holds)(offer) && self.touched.remove(rule.path) {
                debug!(dependent = rule.path, parent = path, "branch switched off");
            }
        }
    }

    pub fn is_touched(&self, path: &str) -> bool {
        self.touched.contains(path)
    }

    pub fn mark_submit_attempted(&mut self) {
        self.submit_attempted = true;
    }

    pub fn submit_attempted(&self) -> bool {
        self.submit_attempted
    }

    /// Errors to display: everything after a submit attempt, otherwise only
    /// those under touched fields (an indexed path like `files[2]` counts as
    /// touched when `files` is).
    pub fn visible_errors<F: FileRef>(&self, offer: &Offer<F>) -> FieldErrors {
        let Err(errors) = validate(offer) else {
            return FieldErrors::new();
        };
        if self.submit_attempted {
            return errors;
        }
        errors.filtered(|path| {
            self.touched.contains(path)
                || self.touched.iter().any(|t| {
                    path.strip_prefix(t.as_str())
                        .is_some_and(|rest| rest.starts_with('[') || rest.starts_with('.'))
                })
        })
    }
}
