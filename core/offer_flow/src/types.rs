//! # Types
//!
//! The offer document shared by the wizard, the submission payload and the
//! persisted exchange record.
//!
//! ## File representation
//!
//! [`Offer`] is generic over how a file is held:
//!
//! - [`OfferDraft`] = `Offer<FileAttachment>`: the in-memory document the
//!   wizard mutates; files carry their bytes and metadata.
//! - [`OfferDetails`] = `Offer<String>`: the structured record sent as the
//!   `*Details` JSON part and stored by the backend; every file is replaced
//!   by its storage path.
//!
//! [`Offer::map_files`] converts one into the other without touching any
//! non-file field.
//!
//! ## Conditional blocks
//!
//! The deposit percentage only means something when the deposit decision is
//! `yes`, and a delivery channel's details only when that channel is
//! allowed. Drafts keep whatever the user typed; [`Offer::normalized`] drops
//! the inactive branches before a record leaves the client.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::files::{FileAttachment, FileKind};

/// Number of image slots a fresh draft starts with (and the maximum allowed).
pub const MAX_IMAGE_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferType {
    Good,
    Service,
}

/// Condition of the featured product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    New,
    GoodCondition,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormOfExchange {
    Exchange,
    #[serde(rename = "Classic Sale")]
    ClassicSale,
    Auction,
    Donation,
}

/// Answer to every yes/no question of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn is_yes(self) -> bool {
        self == YesNo::Yes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentForm {
    ExchangeSum,
    ExchangeService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    HandToHand,
    BeforeDelivery,
    AfterDelivery,
}

/// One side of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Offer<F> {
    pub zone_one_banner: Option<F>,
    pub title: String,
    /// Image slots; an empty slot serializes as `null`.
    pub images: Vec<Option<F>>,
    pub offer_type: Option<OfferType>,
    pub category: String,
    pub subcategory: String,
    pub featured_product_status: Option<ProductStatus>,
    pub additional_description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub form_of_exchange: Option<FormOfExchange>,
    pub material_conditions: MaterialConditions,
    pub guarantees: Guarantees,
    pub payment_details: PaymentDetails,
    pub delivery_conditions: DeliveryConditions,
    pub geolocation: Geolocation,
    pub other_special_conditions: OtherSpecialConditions<F>,
}

pub type OfferDraft = Offer<FileAttachment>;
pub type OfferDetails = Offer<String>;

impl<F> Default for Offer<F> {
    fn default() -> Self {
        Self {
            zone_one_banner: None,
            title: String::new(),
            images: (0..MAX_IMAGE_SLOTS).map(|_| None).collect(),
            offer_type: None,
            category: String::new(),
            subcategory: String::new(),
            featured_product_status: None,
            additional_description: String::new(),
            start_date: None,
            end_date: None,
            form_of_exchange: None,
            material_conditions: MaterialConditions::default(),
            guarantees: Guarantees::default(),
            payment_details: PaymentDetails::default(),
            delivery_conditions: DeliveryConditions::default(),
            geolocation: Geolocation::default(),
            other_special_conditions: OtherSpecialConditions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialConditions {
    pub estimated_value: Option<f64>,
    /// Whether a deposit is required.
    pub decision: Option<YesNo>,
    pub deposit_payment: DepositPayment,
    pub other_contingent_coverage_required: String,
}

impl MaterialConditions {
    pub fn deposit_required(&self) -> bool {
        self.decision.is_some_and(YesNo::is_yes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositPayment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guarantees {
    pub money_back_guarantee: Option<YesNo>,
    pub satisfaction_guarantee: Option<YesNo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentDetails {
    pub desired_payment_form: Option<PaymentForm>,
    pub desired_payment_type: Option<PaymentType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConditions {
    pub pickup: Channel<PickupDetails>,
    pub delivery: Channel<DeliveryDetails>,
}

/// A delivery channel that can be switched on or off independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel<D> {
    pub allowed: Option<YesNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<D>,
}

impl<D> Default for Channel<D> {
    fn default() -> Self {
        Self {
            allowed: None,
            details: None,
        }
    }
}

impl<D: Default> Channel<D> {
    pub fn is_allowed(&self) -> bool {
        self.allowed.is_some_and(YesNo::is_yes)
    }

    /// Details block, created empty on first write.
    pub fn details_mut(&mut self) -> &mut D {
        self.details.get_or_insert_with(D::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupDetails {
    pub address: String,
    pub country: String,
    pub city: String,
    pub campus: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryDetails {
    pub cost: Option<f64>,
    pub country: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geolocation {
    pub campus: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtherSpecialConditions<F> {
    pub additional_description: String,
    pub uploaded_files: Vec<F>,
}

impl<F> Default for OtherSpecialConditions<F> {
    fn default() -> Self {
        Self {
            additional_description: String::new(),
            uploaded_files: Vec::new(),
        }
    }
}

impl<F> Offer<F> {
    /// Rebuild the document with every file converted by `f`; all other
    /// fields are copied unchanged.
    pub fn map_files<G>(&self, mut f: impl FnMut(FileKind, &F) -> G) -> Offer<G> {
        Offer {
            zone_one_banner: self
                .zone_one_banner
                .as_ref()
                .map(|file| f(FileKind::Banner, file)),
            title: self.title.clone(),
            images: self
                .images
                .iter()
                .map(|slot| slot.as_ref().map(|file| f(FileKind::Image, file)))
                .collect(),
            offer_type: self.offer_type,
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            featured_product_status: self.featured_product_status,
            additional_description: self.additional_description.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            form_of_exchange: self.form_of_exchange,
            material_conditions: self.material_conditions.clone(),
            guarantees: self.guarantees.clone(),
            payment_details: self.payment_details.clone(),
            delivery_conditions: self.delivery_conditions.clone(),
            geolocation: self.geolocation.clone(),
            other_special_conditions: OtherSpecialConditions {
                additional_description: self
                    .other_special_conditions
                    .additional_description
                    .clone(),
                uploaded_files: self
                    .other_special_conditions
                    .uploaded_files
                    .iter()
                    .map(|file| f(FileKind::Attachment, file))
                    .collect(),
            },
        }
    }

    /// Drop the branches whose controlling flag is not `yes`.
    pub fn normalized(mut self) -> Self {
        if !self.material_conditions.deposit_required() {
            self.material_conditions.deposit_payment.percentage = None;
        }
        let delivery = &mut self.delivery_conditions;
        if !delivery.pickup.is_allowed() {
            delivery.pickup.details = None;
        }
        if !delivery.delivery.is_allowed() {
            delivery.delivery.details = None;
        }
        self
    }

    /// Populated image slots, in slot order.
    pub fn populated_images(&self) -> impl Iterator<Item = &F> {
        self.images.iter().flatten()
    }

    /// Every file in the document with its kind: banner, populated images,
    /// then attachments.
    pub fn files(&self) -> impl Iterator<Item = (FileKind, &F)> {
        let banner = self.zone_one_banner.iter().map(|f| (FileKind::Banner, f));
        let images = self.populated_images().map(|f| (FileKind::Image, f));
        let attachments = self
            .other_special_conditions
            .uploaded_files
            .iter()
            .map(|f| (FileKind::Attachment, f));
        banner.chain(images).chain(attachments)
    }
}

/// Which half of the exchange a document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// What the student offers.
    Offered,
    /// What the student expects in return.
    Expected,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Offered, Side::Expected];

    /// Prefix used for this side's multipart part names.
    pub fn part_prefix(self) -> &'static str {
        match self {
            Side::Offered => "offered",
            Side::Expected => "expected",
        }
    }
}

/// Both in-progress documents of one wizard session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeDrafts {
    pub offered: OfferDraft,
    pub expected: OfferDraft,
}

impl ExchangeDrafts {
    pub fn side(&self, side: Side) -> &OfferDraft {
        match side {
            Side::Offered => &self.offered,
            Side::Expected => &self.expected,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut OfferDraft {
        match side {
            Side::Offered => &mut self.offered,
            Side::Expected => &mut self.expected,
        }
    }
}
