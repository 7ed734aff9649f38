//! Declarative field rules over an [`Offer`].
//!
//! Every rule is keyed by the field path its violation is reported under.
//! Conditional rules carry a [`Condition`]: the parent path they depend on
//! and the branch predicate that switches them on. When the predicate does
//! not hold the rule is skipped entirely, so an absent deposit percentage
//! with decision `no` is valid.
//!
//! Rules never mutate the document and numeric bounds are inclusive.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::files::{
    has_allowed_type, within_size_limit, FileAttachment, FileRef, ATTACHMENT_MIME_TYPES,
    BANNER_MIME_TYPES,
};
use crate::types::{Offer, MAX_IMAGE_SLOTS};

pub const FILE_TOO_LARGE: &str = "File size is too large. Maximum size is 5MB.";

pub type Check<F> = fn(&Offer<F>) -> Option<&'static str>;

/// Branch predicate tagged on the parent field that controls it.
pub struct Condition<F> {
    pub on: &'static str,
    pub holds: fn(&Offer<F>) -> bool,
}

pub enum RuleKind<F> {
    /// One check reported under the rule's path.
    Field(Check<F>),
    /// A check run on every element of a file collection, reported under
    /// `path[index]`.
    EachFile {
        files: fn(&Offer<F>) -> &[F],
        check: fn(&F) -> Option<&'static str>,
    },
}

pub struct Rule<F> {
    pub path: &'static str,
    pub when: Option<Condition<F>>,
    pub kind: RuleKind<F>,
}

impl<F> Rule<F> {
    fn field(path: &'static str, check: Check<F>) -> Self {
        Self {
            path,
            when: None,
            kind: RuleKind::Field(check),
        }
    }

    fn each_file(
        path: &'static str,
        files: fn(&Offer<F>) -> &[F],
        check: fn(&F) -> Option<&'static str>,
    ) -> Self {
        Self {
            path,
            when: None,
            kind: RuleKind::EachFile { files, check },
        }
    }

    fn when(mut self, on: &'static str, holds: fn(&Offer<F>) -> bool) -> Self {
        self.when = Some(Condition { on, holds });
        self
    }

    /// Whether the rule takes part in validating `offer`.
    pub fn applies(&self, offer: &Offer<F>) -> bool {
        self.when.as_ref().map_or(true, |c| (c.holds)(offer))
    }
}

/// Violations keyed by field path; only the first violation per path is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keep only the paths accepted by `keep`.
    pub fn filtered(mut self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.0.retain(|path, _| keep(path));
        self
    }

    /// Prefix every path with `prefix.` (used to report both sides at once).
    pub fn prefixed(self, prefix: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(path, msg)| (format!("{prefix}.{path}"), msg))
                .collect(),
        )
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (path, msg) in other.0 {
            self.insert(path, msg);
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s)", self.0.len())?;
        for (i, (path, msg)) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{path}: {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

// ─────────────────────────────────────────────────────────
// Rule table
// ─────────────────────────────────────────────────────────

/// The full rule set for one offer side.
pub fn rules<F: FileRef>() -> Vec<Rule<F>> {
    vec![
        Rule::field("zoneOneBanner", |o| match &o.zone_one_banner {
            None => Some("Zone One Banner is required"),
            Some(file) => check_banner(file),
        }),
        Rule::field("title", |o| required(&o.title, "Title is required")),
        Rule::field("images", |o| check_image_slots(&o.images)),
        Rule::field("offerType", |o| {
            present(&o.offer_type, "Offer Type is required")
        }),
        Rule::field("category", |o| required(&o.category, "Category is required")),
        Rule::field("subcategory", |o| {
            required(&o.subcategory, "Subcategory is required")
        }),
        Rule::field("featuredProductStatus", |o| {
            present(&o.featured_product_status, "Product Status is required")
        }),
        Rule::field("startDate", |o| {
            present(&o.start_date, "Start date is required")
        }),
        // Cross-field: reported under endDate, compared against startDate.
        Rule::field("endDate", |o| match (o.start_date, o.end_date) {
            (_, None) => Some("End date is required"),
            (Some(start), Some(end)) if end < start => Some("End date can't be before start date"),
            _ => None,
        }),
        Rule::field("formOfExchange", |o| {
            present(&o.form_of_exchange, "Form of Exchange is required")
        }),
        Rule::field("materialConditions.estimatedValue", |o| {
            non_negative(
                o.material_conditions.estimated_value,
                "Estimated value is required",
                "Value cannot be negative",
            )
        }),
        Rule::field("materialConditions.decision", |o| {
            present(&o.material_conditions.decision, "Decision is required")
        }),
        Rule::field("materialConditions.depositPayment.percentage", |o| {
            match o.material_conditions.deposit_payment.percentage {
                None => Some("Deposit percentage is required"),
                Some(p) if !p.is_finite() => Some("Deposit percentage must be a number"),
                Some(p) if p < 0.0 => Some("Percentage cannot be less than 0"),
                Some(p) if p > 100.0 => Some("Percentage cannot exceed 100"),
                Some(_) => None,
            }
        })
        .when("materialConditions.decision", |o| {
            o.material_conditions.deposit_required()
        }),
        Rule::field("guarantees.moneyBackGuarantee", |o| {
            present(
                &o.guarantees.money_back_guarantee,
                "Money back guarantee is required",
            )
        }),
        Rule::field("guarantees.satisfactionGuarantee", |o| {
            present(
                &o.guarantees.satisfaction_guarantee,
                "Satisfaction guarantee is required",
            )
        }),
        Rule::field("paymentDetails.desiredPaymentForm", |o| {
            present(
                &o.payment_details.desired_payment_form,
                "Payment form is required",
            )
        }),
        Rule::field("paymentDetails.desiredPaymentType", |o| {
            present(
                &o.payment_details.desired_payment_type,
                "Payment type is required",
            )
        }),
        Rule::field("deliveryConditions.pickup.allowed", |o| {
            present(
                &o.delivery_conditions.pickup.allowed,
                "Pickup allowed is required",
            )
        }),
        Rule::field("deliveryConditions.pickup.details.address", |o| {
            pickup_text(o, |d| &d.address, "Address is required")
        })
        .when("deliveryConditions.pickup.allowed", pickup_allowed),
        Rule::field("deliveryConditions.pickup.details.country", |o| {
            pickup_text(o, |d| &d.country, "Country is required")
        })
        .when("deliveryConditions.pickup.allowed", pickup_allowed),
        Rule::field("deliveryConditions.pickup.details.city", |o| {
            pickup_text(o, |d| &d.city, "City is required")
        })
        .when("deliveryConditions.pickup.allowed", pickup_allowed),
        Rule::field("deliveryConditions.pickup.details.campus", |o| {
            pickup_text(o, |d| &d.campus, "Campus is required")
        })
        .when("deliveryConditions.pickup.allowed", pickup_allowed),
        Rule::field("deliveryConditions.delivery.allowed", |o| {
            present(
                &o.delivery_conditions.delivery.allowed,
                "Delivery allowed is required",
            )
        }),
        Rule::field("deliveryConditions.delivery.details.cost", |o| {
            let cost = o
                .delivery_conditions
                .delivery
                .details
                .as_ref()
                .and_then(|d| d.cost);
            non_negative(cost, "Cost is required", "Invalid cost")
        })
        .when("deliveryConditions.delivery.allowed", delivery_allowed),
        Rule::field("deliveryConditions.delivery.details.country", |o| {
            delivery_text(o, |d| &d.country, "Country is required")
        })
        .when("deliveryConditions.delivery.allowed", delivery_allowed),
        Rule::field("deliveryConditions.delivery.details.city", |o| {
            delivery_text(o, |d| &d.city, "City is required")
        })
        .when("deliveryConditions.delivery.allowed", delivery_allowed),
        Rule::field("geolocation.campus", |o| {
            required(&o.geolocation.campus, "Campus location is required")
        }),
        Rule::field("geolocation.country", |o| {
            required(&o.geolocation.country, "Country is required")
        }),
        Rule::field("otherSpecialConditions.uploadedFiles", |o| {
            if o.other_special_conditions.uploaded_files.is_empty() {
                Some("At least one file is required")
            } else {
                None
            }
        }),
        Rule::each_file(
            "otherSpecialConditions.uploadedFiles",
            |o| o.other_special_conditions.uploaded_files.as_slice(),
            check_attachment,
        ),
    ]
}

/// Validate one offer side against [`rules`].
pub fn validate<F: FileRef>(offer: &Offer<F>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for rule in rules::<F>() {
        if !rule.applies(offer) {
            continue;
        }
        match rule.kind {
            RuleKind::Field(check) => {
                if let Some(msg) = check(offer) {
                    errors.insert(rule.path, msg);
                }
            }
            RuleKind::EachFile { files, check } => {
                for (i, file) in files(offer).iter().enumerate() {
                    if let Some(msg) = check(file) {
                        errors.insert(format!("{}[{i}]", rule.path), msg);
                    }
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Paths of the rules switched on or off by `parent`.
pub fn dependents_of(parent: &str) -> Vec<&'static str> {
    rules::<FileAttachment>()
        .into_iter()
        .filter(|rule| rule.when.as_ref().is_some_and(|c| c.on == parent))
        .map(|rule| rule.path)
        .collect()
}

/// Type and size check for a banner file.
pub fn check_banner(file: &impl FileRef) -> Option<&'static str> {
    if !has_allowed_type(file, BANNER_MIME_TYPES) {
        Some("Unsupported file format. Only images are allowed.")
    } else if !within_size_limit(file) {
        Some(FILE_TOO_LARGE)
    } else {
        None
    }
}

/// Type and size check for one special-conditions attachment.
pub fn check_attachment(file: &impl FileRef) -> Option<&'static str> {
    if !has_allowed_type(file, ATTACHMENT_MIME_TYPES) {
        Some("Unsupported file format. Only images or documents are allowed.")
    } else if !within_size_limit(file) {
        Some(FILE_TOO_LARGE)
    } else {
        None
    }
}

fn check_image_slots<F>(slots: &[Option<F>]) -> Option<&'static str> {
    if slots.len() > MAX_IMAGE_SLOTS {
        Some("No more than 3 images are allowed")
    } else if slots.iter().all(Option::is_none) {
        Some("At least one image is required")
    } else {
        None
    }
}

fn required(value: &str, msg: &'static str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some(msg)
    } else {
        None
    }
}

fn present<T>(value: &Option<T>, msg: &'static str) -> Option<&'static str> {
    if value.is_none() {
        Some(msg)
    } else {
        None
    }
}

fn non_negative(
    value: Option<f64>,
    missing: &'static str,
    negative: &'static str,
) -> Option<&'static str> {
    match value {
        None => Some(missing),
        Some(v) if !v.is_finite() => Some(missing),
        Some(v) if v < 0.0 => Some(negative),
        Some(_) => None,
    }
}

fn pickup_allowed<F>(o: &Offer<F>) -> bool {
    o.delivery_conditions.pickup.is_allowed()
}

fn delivery_allowed<F>(o: &Offer<F>) -> bool {
    o.delivery_conditions.delivery.is_allowed()
}

fn pickup_text<F>(
    o: &Offer<F>,
    field: fn(&crate::types::PickupDetails) -> &String,
    msg: &'static str,
) -> Option<&'static str> {
    let value = o
        .delivery_conditions
        .pickup
        .details
        .as_ref()
        .map_or("", |d| field(d).as_str());
    required(value, msg)
}

fn delivery_text<F>(
    o: &Offer<F>,
    field: fn(&crate::types::DeliveryDetails) -> &String,
    msg: &'static str,
) -> Option<&'static str> {
    let value = o
        .delivery_conditions
        .delivery
        .details
        .as_ref()
        .map_or("", |d| field(d).as_str());
    required(value, msg)
}
