//! Multipart intake for the creation endpoint.
//!
//! Reads the request parts into memory, then checks the whole exchange
//! before anything is stored:
//!
//! 1. every file part against the type and size limits of its group,
//! 2. each side's details record against the shared validation rules,
//! 3. every file path a record references against the uploaded parts.
//!
//! Problems are collected per field path and reported together.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use axum::extract::Multipart;
use offer_flow::files::{FileAttachment, FileKind};
use offer_flow::payload::{details_part_name, file_part_name, UploadLayout};
use offer_flow::validation::{check_attachment, check_banner, FILE_TOO_LARGE};
use offer_flow::{validate, FieldErrors, OfferDetails, Side};
use tracing::{debug, warn};

use crate::errors::{ApiError, Result};
use crate::storage::checked_file_name;

/// What a multipart part name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartName {
    File(Side, FileKind),
    Details(Side),
}

impl PartName {
    pub fn parse(name: &str) -> Option<Self> {
        for side in Side::ALL {
            if name == details_part_name(side) {
                return Some(PartName::Details(side));
            }
            for kind in FileKind::ALL {
                if name == file_part_name(side, kind) {
                    return Some(PartName::File(side, kind));
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub side: Side,
    pub kind: FileKind,
    pub file: FileAttachment,
}

/// Raw parts of one creation request.
#[derive(Debug, Default)]
pub struct ExchangeIntake {
    pub files: Vec<UploadedFile>,
    pub offered: Option<String>,
    pub expected: Option<String>,
}

/// An exchange that passed every check, with its records normalized.
#[derive(Debug)]
pub struct AcceptedExchange {
    pub offered: OfferDetails,
    pub expected: OfferDetails,
    /// Uploaded files referenced by the records.
    pub files: Vec<UploadedFile>,
}

/// Read every part of the request body.
pub async fn read_multipart(mut multipart: Multipart) -> Result<ExchangeIntake> {
    let mut intake = ExchangeIntake::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match PartName::parse(&name) {
            Some(PartName::File(side, kind)) => {
                let file_name = field
                    .file_name()
                    .ok_or_else(|| ApiError::BadRequest(format!("Part {name} is not a file")))?;
                let file_name = checked_file_name(file_name)?.to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                intake.files.push(UploadedFile {
                    side,
                    kind,
                    file: FileAttachment::new(file_name, mime_type, bytes.to_vec()),
                });
            }
            Some(PartName::Details(side)) => {
                let json = field.text().await?;
                match side {
                    Side::Offered => intake.offered = Some(json),
                    Side::Expected => intake.expected = Some(json),
                }
            }
            None => warn!("Ignoring unexpected part {name:?}"),
        }
    }

    debug!(files = intake.files.len(), "multipart body read");
    Ok(intake)
}

/// Type and size check for one uploaded file of `kind`.
fn check_upload(kind: FileKind, file: &FileAttachment, max_bytes: u64) -> Option<&'static str> {
    if file.size > max_bytes {
        return Some(FILE_TOO_LARGE);
    }
    match kind {
        FileKind::Banner => check_banner(file),
        FileKind::Attachment => check_attachment(file),
        FileKind::Image if !file.is_image() => {
            Some("Unsupported file format. Only images are allowed.")
        }
        FileKind::Image => None,
    }
}

impl ExchangeIntake {
    /// Run every check; on success the records are normalized and only the
    /// referenced uploads are kept.
    pub fn accept(self, layout: &UploadLayout, max_bytes: u64) -> Result<AcceptedExchange> {
        let mut errors = FieldErrors::new();

        let mut counters = HashMap::new();
        for upload in &self.files {
            let part = file_part_name(upload.side, upload.kind);
            let index = counters.entry(part.clone()).or_insert(0usize);
            if let Some(msg) = check_upload(upload.kind, &upload.file, max_bytes) {
                errors.insert(format!("{part}[{index}]"), msg);
            }
            *index += 1;
        }

        let offered = parse_details(Side::Offered, self.offered.as_deref(), &mut errors)?;
        let expected = parse_details(Side::Expected, self.expected.as_deref(), &mut errors)?;

        let mut referenced = vec![false; self.files.len()];
        for (side, details) in [(Side::Offered, &offered), (Side::Expected, &expected)] {
            let Some(details) = details else { continue };
            for (kind, path) in details.files() {
                let found = self.files.iter().position(|u| {
                    u.side == side && u.kind == kind && layout.path_for(kind, &u.file.name) == *path
                });
                match found {
                    Some(i) => referenced[i] = true,
                    None => errors.insert(
                        format!("{}.files", side.part_prefix()),
                        format!("No uploaded file for {path}"),
                    ),
                }
            }
        }

        // Both sides share one upload directory per kind.
        let mut by_path: HashMap<String, &FileAttachment> = HashMap::new();
        for (upload, _) in self.files.iter().zip(&referenced).filter(|(_, used)| **used) {
            let path = layout.path_for(upload.kind, &upload.file.name);
            match by_path.entry(path) {
                Entry::Occupied(first) if !same_contents(first.get(), &upload.file) => {
                    errors.insert(
                        format!("{}.files", upload.side.part_prefix()),
                        format!("Duplicate file name {} with different contents", first.key()),
                    );
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(&upload.file);
                }
            }
        }

        match (offered, expected) {
            (Some(offered), Some(expected)) if errors.is_empty() => {
                let files = self
                    .files
                    .into_iter()
                    .zip(referenced)
                    .filter_map(|(upload, used)| used.then_some(upload))
                    .collect();
                Ok(AcceptedExchange {
                    offered: offered.normalized(),
                    expected: expected.normalized(),
                    files,
                })
            }
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

fn same_contents(a: &FileAttachment, b: &FileAttachment) -> bool {
    a.mime_type == b.mime_type && a.bytes == b.bytes
}

/// Decode and validate one side's record. Malformed JSON is a bad request;
/// a missing part or rule violations are recorded in `errors`.
fn parse_details(
    side: Side,
    json: Option<&str>,
    errors: &mut FieldErrors,
) -> Result<Option<OfferDetails>> {
    let Some(json) = json else {
        errors.insert(details_part_name(side), "Details are required");
        return Ok(None);
    };
    let details: OfferDetails = serde_json::from_str(json).map_err(|e| {
        ApiError::BadRequest(format!("{} is not a valid record: {e}", details_part_name(side)))
    })?;
    if let Err(violations) = validate(&details) {
        errors.merge(violations.prefixed(side.part_prefix()));
    }
    Ok(Some(details))
}
