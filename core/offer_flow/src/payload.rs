//! Submission payload assembly.
//!
//! The creation request is one multipart body holding, per side, the raw
//! file parts followed by a JSON `*Details` part. In the JSON every file is
//! replaced by the path it will be stored under; the assembler only predicts
//! that path from [`UploadLayout`], it never stores anything itself.
//!
//! Part order for each side (offered first, then expected):
//!
//! ```text
//! <side>ZoneOneBanner   0..1 file
//! <side>Images          0..3 files (populated slots only)
//! <side>UploadedFiles   0..n files
//! <side>Details         JSON
//! ```

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::errors::SubmitError;
use crate::files::{FileAttachment, FileKind};
use crate::types::{ExchangeDrafts, OfferDetails, OfferDraft, Side};

/// Upload directory convention shared by the client and the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLayout {
    root: String,
}

impl Default for UploadLayout {
    fn default() -> Self {
        Self::new("/uploads")
    }
}

impl UploadLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `<root>/<kind dir>/<file name>`
    pub fn path_for(&self, kind: FileKind, file_name: &str) -> String {
        format!("{}/{}/{}", self.root, kind.dir(), file_name)
    }
}

/// Multipart name of a file group, e.g. `offeredImages`.
pub fn file_part_name(side: Side, kind: FileKind) -> String {
    format!("{}{}", side.part_prefix(), kind.part_suffix())
}

/// Multipart name of a side's JSON record, e.g. `expectedDetails`.
pub fn details_part_name(side: Side) -> String {
    format!("{}Details", side.part_prefix())
}

/// Structured record for one draft: files swapped for their predicted paths,
/// inactive conditional branches dropped.
pub fn describe(draft: &OfferDraft, layout: &UploadLayout) -> OfferDetails {
    draft
        .map_files(|kind, file| layout.path_for(kind, &file.name))
        .normalized()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    File(FileAttachment),
    Json(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadPart {
    pub name: String,
    pub body: PartBody,
}

/// Ordered parts of one creation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPayload {
    parts: Vec<PayloadPart>,
}

impl SubmissionPayload {
    pub fn parts(&self) -> &[PayloadPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PayloadPart> + 'a {
        self.parts.iter().filter(move |p| p.name == name)
    }

    /// Raw JSON of a side's details part.
    pub fn details_json(&self, side: Side) -> Option<&str> {
        let name = details_part_name(side);
        self.parts.iter().find_map(|p| match &p.body {
            PartBody::Json(json) if p.name == name => Some(json.as_str()),
            _ => None,
        })
    }

    fn push_file(&mut self, name: String, file: &FileAttachment) {
        self.parts.push(PayloadPart {
            name,
            body: PartBody::File(file.clone()),
        });
    }

    /// Build the `reqwest` multipart form.
    pub fn to_multipart(&self) -> Result<Form, SubmitError> {
        let mut form = Form::new();
        for part in &self.parts {
            let body = match &part.body {
                PartBody::File(file) => Part::bytes(file.bytes.clone())
                    .file_name(file.name.clone())
                    .mime_str(&file.mime_type)?,
                PartBody::Json(json) => Part::text(json.clone()).mime_str("application/json")?,
            };
            form = form.part(part.name.clone(), body);
        }
        Ok(form)
    }
}

/// Assemble the multipart payload for both sides of `drafts`.
pub fn assemble(
    drafts: &ExchangeDrafts,
    layout: &UploadLayout,
) -> Result<SubmissionPayload, serde_json::Error> {
    let mut payload = SubmissionPayload::default();
    for side in Side::ALL {
        let draft = drafts.side(side);

        if let Some(banner) = &draft.zone_one_banner {
            payload.push_file(file_part_name(side, FileKind::Banner), banner);
        }
        for image in draft.populated_images() {
            payload.push_file(file_part_name(side, FileKind::Image), image);
        }
        for file in &draft.other_special_conditions.uploaded_files {
            payload.push_file(file_part_name(side, FileKind::Attachment), file);
        }

        let details = serde_json::to_string(&describe(draft, layout))?;
        payload.parts.push(PayloadPart {
            name: details_part_name(side),
            body: PartBody::Json(details),
        });
    }
    Ok(payload)
}
