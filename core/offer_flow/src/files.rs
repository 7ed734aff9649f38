//! File attachments and the metadata checks run against them.
//!
//! Type and size checks only look at the declared MIME type and the byte
//! size; file content is never inspected.

use std::fmt;

/// Largest accepted file, inclusive.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// MIME types accepted for the zone-one banner.
pub const BANNER_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// MIME types accepted for "other special conditions" attachments.
pub const ATTACHMENT_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Role a file plays inside an offer; decides its upload directory and its
/// multipart part name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Banner,
    Image,
    Attachment,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Banner, FileKind::Image, FileKind::Attachment];

    /// Sub-directory of the upload root the file is stored under.
    pub fn dir(self) -> &'static str {
        match self {
            FileKind::Banner => "banner",
            FileKind::Image => "images",
            FileKind::Attachment => "files",
        }
    }

    /// Suffix appended to the side prefix to form the multipart part name.
    pub fn part_suffix(self) -> &'static str {
        match self {
            FileKind::Banner => "ZoneOneBanner",
            FileKind::Image => "Images",
            FileKind::Attachment => "UploadedFiles",
        }
    }
}

/// A file picked by the user, held in memory until submission.
#[derive(Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Original file name, as picked.
    pub name: String,
    pub mime_type: String,
    /// Declared size in bytes.
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAttachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Metadata a file representation can expose to validation.
///
/// Stored records only hold a path, so both accessors may return `None`; the
/// corresponding checks are then skipped.
pub trait FileRef {
    fn mime_type(&self) -> Option<&str>;
    fn size(&self) -> Option<u64>;
}

impl FileRef for FileAttachment {
    fn mime_type(&self) -> Option<&str> {
        Some(&self.mime_type)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}

impl FileRef for String {
    fn mime_type(&self) -> Option<&str> {
        None
    }

    fn size(&self) -> Option<u64> {
        None
    }
}

/// `false` only when the MIME type is known and not in `allowed`.
pub fn has_allowed_type(file: &impl FileRef, allowed: &[&str]) -> bool {
    file.mime_type().map_or(true, |mime| allowed.contains(&mime))
}

/// `false` only when the size is known and exceeds [`MAX_FILE_SIZE`].
pub fn within_size_limit(file: &impl FileRef) -> bool {
    file.size().map_or(true, |size| size <= MAX_FILE_SIZE)
}
