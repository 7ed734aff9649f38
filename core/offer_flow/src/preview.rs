//! Data-URL previews for picked images.
//!
//! Previews are display-only: a failure leaves the slot on
//! [`PLACEHOLDER_IMAGE`] and never affects the field value.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

use crate::errors::PreviewError;
use crate::files::FileAttachment;

/// Image shown while no preview is available.
pub const PLACEHOLDER_IMAGE: &str = "/imagetoselect.png";

/// Encode `file` as a `data:` URL.
pub fn encode_data_url(file: &FileAttachment) -> Result<String, PreviewError> {
    if file.bytes.is_empty() {
        return Err(PreviewError::Empty(file.name.clone()));
    }
    if !file.is_image() {
        return Err(PreviewError::NotAnImage {
            name: file.name.clone(),
            mime: file.mime_type.clone(),
        });
    }
    Ok(format!(
        "data:{};base64,{}",
        file.mime_type,
        STANDARD.encode(&file.bytes)
    ))
}

/// Encode off the async executor; large images would otherwise stall
/// other field updates.
pub async fn render_data_url(file: FileAttachment) -> Result<String, PreviewError> {
    tokio::task::spawn_blocking(move || encode_data_url(&file))
        .await
        .map_err(|e| PreviewError::Join(e.to_string()))?
}

/// Preview slots of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewSlot {
    Banner,
    Image(usize),
}

/// Identifies one pending preview; stale tickets are ignored on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTicket {
    pub slot: PreviewSlot,
    epoch: u64,
    generation: u64,
}

/// A preview to compute. Run it with [`PreviewJob::run`] and hand the
/// outcome back to the controller.
#[derive(Debug)]
pub struct PreviewJob {
    pub ticket: PreviewTicket,
    pub file: FileAttachment,
}

#[derive(Debug)]
pub struct PreviewOutcome {
    pub ticket: PreviewTicket,
    pub result: Result<String, PreviewError>,
}

impl PreviewJob {
    pub async fn run(self) -> PreviewOutcome {
        PreviewOutcome {
            ticket: self.ticket,
            result: render_data_url(self.file).await,
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    url: Option<String>,
}

/// Step-local preview state. Replaced (with a new epoch) whenever the wizard
/// changes step, which abandons every preview still in flight.
#[derive(Debug, Default)]
pub struct PreviewCache {
    epoch: u64,
    slots: HashMap<PreviewSlot, SlotState>,
}

impl PreviewCache {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            slots: HashMap::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new preview for `slot`, invalidating any earlier one.
    pub fn begin(&mut self, slot: PreviewSlot) -> PreviewTicket {
        let state = self.slots.entry(slot).or_default();
        state.generation += 1;
        state.url = None;
        PreviewTicket {
            slot,
            epoch: self.epoch,
            generation: state.generation,
        }
    }

    /// Forget the preview of a cleared slot.
    pub fn clear(&mut self, slot: PreviewSlot) {
        let state = self.slots.entry(slot).or_default();
        state.generation += 1;
        state.url = None;
    }

    /// Store a finished preview. Returns `false` when the outcome is stale
    /// or failed.
    pub fn complete(&mut self, outcome: PreviewOutcome) -> bool {
        let ticket = outcome.ticket;
        if ticket.epoch != self.epoch {
            debug!(slot = ?ticket.slot, "dropping preview from a previous step");
            return false;
        }
        let Some(state) = self.slots.get_mut(&ticket.slot) else {
            return false;
        };
        if state.generation != ticket.generation {
            debug!(slot = ?ticket.slot, "dropping superseded preview");
            return false;
        }
        match outcome.result {
            Ok(url) => {
                state.url = Some(url);
                true
            }
            Err(e) => {
                warn!(slot = ?ticket.slot, "preview unavailable: {e}");
                false
            }
        }
    }

    pub fn get(&self, slot: PreviewSlot) -> Option<&str> {
        self.slots.get(&slot).and_then(|s| s.url.as_deref())
    }

    /// What to display for `slot`: the preview, or the placeholder.
    pub fn display(&self, slot: PreviewSlot) -> &str {
        self.get(slot).unwrap_or(PLACEHOLDER_IMAGE)
    }
}
