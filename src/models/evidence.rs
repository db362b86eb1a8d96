use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Named photo targets on an inspection job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum EvidenceSlot {
    Front,
    Rear,
    Left,
    Right,
    Interior,
    RegistrationCard,
}

/// Slots that count toward completeness. Interior never does; the
/// registration card counts only through its verification result.
pub const REQUIRED_PHOTO_SLOTS: [EvidenceSlot; 4] = [
    EvidenceSlot::Front,
    EvidenceSlot::Rear,
    EvidenceSlot::Left,
    EvidenceSlot::Right,
];

impl EvidenceSlot {
    pub fn is_required(self) -> bool {
        REQUIRED_PHOTO_SLOTS.contains(&self)
    }
}

/// A single encoded still frame captured from the camera.
///
/// The payload is kept opaque; only the container format is sniffed so the
/// gateway can be told the right MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct StillImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl StillImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let format = image::guess_format(&bytes).map_err(|_| ImageError::Unrecognized)?;
        Ok(Self { bytes, format })
    }

    /// Accepts either a `data:image/...;base64,` URL or bare base64.
    pub fn from_data_url(data_url: &str) -> Result<Self, ImageError> {
        let payload = match data_url.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => payload,
            _ => data_url,
        };
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for StillImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StillImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Image payload is not a recognised still image format")]
    Unrecognized,

    #[error("Image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Evidence captured so far, one image per slot.
///
/// The lifecycle only ever inserts; a repeat capture of the same slot
/// replaces the earlier frame.
#[derive(Debug, Clone, Default)]
pub struct EvidenceMap {
    slots: BTreeMap<EvidenceSlot, StillImage>,
}

impl EvidenceMap {
    pub fn set(&mut self, slot: EvidenceSlot, image: StillImage) -> Option<StillImage> {
        self.slots.insert(slot, image)
    }

    pub fn get(&self, slot: EvidenceSlot) -> Option<&StillImage> {
        self.slots.get(&slot)
    }

    pub fn contains(&self, slot: EvidenceSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn required_filled(&self) -> usize {
        REQUIRED_PHOTO_SLOTS
            .iter()
            .filter(|slot| self.contains(**slot))
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every slot in declaration order with its image, if captured.
    pub fn iter_all(&self) -> impl Iterator<Item = (EvidenceSlot, Option<&StillImage>)> + '_ {
        EvidenceSlot::iter().map(move |slot| (slot, self.get(slot)))
    }
}
