//! Card profiles: file paths and header conventions per card generation

use serde::Deserialize;

/// Expected response length sent with SELECT on plain cards
pub const PLAIN_SELECT_LE: u8 = 0x01;

/// Expected response length sent with SELECT on outer-AID cards
pub const OUTER_AID_SELECT_LE: u8 = 0x04;

/// Framing layout of cards whose SELECT response carries the file length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OuterAidLayout {
    /// Le byte sent with SELECT
    pub select_le: u8,
    /// Offset of the big-endian file length inside the SELECT response
    pub length_offset: usize,
    /// Also discard a nested inner tag (8 framing bytes instead of 4)
    pub strip_inner_tag: bool,
}

impl OuterAidLayout {
    /// Bytes at the start of the file that precede the content
    pub fn framing_len(&self) -> usize {
        if self.strip_inner_tag {
            8
        } else {
            4
        }
    }
}

impl Default for OuterAidLayout {
    fn default() -> Self {
        Self {
            select_le: OUTER_AID_SELECT_LE,
            length_offset: 2,
            strip_inner_tag: false,
        }
    }
}

/// How a card encodes the length of its elementary files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardVariant {
    /// 6-byte header at offset 0, little-endian length at bytes 4..6
    #[default]
    Plain,
    /// Length in the SELECT response, framing bytes at the start of the file
    OuterAid(OuterAidLayout),
}

impl CardVariant {
    /// Le byte to send with SELECT
    pub fn select_le(&self) -> u8 {
        match self {
            CardVariant::Plain => PLAIN_SELECT_LE,
            CardVariant::OuterAid(layout) => layout.select_le,
        }
    }
}

/// Paths of the elementary files read from the card
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilePaths {
    #[serde(with = "hex")]
    pub document: Vec<u8>,
    #[serde(with = "hex")]
    pub personal: Vec<u8>,
    #[serde(with = "hex")]
    pub residence: Vec<u8>,
    #[serde(with = "hex")]
    pub photo: Vec<u8>,
    #[serde(with = "hex")]
    pub cert_standard: Vec<u8>,
    #[serde(with = "hex")]
    pub cert_qualified: Vec<u8>,
}

impl FilePaths {
    /// Every path with a short label, in reading order
    pub fn all(&self) -> [(&'static str, &[u8]); 6] {
        [
            ("document", self.document.as_slice()),
            ("personal", self.personal.as_slice()),
            ("residence", self.residence.as_slice()),
            ("photo", self.photo.as_slice()),
            ("cert_standard", self.cert_standard.as_slice()),
            ("cert_qualified", self.cert_qualified.as_slice()),
        ]
    }
}

impl Default for FilePaths {
    fn default() -> Self {
        Self {
            document: vec![0x0F, 0x02],
            personal: vec![0x0F, 0x03],
            residence: vec![0x0F, 0x04],
            photo: vec![0x0F, 0x06],
            cert_standard: vec![0x0F, 0x08],
            cert_qualified: vec![0x0F, 0x10],
        }
    }
}

/// Known card generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// First generation cards with the plain 6-byte header
    #[default]
    Apollo,
    /// Later cards that report file length in the SELECT response
    Gemalto,
}

/// Everything that differs between card generations
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardProfile {
    pub variant: CardVariant,
    pub files: FilePaths,
}

impl CardProfile {
    pub fn apollo() -> Self {
        Self {
            variant: CardVariant::Plain,
            files: FilePaths::default(),
        }
    }

    pub fn gemalto() -> Self {
        Self {
            variant: CardVariant::OuterAid(OuterAidLayout::default()),
            files: FilePaths::default(),
        }
    }

    pub fn for_kind(kind: CardKind) -> Self {
        match kind {
            CardKind::Apollo => Self::apollo(),
            CardKind::Gemalto => Self::gemalto(),
        }
    }

    /// Validates the profile settings
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in self.files.all() {
            if path.len() < 2 {
                return Err(format!(
                    "path for {} must have at least 2 bytes, got {}",
                    name,
                    path.len()
                ));
            }
            if path.len() > 0xFF {
                return Err(format!("path for {} is too long", name));
            }
        }
        if let CardVariant::OuterAid(layout) = self.variant {
            if layout.length_offset + 2 > layout.select_le as usize {
                return Err(format!(
                    "length offset {} does not fit a {}-byte SELECT response",
                    layout.length_offset, layout.select_le
                ));
            }
        }
        Ok(())
    }
}

impl Default for CardProfile {
    fn default() -> Self {
        Self::apollo()
    }
}
