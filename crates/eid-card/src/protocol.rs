//! eID card reads on top of [`FileReader`]

use eid_common::{split_fields, FieldRecord};
use tracing::{debug, warn};

use crate::apdu::{commands, CardChannel};
use crate::error::CardError;
use crate::file::{CardFile, FileReader};
use crate::profile::CardProfile;
use crate::reader::{Session, SessionChannel};

/// Bytes in front of the JPEG data in the photo file body
pub const PHOTO_PREFIX_LEN: usize = 4;

/// Decoded record files read from the card
#[derive(Debug, Clone, Default)]
pub struct CardData {
    /// Payload of GET DATA 0101
    pub header: Vec<u8>,
    pub document: Vec<FieldRecord>,
    pub personal: Vec<FieldRecord>,
    pub residence: Vec<FieldRecord>,
}

/// eID card interface
pub struct EidCard<C> {
    reader: FileReader<C>,
    profile: CardProfile,
}

impl<C: CardChannel> EidCard<C> {
    pub fn new(reader: FileReader<C>, profile: CardProfile) -> Self {
        Self { reader, profile }
    }

    pub fn profile(&self) -> &CardProfile {
        &self.profile
    }

    pub fn into_reader(self) -> FileReader<C> {
        self.reader
    }

    /// Send GET DATA 0101 and return the header block
    pub fn get_data_0101(&mut self) -> Result<Vec<u8>, CardError> {
        self.reader.transport().send(&commands::get_data_0101())
    }

    /// Read any elementary file as header and body
    pub fn read_raw(&mut self, path: &[u8]) -> Result<CardFile, CardError> {
        self.reader.read_file(path)
    }

    fn read_records(&mut self, path: &[u8]) -> Result<Vec<FieldRecord>, CardError> {
        let file = self.reader.read_file(path)?;
        let records = split_fields(&file.body)?;
        debug!(path = %hex::encode_upper(path), count = records.len(), "Decoded records");
        Ok(records)
    }

    pub fn document(&mut self) -> Result<Vec<FieldRecord>, CardError> {
        let path = self.profile.files.document.clone();
        self.read_records(&path)
    }

    pub fn personal(&mut self) -> Result<Vec<FieldRecord>, CardError> {
        let path = self.profile.files.personal.clone();
        self.read_records(&path)
    }

    pub fn residence(&mut self) -> Result<Vec<FieldRecord>, CardError> {
        let path = self.profile.files.residence.clone();
        self.read_records(&path)
    }

    /// Holder photo as JPEG bytes
    pub fn photo(&mut self) -> Result<Vec<u8>, CardError> {
        let path = self.profile.files.photo.clone();
        let file = self.reader.read_file(&path)?;
        Ok(file
            .body
            .get(PHOTO_PREFIX_LEN..)
            .map(<[u8]>::to_vec)
            .unwrap_or_default())
    }

    /// Certificate for standard signing, `None` when the card has none
    pub fn standard_certificate(&mut self) -> Result<Option<Vec<u8>>, CardError> {
        let path = self.profile.files.cert_standard.clone();
        self.optional_body(&path)
    }

    /// Certificate for qualified signing, `None` when the card has none
    pub fn qualified_certificate(&mut self) -> Result<Option<Vec<u8>>, CardError> {
        let path = self.profile.files.cert_qualified.clone();
        self.optional_body(&path)
    }

    fn optional_body(&mut self, path: &[u8]) -> Result<Option<Vec<u8>>, CardError> {
        match self.reader.read_file(path) {
            Ok(file) if file.is_empty() => Ok(None),
            Ok(file) => Ok(Some(file.body)),
            Err(err) if err.is_file_not_found() => {
                warn!(path = %hex::encode_upper(path), "File not present on card");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Read header block and the three record files
    pub fn read_card_data(&mut self) -> Result<CardData, CardError> {
        Ok(CardData {
            header: self.get_data_0101()?,
            document: self.document()?,
            personal: self.personal()?,
            residence: self.residence()?,
        })
    }
}

impl Session {
    /// eID view of this session. Holds the reader lock until dropped.
    pub fn eid_card(&self, profile: CardProfile, verbose: bool) -> EidCard<SessionChannel<'_>> {
        let reader = FileReader::new(self.transport(verbose), profile.variant);
        EidCard::new(reader, profile)
    }
}
