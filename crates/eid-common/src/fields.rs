//! Field identifiers found in the eID record files

/// Which record file a field id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordFile {
    Document,
    Personal,
    Residence,
}

/// Document data file (EF 0F02)
pub mod document {
    pub const ISSUER_COUNTRY: u8 = 9;
    pub const DOCUMENT_NUMBER: u8 = 10;
    pub const DOCUMENT_TYPE: u8 = 11;
    pub const DOCUMENT_SERIAL: u8 = 12;
    pub const ISSUE_DATE: u8 = 13;
    pub const VALID_UNTIL: u8 = 14;
    pub const ISSUER: u8 = 15;
    pub const ISSUER_DETAIL: u8 = 16;
    pub const RESERVED: u8 = 17;
}

/// Holder personal data file (EF 0F03)
pub mod personal {
    pub const PERSONAL_NUMBER: u8 = 22;
    pub const LAST_NAME: u8 = 23;
    pub const FIRST_NAME: u8 = 24;
    pub const MIDDLE_NAME: u8 = 25;
    pub const SEX: u8 = 26;
    pub const BIRTH_PLACE: u8 = 27;
    pub const BIRTH_MUNICIPALITY: u8 = 28;
    pub const BIRTH_COUNTRY: u8 = 29;
    pub const DATE_OF_BIRTH: u8 = 30;
    pub const BIRTH_COUNTRY_CODE: u8 = 31;
}

/// Place of residence file (EF 0F04). Street, number and everything after
/// them form a variable trailing group.
pub mod residence {
    pub const COUNTRY_CODE: u8 = 32;
    pub const PLACE: u8 = 33;
    pub const MUNICIPALITY: u8 = 34;
    pub const STREET: u8 = 35;
    pub const HOUSE_NUMBER: u8 = 36;
}

/// Get a human-readable name for a field id
pub fn get_field_name(file: RecordFile, id: u8) -> &'static str {
    match (file, id) {
        (RecordFile::Document, document::ISSUER_COUNTRY) => "Issuer Country",
        (RecordFile::Document, document::DOCUMENT_NUMBER) => "Document Number",
        (RecordFile::Document, document::DOCUMENT_TYPE) => "Document Type",
        (RecordFile::Document, document::DOCUMENT_SERIAL) => "Document Serial",
        (RecordFile::Document, document::ISSUE_DATE) => "Issue Date",
        (RecordFile::Document, document::VALID_UNTIL) => "Valid Until",
        (RecordFile::Document, document::ISSUER) => "Issuer",
        (RecordFile::Document, document::ISSUER_DETAIL) => "Issuer Detail",

        (RecordFile::Personal, personal::PERSONAL_NUMBER) => "Personal Number",
        (RecordFile::Personal, personal::LAST_NAME) => "Last Name",
        (RecordFile::Personal, personal::FIRST_NAME) => "First Name",
        (RecordFile::Personal, personal::MIDDLE_NAME) => "Middle Name",
        (RecordFile::Personal, personal::SEX) => "Sex",
        (RecordFile::Personal, personal::BIRTH_PLACE) => "Place of Birth",
        (RecordFile::Personal, personal::BIRTH_MUNICIPALITY) => "Municipality of Birth",
        (RecordFile::Personal, personal::BIRTH_COUNTRY) => "Country of Birth",
        (RecordFile::Personal, personal::DATE_OF_BIRTH) => "Date of Birth",
        (RecordFile::Personal, personal::BIRTH_COUNTRY_CODE) => "Country of Birth Code",

        (RecordFile::Residence, residence::COUNTRY_CODE) => "Country",
        (RecordFile::Residence, residence::PLACE) => "Place",
        (RecordFile::Residence, residence::MUNICIPALITY) => "Municipality",
        (RecordFile::Residence, residence::STREET) => "Street",
        (RecordFile::Residence, residence::HOUSE_NUMBER) => "Number",
        (RecordFile::Residence, _) => "Address Detail",

        _ => "Unknown Field",
    }
}
