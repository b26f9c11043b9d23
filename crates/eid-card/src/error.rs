//! Error types for card communication and reader sessions

use eid_common::RecordError;
use thiserror::Error;

/// Status word for "file or application not found"
pub const SW_FILE_NOT_FOUND: u16 = 0x6A82;

/// Errors raised while exchanging APDUs with an inserted card
#[derive(Debug, Error)]
pub enum CardError {
    /// The PC/SC channel itself failed. Fatal to the current session.
    #[error("transport failure: {0}")]
    Transport(#[from] pcsc::Error),

    #[error("card response of {0} bytes carries no status word")]
    MissingStatusWord(usize),

    /// The card rejected a command
    #[error("card returned status {status_word:04X}")]
    CardStatus { status_word: u16 },

    #[error("header of file {path} unreadable: got {got} of {expected} bytes")]
    HeaderRead {
        path: String,
        got: usize,
        expected: usize,
    },

    #[error("command data of {0} bytes does not fit a short APDU")]
    CommandDataTooLong(usize),

    #[error("read offset {0} is outside the READ BINARY address range")]
    OffsetOutOfRange(usize),

    #[error(transparent)]
    MalformedRecord(#[from] RecordError),
}

impl CardError {
    /// Status word reported by the card, if the card rejected a command
    pub fn status_word(&self) -> Option<u16> {
        match self {
            CardError::CardStatus { status_word } => Some(*status_word),
            _ => None,
        }
    }

    /// True when the card reported a missing file. Optional files use this
    /// to tell absence from failure.
    pub fn is_file_not_found(&self) -> bool {
        self.status_word() == Some(SW_FILE_NOT_FOUND)
    }
}

/// Errors raised by the reader context and session lifecycle
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to establish PC/SC context: {0}")]
    Context(#[source] pcsc::Error),

    #[error("failed to release PC/SC context: {0}")]
    ReleaseContext(#[source] pcsc::Error),

    #[error("PC/SC context still held by {0} session(s) or wait(s)")]
    ContextInUse(usize),

    #[error("failed to list readers: {0}")]
    ListReaders(#[source] pcsc::Error),

    #[error("no smart card readers detected")]
    NoReaders,

    #[error("reader name {0:?} contains a NUL byte")]
    InvalidReaderName(String),

    #[error("failed to get status of reader {reader}: {source}")]
    ReaderStatus {
        reader: String,
        #[source]
        source: pcsc::Error,
    },

    #[error("failed to connect to card in {reader}: {source}")]
    Connect {
        reader: String,
        #[source]
        source: pcsc::Error,
    },

    #[error("failed to disconnect card in {reader}: {source}")]
    Disconnect {
        reader: String,
        #[source]
        source: pcsc::Error,
    },
}
