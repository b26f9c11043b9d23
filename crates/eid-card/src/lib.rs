//! eID Card - Smart card reading for national eID cards
//!
//! This crate talks to eID cards via PC/SC readers: APDU exchange with
//! status word checks, whole-file reads over the 255-byte READ BINARY
//! window, reader sessions and waiting for a card to be inserted.

pub mod apdu;
pub mod backend;
pub mod error;
pub mod file;
pub mod profile;
pub mod protocol;
pub mod reader;

pub use apdu::{CardChannel, Transport};
pub use backend::{CardHandle, PcscBackend, ReaderBackend};
pub use error::{CardError, SessionError};
pub use file::{CardFile, FileReader};
pub use profile::{CardKind, CardProfile, CardVariant, FilePaths, OuterAidLayout};
pub use protocol::{CardData, EidCard};
pub use reader::{CancellationToken, Session, SessionManager, WaitHandle, WaitOutcome};

/// Re-export commonly used types
pub use pcsc::{Error as PcscError, Protocol, State};
