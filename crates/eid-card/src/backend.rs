//! PC/SC service behind the session layer

use std::ffi::CStr;
use std::time::Duration;

use pcsc::{
    Card, Context, Disposition, Protocol, Protocols, ReaderState, Scope, ShareMode, State,
    MAX_BUFFER_SIZE,
};
use tracing::debug;

/// Reader-level operations of an established context
pub trait ReaderBackend: Send + Sync {
    /// Names of the connected readers
    fn list_readers(&self) -> Result<Vec<String>, pcsc::Error>;

    /// Block for at most `timeout` until the state of `reader` differs from
    /// `current` and return the new event state. `pcsc::Error::Timeout`
    /// means nothing changed.
    fn status_change(
        &self,
        reader: &CStr,
        current: State,
        timeout: Duration,
    ) -> Result<State, pcsc::Error>;

    /// Connect to the card in `reader`, shared mode, T=0 or T=1
    fn connect(&self, reader: &CStr) -> Result<Box<dyn CardHandle>, pcsc::Error>;

    fn release(self: Box<Self>) -> Result<(), pcsc::Error>;
}

/// One card connection
pub trait CardHandle: Send {
    /// Exchange one APDU, returning the response with its status word
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error>;

    /// Negotiated protocol and ATR, as far as the reader reports them
    fn status(&self) -> (Option<Protocol>, Vec<u8>);

    /// Unpower the card and close the connection
    fn disconnect(self: Box<Self>) -> Result<(), pcsc::Error>;
}

/// [`ReaderBackend`] over a real PC/SC context
pub struct PcscBackend {
    context: Context,
}

impl PcscBackend {
    pub fn establish(scope: Scope) -> Result<Self, pcsc::Error> {
        Ok(Self {
            context: Context::establish(scope)?,
        })
    }
}

impl ReaderBackend for PcscBackend {
    fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let readers = self.context.list_readers(&mut readers_buf)?;
        Ok(readers
            .map(|r| r.to_string_lossy().into_owned())
            .collect())
    }

    fn status_change(
        &self,
        reader: &CStr,
        current: State,
        timeout: Duration,
    ) -> Result<State, pcsc::Error> {
        let mut states = [ReaderState::new(reader.to_owned(), current)];
        self.context.get_status_change(timeout, &mut states)?;
        Ok(states[0].event_state())
    }

    fn connect(&self, reader: &CStr) -> Result<Box<dyn CardHandle>, pcsc::Error> {
        let card = self
            .context
            .connect(reader, ShareMode::Shared, Protocols::ANY)?;
        Ok(Box::new(PcscCard(card)))
    }

    fn release(self: Box<Self>) -> Result<(), pcsc::Error> {
        self.context.release().map_err(|(_, err)| err)
    }
}

struct PcscCard(Card);

impl CardHandle for PcscCard {
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        let mut rapdu_buf = [0; MAX_BUFFER_SIZE];
        let rapdu = self.0.transmit(command, &mut rapdu_buf)?;
        Ok(rapdu.to_vec())
    }

    fn status(&self) -> (Option<Protocol>, Vec<u8>) {
        match self.0.status2_owned() {
            Ok(status) => (status.protocol2(), status.atr().to_vec()),
            Err(err) => {
                debug!(error = %err, "Card status unavailable");
                (None, Vec::new())
            }
        }
    }

    fn disconnect(self: Box<Self>) -> Result<(), pcsc::Error> {
        self.0
            .disconnect(Disposition::UnpowerCard)
            .map_err(|(_, err)| err)
    }
}
