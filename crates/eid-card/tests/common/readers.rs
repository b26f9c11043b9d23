//! Scripted PC/SC service: reader states, cards and lifecycle counters

use std::collections::{HashMap, VecDeque};
use std::ffi::CStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eid_card::{
    CardChannel, CardHandle, PcscError, Protocol, ReaderBackend, SessionManager, State,
};

use super::FakeCard;

/// ATR reported by every fake card
pub const FAKE_ATR: [u8; 4] = [0x3B, 0x88, 0x80, 0x01];

/// How long a gated connect waits before giving up
const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle calls seen by the backend
#[derive(Default)]
pub struct Journal {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub releases: AtomicUsize,
}

impl Journal {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Readers whose event states follow a script.
///
/// Each status query returns the next scripted state. Once the script is
/// used up the reader never changes again: queries sleep for their timeout
/// and report `Timeout`. Unscripted readers report `UNKNOWN`.
#[derive(Default)]
pub struct FakeReaders {
    scripts: Mutex<HashMap<String, VecDeque<State>>>,
    cards: Mutex<HashMap<String, FakeCard>>,
    gate: Option<Mutex<Receiver<()>>>,
    fail_disconnect: bool,
    journal: Arc<Journal>,
}

impl FakeReaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(self, name: &str, script: &[State]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), script.iter().copied().collect());
        self
    }

    pub fn with_card(self, reader: &str, card: FakeCard) -> Self {
        self.cards.lock().unwrap().insert(reader.to_string(), card);
        self
    }

    /// Connects block until a message arrives on `gate`
    pub fn gated(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(Mutex::new(gate));
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn journal(&self) -> Arc<Journal> {
        Arc::clone(&self.journal)
    }

    /// Manager that establishes this backend once
    pub fn into_manager(self) -> SessionManager {
        let slot = Mutex::new(Some(self));
        SessionManager::with_backend(move || {
            let backend = slot.lock().unwrap().take().ok_or(PcscError::NoService)?;
            let backend: Box<dyn ReaderBackend> = Box::new(backend);
            Ok(backend)
        })
    }
}

impl ReaderBackend for FakeReaders {
    fn list_readers(&self) -> Result<Vec<String>, PcscError> {
        let mut names: Vec<String> = self.scripts.lock().unwrap().keys().cloned().collect();
        if names.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }
        names.sort();
        Ok(names)
    }

    fn status_change(
        &self,
        reader: &CStr,
        _current: State,
        timeout: Duration,
    ) -> Result<State, PcscError> {
        let name = reader.to_string_lossy();
        let next = match self.scripts.lock().unwrap().get_mut(name.as_ref()) {
            Some(script) => script.pop_front(),
            None => Some(State::UNKNOWN),
        };

        match next {
            Some(state) => Ok(state | State::CHANGED),
            None => {
                std::thread::sleep(timeout);
                Err(PcscError::Timeout)
            }
        }
    }

    fn connect(&self, reader: &CStr) -> Result<Box<dyn CardHandle>, PcscError> {
        if let Some(gate) = &self.gate {
            gate.lock()
                .unwrap()
                .recv_timeout(GATE_TIMEOUT)
                .map_err(|_| PcscError::Timeout)?;
        }

        let name = reader.to_string_lossy();
        let card = self
            .cards
            .lock()
            .unwrap()
            .remove(name.as_ref())
            .ok_or(PcscError::NoSmartcard)?;
        self.journal.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeHandle {
            card: Mutex::new(card),
            fail_disconnect: self.fail_disconnect,
            journal: Arc::clone(&self.journal),
        }))
    }

    fn release(self: Box<Self>) -> Result<(), PcscError> {
        self.journal.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeHandle {
    card: Mutex<FakeCard>,
    fail_disconnect: bool,
    journal: Arc<Journal>,
}

impl CardHandle for FakeHandle {
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, PcscError> {
        self.card.lock().unwrap().exchange(command)
    }

    fn status(&self) -> (Option<Protocol>, Vec<u8>) {
        (Some(Protocol::T1), FAKE_ATR.to_vec())
    }

    fn disconnect(self: Box<Self>) -> Result<(), PcscError> {
        self.journal.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(PcscError::InvalidHandle);
        }
        Ok(())
    }
}
