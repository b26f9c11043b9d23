//! PC/SC context, reader sessions and card-presence waits

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pcsc::{Protocol, Scope, State};
use tracing::{debug, info, warn};

use crate::apdu::{CardChannel, Transport};
use crate::backend::{CardHandle, PcscBackend, ReaderBackend};
use crate::error::SessionError;

/// Longest single status-change wait. Cancellation is checked in between.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

type Connector = dyn Fn() -> Result<Box<dyn ReaderBackend>, pcsc::Error> + Send + Sync;
type SharedBackend = Arc<Box<dyn ReaderBackend>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ManagerInner {
    connector: Box<Connector>,
    context: Mutex<Option<SharedBackend>>,
    reader_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Owner of the process-wide PC/SC context.
///
/// The context is established on first use and shared by every session and
/// wait started from this manager (and its clones). [`SessionManager::release`]
/// tears it down and refuses to do so while any of them is still alive.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_scope(Scope::User)
    }

    pub fn with_scope(scope: Scope) -> Self {
        Self::with_backend(move || {
            let backend: Box<dyn ReaderBackend> = Box::new(PcscBackend::establish(scope)?);
            Ok(backend)
        })
    }

    /// Manager whose context comes from `connector` instead of PC/SC.
    /// `connector` runs again after every [`SessionManager::release`].
    pub fn with_backend<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ReaderBackend>, pcsc::Error> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ManagerInner {
                connector: Box::new(connector),
                context: Mutex::new(None),
                reader_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn context(&self) -> Result<SharedBackend, SessionError> {
        let mut slot = lock(&self.inner.context);
        if let Some(context) = slot.as_ref() {
            return Ok(Arc::clone(context));
        }

        let context = Arc::new((self.inner.connector)().map_err(SessionError::Context)?);
        debug!("PC/SC context established");
        *slot = Some(Arc::clone(&context));
        Ok(context)
    }

    /// Release the shared context. Sessions must be disconnected first.
    pub fn release(&self) -> Result<(), SessionError> {
        let mut slot = lock(&self.inner.context);
        let Some(context) = slot.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(context) {
            Ok(context) => {
                context.release().map_err(SessionError::ReleaseContext)?;
                debug!("PC/SC context released");
                Ok(())
            }
            Err(context) => {
                let holders = Arc::strong_count(&context) - 1;
                *slot = Some(context);
                Err(SessionError::ContextInUse(holders))
            }
        }
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<String>, SessionError> {
        match self.context()?.list_readers() {
            Ok(readers) => Ok(readers),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(err) => Err(SessionError::ListReaders(err)),
        }
    }

    /// First reader reported by PC/SC
    pub fn default_reader(&self) -> Result<String, SessionError> {
        self.list_readers()?
            .into_iter()
            .next()
            .ok_or(SessionError::NoReaders)
    }

    fn reader_lock(&self, reader: &str) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.inner.reader_locks);
        Arc::clone(locks.entry(reader.to_string()).or_default())
    }

    /// Connect to the card in `reader`, shared mode, T=0 or T=1
    pub fn connect(&self, reader: &str) -> Result<Session, SessionError> {
        let context = self.context()?;
        connect_with(&context, reader, self.reader_lock(reader))
    }

    /// Run `f` with a connected session and disconnect afterwards.
    ///
    /// The session is disconnected on every path; see [`Session::finish`]
    /// for which error wins.
    pub fn with_session<T, E, F>(&self, reader: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let session = self.connect(reader)?;
        let result = f(&session);
        session.finish(result)
    }

    /// Block until a card is present in `reader`, the reader goes away or
    /// `timeout` expires (`None` waits forever).
    pub fn wait_for_card(
        &self,
        reader: &str,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, SessionError> {
        self.wait_for_card_cancellable(reader, timeout, &CancellationToken::new())
    }

    /// Same as [`SessionManager::wait_for_card`], stopping early once `token`
    /// is cancelled
    pub fn wait_for_card_cancellable(
        &self,
        reader: &str,
        timeout: Option<Duration>,
        token: &CancellationToken,
    ) -> Result<WaitOutcome, SessionError> {
        let context = self.context()?;
        let reader_lock = self.reader_lock(reader);
        wait_with(&context, reader, timeout, token, reader_lock)
    }

    /// Wait for a card on a background thread.
    ///
    /// `callback` runs exactly once on that thread with the reader name and
    /// the outcome. The calling thread is not blocked.
    pub fn wait_for_card_async<F>(
        &self,
        reader: impl Into<String>,
        timeout: Option<Duration>,
        callback: F,
    ) -> WaitHandle
    where
        F: FnOnce(&str, Result<WaitOutcome, SessionError>) + Send + 'static,
    {
        let reader = reader.into();
        let token = CancellationToken::new();
        let manager = self.clone();
        let thread_token = token.clone();

        let thread = thread::spawn(move || {
            debug!(reader = %reader, "Card wait started");
            let outcome = manager.wait_for_card_cancellable(&reader, timeout, &thread_token);
            callback(&reader, outcome);
        });

        WaitHandle {
            token,
            thread: Some(thread),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn reader_cstring(reader: &str) -> Result<CString, SessionError> {
    CString::new(reader).map_err(|_| SessionError::InvalidReaderName(reader.to_string()))
}

fn connect_with(
    context: &SharedBackend,
    reader: &str,
    reader_lock: Arc<Mutex<()>>,
) -> Result<Session, SessionError> {
    let name = reader_cstring(reader)?;
    let card = context
        .connect(&name)
        .map_err(|source| SessionError::Connect {
            reader: reader.to_string(),
            source,
        })?;
    let (protocol, atr) = card.status();

    info!(reader = %reader, ?protocol, "Card connected");

    Ok(Session {
        reader: reader.to_string(),
        protocol,
        atr,
        card: Some(card),
        reader_lock,
        _context: Arc::clone(context),
    })
}

fn wait_with(
    context: &SharedBackend,
    reader: &str,
    timeout: Option<Duration>,
    token: &CancellationToken,
    reader_lock: Arc<Mutex<()>>,
) -> Result<WaitOutcome, SessionError> {
    let status_err = |source| SessionError::ReaderStatus {
        reader: reader.to_string(),
        source,
    };

    let name = reader_cstring(reader)?;
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut state = match context.status_change(&name, State::UNAWARE, Duration::ZERO) {
        Ok(state) => state,
        Err(pcsc::Error::Timeout) => State::UNAWARE,
        Err(err) => return Err(status_err(err)),
    };

    loop {
        if state.intersects(State::UNAVAILABLE | State::UNKNOWN | State::IGNORE) {
            info!(reader = %reader, "Reader unavailable");
            return Ok(WaitOutcome::ReaderUnavailable);
        }
        if state.contains(State::PRESENT) {
            return connect_with(context, reader, reader_lock).map(WaitOutcome::Ready);
        }
        if token.is_cancelled() {
            debug!(reader = %reader, "Card wait cancelled");
            return Ok(WaitOutcome::Cancelled);
        }

        let slice = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Ok(WaitOutcome::TimedOut);
                }
                left.min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        match context.status_change(&name, state, slice) {
            Ok(next) => state = next,
            Err(pcsc::Error::Timeout) => {}
            Err(err) => return Err(status_err(err)),
        }
    }
}

/// How a card wait ended
#[derive(Debug)]
pub enum WaitOutcome {
    /// A card is present and connected
    Ready(Session),
    /// No card arrived before the timeout
    TimedOut,
    /// The reader was removed or is not usable
    ReaderUnavailable,
    Cancelled,
}

impl WaitOutcome {
    pub fn into_session(self) -> Option<Session> {
        match self {
            WaitOutcome::Ready(session) => Some(session),
            _ => None,
        }
    }
}

/// Stops a pending card wait
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle on a background card wait
pub struct WaitHandle {
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl WaitHandle {
    /// Ask the wait to stop. The callback still runs, with `Cancelled`
    /// unless a card was already found.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the background thread, including the callback, to finish
    pub fn join(mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

/// One connection to the card in one reader.
///
/// Dropping a connected session unpowers the card; use
/// [`Session::disconnect`] to observe failures.
pub struct Session {
    reader: String,
    protocol: Option<Protocol>,
    atr: Vec<u8>,
    card: Option<Box<dyn CardHandle>>,
    reader_lock: Arc<Mutex<()>>,
    _context: SharedBackend,
}

impl Session {
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Protocol negotiated at connect time
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    /// Answer To Reset, empty if the reader did not report it
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    /// Exclusive channel to the card. Other sessions on the same reader
    /// block until the returned transport is dropped.
    pub fn transport(&self, verbose: bool) -> Transport<SessionChannel<'_>> {
        let guard = lock(&self.reader_lock);
        Transport::new(SessionChannel {
            card: self.card.as_ref(),
            _guard: guard,
        })
        .verbose(verbose)
    }

    /// Unpower the card and close the connection
    pub fn disconnect(mut self) -> Result<(), SessionError> {
        match self.card.take() {
            Some(card) => self.close(card),
            None => Ok(()),
        }
    }

    /// Disconnect after work done with this session produced `result`.
    ///
    /// A disconnect failure is returned only when `result` is `Ok`.
    /// Otherwise it is logged and the error in `result` wins.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<SessionError>,
    {
        match (result, self.disconnect()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(disconnect_err)) => {
                warn!(error = %disconnect_err, "Disconnect failed after earlier error");
                Err(err)
            }
        }
    }

    fn close(&self, card: Box<dyn CardHandle>) -> Result<(), SessionError> {
        let _guard = lock(&self.reader_lock);
        card.disconnect().map_err(|source| SessionError::Disconnect {
            reader: self.reader.clone(),
            source,
        })?;
        debug!(reader = %self.reader, "Card disconnected");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("reader", &self.reader)
            .field("protocol", &self.protocol)
            .field("atr", &hex::encode_upper(&self.atr))
            .field("connected", &self.card.is_some())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err(err) = self.close(card) {
                warn!(error = %err, "Failed to disconnect dropped session");
            }
        }
    }
}

/// Card channel holding the per-reader lock
pub struct SessionChannel<'a> {
    card: Option<&'a Box<dyn CardHandle>>,
    _guard: MutexGuard<'a, ()>,
}

impl CardChannel for SessionChannel<'_> {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        match self.card {
            Some(card) => card.transmit(command),
            None => Err(pcsc::Error::InvalidHandle),
        }
    }
}
