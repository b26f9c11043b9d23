use std::collections::BTreeMap;
use std::error::Error;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use eid_card::{Session, SessionError, WaitOutcome};
use eid_common::fields::{document, personal};
use eid_common::{field_map, field_text};
use tracing::{debug, info};

use super::{CommandResult, RunContext};

/// How often the idle loop reports while the wait runs in the background
const IDLE_TICK: Duration = Duration::from_secs(2);

pub fn cmd_wait(ctx: &RunContext, timeout: Option<Duration>) -> CommandResult {
    let reader = ctx.reader()?;
    let timeout = timeout.or_else(|| ctx.config.wait_timeout());

    println!("Waiting for a card in {}", reader);

    let (tx, rx) = mpsc::channel::<(String, Result<WaitOutcome, SessionError>)>();
    let handle = ctx
        .manager
        .wait_for_card_async(reader, timeout, move |name, outcome| {
            let _ = tx.send((name.to_string(), outcome));
        });

    // This thread stays free while the worker blocks on the reader
    let (name, outcome) = loop {
        match rx.recv_timeout(IDLE_TICK) {
            Ok(message) => break message,
            Err(RecvTimeoutError::Timeout) => println!("Idle..."),
            Err(RecvTimeoutError::Disconnected) => {
                return Err("card wait ended without reporting an outcome".into());
            }
        }
    };

    if handle.join().is_err() {
        return Err("card wait thread panicked".into());
    }

    match outcome? {
        WaitOutcome::Ready(session) => {
            info!(reader = %name, "Card present");
            let summary = summarize(ctx, &session);
            let line = session.finish(summary)?;
            println!("{}", line);
        }
        WaitOutcome::TimedOut => println!("No card inserted in {}", name),
        WaitOutcome::ReaderUnavailable => {
            return Err(format!("reader {} is not available", name).into());
        }
        WaitOutcome::Cancelled => debug!(reader = %name, "Card wait cancelled"),
    }
    Ok(())
}

fn summarize(ctx: &RunContext, session: &Session) -> Result<String, Box<dyn Error>> {
    let mut card = session.eid_card(ctx.profile.clone(), ctx.verbose);
    let documents = field_map(&card.document()?);
    let people = field_map(&card.personal()?);

    let text = |map: &BTreeMap<u8, Vec<u8>>, id: u8| {
        map.get(&id).map(|v| field_text(v)).unwrap_or_default()
    };

    Ok(format!(
        "Card {} holder {} {}",
        text(&documents, document::DOCUMENT_NUMBER),
        text(&people, personal::FIRST_NAME),
        text(&people, personal::LAST_NAME),
    ))
}
