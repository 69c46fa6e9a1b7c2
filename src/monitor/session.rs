// Session loop: handshake, streaming, teardown

use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::entry::{string_decoder, Entry, FieldValue, TableKind};
use super::scanner::{Scanner, Token};
use super::state::{Identity, RouterState};
use super::update::{Action, Update, UpdateEvent};

/// Parse greeting lines (`BABEL`, `version`, `host`, `my-id` in any
/// order) until `my-id` is seen, and yield the router's identity.
/// `BABEL 0.0` is a rejected protocol version.
pub async fn handshake<R: AsyncRead + Unpin>(scanner: &mut Scanner<R>) -> Result<Identity> {
    let mut greeting = Entry::new();
    greeting.add_field("BABEL", string_decoder())?;
    greeting.add_field("version", string_decoder())?;
    greeting.add_field("host", string_decoder())?;
    greeting.add_field("my-id", string_decoder())?;

    while greeting.get("my-id").is_none() {
        if greeting.parse(scanner).await? == Token::Eof && greeting.get("my-id").is_none() {
            return Err(Error::Protocol(
                "stream ended before my-id was announced".to_string(),
            ));
        }
    }

    if let Some(FieldValue::String(ver)) = greeting.get("BABEL") {
        if ver == "0.0" {
            return Err(Error::UnsupportedVersion);
        }
    }

    let text = |name: &str| match greeting.get(name) {
        Some(FieldValue::String(s)) => Some(s.clone()),
        _ => None,
    };
    let id = text("my-id")
        .ok_or_else(|| Error::Protocol("handshake ended without my-id".to_string()))?;
    Ok(Identity {
        id,
        name: text("host").unwrap_or_else(|| "unknown".to_string()),
        version: text("version").unwrap_or_else(|| "unknown".to_string()),
    })
}

enum Parsed {
    Update(Update),
    Skipped,
    Eof,
}

/// Read one feed line. Lines not led by an action word are no-ops.
async fn parse_action<R: AsyncRead + Unpin>(
    state: &RouterState,
    scanner: &mut Scanner<R>,
) -> Result<Parsed> {
    let word = match scanner.next().await? {
        Token::Word(w) => w,
        Token::Eol => return Ok(Parsed::Skipped),
        Token::Eof => return Ok(Parsed::Eof),
    };
    let Some(action) = Action::parse(&word) else {
        // Not a state-change line; drain the rest of it.
        loop {
            match scanner.next().await? {
                Token::Word(_) => {}
                Token::Eol => return Ok(Parsed::Skipped),
                Token::Eof => return Ok(Parsed::Eof),
            }
        }
    };
    let kind = match scanner.next().await? {
        Token::Word(w) => TableKind::parse(&w)?,
        Token::Eol => return Ok(Parsed::Skipped),
        Token::Eof => return Ok(Parsed::Eof),
    };
    let entry_id = match scanner.next().await? {
        Token::Word(w) => w,
        Token::Eol => return Ok(Parsed::Skipped),
        Token::Eof => return Ok(Parsed::Eof),
    };
    let mut entry = kind.new_entry();
    entry.parse(scanner).await?;
    Ok(Parsed::Update(Update {
        router_id: state.id().to_string(),
        router_name: state.name().to_string(),
        action,
        kind,
        entry_id,
        entry,
    }))
}

async fn listen<R: AsyncRead + Unpin>(
    state: &RouterState,
    scanner: &mut Scanner<R>,
    sink: &mpsc::Sender<UpdateEvent>,
) -> Result<()> {
    loop {
        let update = match parse_action(state, scanner).await? {
            Parsed::Update(update) => update,
            Parsed::Skipped => continue,
            Parsed::Eof => return Ok(()),
        };
        if !state.check_update(&update).await {
            tracing::debug!(
                table = update.kind.as_str(),
                entry = %update.entry_id,
                "suppressing no-op change"
            );
            continue;
        }
        let event = update.to_event();
        state.update(update).await?;
        sink.send(event).await.map_err(|_| Error::SinkClosed)?;
    }
}

/// Drive one router session from streaming through teardown: parse
/// actions, suppress no-op changes, apply accepted updates and forward
/// their wire form to the sink in feed order. Cleanup runs whether the
/// stream ended normally or a fatal error aborted it, so viewers always
/// see a flush for every entry this router reported.
pub async fn run<R: AsyncRead + Unpin>(
    state: &RouterState,
    scanner: &mut Scanner<R>,
    sink: &mpsc::Sender<UpdateEvent>,
) -> Result<()> {
    let outcome = listen(state, scanner, sink).await;
    let cleaned = state.clean(sink).await;
    outcome.and(cleaned)
}
