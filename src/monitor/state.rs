// Per-router mirror of the daemon's reported state

use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::entry::TableKind;
use super::table::Table;
use super::update::{Action, Update, UpdateEvent};

/// Router identity established by the handshake.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Identity plus the four tables mirroring one router. Created once the
/// handshake completes; written only by that router's session task;
/// read concurrently by snapshotting viewers.
#[derive(Debug)]
pub struct RouterState {
    identity: Identity,
    route: Table,
    xroute: Table,
    interface: Table,
    neighbour: Table,
}

impl RouterState {
    pub fn new(identity: Identity) -> Self {
        RouterState {
            identity,
            route: Table::new(),
            xroute: Table::new(),
            interface: Table::new(),
            neighbour: Table::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn version(&self) -> &str {
        &self.identity.version
    }

    fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Route => &self.route,
            TableKind::Xroute => &self.xroute,
            TableKind::Interface => &self.interface,
            TableKind::Neighbour => &self.neighbour,
        }
    }

    /// Whether the update should be applied and emitted. A `change`
    /// that alters no stored field is a no-op and is suppressed; `add`
    /// and `flush` always pass. Must run before [`RouterState::update`]
    /// since it compares against pre-update state.
    pub async fn check_update(&self, update: &Update) -> bool {
        if update.action != Action::Change {
            return true;
        }
        !self
            .table(update.kind)
            .is_same(&update.entry_id, &update.entry)
            .await
    }

    /// Apply the update to its table. Any error here means the local
    /// mirror has desynchronized from the feed; the session must end.
    pub async fn update(&self, update: Update) -> Result<()> {
        let table = self.table(update.kind);
        match update.action {
            Action::Add => table.add(&update.entry_id, update.entry).await,
            Action::Change => table.change(&update.entry_id, update.entry).await,
            Action::Flush => table.flush(&update.entry_id).await,
        }
    }

    /// Visit every entry of every table as an `add` update, in
    /// unspecified order. Each table's lock is held only across that
    /// table's callbacks.
    pub async fn iter(&self, mut f: impl FnMut(Update)) {
        for kind in TableKind::ALL {
            self.table(kind)
                .for_each(|id, entry| {
                    f(Update {
                        router_id: self.identity.id.clone(),
                        router_name: self.identity.name.clone(),
                        action: Action::Add,
                        kind,
                        entry_id: id.to_string(),
                        entry: entry.clone(),
                    });
                })
                .await;
        }
    }

    /// Emit a synthetic `flush` for every held entry, so downstream
    /// viewers evict this router's state when the session ends.
    pub async fn clean(&self, sink: &mpsc::Sender<UpdateEvent>) -> Result<()> {
        let mut events = Vec::new();
        self.iter(|mut update| {
            update.action = Action::Flush;
            events.push(update.to_event());
        })
        .await;
        for event in events {
            sink.send(event).await.map_err(|_| Error::SinkClosed)?;
        }
        Ok(())
    }
}
