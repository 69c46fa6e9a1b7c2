// Monitor module - babeld protocol client and per-router state mirror

pub mod entry;
pub mod scanner;
pub mod session;
pub mod state;
pub mod table;
pub mod update;

pub use entry::{Entry, FieldValue, TableKind};
pub use scanner::{Scanner, Token};
pub use state::{Identity, RouterState};
pub use update::{Action, Update, UpdateEvent};
