// Update model: one state transition plus its wire form

use serde::Serialize;
use serde_json::Value;

use super::entry::{Entry, FieldValue, TableKind};

/// The kind of state transition a feed line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Change,
    Flush,
}

impl Action {
    /// `None` for any word that is not an action; such lines are no-ops.
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "add" => Some(Action::Add),
            "change" => Some(Action::Change),
            "flush" => Some(Action::Flush),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Change => "change",
            Action::Flush => "flush",
        }
    }
}

/// One state transition against a router's table, holding live decoded
/// values. Updates are transient: constructed, checked, applied,
/// rendered, handed off.
#[derive(Debug, Clone)]
pub struct Update {
    pub router_id: String,
    pub router_name: String,
    pub action: Action,
    pub kind: TableKind,
    pub entry_id: String,
    pub entry: Entry,
}

/// The serializable projection pushed to viewers. Addresses and
/// prefixes render as canonical text; other scalars pass through.
/// Fields never decoded for the entry are absent from `data`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub name: String,
    pub router: String,
    pub action: Action,
    pub table: TableKind,
    #[serde(rename = "id")]
    pub entry: String,
    pub data: serde_json::Map<String, Value>,
}

impl Update {
    pub fn to_event(&self) -> UpdateEvent {
        let mut data = serde_json::Map::new();
        for (name, value) in self.entry.values() {
            data.insert(name.to_string(), render(value));
        }
        UpdateEvent {
            name: self.router_name.clone(),
            router: self.router_id.clone(),
            action: self.action,
            table: self.kind,
            entry: self.entry_id.clone(),
            data,
        }
    }
}

fn render(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => Value::from(s.clone()),
        FieldValue::Bool(b) => Value::from(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Address(addr) => Value::from(addr.to_string()),
        FieldValue::Prefix(net) => Value::from(net.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::scanner::Scanner;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_renders_addresses_as_text() {
        let mut scanner =
            Scanner::new("prefix 10.0.0.0/24 via 10.0.0.1 installed yes metric -5\n".as_bytes());
        let mut entry = TableKind::Route.new_entry();
        entry.parse(&mut scanner).await.unwrap();

        let update = Update {
            router_id: "abc".to_string(),
            router_name: "lab".to_string(),
            action: Action::Add,
            kind: TableKind::Route,
            entry_id: "r1".to_string(),
            entry,
        };
        let event = update.to_event();
        assert_eq!(event.data.get("prefix"), Some(&json!("10.0.0.0/24")));
        assert_eq!(event.data.get("via"), Some(&json!("10.0.0.1")));
        assert_eq!(event.data.get("installed"), Some(&json!(true)));
        assert_eq!(event.data.get("metric"), Some(&json!(-5)));
        // never-decoded fields are absent, not null
        assert!(!event.data.contains_key("refmetric"));
    }

    #[tokio::test]
    async fn test_event_serializes_with_expected_shape() {
        let mut scanner = Scanner::new("cost 96\n".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        entry.parse(&mut scanner).await.unwrap();

        let update = Update {
            router_id: "abc".to_string(),
            router_name: "lab".to_string(),
            action: Action::Change,
            kind: TableKind::Neighbour,
            entry_id: "n1".to_string(),
            entry,
        };
        let value = serde_json::to_value(update.to_event()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "lab",
                "router": "abc",
                "action": "change",
                "table": "neighbour",
                "id": "n1",
                "data": {"cost": 96},
            })
        );
    }
}
