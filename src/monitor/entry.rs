// Schema-driven field decoding for monitor table entries

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

use super::scanner::{Scanner, Token};

/// A decoded field value from the monitor feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Int(i64),
    Address(IpAddr),
    Prefix(IpNet),
}

/// Decodes one field value from its token, or fails. Stored per field
/// name in the schema map and dispatched by lookup.
pub type Decoder = Arc<dyn Fn(&str) -> Result<FieldValue> + Send + Sync>;

#[derive(Clone)]
struct Field {
    value: Option<FieldValue>,
    decode: Decoder,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("value", &self.value).finish()
    }
}

/// One keyed record of a table. The field-name set is fixed by the
/// schema at construction; values start absent and fill in as matching
/// field names appear in the feed.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    fields: HashMap<String, Field>,
}

impl Entry {
    pub fn new() -> Self {
        Entry::default()
    }

    fn with_fields(fields: impl IntoIterator<Item = (&'static str, Decoder)>) -> Self {
        let mut entry = Entry::new();
        for (name, decode) in fields {
            entry
                .fields
                .insert(name.to_string(), Field { value: None, decode });
        }
        entry
    }

    /// Register a field; a name can only be registered once.
    pub fn add_field(&mut self, name: &str, decode: Decoder) -> Result<()> {
        if self.fields.contains_key(name) {
            return Err(Error::FieldPresence);
        }
        self.fields
            .insert(name.to_string(), Field { value: None, decode });
        Ok(())
    }

    /// The decoded value of a field, if one has been seen.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(|f| f.value.as_ref())
    }

    /// Every field name of the schema, decoded or not.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Every field that has a decoded value.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .filter_map(|(name, f)| f.value.as_ref().map(|v| (name.as_str(), v)))
    }

    /// Consume `field value` word pairs until end of line or end of
    /// stream, which are returned as the terminal token. A word naming
    /// no known field discards exactly one following token, so newer
    /// daemons with extra fields keep working. Decoder failures are
    /// fatal to the entry.
    pub async fn parse<R: AsyncRead + Unpin>(&mut self, scanner: &mut Scanner<R>) -> Result<Token> {
        loop {
            let name = match scanner.next().await? {
                Token::Word(w) => w,
                terminal => return Ok(terminal),
            };
            let Some(field) = self.fields.get_mut(&name) else {
                tracing::trace!(field = %name, "skipping unrecognized field");
                match scanner.next().await? {
                    Token::Word(_) => continue,
                    terminal => return Ok(terminal),
                }
            };
            match scanner.next().await? {
                Token::Word(w) => field.value = Some((field.decode)(&w)?),
                terminal => return Ok(terminal),
            }
        }
    }
}

/// The four entity kinds a router mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Route,
    Xroute,
    Interface,
    Neighbour,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Route,
        TableKind::Xroute,
        TableKind::Interface,
        TableKind::Neighbour,
    ];

    pub fn parse(word: &str) -> Result<Self> {
        match word {
            "route" => Ok(TableKind::Route),
            "xroute" => Ok(TableKind::Xroute),
            "interface" => Ok(TableKind::Interface),
            "neighbour" => Ok(TableKind::Neighbour),
            _ => Err(Error::UnknownTable(word.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Route => "route",
            TableKind::Xroute => "xroute",
            TableKind::Interface => "interface",
            TableKind::Neighbour => "neighbour",
        }
    }

    /// A fresh entry carrying this kind's schema.
    pub fn new_entry(self) -> Entry {
        match self {
            TableKind::Interface => Entry::with_fields([
                ("up", bool_decoder()),
                ("ipv4", address_decoder()),
                ("ipv6", address_decoder()),
            ]),
            TableKind::Neighbour => Entry::with_fields([
                ("address", address_decoder()),
                ("if", string_decoder()),
                ("reach", uint_decoder(16, 16)),
                ("rxcost", uint_decoder(10, 32)),
                ("txcost", uint_decoder(10, 32)),
                ("cost", uint_decoder(10, 32)),
                ("rtt", string_decoder()),
                ("rttcost", uint_decoder(10, 32)),
            ]),
            TableKind::Route => Entry::with_fields([
                ("prefix", prefix_decoder()),
                ("from", prefix_decoder()),
                ("installed", bool_decoder()),
                ("id", string_decoder()),
                ("metric", int_decoder(10, 32)),
                ("refmetric", uint_decoder(10, 32)),
                ("via", address_decoder()),
                ("if", string_decoder()),
            ]),
            TableKind::Xroute => Entry::with_fields([
                ("prefix", prefix_decoder()),
                ("from", prefix_decoder()),
                ("metric", uint_decoder(10, 32)),
            ]),
        }
    }
}

pub fn string_decoder() -> Decoder {
    Arc::new(|word| Ok(FieldValue::String(word.to_string())))
}

/// babeld localizes its booleans; accept the whole set it emits.
pub fn bool_decoder() -> Decoder {
    Arc::new(|word| match word {
        "true" | "yes" | "oui" | "tak" | "да" => Ok(FieldValue::Bool(true)),
        "false" | "no" | "non" | "nie" | "нет" => Ok(FieldValue::Bool(false)),
        _ => Err(Error::BadBool(word.to_string())),
    })
}

pub fn int_decoder(base: u32, bits: u32) -> Decoder {
    Arc::new(move |word| {
        let value = i64::from_str_radix(word, base).map_err(|source| Error::BadNumber {
            word: word.to_string(),
            source,
        })?;
        if bits < 64 && (value < -(1 << (bits - 1)) || value >= 1 << (bits - 1)) {
            return Err(Error::NumberRange(word.to_string()));
        }
        Ok(FieldValue::Int(value))
    })
}

pub fn uint_decoder(base: u32, bits: u32) -> Decoder {
    Arc::new(move |word| {
        let value = u64::from_str_radix(word, base).map_err(|source| Error::BadNumber {
            word: word.to_string(),
            source,
        })?;
        if bits < 64 && value >> bits != 0 {
            return Err(Error::NumberRange(word.to_string()));
        }
        let value = i64::try_from(value).map_err(|_| Error::NumberRange(word.to_string()))?;
        Ok(FieldValue::Int(value))
    })
}

pub fn address_decoder() -> Decoder {
    Arc::new(|word| {
        word.parse::<IpAddr>()
            .map(FieldValue::Address)
            .map_err(|_| Error::BadAddress(word.to_string()))
    })
}

/// Prefixes are stored in network form, host bits cleared, so that the
/// rendered text is canonical.
pub fn prefix_decoder() -> Decoder {
    Arc::new(|word| {
        word.parse::<IpNet>()
            .map(|net| FieldValue::Prefix(net.trunc()))
            .map_err(|_| Error::BadPrefix(word.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_decoder_multilingual() {
        let decode = bool_decoder();
        for word in ["true", "yes", "oui", "tak", "да"] {
            assert_eq!(decode(word).unwrap(), FieldValue::Bool(true));
        }
        for word in ["false", "no", "non", "nie", "нет"] {
            assert_eq!(decode(word).unwrap(), FieldValue::Bool(false));
        }
        assert!(matches!(decode("maybe"), Err(Error::BadBool(_))));
    }

    #[test]
    fn test_uint_decoder_hex_reach() {
        let decode = uint_decoder(16, 16);
        assert_eq!(decode("ffff").unwrap(), FieldValue::Int(0xffff));
        assert_eq!(decode("8000").unwrap(), FieldValue::Int(0x8000));
        assert!(matches!(decode("10000"), Err(Error::NumberRange(_))));
        assert!(matches!(decode("xyz"), Err(Error::BadNumber { .. })));
    }

    #[test]
    fn test_int_decoder_signed_range() {
        let decode = int_decoder(10, 32);
        assert_eq!(decode("-96").unwrap(), FieldValue::Int(-96));
        assert_eq!(decode("2147483647").unwrap(), FieldValue::Int(2147483647));
        assert!(matches!(decode("2147483648"), Err(Error::NumberRange(_))));
    }

    #[test]
    fn test_address_decoder() {
        let decode = address_decoder();
        assert_eq!(
            decode("2001:db8::1").unwrap(),
            FieldValue::Address("2001:db8::1".parse().unwrap())
        );
        assert_eq!(
            decode("10.0.0.1").unwrap(),
            FieldValue::Address("10.0.0.1".parse().unwrap())
        );
        assert!(matches!(decode("not-an-ip"), Err(Error::BadAddress(_))));
    }

    #[test]
    fn test_prefix_decoder_truncates_host_bits() {
        let decode = prefix_decoder();
        let FieldValue::Prefix(net) = decode("10.0.0.1/24").unwrap() else {
            panic!("expected prefix");
        };
        assert_eq!(net.to_string(), "10.0.0.0/24");
        assert!(matches!(decode("10.0.0.0/33"), Err(Error::BadPrefix(_))));
    }

    #[test]
    fn test_add_field_rejects_duplicates() {
        let mut entry = Entry::new();
        entry.add_field("up", bool_decoder()).unwrap();
        assert!(matches!(
            entry.add_field("up", bool_decoder()),
            Err(Error::FieldPresence)
        ));
    }

    #[test]
    fn test_schemas_have_expected_fields() {
        let neighbour = TableKind::Neighbour.new_entry();
        let mut names: Vec<&str> = neighbour.field_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            ["address", "cost", "if", "reach", "rtt", "rttcost", "rxcost", "txcost"]
        );
        assert_eq!(TableKind::Xroute.new_entry().field_names().count(), 3);
    }

    #[tokio::test]
    async fn test_parse_fills_known_fields() {
        let mut scanner = Scanner::new("address 2001:db8::1 cost 96\n".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        let terminal = entry.parse(&mut scanner).await.unwrap();
        assert_eq!(terminal, Token::Eol);
        assert_eq!(
            entry.get("address"),
            Some(&FieldValue::Address("2001:db8::1".parse().unwrap()))
        );
        assert_eq!(entry.get("cost"), Some(&FieldValue::Int(96)));
        assert_eq!(entry.get("rxcost"), None);
    }

    #[tokio::test]
    async fn test_parse_skips_unknown_field() {
        let mut scanner = Scanner::new("bogusfield xyz cost 10\n".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        entry.parse(&mut scanner).await.unwrap();
        assert_eq!(entry.get("cost"), Some(&FieldValue::Int(10)));
        assert_eq!(entry.values().count(), 1);
    }

    #[tokio::test]
    async fn test_parse_overwrites_previous_value() {
        let mut scanner = Scanner::new("cost 10 cost 20\n".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        entry.parse(&mut scanner).await.unwrap();
        assert_eq!(entry.get("cost"), Some(&FieldValue::Int(20)));
    }

    #[tokio::test]
    async fn test_parse_propagates_decode_error() {
        let mut scanner = Scanner::new("cost ten\n".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        assert!(matches!(
            entry.parse(&mut scanner).await,
            Err(Error::BadNumber { .. })
        ));
    }

    #[tokio::test]
    async fn test_parse_ends_at_eof() {
        let mut scanner = Scanner::new("cost 7".as_bytes());
        let mut entry = TableKind::Neighbour.new_entry();
        let terminal = entry.parse(&mut scanner).await.unwrap();
        assert_eq!(terminal, Token::Eof);
        assert_eq!(entry.get("cost"), Some(&FieldValue::Int(7)));
    }
}
