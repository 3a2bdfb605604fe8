//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::route::{Metric, RouterId, MAX_ROUTER_ID, MIN_ROUTER_ID};

pub const COMMAND_RESPONSE: u8 = 2;
pub const PROTOCOL_VERSION: u8 = 2;
pub const MAX_ENTRIES_PER_MESSAGE: usize = 25;

/// A single route advertisement inside a response message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RouteEntry {
    pub destination: RouterId,
    pub metric: Metric,
}

/// A decoded, fully validated response message. Entries are a bounded,
/// typed list; the "entry1".."entryN" string-keyed indexing of the wire
/// format never leaves this module.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub source_router_id: RouterId,
    pub entries: Vec<RouteEntry>,
}

impl Message {
    pub fn new(source_router_id: RouterId, entries: Vec<RouteEntry>) -> Self {
        Message {
            source_router_id,
            entries,
        }
    }

    /// A message with zero entries is, by definition, the bootstrap hello.
    pub fn is_hello(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut object = Map::new();
        object.insert("command".to_owned(), Value::from(COMMAND_RESPONSE));
        object.insert("version".to_owned(), Value::from(PROTOCOL_VERSION));
        object.insert(
            "router_id".to_owned(),
            Value::from(self.source_router_id),
        );

        if self.entries.is_empty() {
            object.insert("entry1".to_owned(), Value::Object(Map::new()));
        } else {
            for (i, entry) in self.entries.iter().enumerate() {
                let mut entry_obj = Map::new();
                entry_obj.insert(
                    "destination_router_id".to_owned(),
                    Value::from(entry.destination),
                );
                entry_obj
                    .insert("metric".to_owned(), Value::from(entry.metric.get()));
                object.insert(
                    format!("entry{}", i + 1),
                    Value::Object(entry_obj),
                );
            }
        }

        // Serialization cannot fail: every value above is a plain number or
        // a flat object of plain numbers.
        serde_json::to_vec(&Value::Object(object)).unwrap()
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| DecodeError::MalformedPacket(err.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| malformed("top-level value is not an object"))?;

        let command = read_u8(object, "command")?;
        if command != COMMAND_RESPONSE {
            return Err(DecodeError::InvalidCommand(command));
        }

        let version = read_u8(object, "version")?;
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        let source_router_id = read_u16(object, "router_id")?;

        let entries = decode_entries(object)?;
        if entries.len() > MAX_ENTRIES_PER_MESSAGE {
            return Err(DecodeError::LengthOutOfRange(entries.len()));
        }

        Ok(Message {
            source_router_id,
            entries,
        })
    }
}

fn decode_entries(
    object: &Map<String, Value>,
) -> Result<Vec<RouteEntry>, DecodeError> {
    // Collect every "entryN" key present, in index order.
    let mut indices: Vec<usize> = object
        .keys()
        .filter_map(|key| key.strip_prefix("entry"))
        .filter_map(|suffix| suffix.parse::<usize>().ok())
        .collect();
    indices.sort_unstable();

    if indices.is_empty() {
        return Err(malformed("no entry fields present"));
    }

    // The bootstrap hello is represented on the wire as a single empty
    // "entry1" object; any other shape with an empty entry is malformed.
    if indices == [1] {
        let entry1 = object
            .get("entry1")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("entry1 is not an object"))?;
        if entry1.is_empty() {
            return Ok(Vec::new());
        }
    }

    let mut entries = Vec::with_capacity(indices.len());
    for (expected, index) in (1..).zip(indices) {
        if index != expected {
            return Err(malformed("entry indices are not contiguous"));
        }

        let key = format!("entry{index}");
        let entry_obj = object
            .get(&key)
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("entry is not an object"))?;

        let destination = read_u32(entry_obj, "destination_router_id")?;
        let destination = RouterId::try_from(destination)
            .map_err(|_| DecodeError::InvalidDestination(destination))?;
        if !(MIN_ROUTER_ID..=MAX_ROUTER_ID).contains(&destination) {
            return Err(DecodeError::InvalidDestination(destination as u32));
        }

        let metric = read_u8(entry_obj, "metric")?;
        if metric < 1 || metric > Metric::INFINITE {
            return Err(DecodeError::InvalidMetric(metric));
        }

        entries.push(RouteEntry {
            destination,
            metric: Metric::from(metric),
        });
    }

    Ok(entries)
}

fn read_u8(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<u8, DecodeError> {
    object
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| malformed_field(field))
}

fn read_u16(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<u16, DecodeError> {
    object
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| malformed_field(field))
}

fn read_u32(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<u32, DecodeError> {
    object
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| malformed_field(field))
}

fn malformed(reason: &str) -> DecodeError {
    DecodeError::MalformedPacket(reason.to_owned())
}

fn malformed_field(field: &str) -> DecodeError {
    DecodeError::MalformedPacket(format!("missing or invalid field {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_bootstrap_hello() {
        let bytes = br#"{"command":2,"version":2,"router_id":2,"entry1":{}}"#;
        let message = Message::decode(bytes).unwrap();
        assert_eq!(message.source_router_id, 2);
        assert!(message.is_hello());
    }

    #[test]
    fn decode_single_entry() {
        let bytes = br#"{"command":2,"version":2,"router_id":2,"entry1":{"destination_router_id":3,"metric":4}}"#;
        let message = Message::decode(bytes).unwrap();
        assert_eq!(message.entries.len(), 1);
        assert_eq!(message.entries[0].destination, 3);
        assert_eq!(message.entries[0].metric.get(), 4);
    }

    #[test]
    fn decode_rejects_bad_command() {
        let bytes = br#"{"command":1,"version":2,"router_id":2,"entry1":{}}"#;
        assert!(matches!(
            Message::decode(bytes),
            Err(DecodeError::InvalidCommand(1))
        ));
    }

    #[test]
    fn decode_rejects_bad_version() {
        let bytes = br#"{"command":2,"version":1,"router_id":2,"entry1":{}}"#;
        assert!(matches!(
            Message::decode(bytes),
            Err(DecodeError::InvalidVersion(1))
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_metric() {
        let bytes = br#"{"command":2,"version":2,"router_id":2,"entry1":{"destination_router_id":3,"metric":0}}"#;
        assert!(matches!(
            Message::decode(bytes),
            Err(DecodeError::InvalidMetric(0))
        ));

        let bytes = br#"{"command":2,"version":2,"router_id":2,"entry1":{"destination_router_id":3,"metric":17}}"#;
        assert!(matches!(
            Message::decode(bytes),
            Err(DecodeError::InvalidMetric(17))
        ));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let bytes = b"not json";
        assert!(matches!(
            Message::decode(bytes),
            Err(DecodeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn decode_rejects_too_many_entries() {
        let mut json = String::from(r#"{"command":2,"version":2,"router_id":2"#);
        for i in 1..=26 {
            json.push_str(&format!(
                r#","entry{i}":{{"destination_router_id":3,"metric":4}}"#
            ));
        }
        json.push('}');
        assert!(matches!(
            Message::decode(json.as_bytes()),
            Err(DecodeError::LengthOutOfRange(26))
        ));
    }

    #[test]
    fn encode_decode_round_trip() {
        let message = Message::new(
            1,
            vec![
                RouteEntry {
                    destination: 2,
                    metric: Metric::from(3),
                },
                RouteEntry {
                    destination: 3,
                    metric: Metric::from(7),
                },
            ],
        );
        let bytes = message.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn encode_empty_table_is_hello() {
        let message = Message::new(1, Vec::new());
        let bytes = message.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert!(decoded.is_hello());
    }
}
