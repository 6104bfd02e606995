// Collection body decoding
//
// List endpoints answer either with a bare array or with the array wrapped
// under a resource key (`{"devices": [...]}`). The push channel reuses the
// same shapes for its `data` payloads, so decoding works on `Value`s too.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::models::{Relay, ResourceId, switch_state_from_value};

/// Parse a list response body, accepting `T[]` or `{key: T[]}`.
pub fn decode_listing<T: DeserializeOwned>(body: &str, key: &str) -> Result<Vec<T>, Error> {
    let value: Value = serde_json::from_str(body).map_err(|e| decode_error(&e, body))?;
    listing_from_value(value, key).map_err(|e| match e {
        Error::Deserialization { message, .. } => Error::Deserialization {
            message,
            body: body.to_owned(),
        },
        other => other,
    })
}

/// Same as [`decode_listing`] for an already-parsed payload.
pub fn listing_from_value<T: DeserializeOwned>(value: Value, key: &str) -> Result<Vec<T>, Error> {
    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove(key).ok_or_else(|| Error::Deserialization {
            message: format!("expected an array or an object with a `{key}` array"),
            body: String::new(),
        })?,
        other => {
            return Err(Error::Deserialization {
                message: format!("expected an array, got {}", json_kind(&other)),
                body: String::new(),
            });
        }
    };

    serde_json::from_value(items).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

/// Decode the relay collection.
///
/// Canonical form is an array of relay records (bare or under `relays`).
/// Single-board agents answer `{"relays": {"relay1": true}}` instead; those
/// entries become records with no device or pin, sorted by id.
pub fn relays_from_value(value: Value) -> Result<Vec<Relay>, Error> {
    if let Value::Object(ref map) = value {
        if let Some(Value::Object(states)) = map.get("relays") {
            let mut relays = states
                .iter()
                .map(|(id, state)| {
                    let status = switch_state_from_value(state).ok_or_else(|| {
                        Error::Deserialization {
                            message: format!("invalid state for relay {id}: {state}"),
                            body: String::new(),
                        }
                    })?;
                    Ok(Relay {
                        id: ResourceId::from(id.as_str()),
                        device_id: None,
                        name: id.clone(),
                        gpio_pin: None,
                        status,
                        last_update: None,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            relays.sort_by(|a, b| a.id.cmp(&b.id));
            return Ok(relays);
        }
    }
    listing_from_value(value, "relays")
}

pub(crate) fn decode_relays(body: &str) -> Result<Vec<Relay>, Error> {
    let value: Value = serde_json::from_str(body).map_err(|e| decode_error(&e, body))?;
    relays_from_value(value).map_err(|e| match e {
        Error::Deserialization { message, .. } => Error::Deserialization {
            message,
            body: body.to_owned(),
        },
        other => other,
    })
}

pub(crate) fn decode_error(err: &serde_json::Error, body: &str) -> Error {
    let preview: String = body.chars().take(200).collect();
    Error::Deserialization {
        message: format!("{err} (body preview: {preview:?})"),
        body: body.to_owned(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
