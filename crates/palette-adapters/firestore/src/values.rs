//! Conversion between plain JSON attributes and Firestore's typed `Value` encoding.
//!
//! Integers travel as decimal strings in `integerValue`; timestamps come back
//! as RFC 3339 strings.

use serde_json::{json, Map, Number, Value};

/// Encode plain attributes into a Firestore `fields` object
pub fn encode_fields(attributes: &Map<String, Value>) -> Map<String, Value> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore `fields` object into plain attributes
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub(crate) fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((tag, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match tag.as_str() {
        "booleanValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // NaN and Infinity arrive as strings
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vals| vals.iter().map(decode_value).collect())
                .unwrap_or_default();
            Value::Array(items)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default();
            Value::Object(fields)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_palette_shape() {
        let attrs = json!({
            "name": "Sunset",
            "isPublic": false,
            "likes": 3,
            "colors": [{ "hex": "#ff0000" }],
            "description": null
        });
        let fields = encode_fields(attrs.as_object().unwrap());

        assert_eq!(fields["name"], json!({ "stringValue": "Sunset" }));
        assert_eq!(fields["isPublic"], json!({ "booleanValue": false }));
        assert_eq!(fields["likes"], json!({ "integerValue": "3" }));
        assert_eq!(fields["description"], json!({ "nullValue": null }));
        assert_eq!(
            fields["colors"],
            json!({ "arrayValue": { "values": [
                { "mapValue": { "fields": { "hex": { "stringValue": "#ff0000" } } } }
            ] } })
        );
    }

    #[test]
    fn test_decode_server_document_fields() {
        let fields = json!({
            "name": { "stringValue": "Ocean" },
            "likes": { "integerValue": "42" },
            "ratio": { "doubleValue": 0.5 },
            "createdAt": { "timestampValue": "2024-03-01T10:00:00.123Z" },
            "tags": { "arrayValue": {} },
            "meta": { "mapValue": {} }
        });
        let attrs = decode_fields(fields.as_object().unwrap());

        assert_eq!(attrs["name"], json!("Ocean"));
        assert_eq!(attrs["likes"], json!(42));
        assert_eq!(attrs["ratio"], json!(0.5));
        assert_eq!(attrs["createdAt"], json!("2024-03-01T10:00:00.123Z"));
        assert_eq!(attrs["tags"], json!([]));
        assert_eq!(attrs["meta"], json!({}));
    }

    #[test]
    fn test_unknown_tags_decode_to_null() {
        assert_eq!(decode_value(&json!({ "mysteryValue": 1 })), Value::Null);
        assert_eq!(decode_value(&json!("bare")), Value::Null);
    }
}
