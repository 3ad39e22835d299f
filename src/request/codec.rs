//! Transport encoding for execution requests.
//!
//! The request is serialized to depth-bounded JSON and then hex-encoded, so
//! it travels as a single opaque command-line token with no quoting hazards.
//! Decoding supports two structurally-equivalent paths: the typed decoder,
//! and a generic-value fallback that rebuilds the request field by field.
//! Both must yield the identical logical structure; the round-trip tests
//! below pin that down.

use crate::error::{AirlockError, Result};
use crate::request::{ExecutionRequest, Target};
use crate::requirements::Requirement;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Maximum nesting depth the transport form may carry.
///
/// Real requests are shallow; anything deeper indicates a malformed or
/// hostile token and is rejected on both sides.
pub const MAX_DEPTH: usize = 16;

/// Encode a request into a transport token.
pub fn encode(request: &ExecutionRequest) -> Result<String> {
    let value = serde_json::to_value(request).map_err(|err| AirlockError::Encode {
        message: err.to_string(),
    })?;

    let depth = value_depth(&value);
    if depth > MAX_DEPTH {
        return Err(AirlockError::Encode {
            message: format!("structure depth {} exceeds limit {}", depth, MAX_DEPTH),
        });
    }

    Ok(hex::encode(value.to_string()))
}

/// Decode a transport token back into a request.
///
/// Tries the typed decoder first and falls back to the generic-value path,
/// so a token remains readable even when the typed deserializer cannot be
/// used directly. Failure of both paths is fatal.
pub fn decode(token: &str) -> Result<ExecutionRequest> {
    let bytes = hex::decode(token.trim()).map_err(|err| AirlockError::Decode {
        message: format!("invalid token encoding: {}", err),
    })?;

    match serde_json::from_slice::<ExecutionRequest>(&bytes) {
        Ok(request) => Ok(request),
        Err(typed_err) => {
            let value: Value =
                serde_json::from_slice(&bytes).map_err(|_| AirlockError::Decode {
                    message: typed_err.to_string(),
                })?;
            if value_depth(&value) > MAX_DEPTH {
                return Err(AirlockError::Decode {
                    message: format!("structure depth exceeds limit {}", MAX_DEPTH),
                });
            }
            decode_value(&value)
        }
    }
}

/// Rebuild a request from a generic JSON value.
///
/// This is the fallback decoder: it must accept exactly the structures the
/// typed decoder accepts and produce an identical request.
pub fn decode_value(value: &Value) -> Result<ExecutionRequest> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("request is not an object"))?;

    let target_value = obj.get("target").ok_or_else(|| malformed("no target"))?;
    let target_obj = target_value
        .as_object()
        .ok_or_else(|| malformed("target is not an object"))?;
    let kind = target_obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("target has no kind"))?;

    let target = match kind {
        "script" => Target::Script {
            path: PathBuf::from(
                target_obj
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("script target has no path"))?,
            ),
            args: string_array(target_obj.get("args"))?,
        },
        "command" => Target::Command {
            name: target_obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("command target has no name"))?
                .to_string(),
            args: string_array(target_obj.get("args"))?,
            named_args: string_map(target_obj.get("named_args"))?,
        },
        other => {
            return Err(malformed(&format!("unknown target kind '{}'", other)));
        }
    };

    let mut requirements = Vec::new();
    if let Some(list) = obj.get("requirements") {
        let list = list
            .as_array()
            .ok_or_else(|| malformed("requirements is not an array"))?;
        for entry in list {
            let entry = entry
                .as_object()
                .ok_or_else(|| malformed("requirement is not an object"))?;
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("requirement has no name"))?;
            requirements.push(Requirement {
                name: name.to_string(),
                required: opt_string(entry.get("required")),
                minimum: opt_string(entry.get("minimum")),
                maximum: opt_string(entry.get("maximum")),
            });
        }
    }

    Ok(ExecutionRequest {
        target,
        requirements,
        vendored_path: opt_string(obj.get("vendored_path")).map(PathBuf::from),
        install_missing: obj
            .get("install_missing")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        autoload: obj.get("autoload").and_then(Value::as_bool).unwrap_or(false),
        working_dir: opt_string(obj.get("working_dir")).map(PathBuf::from),
        preload: string_array(obj.get("preload"))?,
        registry: opt_string(obj.get("registry")),
    })
}

fn malformed(message: &str) -> AirlockError {
    AirlockError::Decode {
        message: message.to_string(),
    }
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(String::from)
}

fn string_array(value: Option<&Value>) -> Result<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    if value.is_null() {
        return Ok(Vec::new());
    }
    let list = value
        .as_array()
        .ok_or_else(|| malformed("expected a string array"))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| malformed("expected a string array"))
        })
        .collect()
}

fn string_map(value: Option<&Value>) -> Result<BTreeMap<String, String>> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    if value.is_null() {
        return Ok(BTreeMap::new());
    }
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("expected a string map"))?;
    obj.iter()
        .map(|(k, v)| {
            v.as_str()
                .map(|s| (k.clone(), s.to_string()))
                .ok_or_else(|| malformed("expected a string map"))
        })
        .collect()
}

/// Nesting depth of a JSON value (scalars are depth 1).
fn value_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        Value::Object(fields) => 1 + fields.values().map(value_depth).max().unwrap_or(0),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;

    fn sample_request() -> ExecutionRequest {
        let mut named = BTreeMap::new();
        named.insert("database".to_string(), "staging".to_string());
        RequestBuilder::new()
            .requirements(vec![
                Requirement::exact("authkit", "2.30.0"),
                Requirement {
                    name: "reportgen".into(),
                    required: None,
                    minimum: Some("1.4".into()),
                    maximum: Some("2.0".into()),
                },
            ])
            .vendored_path(Some(PathBuf::from("/vendor/libs")))
            .install_missing(true)
            .preload(vec!["tracekit".into()])
            .registry(Some("https://registry.example/v1".into()))
            .command("psql", vec!["--list".into()], named)
    }

    #[test]
    fn round_trip_through_typed_decoder() {
        let request = sample_request();
        let token = encode(&request).unwrap();
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn round_trip_through_generic_decoder() {
        let request = sample_request();
        let token = encode(&request).unwrap();
        let bytes = hex::decode(token).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let decoded = decode_value(&value).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn both_decoders_agree_on_script_targets() {
        let request = ExecutionRequest {
            target: Target::Script {
                path: PathBuf::from("/tasks/deploy.sh"),
                args: vec!["--fast".into()],
            },
            requirements: vec![Requirement::unconstrained("authkit")],
            vendored_path: None,
            install_missing: false,
            autoload: true,
            working_dir: Some(PathBuf::from("/work")),
            preload: Vec::new(),
            registry: None,
        };
        let token = encode(&request).unwrap();

        let typed = decode(&token).unwrap();
        let bytes = hex::decode(&token).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let generic = decode_value(&value).unwrap();

        assert_eq!(typed, request);
        assert_eq!(generic, request);
    }

    #[test]
    fn token_is_a_single_shell_safe_word() {
        let token = encode(&sample_request()).unwrap();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn garbage_token_fails_to_decode() {
        let err = decode("not hex at all").unwrap_err();
        assert!(matches!(err, AirlockError::Decode { .. }));
    }

    #[test]
    fn hex_of_non_json_fails_to_decode() {
        let token = hex::encode("definitely not json");
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, AirlockError::Decode { .. }));
    }

    #[test]
    fn json_without_target_fails_to_decode() {
        let token = hex::encode(r#"{"requirements":[]}"#);
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, AirlockError::Decode { .. }));
    }

    #[test]
    fn unknown_target_kind_fails_to_decode() {
        let token = hex::encode(r#"{"target":{"kind":"daemon","name":"x"}}"#);
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, AirlockError::Decode { .. }));
    }

    #[test]
    fn value_depth_counts_nesting() {
        let flat: Value = serde_json::json!({"a": 1});
        assert_eq!(value_depth(&flat), 2);
        let nested: Value = serde_json::json!({"a": {"b": [{"c": 1}]}});
        assert_eq!(value_depth(&nested), 5);
    }

    #[test]
    fn overly_deep_token_is_rejected() {
        let mut json = String::new();
        for _ in 0..(MAX_DEPTH + 2) {
            json.push_str(r#"{"target":"#);
        }
        json.push_str("1");
        for _ in 0..(MAX_DEPTH + 2) {
            json.push('}');
        }
        let token = hex::encode(&json);
        let err = decode(&token).unwrap_err();
        assert!(matches!(err, AirlockError::Decode { .. }));
    }
}
