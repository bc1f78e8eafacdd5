//! Wire schemas, one request/response pair per endpoint.
//!
//! Responses are read leniently: a missing or `null` list is empty, a
//! missing `next_token` is `""`, and any numeric slot holding `null`, a
//! non-number or a non-finite value reads as `0.0`. Only a body that is not
//! a JSON object of the right overall shape is rejected.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use atelier::inspection::{AttentionMatrix, InternalState};
use atelier::tokens::TokenRecord;
use atelier::weaver::NextToken;

pub const DEFAULT_INSPECT_TOKENS: u32 = 9999;
pub const DEFAULT_LAYER_INDEX: i32 = -1;
pub const DEFAULT_EMBED_TOKENS: u32 = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaintRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FramesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub frames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NextTokenBody {
    pub context: String,
    pub temperature: f32,
    pub top_k: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NextTokenResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub candidates: Vec<String>,
    #[serde(default, deserialize_with = "lenient_floats")]
    pub probs: Vec<f32>,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub token_ids: Option<Vec<u32>>,
}

impl From<NextTokenResponse> for NextToken {
    fn from(r: NextTokenResponse) -> Self {
        NextToken {
            token: r.next_token,
            candidates: r.candidates,
            probs: r.probs,
            token_ids: r.token_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedBody {
    pub context: String,
    pub num_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EmbeddedToken {
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub token_id: u32,
    #[serde(default, deserialize_with = "lenient_floats")]
    pub embedding: Vec<f32>,
    #[serde(default, deserialize_with = "lenient_opt_floats")]
    pub position: Option<Vec<f32>>,
}

impl From<EmbeddedToken> for TokenRecord {
    fn from(t: EmbeddedToken) -> Self {
        TokenRecord::new(t.token, t.token_id, t.embedding, t.position)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EmbedResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub embeddings: Vec<EmbeddedToken>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InternalForwardBody {
    pub context: String,
    pub num_tokens: u32,
    pub layer_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InternalForwardResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tokens_selected: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub embeddings_selected: Vec<EmbeddedToken>,
    #[serde(default, deserialize_with = "lenient_matrix")]
    pub attention_matrix_selected: Vec<Vec<f32>>,
    #[serde(default, deserialize_with = "lenient_floats")]
    pub logits: Vec<f32>,
}

impl From<InternalForwardResponse> for InternalState {
    fn from(r: InternalForwardResponse) -> Self {
        InternalState {
            tokens: r.tokens_selected,
            records: r.embeddings_selected.into_iter().map(Into::into).collect(),
            attention: AttentionMatrix::from_rows(r.attention_matrix_selected),
            logits: r.logits,
        }
    }
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn number(v: &Value) -> f32 {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match x {
        Some(x) if x.is_finite() && (x as f32).is_finite() => x as f32,
        _ => 0.0,
    }
}

fn id(v: &Value) -> u32 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|x| x.is_finite() && *x >= 0.0).map(|x| x as u64))
            .map(|x| x.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

fn floats(values: Vec<Value>) -> Vec<f32> {
    values.iter().map(number).collect()
}

fn lenient_floats<'de, D>(d: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(d)?
        .map(floats)
        .unwrap_or_default())
}

fn lenient_opt_floats<'de, D>(d: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(d)?.map(floats))
}

fn lenient_matrix<'de, D>(d: D) -> Result<Vec<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<Option<Vec<Value>>>>::deserialize(d)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .map(|r| r.map(floats).unwrap_or_default())
        .collect())
}

fn lenient_id<'de, D>(d: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(d)?.as_ref().map(id).unwrap_or(0))
}

fn lenient_ids<'de, D>(d: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(d)?.map(|v| v.iter().map(id).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_null_fields_default() {
        let r: NextTokenResponse = serde_json::from_value(json!({
            "candidates": null,
        }))
        .expect("object");
        assert_eq!(r.next_token, "");
        assert!(r.candidates.is_empty());
        assert!(r.probs.is_empty());
        assert_eq!(r.token_ids, None);

        let f: FramesResponse = serde_json::from_value(json!({})).expect("object");
        assert!(f.frames.is_empty());
    }

    #[test]
    fn bad_numbers_read_as_zero() {
        let r: NextTokenResponse = serde_json::from_value(json!({
            "next_token": " fox",
            "candidates": [" fox", " dog", " cat"],
            "probs": [0.5, null, "x", "0.25", 1e300],
            "token_ids": [1, 2.0, null],
        }))
        .expect("object");
        assert_eq!(r.probs, [0.5, 0.0, 0.0, 0.25, 0.0]);
        assert_eq!(r.token_ids, Some(vec![1, 2, 0]));
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(serde_json::from_value::<FramesResponse>(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<FramesResponse>(json!(null)).is_err());
        assert!(serde_json::from_value::<FramesResponse>(json!({"frames": "a.png"})).is_err());
    }

    #[test]
    fn internal_forward_maps_to_inspection_state() {
        let r: InternalForwardResponse = serde_json::from_value(json!({
            "tokens_selected": ["Once", " upon"],
            "embeddings_selected": [
                {"token": "Once", "token_id": 7454, "embedding": [0.1, null], "position": [0.5, 0.5]},
                {"token": " upon", "token_id": 5304, "embedding": [0.2, 0.3]}
            ],
            "attention_matrix_selected": [[1.0, 0.0], [0.4, null]],
            "logits": [1.5, -2.0]
        }))
        .expect("object");
        let state: InternalState = r.into();
        assert_eq!(state.tokens.len(), 2);
        assert_eq!(state.records[0].embedding, [0.1, 0.0]);
        assert_eq!(state.records[0].position, Some(vec![0.5, 0.5]));
        assert_eq!(state.records[1].position, None);
        assert_eq!(state.attention.get(1, 1), Some(0.0));
        assert_eq!(state.logits, [1.5, -2.0]);
    }

    #[test]
    fn ragged_attention_is_dropped() {
        let r: InternalForwardResponse = serde_json::from_value(json!({
            "attention_matrix_selected": [[1.0, 0.0], null]
        }))
        .expect("object");
        let state: InternalState = r.into();
        assert!(state.attention.is_empty());
    }

    #[test]
    fn request_bodies_serialize_with_wire_names() {
        let body = InternalForwardBody {
            context: "hi".into(),
            num_tokens: DEFAULT_INSPECT_TOKENS,
            layer_index: DEFAULT_LAYER_INDEX,
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serializable"),
            json!({"context": "hi", "num_tokens": 9999, "layer_index": -1})
        );
    }
}
