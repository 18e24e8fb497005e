// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Abstraction over the remote Graph API consumed by targeting specs.
///
/// The core never talks HTTP directly: validation, single reach fetches and
/// batch execution all go through [`GraphClient`], which keeps them testable
/// with mocks and leaves transport concerns (auth, retries) to implementors.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, GraphError};

/// Outcome of one entry in a batch call: the payload a single call would have
/// returned, or the error reported for that entry.
pub type BatchEntry = Result<Value, GraphError,>;

/// Object types accepted by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "lowercase")]
pub enum SearchType
{
    /// Advertising interest entities.
    AdInterest,
}

impl SearchType
{
    /// Returns the literal value sent as the `type` query parameter.
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::AdInterest => "adinterest",
        }
    }
}

/// One entry returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct SearchEntry
{
    /// Remote identifier of the entity, when reported.
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id:    Option<String,>,
    /// Display name of the entity.
    #[serde(default)]
    pub name:  String,
    /// Whether the entity may be used for targeting.
    #[serde(default)]
    pub valid: Option<bool,>,
}

impl SearchEntry
{
    /// Returns `true` only when the remote explicitly flagged the entry valid.
    pub fn is_valid(&self,) -> bool
    {
        self.valid == Some(true,)
    }
}

/// Relative GET request addressed to the Graph API.
///
/// Parameters keep insertion order so the encoded query is deterministic.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct GraphRequest
{
    /// Path relative to the API root, e.g. `act_123/reachestimate`.
    pub path:   String,
    /// Query parameters as `(name, value)` pairs.
    pub params: Vec<(String, String,),>,
}

impl GraphRequest
{
    /// Creates a request for `path` without parameters.
    pub fn new<P,>(path: P,) -> Self
    where
        P: Into<String,>,
    {
        Self {
            path:   path.into(),
            params: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn param<K, V,>(mut self, name: K, value: V,) -> Self
    where
        K: Into<String,>,
        V: Into<String,>,
    {
        self.params.push((name.into(), value.into(),),);
        self
    }

    /// Looks up the first parameter named `name`.
    pub fn get_param(&self, name: &str,) -> Option<&str,>
    {
        self.params.iter().find(|(key, _,)| key == name,).map(|(_, value,)| value.as_str(),)
    }

    /// Renders the request as a relative URL with an encoded query string, as
    /// expected by batch descriptors.
    pub fn relative_url(&self,) -> String
    {
        if self.params.is_empty() {
            return self.path.clone();
        }

        let query = url::form_urlencoded::Serializer::new(String::new(),)
            .extend_pairs(self.params.iter().map(|(key, value,)| (key.as_str(), value.as_str(),),),)
            .finish();
        format!("{}?{query}", self.path)
    }
}

/// Capabilities of the remote Graph API used by this crate.
///
/// Implementations must return batch results positionally aligned with the
/// submitted requests and must report failures of individual entries as
/// `Err` entries instead of failing the whole call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphClient: Send + Sync
{
    /// Searches entities of `kind` matching `term`.
    async fn search(&self, term: &str, kind: SearchType,) -> Result<Vec<SearchEntry,>, Error,>;

    /// Performs a single GET call and returns the decoded payload.
    async fn get(&self, request: &GraphRequest,) -> Result<Value, Error,>;

    /// Submits `requests` as one batch call.
    ///
    /// The outer `Err` is reserved for failures of the call as a whole.
    async fn batch(&self, requests: Vec<GraphRequest,>,) -> Result<Vec<BatchEntry,>, Error,>;
}

/// Extracts the error object from a Graph payload shaped `{"error": {...}}`.
///
/// Returns `None` for regular payloads.
pub fn extract_graph_error(payload: &Value,) -> Option<GraphError,>
{
    let error = payload.as_object()?.get("error",)?;
    match serde_json::from_value::<GraphError,>(error.clone(),) {
        Ok(parsed,) => Some(parsed,),
        Err(_,) => Some(GraphError::new(error.to_string(),),),
    }
}

/// Unwraps the `data` array of a Graph collection payload.
///
/// # Errors
///
/// Returns [`Error::Graph`] when the payload is an error object and
/// [`Error::Decode`] when entries do not match `T`.
pub fn collection_data<T,>(payload: Value,) -> Result<Vec<T,>, Error,>
where
    T: serde::de::DeserializeOwned,
{
    if let Some(error,) = extract_graph_error(&payload,) {
        return Err(error.into(),);
    }

    let data = match payload {
        Value::Object(mut object,) => object.remove("data",).unwrap_or(Value::Array(Vec::new(),),),
        Value::Array(items,) => Value::Array(items,),
        _ => Value::Array(Vec::new(),),
    };
    Ok(serde_json::from_value(data,)?,)
}

fn deserialize_optional_id<'de, D,>(deserializer: D,) -> Result<Option<String,>, D::Error,>
where
    D: serde::Deserializer<'de,>,
{
    let value: Option<Value,> = Option::deserialize(deserializer,)?;
    Ok(match value {
        Some(Value::String(id,),) => Some(id,),
        Some(Value::Number(id,),) => Some(id.to_string(),),
        _ => None,
    },)
}
