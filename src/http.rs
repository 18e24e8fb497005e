// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// HTTP implementation of [`GraphClient`] backed by `reqwest`.
///
/// Transport failures and 5xx responses are retried according to the
/// configured [`RetryConfig`]; error objects returned by the API are
/// surfaced as [`Error::Graph`] without retrying.
use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    config::GraphConfig,
    error::{Error, GraphError},
    graph::{
        BatchEntry, GraphClient, GraphRequest, SearchEntry, SearchType, collection_data,
        extract_graph_error,
    },
    retry::{RetryConfig, retry_with_backoff},
};

/// Graph API client speaking HTTP.
#[derive(Clone,)]
pub struct HttpGraphClient
{
    client:       Client,
    endpoint:     String,
    access_token: String,
    retry:        RetryConfig,
}

impl fmt::Debug for HttpGraphClient
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("HttpGraphClient",)
            .field("endpoint", &self.endpoint,)
            .field("access_token", &"<redacted>",)
            .field("retry", &self.retry,)
            .finish()
    }
}

impl HttpGraphClient
{
    /// Builds a client for the endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the HTTP client cannot be created.
    pub fn new(config: &GraphConfig, access_token: &str,) -> Result<Self, Error,>
    {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs,),)
            .user_agent(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}"),),)?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            access_token: access_token.to_owned(),
            retry: config.retry.clone(),
        },)
    }

    fn url(&self, path: &str,) -> String
    {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/',))
    }

    async fn send_get(&self, path: &str, params: &[(String, String,)],) -> Result<Value, Error,>
    {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path,),)
            .query(params,)
            .query(&[("access_token", self.access_token.as_str(),)],)
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {path} failed: {e}"),),)?;
        decode_response(response,).await
    }

    async fn send_batch(&self, descriptors: &str,) -> Result<Value, Error,>
    {
        debug!("POST batch");
        let response = self
            .client
            .post(self.endpoint.as_str(),)
            .form(&[("access_token", self.access_token.as_str(),), ("batch", descriptors,),],)
            .send()
            .await
            .map_err(|e| Error::transport(format!("batch call failed: {e}"),),)?;
        decode_response(response,).await
    }
}

#[async_trait]
impl GraphClient for HttpGraphClient
{
    async fn search(&self, term: &str, kind: SearchType,) -> Result<Vec<SearchEntry,>, Error,>
    {
        let params = vec![
            ("type".to_owned(), kind.as_str().to_owned(),),
            ("q".to_owned(), term.to_owned(),),
        ];
        let params = params.as_slice();
        let payload =
            retry_with_backoff(&self.retry, &format!("search '{term}'"), move || {
                self.send_get("search", params,)
            },)
            .await?;
        collection_data(payload,)
    }

    async fn get(&self, request: &GraphRequest,) -> Result<Value, Error,>
    {
        retry_with_backoff(&self.retry, &format!("GET {}", request.path), move || {
            self.send_get(&request.path, &request.params,)
        },)
        .await
    }

    async fn batch(&self, requests: Vec<GraphRequest,>,) -> Result<Vec<BatchEntry,>, Error,>
    {
        let descriptors: Vec<Value,> = requests
            .iter()
            .map(|request| json!({"method": "GET", "relative_url": request.relative_url()}),)
            .collect();
        let descriptors = serde_json::to_string(&descriptors,)?;
        let descriptors = descriptors.as_str();

        let payload = retry_with_backoff(&self.retry, "batch", move || self.send_batch(descriptors,),)
            .await?;
        parse_batch_response(payload, requests.len(),)
    }
}

/// Decodes an HTTP response into a JSON payload.
///
/// Server errors are reported as transport errors so they can be retried;
/// error objects in the body become [`Error::Graph`].
async fn decode_response(response: Response,) -> Result<Value, Error,>
{
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::transport(format!("failed to read response body: {e}"),),)?;

    if status.is_server_error() {
        return Err(Error::transport(format!("server responded with {status}"),),);
    }

    let payload: Value = serde_json::from_str(&body,)?;
    if let Some(error,) = extract_graph_error(&payload,) {
        return Err(error.into(),);
    }
    Ok(payload,)
}

/// Converts the raw batch response into positional entries.
///
/// Each element is either `null` (no response) or an object carrying `code`
/// and a JSON-encoded `body`.
///
/// # Errors
///
/// Returns [`Error::Graph`] when the payload is not an array.
pub fn parse_batch_response(payload: Value, expected: usize,) -> Result<Vec<BatchEntry,>, Error,>
{
    let Value::Array(entries,) = payload else {
        return Err(GraphError::new("batch response is not an array",).into(),);
    };

    if entries.len() != expected {
        debug!("batch returned {} entries for {} requests", entries.len(), expected);
    }

    Ok(entries.into_iter().map(decode_batch_entry,).collect(),)
}

fn decode_batch_entry(entry: Value,) -> BatchEntry
{
    let Value::Object(mut object,) = entry else {
        return Err(GraphError::new("no response for batch entry",),);
    };

    let code = object.get("code",).and_then(Value::as_i64,).unwrap_or_default();
    let body = match object.remove("body",) {
        Some(Value::String(raw,),) => serde_json::from_str(&raw,).unwrap_or(Value::String(raw,),),
        Some(other,) => other,
        None => Value::Null,
    };

    if let Some(error,) = extract_graph_error(&body,) {
        return Err(error,);
    }
    if !(200..300).contains(&code,) {
        return Err(GraphError {
            message:    format!("batch entry failed with HTTP status {code}"),
            error_type: None,
            code:       Some(code,),
        },);
    }
    Ok(body,)
}
