// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Batched reach estimation for many targeting specifications.
///
/// Requests are split into chunks of at most [`MAX_BATCH_SIZE`] entries, each
/// chunk is submitted as one batch call, and the per-entry outcomes are
/// reassembled in input order. Failures never abort the batch: they are
/// reported as [`BatchItem`]s with `success: false` at the position of the
/// request that caused them.
use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::Error,
    graph::{BatchEntry, GraphClient, GraphRequest},
    targeting::{ReachOptions, TargetingSpec},
    validator::SpecValidator,
};

/// Maximum number of requests submitted in one batch call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Outcome of one request of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
pub struct BatchItem
{
    /// Whether the reach was fetched.
    pub success: bool,
    /// Reach payload, present iff `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data:    Option<Value,>,
    /// Failure description, present iff not `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:   Option<String,>,
    /// Options of the originating request.
    pub request: ReachOptions,
}

impl BatchItem
{
    fn succeeded(request: &ReachOptions, data: Value,) -> Self
    {
        Self {
            success: true,
            data:    Some(data,),
            error:   None,
            request: request.clone(),
        }
    }

    fn failed(request: &ReachOptions, error: impl Display,) -> Self
    {
        Self {
            success: false,
            data:    None,
            error:   Some(error.to_string(),),
            request: request.clone(),
        }
    }
}

/// Executes reach requests in bounded batches.
pub struct BatchReachProcessor
{
    graph:     Arc<dyn GraphClient,>,
    validator: SpecValidator,
}

impl BatchReachProcessor
{
    /// Creates a processor validating against the platform whitelist.
    pub fn new(graph: Arc<dyn GraphClient,>,) -> Self
    {
        Self::with_validator(graph, SpecValidator::default(),)
    }

    /// Creates a processor using a caller-provided validator.
    pub fn with_validator(graph: Arc<dyn GraphClient,>, validator: SpecValidator,) -> Self
    {
        Self {
            graph,
            validator,
        }
    }

    /// Fetches the reach of every request, one batch call per chunk.
    ///
    /// The result has the same length and order as `requests`. Requests with
    /// an invalid gender or country are reported without being submitted;
    /// everything else, including specs without an audience qualifier, is
    /// sent and judged by the remote per entry. A chunk whose batch call
    /// fails marks each of its submitted requests failed and processing
    /// continues with the next chunk.
    pub async fn batch_reaches(&self, ad_account: &str, requests: &[ReachOptions],) -> Vec<BatchItem,>
    {
        let mut prepared = requests
            .iter()
            .map(|options| self.prepare(ad_account, options,),)
            .collect::<Vec<_,>>()
            .into_iter();

        let mut items = Vec::with_capacity(requests.len(),);
        for (index, chunk,) in requests.chunks(MAX_BATCH_SIZE,).enumerate() {
            let slots: Vec<Result<GraphRequest, Error,>,> = prepared.by_ref().take(chunk.len(),).collect();
            items.extend(self.execute_chunk(index, chunk, slots,).await,);
        }

        let failures = items.iter().filter(|item| !item.success,).count();
        info!("batch reach finished: {} requests, {} failed", items.len(), failures);
        items
    }

    /// Builds the spec for `options` with structural checks only and returns
    /// its reach request.
    fn prepare(&self, ad_account: &str, options: &ReachOptions,) -> Result<GraphRequest, Error,>
    {
        TargetingSpec::with_validator(
            Arc::clone(&self.graph,),
            ad_account,
            options.clone(),
            self.validator.clone(),
        )?
        .reach_request()
    }

    async fn execute_chunk(
        &self,
        index: usize,
        chunk: &[ReachOptions],
        slots: Vec<Result<GraphRequest, Error,>,>,
    ) -> Vec<BatchItem,>
    {
        let submitted: Vec<GraphRequest,> =
            slots.iter().filter_map(|slot| slot.as_ref().ok().cloned(),).collect();

        info!("submitting batch chunk {} with {} of {} requests", index, submitted.len(), chunk.len());
        match self.graph.batch(submitted,).await {
            Ok(entries,) => reassemble(chunk, slots, entries,),
            Err(error,) => {
                warn!("batch chunk {} failed: {}", index, error);
                chunk
                    .iter()
                    .zip(slots,)
                    .map(|(request, slot,)| match slot {
                        Ok(_,) => BatchItem::failed(request, &error,),
                        Err(local,) => BatchItem::failed(request, local,),
                    },)
                    .collect()
            }
        }
    }
}

/// Maps positional batch entries back onto the requests of a chunk.
fn reassemble(
    chunk: &[ReachOptions],
    slots: Vec<Result<GraphRequest, Error,>,>,
    entries: Vec<BatchEntry,>,
) -> Vec<BatchItem,>
{
    let mut entries = entries.into_iter();
    chunk
        .iter()
        .zip(slots,)
        .map(|(request, slot,)| match slot {
            Err(local,) => BatchItem::failed(request, local,),
            Ok(_,) => match entries.next() {
                Some(Ok(data,),) => BatchItem::succeeded(request, data,),
                Some(Err(remote,),) => BatchItem::failed(request, remote,),
                None => BatchItem::failed(request, "batch response is missing this entry",),
            },
        },)
        .collect()
}

/// Fetches the reach of every request through a default
/// [`BatchReachProcessor`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use targeting_reach::{GraphConfig, HttpGraphClient, ReachOptions, batch_reaches};
///
/// # async fn example() -> Result<(), targeting_reach::Error> {
/// let client = HttpGraphClient::new(&GraphConfig::default(), "token",)?;
/// let requests = vec![ReachOptions::default(); 3];
/// let items = batch_reaches(Arc::new(client,), "123", &requests,).await;
/// assert_eq!(items.len(), 3);
/// # Ok(())
/// # }
/// ```
pub async fn batch_reaches(
    graph: Arc<dyn GraphClient,>,
    ad_account: &str,
    requests: &[ReachOptions],
) -> Vec<BatchItem,>
{
    BatchReachProcessor::new(graph,).batch_reaches(ad_account, requests,).await
}

#[cfg(test)]
mod tests
{
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use serde_json::json;

    use super::*;
    use crate::{error::GraphError, graph::MockGraphClient};

    const ACCOUNT: &str = "2ijdsfoij";

    fn request(id: usize,) -> ReachOptions
    {
        serde_json::from_value(json!({
            "geo_locations": {"countries": ["US"]},
            "interests": [{"id": id.to_string(), "name": format!("interest-{id}")}]
        }),)
        .expect("valid options",)
    }

    fn requests(count: usize,) -> Vec<ReachOptions,>
    {
        (0..count).map(request,).collect()
    }

    /// Mock answering each batch with one success per submitted request.
    fn echoing_graph(expected_calls: usize,) -> MockGraphClient
    {
        let mut graph = MockGraphClient::new();
        graph.expect_search().never();
        graph.expect_get().never();
        graph.expect_batch().times(expected_calls,).returning(|submitted| {
            Ok(submitted.iter().map(|request| Ok(json!({"users": 10, "path": request.path})),).collect(),)
        },);
        graph
    }

    #[tokio::test]
    async fn fifty_requests_use_a_single_batch_call()
    {
        let graph = echoing_graph(1,);
        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &requests(50,),).await;
        assert_eq!(items.len(), 50);
        assert!(items.iter().all(|item| item.success));
    }

    #[tokio::test]
    async fn fifty_one_requests_split_into_two_calls()
    {
        let sizes = Arc::new(std::sync::Mutex::new(Vec::new(),),);
        let recorded = Arc::clone(&sizes,);

        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(2,).returning(move |submitted| {
            recorded.lock().expect("lock",).push(submitted.len(),);
            Ok(submitted.iter().map(|_| Ok(json!({"users": 1})),).collect(),)
        },);

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &requests(51,),).await;
        assert_eq!(items.len(), 51);
        assert_eq!(*sizes.lock().expect("lock",), vec![50, 1]);
    }

    #[tokio::test]
    async fn empty_input_issues_no_calls()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_batch().never();

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &[],).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn order_is_preserved_across_chunks()
    {
        let graph = echoing_graph(3,);
        let input = requests(120,);
        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &input,).await;

        assert_eq!(items.len(), input.len());
        for (item, options,) in items.iter().zip(&input,) {
            assert_eq!(&item.request, options);
        }
    }

    #[tokio::test]
    async fn mixed_responses_map_positionally()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(1,).returning(|_| {
            Ok(vec![Ok(json!({"facebook": "response"}),), Err(GraphError::new("Invalid keyword",),)],)
        },);

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &requests(2,),).await;
        assert!(items[0].success);
        assert_eq!(items[0].data, Some(json!({"facebook": "response"})));
        assert_eq!(items[0].error, None);
        assert!(!items[1].success);
        assert_eq!(items[1].data, None);
        assert_eq!(items[1].error.as_deref(), Some("Invalid keyword"));
    }

    #[tokio::test]
    async fn short_responses_report_missing_entries()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(2,).returning(|_| {
            Ok(vec![Ok(json!({"users": 5}),), Err(GraphError::new("boom",),)],)
        },);

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &requests(51,),).await;
        assert_eq!(items.len(), 51);
        assert!(items[0].success);
        assert!(!items[1].success);
        assert!(items[2..50].iter().all(|item| !item.success));
        assert!(items[50].success);
    }

    #[tokio::test]
    async fn failed_chunk_does_not_abort_later_chunks()
    {
        let calls = Arc::new(AtomicUsize::new(0,),);
        let counter = Arc::clone(&calls,);

        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(2,).returning(move |submitted| {
            if counter.fetch_add(1, Ordering::SeqCst,) == 0 {
                Err(Error::transport("connection reset",),)
            } else {
                Ok(submitted.iter().map(|_| Ok(json!({"users": 7})),).collect(),)
            }
        },);

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &requests(60,),).await;
        assert!(items[..50].iter().all(|item| !item.success));
        assert_eq!(items[0].error.as_deref(), Some("transport error: connection reset"));
        assert!(items[50..].iter().all(|item| item.success));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn structurally_invalid_requests_are_not_submitted()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(1,).returning(|submitted| {
            assert_eq!(submitted.len(), 2);
            Ok(vec![
                Ok(json!({"users": 3}),),
                Err(GraphError::new("Need to set :interests or :connections",),),
            ],)
        },);

        let mut input = requests(1,);
        input.insert(0, serde_json::from_value(json!({"gender": "gemale", "connections": ["1"]})).expect("options"),);
        input.push(serde_json::from_value(json!({"geo_locations": {"countries": ["XX"]}})).expect("options"),);
        input.push(ReachOptions::default(),);

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &input,).await;
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].error.as_deref(), Some("Gender can only be male or female"));
        assert!(items[1].success);
        assert_eq!(items[2].error.as_deref(), Some(r#"Invalid countrie(s): ["XX"]"#));
        assert!(!items[3].success);
        assert_eq!(items[3].error.as_deref(), Some("Need to set :interests or :connections"));
    }

    #[tokio::test]
    async fn fifty_requests_without_audience_use_a_single_call()
    {
        let graph = echoing_graph(1,);
        let plain: ReachOptions = serde_json::from_value(json!({"some": "thing"}),).expect("options",);
        let input = vec![plain; 50];

        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &input,).await;
        assert_eq!(items.len(), 50);
        assert!(items.iter().all(|item| item.success));
    }

    #[tokio::test]
    async fn chunk_of_only_invalid_requests_still_issues_its_call()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_batch().times(1,).returning(|submitted| {
            assert!(submitted.is_empty());
            Ok(Vec::new(),)
        },);

        let invalid: ReachOptions = serde_json::from_value(json!({"gender": "robot"}),).expect("options",);
        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &vec![invalid; 3],).await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| !item.success));
    }

    #[tokio::test]
    async fn keywords_are_submitted_without_local_search()
    {
        let mut graph = MockGraphClient::new();
        graph.expect_search().never();
        graph.expect_batch().times(1,).returning(|submitted| {
            let raw = submitted[0].get_param("targeting_spec",).expect("param",);
            let payload: Value = serde_json::from_str(raw,).expect("json",);
            assert_eq!(payload["interests"], json!([{"name": "Eminem"}]));
            assert_eq!(submitted[0].path, "act_2ijdsfoij/reachestimate");
            Ok(vec![Ok(json!({"users": 9}),)],)
        },);

        let input = vec![serde_json::from_value(json!({"interest": "Eminem"})).expect("options",)];
        let items = batch_reaches(Arc::new(graph,), ACCOUNT, &input,).await;
        assert!(items[0].success);
    }

    #[test]
    fn batch_item_serializes_only_relevant_fields()
    {
        let success = BatchItem::succeeded(&ReachOptions::default(), json!({"users": 1}),);
        assert_eq!(
            serde_json::to_value(&success,).expect("serialize",),
            json!({"success": true, "data": {"users": 1}, "request": {}})
        );

        let failure = BatchItem::failed(&ReachOptions::default(), "boom",);
        assert_eq!(
            serde_json::to_value(&failure,).expect("serialize",),
            json!({"success": false, "error": "boom", "request": {}})
        );
    }
}
