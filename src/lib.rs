//! Validation and reach estimation for audience targeting specifications.
//!
//! The library validates targeting specifications (gender, countries and
//! audience qualifiers) before any network access, resolves interest keywords
//! through the Graph API search endpoint, and estimates reach either for a
//! single spec or for large request lists split into bounded batch calls.
//! All remote access goes through the [`GraphClient`] trait;
//! [`HttpGraphClient`] is the bundled HTTP implementation.

mod batch;
mod config;
mod error;
mod graph;
mod http;
mod interest;
mod retry;
mod targeting;
mod validator;

pub use batch::{BatchItem, BatchReachProcessor, MAX_BATCH_SIZE, batch_reaches};
pub use config::{GraphConfig, load_config, load_document, parse_config};
pub use error::{Error, GraphError, io_error};
pub use graph::{BatchEntry, GraphClient, GraphRequest, SearchEntry, SearchType};
pub use http::{HttpGraphClient, parse_batch_response};
pub use interest::{Interest, InterestResolver, ResolvedInterest};
pub use retry::{RetryConfig, retry_with_backoff};
pub use targeting::{
    GeoLocations, ReachEstimate, ReachOptions, TargetingSpec, fetch_reach, normalize_account,
};
pub use validator::{
    AUDIENCE_MESSAGE, CountryWhitelist, GENDER_MESSAGE, Gender, SpecFields, SpecValidator,
};
