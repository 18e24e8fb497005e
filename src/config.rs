// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Configuration document describing how to reach the Graph API.
//!
//! The YAML document mirrors the options accepted by [`HttpGraphClient`]
//! (endpoint, credentials, timeouts and retry policy). Optional values fall
//! back to defaults so a minimal document only needs an access token.
//!
//! [`HttpGraphClient`]: crate::HttpGraphClient

use std::{fs, path::Path};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{self, Error},
    retry::RetryConfig,
};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
const DEFAULT_API_VERSION: &str = "v2.0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration document.
///
/// # Examples
///
/// ```
/// use targeting_reach::parse_config;
///
/// let yaml = r#"
/// access_token: secret
/// ad_account: "123"
/// retry:
///   max_attempts: 5
/// "#;
/// let config = parse_config(yaml,).expect("valid configuration",);
/// assert_eq!(config.endpoint(), "https://graph.facebook.com/v2.0");
/// assert_eq!(config.retry.max_attempts, 5);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq,)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig
{
    /// Token sent as `access_token` with every call.
    #[serde(default)]
    pub access_token: Option<String,>,

    /// Default ad account used when the CLI does not receive one.
    #[serde(default, alias = "account", alias = "ad_account_id")]
    pub ad_account: Option<String,>,

    /// API version segment appended to the base URL.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Root URL of the Graph API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GraphConfig
{
    fn default() -> Self
    {
        Self {
            access_token: None,
            ad_account:   None,
            api_version:  default_api_version(),
            base_url:     default_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry:        RetryConfig::default(),
        }
    }
}

impl GraphConfig
{
    /// Versioned API root, e.g. `https://graph.facebook.com/v2.0`.
    pub fn endpoint(&self,) -> String
    {
        let base = self.base_url.trim_end_matches('/',);
        let version = self.api_version.trim_matches('/',);
        if version.is_empty() { base.to_owned() } else { format!("{base}/{version}") }
    }

    /// Picks the access token, preferring `explicit` over the document value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when neither source provides a token.
    pub fn resolve_access_token(&self, explicit: Option<&str,>,) -> Result<String, Error,>
    {
        explicit
            .or(self.access_token.as_deref(),)
            .map(str::trim,)
            .filter(|token| !token.is_empty(),)
            .map(str::to_owned,)
            .ok_or_else(|| Error::validation("missing access token: set access_token or GRAPH_ACCESS_TOKEN",),)
    }

    /// Picks the ad account, preferring `explicit` over the document value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when neither source provides an account.
    pub fn resolve_ad_account(&self, explicit: Option<&str,>,) -> Result<String, Error,>
    {
        explicit
            .or(self.ad_account.as_deref(),)
            .map(str::trim,)
            .filter(|account| !account.is_empty(),)
            .map(str::to_owned,)
            .ok_or_else(|| Error::validation("missing ad account: pass --account or set ad_account",),)
    }

    fn validate(&self,) -> Result<(), Error,>
    {
        let base = self.base_url.trim();
        if !(base.starts_with("https://",) || base.starts_with("http://",)) {
            return Err(Error::validation(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            ),),);
        }
        if self.timeout_secs == 0 {
            return Err(Error::validation("timeout_secs must be greater than zero",),);
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::validation("retry.max_attempts must be at least 1",),);
        }
        if !(self.retry.backoff_factor >= 1.0) {
            return Err(Error::validation("retry.backoff_factor must be at least 1.0",),);
        }
        Ok((),)
    }
}

/// Loads the configuration from the provided YAML file path.
///
/// # Errors
///
/// Returns an [`Error`] when the file cannot be read, the YAML cannot be
/// deserialized, or the configuration violates invariants.
pub fn load_config(path: &Path,) -> Result<GraphConfig, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_config(&contents,)
}

/// Parses the configuration from a YAML document string.
///
/// An empty document yields the defaults.
///
/// # Errors
///
/// Propagates [`Error::Parse`] when the YAML cannot be decoded and
/// [`Error::Validation`] when values are out of range.
pub fn parse_config(contents: &str,) -> Result<GraphConfig, Error,>
{
    let config = if contents.trim().is_empty() {
        GraphConfig::default()
    } else {
        serde_yaml::from_str::<GraphConfig,>(contents,)?
    };
    config.validate()?;
    Ok(config,)
}

/// Reads a YAML (or JSON) document such as a reach request list.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and [`Error::Parse`]
/// when it does not match `T`.
pub fn load_document<T,>(path: &Path,) -> Result<T, Error,>
where
    T: DeserializeOwned,
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    Ok(serde_yaml::from_str(&contents,)?,)
}

fn default_api_version() -> String
{
    DEFAULT_API_VERSION.to_owned()
}

fn default_base_url() -> String
{
    DEFAULT_BASE_URL.to_owned()
}

fn default_timeout_secs() -> u64
{
    DEFAULT_TIMEOUT_SECS
}
