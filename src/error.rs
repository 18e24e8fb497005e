#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the targeting crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Unified error type returned by validation, interest resolution, reach
/// fetching, configuration loading and the CLI.
///
/// The [`Display`](std::fmt::Display) output of [`Error::Validation`] and
/// [`Error::InvalidKeyword`] is part of the public contract: callers match on
/// the exact message text.
#[derive(Debug, masterror::Error,)]
pub enum Error
{
    /// Structural rule violated by a targeting specification.
    #[error("{message}")]
    Validation {
        /// Exact, user-facing description of the violated rule.
        message: String,
    },
    /// Interest keyword rejected by the remote search endpoint.
    #[error("{keyword}")]
    InvalidKeyword {
        /// Keyword that failed validation.
        keyword: String,
    },
    /// Error object returned by the Graph API for a call.
    #[error("graph API error: {source}")]
    Graph {
        /// Decoded remote error.
        source: GraphError,
    },
    /// HTTP layer failure before a Graph response could be decoded.
    #[error("transport error: {message}")]
    Transport {
        /// Human readable message describing the failure.
        message: String,
    },
    /// Wraps JSON errors raised while encoding requests or decoding payloads.
    #[error("failed to decode graph payload: {source}")]
    Decode {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },
    /// Wraps I/O errors that occur while reading configuration or request
    /// files.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// Location of the file being read.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Wraps YAML decoding errors.
    #[error("failed to parse document: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error,
    },
}

impl Error
{
    /// Constructs a validation error from the provided message.
    ///
    /// # Parameters
    ///
    /// * `message` - Exact description of the validation failure.
    pub fn validation<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Constructs an invalid keyword error carrying the rejected keyword.
    pub fn invalid_keyword<K,>(keyword: K,) -> Self
    where
        K: Into<String,>,
    {
        Self::InvalidKeyword {
            keyword: keyword.into(),
        }
    }

    /// Constructs a transport error from the provided message.
    pub fn transport<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns `true` when retrying the failed operation may succeed.
    ///
    /// Only transport failures qualify; remote API errors and local
    /// validation failures are deterministic.
    pub fn is_transient(&self,) -> bool
    {
        matches!(self, Self::Transport { .. })
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self,) -> String
    {
        format!("{self}")
    }
}

impl From<GraphError,> for Error
{
    fn from(source: GraphError,) -> Self
    {
        Self::Graph {
            source,
        }
    }
}

impl From<serde_json::Error,> for Error
{
    fn from(source: serde_json::Error,) -> Self
    {
        Self::Decode {
            source,
        }
    }
}

impl From<serde_yaml::Error,> for Error
{
    fn from(source: serde_yaml::Error,) -> Self
    {
        Self::Parse {
            source,
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error,) -> Error
{
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Error object reported by the Graph API, either for a single call or for an
/// individual entry of a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct GraphError
{
    /// Message supplied by the remote API.
    pub message:    String,
    /// Remote error class, e.g. `OAuthException`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String,>,
    /// Numeric remote error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code:       Option<i64,>,
}

impl GraphError
{
    /// Creates an error carrying only a message.
    pub fn new<M,>(message: M,) -> Self
    where
        M: Into<String,>,
    {
        Self {
            message:    message.into(),
            error_type: None,
            code:       None,
        }
    }
}

impl fmt::Display for GraphError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match (&self.error_type, self.code,) {
            (Some(kind,), Some(code,),) => write!(f, "{kind} (#{code}): {}", self.message),
            (Some(kind,), None,) => write!(f, "{kind}: {}", self.message),
            (None, Some(code,),) => write!(f, "(#{code}) {}", self.message),
            (None, None,) => f.write_str(&self.message,),
        }
    }
}

impl std::error::Error for GraphError {}
