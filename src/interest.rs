// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Interest keyword validation and resolution against the search endpoint.
///
/// Keywords are looked up sequentially and resolution stops at the first
/// keyword the platform rejects.
use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::Error,
    graph::{GraphClient, SearchEntry, SearchType},
};

/// Interest identified by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct ResolvedInterest
{
    /// Platform identifier; absent when the search result did not carry one.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_id")]
    pub id:   Option<String,>,
    /// Display name of the interest.
    pub name: String,
}

/// Interest as supplied by callers: a bare keyword awaiting validation or an
/// already resolved object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(untagged)]
pub enum Interest
{
    /// Free-text keyword that must be validated remotely.
    Keyword(String,),
    /// Interest that already carries its identifier.
    Resolved(ResolvedInterest,),
}

impl Interest
{
    /// Returns the keyword when the interest is still unresolved.
    pub fn as_keyword(&self,) -> Option<&str,>
    {
        match self {
            Self::Keyword(keyword,) => Some(keyword.as_str(),),
            Self::Resolved(_,) => None,
        }
    }

    /// Display name of the interest.
    pub fn name(&self,) -> &str
    {
        match self {
            Self::Keyword(keyword,) => keyword,
            Self::Resolved(resolved,) => &resolved.name,
        }
    }
}

impl From<&str,> for Interest
{
    fn from(keyword: &str,) -> Self
    {
        Self::Keyword(keyword.to_owned(),)
    }
}

impl From<ResolvedInterest,> for Interest
{
    fn from(resolved: ResolvedInterest,) -> Self
    {
        Self::Resolved(resolved,)
    }
}

impl fmt::Display for Interest
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.name(),)
    }
}

/// Validates keywords through [`GraphClient::search`].
///
/// Lookups are cached per resolver, so a keyword repeated within one spec is
/// searched once.
pub struct InterestResolver
{
    graph: Arc<dyn GraphClient,>,
    cache: HashMap<String, Option<SearchEntry,>,>,
}

impl fmt::Debug for InterestResolver
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("InterestResolver",).field("cached", &self.cache.len(),).finish()
    }
}

impl InterestResolver
{
    /// Creates a resolver issuing searches through `graph`.
    pub fn new(graph: Arc<dyn GraphClient,>,) -> Self
    {
        Self {
            graph,
            cache: HashMap::new(),
        }
    }

    /// Returns `true` iff the first search result for `term` is flagged valid.
    ///
    /// # Errors
    ///
    /// Propagates errors raised by the search call.
    pub async fn validate_interest(&mut self, term: &str,) -> Result<bool, Error,>
    {
        Ok(self.lookup(term,).await?.is_some_and(|entry| entry.is_valid(),),)
    }

    /// Resolves every interest, validating keywords one after another.
    ///
    /// Resolved objects pass through untouched and never hit the network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyword`] for the first rejected keyword; later
    /// entries are not looked up. Search failures propagate.
    pub async fn validate_interests(
        &mut self,
        interests: &[Interest],
    ) -> Result<Vec<ResolvedInterest,>, Error,>
    {
        let mut resolved = Vec::with_capacity(interests.len(),);

        for interest in interests {
            match interest {
                Interest::Resolved(existing,) => resolved.push(existing.clone(),),
                Interest::Keyword(keyword,) => {
                    let entry = self.lookup(keyword,).await?.filter(SearchEntry::is_valid,);
                    let Some(entry,) = entry else {
                        warn!("interest keyword '{}' rejected by search", keyword);
                        return Err(Error::invalid_keyword(keyword.as_str(),),);
                    };

                    let name = if entry.name.is_empty() { keyword.clone() } else { entry.name };
                    resolved.push(ResolvedInterest {
                        id: entry.id,
                        name,
                    },);
                }
            }
        }

        Ok(resolved,)
    }

    async fn lookup(&mut self, term: &str,) -> Result<Option<SearchEntry,>, Error,>
    {
        if let Some(cached,) = self.cache.get(term,) {
            return Ok(cached.clone(),);
        }

        debug!("searching adinterest entities for '{}'", term);
        let results = self.graph.search(term, SearchType::AdInterest,).await?;
        let first = results.into_iter().next();
        self.cache.insert(term.to_owned(), first.clone(),);
        Ok(first,)
    }
}

fn deserialize_id<'de, D,>(deserializer: D,) -> Result<Option<String,>, D::Error,>
where
    D: serde::Deserializer<'de,>,
{
    let value: Option<serde_json::Value,> = Option::deserialize(deserializer,)?;
    match value {
        None | Some(serde_json::Value::Null,) => Ok(None,),
        Some(serde_json::Value::String(id,),) => Ok(Some(id,),),
        Some(serde_json::Value::Number(id,),) => Ok(Some(id.to_string(),),),
        Some(other,) => Err(serde::de::Error::custom(format!(
            "interest id must be a string or number, got {other}"
        ),),),
    }
}
