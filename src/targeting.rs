// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Targeting specifications and single reach estimation.
//!
//! A [`TargetingSpec`] is built from raw [`ReachOptions`]. Construction runs
//! the structural rules (gender, countries) so invalid input is rejected
//! before any network access. The audience qualifier check and interest
//! validation are deferred to [`TargetingSpec::fetch_reach`] because the
//! latter needs the search endpoint.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::Error,
    graph::{GraphClient, GraphRequest, extract_graph_error},
    interest::{Interest, InterestResolver, ResolvedInterest},
    validator::{Gender, SpecFields, SpecValidator},
};

/// Prefix the platform expects in front of ad account identifiers.
const ACCOUNT_PREFIX: &str = "act_";
/// Edge returning reach estimates for an ad account.
const REACH_EDGE: &str = "reachestimate";
/// Request parameter carrying the encoded targeting payload.
const TARGETING_PARAM: &str = "targeting_spec";

/// Geographic constraints of a targeting specification.
///
/// Only `countries` is validated; other keys (regions, cities, ...) are
/// forwarded to the platform untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize,)]
pub struct GeoLocations
{
    /// ISO country codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String,>,>,
    /// Additional geographic keys passed through verbatim.
    #[serde(flatten)]
    pub extra:     Map<String, Value,>,
}

/// Raw option set describing one reach request.
///
/// # Examples
///
/// ```
/// use targeting_reach::ReachOptions;
///
/// let options: ReachOptions = serde_json::from_str(
///     r#"{"geo_locations": {"countries": ["US"]}, "interest": "foo", "gender": "male"}"#,
/// )
/// .expect("valid options",);
/// assert_eq!(options.interest.as_deref(), Some("foo"));
/// assert_eq!(options.gender.as_deref(), Some("male"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize,)]
pub struct ReachOptions
{
    /// Geographic constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_locations: Option<GeoLocations,>,
    /// Interests as keywords or resolved objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests:     Vec<Interest,>,
    /// Single keyword shorthand appended to `interests`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest:      Option<String,>,
    /// Connection identifiers used as the audience qualifier instead of
    /// interests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections:   Vec<String,>,
    /// `male` or `female`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender:        Option<String,>,
    /// `young`, `old` or absent for all ages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_class:     Option<String,>,
}

impl ReachOptions
{
    /// Interests with the `interest` shorthand appended.
    fn merged_interests(&self,) -> Vec<Interest,>
    {
        let mut interests = self.interests.clone();
        if let Some(keyword,) = self.interest.as_deref().map(str::trim,).filter(|k| !k.is_empty(),) {
            interests.push(Interest::from(keyword,),);
        }
        interests
    }

    /// Fields inspected by [`SpecValidator`], for checks that need no
    /// [`TargetingSpec`] (and hence no graph client).
    pub fn fields(&self,) -> SpecFields<'_,>
    {
        let has_keyword = self.interest.as_deref().is_some_and(|k| !k.trim().is_empty(),);
        SpecFields {
            gender:          self.gender.as_deref(),
            countries:       self.geo_locations.as_ref().and_then(|geo| geo.countries.as_deref(),),
            has_interests:   !self.interests.is_empty() || has_keyword,
            has_connections: !self.connections.is_empty(),
        }
    }
}

/// Reach estimate returned by the platform.
///
/// Fields other than `users` are preserved as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
pub struct ReachEstimate
{
    /// Estimated number of reachable users.
    pub users: u64,
    /// Remaining fields of the remote payload.
    #[serde(flatten)]
    pub extra: Map<String, Value,>,
}

/// Age bounds derived from an age class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default,)]
struct AgeRange
{
    min: Option<u8,>,
    max: Option<u8,>,
}

impl AgeRange
{
    fn from_class(age_class: Option<&str,>,) -> Self
    {
        match age_class {
            None => Self::default(),
            Some("young",) => Self {
                min: Some(13,),
                max: Some(24,),
            },
            Some("old",) => Self {
                min: Some(25,),
                max: None,
            },
            Some(other,) => {
                warn!("unknown age class '{}', targeting all ages", other);
                Self::default()
            }
        }
    }
}

/// Payload encoded into the `targeting_spec` request parameter.
#[derive(Debug, Serialize,)]
struct TargetingPayload
{
    #[serde(skip_serializing_if = "Option::is_none")]
    geo_locations: Option<GeoLocations,>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    interests:     Vec<ResolvedInterest,>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connections:   Vec<String,>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genders:       Option<[u8; 1],>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_min:       Option<u8,>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_max:       Option<u8,>,
}

/// Validated audience targeting specification bound to an ad account.
pub struct TargetingSpec
{
    graph:         Arc<dyn GraphClient,>,
    validator:     SpecValidator,
    resolver:      InterestResolver,
    ad_account_id: String,
    options:       ReachOptions,
    interests:     Vec<Interest,>,
    gender:        Option<Gender,>,
}

impl fmt::Debug for TargetingSpec
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("TargetingSpec",)
            .field("ad_account_id", &self.ad_account_id,)
            .field("interests", &self.interests,)
            .field("connections", &self.options.connections,)
            .field("gender", &self.gender,)
            .field("age_class", &self.options.age_class,)
            .finish_non_exhaustive()
    }
}

impl TargetingSpec
{
    /// Builds a spec validated against the platform country whitelist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the gender or a country is invalid.
    /// No network call is made.
    pub fn new(
        graph: Arc<dyn GraphClient,>,
        ad_account: &str,
        options: ReachOptions,
    ) -> Result<Self, Error,>
    {
        Self::with_validator(graph, ad_account, options, SpecValidator::default(),)
    }

    /// Builds a spec checked by a caller-provided validator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the structural rules fail.
    pub fn with_validator(
        graph: Arc<dyn GraphClient,>,
        ad_account: &str,
        options: ReachOptions,
        validator: SpecValidator,
    ) -> Result<Self, Error,>
    {
        let interests = options.merged_interests();
        let spec = Self {
            resolver: InterestResolver::new(Arc::clone(&graph,),),
            graph,
            validator,
            ad_account_id: normalize_account(ad_account,),
            gender: options.gender.as_deref().and_then(Gender::from_literal,),
            interests,
            options,
        };
        spec.validate_structural()?;
        Ok(spec,)
    }

    /// Ad account identifier in `act_<id>` form.
    pub fn ad_account_id(&self,) -> &str
    {
        &self.ad_account_id
    }

    /// Options the spec was built from.
    pub fn options(&self,) -> &ReachOptions
    {
        &self.options
    }

    /// Current interests; keywords are replaced once resolved.
    pub fn interests(&self,) -> &[Interest]
    {
        &self.interests
    }

    /// Parsed gender, if one was supplied.
    pub fn gender(&self,) -> Option<Gender,>
    {
        self.gender
    }

    fn fields(&self,) -> SpecFields<'_,>
    {
        SpecFields {
            gender:          self.options.gender.as_deref(),
            countries:       self
                .options
                .geo_locations
                .as_ref()
                .and_then(|geo| geo.countries.as_deref(),),
            has_interests:   !self.interests.is_empty(),
            has_connections: !self.options.connections.is_empty(),
        }
    }

    /// Checks gender and countries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for the first violated rule.
    pub fn validate_structural(&self,) -> Result<(), Error,>
    {
        self.validator.validate_structural(&self.fields(),)
    }

    /// Checks every structural rule including the audience qualifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for the first violated rule.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        self.validator.validate(&self.fields(),)
    }

    /// Validates keyword interests remotely and replaces them with resolved
    /// objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyword`] for the first rejected keyword.
    pub async fn validate_interests(&mut self,) -> Result<Vec<ResolvedInterest,>, Error,>
    {
        let resolved = self.resolver.validate_interests(&self.interests,).await?;
        self.interests = resolved.iter().cloned().map(Interest::Resolved,).collect();
        Ok(resolved,)
    }

    /// Returns `true` when the search endpoint accepts `term`.
    ///
    /// # Errors
    ///
    /// Propagates search failures.
    pub async fn validate_interest(&mut self, term: &str,) -> Result<bool, Error,>
    {
        self.resolver.validate_interest(term,).await
    }

    /// Builds the reach request for the current state of the spec.
    ///
    /// Unresolved keywords are sent by name, leaving their validation to the
    /// platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the payload cannot be encoded.
    pub fn reach_request(&self,) -> Result<GraphRequest, Error,>
    {
        let payload = serde_json::to_string(&self.payload(),)?;
        Ok(GraphRequest::new(format!("{}/{REACH_EDGE}", self.ad_account_id),)
            .param(TARGETING_PARAM, payload,),)
    }

    fn payload(&self,) -> TargetingPayload
    {
        let interests: Vec<ResolvedInterest,> = self
            .interests
            .iter()
            .map(|interest| match interest {
                Interest::Resolved(resolved,) => resolved.clone(),
                Interest::Keyword(keyword,) => ResolvedInterest {
                    id:   None,
                    name: keyword.clone(),
                },
            },)
            .collect();

        let connections = if interests.is_empty() {
            self.options.connections.clone()
        } else {
            if !self.options.connections.is_empty() {
                warn!("{}: interests and connections both set, sending interests", self.ad_account_id);
            }
            Vec::new()
        };

        let geo_locations = self.options.geo_locations.clone().map(|mut geo| {
            if let Some(countries,) = geo.countries.as_mut() {
                countries.iter_mut().for_each(|code| *code = code.trim().to_ascii_uppercase(),);
            }
            geo
        },);
        let ages = AgeRange::from_class(self.options.age_class.as_deref(),);

        TargetingPayload {
            geo_locations,
            interests,
            connections,
            genders: self.gender.map(|gender| [gender.code()],),
            age_min: ages.min,
            age_max: ages.max,
        }
    }

    /// Validates the spec, resolves interests and fetches its reach.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when no audience qualifier is set,
    /// [`Error::InvalidKeyword`] for rejected keywords, and propagates remote
    /// failures unchanged.
    pub async fn fetch_reach(&mut self,) -> Result<ReachEstimate, Error,>
    {
        self.validate()?;
        self.validate_interests().await?;

        let request = self.reach_request()?;
        debug!("fetching reach estimate for {}", self.ad_account_id);
        let payload = self.graph.get(&request,).await?;
        if let Some(error,) = extract_graph_error(&payload,) {
            return Err(error.into(),);
        }

        Ok(serde_json::from_value(payload,)?,)
    }
}

/// Builds a [`TargetingSpec`] and fetches its reach in one step.
///
/// # Errors
///
/// Same as [`TargetingSpec::new`] followed by [`TargetingSpec::fetch_reach`].
pub async fn fetch_reach(
    graph: Arc<dyn GraphClient,>,
    ad_account: &str,
    options: ReachOptions,
) -> Result<ReachEstimate, Error,>
{
    TargetingSpec::new(graph, ad_account, options,)?.fetch_reach().await
}

/// Prefixes the account with `act_` unless it already carries it.
pub fn normalize_account(ad_account: &str,) -> String
{
    let trimmed = ad_account.trim();
    if trimmed.starts_with(ACCOUNT_PREFIX,) {
        trimmed.to_owned()
    } else {
        format!("{ACCOUNT_PREFIX}{trimmed}")
    }
}
