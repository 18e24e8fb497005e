// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Structural rules applied to targeting specifications before any network
//! access.
//!
//! Rules are evaluated in a fixed order so that the first surfaced message is
//! deterministic when several are violated: gender, then countries, then the
//! presence of an audience qualifier. The audience rule is only enforced when
//! reach is requested, which is why [`SpecValidator::validate_structural`]
//! and [`SpecValidator::validate`] are separate entry points.

use std::{
    collections::HashSet,
    sync::{Arc, LazyLock},
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Message reported for unsupported gender values.
pub const GENDER_MESSAGE: &str = "Gender can only be male or female";
/// Message reported when neither interests nor connections are present.
pub const AUDIENCE_MESSAGE: &str = "Need to set :interests or :connections";

/// ISO 3166-1 alpha-2 codes served by the advertising platform.
const PLATFORM_COUNTRIES: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX", "AZ",
    "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ", "BR", "BS",
    "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK", "CL", "CM", "CN",
    "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM", "DO", "DZ", "EC", "EE",
    "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF",
    "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM",
    "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IR", "IS", "IT", "JE", "JM",
    "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC",
    "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK",
    "ML", "MM", "MN", "MO", "MP", "MQ", "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA",
    "NC", "NE", "NF", "NG", "NI", "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG",
    "PH", "PK", "PL", "PM", "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW",
    "SA", "SB", "SC", "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS",
    "ST", "SV", "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO",
    "TR", "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

static PLATFORM_WHITELIST: LazyLock<Arc<CountryWhitelist,>,> =
    LazyLock::new(|| Arc::new(CountryWhitelist::new(PLATFORM_COUNTRIES.iter().copied(),),),);

/// Immutable set of country codes accepted in `geo_locations.countries`.
///
/// Membership is case-insensitive: codes are stored upper-cased and lookups
/// upper-case the candidate.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct CountryWhitelist
{
    codes: HashSet<String,>,
}

impl CountryWhitelist
{
    /// Builds a whitelist from arbitrary codes.
    ///
    /// # Examples
    ///
    /// ```
    /// use targeting_reach::CountryWhitelist;
    ///
    /// let whitelist = CountryWhitelist::new(["DE", "fr"],);
    /// assert!(whitelist.contains("de"));
    /// assert!(whitelist.contains("FR"));
    /// assert!(!whitelist.contains("US"));
    /// ```
    pub fn new<I, S,>(codes: I,) -> Self
    where
        I: IntoIterator<Item = S,>,
        S: AsRef<str,>,
    {
        Self {
            codes: codes.into_iter().map(|code| code.as_ref().trim().to_ascii_uppercase(),).collect(),
        }
    }

    /// Returns the process-wide whitelist of platform countries.
    ///
    /// The set is built on first use and shared afterwards.
    pub fn platform() -> Arc<Self,>
    {
        Arc::clone(&PLATFORM_WHITELIST,)
    }

    /// Returns `true` when `code` is part of the whitelist.
    pub fn contains(&self, code: &str,) -> bool
    {
        self.codes.contains(&code.trim().to_ascii_uppercase(),)
    }

    /// Number of codes in the whitelist.
    pub fn len(&self,) -> usize
    {
        self.codes.len()
    }

    /// Returns `true` when the whitelist accepts no country at all.
    pub fn is_empty(&self,) -> bool
    {
        self.codes.is_empty()
    }
}

/// Gender values accepted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,)]
#[serde(rename_all = "lowercase")]
pub enum Gender
{
    /// Targets men.
    Male,
    /// Targets women.
    Female,
}

impl Gender
{
    /// Parses the case-sensitive literal `male` or `female`.
    pub fn from_literal(value: &str,) -> Option<Self,>
    {
        match value {
            "male" => Some(Self::Male,),
            "female" => Some(Self::Female,),
            _ => None,
        }
    }

    /// Numeric code used in the `genders` field of the remote payload.
    pub fn code(self,) -> u8
    {
        match self {
            Self::Male => 1,
            Self::Female => 2,
        }
    }
}

/// Borrowed view of the fields inspected by [`SpecValidator`].
#[derive(Debug, Clone, Copy, Default,)]
pub struct SpecFields<'a,>
{
    /// Raw gender literal, if any.
    pub gender:          Option<&'a str,>,
    /// Raw `geo_locations.countries` entries, if the list was given.
    pub countries:       Option<&'a [String],>,
    /// Whether at least one interest is set.
    pub has_interests:   bool,
    /// Whether at least one connection is set.
    pub has_connections: bool,
}

/// Rule engine checking structural constraints of targeting specifications.
#[derive(Debug, Clone,)]
pub struct SpecValidator
{
    countries: Arc<CountryWhitelist,>,
}

impl Default for SpecValidator
{
    fn default() -> Self
    {
        Self::new(CountryWhitelist::platform(),)
    }
}

impl SpecValidator
{
    /// Creates a validator backed by the provided country whitelist.
    pub fn new(countries: Arc<CountryWhitelist,>,) -> Self
    {
        Self {
            countries,
        }
    }

    /// Returns the whitelist used for country checks.
    pub fn countries(&self,) -> &CountryWhitelist
    {
        &self.countries
    }

    /// Checks the rules that never require network access: gender, then
    /// countries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] carrying the exact rule message.
    pub fn validate_structural(&self, fields: &SpecFields<'_,>,) -> Result<(), Error,>
    {
        check_gender(fields.gender,)?;
        self.check_countries(fields.countries,)
    }

    /// Runs every rule, including the audience qualifier check required
    /// before fetching reach.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for the first violated rule.
    ///
    /// # Examples
    ///
    /// ```
    /// use targeting_reach::{SpecFields, SpecValidator};
    ///
    /// let validator = SpecValidator::default();
    /// let countries = vec!["US".to_owned()];
    /// let fields = SpecFields {
    ///     gender:          Some("female",),
    ///     countries:       Some(countries.as_slice(),),
    ///     has_interests:   false,
    ///     has_connections: false,
    /// };
    /// let error = validator.validate(&fields,).unwrap_err();
    /// assert_eq!(error.to_string(), "Need to set :interests or :connections");
    /// ```
    pub fn validate(&self, fields: &SpecFields<'_,>,) -> Result<(), Error,>
    {
        self.validate_structural(fields,)?;
        check_audience(fields,)
    }

    fn check_countries(&self, countries: Option<&[String],>,) -> Result<(), Error,>
    {
        let Some(countries,) = countries else {
            return Ok((),);
        };

        let offending: Vec<&str,> = countries
            .iter()
            .map(String::as_str,)
            .filter(|code| !self.countries.contains(code,),)
            .collect();

        if offending.is_empty() {
            Ok((),)
        } else {
            Err(Error::validation(format!("Invalid countrie(s): {offending:?}"),),)
        }
    }
}

fn check_gender(gender: Option<&str,>,) -> Result<(), Error,>
{
    match gender {
        Some(value,) if Gender::from_literal(value,).is_none() => {
            Err(Error::validation(GENDER_MESSAGE,),)
        }
        _ => Ok((),),
    }
}

fn check_audience(fields: &SpecFields<'_,>,) -> Result<(), Error,>
{
    if fields.has_interests || fields.has_connections {
        Ok((),)
    } else {
        Err(Error::validation(AUDIENCE_MESSAGE,),)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    fn codes(values: &[&str],) -> Vec<String,>
    {
        values.iter().map(|value| (*value).to_owned(),).collect()
    }

    fn fields<'a,>(gender: Option<&'a str,>, countries: Option<&'a [String],>,) -> SpecFields<'a,>
    {
        SpecFields {
            gender,
            countries,
            has_interests: true,
            has_connections: false,
        }
    }

    #[test]
    fn accepts_both_genders_and_absence()
    {
        let validator = SpecValidator::default();
        let countries = codes(&["US",],);
        for gender in [Some("male",), Some("female",), None,] {
            validator
                .validate(&fields(gender, Some(countries.as_slice(),),),)
                .expect("gender should be accepted",);
        }
    }

    #[test]
    fn rejects_misspelled_gender()
    {
        let validator = SpecValidator::default();
        let error = validator.validate_structural(&fields(Some("gemale",), None,),).unwrap_err();
        assert_eq!(error.to_string(), GENDER_MESSAGE);
    }

    #[test]
    fn gender_is_case_sensitive()
    {
        let validator = SpecValidator::default();
        assert!(validator.validate_structural(&fields(Some("Male",), None,),).is_err());
    }

    #[test]
    fn rejects_unknown_country_with_literal_listing()
    {
        let validator = SpecValidator::default();
        let countries = codes(&["XX",],);
        let error =
            validator.validate_structural(&fields(Some("female",), Some(countries.as_slice(),),),).unwrap_err();
        assert_eq!(error.to_string(), r#"Invalid countrie(s): ["XX"]"#);
    }

    #[test]
    fn lists_every_offending_country_in_input_order()
    {
        let validator = SpecValidator::default();
        let countries = codes(&["ZZ", "US", "xq", "DE", "QQ",],);
        let error = validator.validate_structural(&fields(None, Some(countries.as_slice(),),),).unwrap_err();
        assert_eq!(error.to_string(), r#"Invalid countrie(s): ["ZZ", "xq", "QQ"]"#);
    }

    #[test]
    fn country_lookup_ignores_case()
    {
        let validator = SpecValidator::default();
        let countries = codes(&["us", "De",],);
        validator
            .validate_structural(&fields(None, Some(countries.as_slice(),),),)
            .expect("lowercase codes are known",);
    }

    #[test]
    fn gender_is_reported_before_countries()
    {
        let validator = SpecValidator::default();
        let countries = codes(&["XX",],);
        let error =
            validator.validate_structural(&fields(Some("other",), Some(countries.as_slice(),),),).unwrap_err();
        assert_eq!(error.to_string(), GENDER_MESSAGE);
    }

    #[test]
    fn structural_validation_ignores_missing_audience()
    {
        let validator = SpecValidator::default();
        let bare = SpecFields::default();
        validator.validate_structural(&bare,).expect("structural rules pass",);

        let error = validator.validate(&bare,).unwrap_err();
        assert_eq!(error.to_string(), AUDIENCE_MESSAGE);
    }

    #[test]
    fn connections_satisfy_audience_rule()
    {
        let validator = SpecValidator::default();
        let spec = SpecFields {
            has_connections: true,
            ..SpecFields::default()
        };
        validator.validate(&spec,).expect("connections are an audience qualifier",);
    }

    #[test]
    fn injected_whitelist_replaces_platform_codes()
    {
        let validator = SpecValidator::new(Arc::new(CountryWhitelist::new(["XX",],),),);
        let accepted = codes(&["XX",],);
        validator.validate_structural(&fields(None, Some(accepted.as_slice(),),),).expect("custom code",);

        let rejected = codes(&["US",],);
        let error = validator.validate_structural(&fields(None, Some(rejected.as_slice(),),),).unwrap_err();
        assert_eq!(error.to_string(), r#"Invalid countrie(s): ["US"]"#);
    }

    #[test]
    fn platform_whitelist_is_shared()
    {
        let first = CountryWhitelist::platform();
        let second = CountryWhitelist::platform();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_empty());
        assert!(first.contains("US"));
        assert!(!first.contains("XX"));
    }

    #[test]
    fn gender_codes_match_remote_values()
    {
        assert_eq!(Gender::Male.code(), 1);
        assert_eq!(Gender::Female.code(), 2);
    }

    proptest! {
        #[test]
        fn any_other_gender_is_rejected(value in "[a-zA-Z]{0,12}")
        {
            prop_assume!(value != "male" && value != "female");
            let validator = SpecValidator::default();
            let error = validator
                .validate_structural(&fields(Some(value.as_str()), None))
                .unwrap_err();
            prop_assert_eq!(error.to_string(), GENDER_MESSAGE);
        }

        #[test]
        fn unknown_codes_are_always_listed(prefix in proptest::collection::vec("[A-Z]{3}", 1..5))
        {
            let validator = SpecValidator::default();
            let mut countries = prefix.clone();
            countries.push("US".to_owned());
            let error = validator
                .validate_structural(&fields(None, Some(countries.as_slice())))
                .unwrap_err();
            prop_assert_eq!(error.to_string(), format!("Invalid countrie(s): {prefix:?}"));
        }
    }
}
