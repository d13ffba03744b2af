use std::{fmt, str::FromStr};

use thiserror::Error;
use url::Url;

/// A kind of Moodle resource addressed by a canonical url of the form
/// `{base}{PATH}?{PARAM}=<id>`.
pub trait Resource: Sized {
    /// Human readable name of the resource kind, used in errors.
    const KIND: &'static str;
    /// Path suffix the url must end with.
    const PATH: &'static str;
    /// Query parameter holding the numeric id.
    const PARAM: &'static str;

    fn from_id(id: u32) -> Self;

    fn id(&self) -> u32;

    /// Decode a resource from an arbitrary string.
    ///
    /// This is purely structural, no request is made.
    fn parse(raw: &str) -> Result<Self, ParseIdError> {
        let url = Url::parse(raw).map_err(|source| ParseIdError::InvalidUrl {
            kind: Self::KIND,
            given: raw.to_owned(),
            source,
        })?;

        if !url.path().ends_with(Self::PATH) {
            return Err(ParseIdError::WrongPath {
                kind: Self::KIND,
                given: raw.to_owned(),
                path: url.path().to_owned(),
            });
        }

        url.query_pairs()
            .find(|(key, _)| key == Self::PARAM)
            .and_then(|(_, value)| value.parse::<u32>().ok())
            .filter(|id| *id > 0)
            .map(Self::from_id)
            .ok_or_else(|| ParseIdError::MissingId {
                kind: Self::KIND,
                given: raw.to_owned(),
                param: Self::PARAM,
            })
    }

    /// Render the canonical url of this resource on the site at `base`.
    fn url(&self, base: &str) -> String {
        format!(
            "{}{}?{}={}",
            base.trim_end_matches('/'),
            Self::PATH,
            Self::PARAM,
            self.id()
        )
    }
}

/// Id of a course, as found in `course/view.php?id=<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde_support",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CourseId(u32);

impl CourseId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Resource for CourseId {
    const KIND: &'static str = "course";
    const PATH: &'static str = "/course/view.php";
    const PARAM: &'static str = "id";

    fn from_id(id: u32) -> Self {
        Self(id)
    }

    fn id(&self) -> u32 {
        self.0
    }
}

impl FromStr for CourseId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.trim())
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error when decoding a resource url.
#[derive(Debug, Error)]
pub enum ParseIdError {
    /// The input is not a url at all.
    #[error("`{given}` is not a valid {kind} url")]
    InvalidUrl {
        kind: &'static str,
        given: String,
        #[source]
        source: url::ParseError,
    },
    /// The url points somewhere other than the resource page.
    #[error("`{given}` is not a {kind} url, path `{path}` does not match")]
    WrongPath {
        kind: &'static str,
        given: String,
        path: String,
    },
    /// The id parameter is missing or not a positive integer.
    #[error("`{given}` has no valid `{param}` for a {kind}")]
    MissingId {
        kind: &'static str,
        given: String,
        param: &'static str,
    },
}
