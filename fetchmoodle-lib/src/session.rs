use std::fmt;

use cookie::Cookie;
use hyper::{header, http::request, HeaderMap};
use log::debug;
use url::Url;

use crate::error::OperationError;

/// Name of the cookie Moodle keeps its session id in.
pub const SESSION_COOKIE_NAME: &str = "MoodleSession";

/// Per-client authentication state.
///
/// Either all of base url, session cookie and sesskey are set or none of them are; the fields are
/// only ever written together.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    base_url: Option<String>,
    moodle_session: Option<String>,
    sesskey: Option<String>,
}

impl Session {
    /// Session restored from previously saved data.
    pub fn new(
        base_url: impl Into<String>,
        moodle_session: impl Into<String>,
        sesskey: impl Into<String>,
    ) -> Self {
        Self {
            base_url: Some(normalize_base_url(&base_url.into())),
            moodle_session: Some(moodle_session.into()),
            sesskey: Some(sesskey.into()),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn moodle_session(&self) -> Option<&str> {
        self.moodle_session.as_deref()
    }

    pub fn sesskey(&self) -> Option<&str> {
        self.sesskey.as_deref()
    }

    /// Whether every field is set. A partially filled session is never usable.
    pub fn is_ready(&self) -> bool {
        [&self.base_url, &self.moodle_session, &self.sesskey]
            .iter()
            .all(|field| field.as_deref().is_some_and(|value| !value.is_empty()))
    }

    /// Forget everything, as a client side logout.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Attach the session cookie to a request being built, if there is one.
    pub fn decorate_cookie(&self, builder: request::Builder) -> request::Builder {
        match &self.moodle_session {
            Some(value) => {
                debug!("attached session cookie");
                builder.header(header::COOKIE, cookie_header(value))
            }
            None => builder,
        }
    }

    /// Append the sesskey query parameter to a request url, if there is one.
    pub fn decorate_sesskey(&self, url: &mut Url) {
        if let Some(sesskey) = &self.sesskey {
            url.query_pairs_mut().append_pair("sesskey", sesskey);
            debug!("attached sesskey");
        }
    }

    /// Base url of a ready session.
    pub(crate) fn ready_base_url(&self) -> Result<&str, OperationError> {
        match &self.base_url {
            Some(base_url) if self.is_ready() => Ok(base_url),
            _ => Err(OperationError::NotLoggedIn),
        }
    }

    pub(crate) fn with_cookie(base_url: &str, moodle_session: String) -> Self {
        Self {
            base_url: Some(base_url.to_owned()),
            moodle_session: Some(moodle_session),
            sesskey: None,
        }
    }

    pub(crate) fn set_moodle_session(&mut self, moodle_session: String) {
        self.moodle_session = Some(moodle_session);
    }

    pub(crate) fn set_sesskey(&mut self, sesskey: String) {
        self.sesskey = Some(sesskey);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(field: &Option<String>) -> &'static str {
            match field {
                Some(_) => "<set>",
                None => "<unset>",
            }
        }

        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("moodle_session", &redacted(&self.moodle_session))
            .field("sesskey", &redacted(&self.sesskey))
            .finish()
    }
}

/// Trim whitespace and trailing slashes so paths can be appended with a single `/`.
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_owned()
}

/// `Cookie` header value carrying the session id.
pub(crate) fn cookie_header(moodle_session: &str) -> String {
    Cookie::new(SESSION_COOKIE_NAME, moodle_session).to_string()
}

/// Value of the last non-empty session cookie set by a response.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        // If it can't be parsed then skip it
        .filter_map(|string| {
            string
                .to_str()
                .ok()
                .and_then(|raw_cookie| Cookie::parse(raw_cookie).ok())
        })
        .filter(|cookie| cookie.name() == SESSION_COOKIE_NAME && !cookie.value().is_empty())
        .last()
        .map(|cookie| cookie.value().to_owned())
}
