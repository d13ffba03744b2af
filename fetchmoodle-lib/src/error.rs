use std::{error::Error as StdError, fmt, io, string::FromUtf8Error};

use hyper::StatusCode;
use thiserror::Error;

use crate::ids::ParseIdError;

/// Represents every way an operation against a Moodle site can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A resource url could not be decoded. No request was attempted.
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
    /// The login handshake did not complete. The session was cleared.
    #[error("login failed: {failure}")]
    Login {
        failure: LoginFailure,
        #[source]
        source: Option<OperationError>,
    },
    /// Fetching or extracting an HTML page failed.
    #[error("html query `{path}` failed")]
    Html {
        path: String,
        #[source]
        source: OperationError,
    },
    /// Calling or extracting an AJAX service failed.
    #[error("ajax query `{info}` failed")]
    Ajax {
        info: &'static str,
        #[source]
        source: OperationError,
    },
}

impl Error {
    /// Classify this error into the coarse categories callers usually branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidId(_) => ErrorKind::Parsing,
            Error::Login { failure, .. } => match failure {
                LoginFailure::InvalidCredentials => ErrorKind::InvalidCredentials,
                LoginFailure::Network => ErrorKind::Network,
                LoginFailure::Unknown(_) => ErrorKind::Unknown,
            },
            Error::Html { source, .. } | Error::Ajax { source, .. } => match source {
                OperationError::Application(_) => ErrorKind::Application,
                source if is_network_error(source) => ErrorKind::Network,
                _ => ErrorKind::Operation,
            },
        }
    }

    /// The login failure, if this error came from [`Fetcher::login`](crate::Fetcher::login).
    pub fn login_failure(&self) -> Option<&LoginFailure> {
        match self {
            Error::Login { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed resource identifier input.
    Parsing,
    /// The site rejected the username or password.
    InvalidCredentials,
    /// The site could not be reached (connection, timeout or name resolution).
    Network,
    /// Unsuccessful HTTP status or a response that could not be understood.
    Operation,
    /// The AJAX service answered with its own error envelope.
    Application,
    /// Anything else.
    Unknown,
}

/// Reason a login attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// No session cookie was issued after submitting the credentials.
    InvalidCredentials,
    /// The site could not be reached.
    Network,
    /// Any other failure, with a description of what went wrong.
    Unknown(String),
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginFailure::InvalidCredentials => write!(f, "invalid username or password"),
            LoginFailure::Network => write!(f, "site is unreachable"),
            LoginFailure::Unknown(message) => write!(f, "{message}"),
        }
    }
}

/// Errors raised while running a single request/parse/extract pipeline.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The session holds no base url, cookie or sesskey.
    #[error("not logged in")]
    NotLoggedIn,
    /// The url built for the request is invalid.
    #[error("invalid url")]
    InvalidUrl(#[from] url::ParseError),
    /// An argument to build the HTTP request was invalid.
    /// See more [here](https://docs.rs/http/0.2.8/http/request/struct.Builder.html#errors)
    #[error("an argument while building an HTTP request was invalid")]
    MalformedHttpArgs(#[from] hyper::http::Error),
    /// The url could not be converted into a request uri.
    #[error("invalid request uri")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
    /// Failed to send HTTP request or read its body.
    #[error("failed to send HTTP request")]
    HttpRequestFailed(#[from] hyper::Error),
    /// Redirects kept coming past the limit.
    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),
    /// The site answered with a non-success status.
    #[error("request failed with status {0}")]
    Status(StatusCode),
    /// Response body is not valid Utf-8.
    #[error("response body is not valid Utf-8")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// HTML is not in a valid format.
    #[error("could not parse HTML due to invalid format")]
    InvalidHtml(#[from] tl::errors::ParseError),
    /// Response body is not valid JSON.
    #[error("could not parse JSON response")]
    InvalidJson(#[from] serde_json::Error),
    /// The AJAX service returned no envelope at all.
    #[error("ajax service returned an empty response")]
    EmptyResponse,
    /// The AJAX service reported an error of its own.
    #[error("ajax service reported an error: {0}")]
    Application(String),
    /// A structural anchor the extraction cannot do without is missing.
    /// The most likely causes are an expired session or a site theme changing the page layout.
    #[error("could not find {0} in page")]
    MissingElement(&'static str),
}

/// Walk the whole `source()` chain looking for connection, timeout or name resolution failures.
///
/// Transport errors are usually wrapped a few layers deep, so the immediate error alone is not
/// enough.
pub(crate) fn is_network_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if let Some(error) = error.downcast_ref::<hyper::Error>() {
            if error.is_connect() {
                return true;
            }
        }
        if error.downcast_ref::<io::Error>().is_some() {
            return true;
        }
        current = error.source();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_anywhere_in_chain_is_network() {
        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] io::Error);

        let error = Outer(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(is_network_error(&error));
    }

    #[test]
    fn status_error_is_not_network() {
        assert!(!is_network_error(&OperationError::Status(
            StatusCode::NOT_FOUND
        )));
    }

    #[test]
    fn application_error_kind() {
        let error = Error::Ajax {
            info: "core_course_get_enrolled_courses_by_timeline_classification",
            source: OperationError::Application("boom".to_owned()),
        };
        assert_eq!(error.kind(), ErrorKind::Application);
    }
}
