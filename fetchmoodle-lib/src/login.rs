//! The three step login handshake.
//!
//! 1. `GET login/index.php` for the login token and a first session cookie.
//! 2. `POST` the credentials with that token. Moodle answers a successful login with a fresh
//!    session cookie and a redirect, which is not followed.
//! 3. `GET my/` with the fresh cookie for the sesskey embedded in the dashboard's config script.
//!
//! Each step only moves forward once the previous one produced what it needs.

use std::sync::OnceLock;

use hyper::{client::connect::Connect, Body, Client};
use log::{debug, info, warn};
use regex::Regex;
use url::{form_urlencoded, Url};

use crate::{
    dom::Document,
    error::{is_network_error, Error, LoginFailure, OperationError},
    session::{normalize_base_url, Session},
    transport,
};

const LOGIN_PATH: &str = "login/index.php";
const DASHBOARD_PATH: &str = "my/";

/// Where the handshake currently is.
#[derive(Debug)]
enum State {
    Unauthenticated,
    TokenAcquired { token: String, session: Session },
    SessionEstablished { session: Session },
    SesskeyAcquired { session: Session },
}

/// Run the handshake and return the populated session.
pub(crate) async fn login<C>(
    client: &Client<C, Body>,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<Session, Error>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let base_url = normalize_base_url(base_url);
    info!("logging into {base_url} as {username}");

    let mut state = State::Unauthenticated;
    loop {
        state = match state {
            State::Unauthenticated => acquire_token(client, &base_url).await?,
            State::TokenAcquired { token, session } => {
                establish_session(client, &base_url, session, &token, username, password).await?
            }
            State::SessionEstablished { session } => acquire_sesskey(client, session).await?,
            State::SesskeyAcquired { session } => {
                info!("logged into {base_url}");
                return Ok(session);
            }
        };
        debug!("login moved to {}", state.name());
    }
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Unauthenticated => "unauthenticated",
            State::TokenAcquired { .. } => "token acquired",
            State::SessionEstablished { .. } => "session established",
            State::SesskeyAcquired { .. } => "sesskey acquired",
        }
    }
}

async fn acquire_token<C>(client: &Client<C, Body>, base_url: &str) -> Result<State, Error>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let page = transport::get(client, page_url(base_url, LOGIN_PATH)?, &Session::default())
        .await
        .map_err(failed)?;
    page.ensure_success().map_err(failed)?;

    let token = login_token(&page.body)
        .ok_or_else(|| unknown("login page has no login token"))?;
    let cookie = page
        .session_cookie
        .ok_or_else(|| unknown("login page did not start a session"))?;

    Ok(State::TokenAcquired {
        token,
        session: Session::with_cookie(base_url, cookie),
    })
}

async fn establish_session<C>(
    client: &Client<C, Body>,
    base_url: &str,
    mut session: Session,
    token: &str,
    username: &str,
    password: &str,
) -> Result<State, Error>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let form = form_urlencoded::Serializer::new(String::new())
        .append_pair("anchor", "")
        .append_pair("logintoken", token)
        .append_pair("username", username)
        .append_pair("password", password)
        .finish();

    let page = transport::post_form(client, page_url(base_url, LOGIN_PATH)?, &session, form)
        .await
        .map_err(failed)?;

    // Rejected credentials re-render the login form without issuing a new session
    let Some(cookie) = page.session_cookie else {
        warn!("login for {base_url} was rejected");
        return Err(Error::Login {
            failure: LoginFailure::InvalidCredentials,
            source: None,
        });
    };
    session.set_moodle_session(cookie);

    Ok(State::SessionEstablished { session })
}

async fn acquire_sesskey<C>(client: &Client<C, Body>, mut session: Session) -> Result<State, Error>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let base_url = session.base_url().unwrap_or_default().to_owned();
    let page = transport::get(client, page_url(&base_url, DASHBOARD_PATH)?, &session)
        .await
        .map_err(failed)?;
    page.ensure_success().map_err(failed)?;

    let sesskey = sesskey(&page.body).ok_or_else(|| unknown("dashboard has no sesskey"))?;
    if let Some(cookie) = page.session_cookie {
        session.set_moodle_session(cookie);
    }
    session.set_sesskey(sesskey);

    Ok(State::SesskeyAcquired { session })
}

/// Value of the `logintoken` hidden input of the login form.
pub fn login_token(html: &str) -> Option<String> {
    let document = Document::parse(html).ok()?;
    let input = document.find(|element| {
        element.is("input") && element.attr("name").is_some_and(|name| name == "logintoken")
    })?;
    let token = input.attr("value")?.into_owned();

    Some(token).filter(|token| !token.is_empty())
}

/// Sesskey from the `M.cfg` object every logged in page embeds.
pub fn sesskey(html: &str) -> Option<String> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    let regex = CELL.get_or_init(|| {
        Regex::new(r#""sesskey":"([^"]+)""#).expect("sesskey pattern is a valid regex")
    });

    regex
        .captures(html)
        .map(|captures| captures[1].to_owned())
}

fn page_url(base_url: &str, path: &str) -> Result<Url, Error> {
    Url::parse(&format!("{base_url}/{path}")).map_err(|error| failed(error.into()))
}

/// Classify a step failure.
fn failed(source: OperationError) -> Error {
    let failure = if is_network_error(&source) {
        LoginFailure::Network
    } else {
        LoginFailure::Unknown(source.to_string())
    };

    Error::Login {
        failure,
        source: Some(source),
    }
}

fn unknown(message: &str) -> Error {
    Error::Login {
        failure: LoginFailure::Unknown(message.to_owned()),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_login_token() {
        let html = r#"<form><input type="hidden" name="anchor" value="">
            <input type="hidden" name="logintoken" value="abc123"></form>"#;
        assert_eq!(login_token(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_login_token() {
        assert_eq!(login_token("<form><input name=\"username\"></form>"), None);
        assert_eq!(
            login_token(r#"<input name="logintoken" value="">"#),
            None
        );
    }

    #[test]
    fn finds_sesskey() {
        let html = r#"<script>M.cfg = {"wwwroot":"https:\/\/school.example","sesskey":"Xy12abCD","sessiontimeout":"7200"};</script>"#;
        assert_eq!(sesskey(html).as_deref(), Some("Xy12abCD"));
        assert_eq!(sesskey("<p>no config</p>"), None);
    }

    #[test]
    fn unparseable_base_url_fails_before_any_request() {
        match page_url("not a url", LOGIN_PATH) {
            Err(Error::Login {
                failure: LoginFailure::Unknown(_),
                source: Some(OperationError::InvalidUrl(_)),
            }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
