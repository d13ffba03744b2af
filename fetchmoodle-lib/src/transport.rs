//! Sending single requests and reading whole responses.

use hyper::{
    body,
    client::connect::Connect,
    header::{self, HeaderValue},
    Body, Client, Method, Request, Response, StatusCode, Uri,
};
use log::{debug, info};
use url::Url;

use crate::{
    error::OperationError,
    session::{session_cookie, Session},
};

const USER_AGENT: &str = "fetchmoodle";
const MAX_REDIRECTS: usize = 10;

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully read response.
#[derive(Debug)]
pub(crate) struct Page {
    /// Url the body was served from, after redirects.
    pub(crate) url: Url,
    pub(crate) status: StatusCode,
    /// Session cookie issued by any response along the way.
    pub(crate) session_cookie: Option<String>,
    pub(crate) body: String,
}

impl Page {
    pub(crate) async fn read(url: Url, response: Response<Body>) -> Result<Self, OperationError> {
        let status = response.status();
        let session_cookie = session_cookie(response.headers());
        let bytes = body::to_bytes(response.into_body()).await?;
        debug!("read {} bytes from {url} ({status})", bytes.len());

        Ok(Self {
            url,
            status,
            session_cookie,
            body: String::from_utf8(bytes.to_vec())?,
        })
    }

    pub(crate) fn ensure_success(&self) -> Result<(), OperationError> {
        if self.status.is_success() {
            Ok(())
        } else {
            Err(OperationError::Status(self.status))
        }
    }
}

/// Send one request decorated with the session cookie, without following redirects.
pub(crate) async fn send<C>(
    client: &Client<C, Body>,
    method: Method,
    url: &Url,
    session: &Session,
    content: Option<(&'static str, String)>,
) -> Result<Response<Body>, OperationError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    info!("{method} {}", redacted(url));
    let uri: Uri = url.as_str().parse()?;
    let builder = session.decorate_cookie(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT),
    );

    let request = match content {
        Some((content_type, content)) => builder
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(content))?,
        None => builder.body(Body::empty())?,
    };

    Ok(client.request(request).await?)
}

/// GET a page, following redirects like a browser would.
///
/// A session cookie issued on the way replaces the one sent on later hops. The cookie only goes
/// to hops on the origin of `url`, and only those hops may issue a new one.
pub(crate) async fn get<C>(
    client: &Client<C, Body>,
    mut url: Url,
    session: &Session,
) -> Result<Page, OperationError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let origin = url.origin();
    let anonymous = Session::default();
    let mut session = session.clone();
    let mut issued = None;

    for _ in 0..=MAX_REDIRECTS {
        let same_origin = url.origin() == origin;
        let hop_session = if same_origin { &session } else { &anonymous };
        let response = send(client, Method::GET, &url, hop_session, None).await?;
        if !same_origin {
            debug!("{} is off the site, sent without the session", redacted(&url));
        } else if let Some(cookie) = session_cookie(response.headers()) {
            session.set_moodle_session(cookie.clone());
            issued = Some(cookie);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|location: &HeaderValue| location.to_str().ok());
        match location {
            Some(location) if response.status().is_redirection() => {
                url = url.join(location)?;
                debug!("redirected to {}", redacted(&url));
            }
            _ => {
                let mut page = Page::read(url, response).await?;
                if !same_origin {
                    page.session_cookie = None;
                }
                page.session_cookie = page.session_cookie.or(issued);
                return Ok(page);
            }
        }
    }

    Err(OperationError::TooManyRedirects(MAX_REDIRECTS))
}

/// POST a url-encoded form, the response is returned as is even when it redirects.
pub(crate) async fn post_form<C>(
    client: &Client<C, Body>,
    url: Url,
    session: &Session,
    form: String,
) -> Result<Page, OperationError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let response = send(
        client,
        Method::POST,
        &url,
        session,
        Some((FORM_CONTENT_TYPE, form)),
    )
    .await?;
    Page::read(url, response).await
}

/// Url without its query, which may carry the sesskey.
fn redacted(url: &Url) -> &str {
    let url = url.as_str();
    url.split_once('?').map_or(url, |(path, _)| path)
}
