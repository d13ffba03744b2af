use hyper::{client::connect::Connect, Body, Client};
use log::debug;
use url::Url;

use crate::{
    course::CourseQuery,
    dom::Document,
    error::{Error, OperationError},
    ids::{CourseId, Resource},
    login,
    model::{Course, CourseInfo, Grade, RecentItem, TimelineEvent, UserProfile},
    queries::{CoursesQuery, GradesQuery, RecentItemsQuery, TimelineQuery, UserProfileQuery},
    query::{AjaxQuery, HtmlQuery, AJAX_PATH},
    session::Session,
    transport::{self, Page, JSON_CONTENT_TYPE},
};

#[cfg(feature = "rustls")]
type HttpsConnector = hyper_rustls::HttpsConnector<hyper::client::HttpConnector>;

/// Client for a single Moodle site and account.
///
/// Logging in and out needs `&mut self`, queries only `&self`, so a login can never race with a
/// query running on the same fetcher.
#[derive(Debug)]
pub struct Fetcher<C> {
    client: Client<C, Body>,
    session: Session,
}

#[cfg(feature = "rustls")]
impl Fetcher<HttpsConnector> {
    /// Fetcher over HTTPS (or plain HTTP) using rustls with the platform's root certificates.
    pub fn new() -> Self {
        Self::with_client(
            Client::builder().build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .https_or_http()
                    .enable_http1()
                    .build(),
            ),
        )
    }
}

#[cfg(feature = "rustls")]
impl Default for Fetcher<HttpsConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Fetcher<C> {
    pub fn with_client(client: Client<C, Body>) -> Self {
        Self {
            client,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resume a session saved from an earlier login instead of logging in again.
    pub fn set_session_data(
        &mut self,
        base_url: impl Into<String>,
        moodle_session: impl Into<String>,
        sesskey: impl Into<String>,
    ) {
        self.session = Session::new(base_url, moodle_session, sesskey);
    }

    /// Forget the session. Nothing is sent to the site.
    pub fn logout(&mut self) {
        self.session.clear();
    }
}

impl<C> Fetcher<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    /// Log in with a username and password.
    ///
    /// The session is only replaced once the whole handshake succeeded. On failure it is left
    /// empty, even if an earlier login had succeeded.
    pub async fn login(
        &mut self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), Error> {
        match login::login(&self.client, base_url, username, password).await {
            Ok(session) => {
                self.session = session;
                Ok(())
            }
            Err(error) => {
                self.session.clear();
                Err(error)
            }
        }
    }

    /// Fetch a page with the session cookie and extract it.
    pub async fn execute_html<Q: HtmlQuery>(&self, query: &Q) -> Result<Q::Output, Error> {
        let path = query.path();
        self.run_html(query, &path)
            .await
            .map_err(|source| Error::Html { path, source })
    }

    /// Call an AJAX service with the session cookie and sesskey and extract its data.
    pub async fn execute_ajax<Q: AjaxQuery>(&self, query: &Q) -> Result<Q::Output, Error> {
        self.run_ajax(query).await.map_err(|source| Error::Ajax {
            info: Q::METHOD_NAME,
            source,
        })
    }

    pub async fn get_grades(&self) -> Result<Vec<Grade>, Error> {
        self.execute_html(&GradesQuery).await
    }

    pub async fn get_courses(&self) -> Result<Vec<CourseInfo>, Error> {
        self.execute_ajax(&CoursesQuery).await
    }

    pub async fn get_course_by_id(&self, id: u32) -> Result<Course, Error> {
        self.execute_html(&CourseQuery::new(CourseId::new(id))).await
    }

    /// Fetch the course a `course/view.php?id=<id>` url points to.
    pub async fn get_course_by_url(&self, url: &str) -> Result<Course, Error> {
        let course = CourseId::parse(url)?;
        self.execute_html(&CourseQuery::new(course)).await
    }

    pub async fn get_recent_items(&self) -> Result<Vec<RecentItem>, Error> {
        self.execute_ajax(&RecentItemsQuery).await
    }

    /// Action events from one week ago onwards.
    pub async fn get_timeline(&self) -> Result<Vec<TimelineEvent>, Error> {
        self.execute_ajax(&TimelineQuery::new()).await
    }

    pub async fn get_user_profile(&self) -> Result<UserProfile, Error> {
        self.execute_html(&UserProfileQuery).await
    }

    async fn run_html<Q: HtmlQuery>(
        &self,
        query: &Q,
        path: &str,
    ) -> Result<Q::Output, OperationError> {
        let base_url = self.session.ready_base_url()?;
        let url = Url::parse(&format!("{base_url}/{path}"))?;

        let page = transport::get(&self.client, url, &self.session).await?;
        page.ensure_success()?;

        let document = Document::parse_with_base(&page.body, page.url.clone())?;
        query.extract(&document)
    }

    async fn run_ajax<Q: AjaxQuery>(&self, query: &Q) -> Result<Q::Output, OperationError> {
        let base_url = self.session.ready_base_url()?;
        let mut url = Url::parse(&format!("{base_url}/{AJAX_PATH}"))?;
        url.query_pairs_mut().append_pair("info", Q::METHOD_NAME);
        self.session.decorate_sesskey(&mut url);

        let content = query.body().map(|body| (JSON_CONTENT_TYPE, body));
        let response =
            transport::send(&self.client, query.method(), &url, &self.session, content).await?;
        let page = Page::read(url, response).await?;
        page.ensure_success()?;
        debug!("{} answered", Q::METHOD_NAME);

        query.parse(&page.body)
    }
}
