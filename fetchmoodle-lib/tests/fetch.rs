use std::{convert::Infallible, net::SocketAddr};

use fetchmoodle_lib::{
    dom::Document, Error, ErrorKind, Fetcher, HtmlQuery, LoginFailure, OperationError, Session,
};
use hyper::{
    client::HttpConnector,
    header,
    service::{make_service_fn, service_fn},
    Body, Client, Request, Response, Server, StatusCode,
};

const LOGIN_PAGE: &str = r#"<html><body><form action="/login/index.php" method="post">
<input type="hidden" name="anchor" value="">
<input type="hidden" name="logintoken" value="abc123">
<input type="text" name="username"><input type="password" name="password">
</form></body></html>"#;

const DASHBOARD: &str = r#"<html><head><script>M.cfg = {"wwwroot":"http:\/\/127.0.0.1","sesskey":"key1","sessiontimeout":"7200"};</script></head>
<body><h1>Dashboard</h1></body></html>"#;

const GRADES_PAGE: &str = r#"<html><body><table id="overview-grade"><tbody>
<tr><td class="cell c0"><a href="/grade/report/user/index.php?id=7">Intro to Rust</a></td><td class="cell c1">92.00</td></tr>
</tbody></table></body></html>"#;

const COURSES: &str = r#"[{"error":false,"data":{"courses":[{"id":7,"fullname":"Intro","coursecategory":"Computer Science","viewurl":"/course/view.php?id=7"}]}}]"#;

const FAILING_SERVICE: &str = r#"[{"error":true,"exception":{"message":"boom","errorcode":"x"}}]"#;

/// A tiny stand-in for a Moodle site with one account, `student`/`secret`.
async fn moodle(request: Request<Body>) -> Result<Response<Body>, Infallible> {
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|cookie| cookie.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().unwrap_or_default().to_owned();
    let body = hyper::body::to_bytes(request.into_body()).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    let logged_in = cookie == "MoodleSession=sess1";

    let response = match (method.as_str(), path.as_str()) {
        ("GET", "/login/index.php") => Response::builder()
            .header(header::SET_COOKIE, "MoodleSession=pre1; path=/; HttpOnly")
            .body(Body::from(LOGIN_PAGE)),
        ("POST", "/login/index.php") => {
            if cookie == "MoodleSession=pre1"
                && body
                    == "anchor=&logintoken=abc123&username=student&password=secret"
            {
                Response::builder()
                    .status(StatusCode::SEE_OTHER)
                    .header(header::LOCATION, "/my/")
                    .header(header::SET_COOKIE, "MoodleSession=sess1; path=/; HttpOnly")
                    .body(Body::empty())
            } else {
                Response::builder().body(Body::from(LOGIN_PAGE))
            }
        }
        ("GET", "/my/") if logged_in => Response::builder().body(Body::from(DASHBOARD)),
        ("GET", "/grade/report/overview/index.php") if logged_in => {
            Response::builder().body(Body::from(GRADES_PAGE))
        }
        // An external link: the query is where it points to
        ("GET", "/mod/url/view.php") if logged_in => Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, query.as_str())
            .body(Body::empty()),
        ("GET", "/landing") => Response::builder().body(Body::from(cookie_page(&cookie))),
        // Pages behind a login bounce anonymous visitors to the login page
        ("GET", "/my/" | "/grade/report/overview/index.php") => Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, "/login/index.php")
            .body(Body::empty()),
        ("POST", "/lib/ajax/service.php")
            if logged_in && query.ends_with("&sesskey=key1") =>
        {
            let envelope = if query.starts_with(
                "info=core_course_get_enrolled_courses_by_timeline_classification",
            ) && body.contains(r#""methodname":"core_course_get_enrolled_courses_by_timeline_classification""#)
            {
                COURSES
            } else {
                FAILING_SERVICE
            };
            Response::builder()
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(envelope))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty()),
    };

    Ok(response.unwrap())
}

/// Some other site, which shows the cookie it received and tries to plant its own.
async fn elsewhere(request: Request<Body>) -> Result<Response<Body>, Infallible> {
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|cookie| cookie.to_str().ok())
        .unwrap_or_default();

    Ok(Response::builder()
        .header(header::SET_COOKIE, "MoodleSession=planted; path=/")
        .body(Body::from(cookie_page(cookie)))
        .unwrap())
}

fn cookie_page(cookie: &str) -> String {
    format!(r#"<html><body><p id="cookie">{cookie}</p></body></html>"#)
}

/// Cookie a page reports receiving, after following `mod/url/view.php` to `target`.
struct ReceivedCookie {
    target: String,
}

impl HtmlQuery for ReceivedCookie {
    type Output = String;

    fn path(&self) -> String {
        format!("mod/url/view.php?{}", self.target)
    }

    fn extract(&self, document: &Document<'_>) -> Result<Self::Output, OperationError> {
        document
            .find_id("cookie")
            .map(|cookie| cookie.text())
            .ok_or(OperationError::MissingElement("`#cookie`"))
    }
}

/// Serve the fake site on a random local port and return its base url.
async fn serve() -> String {
    let make_service = make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(moodle)) });
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
    let addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{addr}/")
}

/// Serve the other site on its own port, so it has a different origin.
async fn serve_elsewhere() -> String {
    let make_service = make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(elsewhere)) });
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
    let addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{addr}/landing")
}

fn fetcher() -> Fetcher<HttpConnector> {
    Fetcher::with_client(Client::new())
}

#[tokio::test]
async fn login_populates_session() {
    let base_url = serve().await;
    let mut fetcher = fetcher();

    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let session = fetcher.session();
    assert!(session.is_ready());
    assert_eq!(session.base_url(), Some(base_url.trim_end_matches('/')));
    assert_eq!(session.moodle_session(), Some("sess1"));
    assert_eq!(session.sesskey(), Some("key1"));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let base_url = serve().await;
    let mut fetcher = fetcher();

    let error = fetcher
        .login(&base_url, "student", "wrong")
        .await
        .unwrap_err();

    assert_eq!(error.login_failure(), Some(&LoginFailure::InvalidCredentials));
    assert_eq!(error.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(fetcher.session(), &Session::default());
}

#[tokio::test]
async fn failed_login_clears_previous_session() {
    let base_url = serve().await;
    let mut fetcher = fetcher();

    fetcher.login(&base_url, "student", "secret").await.unwrap();
    assert!(fetcher.login(&base_url, "student", "wrong").await.is_err());

    assert!(!fetcher.session().is_ready());
    assert_eq!(fetcher.session(), &Session::default());
}

#[tokio::test]
async fn unparseable_base_url() {
    let mut fetcher = fetcher();

    match fetcher.login("not a url", "student", "secret").await {
        Err(Error::Login {
            failure: LoginFailure::Unknown(_),
            source: Some(OperationError::InvalidUrl(_)),
        }) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fetcher.session(), &Session::default());
}

#[tokio::test]
async fn unreachable_site_is_network_failure() {
    let mut fetcher = fetcher();

    let error = fetcher
        .login("http://127.0.0.1:1", "student", "secret")
        .await
        .unwrap_err();

    assert_eq!(error.login_failure(), Some(&LoginFailure::Network));
    assert_eq!(error.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn grades_after_login() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let grades = fetcher.get_grades().await.unwrap();

    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].course_name, "Intro to Rust");
    assert_eq!(grades[0].grade.as_deref(), Some("92.00"));
}

#[tokio::test]
async fn courses_after_login() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let courses = fetcher.get_courses().await.unwrap();

    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].id, 7);
    assert_eq!(courses[0].name, "Intro");
}

#[tokio::test]
async fn ajax_error_envelope() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let error = fetcher.get_recent_items().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Application);
    match error {
        Error::Ajax {
            info,
            source: OperationError::Application(message),
        } => {
            assert_eq!(info, "block_recentlyaccesseditems_get_recent_items");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn restored_session_skips_login() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.set_session_data(base_url, "sess1", "key1");

    let grades = fetcher.get_grades().await.unwrap();
    assert_eq!(grades.len(), 1);
}

#[tokio::test]
async fn missing_page_is_status_error() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let error = fetcher.get_course_by_id(7).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Operation);
    match error {
        Error::Html {
            path,
            source: OperationError::Status(status),
        } => {
            assert_eq!(path, "course/view.php?id=7");
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn bad_course_url_is_rejected_before_sending() {
    let mut fetcher = fetcher();
    fetcher.set_session_data("http://127.0.0.1:1", "sess1", "key1");

    let error = fetcher
        .get_course_by_url("https://school.example/mod/forum/view.php?id=7")
        .await
        .unwrap_err();

    assert!(matches!(error, Error::InvalidId(_)));
    assert_eq!(error.kind(), ErrorKind::Parsing);
}

#[tokio::test]
async fn queries_need_a_session() {
    let error = fetcher().get_grades().await.unwrap_err();

    assert!(matches!(
        error,
        Error::Html {
            source: OperationError::NotLoggedIn,
            ..
        }
    ));
}

#[tokio::test]
async fn logout_forgets_session() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    fetcher.logout();

    assert!(!fetcher.session().is_ready());
    assert!(fetcher.get_courses().await.is_err());
}

#[tokio::test]
async fn redirect_on_the_site_keeps_session_cookie() {
    let base_url = serve().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let query = ReceivedCookie {
        target: format!("{base_url}landing"),
    };
    let cookie = fetcher.execute_html(&query).await.unwrap();

    assert_eq!(cookie, "MoodleSession=sess1");
}

#[tokio::test]
async fn redirect_to_another_origin_drops_session_cookie() {
    let base_url = serve().await;
    let other_url = serve_elsewhere().await;
    let mut fetcher = fetcher();
    fetcher.login(&base_url, "student", "secret").await.unwrap();

    let query = ReceivedCookie { target: other_url };
    let cookie = fetcher.execute_html(&query).await.unwrap();

    assert_eq!(cookie, "");
    assert_eq!(fetcher.session().moodle_session(), Some("sess1"));
}
