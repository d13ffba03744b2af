//! Log into a Moodle site and fetch grades, enrolled courses, course contents, recently accessed
//! items, the timeline and the user profile.
//!
//! ```no_run
//! # async fn run() -> Result<(), fetchmoodle_lib::Error> {
//! let mut fetcher = fetchmoodle_lib::Fetcher::new();
//! fetcher
//!     .login("https://moodle.school.example", "student", "hunter2")
//!     .await?;
//!
//! for course in fetcher.get_courses().await? {
//!     println!("{} | {}", course.id, course.name);
//! }
//! # Ok(())
//! # }
//! ```

mod course;
pub mod dom;
mod error;
mod fetcher;
mod ids;
mod login;
mod model;
mod queries;
mod query;
mod session;
mod transport;

pub use course::CourseQuery;
pub use error::{Error, ErrorKind, LoginFailure, OperationError};
pub use fetcher::Fetcher;
pub use ids::{CourseId, ParseIdError, Resource};
pub use login::{login_token, sesskey};
pub use model::{
    Assignment, Availability, Course, CourseInfo, Grade, Label, Module, ModuleCommon, Quiz,
    RecentItem, Resource as ResourceModule, Section, SectionLike, SubSection, TimelineEvent,
    Unknown, UserProfile,
};
pub use queries::{CoursesQuery, GradesQuery, RecentItemsQuery, TimelineQuery, UserProfileQuery};
pub use query::{envelope_data, AjaxQuery, HtmlQuery, AJAX_PATH};
pub use session::{Session, SESSION_COOKIE_NAME};
