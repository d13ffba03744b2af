//! Single pass extractors for grades, enrolled courses, recent items, the timeline and the user
//! profile.

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::{
    dom::Document,
    error::OperationError,
    model::{CourseInfo, Grade, RecentItem, TimelineEvent, UserProfile},
    query::{array_field, bool_field, int_field, str_field, AjaxQuery, HtmlQuery},
};

const UNKNOWN_COURSE: &str = "Unknown course";

/// Grades of every enrolled course, from the overview report.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradesQuery;

impl HtmlQuery for GradesQuery {
    type Output = Vec<Grade>;

    fn path(&self) -> String {
        "grade/report/overview/index.php".to_owned()
    }

    fn extract(&self, document: &Document<'_>) -> Result<Self::Output, OperationError> {
        let table = document
            .find_id("overview-grade")
            .ok_or(OperationError::MissingElement("grades table `#overview-grade`"))?;

        let rows = table
            .descendants()
            .filter(|element| element.is("tbody"))
            .flat_map(|tbody| tbody.children())
            .filter(|row| row.is("tr") && !row.has_class("emptyrow"));

        let mut grades = Vec::new();
        for row in rows {
            let cell = |class: &str| {
                row.children()
                    .find(|cell| cell.is("td") && cell.has_class(class))
            };

            // Rows without a course link are spacers
            let Some(link) = cell("c0").and_then(|cell| cell.children().next()) else {
                continue;
            };
            let grade = cell("c1")
                .map(|cell| cell.text())
                .filter(|grade| !grade.is_empty() && grade != "-");

            grades.push(Grade {
                course_name: link.text(),
                url: link.attr("href").map(|href| href.into_owned()).unwrap_or_default(),
                grade,
            });
        }

        Ok(grades)
    }
}

/// Every course the user is enrolled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoursesQuery;

impl AjaxQuery for CoursesQuery {
    type Output = Vec<CourseInfo>;

    const METHOD_NAME: &'static str = "core_course_get_enrolled_courses_by_timeline_classification";

    fn args(&self) -> Option<Value> {
        Some(json!({
            "offset": 0,
            "limit": 0,
            "classification": "all",
            "sort": "fullname",
            "customfieldname": "",
            "customfieldvalue": "",
            "requiredfields": [
                "id",
                "fullname",
                "shortname",
                "showcoursecategory",
                "showshortname",
                "visible",
                "enddate",
            ],
        }))
    }

    fn extract(&self, data: Value) -> Result<Self::Output, OperationError> {
        Ok(array_field(&data, "courses")
            .iter()
            .map(|course| CourseInfo {
                id: id_field(course, "id"),
                name: string_field(course, "fullname", UNKNOWN_COURSE),
                category: string_field(course, "coursecategory", "Unknown category"),
                url: string_field(course, "viewurl", ""),
            })
            .collect())
    }
}

/// Items shown in the recently accessed items block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecentItemsQuery;

impl AjaxQuery for RecentItemsQuery {
    type Output = Vec<RecentItem>;

    const METHOD_NAME: &'static str = "block_recentlyaccesseditems_get_recent_items";

    fn args(&self) -> Option<Value> {
        Some(json!({ "limit": 0 }))
    }

    fn extract(&self, data: Value) -> Result<Self::Output, OperationError> {
        let items = data.as_array().map(Vec::as_slice).unwrap_or_default();
        Ok(items
            .iter()
            .map(|item| RecentItem {
                id: id_field(item, "id"),
                mod_name: string_field(item, "modname", ""),
                name: string_field(item, "name", "Unknown item"),
                course_id: id_field(item, "courseid"),
                course_name: string_field(item, "coursename", UNKNOWN_COURSE),
                cm_id: id_field(item, "cmid"),
                time_access: int_field(item, "timeaccess").unwrap_or(0),
                view_url: string_field(item, "viewurl", ""),
                icon_html: string_field(item, "icon", ""),
            })
            .collect())
    }
}

/// Action events (due assignments, closing quizzes, ...) sorted by time.
#[derive(Debug, Clone, Copy)]
pub struct TimelineQuery {
    from: i64,
}

impl TimelineQuery {
    /// The service refuses to return more than this many events per call.
    pub const LIMIT: u32 = 50;

    /// Events from one week ago onwards, so recently overdue ones are included.
    pub fn new() -> Self {
        Self::since((Utc::now() - Duration::days(7)).timestamp())
    }

    /// Events sorted at or after `timestamp`, in seconds since the unix epoch.
    pub fn since(timestamp: i64) -> Self {
        Self { from: timestamp }
    }
}

impl Default for TimelineQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl AjaxQuery for TimelineQuery {
    type Output = Vec<TimelineEvent>;

    const METHOD_NAME: &'static str = "core_calendar_get_action_events_by_timesort";

    fn args(&self) -> Option<Value> {
        Some(json!({
            "limitnum": Self::LIMIT,
            "timesortfrom": self.from,
            "limittononsuspendedevents": true,
        }))
    }

    fn extract(&self, data: Value) -> Result<Self::Output, OperationError> {
        Ok(array_field(&data, "events")
            .iter()
            .map(|event| {
                let course = event.get("course").unwrap_or(&Value::Null);
                let action = event.get("action").unwrap_or(&Value::Null);
                let icon = event.get("icon").unwrap_or(&Value::Null);

                TimelineEvent {
                    id: id_field(event, "id"),
                    name: string_field(event, "name", "Unknown event"),
                    activity_name: string_field(event, "activityname", ""),
                    module_type: str_field(event, "component")
                        .and_then(|component| component.strip_prefix("mod_"))
                        .unwrap_or_default()
                        .to_owned(),
                    description: string_field(event, "description", ""),
                    time_sort: int_field(event, "timesort").unwrap_or(0),
                    overdue: bool_field(event, "overdue").unwrap_or(false),
                    course_id: id_field(course, "id"),
                    course_name: string_field(course, "fullname", UNKNOWN_COURSE),
                    icon_url: string_field(icon, "iconurl", ""),
                    action_name: string_field(action, "name", ""),
                    action_url: str_field(action, "url")
                        .or_else(|| str_field(event, "viewurl"))
                        .unwrap_or_default()
                        .to_owned(),
                }
            })
            .collect())
    }
}

/// Name and picture of the logged in user.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserProfileQuery;

impl HtmlQuery for UserProfileQuery {
    type Output = UserProfile;

    fn path(&self) -> String {
        "user/profile.php".to_owned()
    }

    fn extract(&self, document: &Document<'_>) -> Result<Self::Output, OperationError> {
        let name = document
            .find(|element| {
                element.is("h1") && element.has_class("h2") && element.has_class("mb-0")
            })
            .ok_or(OperationError::MissingElement("profile name heading"))?
            .text();

        // The last picture is the profile's own, earlier ones belong to the navbar
        let picture_url = document
            .elements()
            .filter(|element| element.is("img") && element.has_class("userpicture"))
            .last()
            .and_then(|picture| picture.attr("src"))
            .map(|src| src.into_owned());

        Ok(UserProfile { name, picture_url })
    }
}

fn string_field(value: &Value, key: &str, default: &str) -> String {
    str_field(value, key).unwrap_or(default).to_owned()
}

fn id_field(value: &Value, key: &str) -> u32 {
    int_field(value, key)
        .and_then(|id| u32::try_from(id).ok())
        .unwrap_or(0)
}
