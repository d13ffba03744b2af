//! Models extracted from Moodle responses.

use chrono::{DateTime, Utc};
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use crate::{dom::Document, ids::CourseId};

/// Row of the grades overview report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Grade {
    pub course_name: String,
    pub url: String,
    /// `None` when the report shows nothing or a dash.
    pub grade: Option<String>,
}

/// Enrolled course as listed on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct CourseInfo {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub url: String,
}

/// Recently accessed activity or resource.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct RecentItem {
    pub id: u32,
    /// Module kind, e.g. `resource` or `quiz`.
    pub mod_name: String,
    pub name: String,
    pub course_id: u32,
    pub course_name: String,
    /// Course module id.
    pub cm_id: u32,
    /// Seconds since the unix epoch.
    pub time_access: i64,
    pub view_url: String,
    /// Markup of the module icon as sent by the server.
    pub icon_html: String,
}

impl RecentItem {
    /// Url of the icon image, if the icon markup has one.
    pub fn icon_url(&self) -> Option<String> {
        let document = Document::parse(&self.icon_html).ok()?;
        let url = document
            .find(|element| element.is("img"))?
            .attr("src")?
            .into_owned();
        Some(url)
    }

    pub fn accessed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_access, 0)
    }
}

/// Upcoming or recently overdue calendar action event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct TimelineEvent {
    pub id: u32,
    pub name: String,
    pub activity_name: String,
    /// Module kind with the `mod_` component prefix removed, e.g. `assign`.
    pub module_type: String,
    pub description: String,
    /// Seconds since the unix epoch the event is sorted by, usually its due time.
    pub time_sort: i64,
    pub overdue: bool,
    pub course_id: u32,
    pub course_name: String,
    pub icon_url: String,
    pub action_name: String,
    pub action_url: String,
}

impl TimelineEvent {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_sort, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct UserProfile {
    pub name: String,
    pub picture_url: Option<String>,
}

/// A course page with its full section tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Course {
    pub id: CourseId,
    /// Internal context id, used to scope requests to this course.
    pub context_id: u64,
    pub name: String,
    /// Category from the breadcrumb, not every theme renders one.
    pub category: Option<String>,
    pub sections: Vec<Section>,
}

/// Anything with a name, an optional summary and a list of modules.
pub trait SectionLike {
    fn name(&self) -> &str;

    fn summary(&self) -> Option<&str>;

    fn modules(&self) -> &[Module];
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Section {
    pub id: u32,
    pub number: u32,
    pub name: String,
    pub summary: Option<String>,
    pub modules: Vec<Module>,
}

impl SectionLike for Section {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn modules(&self) -> &[Module] {
        &self.modules
    }
}

/// Activity or resource placed in a section.
///
/// Kinds the library does not know about are kept as [`Module::Unknown`] instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde_support",
    derive(Serialize, Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum Module {
    Resource(Resource),
    Assignment(Assignment),
    Quiz(Quiz),
    Forum(ModuleCommon),
    Folder(ModuleCommon),
    Label(Label),
    Attendance(ModuleCommon),
    SubSection(SubSection),
    Unknown(Unknown),
}

impl Module {
    /// Fields every kind of module has.
    pub fn common(&self) -> &ModuleCommon {
        match self {
            Module::Resource(Resource { common, .. })
            | Module::Assignment(Assignment { common, .. })
            | Module::Quiz(Quiz { common, .. })
            | Module::Label(Label { common, .. })
            | Module::SubSection(SubSection { common, .. })
            | Module::Unknown(Unknown { common, .. }) => common,
            Module::Forum(common) | Module::Folder(common) | Module::Attendance(common) => common,
        }
    }

    pub fn id(&self) -> u32 {
        self.common().id
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct ModuleCommon {
    pub id: u32,
    pub name: String,
    pub url: String,
    pub is_visible: bool,
    pub availability: Option<Availability>,
}

/// Access restriction shown on a module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Availability {
    pub is_restricted: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Resource {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    /// Badge text, e.g. `PDF`.
    pub file_type: Option<String>,
    /// e.g. `2.3 MB`.
    pub file_size: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Assignment {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    pub description: Option<String>,
    pub open_date: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Quiz {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    pub description: Option<String>,
    pub open_date: Option<String>,
    pub close_date: Option<String>,
}

/// Markup-only content block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Label {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    pub content_html: String,
}

/// Section nested inside a module of its parent section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct SubSection {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    pub summary: Option<String>,
    pub modules: Vec<Module>,
}

impl SectionLike for SubSection {
    fn name(&self) -> &str {
        &self.common.name
    }

    fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn modules(&self) -> &[Module] {
        &self.modules
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Unknown {
    #[cfg_attr(feature = "serde_support", serde(flatten))]
    pub common: ModuleCommon,
    /// Raw `modtype_` suffix.
    pub mod_type: String,
}
