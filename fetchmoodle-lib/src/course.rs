//! Extraction of a course page into its section and module tree.

use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;

use crate::{
    dom::{Document, Element},
    error::OperationError,
    ids::CourseId,
    model::{
        Assignment, Availability, Course, Label, Module, ModuleCommon, Quiz, Resource, Section,
        SubSection, Unknown,
    },
    query::HtmlQuery,
};

const DEFAULT_SECTION_NAME: &str = "General";
const DEFAULT_SUBSECTION_NAME: &str = "Unknown SubSection";

// Size and date patterns only match pages rendered in English.
const FILE_SIZE_FORMAT: &str = r"\d+(\.\d+)?\s*(KB|MB|GB)";
// The date runs to the end of its line, or up to a size that follows it on the same line.
const UPLOAD_DATE_FORMAT: &str =
    r"(?m)Uploaded\s+(.*?)\s*(?:File size\b.*|\d+(?:\.\d+)?\s*(?:KB|MB|GB)\b.*)?$";
const CONTEXT_ID_FORMAT: &str = r"context-(\d+)";

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("pattern is a valid regex"))
}

fn file_size_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, FILE_SIZE_FORMAT)
}

fn upload_date_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, UPLOAD_DATE_FORMAT)
}

fn context_id_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, CONTEXT_ID_FORMAT)
}

/// A course's page with every section and module on it.
#[derive(Debug, Clone, Copy)]
pub struct CourseQuery {
    course: CourseId,
}

impl CourseQuery {
    pub fn new(course: CourseId) -> Self {
        Self { course }
    }
}

impl HtmlQuery for CourseQuery {
    type Output = Course;

    fn path(&self) -> String {
        format!("course/view.php?id={}", self.course)
    }

    fn extract(&self, document: &Document<'_>) -> Result<Self::Output, OperationError> {
        let name = document
            .find_class("page-header-headings")
            .and_then(|headings| headings.find(|element| element.is("h1")))
            .map(|heading| heading.text())
            .or_else(|| {
                document.title().map(|title| {
                    title
                        .split('|')
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .to_owned()
                })
            })
            .ok_or(OperationError::MissingElement("course heading"))?;

        let category = document
            .elements()
            .filter(|element| element.has_class("breadcrumb-item"))
            .find_map(|item| item.find(|element| element.is("a")))
            .map(|link| link.text());

        let context_id = document
            .body()
            .and_then(|body| body.attr("class"))
            .and_then(|class| {
                context_id_regex()
                    .captures(&class)
                    .and_then(|captures| captures[1].parse().ok())
            })
            .unwrap_or(0);

        let mut section_elements = Vec::new();
        for root in document.roots() {
            collect_sections(root, false, &mut section_elements);
        }

        let sections: Vec<_> = section_elements.into_iter().map(parse_section).collect();
        debug!("course {} has {} sections", self.course, sections.len());

        Ok(Course {
            id: self.course,
            context_id,
            name,
            category,
            sections,
        })
    }
}

/// Gather every `li.section` directly inside a list, in document order.
///
/// Activities are not descended into: sections nested in a subsection module belong to that
/// module.
fn collect_sections<'d, 'a>(
    element: Element<'d, 'a>,
    in_list: bool,
    sections: &mut Vec<Element<'d, 'a>>,
) {
    if in_list && element.is("li") && element.has_class("section") {
        sections.push(element);
    }
    if element.has_class("activity") {
        return;
    }

    let is_list = element.is("ul");
    for child in element.children() {
        collect_sections(child, is_list, sections);
    }
}

fn parse_section(section: Element<'_, '_>) -> Section {
    let name = find_own(section, &|element| element.has_class("sectionname"))
        .map(|name| name.text())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SECTION_NAME.to_owned());

    Section {
        id: int_attr(section, "data-sectionid").unwrap_or(0),
        number: int_attr(section, "data-number").unwrap_or(0),
        name,
        summary: summary(section),
        modules: parse_module_list(Some(section)),
    }
}

/// Modules of a section or delegated section, in document order.
///
/// Entries without a numeric id are skipped rather than failing the whole list.
fn parse_module_list(container: Option<Element<'_, '_>>) -> Vec<Module> {
    let Some(list) = container.and_then(|container| {
        find_own(container, &|element| {
            element.is("ul") && element.attr("data-for").is_some_and(|value| value == "cmlist")
        })
    }) else {
        return Vec::new();
    };

    list.children()
        .filter(|child| child.has_class("activity"))
        .filter_map(parse_module)
        .collect()
}

fn parse_module(element: Element<'_, '_>) -> Option<Module> {
    let Some(id) = int_attr(element, "data-id") else {
        warn!("skipping activity without a numeric id");
        return None;
    };
    let mod_type = element
        .classes()
        .find_map(|class| class.strip_prefix("modtype_").map(ToOwned::to_owned))
        .unwrap_or_else(|| "unknown".to_owned());

    let common = ModuleCommon {
        id,
        name: find_own(element, &|child| child.has_class("instancename"))
            .map(|name| name.text_without(|child| child.has_class("accesshide")))
            .unwrap_or_default(),
        url: find_own(element, &|child| {
            child.has_class("aalink") || child.has_class("stretched-link")
        })
        .and_then(|link| link.abs_attr("href"))
        .unwrap_or_default(),
        is_visible: !element.has_class("dimmed"),
        availability: find_own(element, &|child| child.has_class("availabilityinfo")).map(
            |info| Availability {
                is_restricted: true,
                description: Some(info.text()).filter(|text| !text.is_empty()),
            },
        ),
    };

    let description = || {
        find_own(element, &|child| child.has_class("activity-description"))
            .map(|description| description.all_text())
    };

    let module = match mod_type.as_str() {
        "resource" => {
            let details = find_own(element, &|child| child.has_class("resourcelinkdetails"))
                .map(|details| details.all_text())
                .unwrap_or_default();

            Module::Resource(Resource {
                common,
                file_type: find_own(element, &|child| child.has_class("activitybadge"))
                    .map(|badge| badge.text())
                    .filter(|badge| !badge.is_empty()),
                file_size: file_size_regex()
                    .find(&details)
                    .map(|size| size.as_str().to_owned()),
                upload_date: upload_date_regex()
                    .captures(&details)
                    .map(|captures| captures[1].trim().to_owned())
                    .filter(|date| !date.is_empty()),
                description: description(),
            })
        }
        "quiz" => {
            let (open_date, close_date) = activity_dates(element, "Opened", "Closed");
            Module::Quiz(Quiz {
                common,
                description: description(),
                open_date,
                close_date,
            })
        }
        "assign" => {
            let (open_date, due_date) = activity_dates(element, "Opened", "Due");
            Module::Assignment(Assignment {
                common,
                description: description(),
                open_date,
                due_date,
            })
        }
        "subsection" => {
            let delegated = find_own(element, &|child| child.has_class("delegated-section"));
            let name = delegated
                .and_then(|delegated| delegated.attr("data-sectionname"))
                .or_else(|| element.attr("data-activityname"))
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_SUBSECTION_NAME.to_owned());

            Module::SubSection(SubSection {
                common: ModuleCommon { name, ..common },
                summary: delegated.and_then(summary),
                modules: parse_module_list(delegated),
            })
        }
        "label" => Module::Label(Label {
            common,
            content_html: find_own(element, &|child| child.has_class("activity-altcontent"))
                .map(|content| content.inner_html())
                .unwrap_or_default(),
        }),
        "forum" => Module::Forum(common),
        "folder" => Module::Folder(common),
        "attendance" => Module::Attendance(common),
        _ => Module::Unknown(Unknown { common, mod_type }),
    };

    Some(module)
}

/// Summary text of a section, absent when it has no text.
fn summary(section: Element<'_, '_>) -> Option<String> {
    find_own(section, &|element| element.has_class("summarytext"))
        .filter(|summary| summary.has_text())
        .map(|summary| summary.all_text())
}

/// Open and close dates of an activity, each the own text of the first date line mentioning its
/// label.
fn activity_dates(
    element: Element<'_, '_>,
    open_label: &str,
    close_label: &str,
) -> (Option<String>, Option<String>) {
    let Some(dates) = find_own(element, &|child| child.has_class("activity-dates")) else {
        return (None, None);
    };

    let date = |label: &str| {
        dates
            .descendants()
            .filter(|line| line.is("div") && line.text().contains(label))
            .map(|line| line.own_text())
            .find(|text| !text.is_empty())
    };

    (date(open_label), date(close_label))
}

/// First descendant matching `predicate` that is not part of a nested activity.
fn find_own<'d, 'a>(
    container: Element<'d, 'a>,
    predicate: &dyn Fn(&Element<'d, 'a>) -> bool,
) -> Option<Element<'d, 'a>> {
    for child in container.children() {
        if predicate(&child) {
            return Some(child);
        }
        if child.has_class("activity") {
            continue;
        }
        if let Some(found) = find_own(child, predicate) {
            return Some(found);
        }
    }

    None
}

fn int_attr(element: Element<'_, '_>, key: &'static str) -> Option<u32> {
    element.attr(key)?.trim().parse().ok()
}
