//! Cached section rows and the predicate used to select them.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::checksum::section_checksum;
use super::repository::RepositoryResult;
use crate::models::{
    parse_days, Course, Department, Division, FullCourses, GeCategory, MeetingTime, Section,
    SectionPath, Term, WebsocRequest, WebsocResponse,
};
use crate::services::isolate::isolate;
use crate::services::sort::course_number_digits;

/// One cached section.
///
/// `data` is an isolated single-section fragment, ready for the merger. The
/// remaining fields are the indexed columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSection {
    pub term: Term,
    pub department: String,
    pub course_number: String,
    pub section_code: String,
    pub ge_categories: Vec<GeCategory>,
    pub checksum: String,
    pub data: WebsocResponse,
}

impl StoredSection {
    /// Isolate one path of a merged tree into a cache row.
    pub fn from_path(
        term: Term,
        path: SectionPath<'_>,
        ge_categories: Vec<GeCategory>,
    ) -> RepositoryResult<Self> {
        let data = isolate(path.school, path.department, path.course, path.section);
        let checksum = section_checksum(&data, &ge_categories)?;
        Ok(Self {
            term,
            department: path.department.dept_code.clone(),
            course_number: path.course.course_number.clone(),
            section_code: path.section.section_code.clone(),
            ge_categories,
            checksum,
            data,
        })
    }
}

/// A course-number filter item: `"6B"` or an inclusive range `"100-199"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseNumberFilter {
    Exact(String),
    Range(u64, u64),
}

impl CourseNumberFilter {
    /// Parse a comma-separated course-number list.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                let range = item.split_once('-').and_then(|(lo, hi)| {
                    let lo: u64 = lo.trim().parse().ok()?;
                    let hi: u64 = hi.trim().parse().ok()?;
                    (lo <= hi).then_some(CourseNumberFilter::Range(lo, hi))
                });
                range.unwrap_or_else(|| CourseNumberFilter::Exact(item.to_ascii_uppercase()))
            })
            .collect()
    }

    pub fn matches(&self, course_number: &str) -> bool {
        match self {
            CourseNumberFilter::Exact(number) => number.eq_ignore_ascii_case(course_number.trim()),
            CourseNumberFilter::Range(lo, hi) => {
                course_number_digits(course_number).is_some_and(|n| (*lo..=*hi).contains(&n))
            }
        }
    }
}

/// Filter over cached sections.
///
/// Backends apply the indexed part (term, department, section codes)
/// natively and call [`SectionFilter::matches`] for the rest. `matches` also
/// re-checks the indexed part, so a backend may skip native filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFilter {
    pub term: Term,
    pub department: Option<String>,
    pub include_co_courses: bool,
    pub section_codes: Vec<String>,
    pub course_numbers: Vec<CourseNumberFilter>,
    pub ge: Option<GeCategory>,
    pub division: Division,
    pub course_title: Option<String>,
    pub instructor_name: Option<String>,
    pub section_type: Option<String>,
    pub units: Vec<String>,
    pub days: Vec<Weekday>,
    pub start_time: Option<u16>,
    pub end_time: Option<u16>,
    pub building: Option<String>,
    pub room: Option<String>,
    pub full_courses: FullCourses,
}

impl SectionFilter {
    /// Every section of a term.
    pub fn for_term(term: Term) -> Self {
        Self {
            term,
            department: None,
            include_co_courses: false,
            section_codes: Vec::new(),
            course_numbers: Vec::new(),
            ge: None,
            division: Division::Any,
            course_title: None,
            instructor_name: None,
            section_type: None,
            units: Vec::new(),
            days: Vec::new(),
            start_time: None,
            end_time: None,
            building: None,
            room: None,
            full_courses: FullCourses::Any,
        }
    }

    /// Translate a validated request. `cancelledCourses` and `maxCapacity`
    /// only apply upstream and are not carried over.
    pub fn from_request(request: &WebsocRequest) -> Self {
        Self {
            term: request.term,
            department: request.department.clone(),
            include_co_courses: request.include_co_courses,
            section_codes: request.section_codes.clone(),
            course_numbers: request
                .course_number
                .as_deref()
                .map(CourseNumberFilter::parse_list)
                .unwrap_or_default(),
            ge: request.ge,
            division: request.division,
            course_title: request.course_title.clone(),
            instructor_name: request.instructor_name.clone(),
            section_type: request.section_type.clone(),
            units: request.units.clone(),
            days: request
                .days
                .as_deref()
                .map(|d| parse_days(d).unwrap_or_default())
                .unwrap_or_default(),
            start_time: request.start_time,
            end_time: request.end_time,
            building: request.building.clone(),
            room: request.room.clone(),
            full_courses: request.full_courses,
        }
    }

    /// Department usable as an indexed predicate. Co-course lookups match on
    /// course comments, so they cannot narrow by department.
    pub fn indexed_department(&self) -> Option<&str> {
        if self.include_co_courses {
            None
        } else {
            self.department.as_deref()
        }
    }

    pub fn matches(&self, row: &StoredSection) -> bool {
        if row.term != self.term {
            return false;
        }
        if !self.section_codes.is_empty() && !self.section_codes.contains(&row.section_code) {
            return false;
        }
        if let Some(ge) = self.ge {
            if !row.ge_categories.contains(&ge) {
                return false;
            }
        }
        row.data.paths().any(|path| {
            self.matches_course(path.department, path.course) && self.matches_section(path.section)
        })
    }

    fn matches_course(&self, department: &Department, course: &Course) -> bool {
        if let Some(dept) = &self.department {
            let own = department.dept_code.eq_ignore_ascii_case(dept);
            let co_listed = self.include_co_courses && lists_co_course(&course.course_comment, dept);
            if !own && !co_listed {
                return false;
            }
        }
        if !self.course_numbers.is_empty()
            && !self
                .course_numbers
                .iter()
                .any(|f| f.matches(&course.course_number))
        {
            return false;
        }
        if !self
            .division
            .includes(course_number_digits(&course.course_number).and_then(|n| u32::try_from(n).ok()))
        {
            return false;
        }
        if let Some(title) = &self.course_title {
            if !contains_ignore_case(&course.course_title, title) {
                return false;
            }
        }
        true
    }

    fn matches_section(&self, section: &Section) -> bool {
        if let Some(name) = &self.instructor_name {
            if !section
                .instructors
                .iter()
                .any(|i| contains_ignore_case(i, name))
            {
                return false;
            }
        }
        if let Some(section_type) = &self.section_type {
            if !section.section_type.eq_ignore_ascii_case(section_type) {
                return false;
            }
        }
        if !self.units.is_empty() && !self.units.iter().any(|u| units_match(u, &section.units)) {
            return false;
        }
        if !self.days.is_empty() {
            let met: Vec<Weekday> = section.meetings.iter().flat_map(|m| m.weekdays()).collect();
            if !self.days.iter().all(|d| met.contains(d)) {
                return false;
            }
        }
        if (self.start_time.is_some() || self.end_time.is_some()) && !self.within_time_window(section) {
            return false;
        }
        if let Some(building) = &self.building {
            let in_building = section.meetings.iter().flat_map(|m| &m.bldg).any(|bldg| {
                let mut parts = bldg.split_whitespace();
                parts.next().is_some_and(|b| b.eq_ignore_ascii_case(building))
                    && self
                        .room
                        .as_deref()
                        .map_or(true, |room| parts.next().is_some_and(|r| r.eq_ignore_ascii_case(room)))
            });
            if !in_building {
                return false;
            }
        }
        full_courses_match(self.full_courses, section)
    }

    /// Every scheduled meeting lies inside the window; TBA-only sections
    /// never match a time filter.
    fn within_time_window(&self, section: &Section) -> bool {
        let spans: Vec<(u16, u16)> = section
            .meetings
            .iter()
            .filter_map(|m| match m.schedule {
                MeetingTime::Scheduled {
                    start_minute,
                    end_minute,
                } => Some((start_minute, end_minute)),
                MeetingTime::Tba => None,
            })
            .collect();
        !spans.is_empty()
            && spans.iter().all(|(start, end)| {
                self.start_time.map_or(true, |s| *start >= s)
                    && self.end_time.map_or(true, |e| *end <= e)
            })
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether a course comment names the course as co-listed with `dept`
/// ("Same as COMPSCI 161").
fn lists_co_course(comment: &str, dept: &str) -> bool {
    let comment = comment.to_ascii_lowercase();
    let needle = format!("same as {}", dept.to_ascii_lowercase());
    comment.match_indices(&needle).any(|(idx, matched)| {
        comment[idx + matched.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric())
    })
}

fn units_match(wanted: &str, actual: &str) -> bool {
    let actual = actual.trim();
    if wanted.eq_ignore_ascii_case("VAR") {
        return actual.contains('-') || actual.eq_ignore_ascii_case("VAR");
    }
    match (wanted.parse::<f64>(), actual.parse::<f64>()) {
        (Ok(w), Ok(a)) => (w - a).abs() < f64::EPSILON,
        _ => false,
    }
}

fn count(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

fn full_courses_match(mode: FullCourses, section: &Section) -> bool {
    let capacity = count(&section.max_capacity);
    let enrolled = count(&section.num_currently_enrolled.total_enrolled);
    let at_capacity = matches!((enrolled, capacity), (Some(e), Some(c)) if e >= c);
    let full = at_capacity || section.status.eq_ignore_ascii_case("FULL");
    let waitlist_open = matches!(
        (count(&section.num_on_waitlist), count(&section.num_waitlist_cap)),
        (Some(w), Some(c)) if w < c
    );

    match mode {
        FullCourses::Any => true,
        FullCourses::SkipFull => !full,
        FullCourses::SkipFullWaitlist => !full || waitlist_open,
        FullCourses::FullOnly => full,
        FullCourses::Overenrolled => {
            matches!((enrolled, capacity), (Some(e), Some(c)) if e > c)
        }
    }
}
