//! Canonical WebSoc tree.
//!
//! A response is a four-level nested tree: School → Department → Course →
//! Section, with Meetings attached to each Section. Identity keys at each
//! level:
//!
//! | Level      | Identity key                       |
//! |------------|------------------------------------|
//! | School     | `school_name`                      |
//! | Department | `dept_code`                        |
//! | Course     | (`course_number`, `course_title`)  |
//! | Section    | `section_code`                     |
//! | Meeting    | (`days`, `time`)                   |
//!
//! All types serialize with camelCase field names, which is also the shape
//! stored in the cache's `data` column.

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Academic quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    Winter,
    Spring,
    Summer1,
    Summer10wk,
    Summer2,
    Fall,
}

impl Quarter {
    pub const ALL: [Quarter; 6] = [
        Quarter::Winter,
        Quarter::Spring,
        Quarter::Summer1,
        Quarter::Summer10wk,
        Quarter::Summer2,
        Quarter::Fall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Winter => "Winter",
            Quarter::Spring => "Spring",
            Quarter::Summer1 => "Summer1",
            Quarter::Summer10wk => "Summer10wk",
            Quarter::Summer2 => "Summer2",
            Quarter::Fall => "Fall",
        }
    }

    /// Term code suffix used by the registrar ("92" for Fall, etc.).
    pub fn term_code(&self) -> &'static str {
        match self {
            Quarter::Winter => "03",
            Quarter::Spring => "14",
            Quarter::Summer1 => "25",
            Quarter::Summer10wk => "39",
            Quarter::Summer2 => "76",
            Quarter::Fall => "92",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quarter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quarter::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown quarter: {}", s))
    }
}

/// A (year, quarter) pair identifying an academic term.
///
/// Terms order chronologically: by year, then by quarter within the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub year: u16,
    pub quarter: Quarter,
}

impl Term {
    pub fn new(year: u16, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    /// Registrar term code, e.g. `2024-92` for Fall 2024.
    pub fn code(&self) -> String {
        format!("{}-{}", self.year, self.quarter.term_code())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.quarter)
    }
}

/// Root of a WebSoc response tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsocResponse {
    pub schools: Vec<School>,
}

impl WebsocResponse {
    /// Number of leaf sections in the tree.
    pub fn section_count(&self) -> usize {
        self.sections().count()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    /// Iterate over every (school, department, course, section) path.
    pub fn paths(&self) -> impl Iterator<Item = SectionPath<'_>> {
        self.schools.iter().flat_map(|school| {
            school.departments.iter().flat_map(move |department| {
                department.courses.iter().flat_map(move |course| {
                    course.sections.iter().map(move |section| SectionPath {
                        school,
                        department,
                        course,
                        section,
                    })
                })
            })
        })
    }

    /// Iterate over every leaf section.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.paths().map(|path| path.section)
    }
}

/// Borrowed view of one root-to-leaf path.
#[derive(Debug, Clone, Copy)]
pub struct SectionPath<'a> {
    pub school: &'a School,
    pub department: &'a Department,
    pub course: &'a Course,
    pub section: &'a Section,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub school_name: String,
    #[serde(default)]
    pub school_comment: String,
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub dept_code: String,
    #[serde(default)]
    pub dept_name: String,
    #[serde(default)]
    pub dept_comment: String,
    #[serde(default)]
    pub section_code_range_comments: Vec<String>,
    #[serde(default)]
    pub course_number_range_comments: Vec<String>,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_number: String,
    pub course_title: String,
    #[serde(default)]
    pub course_comment: String,
    #[serde(default)]
    pub prerequisite_link: String,
    pub sections: Vec<Section>,
}

impl Course {
    /// Both halves of the key must match for two nodes to be the same course.
    pub fn same_course(&self, other: &Course) -> bool {
        self.course_number == other.course_number && self.course_title == other.course_title
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_code: String,
    pub section_type: String,
    pub section_num: String,
    pub units: String,
    pub instructors: Vec<String>,
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub final_exam: FinalExam,
    #[serde(default)]
    pub max_capacity: String,
    #[serde(default)]
    pub num_currently_enrolled: Enrollment,
    #[serde(default)]
    pub num_on_waitlist: String,
    #[serde(default)]
    pub num_waitlist_cap: String,
    #[serde(default)]
    pub num_requested: String,
    #[serde(default)]
    pub num_new_only_reserved: String,
    #[serde(default)]
    pub restrictions: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub section_comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub total_enrolled: String,
    pub section_enrolled: String,
}

/// One physical meeting of a section.
///
/// `days` and `time` keep the upstream strings because together they form
/// the identity key; `schedule` holds the parsed time span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub days: String,
    pub time: String,
    pub bldg: Vec<String>,
    pub schedule: MeetingTime,
}

impl Meeting {
    pub fn same_meeting(&self, other: &Meeting) -> bool {
        self.days == other.days && self.time == other.time
    }

    /// Weekdays this meeting falls on. TBA or unparseable patterns yield none.
    pub fn weekdays(&self) -> Vec<Weekday> {
        super::time::parse_days(&self.days).unwrap_or_default()
    }
}

/// Parsed meeting time span, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MeetingTime {
    Tba,
    #[serde(rename_all = "camelCase")]
    Scheduled { start_minute: u16, end_minute: u16 },
}

impl MeetingTime {
    pub fn is_tba(&self) -> bool {
        matches!(self, MeetingTime::Tba)
    }
}

/// Final exam status of a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "examStatus")]
pub enum FinalExam {
    #[default]
    #[serde(rename = "NO_FINAL")]
    NoFinal,
    #[serde(rename = "TBA_FINAL")]
    TbaFinal,
    #[serde(rename = "SCHEDULED_FINAL", rename_all = "camelCase")]
    Scheduled {
        day_of_week: Weekday,
        month: u8,
        day: u8,
        start_minute: u16,
        end_minute: u16,
        location: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(code: &str) -> Section {
        Section {
            section_code: code.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_quarter_round_trips_through_str() {
        for quarter in Quarter::ALL {
            assert_eq!(quarter.as_str().parse::<Quarter>().unwrap(), quarter);
        }
        assert_eq!("fall".parse::<Quarter>().unwrap(), Quarter::Fall);
        assert!("Autumn".parse::<Quarter>().is_err());
    }

    #[test]
    fn test_terms_order_chronologically() {
        let winter = Term::new(2024, Quarter::Winter);
        let fall = Term::new(2024, Quarter::Fall);
        let next_winter = Term::new(2025, Quarter::Winter);
        assert!(winter < fall);
        assert!(fall < next_winter);
        assert_eq!(fall.code(), "2024-92");
        assert_eq!(fall.to_string(), "2024 Fall");
    }

    #[test]
    fn test_section_count_walks_all_levels() {
        let response = WebsocResponse {
            schools: vec![School {
                school_name: "Engineering".into(),
                departments: vec![Department {
                    dept_code: "EECS".into(),
                    courses: vec![
                        Course {
                            course_number: "31".into(),
                            course_title: "INTRO".into(),
                            sections: vec![section("10000"), section("10001")],
                            ..Default::default()
                        },
                        Course {
                            course_number: "40".into(),
                            course_title: "OOP".into(),
                            sections: vec![section("10002")],
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        assert_eq!(response.section_count(), 3);
        let codes: Vec<_> = response.sections().map(|s| s.section_code.as_str()).collect();
        assert_eq!(codes, ["10000", "10001", "10002"]);
    }

    #[test]
    fn test_final_exam_serializes_tagged() {
        let json = serde_json::to_value(FinalExam::TbaFinal).unwrap();
        assert_eq!(json["examStatus"], "TBA_FINAL");

        let scheduled = FinalExam::Scheduled {
            day_of_week: Weekday::Mon,
            month: 12,
            day: 11,
            start_minute: 480,
            end_minute: 600,
            location: Some("ICS 174".into()),
        };
        let json = serde_json::to_value(&scheduled).unwrap();
        assert_eq!(json["examStatus"], "SCHEDULED_FINAL");
        assert_eq!(json["startMinute"], 480);
        assert_eq!(json["dayOfWeek"], "Mon");
        let back: FinalExam = serde_json::from_value(json).unwrap();
        assert_eq!(back, scheduled);
    }

    #[test]
    fn test_meeting_time_serializes_tagged() {
        let json = serde_json::to_value(MeetingTime::Scheduled {
            start_minute: 540,
            end_minute: 590,
        })
        .unwrap();
        assert_eq!(json["kind"], "scheduled");
        assert_eq!(json["endMinute"], 590);
        assert_eq!(serde_json::to_value(MeetingTime::Tba).unwrap()["kind"], "tba");
    }
}
