//! Raw upstream document and its normalization into the canonical tree.
//!
//! The raw shape mirrors what WebSoc emits: every scalar is a string, meeting
//! times are 12-hour ranges, final exams are free text and each meeting lists
//! a single building. A section whose fields fail to normalize is skipped and
//! logged; the rest of the document still comes through.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{
    parse_final_exam, parse_meeting_time, Course, Department, Enrollment, Meeting,
    NormalizeError, School, Section, WebsocResponse,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    #[serde(default)]
    pub schools: Vec<RawSchool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSchool {
    pub school_name: String,
    pub school_comment: String,
    pub departments: Vec<RawDepartment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDepartment {
    pub dept_code: String,
    pub dept_name: String,
    pub dept_comment: String,
    pub section_code_range_comments: Vec<String>,
    pub course_number_range_comments: Vec<String>,
    pub courses: Vec<RawCourse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCourse {
    pub course_number: String,
    pub course_title: String,
    pub course_comment: String,
    pub prerequisite_link: String,
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSection {
    pub section_code: String,
    pub section_type: String,
    pub section_num: String,
    pub units: String,
    pub instructors: Vec<String>,
    pub meetings: Vec<RawMeeting>,
    pub final_exam: String,
    pub max_capacity: String,
    pub num_currently_enrolled: RawEnrollment,
    pub num_on_waitlist: String,
    pub num_waitlist_cap: String,
    pub num_requested: String,
    pub num_new_only_reserved: String,
    pub restrictions: String,
    pub status: String,
    pub section_comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEnrollment {
    pub total_enrolled: String,
    pub section_enrolled: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMeeting {
    pub days: String,
    pub time: String,
    pub bldg: String,
}

impl RawResponse {
    /// Convert into the canonical tree, dropping sections that fail to parse.
    ///
    /// Courses, departments and schools left without sections are dropped
    /// too, so the result never holds an empty branch.
    pub fn normalize(self) -> WebsocResponse {
        let schools = self
            .schools
            .into_iter()
            .filter_map(|school| {
                let departments: Vec<Department> = school
                    .departments
                    .into_iter()
                    .filter_map(normalize_department)
                    .collect();
                (!departments.is_empty()).then(|| School {
                    school_name: school.school_name,
                    school_comment: school.school_comment,
                    departments,
                })
            })
            .collect();

        WebsocResponse { schools }
    }
}

fn normalize_department(department: RawDepartment) -> Option<Department> {
    let dept_code = department.dept_code;
    let courses: Vec<Course> = department
        .courses
        .into_iter()
        .filter_map(|course| {
            let sections: Vec<Section> = course
                .sections
                .into_iter()
                .filter_map(|section| {
                    let code = section.section_code.clone();
                    match normalize_section(section) {
                        Ok(section) => Some(section),
                        Err(e) => {
                            warn!(
                                department = %dept_code,
                                course_number = %course.course_number,
                                section_code = %code,
                                error = %e,
                                "Skipping section with malformed upstream fields"
                            );
                            None
                        }
                    }
                })
                .collect();
            (!sections.is_empty()).then(|| Course {
                course_number: course.course_number,
                course_title: course.course_title,
                course_comment: course.course_comment,
                prerequisite_link: course.prerequisite_link,
                sections,
            })
        })
        .collect();

    (!courses.is_empty()).then(|| Department {
        dept_code,
        dept_name: department.dept_name,
        dept_comment: department.dept_comment,
        section_code_range_comments: department.section_code_range_comments,
        course_number_range_comments: department.course_number_range_comments,
        courses,
    })
}

/// Normalize one raw section.
pub fn normalize_section(section: RawSection) -> Result<Section, NormalizeError> {
    let meetings = section
        .meetings
        .into_iter()
        .map(normalize_meeting)
        .collect::<Result<Vec<_>, _>>()?;

    let fallback_location = meetings
        .first()
        .and_then(|m| m.bldg.first())
        .map(String::as_str);
    let final_exam = parse_final_exam(&section.final_exam, fallback_location)?;

    Ok(Section {
        section_code: section.section_code.trim().to_string(),
        section_type: section.section_type,
        section_num: section.section_num,
        units: section.units,
        instructors: section.instructors,
        meetings,
        final_exam,
        max_capacity: section.max_capacity,
        num_currently_enrolled: Enrollment {
            total_enrolled: section.num_currently_enrolled.total_enrolled,
            section_enrolled: section.num_currently_enrolled.section_enrolled,
        },
        num_on_waitlist: section.num_on_waitlist,
        num_waitlist_cap: section.num_waitlist_cap,
        num_requested: section.num_requested,
        num_new_only_reserved: section.num_new_only_reserved,
        restrictions: section.restrictions,
        status: section.status,
        section_comment: section.section_comment,
    })
}

fn normalize_meeting(meeting: RawMeeting) -> Result<Meeting, NormalizeError> {
    let schedule = parse_meeting_time(&meeting.time)?;
    let bldg = meeting.bldg.trim();
    Ok(Meeting {
        days: meeting.days.trim().to_string(),
        time: meeting.time.trim().to_string(),
        bldg: if bldg.is_empty() {
            Vec::new()
        } else {
            vec![bldg.to_string()]
        },
        schedule,
    })
}
