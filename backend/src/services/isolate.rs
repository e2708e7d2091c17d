//! Section isolation.
//!
//! Narrows a tree down to a single School → Department → Course → Section
//! path. The result is the unit the merger folds and the cache stores.

use crate::models::{Course, Department, Meeting, School, Section, WebsocResponse};

/// Build a single-section fragment with deduplicated meetings.
pub fn isolate(
    school: &School,
    department: &Department,
    course: &Course,
    section: &Section,
) -> WebsocResponse {
    let section = Section {
        meetings: dedupe_meetings(&section.meetings),
        ..section.clone()
    };

    WebsocResponse {
        schools: vec![School {
            school_name: school.school_name.clone(),
            school_comment: school.school_comment.clone(),
            departments: vec![Department {
                dept_code: department.dept_code.clone(),
                dept_name: department.dept_name.clone(),
                dept_comment: department.dept_comment.clone(),
                section_code_range_comments: department.section_code_range_comments.clone(),
                course_number_range_comments: department.course_number_range_comments.clone(),
                courses: vec![Course {
                    course_number: course.course_number.clone(),
                    course_title: course.course_title.clone(),
                    course_comment: course.course_comment.clone(),
                    prerequisite_link: course.prerequisite_link.clone(),
                    sections: vec![section],
                }],
            }],
        }],
    }
}

/// Collapse meetings sharing (days, time) into one, keeping first-seen order.
///
/// Buildings of colliding meetings are unioned in the order they appear.
pub fn dedupe_meetings(meetings: &[Meeting]) -> Vec<Meeting> {
    let mut deduped: Vec<Meeting> = Vec::with_capacity(meetings.len());
    for meeting in meetings {
        match deduped.iter_mut().find(|m| m.same_meeting(meeting)) {
            Some(existing) => {
                for bldg in &meeting.bldg {
                    if !existing.bldg.contains(bldg) {
                        existing.bldg.push(bldg.clone());
                    }
                }
            }
            None => {
                let mut first = meeting.clone();
                let mut seen: Vec<String> = Vec::with_capacity(first.bldg.len());
                for bldg in first.bldg.drain(..) {
                    if !seen.contains(&bldg) {
                        seen.push(bldg);
                    }
                }
                first.bldg = seen;
                deduped.push(first);
            }
        }
    }
    deduped
}
