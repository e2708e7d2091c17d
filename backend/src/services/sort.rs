//! Deterministic ordering of a response tree.
//!
//! | Level      | Order                                                        |
//! |------------|--------------------------------------------------------------|
//! | Section    | numeric `section_code`                                       |
//! | Course     | digits of `course_number`, then full `course_number`, then title |
//! | Department | `dept_code`, byte order                                      |
//! | School     | `school_name`, byte order                                    |
//!
//! String comparisons are plain ordinal comparisons with no locale collation.
//! Values without digits sort ahead of numeric ones; the string tie-breaks
//! keep the order total so re-sorting is a no-op.

use std::cmp::Ordering;

use crate::models::{Course, Section, WebsocResponse};

/// Sort a response at every level. Consumes the input so the caller never
/// observes a half-sorted tree it still holds.
pub fn sort_response(mut response: WebsocResponse) -> WebsocResponse {
    for school in &mut response.schools {
        for department in &mut school.departments {
            for course in &mut department.courses {
                course.sections.sort_by(compare_sections);
            }
            department.courses.sort_by(compare_courses);
        }
        school.departments.sort_by(|a, b| a.dept_code.cmp(&b.dept_code));
    }
    response
        .schools
        .sort_by(|a, b| a.school_name.cmp(&b.school_name));
    response
}

fn compare_sections(a: &Section, b: &Section) -> Ordering {
    numeric_value(&a.section_code)
        .cmp(&numeric_value(&b.section_code))
        .then_with(|| a.section_code.cmp(&b.section_code))
}

fn compare_courses(a: &Course, b: &Course) -> Ordering {
    course_number_digits(&a.course_number)
        .cmp(&course_number_digits(&b.course_number))
        .then_with(|| a.course_number.cmp(&b.course_number))
        .then_with(|| a.course_title.cmp(&b.course_title))
}

fn numeric_value(code: &str) -> Option<u64> {
    code.trim().parse().ok()
}

/// Numeric value of the digits in a course number (`"H198A"` → 198).
pub fn course_number_digits(course_number: &str) -> Option<u64> {
    let digits: String = course_number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
