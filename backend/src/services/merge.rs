//! Response merging.
//!
//! Every input tree is flattened into isolated single-section fragments which
//! are then folded into an accumulator top-down:
//!
//! 1. School by `school_name`; absent → append the fragment's school, done.
//! 2. Department by `dept_code`; absent → append, done.
//! 3. Course by (`course_number`, `course_title`); absent → append, done.
//! 4. Section by `section_code`; absent → append, otherwise the incoming
//!    copy is a duplicate and is discarded.
//!
//! The first copy of a section to reach the accumulator wins. Its meetings
//! are never reconciled with later copies.

use tracing::debug;

use super::isolate::isolate;
use crate::models::WebsocResponse;

/// Merge any number of responses into one deduplicated tree.
pub fn merge_responses<'a, I>(responses: I) -> WebsocResponse
where
    I: IntoIterator<Item = &'a WebsocResponse>,
{
    let mut merged = WebsocResponse::default();
    for response in responses {
        merge_into(&mut merged, response);
    }
    merged
}

/// Fold every section of `response` into `acc`.
pub fn merge_into(acc: &mut WebsocResponse, response: &WebsocResponse) {
    for path in response.paths() {
        let fragment = isolate(path.school, path.department, path.course, path.section);
        fold_fragment(acc, fragment);
    }
}

fn fold_fragment(acc: &mut WebsocResponse, fragment: WebsocResponse) {
    for school in fragment.schools {
        let Some(acc_school) = acc
            .schools
            .iter_mut()
            .find(|s| s.school_name == school.school_name)
        else {
            acc.schools.push(school);
            continue;
        };

        for department in school.departments {
            let Some(acc_department) = acc_school
                .departments
                .iter_mut()
                .find(|d| d.dept_code == department.dept_code)
            else {
                acc_school.departments.push(department);
                continue;
            };

            for course in department.courses {
                let Some(acc_course) = acc_department
                    .courses
                    .iter_mut()
                    .find(|c| c.same_course(&course))
                else {
                    acc_department.courses.push(course);
                    continue;
                };

                for section in course.sections {
                    if acc_course
                        .sections
                        .iter()
                        .any(|s| s.section_code == section.section_code)
                    {
                        debug!(
                            section_code = %section.section_code,
                            "Discarding duplicate section"
                        );
                        continue;
                    }
                    acc_course.sections.push(section);
                }
            }
        }
    }
}
