//! Validated WebSoc filter set.
//!
//! [`WebsocParams`] is the loosely typed shape that arrives over HTTP;
//! [`WebsocRequest::from_params`] parses and validates it into a
//! [`WebsocRequest`] that the planner and the cache predicate translator
//! consume.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::time::{format_clock_time, parse_clock_time, parse_days};
use super::websoc::{Quarter, Term};

/// Upper bound on section codes after range expansion.
pub const MAX_SECTION_CODES: usize = 900;

/// The caller supplied an invalid filter combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Raw query parameters as received from callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsocParams {
    pub year: Option<String>,
    pub quarter: Option<String>,
    pub ge: Option<String>,
    pub department: Option<String>,
    pub course_title: Option<String>,
    pub course_number: Option<String>,
    pub section_codes: Option<String>,
    pub instructor_name: Option<String>,
    pub days: Option<String>,
    pub building: Option<String>,
    pub room: Option<String>,
    pub division: Option<String>,
    pub section_type: Option<String>,
    pub full_courses: Option<String>,
    pub cancelled_courses: Option<String>,
    pub units: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_capacity: Option<String>,
    pub cache: Option<bool>,
    pub cache_only: Option<bool>,
    pub include_co_courses: Option<bool>,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        ValidationError::new(format!(
                            "Invalid {} '{}'; expected one of: {}",
                            stringify!($name),
                            s,
                            $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                        ))
                    })
            }
        }
    };
}

string_enum!(
    /// General education category.
    GeCategory {
        Ge1A => "GE-1A",
        Ge1B => "GE-1B",
        Ge2 => "GE-2",
        Ge3 => "GE-3",
        Ge4 => "GE-4",
        Ge5A => "GE-5A",
        Ge5B => "GE-5B",
        Ge6 => "GE-6",
        Ge7 => "GE-7",
        Ge8 => "GE-8",
    }
);

string_enum!(
    /// Course level filter.
    Division {
        Any => "ANY",
        LowerDiv => "LowerDiv",
        UpperDiv => "UpperDiv",
        Graduate => "Graduate",
    }
);

impl Division {
    /// Value understood by the WebSoc form.
    pub fn upstream_value(&self) -> &'static str {
        match self {
            Division::Any => "ANY",
            Division::LowerDiv => "0xx",
            Division::UpperDiv => "1xx",
            Division::Graduate => "2xx",
        }
    }

    /// Whether a numeric course number falls in this division.
    pub fn includes(&self, course_numeric: Option<u32>) -> bool {
        match (self, course_numeric) {
            (Division::Any, _) => true,
            (_, None) => false,
            (Division::LowerDiv, Some(n)) => n < 100,
            (Division::UpperDiv, Some(n)) => (100..200).contains(&n),
            (Division::Graduate, Some(n)) => n >= 200,
        }
    }
}

string_enum!(
    /// Enrollment-status filter.
    FullCourses {
        Any => "ANY",
        SkipFull => "SkipFull",
        SkipFullWaitlist => "SkipFullWaitlist",
        FullOnly => "FullOnly",
        Overenrolled => "Overenrolled",
    }
);

string_enum!(
    /// Cancelled-section filter.
    CancelledCourses {
        Exclude => "Exclude",
        Include => "Include",
        Only => "Only",
    }
);

/// A validated filter set for one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsocRequest {
    pub term: Term,
    pub ge: Option<GeCategory>,
    pub department: Option<String>,
    pub course_title: Option<String>,
    pub course_number: Option<String>,
    pub section_codes: Vec<String>,
    pub instructor_name: Option<String>,
    pub days: Option<String>,
    pub building: Option<String>,
    pub room: Option<String>,
    pub division: Division,
    pub section_type: Option<String>,
    pub full_courses: FullCourses,
    pub cancelled_courses: CancelledCourses,
    pub units: Vec<String>,
    /// Minutes since midnight.
    pub start_time: Option<u16>,
    /// Minutes since midnight.
    pub end_time: Option<u16>,
    pub max_capacity: Option<String>,
    pub cache: bool,
    pub cache_only: bool,
    pub include_co_courses: bool,
}

impl WebsocRequest {
    /// An unfiltered request for `term`. Callers add at least one
    /// discriminating filter before executing it.
    pub fn new(term: Term) -> Self {
        Self {
            term,
            ge: None,
            department: None,
            course_title: None,
            course_number: None,
            section_codes: Vec::new(),
            instructor_name: None,
            days: None,
            building: None,
            room: None,
            division: Division::Any,
            section_type: None,
            full_courses: FullCourses::Any,
            cancelled_courses: CancelledCourses::Exclude,
            units: Vec::new(),
            start_time: None,
            end_time: None,
            max_capacity: None,
            cache: true,
            cache_only: false,
            include_co_courses: false,
        }
    }

    pub fn for_department(term: Term, department: impl Into<String>) -> Self {
        Self {
            department: Some(department.into()),
            cache: false,
            ..Self::new(term)
        }
    }

    pub fn for_ge(term: Term, ge: GeCategory) -> Self {
        Self {
            ge: Some(ge),
            cache: false,
            ..Self::new(term)
        }
    }

    /// Parse and validate raw caller parameters.
    pub fn from_params(params: WebsocParams) -> Result<Self, ValidationError> {
        let year = non_blank(params.year)
            .ok_or_else(|| ValidationError::new("year is required"))?;
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(format!("year must be a four-digit year, got '{}'", year)));
        }
        let year: u16 = year
            .parse()
            .map_err(|_| ValidationError::new(format!("year out of range: {}", year)))?;
        let quarter: Quarter = non_blank(params.quarter)
            .ok_or_else(|| ValidationError::new("quarter is required"))?
            .parse()
            .map_err(ValidationError::new)?;

        let ge = match non_blank(params.ge) {
            Some(ge) if ge.eq_ignore_ascii_case("ANY") => None,
            Some(ge) => Some(ge.parse::<GeCategory>()?),
            None => None,
        };
        let days = match non_blank(params.days) {
            Some(days) => {
                let parsed = parse_days(&days).map_err(|e| ValidationError::new(e.to_string()))?;
                if parsed.is_empty() {
                    return Err(ValidationError::new("days must name at least one weekday"));
                }
                Some(days)
            }
            None => None,
        };
        let section_type = non_blank(params.section_type)
            .filter(|t| !t.eq_ignore_ascii_case("ANY"))
            .map(|t| t.to_ascii_uppercase());

        let request = Self {
            term: Term::new(year, quarter),
            ge,
            department: non_blank(params.department).map(|d| d.to_ascii_uppercase()),
            course_title: non_blank(params.course_title),
            course_number: non_blank(params.course_number).map(|c| c.to_ascii_uppercase()),
            section_codes: match non_blank(params.section_codes) {
                Some(codes) => parse_section_codes(&codes)?,
                None => Vec::new(),
            },
            instructor_name: non_blank(params.instructor_name),
            days,
            building: non_blank(params.building).map(|b| b.to_ascii_uppercase()),
            room: non_blank(params.room).map(|r| r.to_ascii_uppercase()),
            division: optional_enum(params.division)?.unwrap_or(Division::Any),
            section_type,
            full_courses: optional_enum(params.full_courses)?.unwrap_or(FullCourses::Any),
            cancelled_courses: optional_enum(params.cancelled_courses)?
                .unwrap_or(CancelledCourses::Exclude),
            units: match non_blank(params.units) {
                Some(units) => parse_units(&units)?,
                None => Vec::new(),
            },
            start_time: optional_clock(params.start_time, "startTime")?,
            end_time: optional_clock(params.end_time, "endTime")?,
            max_capacity: non_blank(params.max_capacity),
            cache: params.cache.unwrap_or(true),
            cache_only: params.cache_only.unwrap_or(false),
            include_co_courses: params.include_co_courses.unwrap_or(false),
        };

        request.validate()?;
        Ok(request)
    }

    /// Cross-field rules that hold for every request sent to the core.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ge.is_none()
            && self.department.is_none()
            && self.section_codes.is_empty()
            && self.instructor_name.is_none()
        {
            return Err(ValidationError::new(
                "At least one of ge, department, sectionCodes, or instructorName must be provided",
            ));
        }
        if self.room.is_some() && self.building.is_none() {
            return Err(ValidationError::new("If building is omitted, room must also be omitted"));
        }
        if self.cache_only && !self.cache {
            return Err(ValidationError::new("cacheOnly cannot be true if cache is false"));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(ValidationError::new("startTime must not be later than endTime"));
            }
        }
        if self.section_codes.len() > MAX_SECTION_CODES {
            return Err(ValidationError::new(format!(
                "Too many section codes ({}); at most {} may be requested",
                self.section_codes.len(),
                MAX_SECTION_CODES
            )));
        }
        Ok(())
    }

    /// Start-time filter formatted for the WebSoc form.
    pub fn start_time_param(&self) -> Option<String> {
        self.start_time.map(format_clock_time)
    }

    /// End-time filter formatted for the WebSoc form.
    pub fn end_time_param(&self) -> Option<String> {
        self.end_time.map(format_clock_time)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_enum<T>(value: Option<String>) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    non_blank(value).map(|v| v.parse::<T>()).transpose()
}

fn optional_clock(value: Option<String>, field: &str) -> Result<Option<u16>, ValidationError> {
    non_blank(value)
        .map(|v| {
            parse_clock_time(&v)
                .map_err(|e| ValidationError::new(format!("{}: {}", field, e)))
        })
        .transpose()
}

/// Expand a comma-separated list of section codes and inclusive ranges.
pub fn parse_section_codes(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut codes: Vec<String> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (low, high) = match token.split_once('-') {
            Some((low, high)) => (section_code(low.trim())?, section_code(high.trim())?),
            None => {
                let code = section_code(token)?;
                (code, code)
            }
        };
        if low > high {
            return Err(ValidationError::new(format!("Invalid section code range '{}'", token)));
        }
        if (high - low) as usize >= MAX_SECTION_CODES {
            return Err(ValidationError::new(format!(
                "Section code range '{}' spans more than {} codes",
                token, MAX_SECTION_CODES
            )));
        }
        for code in low..=high {
            let code = format!("{:05}", code);
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
    }
    Ok(codes)
}

fn section_code(token: &str) -> Result<u32, ValidationError> {
    if token.len() != 5 || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(format!(
            "Section codes must be five digits, got '{}'",
            token
        )));
    }
    token
        .parse()
        .map_err(|_| ValidationError::new(format!("Invalid section code '{}'", token)))
}

/// Parse a comma-separated list of unit values (`"4"`, `"1.3"`, `"VAR"`).
pub fn parse_units(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut units: Vec<String> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let value = if token.eq_ignore_ascii_case("VAR") {
            "VAR".to_string()
        } else if token.parse::<f32>().map(|u| u.is_finite() && u >= 0.0).unwrap_or(false) {
            token.to_string()
        } else {
            return Err(ValidationError::new(format!("Invalid units value '{}'", token)));
        };
        if !units.contains(&value) {
            units.push(value);
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> WebsocParams {
        WebsocParams {
            year: Some("2024".into()),
            quarter: Some("Fall".into()),
            department: Some("compsci".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_request() {
        let request = WebsocRequest::from_params(params()).unwrap();
        assert_eq!(request.term, Term::new(2024, Quarter::Fall));
        assert_eq!(request.department.as_deref(), Some("COMPSCI"));
        assert!(request.cache);
        assert!(!request.cache_only);
        assert_eq!(request.division, Division::Any);
    }

    #[test]
    fn test_missing_term_rejected() {
        let err = WebsocRequest::from_params(WebsocParams {
            year: None,
            ..params()
        })
        .unwrap_err();
        assert!(err.0.contains("year"));

        let err = WebsocRequest::from_params(WebsocParams {
            year: Some("24".into()),
            ..params()
        })
        .unwrap_err();
        assert!(err.0.contains("four-digit"));

        assert!(WebsocRequest::from_params(WebsocParams {
            quarter: Some("Autumn".into()),
            ..params()
        })
        .is_err());
    }

    #[test]
    fn test_discriminating_filter_required() {
        let err = WebsocRequest::from_params(WebsocParams {
            department: None,
            course_title: Some("DATA STRUCTURES".into()),
            ..params()
        })
        .unwrap_err();
        assert!(err.0.contains("At least one of"));

        assert!(WebsocRequest::from_params(WebsocParams {
            department: None,
            instructor_name: Some("PATTIS".into()),
            ..params()
        })
        .is_ok());
    }

    #[test]
    fn test_room_requires_building() {
        let err = WebsocRequest::from_params(WebsocParams {
            room: Some("174".into()),
            ..params()
        })
        .unwrap_err();
        assert!(err.0.contains("room"));

        let request = WebsocRequest::from_params(WebsocParams {
            building: Some("ics".into()),
            room: Some("174".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(request.building.as_deref(), Some("ICS"));
    }

    #[test]
    fn test_cache_only_requires_cache() {
        let err = WebsocRequest::from_params(WebsocParams {
            cache: Some(false),
            cache_only: Some(true),
            ..params()
        })
        .unwrap_err();
        assert!(err.0.contains("cacheOnly"));
    }

    #[test]
    fn test_section_code_ranges_expand() {
        let codes = parse_section_codes("34000-34003, 34002,35000").unwrap();
        assert_eq!(codes, ["34000", "34001", "34002", "34003", "35000"]);
        assert!(parse_section_codes("3400").is_err());
        assert!(parse_section_codes("34005-34000").is_err());
        assert!(parse_section_codes("00000-99999").is_err());
    }

    #[test]
    fn test_units_parse() {
        assert_eq!(parse_units("4, 2.5,var,4").unwrap(), ["4", "2.5", "VAR"]);
        assert!(parse_units("four").is_err());
    }

    #[test]
    fn test_enum_filters() {
        let request = WebsocRequest::from_params(WebsocParams {
            ge: Some("ge-5b".into()),
            division: Some("UpperDiv".into()),
            full_courses: Some("SkipFull".into()),
            section_type: Some("lec".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(request.ge, Some(GeCategory::Ge5B));
        assert_eq!(request.division, Division::UpperDiv);
        assert_eq!(request.full_courses, FullCourses::SkipFull);
        assert_eq!(request.section_type.as_deref(), Some("LEC"));

        let any = WebsocRequest::from_params(WebsocParams {
            ge: Some("ANY".into()),
            section_type: Some("ANY".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(any.ge, None);
        assert_eq!(any.section_type, None);

        assert!(WebsocRequest::from_params(WebsocParams {
            division: Some("Senior".into()),
            ..params()
        })
        .is_err());
    }

    #[test]
    fn test_time_window() {
        let request = WebsocRequest::from_params(WebsocParams {
            start_time: Some("8:00am".into()),
            end_time: Some("1:00pm".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(request.start_time, Some(480));
        assert_eq!(request.end_time, Some(780));
        assert_eq!(request.start_time_param().as_deref(), Some("8:00am"));
        assert_eq!(request.end_time_param().as_deref(), Some("1:00pm"));

        assert!(WebsocRequest::from_params(WebsocParams {
            start_time: Some("3:00pm".into()),
            end_time: Some("9:00am".into()),
            ..params()
        })
        .is_err());
    }

    #[test]
    fn test_days_validated() {
        assert!(WebsocRequest::from_params(WebsocParams {
            days: Some("MWF".into()),
            ..params()
        })
        .is_ok());
        assert!(WebsocRequest::from_params(WebsocParams {
            days: Some("TBA".into()),
            ..params()
        })
        .is_err());
    }

    #[test]
    fn test_division_bounds() {
        assert!(Division::LowerDiv.includes(Some(99)));
        assert!(!Division::LowerDiv.includes(Some(100)));
        assert!(Division::UpperDiv.includes(Some(199)));
        assert!(Division::Graduate.includes(Some(200)));
        assert!(!Division::Graduate.includes(None));
        assert!(Division::Any.includes(None));
    }
}
