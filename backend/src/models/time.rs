//! Normalization of upstream time, day and final-exam encodings.
//!
//! WebSoc reports meeting times as 12-hour ranges where only the end time
//! carries a meridian marker (`"11:00-1:50p"`), final exams as free-form
//! strings (`"Mon Dec 11 8:00-10:00am@ICS 174"`), and day patterns as
//! concatenated abbreviations (`"TuTh"`). Everything here is a pure function
//! of its input and reports malformed input as a [`NormalizeError`] so callers
//! can skip and log instead of aborting a whole merge.

use chrono::Weekday;
use thiserror::Error;

use super::websoc::{FinalExam, MeetingTime};

const MINUTES_PER_HALF_DAY: u16 = 720;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A raw upstream field that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed meeting time '{0}'")]
    MeetingTime(String),

    #[error("malformed clock time '{0}'")]
    ClockTime(String),

    #[error("malformed final exam '{0}'")]
    FinalExam(String),

    #[error("unknown month '{0}'")]
    Month(String),

    #[error("malformed day pattern '{0}'")]
    Days(String),
}

/// Parse a meeting time range into minutes since midnight.
///
/// The PM offset applies to both ends when the end half carries a `p`
/// marker; if that pushes the start past the end, the meeting crosses noon
/// and the start is pulled back into the morning. Any other range whose
/// start lies after its end is malformed.
pub fn parse_meeting_time(raw: &str) -> Result<MeetingTime, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed == "TBA" {
        return Ok(MeetingTime::Tba);
    }

    let err = || NormalizeError::MeetingTime(raw.to_string());
    let (start_half, end_half) = trimmed.split_once('-').ok_or_else(err)?;
    let mut start = clock_minutes(start_half).ok_or_else(err)?;
    let mut end = clock_minutes(end_half).ok_or_else(err)?;

    if end_half.to_ascii_lowercase().contains('p') {
        start += MINUTES_PER_HALF_DAY;
        end += MINUTES_PER_HALF_DAY;
        if start > end {
            start = start.checked_sub(MINUTES_PER_HALF_DAY).ok_or_else(err)?;
        }
    }
    if start > end {
        return Err(err());
    }

    Ok(MeetingTime::Scheduled {
        start_minute: start,
        end_minute: end,
    })
}

/// Hour (mod 12) and minute of one half of a range, as minutes.
fn clock_minutes(half: &str) -> Option<u16> {
    let (hour, rest) = half.trim().split_once(':')?;
    let hour: u16 = hour.trim().parse().ok()?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() != 2 || hour > 12 {
        return None;
    }
    let minute: u16 = digits.parse().ok()?;
    if minute >= 60 {
        return None;
    }
    Some((hour % 12) * 60 + minute)
}

/// Parse a standalone clock time used by query filters.
///
/// Accepts `"8:00am"`, `"1:30pm"`, `"1:30p"` and 24-hour `"13:30"`.
pub fn parse_clock_time(raw: &str) -> Result<u16, NormalizeError> {
    let err = || NormalizeError::ClockTime(raw.to_string());
    let lower = raw.trim().to_ascii_lowercase();
    let (hour, rest) = lower.split_once(':').ok_or_else(err)?;
    let hour: u16 = hour.parse().map_err(|_| err())?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let minute: u16 = digits.parse().map_err(|_| err())?;
    let meridian = rest[digits.len()..].trim();
    if digits.len() != 2 || minute >= 60 {
        return Err(err());
    }

    let hour = match meridian {
        "" if hour < 24 => hour,
        "a" | "am" if (1..=12).contains(&hour) => hour % 12,
        "p" | "pm" if (1..=12).contains(&hour) => hour % 12 + 12,
        _ => return Err(err()),
    };
    Ok(hour * 60 + minute)
}

/// Format minutes since midnight as a 12-hour clock time (`"1:30pm"`).
pub fn format_clock_time(minutes: u16) -> String {
    let hour = (minutes / 60) % 24;
    let minute = minutes % 60;
    let meridian = if hour < 12 { "am" } else { "pm" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02}{}", display_hour, minute, meridian)
}

/// Parse a final exam string.
///
/// `fallback_location` is used when nothing follows the `@`; callers pass the
/// section's first meeting building.
pub fn parse_final_exam(
    raw: &str,
    fallback_location: Option<&str>,
) -> Result<FinalExam, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(FinalExam::NoFinal);
    }
    if trimmed == "TBA" {
        return Ok(FinalExam::TbaFinal);
    }

    let err = || NormalizeError::FinalExam(raw.to_string());
    let (when, location) = match trimmed.split_once('@') {
        Some((when, location)) => (when, location.trim()),
        None => (trimmed, ""),
    };

    let cleaned = when.replace(',', " ");
    let mut tokens = cleaned.split_whitespace();
    let day_of_week: Weekday = tokens.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    let month_name = tokens.next().ok_or_else(err)?;
    let month = month_number(month_name)?;
    let day: u8 = tokens.next().ok_or_else(err)?.parse().map_err(|_| err())?;
    if !(1..=31).contains(&day) {
        return Err(err());
    }
    let range: String = tokens.collect();
    let (start_minute, end_minute) = match parse_meeting_time(&range).map_err(|_| err())? {
        MeetingTime::Scheduled {
            start_minute,
            end_minute,
        } => (start_minute, end_minute),
        MeetingTime::Tba => return Err(err()),
    };

    let location = if location.is_empty() {
        fallback_location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    } else {
        Some(location.to_string())
    };

    Ok(FinalExam::Scheduled {
        day_of_week,
        month,
        day,
        start_minute,
        end_minute,
        location,
    })
}

fn month_number(name: &str) -> Result<u8, NormalizeError> {
    MONTHS
        .iter()
        .position(|m| name.get(..3).is_some_and(|prefix| m.eq_ignore_ascii_case(prefix)))
        .map(|idx| idx as u8 + 1)
        .ok_or_else(|| NormalizeError::Month(name.to_string()))
}

/// Parse a day pattern such as `"MWF"` or `"TuTh"` into weekdays.
///
/// `"TBA"` and blank patterns have no days.
pub fn parse_days(raw: &str) -> Result<Vec<Weekday>, NormalizeError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact == "TBA" {
        return Ok(Vec::new());
    }

    let mut days = Vec::new();
    let mut rest = compact.as_str();
    while !rest.is_empty() {
        let (day, len) = if rest.starts_with("Tu") {
            (Weekday::Tue, 2)
        } else if rest.starts_with("Th") {
            (Weekday::Thu, 2)
        } else if rest.starts_with("Sa") {
            (Weekday::Sat, 2)
        } else if rest.starts_with("Su") {
            (Weekday::Sun, 2)
        } else if rest.starts_with('M') {
            (Weekday::Mon, 1)
        } else if rest.starts_with('W') {
            (Weekday::Wed, 1)
        } else if rest.starts_with('F') {
            (Weekday::Fri, 1)
        } else {
            return Err(NormalizeError::Days(raw.to_string()));
        };
        if !days.contains(&day) {
            days.push(day);
        }
        rest = &rest[len..];
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start_minute: u16, end_minute: u16) -> MeetingTime {
        MeetingTime::Scheduled {
            start_minute,
            end_minute,
        }
    }

    #[test]
    fn test_tba_meeting_time() {
        assert_eq!(parse_meeting_time("TBA").unwrap(), MeetingTime::Tba);
        assert_eq!(parse_meeting_time("  TBA ").unwrap(), MeetingTime::Tba);
    }

    #[test]
    fn test_morning_meeting_time() {
        assert_eq!(parse_meeting_time("9:00-9:50a").unwrap(), span(540, 590));
        assert_eq!(parse_meeting_time("10:00-11:20").unwrap(), span(600, 680));
    }

    #[test]
    fn test_afternoon_meeting_time() {
        assert_eq!(parse_meeting_time("2:00-3:20p").unwrap(), span(840, 920));
        assert_eq!(parse_meeting_time(" 5:00- 6:20p").unwrap(), span(1020, 1100));
    }

    #[test]
    fn test_noon_crossing_meeting_time() {
        assert_eq!(parse_meeting_time("11:00-1:50p").unwrap(), span(660, 830));
        assert_eq!(parse_meeting_time("11:00-12:20p").unwrap(), span(660, 740));
    }

    #[test]
    fn test_noon_start_meeting_time() {
        assert_eq!(parse_meeting_time("12:00-12:50p").unwrap(), span(720, 770));
        assert_eq!(parse_meeting_time("12:00-1:20p").unwrap(), span(720, 800));
    }

    #[test]
    fn test_malformed_meeting_time() {
        for raw in [
            "",
            "9:00",
            "9-10",
            "9:0-9:50",
            "13:00-14:00p",
            "9:75-10:00",
            "ab:cd-ef:gh",
            "11:00-1:50",
            "10:00-9:00a",
        ] {
            assert!(
                matches!(parse_meeting_time(raw), Err(NormalizeError::MeetingTime(_))),
                "expected error for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_clock_time_formats() {
        assert_eq!(parse_clock_time("8:00am").unwrap(), 480);
        assert_eq!(parse_clock_time("12:00am").unwrap(), 0);
        assert_eq!(parse_clock_time("12:30pm").unwrap(), 750);
        assert_eq!(parse_clock_time("1:30p").unwrap(), 810);
        assert_eq!(parse_clock_time("13:30").unwrap(), 810);
        assert!(parse_clock_time("25:00").is_err());
        assert!(parse_clock_time("0:00pm").is_err());
        assert!(parse_clock_time("noon").is_err());
    }

    #[test]
    fn test_format_clock_time() {
        assert_eq!(format_clock_time(0), "12:00am");
        assert_eq!(format_clock_time(480), "8:00am");
        assert_eq!(format_clock_time(720), "12:00pm");
        assert_eq!(format_clock_time(810), "1:30pm");
        assert_eq!(parse_clock_time(&format_clock_time(1005)).unwrap(), 1005);
    }

    #[test]
    fn test_final_exam_variants() {
        assert_eq!(parse_final_exam("", None).unwrap(), FinalExam::NoFinal);
        assert_eq!(parse_final_exam("TBA", None).unwrap(), FinalExam::TbaFinal);
    }

    #[test]
    fn test_scheduled_final_exam() {
        let exam = parse_final_exam("Mon Dec 11 8:00-10:00am@ICS 174", None).unwrap();
        assert_eq!(
            exam,
            FinalExam::Scheduled {
                day_of_week: Weekday::Mon,
                month: 12,
                day: 11,
                start_minute: 480,
                end_minute: 600,
                location: Some("ICS 174".into()),
            }
        );
    }

    #[test]
    fn test_scheduled_final_exam_with_commas_and_pm() {
        let exam = parse_final_exam("Wed, Mar 19, 1:30-3:30pm@", Some("DBH 1100")).unwrap();
        assert_eq!(
            exam,
            FinalExam::Scheduled {
                day_of_week: Weekday::Wed,
                month: 3,
                day: 19,
                start_minute: 810,
                end_minute: 930,
                location: Some("DBH 1100".into()),
            }
        );
    }

    #[test]
    fn test_final_exam_location_falls_back_to_first_building() {
        let exam = parse_final_exam("Thu Jun 12 4:00-6:00pm", Some("SSL 228")).unwrap();
        match exam {
            FinalExam::Scheduled { location, .. } => assert_eq!(location.as_deref(), Some("SSL 228")),
            other => panic!("unexpected {:?}", other),
        }

        let exam = parse_final_exam("Thu Jun 12 4:00-6:00pm", None).unwrap();
        match exam {
            FinalExam::Scheduled { location, .. } => assert_eq!(location, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_final_exam() {
        assert!(matches!(
            parse_final_exam("Mon Foo 11 8:00-10:00am", None),
            Err(NormalizeError::Month(_))
        ));
        assert!(parse_final_exam("Someday", None).is_err());
        assert!(parse_final_exam("Mon Dec 40 8:00-10:00am", None).is_err());
        assert!(parse_final_exam("Mon Dec 11 TBA", None).is_err());
    }

    #[test]
    fn test_parse_days() {
        use Weekday::*;
        assert_eq!(parse_days("MWF").unwrap(), vec![Mon, Wed, Fri]);
        assert_eq!(parse_days("TuTh").unwrap(), vec![Tue, Thu]);
        assert_eq!(parse_days("M Tu W Th F").unwrap(), vec![Mon, Tue, Wed, Thu, Fri]);
        assert_eq!(parse_days("SaSu").unwrap(), vec![Sat, Sun]);
        assert!(parse_days("TBA").unwrap().is_empty());
        assert!(parse_days("").unwrap().is_empty());
        assert!(matches!(parse_days("MX"), Err(NormalizeError::Days(_))));
    }
}
