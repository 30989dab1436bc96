//! Publish dates: parsing reviewer input, formatting for display and
//! resolving priorities into concrete instants.

use chrono::offset::LocalResult;
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// Priority buckets map to weekly publishing windows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScheduleDate {
    At(DateTime<Utc>),
    Priority(Priority),
}

impl ScheduleDate {
    /// Reviewer-facing form: `p1`..`p3` or `MM/dd/yyyy hh:mm AM ZONE`.
    pub fn display(&self, tz: Tz) -> String {
        match self {
            Self::At(instant) => format_date(*instant, tz),
            Self::Priority(priority) => priority.to_string(),
        }
    }

    /// Concrete publish instant; priorities resolve to their next window start.
    pub fn resolve(&self, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        match self {
            Self::At(instant) => *instant,
            Self::Priority(priority) => resolve_priority(*priority, now, tz),
        }
    }
}

struct Window {
    days: &'static [Weekday],
    hour: u32,
    minute: u32,
}

const P1_WINDOWS: &[Window] = &[Window {
    days: &[Weekday::Sat, Weekday::Sun],
    hour: 8,
    minute: 0,
}];

const P2_WINDOWS: &[Window] = &[
    Window {
        days: &[Weekday::Fri, Weekday::Mon],
        hour: 8,
        minute: 0,
    },
    Window {
        days: &[Weekday::Sat, Weekday::Sun],
        hour: 11,
        minute: 30,
    },
];

const P3_WINDOWS: &[Window] = &[Window {
    days: &[Weekday::Sat, Weekday::Sun],
    hour: 13,
    minute: 0,
}];

impl Priority {
    fn windows(self) -> &'static [Window] {
        match self {
            Self::P1 => P1_WINDOWS,
            Self::P2 => P2_WINDOWS,
            Self::P3 => P3_WINDOWS,
        }
    }
}

/// Earliest start of one of the priority's windows strictly after `now`.
pub fn resolve_priority(priority: Priority, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    (0..=7)
        .filter_map(|offset| today.checked_add_signed(TimeDelta::days(offset)))
        .flat_map(|date| {
            priority
                .windows()
                .iter()
                .filter(move |w| w.days.contains(&date.weekday()))
                .filter_map(move |w| {
                    NaiveTime::from_hms_opt(w.hour, w.minute, 0)
                        .map(|time| localize(tz, date.and_time(time)))
                })
        })
        .filter(|candidate| *candidate > now)
        .min()
        .unwrap_or_else(|| localize(tz, next_saturday(now, tz).and_time(NaiveTime::MIN)))
}

/// Upcoming Saturday in `tz`; a Saturday `now` yields the following week's.
pub fn next_saturday(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let today = now.with_timezone(&tz).date_naive();
    let saturday = Weekday::Sat.num_days_from_monday();
    let current = today.weekday().num_days_from_monday();
    let days_until = match (saturday + 7 - current) % 7 {
        0 => 7,
        n => n,
    };
    today + TimeDelta::days(i64::from(days_until))
}

/// Default slot for a fresh draft: next Saturday between 08:00 and 17:59.
pub fn default_schedule_date(now: DateTime<Utc>, tz: Tz, rng: &mut impl Rng) -> DateTime<Utc> {
    let hour = rng.random_range(8..=17);
    let minute = rng.random_range(0..60);
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    localize(tz, next_saturday(now, tz).and_time(time))
}

/// Accepts `p1|p2|p3` (any case) or `MM/dd/yyyy hh:mm AM|PM ZONE`.
pub fn parse_date(input: &str) -> Option<ScheduleDate> {
    let trimmed = input.trim();
    if let Ok(priority) = trimmed.parse::<Priority>() {
        return Some(ScheduleDate::Priority(priority));
    }
    parse_timestamp(trimmed).map(ScheduleDate::At)
}

fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let (local, zone) = input.rsplit_once(char::is_whitespace)?;
    let naive = NaiveDateTime::parse_from_str(local.trim(), DATE_FORMAT).ok()?;
    match parse_zone(zone)? {
        Zone::Fixed(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        Zone::Named(tz) => Some(localize(tz, naive)),
    }
}

/// Formats in `tz`, falling back to a numeric offset when the zone's
/// abbreviation would not parse back to the same offset.
pub fn format_date(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let offset_secs = local.offset().fix().local_minus_utc();
    let abbreviation = local.format("%Z").to_string();
    let zone = match abbreviation_offset(&abbreviation) {
        Some(secs) if secs == offset_secs => abbreviation,
        _ => local.format("%:z").to_string(),
    };
    format!("{} {zone}", local.format(DATE_FORMAT))
}

enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

const HOUR: i32 = 3600;

const ABBREVIATIONS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5 * HOUR),
    ("EDT", -4 * HOUR),
    ("CST", -6 * HOUR),
    ("CDT", -5 * HOUR),
    ("MST", -7 * HOUR),
    ("MDT", -6 * HOUR),
    ("PST", -8 * HOUR),
    ("PDT", -7 * HOUR),
    ("AKST", -9 * HOUR),
    ("AKDT", -8 * HOUR),
    ("HST", -10 * HOUR),
    ("BST", HOUR),
    ("CET", HOUR),
    ("CEST", 2 * HOUR),
    ("EET", 2 * HOUR),
    ("EEST", 3 * HOUR),
    ("JST", 9 * HOUR),
    ("AEST", 10 * HOUR),
    ("AEDT", 11 * HOUR),
];

fn abbreviation_offset(abbreviation: &str) -> Option<i32> {
    ABBREVIATIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(abbreviation))
        .map(|(_, secs)| *secs)
}

fn parse_zone(zone: &str) -> Option<Zone> {
    if let Some(secs) = abbreviation_offset(zone) {
        return FixedOffset::east_opt(secs).map(Zone::Fixed);
    }
    if let Some(offset) = parse_numeric_offset(zone) {
        return Some(Zone::Fixed(offset));
    }
    zone.parse::<Tz>().ok().map(Zone::Named)
}

/// `+HH`, `+HHMM` or `+HH:MM` (and the `-` forms).
fn parse_numeric_offset(zone: &str) -> Option<FixedOffset> {
    let sign = match zone.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * HOUR + minutes * 60))
}

/// Local wall time to UTC; times inside a DST gap move forward an hour.
fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => localize(tz, local + TimeDelta::hours(1)),
    }
}
