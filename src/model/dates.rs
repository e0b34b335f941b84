use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

/// Error for unrecognized date input. The message names the accepted
/// formats so it can be surfaced verbatim at the entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unrecognized date '{input}': expected yyyy-mm-dd, today, tomorrow, eow, eom, \
     +N/-N days, Nd/Nw/Nm/Ny, mmdd, yyyymmdd, mm/dd/yyyy, or dd.mm.yyyy"
)]
pub struct DateError {
    pub input: String,
}

/// Resolve a raw date token against an injected `today`.
///
/// Formats are tried in priority order; the first success wins. "Now" is
/// always passed in by the caller so that query evaluation and tests can
/// pin it.
pub fn resolve_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DateError {
            input: raw.to_string(),
        });
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }

    match s.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Days::new(1)),
        "eow" => return Ok(end_of_week(today)),
        "eom" => return Ok(end_of_month(today)),
        _ => {}
    }

    if let Some(d) = signed_offset(s, today) {
        return Ok(d);
    }
    if let Some(d) = unit_offset(s, today) {
        return Ok(d);
    }
    if let Some(d) = compact_numeric(s, today) {
        return Ok(d);
    }
    // Locale fallbacks
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return Ok(d);
    }

    Err(DateError {
        input: raw.to_string(),
    })
}

/// Next Sunday, inclusive of today when today is a Sunday.
fn end_of_week(today: NaiveDate) -> NaiveDate {
    let days_ahead = (Weekday::Sun.num_days_from_monday() + 7
        - today.weekday().num_days_from_monday())
        % 7;
    today + Days::new(u64::from(days_ahead))
}

/// Last day of the current month.
fn end_of_month(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first + Months::new(1) - Days::new(1)
}

/// `+N` / `-N`: signed day offset.
fn signed_offset(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1i64, &s[1..]),
        b'-' => (-1i64, &s[1..]),
        _ => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    today.checked_add_signed(chrono::Duration::days(sign * n))
}

/// `Nd` / `Nw` / `Nm` / `Ny`: unit-suffixed relative offset from today.
fn unit_offset(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    if s.len() < 2 {
        return None;
    }
    let (num, unit) = s.split_at(s.len() - 1);
    if num.is_empty() || !num.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = num.parse().ok()?;
    match unit {
        "d" => Some(today + Days::new(u64::from(n))),
        "w" => Some(today + Days::new(u64::from(n) * 7)),
        "m" => today.checked_add_months(Months::new(n)),
        "y" => today.checked_add_months(Months::new(n.checked_mul(12)?)),
        _ => None,
    }
}

/// `mmdd` (current year) or `yyyymmdd`.
fn compact_numeric(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.len() {
        4 => {
            let month: u32 = s[..2].parse().ok()?;
            let day: u32 = s[2..].parse().ok()?;
            NaiveDate::from_ymd_opt(today.year(), month, day)
        }
        8 => {
            let year: i32 = s[..4].parse().ok()?;
            let month: u32 = s[4..6].parse().ok()?;
            let day: u32 = s[6..].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        _ => None,
    }
}
