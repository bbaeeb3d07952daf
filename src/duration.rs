#![forbid(unsafe_code)]

//! Coarse duration buckets used to scope catalog searches, plus parsing of the
//! ISO-8601 durations the catalog reports.

use std::fmt;

const SHORT_MAX_SECONDS: u64 = 240;
const MEDIUM_MAX_SECONDS: u64 = 1200;

/// Mirrors the `videoDuration` filter understood by the catalog search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationBucket {
    Short,
    Medium,
    Long,
}

impl DurationBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            DurationBucket::Short => "short",
            DurationBucket::Medium => "medium",
            DurationBucket::Long => "long",
        }
    }
}

impl fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower tiers are inclusive: 240s is still short, 1200s is still medium.
pub fn bucket(seconds: u64) -> DurationBucket {
    if seconds <= SHORT_MAX_SECONDS {
        DurationBucket::Short
    } else if seconds <= MEDIUM_MAX_SECONDS {
        DurationBucket::Medium
    } else {
        DurationBucket::Long
    }
}

/// Parses durations such as `PT1H2M3S`, `PT45S` or `P1DT2H` into seconds.
///
/// Returns `None` for anything that does not follow `P[nD][T[nH][nM][nS]]`,
/// which callers treat as an unknown duration.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return None;
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut total = 0u64;
    total += parse_components(date_part, &[('D', 86_400)])?;
    if let Some(time) = time_part {
        total += parse_components(time, &[('H', 3_600), ('M', 60), ('S', 1)])?;
    }
    Some(total)
}

/// Consumes `<digits><unit>` pairs in the order given by `units`. Each unit
/// may appear at most once and never out of order.
fn parse_components(mut input: &str, units: &[(char, u64)]) -> Option<u64> {
    let mut total = 0u64;
    let mut next_unit = 0;
    while !input.is_empty() {
        let digits_len = input.chars().take_while(|ch| ch.is_ascii_digit()).count();
        if digits_len == 0 {
            return None;
        }
        let (digits, tail) = input.split_at(digits_len);
        let unit = tail.chars().next()?;
        let position = units[next_unit..]
            .iter()
            .position(|(symbol, _)| *symbol == unit)?;
        let (_, factor) = units[next_unit + position];
        next_unit += position + 1;
        let amount: u64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(factor)?)?;
        input = &tail[unit.len_utf8()..];
    }
    Some(total)
}
