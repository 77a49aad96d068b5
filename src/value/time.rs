//! Date, date-with-offset and duration transforms.
//!
//! Durations use a fixed, locale-independent grammar instead of tick counts:
//! `[-]P{days}DT{hours}H{minutes}M{seconds}[.{fraction}]S`, every field present.
use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Value, ValueCodec};
use crate::error::{CodecError, Result};
use crate::fragment::{Content, Fragment, Scalar};
use crate::ty::{Prim, Ty};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?P(\d+)DT(\d+)H(\d+)M(\d+)(?:\.(\d{1,9}))?S$").expect("duration grammar is a valid regex")
});

pub fn format_duration(d: TimeDelta) -> String {
    let secs = d.num_seconds();
    let nanos = d.subsec_nanos();
    let negative = secs < 0 || nanos < 0;
    let total = secs.unsigned_abs();
    let frac = nanos.unsigned_abs();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    let _ = write!(
        out,
        "P{}DT{}H{}M{}",
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60
    );
    if frac > 0 {
        let digits = format!("{frac:09}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out.push('S');
    out
}

pub fn parse_duration(s: &str) -> Option<TimeDelta> {
    let caps = DURATION.captures(s)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());
    let (days, hours, minutes, seconds) = (field(2)?, field(3)?, field(4)?, field(5)?);
    if hours >= 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let total = days
        .checked_mul(86_400)?
        .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
    let nanos = match caps.get(6) {
        Some(m) => format!("{:0<9}", m.as_str()).parse::<u32>().ok()?,
        None => 0,
    };
    let d = TimeDelta::new(total, nanos)?;
    Some(if caps.get(1).is_some() { -d } else { d })
}

pub(super) fn encode(_: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let text = match (ty.as_prim(), v) {
        (Some(Prim::DateTime), Value::DateTime(t)) => t.format(DATE_TIME_FORMAT).to_string(),
        (Some(Prim::DateTimeOffset), Value::DateTimeOffset(t)) => t.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        (Some(Prim::TimeSpan), Value::TimeSpan(d)) => format_duration(*d),
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    Ok(Content::Scalar(Scalar::Str(text)))
}

pub(super) fn decode(_: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let fail = || CodecError::value_decode(ty.render(), frag.describe());
    let text = frag.as_scalar().and_then(Scalar::as_str).ok_or_else(fail)?;
    match ty.as_prim() {
        Some(Prim::DateTime) => NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
            .map(Value::DateTime)
            .map_err(|_| fail()),
        Some(Prim::DateTimeOffset) => DateTime::parse_from_rfc3339(text)
            .map(Value::DateTimeOffset)
            .map_err(|_| fail()),
        Some(Prim::TimeSpan) => parse_duration(text).map(Value::TimeSpan).ok_or_else(fail),
        _ => Err(CodecError::internal(format!("time transform on `{ty}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeRegistry;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn codec() -> ValueCodec {
        ValueCodec::new(TypeRegistry::default().shared())
    }

    #[test]
    fn durations_spell_every_field() {
        let d = TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::minutes(3) + TimeDelta::milliseconds(4_500);
        assert_eq!(format_duration(d), "P1DT2H3M4.5S");
        assert_eq!(format_duration(TimeDelta::zero()), "P0DT0H0M0S");
        assert_eq!(format_duration(-TimeDelta::nanoseconds(1)), "-P0DT0H0M0.000000001S");
    }

    #[test]
    fn durations_parse_back_exactly() {
        for d in [
            TimeDelta::zero(),
            TimeDelta::seconds(59),
            -(TimeDelta::days(400) + TimeDelta::microseconds(17)),
            TimeDelta::nanoseconds(123_456_789),
        ] {
            assert_eq!(parse_duration(&format_duration(d)), Some(d));
        }
    }

    #[test]
    fn malformed_durations_are_rejected() {
        for bad in ["PT1H", "P1D", "1.00:00:00", "P0DT24H0M0S", "P0DT0H0M0.0000000001S", "P0DT0H60M0S"] {
            assert_eq!(parse_duration(bad), None, "{bad}");
        }
    }

    #[test]
    fn dates_round_trip_through_text() {
        let c = codec();
        let naive = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_nano_opt(23, 59, 1, 120_000_000).unwrap();
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap().with_ymd_and_hms(2001, 1, 2, 3, 4, 5).unwrap();
        let cases = [
            (Ty::Prim(Prim::DateTime), Value::DateTime(naive), "2024-02-29T23:59:01.120"),
            (Ty::Prim(Prim::DateTimeOffset), Value::DateTimeOffset(offset), "2001-01-02T03:04:05+05:30"),
            (Ty::Prim(Prim::TimeSpan), Value::TimeSpan(TimeDelta::minutes(90)), "P0DT1H30M0S"),
        ];
        for (ty, v, text) in cases {
            let frag = c.encode_as("value", &ty, &v).unwrap();
            assert_eq!(frag.str_value().unwrap(), text);
            assert_eq!(c.decode(&ty, &frag).unwrap(), v);
        }
    }
}
