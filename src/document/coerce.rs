use crate::domain::TypeHint;
use bson::Bson;
use chrono::DateTime;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot cast '{value}' to {type_hint}")]
pub struct CoercionError {
    pub value: String,
    pub type_hint: TypeHint,
}

type CastFn = fn(&str) -> Option<Bson>;

const TRUE_TOKENS: &[&str] = &["true", "t", "yes", "y", "on", "1"];
const FALSE_TOKENS: &[&str] = &["false", "f", "no", "n", "off", "0"];

/// Casts `text` to the BSON scalar its hint asks for.
///
/// Failure is returned to the caller untouched; deciding between falling back,
/// skipping the field and dropping the record is the builder's job.
pub fn coerce(text: &str, type_hint: TypeHint) -> Result<Bson, CoercionError> {
    caster(type_hint)(text).ok_or_else(|| CoercionError {
        value: text.to_string(),
        type_hint,
    })
}

fn caster(type_hint: TypeHint) -> CastFn {
    match type_hint {
        TypeHint::Boolean => cast_boolean,
        TypeHint::Int32 => cast_int32,
        TypeHint::Int64 => cast_int64,
        TypeHint::Double => cast_double,
        TypeHint::Datetime => cast_datetime,
        TypeHint::String | TypeHint::Literal => cast_string,
    }
}

fn cast_boolean(text: &str) -> Option<Bson> {
    let token = text.to_ascii_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Some(Bson::Boolean(true))
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Some(Bson::Boolean(false))
    } else {
        None
    }
}

fn cast_int32(text: &str) -> Option<Bson> {
    text.parse::<i32>().ok().map(Bson::Int32)
}

fn cast_int64(text: &str) -> Option<Bson> {
    text.parse::<i64>().ok().map(Bson::Int64)
}

fn cast_double(text: &str) -> Option<Bson> {
    text.parse::<f64>().ok().map(Bson::Double)
}

fn cast_datetime(text: &str) -> Option<Bson> {
    epoch_millis(text)
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .or_else(|_| DateTime::parse_from_rfc2822(text))
                .ok()
                .map(|parsed| parsed.timestamp_millis())
        })
        .map(|millis| Bson::DateTime(bson::DateTime::from_millis(millis)))
}

fn cast_string(text: &str) -> Option<Bson> {
    Some(Bson::String(text.to_string()))
}

/// `<seconds>[.<fraction>]` since the epoch, fraction truncated to milliseconds.
fn epoch_millis(text: &str) -> Option<i64> {
    let (seconds, fraction) = match text.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (text, None),
    };

    let negative = seconds.starts_with('-');
    let digits = seconds.strip_prefix('-').unwrap_or(seconds);
    if !is_ascii_digits(digits) {
        return None;
    }
    let whole: i64 = seconds.parse().ok()?;

    let millis = match fraction {
        Some(fraction) if is_ascii_digits(fraction) => fraction
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(3)
            .fold(0_i64, |acc, digit| acc * 10 + i64::from(digit - b'0')),
        Some(_) => return None,
        None => 0,
    };

    let base = whole.checked_mul(1000)?;
    if negative {
        base.checked_sub(millis)
    } else {
        base.checked_add(millis)
    }
}

fn is_ascii_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}
