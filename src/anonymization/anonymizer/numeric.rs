//! Integer and decimal anonymizers
//!
//! Both shift the (unscaled) magnitude by a key-derived number. Unless a
//! fixed `max_anonymization_range` is configured, the shift is bounded by
//! `10^guess_len(value)` where the guessed length is the odd digit count at
//! or below the real one. Sums then grow by at most one digit, which lets
//! decryption recover the exact bound from the encrypted value alone.
//!
//! Values keep their textual form: a zero-padded string keeps its width and
//! a decimal string keeps its number of fraction digits.

use super::{type_name, EmptyValuePolicy, FieldAnonymizer};
use crate::anonymization::crypto::cipher::Direction;
use crate::anonymization::crypto::numerize_key;
use crate::domain::{ObscuraError, Result};
use serde_json::{Number, Value};

/// Largest digit count of a key-derived shift
///
/// Capping it at 10^18 keeps every shifted i64 inside [`fold`]'s range.
const MAX_DIGITS: u32 = 18;

/// Width of the fold area at the top of the u64 range
const FOLD_SPAN: u128 = 10u128.pow(MAX_DIGITS);

/// Magnitude of `i64::MIN`
const I64_MIN_MAGNITUDE: u128 = 1 << 63;

/// Odd digit-length guess of a magnitude
///
/// `len(str(value))` rounded down to the nearest odd number.
pub fn guess_len(magnitude: u128) -> u32 {
    let len = digit_len(magnitude);
    if len % 2 != 0 {
        len
    } else {
        len - 1
    }
}

fn digit_len(magnitude: u128) -> u32 {
    magnitude.checked_ilog10().map_or(1, |log| log + 1)
}

/// Keyed shift over integer magnitudes, shared by both anonymizers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Shift {
    max_range: Option<u64>,
}

impl Shift {
    fn bounded_key(key: &str, digits: u32) -> u128 {
        u128::from(numerize_key(key)) % 10u128.pow(digits.min(MAX_DIGITS))
    }

    fn encrypt(&self, magnitude: u128, key: &str) -> u128 {
        match self.max_range {
            Some(range) => magnitude + u128::from(numerize_key(key) % range),
            None => magnitude + Self::bounded_key(key, guess_len(magnitude)),
        }
    }

    fn decrypt(&self, magnitude: u128, key: &str) -> Option<u128> {
        if let Some(range) = self.max_range {
            return magnitude.checked_sub(u128::from(numerize_key(key) % range));
        }

        // The original guess is either the guess of the sum or, when the sum
        // gained a digit from an even-length original, two below it.
        let guess = guess_len(magnitude);
        let candidates = [Some(guess), guess.checked_sub(2).filter(|g| *g > 0)];
        candidates.into_iter().flatten().find_map(|digits| {
            magnitude
                .checked_sub(Self::bounded_key(key, digits))
                .filter(|original| guess_len(*original) == digits)
        })
    }
}

/// JSON integer holding `value`
///
/// JSON integers are i64 or u64. Positive results past `i64::MAX` spill
/// into u64; negative results past `i64::MIN` are folded into the top
/// [`FOLD_SPAN`] values of u64, which a positive shift never reaches.
fn fold(value: i128) -> Option<Number> {
    if let Ok(v) = i64::try_from(value) {
        return Some(Number::from(v));
    }
    let fold_start = u128::from(u64::MAX) - FOLD_SPAN;
    let magnitude = value.unsigned_abs();
    let folded = if value > 0 {
        Some(magnitude).filter(|m| *m <= fold_start)
    } else {
        let excess = magnitude - I64_MIN_MAGNITUDE;
        (excess <= FOLD_SPAN).then(|| u128::from(u64::MAX) + 1 - excess)
    };
    folded
        .and_then(|v| u64::try_from(v).ok())
        .map(Number::from)
}

/// Inverse of [`fold`]
fn unfold(number: &Number) -> Option<i128> {
    if let Some(v) = number.as_i64() {
        return Some(i128::from(v));
    }
    let v = u128::from(number.as_u64()?);
    let fold_start = u128::from(u64::MAX) - FOLD_SPAN;
    if v <= fold_start {
        return i128::try_from(v).ok();
    }
    let magnitude = I64_MIN_MAGNITUDE + (u128::from(u64::MAX) + 1 - v);
    i128::try_from(magnitude).ok().map(|m| -m)
}

/// Splits a signed integer into sign and magnitude
fn split_sign(value: i128) -> (bool, u128) {
    (value < 0, value.unsigned_abs())
}

fn join_sign(negative: bool, magnitude: u128) -> Option<i128> {
    let value = i128::try_from(magnitude).ok()?;
    Some(if negative { -value } else { value })
}

/// Integer input, split by its textual form
#[derive(Debug, Clone, PartialEq, Eq)]
enum IntegerForm {
    /// A JSON integer
    Number(i128),
    /// A string without leading zeros
    Plain(i128),
    /// A zero-padded string: sign and the digits after the leading zero
    Padded { negative: bool, tail: String },
}

/// Parses a canonical integer string: optional `-`, then digits
///
/// `+`, whitespace and `-0` are rejected, as they could not be written back
/// unchanged.
fn parse_integer_text(text: &str) -> Option<IntegerForm> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Some(IntegerForm::Padded {
            negative,
            tail: digits[1..].to_string(),
        });
    }
    let magnitude: i128 = digits.parse().ok()?;
    if negative && magnitude == 0 {
        return None;
    }
    Some(IntegerForm::Plain(if negative { -magnitude } else { magnitude }))
}

/// Reversible integer anonymizer
///
/// Accepts JSON integers and strings holding an integer; the JSON type of
/// the value is preserved. Zero-padded strings such as `"007"` shift the
/// digits after the leading zero modulo their own range, so the width and
/// the leading zero survive.
#[derive(Debug, Clone, Default)]
pub struct NumericFieldAnonymizer {
    empty: EmptyValuePolicy,
    shift: Shift,
}

impl NumericFieldAnonymizer {
    /// Creates an integer anonymizer with a length-guessed shift range
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed shift range instead of guessing it from the value
    pub fn max_anonymization_range(mut self, range: u64) -> Self {
        self.shift.max_range = Some(range.max(1));
        self
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn parse(&self, value: &Value) -> Result<IntegerForm> {
        let parsed = match value {
            Value::Number(n) => unfold(n).map(IntegerForm::Number),
            Value::String(s) => parse_integer_text(s),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ObscuraError::invalid_value(
                self.name(),
                format!("expected an integer, found {}", type_name(value)),
            )
        })
    }

    fn shift_padded(&self, tail: &str, key: &str, direction: Direction) -> Result<String> {
        let width = tail.len();
        let digits = u32::try_from(width)
            .ok()
            .filter(|w| *w <= MAX_DIGITS)
            .ok_or_else(|| ObscuraError::invalid_value(self.name(), "too many digits"))?;
        let modulus = 10u128.pow(digits);
        let value: u128 = tail
            .parse()
            .map_err(|_| ObscuraError::invalid_value(self.name(), "expected digits"))?;
        let offset = match self.shift.max_range {
            Some(range) => u128::from(numerize_key(key) % range),
            None => u128::from(numerize_key(key)),
        } % modulus;
        let shifted = match direction {
            Direction::Encrypt => (value + offset) % modulus,
            Direction::Decrypt => (value + modulus - offset) % modulus,
        };
        Ok(format!("0{shifted:0width$}"))
    }

    fn apply(&self, value: &Value, key: &str, direction: Direction) -> Result<Value> {
        let shifted = |signed: i128| -> Result<i128> {
            let (negative, magnitude) = split_sign(signed);
            match direction {
                Direction::Encrypt => join_sign(negative, self.shift.encrypt(magnitude, key))
                    .ok_or_else(|| ObscuraError::invalid_value(self.name(), "value out of range")),
                Direction::Decrypt => self
                    .shift
                    .decrypt(magnitude, key)
                    .and_then(|m| join_sign(negative, m))
                    .ok_or_else(|| {
                        ObscuraError::invalid_value(self.name(), "value was not produced by this key")
                    }),
            }
        };

        match self.parse(value)? {
            IntegerForm::Number(n) => fold(shifted(n)?).map(Value::Number).ok_or_else(|| {
                ObscuraError::invalid_value(self.name(), "result does not fit a JSON integer")
            }),
            IntegerForm::Plain(n) => Ok(Value::String(shifted(n)?.to_string())),
            IntegerForm::Padded { negative, tail } => {
                let sign = if negative { "-" } else { "" };
                let digits = self.shift_padded(&tail, key, direction)?;
                Ok(Value::String(format!("{sign}{digits}")))
            }
        }
    }
}

impl FieldAnonymizer for NumericFieldAnonymizer {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        if let Value::Number(n) = value {
            if n.as_i64().is_none() {
                return Err(ObscuraError::invalid_value(
                    self.name(),
                    "expected an integer within the 64-bit signed range",
                ));
            }
        }
        self.apply(value, key, Direction::Encrypt)
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Decrypt)
    }
}

/// Decimal input with the scale it is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecimalForm {
    /// JSON integer
    Integer,
    /// JSON float, scaled to `decimal_places`
    Float,
    /// String with this many fraction digits (`None` without a point)
    Text(Option<usize>),
}

/// Reversible fixed-scale decimal anonymizer
///
/// The value is scaled to an integer, shifted like
/// [`NumericFieldAnonymizer`], and scaled back. JSON floats use
/// `decimal_places`; strings keep their own number of fraction digits (at
/// most `decimal_places`) and JSON integers stay integers.
#[derive(Debug, Clone)]
pub struct DecimalFieldAnonymizer {
    empty: EmptyValuePolicy,
    shift: Shift,
    decimal_places: u32,
}

impl Default for DecimalFieldAnonymizer {
    fn default() -> Self {
        Self {
            empty: EmptyValuePolicy::default(),
            shift: Shift::default(),
            decimal_places: 2,
        }
    }
}

impl DecimalFieldAnonymizer {
    /// Creates a decimal anonymizer with two decimal places
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scale
    pub fn decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = places.min(9);
        self
    }

    /// Uses a fixed shift range (in units of the last decimal place)
    pub fn max_anonymization_range(mut self, range: u64) -> Self {
        self.shift.max_range = Some(range.max(1));
        self
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn invalid(&self, text: &str) -> ObscuraError {
        ObscuraError::invalid_value(
            self.name(),
            format!(
                "'{text}' is not a decimal with at most {} decimal places",
                self.decimal_places
            ),
        )
    }

    fn parse(&self, value: &Value) -> Result<(i128, DecimalForm)> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(v) => Ok((i128::from(v), DecimalForm::Integer)),
                None => {
                    let text = n.to_string();
                    let places = self.decimal_places as usize;
                    unscaled(&text, places, true)
                        .map(|v| (v, DecimalForm::Float))
                        .ok_or_else(|| self.invalid(&text))
                }
            },
            Value::String(text) => {
                let places = text.split_once('.').map(|(_, f)| f.len());
                if places.unwrap_or(0) > self.decimal_places as usize {
                    return Err(self.invalid(text));
                }
                unscaled(text, places.unwrap_or(0), false)
                    .map(|v| (v, DecimalForm::Text(places)))
                    .ok_or_else(|| self.invalid(text))
            }
            other => Err(ObscuraError::invalid_value(
                self.name(),
                format!("expected a decimal, found {}", type_name(other)),
            )),
        }
    }

    fn render(&self, form: DecimalForm, unscaled: i128) -> Result<Value> {
        let out_of_range = || ObscuraError::invalid_value(self.name(), "value out of range");
        match form {
            DecimalForm::Integer => i64::try_from(unscaled)
                .map(|v| Value::Number(Number::from(v)))
                .map_err(|_| out_of_range()),
            DecimalForm::Float => format_scaled(unscaled, self.decimal_places as usize)
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(out_of_range),
            DecimalForm::Text(None) => Ok(Value::String(unscaled.to_string())),
            DecimalForm::Text(Some(places)) => Ok(Value::String(format_scaled(unscaled, places))),
        }
    }
}

/// Unscaled integer of `text` at `places` fraction digits
///
/// With `lenient` (float rendering), shorter fractions are padded; strings
/// must be canonical: no leading zeros, no sign on zero, digits on both
/// sides of the point.
fn unscaled(text: &str, places: usize, lenient: bool) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
        Some(_) => return None,
        None => (digits, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
        || fraction.len() > places
    {
        return None;
    }
    if !lenient && whole.len() > 1 && whole.starts_with('0') {
        return None;
    }

    let padded = format!("{fraction:0<places$}");
    let scale = 10i128.checked_pow(u32::try_from(places).ok()?)?;
    let whole: i128 = whole.parse().ok()?;
    let fraction: i128 = if padded.is_empty() { 0 } else { padded.parse().ok()? };
    let magnitude = whole.checked_mul(scale)?.checked_add(fraction)?;
    if negative && magnitude == 0 && !lenient {
        return None;
    }
    Some(if negative { -magnitude } else { magnitude })
}

/// Renders an unscaled integer with exactly `places` fraction digits
fn format_scaled(unscaled: i128, places: usize) -> String {
    let sign = if unscaled < 0 { "-" } else { "" };
    let magnitude = unscaled.unsigned_abs();
    if places == 0 {
        return format!("{sign}{magnitude}");
    }
    let scale = 10u128.pow(places as u32);
    format!(
        "{sign}{}.{:0places$}",
        magnitude / scale,
        magnitude % scale
    )
}

impl FieldAnonymizer for DecimalFieldAnonymizer {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        let (unscaled, form) = self.parse(value)?;
        let (negative, magnitude) = split_sign(unscaled);
        let result = join_sign(negative, self.shift.encrypt(magnitude, key))
            .ok_or_else(|| ObscuraError::invalid_value(self.name(), "value out of range"))?;
        self.render(form, result)
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        let (unscaled, form) = self.parse(value)?;
        let (negative, magnitude) = split_sign(unscaled);
        let result = self
            .shift
            .decrypt(magnitude, key)
            .and_then(|m| join_sign(negative, m))
            .ok_or_else(|| {
                ObscuraError::invalid_value(self.name(), "value was not produced by this key")
            })?;
        self.render(form, result)
    }
}
