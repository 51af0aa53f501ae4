//! Value codec for the utility's textual value convention
//!
//! Writes turn JSON scalars into a single positional argument; reads turn the
//! utility's stdout back into a JSON scalar. The two directions are not
//! inverses: `1`/`0` read back as booleans, while numbers are written in
//! exponent notation.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Integer token for an active signal
pub const ON: i64 = 1;
/// Integer token for an inactive signal
pub const OFF: i64 = 0;

// Largest magnitude at which every integer is exactly representable as f64
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A scalar carried in the `value` field of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectValue {
    Flag(bool),
    Number(Number),
    Text(String),
}

impl From<&str> for ObjectValue {
    fn from(value: &str) -> Self {
        ObjectValue::Text(value.to_string())
    }
}

/// Converts a write value into the utility's positional argument
///
/// Strings pass through verbatim, booleans become the ON/OFF tokens and
/// numbers are written in exponent notation with the shortest digits that
/// still round-trip (`1.5` → `1.5E+00`).
pub fn encode(value: &ObjectValue) -> String {
    match value {
        ObjectValue::Text(text) => text.clone(),
        ObjectValue::Flag(true) => ON.to_string(),
        ObjectValue::Flag(false) => OFF.to_string(),
        ObjectValue::Number(number) => match number.as_f64() {
            Some(float) => format_exponent(float),
            None => number.to_string(),
        },
    }
}

/// Converts the utility's stdout into a JSON scalar
///
/// Trailing line endings are stripped. Numeric text equal to the ON/OFF token
/// decodes to a boolean, any other number stays a number and everything else
/// is returned as the trimmed text.
pub fn decode(raw: &str) -> ObjectValue {
    let trimmed = raw.trim_end_matches(&['\r', '\n'][..]);

    match trimmed.parse::<f64>() {
        Ok(number) if number == ON as f64 => ObjectValue::Flag(true),
        Ok(number) if number == OFF as f64 => ObjectValue::Flag(false),
        Ok(number) => match to_json_number(number) {
            Some(number) => ObjectValue::Number(number),
            None => ObjectValue::Text(trimmed.to_string()),
        },
        Err(_) => ObjectValue::Text(trimmed.to_string()),
    }
}

fn to_json_number(number: f64) -> Option<Number> {
    if number.fract() == 0.0 && number.abs() < MAX_EXACT_INTEGER {
        return Some(Number::from(number as i64));
    }
    Number::from_f64(number)
}

fn format_exponent(number: f64) -> String {
    let formatted = format!("{:E}", number);

    match formatted.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or_default();
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(value: serde_json::Value) -> ObjectValue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn booleans_encode_as_on_off_tokens() {
        assert_eq!(encode(&ObjectValue::Flag(true)), "1");
        assert_eq!(encode(&ObjectValue::Flag(false)), "0");
    }

    #[test]
    fn strings_pass_through_verbatim() {
        assert_eq!(encode(&ObjectValue::from(" 0x1F ")), " 0x1F ");
        assert_eq!(encode(&ObjectValue::from("")), "");
    }

    #[test]
    fn numbers_encode_in_exponent_notation() {
        assert_eq!(encode(&number(json!(1.5))), "1.5E+00");
        assert_eq!(encode(&number(json!(100))), "1E+02");
        assert_eq!(encode(&number(json!(0))), "0E+00");
        assert_eq!(encode(&number(json!(-0.00025))), "-2.5E-04");
        assert_eq!(encode(&number(json!(1234.5678))), "1.2345678E+03");
        assert_eq!(encode(&number(json!(1e100))), "1E+100");
    }

    #[test]
    fn on_off_tokens_decode_as_booleans() {
        assert_eq!(decode("1\n"), ObjectValue::Flag(true));
        assert_eq!(decode("0\n"), ObjectValue::Flag(false));
        assert_eq!(decode("1.0"), ObjectValue::Flag(true));
        assert_eq!(decode("0\r\n"), ObjectValue::Flag(false));
    }

    #[test]
    fn other_numbers_decode_unchanged() {
        assert_eq!(decode("42\n"), number(json!(42)));
        assert_eq!(decode("23.5"), number(json!(23.5)));
        assert_eq!(decode("-3"), number(json!(-3)));
    }

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        let value = decode("5.0\n");
        assert_eq!(serde_json::to_string(&value).unwrap(), "5");
    }

    #[test]
    fn unparsable_text_decodes_to_trimmed_string() {
        assert_eq!(decode("busy\n"), ObjectValue::from("busy"));
        assert_eq!(decode(" 12 \n"), ObjectValue::from(" 12 "));
        assert_eq!(decode(""), ObjectValue::from(""));
    }

    #[test]
    fn non_finite_numbers_fall_back_to_text() {
        assert_eq!(decode("inf\n"), ObjectValue::from("inf"));
        assert_eq!(decode("NaN"), ObjectValue::from("NaN"));
    }

    #[test]
    fn decode_then_encode_is_not_an_identity() {
        // A numeric 1 read from the device comes back as a boolean and is
        // written as the ON token, while the same number written directly
        // goes out in exponent form.
        let read_back = decode("1\n");
        assert_eq!(read_back, ObjectValue::Flag(true));
        assert_eq!(encode(&read_back), "1");
        assert_eq!(encode(&number(json!(1))), "1E+00");

        let read_back = decode("7\n");
        assert_eq!(encode(&read_back), "7E+00");
    }

    #[test]
    fn values_deserialize_from_json_scalars() {
        assert_eq!(number(json!(true)), ObjectValue::Flag(true));
        assert_eq!(number(json!("on")), ObjectValue::from("on"));
        assert!(serde_json::from_value::<ObjectValue>(json!([1])).is_err());
    }
}
