//! Monetary amounts in integer minor units (two decimals).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Amount in 1/100 of the currency unit. Serialized as a decimal number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parse `"125000"`, `"125000.5"` or `"125000.50"`. More than two
    /// decimals, signs other than a leading `-`, and empty input are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let whole: i64 = whole.parse().ok()?;
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        let minor = whole.checked_mul(100)?.checked_add(cents)?;
        Some(Self(if negative { -minor } else { minor }))
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let minor = (value * 100.0).round();
        if minor.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self(minor as i64))
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_mul(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Sum of `amounts`, or `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Int(units) => units.checked_mul(100).map(Money),
            Raw::Float(value) => Money::from_f64(value),
            Raw::Text(text) => Money::parse(&text),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("invalid amount"))
    }
}

impl rusqlite::ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.0))
    }
}

impl rusqlite::types::FromSql for Money {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        i64::column_result(value).map(Money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_whole_and_decimal() {
        assert_eq!(Money::parse("125000"), Some(Money(12_500_000)));
        assert_eq!(Money::parse("19.9"), Some(Money(1990)));
        assert_eq!(Money::parse("19.95"), Some(Money(1995)));
        assert_eq!(Money::parse(" 0.05 "), Some(Money(5)));
        assert_eq!(Money::parse("-3.50"), Some(Money(-350)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("1.999"), None);
        assert_eq!(Money::parse("abc"), None);
        assert_eq!(Money::parse(".5"), None);
        assert_eq!(Money::parse("1e3"), None);
    }

    #[test]
    fn display_pads_cents() {
        assert_eq!(Money(1205).to_string(), "12.05");
        assert_eq!(Money(-7).to_string(), "-0.07");
    }

    #[test]
    fn arithmetic_reports_overflow() {
        assert_eq!(Money(10_000).checked_mul(3), Some(Money(30_000)));
        assert_eq!(Money(10_000).checked_mul(1_000_000_000_000_000), None);
        assert_eq!(Money(i64::MAX).checked_add(Money(1)), None);
        assert_eq!(Money::checked_sum([Money(5), Money(7)]), Some(Money(12)));
        assert_eq!(Money::checked_sum([Money(i64::MAX), Money(1)]), None);
        assert_eq!(Money::checked_sum([]), Some(Money::ZERO));
    }

    #[test]
    fn serializes_as_decimal_number() {
        let json = serde_json::to_value(Money(15050)).unwrap();
        assert_eq!(json, serde_json::json!(150.5));
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_int: Money = serde_json::from_str("200").unwrap();
        assert_eq!(from_int, Money(20000));
        let from_float: Money = serde_json::from_str("19.99").unwrap();
        assert_eq!(from_float, Money(1999));
        let from_text: Money = serde_json::from_str("\"49.5\"").unwrap();
        assert_eq!(from_text, Money(4950));
        assert!(serde_json::from_str::<Money>("\"lots\"").is_err());
    }
}
