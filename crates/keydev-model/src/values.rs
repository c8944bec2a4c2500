//! Validated value types

use crate::error::ModelError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fractional development size of a KeyDev
///
/// Used by reporting to sum slot utilization. The admission gate ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Weight {
    /// 0
    Zero,
    /// 0.25
    Quarter,
    /// 0.5
    Half,
    /// 0.75
    ThreeQuarters,
    /// 1
    One,
}

impl Weight {
    /// Numeric value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Weight::Zero => 0.0,
            Weight::Quarter => 0.25,
            Weight::Half => 0.5,
            Weight::ThreeQuarters => 0.75,
            Weight::One => 1.0,
        }
    }
}

impl TryFrom<f64> for Weight {
    type Error = ModelError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        [
            Weight::Zero,
            Weight::Quarter,
            Weight::Half,
            Weight::ThreeQuarters,
            Weight::One,
        ]
        .into_iter()
        .find(|w| (w.value() - value).abs() < f64::EPSILON)
        .ok_or(ModelError::InvalidWeight(value))
    }
}

impl From<Weight> for f64 {
    fn from(value: Weight) -> Self {
        value.value()
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Delivery month in `YYYY-MM` form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthRef(String);

impl MonthRef {
    /// Borrow the `YYYY-MM` text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First day of the month
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        // Validated on construction.
        NaiveDate::parse_from_str(&format!("{}-01", self.0), "%Y-%m-%d")
            .unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for MonthRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[4] == b'-'
            && bytes[5..].iter().all(u8::is_ascii_digit)
            && NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok();
        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(ModelError::InvalidMonthRef(s.to_string()))
        }
    }
}

impl TryFrom<String> for MonthRef {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthRef> for String {
    fn from(value: MonthRef) -> Self {
        value.0
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;

    #[test]
    fn weight_steps() {
        assert_eq!(Weight::try_from(0.0).unwrap(), Weight::Zero);
        assert_eq!(Weight::try_from(0.75).unwrap(), Weight::ThreeQuarters);
        assert_eq!(Weight::try_from(1.0).unwrap(), Weight::One);
        assert!(Weight::try_from(0.3).is_err());
        assert!(Weight::try_from(2.0).is_err());
    }

    #[test]
    fn weight_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Weight::Half).unwrap(), "0.5");
        let w: Weight = serde_json::from_str("0.25").unwrap();
        assert_eq!(w, Weight::Quarter);
        assert!(serde_json::from_str::<Weight>("0.6").is_err());
    }

    #[test]
    fn month_ref_validation() {
        assert!("2026-01".parse::<MonthRef>().is_ok());
        assert!("2026-12".parse::<MonthRef>().is_ok());
        assert!("2026-13".parse::<MonthRef>().is_err());
        assert!("2026-1".parse::<MonthRef>().is_err());
        assert!("2026/01".parse::<MonthRef>().is_err());
        assert!("".parse::<MonthRef>().is_err());
        assert!("-999-01".parse::<MonthRef>().is_err());
        assert!("+999-01".parse::<MonthRef>().is_err());
        assert!("2026-+1".parse::<MonthRef>().is_err());
        assert!("２０２６-01".parse::<MonthRef>().is_err());
    }

    #[test]
    fn month_ref_first_day() {
        let month: MonthRef = "2026-03".parse().unwrap();
        let day = month.first_day();
        assert_eq!((day.year(), day.month(), day.day()), (2026, 3, 1));
    }

    proptest! {
        #[test]
        fn prop_month_ref_accepts_all_calendar_months(year in 1970i32..2200, month in 1u32..=12) {
            let text = format!("{year:04}-{month:02}");
            let parsed = text.parse::<MonthRef>();
            prop_assert!(parsed.is_ok());
            let parsed = parsed.unwrap();
            prop_assert_eq!(parsed.as_str(), text.as_str());
        }
    }
}
