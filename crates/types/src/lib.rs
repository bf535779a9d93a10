/// Errors that can occur when constructing validated primitive types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing calendar dates.
#[derive(Debug, thiserror::Error)]
pub enum DateError {
    /// The input did not match the `YYYY-MM-DD` shape
    #[error("Date must be in YYYY-MM-DD format")]
    Format,
    /// The input parsed structurally but names a day that does not exist
    #[error("Date is not a valid calendar date")]
    OutOfRange,
}

/// A string type that guarantees non-empty content.
///
/// Wraps a `String` and ensures at least one non-whitespace character is
/// present. Leading and trailing whitespace is trimmed during construction,
/// so the stored value is always in its canonical trimmed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed before the emptiness check.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input has no characters.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A calendar date in `YYYY-MM-DD` form, validated on construction.
///
/// Intake answers carry dates as plain strings on the wire (date questions,
/// dates of birth). This type checks the shape and the calendar (month
/// range, month length, leap years) once, so downstream code can treat the
/// stored string as well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoDate(String);

impl IsoDate {
    /// Parses and validates a `YYYY-MM-DD` date string.
    ///
    /// # Errors
    ///
    /// Returns `DateError::Format` if the input does not match the
    /// four-two-two digit shape, or `DateError::OutOfRange` if the named
    /// day does not exist in that month.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        let input = input.trim();
        let bytes = input.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(DateError::Format);
        }

        let year: u32 = input[0..4].parse().map_err(|_| DateError::Format)?;
        let month: u32 = input[5..7].parse().map_err(|_| DateError::Format)?;
        let day: u32 = input[8..10].parse().map_err(|_| DateError::Format)?;

        if !(1..=12).contains(&month) {
            return Err(DateError::OutOfRange);
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(DateError::OutOfRange);
        }

        Ok(Self(input.to_owned()))
    }

    /// Returns the canonical `YYYY-MM-DD` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

impl std::fmt::Display for IsoDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for IsoDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for IsoDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for IsoDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IsoDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_and_accepts() {
        let text = NonEmptyText::new("  hello  ").unwrap();
        assert_eq!(text.as_str(), "hello");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace_only() {
        let err = NonEmptyText::new("   ").expect_err("should reject whitespace");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn test_iso_date_accepts_valid_dates() {
        assert!(IsoDate::parse("1990-01-31").is_ok());
        assert!(IsoDate::parse("2024-02-29").is_ok());
        assert!(IsoDate::parse("2000-02-29").is_ok());
    }

    #[test]
    fn test_iso_date_rejects_bad_shapes() {
        assert!(matches!(IsoDate::parse("31/01/1990"), Err(DateError::Format)));
        assert!(matches!(IsoDate::parse("1990-1-31"), Err(DateError::Format)));
        assert!(matches!(IsoDate::parse(""), Err(DateError::Format)));
    }

    #[test]
    fn test_iso_date_rejects_impossible_days() {
        assert!(matches!(
            IsoDate::parse("2023-02-29"),
            Err(DateError::OutOfRange)
        ));
        assert!(matches!(
            IsoDate::parse("1990-04-31"),
            Err(DateError::OutOfRange)
        ));
        assert!(matches!(
            IsoDate::parse("1990-13-01"),
            Err(DateError::OutOfRange)
        ));
    }

    #[test]
    fn test_iso_date_serde_round_trip() {
        let date: IsoDate = serde_json::from_str("\"2024-06-15\"").unwrap();
        assert_eq!(date.as_str(), "2024-06-15");
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2024-06-15\"");
    }
}
