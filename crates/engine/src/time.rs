use std::fmt;

/// Parses an `HH:MM:SS` duration into seconds.
///
/// Hours are unbounded; minutes and seconds must be below 60.
///
/// # Example
/// ```
/// use cachedump_engine::time::parse_clock;
///
/// assert_eq!(parse_clock("01:30:05").expect("valid"), 5_405.0);
/// ```
pub fn parse_clock(input: &str) -> Result<f64, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() != 3 {
        return Err(TimeParseError::FieldCount {
            found: fields.len(),
        });
    }

    let hours = parse_field(fields[0], ClockField::Hours)?;
    let minutes = parse_field(fields[1], ClockField::Minutes)?;
    let seconds = parse_field(fields[2], ClockField::Seconds)?;

    for (field, value) in [
        (ClockField::Minutes, minutes),
        (ClockField::Seconds, seconds),
    ] {
        if value >= 60 {
            return Err(TimeParseError::OutOfRange { field, value });
        }
    }

    let total = hours
        .checked_mul(3_600)
        .and_then(|value| value.checked_add(minutes * 60 + seconds))
        .ok_or(TimeParseError::Overflow)?;
    Ok(total as f64)
}

/// Formats seconds as `HH<sep>MM<sep>SS`, rounding down to whole seconds.
///
/// Negative inputs are clamped to zero.
pub fn format_clock(seconds: f64, separator: char) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    format!("{hours:02}{separator}{minutes:02}{separator}{secs:02}")
}

fn parse_field(value: &str, field: ClockField) -> Result<u64, TimeParseError> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(TimeParseError::NotANumber {
            field,
            value: value.to_string(),
        });
    }
    value.parse::<u64>().map_err(|_| TimeParseError::Overflow)
}

/// Clock component named in parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockField {
    Hours,
    Minutes,
    Seconds,
}

impl ClockField {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    Empty,
    FieldCount { found: usize },
    NotANumber { field: ClockField, value: String },
    OutOfRange { field: ClockField, value: u64 },
    Overflow,
}

impl std::error::Error for TimeParseError {}

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "time cannot be empty"),
            Self::FieldCount { found } => {
                write!(f, "expected HH:MM:SS but found {found} field(s)")
            }
            Self::NotANumber { field, value } => {
                write!(f, "{} must be digits, found '{value}'", field.as_str())
            }
            Self::OutOfRange { field, value } => {
                write!(f, "{} out of range: {value}", field.as_str())
            }
            Self::Overflow => write!(f, "time is too large"),
        }
    }
}
