//! Picture strings for `$formatNumber`, `$formatBase` and the date functions
//!
//! Number pictures follow the decimal format of XPath `format-number`:
//! `0` is a mandatory digit, `#` an optional one, `,` groups, `.` separates
//! the fraction and `e` introduces an exponent. A second sub-picture after
//! `;` formats negative numbers. Date pictures are literal text with
//! `[...]` components such as `[Y0001]-[M01]-[D01]`.

use super::error::JsonataError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};

type Result<T> = std::result::Result<T, JsonataError>;

/// Symbols used when reading a number picture
#[derive(Debug, Clone, PartialEq)]
pub struct DecimalFormat {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub exponent_separator: char,
    pub minus_sign: char,
    pub percent: char,
    pub per_mille: char,
    pub digit: char,
    pub pattern_separator: char,
}

impl Default for DecimalFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
            exponent_separator: 'e',
            minus_sign: '-',
            percent: '%',
            per_mille: '\u{2030}',
            digit: '#',
            pattern_separator: ';',
        }
    }
}

impl DecimalFormat {
    /// Override one symbol by its option name; unknown names are ignored
    pub fn set(&mut self, option: &str, symbol: char) {
        let slot = match option {
            "decimal-separator" => &mut self.decimal_separator,
            "grouping-separator" => &mut self.grouping_separator,
            "exponent-separator" => &mut self.exponent_separator,
            "minus-sign" => &mut self.minus_sign,
            "percent" => &mut self.percent,
            "per-mille" => &mut self.per_mille,
            "digit" => &mut self.digit,
            "pattern-separator" => &mut self.pattern_separator,
            _ => return,
        };
        *slot = symbol;
    }

    fn is_digit(&self, c: char) -> bool {
        c.is_ascii_digit() || c == self.digit
    }

    fn is_active(&self, c: char) -> bool {
        self.is_digit(c) || c == self.decimal_separator || c == self.grouping_separator
    }
}

fn picture_error(code: &'static str, message: impl Into<String>) -> JsonataError {
    JsonataError::function(code, "$formatNumber", message)
}

#[derive(Debug)]
struct SubPicture {
    prefix: String,
    suffix: String,
    min_integer: usize,
    /// Digits between grouping separators, counted from the right
    grouping: Vec<usize>,
    min_fraction: usize,
    max_fraction: usize,
    min_exponent: Option<usize>,
    scale: f64,
}

impl SubPicture {
    fn parse(picture: &str, format: &DecimalFormat) -> Result<Self> {
        let chars: Vec<char> = picture.chars().collect();
        let Some(start) = chars.iter().position(|&c| format.is_active(c)) else {
            return Err(picture_error(
                "D3085",
                format!("The picture string '{}' must contain at least one digit", picture),
            ));
        };
        let mut end = start;
        while end < chars.len() {
            let c = chars[end];
            let exponent = c == format.exponent_separator
                && chars.get(end + 1).is_some_and(|&next| format.is_digit(next));
            if format.is_active(c) || exponent {
                end += 1;
            } else {
                break;
            }
        }
        let prefix: String = chars[..start].iter().collect();
        let suffix: String = chars[end..].iter().collect();
        let body = &chars[start..end];

        let (mantissa, exponent) = match body.iter().position(|&c| c == format.exponent_separator) {
            Some(at) => (&body[..at], Some(&body[at + 1..])),
            None => (body, None),
        };
        let separators = mantissa
            .iter()
            .filter(|&&c| c == format.decimal_separator)
            .count();
        if separators > 1 {
            return Err(picture_error(
                "D3081",
                format!("The picture string '{}' has more than one decimal separator", picture),
            ));
        }
        let (integer, fraction) = match mantissa.iter().position(|&c| c == format.decimal_separator) {
            Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
            None => (mantissa, &[][..]),
        };
        if !integer.iter().chain(fraction).any(|&c| format.is_digit(c)) {
            return Err(picture_error(
                "D3085",
                format!("The picture string '{}' must contain at least one digit", picture),
            ));
        }

        let mut grouping = Vec::new();
        let mut digits_right = 0;
        for &c in integer.iter().rev() {
            if c == format.grouping_separator {
                grouping.push(digits_right);
            } else if format.is_digit(c) {
                digits_right += 1;
            }
        }

        let mandatory = |part: &[char]| part.iter().filter(|c| c.is_ascii_digit()).count();
        let scale = if prefix.contains(format.percent) || suffix.contains(format.percent) {
            100.0
        } else if prefix.contains(format.per_mille) || suffix.contains(format.per_mille) {
            1000.0
        } else {
            1.0
        };

        Ok(Self {
            prefix,
            suffix,
            min_integer: mandatory(integer),
            grouping,
            min_fraction: mandatory(fraction),
            max_fraction: fraction.iter().filter(|&&c| format.is_digit(c)).count(),
            min_exponent: exponent.map(mandatory),
            scale,
        })
    }

    fn render(&self, value: f64, format: &DecimalFormat) -> String {
        let mut value = value * self.scale;
        let mut exponent = 0i32;
        if self.min_exponent.is_some() && value != 0.0 {
            let integer_digits = self.min_integer.max(1) as i32;
            exponent = value.log10().floor() as i32 + 1 - integer_digits;
            value /= 10f64.powi(exponent);
        }

        let rounded = round_half_even(value, self.max_fraction as i32);
        let text = format!("{:.*}", self.max_fraction, rounded);
        let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let mut integer = if integer == "0" && self.min_integer == 0 {
            String::new()
        } else {
            integer.to_string()
        };
        while integer.len() < self.min_integer {
            integer.insert(0, '0');
        }
        let integer = self.group(&integer, format.grouping_separator);

        let mut fraction = fraction.to_string();
        while fraction.len() > self.min_fraction && fraction.ends_with('0') {
            fraction.pop();
        }

        let mut out = self.prefix.clone();
        out.push_str(&integer);
        if !fraction.is_empty() {
            out.push(format.decimal_separator);
            out.push_str(&fraction);
        }
        if let Some(min_exponent) = self.min_exponent {
            out.push(format.exponent_separator);
            if exponent < 0 {
                out.push(format.minus_sign);
            }
            out.push_str(&format!("{:0width$}", exponent.unsigned_abs(), width = min_exponent));
        }
        out.push_str(&self.suffix);
        out
    }

    /// Insert grouping separators; evenly spaced groups repeat
    fn group(&self, digits: &str, separator: char) -> String {
        let Some(&first) = self.grouping.first() else {
            return digits.to_string();
        };
        let regular = first > 0 && self.grouping.iter().enumerate().all(|(i, &g)| g == first * (i + 1));
        let len = digits.chars().count();
        let mut out = String::with_capacity(digits.len() + len / first.max(1));
        for (i, c) in digits.chars().enumerate() {
            let from_right = len - i;
            if i > 0 {
                let split = if regular {
                    from_right % first == 0
                } else {
                    self.grouping.contains(&from_right)
                };
                if split {
                    out.push(separator);
                }
            }
            out.push(c);
        }
        out
    }
}

/// Format `value` with a decimal picture
pub fn format_number(value: f64, picture: &str, format: &DecimalFormat) -> Result<String> {
    let pictures: Vec<&str> = picture.split(format.pattern_separator).collect();
    if pictures.len() > 2 {
        return Err(picture_error(
            "D3080",
            format!("The picture string '{}' has more than two sub-pictures", picture),
        ));
    }
    let positive = SubPicture::parse(pictures[0], format)?;
    if value < 0.0 {
        if let Some(negative) = pictures.get(1) {
            return Ok(SubPicture::parse(negative, format)?.render(-value, format));
        }
        let mut out = String::new();
        out.push(format.minus_sign);
        out.push_str(&positive.render(-value, format));
        return Ok(out);
    }
    Ok(positive.render(value, format))
}

/// Round to `places` decimals, halves going to the even neighbour
pub fn round_half_even(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    let scaled = super::value::round_significant(value * scale);
    let lower = scaled.floor();
    let diff = scaled - lower;
    let result = if diff > 0.5 {
        lower + 1.0
    } else if diff < 0.5 || lower % 2.0 == 0.0 {
        lower
    } else {
        lower + 1.0
    };
    result / scale
}

/// Render an integer in `radix` (2 to 36)
pub fn format_base(value: f64, radix: u32) -> Result<String> {
    if !(2..=36).contains(&radix) {
        return Err(JsonataError::function(
            "D3100",
            "$formatBase",
            format!("The radix of the formatBase function must be between 2 and 36. It was given {}", radix),
        ));
    }
    let rounded = round_half_even(value, 0);
    let mut magnitude = rounded.abs() as u128;
    if magnitude == 0 {
        return Ok("0".to_string());
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let digit = (magnitude % radix as u128) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        magnitude /= radix as u128;
    }
    if rounded < 0.0 {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn date_error(code: &'static str, function: &str, message: impl Into<String>) -> JsonataError {
    JsonataError::function(code, format!("${}", function), message)
}

/// Parse a `+hhmm`, `-hh:mm` or `Z` timezone
pub fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" || text == "z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match text.chars().next()? {
        '+' => (1, &text[1..]),
        '-' => (-1, &text[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse an ISO 8601 timestamp or a bare `YYYY-MM-DD` date (taken as UTC)
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp);
    }
    let midnight = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(midnight.and_utc().fixed_offset())
}

/// Width bounds of a component, from `,min-max` or the digits of its presentation
#[derive(Debug, Clone, Copy, Default)]
struct Width {
    min: Option<usize>,
    max: Option<usize>,
}

impl Width {
    /// A single width bounds both ends
    fn parse(text: &str) -> Self {
        let bound = |part: &str| match part.trim() {
            "" | "*" => None,
            digits => digits.parse().ok(),
        };
        match text.split_once('-') {
            Some((min, max)) => Self {
                min: bound(min),
                max: bound(max),
            },
            None => Self {
                min: bound(text),
                max: bound(text),
            },
        }
    }
}

/// Format a timestamp with a date picture such as `[Y0001]-[M01]-[D01]`
pub fn format_datetime(timestamp: DateTime<FixedOffset>, picture: &str, function: &str) -> Result<String> {
    let mut out = String::new();
    let mut chars = picture.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' if chars.peek() == Some(&'[') => {
                chars.next();
                out.push('[');
            }
            ']' if chars.peek() == Some(&']') => {
                chars.next();
                out.push(']');
            }
            '[' => {
                let mut marker = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) if !c.is_whitespace() => marker.push(c),
                        Some(_) => {}
                        None => {
                            return Err(date_error(
                                "D3135",
                                function,
                                "No matching closing bracket ']' in date/time picture string",
                            ))
                        }
                    }
                }
                out.push_str(&component(&timestamp, &marker, function)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn component(timestamp: &DateTime<FixedOffset>, marker: &str, function: &str) -> Result<String> {
    let mut chars = marker.chars();
    let Some(specifier) = chars.next() else {
        return Err(date_error("D3132", function, "Empty component in date/time picture string"));
    };
    let rest: String = chars.collect();
    let (presentation, width) = match rest.split_once(',') {
        Some((presentation, width)) => (presentation.to_string(), Width::parse(width)),
        None => (rest, Width::default()),
    };

    let number = |value: i64, default: &str| render_number(value, &presentation, default, width);
    let name = |text: &str, default: &str| render_name(text, &presentation, default, width);
    let offset = timestamp.offset().local_minus_utc();

    Ok(match specifier {
        'Y' => {
            let year = timestamp.year() as i64;
            let text = number(year, "1");
            match width.max {
                Some(max) if text.len() > max => text[text.len() - max..].to_string(),
                _ if presentation.len() == 2 && presentation.chars().all(|c| c.is_ascii_digit()) => {
                    text[text.len().saturating_sub(2)..].to_string()
                }
                _ => text,
            }
        }
        'M' if presentation.starts_with(|c| c == 'N' || c == 'n') => {
            name(MONTHS[timestamp.month0() as usize], "n")
        }
        'M' => number(timestamp.month() as i64, "1"),
        'D' => number(timestamp.day() as i64, "1"),
        'd' => number(timestamp.ordinal() as i64, "1"),
        'F' if presentation.is_empty() || presentation.starts_with(|c| c == 'N' || c == 'n') => {
            name(DAYS[timestamp.weekday().num_days_from_monday() as usize], "n")
        }
        'F' => number(timestamp.weekday().number_from_monday() as i64, "1"),
        'W' => number(timestamp.iso_week().week() as i64, "1"),
        'H' => number(timestamp.hour() as i64, "1"),
        'h' => {
            let hour = match timestamp.hour() % 12 {
                0 => 12,
                h => h,
            };
            number(hour as i64, "1")
        }
        'P' => {
            let marker = if timestamp.hour() < 12 { "am" } else { "pm" };
            name(marker, "n")
        }
        'm' => number(timestamp.minute() as i64, "01"),
        's' => number(timestamp.second() as i64, "01"),
        'f' => {
            let digits = presentation.chars().filter(char::is_ascii_digit).count().max(1);
            let nanos = timestamp.nanosecond() % 1_000_000_000;
            let fraction = format!("{:09}", nanos);
            fraction[..digits.min(9)].to_string()
        }
        'Z' | 'z' => {
            let sign = if offset < 0 { '-' } else { '+' };
            let minutes = offset.abs() / 60;
            let text = if presentation.contains(':') || presentation.is_empty() {
                format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
            } else {
                format!("{}{:02}{:02}", sign, minutes / 60, minutes % 60)
            };
            if specifier == 'z' {
                format!("GMT{}", text)
            } else {
                text
            }
        }
        other => {
            return Err(date_error(
                "D3132",
                function,
                format!("Unknown component specifier {} in date/time picture string", other),
            ))
        }
    })
}

/// Decimal presentation: zero padded to the number of digits shown, with
/// an optional `o` ordinal suffix
fn render_number(value: i64, presentation: &str, default: &str, width: Width) -> String {
    let presentation = if presentation.is_empty() { default } else { presentation };
    let (digits, ordinal) = match presentation.strip_suffix('o') {
        Some(digits) => (digits, true),
        None => (presentation, false),
    };
    let min = width
        .min
        .unwrap_or_else(|| digits.chars().filter(|c| c.is_ascii_digit() || *c == '#').count())
        .max(1);
    let mut text = format!("{:0width$}", value.unsigned_abs(), width = min);
    if value < 0 {
        text.insert(0, '-');
    }
    if ordinal {
        let suffix = match (value % 10, value % 100) {
            (_, 11..=13) => "th",
            (1, _) => "st",
            (2, _) => "nd",
            (3, _) => "rd",
            _ => "th",
        };
        text.push_str(suffix);
    }
    text
}

/// Name presentation: `N` upper case, `n` lower case, `Nn` title case
fn render_name(text: &str, presentation: &str, default: &str, width: Width) -> String {
    let presentation = if presentation.is_empty() { default } else { presentation };
    let mut out = match presentation {
        "N" => text.to_uppercase(),
        "n" => text.to_lowercase(),
        _ => text.to_string(),
    };
    if let Some(max) = width.max {
        out = out.chars().take(max).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(value: f64, picture: &str) -> String {
        format_number(value, picture, &DecimalFormat::default()).unwrap()
    }

    fn timestamp(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn test_grouping_and_fraction_digits() {
        assert_eq!(number(12345.6, "#,###.00"), "12,345.60");
        assert_eq!(number(1234567.0, "#,##0"), "1,234,567");
        assert_eq!(number(0.5, "#.00"), ".50");
        assert_eq!(number(3.0, "0.0#"), "3.0");
        assert_eq!(number(-6.0, "000"), "-006");
    }

    #[test]
    fn test_rounding_is_half_even() {
        assert_eq!(number(34.555, "#0.00"), "34.56");
        assert_eq!(number(2.5, "0"), "2");
        assert_eq!(number(3.5, "0"), "4");
    }

    #[test]
    fn test_percent_exponent_and_negative_sub_picture() {
        assert_eq!(number(0.14, "01%"), "14%");
        assert_eq!(number(1234.5678, "00.000e0"), "12.346e2");
        assert_eq!(number(-34.555, "#0.00;(#0.00)"), "(34.56)");
    }

    #[test]
    fn test_custom_symbols() {
        let mut format = DecimalFormat::default();
        format.set("decimal-separator", ',');
        format.set("grouping-separator", '.');
        assert_eq!(format_number(1234.5, "#.##0,00", &format).unwrap(), "1.234,50");
    }

    #[test]
    fn test_bad_pictures() {
        let format = DecimalFormat::default();
        assert_eq!(format_number(1.0, "#.#.#", &format).unwrap_err().code(), "D3081");
        assert_eq!(format_number(1.0, "a;b;c", &format).unwrap_err().code(), "D3080");
        assert_eq!(format_number(1.0, "abc", &format).unwrap_err().code(), "D3085");
    }

    #[test]
    fn test_format_base() {
        assert_eq!(format_base(100.0, 2).unwrap(), "1100100");
        assert_eq!(format_base(2555.0, 16).unwrap(), "9fb");
        assert_eq!(format_base(-10.0, 10).unwrap(), "-10");
        assert_eq!(format_base(1.0, 1).unwrap_err().code(), "D3100");
    }

    #[test]
    fn test_date_pictures() {
        let t = timestamp("2017-11-07T15:12:37.121Z");
        assert_eq!(
            format_datetime(t, "[Y0001]-[M01]-[D01] [H01]:[m01]:[s01].[f001][Z]", "formatDateTime").unwrap(),
            "2017-11-07 15:12:37.121+00:00"
        );
        assert_eq!(
            format_datetime(t, "[FNn], [D1o] [MNn] [Y]", "formatDateTime").unwrap(),
            "Tuesday, 7th November 2017"
        );
        assert_eq!(
            format_datetime(t, "[h]:[m01][P] [MNn,*-3] [Y,2]", "formatDateTime").unwrap(),
            "3:12pm Nov 17"
        );
        assert_eq!(format_datetime(t, "[[[D]]]", "formatDateTime").unwrap(), "[7]");
    }

    #[test]
    fn test_bad_date_pictures() {
        let t = timestamp("2017-11-07T15:12:37Z");
        assert_eq!(format_datetime(t, "[Y", "formatDateTime").unwrap_err().code(), "D3135");
        assert_eq!(format_datetime(t, "[Q]", "formatDateTime").unwrap_err().code(), "D3132");
    }

    #[test]
    fn test_offsets_and_timestamps() {
        assert_eq!(parse_offset("+0530").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_offset("-01:00").unwrap().local_minus_utc(), -3600);
        assert!(parse_offset("0100").is_none());
        assert!(parse_timestamp("2020-01-02").is_some());
        assert!(parse_timestamp("tomorrow").is_none());
    }
}
