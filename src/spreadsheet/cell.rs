use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

const MICROS_PER_DAY: f64 = 86_400_000_000f64;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as `0` / `1`
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Shared string table reference, resolved to `Text` while reading
    SharedString,
    /// Literal text (inline or resolved shared string)
    Text,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Quoted literals, escapes and bracketed sections (colors, locales) are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_serial(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberTime1900
                | Self::NumberDateTime1904
                | Self::NumberDate1904
                | Self::NumberTime1904
        )
    }

    fn is_1904(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904
        )
    }
}

/// Represents a single cell in a spreadsheet with position, type, and value.
#[derive(Clone, Debug)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    /// Cell data type
    pub kind: CellType,
    /// Cell value as it appears in the sheet XML
    pub value: String,
}

impl Cell {
    /// True when the cell carries nothing worth loading.
    pub fn is_blank(&self) -> bool {
        self.kind == CellType::Empty || self.value.trim().is_empty()
    }

    /// Text rendering used for TEXT columns and header labels.
    /// Serial dates are rendered in ISO form; unparseable serials fall back to the raw value.
    pub fn to_text(&self) -> String {
        match self.kind {
            CellType::Boolean => if self.value == "1" { "true" } else { "false" }.to_owned(),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => self
                .to_datetime()
                .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|_| self.value.to_owned()),
            CellType::NumberDate1900 | CellType::NumberDate1904 => self
                .to_date()
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|_| self.value.to_owned()),
            CellType::NumberTime1900 | CellType::NumberTime1904 => self
                .to_time()
                .map(|time| time.format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| self.value.to_owned()),
            CellType::IsoDateTime => self.value.replace('T', " "),
            _ => self.value.to_owned(),
        }
    }

    /// Converts cell value to boolean.
    pub fn to_boolean(&self) -> Result<bool, String> {
        match self.kind {
            CellType::Boolean => Ok(self.value == "1"),
            CellType::Number => self.to_double().map(|value| value != 0.0),
            _ => match self.value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(true),
                "false" | "no" | "n" | "0" => Ok(false),
                _ => Err(format!("parse '{}' to boolean failed", self.value)),
            },
        }
    }

    /// Converts cell value to 64-bit integer; numbers with a fractional part are rejected.
    pub fn to_bigint(&self) -> Result<i64, String> {
        let trimmed = self.value.trim();
        if let Ok(integer) = trimmed.parse::<i64>() {
            return Ok(integer);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => Ok(value as i64),
            _ => Err(format!("parse '{}' to bigint failed", self.value)),
        }
    }

    /// Converts cell value to double-precision floating point.
    pub fn to_double(&self) -> Result<f64, String> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Converts cell value to a calendar date.
    /// Handles Excel serial dates (1900 and 1904 epochs) and ISO dates.
    pub fn to_date(&self) -> Result<NaiveDate, String> {
        if self.kind.is_serial() {
            let days = self.to_double()?.trunc() as i64;
            serial_to_date(days, self.kind.is_1904())
                .ok_or_else(|| format!("serial '{}' is out of date range", self.value))
        } else {
            let text = self.value.trim();
            let date = text.split(['T', ' ']).next().unwrap_or(text);
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| format!("parse '{}' to date failed", self.value))
        }
    }

    /// Converts cell value to a time of day.
    /// Handles the fractional part of Excel serials and ISO times.
    pub fn to_time(&self) -> Result<NaiveTime, String> {
        if self.kind.is_serial() {
            let fraction = self.to_double()?.fract();
            let micros = (fraction * MICROS_PER_DAY).round() as i64;
            Ok(NaiveTime::MIN + Duration::microseconds(micros))
        } else {
            let text = self.value.trim();
            let time = text.rsplit(['T', ' ']).next().unwrap_or(text);
            NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
                .map_err(|_| format!("parse '{}' to time failed", self.value))
        }
    }

    /// Converts cell value to a date and time.
    /// Handles Excel serial date-times and ISO date-times (a bare date means midnight).
    pub fn to_datetime(&self) -> Result<NaiveDateTime, String> {
        if self.kind.is_serial() {
            Ok(self.to_date()?.and_time(self.to_time()?))
        } else {
            let text = self.value.trim();
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .or_else(|_| self.to_date().map(|date| date.and_time(NaiveTime::MIN)))
                .map_err(|_| format!("parse '{}' to datetime failed", self.value))
        }
    }
}

/// Converts an Excel day serial to a date.
/// The 1900 system keeps the Lotus 1-2-3 phantom 1900-02-29, so serials below 60 shift by one day.
fn serial_to_date(days: i64, is_1904: bool) -> Option<NaiveDate> {
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)
}
