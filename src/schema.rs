//! Column type inference and SQL type resolution.
//!
//! [`infer_schema`] scans every record of a repaired CSV text and classifies
//! each column into a [`FrameType`], tracking null presence and the numeric
//! range. [`resolve_sql_type`] then maps that observation onto the PostgreSQL
//! type used in the generated DDL.
//!
//! ## Classification
//!
//! - zero-length fields are nulls; a column with any null is nullable
//! - `true`/`false` tokens make a boolean column
//! - integers are `Int64`, or `UInt64` when some value exceeds `i64`
//! - integers mixed with floats are `Float64` (or fixed `Decimal` on request)
//! - ISO dates, date-times and times are recognised when date parsing is on
//! - JSON arrays and objects become `List`/`Struct`
//! - everything else is `String`

use std::fmt;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::{io_utils, naming};

/// Widest precision accepted for inferred fixed-point columns.
pub const DECIMAL_MAX_PRECISION: u32 = 38;
const DEFAULT_DECIMAL_PRECISION: u32 = 38;
const DEFAULT_DECIMAL_SCALE: u32 = 10;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Boolean,
    Date,
    Datetime,
    Time,
    String,
    List,
    Struct,
}

impl FrameType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FrameType::Int8
                | FrameType::Int16
                | FrameType::Int32
                | FrameType::Int64
                | FrameType::UInt8
                | FrameType::UInt16
                | FrameType::UInt32
                | FrameType::UInt64
                | FrameType::Float32
                | FrameType::Float64
                | FrameType::Decimal { .. }
        )
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Decimal { precision, scale } => {
                let show = |v: &Option<u32>| v.map_or_else(|| "None".to_string(), |v| v.to_string());
                write!(f, "Decimal(precision={}, scale={})", show(precision), show(scale))
            }
            other => write!(f, "{other:?}"),
        }
    }
}

/// Observed minimum and maximum of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRange {
    Integer { min: i128, max: i128 },
    Float { min: f64, max: f64 },
}

impl ValueRange {
    fn fits(&self, lower: i128, upper: i128) -> bool {
        match *self {
            ValueRange::Integer { min, max } => min >= lower && max <= upper,
            ValueRange::Float { min, max } => min >= lower as f64 && max <= upper as f64,
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRange::Integer { min, max } => write!(f, "({min} to {max})"),
            ValueRange::Float { min, max } => write!(f, "({min} to {max})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    /// `NUMERIC(precision, scale)`, or unconstrained `NUMERIC`.
    Numeric(Option<(u32, u32)>),
    Real,
    DoublePrecision,
    Boolean,
    Date,
    Timestamp,
    Time,
    Jsonb,
    Text,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::SmallInt => f.write_str("SMALLINT"),
            SqlType::Integer => f.write_str("INTEGER"),
            SqlType::BigInt => f.write_str("BIGINT"),
            SqlType::Numeric(Some((precision, scale))) => {
                write!(f, "NUMERIC({precision}, {scale})")
            }
            SqlType::Numeric(None) => f.write_str("NUMERIC"),
            SqlType::Real => f.write_str("REAL"),
            SqlType::DoublePrecision => f.write_str("DOUBLE PRECISION"),
            SqlType::Boolean => f.write_str("BOOLEAN"),
            SqlType::Date => f.write_str("DATE"),
            SqlType::Timestamp => f.write_str("TIMESTAMP WITHOUT TIME ZONE"),
            SqlType::Time => f.write_str("TIME"),
            SqlType::Jsonb => f.write_str("JSONB"),
            SqlType::Text => f.write_str("TEXT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Header as it appears in the CSV.
    pub csv_name: String,
    /// Legal, lowercase SQL identifier.
    pub sql_name: String,
    pub frame_type: FrameType,
    pub is_nullable: bool,
    pub value_range: Option<ValueRange>,
    pub sql_type: SqlType,
    /// A `Time`/`Datetime` column with at least one `HH:MM` value.
    pub seconds_omitted: bool,
}

impl ColumnSchema {
    pub fn new(
        csv_name: impl Into<String>,
        sql_name: impl Into<String>,
        frame_type: FrameType,
        is_nullable: bool,
        value_range: Option<ValueRange>,
    ) -> Self {
        Self {
            csv_name: csv_name.into(),
            sql_name: sql_name.into(),
            frame_type,
            is_nullable,
            value_range,
            sql_type: resolve_sql_type(frame_type, value_range.as_ref()),
            seconds_omitted: false,
        }
    }

    /// Column type with its nullability constraint, e.g. `INTEGER NOT NULL`.
    pub fn sql_declaration(&self) -> String {
        let constraint = if self.is_nullable { "NULL" } else { "NOT NULL" };
        format!("{} {constraint}", self.sql_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferOptions {
    pub parse_dates: bool,
    pub infer_decimals: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            parse_dates: true,
            infer_decimals: false,
        }
    }
}

/// Maps an observed column type onto a PostgreSQL type.
///
/// `Int64` is the only ambiguous width; it is narrowed to the smallest integer
/// type holding the observed range when one is known.
pub fn resolve_sql_type(frame_type: FrameType, value_range: Option<&ValueRange>) -> SqlType {
    match frame_type {
        FrameType::Int8 | FrameType::Int16 => SqlType::SmallInt,
        FrameType::Int32 => SqlType::Integer,
        FrameType::Int64 => match value_range {
            Some(range) if range.fits(i16::MIN.into(), i16::MAX.into()) => SqlType::SmallInt,
            Some(range) if range.fits(i32::MIN.into(), i32::MAX.into()) => SqlType::Integer,
            _ => SqlType::BigInt,
        },
        FrameType::UInt8 => SqlType::SmallInt,
        FrameType::UInt16 => SqlType::Integer,
        FrameType::UInt32 => SqlType::BigInt,
        FrameType::UInt64 => SqlType::Numeric(Some((20, 0))),
        FrameType::Float32 => SqlType::Real,
        FrameType::Float64 => SqlType::DoublePrecision,
        FrameType::Decimal { precision, scale } => SqlType::Numeric(Some((
            precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
            scale.unwrap_or(DEFAULT_DECIMAL_SCALE),
        ))),
        FrameType::Boolean => SqlType::Boolean,
        FrameType::Date => SqlType::Date,
        FrameType::Datetime => SqlType::Timestamp,
        FrameType::Time => SqlType::Time,
        FrameType::List | FrameType::Struct => SqlType::Jsonb,
        FrameType::String => SqlType::Text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntegerToken {
    Signed(i64),
    Unsigned(u64),
    Overflow,
}

fn parse_integer_token(value: &str) -> Option<IntegerToken> {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Ok(parsed) = value.parse::<i64>() {
        return Some(IntegerToken::Signed(parsed));
    }
    if !value.starts_with('-')
        && let Ok(parsed) = digits.parse::<u64>()
    {
        return Some(IntegerToken::Unsigned(parsed));
    }
    Some(IntegerToken::Overflow)
}

fn parse_float_token(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if value
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E'))
    {
        return None;
    }
    value.parse::<f64>().ok()
}

/// Precision and scale of a plain fixed-point literal such as `-12.340`.
fn decimal_shape(value: &str) -> Option<(u32, u32)> {
    let body = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (integer, fraction) = body.split_once('.').unwrap_or((body, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integer.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let integer_digits = integer.trim_start_matches('0').len() as u32;
    Some((integer_digits, fraction.len() as u32))
}

fn parse_date_token(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// `Some(true)` when the matched format carries seconds.
fn parse_datetime_token(value: &str) -> Option<bool> {
    DATETIME_FORMATS
        .iter()
        .find(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        .map(|fmt| fmt.contains("%S"))
}

fn parse_time_token(value: &str) -> Option<bool> {
    TIME_FORMATS
        .iter()
        .find(|fmt| NaiveTime::parse_from_str(value, fmt).is_ok())
        .map(|fmt| fmt.contains("%S"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonShape {
    Array,
    Object,
}

fn parse_json_token(value: &str) -> Option<JsonShape> {
    let shape = match value.as_bytes().first()? {
        b'[' => JsonShape::Array,
        b'{' => JsonShape::Object,
        _ => return None,
    };
    serde_json::from_str::<serde_json::Value>(value).ok()?;
    Some(shape)
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    nulls: usize,
    non_null: usize,
    boolean_matches: usize,
    integer_matches: usize,
    unsigned_matches: usize,
    integer_overflow: bool,
    float_matches: usize,
    decimal_matches: usize,
    decimal_max_integer_digits: u32,
    decimal_max_scale: u32,
    date_matches: usize,
    datetime_matches: usize,
    time_matches: usize,
    without_seconds: usize,
    array_matches: usize,
    object_matches: usize,
    int_min: Option<i128>,
    int_max: Option<i128>,
    float_min: Option<f64>,
    float_max: Option<f64>,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            nulls: 0,
            non_null: 0,
            boolean_matches: 0,
            integer_matches: 0,
            unsigned_matches: 0,
            integer_overflow: false,
            float_matches: 0,
            decimal_matches: 0,
            decimal_max_integer_digits: 0,
            decimal_max_scale: 0,
            date_matches: 0,
            datetime_matches: 0,
            time_matches: 0,
            without_seconds: 0,
            array_matches: 0,
            object_matches: 0,
            int_min: None,
            int_max: None,
            float_min: None,
            float_max: None,
        }
    }

    fn update(&mut self, raw: &str, options: &InferOptions) {
        if raw.is_empty() {
            self.nulls += 1;
            return;
        }
        self.non_null += 1;
        let value = raw.trim();
        if value.is_empty() {
            return;
        }

        if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            self.boolean_matches += 1;
            return;
        }

        if let Some(token) = parse_integer_token(value) {
            self.integer_matches += 1;
            self.float_matches += 1;
            match token {
                IntegerToken::Signed(v) => self.observe_integer(v.into()),
                IntegerToken::Unsigned(v) => {
                    self.unsigned_matches += 1;
                    self.observe_integer(v.into());
                }
                IntegerToken::Overflow => self.integer_overflow = true,
            }
            if let Ok(v) = value.parse::<f64>() {
                self.observe_float(v);
            }
            self.observe_decimal(value);
            return;
        }

        if let Some(v) = parse_float_token(value) {
            self.float_matches += 1;
            self.observe_float(v);
            self.observe_decimal(value);
            return;
        }

        if options.parse_dates {
            if parse_date_token(value) {
                self.date_matches += 1;
                return;
            }
            if let Some(has_seconds) = parse_datetime_token(value) {
                self.datetime_matches += 1;
                self.observe_clock(has_seconds);
                return;
            }
            if let Some(has_seconds) = parse_time_token(value) {
                self.time_matches += 1;
                self.observe_clock(has_seconds);
                return;
            }
        }

        match parse_json_token(value) {
            Some(JsonShape::Array) => self.array_matches += 1,
            Some(JsonShape::Object) => self.object_matches += 1,
            None => {}
        }
    }

    fn observe_clock(&mut self, has_seconds: bool) {
        if !has_seconds {
            self.without_seconds += 1;
        }
    }

    fn observe_integer(&mut self, value: i128) {
        self.int_min = Some(self.int_min.map_or(value, |m| m.min(value)));
        self.int_max = Some(self.int_max.map_or(value, |m| m.max(value)));
    }

    fn observe_float(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.float_min = Some(self.float_min.map_or(value, |m| m.min(value)));
        self.float_max = Some(self.float_max.map_or(value, |m| m.max(value)));
    }

    fn observe_decimal(&mut self, value: &str) {
        if let Some((integer_digits, scale)) = decimal_shape(value) {
            self.decimal_matches += 1;
            self.decimal_max_integer_digits = self.decimal_max_integer_digits.max(integer_digits);
            self.decimal_max_scale = self.decimal_max_scale.max(scale);
        }
    }

    fn all(&self, count: usize) -> bool {
        count > 0 && count == self.non_null
    }

    fn decimal_type(&self) -> Option<FrameType> {
        if !self.all(self.decimal_matches) {
            return None;
        }
        let scale = self.decimal_max_scale;
        let precision = (self.decimal_max_integer_digits + scale).max(1);
        if precision > DECIMAL_MAX_PRECISION {
            return None;
        }
        Some(FrameType::Decimal {
            precision: Some(precision),
            scale: Some(scale),
        })
    }

    fn decide(&self, options: &InferOptions) -> FrameType {
        if self.non_null == 0 {
            FrameType::String
        } else if self.all(self.boolean_matches) {
            FrameType::Boolean
        } else if self.all(self.integer_matches) {
            if self.integer_overflow {
                FrameType::Float64
            } else if self.unsigned_matches > 0 {
                FrameType::UInt64
            } else {
                FrameType::Int64
            }
        } else if self.all(self.float_matches) {
            if options.infer_decimals
                && let Some(decimal) = self.decimal_type()
            {
                decimal
            } else {
                FrameType::Float64
            }
        } else if self.all(self.date_matches) {
            FrameType::Date
        } else if self.all(self.datetime_matches) {
            FrameType::Datetime
        } else if self.all(self.time_matches) {
            FrameType::Time
        } else if self.all(self.array_matches) {
            FrameType::List
        } else if self.all(self.object_matches) {
            FrameType::Struct
        } else {
            FrameType::String
        }
    }

    fn value_range(&self, frame_type: FrameType) -> Option<ValueRange> {
        match frame_type {
            FrameType::Int8
            | FrameType::Int16
            | FrameType::Int32
            | FrameType::Int64
            | FrameType::UInt8
            | FrameType::UInt16
            | FrameType::UInt32
            | FrameType::UInt64 => Some(ValueRange::Integer {
                min: self.int_min?,
                max: self.int_max?,
            }),
            other if other.is_numeric() => Some(ValueRange::Float {
                min: self.float_min?,
                max: self.float_max?,
            }),
            _ => None,
        }
    }
}

/// Parses the full CSV text and infers one [`ColumnSchema`] per header.
pub fn infer_schema(content: &str, options: &InferOptions) -> Result<Vec<ColumnSchema>> {
    let mut reader = io_utils::open_csv_reader(content.as_bytes());
    let headers = reader
        .headers()
        .context("Reading CSV header")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut candidates = vec![TypeCandidate::new(); headers.len()];

    let mut record = csv::StringRecord::new();
    let mut rows = 0usize;
    while reader
        .read_record(&mut record)
        .with_context(|| format!("Reading CSV record {}", rows + 1))?
    {
        for (candidate, field) in candidates.iter_mut().zip(record.iter()) {
            candidate.update(field, options);
        }
        rows += 1;
    }

    let sql_names = naming::unique_sql_names(&headers);
    let columns = headers
        .into_iter()
        .zip(sql_names)
        .zip(candidates)
        .map(|((csv_name, sql_name), candidate)| {
            let frame_type = candidate.decide(options);
            let value_range = candidate.value_range(frame_type);
            let mut column =
                ColumnSchema::new(csv_name, sql_name, frame_type, candidate.nulls > 0, value_range);
            column.seconds_omitted = candidate.without_seconds > 0
                && matches!(frame_type, FrameType::Datetime | FrameType::Time);
            column
        })
        .collect();
    Ok(columns)
}

/// Cleaned identifiers of the header row, without scanning the data.
pub fn read_header_names(content: &str) -> Result<Vec<String>> {
    let mut reader = io_utils::open_csv_reader(content.as_bytes());
    let headers = reader.headers().context("Reading CSV header")?;
    if headers.is_empty() {
        bail!("CSV has no header");
    }
    Ok(naming::unique_sql_names(headers.iter()))
}
