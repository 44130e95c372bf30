//! Runtime values and the named-value capability implemented by elements.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::plan::Plan;
use crate::types::{EnumType, Primitive, Type};

/// An element whose members are discovered at evaluation time.
///
/// The compiler calls [`try_get_named_value`](Self::try_get_named_value)
/// for every member name that is not statically declared on the element's
/// [`RecordType`](crate::RecordType). Returning `None` means the element has
/// no such member; the engine turns that into [`Value::Absent`], never an
/// error.
pub trait Record: fmt::Debug + Send + Sync {
    /// Type name used in diagnostics and for dominant-type voting.
    fn type_name(&self) -> &str {
        "Record"
    }

    /// Value called `name`, or `None` when the element has none.
    fn try_get_named_value(&self, name: &str) -> Option<Value>;

    /// All members, for display and JSON output.
    fn named_values(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// A member of a user enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    ty: Arc<EnumType>,
    value: i64,
}

impl EnumValue {
    /// Wrap an integer as a member of `ty`.
    #[must_use]
    pub fn new(ty: Arc<EnumType>, value: i64) -> Self {
        Self { ty, value }
    }

    /// Look up a member by name (case-insensitive).
    #[must_use]
    pub fn named(ty: &Arc<EnumType>, name: &str) -> Option<Self> {
        ty.member(name).map(|value| Self::new(Arc::clone(ty), value))
    }

    /// The enum type.
    #[must_use]
    pub fn enum_type(&self) -> &Arc<EnumType> {
        &self.ty
    }

    /// The underlying integer.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty.member_name(self.value) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.value),
        }
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    /// A dynamic lookup found nothing.
    Absent,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Character.
    Char(char),
    /// 8-bit signed integer.
    SByte(i8),
    /// 8-bit unsigned integer.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Single(f32),
    /// 64-bit float.
    Double(f64),
    /// Text.
    String(String),
    /// Date and time of day, without offset.
    DateTime(NaiveDateTime),
    /// Signed duration.
    TimeSpan(TimeDelta),
    /// Identifier.
    Guid(Uuid),
    /// Enum member.
    Enum(EnumValue),
    /// Ordered list.
    List(Arc<Vec<Value>>),
    /// String-keyed dictionary; also answers dynamic member lookups.
    Map(Arc<BTreeMap<String, Value>>),
    /// Host element implementing [`Record`].
    Record(Arc<dyn Record>),
    /// A compiled lambda, invocable from expressions as `@0(args)`.
    Lambda(Plan),
}

impl Value {
    /// Build a list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    /// Build a map from key/value pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Wrap a host element.
    pub fn record(record: impl Record + 'static) -> Self {
        Self::Record(Arc::new(record))
    }

    /// Whether this is [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Whether this is null or absent.
    #[must_use]
    pub fn is_null_or_absent(&self) -> bool {
        matches!(self, Self::Absent | Self::Null)
    }

    /// The boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The text, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral value widened to `i128`; enums count as integral.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::SByte(v) => Some(i128::from(*v)),
            Self::Byte(v) => Some(i128::from(*v)),
            Self::Int16(v) => Some(i128::from(*v)),
            Self::UInt16(v) => Some(i128::from(*v)),
            Self::Int32(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt64(v) => Some(i128::from(*v)),
            Self::Enum(e) => Some(i128::from(e.value())),
            _ => None,
        }
    }

    /// Any integral or floating value as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Single(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::Enum(_) => None,
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Runtime type; `None` for null and absent.
    #[must_use]
    pub fn type_of(&self) -> Option<Type> {
        let ty = match self {
            Self::Absent | Self::Null => return None,
            Self::Bool(_) => Type::BOOLEAN,
            Self::Char(_) => Type::CHAR,
            Self::SByte(_) => Primitive::SByte.into(),
            Self::Byte(_) => Type::BYTE,
            Self::Int16(_) => Type::INT16,
            Self::UInt16(_) => Primitive::UInt16.into(),
            Self::Int32(_) => Type::INT32,
            Self::UInt32(_) => Type::UINT32,
            Self::Int64(_) => Type::INT64,
            Self::UInt64(_) => Type::UINT64,
            Self::Single(_) => Type::SINGLE,
            Self::Double(_) => Type::DOUBLE,
            Self::String(_) => Type::STRING,
            Self::DateTime(_) => Type::DATE_TIME,
            Self::TimeSpan(_) => Type::TIME_SPAN,
            Self::Guid(_) => Type::GUID,
            Self::Enum(e) => Type::Enum(Arc::clone(e.enum_type())),
            Self::List(_) => Type::sequence(Type::Dynamic),
            Self::Map(_) => Type::Map,
            Self::Record(r) => Type::dynamic_record(r.type_name()),
            Self::Lambda(plan) => plan.function_type(),
        };
        Some(ty)
    }

    /// Look up a named member of a record or map. Map keys match exactly
    /// first, then ignoring case when `ignore_case` is set.
    #[must_use]
    pub fn named_value(&self, name: &str, ignore_case: bool) -> Option<Value> {
        match self {
            Self::Record(record) => record.try_get_named_value(name),
            Self::Map(map) => map.get(name).cloned().or_else(|| {
                ignore_case
                    .then(|| {
                        map.iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(name))
                            .map(|(_, v)| v.clone())
                    })
                    .flatten()
            }),
            _ => None,
        }
    }

    /// Convert to `target` the way a typed conversion node does: numeric
    /// widening and narrowing, enum/integer reinterpretation, nullable
    /// wrapping. With `checked`, out-of-range numbers fail instead of
    /// wrapping.
    pub fn convert(&self, target: &Type, checked: bool) -> Result<Value, EvaluationError> {
        if self.is_null_or_absent() {
            return Ok(self.clone());
        }
        match target.non_nullable() {
            Type::Primitive(p) => self.convert_primitive(*p, checked),
            Type::Enum(ty) => match self.as_i128() {
                Some(v) => {
                    let value = i64::try_from(v).map_err(|_| overflow(self, target))?;
                    Ok(Self::Enum(EnumValue::new(Arc::clone(ty), value)))
                }
                None => Ok(self.clone()),
            },
            _ => Ok(self.clone()),
        }
    }

    fn convert_primitive(
        &self,
        target: Primitive,
        checked: bool,
    ) -> Result<Value, EvaluationError> {
        if matches!(
            target,
            Primitive::Object
                | Primitive::String
                | Primitive::Boolean
                | Primitive::DateTime
                | Primitive::TimeSpan
                | Primitive::Guid
        ) {
            return Ok(self.clone());
        }
        if target == Primitive::Char {
            return match self.as_i128() {
                Some(v) => u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Self::Char)
                    .ok_or_else(|| overflow(self, &Type::CHAR)),
                None => Ok(self.clone()),
            };
        }
        if let Self::Char(c) = self {
            return from_i128(i128::from(u32::from(*c)), target, checked);
        }
        if let Some(v) = self.as_i128() {
            return from_i128(v, target, checked);
        }
        match self {
            Self::Single(v) => from_f64(f64::from(*v), target, checked),
            Self::Double(v) => from_f64(*v, target, checked),
            other => Ok(other.clone()),
        }
    }

    /// Best-effort conversion used when coercing sort keys to a dominant
    /// type: parses strings, maps booleans to `1`/`0`, rounds floats to the
    /// nearest integer. `None` when the value does not convert.
    #[must_use]
    pub fn coerce_to(&self, target: &Type) -> Option<Value> {
        if self.type_of().as_ref() == Some(target.non_nullable()) {
            return Some(self.clone());
        }
        if self.is_null_or_absent() {
            return None;
        }
        match target.non_nullable() {
            Type::Primitive(Primitive::String) => Some(Self::String(self.to_string())),
            Type::Primitive(Primitive::Object) => Some(self.clone()),
            Type::Primitive(Primitive::Boolean) => match self {
                Self::String(s) => parse_bool(s).map(Self::Bool),
                other => other.as_f64().map(|v| Self::Bool(v != 0.0)),
            },
            Type::Primitive(Primitive::DateTime) => match self {
                Self::String(s) => parse_date_time(s).map(Self::DateTime),
                _ => None,
            },
            Type::Primitive(Primitive::Guid) => match self {
                Self::String(s) => Uuid::parse_str(s.trim()).ok().map(Self::Guid),
                _ => None,
            },
            Type::Primitive(Primitive::TimeSpan) => None,
            Type::Primitive(p) => {
                let source = match self {
                    Self::String(s) => parse_number(s)?,
                    Self::Bool(b) => Self::Int32(i32::from(*b)),
                    Self::Double(v) if is_integral(*p) => Self::Double(v.round_ties_even()),
                    Self::Single(v) if is_integral(*p) => Self::Single(v.round_ties_even()),
                    other => other.clone(),
                };
                source
                    .convert_primitive(*p, true)
                    .ok()
                    .filter(|v| v.as_f64().is_some() || matches!(v, Self::Char(_)))
            }
            Type::Enum(ty) => match self {
                Self::String(s) => EnumValue::named(ty, s.trim()).map(Self::Enum),
                other => other
                    .as_i128()
                    .and_then(|v| i64::try_from(v).ok())
                    .map(|v| Self::Enum(EnumValue::new(Arc::clone(ty), v))),
            },
            _ => None,
        }
    }

    /// Order two values after runtime type unification: integers compare
    /// exactly, mixed numerics as floats, strings ordinally, and a string
    /// compared with a date is parsed as a date. `None` when the values are
    /// not comparable.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_i128(), other.as_i128()) {
            let foreign_enums = matches!(
                (self, other),
                (Self::Enum(x), Self::Enum(y)) if x.enum_type().name() != y.enum_type().name()
            );
            return (!foreign_enums).then(|| a.cmp(&b));
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Char(a), Self::Char(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::String(b)) => parse_date_time(b).map(|b| a.cmp(&b)),
            (Self::String(a), Self::DateTime(b)) => parse_date_time(a).map(|a| a.cmp(b)),
            (Self::TimeSpan(a), Self::TimeSpan(b)) => Some(a.cmp(b)),
            (Self::Guid(a), Self::Guid(b)) => Some(a.cmp(b)),
            (Self::Guid(a), Self::String(b)) => Uuid::parse_str(b).ok().map(|b| a.cmp(&b)),
            (Self::String(a), Self::Guid(b)) => Uuid::parse_str(a).ok().map(|a| a.cmp(b)),
            _ => None,
        }
    }

    /// Equality after runtime type unification. Lists and maps compare
    /// element-wise, host records by identity. `None` when the values are
    /// not comparable.
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(true),
            (Self::Null, _) | (_, Self::Null) => Some(false),
            (Self::List(a), Self::List(b)) => Some(
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y) == Some(true)),
            ),
            (Self::Map(a), Self::Map(b)) => Some(
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb) == Some(true)),
            ),
            (Self::Record(a), Self::Record(b)) => Some(Arc::ptr_eq(a, b)),
            _ => self.compare(other).map(Ordering::is_eq),
        }
    }

    /// JSON representation; absent becomes `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Self::Absent | Self::Null | Self::Lambda(_) => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::SByte(v) => Json::from(*v),
            Self::Byte(v) => Json::from(*v),
            Self::Int16(v) => Json::from(*v),
            Self::UInt16(v) => Json::from(*v),
            Self::Int32(v) => Json::from(*v),
            Self::UInt32(v) => Json::from(*v),
            Self::Int64(v) => Json::from(*v),
            Self::UInt64(v) => Json::from(*v),
            Self::Single(v) => {
                serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number)
            }
            Self::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::Char(_)
            | Self::String(_)
            | Self::DateTime(_)
            | Self::TimeSpan(_)
            | Self::Guid(_)
            | Self::Enum(_) => Json::String(self.to_string()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => {
                Json::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            Self::Record(record) => Json::Object(
                record
                    .named_values()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn overflow(value: &Value, target: &Type) -> EvaluationError {
    EvaluationError::Overflow {
        value: value.to_string(),
        type_name: target.to_string(),
    }
}

fn is_integral(p: Primitive) -> bool {
    Type::Primitive(p).is_signed_integral() || Type::Primitive(p).is_unsigned_integral()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn from_i128(
    v: i128,
    target: Primitive,
    checked: bool,
) -> Result<Value, EvaluationError> {
    macro_rules! narrow {
        ($variant:ident, $ty:ty) => {
            match <$ty>::try_from(v) {
                Ok(n) => Ok(Value::$variant(n)),
                Err(_) if checked => Err(overflow(&Value::Int64(v as i64), &target.into())),
                Err(_) => Ok(Value::$variant(v as $ty)),
            }
        };
    }

    match target {
        Primitive::SByte => narrow!(SByte, i8),
        Primitive::Byte => narrow!(Byte, u8),
        Primitive::Int16 => narrow!(Int16, i16),
        Primitive::UInt16 => narrow!(UInt16, u16),
        Primitive::Int32 => narrow!(Int32, i32),
        Primitive::UInt32 => narrow!(UInt32, u32),
        Primitive::Int64 => narrow!(Int64, i64),
        Primitive::UInt64 => narrow!(UInt64, u64),
        Primitive::Single => Ok(Value::Single(v as f32)),
        Primitive::Double => Ok(Value::Double(v as f64)),
        _ => Ok(Value::Int64(v as i64)),
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn from_f64(v: f64, target: Primitive, checked: bool) -> Result<Value, EvaluationError> {
    match target {
        Primitive::Single => Ok(Value::Single(v as f32)),
        Primitive::Double => Ok(Value::Double(v)),
        _ => {
            let truncated = v.trunc();
            // i128 covers every integral range; out-of-range floats saturate.
            if !truncated.is_finite() && checked {
                return Err(overflow(&Value::Double(v), &target.into()));
            }
            from_i128(truncated as i128, target, checked)
        }
    }
}

/// Read a numeric literal's source text as `target`: integer text only
/// fits integral types, any numeric text fits floating types.
pub(crate) fn parse_literal(text: &str, target: Primitive) -> Option<Value> {
    match target {
        Primitive::Single | Primitive::Double => {
            let digits = text.trim_end_matches(['f', 'F']);
            let v = digits.parse::<f64>().ok()?;
            from_f64(v, target, false).ok()
        }
        _ if is_integral(target) => from_i128(text.parse::<i128>().ok()?, target, true).ok(),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(Value::Int64(v));
    }
    s.parse::<f64>().ok().map(Value::Double)
}

/// Parse the date formats accepted by comparisons and coercions: RFC 3339,
/// ISO date-time with `T` or space, or a bare date.
pub(crate) fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn format_time_span(f: &mut fmt::Formatter<'_>, span: TimeDelta) -> fmt::Result {
    let sign = if span < TimeDelta::zero() { "-" } else { "" };
    let span = span.abs();
    let days = span.num_days();
    let hours = span.num_hours() % 24;
    let minutes = span.num_minutes() % 60;
    let seconds = span.num_seconds() % 60;
    f.write_str(sign)?;
    if days != 0 {
        write!(f, "{days}.")?;
    }
    write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent | Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Single(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Self::TimeSpan(v) => format_time_span(f, *v),
            Self::Guid(v) => write!(f, "{v}"),
            Self::Enum(v) => write!(f, "{v}"),
            Self::List(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
            Self::Record(r) => f.write_str(r.type_name()),
            Self::Lambda(plan) => write!(f, "{}", plan.function_type()),
        }
    }
}

impl PartialEq for Value {
    /// Strict equality: same variant and same payload. Host records are
    /// equal only to themselves; lambdas never compare equal.
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::SByte(a), Self::SByte(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::UInt16(a), Self::UInt16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Single(a), Self::Single(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::TimeSpan(a), Self::TimeSpan(b)) => a == b,
            (Self::Guid(a), Self::Guid(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// JSON integers become `Int64` (or `UInt64` past `i64::MAX`) so every
/// integer member of a document shares one runtime type.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt64(u)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Double)
                }
            }
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::list(items.into_iter().map(Self::from)),
            Json::Object(map) => Self::map(map.into_iter().map(|(k, v)| (k, Self::from(v)))),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    char => Char,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    String => String,
    NaiveDateTime => DateTime,
    TimeDelta => TimeSpan,
    Uuid => Guid,
    EnumValue => Enum,
    Plan => Lambda,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_json_integers_to_one_type() {
        let v = Value::from(serde_json::json!({
            "a": 1,
            "b": 5_000_000_000_i64,
            "c": 1.5,
            "d": u64::MAX,
        }));
        assert_eq!(v.named_value("a", false), Some(Value::Int64(1)));
        assert_eq!(v.named_value("b", false), Some(Value::Int64(5_000_000_000)));
        assert_eq!(v.named_value("c", false), Some(Value::Double(1.5)));
        assert_eq!(v.named_value("d", false), Some(Value::UInt64(u64::MAX)));
        assert_eq!(v.named_value("A", true), Some(Value::Int64(1)));
        assert_eq!(v.named_value("A", false), None);
    }

    #[test]
    fn test_should_compare_mixed_numerics() {
        assert_eq!(Value::Int32(3).compare(&Value::Int64(3)), Some(Ordering::Equal));
        assert_eq!(Value::Int32(3).compare(&Value::Double(3.5)), Some(Ordering::Less));
        assert_eq!(Value::UInt64(u64::MAX).compare(&Value::Int64(-1)), Some(Ordering::Greater));
        assert_eq!(Value::from("a").compare(&Value::Int32(1)), None);
    }

    #[test]
    fn test_should_compare_date_with_date_string() {
        let date = parse_date_time("2024-03-01").unwrap();
        assert_eq!(
            Value::DateTime(date).compare(&Value::from("2024-02-01T10:00:00")),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_should_coerce_strings_to_numbers_or_fail() {
        assert_eq!(Value::from("42").coerce_to(&Type::INT32), Some(Value::Int32(42)));
        assert_eq!(Value::from("b").coerce_to(&Type::INT32), None);
        assert_eq!(Value::Double(2.5).coerce_to(&Type::INT32), Some(Value::Int32(2)));
        assert_eq!(Value::Int32(7).coerce_to(&Type::STRING), Some(Value::from("7")));
    }

    #[test]
    fn test_should_fail_checked_narrowing() {
        let err = Value::Int64(300).convert(&Type::BYTE, true).unwrap_err();
        assert!(matches!(err, EvaluationError::Overflow { .. }));
        assert_eq!(Value::Int64(300).convert(&Type::BYTE, false).unwrap(), Value::Byte(44));
        assert_eq!(Value::Double(2.9).convert(&Type::INT32, true).unwrap(), Value::Int32(2));
    }

    #[test]
    fn test_should_treat_null_equal_only_to_null() {
        assert_eq!(Value::Null.loose_eq(&Value::Null), Some(true));
        assert_eq!(Value::Null.loose_eq(&Value::from("x")), Some(false));
        assert_eq!(Value::from("x").loose_eq(&Value::Int32(1)), None);
    }

    #[test]
    fn test_should_format_time_spans() {
        let span = TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::seconds(5);
        assert_eq!(Value::TimeSpan(span).to_string(), "1.02:00:05");
        assert_eq!(Value::TimeSpan(TimeDelta::minutes(90)).to_string(), "01:30:00");
    }
}
