//! Built-in members: properties, methods, static members and constructors
//! of the predefined types, plus `Math` and `Convert`.
//!
//! The catalogue is static. The resolver selects entries by receiver, name,
//! kind and arity, then picks the best overload for the argument types.

use std::fmt::{self, Write as _};
use std::sync::LazyLock;

use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::types::{Primitive, Type};
use crate::value::{Value, parse_date_time};

/// A type name usable as `Name.Member` or `Name(args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    /// A predefined scalar type.
    Primitive(Primitive),
    /// Static math helpers.
    Math,
    /// Static conversion helpers.
    Convert,
}

impl TypeName {
    /// Case-insensitive lookup of a type keyword.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("Math") {
            Some(Self::Math)
        } else if name.eq_ignore_ascii_case("Convert") {
            Some(Self::Convert)
        } else {
            Primitive::from_name(name).map(Self::Primitive)
        }
    }

    /// The type a conversion `Name(x)` targets, if any.
    #[must_use]
    pub fn as_type(self) -> Option<Type> {
        match self {
            Self::Primitive(p) => Some(Type::Primitive(p)),
            Self::Math | Self::Convert => None,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Math => f.write_str("Math"),
            Self::Convert => f.write_str("Convert"),
        }
    }
}

/// What a built-in member is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// Instances of a primitive type.
    Instance(Primitive),
    /// Instances of any type.
    AnyInstance,
    /// The type itself (static members and constructors).
    Static(TypeName),
}

impl Receiver {
    /// Instance receiver for values of static type `ty`.
    #[must_use]
    pub fn of(ty: &Type) -> Option<Self> {
        match ty.non_nullable() {
            Type::Primitive(p) => Some(Self::Instance(*p)),
            _ => None,
        }
    }
}

/// Member category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Accessed without an argument list.
    Property,
    /// Called with an argument list.
    Method,
    /// `Type(args)`.
    Constructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    ToString,
    StrLength,
    StrContains,
    StrStartsWith,
    StrEndsWith,
    StrIndexOf,
    StrIndexOfChar,
    StrToUpper,
    StrToLower,
    StrTrim,
    StrSubstring,
    StrSubstringLen,
    StrReplace,
    StrSplit,
    StrCompareTo,
    StrEmpty,
    StrIsNullOrEmpty,
    StrConcat,
    StrCompare,
    StrCompareIgnoreCase,
    DateYear,
    DateMonth,
    DateDay,
    DateHour,
    DateMinute,
    DateSecond,
    DateDayOfYear,
    DateDayOfWeek,
    DateDate,
    DateTimeOfDay,
    DateAddDays,
    DateAddHours,
    DateAddMinutes,
    DateAddSeconds,
    DateAddMonths,
    DateAddYears,
    DateSubtract,
    DateFormat,
    DateNow,
    DateUtcNow,
    DateToday,
    DateMin,
    DateMax,
    DateParse,
    DateNew,
    DateTimeNew,
    SpanDays,
    SpanHours,
    SpanMinutes,
    SpanSeconds,
    SpanMilliseconds,
    SpanTotalDays,
    SpanTotalHours,
    SpanTotalMinutes,
    SpanTotalSeconds,
    SpanTotalMilliseconds,
    SpanAdd,
    SpanNegate,
    SpanZero,
    SpanFromDays,
    SpanFromHours,
    SpanFromMinutes,
    SpanFromSeconds,
    SpanNew,
    SpanNewDays,
    GuidEmpty,
    GuidNew,
    GuidParse,
    Int32Max,
    Int32Min,
    Int64Max,
    Int64Min,
    DoubleMax,
    DoubleMin,
    Parse(Primitive),
    MathPi,
    MathE,
    MathAbs,
    MathMax,
    MathMin,
    MathRound,
    MathRoundDigits,
    MathFloor,
    MathCeiling,
    MathTruncate,
    MathSqrt,
    MathPow,
    ConvertTo(Primitive),
}

/// One catalogue entry.
#[derive(Debug)]
pub struct Builtin {
    /// Owner of the member.
    pub receiver: Receiver,
    /// Member name.
    pub name: &'static str,
    /// Property, method or constructor.
    pub kind: MemberKind,
    /// Parameter types.
    pub params: Vec<Type>,
    /// Result type.
    pub result: Type,
    op: Op,
}

#[derive(Default)]
struct CatalogueBuilder(Vec<Builtin>);

impl CatalogueBuilder {
    fn push(
        &mut self,
        receiver: Receiver,
        kind: MemberKind,
        name: &'static str,
        params: &[Type],
        result: Type,
        op: Op,
    ) {
        self.0.push(Builtin {
            receiver,
            name,
            kind,
            params: params.to_vec(),
            result,
            op,
        });
    }

    fn property(&mut self, receiver: Receiver, name: &'static str, result: Type, op: Op) {
        self.push(receiver, MemberKind::Property, name, &[], result, op);
    }

    fn method(
        &mut self,
        receiver: Receiver,
        name: &'static str,
        params: &[Type],
        result: Type,
        op: Op,
    ) {
        self.push(receiver, MemberKind::Method, name, params, result, op);
    }
}

#[allow(clippy::too_many_lines)]
fn build_catalogue() -> Vec<Builtin> {
    use Receiver::{AnyInstance, Instance, Static};

    let string = Instance(Primitive::String);
    let date = Instance(Primitive::DateTime);
    let span = Instance(Primitive::TimeSpan);
    let string_type = Static(TypeName::Primitive(Primitive::String));
    let date_type = Static(TypeName::Primitive(Primitive::DateTime));
    let span_type = Static(TypeName::Primitive(Primitive::TimeSpan));
    let guid_type = Static(TypeName::Primitive(Primitive::Guid));
    let math = Static(TypeName::Math);
    let convert = Static(TypeName::Convert);
    let (s, i, d) = (Type::STRING, Type::INT32, Type::DOUBLE);

    let mut c = CatalogueBuilder::default();
    c.method(AnyInstance, "ToString", &[], s.clone(), Op::ToString);

    c.property(string, "Length", i.clone(), Op::StrLength);
    c.method(string, "Contains", &[s.clone()], Type::BOOLEAN, Op::StrContains);
    c.method(string, "StartsWith", &[s.clone()], Type::BOOLEAN, Op::StrStartsWith);
    c.method(string, "EndsWith", &[s.clone()], Type::BOOLEAN, Op::StrEndsWith);
    c.method(string, "IndexOf", &[s.clone()], i.clone(), Op::StrIndexOf);
    c.method(string, "IndexOf", &[Type::CHAR], i.clone(), Op::StrIndexOfChar);
    c.method(string, "ToUpper", &[], s.clone(), Op::StrToUpper);
    c.method(string, "ToLower", &[], s.clone(), Op::StrToLower);
    c.method(string, "Trim", &[], s.clone(), Op::StrTrim);
    c.method(string, "Substring", &[i.clone()], s.clone(), Op::StrSubstring);
    c.method(string, "Substring", &[i.clone(), i.clone()], s.clone(), Op::StrSubstringLen);
    c.method(string, "Replace", &[s.clone(), s.clone()], s.clone(), Op::StrReplace);
    c.method(string, "Split", &[s.clone()], Type::sequence(s.clone()), Op::StrSplit);
    c.method(string, "CompareTo", &[s.clone()], i.clone(), Op::StrCompareTo);
    c.property(string_type, "Empty", s.clone(), Op::StrEmpty);
    c.method(string_type, "IsNullOrEmpty", &[s.clone()], Type::BOOLEAN, Op::StrIsNullOrEmpty);
    c.method(string_type, "Concat", &[s.clone(), s.clone()], s.clone(), Op::StrConcat);
    c.method(string_type, "Compare", &[s.clone(), s.clone()], i.clone(), Op::StrCompare);
    c.method(
        string_type,
        "Compare",
        &[s.clone(), s.clone(), Type::BOOLEAN],
        i.clone(),
        Op::StrCompareIgnoreCase,
    );

    for (name, op) in [
        ("Year", Op::DateYear),
        ("Month", Op::DateMonth),
        ("Day", Op::DateDay),
        ("Hour", Op::DateHour),
        ("Minute", Op::DateMinute),
        ("Second", Op::DateSecond),
        ("DayOfYear", Op::DateDayOfYear),
        ("DayOfWeek", Op::DateDayOfWeek),
    ] {
        c.property(date, name, i.clone(), op);
    }
    c.property(date, "Date", Type::DATE_TIME, Op::DateDate);
    c.property(date, "TimeOfDay", Type::TIME_SPAN, Op::DateTimeOfDay);
    for (name, op) in [
        ("AddDays", Op::DateAddDays),
        ("AddHours", Op::DateAddHours),
        ("AddMinutes", Op::DateAddMinutes),
        ("AddSeconds", Op::DateAddSeconds),
    ] {
        c.method(date, name, &[d.clone()], Type::DATE_TIME, op);
    }
    c.method(date, "AddMonths", &[i.clone()], Type::DATE_TIME, Op::DateAddMonths);
    c.method(date, "AddYears", &[i.clone()], Type::DATE_TIME, Op::DateAddYears);
    c.method(date, "Subtract", &[Type::DATE_TIME], Type::TIME_SPAN, Op::DateSubtract);
    c.method(date, "ToString", &[s.clone()], s.clone(), Op::DateFormat);
    c.property(date_type, "Now", Type::DATE_TIME, Op::DateNow);
    c.property(date_type, "UtcNow", Type::DATE_TIME, Op::DateUtcNow);
    c.property(date_type, "Today", Type::DATE_TIME, Op::DateToday);
    c.property(date_type, "MinValue", Type::DATE_TIME, Op::DateMin);
    c.property(date_type, "MaxValue", Type::DATE_TIME, Op::DateMax);
    c.method(date_type, "Parse", &[s.clone()], Type::DATE_TIME, Op::DateParse);
    c.push(
        date_type,
        MemberKind::Constructor,
        "DateTime",
        &[i.clone(), i.clone(), i.clone()],
        Type::DATE_TIME,
        Op::DateNew,
    );
    c.push(
        date_type,
        MemberKind::Constructor,
        "DateTime",
        &[i.clone(), i.clone(), i.clone(), i.clone(), i.clone(), i.clone()],
        Type::DATE_TIME,
        Op::DateTimeNew,
    );

    for (name, op) in [
        ("Days", Op::SpanDays),
        ("Hours", Op::SpanHours),
        ("Minutes", Op::SpanMinutes),
        ("Seconds", Op::SpanSeconds),
        ("Milliseconds", Op::SpanMilliseconds),
    ] {
        c.property(span, name, i.clone(), op);
    }
    for (name, op) in [
        ("TotalDays", Op::SpanTotalDays),
        ("TotalHours", Op::SpanTotalHours),
        ("TotalMinutes", Op::SpanTotalMinutes),
        ("TotalSeconds", Op::SpanTotalSeconds),
        ("TotalMilliseconds", Op::SpanTotalMilliseconds),
    ] {
        c.property(span, name, d.clone(), op);
    }
    c.method(span, "Add", &[Type::TIME_SPAN], Type::TIME_SPAN, Op::SpanAdd);
    c.method(span, "Negate", &[], Type::TIME_SPAN, Op::SpanNegate);
    c.property(span_type, "Zero", Type::TIME_SPAN, Op::SpanZero);
    for (name, op) in [
        ("FromDays", Op::SpanFromDays),
        ("FromHours", Op::SpanFromHours),
        ("FromMinutes", Op::SpanFromMinutes),
        ("FromSeconds", Op::SpanFromSeconds),
    ] {
        c.method(span_type, name, &[d.clone()], Type::TIME_SPAN, op);
    }
    c.push(
        span_type,
        MemberKind::Constructor,
        "TimeSpan",
        &[i.clone(), i.clone(), i.clone()],
        Type::TIME_SPAN,
        Op::SpanNew,
    );
    c.push(
        span_type,
        MemberKind::Constructor,
        "TimeSpan",
        &[i.clone(), i.clone(), i.clone(), i.clone()],
        Type::TIME_SPAN,
        Op::SpanNewDays,
    );

    c.property(guid_type, "Empty", Type::GUID, Op::GuidEmpty);
    c.method(guid_type, "NewGuid", &[], Type::GUID, Op::GuidNew);
    c.method(guid_type, "Parse", &[s.clone()], Type::GUID, Op::GuidParse);
    c.push(guid_type, MemberKind::Constructor, "Guid", &[s.clone()], Type::GUID, Op::GuidParse);

    let int32_type = Static(TypeName::Primitive(Primitive::Int32));
    let int64_type = Static(TypeName::Primitive(Primitive::Int64));
    let double_type = Static(TypeName::Primitive(Primitive::Double));
    c.property(int32_type, "MaxValue", i.clone(), Op::Int32Max);
    c.property(int32_type, "MinValue", i.clone(), Op::Int32Min);
    c.property(int64_type, "MaxValue", Type::INT64, Op::Int64Max);
    c.property(int64_type, "MinValue", Type::INT64, Op::Int64Min);
    c.property(double_type, "MaxValue", d.clone(), Op::DoubleMax);
    c.property(double_type, "MinValue", d.clone(), Op::DoubleMin);
    for p in [Primitive::Int32, Primitive::Int64, Primitive::Double, Primitive::Boolean] {
        let owner = Static(TypeName::Primitive(p));
        c.method(owner, "Parse", &[s.clone()], Type::Primitive(p), Op::Parse(p));
    }

    c.property(math, "PI", d.clone(), Op::MathPi);
    c.property(math, "E", d.clone(), Op::MathE);
    for ty in [Type::INT32, Type::INT64, Type::SINGLE, Type::DOUBLE] {
        c.method(math, "Abs", &[ty.clone()], ty.clone(), Op::MathAbs);
        c.method(math, "Max", &[ty.clone(), ty.clone()], ty.clone(), Op::MathMax);
        c.method(math, "Min", &[ty.clone(), ty.clone()], ty.clone(), Op::MathMin);
    }
    c.method(math, "Round", &[d.clone()], d.clone(), Op::MathRound);
    c.method(math, "Round", &[d.clone(), i.clone()], d.clone(), Op::MathRoundDigits);
    c.method(math, "Floor", &[d.clone()], d.clone(), Op::MathFloor);
    c.method(math, "Ceiling", &[d.clone()], d.clone(), Op::MathCeiling);
    c.method(math, "Truncate", &[d.clone()], d.clone(), Op::MathTruncate);
    c.method(math, "Sqrt", &[d.clone()], d.clone(), Op::MathSqrt);
    c.method(math, "Pow", &[d.clone(), d.clone()], d, Op::MathPow);

    for (name, p) in [
        ("ToInt32", Primitive::Int32),
        ("ToInt64", Primitive::Int64),
        ("ToDouble", Primitive::Double),
        ("ToBoolean", Primitive::Boolean),
        ("ToDateTime", Primitive::DateTime),
        ("ToString", Primitive::String),
    ] {
        c.method(convert, name, &[Type::OBJECT], Type::Primitive(p), Op::ConvertTo(p));
    }

    c.0
}

static CATALOGUE: LazyLock<Vec<Builtin>> = LazyLock::new(build_catalogue);

/// Every catalogue entry of `receiver` (and of any instance, for instance
/// receivers) named `name` with `arity` parameters.
pub fn lookup(
    receiver: Receiver,
    kind: MemberKind,
    name: &str,
    arity: usize,
) -> impl Iterator<Item = &'static Builtin> {
    let catalogue: &'static [Builtin] = &CATALOGUE;
    let name = name.to_owned();
    catalogue.iter().filter(move |b| {
        (b.receiver == receiver
            || (matches!(receiver, Receiver::Instance(_)) && b.receiver == Receiver::AnyInstance))
            && b.kind == kind
            && b.params.len() == arity
            && b.name.eq_ignore_ascii_case(&name)
    })
}

/// Whether any entry of `receiver` has the given name, regardless of arity.
#[must_use]
pub fn has_member(receiver: Receiver, kind: MemberKind, name: &str) -> bool {
    CATALOGUE.iter().any(|b| {
        (b.receiver == receiver
            || (matches!(receiver, Receiver::Instance(_)) && b.receiver == Receiver::AnyInstance))
            && b.kind == kind
            && b.name.eq_ignore_ascii_case(name)
    })
}

macro_rules! arg {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return Ok(Value::Absent),
        }
    };
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

fn int(value: Option<&Value>) -> Option<i64> {
    value
        .and_then(Value::as_i128)
        .and_then(|v| i64::try_from(v).ok())
}

fn real(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn date(value: Option<&Value>) -> Option<NaiveDateTime> {
    match value {
        Some(Value::DateTime(dt)) => Some(*dt),
        _ => None,
    }
}

fn span(value: Option<&Value>) -> Option<TimeDelta> {
    match value {
        Some(Value::TimeSpan(ts)) => Some(*ts),
        _ => None,
    }
}

fn count(n: usize) -> Value {
    i32::try_from(n).map_or(Value::Int64(i64::try_from(n).unwrap_or(i64::MAX)), Value::Int32)
}

#[allow(clippy::cast_possible_truncation)]
fn int32(n: i64) -> Value {
    Value::Int32(n as i32)
}

fn invalid(function: &'static str, message: impl Into<String>) -> EvaluationError {
    EvaluationError::InvalidArgument {
        function,
        message: message.into(),
    }
}

// ------ temporal helpers ------

const DAY_MS: f64 = 86_400_000.0;
const HOUR_MS: f64 = 3_600_000.0;
const MINUTE_MS: f64 = 60_000.0;
const SECOND_MS: f64 = 1_000.0;

/// `amount` units of `unit_ms` milliseconds, rejecting anything outside the
/// range of a `TimeDelta`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn span_millis(amount: f64, unit_ms: f64) -> Result<TimeDelta, EvaluationError> {
    let ms = (amount * unit_ms).round();
    let overflow = || EvaluationError::Overflow {
        value: amount.to_string(),
        type_name: "TimeSpan".to_owned(),
    };
    if !ms.is_finite() || ms < i64::MIN as f64 || ms >= i64::MAX as f64 {
        return Err(overflow());
    }
    TimeDelta::try_milliseconds(ms as i64).ok_or_else(overflow)
}

fn add_fraction(dt: NaiveDateTime, amount: f64, unit_ms: f64) -> Result<Value, EvaluationError> {
    let delta = span_millis(amount, unit_ms)?;
    dt.checked_add_signed(delta)
        .map(Value::DateTime)
        .ok_or_else(|| EvaluationError::Overflow {
            value: dt.to_string(),
            type_name: "DateTime".to_owned(),
        })
}

fn add_months(dt: NaiveDateTime, months: i64) -> Result<Value, EvaluationError> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok().map(Months::new);
    let shifted = magnitude.and_then(|m| {
        if months >= 0 {
            dt.checked_add_months(m)
        } else {
            dt.checked_sub_months(m)
        }
    });
    shifted.map(Value::DateTime).ok_or_else(|| EvaluationError::Overflow {
        value: dt.to_string(),
        type_name: "DateTime".to_owned(),
    })
}

fn span_from(amount: f64, unit_ms: f64) -> Result<Value, EvaluationError> {
    span_millis(amount, unit_ms).map(Value::TimeSpan)
}

fn make_span(days: i64, hours: i64, minutes: i64, seconds: i64) -> Result<Value, EvaluationError> {
    TimeDelta::try_days(days)
        .zip(TimeDelta::try_hours(hours))
        .and_then(|(d, h)| d.checked_add(&h))
        .zip(TimeDelta::try_minutes(minutes))
        .and_then(|(t, m)| t.checked_add(&m))
        .zip(TimeDelta::try_seconds(seconds))
        .and_then(|(t, s)| t.checked_add(&s))
        .map(Value::TimeSpan)
        .ok_or_else(|| EvaluationError::Overflow {
            value: format!("{days}.{hours}:{minutes}:{seconds}"),
            type_name: "TimeSpan".to_owned(),
        })
}

#[allow(clippy::cast_precision_loss)]
fn span_total(ts: TimeDelta, unit_ms: f64) -> Value {
    Value::Double(ts.num_milliseconds() as f64 / unit_ms)
}

fn make_date(parts: &[i64]) -> Result<Value, EvaluationError> {
    let field = |i: usize| parts.get(i).copied().and_then(|v| u32::try_from(v).ok()).unwrap_or(0);
    let year = parts.first().and_then(|y| i32::try_from(*y).ok()).unwrap_or(0);
    NaiveDate::from_ymd_opt(year, field(1), field(2))
        .and_then(|d| d.and_hms_opt(field(3), field(4), field(5)))
        .map(Value::DateTime)
        .ok_or_else(|| invalid("DateTime", "year, month and day describe an unrepresentable date"))
}

fn round_digits(v: f64, digits: i64) -> f64 {
    let digits = i32::try_from(digits.clamp(0, 15)).unwrap_or(0);
    let scale = 10f64.powi(digits);
    (v * scale).round_ties_even() / scale
}

/// Numeric `Math.Abs/Max/Min` over the value's own type.
fn numeric(op: Op, args: &[Value]) -> Option<Value> {
    let first = args.first()?;
    let pick = |a: &Value, b: &Value, want: std::cmp::Ordering| {
        let ord = a.compare(b)?;
        Some(if ord == want || ord.is_eq() { a.clone() } else { b.clone() })
    };
    match op {
        Op::MathAbs => match first {
            Value::Int32(v) => Some(Value::Int32(v.wrapping_abs())),
            Value::Int64(v) => v.checked_abs().map(Value::Int64),
            Value::Single(v) => Some(Value::Single(v.abs())),
            other => other.as_f64().map(|v| Value::Double(v.abs())),
        },
        Op::MathMax => pick(first, args.get(1)?, std::cmp::Ordering::Greater),
        Op::MathMin => pick(first, args.get(1)?, std::cmp::Ordering::Less),
        _ => None,
    }
}

impl Builtin {
    /// Apply the member to an evaluated receiver and arguments. Arguments of
    /// an unexpected runtime type, and null receivers, yield
    /// [`Value::Absent`].
    #[allow(clippy::too_many_lines)]
    pub fn invoke(&self, target: Option<&Value>, args: &[Value]) -> Result<Value, EvaluationError> {
        if target.is_some_and(Value::is_null_or_absent) {
            return Ok(Value::Absent);
        }
        let a0 = args.first();
        let a1 = args.get(1);
        let value = match self.op {
            Op::ToString => Value::String(arg!(target).to_string()),
            Op::StrLength => count(arg!(text(target)).chars().count()),
            Op::StrContains => Value::Bool(arg!(text(target)).contains(arg!(text(a0)))),
            Op::StrStartsWith => Value::Bool(arg!(text(target)).starts_with(arg!(text(a0)))),
            Op::StrEndsWith => Value::Bool(arg!(text(target)).ends_with(arg!(text(a0)))),
            Op::StrIndexOf => {
                let haystack = arg!(text(target));
                match haystack.find(arg!(text(a0))) {
                    Some(byte) => count(haystack[..byte].chars().count()),
                    None => Value::Int32(-1),
                }
            }
            Op::StrIndexOfChar => {
                let Some(Value::Char(needle)) = a0 else {
                    return Ok(Value::Absent);
                };
                arg!(text(target))
                    .chars()
                    .position(|c| c == *needle)
                    .map_or(Value::Int32(-1), count)
            }
            Op::StrToUpper => Value::String(arg!(text(target)).to_uppercase()),
            Op::StrToLower => Value::String(arg!(text(target)).to_lowercase()),
            Op::StrTrim => Value::String(arg!(text(target)).trim().to_owned()),
            Op::StrSubstring | Op::StrSubstringLen => {
                let chars: Vec<char> = arg!(text(target)).chars().collect();
                let start = arg!(int(a0));
                let len = if self.op == Op::StrSubstringLen {
                    arg!(int(a1))
                } else {
                    i64::try_from(chars.len()).unwrap_or(i64::MAX) - start
                };
                let range = usize::try_from(start)
                    .ok()
                    .zip(usize::try_from(len).ok())
                    .filter(|(s, l)| s + l <= chars.len());
                let (start, len) = range.ok_or_else(|| {
                    let message = format!("start {start} and length {len} exceed the string");
                    invalid("Substring", message)
                })?;
                Value::String(chars[start..start + len].iter().collect())
            }
            Op::StrReplace => {
                let from = arg!(text(a0));
                if from.is_empty() {
                    return Err(invalid("Replace", "old value cannot be empty"));
                }
                Value::String(arg!(text(target)).replace(from, arg!(text(a1))))
            }
            Op::StrSplit => Value::list(
                arg!(text(target))
                    .split(arg!(text(a0)))
                    .map(Value::from),
            ),
            Op::StrCompareTo | Op::StrCompare => {
                let (a, b) = if self.op == Op::StrCompareTo {
                    (arg!(text(target)), arg!(text(a0)))
                } else {
                    (arg!(text(a0)), arg!(text(a1)))
                };
                Value::Int32(a.cmp(b) as i32)
            }
            Op::StrCompareIgnoreCase => {
                let (a, b) = (arg!(text(a0)), arg!(text(a1)));
                let ord = if args.get(2).and_then(Value::as_bool) == Some(true) {
                    a.to_lowercase().cmp(&b.to_lowercase())
                } else {
                    a.cmp(b)
                };
                Value::Int32(ord as i32)
            }
            Op::StrEmpty => Value::String(String::new()),
            Op::StrIsNullOrEmpty => Value::Bool(text(a0).is_none_or(str::is_empty)),
            Op::StrConcat => Value::String(format!(
                "{}{}",
                a0.cloned().unwrap_or(Value::Null),
                a1.cloned().unwrap_or(Value::Null)
            )),
            Op::DateYear => Value::Int32(arg!(date(target)).year()),
            Op::DateMonth => count(arg!(date(target)).month() as usize),
            Op::DateDay => count(arg!(date(target)).day() as usize),
            Op::DateHour => count(arg!(date(target)).hour() as usize),
            Op::DateMinute => count(arg!(date(target)).minute() as usize),
            Op::DateSecond => count(arg!(date(target)).second() as usize),
            Op::DateDayOfYear => count(arg!(date(target)).ordinal() as usize),
            Op::DateDayOfWeek => {
                count(arg!(date(target)).weekday().num_days_from_sunday() as usize)
            }
            Op::DateDate => {
                let dt = arg!(date(target));
                Value::DateTime(dt.date().and_time(chrono::NaiveTime::MIN))
            }
            Op::DateTimeOfDay => {
                let dt = arg!(date(target));
                Value::TimeSpan(dt.time() - chrono::NaiveTime::MIN)
            }
            Op::DateAddDays => return add_fraction(arg!(date(target)), arg!(real(a0)), DAY_MS),
            Op::DateAddHours => return add_fraction(arg!(date(target)), arg!(real(a0)), HOUR_MS),
            Op::DateAddMinutes => {
                return add_fraction(arg!(date(target)), arg!(real(a0)), MINUTE_MS);
            }
            Op::DateAddSeconds => {
                return add_fraction(arg!(date(target)), arg!(real(a0)), SECOND_MS);
            }
            Op::DateAddMonths => return add_months(arg!(date(target)), arg!(int(a0))),
            Op::DateAddYears => {
                return add_months(arg!(date(target)), arg!(int(a0)).saturating_mul(12));
            }
            Op::DateSubtract => Value::TimeSpan(arg!(date(target)) - arg!(date(a0))),
            Op::DateFormat => {
                let dt = arg!(date(target));
                let mut out = String::new();
                write!(out, "{}", dt.format(arg!(text(a0))))
                    .map_err(|_| invalid("ToString", "invalid date format string"))?;
                Value::String(out)
            }
            Op::DateNow => Value::DateTime(Local::now().naive_local()),
            Op::DateUtcNow => Value::DateTime(Utc::now().naive_utc()),
            Op::DateToday => Value::DateTime(
                Local::now()
                    .date_naive()
                    .and_time(chrono::NaiveTime::MIN),
            ),
            Op::DateMin => Type::DATE_TIME.default_value(),
            Op::DateMax => Value::DateTime(
                NaiveDate::from_ymd_opt(9999, 12, 31)
                    .and_then(|d| d.and_hms_opt(23, 59, 59))
                    .unwrap_or(NaiveDateTime::MAX),
            ),
            Op::DateParse => {
                let s = arg!(text(a0));
                Value::DateTime(
                    parse_date_time(s)
                        .ok_or_else(|| invalid("DateTime.Parse", format!("'{s}' is not a date")))?,
                )
            }
            Op::DateNew | Op::DateTimeNew => {
                let parts: Option<Vec<i64>> = args.iter().map(|v| int(Some(v))).collect();
                return make_date(&arg!(parts));
            }
            Op::SpanDays => int32(arg!(span(target)).num_days()),
            Op::SpanHours => int32(arg!(span(target)).num_hours() % 24),
            Op::SpanMinutes => int32(arg!(span(target)).num_minutes() % 60),
            Op::SpanSeconds => int32(arg!(span(target)).num_seconds() % 60),
            Op::SpanMilliseconds => int32(arg!(span(target)).num_milliseconds() % 1000),
            Op::SpanTotalDays => span_total(arg!(span(target)), DAY_MS),
            Op::SpanTotalHours => span_total(arg!(span(target)), HOUR_MS),
            Op::SpanTotalMinutes => span_total(arg!(span(target)), MINUTE_MS),
            Op::SpanTotalSeconds => span_total(arg!(span(target)), SECOND_MS),
            Op::SpanTotalMilliseconds => span_total(arg!(span(target)), 1.0),
            Op::SpanAdd => {
                let (a, b) = (arg!(span(target)), arg!(span(a0)));
                Value::TimeSpan(a.checked_add(&b).ok_or_else(|| EvaluationError::Overflow {
                    value: format!("{} + {}", Value::TimeSpan(a), Value::TimeSpan(b)),
                    type_name: "TimeSpan".to_owned(),
                })?)
            }
            Op::SpanNegate => Value::TimeSpan(-arg!(span(target))),
            Op::SpanZero => Value::TimeSpan(TimeDelta::zero()),
            Op::SpanFromDays => return span_from(arg!(real(a0)), DAY_MS),
            Op::SpanFromHours => return span_from(arg!(real(a0)), HOUR_MS),
            Op::SpanFromMinutes => return span_from(arg!(real(a0)), MINUTE_MS),
            Op::SpanFromSeconds => return span_from(arg!(real(a0)), SECOND_MS),
            Op::SpanNew | Op::SpanNewDays => {
                let parts: Option<Vec<i64>> = args.iter().map(|v| int(Some(v))).collect();
                let mut parts = arg!(parts);
                if self.op == Op::SpanNew {
                    parts.insert(0, 0);
                }
                let [days, hours, minutes, seconds] = parts[..] else {
                    return Ok(Value::Absent);
                };
                return make_span(days, hours, minutes, seconds);
            }
            Op::GuidEmpty => Value::Guid(Uuid::nil()),
            Op::GuidNew => Value::Guid(Uuid::new_v4()),
            Op::GuidParse => {
                let s = arg!(text(a0));
                Value::Guid(
                    Uuid::parse_str(s.trim())
                        .map_err(|e| invalid("Guid", e.to_string()))?,
                )
            }
            Op::Int32Max => Value::Int32(i32::MAX),
            Op::Int32Min => Value::Int32(i32::MIN),
            Op::Int64Max => Value::Int64(i64::MAX),
            Op::Int64Min => Value::Int64(i64::MIN),
            Op::DoubleMax => Value::Double(f64::MAX),
            Op::DoubleMin => Value::Double(f64::MIN),
            Op::Parse(p) => {
                let s = arg!(text(a0));
                Value::String(s.to_owned())
                    .coerce_to(&Type::Primitive(p))
                    .ok_or_else(|| invalid("Parse", format!("'{s}' is not a valid {}", p.name())))?
            }
            Op::MathPi => Value::Double(std::f64::consts::PI),
            Op::MathE => Value::Double(std::f64::consts::E),
            Op::MathAbs | Op::MathMax | Op::MathMin => arg!(numeric(self.op, args)),
            Op::MathRound => Value::Double(arg!(real(a0)).round_ties_even()),
            Op::MathRoundDigits => Value::Double(round_digits(arg!(real(a0)), arg!(int(a1)))),
            Op::MathFloor => Value::Double(arg!(real(a0)).floor()),
            Op::MathCeiling => Value::Double(arg!(real(a0)).ceil()),
            Op::MathTruncate => Value::Double(arg!(real(a0)).trunc()),
            Op::MathSqrt => Value::Double(arg!(real(a0)).sqrt()),
            Op::MathPow => Value::Double(arg!(real(a0)).powf(arg!(real(a1)))),
            Op::ConvertTo(p) => {
                let target_type = Type::Primitive(p);
                match a0 {
                    None | Some(Value::Null | Value::Absent) => target_type.default_value(),
                    Some(v) => v.coerce_to(&target_type).ok_or_else(|| {
                        invalid("Convert", format!("'{v}' cannot be converted to {target_type}"))
                    })?,
                }
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(receiver: Receiver, kind: MemberKind, name: &str, arity: usize) -> &'static Builtin {
        lookup(receiver, kind, name, arity).next().unwrap()
    }

    #[test]
    fn test_should_find_string_members_ignoring_case() {
        let string = Receiver::Instance(Primitive::String);
        let contains = find(string, MemberKind::Method, "contains", 1);
        assert_eq!(contains.result, Type::BOOLEAN);
        assert!(has_member(string, MemberKind::Property, "Length"));
        assert!(has_member(string, MemberKind::Method, "ToString"));
        assert!(!has_member(string, MemberKind::Method, "Explode"));
    }

    #[test]
    fn test_should_invoke_string_methods() {
        let string = Receiver::Instance(Primitive::String);
        let target = Value::from("Hello World");
        let upper = find(string, MemberKind::Method, "ToUpper", 0);
        assert_eq!(upper.invoke(Some(&target), &[]).unwrap(), Value::from("HELLO WORLD"));
        let index = find(string, MemberKind::Method, "IndexOf", 1);
        assert_eq!(
            index.invoke(Some(&target), &[Value::from("World")]).unwrap(),
            Value::Int32(6)
        );
        let substring = lookup(string, MemberKind::Method, "Substring", 2).next().unwrap();
        assert_eq!(
            substring
                .invoke(Some(&target), &[Value::Int32(0), Value::Int32(5)])
                .unwrap(),
            Value::from("Hello")
        );
        assert!(substring
            .invoke(Some(&target), &[Value::Int32(8), Value::Int32(5)])
            .is_err());
    }

    #[test]
    fn test_should_yield_absent_for_null_receiver() {
        let string = Receiver::Instance(Primitive::String);
        let length = find(string, MemberKind::Property, "Length", 0);
        assert_eq!(length.invoke(Some(&Value::Null), &[]).unwrap(), Value::Absent);
    }

    #[test]
    fn test_should_construct_dates_and_spans() {
        let ctor = find(
            Receiver::Static(TypeName::Primitive(Primitive::DateTime)),
            MemberKind::Constructor,
            "DateTime",
            3,
        );
        let date = ctor
            .invoke(None, &[Value::Int32(2024), Value::Int32(2), Value::Int32(29)])
            .unwrap();
        assert_eq!(date.to_string(), "2024-02-29 00:00:00");
        assert!(ctor
            .invoke(None, &[Value::Int32(2023), Value::Int32(2), Value::Int32(29)])
            .is_err());

        let span = find(
            Receiver::Static(TypeName::Primitive(Primitive::TimeSpan)),
            MemberKind::Constructor,
            "TimeSpan",
            3,
        );
        assert_eq!(
            span.invoke(None, &[Value::Int32(1), Value::Int32(30), Value::Int32(0)])
                .unwrap(),
            Value::TimeSpan(TimeDelta::minutes(90))
        );
    }

    #[test]
    fn test_should_add_months_backwards() {
        let date = Value::DateTime(parse_date_time("2024-03-31").unwrap());
        let add = find(Receiver::Instance(Primitive::DateTime), MemberKind::Method, "AddMonths", 1);
        let shifted = add.invoke(Some(&date), &[Value::Int32(-1)]).unwrap();
        assert_eq!(shifted.to_string(), "2024-02-29 00:00:00");
    }

    #[test]
    fn test_should_report_overflow_for_out_of_range_spans() {
        let date = Value::DateTime(parse_date_time("2024-01-01").unwrap());
        let date_type = Receiver::Instance(Primitive::DateTime);
        let add_days = find(date_type, MemberKind::Method, "AddDays", 1);
        for amount in [-1e300, 1e300, f64::NAN, f64::INFINITY] {
            let err = add_days.invoke(Some(&date), &[Value::Double(amount)]).unwrap_err();
            assert!(matches!(err, EvaluationError::Overflow { .. }));
        }
        assert_eq!(
            add_days.invoke(Some(&date), &[Value::Double(1.5)]).unwrap().to_string(),
            "2024-01-02 12:00:00"
        );

        let span_type = Receiver::Static(TypeName::Primitive(Primitive::TimeSpan));
        let from_days = find(span_type, MemberKind::Method, "FromDays", 1);
        assert!(matches!(
            from_days.invoke(None, &[Value::Double(-1e300)]),
            Err(EvaluationError::Overflow { .. })
        ));

        let huge = Value::TimeSpan(TimeDelta::MAX);
        let add = find(Receiver::Instance(Primitive::TimeSpan), MemberKind::Method, "Add", 1);
        assert!(matches!(
            add.invoke(Some(&huge), std::slice::from_ref(&huge)),
            Err(EvaluationError::Overflow { .. })
        ));

        let ctor = find(span_type, MemberKind::Constructor, "TimeSpan", 4);
        let args = [Value::Int64(i64::MAX), Value::Int32(0), Value::Int32(0), Value::Int32(0)];
        assert!(matches!(ctor.invoke(None, &args), Err(EvaluationError::Overflow { .. })));
    }

    #[test]
    fn test_should_round_half_to_even() {
        let round = find(Receiver::Static(TypeName::Math), MemberKind::Method, "Round", 1);
        assert_eq!(round.invoke(None, &[Value::Double(2.5)]).unwrap(), Value::Double(2.0));
        assert_eq!(round.invoke(None, &[Value::Double(3.5)]).unwrap(), Value::Double(4.0));
    }

    #[test]
    fn test_should_reject_malformed_guid() {
        let parse = find(
            Receiver::Static(TypeName::Primitive(Primitive::Guid)),
            MemberKind::Constructor,
            "Guid",
            1,
        );
        let err = parse.invoke(None, &[Value::from("not-a-guid")]).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidArgument { function: "Guid", .. }));
    }

    #[test]
    fn test_should_convert_with_defaults_for_null() {
        let to_int = find(Receiver::Static(TypeName::Convert), MemberKind::Method, "ToInt32", 1);
        assert_eq!(to_int.invoke(None, &[Value::Null]).unwrap(), Value::Int32(0));
        assert_eq!(to_int.invoke(None, &[Value::from("12")]).unwrap(), Value::Int32(12));
        assert!(to_int.invoke(None, &[Value::from("twelve")]).is_err());
    }
}
