//! Static types seen by the resolver, and the numeric promotion lattice.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::value::{EnumValue, Value};

/// Built-in scalar types. `Object` and `String` are reference types, the
/// rest are value types with a nullable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Any value.
    Object,
    /// `true` / `false`.
    Boolean,
    /// A single character.
    Char,
    /// Text.
    String,
    /// 8-bit signed integer.
    SByte,
    /// 8-bit unsigned integer.
    Byte,
    /// 16-bit signed integer.
    Int16,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit unsigned integer.
    UInt64,
    /// 32-bit float.
    Single,
    /// 64-bit float.
    Double,
    /// Calendar date and time of day.
    DateTime,
    /// Signed duration.
    TimeSpan,
    /// 128-bit identifier.
    Guid,
}

impl Primitive {
    /// Every primitive, in keyword-table order.
    pub const ALL: [Self; 17] = [
        Self::Object,
        Self::Boolean,
        Self::Char,
        Self::String,
        Self::SByte,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Single,
        Self::Double,
        Self::DateTime,
        Self::TimeSpan,
        Self::Guid,
    ];

    /// Type name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Boolean => "Boolean",
            Self::Char => "Char",
            Self::String => "String",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::DateTime => "DateTime",
            Self::TimeSpan => "TimeSpan",
            Self::Guid => "Guid",
        }
    }

    /// Case-insensitive lookup by type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Whether values of this type are copied rather than referenced.
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(self, Self::Object | Self::String)
    }

    /// 1 = char/float, 2 = signed integral, 3 = unsigned integral, 0 = other.
    fn numeric_kind(self) -> u8 {
        match self {
            Self::Char | Self::Single | Self::Double => 1,
            Self::SByte | Self::Int16 | Self::Int32 | Self::Int64 => 2,
            Self::Byte | Self::UInt16 | Self::UInt32 | Self::UInt64 => 3,
            _ => 0,
        }
    }

    /// Implicit widening targets, including the identity.
    fn widens_to(self, target: Self) -> bool {
        use Primitive::{Byte, Double, Int16, Int32, Int64, SByte, Single, UInt16, UInt32, UInt64};

        match self {
            SByte => matches!(target, SByte | Int16 | Int32 | Int64 | Single | Double),
            Byte => matches!(
                target,
                Byte | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double
            ),
            Int16 => matches!(target, Int16 | Int32 | Int64 | Single | Double),
            UInt16 => matches!(
                target,
                UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double
            ),
            Int32 => matches!(target, Int32 | Int64 | Single | Double),
            UInt32 => matches!(target, UInt32 | Int64 | UInt64 | Single | Double),
            Int64 => matches!(target, Int64 | Single | Double),
            UInt64 => matches!(target, UInt64 | Single | Double),
            Single => matches!(target, Single | Double),
            _ => self == target,
        }
    }
}

/// A named set of integer constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
}

impl EnumType {
    /// Declare an enum from `(member, value)` pairs.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// The enum's type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the member called `name`, ignoring case.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Name of the first member with the given value.
    #[must_use]
    pub fn member_name(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

/// Shape of a record element: its statically declared fields, and whether
/// it also answers arbitrary names through
/// [`Record::try_get_named_value`](crate::Record::try_get_named_value).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: String,
    fields: Vec<(String, Type)>,
    dynamic_members: bool,
}

impl RecordType {
    /// A record with only the fields added through [`with_field`](Self::with_field).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            dynamic_members: false,
        }
    }

    /// A record whose undeclared names are looked up per element.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            dynamic_members: true,
            ..Self::new(name)
        }
    }

    /// Declare a statically typed field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// The record's type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether undeclared names fall back to per-element lookup.
    #[must_use]
    pub fn has_dynamic_members(&self) -> bool {
        self.dynamic_members
    }

    /// Find a declared field, exact match first.
    #[must_use]
    pub fn field(&self, name: &str, ignore_case: bool) -> Option<(&str, &Type)> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| {
                ignore_case
                    .then(|| self.fields.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
                    .flatten()
            })
            .map(|(n, t)| (n.as_str(), t))
    }
}

/// Static type of an expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A built-in scalar.
    Primitive(Primitive),
    /// Nullable form of a value type.
    Nullable(Box<Type>),
    /// A user enum.
    Enum(Arc<EnumType>),
    /// A record element.
    Record(Arc<RecordType>),
    /// An iterable list of elements.
    Sequence(Box<Type>),
    /// A string-keyed dictionary; its entries are looked up dynamically.
    Map,
    /// A compiled lambda.
    Function {
        /// Parameter types.
        params: Vec<Type>,
        /// Result type.
        result: Box<Type>,
    },
    /// Opaque per-element result, known only after evaluation.
    Dynamic,
}

impl Type {
    /// `Object`.
    pub const OBJECT: Self = Self::Primitive(Primitive::Object);
    /// `Boolean`.
    pub const BOOLEAN: Self = Self::Primitive(Primitive::Boolean);
    /// `Char`.
    pub const CHAR: Self = Self::Primitive(Primitive::Char);
    /// `String`.
    pub const STRING: Self = Self::Primitive(Primitive::String);
    /// `Byte`.
    pub const BYTE: Self = Self::Primitive(Primitive::Byte);
    /// `Int16`.
    pub const INT16: Self = Self::Primitive(Primitive::Int16);
    /// `Int32`.
    pub const INT32: Self = Self::Primitive(Primitive::Int32);
    /// `UInt32`.
    pub const UINT32: Self = Self::Primitive(Primitive::UInt32);
    /// `Int64`.
    pub const INT64: Self = Self::Primitive(Primitive::Int64);
    /// `UInt64`.
    pub const UINT64: Self = Self::Primitive(Primitive::UInt64);
    /// `Single`.
    pub const SINGLE: Self = Self::Primitive(Primitive::Single);
    /// `Double`.
    pub const DOUBLE: Self = Self::Primitive(Primitive::Double);
    /// `DateTime`.
    pub const DATE_TIME: Self = Self::Primitive(Primitive::DateTime);
    /// `TimeSpan`.
    pub const TIME_SPAN: Self = Self::Primitive(Primitive::TimeSpan);
    /// `Guid`.
    pub const GUID: Self = Self::Primitive(Primitive::Guid);

    /// Element type of records that answer every name dynamically.
    pub fn dynamic_record(name: impl Into<String>) -> Self {
        Self::Record(Arc::new(RecordType::dynamic(name)))
    }

    /// A sequence of `element`.
    #[must_use]
    pub fn sequence(element: Type) -> Self {
        Self::Sequence(Box::new(element))
    }

    /// Nullable form of a value type; reference and already-nullable types
    /// are returned unchanged.
    #[must_use]
    pub fn nullable(inner: Type) -> Self {
        if inner.is_value_type() && !inner.is_nullable() {
            Self::Nullable(Box::new(inner))
        } else {
            inner
        }
    }

    /// Whether this is `T?`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable(_))
    }

    /// `T` for `T?`, otherwise `self`.
    #[must_use]
    pub fn non_nullable(&self) -> &Type {
        match self {
            Self::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Whether values are copied (primitives except object/string, enums,
    /// nullables).
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            Self::Primitive(p) => p.is_value_type(),
            Self::Nullable(_) | Self::Enum(_) => true,
            _ => false,
        }
    }

    /// The primitive under an optional nullable wrapper.
    #[must_use]
    pub fn primitive(&self) -> Option<Primitive> {
        match self.non_nullable() {
            Self::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Whether this is `Dynamic`.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic)
    }

    /// Whether the non-nullable type is an enum.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.non_nullable(), Self::Enum(_))
    }

    fn numeric_kind(&self) -> u8 {
        self.primitive().map_or(0, Primitive::numeric_kind)
    }

    /// Char, floating or integral (nullable included).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.numeric_kind() != 0
    }

    /// Signed integral (nullable included).
    #[must_use]
    pub fn is_signed_integral(&self) -> bool {
        self.numeric_kind() == 2
    }

    /// Unsigned integral (nullable included).
    #[must_use]
    pub fn is_unsigned_integral(&self) -> bool {
        self.numeric_kind() == 3
    }

    /// Element type of a sequence.
    #[must_use]
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Self::Sequence(element) => Some(element),
            _ => None,
        }
    }

    /// Whether a value of type `source` can be stored in a location of this
    /// reference type without conversion.
    #[must_use]
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        if self == source || *self == Self::OBJECT {
            return true;
        }
        match (self, source) {
            (Self::Sequence(target), Self::Sequence(source)) => {
                !target.is_value_type() && target.is_assignable_from(source)
            }
            _ => false,
        }
    }

    /// Whether `self` implicitly promotes to `target`.
    ///
    /// Signed integers widen within the signed family and to floats,
    /// unsigned integers widen within both integer families where the range
    /// fits, `Single` widens to `Double`, and a nullable source never
    /// promotes to a non-nullable target.
    #[must_use]
    pub fn is_compatible_with(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }
        if !target.is_value_type() {
            return target.is_assignable_from(self);
        }
        if self.is_nullable() && !target.is_nullable() {
            return false;
        }
        let source = self.non_nullable();
        let target = target.non_nullable();
        match (source, target) {
            (Self::Primitive(s), Self::Primitive(t)) => s.widens_to(*t),
            (s, t) => s == t,
        }
    }

    /// Zero value of the type: `0`, `false`, the earliest date, nil guid,
    /// or null for reference and nullable types.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Primitive(p) => match p {
                Primitive::Object | Primitive::String => Value::Null,
                Primitive::Boolean => Value::Bool(false),
                Primitive::Char => Value::Char('\0'),
                Primitive::SByte => Value::SByte(0),
                Primitive::Byte => Value::Byte(0),
                Primitive::Int16 => Value::Int16(0),
                Primitive::UInt16 => Value::UInt16(0),
                Primitive::Int32 => Value::Int32(0),
                Primitive::UInt32 => Value::UInt32(0),
                Primitive::Int64 => Value::Int64(0),
                Primitive::UInt64 => Value::UInt64(0),
                Primitive::Single => Value::Single(0.0),
                Primitive::Double => Value::Double(0.0),
                Primitive::DateTime => Value::DateTime(min_date_time()),
                Primitive::TimeSpan => Value::TimeSpan(TimeDelta::zero()),
                Primitive::Guid => Value::Guid(Uuid::nil()),
            },
            Self::Enum(ty) => Value::Enum(EnumValue::new(Arc::clone(ty), 0)),
            _ => Value::Null,
        }
    }
}

/// `0001-01-01 00:00:00`, the zero of `DateTime`.
pub(crate) fn min_date_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::Enum(ty) => f.write_str(ty.name()),
            Self::Record(ty) => f.write_str(ty.name()),
            Self::Sequence(element) => write!(f, "IEnumerable<{element}>"),
            Self::Map => f.write_str("Dictionary"),
            Self::Function { params, result } => {
                f.write_str("Func<")?;
                for param in params {
                    write!(f, "{param}, ")?;
                }
                write!(f, "{result}>")
            }
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

impl From<Primitive> for Type {
    fn from(p: Primitive) -> Self {
        Self::Primitive(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_widen_signed_integers_upward() {
        assert!(Type::INT32.is_compatible_with(&Type::INT64));
        assert!(Type::INT32.is_compatible_with(&Type::DOUBLE));
        assert!(!Type::INT64.is_compatible_with(&Type::INT32));
        assert!(!Type::INT32.is_compatible_with(&Type::UINT32));
    }

    #[test]
    fn test_should_widen_unsigned_into_larger_signed() {
        assert!(Type::UINT32.is_compatible_with(&Type::INT64));
        assert!(!Type::UINT64.is_compatible_with(&Type::INT64));
        assert!(Type::BYTE.is_compatible_with(&Type::INT16));
    }

    #[test]
    fn test_should_wrap_but_not_unwrap_nullable() {
        let nullable_int = Type::nullable(Type::INT32);
        assert!(Type::INT32.is_compatible_with(&nullable_int));
        assert!(Type::INT32.is_compatible_with(&Type::nullable(Type::INT64)));
        assert!(!nullable_int.is_compatible_with(&Type::INT32));
    }

    #[test]
    fn test_should_assign_everything_to_object() {
        assert!(Type::INT32.is_compatible_with(&Type::OBJECT));
        assert!(Type::Dynamic.is_compatible_with(&Type::OBJECT));
        assert!(!Type::INT32.is_compatible_with(&Type::STRING));
    }

    #[test]
    fn test_should_only_match_same_enum() {
        let status = Type::Enum(Arc::new(EnumType::new("Status", [("Draft", 0), ("Live", 1)])));
        let other = Type::Enum(Arc::new(EnumType::new("Other", [("A", 0)])));
        assert!(status.is_compatible_with(&status));
        assert!(!status.is_compatible_with(&other));
        assert!(!status.is_compatible_with(&Type::INT32));
    }

    #[test]
    fn test_should_format_type_names() {
        assert_eq!(Type::nullable(Type::INT32).to_string(), "Int32?");
        assert_eq!(Type::sequence(Type::STRING).to_string(), "IEnumerable<String>");
        assert_eq!(Primitive::from_name("datetime"), Some(Primitive::DateTime));
    }

    #[test]
    fn test_should_find_fields_ignoring_case() {
        let record = RecordType::new("Page").with_field("Name", Type::STRING);
        assert!(record.field("name", false).is_none());
        assert_eq!(record.field("name", true).map(|(n, _)| n), Some("Name"));
        assert!(!record.has_dynamic_members());
    }
}
