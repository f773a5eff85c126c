//! Formula value types
//!
//! A [`ValueType`] describes what a formula (or any sub-expression of one)
//! produces for every row. The type checker assigns one to each node and the
//! storage layer uses the final one to pick the physical column type.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of decimal places a number type can carry
pub const MAX_DECIMAL_PLACES: u8 = 10;

/// The inferred type of a formula or sub-expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ValueType {
    /// Decimal number with a fixed number of decimal places
    Number { decimal_places: u8 },

    /// Text
    Text,

    /// Boolean; never null once normalized
    Boolean,

    /// Date, optionally with a time component
    Date {
        include_time: bool,
        timezone_aware: bool,
    },

    /// Array of values of a single element type
    Array { element: Box<ValueType> },

    /// Single select option (stored as the option value)
    SingleSelect,

    /// Multiple select options (stored as a JSON array of option values)
    MultipleSelect,

    /// Uploaded files (stored as a JSON array of file objects)
    FileCollection,

    /// The expression cannot be evaluated. Absorbing: any expression with
    /// an invalid sub-expression is itself invalid.
    Invalid { reason: String },
}

impl ValueType {
    /// Create a number type, clamping the decimal places to [`MAX_DECIMAL_PLACES`]
    pub fn number(decimal_places: u8) -> Self {
        ValueType::Number {
            decimal_places: decimal_places.min(MAX_DECIMAL_PLACES),
        }
    }

    /// Create a date type; date times are timezone aware, plain dates are not
    pub fn date(include_time: bool) -> Self {
        ValueType::Date {
            include_time,
            timezone_aware: include_time,
        }
    }

    /// Create an array type
    pub fn array(element: ValueType) -> Self {
        ValueType::Array {
            element: Box::new(element),
        }
    }

    /// Create an invalid type with a reason
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        ValueType::Invalid {
            reason: reason.into(),
        }
    }

    /// Check if this type is invalid
    pub fn is_invalid(&self) -> bool {
        matches!(self, ValueType::Invalid { .. })
    }

    /// Get the reason if this type is invalid
    pub fn invalid_reason(&self) -> Option<&str> {
        match self {
            ValueType::Invalid { reason } => Some(reason),
            _ => None,
        }
    }

    /// Get the number of decimal places if this is a number type
    pub fn decimal_places(&self) -> Option<u8> {
        match self {
            ValueType::Number { decimal_places } => Some(*decimal_places),
            _ => None,
        }
    }

    /// Check if this is a number type
    pub fn is_number(&self) -> bool {
        matches!(self, ValueType::Number { .. })
    }

    /// Check if this is a date type
    pub fn is_date(&self) -> bool {
        matches!(self, ValueType::Date { .. })
    }

    /// Check if values of this type are stored as JSON arrays
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            ValueType::Array { .. } | ValueType::MultipleSelect | ValueType::FileCollection
        )
    }

    /// Short kind name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueType::Number { .. } => "number",
            ValueType::Text => "text",
            ValueType::Boolean => "boolean",
            ValueType::Date { .. } => "date",
            ValueType::Array { .. } => "array",
            ValueType::SingleSelect => "single select",
            ValueType::MultipleSelect => "multiple select",
            ValueType::FileCollection => "file collection",
            ValueType::Invalid { .. } => "invalid",
        }
    }

    /// Check if two types are of the same kind, ignoring number precision
    /// and date flags
    pub fn same_kind(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Array { element: a }, ValueType::Array { element: b }) => a.same_kind(b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Check if a defined coercion exists from this type to `target`
    pub fn can_coerce_to(&self, target: &ValueType) -> bool {
        if self.is_invalid() || target.is_invalid() {
            return false;
        }
        if self.same_kind(target) {
            return true;
        }
        match target {
            ValueType::Text => matches!(
                self,
                ValueType::Number { .. }
                    | ValueType::Boolean
                    | ValueType::Date { .. }
                    | ValueType::SingleSelect
            ),
            _ => false,
        }
    }

    /// Find the narrowest type both `a` and `b` can be coerced to
    ///
    /// Numbers unify to the larger precision, dates keep the time component
    /// if either side has one, and mixed scalar kinds fall back to text.
    pub fn unify(a: &ValueType, b: &ValueType) -> Option<ValueType> {
        match (a, b) {
            (
                ValueType::Number { decimal_places: x },
                ValueType::Number { decimal_places: y },
            ) => Some(ValueType::number(*x.max(y))),
            (
                ValueType::Date {
                    include_time: t1,
                    timezone_aware: z1,
                },
                ValueType::Date {
                    include_time: t2,
                    timezone_aware: z2,
                },
            ) => Some(ValueType::Date {
                include_time: *t1 || *t2,
                timezone_aware: *z1 || *z2,
            }),
            (ValueType::Array { element: x }, ValueType::Array { element: y }) => {
                ValueType::unify(x, y).map(ValueType::array)
            }
            _ if a == b && !a.is_invalid() => Some(a.clone()),
            _ if a.can_coerce_to(&ValueType::Text) && b.can_coerce_to(&ValueType::Text) => {
                Some(ValueType::Text)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Number { decimal_places: 0 } => write!(f, "whole number"),
            ValueType::Number { decimal_places } => {
                write!(f, "number with {} decimal places", decimal_places)
            }
            ValueType::Date {
                include_time: false,
                ..
            } => write!(f, "date"),
            ValueType::Date {
                include_time: true,
                ..
            } => write!(f, "date and time"),
            ValueType::Array { element } => write!(f, "array of {}", element),
            ValueType::Invalid { reason } => write!(f, "invalid ({})", reason),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}
