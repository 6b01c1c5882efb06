//! Conversions between Rust values and attribute nodes.
//!
//! [`Mapped`] is implemented here for the primitive types the mapper stores
//! directly. Enums opt in through [`mapped_enum!`](crate::mapped_enum) and
//! descriptor-driven structs through [`mapped_object!`](crate::mapped_object).
//!
//! Loading is lenient about representation: a number stored as a string, an
//! integer stored where a float is expected, or a `Y`/`N` flag all convert.
//! Anything else is a coercion error carrying the field path.

use super::context::{LoadContext, SaveContext};
use crate::error::MapError;
use crate::model::{Attribute, AttributeTree, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Older records store timestamps in this layout.
const LEGACY_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// A type the mapper can write to and read from an attribute node.
pub trait Mapped: Sized {
    /// Short name used in coercion messages.
    fn type_name() -> &'static str;

    /// True for descriptor-driven types. An empty attribute then means "all
    /// defaults" rather than "absent".
    fn is_object() -> bool {
        false
    }

    fn to_tree(&self, ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError>;

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError>;
}

impl Mapped for String {
    fn type_name() -> &'static str {
        "string"
    }

    fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        Ok(AttributeTree::with_value(self.as_str()))
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        Ok(ctx.scalar(attr, "string")?.to_string())
    }
}

impl Mapped for bool {
    fn type_name() -> &'static str {
        "boolean"
    }

    fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        Ok(AttributeTree::with_value(*self))
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        let value = ctx.scalar(attr, "boolean")?;
        let parsed = match value {
            Value::Boolean(b) => Some(*b),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "y" | "yes" | "1" => Some(true),
                "false" | "n" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed.ok_or_else(|| ctx.mismatch("boolean", value))
    }
}

// Values outside the i64 range are stored as their decimal string.
macro_rules! mapped_integer {
    ($($t:ty),+) => {
        $(
            impl Mapped for $t {
                fn type_name() -> &'static str {
                    stringify!($t)
                }

                fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
                    Ok(match i64::try_from(*self) {
                        Ok(v) => AttributeTree::with_value(v),
                        Err(_) => AttributeTree::with_value(self.to_string()),
                    })
                }

                fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
                    let value = ctx.scalar(attr, stringify!($t))?;
                    let parsed = match value {
                        Value::Integer(i) => <$t>::try_from(*i).ok(),
                        Value::Float(f) if f.fract() == 0.0 => <$t>::try_from(*f as i128).ok(),
                        Value::String(s) => s.trim().parse::<$t>().ok(),
                        _ => None,
                    };
                    parsed.ok_or_else(|| ctx.mismatch(stringify!($t), value))
                }
            }
        )+
    };
}

mapped_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! mapped_float {
    ($($t:ty),+) => {
        $(
            impl Mapped for $t {
                fn type_name() -> &'static str {
                    stringify!($t)
                }

                /// Non-finite values have no JSON number form; they are kept
                /// as their text (`NaN`, `inf`, `-inf`), which parses back.
                fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
                    let value = f64::from(*self);
                    if value.is_finite() {
                        Ok(AttributeTree::with_value(value))
                    } else {
                        Ok(AttributeTree::with_value(value.to_string()))
                    }
                }

                fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
                    let value = ctx.scalar(attr, stringify!($t))?;
                    let parsed = match value {
                        Value::Float(f) => Some(*f as $t),
                        Value::Integer(i) => Some(*i as $t),
                        Value::String(s) => s.trim().parse::<$t>().ok(),
                        _ => None,
                    };
                    parsed.ok_or_else(|| ctx.mismatch(stringify!($t), value))
                }
            }
        )+
    };
}

mapped_float!(f32, f64);

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, LEGACY_DATE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl Mapped for DateTime<Utc> {
    fn type_name() -> &'static str {
        "date"
    }

    fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        Ok(AttributeTree::with_value(
            self.to_rfc3339_opts(SecondsFormat::Millis, true),
        ))
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        let value = ctx.scalar(attr, "date")?;
        let parsed = match value {
            Value::Date(d) => Some(*d),
            Value::String(s) => parse_timestamp(s),
            Value::Integer(millis) => DateTime::from_timestamp_millis(*millis),
            _ => None,
        };
        parsed.ok_or_else(|| ctx.mismatch("date", value))
    }
}

impl Mapped for NaiveDate {
    fn type_name() -> &'static str {
        "day"
    }

    fn to_tree(&self, _ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        Ok(AttributeTree::with_value(self.format(DAY_FORMAT).to_string()))
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        let value = ctx.scalar(attr, "day")?;
        let parsed = match value {
            Value::Date(d) => Some(d.date_naive()),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
                .ok()
                .or_else(|| parse_timestamp(s).map(|d| d.date_naive())),
            _ => None,
        };
        parsed.ok_or_else(|| ctx.mismatch("day", value))
    }
}

impl<M: Mapped> Mapped for Box<M> {
    fn type_name() -> &'static str {
        M::type_name()
    }

    fn is_object() -> bool {
        M::is_object()
    }

    fn to_tree(&self, ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        self.as_ref().to_tree(ctx)
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        M::from_attribute(attr, ctx).map(Box::new)
    }
}

impl<M: Mapped> Mapped for Arc<M> {
    fn type_name() -> &'static str {
        M::type_name()
    }

    fn is_object() -> bool {
        M::is_object()
    }

    fn to_tree(&self, ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        self.as_ref().to_tree(ctx)
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        M::from_attribute(attr, ctx).map(Arc::new)
    }
}

/// Shared, mutable references. This is the only way to build a cyclic graph,
/// which the save walk rejects.
impl<M: Mapped> Mapped for Rc<RefCell<M>> {
    fn type_name() -> &'static str {
        M::type_name()
    }

    fn is_object() -> bool {
        M::is_object()
    }

    fn to_tree(&self, ctx: &mut SaveContext<'_>) -> Result<AttributeTree, MapError> {
        let inner = self
            .try_borrow()
            .map_err(|_| MapError::BorrowConflict { path: ctx.path() })?;
        inner.to_tree(ctx)
    }

    fn from_attribute(attr: &Attribute, ctx: &mut LoadContext<'_>) -> Result<Self, MapError> {
        M::from_attribute(attr, ctx).map(|m| Rc::new(RefCell::new(m)))
    }
}

/// Implement [`Mapped`] for a fieldless enum, stored by variant name.
///
/// ```
/// use metastore::mapped_enum;
///
/// #[derive(Debug, Default, PartialEq)]
/// enum Kind { #[default] Normal, Time }
///
/// mapped_enum!(Kind { Normal, Time });
/// ```
#[macro_export]
macro_rules! mapped_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::mapper::Mapped for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn to_tree(
                &self,
                _ctx: &mut $crate::mapper::SaveContext<'_>,
            ) -> ::std::result::Result<$crate::model::AttributeTree, $crate::error::MapError> {
                let name = match self {
                    $( $ty::$variant => stringify!($variant), )+
                };
                Ok($crate::model::AttributeTree::with_value(name))
            }

            fn from_attribute(
                attr: &$crate::model::Attribute,
                ctx: &mut $crate::mapper::LoadContext<'_>,
            ) -> ::std::result::Result<Self, $crate::error::MapError> {
                let value = ctx.scalar(attr, stringify!($ty))?;
                match value.as_str() {
                    $( Some(stringify!($variant)) => Ok($ty::$variant), )+
                    _ => Err(ctx.mismatch(stringify!($ty), value)),
                }
            }
        }
    };
}

/// Implement [`Mapped`] for types that implement
/// [`MetaStoreObject`](crate::mapper::MetaStoreObject), so they can be nested
/// inside other mapped objects.
#[macro_export]
macro_rules! mapped_object {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::mapper::Mapped for $ty {
                fn type_name() -> &'static str {
                    <$ty as $crate::mapper::MetaStoreObject>::descriptor().type_name()
                }

                fn is_object() -> bool {
                    true
                }

                fn to_tree(
                    &self,
                    ctx: &mut $crate::mapper::SaveContext<'_>,
                ) -> ::std::result::Result<$crate::model::AttributeTree, $crate::error::MapError> {
                    ctx.save_object(self)
                }

                fn from_attribute(
                    attr: &$crate::model::Attribute,
                    ctx: &mut $crate::mapper::LoadContext<'_>,
                ) -> ::std::result::Result<Self, $crate::error::MapError> {
                    ctx.load_object(&attr.children)
                }
            }
        )+
    };
}
