//! Property values and the attribute model.
//!
//! A property value is either one of the builtin variants of [`Value`] or a
//! [`CustomValue`] wrapping any application type that implements
//! [`Attribute`]. Whether a value may be *persisted* is a separate question
//! answered by the serializer registry, which looks the value up by its
//! exact [`AttributeType`].

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The exact runtime type of an attribute value.
///
/// Equality and hashing use only the [`TypeId`]; the name is carried for
/// error messages. There is no notion of subtyping: two types are either
/// the same type or unrelated.
#[derive(Clone, Copy)]
pub struct AttributeType {
    id: TypeId,
    name: &'static str,
}

impl AttributeType {
    /// Returns the attribute type of `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying type id.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for AttributeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AttributeType {}

impl Hash for AttributeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// An application-defined property value.
///
/// Implemented automatically for every `'static` type that is
/// `Send + Sync + Debug + PartialEq`. Implementing `Attribute` only makes a
/// type *representable*; it still needs a registered serializer before it
/// can be written to a property.
pub trait Attribute: Any + Send + Sync + fmt::Debug {
    /// The exact runtime type of this value.
    fn attribute_type(&self) -> AttributeType;

    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Value equality against another attribute of any type.
    fn eq_attribute(&self, other: &dyn Attribute) -> bool;
}

impl<T> Attribute for T
where
    T: Any + Send + Sync + fmt::Debug + PartialEq,
{
    fn attribute_type(&self) -> AttributeType {
        AttributeType::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_attribute(&self, other: &dyn Attribute) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// A shared, type-erased application value.
///
/// Only constructible through [`Value::custom`], which keeps builtin types
/// out of this variant.
#[derive(Clone)]
pub struct CustomValue(Arc<dyn Attribute>);

impl CustomValue {
    fn inner(&self) -> &dyn Attribute {
        &*self.0
    }

    /// The exact runtime type of the wrapped value.
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        self.inner().attribute_type()
    }

    /// Returns the wrapped value if it is exactly a `T`.
    #[must_use]
    pub fn downcast_ref<T: Attribute>(&self) -> Option<&T> {
        self.inner().as_any().downcast_ref::<T>()
    }

    /// Returns the wrapped value as a trait object.
    #[must_use]
    pub fn as_attribute(&self) -> &dyn Attribute {
        self.inner()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner(), f)
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.inner().eq_attribute(other.inner())
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    String(Arc<str>),
    /// Raw bytes.
    Bytes(Arc<[u8]>),
    /// Application-defined value.
    Custom(CustomValue),
}

impl Value {
    /// Wraps an application value.
    ///
    /// Builtin types are normalized to their dedicated variant, so
    /// `Value::custom(5i32) == Value::Int32(5)`.
    pub fn custom<T: Attribute>(value: T) -> Self {
        let any: &dyn Any = &value;
        if let Some(v) = any.downcast_ref::<Value>() {
            return v.clone();
        }
        if let Some(c) = any.downcast_ref::<CustomValue>() {
            return Value::Custom(c.clone());
        }
        if let Some(&v) = any.downcast_ref::<bool>() {
            return Value::Bool(v);
        }
        if let Some(&v) = any.downcast_ref::<i32>() {
            return Value::Int32(v);
        }
        if let Some(&v) = any.downcast_ref::<i64>() {
            return Value::Int64(v);
        }
        if let Some(&v) = any.downcast_ref::<f32>() {
            return Value::Float32(v);
        }
        if let Some(&v) = any.downcast_ref::<f64>() {
            return Value::Float64(v);
        }
        if let Some(s) = any.downcast_ref::<String>() {
            return Value::String(s.as_str().into());
        }
        if let Some(&s) = any.downcast_ref::<&'static str>() {
            return Value::String(s.into());
        }
        if let Some(b) = any.downcast_ref::<Vec<u8>>() {
            return Value::Bytes(b.as_slice().into());
        }
        Value::Custom(CustomValue(Arc::new(value)))
    }

    /// The exact runtime type of this value.
    ///
    /// Builtin variants report their Rust type (`i32`, `String`, `Vec<u8>`...).
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Value::Bool(_) => AttributeType::of::<bool>(),
            Value::Int32(_) => AttributeType::of::<i32>(),
            Value::Int64(_) => AttributeType::of::<i64>(),
            Value::Float32(_) => AttributeType::of::<f32>(),
            Value::Float64(_) => AttributeType::of::<f64>(),
            Value::String(_) => AttributeType::of::<String>(),
            Value::Bytes(_) => AttributeType::of::<Vec<u8>>(),
            Value::Custom(c) => c.attribute_type(),
        }
    }

    /// Short type name for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "BOOL",
            Value::Int32(_) => "INT32",
            Value::Int64(_) => "INT64",
            Value::Float32(_) => "FLOAT32",
            Value::Float64(_) => "FLOAT64",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Custom(c) => c.attribute_type().short_name(),
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the 32-bit integer, if this is one.
    #[must_use]
    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the 64-bit integer, if this is one.
    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the 32-bit float, if this is one.
    #[must_use]
    pub fn as_float32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the 64-bit float, if this is one.
    #[must_use]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the byte slice, if this is a byte value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the application value if it is exactly a `T`.
    #[must_use]
    pub fn as_custom<T: Attribute>(&self) -> Option<&T> {
        match self {
            Value::Custom(c) => c.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Custom(c) => write!(f, "{c:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(v: Arc<str>) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.into())
    }
}
