//! The closed-world serializer registry.
//!
//! Every value written to a property must have a serializer bound to its
//! exact runtime type. Lookups go through the value's [`TypeId`]; there is
//! no fallback to wrapped, parent or structurally similar types.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use strata_common::types::{Attribute, AttributeType, SerializerId, Value};
use strata_common::utils::error::{Result, SerializerError};
use strata_common::utils::hash::FxHashMap;

use super::buffer::{ReadBuffer, WriteBuffer};
use super::builtin::Builtin;

/// First id handed out to automatically numbered custom registrations.
pub const CUSTOM_SERIALIZER_BASE: u16 = 1000;

/// Reads and writes values of one application type.
///
/// Implementations must be inverse operations: whatever `write` produces,
/// `read` turns back into an equal value.
///
/// # Example
///
/// ```
/// use strata_core::serializer::{AttributeSerializer, ReadBuffer, WriteBuffer};
/// use strata_common::Result;
///
/// #[derive(Debug, PartialEq)]
/// struct Celsius(f64);
///
/// struct CelsiusSerializer;
///
/// impl AttributeSerializer<Celsius> for CelsiusSerializer {
///     fn write(&self, buffer: &mut WriteBuffer, value: &Celsius) -> Result<()> {
///         buffer.put_f64(value.0);
///         Ok(())
///     }
///
///     fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<Celsius> {
///         Ok(Celsius(buffer.get_f64()?))
///     }
/// }
/// ```
pub trait AttributeSerializer<T>: Send + Sync + 'static {
    /// Appends `value` to `buffer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn write(&self, buffer: &mut WriteBuffer, value: &T) -> Result<()>;

    /// Reads one value from `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::Malformed`] if the bytes are not a valid
    /// encoding.
    fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<T>;
}

/// Type-erased serializer stored in the registry.
pub(crate) trait ErasedSerializer: Send + Sync {
    fn serializer_type(&self) -> TypeId;
    fn serializer_name(&self) -> &'static str;
    fn write_value(&self, buffer: &mut WriteBuffer, value: &Value) -> Result<()>;
    fn read_value(&self, buffer: &mut ReadBuffer<'_>) -> Result<Value>;
}

/// Binds an [`AttributeSerializer<T>`] to the erased interface.
struct Typed<T, S> {
    serializer: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> ErasedSerializer for Typed<T, S>
where
    T: Attribute + PartialEq,
    S: AttributeSerializer<T>,
{
    fn serializer_type(&self) -> TypeId {
        TypeId::of::<S>()
    }

    fn serializer_name(&self) -> &'static str {
        std::any::type_name::<S>()
    }

    fn write_value(&self, buffer: &mut WriteBuffer, value: &Value) -> Result<()> {
        let Some(inner) = value.as_custom::<T>() else {
            return Err(SerializerError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: value.attribute_type().name(),
            }
            .into());
        };
        self.serializer.write(buffer, inner)
    }

    fn read_value(&self, buffer: &mut ReadBuffer<'_>) -> Result<Value> {
        self.serializer.read(buffer).map(Value::custom)
    }
}

struct Registration {
    id: SerializerId,
    value_type: AttributeType,
    serializer: Arc<dyn ErasedSerializer>,
}

/// Public view of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRegistration {
    /// The exact value type.
    pub value_type: AttributeType,
    /// Id written in front of every serialized value of this type.
    pub serializer_id: SerializerId,
    /// Name of the serializer implementation.
    pub serializer_name: &'static str,
}

/// A serialized value together with the id of the serializer that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    /// Serializer that produced `payload`.
    pub serializer: SerializerId,
    /// Serializer output.
    pub payload: Bytes,
}

impl EncodedValue {
    /// Returns `[serializer id: u16][payload]`.
    #[must_use]
    pub fn to_framed(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(2 + self.payload.len());
        buf.put_u16(self.serializer.as_u16());
        buf.put_slice(&self.payload);
        buf.to_vec()
    }
}

/// Maps exact value types to serializers.
///
/// Built once during configuration and then shared read-only by the
/// database. Builtin types are pre-registered.
#[derive(Clone)]
pub struct SerializerRegistry {
    by_type: FxHashMap<TypeId, Arc<Registration>>,
    by_id: FxHashMap<SerializerId, Arc<Registration>>,
    next_custom: u16,
}

impl SerializerRegistry {
    /// Creates a registry holding only the builtin types.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_type: FxHashMap::default(),
            by_id: FxHashMap::default(),
            next_custom: CUSTOM_SERIALIZER_BASE,
        };
        for builtin in Builtin::ALL {
            registry.insert(builtin.id(), builtin.attribute_type(), Arc::new(builtin));
        }
        registry
    }

    fn insert(
        &mut self,
        id: SerializerId,
        value_type: AttributeType,
        serializer: Arc<dyn ErasedSerializer>,
    ) {
        let reg = Arc::new(Registration {
            id,
            value_type,
            serializer,
        });
        self.by_type.insert(value_type.type_id(), Arc::clone(&reg));
        self.by_id.insert(id, reg);
    }

    /// Checks an existing binding for `T`. Returns `Some(id)` when the same
    /// serializer type is already bound.
    fn check_existing<T: Attribute, S: 'static>(&self) -> Result<Option<SerializerId>> {
        let Some(existing) = self.by_type.get(&TypeId::of::<T>()) else {
            return Ok(None);
        };
        if existing.serializer.serializer_type() == TypeId::of::<S>() {
            return Ok(Some(existing.id));
        }
        Err(SerializerError::DuplicateRegistration {
            type_name: std::any::type_name::<T>(),
            existing: existing.serializer.serializer_name(),
        }
        .into())
    }

    /// Binds `serializer` to the exact type `T` under the next free custom id.
    ///
    /// Registering the same `(T, S)` pair again is a no-op returning the
    /// existing id.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::DuplicateRegistration`] if `T` is already
    /// bound to a different serializer.
    pub fn register<T, S>(&mut self, serializer: S) -> Result<SerializerId>
    where
        T: Attribute + PartialEq,
        S: AttributeSerializer<T>,
    {
        if let Some(id) = self.check_existing::<T, S>()? {
            return Ok(id);
        }
        while self.by_id.contains_key(&SerializerId::new(self.next_custom)) {
            self.next_custom = self.next_custom.checked_add(1).ok_or_else(|| {
                SerializerError::SerializerIdInUse(u16::MAX)
            })?;
        }
        let id = SerializerId::new(self.next_custom);
        self.insert_typed::<T, S>(id, serializer);
        Ok(id)
    }

    /// Binds `serializer` to `T` under an explicit id.
    ///
    /// Stable explicit ids keep stored data readable when registration
    /// order changes between runs.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::DuplicateRegistration`] if `T` is bound to
    /// another serializer, [`SerializerError::RegisteredUnderOtherId`] if
    /// the same pair already has a different id, or
    /// [`SerializerError::SerializerIdInUse`] if `id` belongs to another
    /// registration.
    pub fn register_with_id<T, S>(&mut self, id: u16, serializer: S) -> Result<SerializerId>
    where
        T: Attribute + PartialEq,
        S: AttributeSerializer<T>,
    {
        if let Some(existing) = self.check_existing::<T, S>()? {
            if existing.as_u16() == id {
                return Ok(existing);
            }
            return Err(SerializerError::RegisteredUnderOtherId {
                type_name: std::any::type_name::<T>(),
                existing: existing.as_u16(),
                requested: id,
            }
            .into());
        }
        let id = SerializerId::new(id);
        if self.by_id.contains_key(&id) {
            return Err(SerializerError::SerializerIdInUse(id.as_u16()).into());
        }
        self.insert_typed::<T, S>(id, serializer);
        Ok(id)
    }

    fn insert_typed<T, S>(&mut self, id: SerializerId, serializer: S)
    where
        T: Attribute + PartialEq,
        S: AttributeSerializer<T>,
    {
        let erased: Arc<dyn ErasedSerializer> = Arc::new(Typed::<T, S> {
            serializer,
            _marker: PhantomData,
        });
        self.insert(id, AttributeType::of::<T>(), erased);
        tracing::debug!(
            "registered serializer {} for {} as {}",
            std::any::type_name::<S>(),
            std::any::type_name::<T>(),
            id
        );
    }

    /// Returns true if `T` itself has a serializer.
    #[must_use]
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Returns the registration for an exact type.
    #[must_use]
    pub fn registration(&self, value_type: AttributeType) -> Option<AttributeRegistration> {
        self.by_type
            .get(&value_type.type_id())
            .map(|reg| AttributeRegistration {
                value_type: reg.value_type,
                serializer_id: reg.id,
                serializer_name: reg.serializer.serializer_name(),
            })
    }

    /// Returns the serializer id bound to an exact type.
    #[must_use]
    pub fn id_of(&self, value_type: AttributeType) -> Option<SerializerId> {
        self.by_type.get(&value_type.type_id()).map(|reg| reg.id)
    }

    /// Returns the value type bound to a serializer id.
    #[must_use]
    pub fn attribute_type(&self, id: SerializerId) -> Option<AttributeType> {
        self.by_id.get(&id).map(|reg| reg.value_type)
    }

    /// Checks that an exact type is registered.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnregisteredType`] otherwise.
    pub fn validate_type(&self, value_type: AttributeType) -> Result<SerializerId> {
        self.id_of(value_type).ok_or_else(|| {
            SerializerError::UnregisteredType {
                type_name: value_type.name(),
            }
            .into()
        })
    }

    /// Checks that the value's exact runtime type is registered.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnregisteredType`] otherwise.
    pub fn validate(&self, value: &Value) -> Result<SerializerId> {
        self.validate_type(value.attribute_type())
    }

    fn lookup(&self, value: &Value) -> Result<&Registration> {
        let ty = value.attribute_type();
        self.by_type
            .get(&ty.type_id())
            .map(|reg| &**reg)
            .ok_or_else(|| {
                SerializerError::UnregisteredType {
                    type_name: ty.name(),
                }
                .into()
            })
    }

    /// Serializes a value with the serializer bound to its exact type.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnregisteredType`] if the type has no
    /// serializer, or whatever the serializer reports.
    pub fn serialize(&self, value: &Value) -> Result<EncodedValue> {
        let reg = self.lookup(value)?;
        let mut buffer = WriteBuffer::new();
        reg.serializer.write_value(&mut buffer, value)?;
        Ok(EncodedValue {
            serializer: reg.id,
            payload: buffer.freeze(),
        })
    }

    /// Reads a payload written by serializer `id`.
    ///
    /// The payload must be consumed exactly.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnknownSerializerId`] for an unbound id and
    /// [`SerializerError::Malformed`] for bad or trailing bytes.
    pub fn deserialize(&self, id: SerializerId, payload: &[u8]) -> Result<Value> {
        let reg = self
            .by_id
            .get(&id)
            .ok_or(SerializerError::UnknownSerializerId(id.as_u16()))?;
        let mut buffer = ReadBuffer::new(payload);
        let value = reg.serializer.read_value(&mut buffer)?;
        if buffer.has_remaining() {
            return Err(SerializerError::Malformed(format!(
                "{} trailing bytes after value of {}",
                buffer.remaining(),
                reg.value_type
            ))
            .into());
        }
        Ok(value)
    }

    /// Serializes a value into a self-describing frame.
    ///
    /// # Errors
    ///
    /// See [`serialize`](Self::serialize).
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.serialize(value).map(|encoded| encoded.to_framed())
    }

    /// Reads a frame written by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// See [`deserialize`](Self::deserialize).
    pub fn decode(&self, frame: &[u8]) -> Result<Value> {
        let mut header = ReadBuffer::new(frame);
        let id = SerializerId::new(header.get_u16()?);
        self.deserialize(id, &frame[2..])
    }

    /// Number of registrations, builtins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Always false; builtins are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.by_id.values().collect();
        ids.sort_by_key(|reg| reg.id);
        f.debug_map()
            .entries(ids.iter().map(|reg| (reg.id.as_u16(), reg.value_type)))
            .finish()
    }
}
