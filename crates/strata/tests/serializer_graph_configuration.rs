//! End-to-end checks of serializer registration against schema-bound
//! property writes.

use anyhow::Result;
use strata::{
    AttributeSerializer, Cardinality, Config, DataType, ElementId, ElementKind, QueryPlan,
    ReadBuffer, SerializerError, SerializerRegistry, StrataDB, TxState, Value, WriteBuffer,
};

#[derive(Debug, Clone, PartialEq)]
struct TClass1 {
    a: i32,
    b: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct TClass2 {
    a: i32,
    b: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Wrapped(TClass1);

#[derive(Debug, Clone, Copy, PartialEq)]
enum TEnum {
    One,
    Two,
    Three,
}

struct TClass1Serializer;

impl AttributeSerializer<TClass1> for TClass1Serializer {
    fn write(&self, buffer: &mut WriteBuffer, value: &TClass1) -> strata::Result<()> {
        buffer.put_i32(value.a);
        buffer.put_f32(value.b);
        Ok(())
    }

    fn read(&self, buffer: &mut ReadBuffer<'_>) -> strata::Result<TClass1> {
        Ok(TClass1 {
            a: buffer.get_i32()?,
            b: buffer.get_f32()?,
        })
    }
}

struct TEnumSerializer;

impl AttributeSerializer<TEnum> for TEnumSerializer {
    fn write(&self, buffer: &mut WriteBuffer, value: &TEnum) -> strata::Result<()> {
        buffer.put_u8(*value as u8);
        Ok(())
    }

    fn read(&self, buffer: &mut ReadBuffer<'_>) -> strata::Result<TEnum> {
        match buffer.get_u8()? {
            0 => Ok(TEnum::One),
            1 => Ok(TEnum::Two),
            2 => Ok(TEnum::Three),
            other => Err(SerializerError::Malformed(format!("bad TEnum tag {other}")).into()),
        }
    }
}

fn registry() -> Result<SerializerRegistry> {
    let mut registry = SerializerRegistry::new();
    registry.register::<TClass1, _>(TClass1Serializer)?;
    registry.register::<TEnum, _>(TEnumSerializer)?;
    Ok(registry)
}

/// `time` INT32 SINGLE indexed by `byTime`, `any` untyped LIST, plus
/// `tag` STRING SET, all on vertices labelled `vertex`.
fn configured_db() -> Result<StrataDB> {
    let db = StrataDB::with_registry(Config::in_memory(), registry()?)?;
    let mut mgmt = db.open_management()?;
    mgmt.make_property_key("time").data_type(DataType::Int32).make()?;
    mgmt.make_property_key("any").cardinality(Cardinality::List).make()?;
    mgmt.make_property_key("tag")
        .data_type(DataType::String)
        .cardinality(Cardinality::Set)
        .make()?;
    mgmt.make_vertex_label("vertex").make()?;
    mgmt.build_index("byTime", ElementKind::Vertex)
        .add_key("time")
        .build_composite_index()?;
    mgmt.commit()?;
    Ok(db)
}

#[test]
fn test_registered_custom_types_round_trip_through_index() -> Result<()> {
    let db = configured_db()?;

    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;
    tx.property(v, "time", 5)?;
    tx.property(v, "any", 5.0)?;
    tx.property(v, "any", Value::custom(TClass1 { a: 5, b: 1.5 }))?;
    tx.property(v, "any", Value::custom(TEnum::Three))?;
    tx.commit()?;

    let mut tx = db.new_transaction()?;
    assert_eq!(
        tx.query().has("time", 5).plan(ElementKind::Vertex)?,
        QueryPlan::CompositeIndex("byTime".to_string())
    );
    let found = tx.query().has("time", 5).vertices()?;
    assert_eq!(found.len(), 1);

    let any = tx.values(found[0], "any")?;
    assert_eq!(any.len(), 3);
    assert_eq!(any[0].as_float64(), Some(5.0));
    assert_eq!(any[1].as_custom::<TClass1>(), Some(&TClass1 { a: 5, b: 1.5 }));
    assert_eq!(any[2].as_custom::<TEnum>(), Some(&TEnum::Three));
    assert_eq!(tx.value(found[0], "time")?.and_then(Value::as_int32), Some(5));
    Ok(())
}

#[test]
fn test_unregistered_type_aborts_whole_transaction() -> Result<()> {
    let db = configured_db()?;

    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;
    tx.property(v, "time", 7)?;
    let err = tx
        .property(v, "any", Value::custom(TClass2 { a: 1, b: 2.0 }))
        .unwrap_err();
    assert!(err.is_unregistered_type());
    assert!(tx.is_rollback_only());

    let err = tx.commit().unwrap_err();
    assert!(err.is_unregistered_type());
    assert!(!tx.is_open());
    assert_eq!(tx.state(), TxState::RolledBack);

    // Neither the valid nor the invalid write is visible.
    let mut tx = db.new_transaction()?;
    assert!(tx.query().has("time", 7).vertices()?.is_empty());
    assert!(tx.vertex(ElementId::new(0))?.is_none());
    Ok(())
}

#[test]
fn test_registration_is_exact_type() -> Result<()> {
    let db = configured_db()?;
    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;

    // Same fields as a registered type, but a different type.
    let err = tx
        .property(v, "any", Value::custom(Wrapped(TClass1 { a: 1, b: 1.0 })))
        .unwrap_err();
    assert!(err.is_unregistered_type());
    assert!(tx.commit().is_err());
    Ok(())
}

#[test]
fn test_duplicate_registration_rejected() -> Result<()> {
    struct Reversed;

    impl AttributeSerializer<TClass1> for Reversed {
        fn write(&self, buffer: &mut WriteBuffer, value: &TClass1) -> strata::Result<()> {
            buffer.put_f32(value.b);
            buffer.put_i32(value.a);
            Ok(())
        }

        fn read(&self, buffer: &mut ReadBuffer<'_>) -> strata::Result<TClass1> {
            let b = buffer.get_f32()?;
            Ok(TClass1 {
                a: buffer.get_i32()?,
                b,
            })
        }
    }

    let mut registry = registry()?;
    let before = registry.len();
    // The same pair again is a no-op.
    registry.register::<TClass1, _>(TClass1Serializer)?;
    assert!(registry.register::<TClass1, _>(Reversed).is_err());
    assert_eq!(registry.len(), before);
    Ok(())
}

#[test]
fn test_cardinalities() -> Result<()> {
    let db = configured_db()?;

    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;
    tx.property(v, "time", 1)?;
    tx.property(v, "time", 2)?;
    tx.property(v, "tag", "a")?;
    tx.property(v, "tag", "b")?;
    tx.property(v, "tag", "a")?;
    tx.property(v, "any", 1)?;
    tx.property(v, "any", 1)?;
    let summary = tx.commit()?;
    let id = summary.id_of(v).expect("new vertex gets an id");

    let mut tx = db.new_transaction()?;
    let v = tx.vertex(id)?.expect("committed vertex");
    assert_eq!(tx.values(v, "time")?, &[Value::Int32(2)]);
    assert_eq!(tx.values(v, "tag")?, &[Value::from("a"), Value::from("b")]);
    assert_eq!(tx.values(v, "any")?, &[Value::Int32(1), Value::Int32(1)]);

    // The replaced SINGLE value is no longer indexed.
    assert!(tx.query().has("time", 1).vertices()?.is_empty());
    assert_eq!(tx.query().has("time", 2).vertices()?, vec![v]);
    Ok(())
}

#[test]
fn test_declared_type_is_enforced() -> Result<()> {
    let db = configured_db()?;
    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;

    // INT64 is registered but `time` declares INT32.
    let err = tx.property(v, "time", 5_i64).unwrap_err();
    assert!(!err.is_unregistered_type());
    assert!(err.to_string().contains("INT32"));
    assert!(tx.commit().is_err());
    Ok(())
}

#[test]
fn test_schema_declares_custom_data_type() -> Result<()> {
    let db = configured_db()?;
    let mut mgmt = db.open_management()?;
    mgmt.make_property_key("mood")
        .data_type(DataType::of::<TEnum>())
        .make()?;
    assert!(mgmt
        .make_property_key("other")
        .data_type(DataType::of::<TClass2>())
        .make()
        .unwrap_err()
        .is_unregistered_type());
    mgmt.commit()?;

    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("vertex")?;
    tx.property(v, "mood", Value::custom(TEnum::Two))?;
    let summary = tx.commit()?;

    let mut tx = db.new_transaction()?;
    let v = tx.vertex(summary.id_of(v).expect("assigned"))?.expect("committed");
    assert_eq!(
        tx.value(v, "mood")?.and_then(Value::as_custom::<TEnum>),
        Some(&TEnum::Two)
    );
    assert!(tx.property(v, "mood", Value::custom(TClass1 { a: 0, b: 0.0 })).is_err());
    Ok(())
}
