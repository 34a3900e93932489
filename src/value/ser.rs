//! Serde support for [`Value`], used by [`View::with_data`][crate::View::with_data]
//! and [`Environment::render`][crate::Environment::render].

use serde::ser::{self, Impossible, Serialize};

use crate::value::{List, Map};
use crate::{Error, Result, Value};

/// Convert a `T` to a [`Value`].
///
/// Structs and maps become [`Value::Map`], sequences and tuples become
/// [`Value::List`]. Map keys must serialize to strings or integers.
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub fn to_value<T>(value: T) -> Result<Value>
where
    T: Serialize,
{
    value.serialize(ToValue)
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => list.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

fn custom(msg: &str) -> Error {
    <Error as ser::Error>::custom(msg)
}

/// Enum variants with data are stored as `{variant: data}`.
fn tagged(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(name) => Value::Map(Map::from([(name.to_owned(), value)])),
        None => value,
    }
}

/// Generates serializer methods that convert a primitive in one step.
macro_rules! primitives {
    ($($method:ident($ty:ty) => |$v:ident| $conv:expr;)+) => {
        $(
            fn $method(self, $v: $ty) -> Result<Self::Ok> {
                $conv
            }
        )+
    };
}

struct ToValue;

impl ser::Serializer for ToValue {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = Items;
    type SerializeTuple = Items;
    type SerializeTupleStruct = Items;
    type SerializeTupleVariant = Items;
    type SerializeMap = Entries;
    type SerializeStruct = Entries;
    type SerializeStructVariant = Entries;

    primitives! {
        serialize_bool(bool) => |v| Ok(Value::Bool(v));
        serialize_i8(i8) => |v| Ok(Value::from(v));
        serialize_i16(i16) => |v| Ok(Value::from(v));
        serialize_i32(i32) => |v| Ok(Value::from(v));
        serialize_i64(i64) => |v| Ok(Value::Integer(v));
        serialize_u8(u8) => |v| Ok(Value::from(v));
        serialize_u16(u16) => |v| Ok(Value::from(v));
        serialize_u32(u32) => |v| Ok(Value::from(v));
        serialize_u64(u64) => |v| {
            i64::try_from(v)
                .map(Value::Integer)
                .map_err(|_| custom("integer does not fit in 64 signed bits"))
        };
        serialize_f32(f32) => |v| Ok(Value::from(v));
        serialize_f64(f64) => |v| Ok(Value::Float(v));
        serialize_char(char) => |v| Ok(Value::String(v.into()));
        serialize_str(&str) => |v| Ok(Value::from(v));
        serialize_bytes(&[u8]) => |v| Ok(v.iter().copied().collect());
        serialize_unit_struct(&'static str) => |_v| Ok(Value::None);
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, variant: &'static str) -> Result<Value> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(Some(variant), to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Items> {
        Ok(Items::new(None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Items> {
        Ok(Items::new(None, len))
    }

    fn serialize_tuple_struct(self, _: &'static str, len: usize) -> Result<Items> {
        Ok(Items::new(None, len))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Items> {
        Ok(Items::new(Some(variant), len))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Entries> {
        Ok(Entries::new(None))
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Entries> {
        Ok(Entries::new(None))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Entries> {
        Ok(Entries::new(Some(variant)))
    }
}

/// Sequence and tuple elements being collected into a list.
struct Items {
    variant: Option<&'static str>,
    list: List<Value>,
}

impl Items {
    fn new(variant: Option<&'static str>, len: usize) -> Self {
        Self {
            variant,
            list: List::with_capacity(len),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.list.push(to_value(value)?);
        Ok(())
    }

    fn finish(self) -> Value {
        tagged(self.variant, Value::List(self.list))
    }
}

/// Implements one of the list-like serde traits on [`Items`].
macro_rules! items {
    ($($trait:ident::$method:ident),+) => {
        $(
            impl ser::$trait for Items {
                type Ok = Value;
                type Error = Error;

                fn $method<T>(&mut self, value: &T) -> Result<()>
                where
                    T: ?Sized + Serialize,
                {
                    self.push(value)
                }

                fn end(self) -> Result<Value> {
                    Ok(self.finish())
                }
            }
        )+
    };
}

items! {
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field
}

/// Map and struct entries being collected into a map.
struct Entries {
    variant: Option<&'static str>,
    map: Map<String, Value>,
    key: Option<String>,
}

impl Entries {
    fn new(variant: Option<&'static str>) -> Self {
        Self {
            variant,
            map: Map::new(),
            key: None,
        }
    }

    fn insert<T>(&mut self, key: String, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key, to_value(value)?);
        Ok(())
    }

    fn finish(self) -> Value {
        tagged(self.variant, Value::Map(self.map))
    }
}

impl ser::SerializeMap for Entries {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.key = Some(key.serialize(KeyToString)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match self.key.take() {
            Some(key) => self.insert(key, value),
            None => Err(custom("map value serialized before its key")),
        }
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

/// Implements one of the struct-like serde traits on [`Entries`].
macro_rules! entries {
    ($($trait:ident),+) => {
        $(
            impl ser::$trait for Entries {
                type Ok = Value;
                type Error = Error;

                fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
                where
                    T: ?Sized + Serialize,
                {
                    self.insert(key.to_owned(), value)
                }

                fn end(self) -> Result<Value> {
                    Ok(self.finish())
                }
            }
        )+
    };
}

entries! { SerializeStruct, SerializeStructVariant }

/// Serializes a map key, accepting only strings and integers.
struct KeyToString;

fn bad_key() -> Error {
    custom("map key must be a string or an integer")
}

/// Generates serializer methods that reject the key outright.
macro_rules! reject {
    ($($method:ident($($arg:ty),*) -> $ret:ty;)+) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<$ret> {
                Err(bad_key())
            }
        )+
    };
}

impl ser::Serializer for KeyToString {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    primitives! {
        serialize_i8(i8) => |v| Ok(v.to_string());
        serialize_i16(i16) => |v| Ok(v.to_string());
        serialize_i32(i32) => |v| Ok(v.to_string());
        serialize_i64(i64) => |v| Ok(v.to_string());
        serialize_u8(u8) => |v| Ok(v.to_string());
        serialize_u16(u16) => |v| Ok(v.to_string());
        serialize_u32(u32) => |v| Ok(v.to_string());
        serialize_u64(u64) => |v| Ok(v.to_string());
        serialize_char(char) => |v| Ok(v.to_string());
        serialize_str(&str) => |v| Ok(v.to_owned());
    }

    reject! {
        serialize_bool(bool) -> String;
        serialize_f32(f32) -> String;
        serialize_f64(f64) -> String;
        serialize_bytes(&[u8]) -> String;
        serialize_none() -> String;
        serialize_unit() -> String;
        serialize_unit_struct(&'static str) -> String;
        serialize_seq(Option<usize>) -> Self::SerializeSeq;
        serialize_tuple(usize) -> Self::SerializeTuple;
        serialize_tuple_struct(&'static str, usize) -> Self::SerializeTupleStruct;
        serialize_tuple_variant(&'static str, u32, &'static str, usize) -> Self::SerializeTupleVariant;
        serialize_map(Option<usize>) -> Self::SerializeMap;
        serialize_struct(&'static str, usize) -> Self::SerializeStruct;
        serialize_struct_variant(&'static str, u32, &'static str, usize) -> Self::SerializeStructVariant;
    }

    fn serialize_some<T>(self, _: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Err(bad_key())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, variant: &'static str) -> Result<String> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Err(bad_key())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: u8, h: u8 },
    }

    #[test]
    fn to_value_enum_variants() {
        assert_eq!(to_value(Shape::Dot).unwrap(), Value::from("Dot"));
        assert_eq!(
            to_value(Shape::Circle(1.5)).unwrap(),
            Value::from([("Circle", 1.5)])
        );
        assert_eq!(
            to_value(Shape::Rect { w: 1, h: 2 }).unwrap(),
            Value::from([("Rect", Value::from([("w", 1), ("h", 2)]))])
        );
    }

    #[test]
    fn to_value_integer_keys() {
        let map = HashMap::from([(1, "a")]);
        assert_eq!(to_value(map).unwrap(), Value::from([("1", "a")]));
    }

    #[test]
    fn to_value_rejects_float_keys() {
        let err = to_value(TupleMap(vec![(1.5, "a")])).unwrap_err();
        assert!(err.to_string().contains("map key must be"));
    }

    struct TupleMap(Vec<(f64, &'static str)>);

    impl Serialize for TupleMap {
        fn serialize<S: serde::Serializer>(
            &self,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
        }
    }

    #[test]
    fn to_value_u64_out_of_range() {
        assert!(to_value(u64::MAX).is_err());
    }
}
