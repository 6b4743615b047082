//! Serialize a Rust data structure into VICI message bytes.

use std::io;

use bytes::BufMut;
use serde::{ser, Serialize};

use crate::{
    error::{Error, ErrorCode, Result},
    ElementType,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum State {
    None,
    Key(FieldType),
    Value,
    ListItem(ListElement, Option<usize>),
}

/// A structure for serializing Rust values into VICI message bytes.
///
/// # Example
///
/// ```
/// use anyhow::Result;
/// use serde::Serialize;
/// use std::collections::BTreeMap;
///
/// fn main() -> Result<()> {
///     let mut buffer = Vec::new();
///     let mut ser = vici::Serializer::new(&mut buffer);
///
///     let mut object = BTreeMap::new();
///     object.insert("key1", "value1");
///     object.insert("key2", "value2");
///     object.serialize(&mut ser)?;
///
///     assert_eq!(
///         buffer,
///         vec![
///             3, 4, b'k', b'e', b'y', b'1', 0, 6, b'v', b'a', b'l', b'u', b'e', b'1',
///             3, 4, b'k', b'e', b'y', b'2', 0, 6, b'v', b'a', b'l', b'u', b'e', b'2',
///         ]
///     );
///     Ok(())
/// }
/// ```
pub struct Serializer<'a, W> {
    writer: &'a mut W,
    level: Option<usize>,
    state: State,
}

/// Serialize the given data structure as a VICI byte vector.
///
/// # Errors
/// Serialization can fail if `T`'s implementation of `Serialize` decides to
/// return an error, or if a key or value exceeds the width of its wire length
/// field.
pub fn to_vec<T: ?Sized>(value: &T) -> Result<Vec<u8>>
where
    T: ser::Serialize,
{
    let mut buf = vec![];
    let mut serializer = Serializer::new(&mut buf);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// Serialize the given data structure as VICI into the IO stream.
///
/// # Errors
/// Serialization can fail if `T`'s implementation of `Serialize` decides to
/// return an error, or if a key or value exceeds the width of its wire length
/// field.
pub fn to_writer<W, T: ?Sized>(writer: &mut W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ser::Serialize,
{
    let mut serializer = Serializer::new(writer);
    value.serialize(&mut serializer)?;
    Ok(())
}

impl<'a, W> Serializer<'a, W>
where
    W: io::Write,
{
    /// Creates a new VICI serializer.
    pub fn new(writer: &'a mut W) -> Self {
        let level = None;
        let state = State::None;
        Self { writer, level, state }
    }
}

macro_rules! serialize_integer {
    ($method:ident => $type:ident) => {
        #[inline]
        fn $method(self, v: $type) -> Result<Self::Ok> {
            let mut buf = itoa::Buffer::new();
            let s = buf.format(v);
            self.serialize_bytes(s.as_bytes())
        }
    };
}

macro_rules! serialize_float {
    ($method:ident => $type:ident) => {
        #[inline]
        fn $method(self, v: $type) -> Result<Self::Ok> {
            let mut buf = ryu::Buffer::new();
            let s = buf.format_finite(v);
            self.serialize_bytes(s.as_bytes())
        }
    };
}

impl<'a, 'se, W> ser::Serializer for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    #[inline]
    fn serialize_bool(self, v: bool) -> Result<Self::Ok> {
        let s = if v { b"yes" as &[u8] } else { b"no" as &[u8] };
        self.serialize_bytes(s)
    }

    serialize_integer!(serialize_i8 => i8);
    serialize_integer!(serialize_i16 => i16);
    serialize_integer!(serialize_i32 => i32);
    serialize_integer!(serialize_i64 => i64);
    serialize_integer!(serialize_u8 => u8);
    serialize_integer!(serialize_u16 => u16);
    serialize_integer!(serialize_u32 => u32);
    serialize_integer!(serialize_u64 => u64);
    serialize_float!(serialize_f32 => f32);
    serialize_float!(serialize_f64 => f64);

    #[inline]
    fn serialize_char(self, v: char) -> Result<Self::Ok> {
        let mut buffer = [0; 4];
        self.serialize_str(v.encode_utf8(&mut buffer))
    }

    #[inline]
    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        self.serialize_bytes(v.as_bytes())
    }

    #[inline]
    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        let mut buf = vec![];
        match self.state {
            State::None => {
                return Err(io::Error::from(io::ErrorKind::InvalidData).into());
            },
            State::Key(_) | State::ListItem(_, None) => {
                if v.is_empty() {
                    return Err(Error::new(ErrorCode::EmptyKey));
                }
                if v.len() > usize::from(u8::MAX) {
                    return Err(Error::new(ErrorCode::KeyTooLong(v.len())));
                }

                buf.put_u8(v.len() as u8);
                self.writer.write_all(&buf)?;
            },
            State::Value | State::ListItem(_, _) => {
                if v.len() > usize::from(u16::MAX) {
                    return Err(Error::new(ErrorCode::ValueTooLong(v.len())));
                }

                buf.put_u16(v.len() as u16);
                self.writer.write_all(&buf)?;
            },
        }

        self.writer.write_all(v)?;
        Ok(())
    }

    #[inline]
    fn serialize_none(self) -> Result<Self::Ok> {
        match self.state {
            State::None => {
                return Err(io::Error::from(io::ErrorKind::InvalidData).into());
            },
            State::Key(_) | State::ListItem(_, None) => {
                return Err(Error::new(ErrorCode::EmptyKey));
            },
            State::Value | State::ListItem(_, _) => {
                self.writer.write_all(&[0, 0])?;
            },
        }

        Ok(())
    }

    #[inline]
    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    #[inline]
    fn serialize_unit(self) -> Result<Self::Ok> {
        Ok(())
    }

    #[inline]
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok> {
        Ok(())
    }

    #[inline]
    fn serialize_unit_variant(self, _: &'static str, _: u32, value: &'static str) -> Result<Self::Ok> {
        value.serialize(self)
    }

    #[inline]
    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    #[inline]
    fn serialize_newtype_variant<T: ?Sized>(self, _: &'static str, _: u32, _: &'static str, value: &T) -> Result<Self::Ok>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    #[inline]
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(self)
    }

    #[inline]
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    #[inline]
    fn serialize_tuple_struct(self, _: &'static str, len: usize) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    #[inline]
    fn serialize_tuple_variant(self, _: &'static str, _: u32, _: &'static str, len: usize) -> Result<Self::SerializeTupleVariant> {
        self.serialize_seq(Some(len))
    }

    #[inline]
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        self.level = Some(self.level.map_or(1, |l| l + 1));
        Ok(self)
    }

    #[inline]
    fn serialize_struct(self, _: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }

    #[inline]
    fn serialize_struct_variant(self, _: &'static str, _: u32, _: &'static str, len: usize) -> Result<Self::SerializeStructVariant> {
        self.serialize_map(Some(len))
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeSeq for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        let mut buf = vec![];
        match self.state {
            State::ListItem(ListElement::String, o) => {
                buf.put_u8(ElementType::ListItem as u8);
                self.writer.write_all(&buf)?;

                self.state = State::ListItem(ListElement::String, Some(o.map_or(0, |n| n + 1)));
                value.serialize(&mut **self)?;
            },
            State::ListItem(ListElement::Section, o) => {
                buf.put_u8(ElementType::SectionStart as u8);
                self.writer.write_all(&buf)?;

                self.state = State::Key(FieldType::Section);
                let index = o.unwrap_or_default();
                index.serialize(&mut **self)?;

                self.state = State::ListItem(ListElement::Section, Some(index));
                value.serialize(&mut **self)?;

                self.state = State::ListItem(ListElement::Section, Some(index + 1));
            },
            _ => return Err(io::Error::from(io::ErrorKind::InvalidInput).into()),
        }

        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        let mut buf = vec![];
        match &self.state {
            State::ListItem(ListElement::String, _) => {
                buf.put_u8(ElementType::ListEnd as u8);
            },
            State::ListItem(ListElement::Section, _) => {
                buf.put_u8(ElementType::SectionEnd as u8);
            },
            _ => {},
        }
        self.writer.write_all(&buf)?;
        Ok(())
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeTuple for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeTupleStruct for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeTupleVariant for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeMap for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        let field = match self.state.clone() {
            State::Key(field) => field,
            _ => return Err(io::Error::from(io::ErrorKind::InvalidInput).into()),
        };

        let element = match field {
            FieldType::None => return Err(io::Error::from(io::ErrorKind::InvalidData).into()),
            FieldType::List(ListElement::Section) => {
                self.state = State::ListItem(ListElement::Section, None);
                ElementType::SectionStart
            },
            FieldType::List(ListElement::String) => {
                self.state = State::ListItem(ListElement::String, None);
                ElementType::ListStart
            },
            FieldType::Section => ElementType::SectionStart,
            FieldType::String => ElementType::KeyValue,
        };

        let mut buf = vec![];
        buf.put_u8(element as u8);
        self.writer.write_all(&buf)?;

        key.serialize(&mut **self)
    }

    #[inline]
    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut **self)
    }

    #[inline]
    fn serialize_entry<K: ?Sized, V: ?Sized>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: serde::Serialize,
        V: serde::Serialize,
    {
        self.state = State::Key(FieldType::from(value)?);
        self.serialize_key(key)?;

        match self.state {
            State::ListItem(_, _) => {},
            _ => {
                self.state = State::Value;
            },
        }
        self.serialize_value(value)?;

        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        self.level = match self.level {
            Some(level) if level > 1 => Some(level - 1),
            _ => return Ok(()),
        };

        let mut buf = vec![];
        buf.put_u8(ElementType::SectionEnd as u8);
        self.writer.write_all(&buf)?;

        Ok(())
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeStruct for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeMap::serialize_entry(self, key, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeMap::end(self)
    }
}

#[doc(hidden)]
impl<'a, 'se, W> ser::SerializeStructVariant for &'a mut Serializer<'se, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeMap::serialize_entry(self, key, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeMap::end(self)
    }
}

/// Wire shape of a field, probed before its key is written so that the right
/// element tag can be picked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum FieldType {
    None,
    String,
    Section,
    List(ListElement),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ListElement {
    String,
    Section,
}

impl FieldType {
    #[inline]
    pub fn from(s: impl Serialize) -> Result<Self> {
        let mut serializer = FieldTypeSerializer { item: None };
        s.serialize(&mut serializer)
    }
}

struct FieldTypeSerializer {
    item: Option<FieldType>,
}

impl<'a> ser::Serializer for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    #[inline]
    fn serialize_bool(self, _: bool) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_i8(self, _: i8) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_i16(self, _: i16) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_i32(self, _: i32) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_i64(self, _: i64) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_u8(self, _: u8) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_u16(self, _: u16) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_u32(self, _: u32) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_u64(self, _: u64) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_f32(self, _: f32) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_f64(self, _: f64) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_char(self, _: char) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_str(self, _: &str) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_bytes(self, _: &[u8]) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_none(self) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_unit(self) -> Result<Self::Ok> {
        Ok(FieldType::None)
    }

    #[inline]
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok> {
        Ok(FieldType::None)
    }

    #[inline]
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, _: &T) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_newtype_variant<T: ?Sized>(self, _: &'static str, _: u32, _: &'static str, _: &T) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }

    #[inline]
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(self)
    }

    #[inline]
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Ok(self)
    }

    #[inline]
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeTupleStruct> {
        Ok(self)
    }

    #[inline]
    fn serialize_tuple_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self::SerializeTupleVariant> {
        Ok(self)
    }

    #[inline]
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(self)
    }

    #[inline]
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    #[inline]
    fn serialize_struct_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self::SerializeStructVariant> {
        Ok(self)
    }

    #[inline]
    fn collect_str<T: ?Sized>(self, _: &T) -> Result<Self::Ok> {
        Ok(FieldType::String)
    }
}

impl<'a> ser::SerializeSeq for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        self.item = Some(value.serialize(&mut **self)?);
        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        match self.item {
            Some(FieldType::Section) => Ok(FieldType::List(ListElement::Section)),
            _ => Ok(FieldType::List(ListElement::String)),
        }
    }
}

impl<'a> ser::SerializeTuple for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeMap for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_key<T: ?Sized>(&mut self, _: &T) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn serialize_value<T: ?Sized>(&mut self, _: &T) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        Ok(FieldType::Section)
    }
}

impl<'a> ser::SerializeStruct for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, _: &'static str, _: &T) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        Ok(FieldType::Section)
    }
}

impl<'a> ser::SerializeStructVariant for &'a mut FieldTypeSerializer {
    type Ok = FieldType;
    type Error = Error;

    #[inline]
    fn serialize_field<T: ?Sized>(&mut self, _: &'static str, _: &T) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn end(self) -> Result<Self::Ok> {
        Ok(FieldType::Section)
    }
}
