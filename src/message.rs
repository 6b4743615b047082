//! An ordered, dynamically typed VICI message tree.
//!
//! [`Message`] is to this crate what `serde_json::Value` is to JSON: the type
//! to reach for when the shape of a payload is not known at compile time, or
//! when a response should be inspected key by key. It serializes and
//! deserializes through the same codec as typed payloads, so a `Message` can
//! stand anywhere a struct can.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{de, ser};

use crate::error::{Error, ErrorCode, Result};

/// A single message element: a scalar, a list of scalars, or a nested
/// section.
///
/// The three variants map one-to-one onto the wire element kinds. Scalars are
/// conceptually UTF-8 text; integers and booleans are carried in their string
/// forms (`"0"`, `"yes"`, `"no"`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
    Section(Message),
}

impl Value {
    /// Returns the scalar text, if this element is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list items, if this element is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the nested message, if this element is a section.
    pub fn as_section(&self) -> Option<&Message> {
        match self {
            Value::Section(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(if v { "yes" } else { "no" }.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::List(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Value {
    fn from(v: &[&str]) -> Self {
        Value::List(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Value::Section(v)
    }
}

macro_rules! value_from_integer {
    ($($type:ident)*) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    let mut buf = itoa::Buffer::new();
                    Value::Scalar(buf.format(v).to_string())
                }
            }
        )*
    };
}

value_from_integer!(i8 i16 i32 i64 u8 u16 u32 u64);

/// An ordered mapping from keys to scalars, lists, and nested sections.
///
/// Insertion order is part of a message's identity and is preserved through
/// encoding. Re-setting an existing key replaces its value without moving it.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), vici::Error> {
/// let mut msg = vici::Message::new();
/// msg.set("child", "test-CHILD_SA")?;
/// msg.set("ike", "test-IKE_SA")?;
///
/// assert_eq!(msg.get("child").and_then(|v| v.as_str()), Some("test-CHILD_SA"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    elements: IndexMap<String, Value>,
}

impl Message {
    /// Returns an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`. If the key already exists its value is
    /// replaced, but the ordering of the message does not change.
    ///
    /// # Errors
    /// Fails if the key is empty or longer than 255 bytes.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::new(ErrorCode::EmptyKey));
        }
        if key.len() > usize::from(u8::MAX) {
            return Err(Error::new(ErrorCode::KeyTooLong(key.len())));
        }

        self.elements.insert(key, value.into());
        Ok(())
    }

    /// Returns the value of the field identified by `key`, if it exists.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.elements.get(key)
    }

    /// Unsets the field identified by `key`, preserving the order of the
    /// remaining fields. There is no effect if the key does not exist.
    pub fn unset(&mut self, key: &str) {
        self.elements.shift_remove(key);
    }

    /// Returns the message keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    /// Iterates over all fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of fields in the message.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the message has no fields.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Examines a command response and determines whether it was successful.
    ///
    /// If the message carries no `success` field, or `success` is `"yes"`,
    /// the command succeeded. Otherwise an error is returned carrying the
    /// server's `errmsg` text.
    pub fn check(&self) -> Result<()> {
        match self.get("success").and_then(Value::as_str) {
            Some(success) if !success.eq_ignore_ascii_case("yes") => {
                let errmsg = self.get("errmsg").and_then(Value::as_str).unwrap_or_default();
                Err(Error::new(ErrorCode::CommandFailed(errmsg.to_string())))
            },
            _ => Ok(()),
        }
    }

    fn insert_unique(&mut self, key: String, value: Value) -> Result<()> {
        if self.elements.contains_key(&key) {
            return Err(Error::new(ErrorCode::DuplicateKey(key)));
        }

        self.elements.insert(key, value);
        Ok(())
    }

    fn fmt_indent(&self, f: &mut fmt::Formatter, prefix: &str, indent: &str) -> fmt::Result {
        writeln!(f, "{{")?;

        for (k, v) in self.iter() {
            match v {
                Value::Scalar(s) => writeln!(f, "{}{}{} = {}", prefix, indent, k, s)?,
                Value::List(l) => writeln!(f, "{}{}{} = {}", prefix, indent, k, l.join(","))?,
                Value::Section(m) => {
                    write!(f, "{}{}{} ", prefix, indent, k)?;
                    m.fmt_indent(f, &format!("{}{}", prefix, indent), indent)?;
                },
            }
        }

        writeln!(f, "{}}}", prefix)
    }
}

/// Formats the message similarly to the swanctl.conf configuration format.
impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_indent(f, "", "  ")
    }
}

/// Converts a serializable value into a [`Message`] tree.
///
/// The value must serialize as a map or struct at the top level; scalars,
/// string sequences, and nested maps become the corresponding message
/// elements.
pub fn to_message<T>(value: &T) -> Result<Message>
where
    T: ser::Serialize,
{
    crate::from_slice(&crate::to_vec(value)?)
}

/// Converts a [`Message`] tree into a deserializable value.
pub fn from_message<T>(msg: &Message) -> Result<T>
where
    T: de::DeserializeOwned,
{
    crate::from_slice(&crate::to_vec(msg)?)
}

impl ser::Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        use ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.elements.len()))?;
        for (k, v) in &self.elements {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::List(l) => {
                use ser::SerializeSeq;

                let mut seq = serializer.serialize_seq(Some(l.len()))?;
                for item in l {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Value::Section(m) => ser::Serialize::serialize(m, serializer),
        }
    }
}

impl<'de> de::Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct MessageVisitor;

        impl<'de> de::Visitor<'de> for MessageVisitor {
            type Value = Message;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a VICI section")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut msg = Message::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    msg.insert_unique(key, value).map_err(de::Error::custom)?;
                }

                Ok(msg)
            }
        }

        deserializer.deserialize_map(MessageVisitor)
    }
}

impl<'de> de::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a VICI scalar, list, or section")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Value::Scalar(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Value::Scalar(v))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                match std::str::from_utf8(v) {
                    Ok(s) => Ok(Value::Scalar(s.to_string())),
                    Err(_) => Err(de::Error::invalid_value(de::Unexpected::Bytes(v), &self)),
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut list = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    list.push(item);
                }

                Ok(Value::List(list))
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut msg = Message::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    msg.insert_unique(key, value).map_err(de::Error::custom)?;
                }

                Ok(Value::Section(msg))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_derive::{Deserialize, Serialize};

    use super::*;
    use crate::{from_slice, to_vec};

    fn example_message() -> Message {
        let mut sub_section = Message::new();
        sub_section.set("key2", "value2").unwrap();

        let mut section1 = Message::new();
        section1.set("sub-section", sub_section).unwrap();
        section1.set("list1", vec!["item1", "item2"]).unwrap();

        let mut msg = Message::new();
        msg.set("key1", "value1").unwrap();
        msg.set("section1", section1).unwrap();

        msg
    }

    #[rustfmt::skip]
    const EXAMPLE_BYTES: &[u8] = &[
        // key1 = value1
        3, 4, b'k', b'e', b'y', b'1', 0, 6, b'v', b'a', b'l', b'u', b'e', b'1',
        // section1
        1, 8, b's', b'e', b'c', b't', b'i', b'o', b'n', b'1',
        // sub-section
        1, 11, b's', b'u', b'b', b'-', b's', b'e', b'c', b't', b'i', b'o', b'n',
        // key2 = value2
        3, 4, b'k', b'e', b'y', b'2', 0, 6, b'v', b'a', b'l', b'u', b'e', b'2',
        // sub-section end
        2,
        // list1
        4, 5, b'l', b'i', b's', b't', b'1',
        // item1
        5, 0, 5, b'i', b't', b'e', b'm', b'1',
        // item2
        5, 0, 5, b'i', b't', b'e', b'm', b'2',
        // list1 end
        6,
        // section1 end
        2,
    ];

    #[test]
    fn encode_example() {
        assert_eq!(to_vec(&example_message()).unwrap(), EXAMPLE_BYTES);
    }

    #[test]
    fn round_trip_example() {
        let decoded: Message = from_slice(EXAMPLE_BYTES).unwrap();
        assert_eq!(decoded, example_message());
        assert_eq!(to_vec(&decoded).unwrap(), EXAMPLE_BYTES);
    }

    #[test]
    fn set_existing_key_keeps_position() {
        let mut msg = Message::new();
        msg.set("first", "1").unwrap();
        msg.set("second", "2").unwrap();
        msg.set("third", "3").unwrap();

        msg.set("second", "two").unwrap();

        let keys: Vec<_> = msg.keys().collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
        assert_eq!(msg.get("second").and_then(Value::as_str), Some("two"));
    }

    #[test]
    fn unset_preserves_order() {
        let mut msg = Message::new();
        msg.set("first", "1").unwrap();
        msg.set("second", "2").unwrap();
        msg.set("third", "3").unwrap();

        msg.unset("second");
        msg.unset("no-such-key");

        let keys: Vec<_> = msg.keys().collect();
        assert_eq!(keys, vec!["first", "third"]);
    }

    #[test]
    fn set_rejects_bad_keys() {
        let mut msg = Message::new();
        assert!(msg.set("", "value").unwrap_err().is_data());
        assert!(msg.set("k".repeat(256), "value").unwrap_err().is_size());
    }

    #[test]
    fn set_converts_scalars() {
        let mut msg = Message::new();
        msg.set("count", 0u32).unwrap();
        msg.set("delta", -7i32).unwrap();
        msg.set("enabled", true).unwrap();
        msg.set("disabled", false).unwrap();

        assert_eq!(msg.get("count").and_then(Value::as_str), Some("0"));
        assert_eq!(msg.get("delta").and_then(Value::as_str), Some("-7"));
        assert_eq!(msg.get("enabled").and_then(Value::as_str), Some("yes"));
        assert_eq!(msg.get("disabled").and_then(Value::as_str), Some("no"));
    }

    #[test]
    fn decode_rejects_duplicate_key() {
        #[rustfmt::skip]
        let data: &[_] = &[
            3, 4, b'k', b'e', b'y', b'1', 0, 1, b'a',
            3, 4, b'k', b'e', b'y', b'1', 0, 1, b'b',
        ];

        let err = from_slice::<Message>(data).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn check_success() {
        let mut msg = Message::new();
        msg.set("success", "yes").unwrap();
        assert!(msg.check().is_ok());

        // A message without a success field is not a failure.
        assert!(Message::new().check().is_ok());

        let mut msg = Message::new();
        msg.set("success", "no").unwrap();
        msg.set("errmsg", "failed to install CHILD_SA").unwrap();

        let err = msg.check().unwrap_err();
        assert!(err.is_command_failed());
        assert_eq!(err.to_string(), "command failed: failed to install CHILD_SA");
    }

    #[test]
    fn to_message_from_message_inverse() {
        #[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
        struct Conn {
            name: String,
            version: u32,
            mobike: bool,
            local_addrs: Vec<String>,
            children: Children,
        }

        #[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
        struct Children {
            esp_proposals: Vec<String>,
        }

        let conn = Conn {
            name: "gw-gw".to_string(),
            version: 2,
            mobike: false,
            local_addrs: vec!["192.0.2.1".to_string()],
            children: Children {
                esp_proposals: vec!["aes128gcm128".to_string()],
            },
        };

        let msg = to_message(&conn).unwrap();
        assert_eq!(msg.get("version").and_then(Value::as_str), Some("2"));
        assert_eq!(msg.get("mobike").and_then(Value::as_str), Some("no"));

        let back: Conn = from_message(&msg).unwrap();
        assert_eq!(back, conn);
    }

    #[test]
    fn display_swanctl_style() {
        let expected = "{\n  key1 = value1\n  section1 {\n    sub-section {\n      key2 = value2\n    }\n    list1 = item1,item2\n  }\n}\n";
        assert_eq!(example_message().to_string(), expected);
    }
}
