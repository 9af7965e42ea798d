//! Schema-driven packing and unpacking of instruction arguments and account fields.
//!
//! The wire format is the program's native one:
//! - Fixed-width integers are little-endian.
//! - Strings are a little-endian `u32` byte length followed by UTF-8 bytes.
//! - Lists are a little-endian `u32` element count followed by each element.
//! - Options are a `0` tag for `None`, or a `1` tag followed by the value.

use solana_address::Address;

use crate::{
    descriptor::{
        Field,
        FieldType,
    },
    error::CodecError,
};

const U32_SIZE: usize = core::mem::size_of::<u32>();
const ADDRESS_SIZE: usize = 32;

/// A dynamically typed argument or account field value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    U8(u8),
    I64(i64),
    U64(u64),
    Pubkey(Address),
    String(String),
    Vec(Vec<Value>),
    Option(Option<Box<Value>>),
}

impl Value {
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_pubkey(&self) -> Option<Address> {
        match self {
            Value::Pubkey(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Vec(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_option(&self) -> Option<Option<&Value>> {
        match self {
            Value::Option(v) => Some(v.as_deref()),
            _ => None,
        }
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U8(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Pubkey(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Vec(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        Value::Option(value.map(|v| Box::new(v.into())))
    }
}

/// Packs `args` in declaration order, checking the count and every value's type against `fields`.
pub fn pack_args(fields: &[Field], args: &[Value], dst: &mut Vec<u8>) -> Result<(), CodecError> {
    if fields.len() != args.len() {
        return Err(CodecError::SchemaMismatch);
    }
    for (field, arg) in fields.iter().zip(args) {
        pack_value(&field.ty, arg, dst)?;
    }
    Ok(())
}

/// Appends the encoding of `value` to `dst`, failing with [`CodecError::SchemaMismatch`] if
/// `value` isn't of type `ty`.
pub fn pack_value(ty: &FieldType, value: &Value, dst: &mut Vec<u8>) -> Result<(), CodecError> {
    match (ty, value) {
        (FieldType::U8, Value::U8(v)) => dst.push(*v),
        (FieldType::I64, Value::I64(v)) => dst.extend_from_slice(&v.to_le_bytes()),
        (FieldType::U64, Value::U64(v)) => dst.extend_from_slice(&v.to_le_bytes()),
        (FieldType::Pubkey, Value::Pubkey(v)) => dst.extend_from_slice(v.as_ref()),
        (FieldType::String, Value::String(v)) => {
            pack_len(v.len(), dst)?;
            dst.extend_from_slice(v.as_bytes());
        }
        (FieldType::Vec(inner), Value::Vec(values)) => {
            pack_len(values.len(), dst)?;
            for v in values {
                pack_value(inner, v, dst)?;
            }
        }
        (FieldType::Option(_), Value::Option(None)) => dst.push(0),
        (FieldType::Option(inner), Value::Option(Some(v))) => {
            dst.push(1);
            pack_value(inner, v, dst)?;
        }
        _ => return Err(CodecError::SchemaMismatch),
    }
    Ok(())
}

fn pack_len(len: usize, dst: &mut Vec<u8>) -> Result<(), CodecError> {
    let len = u32::try_from(len).or(Err(CodecError::SchemaMismatch))?;
    dst.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// A forward-only cursor over raw bytes that unpacks values by schema.
pub struct Unpacker<'a> {
    remaining: &'a [u8],
}

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { remaining: data }
    }

    /// The bytes that haven't been consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining.len() < len {
            return Err(CodecError::TruncatedData);
        }
        let (head, tail) = self.remaining.split_at(len);
        self.remaining = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.take(N)?
            .try_into()
            .or(Err(CodecError::TruncatedData))
    }

    fn take_len(&mut self) -> Result<usize, CodecError> {
        Ok(u32::from_le_bytes(self.take_array::<U32_SIZE>()?) as usize)
    }

    pub fn unpack(&mut self, ty: &FieldType) -> Result<Value, CodecError> {
        let value = match ty {
            FieldType::U8 => Value::U8(self.take_array::<1>()?[0]),
            FieldType::I64 => Value::I64(i64::from_le_bytes(self.take_array()?)),
            FieldType::U64 => Value::U64(u64::from_le_bytes(self.take_array()?)),
            FieldType::Pubkey => {
                Value::Pubkey(Address::new_from_array(self.take_array::<ADDRESS_SIZE>()?))
            }
            FieldType::String => {
                let len = self.take_len()?;
                let bytes = self.take(len)?;
                let s = core::str::from_utf8(bytes).or(Err(CodecError::InvalidData))?;
                Value::String(s.to_string())
            }
            FieldType::Vec(inner) => {
                let count = self.take_len()?;
                // Each element takes at least one byte, so the count can't exceed what's left.
                if count > self.remaining.len() {
                    return Err(CodecError::TruncatedData);
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(self.unpack(inner)?);
                }
                Value::Vec(values)
            }
            FieldType::Option(inner) => match self.take_array::<1>()?[0] {
                0 => Value::Option(None),
                1 => Value::Option(Some(Box::new(self.unpack(inner)?))),
                _ => return Err(CodecError::InvalidData),
            },
        };
        Ok(value)
    }
}

/// Unpacks every field in `fields` from the front of `data`, in order.
///
/// Trailing bytes past the last field are ignored; accounts are usually allocated with more space
/// than their current contents need.
pub fn unpack_fields(
    fields: &[Field],
    data: &[u8],
) -> Result<Vec<(&'static str, Value)>, CodecError> {
    let mut unpacker = Unpacker::new(data);
    fields
        .iter()
        .map(|field| Ok((field.name, unpacker.unpack(&field.ty)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: FieldType = FieldType::Vec(&FieldType::String);
    const WINNER: FieldType = FieldType::Option(&FieldType::U8);

    fn packed(ty: &FieldType, value: &Value) -> Vec<u8> {
        let mut dst = vec![];
        pack_value(ty, value, &mut dst).unwrap();
        dst
    }

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(packed(&FieldType::U8, &7u8.into()), [7]);
        assert_eq!(
            packed(&FieldType::I64, &(-2i64).into()),
            [0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            packed(&FieldType::U64, &0x0102u64.into()),
            [0x02, 0x01, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn strings_and_lists_are_length_prefixed() {
        assert_eq!(
            packed(&FieldType::String, &"Yes".into()),
            [3, 0, 0, 0, b'Y', b'e', b's']
        );
        assert_eq!(
            packed(&OPTIONS, &vec!["Yes", "No"].into()),
            [2, 0, 0, 0, 3, 0, 0, 0, b'Y', b'e', b's', 2, 0, 0, 0, b'N', b'o']
        );
        assert_eq!(packed(&OPTIONS, &Vec::<String>::new().into()), [0, 0, 0, 0]);
    }

    #[test]
    fn options_are_tagged() {
        assert_eq!(packed(&WINNER, &None::<u8>.into()), [0]);
        assert_eq!(packed(&WINNER, &Some(2u8).into()), [1, 2]);
    }

    #[test]
    fn wrong_type_is_a_schema_mismatch() {
        let mut dst = vec![];
        assert_eq!(
            pack_value(&FieldType::U8, &5u64.into(), &mut dst),
            Err(CodecError::SchemaMismatch)
        );
        assert_eq!(
            pack_value(&OPTIONS, &vec![1u8].into(), &mut dst),
            Err(CodecError::SchemaMismatch)
        );
    }

    #[test]
    fn wrong_arg_count_is_a_schema_mismatch() {
        let fields = [Field {
            name: "option_index",
            ty: FieldType::U8,
        }];
        let mut dst = vec![];
        assert_eq!(
            pack_args(&fields, &[], &mut dst),
            Err(CodecError::SchemaMismatch)
        );
        assert_eq!(
            pack_args(&fields, &[1u8.into(), 2u8.into()], &mut dst),
            Err(CodecError::SchemaMismatch)
        );
        assert!(dst.is_empty());
    }

    #[test]
    fn unpack_reads_in_order_and_ignores_padding() {
        let fields = [
            Field {
                name: "options",
                ty: OPTIONS,
            },
            Field {
                name: "winner_index",
                ty: WINNER,
            },
        ];
        let mut data = packed(&OPTIONS, &vec!["A", "B"].into());
        data.extend([1, 1]);
        data.extend([0; 16]);

        let unpacked = unpack_fields(&fields, &data).unwrap();
        assert_eq!(unpacked[0], ("options", vec!["A", "B"].into()));
        assert_eq!(unpacked[1], ("winner_index", Some(1u8).into()));
    }

    #[test]
    fn short_data_is_truncated() {
        let mut unpacker = Unpacker::new(&[3, 0, 0, 0, b'Y', b'e']);
        assert_eq!(
            unpacker.unpack(&FieldType::String),
            Err(CodecError::TruncatedData)
        );
        assert_eq!(
            Unpacker::new(&[1, 2, 3]).unpack(&FieldType::U64),
            Err(CodecError::TruncatedData)
        );
        // A list count far larger than the bytes left.
        assert_eq!(
            Unpacker::new(&[0xff, 0xff, 0xff, 0xff, 0]).unpack(&OPTIONS),
            Err(CodecError::TruncatedData)
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            Unpacker::new(&[2, 0]).unpack(&WINNER),
            Err(CodecError::InvalidData)
        );
        assert_eq!(
            Unpacker::new(&[2, 0, 0, 0, 0xc3, 0x28]).unpack(&FieldType::String),
            Err(CodecError::InvalidData)
        );
    }
}
