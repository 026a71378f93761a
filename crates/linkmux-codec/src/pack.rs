use bytes::{Buf, BufMut, Bytes, BytesMut};
use half::f16;

use crate::error::{CodecError, Result};
use crate::schema::{ByteOrder, Field, Schema};
use crate::value::Value;

/// Pack values into a fixed-width byte sequence per the schema.
///
/// Fails if the value count or any value's type does not match the schema,
/// or if an integer value does not fit its field's width.
pub fn pack(schema: &Schema, values: &[Value]) -> Result<Bytes> {
    if values.len() != schema.len() {
        return Err(CodecError::ValueCount {
            expected: schema.len(),
            actual: values.len(),
        });
    }

    let mut buf = BytesMut::with_capacity(schema.width());
    for (index, (field, value)) in schema.fields().iter().zip(values).enumerate() {
        pack_field(&mut buf, schema.byte_order(), *field, *value, index)?;
    }
    Ok(buf.freeze())
}

/// Unpack a byte sequence into values per the schema.
///
/// Fails if the sequence length does not equal the schema's total width.
pub fn unpack(schema: &Schema, bytes: &[u8]) -> Result<Vec<Value>> {
    if bytes.len() != schema.width() {
        return Err(CodecError::WidthMismatch {
            expected: schema.width(),
            actual: bytes.len(),
        });
    }

    let mut buf = bytes;
    let mut values = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        values.push(unpack_field(&mut buf, schema.byte_order(), *field));
    }
    Ok(values)
}

fn pack_field(
    buf: &mut BytesMut,
    order: ByteOrder,
    field: Field,
    value: Value,
    index: usize,
) -> Result<()> {
    let out_of_range = |_| CodecError::ValueOutOfRange {
        index,
        field: field.name(),
    };
    let mismatch = CodecError::TypeMismatch {
        index,
        expected: field.name(),
    };

    match field {
        Field::I8 => {
            let v = value.as_int().ok_or(mismatch)?;
            buf.put_i8(i8::try_from(v).map_err(out_of_range)?);
        }
        Field::I16 => {
            let v = i16::try_from(value.as_int().ok_or(mismatch)?).map_err(out_of_range)?;
            match order {
                ByteOrder::Little => buf.put_i16_le(v),
                ByteOrder::Big => buf.put_i16(v),
            }
        }
        Field::I32 => {
            let v = i32::try_from(value.as_int().ok_or(mismatch)?).map_err(out_of_range)?;
            match order {
                ByteOrder::Little => buf.put_i32_le(v),
                ByteOrder::Big => buf.put_i32(v),
            }
        }
        Field::I64 => {
            let v = value.as_int().ok_or(mismatch)?;
            match order {
                ByteOrder::Little => buf.put_i64_le(v),
                ByteOrder::Big => buf.put_i64(v),
            }
        }
        Field::U8 => {
            let v = value.as_uint().ok_or(mismatch)?;
            buf.put_u8(u8::try_from(v).map_err(out_of_range)?);
        }
        Field::U16 => {
            let v = u16::try_from(value.as_uint().ok_or(mismatch)?).map_err(out_of_range)?;
            match order {
                ByteOrder::Little => buf.put_u16_le(v),
                ByteOrder::Big => buf.put_u16(v),
            }
        }
        Field::U32 => {
            let v = u32::try_from(value.as_uint().ok_or(mismatch)?).map_err(out_of_range)?;
            match order {
                ByteOrder::Little => buf.put_u32_le(v),
                ByteOrder::Big => buf.put_u32(v),
            }
        }
        Field::U64 => {
            let v = value.as_uint().ok_or(mismatch)?;
            match order {
                ByteOrder::Little => buf.put_u64_le(v),
                ByteOrder::Big => buf.put_u64(v),
            }
        }
        Field::F16 => {
            let v = f16::from_f64(value.as_float().ok_or(mismatch)?);
            match order {
                ByteOrder::Little => buf.put_u16_le(v.to_bits()),
                ByteOrder::Big => buf.put_u16(v.to_bits()),
            }
        }
        Field::F32 => {
            let v = value.as_float().ok_or(mismatch)? as f32;
            match order {
                ByteOrder::Little => buf.put_f32_le(v),
                ByteOrder::Big => buf.put_f32(v),
            }
        }
        Field::F64 => {
            let v = value.as_float().ok_or(mismatch)?;
            match order {
                ByteOrder::Little => buf.put_f64_le(v),
                ByteOrder::Big => buf.put_f64(v),
            }
        }
        Field::Bool => {
            let v = value.as_bool().ok_or(mismatch)?;
            buf.put_u8(v as u8);
        }
    }
    Ok(())
}

fn unpack_field(buf: &mut &[u8], order: ByteOrder, field: Field) -> Value {
    match field {
        Field::I8 => Value::Int(buf.get_i8() as i64),
        Field::I16 => Value::Int(match order {
            ByteOrder::Little => buf.get_i16_le() as i64,
            ByteOrder::Big => buf.get_i16() as i64,
        }),
        Field::I32 => Value::Int(match order {
            ByteOrder::Little => buf.get_i32_le() as i64,
            ByteOrder::Big => buf.get_i32() as i64,
        }),
        Field::I64 => Value::Int(match order {
            ByteOrder::Little => buf.get_i64_le(),
            ByteOrder::Big => buf.get_i64(),
        }),
        Field::U8 => Value::UInt(buf.get_u8() as u64),
        Field::U16 => Value::UInt(match order {
            ByteOrder::Little => buf.get_u16_le() as u64,
            ByteOrder::Big => buf.get_u16() as u64,
        }),
        Field::U32 => Value::UInt(match order {
            ByteOrder::Little => buf.get_u32_le() as u64,
            ByteOrder::Big => buf.get_u32() as u64,
        }),
        Field::U64 => Value::UInt(match order {
            ByteOrder::Little => buf.get_u64_le(),
            ByteOrder::Big => buf.get_u64(),
        }),
        Field::F16 => {
            let bits = match order {
                ByteOrder::Little => buf.get_u16_le(),
                ByteOrder::Big => buf.get_u16(),
            };
            Value::Float(f16::from_bits(bits).to_f64())
        }
        Field::F32 => Value::Float(match order {
            ByteOrder::Little => buf.get_f32_le() as f64,
            ByteOrder::Big => buf.get_f32() as f64,
        }),
        Field::F64 => Value::Float(match order {
            ByteOrder::Little => buf.get_f64_le(),
            ByteOrder::Big => buf.get_f64(),
        }),
        Field::Bool => Value::Bool(buf.get_u8() != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_field_schema(order: ByteOrder) -> (Schema, Vec<Value>) {
        let schema = Schema::new(
            [
                Field::I8,
                Field::I16,
                Field::I32,
                Field::I64,
                Field::U8,
                Field::U16,
                Field::U32,
                Field::U64,
                Field::F32,
                Field::F64,
                Field::Bool,
            ],
            order,
        );
        let values = vec![
            Value::Int(-5),
            Value::Int(-1000),
            Value::Int(123_456),
            Value::Int(-9_000_000_000),
            Value::UInt(200),
            Value::UInt(50_000),
            Value::UInt(4_000_000_000),
            Value::UInt(u64::MAX),
            Value::Float(1.5),
            Value::Float(-2.25),
            Value::Bool(true),
        ];
        (schema, values)
    }

    #[test]
    fn roundtrip_little_endian() {
        let (schema, values) = every_field_schema(ByteOrder::Little);
        let bytes = pack(&schema, &values).unwrap();
        assert_eq!(bytes.len(), schema.width());
        assert_eq!(unpack(&schema, &bytes).unwrap(), values);
    }

    #[test]
    fn roundtrip_big_endian() {
        let (schema, values) = every_field_schema(ByteOrder::Big);
        let bytes = pack(&schema, &values).unwrap();
        assert_eq!(unpack(&schema, &bytes).unwrap(), values);
    }

    #[test]
    fn f16_roundtrips_representable_values() {
        let schema = Schema::new([Field::F16], ByteOrder::Little);
        for v in [0.0, 1.0, -0.5, 65504.0] {
            let bytes = pack(&schema, &[Value::Float(v)]).unwrap();
            assert_eq!(bytes.len(), 2);
            assert_eq!(unpack(&schema, &bytes).unwrap()[0], Value::Float(v));
        }
    }

    #[test]
    fn endianness_changes_wire_bytes() {
        let schema_le = Schema::new([Field::U16], ByteOrder::Little);
        let schema_be = Schema::new([Field::U16], ByteOrder::Big);
        let le = pack(&schema_le, &[Value::UInt(0x1234)]).unwrap();
        let be = pack(&schema_be, &[Value::UInt(0x1234)]).unwrap();
        assert_eq!(le.as_ref(), [0x34, 0x12]);
        assert_eq!(be.as_ref(), [0x12, 0x34]);
    }

    #[test]
    fn value_count_mismatch_rejected() {
        let schema = Schema::new([Field::U8, Field::U8], ByteOrder::Little);
        let err = pack(&schema, &[Value::UInt(1)]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ValueCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn type_mismatch_rejected() {
        let schema = Schema::new([Field::F32], ByteOrder::Little);
        let err = pack(&schema, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn narrow_field_rejects_wide_value() {
        let schema = Schema::new([Field::I8], ByteOrder::Little);
        let err = pack(&schema, &[Value::Int(300)]).unwrap_err();
        assert!(matches!(err, CodecError::ValueOutOfRange { index: 0, .. }));
    }

    #[test]
    fn unpack_rejects_wrong_width() {
        let schema = Schema::new([Field::U32], ByteOrder::Little);
        let err = unpack(&schema, &[0x01, 0x02]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::WidthMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        let schema = Schema::new([Field::Bool], ByteOrder::Little);
        assert_eq!(unpack(&schema, &[0x00]).unwrap()[0], Value::Bool(false));
        assert_eq!(unpack(&schema, &[0x07]).unwrap()[0], Value::Bool(true));
    }
}
