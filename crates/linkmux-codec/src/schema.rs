/// Byte order of every field in a schema.
///
/// Mixed-endian layouts are not supported; controllers that interleave byte
/// orders need two schemas and two reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// One primitive field in a packed record.
///
/// The variant fixes both the kind and the width, so a schema is fully
/// validated by construction — there is no format string to re-parse per
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    /// IEEE 754 binary16.
    F16,
    F32,
    F64,
    /// One byte; zero is `false`, anything else is `true`.
    Bool,
}

impl Field {
    /// Wire width of this field in bytes.
    pub fn width(&self) -> usize {
        match self {
            Field::I8 | Field::U8 | Field::Bool => 1,
            Field::I16 | Field::U16 | Field::F16 => 2,
            Field::I32 | Field::U32 | Field::F32 => 4,
            Field::I64 | Field::U64 | Field::F64 => 8,
        }
    }

    /// Field name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Field::I8 => "i8",
            Field::I16 => "i16",
            Field::I32 => "i32",
            Field::I64 => "i64",
            Field::U8 => "u8",
            Field::U16 => "u16",
            Field::U32 => "u32",
            Field::U64 => "u64",
            Field::F16 => "f16",
            Field::F32 => "f32",
            Field::F64 => "f64",
            Field::Bool => "bool",
        }
    }
}

/// An ordered list of primitive fields with one byte order.
///
/// The total wire width is fixed and known up front, which lets callers
/// validate a layout against a transport's payload limit before any
/// connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
    byte_order: ByteOrder,
}

impl Schema {
    /// Create a schema from an ordered field list.
    pub fn new(fields: impl Into<Vec<Field>>, byte_order: ByteOrder) -> Self {
        Self {
            fields: fields.into(),
            byte_order,
        }
    }

    /// Create a schema of `count` identical fields.
    ///
    /// Sensor records are commonly homogeneous (e.g. six f32 axes).
    pub fn repeated(field: Field, count: usize, byte_order: ByteOrder) -> Self {
        Self {
            fields: vec![field; count],
            byte_order,
        }
    }

    /// Total wire width in bytes.
    pub fn width(&self) -> usize {
        self.fields.iter().map(Field::width).sum()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The ordered field list.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The schema's byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}
