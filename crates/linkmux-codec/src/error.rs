/// Errors that can occur while packing or unpacking payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The number of values does not match the schema's field count.
    #[error("value count mismatch (schema has {expected} fields, got {actual} values)")]
    ValueCount { expected: usize, actual: usize },

    /// A value's variant does not match the field at the same position.
    #[error("type mismatch at field {index} (expected {expected})")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
    },

    /// An integer value does not fit the field's width.
    #[error("value out of range at field {index} (field {field})")]
    ValueOutOfRange {
        index: usize,
        field: &'static str,
    },

    /// The byte sequence length does not match the schema's total width.
    #[error("payload width mismatch (schema is {expected} bytes, got {actual})")]
    WidthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
