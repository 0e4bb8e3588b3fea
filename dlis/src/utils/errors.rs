use crate::structs::value::ObjectName;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("Unexpected end of file: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ArenaError {
    #[error("Unable to reserve initial pool chunk of {capacity} elements")]
    Reserve { capacity: usize },

    #[error("Unable to allocate a {len}-byte frame buffer")]
    FrameBuffer { len: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum LabelError {
    #[error("Unsupported DLIS version in storage unit label: {0:?}")]
    UnsupportedVersion(String),

    #[error("Unsupported storage unit structure: {0:?}")]
    UnsupportedStructure(String),

    #[error("Visible record length {0} is shorter than its header")]
    VisibleRecordTooShort(u16),

    #[error("Unexpected visible record format marker {0:#04X}")]
    VisibleRecordFormat(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum SegmentError {
    #[error("Visible record ends inside a segment header ({0} bytes left)")]
    HeaderOverrun(usize),

    #[error("Segment length {length} exceeds the {available} bytes left in the visible record")]
    LengthOverrun { length: u16, available: usize },

    #[error("Segment length {length} is too short for its header and trailers")]
    TrailerOverrun { length: u16 },

    #[error("Padding of {pad} bytes exceeds the {available} byte segment body")]
    PaddingOverrun { pad: u8, available: usize },

    #[error("Logical record starts with a continuation segment")]
    UnexpectedContinuation,

    #[error("Segment without predecessor flag inside a logical record")]
    BrokenRecord,

    #[error("Read of {needed} bytes runs past the end of the logical record")]
    RecordOverrun { needed: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ComponentError {
    #[error("Reserved component role in descriptor {0:#04X}")]
    ReservedRole(u8),

    #[error("Object component outside of a set")]
    ObjectWithoutSet,

    #[error("Attribute component outside of a set")]
    AttributeWithoutSet,

    #[error("Object {object} has more attributes than the {columns} template columns")]
    TooManyAttributes { object: ObjectName, columns: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ValueError {
    #[error("Attribute {0:?} has an undefined representation code")]
    UndefinedCode(String),

    #[error("Expected {expected} bytes for {code}, got {actual}")]
    WidthMismatch {
        code: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Representation code {0} has no fixed width")]
    NotFixed(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("No {0} set in the current logical file")]
    MissingSet(&'static str),

    #[error("Frame {0} is not defined")]
    MissingFrame(ObjectName),

    #[error("Object {object} has no {label} attribute")]
    MissingAttribute { object: ObjectName, label: &'static str },

    #[error("Channel {0} is not defined")]
    MissingChannel(ObjectName),

    #[error("Frame {0} lists a channel reference that is not an object name")]
    InvalidChannelReference(ObjectName),

    #[error("Channel {channel} has invalid {label} value")]
    InvalidAttribute {
        channel: ObjectName,
        label: &'static str,
    },

    #[error("Channel {channel} uses representation code {code} which has no fixed width")]
    VariableWidthChannel {
        channel: ObjectName,
        code: &'static str,
    },
}

/// Coarse error taxonomy for callers deciding whether to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Io,
    Format,
    Schema,
    Arena,
}

/// Classifies an error by the first typed error found in its chain.
pub fn error_class(err: &anyhow::Error) -> ErrorClass {
    for cause in err.chain() {
        if cause.is::<ReadError>() || cause.is::<std::io::Error>() {
            return ErrorClass::Io;
        }
        if cause.is::<SchemaError>() {
            return ErrorClass::Schema;
        }
        if cause.is::<ArenaError>() {
            return ErrorClass::Arena;
        }
        if cause.is::<LabelError>()
            || cause.is::<SegmentError>()
            || cause.is::<ComponentError>()
            || cause.is::<ValueError>()
        {
            return ErrorClass::Format;
        }
    }

    ErrorClass::Format
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn classifies_through_context() {
        let err = Err::<(), _>(anyhow!(ReadError::Truncated {
            needed: 4,
            available: 1
        }))
        .context("logical record 3")
        .unwrap_err();
        assert_eq!(error_class(&err), ErrorClass::Io);

        let err = anyhow!(SchemaError::MissingSet("FRAME"));
        assert_eq!(error_class(&err), ErrorClass::Schema);

        let err = anyhow!(ComponentError::ReservedRole(0x80));
        assert_eq!(error_class(&err), ErrorClass::Format);
    }
}
