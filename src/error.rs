//! Error types shared by the parser, the interpreter and the native bridge.
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// `ErrorKind` groups errors by the stage and failure class that produced
/// them, so callers can match on the category without caring about the
/// variant details.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    MalformedClassFile,
    UnsupportedClassFeature,
    ConstantPoolTypeMismatch,
    StackUnderflow,
    OperandTypeMismatch,
    UnsupportedInstruction,
    NativeLookupFailure,
    MethodNotFound,
    InvalidDescriptor,
}

/// `Error` represents every way parsing a class file or executing one of its
/// methods can fail. All of them are terminal for the current parse or
/// invocation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "unexpected end of buffer at offset {offset}: needed {needed} bytes, {remaining} remaining"
    )]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("bad magic 0x{found:08x}, expected 0xcafebabe")]
    BadMagic { found: u32 },

    #[error("constant pool count must be at least 1")]
    EmptyConstantPool,

    #[error("unknown constant pool tag {tag} at index #{index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("{what} declares {declared} bytes at offset {offset} but only {remaining} remain")]
    LengthExceedsBuffer {
        what: &'static str,
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    #[error("constant pool index #{index} is out of range (pool has {count} slots)")]
    InvalidConstantIndex { index: u16, count: u16 },

    #[error("unsupported class file feature: {count} {what} entries are not decoded")]
    UnsupportedClassFeature { what: &'static str, count: u16 },

    #[error("constant pool entry #{index} is {found}, expected {expected}")]
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("operand stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },

    #[error("operand type mismatch: expected {expected}, found {found}")]
    OperandTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unsupported instruction 0x{opcode:02x}{} at pc {pc}", describe_mnemonic(.mnemonic))]
    UnsupportedInstruction {
        opcode: u8,
        mnemonic: Option<&'static str>,
        pc: usize,
    },

    #[error("no native binding for {class}.{member}")]
    NativeLookupFailure { class: String, member: String },

    #[error("method `{0}` not found")]
    MethodNotFound(String),

    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),
}

fn describe_mnemonic(mnemonic: &Option<&'static str>) -> String {
    mnemonic.map(|m| format!(" ({m})")).unwrap_or_default()
}

impl Error {
    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::UnexpectedEof { .. } => ErrorKind::Io,
            Self::BadMagic { .. }
            | Self::EmptyConstantPool
            | Self::UnknownConstantTag { .. }
            | Self::LengthExceedsBuffer { .. }
            | Self::InvalidConstantIndex { .. } => ErrorKind::MalformedClassFile,
            Self::UnsupportedClassFeature { .. } => ErrorKind::UnsupportedClassFeature,
            Self::ConstantPoolTypeMismatch { .. } => ErrorKind::ConstantPoolTypeMismatch,
            Self::StackUnderflow { .. } => ErrorKind::StackUnderflow,
            Self::OperandTypeMismatch { .. } => ErrorKind::OperandTypeMismatch,
            Self::UnsupportedInstruction { .. } => ErrorKind::UnsupportedInstruction,
            Self::NativeLookupFailure { .. } => ErrorKind::NativeLookupFailure,
            Self::MethodNotFound(_) => ErrorKind::MethodNotFound,
            Self::InvalidDescriptor(_) => ErrorKind::InvalidDescriptor,
        }
    }
}
