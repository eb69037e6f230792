//! Typed constant pool with checked, index-based resolution.
//!
//! Entries are addressed from 1 the way bytecode operands address them; slot
//! 0 is reserved by the class file format and every accessor rejects it.
use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELDREF: u8 = 9;
pub const CONSTANT_METHODREF: u8 = 10;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;

/// Constant pool entries understood by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CPInfo {
    ConstantClass {
        name_index: u16,
    },
    ConstantFieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantNameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    // Raw bytes, decoded to text only when used.
    ConstantUtf8 {
        bytes: Vec<u8>,
    },
    ConstantString {
        string_index: u16,
    },
}

impl CPInfo {
    /// Returns the tag byte this entry is encoded with.
    pub const fn tag(&self) -> u8 {
        match self {
            Self::ConstantClass { .. } => CONSTANT_CLASS,
            Self::ConstantFieldRef { .. } => CONSTANT_FIELDREF,
            Self::ConstantMethodRef { .. } => CONSTANT_METHODREF,
            Self::ConstantNameAndType { .. } => CONSTANT_NAME_AND_TYPE,
            Self::ConstantUtf8 { .. } => CONSTANT_UTF8,
            Self::ConstantString { .. } => CONSTANT_STRING,
        }
    }

    /// Returns the entry kind as `javap` prints it.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConstantClass { .. } => "Class",
            Self::ConstantFieldRef { .. } => "Fieldref",
            Self::ConstantMethodRef { .. } => "Methodref",
            Self::ConstantNameAndType { .. } => "NameAndType",
            Self::ConstantUtf8 { .. } => "Utf8",
            Self::ConstantString { .. } => "String",
        }
    }
}

impl fmt::Display for CPInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConstantClass { name_index } => write!(f, "Class\t\t#{name_index}"),
            Self::ConstantFieldRef {
                class_index,
                name_and_type_index,
            } => write!(f, "Fieldref\t#{class_index}.#{name_and_type_index}"),
            Self::ConstantMethodRef {
                class_index,
                name_and_type_index,
            } => write!(f, "Methodref\t#{class_index}.#{name_and_type_index}"),
            Self::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => write!(f, "NameAndType\t#{name_index}:#{descriptor_index}"),
            Self::ConstantUtf8 { bytes } => {
                write!(f, "Utf8\t\t{}", String::from_utf8_lossy(bytes))
            }
            Self::ConstantString { string_index } => write!(f, "String\t\t#{string_index}"),
        }
    }
}

/// Field or method reference operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NameAndType {
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// A field or method reference with every index resolved to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolicRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl fmt::Display for SymbolicRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<CPInfo>,
}

impl ConstantPool {
    pub fn new(entries: Vec<CPInfo>) -> Self {
        Self { entries }
    }

    /// Returns the `constant_pool_count` value this pool is encoded with,
    /// which counts the reserved slot 0.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16 + 1
    }

    /// Iterates `(index, entry)` pairs starting at index 1.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &CPInfo)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i as u16 + 1, entry))
    }

    /// Returns the entry at `index`, whatever its kind.
    pub fn get(&self, index: u16) -> Result<&CPInfo> {
        if index == 0 {
            return Err(self.invalid_index(index));
        }
        self.entries
            .get(usize::from(index) - 1)
            .ok_or_else(|| self.invalid_index(index))
    }

    /// Returns the name index of a `Class` entry.
    pub fn class(&self, index: u16) -> Result<u16> {
        match self.get(index)? {
            CPInfo::ConstantClass { name_index } => Ok(*name_index),
            other => Err(mismatch(index, "Class", other)),
        }
    }

    pub fn field_ref(&self, index: u16) -> Result<MemberRef> {
        match self.get(index)? {
            CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            } => Ok(MemberRef {
                class_index: *class_index,
                name_and_type_index: *name_and_type_index,
            }),
            other => Err(mismatch(index, "Fieldref", other)),
        }
    }

    pub fn method_ref(&self, index: u16) -> Result<MemberRef> {
        match self.get(index)? {
            CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            } => Ok(MemberRef {
                class_index: *class_index,
                name_and_type_index: *name_and_type_index,
            }),
            other => Err(mismatch(index, "Methodref", other)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<NameAndType> {
        match self.get(index)? {
            CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => Ok(NameAndType {
                name_index: *name_index,
                descriptor_index: *descriptor_index,
            }),
            other => Err(mismatch(index, "NameAndType", other)),
        }
    }

    /// Returns the Utf8 index a `String` entry points at.
    pub fn string(&self, index: u16) -> Result<u16> {
        match self.get(index)? {
            CPInfo::ConstantString { string_index } => Ok(*string_index),
            other => Err(mismatch(index, "String", other)),
        }
    }

    /// Returns the raw content of a `Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            CPInfo::ConstantUtf8 { bytes } => Ok(bytes),
            other => Err(mismatch(index, "Utf8", other)),
        }
    }

    /// Decodes a `Utf8` entry as text. Class files use modified UTF-8, so
    /// sequences std rejects (encoded NUL, surrogate pairs) are replaced.
    pub fn text(&self, index: u16) -> Result<Cow<'_, str>> {
        Ok(String::from_utf8_lossy(self.utf8(index)?))
    }

    /// Resolves a `Class` entry to its binary name.
    pub fn class_name(&self, index: u16) -> Result<Cow<'_, str>> {
        self.text(self.class(index)?)
    }

    /// Resolves a `String` entry to its text.
    pub fn string_value(&self, index: u16) -> Result<Cow<'_, str>> {
        self.text(self.string(index)?)
    }

    pub fn resolve_field(&self, index: u16) -> Result<SymbolicRef> {
        let field = self.field_ref(index)?;
        self.resolve_member(field)
    }

    pub fn resolve_method(&self, index: u16) -> Result<SymbolicRef> {
        let method = self.method_ref(index)?;
        self.resolve_member(method)
    }

    fn resolve_member(&self, member: MemberRef) -> Result<SymbolicRef> {
        let nt = self.name_and_type(member.name_and_type_index)?;
        Ok(SymbolicRef {
            class: self.class_name(member.class_index)?.into_owned(),
            name: self.text(nt.name_index)?.into_owned(),
            descriptor: self.text(nt.descriptor_index)?.into_owned(),
        })
    }

    fn invalid_index(&self, index: u16) -> Error {
        Error::InvalidConstantIndex {
            index,
            count: self.count(),
        }
    }
}

fn mismatch(index: u16, expected: &'static str, found: &CPInfo) -> Error {
    Error::ConstantPoolTypeMismatch {
        index,
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn utf8(s: &str) -> CPInfo {
        CPInfo::ConstantUtf8 {
            bytes: s.as_bytes().to_vec(),
        }
    }

    // Same layout javac emits for `System.out.println("Hello, World!")`.
    fn hello_pool() -> ConstantPool {
        ConstantPool::new(vec![
            utf8("java/lang/System"),
            utf8("out"),
            utf8("Ljava/io/PrintStream;"),
            CPInfo::ConstantNameAndType {
                name_index: 2,
                descriptor_index: 3,
            },
            CPInfo::ConstantFieldRef {
                class_index: 6,
                name_and_type_index: 4,
            },
            CPInfo::ConstantClass { name_index: 1 },
            utf8("Hello, World!"),
            CPInfo::ConstantString { string_index: 7 },
        ])
    }

    #[test]
    fn index_zero_is_never_dereferenced() {
        let pool = hello_pool();
        let err = pool.get(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedClassFile);
        assert!(pool.utf8(0).is_err());
        assert!(pool.class(0).is_err());
        assert!(matches!(
            pool.get(9),
            Err(Error::InvalidConstantIndex { index: 9, count: 9 })
        ));
    }

    #[test]
    fn typed_accessors_reject_other_tags() {
        let pool = hello_pool();
        // Every accessor against the Utf8 entry at #1, except `utf8` itself.
        let results = [
            pool.class(1).map(|_| ()),
            pool.field_ref(1).map(|_| ()),
            pool.method_ref(1).map(|_| ()),
            pool.name_and_type(1).map(|_| ()),
            pool.string(1).map(|_| ()),
        ];
        for result in results {
            let err = result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConstantPoolTypeMismatch);
        }
        assert!(matches!(
            pool.utf8(8),
            Err(Error::ConstantPoolTypeMismatch {
                index: 8,
                expected: "Utf8",
                found: "String"
            })
        ));
    }

    #[test]
    fn resolves_field_reference_names() {
        let pool = hello_pool();
        let field = pool.resolve_field(5).unwrap();
        assert_eq!(field.class, "java/lang/System");
        assert_eq!(field.name, "out");
        assert_eq!(field.descriptor, "Ljava/io/PrintStream;");
        assert_eq!(
            field.to_string(),
            "java/lang/System.out:Ljava/io/PrintStream;"
        );
        assert_eq!(pool.string_value(8).unwrap(), "Hello, World!");
        // A Fieldref is not a Methodref.
        assert!(pool.resolve_method(5).is_err());
    }

    #[test]
    fn iterates_from_index_one() {
        let pool = hello_pool();
        let indices: Vec<u16> = pool.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());
        assert_eq!(pool.count(), 9);
        assert_eq!(pool.get(5).unwrap().to_string(), "Fieldref\t#6.#4");
        assert_eq!(pool.get(5).unwrap().tag(), CONSTANT_FIELDREF);
    }
}
