//! Lightweight implementation of a parser and decoder for JVM bytecode
//! class files.
//!
//! The decoder covers the subset of the format the interpreter needs: the
//! header, the constant pool, methods and attributes. Interface and field
//! tables are not decoded, and every method attribute is read with the
//! `Code` layout instead of being dispatched on its resolved name.
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::constant_pool::{
    CPInfo, ConstantPool, CONSTANT_CLASS, CONSTANT_FIELDREF, CONSTANT_METHODREF,
    CONSTANT_NAME_AND_TYPE, CONSTANT_STRING, CONSTANT_UTF8,
};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

pub const MAGIC: u32 = 0xcafe_babe;

/// Reads a whole class file into memory.
pub fn read_class_file(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Parsed class file, immutable once built.
#[derive(Debug, Clone)]
pub struct JVMClassFile {
    magic: u32,
    minor_version: u16,
    major_version: u16,
    constant_pool: ConstantPool,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces_count: u16,
    fields_count: u16,
    methods: Vec<MethodInfo>,
    attributes: Vec<AttributeInfo>,
}

impl JVMClassFile {
    pub const fn magic(&self) -> u32 {
        self.magic
    }

    /// Returns `(major, minor)`.
    pub const fn version(&self) -> (u16, u16) {
        (self.major_version, self.minor_version)
    }

    pub const fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub const fn access_flags(&self) -> u16 {
        self.access_flags
    }

    pub const fn this_class(&self) -> u16 {
        self.this_class
    }

    pub const fn super_class(&self) -> u16 {
        self.super_class
    }

    pub const fn interfaces_count(&self) -> u16 {
        self.interfaces_count
    }

    pub const fn fields_count(&self) -> u16 {
        self.fields_count
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }
}

/// Method entry. Every attribute a method declares is decoded as a
/// [`CodeAttribute`].
#[derive(Debug, Clone)]
pub struct MethodInfo {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<CodeAttribute>,
}

impl MethodInfo {
    pub const fn access_flags(&self) -> u16 {
        self.access_flags
    }

    pub const fn name_index(&self) -> u16 {
        self.name_index
    }

    pub const fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn attributes(&self) -> &[CodeAttribute] {
        &self.attributes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub name_index: u16,
    pub length: u32,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    // Kept for completeness, never consulted for control flow.
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Attribute with an opaque body of exactly `length` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub length: u32,
    pub info: Vec<u8>,
}

/// `JVMParser` decodes class files top-down in the order the format lays
/// them out.
pub struct JVMParser;

impl JVMParser {
    pub fn parse(class_file_bytes: &[u8]) -> Result<JVMClassFile> {
        let mut cursor = ByteCursor::new(class_file_bytes);

        let magic = cursor.read_u4()?;
        if magic != MAGIC {
            return Err(Error::BadMagic { found: magic });
        }
        let minor_version = cursor.read_u2()?;
        let major_version = cursor.read_u2()?;
        let constant_pool = Self::parse_constant_pool(&mut cursor)?;

        let access_flags = cursor.read_u2()?;
        let this_class = cursor.read_u2()?;
        let super_class = cursor.read_u2()?;

        let interfaces_count = cursor.read_u2()?;
        if interfaces_count > 0 {
            return Err(Error::UnsupportedClassFeature {
                what: "interface",
                count: interfaces_count,
            });
        }
        let fields_count = cursor.read_u2()?;
        if fields_count > 0 {
            return Err(Error::UnsupportedClassFeature {
                what: "field",
                count: fields_count,
            });
        }

        let methods_count = cursor.read_u2()?;
        let mut methods = Vec::with_capacity(usize::from(methods_count));
        for _ in 0..methods_count {
            methods.push(Self::parse_method(&mut cursor)?);
        }

        let attributes_count = cursor.read_u2()?;
        let mut attributes = Vec::with_capacity(usize::from(attributes_count));
        for _ in 0..attributes_count {
            attributes.push(Self::parse_attribute(&mut cursor)?);
        }

        if cursor.is_at_end() {
            debug!("reached end of class file at offset {}", cursor.position());
        } else {
            warn!(
                "{} trailing bytes after class file at offset {}",
                cursor.remaining(),
                cursor.position()
            );
        }

        Ok(JVMClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces_count,
            fields_count,
            methods,
            attributes,
        })
    }

    fn parse_constant_pool(cursor: &mut ByteCursor) -> Result<ConstantPool> {
        let count = cursor.read_u2()?;
        if count == 0 {
            return Err(Error::EmptyConstantPool);
        }
        let mut entries = Vec::with_capacity(usize::from(count - 1));
        for index in 1..count {
            entries.push(Self::parse_constant(cursor, index)?);
        }
        Ok(ConstantPool::new(entries))
    }

    fn parse_constant(cursor: &mut ByteCursor, index: u16) -> Result<CPInfo> {
        let tag = cursor.read_u1()?;
        let entry = match tag {
            CONSTANT_UTF8 => {
                let length = usize::from(cursor.read_u2()?);
                let bytes = read_declared(cursor, "Utf8 constant", length)?;
                CPInfo::ConstantUtf8 {
                    bytes: bytes.to_vec(),
                }
            }
            CONSTANT_CLASS => CPInfo::ConstantClass {
                name_index: cursor.read_u2()?,
            },
            CONSTANT_STRING => CPInfo::ConstantString {
                string_index: cursor.read_u2()?,
            },
            CONSTANT_FIELDREF => CPInfo::ConstantFieldRef {
                class_index: cursor.read_u2()?,
                name_and_type_index: cursor.read_u2()?,
            },
            CONSTANT_METHODREF => CPInfo::ConstantMethodRef {
                class_index: cursor.read_u2()?,
                name_and_type_index: cursor.read_u2()?,
            },
            CONSTANT_NAME_AND_TYPE => CPInfo::ConstantNameAndType {
                name_index: cursor.read_u2()?,
                descriptor_index: cursor.read_u2()?,
            },
            _ => return Err(Error::UnknownConstantTag { tag, index }),
        };
        Ok(entry)
    }

    fn parse_method(cursor: &mut ByteCursor) -> Result<MethodInfo> {
        let access_flags = cursor.read_u2()?;
        let name_index = cursor.read_u2()?;
        let descriptor_index = cursor.read_u2()?;
        let attributes_count = cursor.read_u2()?;
        let mut attributes = Vec::with_capacity(usize::from(attributes_count));
        for _ in 0..attributes_count {
            attributes.push(Self::parse_code_attribute(cursor)?);
        }
        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_code_attribute(cursor: &mut ByteCursor) -> Result<CodeAttribute> {
        let name_index = cursor.read_u2()?;
        let length = cursor.read_u4()?;
        if length as usize > cursor.remaining() {
            return Err(Error::LengthExceedsBuffer {
                what: "Code attribute",
                offset: cursor.position(),
                declared: length as usize,
                remaining: cursor.remaining(),
            });
        }
        let body_start = cursor.position();

        let max_stack = cursor.read_u2()?;
        let max_locals = cursor.read_u2()?;
        let code_length = cursor.read_u4()? as usize;
        let code = read_declared(cursor, "code", code_length)?.to_vec();

        let exception_table_length = cursor.read_u2()?;
        let mut exception_table = Vec::with_capacity(usize::from(exception_table_length));
        for _ in 0..exception_table_length {
            exception_table.push(ExceptionTableEntry {
                start_pc: cursor.read_u2()?,
                end_pc: cursor.read_u2()?,
                handler_pc: cursor.read_u2()?,
                catch_type: cursor.read_u2()?,
            });
        }

        let attributes_count = cursor.read_u2()?;
        let mut attributes = Vec::with_capacity(usize::from(attributes_count));
        for _ in 0..attributes_count {
            attributes.push(Self::parse_attribute(cursor)?);
        }

        let consumed = cursor.position() - body_start;
        if consumed != length as usize {
            warn!(
                "code attribute #{} declares {} bytes but {} were decoded",
                name_index, length, consumed
            );
        }

        Ok(CodeAttribute {
            name_index,
            length,
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn parse_attribute(cursor: &mut ByteCursor) -> Result<AttributeInfo> {
        let name_index = cursor.read_u2()?;
        let length = cursor.read_u4()?;
        let info = read_declared(cursor, "attribute", length as usize)?.to_vec();
        Ok(AttributeInfo {
            name_index,
            length,
            info,
        })
    }
}

/// Reads a length-prefixed run, rejecting lengths that overrun the buffer
/// before touching it.
fn read_declared<'a>(
    cursor: &mut ByteCursor<'a>,
    what: &'static str,
    length: usize,
) -> Result<&'a [u8]> {
    if length > cursor.remaining() {
        return Err(Error::LengthExceedsBuffer {
            what,
            offset: cursor.position(),
            declared: length,
            remaining: cursor.remaining(),
        });
    }
    cursor.read_bytes(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{hello_world_scenario, ClassBuilder};

    #[test]
    fn can_parse_class_file() {
        let bytes = hello_world_scenario().build();
        let class_file = JVMParser::parse(&bytes).unwrap();
        assert_eq!(class_file.magic(), MAGIC);
        assert_eq!(class_file.version(), (52, 0));
        assert_eq!(class_file.constant_pool().count(), 17);
        assert_eq!(class_file.methods().len(), 1);
        let main = &class_file.methods()[0];
        assert_eq!(
            class_file.constant_pool().text(main.name_index()).unwrap(),
            "main"
        );
        assert_eq!(main.attributes().len(), 1);
        assert_eq!(
            main.attributes()[0].code,
            vec![0xb2, 0x00, 0x05, 0x12, 0x08, 0xb6, 0x00, 0x0d, 0xb1]
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = hello_world_scenario().build();
        bytes[0] = 0xfe;
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedClassFile);
        assert!(matches!(err, Error::BadMagic { found: 0xfefe_babe }));
    }

    #[test]
    fn rejects_unknown_constant_tag() {
        // CONSTANT_Integer (3) is outside the supported set.
        let bytes = ClassBuilder::new().raw_constant(&[3, 0, 0, 0, 42]).build();
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnknownConstantTag { tag: 3, index: 1 }));
        assert_eq!(err.kind(), ErrorKind::MalformedClassFile);
    }

    #[test]
    fn utf8_length_past_end_is_malformed() {
        // Declares 200 bytes of text, supplies 3.
        let bytes = [
            0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34, 0x00, 0x02, 0x01, 0x00, 0xc8, b'a',
            b'b', b'c',
        ];
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthExceedsBuffer {
                what: "Utf8 constant",
                declared: 200,
                remaining: 3,
                ..
            }
        ));
    }

    #[test]
    fn code_attribute_length_past_end_is_malformed() {
        let mut bytes = hello_world_scenario().build();
        // Code attribute header: name #16, 21 byte body.
        let header = [0x00, 0x10, 0x00, 0x00, 0x00, 0x15];
        let at = bytes
            .windows(header.len())
            .position(|w| w == header)
            .unwrap();
        bytes[at + 2..at + 6].copy_from_slice(&0xffff_fff0u32.to_be_bytes());

        let err = JVMParser::parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedClassFile);
        assert!(matches!(
            err,
            Error::LengthExceedsBuffer {
                what: "Code attribute",
                declared: 0xffff_fff0,
                remaining: 23,
                ..
            }
        ));
    }

    #[test]
    fn truncated_header_is_an_io_failure() {
        let err = JVMParser::parse(&[0xca, 0xfe, 0xba, 0xbe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn empty_constant_pool_count_is_malformed() {
        let bytes = [0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34, 0x00, 0x00];
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::EmptyConstantPool));
    }

    #[test]
    fn interface_and_field_tables_are_rejected() {
        let bytes = ClassBuilder::new().interfaces_count(1).build();
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedClassFeature);
        assert!(matches!(
            err,
            Error::UnsupportedClassFeature {
                what: "interface",
                count: 1
            }
        ));

        let bytes = ClassBuilder::new().fields_count(2).build();
        let err = JVMParser::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedClassFeature {
                what: "field",
                count: 2
            }
        ));
    }

    #[test]
    fn code_attribute_consumes_exactly_its_layout() {
        let exception_table = [
            ExceptionTableEntry {
                start_pc: 0,
                end_pc: 4,
                handler_pc: 5,
                catch_type: 0,
            },
            ExceptionTableEntry {
                start_pc: 1,
                end_pc: 2,
                handler_pc: 3,
                catch_type: 1,
            },
        ];
        let nested = [
            AttributeInfo {
                name_index: 1,
                length: 6,
                info: vec![0, 1, 0, 0, 0, 7],
            },
            AttributeInfo {
                name_index: 1,
                length: 0,
                info: vec![],
            },
        ];
        let code = vec![0xb1, 0x00, 0x00];
        let mut bytes = vec![0xaa, 0xbb];
        let start = bytes.len();
        bytes.extend(crate::testing::code_attribute_bytes(
            1,
            3,
            2,
            &code,
            &exception_table,
            &nested,
        ));
        // Anything after the attribute must be left alone.
        bytes.extend([0xde, 0xad]);

        let mut cursor = ByteCursor::new(&bytes);
        cursor.read_u2().unwrap();
        let attribute = JVMParser::parse_code_attribute(&mut cursor).unwrap();

        let nested_len: usize = nested.iter().map(|a| a.length as usize + 6).sum();
        let expected = start
            + 2
            + 4
            + 2
            + 2
            + 4
            + code.len()
            + 2
            + 8 * exception_table.len()
            + 2
            + nested_len;
        assert_eq!(cursor.position(), expected);
        assert_eq!(attribute.code, code);
        assert_eq!(attribute.max_stack, 3);
        assert_eq!(attribute.max_locals, 2);
        assert_eq!(attribute.exception_table, exception_table);
        assert_eq!(attribute.attributes, nested);
        assert_eq!(attribute.length as usize, expected - start - 6);
        assert_eq!(cursor.read_u2().unwrap(), 0xdead);
    }

    #[test]
    fn every_method_attribute_is_read_as_code() {
        // Two attributes on one method, both decoded with the Code layout.
        let bytes = ClassBuilder::new()
            .utf8("run")
            .utf8("()V")
            .utf8("Code")
            .method(0x0009, 1, 2, vec![vec![0xb1], vec![0x00, 0xb1]])
            .build();
        let class_file = JVMParser::parse(&bytes).unwrap();
        let method = &class_file.methods()[0];
        assert_eq!(method.attributes().len(), 2);
        assert_eq!(method.attributes()[1].code, vec![0x00, 0xb1]);
    }

    #[test]
    fn top_level_attributes_keep_their_bodies() {
        let bytes = ClassBuilder::new()
            .utf8("SourceFile")
            .utf8("Hello.java")
            .attribute(1, &[0x00, 0x02])
            .build();
        let class_file = JVMParser::parse(&bytes).unwrap();
        assert_eq!(
            class_file.attributes(),
            &[AttributeInfo {
                name_index: 1,
                length: 2,
                info: vec![0x00, 0x02],
            }]
        );
    }
}
