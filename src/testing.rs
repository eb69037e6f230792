//! Helpers for assembling class files byte by byte in unit tests.
use crate::jvm::{AttributeInfo, ExceptionTableEntry};

pub const HELLO_WORLD_CODE: [u8; 9] = [0xb2, 0x00, 0x05, 0x12, 0x08, 0xb6, 0x00, 0x0d, 0xb1];

/// Builds a class file with the fixed version 52.0 header. Constants are
/// numbered from 1 in the order they are added.
#[derive(Debug, Default)]
pub struct ClassBuilder {
    constants: Vec<Vec<u8>>,
    code_name_index: u16,
    interfaces_count: u16,
    fields_count: u16,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn utf8(mut self, text: &str) -> Self {
        if text == "Code" {
            self.code_name_index = self.constants.len() as u16 + 1;
        }
        let mut entry = vec![1];
        entry.extend((text.len() as u16).to_be_bytes());
        entry.extend(text.as_bytes());
        self.constants.push(entry);
        self
    }

    pub fn class(self, name_index: u16) -> Self {
        self.indexed(7, &[name_index])
    }

    pub fn string(self, utf8_index: u16) -> Self {
        self.indexed(8, &[utf8_index])
    }

    pub fn field_ref(self, class_index: u16, name_and_type_index: u16) -> Self {
        self.indexed(9, &[class_index, name_and_type_index])
    }

    pub fn method_ref(self, class_index: u16, name_and_type_index: u16) -> Self {
        self.indexed(10, &[class_index, name_and_type_index])
    }

    pub fn name_and_type(self, name_index: u16, descriptor_index: u16) -> Self {
        self.indexed(12, &[name_index, descriptor_index])
    }

    pub fn raw_constant(mut self, bytes: &[u8]) -> Self {
        self.constants.push(bytes.to_vec());
        self
    }

    pub fn interfaces_count(mut self, count: u16) -> Self {
        self.interfaces_count = count;
        self
    }

    pub fn fields_count(mut self, count: u16) -> Self {
        self.fields_count = count;
        self
    }

    /// Adds a method with one Code attribute per entry in `bodies`.
    pub fn method(
        mut self,
        access_flags: u16,
        name_index: u16,
        descriptor_index: u16,
        bodies: Vec<Vec<u8>>,
    ) -> Self {
        let mut method = Vec::new();
        method.extend(access_flags.to_be_bytes());
        method.extend(name_index.to_be_bytes());
        method.extend(descriptor_index.to_be_bytes());
        method.extend((bodies.len() as u16).to_be_bytes());
        for code in bodies {
            method.extend(code_attribute_bytes(
                self.code_name_index,
                2,
                1,
                &code,
                &[],
                &[],
            ));
        }
        self.methods.push(method);
        self
    }

    pub fn attribute(mut self, name_index: u16, body: &[u8]) -> Self {
        self.attributes.push(attribute_bytes(&AttributeInfo {
            name_index,
            length: body.len() as u32,
            info: body.to_vec(),
        }));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
        bytes.extend((self.constants.len() as u16 + 1).to_be_bytes());
        for constant in &self.constants {
            bytes.extend(constant);
        }
        // access flags, this_class, super_class
        bytes.extend([0x00, 0x21, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend(self.interfaces_count.to_be_bytes());
        if self.interfaces_count > 0 {
            return bytes;
        }
        bytes.extend(self.fields_count.to_be_bytes());
        if self.fields_count > 0 {
            return bytes;
        }
        bytes.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            bytes.extend(method);
        }
        bytes.extend((self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend(attribute);
        }
        bytes
    }

    fn indexed(mut self, tag: u8, indices: &[u16]) -> Self {
        let mut entry = vec![tag];
        for index in indices {
            entry.extend(index.to_be_bytes());
        }
        self.constants.push(entry);
        self
    }
}

pub fn attribute_bytes(attribute: &AttributeInfo) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(attribute.name_index.to_be_bytes());
    bytes.extend(attribute.length.to_be_bytes());
    bytes.extend(&attribute.info);
    bytes
}

/// Encodes a Code attribute, computing `attribute_length` from its content.
pub fn code_attribute_bytes(
    name_index: u16,
    max_stack: u16,
    max_locals: u16,
    code: &[u8],
    exception_table: &[ExceptionTableEntry],
    attributes: &[AttributeInfo],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(max_stack.to_be_bytes());
    body.extend(max_locals.to_be_bytes());
    body.extend((code.len() as u32).to_be_bytes());
    body.extend(code);
    body.extend((exception_table.len() as u16).to_be_bytes());
    for entry in exception_table {
        body.extend(entry.start_pc.to_be_bytes());
        body.extend(entry.end_pc.to_be_bytes());
        body.extend(entry.handler_pc.to_be_bytes());
        body.extend(entry.catch_type.to_be_bytes());
    }
    body.extend((attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        body.extend(attribute_bytes(attribute));
    }

    let mut bytes = Vec::new();
    bytes.extend(name_index.to_be_bytes());
    bytes.extend((body.len() as u32).to_be_bytes());
    bytes.extend(body);
    bytes
}

/// The symbolic hello-world pool: a static `OUT_CLASS.out` field, the
/// string "Hello, World!" and a `PRINT_CLASS.println` method, followed by
/// the names the method table needs (#15 "main", #16 "Code").
pub fn hello_world_pool() -> ClassBuilder {
    ClassBuilder::new()
        .utf8("OUT_CLASS")
        .utf8("out")
        .utf8("DESC1")
        .name_and_type(2, 3)
        .field_ref(6, 4)
        .class(1)
        .utf8("Hello, World!")
        .string(7)
        .utf8("PRINT_CLASS")
        .utf8("println")
        .utf8("DESC2")
        .name_and_type(10, 11)
        .method_ref(14, 12)
        .class(9)
        .utf8("main")
        .utf8("Code")
}

pub fn hello_world_scenario() -> ClassBuilder {
    hello_world_pool().method(0x0009, 15, 3, vec![HELLO_WORLD_CODE.to_vec()])
}
