//! Diagnostic dump of a parsed class file.
use log::debug;

use crate::bytecode::disassemble;
use crate::jvm::JVMClassFile;

/// Renders the structure of `class_file` one line at a time: header,
/// constant pool, member counts, every method with its code and the
/// top-level attributes.
pub fn describe_class_file(class_file: &JVMClassFile) -> Vec<String> {
    let pool = class_file.constant_pool();
    let (major, minor) = class_file.version();
    let mut lines = vec![
        format!("magic: {:#010x}", class_file.magic()),
        format!("version: {major}.{minor}"),
        format!("constant pool: {} entries", pool.count()),
    ];
    for (index, entry) in pool.iter() {
        lines.push(format!("  #{index:<3} = {entry}"));
    }
    lines.push(format!("access flags: {:#06x}", class_file.access_flags()));
    lines.push(format!(
        "this_class: #{} super_class: #{}",
        class_file.this_class(),
        class_file.super_class()
    ));
    lines.push(format!(
        "interfaces: {} fields: {} methods: {}",
        class_file.interfaces_count(),
        class_file.fields_count(),
        class_file.methods().len()
    ));

    for method in class_file.methods() {
        let name = pool
            .text(method.name_index())
            .map_or_else(|_| format!("#{}", method.name_index()), |n| n.into_owned());
        let descriptor = pool
            .text(method.descriptor_index())
            .map_or_else(|_| format!("#{}", method.descriptor_index()), |d| d.into_owned());
        lines.push(format!(
            "method {name}{descriptor} flags {:#06x}",
            method.access_flags()
        ));
        for code in method.attributes() {
            lines.push(format!(
                "  code: stack={} locals={} length={} [{}]",
                code.max_stack,
                code.max_locals,
                code.code.len(),
                hex(&code.code)
            ));
            match disassemble(&code.code) {
                Ok(instructions) => {
                    lines.extend(instructions.iter().map(|inst| format!("  {inst}")))
                }
                Err(err) => lines.push(format!("  (no listing: {err})")),
            }
            for attribute in &code.attributes {
                lines.push(format!(
                    "  attribute #{} ({} bytes)",
                    attribute.name_index, attribute.length
                ));
            }
        }
    }

    for attribute in class_file.attributes() {
        let name = pool.text(attribute.name_index).unwrap_or_default();
        lines.push(format!(
            "attribute #{} {name} ({} bytes)",
            attribute.name_index, attribute.length
        ));
    }
    lines
}

/// Writes [`describe_class_file`] to the log at debug level.
pub fn log_class_file(class_file: &JVMClassFile) {
    for line in describe_class_file(class_file) {
        debug!("{line}");
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
