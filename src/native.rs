//! Native bridge between bytecode and host-implemented behavior.
//!
//! Classes the interpreter cannot execute itself are described to it as a
//! registry of static objects and native methods. Before a program runs, the
//! registry is linked against its constant pool: every Fieldref and
//! Methodref that names a registered member is resolved once and cached by
//! pool index, so dispatch at run time is a single table lookup.
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use log::{debug, trace};

use crate::constant_pool::{CPInfo, ConstantPool, SymbolicRef};
use crate::error::{Error, Result};
use crate::interpreter::Value;
use crate::program::MethodDescriptor;

/// Host stream a print stream object writes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Host objects the bridge can hand to bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    PrintStream(StreamKind),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PrintStream(StreamKind::Stdout) => f.write_str("PrintStream(stdout)"),
            Self::PrintStream(StreamKind::Stderr) => f.write_str("PrintStream(stderr)"),
        }
    }
}

/// Writers natives produce their output on.
pub struct HostStreams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> HostStreams<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }

    pub fn stream(&mut self, kind: StreamKind) -> &mut (dyn Write + 'a) {
        match kind {
            StreamKind::Stdout => &mut *self.out,
            StreamKind::Stderr => &mut *self.err,
        }
    }
}

/// Handler signature: host streams, receiver, arguments in declaration
/// order.
pub type NativeFn = fn(&mut HostStreams<'_>, &ObjectRef, &[Value]) -> Result<()>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodKey {
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        Self {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl From<&SymbolicRef> for MethodKey {
    fn from(symbol: &SymbolicRef) -> Self {
        Self::new(&symbol.class, &symbol.name, &symbol.descriptor)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct NativeMethod {
    /// Number of arguments popped before the receiver.
    pub arity: usize,
    pub handler: NativeFn,
}

/// Registry of bound static fields and native methods.
#[derive(Debug, Default)]
pub struct NativeBridge {
    statics: HashMap<(String, String), ObjectRef>,
    methods: HashMap<MethodKey, NativeMethod>,
}

impl NativeBridge {
    /// Creates an empty bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge with `System.out`, `System.err` and the
    /// `PrintStream` string printers bound.
    pub fn with_standard_bindings() -> Result<Self> {
        let mut bridge = Self::new();
        bridge.bind_static(
            "java/lang/System",
            "out",
            ObjectRef::PrintStream(StreamKind::Stdout),
        );
        bridge.bind_static(
            "java/lang/System",
            "err",
            ObjectRef::PrintStream(StreamKind::Stderr),
        );
        bridge.bind_described(
            "java/io/PrintStream",
            "println",
            "(Ljava/lang/String;)V",
            println,
        )?;
        bridge.bind_described("java/io/PrintStream", "print", "(Ljava/lang/String;)V", print)?;
        Ok(bridge)
    }

    pub fn bind_static(&mut self, class: &str, field: &str, object: ObjectRef) {
        self.statics
            .insert((class.to_string(), field.to_string()), object);
    }

    pub fn bind_method(&mut self, key: MethodKey, arity: usize, handler: NativeFn) {
        self.methods.insert(key, NativeMethod { arity, handler });
    }

    /// Binds a method whose arity is taken from its descriptor.
    pub fn bind_described(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        handler: NativeFn,
    ) -> Result<()> {
        let arity = MethodDescriptor::parse(descriptor)?.arg_count();
        self.bind_method(MethodKey::new(class, name, descriptor), arity, handler);
        Ok(())
    }

    pub fn static_field(&self, class: &str, field: &str) -> Result<&ObjectRef> {
        self.statics
            .get(&(class.to_string(), field.to_string()))
            .ok_or_else(|| Error::NativeLookupFailure {
                class: class.to_string(),
                member: field.to_string(),
            })
    }

    pub fn method(&self, key: &MethodKey) -> Result<&NativeMethod> {
        self.methods
            .get(key)
            .ok_or_else(|| Error::NativeLookupFailure {
                class: key.class.clone(),
                member: format!("{}{}", key.name, key.descriptor),
            })
    }

    /// Resolves every field and method reference of `pool` that has a
    /// binding. References without one are left out of the table and fail
    /// when executed.
    pub fn link(&self, pool: &ConstantPool) -> Result<LinkTable> {
        let mut table = LinkTable::default();
        for (index, entry) in pool.iter() {
            match entry {
                CPInfo::ConstantFieldRef { .. } => {
                    let field = pool.resolve_field(index)?;
                    if let Ok(object) = self.static_field(&field.class, &field.name) {
                        debug!("linked #{index} {field} => {object}");
                        table.statics.insert(index, object.clone());
                    } else {
                        trace!("#{index} {field} has no static binding");
                    }
                }
                CPInfo::ConstantMethodRef { .. } => {
                    let method = pool.resolve_method(index)?;
                    if let Ok(native) = self.method(&MethodKey::from(&method)) {
                        debug!("linked #{index} {method} => native/{}", native.arity);
                        table.methods.insert(index, *native);
                    } else {
                        trace!("#{index} {method} has no native binding");
                    }
                }
                _ => {}
            }
        }
        Ok(table)
    }
}

/// Per-class cache of resolved bindings keyed by constant pool index.
#[derive(Debug, Default, Clone)]
pub struct LinkTable {
    statics: HashMap<u16, ObjectRef>,
    methods: HashMap<u16, NativeMethod>,
}

impl LinkTable {
    /// Returns the object bound to the Fieldref at `index`.
    pub fn static_field(&self, pool: &ConstantPool, index: u16) -> Result<&ObjectRef> {
        match self.statics.get(&index) {
            Some(object) => Ok(object),
            None => {
                let field = pool.resolve_field(index)?;
                Err(Error::NativeLookupFailure {
                    class: field.class,
                    member: field.name,
                })
            }
        }
    }

    /// Returns the native bound to the Methodref at `index`.
    pub fn method(&self, pool: &ConstantPool, index: u16) -> Result<&NativeMethod> {
        match self.methods.get(&index) {
            Some(native) => Ok(native),
            None => {
                let method = pool.resolve_method(index)?;
                Err(Error::NativeLookupFailure {
                    class: method.class,
                    member: format!("{}{}", method.name, method.descriptor),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.statics.len() + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn string_argument<'v>(args: &'v [Value]) -> Result<&'v str> {
    match args {
        [Value::ResolvedString(s)] => Ok(s),
        [other] => Err(Error::OperandTypeMismatch {
            expected: "string",
            found: other.kind(),
        }),
        _ => Err(Error::OperandTypeMismatch {
            expected: "one string argument",
            found: "argument list",
        }),
    }
}

/// `PrintStream.println(String)`: writes the string and a line terminator.
pub fn println(host: &mut HostStreams<'_>, receiver: &ObjectRef, args: &[Value]) -> Result<()> {
    let s = string_argument(args)?;
    let ObjectRef::PrintStream(kind) = receiver;
    let stream = host.stream(*kind);
    stream.write_all(s.as_bytes())?;
    stream.write_all(b"\n")?;
    Ok(())
}

/// `PrintStream.print(String)`: writes the string alone.
pub fn print(host: &mut HostStreams<'_>, receiver: &ObjectRef, args: &[Value]) -> Result<()> {
    let s = string_argument(args)?;
    let ObjectRef::PrintStream(kind) = receiver;
    host.stream(*kind).write_all(s.as_bytes())?;
    Ok(())
}
