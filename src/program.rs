//! Abstract representation of a Java program.
use std::fmt;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::jvm::{CodeAttribute, JVMClassFile};

/// Name of the method a run starts from unless told otherwise.
pub const ENTRY_POINT: &str = "main";

/// Field types a descriptor can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseTypeKind {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<BaseTypeKind>),
}

impl BaseTypeKind {
    /// Returns the size in words of a given type.
    pub fn size(&self) -> usize {
        match self {
            Self::Long | Self::Double => 2,
            Self::Void => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for BaseTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Byte => f.write_str("byte"),
            Self::Char => f.write_str("char"),
            Self::Double => f.write_str("double"),
            Self::Float => f.write_str("float"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Short => f.write_str("short"),
            Self::Boolean => f.write_str("boolean"),
            Self::Void => f.write_str("void"),
            Self::Reference(class) => f.write_str(&class.replace('/', ".")),
            Self::Array(component) => write!(f, "{component}[]"),
        }
    }
}

/// Decoded method descriptor, e.g. `(Ljava/lang/String;)V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub arg_types: Vec<BaseTypeKind>,
    pub return_type: BaseTypeKind,
}

fn descriptor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\(([^)]*)\)(.+)$").expect("method descriptor pattern is valid")
    })
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(descriptor.to_string());
        let caps = descriptor_pattern().captures(descriptor).ok_or_else(invalid)?;
        let mut args = caps.get(1).map_or("", |m| m.as_str());
        let ret = caps.get(2).map_or("", |m| m.as_str());

        let mut arg_types = Vec::new();
        while !args.is_empty() {
            let (t, rest) = decode_type(args).ok_or_else(invalid)?;
            if t == BaseTypeKind::Void {
                return Err(invalid());
            }
            arg_types.push(t);
            args = rest;
        }
        let (return_type, rest) = decode_type(ret).ok_or_else(invalid)?;
        if !rest.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            arg_types,
            return_type,
        })
    }

    /// Number of arguments, not counting the receiver.
    pub fn arg_count(&self) -> usize {
        self.arg_types.len()
    }

    /// Local variable words the arguments take, with `long` and `double`
    /// counting twice.
    pub fn arg_words(&self) -> usize {
        self.arg_types.iter().map(BaseTypeKind::size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (", self.return_type)?;
        for (i, t) in self.arg_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{t}")?;
        }
        f.write_str(")")
    }
}

/// Decodes the leading field type of `s`, returning it with the unread rest.
fn decode_type(s: &str) -> Option<(BaseTypeKind, &str)> {
    let first = s.chars().next()?;
    let rest = &s[first.len_utf8()..];
    let t = match first {
        'B' => BaseTypeKind::Byte,
        'C' => BaseTypeKind::Char,
        'D' => BaseTypeKind::Double,
        'F' => BaseTypeKind::Float,
        'I' => BaseTypeKind::Int,
        'J' => BaseTypeKind::Long,
        'S' => BaseTypeKind::Short,
        'Z' => BaseTypeKind::Boolean,
        'V' => BaseTypeKind::Void,
        'L' => {
            let end = rest.find(';')?;
            if end == 0 {
                return None;
            }
            return Some((
                BaseTypeKind::Reference(rest[..end].to_string()),
                &rest[end + 1..],
            ));
        }
        '[' => {
            let (component, rest) = decode_type(rest)?;
            if component == BaseTypeKind::Void {
                return None;
            }
            return Some((BaseTypeKind::Array(Box::new(component)), rest));
        }
        _ => return None,
    };
    Some((t, rest))
}

/// Java class method representation for the interpreter.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    // `None` when the descriptor does not decode.
    pub signature: Option<MethodDescriptor>,
    pub access_flags: u16,
    pub bodies: Vec<CodeAttribute>,
}

/// Representation of Java programs that we want to run.
#[derive(Debug, Clone)]
pub struct Program {
    constant_pool: ConstantPool,
    methods: Vec<Method>,
}

impl Program {
    /// Build a new program from a parsed class file.
    pub fn new(class_file: &JVMClassFile) -> Result<Self> {
        let constants = class_file.constant_pool();
        let mut methods = Vec::with_capacity(class_file.methods().len());
        for method_info in class_file.methods() {
            let name = constants.text(method_info.name_index())?.into_owned();
            let descriptor = constants
                .text(method_info.descriptor_index())?
                .into_owned();
            let signature = match MethodDescriptor::parse(&descriptor) {
                Ok(signature) => Some(signature),
                Err(err) => {
                    debug!("method {name}: {err}");
                    None
                }
            };
            methods.push(Method {
                name,
                descriptor,
                signature,
                access_flags: method_info.access_flags(),
                bodies: method_info.attributes().to_vec(),
            });
        }

        Ok(Self {
            constant_pool: constants.clone(),
            methods,
        })
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Returns the first method called `name`.
    pub fn find_method(&self, name: &str) -> Result<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name)
            .ok_or_else(|| Error::MethodNotFound(name.to_string()))
    }

    /// Returns the program entry point, the method `main`.
    pub fn entry_point(&self) -> Result<&Method> {
        self.find_method(ENTRY_POINT)
    }
}
