//! Interpreter for JVM bytecode.
//!
//! Each code body runs in its own [`Frame`], which owns the instruction
//! cursor and the operand stack. Frames share only the read-only constant
//! pool and link table, so invocations can be repeated or nested freely.
use std::fmt;

use log::trace;

use crate::bytecode::OPCode;
use crate::constant_pool::ConstantPool;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::jvm::CodeAttribute;
use crate::native::{HostStreams, LinkTable, ObjectRef};

/// Operand stack slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unresolved constant pool index, as pushed by `ldc` and `getstatic`.
    RawIndex(u16),
    ResolvedString(String),
    ResolvedReference(ObjectRef),
}

impl Value {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RawIndex(_) => "raw index",
            Self::ResolvedString(_) => "string",
            Self::ResolvedReference(_) => "reference",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RawIndex(index) => write!(f, "#{index}"),
            Self::ResolvedString(s) => write!(f, "{s:?}"),
            Self::ResolvedReference(object) => write!(f, "{object}"),
        }
    }
}

/// Outcome of a single step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    Return,
}

/// Execution state of one code body.
#[derive(Debug)]
pub struct Frame<'c> {
    cursor: ByteCursor<'c>,
    stack: Vec<Value>,
}

impl<'c> Frame<'c> {
    pub fn new(code: &'c [u8]) -> Self {
        Self {
            cursor: ByteCursor::new(code),
            stack: Vec::new(),
        }
    }

    /// Offset of the next instruction.
    pub const fn pc(&self) -> usize {
        self.cursor.position()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub const fn is_finished(&self) -> bool {
        self.cursor.is_at_end()
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self, pc: usize) -> Result<Value> {
        self.stack.pop().ok_or(Error::StackUnderflow { pc })
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self, interpreter: &Interpreter, host: &mut HostStreams) -> Result<Control> {
        let pc = self.pc();
        let byte = self.cursor.read_u1()?;
        let control = match OPCode::from_byte(byte) {
            Some(OPCode::Ldc) => {
                let index = self.cursor.read_u1()?;
                trace!("{pc:>4}: ldc #{index}");
                self.push(Value::RawIndex(u16::from(index)));
                Control::Continue
            }
            Some(OPCode::Getstatic) => {
                let index = self.cursor.read_u2()?;
                let field = interpreter.pool.resolve_field(index)?;
                trace!("{pc:>4}: getstatic #{index} // {field}");
                self.push(Value::RawIndex(index));
                Control::Continue
            }
            Some(OPCode::Invokevirtual) => {
                let index = self.cursor.read_u2()?;
                self.invoke_virtual(interpreter, host, pc, index)?;
                Control::Continue
            }
            Some(OPCode::Return) => {
                trace!("{pc:>4}: return");
                Control::Return
            }
            opcode => {
                return Err(Error::UnsupportedInstruction {
                    opcode: byte,
                    mnemonic: opcode.map(OPCode::mnemonic),
                    pc,
                })
            }
        };
        trace!("      stack={:?}", self.stack);
        Ok(control)
    }

    fn invoke_virtual(
        &mut self,
        interpreter: &Interpreter,
        host: &mut HostStreams,
        pc: usize,
        index: u16,
    ) -> Result<()> {
        let pool = interpreter.pool;
        let method = pool.resolve_method(index)?;
        trace!("{pc:>4}: invokevirtual #{index} // {method}");
        let native = interpreter.links.method(pool, index)?;

        // Arguments sit above the receiver, last argument on top.
        let mut args = Vec::with_capacity(native.arity);
        for _ in 0..native.arity {
            let arg = self.pop(pc)?;
            args.push(resolve_argument(pool, arg)?);
        }
        args.reverse();

        let receiver = match self.pop(pc)? {
            Value::RawIndex(field) => interpreter.links.static_field(pool, field)?.clone(),
            Value::ResolvedReference(object) => object,
            other => {
                return Err(Error::OperandTypeMismatch {
                    expected: "reference",
                    found: other.kind(),
                })
            }
        };
        trace!("      {receiver}.{}({args:?})", method.name);
        (native.handler)(host, &receiver, &args)
    }
}

/// Turns a popped argument into the value a native receives. Raw indices
/// must name a String constant.
fn resolve_argument(pool: &ConstantPool, value: Value) -> Result<Value> {
    match value {
        Value::RawIndex(index) => Ok(Value::ResolvedString(
            pool.string_value(index)?.into_owned(),
        )),
        resolved => Ok(resolved),
    }
}

/// `Interpreter` for a stack based virtual machine for JVM bytecode.
pub struct Interpreter<'p> {
    pool: &'p ConstantPool,
    links: &'p LinkTable,
}

impl<'p> Interpreter<'p> {
    pub fn new(pool: &'p ConstantPool, links: &'p LinkTable) -> Self {
        Self { pool, links }
    }

    /// Runs one code body to completion in a fresh frame.
    pub fn execute(&self, code: &CodeAttribute, host: &mut HostStreams) -> Result<()> {
        trace!(
            "executing {} bytes (max_stack={}, max_locals={})",
            code.code.len(),
            code.max_stack,
            code.max_locals
        );
        let mut frame = Frame::new(&code.code);
        while !frame.is_finished() {
            if frame.step(self, host)? == Control::Return {
                break;
            }
        }
        Ok(())
    }
}
