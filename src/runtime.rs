//! JVM runtime module responsible for creating a new runtime
//! environment and running programs.
use log::{debug, warn};

use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::native::{HostStreams, LinkTable, NativeBridge};
use crate::program::{Method, Program};

const ACC_STATIC: u16 = 0x0008;

/// Settings for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Name of the method to invoke, `main` when unset.
    pub entry_point: Option<String>,
}

/// `Runtime` represents an execution context for a linked program. It owns
/// no per-invocation state: every call to [`Runtime::invoke`] builds fresh
/// frames, so one runtime can serve any number of invocations.
pub struct Runtime {
    program: Program,
    links: LinkTable,
}

impl Runtime {
    /// Links `program` against `bridge` once, up front.
    pub fn new(program: Program, bridge: NativeBridge) -> Result<Self> {
        let links = bridge.link(program.constant_pool())?;
        debug!("linked {} constant pool references", links.len());
        Ok(Self { program, links })
    }

    /// Runs every code body of the method `name`, each in its own frame.
    pub fn invoke(&self, name: &str, host: &mut HostStreams) -> Result<()> {
        let method = self.program.find_method(name)?;
        self.invoke_method(method, host)
    }

    pub fn run(&self, config: &RuntimeConfig, host: &mut HostStreams) -> Result<()> {
        let method = match &config.entry_point {
            Some(name) => self.program.find_method(name)?,
            None => self.program.entry_point()?,
        };
        self.invoke_method(method, host)
    }

    fn invoke_method(&self, method: &Method, host: &mut HostStreams) -> Result<()> {
        debug!(
            "invoking {}{} ({} code bodies)",
            method.name,
            method.descriptor,
            method.bodies.len()
        );
        if let Some(signature) = &method.signature {
            // Arguments occupy the first locals, after `this` for instance
            // methods.
            let receiver = usize::from(method.access_flags & ACC_STATIC == 0);
            let words = signature.arg_words() + receiver;
            debug!("  {} {signature}, {words} argument words", method.name);
            for body in &method.bodies {
                if usize::from(body.max_locals) < words {
                    warn!(
                        "{}: max_locals {} is smaller than its {} argument words",
                        method.name, body.max_locals, words
                    );
                }
            }
        }

        let interpreter = Interpreter::new(self.program.constant_pool(), &self.links);
        for body in &method.bodies {
            interpreter.execute(body, host)?;
            debug!("---");
        }
        Ok(())
    }
}
