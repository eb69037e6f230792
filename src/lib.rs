//! classrun decodes JVM class files and interprets the small slice of
//! bytecode needed to run console programs, with library calls such as
//! `System.out.println` served by a native bridge on the host.
pub mod bytecode;
pub mod constant_pool;
pub mod cursor;
pub mod error;
pub mod interpreter;
pub mod jvm;
pub mod native;
pub mod program;
pub mod runtime;
pub mod trace;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
