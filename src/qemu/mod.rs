//! Typed, validated command-line arguments for the QEMU process.
//!
//! Every argument is validated when it is constructed. Rendered output is
//! concatenated into the QEMU argv without any escaping, so nothing here may
//! hand out an argument that has not passed [`validate`].

pub mod arg;
pub mod flag;
pub mod kv;
pub mod list;
pub mod profile;
pub mod string;
pub mod validate;

pub use arg::{Arg, ArgAcceptedValue, ArgError};
pub use flag::FlagArg;
pub use kv::{KeyValueArg, KeyValueArgItem};
pub use list::ArgList;
pub use profile::build_vm_args;
pub use string::StringArg;
