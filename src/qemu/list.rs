use std::fmt;

use super::arg::{Arg, ArgAcceptedValue};

/// Ordered QEMU arguments, rendered to an argv with [`ArgList::to_argv`].
#[derive(Debug, Default)]
pub struct ArgList {
    args: Vec<Box<dyn Arg>>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, arg: impl Arg + 'static) -> &mut Self {
        self.args.push(Box::new(arg));
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Arg> {
        self.args.iter().map(|a| a.as_ref())
    }

    /// First argument with the given key, if any.
    pub fn get(&self, key: &str) -> Option<&dyn Arg> {
        self.iter().find(|a| a.string_key() == key)
    }

    /// `-key` for every argument, followed by its value unless it is a flag.
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            argv.push(format!("-{}", arg.string_key()));
            if arg.value_type() != ArgAcceptedValue::None {
                argv.push(arg.string_value());
            }
        }
        argv
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.to_argv()))
    }
}
