use std::fmt::{Formatter, Result as FmtResult};

const INDENT: &str = "  ";

pub fn get_indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

/// Indented multi-line rendering for nested plan structures; `depth` is the
/// nesting level, not a column.
pub trait PrettyDisplay {
    fn pretty_fmt(&self, f: &mut Formatter<'_>, depth: usize) -> FmtResult;
}
