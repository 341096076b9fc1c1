//! Contexts
//!
//!     A context is a named lexer state: an ordered rule list, the format used for characters no
//!     rule claims, and the operations to run at end of line and on fallthrough.

use crate::syntax::format::Format;
use crate::syntax::rules::Rule;
use serde::Serialize;
use std::fmt;

/// Index of a context inside its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContextId(pub(crate) usize);

impl ContextId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) id: ContextId,
    pub(crate) name: String,
    pub(crate) format: Format,
    pub(crate) line_end_context: String,
    pub(crate) fallthrough_context: Option<String>,
    pub(crate) dynamic: bool,
    pub(crate) rules: Vec<Rule>,
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format for characters that no rule matched
    pub fn format(&self) -> Format {
        self.format
    }

    /// Operation applied when scanning reaches the end of a line (`#stay` unless declared)
    pub fn line_end_context(&self) -> &str {
        &self.line_end_context
    }

    /// Operation declared for fallthrough, present only when `fallthrough="true"`.
    ///
    /// The engine does not run it yet: when it should fire (per attempt or for a whole line
    /// with no matches) is still open, so it is kept as data only.
    pub fn fallthrough_context(&self) -> Option<&str> {
        self.fallthrough_context.as_deref()
    }

    /// Whether rule patterns may carry placeholders bound when the context is pushed.
    /// Stored as metadata; no placeholder substitution happens.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Format of text matched by the rule at `index`
    pub fn rule_format(&self, index: usize) -> Format {
        self.rules
            .get(index)
            .and_then(|rule| rule.format)
            .unwrap_or(self.format)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    Context {}", self.name)?;
        writeln!(f, "        attribute: {}", self.format)?;
        writeln!(f, "        lineEndContext: {}", self.line_end_context)?;
        if let Some(fallthrough) = &self.fallthrough_context {
            writeln!(f, "        fallthroughContext: {}", fallthrough)?;
        }
        writeln!(f, "        dynamic: {}", self.dynamic)?;
        for rule in &self.rules {
            writeln!(f, "        Rule {}", rule)?;
            if let Some(format) = rule.format {
                writeln!(f, "            format: {}", format)?;
            }
            if let Some(operation) = &rule.context_operation {
                writeln!(f, "            context: {}", operation)?;
            }
            if let Some(column) = rule.column {
                writeln!(f, "            column: {}", column)?;
            }
        }
        Ok(())
    }
}
