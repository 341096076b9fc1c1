//! Grammar definitions
//!
//!     A [Grammar] is the loaded, immutable form of one Kate syntax definition. It is built once
//!     by the [loader](crate::syntax::loader) and afterwards only read, so a single instance can
//!     be shared (behind an `Arc`) by any number of documents and threads parsing at once.
//!
//!     Everything the engine needs lives here: keyword lists, the attribute table, and the
//!     contexts in declaration order. The first declared context is the initial one.

use crate::syntax::context::{Context, ContextId};
use crate::syntax::engine::{self, LineResult};
use crate::syntax::error::ParseError;
use crate::syntax::format::{Format, FormatMap};
use crate::syntax::stack::{self, ContextStack};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Characters treated as word boundaries unless the grammar says otherwise
pub const DEFAULT_DELIMINATORS: &str = " \t.():!+,-<=>%&*/;?[]^{|}~\\";

/// Descriptive attributes of the grammar's root element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarMetadata {
    pub section: Option<String>,
    pub extensions: Vec<String>,
    pub mimetypes: Vec<String>,
    pub version: Option<String>,
    pub kate_version: Option<String>,
    pub priority: Option<i32>,
    pub author: Option<String>,
    pub license: Option<String>,
}

/// Identity of one loaded grammar, shared by its clones and recorded in every stack it builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GrammarStamp(u64);

impl GrammarStamp {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        GrammarStamp(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) stamp: GrammarStamp,
    pub(crate) name: String,
    pub(crate) metadata: GrammarMetadata,
    pub(crate) deliminators: BTreeSet<char>,
    pub(crate) case_sensitive: bool,
    /// Keyword lists in declaration order
    pub(crate) lists: Vec<(String, Vec<String>)>,
    pub(crate) list_index: HashMap<String, usize>,
    pub(crate) formats: FormatMap,
    pub(crate) contexts: Vec<Context>,
    pub(crate) context_index: HashMap<String, ContextId>,
}

impl Grammar {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn stamp(&self) -> GrammarStamp {
        self.stamp
    }

    pub fn metadata(&self) -> &GrammarMetadata {
        &self.metadata
    }

    /// Word-boundary set from the grammar. No current rule kind consults it; it is kept for
    /// word-boundary rules such as `WordDetect` and `Int`.
    pub fn is_deliminator(&self, c: char) -> bool {
        self.deliminators.contains(&c)
    }

    pub fn deliminators(&self) -> impl Iterator<Item = char> + '_ {
        self.deliminators.iter().copied()
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Entries of a keyword list, lowercased if the grammar is case-insensitive
    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.list_index
            .get(name)
            .map(|index| self.lists[*index].1.as_slice())
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.lists
            .iter()
            .map(|(name, words)| (name.as_str(), words.as_slice()))
    }

    pub fn formats(&self) -> &FormatMap {
        &self.formats
    }

    /// Resolve an attribute name (case-insensitively) to a format
    pub fn format_for(&self, attribute: &str) -> Option<Format> {
        self.formats.resolve(attribute)
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// # Panics
    ///
    /// If `id` is out of range for this grammar. Ids taken from a stack that
    /// [belongs to](ContextStack::belongs_to) this grammar are always in range.
    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.0]
    }

    pub fn context_id(&self, name: &str) -> Option<ContextId> {
        self.context_index.get(name).copied()
    }

    pub fn context_by_name(&self, name: &str) -> Option<&Context> {
        self.context_id(name).map(|id| self.context(id))
    }

    /// The initial context: the first one declared
    pub fn default_context(&self) -> ContextId {
        ContextId(0)
    }

    /// The stack a fresh document starts from, `[default]`
    pub fn initial_stack(&self) -> ContextStack {
        ContextStack::new(self.stamp, self.default_context())
    }

    /// See [stack::apply_operation]
    pub fn apply_operation(
        &self,
        stack: &ContextStack,
        operation: &str,
    ) -> Result<ContextStack, ParseError> {
        stack::apply_operation(self, stack, operation)
    }

    /// See [engine::parse_line]
    pub fn parse_line(
        &self,
        previous: Option<&ContextStack>,
        text: &str,
    ) -> Result<LineResult, ParseError> {
        engine::parse_line(self, previous, text)
    }

    /// Context names of a stack, bottom first. Ids this grammar does not define are skipped.
    pub fn stack_names(&self, stack: &ContextStack) -> Vec<String> {
        stack
            .to_vec()
            .into_iter()
            .filter_map(|id| self.contexts.get(id.index()))
            .map(|context| context.name.clone())
            .collect()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Syntax {}", self.name)?;
        if let Some(section) = &self.metadata.section {
            writeln!(f, "    section: {}", section)?;
        }
        if !self.metadata.extensions.is_empty() {
            writeln!(f, "    extensions: {}", self.metadata.extensions.join(";"))?;
        }
        writeln!(f, "    casesensitive: {}", self.case_sensitive)?;
        writeln!(f, "    Default context: {}", self.context(self.default_context()).name)?;
        for (name, words) in &self.lists {
            writeln!(f, "    List {}: {:?}", name, words)?;
        }
        for context in &self.contexts {
            write!(f, "{}", context)?;
        }
        Ok(())
    }
}
