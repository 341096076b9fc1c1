//! Syntax highlighting tokenizer
//!
//!     Kate syntax definitions describe a language as a set of named contexts, each an ordered
//!     list of rules. A document is highlighted one line at a time: the parser takes the context
//!     stack left by the previous line, scans the current line, and returns the segments it
//!     found together with the stack to feed into the next line. Because that stack is the only
//!     state carried between lines, an editor can re-highlight from any line whose incoming
//!     stack it kept.
//!
//! Layout
//!
//!     - [xml]: reads grammar documents into a small element tree.
//!     - [loader]: builds an immutable [Grammar] from that tree, [validation] checks it.
//!     - [format], [context], [rules]: the pieces a grammar is made of.
//!     - [stack]: the persistent context stack and the context operation algebra.
//!     - [engine]: the per-line scan.
//!     - [registry]: an explicit, host-owned cache of loaded grammars.
//!
//! Usage
//!
//!     let grammar = load_grammar(&source)?;
//!     let mut stack = grammar.initial_stack();
//!     for line in text.lines() {
//!         let result = grammar.parse_line(Some(&stack), line)?;
//!         paint(result.spans(&grammar));
//!         stack = result.stack;
//!     }

pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod grammar;
pub mod loader;
pub mod registry;
pub mod rules;
pub mod stack;
pub mod validation;
pub mod xml;

pub use context::{Context, ContextId};
pub use engine::{
    parse_line, FormatSpan, LineResult, MatchSummary, RuleMatch, RuleRef, Segment, SegmentSummary,
};
pub use error::{LoadError, ParseError};
pub use format::{Format, FormatMap};
pub use grammar::{Grammar, GrammarMetadata};
pub use loader::{load_grammar, load_grammar_file, load_grammar_with, LoadOptions};
pub use registry::SyntaxRegistry;
pub use rules::{Rule, RuleKind};
pub use stack::{apply_operation, ContextStack};
