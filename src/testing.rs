//! Testing utilities
//!
//!     Grammar fixtures live in `samples/` at the crate root. Each one is a small but complete
//!     Kate definition that loads with validation on; tests should reach for these instead of
//!     inlining large XML strings, and extend a sample (or add a new one) when a case is missing.
//!
//!     The helpers panic on failure, as a missing or broken fixture is a test bug.

use crate::syntax::engine::LineResult;
use crate::syntax::error::ParseError;
use crate::syntax::grammar::Grammar;
use crate::syntax::loader::load_grammar;
use std::path::{Path, PathBuf};

/// Path of a file under `samples/`
///
/// # Example
/// ```rust,ignore
/// let path = samples_path("c-mini.xml");
/// ```
pub fn samples_path(relative_path: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("samples").join(relative_path)
}

pub fn sample_source(relative_path: &str) -> String {
    let path = samples_path(relative_path);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read sample {}: {}", path.display(), err))
}

/// Load a grammar from `samples/` with default options
pub fn load_sample(relative_path: &str) -> Grammar {
    load_grammar(&sample_source(relative_path))
        .unwrap_or_else(|err| panic!("sample {} failed to load: {}", relative_path, err))
}

/// Tokenize every line of `text`, threading the context stack from line to line
pub fn tokenize(grammar: &Grammar, text: &str) -> Result<Vec<LineResult>, ParseError> {
    let mut results: Vec<LineResult> = Vec::new();
    for line in text.lines() {
        let result = grammar.parse_line(results.last().map(|r| &r.stack), line)?;
        results.push(result);
    }
    Ok(results)
}

/// [LineResult::render] for every line of `text`, each block prefixed with its line number
pub fn render_lines(grammar: &Grammar, text: &str) -> String {
    let results =
        tokenize(grammar, text).unwrap_or_else(|err| panic!("tokenizing failed: {}", err));
    results
        .iter()
        .enumerate()
        .map(|(number, result)| format!("{}:\n{}", number + 1, result.render(grammar)))
        .collect::<Vec<_>>()
        .join("\n")
}
