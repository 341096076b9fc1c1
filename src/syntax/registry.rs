//! Grammar registry
//!
//!     Grammars are expensive to build and cheap to share, so hosts load each one once and hand
//!     out `Arc<Grammar>` clones. The registry is an ordinary value owned by the host: there is
//!     no process-wide cache, and nothing is loaded, replaced or dropped unless the host asks.
//!
//!     Keys resolve to files by trying, in each search path in order, `<key>` and then
//!     `<key>.<extension>`.

use crate::config::KatelineConfig;
use crate::syntax::error::LoadError;
use crate::syntax::grammar::Grammar;
use crate::syntax::loader::{load_grammar_file, load_grammar_with, LoadOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_EXTENSION: &str = "xml";

#[derive(Debug, Clone)]
pub struct SyntaxRegistry {
    search_paths: Vec<PathBuf>,
    extension: String,
    options: LoadOptions,
    grammars: HashMap<String, Arc<Grammar>>,
}

impl SyntaxRegistry {
    pub fn new(options: LoadOptions) -> Self {
        SyntaxRegistry {
            search_paths: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            options,
            grammars: HashMap::new(),
        }
    }

    /// Search paths, extension and load options taken from the `registry` and `loading` sections
    pub fn from_config(config: &KatelineConfig) -> Self {
        SyntaxRegistry {
            search_paths: config.registry.search_paths.iter().map(PathBuf::from).collect(),
            extension: config.registry.extension.clone(),
            options: config.loading.load_options(),
            grammars: HashMap::new(),
        }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Build a grammar from in-memory source and store it under `key`, replacing any previous
    /// entry
    pub fn register_source(&mut self, key: &str, source: &str) -> Result<Arc<Grammar>, LoadError> {
        let grammar = Arc::new(load_grammar_with(source, &self.options)?);
        self.grammars.insert(key.to_string(), Arc::clone(&grammar));
        debug!(key, grammar = grammar.name(), "registered grammar source");
        Ok(grammar)
    }

    /// The grammar for `key`, loading it from the search paths on first use
    pub fn load(&mut self, key: &str) -> Result<Arc<Grammar>, LoadError> {
        if let Some(grammar) = self.grammars.get(key) {
            return Ok(Arc::clone(grammar));
        }
        self.reload(key)
    }

    /// Read the grammar file for `key` again and replace the cached entry.
    ///
    /// Documents still holding the previous `Arc` keep using the old grammar. Stacks the old
    /// grammar produced are refused by the new one with
    /// [ParseError::ForeignStack](crate::syntax::ParseError::ForeignStack), so cached line state
    /// must be dropped after a reload. On failure the cached entry is left as it was.
    pub fn reload(&mut self, key: &str) -> Result<Arc<Grammar>, LoadError> {
        let path = self.locate(key)?;
        let grammar = Arc::new(load_grammar_file(&path, &self.options)?);
        debug!(key, path = %path.display(), grammar = grammar.name(), "loaded grammar file");
        self.grammars.insert(key.to_string(), Arc::clone(&grammar));
        Ok(grammar)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Grammar>> {
        self.grammars.get(key).cloned()
    }

    pub fn unload(&mut self, key: &str) -> Option<Arc<Grammar>> {
        let removed = self.grammars.remove(key);
        if removed.is_some() {
            debug!(key, "unloaded grammar");
        }
        removed
    }

    /// Registered keys, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.grammars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn locate(&self, key: &str) -> Result<PathBuf, LoadError> {
        let mut searched = Vec::new();
        for directory in &self.search_paths {
            let candidates = [
                directory.join(key),
                directory.join(format!("{}.{}", key, self.extension)),
            ];
            for candidate in candidates {
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate.display().to_string());
            }
        }
        Err(LoadError::NotFound {
            name: key.to_string(),
            searched,
        })
    }
}

impl Default for SyntaxRegistry {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::error::ParseError;
    use std::fs;

    fn grammar_xml(name: &str) -> String {
        format!(
            r#"<language name="{}">
  <highlighting>
    <contexts><context name="Normal" attribute="Normal"/></contexts>
  </highlighting>
</language>"#,
            name
        )
    }

    #[test]
    fn test_load_caches_by_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.xml"), grammar_xml("Plain")).unwrap();
        let mut registry = SyntaxRegistry::default().with_search_path(dir.path());

        let first = registry.load("plain").unwrap();
        let second = registry.load("plain").unwrap();
        assert_eq!(first.name(), "Plain");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &registry.get("plain").unwrap()));
        assert_eq!(registry.names(), vec!["plain"]);
    }

    #[test]
    fn test_key_may_carry_its_own_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.xml"), grammar_xml("Plain")).unwrap();
        let mut registry = SyntaxRegistry::default().with_search_path(dir.path());
        assert_eq!(registry.load("plain.xml").unwrap().name(), "Plain");
    }

    #[test]
    fn test_later_search_paths_are_fallbacks() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("a.xml"), grammar_xml("First")).unwrap();
        fs::write(second.path().join("a.xml"), grammar_xml("Second")).unwrap();
        fs::write(second.path().join("b.xml"), grammar_xml("OnlySecond")).unwrap();
        let mut registry = SyntaxRegistry::default()
            .with_search_path(first.path())
            .with_search_path(second.path());
        assert_eq!(registry.load("a").unwrap().name(), "First");
        assert_eq!(registry.load("b").unwrap().name(), "OnlySecond");
    }

    #[test]
    fn test_reload_replaces_cached_grammar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.xml");
        fs::write(&path, grammar_xml("Before")).unwrap();
        let mut registry = SyntaxRegistry::default().with_search_path(dir.path());
        let before = registry.load("live").unwrap();

        fs::write(&path, grammar_xml("After")).unwrap();
        assert_eq!(registry.load("live").unwrap().name(), "Before");
        let after = registry.reload("live").unwrap();
        assert_eq!(after.name(), "After");
        assert_eq!(before.name(), "Before");
        assert_eq!(registry.get("live").unwrap().name(), "After");
    }

    #[test]
    fn test_stack_cached_before_reload_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.xml");
        fs::write(
            &path,
            r#"<language name="Nested">
  <highlighting>
    <contexts>
      <context name="Normal" attribute="Normal"><DetectChar char="(" context="A"/></context>
      <context name="A" attribute="Normal"><DetectChar char="(" context="B"/></context>
      <context name="B" attribute="Normal"/>
    </contexts>
  </highlighting>
</language>"#,
        )
        .unwrap();
        let mut registry = SyntaxRegistry::default().with_search_path(dir.path());
        let old = registry.load("nested").unwrap();
        let stack = old.parse_line(None, "((").unwrap().stack;
        assert_eq!(old.stack_names(&stack), vec!["Normal", "A", "B"]);

        fs::write(&path, grammar_xml("Nested")).unwrap();
        let new = registry.reload("nested").unwrap();
        assert_eq!(
            new.parse_line(Some(&stack), "x").unwrap_err(),
            ParseError::ForeignStack {
                grammar: "Nested".to_string()
            }
        );
        assert!(old.parse_line(Some(&stack), "x").is_ok());
    }

    #[test]
    fn test_failed_reload_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.xml");
        fs::write(&path, grammar_xml("Good")).unwrap();
        let mut registry = SyntaxRegistry::default().with_search_path(dir.path());
        registry.load("live").unwrap();

        fs::write(&path, "<language>").unwrap();
        assert!(registry.reload("live").is_err());
        assert_eq!(registry.get("live").unwrap().name(), "Good");
    }

    #[test]
    fn test_unload() {
        let mut registry = SyntaxRegistry::default();
        registry.register_source("mem", &grammar_xml("Memory")).unwrap();
        assert!(registry.unload("mem").is_some());
        assert!(registry.get("mem").is_none());
        assert!(registry.unload("mem").is_none());
    }

    #[test]
    fn test_missing_file_lists_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = SyntaxRegistry::default()
            .with_search_path(dir.path())
            .with_extension(".kate");
        match registry.load("ghost").unwrap_err() {
            LoadError::NotFound { name, searched } => {
                assert_eq!(name, "ghost");
                assert_eq!(searched.len(), 2);
                assert!(searched[1].ends_with("ghost.kate"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
