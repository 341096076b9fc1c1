//! Grammar loader
//!
//!     Turns a Kate syntax definition (XML) into an immutable [Grammar]. Loading happens once
//!     per grammar; all name resolution that can happen here does happen here, so parsing a line
//!     never has to look at strings it could have checked up front:
//!
//!         - attribute names on contexts and rules are resolved to formats,
//!         - keyword rules must name an existing list,
//!         - regular expressions are decoded and compiled,
//!         - with validation on, every context operation is checked, see
//!           [validation](crate::syntax::validation).
//!
//!     Document shape:
//!
//!         <language name=".." casesensitive=".." ...>
//!           <highlighting>
//!             <list name="..."><item>...</item></list>
//!             <contexts>
//!               <context name=".." attribute=".." lineEndContext=".."> rules </context>
//!             </contexts>
//!             <itemDatas><itemData name=".." defStyleNum=".."/></itemDatas>
//!           </highlighting>
//!           <general><keywords casesensitive=".." weakDeliminator=".."/></general>
//!         </language>

use crate::syntax::context::{Context, ContextId};
use crate::syntax::error::LoadError;
use crate::syntax::format::{Format, FormatMap};
use crate::syntax::grammar::{Grammar, GrammarMetadata, GrammarStamp, DEFAULT_DELIMINATORS};
use crate::syntax::rules::{RegexRule, ReservedRule, Rule, RuleKind};
use crate::syntax::stack::STAY;
use crate::syntax::validation;
use crate::syntax::xml::{self, Element};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Name used in messages for grammars whose root carries no `name`
const UNNAMED: &str = "<unnamed>";

/// How deep static validation follows context pushes
pub const DEFAULT_VALIDATION_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Check context references and `#pop` depths before handing out the grammar
    pub validate: bool,
    pub max_validation_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            validate: true,
            max_validation_depth: DEFAULT_VALIDATION_DEPTH,
        }
    }
}

/// Load a grammar with default options (validation on)
pub fn load_grammar(source: &str) -> Result<Grammar, LoadError> {
    load_grammar_with(source, &LoadOptions::default())
}

pub fn load_grammar_with(source: &str, options: &LoadOptions) -> Result<Grammar, LoadError> {
    let root = xml::parse_document(source)?;
    let grammar = build_grammar(&root)?;
    if options.validate {
        validation::validate(&grammar, options.max_validation_depth)?;
    }
    debug!(
        grammar = grammar.name(),
        contexts = grammar.contexts().len(),
        lists = grammar.lists().count(),
        "loaded grammar"
    );
    Ok(grammar)
}

pub fn load_grammar_file<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<Grammar, LoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|err| LoadError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    load_grammar_with(&source, options)
}

fn build_grammar(root: &Element) -> Result<Grammar, LoadError> {
    let name = root.attr("name").unwrap_or(UNNAMED).to_string();
    let reader = GrammarReader { grammar: &name };

    let mut case_sensitive = true;
    let mut deliminators: BTreeSet<char> = DEFAULT_DELIMINATORS.chars().collect();
    let keywords = root.child("general").and_then(|general| general.child("keywords"));
    for element in std::iter::once(root).chain(keywords) {
        let label = format!("<{}>", element.name);
        if let Some(value) = element.attr("casesensitive") {
            case_sensitive = reader.parse_bool(&label, "casesensitive", value)?;
        }
        if let Some(value) = element.attr("deliminator") {
            deliminators = value.chars().collect();
        }
        if let Some(value) = element.attr("additionalDeliminator") {
            deliminators.extend(value.chars());
        }
        if let Some(value) = element.attr("weakDeliminator") {
            for c in value.chars() {
                deliminators.remove(&c);
            }
        }
    }

    let metadata = reader.metadata(root)?;
    let highlighting = reader.required_child(root, "highlighting")?;
    let (lists, list_index) = reader.lists(highlighting, case_sensitive)?;
    let formats = reader.formats(highlighting)?;

    let mut contexts: Vec<Context> = Vec::new();
    let mut context_index = HashMap::new();
    for element in reader
        .required_child(highlighting, "contexts")?
        .children_named("context")
    {
        let id = ContextId(contexts.len());
        let context = reader.context(element, id, &formats, &list_index)?;
        if context_index.insert(context.name.clone(), id).is_some() {
            return Err(LoadError::DuplicateContext {
                grammar: name.clone(),
                context: context.name,
            });
        }
        contexts.push(context);
    }
    if contexts.is_empty() {
        return Err(LoadError::NoContexts { grammar: name });
    }

    Ok(Grammar {
        stamp: GrammarStamp::fresh(),
        name,
        metadata,
        deliminators,
        case_sensitive,
        lists,
        list_index,
        formats,
        contexts,
        context_index,
    })
}

type KeywordLists = (Vec<(String, Vec<String>)>, HashMap<String, usize>);

struct GrammarReader<'a> {
    grammar: &'a str,
}

impl<'a> GrammarReader<'a> {
    fn metadata(&self, root: &Element) -> Result<GrammarMetadata, LoadError> {
        let priority = root
            .attr("priority")
            .map(|value| {
                value
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| self.invalid("<language>", "priority", value))
            })
            .transpose()?;
        Ok(GrammarMetadata {
            section: root.attr("section").map(String::from),
            extensions: split_list(root.attr("extensions")),
            mimetypes: split_list(root.attr("mimetype")),
            version: root.attr("version").map(String::from),
            kate_version: root.attr("kateversion").map(String::from),
            priority,
            author: root.attr("author").map(String::from),
            license: root.attr("license").map(String::from),
        })
    }

    fn lists(&self, highlighting: &Element, case_sensitive: bool) -> Result<KeywordLists, LoadError> {
        let mut lists: Vec<(String, Vec<String>)> = Vec::new();
        let mut index = HashMap::new();
        for element in highlighting.children_named("list") {
            let name = self.required_attr(element, "<list>", "name")?.to_string();
            let words: Vec<String> = element
                .children_named("item")
                .map(|item| item.text.trim())
                .filter(|word| !word.is_empty())
                .map(|word| {
                    if case_sensitive {
                        word.to_string()
                    } else {
                        word.to_lowercase()
                    }
                })
                .collect();
            if let Some(&existing) = index.get(&name) {
                lists[existing] = (name, words);
            } else {
                index.insert(name.clone(), lists.len());
                lists.push((name, words));
            }
        }
        Ok((lists, index))
    }

    fn formats(&self, highlighting: &Element) -> Result<FormatMap, LoadError> {
        let mut formats = FormatMap::new();
        let Some(item_datas) = highlighting.child("itemDatas") else {
            return Ok(formats);
        };
        for item in item_datas.children_named("itemData") {
            let name = self.required_attr(item, "<itemData>", "name")?;
            // custom formats without a default style render as normal text
            let format = match item.attr("defStyleNum") {
                None => Format::Normal,
                Some(style) => {
                    Format::from_style_name(style.trim()).ok_or_else(|| LoadError::UnknownFormat {
                        grammar: self.grammar.to_string(),
                        item: name.to_string(),
                        format: style.to_string(),
                    })?
                }
            };
            formats.declare(name, format);
        }
        Ok(formats)
    }

    fn context(
        &self,
        element: &Element,
        id: ContextId,
        formats: &FormatMap,
        lists: &HashMap<String, usize>,
    ) -> Result<Context, LoadError> {
        let name = self.required_attr(element, "<context>", "name")?.to_string();
        let label = format!("context '{}'", name);
        let attribute = self.required_attr(element, &label, "attribute")?;
        let format = self.resolve_format(formats, &label, attribute)?;
        let line_end_context = element.attr("lineEndContext").unwrap_or(STAY).to_string();
        let fallthrough_context = if self.optional_bool(element, &label, "fallthrough")? == Some(true)
        {
            Some(self.required_attr(element, &label, "fallthroughContext")?.to_string())
        } else {
            None
        };
        let dynamic = self
            .optional_bool(element, &label, "dynamic")?
            .unwrap_or(false);
        let rules = element
            .children
            .iter()
            .map(|child| self.rule(child, &name, formats, lists))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Context {
            id,
            name,
            format,
            line_end_context,
            fallthrough_context,
            dynamic,
            rules,
        })
    }

    fn rule(
        &self,
        element: &Element,
        context: &str,
        formats: &FormatMap,
        lists: &HashMap<String, usize>,
    ) -> Result<Rule, LoadError> {
        let label = format!("<{}> in context '{}'", element.name, context);
        let kind = match element.name.as_str() {
            "DetectChar" => RuleKind::DetectChar(self.single_char(element, &label, "char")?),
            "Detect2Chars" => {
                let mut literal = String::new();
                literal.push(self.single_char(element, &label, "char")?);
                literal.push(self.single_char(element, &label, "char1")?);
                RuleKind::Detect2Chars(literal)
            }
            "StringDetect" => {
                RuleKind::StringDetect(self.required_attr(element, &label, "String")?.to_string())
            }
            "keyword" => {
                let list = self.required_attr(element, &label, "String")?;
                if !lists.contains_key(list) {
                    return Err(LoadError::UnknownList {
                        grammar: self.grammar.to_string(),
                        context: context.to_string(),
                        list: list.to_string(),
                    });
                }
                RuleKind::Keyword(list.to_string())
            }
            "RegExpr" => {
                let pattern = self.required_attr(element, &label, "String")?;
                let insensitive = self
                    .optional_bool(element, &label, "insensitive")?
                    .unwrap_or(false);
                let regex =
                    RegexRule::new(pattern, insensitive).map_err(|err| LoadError::InvalidPattern {
                        grammar: self.grammar.to_string(),
                        context: context.to_string(),
                        pattern: pattern.to_string(),
                        message: err.to_string(),
                    })?;
                RuleKind::RegExpr(regex)
            }
            tag => match ReservedRule::from_tag(tag) {
                Some(reserved) => RuleKind::Reserved(reserved),
                None => {
                    return Err(LoadError::UnsupportedRule {
                        grammar: self.grammar.to_string(),
                        context: context.to_string(),
                        tag: tag.to_string(),
                    })
                }
            },
        };

        if !element.children.is_empty() {
            debug!(
                grammar = self.grammar,
                context,
                rule = %element.name,
                "ignoring {} nested rule(s)",
                element.children.len()
            );
        }

        let mut rule = Rule::new(kind);
        rule.format = element
            .attr("attribute")
            .map(|attribute| self.resolve_format(formats, &label, attribute))
            .transpose()?;
        rule.context_operation = element.attr("context").map(String::from);
        rule.column = element
            .attr("column")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| self.invalid(&label, "column", value))
            })
            .transpose()?;
        Ok(rule)
    }

    fn required_child<'e>(
        &self,
        element: &'e Element,
        name: &'static str,
    ) -> Result<&'e Element, LoadError> {
        element.child(name).ok_or_else(|| LoadError::MissingElement {
            grammar: self.grammar.to_string(),
            element: name,
        })
    }

    fn required_attr<'e>(
        &self,
        element: &'e Element,
        label: &str,
        attribute: &'static str,
    ) -> Result<&'e str, LoadError> {
        element
            .attr(attribute)
            .ok_or_else(|| LoadError::MissingAttribute {
                grammar: self.grammar.to_string(),
                element: label.to_string(),
                attribute,
            })
    }

    fn single_char(
        &self,
        element: &Element,
        label: &str,
        attribute: &'static str,
    ) -> Result<char, LoadError> {
        let value = self.required_attr(element, label, attribute)?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(self.invalid(label, attribute, value)),
        }
    }

    fn optional_bool(
        &self,
        element: &Element,
        label: &str,
        attribute: &'static str,
    ) -> Result<Option<bool>, LoadError> {
        element
            .attr(attribute)
            .map(|value| self.parse_bool(label, attribute, value))
            .transpose()
    }

    fn parse_bool(&self, label: &str, attribute: &'static str, value: &str) -> Result<bool, LoadError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(self.invalid(label, attribute, value)),
        }
    }

    fn resolve_format(
        &self,
        formats: &FormatMap,
        label: &str,
        attribute: &str,
    ) -> Result<Format, LoadError> {
        formats
            .resolve(attribute)
            .ok_or_else(|| LoadError::UnknownAttribute {
                grammar: self.grammar.to_string(),
                element: label.to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn invalid(&self, label: &str, attribute: &'static str, value: &str) -> LoadError {
        LoadError::InvalidAttribute {
            grammar: self.grammar.to_string(),
            element: label.to_string(),
            attribute,
            value: value.to_string(),
        }
    }
}

/// Split a `;` separated attribute such as `extensions="*.c;*.h"`
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|value| {
            value
                .split(';')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE language SYSTEM "language.dtd">
<language name="Mini" section="Sources" extensions="*.mini; *.mn;" mimetype="text/x-mini"
          version="3" kateversion="2.4" priority="5" author="someone" license="LGPL"
          casesensitive="0">
  <highlighting>
    <list name="types">
      <item> Int </item>
      <item>FLOAT</item>
      <item>  </item>
    </list>
    <contexts>
      <context name="Normal" attribute="Normal Text" lineEndContext="#stay">
        <keyword String="types" attribute="Data Type"/>
        <DetectChar char="#" attribute="Preprocessor" context="Pre" column="0"/>
        <Int attribute="Decimal"/>
        <RegExpr String="[a-z]+" insensitive="true"/>
      </context>
      <context name="Pre" attribute="Preprocessor" lineEndContext="#pop"
               fallthrough="true" fallthroughContext="#pop" dynamic="true">
        <Detect2Chars char="/" char1="/" context="#pop"/>
      </context>
    </contexts>
    <itemDatas>
      <itemData name="Normal Text" defStyleNum="dsNormal"/>
      <itemData name="Data Type" defStyleNum="dsDataType"/>
      <itemData name="Decimal" defStyleNum="dsDecVal"/>
      <itemData name="Preprocessor"/>
    </itemDatas>
  </highlighting>
  <general>
    <keywords weakDeliminator="." additionalDeliminator="@"/>
  </general>
</language>"##;

    #[test]
    fn test_loads_metadata() {
        let grammar = load_grammar(GRAMMAR).unwrap();
        let metadata = grammar.metadata();
        assert_eq!(grammar.name(), "Mini");
        assert_eq!(metadata.section.as_deref(), Some("Sources"));
        assert_eq!(metadata.extensions, vec!["*.mini", "*.mn"]);
        assert_eq!(metadata.mimetypes, vec!["text/x-mini"]);
        assert_eq!(metadata.priority, Some(5));
        assert_eq!(metadata.kate_version.as_deref(), Some("2.4"));
    }

    #[test]
    fn test_case_insensitive_lists_are_lowercased_once() {
        let grammar = load_grammar(GRAMMAR).unwrap();
        assert!(!grammar.case_sensitive());
        assert_eq!(
            grammar.list("types"),
            Some(&["int".to_string(), "float".to_string()][..])
        );
    }

    #[test]
    fn test_deliminator_overrides() {
        let grammar = load_grammar(GRAMMAR).unwrap();
        assert!(grammar.is_deliminator(' '));
        assert!(grammar.is_deliminator('@'));
        assert!(!grammar.is_deliminator('.'));
        assert!(!grammar.is_deliminator('a'));
    }

    #[test]
    fn test_contexts_keep_declaration_order_and_defaults() {
        let grammar = load_grammar(GRAMMAR).unwrap();
        let names: Vec<_> = grammar.contexts().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Normal", "Pre"]);
        assert_eq!(grammar.default_context(), grammar.context_id("Normal").unwrap());

        let pre = grammar.context_by_name("Pre").unwrap();
        assert_eq!(pre.format(), Format::Normal);
        assert_eq!(pre.line_end_context(), "#pop");
        assert_eq!(pre.fallthrough_context(), Some("#pop"));
        assert!(pre.is_dynamic());

        let normal = grammar.context_by_name("Normal").unwrap();
        let tags: Vec<_> = normal.rules().iter().map(|r| r.tag()).collect();
        assert_eq!(tags, vec!["keyword", "DetectChar", "Int", "RegExpr"]);
        assert_eq!(normal.rules()[0].format, Some(Format::DataType));
        assert_eq!(normal.rules()[1].column, Some(0));
        assert_eq!(normal.rules()[1].context_operation.as_deref(), Some("Pre"));
        assert_eq!(normal.rules()[3].format, None);
        assert_eq!(normal.rule_format(3), Format::Normal);
        assert!(!normal.is_dynamic());
        assert_eq!(normal.fallthrough_context(), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("*.c;*.h; ;")), vec!["*.c", "*.h"]);
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_load_grammar_file_reports_missing_path() {
        let err = load_grammar_file("/definitely/not/here.xml", &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
