//! Rules
//!
//!     A rule is a single pattern/action unit inside a context. Each one tries to match at the
//!     very start of the remaining line text and reports how many bytes it consumed. Rules never
//!     search ahead: if the text does not begin with the rule's pattern the rule simply does not
//!     fire, and the engine moves on to the next rule in declaration order.
//!
//! Rule Kinds
//!
//!     One variant per Kate rule tag:
//!
//!         - DetectChar: a single character.
//!         - Detect2Chars: a two character literal.
//!         - StringDetect: an arbitrary literal.
//!         - keyword: a prefix from a named keyword list, tried in list order (first entry
//!           that is a prefix wins, not the longest one).
//!         - RegExpr: a regular expression anchored at the current column.
//!         - Reserved kinds (numbers, C escapes, ranges, includes...) load fine but never match.
//!
//!     Besides its kind, every rule may carry a format override, a context operation to run
//!     when it fires and a required column.

use crate::syntax::format::Format;
use crate::syntax::grammar::Grammar;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::fmt;

/// Rule tags that are accepted in grammars but have no matching behavior yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedRule {
    AnyChar,
    WordDetect,
    Int,
    Float,
    HlCOct,
    HlCHex,
    HlCStringChar,
    HlCChar,
    RangeDetect,
    LineContinue,
    IncludeRules,
    DetectSpaces,
    DetectIdentifier,
}

impl ReservedRule {
    pub const ALL: [ReservedRule; 13] = [
        ReservedRule::AnyChar,
        ReservedRule::WordDetect,
        ReservedRule::Int,
        ReservedRule::Float,
        ReservedRule::HlCOct,
        ReservedRule::HlCHex,
        ReservedRule::HlCStringChar,
        ReservedRule::HlCChar,
        ReservedRule::RangeDetect,
        ReservedRule::LineContinue,
        ReservedRule::IncludeRules,
        ReservedRule::DetectSpaces,
        ReservedRule::DetectIdentifier,
    ];

    pub fn from_tag(tag: &str) -> Option<ReservedRule> {
        ReservedRule::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ReservedRule::AnyChar => "AnyChar",
            ReservedRule::WordDetect => "WordDetect",
            ReservedRule::Int => "Int",
            ReservedRule::Float => "Float",
            ReservedRule::HlCOct => "HlCOct",
            ReservedRule::HlCHex => "HlCHex",
            ReservedRule::HlCStringChar => "HlCStringChar",
            ReservedRule::HlCChar => "HlCChar",
            ReservedRule::RangeDetect => "RangeDetect",
            ReservedRule::LineContinue => "LineContinue",
            ReservedRule::IncludeRules => "IncludeRules",
            ReservedRule::DetectSpaces => "DetectSpaces",
            ReservedRule::DetectIdentifier => "DetectIdentifier",
        }
    }
}

/// A compiled `RegExpr` pattern
#[derive(Debug, Clone)]
pub struct RegexRule {
    /// The pattern as written in the grammar
    source: String,
    regex: Regex,
}

impl RegexRule {
    /// Decode `\0ddd` character codes and compile the pattern anchored at the start of the text
    pub fn new(source: &str, insensitive: bool) -> Result<Self, regex::Error> {
        let decoded = decode_character_codes(source);
        let regex = RegexBuilder::new(&format!(r"\A(?:{})", decoded))
            .case_insensitive(insensitive)
            .build()?;
        Ok(RegexRule {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn try_match(&self, text: &str) -> Option<usize> {
        self.regex.find(text).map(|m| m.end())
    }
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    DetectChar(char),
    Detect2Chars(String),
    StringDetect(String),
    /// Name of a keyword list in the owning grammar
    Keyword(String),
    RegExpr(RegexRule),
    Reserved(ReservedRule),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    /// Format for matched text; `None` means the owning context's format
    pub format: Option<Format>,
    pub context_operation: Option<String>,
    pub column: Option<usize>,
}

impl Rule {
    pub fn new(kind: RuleKind) -> Self {
        Rule {
            kind,
            format: None,
            context_operation: None,
            column: None,
        }
    }

    /// Kate tag this rule was declared with
    pub fn tag(&self) -> &'static str {
        match &self.kind {
            RuleKind::DetectChar(_) => "DetectChar",
            RuleKind::Detect2Chars(_) => "Detect2Chars",
            RuleKind::StringDetect(_) => "StringDetect",
            RuleKind::Keyword(_) => "keyword",
            RuleKind::RegExpr(_) => "RegExpr",
            RuleKind::Reserved(reserved) => reserved.tag(),
        }
    }

    /// Whether the rule may be tried at the given character column
    pub fn applies_at(&self, column: usize) -> bool {
        self.column.map_or(true, |required| required == column)
    }

    /// Try to match at the start of `text`.
    ///
    /// Returns the matched length in bytes. Zero-length matches are reported as no match, so
    /// a pattern like `x*` can never stall the scanner.
    pub fn try_match(&self, text: &str, grammar: &Grammar) -> Option<usize> {
        let length = match &self.kind {
            RuleKind::DetectChar(c) => text.starts_with(*c).then(|| c.len_utf8()),
            RuleKind::Detect2Chars(literal) | RuleKind::StringDetect(literal) => {
                text.starts_with(literal.as_str()).then(|| literal.len())
            }
            RuleKind::Keyword(list) => grammar
                .list(list)
                .and_then(|words| match_keyword(text, words, grammar.case_sensitive())),
            RuleKind::RegExpr(regex) => regex.try_match(text),
            RuleKind::Reserved(_) => None,
        };
        length.filter(|length| *length > 0)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuleKind::DetectChar(c) => write!(f, "DetectChar({})", c),
            RuleKind::Detect2Chars(literal) => write!(f, "Detect2Chars({})", literal),
            RuleKind::StringDetect(literal) => write!(f, "StringDetect({})", literal),
            RuleKind::Keyword(list) => write!(f, "keyword({})", list),
            RuleKind::RegExpr(regex) => write!(f, "RegExpr({})", regex.source()),
            RuleKind::Reserved(reserved) => write!(f, "{}", reserved.tag()),
        }
    }
}

/// First entry of `words` that is a prefix of `text`, as a byte length into `text`.
///
/// When the grammar is case-insensitive the entries are already lowercase and the text is
/// folded character by character while comparing.
pub fn match_keyword(text: &str, words: &[String], case_sensitive: bool) -> Option<usize> {
    words.iter().find_map(|word| {
        if case_sensitive {
            text.starts_with(word.as_str()).then(|| word.len())
        } else {
            folded_prefix_len(text, word)
        }
    })
}

fn folded_prefix_len(text: &str, word: &str) -> Option<usize> {
    let mut expected = word.chars().peekable();
    for (offset, c) in text.char_indices() {
        if expected.peek().is_none() {
            return Some(offset);
        }
        for lower in c.to_lowercase() {
            if expected.next() != Some(lower) {
                return None;
            }
        }
    }
    expected.peek().is_none().then(|| text.len())
}

/// Replace QRegExp-style `\0ddd` octal character codes with the (escaped) character.
///
/// `\0101\0102` becomes `AB`. An escaped backslash (`\\0101`) is left alone.
pub fn decode_character_codes(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("\\0") {
        return Cow::Borrowed(pattern);
    }
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push(c);
            break;
        };
        if next == '0' {
            let digits: String = chars.clone().take(3).collect();
            if digits.len() == 3 && digits.chars().all(|d| d.is_digit(8)) {
                let decoded = u32::from_str_radix(&digits, 8)
                    .ok()
                    .and_then(char::from_u32);
                if let Some(decoded) = decoded {
                    out.push_str(&regex::escape(&decoded.to_string()));
                    for _ in 0..3 {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
        out.push(next);
    }
    Cow::Owned(out)
}
