//! Format identifiers
//!
//!     The tokenizer never deals in colors or fonts. Every matched or unmatched piece of text
//!     is tagged with one of a small, closed set of abstract formats, and the host maps those
//!     to whatever visual style it likes.
//!
//!     Grammars refer to formats indirectly: rules and contexts name an *attribute*, and the
//!     grammar's `itemDatas` table maps attribute names to Kate default styles (`dsKeyword`,
//!     `dsString`, ...). A handful of attribute names are understood even when the grammar does
//!     not declare them, see [FormatMap::new].

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Abstract token classification consumed by rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    Normal,
    Keyword,
    DataType,
    DecVal,
    BaseN,
    Float,
    Char,
    String,
    Comment,
    Others,
    Alert,
    Function,
    RegionMarker,
    Error,
}

impl Format {
    pub const ALL: [Format; 14] = [
        Format::Normal,
        Format::Keyword,
        Format::DataType,
        Format::DecVal,
        Format::BaseN,
        Format::Float,
        Format::Char,
        Format::String,
        Format::Comment,
        Format::Others,
        Format::Alert,
        Format::Function,
        Format::RegionMarker,
        Format::Error,
    ];

    /// Resolve a Kate default style name (the `defStyleNum` value of an `itemData`)
    pub fn from_style_name(name: &str) -> Option<Format> {
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.style_name() == name)
    }

    /// The Kate default style name for this format
    pub fn style_name(self) -> &'static str {
        match self {
            Format::Normal => "dsNormal",
            Format::Keyword => "dsKeyword",
            Format::DataType => "dsDataType",
            Format::DecVal => "dsDecVal",
            Format::BaseN => "dsBaseN",
            Format::Float => "dsFloat",
            Format::Char => "dsChar",
            Format::String => "dsString",
            Format::Comment => "dsComment",
            Format::Others => "dsOthers",
            Format::Alert => "dsAlert",
            Format::Function => "dsFunction",
            Format::RegionMarker => "dsRegionMarker",
            Format::Error => "dsError",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.style_name())
    }
}

/// Attribute names every grammar may use without declaring them
static BUILTIN_ATTRIBUTES: Lazy<HashMap<&'static str, Format>> = Lazy::new(|| {
    HashMap::from([
        ("alert", Format::Alert),
        ("base-n integer", Format::BaseN),
        ("character", Format::Char),
        ("string char", Format::Char),
        ("comment", Format::Comment),
        ("data type", Format::DataType),
        ("decimal/value", Format::DecVal),
        ("error", Format::Error),
        ("floating point", Format::Float),
        ("function", Format::Function),
        ("keyword", Format::Keyword),
        ("normal", Format::Normal),
        ("others", Format::Others),
        ("region marker", Format::RegionMarker),
        ("string", Format::String),
    ])
});

/// Case-insensitive mapping from attribute names to formats
#[derive(Debug, Clone)]
pub struct FormatMap {
    entries: HashMap<String, Format>,
}

impl FormatMap {
    /// A table holding only the built-in attribute names
    pub fn new() -> Self {
        let entries = BUILTIN_ATTRIBUTES
            .iter()
            .map(|(name, format)| (name.to_string(), *format))
            .collect();
        FormatMap { entries }
    }

    /// Declare (or redeclare) an attribute. Names are stored lowercased.
    pub fn declare(&mut self, attribute: &str, format: Format) {
        self.entries.insert(attribute.to_lowercase(), format);
    }

    pub fn resolve(&self, attribute: &str) -> Option<Format> {
        self.entries.get(&attribute.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by attribute name
    pub fn iter(&self) -> impl Iterator<Item = (&str, Format)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(name, format)| (name.as_str(), *format))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

impl Default for FormatMap {
    fn default() -> Self {
        Self::new()
    }
}
