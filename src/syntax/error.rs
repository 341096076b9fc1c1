//! Error types for grammar loading and line parsing

use std::fmt;

/// Errors raised while applying a context operation to a context stack
///
/// The first two point at a malformed grammar reference graph. Grammars loaded with validation
/// enabled have their reachable operations checked up front, see
/// [validation](crate::syntax::validation). `ForeignStack` means the host handed in a stack
/// that a different grammar built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A context operation names a context the grammar does not define
    UnknownContext { name: String },
    /// A `#pop` would remove the last context from the stack
    StackUnderflow { operation: String, depth: usize },
    /// The stack was built by a different grammar, for example one replaced by a reload
    ForeignStack { grammar: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownContext { name } => write!(f, "Unknown context '{}'", name),
            ParseError::StackUnderflow { operation, depth } => write!(
                f,
                "Context operation '{}' pops past the bottom of a stack of depth {}",
                operation, depth
            ),
            ParseError::ForeignStack { grammar } => write!(
                f,
                "Context stack was not produced by grammar '{}'",
                grammar
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that abort construction of a grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The grammar file could not be read
    Io { path: String, message: String },
    /// No grammar file was found for a registry key
    NotFound { name: String, searched: Vec<String> },
    /// The document is not well-formed XML
    Xml { message: String },
    MissingElement {
        grammar: String,
        element: &'static str,
    },
    MissingAttribute {
        grammar: String,
        element: String,
        attribute: &'static str,
    },
    InvalidAttribute {
        grammar: String,
        element: String,
        attribute: &'static str,
        value: String,
    },
    NoContexts { grammar: String },
    DuplicateContext { grammar: String, context: String },
    /// A rule element whose tag is not a known rule kind
    UnsupportedRule {
        grammar: String,
        context: String,
        tag: String,
    },
    /// An `itemData` names a default style outside the fixed set
    UnknownFormat {
        grammar: String,
        item: String,
        format: String,
    },
    /// A context or rule names an attribute that is neither built in nor declared
    UnknownAttribute {
        grammar: String,
        element: String,
        attribute: String,
    },
    UnknownList {
        grammar: String,
        context: String,
        list: String,
    },
    InvalidPattern {
        grammar: String,
        context: String,
        pattern: String,
        message: String,
    },
    /// A context operation that cannot succeed, found by static validation
    InvalidReference {
        grammar: String,
        context: String,
        operation: String,
        error: ParseError,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, message } => write!(f, "IO error reading {}: {}", path, message),
            LoadError::NotFound { name, searched } => write!(
                f,
                "No grammar named '{}' (searched: {})",
                name,
                searched.join(", ")
            ),
            LoadError::Xml { message } => write!(f, "Malformed grammar document: {}", message),
            LoadError::MissingElement { grammar, element } => {
                write!(f, "[{}] missing <{}> element", grammar, element)
            }
            LoadError::MissingAttribute {
                grammar,
                element,
                attribute,
            } => write!(
                f,
                "[{}] {} is missing required attribute '{}'",
                grammar, element, attribute
            ),
            LoadError::InvalidAttribute {
                grammar,
                element,
                attribute,
                value,
            } => write!(
                f,
                "[{}] {} has invalid {}=\"{}\"",
                grammar, element, attribute, value
            ),
            LoadError::NoContexts { grammar } => write!(f, "[{}] defines no contexts", grammar),
            LoadError::DuplicateContext { grammar, context } => {
                write!(f, "[{}] context '{}' is defined twice", grammar, context)
            }
            LoadError::UnsupportedRule {
                grammar,
                context,
                tag,
            } => write!(
                f,
                "[{}] context '{}' uses unsupported rule <{}>",
                grammar, context, tag
            ),
            LoadError::UnknownFormat {
                grammar,
                item,
                format,
            } => write!(
                f,
                "[{}] itemData '{}' uses unknown default format '{}'",
                grammar, item, format
            ),
            LoadError::UnknownAttribute {
                grammar,
                element,
                attribute,
            } => write!(
                f,
                "[{}] {} refers to unknown attribute '{}'",
                grammar, element, attribute
            ),
            LoadError::UnknownList {
                grammar,
                context,
                list,
            } => write!(
                f,
                "[{}] context '{}' refers to unknown keyword list '{}'",
                grammar, context, list
            ),
            LoadError::InvalidPattern {
                grammar,
                context,
                pattern,
                message,
            } => write!(
                f,
                "[{}] context '{}' has invalid pattern '{}': {}",
                grammar, context, pattern, message
            ),
            LoadError::InvalidReference {
                grammar,
                context,
                operation,
                error,
            } => write!(
                f,
                "[{}] context '{}' operation '{}' is invalid: {}",
                grammar, context, operation, error
            ),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::InvalidReference { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_grammar_and_element() {
        let err = LoadError::UnsupportedRule {
            grammar: "C".to_string(),
            context: "Normal".to_string(),
            tag: "Bogus".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[C] context 'Normal' uses unsupported rule <Bogus>"
        );
    }

    #[test]
    fn test_invalid_reference_exposes_parse_error_as_source() {
        use std::error::Error;

        let err = LoadError::InvalidReference {
            grammar: "C".to_string(),
            context: "Normal".to_string(),
            operation: "#pop".to_string(),
            error: ParseError::StackUnderflow {
                operation: "#pop".to_string(),
                depth: 1,
            },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("depth 1"));
    }
}
