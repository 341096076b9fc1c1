//! Line Tokenizer
//!
//!     This is the context-stack engine: given the stack left behind by the previous line and
//!     the text of the current one, it produces the stack for the next line plus the segments
//!     describing what matched where. It is a pure function of its inputs and never touches
//!     shared state, so one grammar can serve any number of documents concurrently.
//!
//! The Scan
//!
//!     Scanning happens one context at a time. For the current top context:
//!
//!         1. At the current column, try the context's rules in declaration order, skipping
//!            rules whose required column differs. The first non-empty match wins.
//!         2. A match is recorded and the column advances past it. If the rule carries a
//!            context operation and the resulting stack differs from the current one, the
//!            segment ends there and scanning resumes under the new stack.
//!            An operation that nets to an equal stack (`#stay`, or a push undone by a pop)
//!            keeps scanning in the same segment.
//!         3. If nothing matches, the column advances by one character. That character will be
//!            shown in the context's own format.
//!
//!     When the scan reaches the end of the line, the top context's `lineEndContext` operation
//!     is applied once, whether the last segment ran out of text or ended with a context switch
//!     on the final characters. Empty lines leave the stack untouched.
//!
//! Positions
//!
//!     All columns, starts and lengths in the results count characters, not bytes, matching the
//!     `column` attribute rules use.

use crate::syntax::context::ContextId;
use crate::syntax::error::ParseError;
use crate::syntax::format::Format;
use crate::syntax::grammar::Grammar;
use crate::syntax::stack::{self, apply_operation, ContextStack};
use serde::Serialize;
use tracing::trace;

/// Identifies a rule by its context and position within that context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuleRef {
    pub context: ContextId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: RuleRef,
    /// Column of the first matched character
    pub start: usize,
    pub length: usize,
}

/// A run of the line scanned under one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub context: ContextId,
    pub start: usize,
    pub length: usize,
    pub matches: Vec<RuleMatch>,
}

/// Result of tokenizing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResult {
    /// Stack to hand to the next line
    pub stack: ContextStack,
    pub segments: Vec<Segment>,
}

/// A contiguous run of text with a single format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatSpan {
    pub start: usize,
    pub length: usize,
    pub format: Format,
}

/// Named, serializable view of a [Segment]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub context: String,
    pub start: usize,
    pub length: usize,
    pub matches: Vec<MatchSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub rule: String,
    pub start: usize,
    pub length: usize,
}

/// Tokenize one line.
///
/// `previous` is the stack returned for the preceding line, or `None` on the first line of a
/// document, in which case scanning starts from `[default]`.
pub fn parse_line(
    grammar: &Grammar,
    previous: Option<&ContextStack>,
    text: &str,
) -> Result<LineResult, ParseError> {
    let mut stack = match previous {
        Some(previous) => {
            stack::check_owner(grammar, previous)?;
            previous.clone()
        }
        None => grammar.initial_stack(),
    };
    let mut scanner = Scanner {
        grammar,
        text,
        pos: 0,
        column: 0,
    };
    let mut segments = Vec::new();

    while !scanner.at_end() {
        let (segment, next) = scanner.scan_context(&stack)?;
        segments.push(segment);
        stack = next;
    }

    Ok(LineResult { stack, segments })
}

struct Scanner<'a> {
    grammar: &'a Grammar,
    text: &'a str,
    /// Byte offset into `text`
    pos: usize,
    /// Character offset into `text`
    column: usize,
}

impl<'a> Scanner<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Scan under the top of `stack` until the end of the line or a context switch
    fn scan_context(&mut self, stack: &ContextStack) -> Result<(Segment, ContextStack), ParseError> {
        let grammar = self.grammar;
        let text = self.text;
        let context_id = stack.top();
        let context = grammar.context(context_id);
        let start = self.column;
        let mut matches = Vec::new();

        while !self.at_end() {
            let rest = &text[self.pos..];
            let column = self.column;
            let hit = context
                .rules()
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.applies_at(column))
                .find_map(|(index, rule)| {
                    rule.try_match(rest, grammar)
                        .map(|bytes| (index, rule, bytes))
                });

            let Some((index, rule, bytes)) = hit else {
                let skipped = rest.chars().next().map_or(1, char::len_utf8);
                self.advance(skipped, 1);
                continue;
            };

            let length = rest[..bytes].chars().count();
            trace!(
                context = context.name(),
                column,
                length,
                "matched {}",
                rule
            );
            matches.push(RuleMatch {
                rule: RuleRef {
                    context: context_id,
                    index,
                },
                start: column,
                length,
            });
            self.advance(bytes, length);

            if let Some(operation) = &rule.context_operation {
                let next = apply_operation(grammar, stack, operation)?;
                if next != *stack {
                    let next = if self.at_end() {
                        self.end_of_line(&next)?
                    } else {
                        next
                    };
                    trace!(from = ?stack, to = ?next, "switched by '{}'", operation);
                    return Ok((self.segment(context_id, start, matches), next));
                }
            }
        }

        let next = self.end_of_line(stack)?;
        Ok((self.segment(context_id, start, matches), next))
    }

    fn end_of_line(&self, stack: &ContextStack) -> Result<ContextStack, ParseError> {
        let context = self.grammar.context(stack.top());
        apply_operation(self.grammar, stack, context.line_end_context())
    }

    fn advance(&mut self, bytes: usize, chars: usize) {
        self.pos += bytes;
        self.column += chars;
    }

    fn segment(&self, context: ContextId, start: usize, matches: Vec<RuleMatch>) -> Segment {
        Segment {
            context,
            start,
            length: self.column - start,
            matches,
        }
    }
}

impl LineResult {
    /// Segments with context names and rule descriptions, in the shape hosts and debugging
    /// tools consume: `(context, start, length, [(rule, position, length)])`
    pub fn describe(&self, grammar: &Grammar) -> Vec<SegmentSummary> {
        self.segments
            .iter()
            .map(|segment| {
                let context = grammar.context(segment.context);
                SegmentSummary {
                    context: context.name().to_string(),
                    start: segment.start,
                    length: segment.length,
                    matches: segment
                        .matches
                        .iter()
                        .map(|m| MatchSummary {
                            rule: grammar.context(m.rule.context).rules()[m.rule.index]
                                .to_string(),
                            start: m.start,
                            length: m.length,
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Formatted spans covering the whole line.
    ///
    /// Matched text takes the rule's format (falling back to its context's); text between
    /// matches takes the format of the segment's context.
    pub fn spans(&self, grammar: &Grammar) -> Vec<FormatSpan> {
        let mut spans = Vec::new();
        for segment in &self.segments {
            let context_format = grammar.context(segment.context).format();
            let mut cursor = segment.start;
            for m in &segment.matches {
                push_span(&mut spans, cursor, m.start - cursor, context_format);
                let format = grammar.context(m.rule.context).rule_format(m.rule.index);
                push_span(&mut spans, m.start, m.length, format);
                cursor = m.start + m.length;
            }
            push_span(
                &mut spans,
                cursor,
                segment.start + segment.length - cursor,
                context_format,
            );
        }
        spans
    }

    /// Context names of the resulting stack, bottom first
    pub fn stack_names(&self, grammar: &Grammar) -> Vec<String> {
        grammar.stack_names(&self.stack)
    }

    /// Plain text rendering, one segment per line followed by the resulting stack:
    ///
    ///     String 4+3 DetectChar(\)@5+1
    ///     -> Normal, String
    pub fn render(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        for segment in self.describe(grammar) {
            out.push_str(&format!(
                "{} {}+{}",
                segment.context, segment.start, segment.length
            ));
            for m in &segment.matches {
                out.push_str(&format!(" {}@{}+{}", m.rule, m.start, m.length));
            }
            out.push('\n');
        }
        out.push_str("-> ");
        out.push_str(&self.stack_names(grammar).join(", "));
        out
    }
}

/// Append a span, merging it into the previous one when the formats agree
fn push_span(spans: &mut Vec<FormatSpan>, start: usize, length: usize, format: Format) {
    if length == 0 {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.format == format && last.start + last.length == start {
            last.length += length;
            return;
        }
    }
    spans.push(FormatSpan {
        start,
        length,
        format,
    });
}
