//! Context stacks
//!
//!     The context stack is the parser state carried from one line to the next. It is a
//!     persistent value: pushing shares the existing frames, popping hands back the parent, and
//!     nothing is ever mutated in place. Hosts can therefore keep the stack produced by every
//!     line (for incremental re-highlighting after an edit) at the cost of one pointer each.
//!
//!     Stacks compare by content, never by identity. Two stacks built along different paths that
//!     hold the same contexts in the same order are equal, and the engine relies on that to
//!     decide whether a context operation actually moved it.
//!
//!     Every stack remembers which grammar built it. Context ids are indices into one grammar's
//!     context table, so a stack cached before a grammar was reloaded is refused by the new one
//!     with [ParseError::ForeignStack] instead of being read against the wrong table.
//!
//! Context Operations
//!
//!     Rules and contexts describe stack changes with short directive strings:
//!
//!         - "" or "#stay": no change.
//!         - "#pop": drop the top context, then apply whatever follows. "#pop#pop" drops two.
//!         - "#pop!name": drop, then push `name`.
//!         - anything else: push the context with that name.

use crate::syntax::context::ContextId;
use crate::syntax::error::ParseError;
use crate::syntax::grammar::{Grammar, GrammarStamp};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const STAY: &str = "#stay";
pub const POP: &str = "#pop";

#[derive(Debug)]
struct Frame {
    context: ContextId,
    depth: usize,
    parent: Option<Arc<Frame>>,
}

// Unlinks uniquely owned parents in a loop; stack depth is unbounded.
impl Drop for Frame {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(frame) = parent {
            match Arc::try_unwrap(frame) {
                Ok(mut frame) => parent = frame.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// A non-empty, immutable stack of contexts. The top is the current context.
#[derive(Clone)]
pub struct ContextStack {
    grammar: GrammarStamp,
    top: Arc<Frame>,
}

#[allow(clippy::len_without_is_empty)]
impl ContextStack {
    pub(crate) fn new(grammar: GrammarStamp, root: ContextId) -> Self {
        ContextStack {
            grammar,
            top: Arc::new(Frame {
                context: root,
                depth: 1,
                parent: None,
            }),
        }
    }

    /// Build a stack for `grammar` from contexts listed bottom first. `None` if the list is
    /// empty or names an id outside the grammar.
    pub fn from_contexts<I>(grammar: &Grammar, contexts: I) -> Option<Self>
    where
        I: IntoIterator<Item = ContextId>,
    {
        let count = grammar.contexts().len();
        let mut contexts = contexts.into_iter();
        let root = contexts.next().filter(|id| id.index() < count)?;
        let mut stack = ContextStack::new(grammar.stamp(), root);
        for context in contexts {
            if context.index() >= count {
                return None;
            }
            stack = stack.push(context);
        }
        Some(stack)
    }

    /// Whether this stack was produced by `grammar` (or a clone of it)
    pub fn belongs_to(&self, grammar: &Grammar) -> bool {
        self.grammar == grammar.stamp()
    }

    pub fn top(&self) -> ContextId {
        self.top.context
    }

    pub fn len(&self) -> usize {
        self.top.depth
    }

    pub fn push(&self, context: ContextId) -> ContextStack {
        ContextStack {
            grammar: self.grammar,
            top: Arc::new(Frame {
                context,
                depth: self.top.depth + 1,
                parent: Some(Arc::clone(&self.top)),
            }),
        }
    }

    /// The stack without its top context, or `None` if that would leave it empty
    pub fn pop(&self) -> Option<ContextStack> {
        self.top
            .parent
            .as_ref()
            .map(|parent| ContextStack {
                grammar: self.grammar,
                top: Arc::clone(parent),
            })
    }

    /// Contexts from the top down
    pub fn iter(&self) -> impl Iterator<Item = ContextId> + '_ {
        let mut frame = Some(self.top.as_ref());
        std::iter::from_fn(move || {
            let current = frame?;
            frame = current.parent.as_deref();
            Some(current.context)
        })
    }

    /// Contexts bottom first
    pub fn to_vec(&self) -> Vec<ContextId> {
        let mut contexts: Vec<_> = self.iter().collect();
        contexts.reverse();
        contexts
    }
}

impl PartialEq for ContextStack {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.top, &other.top) {
            return true;
        }
        self.grammar == other.grammar
            && self.len() == other.len()
            && self.iter().eq(other.iter())
    }
}

impl Eq for ContextStack {}

impl Hash for ContextStack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.grammar.hash(state);
        self.len().hash(state);
        for context in self.iter() {
            context.hash(state);
        }
    }
}

impl fmt::Debug for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Apply a context operation, producing a new stack. The input is never modified.
///
/// Fails with [ParseError::StackUnderflow] if a `#pop` would empty the stack, with
/// [ParseError::UnknownContext] if the operation names a context the grammar lacks and with
/// [ParseError::ForeignStack] if the stack was built by another grammar.
pub fn apply_operation(
    grammar: &Grammar,
    stack: &ContextStack,
    operation: &str,
) -> Result<ContextStack, ParseError> {
    check_owner(grammar, stack)?;
    apply_remaining(grammar, stack, operation, operation)
}

pub(crate) fn check_owner(grammar: &Grammar, stack: &ContextStack) -> Result<(), ParseError> {
    if stack.belongs_to(grammar) {
        Ok(())
    } else {
        Err(ParseError::ForeignStack {
            grammar: grammar.name().to_string(),
        })
    }
}

fn apply_remaining(
    grammar: &Grammar,
    stack: &ContextStack,
    remaining: &str,
    operation: &str,
) -> Result<ContextStack, ParseError> {
    if remaining.is_empty() || remaining == STAY {
        return Ok(stack.clone());
    }
    if let Some(rest) = remaining.strip_prefix(POP) {
        let popped = stack.pop().ok_or_else(|| ParseError::StackUnderflow {
            operation: operation.to_string(),
            depth: stack.len(),
        })?;
        let rest = rest.strip_prefix('!').unwrap_or(rest);
        return apply_remaining(grammar, &popped, rest, operation);
    }
    let context = grammar
        .context_id(remaining)
        .ok_or_else(|| ParseError::UnknownContext {
            name: remaining.to_string(),
        })?;
    Ok(stack.push(context))
}

/// Shape of an operation without resolving names: how many contexts it pops and which
/// context name (if any) it pushes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationShape<'a> {
    pub pops: usize,
    pub push: Option<&'a str>,
}

pub fn operation_shape(operation: &str) -> OperationShape<'_> {
    let mut pops = 0;
    let mut rest = operation;
    while let Some(after) = rest.strip_prefix(POP) {
        pops += 1;
        rest = after.strip_prefix('!').unwrap_or(after);
    }
    let push = (!rest.is_empty() && rest != STAY).then_some(rest);
    OperationShape { pops, push }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::loader::load_grammar;

    fn grammar() -> Grammar {
        load_grammar(
            r#"<language name="Stacks">
  <highlighting>
    <contexts>
      <context name="Normal" attribute="Normal Text"/>
      <context name="String" attribute="String"/>
      <context name="Escape" attribute="Character"/>
    </contexts>
    <itemDatas>
      <itemData name="Normal Text" defStyleNum="dsNormal"/>
    </itemDatas>
  </highlighting>
</language>"#,
        )
        .unwrap()
    }

    fn names(grammar: &Grammar, stack: &ContextStack) -> Vec<String> {
        grammar.stack_names(stack)
    }

    #[test]
    fn test_stay_and_empty_return_an_equal_stack() {
        let grammar = grammar();
        let stack = grammar.initial_stack().push(grammar.context_id("String").unwrap());
        assert_eq!(apply_operation(&grammar, &stack, "#stay").unwrap(), stack);
        assert_eq!(apply_operation(&grammar, &stack, "").unwrap(), stack);
    }

    #[test]
    fn test_push_does_not_modify_the_input() {
        let grammar = grammar();
        let stack = grammar.initial_stack();
        let pushed = apply_operation(&grammar, &stack, "String").unwrap();
        assert_eq!(names(&grammar, &stack), vec!["Normal"]);
        assert_eq!(names(&grammar, &pushed), vec!["Normal", "String"]);
    }

    #[test]
    fn test_compound_pops() {
        let grammar = grammar();
        let deep = apply_operation(&grammar, &grammar.initial_stack(), "String").unwrap();
        let deep = apply_operation(&grammar, &deep, "Escape").unwrap();
        let back = apply_operation(&grammar, &deep, "#pop#pop").unwrap();
        assert_eq!(back, grammar.initial_stack());
    }

    #[test]
    fn test_pop_then_push() {
        let grammar = grammar();
        let stack = apply_operation(&grammar, &grammar.initial_stack(), "String").unwrap();
        let swapped = apply_operation(&grammar, &stack, "#pop!Escape").unwrap();
        assert_eq!(names(&grammar, &swapped), vec!["Normal", "Escape"]);
    }

    #[test]
    fn test_pop_of_last_context_underflows() {
        let grammar = grammar();
        let err = apply_operation(&grammar, &grammar.initial_stack(), "#pop").unwrap_err();
        assert_eq!(
            err,
            ParseError::StackUnderflow {
                operation: "#pop".to_string(),
                depth: 1
            }
        );
    }

    #[test]
    fn test_unknown_context() {
        let grammar = grammar();
        let err = apply_operation(&grammar, &grammar.initial_stack(), "Nowhere").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownContext {
                name: "Nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_equality_is_structural() {
        let grammar = grammar();
        let string = grammar.context_id("String").unwrap();
        let a = grammar.initial_stack().push(string);
        let b = ContextStack::from_contexts(&grammar, [grammar.default_context(), string]).unwrap();
        assert!(!Arc::ptr_eq(&a.top, &b.top));
        assert_eq!(a, b);
        // push then pop lands on an equal stack
        let round_trip = apply_operation(&grammar, &a, "Escape")
            .and_then(|s| apply_operation(&grammar, &s, "#pop"))
            .unwrap();
        assert_eq!(round_trip, a);
        assert_ne!(a, grammar.initial_stack());
    }

    #[test]
    fn test_from_contexts_rejects_empty_and_out_of_range() {
        let grammar = grammar();
        assert!(ContextStack::from_contexts(&grammar, Vec::new()).is_none());
        assert!(ContextStack::from_contexts(&grammar, [ContextId(0), ContextId(3)]).is_none());
    }

    #[test]
    fn test_stack_from_another_grammar_is_refused() {
        let first = grammar();
        let second = grammar();
        let stack = first.initial_stack();

        assert!(stack.belongs_to(&first));
        assert!(!stack.belongs_to(&second));
        assert_ne!(stack, second.initial_stack());
        assert_eq!(
            apply_operation(&second, &stack, "String").unwrap_err(),
            ParseError::ForeignStack {
                grammar: "Stacks".to_string()
            }
        );
        // clones share the identity of the grammar they were cloned from
        assert!(stack.belongs_to(&first.clone()));
    }

    #[test]
    fn test_very_deep_stack_drops_without_recursion() {
        let grammar = grammar();
        let string = grammar.context_id("String").unwrap();
        let mut stack = grammar.initial_stack();
        for _ in 0..300_000 {
            stack = stack.push(string);
        }
        assert_eq!(stack.len(), 300_001);
        let shared = stack.pop().unwrap();
        drop(stack);
        assert_eq!(shared.len(), 300_000);
        drop(shared);
    }

    #[test]
    fn test_operation_shape() {
        assert_eq!(
            operation_shape("#pop#pop!Comment"),
            OperationShape {
                pops: 2,
                push: Some("Comment")
            }
        );
        assert_eq!(operation_shape("#stay"), OperationShape { pops: 0, push: None });
        assert_eq!(operation_shape("#pop"), OperationShape { pops: 1, push: None });
        assert_eq!(
            operation_shape("String"),
            OperationShape {
                pops: 0,
                push: Some("String")
            }
        );
    }
}
