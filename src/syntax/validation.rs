//! Static grammar checks
//!
//!     Run by the loader (unless disabled) so that a grammar with dangling context names or
//!     `#pop`s that can empty the stack is rejected before any text reaches it. Two passes:
//!
//!         1. References: every operation a context or rule declares is split into its pops and
//!            push target, and the target must name a declared context.
//!         2. Underflow: a breadth-first walk over the concrete stacks reachable from the initial
//!            stack, applying each rule operation and the line-end operation of the top context.
//!            Rule patterns are not consulted, so every rule is assumed to fire eventually.
//!
//!     The walk does not follow stacks deeper than the configured depth and stops after a fixed
//!     number of states, so a grammar that only underflows beyond those bounds still loads and
//!     fails at parse time instead.

use crate::syntax::error::{LoadError, ParseError};
use crate::syntax::grammar::Grammar;
use crate::syntax::stack::{apply_operation, operation_shape, ContextStack};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Upper bound on distinct stacks visited by the underflow walk
const STATE_BUDGET: usize = 4096;

pub(crate) fn validate(grammar: &Grammar, max_depth: usize) -> Result<(), LoadError> {
    check_references(grammar)?;
    check_underflow(grammar, max_depth)
}

fn check_references(grammar: &Grammar) -> Result<(), LoadError> {
    for context in grammar.contexts() {
        let declared = context
            .rules()
            .iter()
            .filter_map(|rule| rule.context_operation.as_deref())
            .chain(std::iter::once(context.line_end_context()))
            .chain(context.fallthrough_context());
        for operation in declared {
            if let Some(target) = operation_shape(operation).push {
                if grammar.context_id(target).is_none() {
                    return Err(LoadError::InvalidReference {
                        grammar: grammar.name().to_string(),
                        context: context.name().to_string(),
                        operation: operation.to_string(),
                        error: ParseError::UnknownContext {
                            name: target.to_string(),
                        },
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_underflow(grammar: &Grammar, max_depth: usize) -> Result<(), LoadError> {
    let initial = grammar.initial_stack();
    let mut seen: HashSet<ContextStack> = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(initial.clone());
    queue.push_back(initial);

    while let Some(stack) = queue.pop_front() {
        let context = grammar.context(stack.top());
        let operations = context
            .rules()
            .iter()
            .filter_map(|rule| rule.context_operation.as_deref())
            .chain(std::iter::once(context.line_end_context()));
        for operation in operations {
            let next = apply_operation(grammar, &stack, operation).map_err(|error| {
                LoadError::InvalidReference {
                    grammar: grammar.name().to_string(),
                    context: context.name().to_string(),
                    operation: operation.to_string(),
                    error,
                }
            })?;
            if next.len() > max_depth || seen.contains(&next) {
                continue;
            }
            if seen.len() >= STATE_BUDGET {
                debug!(
                    grammar = grammar.name(),
                    states = seen.len(),
                    "underflow check stopped at state budget"
                );
                return Ok(());
            }
            seen.insert(next.clone());
            queue.push_back(next);
        }
    }
    Ok(())
}
