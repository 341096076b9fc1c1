//! Property-based tests for the line tokenizer
//!
//! Lines are generated from an alphabet rich in the characters the C sample grammar reacts
//! to, so context switches, nested contexts and line-end transitions all get exercised.

use kateline::syntax::Grammar;
use kateline::testing::load_sample;
use once_cell::sync::Lazy;
use proptest::prelude::*;

static C_MINI: Lazy<Grammar> = Lazy::new(|| load_sample("c-mini.xml"));
static QUOTES: Lazy<Grammar> = Lazy::new(|| load_sample("quotes.xml"));

fn line_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("#".to_string()),
            Just("/*".to_string()),
            Just("*/".to_string()),
            Just("//".to_string()),
            Just("\"".to_string()),
            Just("\\\"".to_string()),
            Just("R\"(".to_string()),
            Just(")\"".to_string()),
            Just("int".to_string()),
            Just("return".to_string()),
            Just("0x1f".to_string()),
            Just("todo".to_string()),
            Just("<a.h>".to_string()),
            "[a-z0-9 ;(){}é→]{1,4}",
        ],
        0..12,
    )
    .prop_map(|pieces| pieces.concat())
}

fn document_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(line_strategy(), 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_parse_line_is_deterministic(line in line_strategy()) {
        let grammar = &*C_MINI;
        let first = grammar.parse_line(None, &line).unwrap();
        let second = grammar.parse_line(None, &line).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_segments_tile_the_line(line in line_strategy()) {
        let grammar = &*C_MINI;
        let result = grammar.parse_line(None, &line).unwrap();
        let length = line.chars().count();

        let mut cursor = 0;
        for segment in &result.segments {
            prop_assert_eq!(segment.start, cursor);
            prop_assert!(segment.length > 0);
            let mut match_cursor = segment.start;
            for m in &segment.matches {
                prop_assert!(m.length > 0);
                prop_assert!(m.start >= match_cursor);
                match_cursor = m.start + m.length;
                prop_assert!(match_cursor <= segment.start + segment.length);
            }
            cursor += segment.length;
        }
        prop_assert_eq!(cursor, length);
    }

    #[test]
    fn test_spans_cover_the_line(line in line_strategy()) {
        let grammar = &*C_MINI;
        let spans = grammar.parse_line(None, &line).unwrap().spans(grammar);

        let mut cursor = 0;
        for span in &spans {
            prop_assert_eq!(span.start, cursor);
            prop_assert!(span.length > 0);
            cursor += span.length;
        }
        prop_assert_eq!(cursor, line.chars().count());
        for pair in spans.windows(2) {
            prop_assert_ne!(pair[0].format, pair[1].format);
        }
    }

    #[test]
    fn test_validated_grammar_never_fails_across_lines(lines in document_strategy()) {
        let grammar = &*C_MINI;
        let mut stack = None;
        for line in &lines {
            let result = grammar.parse_line(stack.as_ref(), line);
            prop_assert!(result.is_ok(), "line {:?} failed: {:?}", line, result);
            let result = result.unwrap();
            prop_assert!(result.stack.len() >= 1);
            prop_assert_eq!(result.stack.to_vec()[0], grammar.default_context());
            stack = Some(result.stack);
        }
    }

    #[test]
    fn test_quote_parity_decides_the_next_stack(line in "[a-z \"]{0,20}") {
        let grammar = &*QUOTES;
        let result = grammar.parse_line(None, &line).unwrap();
        let quotes = line.chars().filter(|c| *c == '"').count();
        prop_assert_eq!(result.stack.len(), 1 + quotes % 2);
    }
}
