//! Recovery of structured artifacts from free-form model text.
//!
//! Two independent algorithms: fenced Python code-block extraction (with
//! fallbacks for unfenced and multi-fenced output) and a tolerant scan for
//! nested integer-array literals.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder returned when no code could be recovered at all.
pub const NOOP_CODE: &str =
    "def transform(grid_lst: list[list[int]]) -> list[list[int]]:\n    raise NotImplementedError()";

const FENCE: &str = "```python";
/// A recovered block must define the entry point to be the block of interest.
const FUNCTION_MARKER: &str = "def transform(";

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```python\n(.*)\n```").expect("static regex");
    static ref UNTERMINATED_BLOCK: Regex =
        Regex::new(r"(?s)```python\n(.*)\n`").expect("static regex");
    // One 2-D literal: [ [..], [..], ... ] with no nested brackets inside rows.
    static ref GRID: Regex =
        Regex::new(r"\[\s*(\[[^\[\]]*\](?:\s*,\s*\[[^\[\]]*\])*)\s*\]").expect("static regex");
    static ref ROW: Regex = Regex::new(r"\[([^\]]*)\]").expect("static regex");
}

fn clean_code(code: &str) -> String {
    code.replace('\t', "    ")
}

/// Extract the Python code block from model output.
///
/// - No fence: fall back to everything after a closing `</reasoning>` tag,
///   or [`NOOP_CODE`] when that too is empty.
/// - Multiple fences: scan from the last fence backward for a block that
///   contains the transform signature; when none does, the remainder after
///   the first fence is treated as the code body.
///
/// Tabs are normalized to four spaces in everything returned.
pub fn parse_code_block(text: &str) -> String {
    let fences = text.matches(FENCE).count();
    if fences == 0 {
        let after = text
            .split_once("</reasoning>")
            .map(|(_, rest)| rest)
            .unwrap_or("");
        if after.is_empty() {
            tracing::debug!("no code block in model output");
            return NOOP_CODE.to_string();
        }
        return clean_code(after);
    }

    let mut selected: Cow<'_, str> = Cow::Borrowed(text);
    if fences > 1 {
        for chunk in text.rsplit(FENCE) {
            if chunk.contains(FUNCTION_MARKER) {
                selected = Cow::Owned(format!("{FENCE}{chunk}"));
                break;
            }
        }
    }

    if let Some(captures) = FENCED_BLOCK.captures(&selected)
        && let Some(body) = captures.get(1)
    {
        return clean_code(body.as_str());
    }
    // Unterminated fence: the model ran out of tokens mid-block.
    if let Some(captures) = UNTERMINATED_BLOCK.captures(&selected)
        && let Some(body) = captures.get(1)
    {
        tracing::debug!("code block missing closing fence");
        return clean_code(body.as_str());
    }
    clean_code(
        selected
            .split_once(FENCE)
            .map(|(_, rest)| rest)
            .unwrap_or(""),
    )
}

/// Scan text for 2-D integer-array literals, in order of appearance.
///
/// Whitespace is arbitrary, empty and non-numeric row tokens are skipped.
pub fn parse_grids(text: &str) -> Vec<Vec<Vec<i64>>> {
    GRID.captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|body| {
            ROW.captures_iter(body.as_str())
                .filter_map(|row| row.get(1))
                .map(|row| {
                    row.as_str()
                        .split(',')
                        .filter_map(|token| token.trim().parse::<i64>().ok())
                        .collect()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fenced_block_is_extracted() {
        let text = "Here you go:\n```python\ndef transform(grid_lst):\n\treturn grid_lst\n```\nDone.";
        assert_eq!(
            parse_code_block(text),
            "def transform(grid_lst):\n    return grid_lst"
        );
    }

    #[test]
    fn second_block_wins_when_it_has_the_signature() {
        let text = "\
```python
helper = 1
```
explanation
```python
def transform(grid_lst):
    return []
```";
        assert_eq!(
            parse_code_block(text),
            "def transform(grid_lst):\n    return []"
        );
    }

    #[test]
    fn no_fence_falls_back_to_reasoning_tail() {
        let text = "<reasoning>thinking...</reasoning>\ndef transform(g):\n    return g";
        assert_eq!(parse_code_block(text), "\ndef transform(g):\n    return g");
    }

    #[test]
    fn nothing_recoverable_yields_noop_stub() {
        assert_eq!(parse_code_block("I cannot solve this."), NOOP_CODE);
        assert!(NOOP_CODE.contains("NotImplementedError"));
    }

    #[test]
    fn unterminated_fence_recovers_body() {
        let text = "```python\ndef transform(g):\n    return g\n`";
        assert_eq!(parse_code_block(text), "def transform(g):\n    return g");
    }

    #[test]
    fn tabs_normalize_to_spaces() {
        let text = "```python\ndef transform(g):\n\t\treturn g\n```";
        assert_eq!(parse_code_block(text), "def transform(g):\n        return g");
    }

    #[test]
    fn grids_parse_in_order_of_appearance() {
        let grids = parse_grids("result: [[1,2],[3,4]] and [[5]]");
        assert_eq!(grids, vec![vec![vec![1, 2], vec![3, 4]], vec![vec![5]]]);
    }

    #[test]
    fn grids_tolerate_whitespace_and_junk_tokens() {
        let grids = parse_grids("[[ 1 , 2 ],\n [3, x, 4]]");
        assert_eq!(grids, vec![vec![vec![1, 2], vec![3, 4]]]);
    }

    #[test]
    fn no_grids_in_plain_prose() {
        assert!(parse_grids("nothing bracketed here").is_empty());
        assert!(parse_grids("flat [1, 2, 3] only").is_empty());
    }

    #[test]
    fn offline_canned_response_parses_as_one_grid() {
        let grids = parse_grids(crate::orchestrator::OFFLINE_RESPONSE);
        assert_eq!(grids, vec![vec![vec![1, 2, 3], vec![4, 5, 6]]]);
    }
}
