//! Parsing of the line typed at the organizer prompt.

use std::collections::BTreeSet;

/// What the user asked for at the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Skip,
    /// 1-based indices into the displayed collection list
    AssignToCollections(BTreeSet<usize>),
    /// Create a collection and add the current track to it. The name is
    /// `None` when it still has to be asked for.
    CreateAndAssign(Option<String>),
    TogglePreview,
    OpenExternally,
    Back,
    Quit,
}

/// What the parser needs to know about the current screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseContext {
    pub collection_count: usize,
    pub preview_available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid choice '{0}'. Try again.")]
    Unrecognized(String),

    #[error("Enter numbers between 1 and {count}, separated by commas.")]
    InvalidSelection { input: String, count: usize },

    #[error("No collections to choose from yet. Use 'n' to create one.")]
    NoCollections,

    #[error("No preview available for this track.")]
    PreviewUnavailable,
}

/// Turn a raw input line into an [`Action`].
pub fn parse(raw: &str, ctx: &ParseContext) -> Result<Action, ParseError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(Action::Skip);
    }

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };

    match keyword.to_lowercase().as_str() {
        "n" | "new" => {
            let name = (!rest.is_empty()).then(|| rest.to_string());
            return Ok(Action::CreateAndAssign(name));
        }
        _ if !rest.is_empty() && !is_selection(line) => {
            return Err(ParseError::Unrecognized(line.to_string()));
        }
        "s" | "skip" => return Ok(Action::Skip),
        "q" | "quit" => return Ok(Action::Quit),
        "b" | "back" => return Ok(Action::Back),
        "o" | "open" | "spotify" => return Ok(Action::OpenExternally),
        "p" | "preview" => {
            return if ctx.preview_available {
                Ok(Action::TogglePreview)
            } else {
                Err(ParseError::PreviewUnavailable)
            };
        }
        _ => {}
    }

    if is_selection(line) {
        return parse_selection(line, ctx.collection_count).map(Action::AssignToCollections);
    }

    Err(ParseError::Unrecognized(line.to_string()))
}

fn is_selection(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit())
        && line
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == ' ' || c == '\t')
}

/// Parse "1,3,5" into a set of indices, each within `[1, count]`.
///
/// Whitespace around the commas and empty segments are tolerated; whitespace
/// inside a number ("1 2") is not.
pub fn parse_selection(line: &str, count: usize) -> Result<BTreeSet<usize>, ParseError> {
    if count == 0 {
        return Err(ParseError::NoCollections);
    }

    let invalid = || ParseError::InvalidSelection {
        input: line.to_string(),
        count,
    };

    let mut indices = BTreeSet::new();
    for part in line.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let index: usize = part.parse().map_err(|_| invalid())?;
        if index < 1 || index > count {
            return Err(invalid());
        }
        indices.insert(index);
    }

    if indices.is_empty() {
        return Err(invalid());
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(collection_count: usize) -> ParseContext {
        ParseContext {
            collection_count,
            preview_available: true,
        }
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn empty_and_s_skip() {
        assert_eq!(parse("", &ctx(3)), Ok(Action::Skip));
        assert_eq!(parse("   ", &ctx(3)), Ok(Action::Skip));
        assert_eq!(parse("s", &ctx(3)), Ok(Action::Skip));
        assert_eq!(parse(" SKIP ", &ctx(3)), Ok(Action::Skip));
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse("q", &ctx(3)), Ok(Action::Quit));
        assert_eq!(parse("Quit", &ctx(3)), Ok(Action::Quit));
        assert_eq!(parse("b", &ctx(3)), Ok(Action::Back));
        assert_eq!(parse("o", &ctx(3)), Ok(Action::OpenExternally));
        assert_eq!(parse("spotify", &ctx(3)), Ok(Action::OpenExternally));
        assert_eq!(parse("p", &ctx(3)), Ok(Action::TogglePreview));
        assert_eq!(parse("n", &ctx(3)), Ok(Action::CreateAndAssign(None)));
    }

    #[test]
    fn multi_selection() {
        assert_eq!(
            parse("1,3,5", &ctx(5)),
            Ok(Action::AssignToCollections(set(&[1, 3, 5])))
        );
        assert_eq!(parse("2", &ctx(5)), Ok(Action::AssignToCollections(set(&[2]))));
        assert_eq!(
            parse(" 3 , 1,, 3 ", &ctx(5)),
            Ok(Action::AssignToCollections(set(&[1, 3])))
        );
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        assert_eq!(
            parse("1,9", &ctx(5)),
            Err(ParseError::InvalidSelection {
                input: "1,9".to_string(),
                count: 5
            })
        );
        assert!(matches!(parse("0", &ctx(5)), Err(ParseError::InvalidSelection { .. })));
        assert!(matches!(
            parse("99999999999999999999999", &ctx(5)),
            Err(ParseError::InvalidSelection { .. })
        ));
        assert!(matches!(parse(",", &ctx(5)), Err(ParseError::Unrecognized(_))));
        assert!(matches!(parse("1 2", &ctx(5)), Err(ParseError::InvalidSelection { .. })));
    }

    #[test]
    fn selection_without_collections() {
        assert_eq!(parse("1", &ctx(0)), Err(ParseError::NoCollections));
    }

    #[test]
    fn preview_requires_availability() {
        let no_preview = ParseContext {
            collection_count: 2,
            preview_available: false,
        };
        assert_eq!(parse("p", &no_preview), Err(ParseError::PreviewUnavailable));
    }

    #[test]
    fn new_with_inline_name_keeps_case() {
        assert_eq!(
            parse("n Road Trip 2024", &ctx(3)),
            Ok(Action::CreateAndAssign(Some("Road Trip 2024".to_string())))
        );
        assert_eq!(
            parse("NEW   Chill ", &ctx(3)),
            Ok(Action::CreateAndAssign(Some("Chill".to_string())))
        );
    }

    #[test]
    fn unknown_input_is_unrecognized() {
        assert_eq!(parse("x", &ctx(3)), Err(ParseError::Unrecognized("x".to_string())));
        assert!(matches!(parse("1a", &ctx(3)), Err(ParseError::Unrecognized(_))));
        assert!(matches!(parse("s now", &ctx(3)), Err(ParseError::Unrecognized(_))));
        assert!(matches!(parse("-1", &ctx(3)), Err(ParseError::Unrecognized(_))));
    }

    proptest! {
        /// Any in-range list of indices parses to exactly its distinct values.
        #[test]
        fn in_range_lists_parse_to_their_set(
            count in 1usize..60,
            picks in prop::collection::vec(0usize..1000, 1..10),
        ) {
            let picks: Vec<usize> = picks.into_iter().map(|p| p % count + 1).collect();
            let line = picks.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",");
            let expected: BTreeSet<usize> = picks.iter().copied().collect();
            prop_assert_eq!(parse(&line, &ctx(count)), Ok(Action::AssignToCollections(expected)));
        }

        /// A single out-of-range index rejects the whole selection.
        #[test]
        fn any_out_of_range_index_rejects(count in 1usize..20, extra in 1usize..100) {
            let line = format!("1,{}", count + extra);
            let is_invalid = matches!(
                parse(&line, &ctx(count)),
                Err(ParseError::InvalidSelection { .. })
            );
            prop_assert!(is_invalid);
        }
    }
}
