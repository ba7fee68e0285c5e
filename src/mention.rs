//! Entity mention protection
//!
//! Mentions are inline references to another record, written as
//! `[entity:<id>]` or `[entity:<id>|<display text>]`. Neither renderer knows
//! this syntax: comrak would read the brackets as link text and html5ever
//! would decode entity references inside the display text. Before either
//! runs, every mention is swapped for an opaque placeholder token and put
//! back verbatim afterwards.
//!
//! # Token Format
//!
//! A token is `U+E000 MENTION <index> U+E001`. Both delimiters are Unicode
//! private-use characters, which neither renderer escapes, case-folds or
//! treats as markup. The closing delimiter guarantees that no token is a
//! prefix of another (`...1\u{E001}` never matches inside `...10\u{E001}`),
//! so restoration is a single left-to-right pass with no ordering rules.
//!
//! # Examples
//!
//! ```rust
//! use entity_mention_converter::mention::{protect, restore};
//!
//! let source = "Hello [entity:5|Bob], see [entity:9].";
//! let (protected, mentions) = protect(source);
//! assert_eq!(mentions.len(), 2);
//! assert!(!protected.contains("[entity:"));
//! assert_eq!(restore(&protected, &mentions), source);
//! ```

use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

/// Opening delimiter of a placeholder token
pub const TOKEN_OPEN: char = '\u{E000}';

/// Closing delimiter of a placeholder token
pub const TOKEN_CLOSE: char = '\u{E001}';

const TOKEN_TAG: &str = "MENTION";

/// A reference to another record by numeric id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mention {
    /// Positive entity id
    pub entity_id: u64,
    /// Optional display text; never contains `]`
    pub text: Option<String>,
}

impl Mention {
    /// Mention rendered with the entity's own name
    pub fn new(entity_id: u64) -> Self {
        Self {
            entity_id,
            text: None,
        }
    }

    /// Mention with custom display text
    pub fn with_text(entity_id: u64, text: impl Into<String>) -> Self {
        Self {
            entity_id,
            text: Some(text.into()),
        }
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "[entity:{}|{}]", self.entity_id, text),
            None => write!(f, "[entity:{}]", self.entity_id),
        }
    }
}

/// One protected mention: the token standing in for it and the exact
/// source text it replaced
#[derive(Debug, Clone)]
struct ProtectedMention {
    token: String,
    original: String,
    mention: Mention,
}

/// Token-to-mention mapping produced by [`protect`]
///
/// Valid only for the conversion call that produced it. Token indices are
/// positions in this mapping.
#[derive(Debug, Clone, Default)]
pub struct MentionMap {
    entries: Vec<ProtectedMention>,
}

impl MentionMap {
    /// Number of protected mentions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no mention was protected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(token, mention)` pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mention)> {
        self.entries
            .iter()
            .map(|entry| (entry.token.as_str(), &entry.mention))
    }

    fn original(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.original.as_str())
    }
}

fn mention_regex() -> Option<&'static Regex> {
    static MENTION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    MENTION_REGEX
        .get_or_init(|| Regex::new(r"\[entity:(\d+)(?:\|([^\]]+))?\]").ok())
        .as_ref()
}

fn token_regex() -> Option<&'static Regex> {
    static TOKEN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN_REGEX
        .get_or_init(|| {
            Regex::new(&format!(
                "{}{}([0-9]+){}",
                TOKEN_OPEN, TOKEN_TAG, TOKEN_CLOSE
            ))
            .ok()
        })
        .as_ref()
}

/// Build the placeholder token for the mention at `index`
pub fn placeholder(index: usize) -> String {
    format!("{}{}{}{}", TOKEN_OPEN, TOKEN_TAG, index, TOKEN_CLOSE)
}

fn parse_mention(caps: &Captures<'_>) -> Option<Mention> {
    let entity_id = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let text = caps.get(2).map(|m| m.as_str().to_string());
    Some(Mention { entity_id, text })
}

/// Replace every mention in `content` with a placeholder token
///
/// Matches are found left to right without overlap and numbered
/// sequentially from zero. Malformed mentions (non-numeric or overflowing
/// id, empty or unterminated display text) are not matched and stay in the
/// text unchanged.
pub fn protect(content: &str) -> (String, MentionMap) {
    let mut mentions = MentionMap::default();

    let Some(regex) = mention_regex() else {
        return (content.to_string(), mentions);
    };

    let protected = regex.replace_all(content, |caps: &Captures<'_>| {
        let original = caps[0].to_string();
        match parse_mention(caps) {
            Some(mention) => {
                let token = placeholder(mentions.len());
                mentions.entries.push(ProtectedMention {
                    token: token.clone(),
                    original,
                    mention,
                });
                token
            }
            None => original,
        }
    });

    (protected.into_owned(), mentions)
}

/// Replace every placeholder token with the mention text it stands for
///
/// The mention is written back exactly as it appeared in the source.
/// Tokens whose index is not in `mentions` are left as they are.
pub fn restore(content: &str, mentions: &MentionMap) -> String {
    if mentions.is_empty() {
        return content.to_string();
    }
    let Some(regex) = token_regex() else {
        return content.to_string();
    };

    regex
        .replace_all(content, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| mentions.original(index))
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// All well-formed mentions in `content`, in document order
pub fn extract_mentions(content: &str) -> Vec<Mention> {
    match mention_regex() {
        Some(regex) => regex
            .captures_iter(content)
            .filter_map(|caps| parse_mention(&caps))
            .collect(),
        None => Vec::new(),
    }
}

/// Whether `text` carries a mention, either literally or as a placeholder
pub fn contains_mention(text: &str) -> bool {
    text.contains(TOKEN_OPEN) || mention_regex().is_some_and(|regex| regex.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_protect_simple_mention() {
        let (protected, mentions) = protect("see [entity:42] here");
        assert_eq!(protected, format!("see {} here", placeholder(0)));
        assert_eq!(mentions.len(), 1);

        let (token, mention) = mentions.iter().next().expect("one mention");
        assert_eq!(token, placeholder(0));
        assert_eq!(mention, &Mention::new(42));
    }

    #[test]
    fn test_protect_mention_with_text() {
        let (_, mentions) = protect("[entity:7|The Dragon]");
        let mention = mentions.iter().next().map(|(_, m)| m.clone());
        assert_eq!(mention, Some(Mention::with_text(7, "The Dragon")));
    }

    #[test]
    fn test_tokens_are_sequential() {
        let (protected, mentions) = protect("[entity:1] [entity:2|b] [entity:3]");
        assert_eq!(
            protected,
            format!("{} {} {}", placeholder(0), placeholder(1), placeholder(2))
        );
        assert_eq!(mentions.len(), 3);
    }

    #[test]
    fn test_malformed_mentions_pass_through() {
        for source in [
            "[entity:abc]",
            "[entity:]",
            "[entity:5|]",
            "[entity:5|unterminated",
            "[entity 5]",
            "[entity:99999999999999999999999]",
        ] {
            let (protected, mentions) = protect(source);
            assert_eq!(protected, source, "should not match: {}", source);
            assert!(mentions.is_empty());
        }
    }

    #[test]
    fn test_restore_many_mentions_without_prefix_collisions() {
        let source: String = (1..=25)
            .map(|id| format!("[entity:{}] ", id))
            .collect();
        let (protected, mentions) = protect(&source);
        assert_eq!(mentions.len(), 25);
        assert_eq!(restore(&protected, &mentions), source);
    }

    #[test]
    fn test_restore_keeps_original_bytes() {
        let source = "[entity:007|A &amp; B]";
        let (protected, mentions) = protect(source);
        assert_eq!(restore(&protected, &mentions), source);
    }

    #[test]
    fn test_restore_ignores_unknown_tokens() {
        let (_, mentions) = protect("[entity:1]");
        let stray = placeholder(9);
        assert_eq!(restore(&stray, &mentions), stray);
    }

    #[test]
    fn test_restore_with_empty_map_is_identity() {
        let content = format!("text {}", placeholder(0));
        assert_eq!(restore(&content, &MentionMap::default()), content);
    }

    #[test]
    fn test_mention_display() {
        assert_eq!(Mention::new(42).to_string(), "[entity:42]");
        assert_eq!(Mention::with_text(5, "Bob").to_string(), "[entity:5|Bob]");
    }

    #[test]
    fn test_extract_mentions() {
        let mentions = extract_mentions("Hello [entity:5|Bob], see [entity:9]. [entity:x]");
        assert_eq!(
            mentions,
            vec![Mention::with_text(5, "Bob"), Mention::new(9)]
        );
    }

    #[test]
    fn test_contains_mention() {
        assert!(contains_mention("[entity:1]"));
        assert!(contains_mention(&placeholder(3)));
        assert!(!contains_mention("[entity:one]"));
        assert!(!contains_mention("plain text"));
    }

    proptest! {
        #[test]
        fn prop_restore_inverts_protect(
            parts in proptest::collection::vec(
                (
                    "[a-zA-Z0-9 .,!?\\[\\]|:\n]{0,20}",
                    1u64..100000,
                    proptest::option::of("[^\\]\u{E000}\u{E001}]{1,12}"),
                ),
                0..8,
            )
        ) {
            let mut source = String::new();
            for (prose, id, text) in &parts {
                source.push_str(prose);
                match text {
                    Some(text) => source.push_str(&format!("[entity:{}|{}]", id, text)),
                    None => source.push_str(&format!("[entity:{}]", id)),
                }
            }

            let (protected, mentions) = protect(&source);
            prop_assert_eq!(mentions.len(), extract_mentions(&source).len());
            prop_assert_eq!(restore(&protected, &mentions), source);
        }

        #[test]
        fn prop_protect_is_identity_without_mentions(source in "[a-zA-Z0-9 \\[\\]:|\n]{0,64}") {
            prop_assume!(extract_mentions(&source).is_empty());
            let (protected, mentions) = protect(&source);
            prop_assert!(mentions.is_empty());
            prop_assert_eq!(protected, source);
        }
    }
}
