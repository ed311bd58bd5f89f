//! Abstract document tree for SQL text.
//!
//! Emission produces a [Doc] rather than a string, so that the same tree can
//! be rendered compactly on one line or indented over many, and so that
//! [tagged](Doc::Tag) regions can be reported with their final byte offsets.
//!
//! Spacing rules hinge on punctuation: a list separator that contains no
//! alphanumerics (`,`) is written tight against the preceding item, and a
//! scope whose delimiters are both punctuation (`(`…`)`) glues to its
//! neighbors in compact form.

mod render;

pub use render::TagRegion;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Doc {
    /// A raw word. Words inside a [Doc::Line] are adjacent; they carry their
    /// own internal spacing.
    Text(String),
    Line(Vec<Doc>),
    List { sep: String, items: Vec<Doc> },
    Scope {
        open: String,
        close: String,
        items: Vec<Doc>,
    },
    Section {
        header: Vec<Doc>,
        content: Vec<Doc>,
    },
    Roster(Vec<Doc>),
    Tag { name: String, item: Box<Doc> },
}

pub(crate) fn punctuation(s: &str) -> bool {
    !s.chars().any(|c| c.is_alphanumeric())
}

impl Doc {
    pub fn text(s: impl Into<String>) -> Doc {
        Doc::Text(s.into())
    }

    /// A line of adjacent words. Nested lines are flattened into the word
    /// list, mirroring how lines merge when joined.
    pub fn line(words: impl IntoIterator<Item = Doc>) -> Doc {
        let mut out = Vec::new();
        for w in words {
            match w {
                Doc::Line(ws) => out.extend(ws),
                other => out.push(other),
            }
        }
        Doc::Line(out)
    }

    pub fn list(sep: impl Into<String>, items: Vec<Doc>) -> Doc {
        Doc::List {
            sep: sep.into(),
            items,
        }
    }

    pub fn scope(open: impl Into<String>, close: impl Into<String>, items: Vec<Doc>) -> Doc {
        Doc::Scope {
            open: open.into(),
            close: close.into(),
            items,
        }
    }

    pub fn section(header: Vec<Doc>, content: Vec<Doc>) -> Doc {
        Doc::Section { header, content }
    }

    /// A section titled by a single header line.
    pub fn titled(title: impl Into<String>, content: Vec<Doc>) -> Doc {
        Doc::section(vec![Doc::line([Doc::text(title)])], content)
    }

    pub fn roster(items: Vec<Doc>) -> Doc {
        Doc::Roster(items)
    }

    pub fn tag(name: impl Into<String>, item: Doc) -> Doc {
        Doc::Tag {
            name: name.into(),
            item: Box::new(item),
        }
    }

    /// Join documents into one line, inserting `sep` as a word between them.
    pub fn join(sep: &str, items: impl IntoIterator<Item = Doc>) -> Doc {
        let mut words = Vec::new();
        for item in items {
            if !sep.is_empty() && !words.is_empty() {
                words.push(Doc::Text(sep.to_string()));
            }
            match item {
                Doc::Line(ws) => words.extend(ws),
                other => words.push(other),
            }
        }
        Doc::Line(words)
    }

    /// Whether the node may continue the current output line.
    pub(crate) fn inline(&self) -> bool {
        match self {
            Doc::Text(_) => true,
            Doc::Scope { open, close, .. } => punctuation(open) && punctuation(close),
            Doc::Tag { item, .. } => item.inline(),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Doc::Text(s) => s.is_empty(),
            Doc::Line(words) => words.is_empty(),
            Doc::List { items, .. } | Doc::Scope { items, .. } | Doc::Roster(items) => {
                items.is_empty()
            }
            Doc::Section { header, content } => header.is_empty() && content.is_empty(),
            Doc::Tag { item, .. } => item.is_empty(),
        }
    }

    /// Render on a single line.
    pub fn compact(&self) -> String {
        render::compact(self)
    }

    /// Render indented with the default two-space unit.
    pub fn pretty(&self) -> String {
        self.pretty_with("  ")
    }

    pub fn pretty_with(&self, tab: &str) -> String {
        render::pretty(self, tab).0
    }

    /// Render indented and report the byte-offset region of every tag.
    pub fn pretty_tagged(&self, tab: &str) -> (String, Vec<TagRegion>) {
        render::pretty(self, tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn select_abc() -> Vec<Doc> {
        vec![Doc::titled(
            "SELECT",
            vec![Doc::list(
                ",",
                vec![
                    Doc::line([Doc::text("a")]),
                    Doc::line([Doc::text("b")]),
                    Doc::line([Doc::text("c")]),
                ],
            )],
        )]
    }

    #[test]
    fn test_simple_structure() {
        let root = Doc::roster(select_abc());
        assert_eq!(root.compact(), "SELECT a, b, c");
        assert_eq!(root.pretty(), "SELECT\n  a,\n  b,\n  c");

        let mut items = select_abc();
        items.push(Doc::titled("FROM", vec![Doc::line([Doc::text("t")])]));
        items.push(Doc::titled(
            "WHERE",
            vec![Doc::list(
                "AND",
                vec![
                    Doc::line([Doc::text("(A = B)")]),
                    Doc::line([Doc::text("(C = D)")]),
                    Doc::line([Doc::text("(E = F)")]),
                ],
            )],
        ));
        let root = Doc::roster(items);
        assert_eq!(
            root.compact(),
            "SELECT a, b, c FROM t WHERE (A = B) AND (C = D) AND (E = F)"
        );
        assert_eq!(
            root.pretty(),
            "SELECT\n  a,\n  b,\n  c\nFROM\n  t\nWHERE\n  (A = B) AND\n  (C = D) AND\n  (E = F)"
        );
    }

    #[test]
    fn test_nested_scope() {
        let sub = Doc::roster(vec![
            Doc::titled("SELECT", vec![Doc::list(",", vec![Doc::line([Doc::text("gg")])])]),
            Doc::titled("FROM", vec![Doc::line([Doc::text("tt")])]),
        ]);
        let mut items = select_abc();
        items.push(Doc::titled("FROM", vec![Doc::line([Doc::text("t")])]));
        items.push(Doc::titled(
            "WHERE",
            vec![Doc::list(
                "AND",
                vec![
                    Doc::line([Doc::text("(A = B)")]),
                    Doc::line([
                        Doc::text("(G = "),
                        Doc::scope("(", ")", vec![Doc::line([sub])]),
                        Doc::text(")"),
                    ]),
                ],
            )],
        ));
        let root = Doc::roster(items);
        assert_eq!(
            root.compact(),
            "SELECT a, b, c FROM t WHERE (A = B) AND (G = (SELECT gg FROM tt))"
        );
        assert_eq!(
            root.pretty(),
            "SELECT\n  a,\n  b,\n  c\nFROM\n  t\nWHERE\n  (A = B) AND\n  (G = (\n    SELECT\n      gg\n    FROM\n      tt\n  ))"
        );
    }

    #[test]
    fn test_tag_offsets_across_lines() {
        let root = Doc::roster(vec![
            Doc::line([Doc::text("alpha")]),
            Doc::tag("mid", Doc::line([Doc::text("beta")])),
            Doc::line([Doc::text("gamma")]),
        ]);
        let (text, tags) = root.pretty_tagged("  ");
        assert_eq!(text, "alpha\nbeta\ngamma");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "mid");
        assert_eq!(&text[tags[0].start..tags[0].end], "beta");
    }

    #[test]
    fn test_tag_offsets_within_line() {
        let root = Doc::line([
            Doc::text("a "),
            Doc::tag("x", Doc::text("bc")),
            Doc::text(" d"),
        ]);
        let (text, tags) = root.pretty_tagged("  ");
        assert_eq!(text, "a bc d");
        assert_eq!((tags[0].start, tags[0].end), (2, 4));
    }

    #[test]
    fn test_tag_offsets_count_indentation() {
        let root = Doc::roster(vec![Doc::titled(
            "WHERE",
            vec![Doc::tag("pred", Doc::line([Doc::text("(A = B)")]))],
        )]);
        let (text, tags) = root.pretty_tagged("  ");
        assert_eq!(text, "WHERE\n  (A = B)");
        assert_eq!(&text[tags[0].start..tags[0].end], "(A = B)");
    }

    #[test]
    fn test_join_flattens_lines() {
        let joined = Doc::join(
            " + ",
            vec![Doc::line([Doc::text("A")]), Doc::line([Doc::text("B")])],
        );
        assert_eq!(joined, Doc::Line(vec![
            Doc::Text("A".into()),
            Doc::Text(" + ".into()),
            Doc::Text("B".into()),
        ]));
        assert_eq!(joined.pretty(), "A + B");
    }
}
