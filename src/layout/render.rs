use serde::{Deserialize, Serialize};

use crate::layout::{punctuation, Doc};

/// A named byte-offset region of rendered output, recorded for every
/// [Doc::Tag] in visit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRegion {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

pub(super) fn compact(doc: &Doc) -> String {
    let mut w = CompactWriter {
        out: String::new(),
        glue: false,
    };
    w.write(doc);
    w.out
}

struct CompactWriter {
    out: String,
    /// When set, the next word is written tight against the previous one.
    glue: bool,
}

impl CompactWriter {
    fn write_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if !self.out.is_empty() && !self.glue {
            self.out.push(' ');
        }
        self.out.push_str(s);
        self.glue = false;
    }

    fn write(&mut self, doc: &Doc) {
        match doc {
            Doc::Text(s) => self.write_str(s),
            Doc::Line(words) => {
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        self.glue = true;
                    }
                    self.write(w);
                }
            }
            Doc::List { sep, items } => {
                let condense = punctuation(sep);
                let last = items.len().saturating_sub(1);
                for (i, item) in items.iter().enumerate() {
                    self.write(item);
                    if i < last {
                        self.glue = condense;
                        self.write_str(sep);
                    }
                }
            }
            Doc::Scope { open, close, items } => {
                let condense = punctuation(open) && punctuation(close);
                self.glue = condense;
                self.write_str(open);
                self.glue = condense;
                for item in items {
                    self.write(item);
                }
                self.glue = condense;
                self.write_str(close);
                self.glue = condense;
            }
            Doc::Section { header, content } => {
                for d in header {
                    self.write(d);
                }
                for d in content {
                    self.write(d);
                }
            }
            Doc::Roster(items) => {
                for d in items {
                    self.write(d);
                }
            }
            Doc::Tag { item, .. } => self.write(item),
        }
    }
}

pub(super) fn pretty(doc: &Doc, tab: &str) -> (String, Vec<TagRegion>) {
    let mut w = PrettyWriter {
        tab,
        level: 0,
        lines: Vec::new(),
        tags: Vec::new(),
        sealed: -1,
        sealed_len: 0,
    };
    w.write(doc);
    (w.generate(), w.tags)
}

struct PrettyWriter<'a> {
    tab: &'a str,
    level: i64,
    lines: Vec<(i64, Vec<String>)>,
    tags: Vec<TagRegion>,
    /// Index of the last line whose length is folded into `sealed_len`.
    sealed: i64,
    sealed_len: usize,
}

impl PrettyWriter<'_> {
    fn generate(&self) -> String {
        self.lines
            .iter()
            .map(|(level, words)| {
                let indent = self.tab.repeat((*level).max(0) as usize);
                format!("{indent}{}", words.concat())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn line_len(&self, index: usize) -> usize {
        let (level, words) = &self.lines[index];
        (*level).max(0) as usize * self.tab.len() + words.iter().map(String::len).sum::<usize>()
    }

    /// Fold every line but the last into the sealed prefix length, counting a
    /// newline after each.
    fn update_sealed(&mut self) {
        let new_sealed = self.lines.len() as i64 - 2;
        if new_sealed < 0 {
            return;
        }
        let mut acc = 0;
        for i in (self.sealed + 1)..=new_sealed {
            acc += self.line_len(i as usize) + 1;
        }
        self.sealed = new_sealed;
        self.sealed_len += acc;
    }

    fn current_offset(&mut self) -> usize {
        if self.lines.is_empty() {
            return 0;
        }
        self.update_sealed();
        self.sealed_len + self.line_len(self.lines.len() - 1)
    }

    fn add(&mut self, s: &str) {
        match self.lines.last_mut() {
            Some((_, words)) => words.push(s.to_string()),
            None => self.lines.push((self.level, vec![s.to_string()])),
        }
    }

    fn openline(&mut self, indent: i64) {
        if let Some((_, words)) = self.lines.last_mut() {
            if words.is_empty() {
                return;
            }
            if let Some(last) = words.last_mut() {
                *last = last.trim_end().to_string();
            }
        }
        self.level += indent;
        self.lines.push((self.level, Vec::new()));
    }

    fn begin_structure(&mut self, doc: &Doc) -> i64 {
        if self.lines.is_empty() || !doc.inline() {
            self.openline(0);
        }
        self.level
    }

    /// A child roster: opens a line unless the current one is still empty.
    fn visit_block(&mut self, items: &[Doc]) {
        let saved = self.level;
        self.openline(0);
        for item in items {
            self.write(item);
        }
        self.level = saved;
    }

    fn write(&mut self, doc: &Doc) {
        match doc {
            Doc::Text(s) => {
                if !s.is_empty() {
                    self.add(s);
                }
            }
            Doc::Line(words) => {
                let saved = self.begin_structure(doc);
                for w in words {
                    if !w.inline() {
                        self.openline(1);
                    }
                    self.write(w);
                }
                self.level = saved;
            }
            Doc::List { sep, items } => {
                let saved = self.begin_structure(doc);
                let condense = punctuation(sep);
                if let Some((last, init)) = items.split_last() {
                    for item in init {
                        self.write(item);
                        if !condense {
                            self.add(" ");
                        }
                        if !sep.is_empty() {
                            self.add(sep);
                        }
                        self.openline(0);
                    }
                    self.write(last);
                }
                self.level = saved;
            }
            Doc::Scope { open, close, items } => {
                let saved = self.begin_structure(doc);
                if !open.is_empty() {
                    self.add(open);
                }
                self.openline(1);
                for item in items {
                    self.write(item);
                }
                self.openline(-1);
                if !close.is_empty() {
                    self.add(close);
                }
                self.level = saved;
            }
            Doc::Section { header, content } => {
                let saved = self.begin_structure(doc);
                self.visit_block(header);
                self.openline(1);
                self.visit_block(content);
                self.level = saved;
            }
            Doc::Roster(items) => {
                let saved = self.begin_structure(doc);
                for item in items {
                    self.write(item);
                }
                self.level = saved;
            }
            Doc::Tag { name, item } => {
                let saved = self.begin_structure(doc);
                let start = self.current_offset();
                self.write(item);
                let end = self.current_offset();
                self.tags.push(TagRegion {
                    name: name.clone(),
                    start,
                    end,
                });
                self.level = saved;
            }
        }
    }
}
