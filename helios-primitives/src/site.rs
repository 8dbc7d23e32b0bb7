use serde::{Deserialize, Serialize};
use std::fmt;

pub type SourceId = u32;

/// An immutable source buffer registered under a numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    id: SourceId,
    name: String,
    bytes: Vec<u8>,
}

impl Source {
    pub fn new(id: SourceId, name: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        Source {
            id,
            name: name.into(),
            bytes: text.into(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 1-based (line, column) of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;

        for b in self.bytes.iter().take(offset) {
            if *b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        (line, col)
    }
}

/// A position inside a registered source, carried by every token, AST
/// node and IR node. Compared by source identity plus numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub source: SourceId,
    pub start: usize,
    pub end: Option<usize>,
}

impl Site {
    pub fn at(source: SourceId, start: usize) -> Self {
        Site {
            source,
            start,
            end: None,
        }
    }

    pub fn spanning(source: SourceId, start: usize, end: usize) -> Self {
        Site {
            source,
            start,
            end: Some(end),
        }
    }

    /// Covers both sites; falls back to `self` when sources differ.
    pub fn merge(self, other: Site) -> Site {
        if self.source != other.source {
            return self;
        }

        Site {
            source: self.source,
            start: self.start.min(other.start),
            end: Some(self.end.unwrap_or(self.start).max(other.end.unwrap_or(other.start))),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "src{}@{}..{}", self.source, self.start, end),
            None => write!(f, "src{}@{}", self.source, self.start),
        }
    }
}

/// Registry resolving source ids back to buffers for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct Sources {
    items: Vec<Source>,
}

impl Sources {
    pub fn new() -> Self {
        Sources::default()
    }

    pub fn add(&mut self, name: impl Into<String>, text: impl Into<Vec<u8>>) -> SourceId {
        let id = self.items.len() as SourceId;
        self.items.push(Source::new(id, name, text));
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.items.get(id as usize)
    }

    /// `name:line:col` rendering of a site, or the raw offsets when the
    /// source is not registered here.
    pub fn render(&self, site: Site) -> String {
        match self.get(site.source) {
            Some(src) => {
                let (line, col) = src.line_col(site.start);
                format!("{}:{}:{}", src.name(), line, col)
            }
            None => site.to_string(),
        }
    }
}

/// Ordered list of (ir-offset, original-site) pairs linking positions in
/// lowered code back to the user's source.
#[derive(Debug, Default, Clone)]
pub struct CodeMap {
    entries: Vec<(usize, Site)>,
}

impl CodeMap {
    pub fn new() -> Self {
        CodeMap::default()
    }

    /// Entries must arrive in non-decreasing offset order; out-of-order
    /// inserts are placed by binary search to keep lookups valid.
    pub fn insert(&mut self, offset: usize, site: Site) {
        match self.entries.last() {
            Some((last, _)) if *last > offset => {
                let at = self.entries.partition_point(|(o, _)| *o <= offset);
                self.entries.insert(at, (offset, site));
            }
            _ => self.entries.push((offset, site)),
        }
    }

    /// The site of the last entry at or before `offset`.
    pub fn lookup(&self, offset: usize) -> Option<Site> {
        let at = self.entries.partition_point(|(o, _)| *o <= offset);
        at.checked_sub(1).map(|i| self.entries[i].1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, Site)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_newlines() {
        let src = Source::new(0, "main.hl", "ab\ncd\ne");
        assert_eq!(src.line_col(0), (1, 1));
        assert_eq!(src.line_col(3), (2, 1));
        assert_eq!(src.line_col(4), (2, 2));
        assert_eq!(src.line_col(6), (3, 1));
    }

    #[test]
    fn code_map_lookup_is_last_at_or_before() {
        let mut map = CodeMap::new();
        map.insert(0, Site::at(0, 10));
        map.insert(5, Site::at(0, 20));
        map.insert(9, Site::at(0, 30));

        assert_eq!(map.lookup(0), Some(Site::at(0, 10)));
        assert_eq!(map.lookup(4), Some(Site::at(0, 10)));
        assert_eq!(map.lookup(5), Some(Site::at(0, 20)));
        assert_eq!(map.lookup(100), Some(Site::at(0, 30)));
    }

    #[test]
    fn sources_render_sites() {
        let mut sources = Sources::new();
        let id = sources.add("main.hl", "testing x\n");
        assert_eq!(sources.render(Site::at(id, 8)), "main.hl:1:9");
    }
}
