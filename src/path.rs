use itertools::Itertools;
use std::fmt;

/// One step into a document: an object key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// An address inside a document, shared by the value store and the schema cache.
///
/// The canonical string form joins keys with `.` and writes indices as `[n]`,
/// so `["root", "actions", 0]` becomes `root.actions[0]`. Key text containing
/// `.`, `[`, `]` or `\` is escaped with a backslash, which keeps a key `"0"`
/// and an index `0` apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path, addressing the whole document.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The conventional top-level path of an edited document (`root`).
    pub fn root() -> Self {
        Self::empty().child("root")
    }

    /// Builds a path from keys (`&str`, `String`) and indices (`usize`).
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// The segments from the top of the document down.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments, which is also the nesting depth.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// This path extended by the object key `key`.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// This path extended by the sequence index `index`.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// The path one segment up; `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The final segment, naming this location within its parent.
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// True when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True when the paths are equal or one is an ancestor of the other.
    pub fn is_related(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// The canonical, collision-free string key.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parses the canonical string form produced by [`Path::key`].
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut pending_key = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                    pending_key = true;
                }
                '.' => {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                    pending_key = true;
                }
                '[' => {
                    if pending_key || !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    }
                    let digits: String = chars.by_ref().take_while(|c| *c != ']').collect();
                    match digits.parse::<usize>() {
                        Ok(index) => segments.push(Segment::Index(index)),
                        Err(_) => segments.push(Segment::Key(digits)),
                    }
                    pending_key = false;
                    // An index followed by `.` starts a new key; skip the separator.
                    if chars.peek() == Some(&'.') {
                        chars.next();
                        pending_key = true;
                    }
                }
                other => {
                    current.push(other);
                    pending_key = true;
                }
            }
        }
        if pending_key || !current.is_empty() {
            segments.push(Segment::Key(current));
        }
        Self { segments }
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '.' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, segment)| match segment {
                Segment::Key(key) if i == 0 => escape_key(key),
                Segment::Key(key) => format!(".{}", escape_key(key)),
                Segment::Index(index) => format!("[{}]", index),
            })
            .join("");
        f.write_str(&rendered)
    }
}
