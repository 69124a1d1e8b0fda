//! Hierarchical identifiers such as `Vendor\Package\ClassName`.

use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_SEPARATOR: char = '\\';

/// An identifier split on its hierarchical separator.
///
/// Segments are non-empty and case-sensitive. A leading separator (the
/// global-namespace form `\Acme\Widget`) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    raw: String,
    segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    Empty,
    EmptySegment { position: usize },
    InvalidSegment { segment: String },
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "identifier is empty"),
            IdentifierError::EmptySegment { position } => {
                write!(f, "identifier has an empty segment at position {}", position)
            }
            IdentifierError::InvalidSegment { segment } => {
                write!(f, "identifier segment '{}' cannot name a file", segment)
            }
        }
    }
}

impl std::error::Error for IdentifierError {}

impl Identifier {
    pub fn parse(raw: &str, separator: char) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim_start_matches(separator);
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let mut segments = Vec::new();
        for (position, segment) in trimmed.split(separator).enumerate() {
            if segment.is_empty() {
                return Err(IdentifierError::EmptySegment { position });
            }
            if segment == "." || segment == ".." || segment.contains(['/', '\\', '\0']) {
                return Err(IdentifierError::InvalidSegment {
                    segment: segment.to_string(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the identifier carries at least one separator.
    pub fn is_hierarchical(&self) -> bool {
        self.segments.len() > 1
    }

    /// Separator-independent form used to key per-identifier cache entries.
    pub fn key(&self) -> String {
        self.segments.join("\\")
    }

    /// The coarsest prefix: everything before the first separator.
    pub fn top_level(&self) -> &str {
        &self.segments[0]
    }

    /// Relative file location: segments as directories plus the extension.
    pub fn relative_path(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.segments.iter().collect();
        if !extension.is_empty() {
            let file_name = format!("{}.{}", self.segments[self.segments.len() - 1], extension);
            path.set_file_name(file_name);
        }
        path
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
