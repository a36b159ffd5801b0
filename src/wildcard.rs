//! Read-only wildcard expansion of archive path patterns.
//!
//! Patterns use glob syntax (`*`, `?`, `[...]`, `{a,b}`) in any path
//! component. Parts meant literally must be passed through
//! [`globset::escape`] first; a component made only of escaped characters
//! is matched as a plain name. Expansion walks the directory tree lazily,
//! one directory at a time, and never caches listings: every call to
//! [`PathPattern::expand`] sees the filesystem as it is at that moment.
use globset::{GlobBuilder, GlobMatcher};
use std::ffi::{OsStr, OsString};
use std::path::{Component as PathComponent, Path, PathBuf};

use crate::error::CatalogError;

#[derive(Debug, Clone)]
enum Component {
    Literal(OsString),
    Glob(GlobMatcher),
}

impl Component {
    fn matches(&self, name: &OsStr) -> bool {
        match self {
            Component::Literal(literal) => literal.as_os_str() == name,
            Component::Glob(matcher) => matcher.is_match(name),
        }
    }
}

/// Plain text of a component holding no live wildcard, undoing the
/// `[c]` escapes written by `globset::escape`
fn literal_text(component: &str) -> Option<String> {
    let mut text = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let escaped = chars.next()?;
                if chars.next()? != ']' {
                    return None;
                }
                text.push(escaped);
            }
            '*' | '?' | '{' => return None,
            _ => text.push(c),
        }
    }
    Some(text)
}

/// A path that may contain wildcard components
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// Longest leading run of literal components
    base: PathBuf,
    /// Components after `base`; the first one, if any, is a glob
    rest: Vec<Component>,
}

impl PathPattern {
    pub fn new(pattern: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let pattern = pattern.as_ref();
        let mut base = PathBuf::new();
        let mut rest = Vec::new();

        for component in pattern.components() {
            let component = match component {
                PathComponent::Normal(name) => match name.to_str() {
                    Some(glob) => match literal_text(glob) {
                        Some(text) => Component::Literal(OsString::from(text)),
                        None => {
                            let matcher = GlobBuilder::new(glob)
                                .literal_separator(true)
                                .build()
                                .map_err(|e| {
                                    CatalogError::invalid(format!(
                                        "bad wildcard '{}' in {}: {}",
                                        glob,
                                        pattern.display(),
                                        e
                                    ))
                                })?
                                .compile_matcher();
                            Component::Glob(matcher)
                        }
                    },
                    None => Component::Literal(name.to_os_string()),
                },
                other => Component::Literal(other.as_os_str().to_os_string()),
            };

            match component {
                Component::Literal(name) if rest.is_empty() => base.push(name),
                component => rest.push(component),
            }
        }

        Ok(Self { base, rest })
    }

    /// Start a fresh expansion. The base directory is listed immediately so
    /// a missing or unreadable archive root fails here rather than midway.
    /// A pattern without wildcards expands to itself if the file exists.
    pub fn expand(&self) -> Result<Expansion, CatalogError> {
        let Some(first) = self.rest.first() else {
            let single = if self.base.is_file() {
                vec![self.base.clone()]
            } else {
                Vec::new()
            };
            return Ok(Expansion {
                rest: Vec::new(),
                stack: vec![Frame {
                    candidates: single.into_iter(),
                    depth: 0,
                }],
            });
        };

        let candidates = list_matching(&self.base, first)?;
        Ok(Expansion {
            rest: self.rest.clone(),
            stack: vec![Frame {
                candidates: candidates.into_iter(),
                depth: 0,
            }],
        })
    }
}

/// Sorted entries of `dir` whose names match `component`
fn list_matching(dir: &Path, component: &Component) -> Result<Vec<PathBuf>, CatalogError> {
    let listing_dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let entries =
        std::fs::read_dir(listing_dir).map_err(|e| CatalogError::filesystem(listing_dir, e))?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::filesystem(listing_dir, e))?;
        let name = entry.file_name();
        if component.matches(&name) {
            matches.push(dir.join(name));
        }
    }
    matches.sort();
    Ok(matches)
}

#[derive(Debug)]
struct Frame {
    candidates: std::vec::IntoIter<PathBuf>,
    /// Index in `rest` of the component the candidates matched
    depth: usize,
}

/// Lazy iterator over the paths matching a [`PathPattern`].
///
/// Sub-directories are only listed when the walk reaches them. A listing
/// failure below the base directory is yielded as an `Err` item and the walk
/// continues with the next sibling.
#[derive(Debug)]
pub struct Expansion {
    rest: Vec<Component>,
    stack: Vec<Frame>,
}

impl Iterator for Expansion {
    type Item = Result<PathBuf, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(candidate) = frame.candidates.next() else {
                self.stack.pop();
                continue;
            };

            // Follow any literal components directly below the match
            let mut path = candidate;
            let mut next = frame.depth + 1;
            while let Some(Component::Literal(name)) = self.rest.get(next) {
                path.push(name);
                next += 1;
            }

            if next >= self.rest.len() {
                if path.is_file() {
                    return Some(Ok(path));
                }
                continue;
            }

            if !path.is_dir() {
                continue;
            }
            match list_matching(&path, &self.rest[next]) {
                Ok(candidates) => self.stack.push(Frame {
                    candidates: candidates.into_iter(),
                    depth: next,
                }),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
