//! Resource URI templates such as `greeting://{name}`
//!
//! A template is a scheme plus `/`-separated segments. Each segment is either a
//! literal or a whole-segment `{placeholder}`; placeholders bind positionally.

use std::{fmt, sync::OnceLock};

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<Segment>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_]*)\}$").expect("valid placeholder pattern")
    })
}

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("valid scheme pattern")
    })
}

fn split_uri(uri: &str) -> Option<(&str, std::str::Split<'_, char>)> {
    let (scheme, path) = uri.split_once("://")?;
    Some((scheme, path.split('/')))
}

impl UriTemplate {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (scheme, parts) =
            split_uri(raw).ok_or_else(|| "template must start with `scheme://`".to_string())?;

        if !scheme_pattern().is_match(scheme) {
            return Err(format!("invalid scheme `{scheme}`"));
        }

        let mut segments = Vec::new();
        for part in parts {
            if let Some(captures) = placeholder_pattern().captures(part) {
                let name = captures[1].to_string();
                if segments
                    .iter()
                    .any(|segment| matches!(segment, Segment::Placeholder(existing) if *existing == name))
                {
                    return Err(format!("placeholder `{name}` appears twice"));
                }
                segments.push(Segment::Placeholder(name));
            } else if part.contains('{') || part.contains('}') {
                return Err(format!(
                    "segment `{part}` must be a literal or a whole `{{placeholder}}`"
                ));
            } else if part.is_empty() {
                return Err("empty path segment".to_string());
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// A template without placeholders names exactly one URI.
    pub fn is_static(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Same scheme, same segment count, equal literals and placeholders at the
    /// same positions. Placeholder names do not matter.
    pub fn same_shape(&self, other: &UriTemplate) -> bool {
        self.scheme == other.scheme
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(left), Segment::Literal(right)) => left == right,
                    (Segment::Placeholder(_), Segment::Placeholder(_)) => true,
                    _ => false,
                })
    }

    /// Binds placeholders against `uri`, or `None` when the scheme, the segment
    /// count or a literal segment differs, or a placeholder would bind empty.
    pub fn bind(&self, uri: &str) -> Option<Vec<(String, String)>> {
        let (scheme, parts) = split_uri(uri)?;
        if scheme != self.scheme {
            return None;
        }

        let parts = parts.collect::<Vec<_>>();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Placeholder(_) if part.is_empty() => return None,
                Segment::Placeholder(name) => bindings.push((name.clone(), part.to_string())),
            }
        }

        Some(bindings)
    }

    /// Literal-first ordering key. When two templates match the same URI, the
    /// one with the larger key wins.
    pub(crate) fn specificity(&self) -> Vec<bool> {
        self.segments
            .iter()
            .map(|segment| matches!(segment, Segment::Literal(_)))
            .collect()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
