// File: src/rendered.rs
// Purpose: The non-UI rendering target produced by the match tree

/// A rendered node. The host framework consumes this tree; `key` is the
/// rendering-identity hint (the remount key for a match element).
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Element {
        tag: String,
        key: Option<String>,
        children: Vec<Rendered>,
    },
    Text(String),
    Nothing,
}

impl Rendered {
    pub fn element(tag: impl Into<String>, children: Vec<Rendered>) -> Self {
        Rendered::Element { tag: tag.into(), key: None, children }
    }

    pub fn keyed(tag: impl Into<String>, key: Option<String>, children: Vec<Rendered>) -> Self {
        Rendered::Element { tag: tag.into(), key, children }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Rendered::Text(text.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Rendered::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Rendered::Element { key, .. } => key.as_deref(),
            _ => None,
        }
    }

    /// Depth-first search for the first element with the given tag.
    pub fn find(&self, wanted: &str) -> Option<&Rendered> {
        match self {
            Rendered::Element { tag, children, .. } => {
                if tag == wanted {
                    return Some(self);
                }
                children.iter().find_map(|child| child.find(wanted))
            }
            _ => None,
        }
    }

    /// Whether any text node in the tree contains `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Rendered::Text(text) => text.contains(needle),
            Rendered::Element { children, .. } => {
                children.iter().any(|child| child.contains_text(needle))
            }
            Rendered::Nothing => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_contains() {
        let tree = Rendered::element(
            "root",
            vec![Rendered::keyed(
                "child",
                Some("k1".to_string()),
                vec![Rendered::text("hello world")],
            )],
        );
        assert_eq!(tree.find("child").and_then(Rendered::key), Some("k1"));
        assert!(tree.contains_text("hello"));
        assert!(!tree.contains_text("goodbye"));
        assert!(tree.find("missing").is_none());
    }
}
