//! Attribute paths into typed values and schema nodes.

use std::fmt;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Named attribute of an object.
    Attribute(String),
    /// Key of a map entry.
    Key(String),
    /// Position in a list, set or tuple.
    Index(usize),
    /// Stands for every key or index at this level.
    Wildcard,
}

impl Step {
    pub(crate) fn is_element(&self) -> bool {
        matches!(self, Step::Key(_) | Step::Index(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Attribute(name) | Step::Key(name) => f.write_str(&escape(name)),
            Step::Index(i) => write!(f, "{}", i),
            Step::Wildcard => f.write_str("*"),
        }
    }
}

/// Location of an attribute or element, rendered JSON-Pointer style
/// (`/spec/ports/0/name`). The root path renders as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns a new path with `step` appended.
    pub fn child(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn attribute(&self, name: &str) -> Self {
        self.child(Step::Attribute(name.to_string()))
    }

    pub fn key(&self, key: &str) -> Self {
        self.child(Step::Key(key.to_string()))
    }

    pub fn index(&self, i: usize) -> Self {
        self.child(Step::Index(i))
    }

    pub fn wildcard(&self) -> Self {
        self.child(Step::Wildcard)
    }

    /// Insert `step` at the front. Used when an error or hint bubbles up
    /// from a nested call.
    pub fn prepend(&mut self, step: Step) {
        self.steps.insert(0, step);
    }

    /// Returns `other` appended to this path.
    pub fn join(&self, other: &Path) -> Self {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Self { steps }
    }

    /// Replace every map key and element index with [`Step::Wildcard`].
    pub fn normalized(&self) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .map(|s| if s.is_element() { Step::Wildcard } else { s.clone() })
                .collect(),
        }
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.steps.starts_with(&prefix.steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl FromIterator<Step> for Path {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

// JSON Pointer encoding (~ = ~0, / = ~1), plus * = ~2 so a name never
// renders as a wildcard
fn escape(name: &str) -> String {
    name.replace('~', "~0")
        .replace('/', "~1")
        .replace('*', "~2")
}
