/// Description of a model component: its name, ancestry and scalar parameters.
///
/// Configuration lookups use [`lineage`](Self::lineage), so a class inherits
/// the prior defaults, widths, limits and subscripts of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentClass {
    name: String,
    ancestors: Vec<String>,
    parameters: Vec<String>,
}

impl ComponentClass {
    pub fn new<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Records `parent` (and its ancestors) as this class's ancestry.
    pub fn with_parent(mut self, parent: &ComponentClass) -> Self {
        self.ancestors = std::iter::once(parent.name.clone())
            .chain(parent.ancestors.iter().cloned())
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// The class name followed by its ancestors, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.ancestors.iter().map(String::as_str))
    }
}
