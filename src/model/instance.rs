//! Model instances: the concrete parameter values a search hands to an analysis.

/// One reconstructed component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    class: String,
    values: Vec<(String, f64)>,
}

impl ComponentInstance {
    pub fn new<I, S>(class: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, parameter: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, value)| *value)
    }

    pub fn values(&self) -> &[(String, f64)] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstanceEntry {
    Component(ComponentInstance),
    Collection(Vec<(String, ComponentInstance)>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInstance {
    entries: Vec<(String, InstanceEntry)>,
}

impl ModelInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, name: impl Into<String>, entry: InstanceEntry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name, entry)),
        }
    }

    pub fn entry(&self, name: &str) -> Option<&InstanceEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentInstance> {
        match self.entry(name)? {
            InstanceEntry::Component(component) => Some(component),
            InstanceEntry::Collection(_) => None,
        }
    }

    pub fn collection(&self, name: &str) -> Option<&[(String, ComponentInstance)]> {
        match self.entry(name)? {
            InstanceEntry::Collection(items) => Some(items),
            InstanceEntry::Component(_) => None,
        }
    }

    /// Looks up `entry.parameter` or `collection.item.parameter`.
    pub fn value(&self, path: &str) -> Option<f64> {
        let mut parts = path.split('.');
        let entry = self.entry(parts.next()?)?;
        match entry {
            InstanceEntry::Component(component) => {
                let parameter = parts.next()?;
                component.get(parameter)
            }
            InstanceEntry::Collection(items) => {
                let item = parts.next()?;
                let parameter = parts.next()?;
                items
                    .iter()
                    .find(|(name, _)| name == item)
                    .and_then(|(_, component)| component.get(parameter))
            }
        }
    }

    /// Copies every entry of `other` into this instance, replacing clashes.
    pub fn merge(&mut self, other: &ModelInstance) {
        for (name, entry) in &other.entries {
            self.insert(name.clone(), entry.clone());
        }
    }

    pub fn entries(&self) -> &[(String, InstanceEntry)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
