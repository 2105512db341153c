use std::path::{Path, PathBuf};

/// Output layout of one search.
///
/// ```text
/// <output_root>/<folders...>/<name>/<tag>/
///   model.info  model.results  execution_time  results  image/
///   search/          working files and .checkpoint
///   search_backup/   copy of search/ restored on restart
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    name: String,
    folders: Vec<String>,
    tag: String,
    output_root: PathBuf,
}

impl Paths {
    pub fn new(name: impl Into<String>, output_root: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            folders: Vec::new(),
            tag: String::new(),
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Same folders and tag, name becomes `name/extension`.
    pub fn with_name_extension(&self, extension: &str) -> Self {
        Self {
            name: format!("{}/{extension}", self.name),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn output_path(&self) -> PathBuf {
        let mut path = self.output_root.clone();
        path.extend(&self.folders);
        path.extend(self.name.split('/').filter(|part| !part.is_empty()));
        if !self.tag.is_empty() {
            path.push(&self.tag);
        }
        path
    }

    pub fn search_path(&self) -> PathBuf {
        self.output_path().join("search")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.output_path().join("search_backup")
    }

    pub fn image_path(&self) -> PathBuf {
        self.output_path().join("image")
    }

    pub fn model_info_path(&self) -> PathBuf {
        self.output_path().join("model.info")
    }

    pub fn model_results_path(&self) -> PathBuf {
        self.output_path().join("model.results")
    }

    pub fn param_names_path(&self) -> PathBuf {
        self.search_path().join("model.paramnames")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.search_path().join(".checkpoint")
    }

    pub(crate) fn start_time_path(&self) -> PathBuf {
        self.output_path().join(".start_time")
    }

    pub(crate) fn execution_time_path(&self) -> PathBuf {
        self.output_path().join("execution_time")
    }

    pub(crate) fn grid_results_path(&self) -> PathBuf {
        self.output_path().join("results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_nests_folders_name_and_tag() {
        let paths = Paths::new("phase", "/out")
            .with_folders(["pipeline", "run"])
            .with_tag("tagged");
        assert_eq!(paths.output_path(), PathBuf::from("/out/pipeline/run/phase/tagged"));
        assert_eq!(
            paths.checkpoint_path(),
            PathBuf::from("/out/pipeline/run/phase/tagged/search/.checkpoint")
        );
    }

    #[test]
    fn name_extension_keeps_tag_and_folders() {
        let paths = Paths::new("name", "/out").with_tag("tag");
        let copy = paths.with_name_extension("one");
        assert_eq!(copy.name(), "name/one");
        assert_eq!(copy.tag(), "tag");
        assert_eq!(copy.output_path(), PathBuf::from("/out/name/one/tag"));
    }
}
