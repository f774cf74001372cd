use std::path::Path;

/// Class names indexed by model output class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    /// Read a newline-separated labels file, one class per line.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let labels = Self::parse(&contents);
        tracing::info!(
            path = %path.as_ref().display(),
            classes = labels.len(),
            "Labels loaded"
        );
        Ok(labels)
    }

    /// Line `i` names class `i`. Only leading and trailing blank lines of
    /// the whole file are dropped; inner blank lines keep their index.
    pub fn parse(contents: &str) -> Self {
        Self {
            names: contents
                .trim()
                .lines()
                .map(|line| line.trim().to_string())
                .collect(),
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Name for `index`, or `class_<index>` when the file has no entry.
    pub fn name(&self, index: usize) -> String {
        match self.names.get(index) {
            Some(name) => name.clone(),
            None => format!("class_{index}"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
