//! Prompt template store
//!
//! Templates use `{{placeholder}}` tokens that are replaced literally. The
//! built-in set is compiled in from `prompts/*.md`; a configured directory can
//! override any of them with a file of the same name.

use std::collections::HashMap;
use std::path::Path;

/// Template name used by the arbiter
pub const JUDGE_TEMPLATE: &str = "judge";

const BUILTIN: [(&str, &str); 4] = [
    ("video", include_str!("../prompts/video.md")),
    ("music", include_str!("../prompts/music.md")),
    ("history", include_str!("../prompts/history.md")),
    (JUDGE_TEMPLATE, include_str!("../prompts/judge.md")),
];

/// A named prompt with `{{variable}}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Substitute each `{{key}}` with its value, in the order given.
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        variables
            .iter()
            .fold(self.template.clone(), |text, (key, value)| {
                text.replace(&format!("{{{{{}}}}}", key), value)
            })
    }
}

/// Templates for every producer category plus the judge
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptTemplates {
    /// The compiled-in templates
    pub fn builtin() -> Self {
        let templates = BUILTIN
            .iter()
            .map(|(name, text)| (name.to_string(), PromptTemplate::new(*name, *text)))
            .collect();
        Self { templates }
    }

    /// Built-ins, overridden by `<dir>/<name>.md` where such files exist.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut store = Self::builtin();
        let Some(dir) = dir else {
            return store;
        };

        for (name, _) in BUILTIN {
            let path = dir.join(format!("{}.md", name));
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!(template = name, path = %path.display(), "Loaded prompt override");
                    store = store.with_template(name, text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::error!(path = %path.display(), "Prompt file not found; using built-in");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Prompt file unreadable; using built-in");
                }
            }
        }
        store
    }

    /// Replace or add a template
    pub fn with_template(mut self, name: &str, text: impl Into<String>) -> Self {
        self.templates
            .insert(name.to_string(), PromptTemplate::new(name, text));
        self
    }

    /// Look up a template. Unknown names yield an empty template.
    pub fn get(&self, name: &str) -> PromptTemplate {
        self.templates
            .get(name)
            .cloned()
            .unwrap_or_else(|| PromptTemplate::new(name, ""))
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}
