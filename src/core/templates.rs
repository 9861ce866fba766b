use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable prompt. `content` may contain placeholder markers such as
/// `{topic}`; the core never substitutes them. Filling placeholders is a
/// presentation concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered collection of prompt templates, most recently added first.
///
/// Id uniqueness is the caller's responsibility; names and contents may
/// repeat freely.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: Vec<PromptTemplate>,
}

impl TemplateStore {
    pub fn new() -> Self {
        TemplateStore::default()
    }

    /// A store seeded with the stock templates shipped with the app.
    pub fn with_builtins(now: DateTime<Utc>) -> Self {
        TemplateStore {
            templates: builtin_templates(now),
        }
    }

    pub fn list(&self) -> &[PromptTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn add(&mut self, template: PromptTemplate) {
        self.templates.insert(0, template);
    }

    /// Remove the first template with the given id. Returns `false` and
    /// leaves the store unchanged when no such template exists.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.templates.iter().position(|t| t.id == id) {
            Some(index) => {
                self.templates.remove(index);
                true
            }
            None => false,
        }
    }
}

fn builtin_templates(now: DateTime<Utc>) -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            id: "1".to_string(),
            name: "Code Review".to_string(),
            content: "Please review this code and provide feedback on:\n1. Code quality\n2. Potential bugs\n3. Performance improvements\n4. Best practices\n\nCode:\n{code}"
                .to_string(),
            category: "Development".to_string(),
            created_at: now,
        },
        PromptTemplate {
            id: "2".to_string(),
            name: "Creative Writing".to_string(),
            content: "Write a creative story about {topic} with the following elements:\n- Engaging characters\n- Interesting plot twists\n- Vivid descriptions\n- Emotional depth"
                .to_string(),
            category: "Creative".to_string(),
            created_at: now,
        },
        PromptTemplate {
            id: "3".to_string(),
            name: "Data Analysis".to_string(),
            content: "Analyze this data and provide insights:\n1. Key trends\n2. Anomalies\n3. Recommendations\n4. Visualizations to consider\n\nData:\n{data}"
                .to_string(),
            category: "Analysis".to_string(),
            created_at: now,
        },
    ]
}
