//! Persona catalog — named prompt templates, read-only to the rest of the
//! system. Loaded from a directory of JSON files, with built-in defaults
//! when the directory is absent or empty.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// A named prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

impl Persona {
    /// Compose the single prompt string handed to the agent process.
    pub fn compose_prompt(&self, title: &str, description: &str) -> String {
        format!("{}\n\n# Task: {}\n\n{}", self.prompt.trim_end(), title, description)
    }
}

/// The set of personas known at startup.
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    /// The built-in default set, used when no persona files exist.
    pub fn builtin() -> Self {
        Self::new(vec![
            Persona {
                id: "implementer".to_string(),
                name: "Implementer".to_string(),
                prompt: "You are a focused software implementer. Complete the task \
                         described below and reply with a concise summary of what you did."
                    .to_string(),
            },
            Persona {
                id: "reviewer".to_string(),
                name: "Reviewer".to_string(),
                prompt: "You are a meticulous reviewer. Review the work described below \
                         and reply with your findings, most important first."
                    .to_string(),
            },
        ])
    }

    /// Load personas from `dir`. Malformed files are skipped and logged; an
    /// absent or empty directory falls back to the built-in set.
    pub async fn load(dir: &Path) -> Self {
        let mut personas = Vec::new();

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => {
                info!(dir = %dir.display(), "No personas directory, using built-in personas");
                return Self::builtin();
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().is_none_or(|ext| ext != "json") {
                        continue;
                    }
                    match fs::read_to_string(&path).await {
                        Ok(raw) => match serde_json::from_str::<Persona>(&raw) {
                            Ok(persona) => personas.push(persona),
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "Skipping malformed persona file");
                            }
                        },
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unreadable persona file");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to scan personas directory");
                    break;
                }
            }
        }

        if personas.is_empty() {
            info!("Personas directory empty, using built-in personas");
            return Self::builtin();
        }

        personas.sort_by(|a, b| a.id.cmp(&b.id));
        info!(count = personas.len(), "Loaded personas");
        Self::new(personas)
    }

    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    /// Resolve the persona to dispatch with: the requested default if
    /// present, otherwise the first in the catalog, otherwise none.
    pub fn resolve(&self, default_id: &str) -> Option<&Persona> {
        self.personas
            .iter()
            .find(|p| p.id == default_id)
            .or_else(|| self.personas.first())
    }
}
