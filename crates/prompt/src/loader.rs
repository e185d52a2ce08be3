//! Prompt loader: built-in definitions shadowed by workspace YAML files.

use crate::builtin;
use crate::types::PromptDefinition;
use researchx_core::config::STATE_DIR;
use researchx_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `.researchx/prompts/` wins over the built-in
/// definition with the same id.
///
/// # Example
/// ```no_run
/// use researchx_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "research.refine")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some(source) = builtin::builtin_source(prompt_id) {
        (source.to_string(), "built-in".to_string())
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt not found: {} (no built-in and no {:?})",
            prompt_id, prompt_file
        )));
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::debug!("Loaded prompt {} ({}) from {}", definition.id, definition.title, origin);

    Ok(definition)
}

/// List every prompt id available in the workspace (built-ins and overrides).
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin::builtin_ids().map(str::to_string).collect();
    let dir = prompts_dir(workspace_path);

    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt id mismatch: file for '{}' declares '{}'",
            expected_id, def.id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

/// The set of prompts the engine renders, resolved once per process.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    definitions: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Resolve every built-in id against the workspace overrides.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut definitions = HashMap::new();
        for id in builtin::builtin_ids() {
            definitions.insert(id.to_string(), load_prompt(workspace_path, id)?);
        }
        Ok(Self { definitions })
    }

    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        let mut definitions = HashMap::new();
        for id in builtin::builtin_ids() {
            let source = builtin::builtin_source(id)
                .ok_or_else(|| AppError::Prompt(format!("Missing built-in prompt {}", id)))?;
            let definition: PromptDefinition = serde_yaml::from_str(source)?;
            definitions.insert(id.to_string(), definition);
        }
        Ok(Self { definitions })
    }

    /// Look up a definition.
    pub fn get(&self, prompt_id: &str) -> AppResult<&PromptDefinition> {
        self.definitions
            .get(prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
    }
}
