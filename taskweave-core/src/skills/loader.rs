//! Load prompt skills from a directory tree
//!
//! Layout: `<root>/<SkillName>/skprompt.txt` plus an optional
//! `<root>/<SkillName>/config.json`. Folders without a template are skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::completion::CompletionOptions;
use crate::error::{Error, Result};
use crate::skills::registry::SkillRegistry;
use crate::skills::{ParameterDescriptor, PromptSkill, Skill};

/// Template file name
pub const PROMPT_FILE: &str = "skprompt.txt";
/// Optional settings file name
pub const CONFIG_FILE: &str = "config.json";

/// Contents of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSkillConfig {
    /// Skill description
    pub description: String,
    /// Completion options for this skill
    pub completion: CompletionOptions,
    /// Declared inputs
    pub input: InputConfig,
}

/// `input` section of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Declared parameters
    pub parameters: Vec<ParameterDescriptor>,
}

/// Load every prompt skill under `root` into `namespace`, sorted by name.
///
/// A folder whose `config.json` cannot be parsed is skipped with a warning.
pub async fn load_prompt_skills(root: impl AsRef<Path>, namespace: &str) -> Result<Vec<Skill>> {
    let root = root.as_ref();
    if !tokio::fs::try_exists(root).await? {
        return Err(Error::Config(format!(
            "skill directory {} does not exist",
            root.display()
        )));
    }

    let mut skills = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        match load_one(&path, namespace).await {
            Ok(Some(skill)) => {
                debug!(skill = %skill.descriptor().qualified_name(), "Loaded prompt skill");
                skills.push(skill);
            }
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping prompt skill"),
        }
    }

    skills.sort_by(|a, b| a.descriptor().name.cmp(&b.descriptor().name));
    info!(
        namespace,
        count = skills.len(),
        root = %root.display(),
        "Loaded prompt skills from directory"
    );
    Ok(skills)
}

/// Load the skills under `root` and register them; returns how many were added
pub async fn import_prompt_skills(
    registry: &mut SkillRegistry,
    root: impl AsRef<Path>,
    namespace: &str,
) -> Result<usize> {
    let skills = load_prompt_skills(root, namespace).await?;
    registry.register_all(skills)
}

async fn load_one(dir: &Path, namespace: &str) -> Result<Option<Skill>> {
    let prompt_path = dir.join(PROMPT_FILE);
    if !tokio::fs::try_exists(&prompt_path).await? {
        return Ok(None);
    }
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };

    let template = tokio::fs::read_to_string(&prompt_path).await?;
    let config_path = dir.join(CONFIG_FILE);
    let config = if tokio::fs::try_exists(&config_path).await? {
        let raw = tokio::fs::read_to_string(&config_path).await?;
        serde_json::from_str::<PromptSkillConfig>(&raw)?
    } else {
        PromptSkillConfig::default()
    };

    let mut skill = PromptSkill::new(namespace, name, config.description, &template)?
        .with_options(config.completion);
    if !config.input.parameters.is_empty() {
        skill = skill.with_parameters(config.input.parameters);
    }
    Ok(Some(Skill::Prompt(skill)))
}
