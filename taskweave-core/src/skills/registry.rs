//! Skill registry
//!
//! Populated once at startup, then shared read-only behind an `Arc`.
//! Namespaces and names compare case-insensitively; descriptors keep the
//! casing they were registered with.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::skills::{Skill, SkillDescriptor, SkillKey};

#[derive(Debug, Default)]
struct Namespace {
    /// Display name (first registration wins)
    name: String,
    /// Keyed by lowercased skill name
    skills: BTreeMap<String, Skill>,
}

/// Catalog of callable skills keyed by (namespace, name)
#[derive(Debug, Default)]
pub struct SkillRegistry {
    /// Keyed by lowercased namespace
    namespaces: BTreeMap<String, Namespace>,
}

impl SkillRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill; fails if (namespace, name) is taken
    pub fn register(&mut self, skill: impl Into<Skill>) -> Result<()> {
        let skill = skill.into();
        let descriptor = skill.descriptor();
        let namespace = self
            .namespaces
            .entry(descriptor.namespace.to_lowercase())
            .or_insert_with(|| Namespace {
                name: descriptor.namespace.clone(),
                skills: BTreeMap::new(),
            });

        let name_key = descriptor.name.to_lowercase();
        if namespace.skills.contains_key(&name_key) {
            return Err(Error::DuplicateSkill {
                namespace: descriptor.namespace.clone(),
                name: descriptor.name.clone(),
            });
        }

        debug!(
            skill = %descriptor.qualified_name(),
            native = descriptor.is_native,
            "Registered skill"
        );
        namespace.skills.insert(name_key, skill);
        Ok(())
    }

    /// Register several skills, stopping at the first failure
    pub fn register_all(&mut self, skills: impl IntoIterator<Item = Skill>) -> Result<usize> {
        let mut count = 0;
        for skill in skills {
            self.register(skill)?;
            count += 1;
        }
        info!(count, total = self.len(), "Registered skills");
        Ok(count)
    }

    /// Look up a skill
    pub fn lookup(&self, namespace: &str, name: &str) -> Result<&Skill> {
        self.namespaces
            .get(&namespace.to_lowercase())
            .and_then(|ns| ns.skills.get(&name.to_lowercase()))
            .ok_or_else(|| Error::SkillNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Look up by key
    pub fn get(&self, key: &SkillKey) -> Result<&Skill> {
        self.lookup(&key.namespace, &key.name)
    }

    /// Whether a skill is registered
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.lookup(namespace, name).is_ok()
    }

    /// Resolve a reference as written by a model.
    ///
    /// `Namespace.Name` is looked up directly. A bare name resolves only when
    /// exactly one namespace defines it.
    pub fn resolve(&self, reference: &str) -> Option<&Skill> {
        let reference = reference.trim();
        if let Some(key) = SkillKey::parse(reference) {
            return self.get(&key).ok();
        }

        let name = reference.to_lowercase();
        let mut matches = self
            .namespaces
            .values()
            .filter_map(|ns| ns.skills.get(&name));
        match (matches.next(), matches.next()) {
            (Some(skill), None) => Some(skill),
            _ => None,
        }
    }

    /// All descriptors grouped by namespace (namespace order, then name order).
    ///
    /// The iterator is lazy and can be recreated any number of times.
    pub fn catalog(&self) -> impl Iterator<Item = &SkillDescriptor> + '_ {
        self.namespaces
            .values()
            .flat_map(|ns| ns.skills.values().map(Skill::descriptor))
    }

    /// Namespace display names in catalog order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> + '_ {
        self.namespaces.values().map(|ns| ns.name.as_str())
    }

    /// Descriptors of one namespace
    pub fn descriptors_in<'a>(
        &'a self,
        namespace: &str,
    ) -> impl Iterator<Item = &'a SkillDescriptor> + 'a {
        self.namespaces
            .get(&namespace.to_lowercase())
            .into_iter()
            .flat_map(|ns| ns.skills.values().map(Skill::descriptor))
    }

    /// Number of registered skills
    pub fn len(&self) -> usize {
        self.namespaces.values().map(|ns| ns.skills.len()).sum()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
