//! Component Registry Module for the template compiler
//!
//! Maps tag names to component types. The embedding application registers
//! every type (with its primary name and aliases) before compilation starts,
//! then freezes the registry; compilation only reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::validate::ErrorKind;

/// Tag name of the transparent wrapper whose children render without an element.
pub const TRANSPARENT_TAG: &str = "text";

/// What an element's tag resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "typeName", rename_all = "camelCase")]
pub enum TargetType {
    /// Default passthrough container: rendered as a plain element named by its tag.
    #[default]
    Element,
    /// A registered component type.
    Component(String),
    /// `<text>`: children only, no element.
    Transparent,
}

impl TargetType {
    pub fn is_element(&self) -> bool {
        matches!(self, TargetType::Element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBinding {
    pub tag_name: String,
    pub target_type_name: String,
}

/// One `register` call in serialised form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRegistration {
    pub type_name: String,
    pub primary_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tag name \"{tag}\" is claimed by both {existing} and {incoming}")]
    AmbiguousTagName {
        tag: String,
        existing: String,
        incoming: String,
    },

    #[error("cannot register {type_name} after the registry is frozen")]
    Frozen { type_name: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::AmbiguousTagName { .. } => ErrorKind::AmbiguousTagName,
            RegistryError::Frozen { .. } => ErrorKind::RegistryFrozen,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    /// Keyed by lowercased tag name.
    names: HashMap<String, ComponentBinding>,
    frozen: bool,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// Build and freeze a registry from serialised registrations.
    pub fn from_registrations(
        registrations: &[ComponentRegistration],
    ) -> Result<Self, RegistryError> {
        let mut registry = ComponentRegistry::new();
        for reg in registrations {
            let aliases: Vec<&str> = reg.aliases.iter().map(String::as_str).collect();
            registry.register(&reg.type_name, &reg.primary_name, &aliases)?;
        }
        registry.freeze();
        Ok(registry)
    }

    /// Register `type_name` under its primary name and aliases.
    ///
    /// All names are checked before any is inserted, so a rejected call leaves
    /// the registry unchanged. Registering the same pair twice is a no-op.
    pub fn register(
        &mut self,
        type_name: &str,
        primary_name: &str,
        aliases: &[&str],
    ) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen {
                type_name: type_name.to_string(),
            });
        }

        let names: Vec<&str> = std::iter::once(primary_name)
            .chain(aliases.iter().copied())
            .collect();

        for name in &names {
            if let Some(existing) = self.names.get(&name.to_lowercase()) {
                if existing.target_type_name != type_name {
                    return Err(RegistryError::AmbiguousTagName {
                        tag: name.to_string(),
                        existing: existing.target_type_name.clone(),
                        incoming: type_name.to_string(),
                    });
                }
            }
        }

        for name in names {
            self.names.insert(
                name.to_lowercase(),
                ComponentBinding {
                    tag_name: name.to_string(),
                    target_type_name: type_name.to_string(),
                },
            );
        }
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Case-insensitive exact match.
    pub fn lookup(&self, tag_name: &str) -> Option<&str> {
        self.names
            .get(&tag_name.to_lowercase())
            .map(|binding| binding.target_type_name.as_str())
    }

    /// Resolve a tag to its target. Unknown tags become plain elements so that
    /// unregistered or future tags still compile.
    pub fn resolve(&self, tag_name: &str) -> TargetType {
        if let Some(type_name) = self.lookup(tag_name) {
            return TargetType::Component(type_name.to_string());
        }
        if tag_name == TRANSPARENT_TAG {
            TargetType::Transparent
        } else {
            TargetType::Element
        }
    }
}
