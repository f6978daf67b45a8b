//! Resource loading and the installed-model registry
//!
//! A run consumes three bundled resources: the prompt catalog, the
//! category-to-model routing table, and the installed-model list. All
//! three are external collaborators behind the [`ResourceLoader`] contract;
//! any failure to load one aborts the whole run before a prompt is
//! processed. Model descriptors come from a [`ModelRegistry`], looked up
//! by model id at load time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::PromptItem;
use crate::error::{MedirError, Result};
use crate::route::RoutingTable;

/// Everything the engine needs to load one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable model identifier
    pub model_id: String,
    /// Path to the model weights on local storage
    pub local_path: String,
    /// Runtime library the weights were compiled for
    pub library: String,
    /// Rough resident-memory footprint once loaded
    pub estimated_memory_bytes: u64,
}

/// Contract for loading run resources
///
/// Implementations read from bundled files, a network cache, or test
/// fixtures; the orchestrator treats every error as a whole-run abort.
pub trait ResourceLoader {
    /// Load the ordered prompt catalog
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] if the catalog is absent or
    /// malformed.
    fn load_prompts(&self) -> Result<Vec<PromptItem>>;

    /// Load the category-to-model routing table
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] if the table is absent or
    /// malformed.
    fn load_routing_table(&self) -> Result<RoutingTable>;

    /// Load the set of installed model ids
    ///
    /// # Errors
    /// Returns [`MedirError::ResourceMissing`] if the list is absent or
    /// malformed.
    fn load_installed_models(&self) -> Result<HashSet<String>>;
}

/// Contract for descriptor lookup by model id
pub trait ModelRegistry {
    /// Descriptor for an installed model, or `None` if unknown
    fn descriptor(&self, model_id: &str) -> Option<ModelDescriptor>;

    /// Whether a model id is installed
    fn is_installed(&self, model_id: &str) -> bool {
        self.descriptor(model_id).is_some()
    }
}

/// JSON-file-backed loader and registry
///
/// Reads `prompts.json`, `routing.json`, and `models.json` from a resource
/// directory. `models.json` is a list of [`ModelDescriptor`]s and doubles
/// as the installed-model registry.
#[derive(Debug, Clone)]
pub struct JsonResourceLoader {
    dir: PathBuf,
}

impl JsonResourceLoader {
    /// Create a loader rooted at a resource directory
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let text = std::fs::read_to_string(&path).map_err(|e| MedirError::ResourceMissing {
            resource: file.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| MedirError::ResourceMissing {
            resource: file.to_string(),
            reason: format!("malformed JSON: {e}"),
        })
    }

    fn read_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.read("models.json")
    }
}

impl ResourceLoader for JsonResourceLoader {
    fn load_prompts(&self) -> Result<Vec<PromptItem>> {
        self.read("prompts.json")
    }

    fn load_routing_table(&self) -> Result<RoutingTable> {
        self.read("routing.json")
    }

    fn load_installed_models(&self) -> Result<HashSet<String>> {
        Ok(self
            .read_models()?
            .into_iter()
            .map(|d| d.model_id)
            .collect())
    }
}

impl ModelRegistry for JsonResourceLoader {
    fn descriptor(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.read_models()
            .ok()?
            .into_iter()
            .find(|d| d.model_id == model_id)
    }
}

/// In-memory registry for tests and embedded catalogs
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    models: Vec<ModelDescriptor>,
}

impl StaticRegistry {
    /// Create a registry over a fixed descriptor list
    #[must_use]
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Installed model ids as a set
    #[must_use]
    pub fn installed(&self) -> HashSet<String> {
        self.models.iter().map(|d| d.model_id.clone()).collect()
    }
}

impl ModelRegistry for StaticRegistry {
    fn descriptor(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.models.iter().find(|d| d.model_id == model_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CategoryLabel;

    fn descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            model_id: id.to_string(),
            local_path: format!("/models/{id}"),
            library: format!("{id}-lib"),
            estimated_memory_bytes: 1_000_000,
        }
    }

    #[test]
    fn test_static_registry_lookup() {
        let registry = StaticRegistry::new(vec![descriptor("M1"), descriptor("M2")]);
        assert!(registry.is_installed("M1"));
        assert!(!registry.is_installed("M9"));
        assert_eq!(registry.descriptor("M2").unwrap().library, "M2-lib");
        assert_eq!(registry.installed().len(), 2);
    }

    #[test]
    fn test_json_loader_missing_file_is_resource_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = JsonResourceLoader::new(dir.path());
        let err = loader.load_prompts().unwrap_err();
        assert!(matches!(err, MedirError::ResourceMissing { .. }));
        assert!(err.to_string().contains("prompts.json"));
    }

    #[test]
    fn test_json_loader_malformed_file_is_resource_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("routing.json"), "{not json").unwrap();
        let loader = JsonResourceLoader::new(dir.path());
        let err = loader.load_routing_table().unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_json_loader_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = vec![PromptItem::new(1, CategoryLabel::Factual, "What is Rust?")];
        std::fs::write(
            dir.path().join("prompts.json"),
            serde_json::to_string(&prompts).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("routing.json"),
            r#"{"factual": "M1", "reasoning": "M2"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("models.json"),
            serde_json::to_string(&vec![descriptor("M1")]).unwrap(),
        )
        .unwrap();

        let loader = JsonResourceLoader::new(dir.path());
        assert_eq!(loader.load_prompts().unwrap().len(), 1);

        let table = loader.load_routing_table().unwrap();
        assert_eq!(table.get(&CategoryLabel::Factual).unwrap(), "M1");

        let installed = loader.load_installed_models().unwrap();
        assert!(installed.contains("M1"));
        assert!(!installed.contains("M2"));
        assert!(loader.descriptor("M1").is_some());
        assert!(loader.descriptor("M2").is_none());
    }
}
