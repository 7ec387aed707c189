//! Shared, mutable view of the configured vector field specs.
//!
//! Destination validation may rewrite a spec's vector field name (when the
//! schema resolves the requested name to a different one) and record the
//! resolved side-collection name. Both rewrites happen at most once per
//! process and must be visible to the enrichment listeners, so the specs
//! live behind one registry shared by validator, pipeline, and cleanup.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::config::VectorFieldSpec;

/// Process-wide registry of vector field specs, keyed by source field name.
#[derive(Debug)]
pub struct VectorSpecRegistry {
    specs: RwLock<BTreeMap<String, VectorFieldSpec>>,
}

impl VectorSpecRegistry {
    pub fn new(specs: impl IntoIterator<Item = VectorFieldSpec>) -> Self {
        let specs = specs
            .into_iter()
            .map(|spec| (spec.field_name.clone(), spec))
            .collect();
        Self {
            specs: RwLock::new(specs),
        }
    }

    /// All specs, in field-name order.
    pub fn all(&self) -> Vec<VectorFieldSpec> {
        self.read().values().cloned().collect()
    }

    /// Specs whose vectors are attached inline on the parent document.
    pub fn inline(&self) -> Vec<VectorFieldSpec> {
        self.read()
            .values()
            .filter(|spec| !spec.chunk_field)
            .cloned()
            .collect()
    }

    /// Specs that emit chunk child documents into a side collection.
    pub fn chunked(&self) -> Vec<VectorFieldSpec> {
        self.read()
            .values()
            .filter(|spec| spec.chunk_field)
            .cloned()
            .collect()
    }

    /// Look up one spec by source field name.
    pub fn get(&self, field_name: &str) -> Option<VectorFieldSpec> {
        self.read().get(field_name).cloned()
    }

    /// Number of chunked fields; the vector lineage expects one signal per
    /// document per chunked field.
    pub fn chunk_field_count(&self) -> u64 {
        self.read().values().filter(|spec| spec.chunk_field).count() as u64
    }

    /// Record the schema-resolved vector field name for a spec.
    ///
    /// Returns false when no spec exists for `field_name`.
    pub fn rename_vector_field(&self, field_name: &str, resolved: &str) -> bool {
        let mut specs = self.write();
        match specs.get_mut(field_name) {
            Some(spec) => {
                spec.vector_field_name = Some(resolved.to_string());
                true
            }
            None => false,
        }
    }

    /// Record the resolved side collection for a chunked spec.
    pub fn set_destination_collection(&self, field_name: &str, collection: &str) -> bool {
        let mut specs = self.write();
        match specs.get_mut(field_name) {
            Some(spec) => {
                spec.destination_collection = Some(collection.to_string());
                true
            }
            None => false,
        }
    }

    /// Side collections receiving vector-bearing documents, with the
    /// default naming applied for unresolved chunked specs.
    pub fn vector_destination_collections(&self, destination_collection: &str) -> Vec<String> {
        self.read()
            .values()
            .filter(|spec| spec.chunk_field)
            .map(|spec| spec.chunk_collection_name(destination_collection))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, VectorFieldSpec>> {
        self.specs.read().expect("vector spec registry poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, VectorFieldSpec>> {
        self.specs.write().expect("vector spec registry poisoned")
    }
}
