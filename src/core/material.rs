use crate::core::types::Material;
use crate::utils::allocator::{Arena, EntityId};

pub type MaterialHandle = EntityId;

struct MaterialEntry {
    material: Material,
    /// Outstanding external references. The entry outlives removal while
    /// any remain.
    refs: u32,
    marked: bool,
}

/// Material storage with deferred reclamation. Removal only marks an entry;
/// `collect_garbage` frees marked entries once no external reference keeps
/// them alive. Colliders copy material values out, so reclamation never
/// invalidates in-flight collision work.
pub struct MaterialRegistry {
    entries: Arena<MaterialEntry>,
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arena::new(),
        }
    }

    pub fn add(&mut self, material: Material) -> MaterialHandle {
        debug_assert!(material.density >= 0.0);
        self.entries.insert(MaterialEntry {
            material,
            refs: 0,
            marked: false,
        })
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.entries
            .get(handle)
            .filter(|entry| !entry.marked)
            .map(|entry| &entry.material)
    }

    pub fn update(&mut self, handle: MaterialHandle, material: Material) {
        if let Some(entry) = self.entries.get_mut(handle) {
            if !entry.marked {
                entry.material = material;
            }
        }
    }

    /// Registers an external reference that keeps the entry alive across
    /// removal until released.
    pub fn retain(&mut self, handle: MaterialHandle) {
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.refs += 1;
        }
    }

    pub fn release(&mut self, handle: MaterialHandle) {
        if let Some(entry) = self.entries.get_mut(handle) {
            debug_assert!(entry.refs > 0, "release without matching retain");
            entry.refs = entry.refs.saturating_sub(1);
        }
    }

    /// Marks the entry for deletion. It stays resolvable as "invalid" until
    /// the next garbage collection finds it unreferenced.
    pub fn remove(&mut self, handle: MaterialHandle) {
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.marked = true;
        }
    }

    /// Frees every marked, unreferenced entry. Returns how many were freed.
    pub fn collect_garbage(&mut self) -> usize {
        let stale: Vec<MaterialHandle> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.marked && entry.refs == 0)
            .map(|(handle, _)| handle)
            .collect();
        for handle in &stale {
            self.entries.remove(*handle);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_is_deferred_until_references_drop() {
        let mut registry = MaterialRegistry::new();
        let handle = registry.add(Material::default());
        registry.retain(handle);
        registry.remove(handle);

        // Marked entries read as invalid but are not reclaimed yet
        assert!(registry.get(handle).is_none());
        assert_eq!(registry.collect_garbage(), 0);
        assert_eq!(registry.len(), 1);

        registry.release(handle);
        assert_eq!(registry.collect_garbage(), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn unmarked_entries_survive_collection() {
        let mut registry = MaterialRegistry::new();
        let handle = registry.add(Material::with_density(2.0));
        assert_eq!(registry.collect_garbage(), 0);
        assert!(registry.get(handle).is_some());
    }
}
