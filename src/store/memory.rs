use crate::model::{Domain, Entity, SchemaRegistry};

use super::{DataProvider, DataStore, StoreError};

/// In-memory store used by tests and the demo dataset. Satisfies the same
/// contracts as the file-backed store, minus durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub tasks: Vec<Entity>,
    pub projects: Vec<Entity>,
    pub timelogs: Vec<Entity>,
    schema: SchemaRegistry,
    /// When set, reads of this domain fail. Lets tests exercise
    /// provider-failure paths.
    pub poisoned: Option<Domain>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tasks: Vec::new(),
            projects: Vec::new(),
            timelogs: Vec::new(),
            schema: SchemaRegistry::new(),
            poisoned: None,
        }
    }

    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut store = Self::new();
        for e in entities {
            store.insert(e);
        }
        store
    }

    pub fn insert(&mut self, entity: Entity) {
        match entity.domain() {
            Domain::Task => self.tasks.push(entity),
            Domain::Project => self.projects.push(entity),
            Domain::TimeLog => self.timelogs.push(entity),
        }
    }

    fn collection_mut(&mut self, domain: Domain) -> &mut Vec<Entity> {
        match domain {
            Domain::Task => &mut self.tasks,
            Domain::Project => &mut self.projects,
            Domain::TimeLog => &mut self.timelogs,
        }
    }

    fn collection(&self, domain: Domain) -> &Vec<Entity> {
        match domain {
            Domain::Task => &self.tasks,
            Domain::Project => &self.projects,
            Domain::TimeLog => &self.timelogs,
        }
    }

    fn write_field(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
        require_editable: bool,
    ) -> Result<(), StoreError> {
        if require_editable {
            let editable = self
                .schema
                .get(domain, field)
                .is_some_and(|s| s.editable);
            if !editable {
                return Err(StoreError::NotEditable {
                    domain,
                    field: field.to_string(),
                });
            }
        }
        self.schema.validate(domain, field, value)?;
        let entity = self
            .collection_mut(domain)
            .iter_mut()
            .find(|e| e.key() == key)
            .ok_or_else(|| StoreError::NotFound {
                domain,
                key: key.to_string(),
            })?;
        if !entity.set_field(field, value) {
            return Err(StoreError::NotEditable {
                domain,
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

impl DataProvider for MemoryStore {
    fn entities(&self, domain: Domain) -> Result<Vec<Entity>, StoreError> {
        if self.poisoned == Some(domain) {
            return Err(StoreError::NotFound {
                domain,
                key: "<dataset unavailable>".to_string(),
            });
        }
        Ok(self.collection(domain).clone())
    }
}

impl DataStore for MemoryStore {
    fn apply_edit(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.write_field(domain, key, field, value, true)
    }

    fn delete_entities(&mut self, domain: Domain, keys: &[String]) -> Result<(), StoreError> {
        let collection = self.collection_mut(domain);
        collection.retain(|e| !keys.contains(&e.key()));
        Ok(())
    }

    fn move_group_field(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.write_field(domain, key, field, value, false)
    }
}
