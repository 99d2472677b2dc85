//! Client and supplier management

use tracing::debug;

use crate::ledger::Bookkeeper;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{normalize_optional, normalize_phone};

/// Data for a new client or supplier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDraft {
    pub name: String,
    pub nrc: Option<String>,
    pub nit: String,
    pub address: String,
    pub activity: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>, nit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nit: nit.into(),
            ..Default::default()
        }
    }

    pub fn nrc(mut self, nrc: impl Into<String>) -> Self {
        self.nrc = Some(nrc.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = activity.into();
        self
    }

    pub fn contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    fn into_entity(self, id: String) -> Entity {
        Entity {
            id,
            name: self.name.trim().to_string(),
            nrc: normalize_optional(self.nrc.as_deref()),
            nit: self.nit.trim().to_string(),
            address: self.address.trim().to_string(),
            activity: self.activity.trim().to_string(),
            contact: normalize_optional(self.contact.as_deref()),
            phone: self.phone.as_deref().and_then(normalize_phone),
        }
    }
}

/// Shallow field replacement for an existing entity.
///
/// `None` leaves a field untouched. For optional fields `Some(None)` (or a
/// blank value) clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub nrc: Option<Option<String>>,
    pub nit: Option<String>,
    pub address: Option<String>,
    pub activity: Option<String>,
    pub contact: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

impl EntityPatch {
    fn apply(self, entity: &mut Entity) {
        if let Some(name) = self.name {
            entity.name = name.trim().to_string();
        }
        if let Some(nrc) = self.nrc {
            entity.nrc = normalize_optional(nrc.as_deref());
        }
        if let Some(nit) = self.nit {
            entity.nit = nit.trim().to_string();
        }
        if let Some(address) = self.address {
            entity.address = address.trim().to_string();
        }
        if let Some(activity) = self.activity {
            entity.activity = activity.trim().to_string();
        }
        if let Some(contact) = self.contact {
            entity.contact = normalize_optional(contact.as_deref());
        }
        if let Some(phone) = self.phone {
            entity.phone = phone.as_deref().and_then(normalize_phone);
        }
    }
}

impl<S: SnapshotStore> Bookkeeper<S> {
    /// All entities of a kind, in insertion order
    pub fn list_entities(&self, kind: EntityKind) -> &[Entity] {
        self.state.entities(kind)
    }

    /// Get an entity by ID
    pub fn get_entity(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.state.entities(kind).iter().find(|e| e.id == id)
    }

    /// Resolve an NRC reference; `None` means the party is unknown
    pub fn find_entity_by_nrc(&self, kind: EntityKind, nrc: &str) -> Option<&Entity> {
        let nrc = nrc.trim();
        if nrc.is_empty() {
            return None;
        }
        self.state
            .entities(kind)
            .iter()
            .find(|e| e.nrc.as_deref() == Some(nrc))
    }

    /// Create a client or supplier with a fresh id
    pub async fn add_entity(&mut self, kind: EntityKind, draft: EntityDraft) -> LedgerResult<Entity> {
        let entity = draft.into_entity(new_id());
        self.entity_validator.validate_entity(kind, &entity)?;

        self.state.entities_mut(kind).push(entity.clone());
        self.persist().await?;

        debug!(kind = %kind, id = %entity.id, "Entity added");
        Ok(entity)
    }

    /// Merge `patch` onto an existing entity
    pub async fn update_entity(
        &mut self,
        kind: EntityKind,
        id: &str,
        patch: EntityPatch,
    ) -> LedgerResult<Entity> {
        let index = self
            .state
            .entities(kind)
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("{} with id '{}'", kind, id)))?;

        let mut updated = self.state.entities(kind)[index].clone();
        patch.apply(&mut updated);
        self.entity_validator.validate_entity(kind, &updated)?;

        self.state.entities_mut(kind)[index] = updated.clone();
        self.persist().await?;

        debug!(kind = %kind, id, "Entity updated");
        Ok(updated)
    }

    /// Delete an entity; returns whether anything was removed
    pub async fn delete_entity(&mut self, kind: EntityKind, id: &str) -> LedgerResult<bool> {
        let list = self.state.entities_mut(kind);
        let before = list.len();
        list.retain(|e| e.id != id);

        if list.len() == before {
            return Ok(false);
        }

        self.persist().await?;
        debug!(kind = %kind, id, "Entity deleted");
        Ok(true)
    }
}
