//! The category registry: the one place category ids are minted.
//!
//! A registry is owned by whoever drives a conversion run (usually a
//! [`Dataset`](super::Dataset)) and is passed by reference to every decode and
//! encode call, so the same name maps to the same id across all images.
//! Ids are minted in increasing order and never reused.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::ids::CategoryId;
use crate::error::AnnoconvError;

/// A category (class label). Only a [`CategoryRegistry`] can create one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    name: String,
    supercategory: Option<String>,
}

impl Category {
    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supercategory(&self) -> Option<&str> {
        self.supercategory.as_deref()
    }
}

/// Whether resolving an unknown name may register a new category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryCreation {
    /// Unknown names get the next id.
    #[default]
    Allow,
    /// Unknown names are an error; used for strict passes over a fixed label set.
    Deny,
}

/// Serialized form of one registry entry, as stored in a category ledger file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// Name ↔ id mapping shared by every image of a conversion run.
#[derive(Clone, Debug)]
pub struct CategoryRegistry {
    categories: BTreeMap<CategoryId, Category>,
    ids_by_name: HashMap<String, CategoryId>,
    next_id: u64,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self {
            categories: BTreeMap::new(),
            ids_by_name: HashMap::new(),
            next_id: 1,
        }
    }
}

impl CategoryRegistry {
    /// Creates an empty registry whose first minted id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with one category per name, ids 1..=n in order.
    ///
    /// Repeated names collapse onto their first occurrence.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.add_category(name, None);
        }
        registry
    }

    /// Rebuilds a registry from ledger records, keeping their ids.
    ///
    /// # Errors
    /// [`AnnoconvError::MalformedInput`] on id 0, duplicate ids or duplicate names.
    pub fn from_records(records: Vec<CategoryRecord>) -> Result<Self, AnnoconvError> {
        let mut records = records;
        records.sort_by_key(|record| record.id);

        let mut registry = Self::new();
        for record in records {
            let id = CategoryId::new(record.id);
            if record.id == 0 {
                return Err(AnnoconvError::malformed(
                    "category ledger",
                    format!("category '{}' has id 0; ids start at 1", record.name),
                ));
            }
            if registry.categories.contains_key(&id) {
                return Err(AnnoconvError::malformed(
                    "category ledger",
                    format!("duplicate category id {id}"),
                ));
            }
            if registry.ids_by_name.contains_key(&record.name) {
                return Err(AnnoconvError::malformed(
                    "category ledger",
                    format!("duplicate category name '{}'", record.name),
                ));
            }
            registry.insert(id, record.name, record.supercategory);
        }
        Ok(registry)
    }

    /// Returns every category as a ledger record, ordered by id.
    pub fn to_records(&self) -> Vec<CategoryRecord> {
        self.iter()
            .map(|category| CategoryRecord {
                id: category.id.as_u64(),
                name: category.name.clone(),
                supercategory: category.supercategory.clone(),
            })
            .collect()
    }

    /// Returns the category called `name`, registering it under the next id
    /// if it is new. Idempotent by name: an existing entry keeps its
    /// supercategory.
    pub fn add_category(
        &mut self,
        name: impl Into<String>,
        supercategory: Option<String>,
    ) -> Category {
        let name = name.into();
        if let Some(existing) = self.lookup_name(&name) {
            return existing.clone();
        }

        let id = CategoryId::new(self.next_id);
        self.insert(id, name, supercategory)
    }

    /// Registers a category that arrives with an id of its own (COCO).
    ///
    /// A known name resolves to its existing entry. A new name keeps
    /// `preferred` when that id is not below the next id to be minted, so ids
    /// stay increasing; otherwise it is minted a fresh id.
    ///
    /// # Errors
    /// [`AnnoconvError::UnknownCategoryName`] for a new name under
    /// [`CategoryCreation::Deny`].
    pub fn adopt(
        &mut self,
        preferred: CategoryId,
        name: impl Into<String>,
        supercategory: Option<String>,
        creation: CategoryCreation,
    ) -> Result<Category, AnnoconvError> {
        let name = name.into();
        if let Some(existing) = self.lookup_name(&name) {
            return Ok(existing.clone());
        }
        if creation == CategoryCreation::Deny {
            return Err(AnnoconvError::UnknownCategoryName(name));
        }

        let id = if preferred.as_u64() >= self.next_id {
            preferred
        } else {
            CategoryId::new(self.next_id)
        };
        Ok(self.insert(id, name, supercategory))
    }

    /// Looks a category up by id.
    ///
    /// # Errors
    /// [`AnnoconvError::UnknownCategoryId`] if the id was never issued.
    pub fn resolve_id(&self, id: CategoryId) -> Result<&Category, AnnoconvError> {
        self.categories
            .get(&id)
            .ok_or(AnnoconvError::UnknownCategoryId(id))
    }

    /// Looks a category up by name, creating it only when `creation` allows.
    ///
    /// # Errors
    /// [`AnnoconvError::UnknownCategoryName`] for an unknown name under
    /// [`CategoryCreation::Deny`].
    pub fn resolve_name(
        &mut self,
        name: &str,
        creation: CategoryCreation,
    ) -> Result<Category, AnnoconvError> {
        match (self.lookup_name(name), creation) {
            (Some(existing), _) => Ok(existing.clone()),
            (None, CategoryCreation::Allow) => Ok(self.add_category(name, None)),
            (None, CategoryCreation::Deny) => {
                Err(AnnoconvError::UnknownCategoryName(name.to_string()))
            }
        }
    }

    /// Read-only lookup by name.
    pub fn lookup_name(&self, name: &str) -> Option<&Category> {
        self.ids_by_name
            .get(name)
            .and_then(|id| self.categories.get(id))
    }

    /// Returns true if `category` was issued by this registry.
    pub fn contains(&self, category: &Category) -> bool {
        self.categories.get(&category.id) == Some(category)
    }

    /// Iterates categories in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Runs `f` against a staged copy and commits it only on success.
    ///
    /// Decoders use this so a failed decode never leaves half-registered
    /// categories behind.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut CategoryRegistry) -> Result<T, AnnoconvError>,
    ) -> Result<T, AnnoconvError> {
        let mut staged = self.clone();
        let value = f(&mut staged)?;
        *self = staged;
        Ok(value)
    }

    fn insert(&mut self, id: CategoryId, name: String, supercategory: Option<String>) -> Category {
        let category = Category {
            id,
            name: name.clone(),
            supercategory,
        };
        self.categories.insert(id, category.clone());
        self.ids_by_name.insert(name, id);
        self.next_id = self.next_id.max(id.as_u64() + 1);
        category
    }
}
