//! Catalog store
//!
//! Owns item identity, copy totals and the availability count. The
//! availability count has exactly one writer: [`CatalogStore::adjust_availability`],
//! which is crate-private and only called by the lending ledger.

use crate::{
    types::{Item, ItemId, ItemUpdate, NewItem},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog search filter; unset fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Case-insensitive substring of the genre
    pub genre: Option<String>,
    /// `Some(true)`: at least one copy on the shelf; `Some(false)`: none
    pub available: Option<bool>,
}

impl SearchCriteria {
    fn matches(&self, item: &Item) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
                None => true,
            }
        }

        contains(&item.title, &self.title)
            && contains(&item.author, &self.author)
            && contains(&item.genre, &self.genre)
            && self
                .available
                .map_or(true, |wanted| (item.available_copies > 0) == wanted)
    }
}

/// Keyed item table
#[derive(Debug, Default, Clone)]
pub struct CatalogStore {
    items: BTreeMap<ItemId, Item>,
}

impl CatalogStore {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted items, checking each one's bounds
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut store = Self::new();
        for item in items {
            if item.available_copies > item.total_copies {
                return Err(Error::InvariantViolation(format!(
                    "item {} has {} available of {} total",
                    item.id, item.available_copies, item.total_copies
                )));
            }
            let id = item.id.clone();
            if store.items.insert(id.clone(), item).is_some() {
                return Err(Error::DuplicateId(format!("item {}", id)));
            }
        }
        Ok(store)
    }

    /// Register a new item with every copy on the shelf
    pub fn add_item(&mut self, new_item: NewItem) -> Result<Item> {
        if self.items.contains_key(&new_item.id) {
            return Err(Error::DuplicateId(format!("item {}", new_item.id)));
        }

        let item = Item {
            id: new_item.id,
            title: new_item.title,
            author: new_item.author,
            isbn: new_item.isbn,
            genre: new_item.genre,
            total_copies: new_item.total_copies,
            available_copies: new_item.total_copies,
            active: true,
        };
        self.items.insert(item.id.clone(), item.clone());

        tracing::debug!(item_id = %item.id, total = item.total_copies, "Item added");
        Ok(item)
    }

    /// Get item by ID
    pub fn get(&self, item_id: &ItemId) -> Result<&Item> {
        self.items
            .get(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))
    }

    /// All items in identity order
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Number of items (active or not)
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Active items matching `criteria`
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<&Item> {
        self.items
            .values()
            .filter(|item| item.active && criteria.matches(item))
            .collect()
    }

    /// Apply `available += delta`.
    ///
    /// Fails without touching the item if the result would leave
    /// `0..=total`.
    pub(crate) fn adjust_availability(&mut self, item_id: &ItemId, delta: i64) -> Result<&Item> {
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))?;

        let next = i64::from(item.available_copies) + delta;
        if next < 0 || next > i64::from(item.total_copies) {
            tracing::error!(
                item_id = %item_id,
                available = item.available_copies,
                total = item.total_copies,
                delta,
                "Availability adjustment out of bounds"
            );
            return Err(Error::InvariantViolation(format!(
                "item {}: available {} {:+} outside 0..={}",
                item_id, item.available_copies, delta, item.total_copies
            )));
        }

        // `next` is within 0..=total, which fits in u32
        item.available_copies = next as u32;
        Ok(item)
    }

    /// Change the number of owned copies, keeping checked-out copies fixed
    pub fn set_total_copies(&mut self, item_id: &ItemId, total: u32) -> Result<Item> {
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))?;

        let checked_out = item.checked_out();
        if total < checked_out {
            return Err(Error::InvariantViolation(format!(
                "item {}: cannot reduce to {} copies with {} on loan",
                item_id, total, checked_out
            )));
        }

        item.total_copies = total;
        item.available_copies = total - checked_out;

        tracing::debug!(item_id = %item_id, total, "Item copies updated");
        Ok(item.clone())
    }

    /// Edit title, author, ISBN or genre
    pub fn update_item(&mut self, item_id: &ItemId, update: ItemUpdate) -> Result<Item> {
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))?;

        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(author) = update.author {
            item.author = author;
        }
        if let Some(isbn) = update.isbn {
            item.isbn = isbn;
        }
        if let Some(genre) = update.genre {
            item.genre = genre;
        }

        tracing::debug!(item_id = %item_id, "Item details updated");
        Ok(item.clone())
    }

    /// Soft-delete: the item stays in the table but cannot be borrowed
    pub fn deactivate(&mut self, item_id: &ItemId) -> Result<Item> {
        self.set_active(item_id, false)
    }

    /// Undo [`CatalogStore::deactivate`]
    pub fn reactivate(&mut self, item_id: &ItemId) -> Result<Item> {
        self.set_active(item_id, true)
    }

    fn set_active(&mut self, item_id: &ItemId, active: bool) -> Result<Item> {
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))?;
        item.active = active;
        Ok(item.clone())
    }
}
