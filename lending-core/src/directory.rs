//! Patron directory
//!
//! Holds patron records and their eligibility knobs (active flag, borrow
//! limit). It knows nothing about loans; active-loan counts are derived by
//! the ledger.

use crate::{
    types::{NewPatron, Patron, PatronId, PatronUpdate},
    Error, Result,
};
use std::collections::BTreeMap;

/// Keyed patron table
#[derive(Debug, Default, Clone)]
pub struct PatronDirectory {
    patrons: BTreeMap<PatronId, Patron>,
    default_borrow_limit: u32,
}

impl PatronDirectory {
    /// Empty directory; patrons registered without a limit get `default_borrow_limit`
    pub fn new(default_borrow_limit: u32) -> Self {
        Self {
            patrons: BTreeMap::new(),
            default_borrow_limit,
        }
    }

    /// Rebuild from persisted patrons
    pub fn from_patrons(
        default_borrow_limit: u32,
        patrons: impl IntoIterator<Item = Patron>,
    ) -> Result<Self> {
        let mut directory = Self::new(default_borrow_limit);
        for patron in patrons {
            let id = patron.id.clone();
            if directory.patrons.insert(id.clone(), patron).is_some() {
                return Err(Error::DuplicateId(format!("patron {}", id)));
            }
        }
        Ok(directory)
    }

    /// Register a new, active patron
    pub fn register(&mut self, new_patron: NewPatron) -> Result<Patron> {
        if self.patrons.contains_key(&new_patron.id) {
            return Err(Error::DuplicateId(format!("patron {}", new_patron.id)));
        }

        let patron = Patron {
            id: new_patron.id,
            name: new_patron.name,
            email: new_patron.email,
            borrow_limit: new_patron.borrow_limit.unwrap_or(self.default_borrow_limit),
            active: true,
        };
        self.patrons.insert(patron.id.clone(), patron.clone());

        tracing::debug!(patron_id = %patron.id, limit = patron.borrow_limit, "Patron registered");
        Ok(patron)
    }

    /// Get patron by ID
    pub fn get(&self, patron_id: &PatronId) -> Result<&Patron> {
        self.patrons
            .get(patron_id)
            .ok_or_else(|| Error::NotFound(format!("patron {}", patron_id)))
    }

    /// All patrons in identity order
    pub fn iter(&self) -> impl Iterator<Item = &Patron> {
        self.patrons.values()
    }

    /// Number of registered patrons
    pub fn len(&self) -> usize {
        self.patrons.len()
    }

    /// Whether no patron is registered
    pub fn is_empty(&self) -> bool {
        self.patrons.is_empty()
    }

    /// Activate or suspend a patron. Suspended patrons keep their loans
    /// but cannot borrow.
    pub fn set_active(&mut self, patron_id: &PatronId, active: bool) -> Result<Patron> {
        let patron = self.get_mut(patron_id)?;
        patron.active = active;
        Ok(patron.clone())
    }

    /// Change a patron's borrow limit.
    ///
    /// A limit below the current active count is accepted; the patron just
    /// cannot borrow until enough items come back.
    pub fn set_borrow_limit(&mut self, patron_id: &PatronId, limit: u32) -> Result<Patron> {
        let patron = self.get_mut(patron_id)?;
        patron.borrow_limit = limit;
        Ok(patron.clone())
    }

    /// Edit name or email
    pub fn update_patron(&mut self, patron_id: &PatronId, update: PatronUpdate) -> Result<Patron> {
        let patron = self.get_mut(patron_id)?;
        if let Some(name) = update.name {
            patron.name = name;
        }
        if let Some(email) = update.email {
            patron.email = email;
        }
        Ok(patron.clone())
    }

    fn get_mut(&mut self, patron_id: &PatronId) -> Result<&mut Patron> {
        self.patrons
            .get_mut(patron_id)
            .ok_or_else(|| Error::NotFound(format!("patron {}", patron_id)))
    }
}
