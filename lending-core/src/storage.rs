//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `items` - Catalog items (key: item id)
//! - `patrons` - Patron records (key: patron id)
//! - `loans` - Loan records (key: loan id, UUIDv7 so keys sort by creation)
//!
//! Values are bincode. Timestamps serialize losslessly, so dates read back
//! exactly as written.

use crate::{
    config::RocksDBConfig,
    error::{Error, Result},
    types::{Item, ItemId, Loan, LoanId, Patron, PatronId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Column family names
const CF_ITEMS: &str = "items";
const CF_PATRONS: &str = "patrons";
const CF_LOANS: &str = "loans";

/// Every persisted table, as loaded at startup
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Catalog items
    pub items: Vec<Item>,
    /// Patrons
    pub patrons: Vec<Patron>,
    /// Loans, oldest first
    pub loans: Vec<Loan>,
}

/// Persistence collaborator for the lending engine.
///
/// `commit_loan` is the commit boundary for a borrow or return: the loan
/// record and the item whose availability it moved are written together or
/// not at all.
pub trait Persistence: Send {
    /// Load every table
    fn load(&self) -> Result<Tables>;

    /// Upsert a catalog item
    fn save_item(&self, item: &Item) -> Result<()>;

    /// Upsert a patron
    fn save_patron(&self, patron: &Patron) -> Result<()>;

    /// Write a loan and its item atomically
    fn commit_loan(&self, loan: &Loan, item: &Item) -> Result<()>;
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let db_opts = Self::db_options(&config.rocksdb);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ITEMS, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_PATRONS, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_LOANS, Self::cf_options_loans()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB lending store");

        Ok(Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    fn db_options(config: &RocksDBConfig) -> Options {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.max_background_jobs);
        db_opts
    }

    // Column family options

    fn cf_options() -> Options {
        let mut opts = Options::default();
        // Small, frequently read tables; favour speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_loans() -> Options {
        let mut opts = Options::default();
        // Append-mostly history
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn get_value<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf_name)?;
        let mut values = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry?;
            values.push(bincode::deserialize(&value)?);
        }
        Ok(values)
    }

    /// Loans in key order, each checked against the ID its key encodes
    fn scan_loans(&self) -> Result<Vec<Loan>> {
        let cf = self.cf_handle(CF_LOANS)?;
        let mut loans = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = entry?;
            let key_id = Uuid::from_slice(&key)
                .map(LoanId::from_uuid)
                .map_err(|e| Error::InvariantViolation(format!("bad loan key: {}", e)))?;
            let loan: Loan = bincode::deserialize(&value)?;
            if loan.id != key_id {
                return Err(Error::InvariantViolation(format!(
                    "loan {} stored under key {}",
                    loan.id, key_id
                )));
            }
            loans.push(loan);
        }
        Ok(loans)
    }

    // Item operations

    /// Get item by ID
    pub fn get_item(&self, item_id: &ItemId) -> Result<Item> {
        self.get_value(CF_ITEMS, item_id.as_str().as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))
    }

    // Patron operations

    /// Get patron by ID
    pub fn get_patron(&self, patron_id: &PatronId) -> Result<Patron> {
        self.get_value(CF_PATRONS, patron_id.as_str().as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("patron {}", patron_id)))
    }

    // Loan operations

    /// Get loan by ID
    pub fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.get_value(CF_LOANS, loan_id.as_uuid().as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("loan {}", loan_id)))
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_items: self.count(CF_ITEMS)?,
            total_patrons: self.count(CF_PATRONS)?,
            total_loans: self.count(CF_LOANS)?,
        })
    }

    fn count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let mut count = 0u64;
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl Persistence for Storage {
    fn load(&self) -> Result<Tables> {
        let tables = Tables {
            items: self.scan(CF_ITEMS)?,
            patrons: self.scan(CF_PATRONS)?,
            loans: self.scan_loans()?,
        };

        tracing::info!(
            items = tables.items.len(),
            patrons = tables.patrons.len(),
            loans = tables.loans.len(),
            "Loaded lending tables"
        );

        Ok(tables)
    }

    fn save_item(&self, item: &Item) -> Result<()> {
        let cf = self.cf_handle(CF_ITEMS)?;
        let value = bincode::serialize(item)?;
        self.db
            .put_cf_opt(cf, item.id.as_str().as_bytes(), &value, &self.write_options())?;
        Ok(())
    }

    fn save_patron(&self, patron: &Patron) -> Result<()> {
        let cf = self.cf_handle(CF_PATRONS)?;
        let value = bincode::serialize(patron)?;
        self.db
            .put_cf_opt(cf, patron.id.as_str().as_bytes(), &value, &self.write_options())?;
        Ok(())
    }

    fn commit_loan(&self, loan: &Loan, item: &Item) -> Result<()> {
        if loan.item_id != item.id {
            return Err(Error::InvariantViolation(format!(
                "loan {} is for item {}, not {}",
                loan.id, loan.item_id, item.id
            )));
        }

        let mut batch = WriteBatch::default();

        // 1. Loan
        let cf_loans = self.cf_handle(CF_LOANS)?;
        batch.put_cf(cf_loans, loan.id.as_uuid().as_bytes(), bincode::serialize(loan)?);

        // 2. Item availability
        let cf_items = self.cf_handle(CF_ITEMS)?;
        batch.put_cf(cf_items, item.id.as_str().as_bytes(), bincode::serialize(item)?);

        // Atomic commit
        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            loan_id = %loan.id,
            item_id = %item.id,
            available = item.available_copies,
            "Loan committed"
        );

        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Items stored
    pub total_items: u64,
    /// Patrons stored
    pub total_patrons: u64,
    /// Loans stored
    pub total_loans: u64,
}
