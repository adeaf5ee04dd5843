//! The table engine: schema management, record mutation and condition
//! matching over a single persisted snapshot.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::condition::{self, Condition};
use crate::error::{KiodbError, Result};
use crate::schema::{type_name, Column, ColumnPatch, ColumnType};
use crate::snapshot::{self, Record, Snapshot, Statistics};

/// When mutations are written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Keep mutations in memory until an explicit `save()` (or an
    /// autosave tick) writes the snapshot.
    #[default]
    Manual,
    /// Write the snapshot back after every successful mutation.
    Eager,
}

/// The main entry point for kiodb.
/// Owns one table -- its columns, records, settings and statistics --
/// loaded from and saved to a single `.kiod` snapshot file.
///
/// Every mutating operation validates fully before touching any state,
/// so a failed call leaves both memory and disk unchanged.
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    snapshot: Snapshot,
    persist: PersistMode,
}

impl Table {
    /// Open the table at the given snapshot path with manual persistence.
    /// If no snapshot exists there yet, an empty one is created on disk.
    pub fn open(path: &str) -> Result<Self> {
        Table::open_with(path, PersistMode::default())
    }

    /// Open the table with an explicit persistence mode.
    pub fn open_with(path: &str, persist: PersistMode) -> Result<Self> {
        snapshot::validate_path(path)?;
        let path = PathBuf::from(path);

        let snapshot = if path.exists() {
            Snapshot::load(&path)?
        } else {
            let snapshot = Snapshot::empty();
            snapshot.save(&path)?;
            snapshot
        };

        Ok(Table {
            path,
            snapshot,
            persist,
        })
    }

    // ── Read accessors ─────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All column definitions, in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.snapshot.columns
    }

    /// Column names, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.snapshot
            .columns
            .iter()
            .map(|column| column.name.clone())
            .collect()
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.snapshot
            .columns
            .iter()
            .find(|column| column.name == name)
    }

    /// All records, in insertion order.
    pub fn get_all(&self) -> &[Record] {
        &self.snapshot.data
    }

    pub fn len(&self) -> usize {
        self.snapshot.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.data.is_empty()
    }

    /// Opaque passthrough settings stored alongside the table.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.snapshot.settings
    }

    pub fn settings_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.snapshot.settings
    }

    pub fn statistics(&self) -> &Statistics {
        &self.snapshot.statistics
    }

    // ── Schema registry ────────────────────────────────────────────

    /// Append a column with a null default and no uniqueness constraint.
    pub fn add_column(&mut self, name: &str, column_type: ColumnType) -> Result<&mut Self> {
        self.add_column_with(name, column_type, Value::Null, false)
    }

    /// Append a column. Every existing record gains the new key holding
    /// the column's default.
    pub fn add_column_with(
        &mut self,
        name: &str,
        column_type: ColumnType,
        default: Value,
        unique: bool,
    ) -> Result<&mut Self> {
        if self.column_by_name(name).is_some() {
            return Err(KiodbError::DuplicateColumn(name.to_string()));
        }

        let backup = self.backup();
        let column = Column::new(name, column_type)
            .with_default(default.clone())
            .with_unique(unique);
        self.snapshot.columns.push(column);
        for record in &mut self.snapshot.data {
            record.insert(name.to_string(), default.clone());
        }

        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    /// Append several columns atomically, in input order. If any name
    /// collides -- with the existing schema or within the batch -- the
    /// whole call fails and nothing changes.
    pub fn add_columns(&mut self, columns: Vec<Column>) -> Result<&mut Self> {
        for (index, column) in columns.iter().enumerate() {
            let in_batch = columns[..index].iter().any(|c| c.name == column.name);
            if in_batch || self.column_by_name(&column.name).is_some() {
                return Err(KiodbError::DuplicateColumn(column.name.clone()));
            }
        }

        let backup = self.backup();
        for column in columns {
            for record in &mut self.snapshot.data {
                record.insert(column.name.clone(), column.default.clone());
            }
            self.snapshot.columns.push(column);
        }

        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    /// Apply a partial edit to an existing column.
    ///
    /// Renaming rewrites the key in every record. Changing the default
    /// rewrites only records whose value still equals the old default,
    /// preserving explicitly-set values. Type and uniqueness changes
    /// touch the definition only.
    pub fn edit_column(&mut self, name: &str, patch: ColumnPatch) -> Result<&mut Self> {
        let index = self
            .snapshot
            .columns
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| KiodbError::UnknownColumn(name.to_string()))?;

        if let Some(new_name) = &patch.name {
            let collides = new_name != name && self.column_by_name(new_name).is_some();
            if collides {
                return Err(KiodbError::DuplicateColumn(new_name.clone()));
            }
        }

        let backup = self.backup();
        if let Some(new_default) = &patch.default {
            let old_default = self.snapshot.columns[index].default.clone();
            for record in &mut self.snapshot.data {
                if record.get(name) == Some(&old_default) {
                    record.insert(name.to_string(), new_default.clone());
                }
            }
        }

        if let Some(new_name) = &patch.name {
            if new_name != name {
                for record in &mut self.snapshot.data {
                    rename_key(record, name, new_name);
                }
            }
        }

        let column = &mut self.snapshot.columns[index];
        if let Some(new_name) = patch.name {
            column.name = new_name;
        }
        if let Some(column_type) = patch.column_type {
            column.column_type = column_type;
        }
        if let Some(default) = patch.default {
            column.default = default;
        }
        if let Some(unique) = patch.unique {
            column.unique = unique;
        }

        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    /// Remove a column definition and its key from every record.
    pub fn delete_column(&mut self, name: &str) -> Result<&mut Self> {
        self.delete_columns(&[name])
    }

    /// Remove several columns. All names are checked before anything is
    /// removed, so an unknown name leaves the table unchanged.
    pub fn delete_columns(&mut self, names: &[&str]) -> Result<&mut Self> {
        for name in names {
            if self.column_by_name(name).is_none() {
                return Err(KiodbError::UnknownColumn(name.to_string()));
            }
        }

        let backup = self.backup();
        for name in names {
            self.snapshot.columns.retain(|column| column.name != *name);
            for record in &mut self.snapshot.data {
                // shift_remove keeps the remaining keys in declaration
                // order; a plain remove would swap the last key into the
                // deleted slot.
                record.shift_remove(*name);
            }
        }

        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    // ── CRUD ───────────────────────────────────────────────────────

    /// Insert a record. The record starts from every column's default
    /// and overlays the supplied values; keys come out in declaration
    /// order regardless of the order values were supplied in.
    pub fn insert(&mut self, values: Record) -> Result<&mut Self> {
        self.validate_values(&values)?;

        let backup = self.backup();
        let mut record = Record::new();
        for column in &self.snapshot.columns {
            let value = values
                .get(&column.name)
                .cloned()
                .unwrap_or_else(|| column.default.clone());
            record.insert(column.name.clone(), value);
        }

        self.snapshot.data.push(record);
        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    /// Merge `values` into every record matching the conditions;
    /// unspecified keys retain their prior values. Returns the number of
    /// records updated. An empty condition list matches all records.
    ///
    /// Writing to a unique column fails when more than one record
    /// matches: the merge would store the same value in every matched
    /// row.
    pub fn update(&mut self, values: Record, conditions: &[Condition]) -> Result<usize> {
        self.validate_values(&values)?;
        let matched = self.matching_rows(conditions)?;

        if matched.len() > 1 {
            for (name, value) in &values {
                if self.column_by_name(name).is_some_and(|c| c.unique) {
                    return Err(KiodbError::UniqueConstraintViolation {
                        column: name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        let backup = self.backup();
        for &index in &matched {
            let record = &mut self.snapshot.data[index];
            for (key, value) in &values {
                record.insert(key.clone(), value.clone());
            }
        }

        self.touch();
        self.commit(backup)?;
        Ok(matched.len())
    }

    /// Remove every record matching the conditions and return the count.
    /// An empty condition list matches -- and therefore removes -- all
    /// records; pass at least one condition for anything narrower.
    pub fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let matched = self.matching_rows(conditions)?;

        let backup = self.backup();
        for &index in matched.iter().rev() {
            self.snapshot.data.remove(index);
        }

        self.touch();
        self.commit(backup)?;
        Ok(matched.len())
    }

    /// All matching records in stored order. An empty condition list
    /// returns the whole table.
    pub fn select(&self, conditions: &[Condition]) -> Result<Vec<Record>> {
        self.assert_known_condition_columns(conditions)?;

        let mut rows = Vec::new();
        for record in &self.snapshot.data {
            if condition::matches(record, conditions)? {
                rows.push(record.clone());
            }
        }
        Ok(rows)
    }

    /// Like `select`, but every referenced column must be flagged unique;
    /// returns the first match, if any.
    pub fn select_unique(&self, conditions: &[Condition]) -> Result<Option<Record>> {
        for cond in conditions {
            let column = self
                .column_by_name(&cond.column)
                .ok_or_else(|| KiodbError::UnknownConditionColumn(cond.column.clone()))?;
            if !column.unique {
                return Err(KiodbError::NotUniqueColumn(cond.column.clone()));
            }
        }

        for record in &self.snapshot.data {
            if condition::matches(record, conditions)? {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    /// Drop all records. The schema is untouched.
    pub fn clear(&mut self) -> Result<&mut Self> {
        let backup = self.backup();
        self.snapshot.data.clear();
        self.touch();
        self.commit(backup)?;
        Ok(self)
    }

    /// Visit every record in stored order.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Record),
    {
        for record in &self.snapshot.data {
            visitor(record);
        }
    }

    /// Write the snapshot to disk, stamping both edit and save times.
    pub fn save(&mut self) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.snapshot.statistics.last_edit_at = now;
        self.snapshot.statistics.last_saved_at = now;
        self.snapshot.save(&self.path)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Validate supplied values before any mutation, per key in supplied
    /// order: unknown column, then type, then uniqueness against the
    /// full data set.
    fn validate_values(&self, values: &Record) -> Result<()> {
        for (name, value) in values {
            let column = self
                .column_by_name(name)
                .ok_or_else(|| KiodbError::UnknownColumn(name.clone()))?;

            if !column.column_type.matches(value) {
                return Err(KiodbError::TypeMismatch {
                    column: name.clone(),
                    expected: column.column_type.name().to_string(),
                    actual: type_name(value).to_string(),
                });
            }

            if column.unique {
                let taken = self.snapshot.data.iter().any(|record| {
                    record
                        .get(name)
                        .is_some_and(|held| condition::values_equal(held, value))
                });
                if taken {
                    return Err(KiodbError::UniqueConstraintViolation {
                        column: name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Indices of all records matching the conditions. Evaluation errors
    /// surface before any caller mutates a single row.
    fn matching_rows(&self, conditions: &[Condition]) -> Result<Vec<usize>> {
        self.assert_known_condition_columns(conditions)?;

        let mut matched = Vec::new();
        for (index, record) in self.snapshot.data.iter().enumerate() {
            if condition::matches(record, conditions)? {
                matched.push(index);
            }
        }
        Ok(matched)
    }

    fn assert_known_condition_columns(&self, conditions: &[Condition]) -> Result<()> {
        for cond in conditions {
            if self.column_by_name(&cond.column).is_none() {
                return Err(KiodbError::UnknownConditionColumn(cond.column.clone()));
            }
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.snapshot.statistics.last_edit_at = chrono::Utc::now().timestamp_millis();
    }

    /// Pre-mutation copy of the snapshot, taken only when eager mode
    /// will write it back (manual mode pays nothing).
    fn backup(&self) -> Option<Snapshot> {
        (self.persist == PersistMode::Eager).then(|| self.snapshot.clone())
    }

    /// In eager mode, write the snapshot back after a successful
    /// mutation. A failed write restores the pre-mutation snapshot so
    /// memory and disk never diverge.
    fn commit(&mut self, backup: Option<Snapshot>) -> Result<()> {
        if self.persist == PersistMode::Eager {
            self.snapshot.statistics.last_saved_at = chrono::Utc::now().timestamp_millis();
            if let Err(e) = self.snapshot.save(&self.path) {
                if let Some(prior) = backup {
                    self.snapshot = prior;
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Replace `old` with `new` in a record, keeping the key's position.
fn rename_key(record: &mut Record, old: &str, new: &str) {
    let mut renamed = Record::new();
    for (key, value) in record.iter() {
        if key == old {
            renamed.insert(new.to_string(), value.clone());
        } else {
            renamed.insert(key.clone(), value.clone());
        }
    }
    *record = renamed;
}
