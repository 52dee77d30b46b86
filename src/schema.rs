//! Schema model.
//!
//! Loads the per-table index schema document and resolves it into the
//! read-only lookup structure the compiler works from.

use crate::error::{CqlError, CqlResult};
use crate::sql::is_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Schema document, as stored in `schema.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSchema {
    #[serde(default)]
    pub tables: Vec<TableDef>,
}

/// Table entry of the schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    pub table_name: String,
    #[serde(default)]
    pub pk_column_name: Option<String>,
    #[serde(default)]
    pub index: Vec<IndexDef>,
    #[serde(default)]
    pub unique_index: Vec<IndexDef>,
    #[serde(default)]
    pub like_index: Vec<IndexDef>,
    #[serde(default)]
    pub gin_index: Vec<IndexDef>,
    #[serde(default)]
    pub full_text_index: Vec<IndexDef>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// Index entry of the schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    pub field_name: String,
    /// Comma separated fields of a compound index.
    #[serde(default)]
    pub multi_field_names: Option<String>,
    #[serde(default)]
    pub sql_expression: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub remove_accents: bool,
    #[serde(default = "default_true")]
    pub string_type: bool,
    #[serde(default)]
    pub array_subfield: Option<String>,
    #[serde(default)]
    pub array_modifiers: Vec<String>,
}

/// Foreign key entry of the schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDef {
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub target_table_alias: Option<String>,
    #[serde(default)]
    pub table_alias: Option<String>,
}

fn default_true() -> bool {
    true
}

/// How a field is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    PlainPath,
    FullText,
    ArrayOfObjects,
    ForeignKey,
    PrimaryKey,
}

impl IndexKind {
    /// True for fields stored as UUID columns.
    pub fn is_uuid(&self) -> bool {
        matches!(self, IndexKind::ForeignKey | IndexKind::PrimaryKey)
    }
}

/// Array sub-schema of an array-of-objects field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// Key holding the searched value inside each element.
    pub subfield: Option<String>,
    /// Keys permitted as `/@key=value` relation modifiers.
    pub modifiers: Vec<String>,
}

/// Resolved configuration of one searchable field.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub name: String,
    /// JSON paths, more than one for a compound index. For UUID kinds the column name.
    pub paths: Vec<String>,
    pub sql_expression: Option<String>,
    pub kind: IndexKind,
    pub case_sensitive: bool,
    pub remove_accents: bool,
    /// Compared as a number unless `/string` is given.
    pub numeric: bool,
    /// A full text index exists.
    pub full_text: bool,
    /// A trigram (gin) index on the whole value exists.
    pub trigram: bool,
    /// A btree index on the first 600 characters exists.
    pub truncated: bool,
    pub array: Option<ArraySchema>,
}

impl IndexConfig {
    /// Unindexed field with default folding.
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            paths: vec![name.clone()],
            name,
            sql_expression: None,
            kind: IndexKind::PlainPath,
            case_sensitive: false,
            remove_accents: true,
            numeric: false,
            full_text: false,
            trigram: false,
            truncated: false,
            array: None,
        }
    }

    fn uuid(name: &str, column: &str, kind: IndexKind) -> Self {
        Self {
            paths: vec![column.to_string()],
            kind,
            ..Self::plain(name)
        }
    }

    /// Column name of a UUID field.
    pub fn column(&self) -> &str {
        self.paths.first().map(String::as_str).unwrap_or(&self.name)
    }

    pub fn is_compound(&self) -> bool {
        self.paths.len() > 1
    }

    fn from_def(def: &IndexDef) -> Self {
        let paths = match &def.multi_field_names {
            Some(names) if !names.trim().is_empty() => {
                names.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => vec![def.field_name.clone()],
        };
        let array = if def.array_subfield.is_some() || !def.array_modifiers.is_empty() {
            Some(ArraySchema {
                subfield: def.array_subfield.clone(),
                modifiers: def.array_modifiers.clone(),
            })
        } else {
            None
        };
        Self {
            name: def.field_name.clone(),
            paths,
            sql_expression: def.sql_expression.clone().filter(|s| !s.trim().is_empty()),
            kind: IndexKind::PlainPath,
            case_sensitive: def.case_sensitive,
            remove_accents: def.remove_accents,
            numeric: !def.string_type,
            full_text: false,
            trigram: false,
            truncated: false,
            array,
        }
    }
}

/// Resolved foreign key of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyConfig {
    /// Field name in the schema document, e.g. `holdingsRecordId`.
    pub field_name: Option<String>,
    /// Column holding the key, `field_name` with dots replaced by underscores.
    pub column: Option<String>,
    pub target_table: Option<String>,
    /// Enables filtering this table by fields of the target table.
    pub target_table_alias: Option<String>,
    /// Enables filtering the target table by fields of this table.
    pub table_alias: Option<String>,
}

impl ForeignKeyConfig {
    fn from_def(table: &str, def: &ForeignKeyDef) -> CqlResult<Self> {
        let column = def.field_name.as_ref().map(|f| f.replace('.', "_"));
        if let Some(column) = &column {
            if !is_identifier(column) {
                return Err(CqlError::schema(format!(
                    "Invalid foreign key column '{}' in table {}",
                    column, table
                )));
            }
        }
        if let Some(target) = &def.target_table {
            if !is_identifier(target) {
                return Err(CqlError::schema(format!(
                    "Invalid target table '{}' in table {}",
                    target, table
                )));
            }
        }
        Ok(Self {
            field_name: def.field_name.clone(),
            column,
            target_table: def.target_table.clone(),
            target_table_alias: def.target_table_alias.clone(),
            table_alias: def.table_alias.clone(),
        })
    }
}

/// Resolved table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub name: String,
    pub pk_column: String,
    pub indexes: HashMap<String, IndexConfig>,
    pub foreign_keys: Vec<ForeignKeyConfig>,
}

impl TableConfig {
    /// Table without any index configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk_column: "id".to_string(),
            indexes: HashMap::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn index(&self, field: &str) -> Option<&IndexConfig> {
        self.indexes.get(field)
    }

    fn from_def(def: &TableDef) -> CqlResult<Self> {
        if !is_identifier(&def.table_name) {
            return Err(CqlError::schema(format!(
                "Invalid table name '{}'",
                def.table_name
            )));
        }
        let pk_column = def.pk_column_name.clone().unwrap_or_else(|| "id".to_string());
        if !is_identifier(&pk_column) {
            return Err(CqlError::schema(format!(
                "Invalid primary key column '{}' in table {}",
                pk_column, def.table_name
            )));
        }

        let mut indexes: HashMap<String, IndexConfig> = HashMap::new();
        // the first list naming a field decides its folding
        let lists: [(&[IndexDef], fn(&mut IndexConfig)); 5] = [
            (&def.index, |c| c.truncated = true),
            (&def.unique_index, |c| c.truncated = true),
            (&def.like_index, |c| c.trigram = true),
            (&def.gin_index, |c| c.trigram = true),
            (&def.full_text_index, |c| c.full_text = true),
        ];
        for (list, mark) in lists {
            for index_def in list {
                let config = indexes
                    .entry(index_def.field_name.clone())
                    .or_insert_with(|| IndexConfig::from_def(index_def));
                if config.array.is_none() {
                    config.array = IndexConfig::from_def(index_def).array;
                }
                mark(config);
            }
        }
        for config in indexes.values_mut() {
            config.kind = if config.array.is_some() {
                IndexKind::ArrayOfObjects
            } else if config.full_text {
                IndexKind::FullText
            } else {
                IndexKind::PlainPath
            };
        }

        let mut foreign_keys = Vec::with_capacity(def.foreign_keys.len());
        for fk_def in &def.foreign_keys {
            let fk = ForeignKeyConfig::from_def(&def.table_name, fk_def)?;
            if let (Some(field), Some(column)) = (&fk.field_name, &fk.column) {
                indexes.insert(
                    field.clone(),
                    IndexConfig::uuid(field, column, IndexKind::ForeignKey),
                );
            }
            foreign_keys.push(fk);
        }
        indexes.insert(
            "id".to_string(),
            IndexConfig::uuid("id", &pk_column, IndexKind::PrimaryKey),
        );

        Ok(Self {
            name: def.table_name.clone(),
            pk_column,
            indexes,
            foreign_keys,
        })
    }
}

/// Immutable, resolved view of all tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaModel {
    tables: HashMap<String, TableConfig>,
}

impl DbSchema {
    /// Parse a schema document.
    pub fn from_json(json: &str) -> CqlResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a schema document.
    pub fn from_path(path: impl AsRef<Path>) -> CqlResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let schema = Self::from_json(&content)
            .map_err(|e| CqlError::schema(format!("{}: {}", path.display(), e)))?;
        tracing::info!(
            "Loaded {} table schemas from {}",
            schema.tables.len(),
            path.display()
        );
        Ok(schema)
    }

    /// Validate names and build the lookup structure.
    pub fn resolve(&self) -> CqlResult<SchemaModel> {
        let mut tables = HashMap::new();
        for def in &self.tables {
            let table = TableConfig::from_def(def)?;
            tracing::debug!(
                "Resolved table {} with {} indexes and {} foreign keys",
                table.name,
                table.indexes.len(),
                table.foreign_keys.len()
            );
            tables.insert(table.name.clone(), table);
        }
        Ok(SchemaModel { tables })
    }
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and resolve a schema document.
    pub fn from_json(json: &str) -> CqlResult<Self> {
        DbSchema::from_json(json)?.resolve()
    }

    /// Read, parse and resolve a schema document.
    pub fn load(path: impl AsRef<Path>) -> CqlResult<Self> {
        DbSchema::from_path(path)?.resolve()
    }

    pub fn add_table(&mut self, table: TableConfig) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    /// Tables sorted by name.
    pub fn tables(&self) -> Vec<&TableConfig> {
        let mut tables: Vec<&TableConfig> = self.tables.values().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
