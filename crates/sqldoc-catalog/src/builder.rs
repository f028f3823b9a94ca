//! Turns a decoded catalog snapshot into a [`SchemaModel`]
//!
//! Child rows (columns, keys, indexes, constraints, triggers, row counts) are
//! joined to their table by (schema, table) name under the configured
//! [`NameMatching`] policy. Rows whose table was filtered out as a system
//! object are dropped quietly; rows naming a table that simply is not there
//! become [`ExtractionWarning::JoinInconsistency`] warnings, one per table and
//! category, or one per constraint for foreign keys.

use crate::config::{is_system_schema, ExtractorConfig, NameMatching};
use crate::decode::{CatalogSnapshot, DatabaseInfo, Owned};
use crate::model::{
    timestamp, DatabaseMetadata, ForeignKey, Index, SchemaModel, Table, View,
};
use crate::{Category, ExtractionWarning};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap, HashSet};

type Key = (String, String);

/// Resolves (schema, table) names to positions in a sorted collection
struct NameIndex {
    matching: NameMatching,
    positions: HashMap<Key, usize>,
    excluded: HashSet<Key>,
    len: usize,
}

impl NameIndex {
    fn new(matching: NameMatching) -> Self {
        Self {
            matching,
            positions: HashMap::new(),
            excluded: HashSet::new(),
            len: 0,
        }
    }

    fn insert(&mut self, schema_name: &str, name: &str, position: usize) {
        self.positions
            .insert(self.matching.key(schema_name, name), position);
        self.len = self.len.max(position + 1);
    }

    fn exclude(&mut self, schema_name: &str, name: &str) {
        self.excluded.insert(self.matching.key(schema_name, name));
    }

    fn get(&self, schema_name: &str, name: &str) -> Lookup {
        let key = self.matching.key(schema_name, name);
        if let Some(position) = self.positions.get(&key) {
            Lookup::Found(*position)
        } else if self.excluded.contains(&key) {
            Lookup::Excluded
        } else {
            Lookup::Unknown
        }
    }
}

enum Lookup {
    Found(usize),
    Excluded,
    Unknown,
}

pub struct ModelBuilder<'a> {
    config: &'a ExtractorConfig,
    warnings: Vec<ExtractionWarning>,
    reported: HashSet<(Category, Key, Option<String>)>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
            reported: HashSet::new(),
        }
    }

    fn keeps(&self, schema_name: &str, is_ms_shipped: bool) -> bool {
        self.config.keeps_object(schema_name, is_ms_shipped)
    }

    fn warn_unmatched(
        &mut self,
        category: Category,
        schema_name: &str,
        table_name: &str,
        constraint: Option<&str>,
        detail: String,
    ) {
        let key = self.config.name_matching.key(schema_name, table_name);
        if !self
            .reported
            .insert((category, key, constraint.map(str::to_string)))
        {
            return;
        }
        tracing::warn!(
            category = %category,
            schema = schema_name,
            table = table_name,
            %detail,
            "catalog row does not match an extracted table"
        );
        self.warnings.push(ExtractionWarning::JoinInconsistency {
            category,
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            detail,
        });
    }

    /// Position of the owning table, or `None` when the row is dropped
    fn resolve(
        &mut self,
        index: &NameIndex,
        category: Category,
        schema_name: &str,
        table_name: &str,
        is_ms_shipped: bool,
        detail: impl FnOnce() -> String,
    ) -> Option<usize> {
        match index.get(schema_name, table_name) {
            Lookup::Found(position) => Some(position),
            Lookup::Excluded => None,
            Lookup::Unknown if !self.keeps(schema_name, is_ms_shipped) => None,
            Lookup::Unknown => {
                self.warn_unmatched(category, schema_name, table_name, None, detail());
                None
            }
        }
    }

    /// Attach owned rows to tables in ordinal order
    fn attach<T>(
        &mut self,
        index: &NameIndex,
        category: Category,
        rows: Vec<Owned<T>>,
        describe: impl Fn(&T) -> String,
    ) -> Vec<Vec<(i64, T)>> {
        let mut grouped: Vec<Vec<(i64, T)>> = Vec::new();
        grouped.resize_with(index.len, Vec::new);
        for row in rows {
            let position = self.resolve(
                index,
                category,
                &row.schema_name,
                &row.table_name,
                row.is_ms_shipped,
                || describe(&row.item),
            );
            if let Some(position) = position {
                grouped[position].push((row.ordinal, row.item));
            }
        }
        for group in &mut grouped {
            group.sort_by_key(|(ordinal, _)| *ordinal);
        }
        grouped
    }

    pub fn build(
        mut self,
        snapshot: CatalogSnapshot,
        info: DatabaseInfo,
        extraction_date: NaiveDateTime,
    ) -> (SchemaModel, Vec<ExtractionWarning>) {
        let matching = self.config.name_matching;

        let mut schemas: Vec<_> = snapshot
            .schemas
            .into_iter()
            .filter(|s| self.config.include_system_objects || !is_system_schema(&s.name))
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));

        // Tables
        let mut table_index = NameIndex::new(matching);
        let mut tables: Vec<Table> = Vec::new();
        for shipped in snapshot.tables {
            let table = shipped.item;
            if self.keeps(&table.schema_name, shipped.is_ms_shipped) {
                tables.push(table);
            } else {
                table_index.exclude(&table.schema_name, &table.table_name);
            }
        }
        tables.sort_by(|a, b| {
            (&a.schema_name, &a.table_name).cmp(&(&b.schema_name, &b.table_name))
        });
        for (position, table) in tables.iter().enumerate() {
            table_index.insert(&table.schema_name, &table.table_name, position);
        }

        let mut columns = self.attach(&table_index, Category::Columns, snapshot.columns, |c| {
            format!("column {}", c.name)
        });
        let mut primary_keys = self.attach(
            &table_index,
            Category::PrimaryKeys,
            snapshot.primary_keys,
            |c| format!("primary key column {}", c),
        );
        let mut check_constraints = self.attach(
            &table_index,
            Category::CheckConstraints,
            snapshot.check_constraints,
            |c| format!("check constraint {}", c.constraint_name),
        );
        let mut triggers = self.attach(&table_index, Category::Triggers, snapshot.triggers, |t| {
            format!("trigger {}", t.trigger_name)
        });
        let row_counts = if self.config.include_row_counts {
            self.attach(&table_index, Category::RowCounts, snapshot.row_counts, |c| {
                format!("row count {}", c)
            })
        } else {
            Vec::new()
        };
        let mut indexes = self.group_indexes(&table_index, snapshot.indexes);

        for (position, table) in tables.iter_mut().enumerate() {
            table.columns = take(&mut columns, position);
            table.primary_keys = take(&mut primary_keys, position);
            table.check_constraints = take(&mut check_constraints, position);
            table
                .check_constraints
                .sort_by(|a, b| a.constraint_name.cmp(&b.constraint_name));
            table.triggers = take(&mut triggers, position);
            table.triggers.sort_by(|a, b| a.trigger_name.cmp(&b.trigger_name));
            table.row_count = row_counts
                .get(position)
                .and_then(|counts| counts.first())
                .map(|(_, count)| *count);
            table.indexes = indexes.get_mut(position).map(std::mem::take).unwrap_or_default();
        }

        let relationships = self.join_foreign_keys(&table_index, &mut tables, snapshot.foreign_keys);

        // Views and their columns
        let mut view_index = NameIndex::new(matching);
        let mut views: Vec<View> = Vec::new();
        for shipped in snapshot.views {
            let view = shipped.item;
            if self.keeps(&view.schema_name, shipped.is_ms_shipped) {
                views.push(view);
            } else {
                view_index.exclude(&view.schema_name, &view.view_name);
            }
        }
        views.sort_by(|a, b| (&a.schema_name, &a.view_name).cmp(&(&b.schema_name, &b.view_name)));
        for (position, view) in views.iter().enumerate() {
            view_index.insert(&view.schema_name, &view.view_name, position);
        }
        let mut view_columns = self.attach(
            &view_index,
            Category::ViewColumns,
            snapshot.view_columns,
            |c| format!("view column {}", c.name),
        );
        for (position, view) in views.iter_mut().enumerate() {
            view.columns = take(&mut view_columns, position);
        }

        let mut stored_procedures: Vec<_> = snapshot
            .stored_procedures
            .into_iter()
            .filter(|p| self.keeps(&p.item.schema_name, p.is_ms_shipped))
            .map(|p| p.item)
            .collect();
        stored_procedures.sort_by(|a, b| {
            (&a.schema_name, &a.procedure_name).cmp(&(&b.schema_name, &b.procedure_name))
        });

        let mut functions: Vec<_> = snapshot
            .functions
            .into_iter()
            .filter(|f| self.keeps(&f.item.schema_name, f.is_ms_shipped))
            .map(|f| f.item)
            .collect();
        functions.sort_by(|a, b| {
            (&a.schema_name, &a.function_name).cmp(&(&b.schema_name, &b.function_name))
        });

        let metadata = DatabaseMetadata {
            database_name: info.database_name,
            server_name: info.server_name,
            server_version: info.server_version,
            user_name: info.user_name,
            extraction_date: timestamp::truncate(extraction_date),
            size_mb: snapshot.database_size.size_mb,
            used_mb: snapshot.database_size.used_mb,
        };

        let model = SchemaModel::new(
            metadata,
            schemas,
            tables,
            views,
            stored_procedures,
            functions,
            relationships,
        );
        (model, self.warnings)
    }

    fn group_indexes(
        &mut self,
        table_index: &NameIndex,
        rows: Vec<crate::decode::IndexColumnRow>,
    ) -> Vec<Vec<Index>> {
        let mut grouped: BTreeMap<(usize, String), (Index, Vec<(i64, String)>)> = BTreeMap::new();
        for row in rows {
            let position = self.resolve(
                table_index,
                Category::Indexes,
                &row.schema_name,
                &row.table_name,
                false,
                || format!("index {}", row.index_name),
            );
            let Some(position) = position else {
                continue;
            };
            let entry = grouped
                .entry((position, row.index_name.clone()))
                .or_insert_with(|| {
                    (
                        Index {
                            index_name: row.index_name.clone(),
                            index_type: row.index_type.clone(),
                            is_unique: row.is_unique,
                            is_primary_key: row.is_primary_key,
                            columns: Vec::new(),
                        },
                        Vec::new(),
                    )
                });
            entry.1.push((row.key_ordinal, row.column_name));
        }

        let mut per_table: Vec<Vec<Index>> = Vec::new();
        per_table.resize_with(table_index.len, Vec::new);
        for ((position, _), (mut index, mut columns)) in grouped {
            columns.sort_by_key(|(ordinal, _)| *ordinal);
            index.columns = columns.into_iter().map(|(_, name)| name).collect();
            per_table[position].push(index);
        }
        for indexes in &mut per_table {
            indexes.sort_by(|a, b| {
                b.is_primary_key
                    .cmp(&a.is_primary_key)
                    .then_with(|| a.index_name.cmp(&b.index_name))
            });
        }
        per_table
    }

    /// Attach resolvable foreign keys to their parent table and return the global list
    fn join_foreign_keys(
        &mut self,
        table_index: &NameIndex,
        tables: &mut [Table],
        mut rows: Vec<crate::decode::ForeignKeyRow>,
    ) -> Vec<ForeignKey> {
        rows.sort_by(|a, b| {
            let a_key = (
                &a.foreign_key.parent_schema,
                &a.foreign_key.parent_table,
                &a.foreign_key.foreign_key_name,
                a.ordinal,
            );
            let b_key = (
                &b.foreign_key.parent_schema,
                &b.foreign_key.parent_table,
                &b.foreign_key.foreign_key_name,
                b.ordinal,
            );
            a_key.cmp(&b_key)
        });

        let mut relationships = Vec::new();
        for row in rows {
            let fk = row.foreign_key;
            if !self.keeps(&fk.parent_schema, row.is_ms_shipped) {
                continue;
            }
            let parent = table_index.get(&fk.parent_schema, &fk.parent_table);
            let referenced = table_index.get(&fk.referenced_schema, &fk.referenced_table);
            match (parent, referenced) {
                (Lookup::Excluded, _) => continue,
                (Lookup::Found(position), Lookup::Found(_)) => {
                    tables[position].foreign_keys.push(fk.clone());
                }
                (Lookup::Found(_), _) => {
                    let detail = format!(
                        "foreign key {} references {}.{}",
                        fk.foreign_key_name, fk.referenced_schema, fk.referenced_table
                    );
                    self.warn_unmatched(
                        Category::ForeignKeys,
                        &fk.referenced_schema,
                        &fk.referenced_table,
                        Some(&fk.foreign_key_name),
                        detail,
                    );
                }
                _ => {
                    let detail = format!("foreign key {}", fk.foreign_key_name);
                    self.warn_unmatched(
                        Category::ForeignKeys,
                        &fk.parent_schema,
                        &fk.parent_table,
                        Some(&fk.foreign_key_name),
                        detail,
                    );
                }
            }
            relationships.push(fk);
        }
        relationships
    }
}

fn take<T>(grouped: &mut [Vec<(i64, T)>], position: usize) -> Vec<T> {
    grouped
        .get_mut(position)
        .map(|items| std::mem::take(items).into_iter().map(|(_, item)| item).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
