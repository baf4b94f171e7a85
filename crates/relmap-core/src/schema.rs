//! Schema introspection.
//!
//! A [`Schema`] is the resolved description of a record type: its table,
//! primary key, columns and associations with their key columns. Schemas are
//! computed once per type from the static [`RecordInfo`] and kept for the
//! lifetime of the process in a concurrency-safe cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::association::{AssociationInfo, AssociationKind, AssociationShape};
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::naming;
use crate::record::{Record, RecordInfo};

/// A persisted column and the record field backing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub field: &'static str,
}

/// A resolved association.
#[derive(Debug, Clone)]
pub struct AssociationSchema {
    /// Association (field) name.
    pub name: &'static str,
    pub kind: AssociationKind,
    /// Static metadata of the associated record type.
    pub target: fn() -> &'static RecordInfo,
    /// Column on the "one" side.
    pub reference_key: String,
    /// Column on the owning side.
    pub foreign_key: String,
}

impl AssociationSchema {
    pub fn target_info(&self) -> &'static RecordInfo {
        (self.target)()
    }

    pub fn target_schema(&self) -> Result<Arc<Schema>> {
        Schema::resolve(self.target_info())
    }

    /// Column read from the record declaring the association.
    pub fn local_key(&self) -> &str {
        match self.kind {
            AssociationKind::BelongsTo => &self.foreign_key,
            AssociationKind::HasOne | AssociationKind::HasMany => &self.reference_key,
        }
    }

    /// Column read from the associated records.
    pub fn remote_key(&self) -> &str {
        match self.kind {
            AssociationKind::BelongsTo => &self.reference_key,
            AssociationKind::HasOne | AssociationKind::HasMany => &self.foreign_key,
        }
    }
}

impl PartialEq for AssociationSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && (self.target_info().type_id)() == (other.target_info().type_id)()
            && self.reference_key == other.reference_key
            && self.foreign_key == other.foreign_key
    }
}

/// The resolved description of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub type_name: &'static str,
    pub table: String,
    pub primary_key: Column,
    pub columns: Vec<Column>,
    pub associations: Vec<AssociationSchema>,
}

fn cache() -> &'static RwLock<HashMap<TypeId, Arc<Schema>>> {
    static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<Schema>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

impl Schema {
    /// The schema of `T`.
    pub fn of<T: Record>() -> Result<Arc<Schema>> {
        Self::resolve(T::record_info())
    }

    /// The schema of a record's type.
    pub fn for_record(record: &dyn Record) -> Result<Arc<Schema>> {
        Self::resolve(record.info())
    }

    /// Resolve `info`, reusing the cached schema when there is one.
    pub fn resolve(info: &'static RecordInfo) -> Result<Arc<Schema>> {
        let key = (info.type_id)();

        // Fast path: already resolved
        {
            let cache = cache().read().unwrap_or_else(PoisonError::into_inner);
            if let Some(schema) = cache.get(&key) {
                return Ok(Arc::clone(schema));
            }
        }

        // Slow path: resolve outside the lock, first writer wins
        let schema = Arc::new(Self::build(info)?);
        tracing::debug!(
            record = info.type_name,
            table = %schema.table,
            associations = schema.associations.len(),
            "Resolved record schema"
        );
        let mut cache = cache().write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(schema)))
    }

    fn build(info: &'static RecordInfo) -> Result<Schema> {
        let table = match info.table {
            Some(table) => table.to_string(),
            None => naming::table_name(info.type_name),
        };
        ensure_identifier(info, "table", &table)?;

        let mut columns = Vec::with_capacity(info.fields.len());
        for field in info.fields {
            ensure_identifier(info, "column", field.column_name)?;
            columns.push(Column {
                name: field.column_name,
                field: field.name,
            });
        }

        let pk = primary_key_field(info)?;
        let primary_key = Column {
            name: pk.column_name,
            field: pk.name,
        };

        let associations = info
            .associations
            .iter()
            .map(|assoc| resolve_association(info, assoc))
            .collect::<Result<Vec<_>>>()?;

        Ok(Schema {
            type_name: info.type_name,
            table,
            primary_key,
            columns,
            associations,
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationSchema> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Resolve a dotted association path such as `"buyer.address"`.
    ///
    /// Returns one resolved association per segment, walking the target
    /// schema of each step.
    pub fn association_path(self: &Arc<Self>, path: &str) -> Result<Vec<AssociationSchema>> {
        let mut current = Arc::clone(self);
        let mut resolved = Vec::new();
        for segment in path.split('.') {
            let assoc = current.association(segment).cloned().ok_or_else(|| {
                Error::schema(format!(
                    "`{}` has no association named `{segment}` (path `{path}`)",
                    current.type_name
                ))
            })?;
            current = assoc.target_schema()?;
            resolved.push(assoc);
        }
        Ok(resolved)
    }
}

fn ensure_identifier(info: &RecordInfo, what: &str, name: &str) -> Result<()> {
    if naming::is_identifier(name) {
        Ok(())
    } else {
        Err(Error::schema(format!(
            "`{}` has an invalid {what} name `{name}`",
            info.type_name
        )))
    }
}

fn primary_key_field(info: &RecordInfo) -> Result<&'static FieldInfo> {
    let mut flagged = info.fields.iter().filter(|f| f.primary_key);
    match (flagged.next(), flagged.next()) {
        (Some(field), None) => Ok(field),
        (Some(_), Some(_)) => Err(Error::schema(format!(
            "`{}` declares more than one primary key",
            info.type_name
        ))),
        (None, _) => info
            .field_by_column(naming::DEFAULT_PRIMARY_KEY)
            .ok_or_else(|| {
                Error::schema(format!(
                    "`{}` has no primary key: flag a field or add an `{}` column",
                    info.type_name,
                    naming::DEFAULT_PRIMARY_KEY
                ))
            }),
    }
}

fn resolve_association(
    local: &'static RecordInfo,
    assoc: &AssociationInfo,
) -> Result<AssociationSchema> {
    let target = assoc.target_info();
    let local_fk = assoc
        .foreign_key
        .map_or_else(|| naming::foreign_key(target.type_name), str::to_string);
    let remote_fk = assoc
        .foreign_key
        .map_or_else(|| naming::foreign_key(local.type_name), str::to_string);

    let kind = match (assoc.kind, assoc.shape) {
        (Some(kind), _) => kind,
        (None, AssociationShape::Many) => AssociationKind::HasMany,
        (None, AssociationShape::One) if local.has_column(&local_fk) => AssociationKind::BelongsTo,
        (None, AssociationShape::One) if target.has_column(&remote_fk) => AssociationKind::HasOne,
        (None, AssociationShape::One) => {
            return Err(Error::schema(format!(
                "ambiguous association `{}.{}`: neither `{}.{local_fk}` nor `{}.{remote_fk}` exists",
                local.type_name, assoc.name, local.type_name, target.type_name
            )));
        }
    };

    if (kind == AssociationKind::HasMany) != (assoc.shape == AssociationShape::Many) {
        return Err(Error::schema(format!(
            "association `{}.{}` is declared {kind:?} but its field shape is {:?}",
            local.type_name, assoc.name, assoc.shape
        )));
    }

    let (owner, referenced, foreign_key) = match kind {
        AssociationKind::BelongsTo => (local, target, local_fk),
        AssociationKind::HasOne | AssociationKind::HasMany => (target, local, remote_fk),
    };
    let reference_key = match assoc.reference_key {
        Some(column) => column.to_string(),
        None => primary_key_field(referenced)?.column_name.to_string(),
    };

    if !owner.has_column(&foreign_key) {
        return Err(Error::schema(format!(
            "association `{}.{}` expects foreign key `{}.{foreign_key}`",
            local.type_name, assoc.name, owner.type_name
        )));
    }
    if !referenced.has_column(&reference_key) {
        return Err(Error::schema(format!(
            "association `{}.{}` expects reference key `{}.{reference_key}`",
            local.type_name, assoc.name, referenced.type_name
        )));
    }

    Ok(AssociationSchema {
        name: assoc.name,
        kind,
        target: assoc.target,
        reference_key,
        foreign_key,
    })
}
