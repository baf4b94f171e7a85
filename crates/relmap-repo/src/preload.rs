//! Batched loading of associations across many parents.

use std::collections::{HashMap, HashSet};

use relmap_core::{AssociationKind, Document, Error, KeyValue, Result, Row, Value};
use relmap_query::Query;

use crate::adapter::Adapter;

/// Load the association at `path` (dotted, e.g. `"transactions.buyer"`) for
/// every document in `parents` with a single adapter read.
///
/// Every segment but the last walks records that are already loaded.
pub(crate) fn preload(
    adapter: &dyn Adapter,
    parents: &mut [Document<'_>],
    path: &str,
    query: &Query,
) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    preload_segments(adapter, parents, &segments, query)
}

fn preload_segments(
    adapter: &dyn Adapter,
    parents: &mut [Document<'_>],
    segments: &[&str],
    query: &Query,
) -> Result<()> {
    let Some((&name, rest)) = segments.split_first() else {
        return Ok(());
    };
    if parents.is_empty() {
        return Ok(());
    }

    if rest.is_empty() {
        return load_leaf(adapter, parents, name, query);
    }

    // Descend into the already loaded records of this segment.
    let mut children = Vec::new();
    for parent in parents.iter_mut() {
        let assoc = parent.association(name)?;
        if assoc.kind() == AssociationKind::HasMany {
            children.extend(assoc.collection()?.into_documents());
        } else if let Some(child) = assoc.document()? {
            children.push(child);
        }
    }
    preload_segments(adapter, &mut children, rest, query)
}

fn load_leaf(
    adapter: &dyn Adapter,
    parents: &mut [Document<'_>],
    name: &str,
    query: &Query,
) -> Result<()> {
    let Some(assoc) = parents
        .first()
        .and_then(|parent| parent.schema().association(name).cloned())
    else {
        return Err(Error::schema(format!(
            "no association named `{name}` to preload"
        )));
    };
    let local_key = assoc.local_key().to_string();
    let remote_key = assoc.remote_key().to_string();

    // Distinct, non-blank keys in first-seen order.
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for parent in parents.iter() {
        if let Some(value) = parent.get(&local_key).filter(|v| !v.is_blank()) {
            if let Some(key) = value.key() {
                if seen.insert(key) {
                    keys.push(value);
                }
            }
        }
    }

    let rows = if keys.is_empty() {
        Vec::new()
    } else {
        let target = assoc.target_schema()?;
        let read = Query::table(&target.table)
            .where_in(remote_key.as_str(), keys)
            .merge(query);
        adapter.all(&read)?
    };
    tracing::debug!(
        association = assoc.name,
        parents = parents.len(),
        rows = rows.len(),
        "Preloaded association"
    );

    let mut by_key: HashMap<KeyValue, Vec<&Row>> = HashMap::new();
    for row in &rows {
        if let Some(key) = row.get(&remote_key).and_then(Value::key) {
            by_key.entry(key).or_default().push(row);
        }
    }

    for parent in parents.iter_mut() {
        let matches = parent
            .get(&local_key)
            .and_then(|value| value.key())
            .and_then(|key| by_key.get(&key))
            .map_or(&[][..], Vec::as_slice);

        if assoc.kind == AssociationKind::HasMany {
            let mut collection = parent.association(name)?.collection()?;
            collection.reset();
            for row in matches {
                collection.push().apply_row(row)?;
            }
        } else if let Some(row) = matches.first() {
            parent.association(name)?.clear()?;
            parent.association(name)?.document_or_init()?.apply_row(row)?;
        }
    }
    Ok(())
}
