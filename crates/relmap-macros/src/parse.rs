//! Parsing of `#[derive(Record)]` input.
//!
//! Turns a struct and its `#[record(...)]` attributes into a [`RecordDef`].

use quote::ToTokens;
use syn::{
    Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitStr, PathArguments, Result,
    Type,
};

/// Parsed definition of a struct deriving `Record`.
#[derive(Debug)]
pub struct RecordDef {
    /// The struct name.
    pub name: Ident,
    /// Explicit table name from `#[record(table = "...")]`.
    pub table: Option<String>,
    /// Persisted columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Association fields in declaration order.
    pub associations: Vec<AssociationDef>,
}

/// A persisted field.
#[derive(Debug)]
pub struct ColumnDef {
    pub field: Ident,
    pub column: String,
    pub primary_key: bool,
}

/// Kind forced by the field attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindDef {
    Infer,
    BelongsTo,
    HasOne,
    HasMany,
}

/// Shape of an association field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeDef {
    One,
    Many,
}

/// An association field.
#[derive(Debug)]
pub struct AssociationDef {
    pub field: Ident,
    pub kind: KindDef,
    pub shape: ShapeDef,
    /// The associated record type (with any `Box` stripped).
    pub target: Type,
    pub foreign_key: Option<String>,
    pub reference_key: Option<String>,
}

/// Parse a `DeriveInput` into a `RecordDef`.
pub fn parse_record(input: &DeriveInput) -> Result<RecordDef> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Record requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Record can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Record can only be derived for structs, not unions",
            ));
        }
    };

    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                table = Some(identifier(&lit)?);
                Ok(())
            } else {
                Err(meta.error("unknown record attribute; expected `table`"))
            }
        })?;
    }

    let mut columns = Vec::new();
    let mut associations = Vec::new();
    for field in fields {
        match parse_field(field)? {
            Some(FieldDef::Column(column)) => columns.push(column),
            Some(FieldDef::Association(assoc)) => associations.push(assoc),
            None => {}
        }
    }

    if columns.iter().filter(|c| c.primary_key).count() > 1 {
        return Err(Error::new_spanned(
            &input.ident,
            "at most one field may be marked `#[record(primary_key)]`",
        ));
    }

    Ok(RecordDef {
        name: input.ident.clone(),
        table,
        columns,
        associations,
    })
}

enum FieldDef {
    Column(ColumnDef),
    Association(AssociationDef),
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    primary_key: bool,
    column: Option<String>,
    association: Option<KindDef>,
    foreign_key: Option<String>,
    reference_key: Option<String>,
}

fn parse_field(field: &Field) -> Result<Option<FieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("skip") {
                attrs.skip = true;
            } else if path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.column = Some(identifier(&lit)?);
            } else if path.is_ident("association") {
                attrs.association = Some(KindDef::Infer);
            } else if path.is_ident("belongs_to") {
                attrs.association = Some(KindDef::BelongsTo);
            } else if path.is_ident("has_one") {
                attrs.association = Some(KindDef::HasOne);
            } else if path.is_ident("has_many") {
                attrs.association = Some(KindDef::HasMany);
            } else if path.is_ident("foreign_key") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.foreign_key = Some(identifier(&lit)?);
            } else if path.is_ident("reference_key") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.reference_key = Some(identifier(&lit)?);
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown record attribute `{attr_name}`. \
                         Valid attributes are: skip, primary_key, column, association, \
                         belongs_to, has_one, has_many, foreign_key, reference_key"
                    ),
                ));
            }
            Ok(())
        })?;
    }

    if attrs.skip {
        return Ok(None);
    }

    let Some(kind) = attrs.association else {
        if attrs.foreign_key.is_some() || attrs.reference_key.is_some() {
            return Err(Error::new_spanned(
                &name,
                "`foreign_key`/`reference_key` require an association attribute",
            ));
        }
        let column = attrs.column.unwrap_or_else(|| name.to_string());
        return Ok(Some(FieldDef::Column(ColumnDef {
            field: name,
            column,
            primary_key: attrs.primary_key,
        })));
    };

    if attrs.primary_key || attrs.column.is_some() {
        return Err(Error::new_spanned(
            &name,
            "association fields cannot be primary keys or columns",
        ));
    }

    let (shape, target) = association_shape(&field.ty).ok_or_else(|| {
        Error::new_spanned(
            &field.ty,
            "association fields must be `Option<T>`, `Option<Box<T>>`, `Option<Vec<T>>` or `Vec<T>`",
        )
    })?;
    match (kind, shape) {
        (KindDef::HasMany, ShapeDef::One) => {
            return Err(Error::new_spanned(
                &field.ty,
                "`has_many` requires `Option<Vec<T>>` or `Vec<T>`",
            ));
        }
        (KindDef::BelongsTo | KindDef::HasOne, ShapeDef::Many) => {
            return Err(Error::new_spanned(
                &field.ty,
                "`belongs_to`/`has_one` require `Option<T>` or `Option<Box<T>>`",
            ));
        }
        _ => {}
    }

    Ok(Some(FieldDef::Association(AssociationDef {
        field: name,
        kind,
        shape,
        target: target.clone(),
        foreign_key: attrs.foreign_key,
        reference_key: attrs.reference_key,
    })))
}

/// Validate an identifier literal at compile time.
fn identifier(lit: &LitStr) -> Result<String> {
    let value = lit.value();
    let pattern = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| Error::new_spanned(lit, format!("invalid identifier pattern: {e}")))?;
    if pattern.is_match(&value) {
        Ok(value)
    } else {
        Err(Error::new_spanned(
            lit,
            format!("`{value}` is not a valid table or column name"),
        ))
    }
}

/// The single generic argument of `ty` when its last segment is `wrapper`.
fn generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Classify an association field type and extract its target type.
pub fn association_shape(ty: &Type) -> Option<(ShapeDef, &Type)> {
    if let Some(inner) = generic_arg(ty, "Vec") {
        return Some((ShapeDef::Many, inner));
    }
    let inner = generic_arg(ty, "Option")?;
    if let Some(element) = generic_arg(inner, "Vec") {
        return Some((ShapeDef::Many, element));
    }
    if let Some(boxed) = generic_arg(inner, "Box") {
        return Some((ShapeDef::One, boxed));
    }
    Some((ShapeDef::One, inner))
}
