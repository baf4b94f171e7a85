//! Code generation for `#[derive(Record)]`.

use proc_macro2::TokenStream;
use quote::quote;

use crate::parse::{AssociationDef, KindDef, RecordDef, ShapeDef};

/// Generate the `Record` trait implementation.
pub fn generate_record_impl(def: &RecordDef) -> TokenStream {
    let name = &def.name;
    let type_name = name.to_string();

    let field_infos = def.columns.iter().map(|c| {
        let field = c.field.to_string();
        let column = &c.column;
        let primary_key = c.primary_key;
        quote! {
            ::relmap_core::FieldInfo::new(#field)
                .column(#column)
                .primary_key(#primary_key)
        }
    });

    let association_infos = def.associations.iter().map(association_info);

    let table = def.table.as_ref().map(|table| quote! { .table(#table) });

    let get_arms = def.columns.iter().map(|c| {
        let field = &c.field;
        let column = &c.column;
        quote! {
            #column => ::std::option::Option::Some(::relmap_core::ToValue::to_value(&self.#field)),
        }
    });

    let set_arms = def.columns.iter().map(|c| {
        let field = &c.field;
        let column = &c.column;
        quote! {
            #column => {
                self.#field = ::relmap_core::FromValue::from_value(value)
                    .map_err(|err| err.at_column(column))?;
            }
        }
    });

    let ref_arms = def.associations.iter().map(|a| {
        let field = &a.field;
        let name = a.field.to_string();
        let variant = shape_variant(a.shape);
        quote! {
            #name => ::std::option::Option::Some(::relmap_core::AssociationRef::#variant(&self.#field)),
        }
    });

    let mut_arms = def.associations.iter().map(|a| {
        let field = &a.field;
        let name = a.field.to_string();
        let variant = shape_variant(a.shape);
        quote! {
            #name => ::std::option::Option::Some(::relmap_core::AssociationMut::#variant(&mut self.#field)),
        }
    });

    quote! {
        impl ::relmap_core::Record for #name {
            fn record_info() -> &'static ::relmap_core::RecordInfo {
                static INFO: ::relmap_core::RecordInfo = ::relmap_core::RecordInfo::new(
                    #type_name,
                    ::std::any::TypeId::of::<#name>,
                    &[#(#field_infos),*],
                    &[#(#association_infos),*],
                )
                #table;
                &INFO
            }

            fn info(&self) -> &'static ::relmap_core::RecordInfo {
                <Self as ::relmap_core::Record>::record_info()
            }

            fn get(&self, column: &str) -> ::std::option::Option<::relmap_core::Value> {
                match column {
                    #(#get_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set(
                &mut self,
                column: &str,
                value: ::relmap_core::Value,
            ) -> ::relmap_core::Result<()> {
                match column {
                    #(#set_arms)*
                    _ => {
                        return ::std::result::Result::Err(::relmap_core::Error::schema(
                            ::std::format!("`{}` has no column `{}`", #type_name, column),
                        ));
                    }
                }
                ::std::result::Result::Ok(())
            }

            fn association(
                &self,
                name: &str,
            ) -> ::std::option::Option<::relmap_core::AssociationRef<'_>> {
                match name {
                    #(#ref_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn association_mut(
                &mut self,
                name: &str,
            ) -> ::std::option::Option<::relmap_core::AssociationMut<'_>> {
                match name {
                    #(#mut_arms)*
                    _ => ::std::option::Option::None,
                }
            }
        }
    }
}

fn shape_variant(shape: ShapeDef) -> TokenStream {
    match shape {
        ShapeDef::One => quote!(One),
        ShapeDef::Many => quote!(Many),
    }
}

fn association_info(assoc: &AssociationDef) -> TokenStream {
    let name = assoc.field.to_string();
    let target = &assoc.target;
    let shape = match assoc.shape {
        ShapeDef::One => quote!(::relmap_core::AssociationShape::One),
        ShapeDef::Many => quote!(::relmap_core::AssociationShape::Many),
    };
    let kind = match assoc.kind {
        KindDef::Infer => None,
        KindDef::BelongsTo => Some(quote!(::relmap_core::AssociationKind::BelongsTo)),
        KindDef::HasOne => Some(quote!(::relmap_core::AssociationKind::HasOne)),
        KindDef::HasMany => Some(quote!(::relmap_core::AssociationKind::HasMany)),
    }
    .map(|kind| quote! { .kind(#kind) });
    let foreign_key = assoc
        .foreign_key
        .as_ref()
        .map(|fk| quote! { .foreign_key(#fk) });
    let reference_key = assoc
        .reference_key
        .as_ref()
        .map(|rk| quote! { .reference_key(#rk) });

    quote! {
        ::relmap_core::AssociationInfo::new(
            #name,
            #shape,
            <#target as ::relmap_core::Record>::record_info,
        )
        #kind
        #foreign_key
        #reference_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_record;
    use syn::{DeriveInput, parse_quote};

    #[test]
    fn test_generated_impl_mentions_every_column_and_association() {
        let input: DeriveInput = parse_quote! {
            struct Transaction {
                id: i64,
                #[record(column = "buyer_id")]
                user_id: i64,
                #[record(belongs_to, foreign_key = "buyer_id")]
                buyer: Option<Box<User>>,
            }
        };
        let tokens = generate_record_impl(&parse_record(&input).unwrap()).to_string();

        assert!(tokens.contains("impl :: relmap_core :: Record for Transaction"));
        assert!(tokens.contains("\"buyer_id\" =>"));
        assert!(tokens.contains("AssociationKind :: BelongsTo"));
        assert!(tokens.contains("< User as :: relmap_core :: Record > :: record_info"));
        assert!(!tokens.contains(". table ("));
    }

    #[test]
    fn test_generated_impl_sets_table() {
        let input: DeriveInput = parse_quote! {
            #[record(table = "people")]
            struct Person {
                id: i64,
            }
        };
        let tokens = generate_record_impl(&parse_record(&input).unwrap()).to_string();
        assert!(tokens.contains(". table (\"people\")"));
    }
}
