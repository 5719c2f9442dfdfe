//! Procedural macros for murmur
//!
//! This crate provides the derive that turns an annotated entity struct into
//! the static metadata record the retrieval layer works from:
//!
//! - `#[derive(DatabaseEntity)]` - Generate `DatabaseEntity` and `FromSqlRow`

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, PathSegment, Token, Type,
    parse_macro_input,
};

/// Generate the metadata record, row decoding and row encoding for an entity.
///
/// # Usage
///
/// ```ignore
/// #[derive(DatabaseEntity, Clone, Debug, Serialize)]
/// #[entity(table = "micro_posts", trashable, publishable)]
/// pub struct MicroPost {
///     #[entity(primary_key, groups("default"))]
///     pub id: i64,
///
///     #[entity(unique, groups("default", "post-list"))]
///     pub slug: Option<String>,
///
///     #[entity(groups("default", "post-list"), relation(expand("post-with-author")))]
///     pub author: Reference<User>,
///
///     pub trashed_at: Option<DateTime<Utc>>,
/// }
/// ```
///
/// Struct attributes:
/// - `kind = "..."` - metadata key (defaults to the struct name)
/// - `table = "..."` - table name (defaults to the snake_case name plus `s`)
/// - `trashable` / `trashable = "column"` - soft-delete column (default `trashed_at`)
/// - `publishable` / `publishable = "column"` - publish column (default `published_at`)
///
/// Field attributes:
/// - `primary_key`, `unique`, `column = "..."`
/// - `groups("a", "b")` - projection groups the field belongs to
/// - `relation(target = "User", expand("group"))` - reference to another entity,
///   stored as `<field>_id` unless `column` says otherwise
#[proc_macro_derive(DatabaseEntity, attributes(entity))]
pub fn database_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Struct-level `#[entity(...)]` options
struct EntityAttrs {
    kind: String,
    table: String,
    trashed_column: Option<String>,
    published_column: Option<String>,
}

/// Field-level `#[entity(...)]` options
#[derive(Default)]
struct FieldAttrs {
    primary_key: bool,
    unique: bool,
    column: Option<String>,
    groups: Vec<String>,
    relation: Option<RelationAttrs>,
}

#[derive(Default)]
struct RelationAttrs {
    target: Option<String>,
    expand: Vec<String>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attrs = parse_entity_attrs(input)?;

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "DatabaseEntity requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "DatabaseEntity can only be derived for structs",
            ));
        }
    };

    let mut parsed = Vec::new();
    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        parsed.push((ident, field, parse_field_attrs(field)?));
    }

    let primary_key = parsed
        .iter()
        .find(|(_, _, attrs)| attrs.primary_key)
        .or_else(|| parsed.iter().find(|(ident, _, _)| *ident == "id"))
        .map(|(ident, _, _)| (*ident).clone());
    let Some(primary_key) = primary_key else {
        return Err(syn::Error::new_spanned(
            name,
            "DatabaseEntity needs an `id` field or a field marked `primary_key`",
        ));
    };

    let mut field_metas = Vec::new();
    let mut decoders = Vec::new();
    let mut encoders = Vec::new();

    for (ident, field, field_attrs) in parsed {
        let field_name = ident.to_string();

        let (inner, nullable) = unwrap_option(&field.ty);
        let is_reference = last_segment(inner).is_some_and(|s| s.ident == "Reference");

        let relation = if is_reference || field_attrs.relation.is_some() {
            let relation = field_attrs.relation.unwrap_or_default();
            let target_type = reference_type(inner);
            let target = match relation.target {
                Some(target) => target,
                None => target_type
                    .and_then(last_segment)
                    .map(|s| s.ident.to_string())
                    .ok_or_else(|| {
                        syn::Error::new_spanned(
                            &field.ty,
                            "relation fields must be `Reference<T>` or name a `target`",
                        )
                    })?,
            };
            Some((target, relation.expand, target_type))
        } else {
            None
        };

        let column = match (&field_attrs.column, &relation) {
            (Some(column), _) => column.clone(),
            (None, Some(_)) => format!("{}_id", field_name),
            (None, None) => field_name.clone(),
        };

        let is_primary_key = *ident == primary_key;
        let sql_type = if relation.is_some() {
            "INTEGER"
        } else {
            sql_type(inner)
        };
        let unique = field_attrs.unique;
        let groups = &field_attrs.groups;

        let relation_tokens = match &relation {
            Some((target, expand, target_type)) => {
                let metadata = match target_type {
                    Some(ty) => quote! {
                        ::core::option::Option::Some(
                            <#ty as ::murmur::orm::DatabaseEntity>::metadata
                        )
                    },
                    None => quote! { ::core::option::Option::None },
                };
                quote! {
                    ::core::option::Option::Some(::murmur::orm::RelationMeta {
                        target: #target,
                        expand: &[#(#expand),*],
                        metadata: #metadata,
                    })
                }
            }
            None => quote! { ::core::option::Option::None },
        };

        field_metas.push(quote! {
            ::murmur::orm::FieldMeta {
                name: #field_name,
                column: #column,
                sql_type: #sql_type,
                nullable: #nullable,
                primary_key: #is_primary_key,
                unique: #unique,
                groups: &[#(#groups),*],
                relation: #relation_tokens,
            }
        });

        decoders.push(match (&relation, nullable) {
            (Some(_), true) => quote! {
                #ident: row
                    .try_get::<::core::option::Option<i64>, _>(#column)?
                    .map(::murmur::orm::Reference::Id)
            },
            (Some(_), false) => quote! {
                #ident: ::murmur::orm::Reference::Id(row.try_get::<i64, _>(#column)?)
            },
            (None, _) => quote! { #ident: row.try_get(#column)? },
        });

        encoders.push(quote! {
            ::murmur::orm::ToSqlValue::to_sql_value(&self.#ident)
        });
    }

    let primary_key_name = primary_key.to_string();

    let kind = &attrs.kind;
    let table = &attrs.table;
    let trashed_column = optional_str(&attrs.trashed_column);
    let published_column = optional_str(&attrs.published_column);

    Ok(quote! {
        impl #impl_generics ::murmur::orm::DatabaseEntity for #name #ty_generics #where_clause {
            fn metadata() -> &'static ::murmur::orm::EntityMetadata {
                static METADATA: ::murmur::orm::EntityMetadata = ::murmur::orm::EntityMetadata {
                    kind: #kind,
                    table: #table,
                    primary_key: #primary_key_name,
                    trashed_column: #trashed_column,
                    published_column: #published_column,
                    fields: &[#(#field_metas),*],
                };
                &METADATA
            }

            fn id(&self) -> i64 {
                self.#primary_key
            }

            fn to_sql_values(&self) -> ::std::vec::Vec<::murmur::orm::SqlValue> {
                ::std::vec![#(#encoders),*]
            }
        }

        impl #impl_generics ::murmur::orm::FromSqlRow for #name #ty_generics #where_clause {
            fn from_row(
                row: &::murmur::sqlx::sqlite::SqliteRow,
            ) -> ::core::result::Result<Self, ::murmur::sqlx::Error> {
                use ::murmur::sqlx::Row as _;

                ::core::result::Result::Ok(Self {
                    #(#decoders),*
                })
            }
        }
    })
}

fn parse_entity_attrs(input: &DeriveInput) -> syn::Result<EntityAttrs> {
    let name = input.ident.to_string();
    let mut attrs = EntityAttrs {
        kind: name.clone(),
        table: format!("{}s", name.to_case(Case::Snake)),
        trashed_column: None,
        published_column: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                attrs.kind = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("table") {
                attrs.table = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("trashable") {
                attrs.trashed_column = Some(optional_column(&meta, "trashed_at")?);
            } else if meta.path.is_ident("publishable") {
                attrs.published_column = Some(optional_column(&meta, "published_at")?);
            } else {
                return Err(meta.error("unsupported entity attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("unique") {
                attrs.unique = true;
            } else if meta.path.is_ident("column") {
                attrs.column = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("groups") {
                attrs.groups = parse_string_list(&meta)?;
            } else if meta.path.is_ident("relation") {
                let mut relation = RelationAttrs::default();
                if !meta.input.is_empty() && !meta.input.peek(Token![,]) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("target") {
                            relation.target = Some(inner.value()?.parse::<LitStr>()?.value());
                        } else if inner.path.is_ident("expand") {
                            relation.expand = parse_string_list(&inner)?;
                        } else {
                            return Err(inner.error("unsupported relation attribute"));
                        }
                        Ok(())
                    })?;
                }
                attrs.relation = Some(relation);
            } else {
                return Err(meta.error("unsupported entity field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// `trashable` or `trashable = "deleted_at"`
fn optional_column(meta: &ParseNestedMeta, default: &str) -> syn::Result<String> {
    if meta.input.peek(Token![=]) {
        Ok(meta.value()?.parse::<LitStr>()?.value())
    } else {
        Ok(default.to_string())
    }
}

/// `groups("a", "b")`
fn parse_string_list(meta: &ParseNestedMeta) -> syn::Result<Vec<String>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let list: Punctuated<LitStr, Token![,]> = Punctuated::parse_terminated(&content)?;
    Ok(list.into_iter().map(|lit| lit.value()).collect())
}

fn optional_str(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    }
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        _ => None,
    }
}

fn first_type_argument(segment: &PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

/// Strip one `Option<...>` layer, reporting whether the column is nullable.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    match last_segment(ty) {
        Some(segment) if segment.ident == "Option" => match first_type_argument(segment) {
            Some(inner) => (inner, true),
            None => (ty, false),
        },
        _ => (ty, false),
    }
}

/// `Reference<User>` -> `User`
fn reference_type(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Reference" {
        return None;
    }
    first_type_argument(segment)
}

fn sql_type(ty: &Type) -> &'static str {
    let ident = last_segment(ty).map(|s| s.ident.to_string());
    match ident.as_deref() {
        Some("i64" | "i32" | "i16" | "i8" | "u32" | "u16" | "u8" | "bool") => "INTEGER",
        Some("f64" | "f32") => "REAL",
        _ => "TEXT",
    }
}
