//! Classification of parameter types into conversion categories.
//!
//! Every signature entry lands in exactly one [`Category`]; the category picks
//! the parameter case that declares and encodes it. The rules are applied in
//! a fixed order and the first match wins, so e.g. a union of metadata columns
//! is a primitive union, not a metadata column.

use crate::signature::{CollectionStyle, TypeDescriptor};

/// Conversion category of a parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// An artifact, or several when collection shaped
    Semantic { multiple: bool },
    ScalarBool,
    ScalarStr,
    ScalarNumeric,
    PrimitiveUnion,
    MetadataColumn,
    MetadataTable,
    SimpleCollection,
    MonomorphicCollection,
    CompositeCollection,
    ComplexCollection,
}

/// Classify the type of parameter `param`.
///
/// Fails only for an unnamed union nested directly in another union, which
/// has no resolvable name to declare it by.
pub fn classify(param: &str, ty: &TypeDescriptor) -> crate::Result<Category> {
    reject_nested_unions(param, ty)?;

    let style = ty.collection_style();
    if ty.is_semantic() {
        return Ok(Category::Semantic {
            multiple: style != CollectionStyle::None,
        });
    }

    let category = match style {
        CollectionStyle::None => {
            if ty.is_union_anywhere() {
                Category::PrimitiveUnion
            } else if ty.is_metadata_column() {
                Category::MetadataColumn
            } else if ty.is_metadata() {
                Category::MetadataTable
            } else if ty.name == "Bool" {
                Category::ScalarBool
            } else if ty.name == "Str" {
                Category::ScalarStr
            } else {
                Category::ScalarNumeric
            }
        }
        CollectionStyle::Simple => Category::SimpleCollection,
        CollectionStyle::Monomorphic => Category::MonomorphicCollection,
        CollectionStyle::Composite => Category::CompositeCollection,
        CollectionStyle::Complex => Category::ComplexCollection,
    };
    Ok(category)
}

/// Resolvable member type names: the distinct members of a union, else the type's own name
pub fn member_names(param: &str, ty: &TypeDescriptor) -> crate::Result<Vec<String>> {
    if !ty.is_union() {
        return Ok(vec![ty.name.clone()]);
    }
    if let Some(member) = ty.members.iter().find(|m| m.name.is_empty()) {
        return Err(crate::Error::unsupported_type(
            param,
            format!("union member without a resolvable name ({member:?})"),
        ));
    }
    Ok(ty
        .distinct_member_names()
        .into_iter()
        .map(str::to_string)
        .collect())
}

fn reject_nested_unions(param: &str, ty: &TypeDescriptor) -> crate::Result<()> {
    for member in &ty.members {
        // A union element of a collection is fine; a union inside a union has no name to declare
        if ty.is_union() && member.is_union() && member.name.is_empty() {
            return Err(crate::Error::unsupported_type(
                param,
                "union nested directly inside another union",
            ));
        }
        reject_nested_unions(param, member)?;
    }
    Ok(())
}
