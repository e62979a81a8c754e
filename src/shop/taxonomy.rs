//! Category tree and brands. Writes are staff only.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::{require_staff, slugify, ShopError};
use crate::db::{self, BrandFields, DatabaseError};
use crate::models::{Brand, Category, User};
use crate::validation::{self, FieldErrors};

const CATEGORY_NAME_MAX: usize = 80;
const BRAND_NAME_MAX: usize = 80;
const SLUG_MAX: usize = 100;

fn checked_slug(errors: &mut FieldErrors, raw: Option<&str>, name: &str) -> String {
    let slug = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) => {
            if !given
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                errors.add(
                    "slug",
                    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                );
            }
            given.to_string()
        }
        None => slugify(name),
    };
    if slug.chars().count() > SLUG_MAX {
        errors.add("slug", format!("Ensure this value has at most {SLUG_MAX} characters."));
    }
    slug
}

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    /// Parent category UUID; empty or absent for a root category.
    pub parent: Option<String>,
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, ShopError> {
    Ok(db::list_categories(conn)?)
}

fn validate_category(
    conn: &Connection,
    input: &CategoryInput,
    current: Option<&Uuid>,
) -> Result<(String, String, Option<Uuid>), ShopError> {
    let mut errors = FieldErrors::new();
    let name = validation::required_text(&mut errors, "name", input.name.as_deref(), CATEGORY_NAME_MAX);
    let slug = checked_slug(&mut errors, input.slug.as_deref(), &name);
    if slug.is_empty() && !errors.contains("name") {
        errors.add("slug", "This field is required.");
    }

    let parent = match input.parent.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        None => None,
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) if db::get_category(conn, &id)?.is_some() => Some(id),
            _ => {
                errors.add("parent", "Select a valid choice. That choice is not one of the available choices.");
                None
            }
        },
    };
    if let (Some(parent), Some(current)) = (parent.as_ref(), current) {
        if parent == current || db::category_is_descendant(conn, current, parent)? {
            errors.add("parent", "A category cannot be nested under itself.");
        }
    }

    errors.into_result()?;
    Ok((name, slug, parent))
}

fn duplicate_slug(e: DatabaseError) -> ShopError {
    if e.is_unique_violation() {
        ShopError::Validation(FieldErrors::single(
            "slug",
            "Category with this Parent and Slug already exists.",
        ))
    } else {
        ShopError::Database(e)
    }
}

pub fn create_category(conn: &Connection, user: &User, input: &CategoryInput) -> Result<Category, ShopError> {
    require_staff(user)?;
    let (name, slug, parent) = validate_category(conn, input, None)?;
    let id = db::insert_category(conn, &name, &slug, parent.as_ref()).map_err(duplicate_slug)?;
    tracing::info!(category_id = %id, "Category created");
    db::get_category(conn, &id)?.ok_or(ShopError::NotFound("Category"))
}

pub fn update_category(
    conn: &Connection,
    user: &User,
    id: &Uuid,
    input: &CategoryInput,
) -> Result<Category, ShopError> {
    require_staff(user)?;
    db::get_category(conn, id)?.ok_or(ShopError::NotFound("Category"))?;
    let (name, slug, parent) = validate_category(conn, input, Some(id))?;
    db::update_category(conn, id, &name, &slug, parent.as_ref()).map_err(duplicate_slug)?;
    db::get_category(conn, id)?.ok_or(ShopError::NotFound("Category"))
}

/// Refuses while products still reference the category or a subcategory.
pub fn delete_category(conn: &Connection, user: &User, id: &Uuid) -> Result<(), ShopError> {
    require_staff(user)?;
    let category = db::get_category(conn, id)?.ok_or(ShopError::NotFound("Category"))?;
    match db::delete_category(conn, id) {
        Ok(_) => {
            tracing::info!(category_id = %id, "Category deleted");
            Ok(())
        }
        Err(e) if e.is_foreign_key_violation() => Err(ShopError::InUse(format!(
            "Category \"{}\" still has products",
            category.full_path
        ))),
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════
// Brands
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BrandInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

pub fn list_brands(conn: &Connection) -> Result<Vec<Brand>, ShopError> {
    Ok(db::list_brands(conn)?)
}

fn save_brand(conn: &Connection, input: &BrandInput, current: Option<&Uuid>) -> Result<Uuid, ShopError> {
    let mut errors = FieldErrors::new();
    let name = validation::required_text(&mut errors, "name", input.name.as_deref(), BRAND_NAME_MAX);
    let slug = checked_slug(&mut errors, input.slug.as_deref(), &name);
    let description = input.description.as_deref().map(str::trim).unwrap_or_default();
    let logo_url = validation::optional_url(&mut errors, "logo_url", input.logo_url.as_deref()).unwrap_or_default();

    if let Some(existing) = db::get_brand_by_name(conn, &name)? {
        if Some(&existing.id) != current {
            errors.add("name", "Brand with this Name already exists.");
        }
    }
    errors.into_result()?;

    let fields = BrandFields {
        name: &name,
        slug: &slug,
        description,
        logo_url: &logo_url,
    };
    let result = match current {
        Some(id) => db::update_brand(conn, id, &fields).map(|_| *id),
        None => db::insert_brand(conn, &fields),
    };
    result.map_err(|e| {
        if e.is_unique_violation() {
            ShopError::Validation(FieldErrors::single("slug", "Brand with this Slug already exists."))
        } else {
            ShopError::Database(e)
        }
    })
}

pub fn create_brand(conn: &Connection, user: &User, input: &BrandInput) -> Result<Brand, ShopError> {
    require_staff(user)?;
    let id = save_brand(conn, input, None)?;
    tracing::info!(brand_id = %id, "Brand created");
    db::get_brand(conn, &id)?.ok_or(ShopError::NotFound("Brand"))
}

pub fn update_brand(conn: &Connection, user: &User, id: &Uuid, input: &BrandInput) -> Result<Brand, ShopError> {
    require_staff(user)?;
    db::get_brand(conn, id)?.ok_or(ShopError::NotFound("Brand"))?;
    save_brand(conn, input, Some(id))?;
    db::get_brand(conn, id)?.ok_or(ShopError::NotFound("Brand"))
}

/// Products of a deleted brand keep existing without a brand.
pub fn delete_brand(conn: &Connection, user: &User, id: &Uuid) -> Result<(), ShopError> {
    require_staff(user)?;
    if !db::delete_brand(conn, id)? {
        return Err(ShopError::NotFound("Brand"));
    }
    tracing::info!(brand_id = %id, "Brand deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures;

    fn named(name: &str) -> CategoryInput {
        CategoryInput {
            name: Some(name.into()),
            ..CategoryInput::default()
        }
    }

    #[test]
    fn staff_only_writes() {
        let conn = open_memory_database().unwrap();
        let member = fixtures::user(&conn, "budi", false);
        let err = create_category(&conn, &member, &named("Shoes")).unwrap_err();
        assert!(matches!(err, ShopError::Forbidden(_)));
    }

    #[test]
    fn nested_category_has_full_path() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        let root = create_category(&conn, &staff, &named("Football")).unwrap();
        assert_eq!(root.slug, "football");
        let child = create_category(
            &conn,
            &staff,
            &CategoryInput {
                name: Some("Boots".into()),
                slug: None,
                parent: Some(root.id.to_string()),
            },
        )
        .unwrap();
        assert_eq!(child.full_path, "Football / Boots");
    }

    #[test]
    fn category_cannot_become_own_ancestor() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        let root = create_category(&conn, &staff, &named("Football")).unwrap();
        let child = create_category(
            &conn,
            &staff,
            &CategoryInput {
                name: Some("Boots".into()),
                slug: None,
                parent: Some(root.id.to_string()),
            },
        )
        .unwrap();
        let err = update_category(
            &conn,
            &staff,
            &root.id,
            &CategoryInput {
                name: Some("Football".into()),
                slug: None,
                parent: Some(child.id.to_string()),
            },
        )
        .unwrap_err();
        let ShopError::Validation(fields) = err else { panic!("expected validation") };
        assert!(fields.contains("parent"));
    }

    #[test]
    fn duplicate_root_slug_is_field_error() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        create_category(&conn, &staff, &named("Shoes")).unwrap();
        let err = create_category(&conn, &staff, &named("Shoes")).unwrap_err();
        let ShopError::Validation(fields) = err else { panic!("expected validation") };
        assert!(fields.contains("slug"));
    }

    #[test]
    fn delete_category_with_products_is_refused() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        let cat = fixtures::category(&conn, "Shoes");
        let product = fixtures::product(&conn, cat.id, "Runner", 1, 1, None);
        let err = delete_category(&conn, &staff, &cat.id).unwrap_err();
        assert!(matches!(err, ShopError::InUse(_)));

        db::delete_product(&conn, &product.id).unwrap();
        delete_category(&conn, &staff, &cat.id).unwrap();
        assert!(db::get_category(&conn, &cat.id).unwrap().is_none());
    }

    #[test]
    fn brand_crud_and_set_null() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        let brand = create_brand(
            &conn,
            &staff,
            &BrandInput {
                name: Some("New Balance".into()),
                logo_url: Some("https://cdn.example.com/nb.png".into()),
                ..BrandInput::default()
            },
        )
        .unwrap();
        assert_eq!(brand.slug, "new-balance");

        let dup = create_brand(&conn, &staff, &BrandInput { name: Some("New Balance".into()), ..Default::default() });
        assert!(matches!(dup, Err(ShopError::Validation(_))));

        let renamed = update_brand(
            &conn,
            &staff,
            &brand.id,
            &BrandInput { name: Some("NB".into()), slug: Some("nb".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(renamed.name, "NB");

        let cat = fixtures::category(&conn, "Shoes");
        let mut product = fixtures::product(&conn, cat.id, "574", 1, 1, None);
        product.brand_id = Some(brand.id);
        db::update_product(&conn, &product).unwrap();

        delete_brand(&conn, &staff, &brand.id).unwrap();
        assert_eq!(db::get_product(&conn, &product.id).unwrap().unwrap().brand_id, None);
        assert!(matches!(delete_brand(&conn, &staff, &brand.id), Err(ShopError::NotFound(_))));
    }
}
