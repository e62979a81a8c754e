//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per aggregate. All public functions are re-exported here.

mod cart;
mod catalog;
mod news;
mod scoreboard;
mod search;
mod user;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use super::DatabaseError;

pub use cart::*;
pub use catalog::*;
pub use news::*;
pub use scoreboard::*;
pub use search::*;
pub use user::*;

// ── Column helpers ──────────────────────────────────────────

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read a TEXT column holding a hyphenated UUID.
pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read a TEXT column through a `str_enum!` type.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// LIKE pattern for a case-insensitive substring match. `%`, `_` and `\`
/// are escaped; queries must use `ESCAPE '\'`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out.to_lowercase()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared row builders for repository and domain tests.

    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::now;
    use crate::models::*;

    pub fn user(conn: &Connection, username: &str, is_staff: bool) -> User {
        super::insert_user(
            conn,
            &super::NewUser {
                username,
                email: "",
                password_hash: "!",
                is_staff,
                is_superuser: false,
            },
        )
        .unwrap()
    }

    pub fn category(conn: &Connection, name: &str) -> Category {
        let slug = crate::shop::slugify(name);
        let id = super::insert_category(conn, name, &slug, None).unwrap();
        super::get_category(conn, &id).unwrap().unwrap()
    }

    pub fn product(
        conn: &Connection,
        category_id: Uuid,
        name: &str,
        price: i64,
        stock: i64,
        owner: Option<i64>,
    ) -> Product {
        let at = now();
        let product = Product {
            id: Uuid::new_v4(),
            created_by: owner,
            category_id,
            brand_id: None,
            name: name.into(),
            slug: crate::shop::slugify(name),
            description: String::new(),
            price: Money(price),
            sale_price: None,
            currency: "IDR".into(),
            stock,
            total_sold: 0,
            thumbnail: String::new(),
            is_featured: false,
            status: ProductStatus::Active,
            rating_avg: 0.0,
            rating_count: 0,
            created_at: at,
            updated_at: at,
        };
        super::insert_product(conn, &product).unwrap();
        product
    }
}
