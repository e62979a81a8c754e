use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_product, ShopError};
use crate::accounts::Viewer;
use crate::db::{self, DatabaseError, NewReview};
use crate::models::{ProductStatus, Review, User};
use crate::validation::{self, lenient_i64, FieldErrors};

const TITLE_MAX: usize = 120;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReviewInput {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Review write result with the product's refreshed aggregate.
#[derive(Debug, Serialize)]
pub struct ReviewOutcome {
    pub review: Option<Review>,
    pub rating_avg: f64,
    pub rating_count: i64,
}

pub fn list_reviews(conn: &Connection, product_key: &str) -> Result<Vec<Review>, ShopError> {
    let row = resolve_product(conn, product_key)?.ok_or(ShopError::NotFound("Product"))?;
    Ok(db::list_reviews(conn, &row.product.id, None)?)
}

/// One review per user and product, on active products only. The rating
/// aggregate is recomputed in the same transaction.
pub fn create_review(
    conn: &Connection,
    user: &User,
    product_key: &str,
    input: &ReviewInput,
) -> Result<ReviewOutcome, ShopError> {
    let row = resolve_product(conn, product_key)?.ok_or(ShopError::NotFound("Product"))?;
    let product = row.product;
    if product.status != ProductStatus::Active {
        return Err(ShopError::NotFound("Product"));
    }

    let mut errors = FieldErrors::new();
    match input.rating {
        None => errors.add("rating", "This field is required."),
        Some(r) if !(1..=5).contains(&r) => errors.add("rating", "Rating must be between 1 and 5."),
        Some(_) => {}
    }
    let title = validation::optional_text(&mut errors, "title", input.title.as_deref(), TITLE_MAX);
    let content = input.content.as_deref().map(str::trim).unwrap_or_default().to_string();
    if db::review_exists(conn, &product.id, user.id)? {
        errors.add("__all__", "You have already reviewed this product.");
    }
    errors.into_result()?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let id = db::insert_review(
        &tx,
        &NewReview {
            product_id: &product.id,
            user_id: user.id,
            rating: input.rating.unwrap_or(1),
            title: &title,
            content: &content,
            is_verified_purchase: db::has_purchased(&tx, user.id, &product.id)?,
        },
    )
    .map_err(|e| {
        if e.is_unique_violation() {
            ShopError::Validation(FieldErrors::single("__all__", "You have already reviewed this product."))
        } else {
            ShopError::Database(e)
        }
    })?;
    let (rating_avg, rating_count) = db::recompute_rating(&tx, &product.id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(product_id = %product.id, user_id = user.id, "Review created");
    Ok(ReviewOutcome {
        review: db::get_review(conn, &id)?,
        rating_avg,
        rating_count,
    })
}

/// Author or staff only.
pub fn delete_review(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<ReviewOutcome, ShopError> {
    let review = db::get_review(conn, id)?.ok_or(ShopError::NotFound("Review"))?;
    if !viewer.can_manage(Some(review.user_id)) {
        return Err(ShopError::Forbidden("Only the author or staff can delete this review".into()));
    }

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    db::delete_review(&tx, id)?;
    let (rating_avg, rating_count) = db::recompute_rating(&tx, &review.product_id)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(review_id = %id, "Review deleted");
    Ok(ReviewOutcome {
        review: None,
        rating_avg,
        rating_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures;
    use crate::models::{Money, OrderStatus};

    fn review(rating: i64) -> ReviewInput {
        ReviewInput {
            rating: Some(rating),
            title: Some("Mantap".into()),
            content: Some("Nyaman dipakai".into()),
        }
    }

    fn viewer(conn: &Connection, user: &User) -> Viewer {
        let session = db::insert_session(conn, &user.username, Some(user.id), db::now()).unwrap();
        Viewer { session: Some(session), user: Some(user.clone()) }
    }

    #[test]
    fn rating_aggregate_follows_writes() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::user(&conn, "budi", false);
        let b = fixtures::user(&conn, "sari", false);
        let cat = fixtures::category(&conn, "Shoes");
        let product = fixtures::product(&conn, cat.id, "Runner", 1, 1, None);

        create_review(&conn, &a, "runner", &review(5)).unwrap();
        let outcome = create_review(&conn, &b, "runner", &review(2)).unwrap();
        assert_eq!(outcome.rating_count, 2);
        assert!((outcome.rating_avg - 3.5).abs() < f64::EPSILON);

        let id = outcome.review.unwrap().id;
        let outcome = delete_review(&conn, &viewer(&conn, &b), &id).unwrap();
        assert_eq!(outcome.rating_count, 1);
        let stored = db::get_product(&conn, &product.id).unwrap().unwrap();
        assert!((stored.rating_avg - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn one_review_per_user() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        fixtures::product(&conn, cat.id, "Runner", 1, 1, None);
        create_review(&conn, &user, "runner", &review(4)).unwrap();
        let err = create_review(&conn, &user, "runner", &review(3)).unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }

    #[test]
    fn rating_bounds_and_title_length() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        fixtures::product(&conn, cat.id, "Runner", 1, 1, None);
        let input = ReviewInput {
            rating: Some(6),
            title: Some("x".repeat(121)),
            content: None,
        };
        let ShopError::Validation(fields) = create_review(&conn, &user, "runner", &input).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(fields.contains("rating"));
        assert!(fields.contains("title"));
    }

    #[test]
    fn inactive_product_cannot_be_reviewed() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        let mut product = fixtures::product(&conn, cat.id, "Runner", 1, 1, None);
        product.status = ProductStatus::Archived;
        db::update_product(&conn, &product).unwrap();
        let err = create_review(&conn, &user, "runner", &review(5)).unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }

    #[test]
    fn purchase_marks_review_verified() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        let product = fixtures::product(&conn, cat.id, "Runner", 1_000, 5, None);
        let order = db::insert_order(
            &conn,
            &db::NewOrder {
                user_id: Some(user.id),
                status: OrderStatus::Paid,
                subtotal: Money(1_000),
                discount: Money::ZERO,
                tax: Money::ZERO,
                shipping: Money::ZERO,
                total: Money(1_000),
            },
        )
        .unwrap();
        db::insert_order_item(&conn, order.id, &product.id, "Runner", Money(1_000), 1).unwrap();

        let outcome = create_review(&conn, &user, "runner", &review(5)).unwrap();
        assert!(outcome.review.unwrap().is_verified_purchase);
    }

    #[test]
    fn only_author_or_staff_delete() {
        let conn = open_memory_database().unwrap();
        let author = fixtures::user(&conn, "budi", false);
        let other = fixtures::user(&conn, "sari", false);
        let staff = fixtures::user(&conn, "admin", true);
        let cat = fixtures::category(&conn, "Shoes");
        fixtures::product(&conn, cat.id, "Runner", 1, 1, None);
        let id = create_review(&conn, &author, "runner", &review(5)).unwrap().review.unwrap().id;

        let err = delete_review(&conn, &viewer(&conn, &other), &id).unwrap_err();
        assert!(matches!(err, ShopError::Forbidden(_)));
        delete_review(&conn, &viewer(&conn, &staff), &id).unwrap();
        assert!(matches!(
            delete_review(&conn, &viewer(&conn, &author), &id),
            Err(ShopError::NotFound(_))
        ));
    }
}
