//! Pieces shared by the category and material services. Both group products
//! through a nullable foreign key on `products`, so the helpers take that
//! column.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
};

pub fn required_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    Ok(name.to_string())
}

pub async fn count_products<C: ConnectionTrait>(db: &C, key: ProdCol, id: Uuid) -> AppResult<i64> {
    let count = Products::find().filter(key.eq(id)).count(db).await?;
    Ok(count as i64)
}

/// Product counts per id, in one grouped query. Ids without products are absent.
pub async fn product_counts<C: ConnectionTrait>(
    db: &C,
    key: ProdCol,
    ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Option<Uuid>, i64)> = Products::find()
        .select_only()
        .column(key)
        .column_as(Expr::col(ProdCol::Id).count(), "product_count")
        .filter(key.is_in(ids))
        .group_by(key)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect())
}

/// Refuses to delete a `label` that products still point at.
pub async fn ensure_no_products<C: ConnectionTrait>(
    db: &C,
    key: ProdCol,
    id: Uuid,
    label: &str,
) -> AppResult<()> {
    let count = count_products(db, key, id).await?;
    if count > 0 {
        return Err(AppError::BadRequest(format!(
            "Cannot delete {label} with {count} existing product(s)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(required_name("  Gold ").unwrap(), "Gold");
        assert!(matches!(
            required_name("   "),
            Err(AppError::BadRequest(msg)) if msg == "Name is required"
        ));
    }
}
