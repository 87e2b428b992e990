//! Catalog: categories and products.
//!
//! Product stock and rating fields are owned by the order and review flows
//! respectively; the admin edit path only sets stock wholesale (and its
//! low-stock flag with it).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::inventory::is_low_stock;
use crate::models::{Category, Product, ProductImage, Variant};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    user.require_admin()?;
    if req.name.trim().is_empty() || req.slug.trim().is_empty() {
        return Err(ApiError::InvalidInput("name and slug are required".into()));
    }
    let category: Category = sqlx::query_as(
        "INSERT INTO categories (id, name, slug, description, created_at) \
         VALUES ($1, $2, $3, $4, NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(req.name.trim())
    .bind(req.slug.trim())
    .bind(&req.description)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = sqlx::query_as("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub keyword: Option<String>,
    pub category: Option<Uuid>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Json<ProductPage>> {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(10).clamp(1, 100);

    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
    let mut count: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM products WHERE TRUE");
    for builder in [&mut query, &mut count] {
        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let pattern = format!("%{}%", keyword.trim());
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR brand ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = filter.category {
            builder.push(" AND category_id = ").push_bind(category);
        }
        if let Some(brand) = &filter.brand {
            builder.push(" AND brand = ").push_bind(brand.clone());
        }
        if let Some(min) = filter.min_price {
            builder.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            builder.push(" AND price <= ").push_bind(max);
        }
        if let Some(featured) = filter.featured {
            builder.push(" AND featured = ").push_bind(featured);
        }
    }

    let order_by = match filter.sort.as_deref() {
        Some("price_asc") => " ORDER BY price ASC",
        Some("price_desc") => " ORDER BY price DESC",
        Some("rating") => " ORDER BY ratings DESC",
        _ => " ORDER BY created_at DESC",
    };
    query
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(((page - 1) * limit) as i64);

    let products: Vec<Product> = query.build_query_as().fetch_all(&state.db).await?;
    let (total,): (i64,) = count.build_query_as().fetch_one(&state.db).await?;

    Ok(Json(ProductPage {
        products,
        page,
        limit,
        total,
        total_pages: (total + limit as i64 - 1) / limit as i64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FeaturedParams {
    pub limit: Option<u32>,
}

pub async fn featured_products(
    State(state): State<AppState>,
    Query(params): Query<FeaturedParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let limit = params.limit.unwrap_or(8).clamp(1, 50);
    let products = sqlx::query_as(
        "SELECT * FROM products WHERE featured ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit as i64)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    product.map(Json).ok_or_else(|| ApiError::not_found("Product"))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Uuid,
    pub stock: i32,
    pub brand: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// Image descriptors already placed in object storage by the upload
    /// pipeline.
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub featured: bool,
}

pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    user.require_admin()?;
    if req.name.trim().is_empty() || req.description.trim().is_empty() || req.brand.trim().is_empty() {
        return Err(ApiError::InvalidInput("missing required product fields".into()));
    }
    if req.price < Decimal::ZERO || req.stock < 0 {
        return Err(ApiError::InvalidInput("price and stock must be non-negative".into()));
    }

    let category: Option<Category> = sqlx::query_as("SELECT * FROM categories WHERE id = $1")
        .bind(req.category_id)
        .fetch_optional(&state.db)
        .await?;
    if category.is_none() {
        return Err(ApiError::not_found("Category"));
    }

    let product: Product = sqlx::query_as(
        "INSERT INTO products \
             (id, name, description, price, category_id, stock, brand, variants, images, \
              ratings, num_reviews, featured, low_stock, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, $10, $11, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(req.price)
    .bind(req.category_id)
    .bind(req.stock)
    .bind(req.brand.trim())
    .bind(Jsonb(req.variants))
    .bind(Jsonb(req.images))
    .bind(req.featured)
    .bind(is_low_stock(req.stock))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
    pub brand: Option<String>,
    pub variants: Option<Vec<Variant>>,
    pub images: Option<Vec<ProductImage>>,
    pub featured: Option<bool>,
}

pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    user.require_admin()?;
    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Product"))?;

    if let Some(stock) = req.stock {
        if stock < 0 {
            return Err(ApiError::InvalidInput("stock must be non-negative".into()));
        }
    }

    let stock = req.stock.unwrap_or(existing.stock);
    let product: Product = sqlx::query_as(
        "UPDATE products SET \
             name = $2, description = $3, price = $4, category_id = $5, stock = $6, \
             brand = $7, variants = $8, images = $9, featured = $10, low_stock = $11, \
             updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.name.unwrap_or(existing.name))
    .bind(req.description.unwrap_or(existing.description))
    .bind(req.price.unwrap_or(existing.price))
    .bind(req.category_id.unwrap_or(existing.category_id))
    .bind(stock)
    .bind(req.brand.unwrap_or(existing.brand))
    .bind(Jsonb(req.variants.unwrap_or(existing.variants.0)))
    .bind(Jsonb(req.images.unwrap_or(existing.images.0)))
    .bind(req.featured.unwrap_or(existing.featured))
    .bind(is_low_stock(stock))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product"));
    }
    Ok(Json(serde_json::json!({ "message": "Product deleted successfully" })))
}
