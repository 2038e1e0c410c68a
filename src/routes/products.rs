/// Product listing handlers.
///
/// Straightforward data access: listings are created and updated as JSON,
/// images are attached one at a time as raw bodies passed through to the
/// blob store (at most 5 per listing). No search or ranking here.

use actix_web::{http::header::CONTENT_TYPE, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::blob_client::{BlobClient, PRODUCT_TRANSFORM};
use crate::error::AppError;
use crate::users::Profile;
use crate::validators::{is_valid_category, ValidationError};

const MAX_IMAGES_PER_PRODUCT: i64 = 5;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub purchasing_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        // page is client-controlled; saturate rather than overflow
        self.page
            .unwrap_or(1)
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.limit())
    }
}

#[derive(Serialize)]
pub struct ListingSummary {
    pub id: Uuid,
    pub name: String,
    pub thumbnail: Option<String>,
    pub price: f64,
}

type ProductRow = (
    Uuid,
    Uuid,
    String,
    String,
    f64,
    String,
    DateTime<Utc>,
    Option<String>,
);

fn validate_listing(form: &ProductRequest) -> Result<String, AppError> {
    if form.name.trim().is_empty() {
        return Err(AppError::Validation(ValidationError::EmptyField("Name")));
    }
    if form.description.trim().is_empty() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "Description",
        )));
    }
    if form.price <= 0.0 {
        return Err(AppError::Validation(ValidationError::NotPositive("Price")));
    }
    Ok(is_valid_category(&form.category)?)
}

/// POST /product/add-new-product [access token required]
pub async fn add_new_product(
    form: web::Json<ProductRequest>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let category = validate_listing(&form)?;
    let product_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO products
            (id, owner_id, name, description, price, category, purchasing_date, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(product_id)
    .bind(profile.id)
    .bind(form.name.trim())
    .bind(form.description.trim())
    .bind(form.price)
    .bind(&category)
    .bind(form.purchasing_date)
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(product_id = %product_id, owner_id = %profile.id, "New product listed");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Added new product!",
        "id": product_id
    })))
}

/// POST /product/update-product/{id} [access token required]
///
/// Only the owner may update a listing; a foreign or unknown id reads as
/// "not found".
pub async fn update_product(
    path: web::Path<Uuid>,
    form: web::Json<ProductRequest>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let category = validate_listing(&form)?;

    let result = sqlx::query(
        r#"
        UPDATE products
        SET name = $1, description = $2, price = $3, category = $4,
            purchasing_date = $5, updated_at = $6
        WHERE id = $7 AND owner_id = $8
        "#,
    )
    .bind(form.name.trim())
    .bind(form.description.trim())
    .bind(form.price)
    .bind(&category)
    .bind(form.purchasing_date)
    .bind(Utc::now())
    .bind(path.into_inner())
    .bind(profile.id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Product".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Product updated successfully!"
    })))
}

/// POST /product/add-image/{id} [access token required]
///
/// Raw image body passed through to the blob store. The first image becomes
/// the thumbnail; at most 5 images per listing.
pub async fn add_product_image(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Bytes,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
    blob: web::Data<BlobClient>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "image file",
        )));
    }

    let owned = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT thumbnail FROM products WHERE id = $1 AND owner_id = $2",
    )
    .bind(product_id)
    .bind(profile.id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let (count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM product_images WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(pool.get_ref())
    .await?;

    if count >= MAX_IMAGES_PER_PRODUCT {
        return Err(AppError::Validation(ValidationError::TooLong(
            "Images",
            MAX_IMAGES_PER_PRODUCT as usize,
        )));
    }

    let uploaded = blob
        .upload(body.to_vec(), &content_type, PRODUCT_TRANSFORM)
        .await?;

    sqlx::query("INSERT INTO product_images (product_id, url, blob_id) VALUES ($1, $2, $3)")
        .bind(product_id)
        .bind(&uploaded.url)
        .bind(&uploaded.id)
        .execute(pool.get_ref())
        .await?;

    if owned.0.is_none() {
        sqlx::query("UPDATE products SET thumbnail = $1, updated_at = $2 WHERE id = $3")
            .bind(&uploaded.url)
            .bind(Utc::now())
            .bind(product_id)
            .execute(pool.get_ref())
            .await?;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Image added successfully!",
        "image": { "url": uploaded.url, "id": uploaded.id }
    })))
}

/// DELETE /product/delete-product/{id} [access token required]
pub async fn delete_product(
    path: web::Path<Uuid>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
    blob: web::Data<BlobClient>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let blob_ids = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT i.blob_id FROM product_images i
        JOIN products p ON p.id = i.product_id
        WHERE p.id = $1 AND p.owner_id = $2
        "#,
    )
    .bind(product_id)
    .bind(profile.id)
    .fetch_all(pool.get_ref())
    .await?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1 AND owner_id = $2")
        .bind(product_id)
        .bind(profile.id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Product".to_string()));
    }

    // Stored blobs are removed best-effort; an orphaned blob is not worth a 500
    for (blob_id,) in blob_ids {
        if let Err(e) = blob.destroy(&blob_id).await {
            tracing::warn!(blob_id = %blob_id, error = %e, "Failed to destroy product image blob");
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Product removed successfully!"
    })))
}

/// DELETE /product/delete-product-image/{product_id}/{image_id} [access token required]
pub async fn delete_product_image(
    path: web::Path<(Uuid, String)>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
    blob: web::Data<BlobClient>,
) -> Result<HttpResponse, AppError> {
    let (product_id, image_id) = path.into_inner();

    let product = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT thumbnail FROM products WHERE id = $1 AND owner_id = $2",
    )
    .bind(product_id)
    .bind(profile.id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let removed = sqlx::query_as::<_, (String,)>(
        "DELETE FROM product_images WHERE product_id = $1 AND blob_id = $2 RETURNING url",
    )
    .bind(product_id)
    .bind(&image_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Image".to_string()))?;

    // Repoint the thumbnail if it was the deleted image
    if product.0.as_deref() == Some(removed.0.as_str()) {
        sqlx::query(
            r#"
            UPDATE products
            SET thumbnail = (SELECT url FROM product_images WHERE product_id = $1 LIMIT 1),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .bind(Utc::now())
        .execute(pool.get_ref())
        .await?;
    }

    if let Err(e) = blob.destroy(&image_id).await {
        tracing::warn!(blob_id = %image_id, error = %e, "Failed to destroy image blob");
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Image removed successfully!"
    })))
}

/// GET /product/get-product-detail/{id}
///
/// Listing with its images and a public seller projection.
pub async fn get_product_detail(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let product = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT id, owner_id, name, description, price, category, purchasing_date, thumbnail
        FROM products WHERE id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let images = sqlx::query_as::<_, (String,)>(
        "SELECT url FROM product_images WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_all(pool.get_ref())
    .await?;

    let seller = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
        "SELECT id, name, avatar_url FROM users WHERE id = $1",
    )
    .bind(product.1)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "product": {
            "id": product.0,
            "name": product.2,
            "description": product.3,
            "price": product.4,
            "category": product.5,
            "date": product.6,
            "thumbnail": product.7,
            "image": images.into_iter().map(|(url,)| url).collect::<Vec<_>>(),
            "seller": {
                "id": seller.0,
                "name": seller.1,
                "avatar": seller.2,
            }
        }
    })))
}

type SummaryRow = (Uuid, String, Option<String>, f64);

fn summaries(rows: Vec<SummaryRow>) -> Vec<ListingSummary> {
    rows.into_iter()
        .map(|(id, name, thumbnail, price)| ListingSummary {
            id,
            name,
            thumbnail,
            price,
        })
        .collect()
}

/// GET /product/get-product-by-category/{category}?page=&limit=
pub async fn get_product_by_category(
    path: web::Path<String>,
    query: web::Query<Pagination>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let category = is_valid_category(&path.into_inner())?;

    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT id, name, thumbnail, price FROM products
        WHERE category = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&category)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "products": summaries(rows) })))
}

/// GET /product/latest?page=&limit=
pub async fn get_latest_products(
    query: web::Query<Pagination>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT id, name, thumbnail, price FROM products
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "products": summaries(rows) })))
}

/// GET /product/get-products [access token required]
///
/// The caller's own listings.
pub async fn get_products(
    query: web::Query<Pagination>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT id, name, thumbnail, price FROM products
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(profile.id)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "products": summaries(rows) })))
}
