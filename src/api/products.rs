// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Product catalog (read-only).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{Product, ProductRepository},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
}

/// List products open for new policies.
#[utoipa::path(
    get,
    path = "/v1/products",
    tag = "Products",
    responses(
        (status = 200, description = "Active products", body = ProductListResponse)
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let products = ProductRepository::new(&state.db).list(true)?;
    let total = products.len();
    Ok(Json(ProductListResponse { products, total }))
}

/// Get one product.
#[utoipa::path(
    get,
    path = "/v1/products/{product_id}",
    tag = "Products",
    params(("product_id" = String, Path, description = "Product identifier")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Unknown product")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    ProductRepository::new(&state.db)
        .get(&product_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product {product_id} not found")))
}
