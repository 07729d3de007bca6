use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ApiResponse;

/// Standard created response
pub fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Body returned by deletes and bulk updates
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AffectedRows {
    pub affected: u64,
}

impl AffectedRows {
    pub fn one() -> Self {
        Self { affected: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}
