use axum::{extract::State, response::Json};
use chrono::Utc;

use crate::{
    models::{Coupon, Viewer},
    ApiResponse, ApiResult, AppState,
};

pub async fn list_coupons(State(state): State<AppState>, _viewer: Viewer) -> ApiResult<Vec<Coupon>> {
    Ok(Json(ApiResponse::success(
        state.services.coupons.list_offered(Utc::now()),
    )))
}
