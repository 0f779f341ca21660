use axum::{extract::State, response::Json};

use crate::{
    models::{Viewer, Wallet},
    ApiResponse, ApiResult, AppState,
};

/// The caller's balance and ledger
pub async fn get_wallet(State(state): State<AppState>, viewer: Viewer) -> ApiResult<Wallet> {
    Ok(Json(ApiResponse::success(
        state.services.wallets.get_wallet(&viewer.user_id),
    )))
}
