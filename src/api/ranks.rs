// src/api/ranks.rs

use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::api::auth::AuthUser;
use crate::error::ShopError;
use crate::ranks;
use crate::AppState;

/// Rank reads recompute from the order store, so the answer is always
/// consistent with delivered orders even if a trigger was missed.
#[get("/ranks/my-rank")]
pub async fn my_rank(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ShopError> {
    let summary = ranks::recalculate(&state.pool, &user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "rank": summary })))
}
