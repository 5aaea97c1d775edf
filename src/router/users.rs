//! Current account.

use axum::{Extension, Json};

use crate::account::Account;

/// `GET /users/@me`.
pub async fn me(Extension(account): Extension<Account>) -> Json<Account> {
    Json(account)
}
