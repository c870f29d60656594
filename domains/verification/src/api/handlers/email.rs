//! Email verification API handlers
//!
//! Implements:
//! - POST /api/email/verify: Mail a single-use verification link to the caller
//! - GET /api/email/callback: Redeem the link and update the role connection

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use memberlink_common::{Result, ValidatedJson, ValidatedQuery};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::middleware::{AuthUser, VerificationState};
use crate::domain::entities::RoleConnectionMetadata;

/// Request for starting an email verification
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    /// Address the caller claims to own
    #[validate(email)]
    pub email: String,
}

/// Response for an accepted verification request.
///
/// The token itself only travels by email.
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub status: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters of the mailed callback link
#[derive(Debug, Deserialize, Validate)]
pub struct CallbackQuery {
    #[validate(length(min = 1, max = 256))]
    pub token: String,
}

/// Request a verification email
///
/// **POST /api/email/verify**
pub async fn request_verification(
    AuthUser(auth_context): AuthUser,
    State(state): State<VerificationState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<(StatusCode, Json<VerifyEmailResponse>)> {
    tracing::info!(user_id = %auth_context.user_id, "Verification requested");

    let issued = state.service.issue(&req.email, &auth_context.user_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(VerifyEmailResponse {
            status: "sent",
            expires_at: issued.expires_at,
        }),
    ))
}

/// Redeem a verification link
///
/// **GET /api/email/callback?token=…**
///
/// Returns the metadata that was pushed to the caller's role connection.
pub async fn verification_callback(
    AuthUser(auth_context): AuthUser,
    State(state): State<VerificationState>,
    ValidatedQuery(query): ValidatedQuery<CallbackQuery>,
) -> Result<Json<RoleConnectionMetadata>> {
    let metadata = state
        .service
        .redeem(&query.token, &auth_context.user_id)
        .await?;

    Ok(Json(metadata))
}
