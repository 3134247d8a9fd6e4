use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
            ResetPasswordRequest, SendOtpRequest, SessionResponse, SocialLoginRequest,
            VerifyOtpRequest,
        },
        jwt::AuthUser,
        repo::User,
        service::{self, LoginOutcome},
    },
    error::AppError,
    response::ApiResponse,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/login", post(login))
        .route("/auth/social-login", post(social_login))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh-tokens", post(refresh_tokens))
        .route("/auth/reset-password", put(reset_password))
        .route("/auth/change-password", put(change_password))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), AppError> {
    service::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::message("OTP sent to your email")),
    ))
}

#[instrument(skip(state, payload))]
async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let session = service::verify_otp(&state, payload).await?;
    Ok(Json(ApiResponse::ok("OTP verified successfully", session)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    match service::login(&state, payload).await? {
        LoginOutcome::VerificationRequired => Ok(Json(ApiResponse {
            success: true,
            message: "OTP sent to your email".into(),
            data: None,
        })),
        LoginOutcome::Session(session) => {
            Ok(Json(ApiResponse::ok("Login successfully", session)))
        }
    }
}

#[instrument(skip(state, payload))]
async fn social_login(
    State(state): State<AppState>,
    Json(payload): Json<SocialLoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let session = service::social_login(&state, payload).await?;
    Ok(Json(ApiResponse::ok("Login successfully", session)))
}

#[instrument(skip(state, payload))]
async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    service::send_otp(&state, &payload.email).await?;
    Ok(Json(ApiResponse::message("OTP sent to your email")))
}

#[instrument(skip(state, payload))]
async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    service::logout(&state, &payload.refresh_token).await?;
    Ok(Json(ApiResponse::message("Logout successfully")))
}

#[instrument(skip(state, payload))]
async fn refresh_tokens(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let session = service::refresh_tokens(&state, &payload.refresh_token).await?;
    Ok(Json(ApiResponse::ok("Tokens refreshed", session)))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    service::reset_password(&state, payload).await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    service::change_password(&state, user_id, payload).await?;
    Ok(Json(ApiResponse::message("Password changed successfully")))
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = service::me(&state, user_id).await?;
    Ok(Json(ApiResponse::ok("Profile", user)))
}
