use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            normalize_email, validate_password, ChangePasswordRequest, LoginRequest,
            RegisterRequest, ResetPasswordRequest, SessionResponse, SocialLoginRequest,
            VerifyOtpRequest,
        },
        password::{hash_password, verify_password},
        repo::{NewUser, Role, User},
        tokens::{self, TokenKind},
    },
    error::{AppError, AppResult},
    mailer::TemplateEmail,
    state::AppState,
};

const OTP_EMAIL_TEMPLATE: &str = "otp-email";

/// Outcome of a login attempt: unverified accounts get a fresh OTP instead
/// of a session.
#[derive(Debug)]
pub enum LoginOutcome {
    VerificationRequired,
    Session(SessionResponse),
}

fn ensure_not_blocked(user: &User) -> AppResult<()> {
    if user.is_block {
        return Err(AppError::Unauthorized("Your account is blocked by admin"));
    }
    Ok(())
}

async fn active_user_by_email(state: &AppState, email: &str) -> AppResult<User> {
    state
        .users
        .find_active_by_email(email)
        .await?
        .ok_or(AppError::NotFound("Email not found"))
}

/// Issues an OTP for the user and mails it. The plaintext code only travels
/// through the mailer.
async fn dispatch_otp(state: &AppState, user: &User, subject: &str) -> AppResult<()> {
    let otp = tokens::issue_otp(state, user.id).await?;
    let sent = state
        .mailer
        .send_template(TemplateEmail {
            to: user.email.clone(),
            subject: subject.to_string(),
            template: OTP_EMAIL_TEMPLATE.to_string(),
            data: json!({ "name": user.name, "otp": otp }),
        })
        .await;
    if !sent {
        return Err(AppError::DeliveryFailed("Verification email could not be sent"));
    }
    Ok(())
}

/// Checks and consumes the user's OTP. Consumption makes each code
/// single-use: a second attempt with the same code fails with not-found.
async fn consume_otp(state: &AppState, user: &User, otp: &str) -> AppResult<()> {
    let token = state
        .tokens
        .find_for_user(user.id, TokenKind::Otp)
        .await?
        .ok_or(AppError::NotFound("OTP not found"))?;
    if token.token != otp {
        return Err(AppError::Unauthorized("OTP is invalid"));
    }
    if token.expires_at <= time::OffsetDateTime::now_utc() {
        return Err(AppError::Unauthorized("OTP is expired"));
    }
    state.tokens.delete_by_id(token.id).await?;
    Ok(())
}

/// Creates the account and mails the verification OTP. When the mail cannot
/// be delivered the just-created user and token are rolled back; this is a
/// compensating delete, not a transaction.
pub async fn register(state: &AppState, payload: RegisterRequest) -> AppResult<User> {
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;

    if state.users.find_active_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already taken"));
    }

    let user = state
        .users
        .create(NewUser {
            email,
            name: payload.name,
            password_hash: Some(hash_password(&payload.password)?),
            role: Role::User,
            is_email_verified: false,
            social_id: None,
            social_type: None,
        })
        .await?;

    if let Err(e) = dispatch_otp(state, &user, "Register!").await {
        warn!(user_id = %user.id, "otp email failed; rolling back registration");
        state.users.hard_delete(user.id).await?;
        state.tokens.delete_for_user(user.id).await?;
        return Err(e);
    }

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Verifies the OTP, marks the email verified (idempotent) and opens a
/// session.
pub async fn verify_otp(state: &AppState, payload: VerifyOtpRequest) -> AppResult<SessionResponse> {
    let email = normalize_email(&payload.email)?;
    let user = active_user_by_email(state, &email).await?;
    ensure_not_blocked(&user)?;

    consume_otp(state, &user, &payload.otp).await?;

    let user = if user.is_email_verified {
        user
    } else {
        state
            .users
            .set_email_verified(user.id)
            .await?
            .ok_or(AppError::NotFound("Email not found"))?
    };

    let tokens = tokens::issue_auth_tokens(state, &user).await?;
    info!(user_id = %user.id, "otp verified");
    Ok(SessionResponse { user, tokens })
}

/// Login is gated on verification: unverified accounts get a re-issued OTP
/// and never a session.
pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<LoginOutcome> {
    let email = normalize_email(&payload.email)?;
    let user = active_user_by_email(state, &email).await?;
    ensure_not_blocked(&user)?;

    if !user.is_email_verified {
        dispatch_otp(state, &user, "Login!").await?;
        return Ok(LoginOutcome::VerificationRequired);
    }

    let password_ok = match &user.password_hash {
        Some(hash) => verify_password(&payload.password, hash)?,
        None => false,
    };
    if !password_ok {
        return Err(AppError::Unauthorized("Password is wrong"));
    }

    let tokens = tokens::issue_auth_tokens(state, &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(LoginOutcome::Session(SessionResponse { user, tokens }))
}

/// Upserts the account by email, marks it verified, and issues tokens
/// without a password check.
pub async fn social_login(
    state: &AppState,
    payload: SocialLoginRequest,
) -> AppResult<SessionResponse> {
    let email = normalize_email(&payload.email)?;

    let user = match state.users.find_active_by_email(&email).await? {
        Some(existing) => {
            ensure_not_blocked(&existing)?;
            state
                .users
                .set_social(existing.id, &payload.social_id, &payload.social_type)
                .await?
                .ok_or(AppError::NotFound("Email not found"))?
        }
        None => {
            let name = payload
                .name
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            state
                .users
                .create(NewUser {
                    email,
                    name,
                    password_hash: None,
                    role: Role::User,
                    is_email_verified: true,
                    social_id: Some(payload.social_id),
                    social_type: Some(payload.social_type),
                })
                .await?
        }
    };

    let tokens = tokens::issue_auth_tokens(state, &user).await?;
    info!(user_id = %user.id, "social login");
    Ok(SessionResponse { user, tokens })
}

/// Re-issues and re-mails an OTP for an existing account.
pub async fn send_otp(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email)?;
    let user = active_user_by_email(state, &email).await?;
    ensure_not_blocked(&user)?;
    dispatch_otp(state, &user, "Verify Mail!").await
}

/// Requires a live refresh token, then drops every token the user holds.
pub async fn logout(state: &AppState, refresh_token: &str) -> AppResult<()> {
    let token = state
        .tokens
        .find_valid(refresh_token, TokenKind::Refresh)
        .await?
        .ok_or(AppError::NotFound("Refresh token not found"))?;
    tokens::revoke_all(state, token.user_id).await?;
    info!(user_id = %token.user_id, "user logged out");
    Ok(())
}

/// Rotates the token pair: the presented refresh token is consumed and a
/// fresh pair is issued.
pub async fn refresh_tokens(state: &AppState, refresh_token: &str) -> AppResult<SessionResponse> {
    let token = tokens::verify_stored(state, refresh_token, TokenKind::Refresh).await?;
    let user = state
        .users
        .find_by_id(token.user_id)
        .await?
        .ok_or(AppError::Unauthorized("User no longer exists"))?;
    ensure_not_blocked(&user)?;

    state.tokens.delete_by_id(token.id).await?;
    let tokens = tokens::issue_auth_tokens(state, &user).await?;
    Ok(SessionResponse { user, tokens })
}

/// Resets the password with OTP proof and invalidates prior sessions.
pub async fn reset_password(state: &AppState, payload: ResetPasswordRequest) -> AppResult<()> {
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let user = active_user_by_email(state, &email).await?;
    ensure_not_blocked(&user)?;

    consume_otp(state, &user, &payload.otp).await?;

    let hash = hash_password(&payload.password)?;
    state.users.set_password_hash(user.id, &hash).await?;
    tokens::revoke_all(state, user.id).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Changes the password with current-password proof.
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    payload: ChangePasswordRequest,
) -> AppResult<()> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound("Email not found"))?;
    ensure_not_blocked(&user)?;
    validate_password(&payload.new_password)?;

    let old_ok = match &user.password_hash {
        Some(hash) => verify_password(&payload.old_password, hash)?,
        None => false,
    };
    if !old_ok {
        return Err(AppError::Unauthorized("Password is wrong"));
    }

    let hash = hash_password(&payload.new_password)?;
    state.users.set_password_hash(user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

/// Current user's profile.
pub async fn me(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound("Email not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestState;

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: "Jane".into(),
            password: "abcd1234".into(),
        }
    }

    async fn registered_user(ts: &TestState, email: &str) -> (User, String) {
        let user = register(&ts.state, register_request(email))
            .await
            .expect("register");
        let otp = ts.mailer.last_otp().expect("otp in mail");
        (user, otp)
    }

    async fn verified_user(ts: &TestState, email: &str) -> User {
        let (_, otp) = registered_user(ts, email).await;
        verify_otp(
            &ts.state,
            VerifyOtpRequest {
                email: email.into(),
                otp,
            },
        )
        .await
        .expect("verify otp")
        .user
    }

    #[tokio::test]
    async fn register_rejects_taken_email() {
        let ts = TestState::new();
        registered_user(&ts, "jane@example.com").await;
        let err = register(&ts.state, register_request("jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_rolls_back_on_mail_failure() {
        let ts = TestState::new();
        ts.mailer.fail_next_sends();
        let err = register(&ts.state, register_request("jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailed(_)));

        // No user record survives, so the email stays reusable.
        assert!(ts
            .state
            .users
            .find_active_by_email("jane@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(ts.tokens.is_empty());
    }

    #[tokio::test]
    async fn verify_otp_is_single_use() {
        let ts = TestState::new();
        let (_, otp) = registered_user(&ts, "jane@example.com").await;

        let request = || VerifyOtpRequest {
            email: "jane@example.com".into(),
            otp: otp.clone(),
        };
        let session = verify_otp(&ts.state, request()).await.expect("first use");
        assert!(session.user.is_email_verified);

        let err = verify_otp(&ts.state, request()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn verify_otp_rejects_wrong_and_expired_codes() {
        let ts = TestState::new();
        let (user, otp) = registered_user(&ts, "jane@example.com").await;

        let err = verify_otp(
            &ts.state,
            VerifyOtpRequest {
                email: "jane@example.com".into(),
                otp: "000000".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        ts.tokens.expire_all_for(user.id);
        let err = verify_otp(
            &ts.state,
            VerifyOtpRequest {
                email: "jane@example.com".into(),
                otp,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_before_verification_reissues_otp_without_tokens() {
        let ts = TestState::new();
        registered_user(&ts, "jane@example.com").await;

        let outcome = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "abcd1234".into(),
            },
        )
        .await
        .expect("login");
        assert!(matches!(outcome, LoginOutcome::VerificationRequired));

        // Two OTP mails so far (register + login), no session tokens at all.
        assert_eq!(ts.mailer.sent_count(), 2);
        assert!(!ts.tokens.has_kind(TokenKind::Access));
        assert!(!ts.tokens.has_kind(TokenKind::Refresh));
    }

    #[tokio::test]
    async fn login_checks_password_after_verification() {
        let ts = TestState::new();
        verified_user(&ts, "jane@example.com").await;

        let err = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "wrong-pass1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let outcome = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "abcd1234".into(),
            },
        )
        .await
        .expect("login");
        assert!(matches!(outcome, LoginOutcome::Session(_)));
    }

    #[tokio::test]
    async fn blocked_accounts_fail_auth_operations() {
        let ts = TestState::new();
        let user = verified_user(&ts, "jane@example.com").await;
        ts.state.users.set_block(user.id, true).await.unwrap();

        let login_err = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "abcd1234".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(login_err, AppError::Unauthorized(_)));

        let send_err = send_otp(&ts.state, "jane@example.com").await.unwrap_err();
        assert!(matches!(send_err, AppError::Unauthorized(_)));

        let reset_err = reset_password(
            &ts.state,
            ResetPasswordRequest {
                email: "jane@example.com".into(),
                otp: "123456".into(),
                password: "newpass12".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(reset_err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn issuing_new_otp_supersedes_previous() {
        let ts = TestState::new();
        let (_, first_otp) = registered_user(&ts, "jane@example.com").await;

        send_otp(&ts.state, "jane@example.com").await.expect("resend");
        let second_otp = ts.mailer.last_otp().expect("second otp");

        if first_otp != second_otp {
            let err = verify_otp(
                &ts.state,
                VerifyOtpRequest {
                    email: "jane@example.com".into(),
                    otp: first_otp,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
        assert_eq!(ts.tokens.count_kind(TokenKind::Otp), 1);
    }

    #[tokio::test]
    async fn social_login_upserts_and_verifies() {
        let ts = TestState::new();
        let session = social_login(
            &ts.state,
            SocialLoginRequest {
                email: "sam@example.com".into(),
                name: Some("Sam".into()),
                social_id: "g-123".into(),
                social_type: "google".into(),
            },
        )
        .await
        .expect("social login");
        assert!(session.user.is_email_verified);
        assert!(session.user.password_hash.is_none());

        // Second login with the same email updates rather than duplicates.
        let again = social_login(
            &ts.state,
            SocialLoginRequest {
                email: "sam@example.com".into(),
                name: None,
                social_id: "g-456".into(),
                social_type: "google".into(),
            },
        )
        .await
        .expect("social login again");
        assert_eq!(again.user.id, session.user.id);
        assert_eq!(again.user.social_id.as_deref(), Some("g-456"));
    }

    #[tokio::test]
    async fn logout_requires_live_refresh_token_and_revokes_everything() {
        let ts = TestState::new();
        let user = verified_user(&ts, "jane@example.com").await;

        let err = logout(&ts.state, "no-such-token").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let outcome = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "abcd1234".into(),
            },
        )
        .await
        .expect("login");
        let LoginOutcome::Session(session) = outcome else {
            panic!("expected session");
        };

        logout(&ts.state, &session.tokens.refresh.token)
            .await
            .expect("logout");
        assert!(ts.tokens.count_for_user(user.id) == 0);
    }

    #[tokio::test]
    async fn refresh_rotates_the_pair() {
        let ts = TestState::new();
        verified_user(&ts, "jane@example.com").await;
        let outcome = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "abcd1234".into(),
            },
        )
        .await
        .expect("login");
        let LoginOutcome::Session(session) = outcome else {
            panic!("expected session");
        };

        let refreshed = refresh_tokens(&ts.state, &session.tokens.refresh.token)
            .await
            .expect("refresh");
        assert_ne!(
            refreshed.tokens.refresh.token,
            session.tokens.refresh.token
        );

        // The consumed refresh token is gone from the store.
        let err = refresh_tokens(&ts.state, &session.tokens.refresh.token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_password_requires_otp_and_invalidates_sessions() {
        let ts = TestState::new();
        let user = verified_user(&ts, "jane@example.com").await;

        send_otp(&ts.state, "jane@example.com").await.expect("otp");
        let otp = ts.mailer.last_otp().expect("otp");

        reset_password(
            &ts.state,
            ResetPasswordRequest {
                email: "jane@example.com".into(),
                otp,
                password: "newpass12".into(),
            },
        )
        .await
        .expect("reset");

        assert_eq!(ts.tokens.count_for_user(user.id), 0);

        let outcome = login(
            &ts.state,
            LoginRequest {
                email: "jane@example.com".into(),
                password: "newpass12".into(),
            },
        )
        .await
        .expect("login with new password");
        assert!(matches!(outcome, LoginOutcome::Session(_)));
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let ts = TestState::new();
        let user = verified_user(&ts, "jane@example.com").await;

        let err = change_password(
            &ts.state,
            user.id,
            ChangePasswordRequest {
                old_password: "wrong-pass1".into(),
                new_password: "newpass12".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        change_password(
            &ts.state,
            user.id,
            ChangePasswordRequest {
                old_password: "abcd1234".into(),
                new_password: "newpass12".into(),
            },
        )
        .await
        .expect("change password");
    }
}
