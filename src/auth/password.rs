use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// `password_hash::Error` is not `std::error::Error`, so it is logged here
/// and carried on as a plain message.
fn argon2_error(context: &'static str) -> impl Fn(argon2::password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, "argon2 {context} error");
        anyhow::anyhow!("{context}: {e}")
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon2_error("hash"))?;
    Ok(hash.to_string())
}

/// Constant-time comparison via argon2's verifier.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(argon2_error("parse hash"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
