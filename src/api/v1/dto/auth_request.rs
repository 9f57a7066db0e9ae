/*
 * Responsibility
 * - login / register の request DTO
 * - validate() で送信前の形式チェック (サーバー往復を省く)
 */
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !looks_like_email(&self.email) {
            return Err("email is invalid");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !looks_like_email(&self.email) {
            return Err("email is invalid");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        if self.password != self.password_confirm {
            return Err("passwords do not match");
        }
        Ok(())
    }
}

// The backend does the real check; this only catches typos early.
fn looks_like_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
