use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    db::Db,
    error::AppError,
    middleware::CurrentAccount,
    models::{
        AccountView, Claims, LoginRequest, ProfileResponse, RegisterRequest, TelegramUpdate, Token,
    },
    store::{accounts, tasks},
};

/// Validación mínima de forma, sin regex: algo antes y después de la arroba,
/// con un punto en el dominio.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_birth_date(raw: &str, today: NaiveDate) -> Result<(), AppError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Formato de fecha inválido".to_string()))?;
    if date > today {
        return Err(AppError::Validation(
            "La fecha de nacimiento no puede ser futura".to_string(),
        ));
    }
    if today.years_since(date).unwrap_or(0) < 13 {
        return Err(AppError::Validation(
            "Debes tener al menos 13 años para registrarte".to_string(),
        ));
    }
    Ok(())
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AppError> {
    let email = payload.email.trim();
    let username = payload.username.trim();

    if email.is_empty() || username.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Por favor completa todos los campos obligatorios".to_string(),
        ));
    }
    if let Some(confirm) = &payload.confirm_password {
        if confirm != &payload.password {
            return Err(AppError::Validation(
                "Las contraseñas no coinciden".to_string(),
            ));
        }
    }
    if !looks_like_email(email) {
        return Err(AppError::Validation(
            "Por favor ingresa un email válido".to_string(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "La contraseña debe tener al menos 6 caracteres".to_string(),
        ));
    }
    if username.len() < 3 {
        return Err(AppError::Validation(
            "El nombre de usuario debe tener al menos 3 caracteres".to_string(),
        ));
    }
    if let Some(birth_date) = payload.birth_date.as_deref().filter(|s| !s.is_empty()) {
        validate_birth_date(birth_date, Utc::now().date_naive())?;
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email or username already taken")
    )
)]
pub async fn register(
    State(db): State<Db>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    validate_registration(&payload)?;

    let account_id = accounts::register(&db, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": account_id.to_hex(),
            "message": "Usuario registrado exitosamente",
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Token),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn login(
    State(db): State<Db>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Token>, AppError> {
    let identifier = payload.username_or_email.trim();
    if identifier.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Por favor completa todos los campos".to_string(),
        ));
    }

    let account = accounts::authenticate(&db, identifier, &payload.password).await?;

    let secret = env::var("SECRET_KEY").unwrap_or_else(|_| "secret".to_string());
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AppError::Auth("Clock error".to_string()))?
        .as_secs() as usize
        + 60 * 30; // 30 minutos

    let claims = Claims {
        sub: account.id.to_hex(),
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Token creation failed: {}", e)))?;

    Ok(Json(Token {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Account profile with task statistics", body = ProfileResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn profile(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<ProfileResponse>, AppError> {
    let stats = tasks::statistics(&db, account.id).await;
    Ok(Json(ProfileResponse {
        account: AccountView::from(account),
        stats,
    }))
}

#[utoipa::path(
    put,
    path = "/auth/telegram",
    request_body = TelegramUpdate,
    responses(
        (status = 200, description = "Notification channel stored"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn set_telegram(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Json(payload): Json<TelegramUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chat_id = payload.telegram_chat_id.trim();
    if chat_id.is_empty() {
        return Err(AppError::Validation(
            "El identificador de chat es obligatorio".to_string(),
        ));
    }

    if !accounts::set_telegram_chat(&db, account.id, chat_id).await? {
        return Err(AppError::NotFound("Usuario no encontrado".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("alice@x.com"));
        assert!(looks_like_email("a.b+c@sub.dominio.es"));
        assert!(!looks_like_email("alice"));
        assert!(!looks_like_email("@x.com"));
        assert!(!looks_like_email("alice@sindominio"));
        assert!(!looks_like_email("alice@.com"));
        assert!(!looks_like_email("ali ce@x.com"));
    }

    #[test]
    fn birth_date_rules() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert!(validate_birth_date("1990-05-01", today).is_ok());
        assert!(validate_birth_date("2013-08-29", today).is_ok());
        // Futura o menor de 13
        assert!(validate_birth_date("2027-01-01", today).is_err());
        assert!(validate_birth_date("2015-06-15", today).is_err());
        assert!(validate_birth_date("15/06/1990", today).is_err());
    }

    fn base_request() -> RegisterRequest {
        RegisterRequest {
            email: "alice@x.com".to_string(),
            username: "alice".to_string(),
            password: "secret1".to_string(),
            confirm_password: Some("secret1".to_string()),
            birth_date: None,
        }
    }

    #[test]
    fn registration_validation_accepts_good_input() {
        assert!(validate_registration(&base_request()).is_ok());
    }

    #[test]
    fn registration_validation_rejects_bad_input() {
        let mut mismatch = base_request();
        mismatch.confirm_password = Some("otra".to_string());
        assert!(validate_registration(&mismatch).is_err());

        let mut short_password = base_request();
        short_password.password = "abc".to_string();
        short_password.confirm_password = Some("abc".to_string());
        assert!(validate_registration(&short_password).is_err());

        let mut short_username = base_request();
        short_username.username = "al".to_string();
        assert!(validate_registration(&short_username).is_err());

        let mut empty_email = base_request();
        empty_email.email = "  ".to_string();
        assert!(validate_registration(&empty_email).is_err());
    }
}
