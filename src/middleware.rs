use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{
    db::Db,
    error::AppError,
    models::{Account, Claims},
    store::accounts,
};

pub struct CurrentAccount(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAccount
where
    Db: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Extraer el token del header Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Auth("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| AppError::Auth("Invalid Authorization header".to_string()))?;

        if !auth_header.starts_with("Bearer ") {
            return Err(AppError::Auth("Invalid token format".to_string()));
        }

        let token = &auth_header[7..];

        // 2. Decodificar el token; `sub` lleva el id de la cuenta
        let secret = std::env::var("SECRET_KEY").unwrap_or_else(|_| "secret".to_string());
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        // 3. Resolver la cuenta contra el store; un id mal formado o una
        // cuenta desaparecida se rechazan igual
        let db = Db::from_ref(state);
        let account = accounts::get_by_id(&db, &token_data.claims.sub)
            .await
            .ok_or(AppError::Auth("Account not found".to_string()))?;

        Ok(CurrentAccount(account))
    }
}
