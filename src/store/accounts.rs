use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use mongodb::bson::{self, doc, oid::ObjectId};
use rand_core::OsRng;

use crate::db::Db;
use crate::error::{is_duplicate_key, AppError};
use crate::models::{Account, Category, RegisterRequest};
use crate::store::{parse_object_id, parse_optional_date};

/// Categorías que se aprovisionan con cada cuenta nueva.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Personal", "Trabajo", "Estudios", "Hogar"];

pub async fn register(db: &Db, request: &RegisterRequest) -> Result<ObjectId, AppError> {
    let email = request.email.trim().to_lowercase();
    let username = request.username.trim().to_string();

    // Verificación previa para poder devolver un mensaje concreto; el índice
    // único sigue siendo la autoridad si otra petición gana la carrera.
    let existing = db
        .accounts()
        .find_one(
            doc! { "$or": [{ "email": &email }, { "username": &username }] },
            None,
        )
        .await?;
    if existing.is_some() {
        return Err(AppError::Duplicate(
            "El usuario o email ya existe".to_string(),
        ));
    }

    let birth_date = parse_optional_date(request.birth_date.as_deref())?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(request.password.as_bytes(), &salt)
        .map_err(|e| AppError::Validation(e.to_string()))?
        .to_string();

    let account = Account {
        id: ObjectId::new(),
        email,
        username,
        password_hash,
        birth_date,
        telegram_chat_id: None,
        created_at: bson::DateTime::now(),
        last_login: None,
    };

    db.accounts().insert_one(&account, None).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Duplicate("El usuario o email ya existe".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    // La cuenta ya quedó creada: un fallo al aprovisionar las categorías por
    // defecto se registra pero no la revierte. Consistencia débil conocida.
    let defaults: Vec<Category> = DEFAULT_CATEGORIES
        .iter()
        .map(|name| Category {
            id: ObjectId::new(),
            name: (*name).to_string(),
            user_id: account.id,
            created_at: bson::DateTime::now(),
        })
        .collect();
    if let Err(e) = db.categories().insert_many(&defaults, None).await {
        tracing::warn!(
            account = %account.id,
            "las categorías por defecto no se crearon completas: {}",
            e
        );
    }

    Ok(account.id)
}

/// Busca por email o username en una sola consulta y verifica el hash.
/// Un login correcto actualiza `last_login`.
pub async fn authenticate(
    db: &Db,
    username_or_email: &str,
    password: &str,
) -> Result<Account, AppError> {
    let account = db
        .accounts()
        .find_one(
            doc! { "$or": [
                { "email": username_or_email },
                { "username": username_or_email },
            ]},
            None,
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    let parsed_hash = PasswordHash::new(&account.password_hash)
        .map_err(|_| AppError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    db.accounts()
        .update_one(
            doc! { "_id": account.id },
            doc! { "$set": { "last_login": bson::DateTime::now() } },
            None,
        )
        .await?;

    Ok(account)
}

pub async fn get_by_id(db: &Db, account_id: &str) -> Option<Account> {
    let id = parse_object_id(account_id)?;
    match db.accounts().find_one(doc! { "_id": id }, None).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!("no se pudo consultar la cuenta {}: {}", account_id, e);
            None
        }
    }
}

/// Guarda el identificador de chat de Telegram. Nada lo consume todavía;
/// es solo estado almacenado para una integración futura.
pub async fn set_telegram_chat(
    db: &Db,
    account_id: ObjectId,
    chat_id: &str,
) -> Result<bool, AppError> {
    let result = db
        .accounts()
        .update_one(
            doc! { "_id": account_id },
            doc! { "$set": { "telegram_chat_id": chat_id } },
            None,
        )
        .await?;
    Ok(result.matched_count > 0)
}
