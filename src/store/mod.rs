//! Capa de acceso a datos: cuentas, categorías y tareas sobre las tres
//! colecciones. Las escrituras devuelven `Result`; las consultas de lectura
//! (listados, estadísticas) degradan a resultados vacíos registrando el
//! error, para que la vista siga disponible aunque el store falle.

pub mod accounts;
pub mod categories;
pub mod tasks;

use chrono::NaiveDate;
use mongodb::bson::{self, oid::ObjectId};

use crate::error::AppError;

/// Ids en formato inválido se tratan como "no encontrado", nunca como pánico.
pub(crate) fn parse_object_id(value: &str) -> Option<ObjectId> {
    ObjectId::parse_str(value).ok()
}

/// Fecha de calendario `YYYY-MM-DD`, almacenada como medianoche UTC.
pub(crate) fn parse_date(value: &str) -> Result<bson::DateTime, AppError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Formato de fecha inválido".to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::Validation("Formato de fecha inválido".to_string()))?;
    Ok(bson::DateTime::from_chrono(midnight.and_utc()))
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> Result<Option<bson::DateTime>, AppError> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(parse_date(raw)?)),
        None => Ok(None),
    }
}
