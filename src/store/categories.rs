use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;

use crate::db::Db;
use crate::error::{is_duplicate_key, AppError};
use crate::models::Category;

/// Categorías del usuario ordenadas por nombre ascendente. Degrada a lista
/// vacía si el store falla.
pub async fn list(db: &Db, user_id: ObjectId) -> Vec<Category> {
    let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
    let cursor = match db
        .categories()
        .find(doc! { "user_id": user_id }, options)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!("no se pudieron consultar las categorías: {}", e);
            return Vec::new();
        }
    };
    match cursor.try_collect().await {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!("no se pudieron leer las categorías: {}", e);
            Vec::new()
        }
    }
}

pub async fn create(db: &Db, name: &str, user_id: ObjectId) -> Result<ObjectId, AppError> {
    let name = name.trim();

    let existing = db
        .categories()
        .find_one(doc! { "name": name, "user_id": user_id }, None)
        .await?;
    if existing.is_some() {
        return Err(AppError::Duplicate("La categoría ya existe".to_string()));
    }

    let category = Category {
        id: ObjectId::new(),
        name: name.to_string(),
        user_id,
        created_at: bson::DateTime::now(),
    };

    db.categories()
        .insert_one(&category, None)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Duplicate("La categoría ya existe".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok(category.id)
}

/// Filtro y actualización con los que se desvinculan las tareas de una
/// categoría: solo las del dueño, referencia puesta a null. Las tareas nunca
/// se borran en cascada.
pub(crate) fn unlink_tasks(category_id: ObjectId, user_id: ObjectId) -> (Document, Document) {
    (
        doc! { "category_id": category_id, "user_id": user_id },
        doc! { "$set": { "category_id": null } },
    )
}

/// Borra una categoría del usuario. Antes de eliminarla desvincula todas sus
/// tareas; el orden importa: si el borrado fallara a mitad, las tareas ya no
/// apuntan a una categoría muerta. Devuelve false si la categoría no existe
/// o no es del usuario, por lo que una segunda llamada es inofensiva.
pub async fn delete(db: &Db, category_id: ObjectId, user_id: ObjectId) -> Result<bool, AppError> {
    let owned = doc! { "_id": category_id, "user_id": user_id };
    if db.categories().find_one(owned.clone(), None).await?.is_none() {
        return Ok(false);
    }

    let (filter, update) = unlink_tasks(category_id, user_id);
    db.tasks().update_many(filter, update, None).await?;

    let result = db.categories().delete_one(owned, None).await?;
    Ok(result.deleted_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn unlink_tasks_is_scoped_to_the_owner() {
        let category = ObjectId::new();
        let user = ObjectId::new();
        let (filter, _) = unlink_tasks(category, user);

        // Solo las tareas del dueño que referencian esta categoría.
        assert_eq!(filter.get_object_id("category_id").unwrap(), category);
        assert_eq!(filter.get_object_id("user_id").unwrap(), user);
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn unlink_tasks_clears_the_reference_to_null() {
        let (_, update) = unlink_tasks(ObjectId::new(), ObjectId::new());

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("category_id"), Some(&Bson::Null));
        // Nada más se toca: las tareas sobreviven a su categoría.
        assert_eq!(set.len(), 1);
        assert_eq!(update.len(), 1);
    }
}
