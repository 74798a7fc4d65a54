use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::models::{Account, Category, Task};

/// Handle del almacenamiento. Se construye una vez en el arranque y se pasa
/// como estado a cada operación; nada accede al cliente como global.
#[derive(Clone)]
pub struct Db {
    database: Database,
}

impl Db {
    pub async fn connect(uri: &str, name: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Db {
            database: client.database(name),
        })
    }

    pub fn accounts(&self) -> Collection<Account> {
        self.database.collection("accounts")
    }

    pub fn categories(&self) -> Collection<Category> {
        self.database.collection("categories")
    }

    pub fn tasks(&self) -> Collection<Task> {
        self.database.collection("tasks")
    }

    /// Declara los índices de unicidad y de lectura. Idempotente; se ejecuta
    /// en cada arranque.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let unique = IndexOptions::builder().unique(true).build();

        self.accounts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;
        self.accounts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;

        // Un usuario no puede repetir nombre de categoría.
        self.categories()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "name": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await?;

        // Listado de tareas: por dueño, más recientes primero.
        self.tasks()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }
}
