use anyhow::Context;
use mongodb::{
    bson::doc,
    options::{ClientOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use tracing::info;

use crate::{config::MongoConfig, users::repo_types::UserDocument};

pub const USERS_COLLECTION: &str = "users";

/// Process-wide MongoDB handle. Built once in `main`, shut down after the server drains.
#[derive(Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connects and pings the server. There is no retry: an unreachable server aborts startup.
    pub async fn connect(config: &MongoConfig) -> anyhow::Result<Self> {
        info!(db = %config.db_name, "connecting to mongodb");

        let mut options = ClientOptions::parse(&config.url)
            .await
            .context("parse MONGODB_URL")?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(options).context("build mongodb client")?;
        let db = client.database(&config.db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .context("ping mongodb")?;

        info!(db = %config.db_name, "connected to mongodb");
        Ok(Self { client, db })
    }

    pub fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS_COLLECTION)
    }

    /// Unique index on `email`; the store is the final word on duplicate emails.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let email_unique = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            )
            .build();
        self.users()
            .create_index(email_unique)
            .await
            .context("create unique index on users.email")?;
        info!(collection = USERS_COLLECTION, "indexes ensured");
        Ok(())
    }

    pub async fn close(self) {
        info!("closing mongodb client");
        self.client.shutdown().await;
    }
}
