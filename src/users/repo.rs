use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
    Collection,
};
use tracing::{info, instrument};

use crate::{
    db::Database,
    users::repo_types::{NewUser, UserChanges, UserDocument},
};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<mongodb::error::Error> for RepoError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            RepoError::DuplicateEmail
        } else {
            RepoError::Backend(err.into())
        }
    }
}

/// Only `email` carries a unique index besides `_id`, so any duplicate key is an email clash.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Storage seam behind `UserService`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: ObjectId) -> RepoResult<Option<UserDocument>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<UserDocument>>;

    /// Natural store order, no sort.
    async fn list(&self, skip: u64, limit: u64) -> RepoResult<Vec<UserDocument>>;

    async fn insert(&self, user: NewUser) -> RepoResult<UserDocument>;

    /// Returns the document after modification, `None` if `id` is unknown.
    async fn update(&self, id: ObjectId, changes: UserChanges) -> RepoResult<Option<UserDocument>>;

    /// Returns the document as it was before removal, `None` if `id` is unknown.
    async fn delete(&self, id: ObjectId) -> RepoResult<Option<UserDocument>>;
}

pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.users(),
        }
    }

    fn update_document(changes: &UserChanges) -> Document {
        let mut set = Document::new();
        if let Some(username) = &changes.username {
            set.insert("username", username.as_str());
        }
        if let Some(email) = &changes.email {
            set.insert("email", email.as_str());
        }
        if let Some(is_active) = changes.is_active {
            set.insert("is_active", is_active);
        }
        if let Some(hash) = &changes.hashed_password {
            set.insert("hashed_password", hash.as_str());
        }
        doc! { "$set": set }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: ObjectId) -> RepoResult<Option<UserDocument>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<UserDocument>> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    #[instrument(skip(self))]
    async fn list(&self, skip: u64, limit: u64) -> RepoResult<Vec<UserDocument>> {
        // A zero limit means "no limit" to the server.
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).map_err(anyhow::Error::from)?;
        let cursor = self.collection.find(doc! {}).skip(skip).limit(limit).await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: NewUser) -> RepoResult<UserDocument> {
        let result = self
            .collection
            .clone_with_type::<NewUser>()
            .insert_one(&user)
            .await?;
        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("inserted _id is not an ObjectId: {}", result.inserted_id))?;
        info!(user_id = %id, "user document inserted");
        Ok(user.with_id(id))
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: ObjectId, changes: UserChanges) -> RepoResult<Option<UserDocument>> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, Self::update_document(&changes))
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ObjectId) -> RepoResult<Option<UserDocument>> {
        Ok(self.collection.find_one_and_delete(doc! { "_id": id }).await?)
    }
}

/// In-process repository backing the router and service tests. Email uniqueness is checked
/// under the write lock, matching the unique index of the real collection.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: tokio::sync::RwLock<Vec<UserDocument>>,
}

#[cfg(test)]
impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: ObjectId) -> RepoResult<Option<UserDocument>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<UserDocument>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self, skip: u64, limit: u64) -> RepoResult<Vec<UserDocument>> {
        let users = self.users.read().await;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(users.iter().skip(skip).take(limit).cloned().collect())
    }

    async fn insert(&self, user: NewUser) -> RepoResult<UserDocument> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let stored = user.with_id(ObjectId::new());
        users.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: ObjectId, changes: UserChanges) -> RepoResult<Option<UserDocument>> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::DuplicateEmail);
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        changes.apply_to(user);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: ObjectId) -> RepoResult<Option<UserDocument>> {
        let mut users = self.users.write().await;
        let removed = users
            .iter()
            .position(|u| u.id == id)
            .map(|idx| users.remove(idx));
        Ok(removed)
    }
}
