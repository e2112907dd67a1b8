use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use tracing::{info, instrument, warn};

use crate::users::{
    dto::{CreateUserRequest, UpdateUserRequest},
    mapper,
    repo::{RepoError, UserRepository},
    repo_types::UserDocument,
};

/// Outcomes the router turns into status codes.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UserResult<T> = Result<T, UserError>;

impl From<RepoError> for UserError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateEmail => UserError::EmailTaken,
            RepoError::Backend(e) => UserError::Internal(e),
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> UserResult<Option<UserDocument>> {
        Ok(self.repo.find_by_id(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<UserDocument>> {
        Ok(self.repo.find_by_email(email).await?)
    }

    pub async fn list(&self, skip: u64, limit: u64) -> UserResult<Vec<UserDocument>> {
        Ok(self.repo.list(skip, limit).await?)
    }

    /// The email pre-check gives the common case a clean `EmailTaken`; a
    /// concurrent insert that slips past it is caught by the store.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateUserRequest) -> UserResult<UserDocument> {
        if self.find_by_email(&input.email).await?.is_some() {
            warn!("email already registered");
            return Err(UserError::EmailTaken);
        }
        let new_user = mapper::new_user(input)?;
        let user = self.repo.insert(new_user).await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: ObjectId, input: UpdateUserRequest) -> UserResult<UserDocument> {
        if let Some(email) = input.email.as_deref() {
            if self.repo.find_by_id(id).await?.is_none() {
                return Err(UserError::NotFound);
            }
            if let Some(owner) = self.find_by_email(email).await? {
                if owner.id != id {
                    warn!(owner_id = %owner.id, "email already registered to another user");
                    return Err(UserError::EmailTaken);
                }
            }
        }
        let changes = mapper::user_changes(input)?;
        let user = self
            .repo
            .update(id, changes)
            .await?
            .ok_or(UserError::NotFound)?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ObjectId) -> UserResult<UserDocument> {
        let user = self.repo.delete(id).await?.ok_or(UserError::NotFound)?;
        info!(user_id = %user.id, "user deleted");
        Ok(user)
    }
}
