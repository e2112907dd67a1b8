//! Translation between wire shapes and stored documents.
//!
//! Plaintext passwords stop here: create/update input is turned into a
//! `hashed_password`, and the hash never makes it into a [`UserResponse`].

use mongodb::bson::oid::ObjectId;

use crate::users::{
    dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
    password::hash_password,
    repo_types::{NewUser, UserChanges, UserDocument},
};

pub fn new_user(input: CreateUserRequest) -> anyhow::Result<NewUser> {
    let hashed_password = hash_password(&input.password)?;
    Ok(NewUser {
        username: input.username,
        email: input.email,
        is_active: input.is_active,
        hashed_password,
    })
}

pub fn user_changes(input: UpdateUserRequest) -> anyhow::Result<UserChanges> {
    let hashed_password = input
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;
    Ok(UserChanges {
        username: input.username,
        email: input.email,
        is_active: input.is_active,
        hashed_password,
    })
}

impl NewUser {
    pub fn with_id(self, id: ObjectId) -> UserDocument {
        UserDocument {
            id,
            username: self.username,
            email: self.email,
            is_active: self.is_active,
            hashed_password: Some(self.hashed_password),
        }
    }
}

impl UserChanges {
    /// Applies the supplied fields in place, as the store's `$set` would.
    #[cfg(test)]
    pub fn apply_to(self, user: &mut UserDocument) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(hash) = self.hashed_password {
            user.hashed_password = Some(hash);
        }
    }
}

impl From<UserDocument> for UserResponse {
    fn from(user: UserDocument) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username,
            email: user.email,
            is_active: user.is_active,
        }
    }
}
