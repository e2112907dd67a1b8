use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// User document as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Argon2 PHC string. Never sent to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_password: Option<String>,
}

/// Insert payload. `_id` is left to the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub hashed_password: String,
}

/// Partial update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub hashed_password: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.is_active.is_none()
            && self.hashed_password.is_none()
    }
}
