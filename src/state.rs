use std::sync::Arc;

use crate::users::{repo::UserRepository, services::UserService};

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
}

impl AppState {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            users: UserService::new(repo),
        }
    }

    /// State over the in-memory repository; no MongoDB needed.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::new(Arc::new(crate::users::repo::InMemoryUserRepository::new()))
    }
}
