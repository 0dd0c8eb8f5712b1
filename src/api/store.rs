use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::PortfolioState;
use crate::error::SimError;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub initial_fund: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub level: u32,
    #[serde(flatten)]
    pub portfolio: PortfolioState,
}

/// Process-local user and portfolio storage.
#[derive(Clone, Default)]
pub struct PortfolioStore {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, new_user: NewUser) -> Result<UserRecord, SimError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == new_user.username) {
            return Err(SimError::UsernameTaken(new_user.username));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            level: 1,
            portfolio: PortfolioState::new(new_user.initial_fund),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<UserRecord, SimError> {
        let key = parse_id(id)?;
        self.users
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| SimError::UserNotFound(id.to_string()))
    }

    /// Applies `change` to the user's record under the write lock and returns
    /// the updated record.
    pub async fn update<F>(&self, id: &str, change: F) -> Result<UserRecord, SimError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let key = parse_id(id)?;
        let mut users = self.users.write().await;
        let record = users
            .get_mut(&key)
            .ok_or_else(|| SimError::UserNotFound(id.to_string()))?;
        change(record);
        Ok(record.clone())
    }
}

fn parse_id(id: &str) -> Result<Uuid, SimError> {
    Uuid::parse_str(id).map_err(|_| SimError::UserNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: format!("{username}@example.com"),
            initial_fund: 5000.0,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = PortfolioStore::new();
        let created = store.create(new_user("saver")).await.expect("created");
        let fetched = store.get(&created.id.to_string()).await.expect("found");
        assert_eq!(fetched.username, "saver");
        assert_eq!(fetched.level, 1);
        assert_eq!(fetched.portfolio.current_fund, 5000.0);
        assert_eq!(fetched.portfolio.history.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = PortfolioStore::new();
        store.create(new_user("saver")).await.expect("created");
        let err = store
            .create(new_user("saver"))
            .await
            .expect_err("duplicate must fail");
        assert!(matches!(err, SimError::UsernameTaken(name) if name == "saver"));
        assert_eq!(store.users.read().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let store = PortfolioStore::new();
        for id in ["not-a-uuid", "6f1c1c52-9f55-4a59-9b55-000000000000"] {
            let err = store.get(id).await.expect_err("missing user");
            assert!(matches!(err, SimError::UserNotFound(_)));
        }
    }

    #[tokio::test]
    async fn update_mutates_stored_record() {
        let store = PortfolioStore::new();
        let created = store.create(new_user("saver")).await.expect("created");
        let id = created.id.to_string();

        let updated = store
            .update(&id, |user| user.portfolio.current_fund = 7000.0)
            .await
            .expect("updated");
        assert_eq!(updated.portfolio.current_fund, 7000.0);
        assert_eq!(
            store.get(&id).await.expect("found").portfolio.current_fund,
            7000.0
        );
    }
}
