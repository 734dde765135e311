//! Read-only façade over workshop rows, for the status/listing endpoints and
//! admin display. Engine mutations never come through here; they read the
//! workshop under a row lock inside their own transaction.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Workshop;
use crate::repository::store::Store;

#[derive(Clone)]
pub struct WorkshopDirectory {
    store: Arc<dyn Store>,
}

impl WorkshopDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid) -> Result<Workshop> {
        self.store
            .get_workshop(id)
            .await?
            .ok_or(Error::NotFound("workshop"))
    }

    pub async fn list(&self) -> Result<Vec<Workshop>> {
        self.store.list_workshops().await
    }
}
