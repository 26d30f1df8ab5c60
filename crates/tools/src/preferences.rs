//! Dietary preference tools.

use async_trait::async_trait;
use serde_json::{json, Value};
use souschef_core::{ToolError, ToolHandler};
use std::sync::Arc;

use crate::catalog::CatalogStore;

pub struct GetUserPreferencesTool {
    store: Arc<CatalogStore>,
}

impl GetUserPreferencesTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for GetUserPreferencesTool {
    async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(json!({"preferences": self.store.preferences()}))
    }
}

pub struct UpdateDietaryPreferencesTool {
    store: Arc<CatalogStore>,
}

impl UpdateDietaryPreferencesTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for UpdateDietaryPreferencesTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let updates = arguments
            .get("preferences")
            .filter(|p| p.is_object())
            .ok_or_else(|| {
                ToolError::InvalidArguments("'preferences' must be an object".into())
            })?;

        self.store.update_preferences(updates);
        Ok(json!({"updated": true, "preferences": self.store.preferences()}))
    }
}
