//! Recipe search and detail tools.
//!
//! Search results are cached per normalized query; the cache is shared
//! across conversations, so a get-or-compute under one lock keeps each key
//! computed at most once.

use async_trait::async_trait;
use serde_json::{json, Value};
use souschef_core::{ToolError, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::catalog::{CatalogStore, RecipeQuery};

pub struct SearchRecipesTool {
    store: Arc<CatalogStore>,
    cache: Mutex<HashMap<String, Value>>,
}

impl SearchRecipesTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn parse_query(arguments: &Value) -> RecipeQuery {
        RecipeQuery {
            query: arguments["query"]
                .as_str()
                .map(|q| q.trim().to_lowercase())
                .filter(|q| !q.is_empty()),
            main_protein: arguments["main_protein"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            max_calories: arguments["max_calories"].as_u64().map(|v| v as u32),
            min_protein: arguments["min_protein"].as_f64(),
            limit: arguments["limit"].as_u64().unwrap_or(10) as usize,
        }
    }

    fn cache_key(query: &RecipeQuery) -> String {
        let mut proteins = query.main_protein.clone();
        proteins.sort();
        format!(
            "q={}|p={}|cal={}|prot={}|n={}",
            query.query.as_deref().unwrap_or("").trim().to_lowercase(),
            proteins.join(",").to_lowercase(),
            query.max_calories.map(|v| v.to_string()).unwrap_or_default(),
            query.min_protein.map(|v| v.to_string()).unwrap_or_default(),
            query.limit
        )
    }
}

#[async_trait]
impl ToolHandler for SearchRecipesTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let query = Self::parse_query(&arguments);
        let key = Self::cache_key(&query);

        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&key) {
            debug!(%key, "recipe search cache hit");
            return Ok(hit.clone());
        }

        let matches = self.store.search(&query);
        let result = json!({
            "count": matches.len(),
            "recipes": matches.iter().map(|r| json!({
                "id": r.id,
                "name": r.name,
                "main_protein": r.main_protein,
                "calories_per_serving": r.calories_per_serving,
                "protein_grams": r.protein_grams,
                "prep_minutes": r.prep_minutes,
            })).collect::<Vec<_>>(),
        });
        cache.insert(key, result.clone());
        Ok(result)
    }
}

pub struct GetRecipeDetailsTool {
    store: Arc<CatalogStore>,
}

impl GetRecipeDetailsTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for GetRecipeDetailsTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let recipe_id = arguments["recipe_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'recipe_id'".into()))?;

        let recipe = self.store.recipe(recipe_id).ok_or_else(|| {
            ToolError::ExecutionFailed {
                tool_name: "get_recipe_details".into(),
                reason: format!("no recipe with id '{recipe_id}'"),
            }
        })?;

        serde_json::to_value(recipe).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "get_recipe_details".into(),
            reason: e.to_string(),
        })
    }
}
