//! Meal-plan tools: create, update, and retrieve day plans.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use souschef_core::{ToolError, ToolHandler};
use std::sync::Arc;

use crate::catalog::{CatalogStore, MealPlan, PlannedMeal};

/// Widest date range `get_meal_plans` will compute; keeps model-supplied
/// values out of chrono's overflow territory.
const MAX_RANGE_DAYS: i64 = 366;

fn invalid(message: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments(message.into())
}

fn parse_date(s: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| invalid(format!("'{s}' is not a YYYY-MM-DD date")))
}

pub struct CreateMealPlanTool {
    store: Arc<CatalogStore>,
}

impl CreateMealPlanTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for CreateMealPlanTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let date = arguments["date"]
            .as_str()
            .ok_or_else(|| invalid("missing 'date'"))?;
        parse_date(date)?;

        let meals_raw = arguments["meals"]
            .as_array()
            .ok_or_else(|| invalid("missing 'meals'"))?;

        let mut meals = Vec::with_capacity(meals_raw.len());
        for entry in meals_raw {
            let recipe_id = entry["recipe_id"]
                .as_str()
                .ok_or_else(|| invalid("each meal needs a 'recipe_id'"))?;
            if self.store.recipe(recipe_id).is_none() {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "create_meal_plan".into(),
                    reason: format!("no recipe with id '{recipe_id}'"),
                });
            }
            meals.push(PlannedMeal {
                recipe_id: recipe_id.to_string(),
                meal_type: entry["meal_type"].as_str().unwrap_or("dinner").to_string(),
                servings: entry["servings"].as_u64().unwrap_or(1) as u32,
            });
        }

        let meal_count = meals.len();
        self.store.upsert_plan(MealPlan {
            date: date.to_string(),
            meals,
        });
        Ok(json!({"date": date, "meals": meal_count, "created": true}))
    }
}

pub struct UpdateMealPlanTool {
    store: Arc<CatalogStore>,
}

impl UpdateMealPlanTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for UpdateMealPlanTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let date = arguments["date"]
            .as_str()
            .ok_or_else(|| invalid("missing 'date'"))?;
        parse_date(date)?;
        let meal_type = arguments["meal_type"]
            .as_str()
            .ok_or_else(|| invalid("missing 'meal_type'"))?;
        let recipe_id = arguments["recipe_id"]
            .as_str()
            .ok_or_else(|| invalid("missing 'recipe_id'"))?;

        if self.store.recipe(recipe_id).is_none() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "update_meal_plan".into(),
                reason: format!("no recipe with id '{recipe_id}'"),
            });
        }

        self.store.update_plan_meal(
            date,
            PlannedMeal {
                recipe_id: recipe_id.to_string(),
                meal_type: meal_type.to_string(),
                servings: arguments["servings"].as_u64().unwrap_or(1) as u32,
            },
        );
        Ok(json!({"date": date, "meal_type": meal_type, "updated": true}))
    }
}

pub struct GetMealPlansTool {
    store: Arc<CatalogStore>,
}

impl GetMealPlansTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for GetMealPlansTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        // Defaults mirror a week starting today when no range is given.
        let days = match arguments.get("days") {
            None | Some(Value::Null) => 7,
            Some(v) => v
                .as_i64()
                .filter(|d| (1..=MAX_RANGE_DAYS).contains(d))
                .ok_or_else(|| {
                    invalid(format!("'days' must be between 1 and {MAX_RANGE_DAYS}"))
                })?,
        };
        let start = match arguments["start_date"].as_str() {
            Some(s) => parse_date(s)?,
            None => Utc::now().date_naive(),
        };
        let end = match arguments["end_date"].as_str() {
            Some(s) => parse_date(s)?,
            None => start + Duration::days(days - 1),
        };

        let plans = self
            .store
            .plans_in_range(&start.to_string(), &end.to_string());
        Ok(json!({
            "start_date": start.to_string(),
            "end_date": end.to_string(),
            "count": plans.len(),
            "plans": plans,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_dinner() -> Arc<CatalogStore> {
        let store = Arc::new(CatalogStore::seeded());
        store.update_plan_meal(
            "2026-09-02",
            PlannedMeal {
                recipe_id: "r-005".into(),
                meal_type: "dinner".into(),
                servings: 2,
            },
        );
        store
    }

    #[tokio::test]
    async fn create_plan_with_valid_recipes() {
        let store = Arc::new(CatalogStore::seeded());
        let tool = CreateMealPlanTool::new(store.clone());
        let result = tool
            .call(json!({
                "date": "2026-09-01",
                "meals": [
                    {"recipe_id": "r-008", "meal_type": "breakfast", "servings": 1},
                    {"recipe_id": "r-001", "meal_type": "dinner", "servings": 4}
                ]
            }))
            .await
            .unwrap();

        assert_eq!(result["meals"], 2);
        assert_eq!(store.plan_for("2026-09-01").unwrap().meals.len(), 2);
    }

    #[tokio::test]
    async fn create_plan_rejects_unknown_recipe() {
        let tool = CreateMealPlanTool::new(Arc::new(CatalogStore::seeded()));
        let err = tool
            .call(json!({
                "date": "2026-09-01",
                "meals": [{"recipe_id": "r-999", "meal_type": "dinner"}]
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn create_plan_rejects_bad_date() {
        let tool = CreateMealPlanTool::new(Arc::new(CatalogStore::seeded()));
        let err = tool
            .call(json!({"date": "next tuesday", "meals": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn update_replaces_one_slot() {
        let store = store_with_dinner();
        let tool = UpdateMealPlanTool::new(store.clone());
        tool.call(json!({
            "date": "2026-09-02",
            "meal_type": "dinner",
            "recipe_id": "r-006",
            "servings": 3
        }))
        .await
        .unwrap();

        let plan = store.plan_for("2026-09-02").unwrap();
        assert_eq!(plan.meals.len(), 1);
        assert_eq!(plan.meals[0].recipe_id, "r-006");
        assert_eq!(plan.meals[0].servings, 3);
    }

    #[tokio::test]
    async fn get_plans_with_explicit_range() {
        let store = store_with_dinner();
        let tool = GetMealPlansTool::new(store);
        let result = tool
            .call(json!({"start_date": "2026-09-01", "end_date": "2026-09-03"}))
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
    }

    #[tokio::test]
    async fn get_plans_rejects_out_of_range_days() {
        let tool = GetMealPlansTool::new(Arc::new(CatalogStore::seeded()));
        for days in [serde_json::json!(0), serde_json::json!(-3), serde_json::json!(4_000_000_000_000_000_000_i64)] {
            let err = tool
                .call(json!({"start_date": "2026-09-01", "days": days}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)), "days={days}");
        }
    }

    #[tokio::test]
    async fn get_plans_days_window_from_start() {
        let store = store_with_dinner();
        let tool = GetMealPlansTool::new(store);
        let result = tool
            .call(json!({"start_date": "2026-09-02", "days": 1}))
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["end_date"], "2026-09-02");
    }
}
