//! Nutrition analysis over planned meals.

use async_trait::async_trait;
use serde_json::{json, Value};
use souschef_core::{ToolError, ToolHandler};
use std::sync::Arc;

use crate::catalog::CatalogStore;

pub struct AnalyzeNutritionTool {
    store: Arc<CatalogStore>,
}

impl AnalyzeNutritionTool {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for AnalyzeNutritionTool {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let date = arguments["date"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'date'".into()))?;
        let meal_type = arguments["meal_type"].as_str().unwrap_or("all");

        let Some(plan) = self.store.plan_for(date) else {
            return Ok(json!({
                "date": date,
                "meal_type": meal_type,
                "total_calories": 0,
                "total_protein_grams": 0.0,
                "meals": [],
                "note": "no meal plan for this date",
            }));
        };

        let mut total_calories: u64 = 0;
        let mut total_protein = 0.0;
        let mut breakdown = Vec::new();

        for meal in plan
            .meals
            .iter()
            .filter(|m| meal_type == "all" || m.meal_type == meal_type)
        {
            let Some(recipe) = self.store.recipe(&meal.recipe_id) else {
                continue;
            };
            let calories = recipe.calories_per_serving as u64 * meal.servings as u64;
            let protein = recipe.protein_grams * meal.servings as f64;
            total_calories += calories;
            total_protein += protein;
            breakdown.push(json!({
                "meal_type": meal.meal_type,
                "recipe": recipe.name,
                "servings": meal.servings,
                "calories": calories,
                "protein_grams": protein,
            }));
        }

        Ok(json!({
            "date": date,
            "meal_type": meal_type,
            "total_calories": total_calories,
            "total_protein_grams": total_protein,
            "meals": breakdown,
        }))
    }
}
