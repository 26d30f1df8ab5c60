//! souschef-tools: built-in meal-planning tools.
//!
//! [`builtin_registry`] wires every tool and its schema at startup; the
//! registry rejects duplicates and is immutable afterwards, so a bad wiring
//! is caught at construction rather than mid-conversation.

pub mod catalog;
pub mod meal_plans;
pub mod nutrition;
pub mod preferences;
pub mod recipes;

use serde_json::json;
use souschef_core::{ToolCategory, ToolDefinition, ToolError, ToolRegistry};
use std::sync::Arc;

pub use catalog::CatalogStore;

/// Build the full tool registry backed by one shared catalog store.
pub fn builtin_registry(store: Arc<CatalogStore>) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    registry.register(
        ToolDefinition {
            name: "create_meal_plan".into(),
            description: "Create a new meal plan for the user".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Date for the meal plan (YYYY-MM-DD format)"
                    },
                    "meals": {
                        "type": "array",
                        "description": "List of meals with recipe_id, meal_type, and servings"
                    }
                },
                "required": ["date", "meals"]
            }),
        },
        ToolCategory::MealPlanning,
        Arc::new(meal_plans::CreateMealPlanTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "update_meal_plan".into(),
            description: "Update an existing meal plan".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Date of the meal plan to update (YYYY-MM-DD format)"
                    },
                    "meal_type": {
                        "type": "string",
                        "description": "Type of meal to update",
                        "enum": ["breakfast", "lunch", "dinner", "snack"]
                    },
                    "recipe_id": {
                        "type": "string",
                        "description": "ID of the new recipe"
                    },
                    "servings": {
                        "type": "integer",
                        "description": "Number of servings",
                        "default": 1
                    }
                },
                "required": ["date", "meal_type", "recipe_id"]
            }),
        },
        ToolCategory::MealPlanning,
        Arc::new(meal_plans::UpdateMealPlanTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "get_meal_plans".into(),
            description: "Retrieve user's meal plans for a date range".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "start_date": {
                        "type": "string",
                        "description": "Start date (YYYY-MM-DD format)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "End date (YYYY-MM-DD format)"
                    },
                    "days": {
                        "type": "integer",
                        "description": "Number of days to retrieve",
                        "default": 7
                    }
                }
            }),
        },
        ToolCategory::MealPlanning,
        Arc::new(meal_plans::GetMealPlansTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "search_recipes".into(),
            description: "Search for recipes based on various criteria".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for recipe names or ingredients"
                    },
                    "main_protein": {
                        "type": "array",
                        "description": "Filter by main protein types"
                    },
                    "max_calories": {
                        "type": "integer",
                        "description": "Maximum calories per serving"
                    },
                    "min_protein": {
                        "type": "number",
                        "description": "Minimum protein in grams"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "default": 10
                    }
                }
            }),
        },
        ToolCategory::RecipeSearch,
        Arc::new(recipes::SearchRecipesTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "get_recipe_details".into(),
            description: "Get detailed information about a specific recipe".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "recipe_id": {
                        "type": "string",
                        "description": "The unique ID of the recipe"
                    }
                },
                "required": ["recipe_id"]
            }),
        },
        ToolCategory::RecipeSearch,
        Arc::new(recipes::GetRecipeDetailsTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "analyze_nutrition".into(),
            description: "Analyze nutritional content of a meal or day".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Date to analyze (YYYY-MM-DD format)"
                    },
                    "meal_type": {
                        "type": "string",
                        "description": "Specific meal to analyze",
                        "enum": ["breakfast", "lunch", "dinner", "snack", "all"]
                    }
                },
                "required": ["date"]
            }),
        },
        ToolCategory::Nutrition,
        Arc::new(nutrition::AnalyzeNutritionTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "update_dietary_preferences".into(),
            description: "Update user's dietary preferences and restrictions".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "preferences": {
                        "type": "object",
                        "description": "Dictionary of dietary preferences"
                    }
                },
                "required": ["preferences"]
            }),
        },
        ToolCategory::UserPreferences,
        Arc::new(preferences::UpdateDietaryPreferencesTool::new(store.clone())),
    )?;

    registry.register(
        ToolDefinition {
            name: "get_user_preferences".into(),
            description: "Retrieve user's current dietary preferences".into(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolCategory::UserPreferences,
        Arc::new(preferences::GetUserPreferencesTool::new(store)),
    )?;

    Ok(registry)
}
