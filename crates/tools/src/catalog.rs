//! In-memory recipe catalog and meal-plan store.
//!
//! The catalog seed is immutable; meal plans and dietary preferences live
//! behind locks because tool handlers are shared across concurrent
//! conversations. Durable persistence is handled outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub main_protein: String,
    pub calories_per_serving: u32,
    pub protein_grams: f64,
    pub prep_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedMeal {
    pub recipe_id: String,
    pub meal_type: String,
    pub servings: u32,
}

/// One day's plan, keyed by ISO date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlan {
    pub date: String,
    pub meals: Vec<PlannedMeal>,
}

/// Search criteria for the catalog.
#[derive(Debug, Default, Clone)]
pub struct RecipeQuery {
    pub query: Option<String>,
    pub main_protein: Vec<String>,
    pub max_calories: Option<u32>,
    pub min_protein: Option<f64>,
    pub limit: usize,
}

pub struct CatalogStore {
    recipes: Vec<Recipe>,
    by_id: HashMap<String, usize>,
    plans: RwLock<BTreeMap<String, MealPlan>>,
    preferences: RwLock<serde_json::Value>,
}

impl CatalogStore {
    /// A store seeded with the built-in catalog.
    pub fn seeded() -> Self {
        Self::with_recipes(seed_recipes())
    }

    pub fn with_recipes(recipes: Vec<Recipe>) -> Self {
        let by_id = recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            recipes,
            by_id,
            plans: RwLock::new(BTreeMap::new()),
            preferences: RwLock::new(serde_json::json!({})),
        }
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.by_id.get(id).map(|&i| &self.recipes[i])
    }

    pub fn search(&self, query: &RecipeQuery) -> Vec<&Recipe> {
        let needle = query.query.as_deref().map(str::to_lowercase);
        self.recipes
            .iter()
            .filter(|r| {
                needle.as_deref().is_none_or(|q| {
                    r.name.to_lowercase().contains(q)
                        || r.ingredients.iter().any(|i| i.to_lowercase().contains(q))
                })
            })
            .filter(|r| {
                query.main_protein.is_empty()
                    || query
                        .main_protein
                        .iter()
                        .any(|p| p.eq_ignore_ascii_case(&r.main_protein))
            })
            .filter(|r| query.max_calories.is_none_or(|max| r.calories_per_serving <= max))
            .filter(|r| query.min_protein.is_none_or(|min| r.protein_grams >= min))
            .take(query.limit)
            .collect()
    }

    pub fn upsert_plan(&self, plan: MealPlan) {
        self.plans.write().unwrap().insert(plan.date.clone(), plan);
    }

    /// Replace one meal slot in an existing plan, or start a plan for the
    /// date if none exists yet.
    pub fn update_plan_meal(&self, date: &str, meal: PlannedMeal) {
        let mut plans = self.plans.write().unwrap();
        let plan = plans.entry(date.to_string()).or_insert_with(|| MealPlan {
            date: date.to_string(),
            meals: Vec::new(),
        });
        match plan.meals.iter_mut().find(|m| m.meal_type == meal.meal_type) {
            Some(slot) => *slot = meal,
            None => plan.meals.push(meal),
        }
    }

    /// Plans with `start <= date <= end` (inclusive, ISO dates sort lexically).
    pub fn plans_in_range(&self, start: &str, end: &str) -> Vec<MealPlan> {
        self.plans
            .read()
            .unwrap()
            .range(start.to_string()..=end.to_string())
            .map(|(_, plan)| plan.clone())
            .collect()
    }

    pub fn plan_for(&self, date: &str) -> Option<MealPlan> {
        self.plans.read().unwrap().get(date).cloned()
    }

    pub fn preferences(&self) -> serde_json::Value {
        self.preferences.read().unwrap().clone()
    }

    /// Merge new preference keys over the existing object.
    pub fn update_preferences(&self, updates: &serde_json::Value) {
        let mut prefs = self.preferences.write().unwrap();
        if let (Some(existing), Some(new)) = (prefs.as_object_mut(), updates.as_object()) {
            for (key, value) in new {
                existing.insert(key.clone(), value.clone());
            }
        }
    }
}

fn recipe(
    id: &str,
    name: &str,
    description: &str,
    ingredients: &[&str],
    main_protein: &str,
    calories: u32,
    protein: f64,
    prep: u32,
) -> Recipe {
    Recipe {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        main_protein: main_protein.into(),
        calories_per_serving: calories,
        protein_grams: protein,
        prep_minutes: prep,
    }
}

fn seed_recipes() -> Vec<Recipe> {
    vec![
        recipe(
            "r-001",
            "Lemon Herb Roast Chicken",
            "Whole chicken roasted with lemon, garlic, and fresh herbs.",
            &["chicken", "lemon", "garlic", "rosemary", "olive oil"],
            "chicken",
            520,
            42.0,
            75,
        ),
        recipe(
            "r-002",
            "Chicken Stir-Fry",
            "Quick weeknight stir-fry with vegetables and soy-ginger sauce.",
            &["chicken breast", "broccoli", "bell pepper", "soy sauce", "ginger"],
            "chicken",
            380,
            35.0,
            25,
        ),
        recipe(
            "r-003",
            "Chicken Caesar Salad",
            "Grilled chicken over romaine with parmesan and croutons.",
            &["chicken breast", "romaine", "parmesan", "croutons", "caesar dressing"],
            "chicken",
            440,
            38.0,
            20,
        ),
        recipe(
            "r-004",
            "Seared Salmon with Asparagus",
            "Pan-seared salmon fillet with roasted asparagus.",
            &["salmon", "asparagus", "butter", "lemon"],
            "salmon",
            460,
            40.0,
            30,
        ),
        recipe(
            "r-005",
            "Red Lentil Dal",
            "Spiced red lentils simmered with tomato and coconut milk.",
            &["red lentils", "coconut milk", "tomato", "turmeric", "cumin"],
            "lentils",
            350,
            18.0,
            40,
        ),
        recipe(
            "r-006",
            "Beef Tacos",
            "Seasoned ground beef in corn tortillas with fresh salsa.",
            &["ground beef", "corn tortillas", "onion", "cilantro", "lime"],
            "beef",
            560,
            30.0,
            35,
        ),
        recipe(
            "r-007",
            "Vegetable Omelette",
            "Three-egg omelette with spinach, mushroom, and cheddar.",
            &["eggs", "spinach", "mushroom", "cheddar"],
            "eggs",
            320,
            22.0,
            15,
        ),
        recipe(
            "r-008",
            "Overnight Oats",
            "Rolled oats soaked with yogurt, berries, and honey.",
            &["oats", "yogurt", "blueberries", "honey"],
            "dairy",
            290,
            14.0,
            10,
        ),
    ]
}
