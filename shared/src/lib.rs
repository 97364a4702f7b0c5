//! Shared library for the nutrition assistant Lambda functions.
//!
//! Holds the decision core (intent classification, allergen matching,
//! restriction parsing, meal validation and meal-type follow-ups) plus the
//! clients and wire
//! types the webhook uses to talk to its collaborators.

pub mod agents;
pub mod allergens;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod intent;
pub mod meals;
pub mod models;
pub mod restrictions;
pub mod screening;
pub mod secrets;
pub mod twilio;
pub mod validation;

pub use agents::{AgentClient, AgentRequest, AgentResponse, MealLogDispatcher, VisionClient};
pub use allergens::{Allergen, AllergenKnowledgeBase, FoodDetection, Preference, Restriction};
pub use commands::{handle_restriction_intent, help_text, supported_restrictions, RestrictionUpdate};
pub use config::Config;
pub use db::{create_pool, MealStatus, MealStore, RestrictionStore};
pub use error::{Error, Result};
pub use intent::{Intent, IntentClassifier, Nutrient, Timeframe};
pub use meals::{MealReply, MealType};
pub use models::{DetectedFood, LoggedFood, MealLogRequest};
pub use restrictions::RestrictionSet;
pub use screening::{MealScreener, ScreenedMeal, ScreeningDecision, UnknownIngredientPolicy};
pub use secrets::{DatabaseCredentials, SecretStore};
pub use validation::{MealValidator, ValidationResult, Violation};
