//! Configuration management for the webhook Lambda.

use std::env;

use crate::screening::UnknownIngredientPolicy;
use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: String,
    /// ARN of the secret holding the Twilio auth token
    pub twilio_auth_token_secret_arn: String,
    /// Public URL Twilio posts to; part of the signed payload
    pub webhook_url: String,
    /// Lambda answering nutrition questions
    pub agent_function_name: String,
    /// Lambda identifying foods in a photo
    pub vision_function_name: String,
    /// Lambda persisting accepted meals
    pub meal_logger_function_name: String,
    /// What to do with foods the vision step returned no ingredients for
    pub unknown_ingredients: UnknownIngredientPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} not set", key)))
        };
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let unknown_ingredients = match lookup("UNKNOWN_INGREDIENTS") {
            Some(value) => value.parse()?,
            None => UnknownIngredientPolicy::default(),
        };

        Ok(Self {
            db_host: required("DATABASE_HOST")?,
            db_name: or_default("DATABASE_NAME", "nutrition"),
            db_secret_arn: required("DATABASE_URL_SECRET_ARN")?,
            twilio_auth_token_secret_arn: required("TWILIO_AUTH_TOKEN_SECRET_ARN")?,
            webhook_url: required("TWILIO_WEBHOOK_URL")?,
            agent_function_name: or_default("NUTRITION_AGENT_FUNCTION", "nutrition-agent"),
            vision_function_name: or_default("FOOD_VISION_FUNCTION", "food-vision"),
            meal_logger_function_name: or_default("MEAL_LOGGER_FUNCTION", "meal-logger"),
            unknown_ingredients,
        })
    }
}
