//! Wire types exchanged with the vision and meal-logging Lambdas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allergens::FoodDetection;
use crate::meals::MealType;
use crate::{Error, Result};

/// One food item recognised in a meal photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFood {
    pub name: String,
    #[serde(default)]
    pub portion_grams: f64,
    /// Recognition confidence, 0..1
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Request to the food vision function.
#[derive(Debug, Serialize)]
pub struct VisionRequest {
    pub image_url: String,
    pub caption: Option<String>,
}

/// Response from the food vision function.
#[derive(Debug, Deserialize)]
pub struct VisionResponse {
    pub status: String,
    pub foods: Option<Vec<DetectedFood>>,
    pub error: Option<String>,
}

impl VisionResponse {
    /// Extract the food list, rejecting error statuses and missing lists.
    pub fn into_foods(self) -> Result<Vec<DetectedFood>> {
        if self.status == "error" {
            return Err(Error::Aws(
                self.error
                    .unwrap_or_else(|| "vision function returned an error".to_string()),
            ));
        }
        self.foods
            .ok_or_else(|| Error::InvalidInput("vision response has no food list".to_string()))
    }
}

/// A food together with its allergen matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedFood {
    #[serde(flatten)]
    pub food: DetectedFood,
    pub detection: FoodDetection,
}

/// Asynchronous request to persist an accepted meal.
///
/// The logger upserts on `request_id`, so sending the same request again
/// with another meal type relabels the meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogRequest {
    pub request_id: Uuid,
    pub phone_number: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub foods: Vec<LoggedFood>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    pub received_at: DateTime<Utc>,
}

impl MealLogRequest {
    pub fn new(
        phone_number: &str,
        image_url: &str,
        caption: Option<String>,
        foods: Vec<LoggedFood>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            phone_number: phone_number.to_string(),
            image_url: image_url.to_string(),
            caption,
            foods,
            meal_type: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_meal_type(mut self, meal_type: MealType) -> Self {
        self.meal_type = Some(meal_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_food_defaults() {
        let food: DetectedFood = serde_json::from_str(r#"{"name":"apple"}"#).unwrap();
        assert_eq!(food.name, "apple");
        assert!(food.ingredients.is_empty());
        assert_eq!(food.confidence, 0.0);
    }

    #[test]
    fn test_vision_response_without_foods_is_invalid_input() {
        let response: VisionResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(matches!(response.into_foods(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_vision_error_status() {
        let response: VisionResponse =
            serde_json::from_str(r#"{"status":"error","error":"model timeout"}"#).unwrap();
        let err = response.into_foods().unwrap_err();
        assert!(matches!(err, Error::Aws(ref msg) if msg == "model timeout"));
    }

    #[test]
    fn test_vision_response_foods() {
        let response: VisionResponse = serde_json::from_str(
            r#"{"status":"success","foods":[{"name":"rice","portion_grams":150,"confidence":0.9,"ingredients":["rice"]}]}"#,
        )
        .unwrap();
        let foods = response.into_foods().unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].portion_grams, 150.0);
    }

    #[test]
    fn test_meal_log_request_has_fresh_id() {
        let a = MealLogRequest::new("whatsapp:+15551234567", "https://img", None, vec![]);
        let b = MealLogRequest::new("whatsapp:+15551234567", "https://img", None, vec![]);
        assert_ne!(a.request_id, b.request_id);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["phone_number"], "whatsapp:+15551234567");
        assert!(json["meal_type"].is_null());
    }

    #[test]
    fn test_meal_type_keeps_request_id_and_survives_storage() {
        let pending = MealLogRequest::new("whatsapp:+1", "https://img", Some("lunch".into()), vec![]);
        let labelled = pending.clone().with_meal_type(MealType::Lunch);
        assert_eq!(labelled.request_id, pending.request_id);

        let json = serde_json::to_value(&labelled).unwrap();
        assert_eq!(json["meal_type"], "lunch");
        let restored: MealLogRequest = serde_json::from_value(json).unwrap();
        assert_eq!(restored, labelled);
    }
}
