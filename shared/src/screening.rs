//! Meal photo screening: the gate between food recognition and logging.
//!
//! A meal only proceeds to logging when every recognised food passes the
//! user's restrictions. Anything that goes wrong along the way blocks the
//! meal instead of letting it through.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::allergens::{AllergenKnowledgeBase, FoodDetection};
use crate::models::{DetectedFood, LoggedFood};
use crate::restrictions::RestrictionSet;
use crate::validation::MealValidator;
use crate::{Error, Result};

/// Below this average confidence the photo is treated as not food.
pub const MIN_FOOD_CONFIDENCE: f64 = 0.3;

pub const MEAL_TYPE_PROMPT: &str = "Is this breakfast, lunch, dinner, or snack?";

const NOT_FOOD_REPLY: &str = "🤔 I couldn't spot any food in that photo. \
Try a clearer, well-lit shot of your meal.";

const SCREENING_FAILED_REPLY: &str = "⚠️ I couldn't check this meal against your dietary \
restrictions, so it wasn't logged. Please try again in a moment.";

/// What to do with foods whose ingredients could not be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownIngredientPolicy {
    /// Log the meal and add a caution line.
    #[default]
    Allow,
    /// Refuse to log the meal.
    Block,
}

impl FromStr for UnknownIngredientPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            other => Err(Error::Config(format!(
                "UNKNOWN_INGREDIENTS must be allow or block, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for UnknownIngredientPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// A meal that passed screening.
#[derive(Debug, Clone)]
pub struct ScreenedMeal {
    pub foods: Vec<DetectedFood>,
    pub detections: Vec<FoodDetection>,
    /// Foods logged without an ingredient check.
    pub unverified: Vec<String>,
    pub restrictions: RestrictionSet,
}

impl ScreenedMeal {
    /// Reply listing what was recognised, ending with the meal-type prompt.
    pub fn confirmation(&self) -> String {
        let items: Vec<String> = self
            .foods
            .iter()
            .map(|food| {
                if food.portion_grams > 0.0 {
                    format!("• {} ({:.0}g)", food.name, food.portion_grams)
                } else {
                    format!("• {}", food.name)
                }
            })
            .collect();

        let mut message = format!("✅ Got it! I see:\n{}", items.join("\n"));

        if !self.unverified.is_empty() {
            message.push_str(&format!(
                "\n\n⚠️ Couldn't verify ingredients for: {}. Double-check against your restrictions ({}).",
                self.unverified.join(", "),
                self.restrictions.display()
            ));
        }

        message.push_str("\n\n");
        message.push_str(MEAL_TYPE_PROMPT);
        message
    }

    /// Foods paired with their detections, for the meal logger.
    pub fn logged_foods(&self) -> Vec<LoggedFood> {
        self.foods
            .iter()
            .cloned()
            .zip(self.detections.iter().cloned())
            .map(|(food, detection)| LoggedFood { food, detection })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ScreeningDecision {
    /// Safe to log; ask for the meal type.
    Proceed(ScreenedMeal),
    /// Must not be logged.
    Blocked { reply: String },
    /// The photo did not look like food.
    NotFood { reply: String },
}

impl ScreeningDecision {
    pub fn reply(&self) -> String {
        match self {
            ScreeningDecision::Proceed(meal) => meal.confirmation(),
            ScreeningDecision::Blocked { reply } | ScreeningDecision::NotFood { reply } => {
                reply.clone()
            }
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ScreeningDecision::Blocked { .. })
    }
}

/// Runs detection and validation over a recognised meal.
#[derive(Debug, Clone)]
pub struct MealScreener {
    validator: MealValidator,
    policy: UnknownIngredientPolicy,
}

impl MealScreener {
    pub fn new(knowledge_base: Arc<AllergenKnowledgeBase>, policy: UnknownIngredientPolicy) -> Self {
        Self {
            validator: MealValidator::new(knowledge_base),
            policy,
        }
    }

    /// Screen the outcome of the collaborator calls. Any error blocks.
    pub fn screen_detection(
        &self,
        detected: Result<Vec<DetectedFood>>,
        stored_restrictions: Result<Option<String>>,
    ) -> ScreeningDecision {
        let foods = match detected {
            Ok(foods) => foods,
            Err(e) => {
                error!("Food detection failed, blocking meal: {}", e);
                return Self::failed();
            }
        };
        let stored = match stored_restrictions {
            Ok(stored) => stored,
            Err(e) => {
                error!("Restriction lookup failed, blocking meal: {}", e);
                return Self::failed();
            }
        };

        self.screen(&foods, stored.as_deref())
    }

    /// Decide whether a recognised meal may be logged.
    pub fn screen(&self, foods: &[DetectedFood], stored_restrictions: Option<&str>) -> ScreeningDecision {
        if is_not_food(foods) {
            info!(count = foods.len(), "Photo rejected as not food");
            return ScreeningDecision::NotFood {
                reply: NOT_FOOD_REPLY.to_string(),
            };
        }

        let restrictions = RestrictionSet::from_stored(stored_restrictions);
        let knowledge_base = self.validator.knowledge_base();
        let detections: Vec<FoodDetection> =
            foods.iter().map(|food| knowledge_base.detect_food(food)).collect();

        let unverified: Vec<String> = if restrictions.is_empty() {
            Vec::new()
        } else {
            detections
                .iter()
                .filter(|d| d.is_unverified())
                .map(|d| d.name.clone())
                .collect()
        };

        let result = self.validator.validate(&detections, &restrictions);
        if result.has_violations() {
            warn!(
                violations = result.violations.len(),
                summary = %result.summary,
                "Meal blocked by dietary restrictions"
            );
            return ScreeningDecision::Blocked {
                reply: result.format_alert(),
            };
        }

        if !unverified.is_empty() && self.policy == UnknownIngredientPolicy::Block {
            warn!(foods = ?unverified, "Meal blocked, ingredients unverified");
            return ScreeningDecision::Blocked {
                reply: format!(
                    "⚠️ I couldn't verify the ingredients of: {}. Because you have dietary \
                     restrictions ({}), this meal wasn't logged. Add a caption listing the \
                     ingredients and send the photo again.",
                    unverified.join(", "),
                    restrictions.display()
                ),
            };
        }

        ScreeningDecision::Proceed(ScreenedMeal {
            foods: foods.to_vec(),
            detections,
            unverified,
            restrictions,
        })
    }

    fn failed() -> ScreeningDecision {
        ScreeningDecision::Blocked {
            reply: SCREENING_FAILED_REPLY.to_string(),
        }
    }
}

fn is_not_food(foods: &[DetectedFood]) -> bool {
    if foods.is_empty() {
        return true;
    }
    let average = foods.iter().map(|f| f.confidence).sum::<f64>() / foods.len() as f64;
    !average.is_finite() || average < MIN_FOOD_CONFIDENCE
}
