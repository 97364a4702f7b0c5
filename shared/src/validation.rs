//! Meal validation against a user's restrictions.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::allergens::{Allergen, AllergenKnowledgeBase, FoodDetection};
use crate::restrictions::RestrictionSet;

/// How a conflict arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The allergen was declared explicitly.
    Allergen,
    /// The allergen is only forbidden through a dietary preference.
    Preference,
}

/// One forbidden allergen found in one food.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub allergen: Allergen,
    /// Matched keywords belonging to this allergen.
    pub ingredients: Vec<String>,
    pub severity: Severity,
}

/// A food that hit at least one forbidden allergen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub food_name: String,
    pub conflicts: Vec<Conflict>,
}

impl Violation {
    pub fn allergens(&self) -> Vec<Allergen> {
        self.conflicts.iter().map(|c| c.allergen).collect()
    }

    /// Matched keywords across all conflicts, without duplicates.
    pub fn ingredients(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ingredient in self.conflicts.iter().flat_map(|c| &c.ingredients) {
            if !out.contains(ingredient) {
                out.push(ingredient.clone());
            }
        }
        out
    }
}

/// Outcome of validating one meal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub violations: Vec<Violation>,
    pub safe_foods: Vec<String>,
    pub summary: String,
}

impl ValidationResult {
    fn all_safe(foods: &[FoodDetection]) -> Self {
        Self {
            violations: Vec::new(),
            safe_foods: foods.iter().map(|f| f.name.clone()).collect(),
            summary: ALL_SAFE.to_string(),
        }
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// User-facing alert for a blocked meal.
    pub fn format_alert(&self) -> String {
        let mut message = String::from("🚨 DIETARY ALERT\n\n");

        for (severity, heading) in [
            (Severity::Allergen, "⚠️ ALLERGEN WARNING:"),
            (Severity::Preference, "ℹ️ DIETARY PREFERENCE:"),
        ] {
            let lines: Vec<String> = self
                .violations
                .iter()
                .flat_map(|v| {
                    v.conflicts
                        .iter()
                        .filter(move |c| c.severity == severity)
                        .map(move |c| {
                            format!(
                                "• {}: Contains {} ({})",
                                v.food_name,
                                c.allergen.label(),
                                c.ingredients.join(", ")
                            )
                        })
                })
                .collect();

            if !lines.is_empty() {
                message.push_str(heading);
                message.push('\n');
                message.push_str(&lines.join("\n"));
                message.push_str("\n\n");
            }
        }

        if !self.safe_foods.is_empty() {
            let shown = self.safe_foods.iter().take(3).cloned().collect::<Vec<_>>();
            message.push_str(&format!("✓ Safe items: {}", shown.join(", ")));
            if self.safe_foods.len() > 3 {
                message.push_str(&format!(" +{} more", self.safe_foods.len() - 3));
            }
            message.push_str("\n\n");
        }

        message.push_str("This meal was not logged. Reply with a new photo if this was a mistake.");
        message
    }
}

const ALL_SAFE: &str = "All foods are safe";

/// Checks detected foods against the forbidden allergen set.
#[derive(Debug, Clone)]
pub struct MealValidator {
    knowledge_base: Arc<AllergenKnowledgeBase>,
}

impl MealValidator {
    pub fn new(knowledge_base: Arc<AllergenKnowledgeBase>) -> Self {
        Self { knowledge_base }
    }

    pub fn knowledge_base(&self) -> &AllergenKnowledgeBase {
        &self.knowledge_base
    }

    /// Declared allergens plus everything the declared preferences exclude.
    pub fn forbidden_allergens(&self, restrictions: &RestrictionSet) -> BTreeSet<Allergen> {
        let mut forbidden: BTreeSet<Allergen> = restrictions.allergens().iter().copied().collect();
        for preference in restrictions.preferences() {
            forbidden.extend(self.knowledge_base.excluded_by(*preference).iter().copied());
        }
        forbidden
    }

    /// Partition foods into violations and safe foods.
    pub fn validate(&self, foods: &[FoodDetection], restrictions: &RestrictionSet) -> ValidationResult {
        if restrictions.is_empty() {
            return ValidationResult::all_safe(foods);
        }

        let forbidden = self.forbidden_allergens(restrictions);
        let mut violations = Vec::new();
        let mut safe_foods = Vec::new();

        for food in foods {
            let conflicts: Vec<Conflict> = food
                .detected_allergens
                .intersection(&forbidden)
                .map(|allergen| self.conflict(food, *allergen, restrictions))
                .collect();

            if conflicts.is_empty() {
                safe_foods.push(food.name.clone());
            } else {
                violations.push(Violation {
                    food_name: food.name.clone(),
                    conflicts,
                });
            }
        }

        let summary = summarize(&violations);
        ValidationResult {
            violations,
            safe_foods,
            summary,
        }
    }

    fn conflict(
        &self,
        food: &FoodDetection,
        allergen: Allergen,
        restrictions: &RestrictionSet,
    ) -> Conflict {
        let keywords = self.knowledge_base.keywords(allergen);
        let mut ingredients: Vec<String> = food
            .detected_ingredients
            .iter()
            .filter(|ing| keywords.iter().any(|k| ing.contains(k)))
            .cloned()
            .collect();
        if ingredients.is_empty() {
            ingredients.push(allergen.key().to_string());
        }

        let severity = if restrictions.lists_allergen(allergen) {
            Severity::Allergen
        } else {
            Severity::Preference
        };

        Conflict {
            allergen,
            ingredients,
            severity,
        }
    }
}

/// `WARNING: Contains Label (ing, ing), Label2 (ing)`, grouped by allergen in
/// first-seen order with at most two ingredients each.
fn summarize(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return ALL_SAFE.to_string();
    }

    let mut groups: Vec<(Allergen, Vec<String>)> = Vec::new();
    for conflict in violations.iter().flat_map(|v| &v.conflicts) {
        let index = match groups.iter().position(|(a, _)| *a == conflict.allergen) {
            Some(index) => index,
            None => {
                groups.push((conflict.allergen, Vec::new()));
                groups.len() - 1
            }
        };
        let seen = &mut groups[index].1;
        for ingredient in &conflict.ingredients {
            if !seen.contains(ingredient) {
                seen.push(ingredient.clone());
            }
        }
    }

    let parts: Vec<String> = groups
        .iter()
        .map(|(allergen, ingredients)| {
            let shown: Vec<&str> = ingredients.iter().take(2).map(String::as_str).collect();
            format!("{} ({})", allergen.label(), shown.join(", "))
        })
        .collect();

    format!("WARNING: Contains {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allergens::Preference;

    fn validator() -> MealValidator {
        MealValidator::new(Arc::new(AllergenKnowledgeBase::standard()))
    }

    fn detect(name: &str, ingredients: &[&str]) -> FoodDetection {
        let ingredients: Vec<String> = ingredients.iter().map(|s| s.to_string()).collect();
        AllergenKnowledgeBase::standard().detect(name, &ingredients)
    }

    #[test]
    fn test_vegan_expands_to_meat() {
        let v = validator();
        let forbidden = v.forbidden_allergens(&RestrictionSet::parse("vegan"));
        assert!(forbidden.contains(&Allergen::Meat));
        assert!(forbidden.contains(&Allergen::Dairy));
        assert!(!forbidden.contains(&Allergen::Gluten));

        let result = v.validate(
            &[detect("grilled chicken", &["chicken breast"])],
            &RestrictionSet::parse("vegan"),
        );
        assert!(result.has_violations());
        let conflict = &result.violations[0].conflicts[0];
        assert_eq!(conflict.allergen, Allergen::Meat);
        assert_eq!(conflict.severity, Severity::Preference);
    }

    #[test]
    fn test_shrimp_tacos_scenario() {
        let v = validator();
        let foods = [
            detect("shrimp tacos", &["shrimp", "corn tortilla", "cabbage"]),
            detect("rice", &["rice"]),
        ];
        let result = v.validate(&foods, &RestrictionSet::parse("shellfish"));

        assert!(result.has_violations());
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].food_name, "shrimp tacos");
        assert_eq!(result.violations[0].allergens(), vec![Allergen::Shellfish]);
        assert_eq!(result.violations[0].ingredients(), vec!["shrimp"]);
        assert_eq!(result.safe_foods, vec!["rice"]);
        assert_eq!(result.summary, "WARNING: Contains Shellfish (shrimp)");

        let alert = result.format_alert();
        assert!(alert.starts_with("🚨 DIETARY ALERT"));
        assert!(alert.contains("⚠️ ALLERGEN WARNING:\n• shrimp tacos: Contains Shellfish (shrimp)"));
        assert!(!alert.contains("DIETARY PREFERENCE"));
        assert!(alert.contains("✓ Safe items: rice"));
        assert!(alert.contains("not logged"));
    }

    #[test]
    fn test_empty_restrictions_short_circuit() {
        let result = validator().validate(
            &[detect("cheese pizza", &["mozzarella"])],
            &RestrictionSet::default(),
        );
        assert!(!result.has_violations());
        assert_eq!(result.safe_foods, vec!["cheese pizza"]);
        assert_eq!(result.summary, "All foods are safe");
    }

    #[test]
    fn test_every_food_lands_in_one_bucket() {
        let foods = [
            detect("cheese pizza", &["wheat dough", "mozzarella cheese"]),
            detect("salad", &["lettuce", "tomato"]),
            detect("pb toast", &["peanut butter", "bread"]),
        ];
        let result = validator().validate(&foods, &RestrictionSet::parse("dairy"));

        assert_eq!(result.violations.len() + result.safe_foods.len(), foods.len());
        let flagged: Vec<_> = result.violations.iter().map(|v| v.food_name.as_str()).collect();
        assert_eq!(flagged, vec!["cheese pizza", "pb toast"]);
        assert_eq!(result.safe_foods, vec!["salad"]);
        assert_eq!(
            result.summary,
            "WARNING: Contains Dairy (cheese, mozzarella)"
        );
    }

    #[test]
    fn test_summary_groups_across_foods() {
        let foods = [
            detect("latte", &["milk"]),
            detect("bacon", &[]),
            detect("cheese plate", &["cheddar"]),
        ];
        let mut restrictions = RestrictionSet::parse("dairy");
        restrictions.insert(crate::allergens::Restriction::Preference(Preference::Halal));
        let result = validator().validate(&foods, &restrictions);

        assert_eq!(
            result.summary,
            "WARNING: Contains Dairy (milk, cheese), Pork (bacon)"
        );
    }

    #[test]
    fn test_alert_separates_severities_and_caps_safe_items() {
        let foods = [
            detect("ham sandwich", &["ham", "bread"]),
            detect("yogurt", &["yogurt"]),
            detect("apple", &[]),
            detect("banana", &[]),
            detect("rice", &[]),
            detect("grapes", &[]),
            detect("water", &[]),
        ];
        let result = validator().validate(&foods, &RestrictionSet::parse("dairy, vegetarian"));
        let alert = result.format_alert();

        assert!(alert.contains("⚠️ ALLERGEN WARNING:\n• yogurt: Contains Dairy (yogurt)"));
        assert!(alert.contains("ℹ️ DIETARY PREFERENCE:\n• ham sandwich: Contains Meat (ham)"));
        assert!(alert.contains("• ham sandwich: Contains Pork (ham)"));
        assert!(alert.contains("✓ Safe items: apple, banana, rice +2 more"));
    }

    #[test]
    fn test_conflict_falls_back_to_allergen_key() {
        let mut food = detect("mystery", &[]);
        food.detected_allergens.insert(Allergen::Soy);
        let result = validator().validate(&[food], &RestrictionSet::parse("soy"));
        assert_eq!(result.violations[0].conflicts[0].ingredients, vec!["soy"]);
    }
}
