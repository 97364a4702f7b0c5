//! Property tests over the classification and validation core.

use std::sync::Arc;

use proptest::prelude::*;
use shared::{
    Allergen, AllergenKnowledgeBase, DetectedFood, Intent, IntentClassifier, MealLogRequest,
    MealReply, MealScreener, MealType, MealValidator, RestrictionSet, ScreeningDecision,
    UnknownIngredientPolicy,
};

const FOOD_NAMES: &[&str] = &[
    "cheese pizza",
    "shrimp tacos",
    "green salad",
    "rice",
    "bacon burger",
    "tofu stir fry",
    "apple",
    "salmon roll",
    "peanut noodles",
    "omelette",
];

const INGREDIENTS: &[&str] = &[
    "mozzarella", "wheat flour", "shrimp", "corn tortilla", "lettuce", "tomato", "bacon",
    "beef patty", "tofu", "soy sauce", "salmon", "peanut", "egg", "butter", "rice", "wine",
];

const TOKENS: &[&str] = &[
    "dairy", "gluten", "nuts", "nut", "shellfish", "fish", "eggs", "egg", "soy", "meat", "pork",
    "alcohol", "vegetarian", "vegan", "pescatarian", "halal", "kosher", "keto", "paleo", "and",
    "DAIRY", "Vegan",
];

const PHRASES: &[&str] = &[
    "show my restrictions",
    "what is my allegy",
    "add dairy",
    "remove shellfish",
    "i'm allergic to nuts",
    "my goal is 2000 calories",
    "what did i eat yesterday",
    "how am i doing today",
    "how much protein this week",
    "compare monday vs tuesday",
    "what should i eat",
    "help",
];

fn food_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        proptest::sample::select(FOOD_NAMES),
        proptest::collection::vec(proptest::sample::select(INGREDIENTS), 0..4),
    )
        .prop_map(|(name, ingredients)| {
            (
                name.to_string(),
                ingredients.into_iter().map(String::from).collect(),
            )
        })
}

fn restriction_strategy() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(proptest::sample::select(TOKENS), 0..6),
        proptest::sample::select(&[",", ", ", " ", " , "][..]),
    )
        .prop_map(|(tokens, separator)| tokens.join(separator))
}

proptest! {
    /// Every food lands in exactly one of violations or safe foods, in order.
    #[test]
    fn validation_partitions_foods(
        foods in proptest::collection::vec(food_strategy(), 0..8),
        raw in restriction_strategy(),
    ) {
        // Unique names so order can be checked.
        let foods: Vec<(String, Vec<String>)> = foods
            .into_iter()
            .enumerate()
            .map(|(i, (name, ingredients))| (format!("{} #{}", name, i), ingredients))
            .collect();
        let kb = Arc::new(AllergenKnowledgeBase::standard());
        let detections: Vec<_> = foods
            .iter()
            .map(|(name, ingredients)| kb.detect(name, ingredients))
            .collect();
        let result = MealValidator::new(kb).validate(&detections, &RestrictionSet::parse(&raw));

        prop_assert_eq!(result.violations.len() + result.safe_foods.len(), foods.len());
        prop_assert_eq!(result.has_violations(), !result.violations.is_empty());
        prop_assert_eq!(
            result.summary == "All foods are safe",
            result.violations.is_empty()
        );

        let mut violations = result.violations.iter();
        let mut safe = result.safe_foods.iter();
        let mut next_violation = violations.next();
        let mut next_safe = safe.next();
        for (name, _) in &foods {
            if next_violation.map(|v| &v.food_name) == Some(name) {
                next_violation = violations.next();
            } else {
                prop_assert_eq!(next_safe, Some(name));
                next_safe = safe.next();
            }
        }
        prop_assert!(next_violation.is_none());
        prop_assert!(next_safe.is_none());
    }

    /// Reparsing a stored or displayed set gives the same set.
    #[test]
    fn parse_is_idempotent(raw in restriction_strategy()) {
        let parsed = RestrictionSet::parse(&raw);
        let stored = parsed.to_stored();

        prop_assert_eq!(&RestrictionSet::from_stored(stored.as_deref()), &parsed);
        prop_assert_eq!(&RestrictionSet::parse(parsed.display()), &parsed);
    }

    /// Parsing arbitrary text never panics and only yields known members.
    #[test]
    fn parse_accepts_any_text(raw in ".{0,64}") {
        let parsed = RestrictionSet::parse(&raw);
        prop_assert_eq!(parsed.is_empty(), parsed.display() == "None");
        for allergen in parsed.allergens() {
            prop_assert!(Allergen::ALL.contains(allergen));
        }
    }

    /// Case and surrounding whitespace never change the intent.
    #[test]
    fn classification_ignores_case_and_padding(
        text in prop_oneof![
            proptest::sample::select(PHRASES).prop_map(String::from),
            "[a-z ]{0,40}",
        ],
        left in "[ \t]{0,3}",
        right in "[ \t\n]{0,3}",
    ) {
        let classifier = IntentClassifier::new().unwrap();
        let expected = classifier.classify(&text);

        prop_assert_eq!(classifier.classify(&text.to_uppercase()), expected);
        prop_assert_eq!(classifier.classify(&format!("{}{}{}", left, text, right)), expected);
    }
}

#[test]
fn shrimp_tacos_end_to_end() {
    let classifier = IntentClassifier::new().unwrap();
    assert_eq!(classifier.classify("my allergies are shellfish"), Intent::SetRestrictions);
    let update = shared::handle_restriction_intent(
        &Intent::SetRestrictions,
        None,
        "my allergies are shellfish",
    )
    .unwrap();
    let stored = update.store.flatten();
    assert_eq!(stored.as_deref(), Some("shellfish"));

    let screener = MealScreener::new(
        Arc::new(AllergenKnowledgeBase::standard()),
        UnknownIngredientPolicy::Allow,
    );
    let foods = vec![
        DetectedFood {
            name: "shrimp tacos".to_string(),
            portion_grams: 250.0,
            confidence: 0.92,
            ingredients: vec![
                "shrimp".to_string(),
                "corn tortilla".to_string(),
                "cabbage".to_string(),
            ],
        },
        DetectedFood {
            name: "rice".to_string(),
            portion_grams: 150.0,
            confidence: 0.88,
            ingredients: vec!["rice".to_string()],
        },
    ];

    let decision = screener.screen_detection(Ok(foods), Ok(stored));
    let ScreeningDecision::Blocked { reply } = decision else {
        panic!("shrimp tacos must be blocked for a shellfish allergy");
    };
    assert!(reply.contains("🚨 DIETARY ALERT"));
    assert!(reply.contains("• shrimp tacos: Contains Shellfish (shrimp)"));
    assert!(reply.contains("✓ Safe items: rice"));
    assert!(!reply.contains("breakfast, lunch, dinner, or snack"));
}

#[test]
fn safe_meal_waits_for_meal_type() {
    let classifier = IntentClassifier::new().unwrap();
    let screener = MealScreener::new(
        Arc::new(AllergenKnowledgeBase::standard()),
        UnknownIngredientPolicy::Allow,
    );
    let foods = vec![DetectedFood {
        name: "green salad".to_string(),
        portion_grams: 180.0,
        confidence: 0.9,
        ingredients: vec!["lettuce".to_string(), "tomato".to_string()],
    }];

    let decision = screener.screen(&foods, Some("dairy"));
    assert!(decision.reply().ends_with("Is this breakfast, lunch, dinner, or snack?"));
    let ScreeningDecision::Proceed(meal) = decision else {
        panic!("salad is safe for a dairy allergy");
    };
    let pending = MealLogRequest::new("whatsapp:+15551234567", "https://img/1", None, meal.logged_foods());
    assert_eq!(pending.meal_type, None);

    // the bare answer is not a request the classifier knows
    let intent = classifier.classify("lunch");
    assert_eq!(intent, Intent::General);
    let Some(MealReply::Confirm(meal_type)) = MealReply::from_message("lunch", true, &intent) else {
        panic!("\"lunch\" must answer the pending meal");
    };
    let logged = pending.clone().with_meal_type(meal_type);
    assert_eq!(logged.meal_type, Some(MealType::Lunch));
    assert_eq!(logged.request_id, pending.request_id);

    let intent = classifier.classify("change to dinner");
    assert_eq!(
        MealReply::from_message("change to dinner", false, &intent),
        Some(MealReply::Change(MealType::Dinner))
    );
}
