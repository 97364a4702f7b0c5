//! Allergen knowledge base and ingredient matching.
//!
//! The vocabularies (10 allergens, 5 dietary preferences), the trigger
//! keywords per allergen and the allergens each preference forbids all live
//! in the static tables below. [`AllergenKnowledgeBase`] is built from them
//! once at startup and shared read-only.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::DetectedFood;
use crate::{Error, Result};

/// A substance a user avoids for medical or safety reasons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Allergen {
    Dairy,
    Gluten,
    Nuts,
    Shellfish,
    Fish,
    Eggs,
    Soy,
    Meat,
    Pork,
    Alcohol,
}

/// A dietary choice that implies a set of forbidden allergens.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    Vegetarian,
    Vegan,
    Pescatarian,
    Halal,
    Kosher,
}

/// Trigger keywords per allergen, matched as plain substrings.
const ALLERGEN_KEYWORDS: &[(Allergen, &[&str])] = &[
    (
        Allergen::Dairy,
        &[
            "milk", "cheese", "butter", "cream", "yogurt", "whey", "casein", "lactose", "ghee",
            "paneer", "mozzarella", "cheddar", "parmesan",
        ],
    ),
    (
        Allergen::Gluten,
        &[
            "wheat", "bread", "pasta", "flour", "barley", "rye", "couscous", "seitan", "semolina",
            "spelt", "noodle", "tortilla", "pita",
        ],
    ),
    (
        Allergen::Nuts,
        &[
            "almond", "walnut", "cashew", "pecan", "pistachio", "hazelnut", "macadamia", "peanut",
            "nut",
        ],
    ),
    (
        Allergen::Shellfish,
        &[
            "shrimp", "crab", "lobster", "prawn", "crawfish", "clam", "mussel", "oyster",
            "scallop",
        ],
    ),
    (
        Allergen::Fish,
        &[
            "salmon", "tuna", "cod", "tilapia", "fish", "anchovy", "sardine", "halibut", "trout",
            "bass", "mackerel",
        ],
    ),
    (
        Allergen::Eggs,
        &["egg", "omelet", "omelette", "scrambled", "mayonnaise", "meringue"],
    ),
    (
        Allergen::Soy,
        &["soy", "tofu", "edamame", "tempeh", "miso", "soy sauce"],
    ),
    (
        Allergen::Meat,
        &[
            "beef", "pork", "chicken", "turkey", "lamb", "veal", "bacon", "ham", "sausage",
            "steak", "meatball", "burger",
        ],
    ),
    (
        Allergen::Pork,
        &["pork", "bacon", "ham", "sausage", "prosciutto", "pepperoni"],
    ),
    (
        Allergen::Alcohol,
        &["wine", "beer", "vodka", "rum", "whiskey", "sake", "champagne"],
    ),
];

/// Allergens implicitly forbidden by each dietary preference.
const PREFERENCE_EXCLUSIONS: &[(Preference, &[Allergen])] = &[
    (
        Preference::Vegetarian,
        &[Allergen::Meat, Allergen::Pork, Allergen::Fish, Allergen::Shellfish],
    ),
    (
        Preference::Vegan,
        &[
            Allergen::Dairy,
            Allergen::Eggs,
            Allergen::Meat,
            Allergen::Pork,
            Allergen::Fish,
            Allergen::Shellfish,
        ],
    ),
    (Preference::Pescatarian, &[Allergen::Meat, Allergen::Pork]),
    (Preference::Halal, &[Allergen::Pork, Allergen::Alcohol]),
    (Preference::Kosher, &[Allergen::Pork, Allergen::Shellfish]),
];

impl Allergen {
    pub const ALL: [Allergen; 10] = [
        Allergen::Dairy,
        Allergen::Gluten,
        Allergen::Nuts,
        Allergen::Shellfish,
        Allergen::Fish,
        Allergen::Eggs,
        Allergen::Soy,
        Allergen::Meat,
        Allergen::Pork,
        Allergen::Alcohol,
    ];

    /// Canonical lowercase key, as stored on the user record.
    pub fn key(self) -> &'static str {
        match self {
            Allergen::Dairy => "dairy",
            Allergen::Gluten => "gluten",
            Allergen::Nuts => "nuts",
            Allergen::Shellfish => "shellfish",
            Allergen::Fish => "fish",
            Allergen::Eggs => "eggs",
            Allergen::Soy => "soy",
            Allergen::Meat => "meat",
            Allergen::Pork => "pork",
            Allergen::Alcohol => "alcohol",
        }
    }

    /// Title-cased name shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Allergen::Dairy => "Dairy",
            Allergen::Gluten => "Gluten",
            Allergen::Nuts => "Nuts",
            Allergen::Shellfish => "Shellfish",
            Allergen::Fish => "Fish",
            Allergen::Eggs => "Eggs",
            Allergen::Soy => "Soy",
            Allergen::Meat => "Meat",
            Allergen::Pork => "Pork",
            Allergen::Alcohol => "Alcohol",
        }
    }

    /// Singular spellings users type for plural keys.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Allergen::Nuts => &["nut"],
            Allergen::Eggs => &["egg"],
            _ => &[],
        }
    }
}

impl Preference {
    pub const ALL: [Preference; 5] = [
        Preference::Vegetarian,
        Preference::Vegan,
        Preference::Pescatarian,
        Preference::Halal,
        Preference::Kosher,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Preference::Vegetarian => "vegetarian",
            Preference::Vegan => "vegan",
            Preference::Pescatarian => "pescatarian",
            Preference::Halal => "halal",
            Preference::Kosher => "kosher",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preference::Vegetarian => "Vegetarian",
            Preference::Vegan => "Vegan",
            Preference::Pescatarian => "Pescatarian",
            Preference::Halal => "Halal",
            Preference::Kosher => "Kosher",
        }
    }
}

/// Either side of the restriction vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Restriction {
    Allergen(Allergen),
    Preference(Preference),
}

impl Restriction {
    /// Every restriction, allergens first.
    pub fn all() -> impl Iterator<Item = Restriction> {
        Allergen::ALL
            .into_iter()
            .map(Restriction::Allergen)
            .chain(Preference::ALL.into_iter().map(Restriction::Preference))
    }

    pub fn key(self) -> &'static str {
        match self {
            Restriction::Allergen(a) => a.key(),
            Restriction::Preference(p) => p.key(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Restriction::Allergen(a) => a.label(),
            Restriction::Preference(p) => p.label(),
        }
    }

    /// Every spelling that names this restriction: the key plus aliases.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        let aliases: &'static [&'static str] = match self {
            Restriction::Allergen(a) => a.aliases(),
            Restriction::Preference(_) => &[],
        };
        std::iter::once(self.key()).chain(aliases.iter().copied())
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Restriction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_lowercase();
        Restriction::all()
            .find(|r| r.names().any(|name| name == token))
            .ok_or_else(|| Error::InvalidInput(format!("unknown restriction: {}", s.trim())))
    }
}

/// Keywords that trigger one allergen.
#[derive(Debug, Clone)]
pub struct AllergenEntry {
    pub allergen: Allergen,
    pub keywords: Vec<&'static str>,
}

/// Allergens one preference rules out.
#[derive(Debug, Clone)]
pub struct PreferenceEntry {
    pub preference: Preference,
    pub excludes: Vec<Allergen>,
}

/// Read-only lookup tables used by matching and validation.
#[derive(Debug, Clone)]
pub struct AllergenKnowledgeBase {
    allergens: Vec<AllergenEntry>,
    preferences: Vec<PreferenceEntry>,
}

impl Default for AllergenKnowledgeBase {
    fn default() -> Self {
        Self::standard()
    }
}

impl AllergenKnowledgeBase {
    /// Build the knowledge base from the built-in tables.
    pub fn standard() -> Self {
        Self {
            allergens: ALLERGEN_KEYWORDS
                .iter()
                .map(|(allergen, keywords)| AllergenEntry {
                    allergen: *allergen,
                    keywords: keywords.to_vec(),
                })
                .collect(),
            preferences: PREFERENCE_EXCLUSIONS
                .iter()
                .map(|(preference, excludes)| PreferenceEntry {
                    preference: *preference,
                    excludes: excludes.to_vec(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[AllergenEntry] {
        &self.allergens
    }

    /// Trigger keywords for an allergen.
    pub fn keywords(&self, allergen: Allergen) -> &[&'static str] {
        self.allergens
            .iter()
            .find(|entry| entry.allergen == allergen)
            .map(|entry| entry.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// Allergens a preference forbids.
    pub fn excluded_by(&self, preference: Preference) -> &[Allergen] {
        self.preferences
            .iter()
            .find(|entry| entry.preference == preference)
            .map(|entry| entry.excludes.as_slice())
            .unwrap_or(&[])
    }

    /// Match a food's name and ingredients against every allergen's keywords.
    ///
    /// Matching is exact substring containment over the lowercased name and
    /// ingredients. Ingredients are joined with newlines so a keyword never
    /// spans two entries.
    pub fn detect(&self, food_name: &str, ingredients: &[String]) -> FoodDetection {
        let corpus = std::iter::once(food_name)
            .chain(ingredients.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();

        let mut detected_allergens = BTreeSet::new();
        let mut detected_ingredients: Vec<String> = Vec::new();

        for entry in &self.allergens {
            for keyword in &entry.keywords {
                if corpus.contains(keyword) {
                    detected_allergens.insert(entry.allergen);
                    if !detected_ingredients.iter().any(|k| k == keyword) {
                        detected_ingredients.push((*keyword).to_string());
                    }
                }
            }
        }

        FoodDetection {
            name: food_name.to_string(),
            ingredients: ingredients.to_vec(),
            detected_allergens,
            detected_ingredients,
        }
    }

    /// Run [`detect`](Self::detect) on one item from the vision step.
    pub fn detect_food(&self, food: &DetectedFood) -> FoodDetection {
        self.detect(&food.name, &food.ingredients)
    }
}

/// Allergen matches for a single food item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodDetection {
    pub name: String,
    pub ingredients: Vec<String>,
    pub detected_allergens: BTreeSet<Allergen>,
    /// Trigger keywords that matched, first-seen order, no duplicates.
    pub detected_ingredients: Vec<String>,
}

impl FoodDetection {
    /// True when nothing about this food could be checked: no ingredient
    /// list and no match on the name alone.
    pub fn is_unverified(&self) -> bool {
        self.ingredients.iter().all(|i| i.trim().is_empty()) && self.detected_allergens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cheese_pizza_detects_dairy_and_gluten() {
        let kb = AllergenKnowledgeBase::standard();
        let detection = kb.detect(
            "cheese pizza",
            &strings(&["wheat dough", "mozzarella cheese", "tomato sauce"]),
        );

        assert_eq!(
            detection.detected_allergens,
            BTreeSet::from([Allergen::Dairy, Allergen::Gluten])
        );
        assert_eq!(
            detection.detected_ingredients,
            vec!["cheese", "mozzarella", "wheat"]
        );
    }

    #[test]
    fn test_shrimp_pasta_matches_three_allergens() {
        let kb = AllergenKnowledgeBase::standard();
        let detection = kb.detect("shrimp pasta", &strings(&["shrimp", "pasta", "garlic butter"]));

        assert!(detection.detected_allergens.contains(&Allergen::Shellfish));
        assert!(detection.detected_allergens.contains(&Allergen::Gluten));
        assert!(detection.detected_allergens.contains(&Allergen::Dairy));
    }

    #[test]
    fn test_name_alone_is_searched() {
        let kb = AllergenKnowledgeBase::standard();
        let detection = kb.detect("Bacon Sandwich", &[]);

        assert!(detection.detected_allergens.contains(&Allergen::Meat));
        assert!(detection.detected_allergens.contains(&Allergen::Pork));
        assert_eq!(detection.detected_ingredients, vec!["bacon"]);
    }

    #[test]
    fn test_no_match_and_unverified() {
        let kb = AllergenKnowledgeBase::standard();

        let rice = kb.detect("rice", &strings(&["rice"]));
        assert!(rice.detected_allergens.is_empty());
        assert!(!rice.is_unverified());

        let mystery = kb.detect("mystery bowl", &[]);
        assert!(mystery.is_unverified());
    }

    #[test]
    fn test_keywords_do_not_span_ingredients() {
        let kb = AllergenKnowledgeBase::standard();
        // "co" + "d..." must not join into "cod"
        let detection = kb.detect("salad", &strings(&["taco", "dill"]));
        assert!(!detection.detected_allergens.contains(&Allergen::Fish));
    }

    #[test]
    fn test_preference_expansion_table() {
        let kb = AllergenKnowledgeBase::standard();

        let vegan = kb.excluded_by(Preference::Vegan);
        for allergen in [
            Allergen::Dairy,
            Allergen::Eggs,
            Allergen::Meat,
            Allergen::Pork,
            Allergen::Fish,
            Allergen::Shellfish,
        ] {
            assert!(vegan.contains(&allergen), "vegan should exclude {:?}", allergen);
        }
        assert_eq!(kb.excluded_by(Preference::Pescatarian), &[Allergen::Meat, Allergen::Pork]);
        assert_eq!(kb.excluded_by(Preference::Halal), &[Allergen::Pork, Allergen::Alcohol]);
        assert_eq!(kb.excluded_by(Preference::Kosher), &[Allergen::Pork, Allergen::Shellfish]);
    }

    #[test]
    fn test_every_allergen_has_keywords() {
        let kb = AllergenKnowledgeBase::standard();
        for allergen in Allergen::ALL {
            assert!(!kb.keywords(allergen).is_empty(), "{:?} has no keywords", allergen);
        }
        assert_eq!(kb.entries().len(), 10);
    }

    #[test]
    fn test_restriction_from_str() {
        assert_eq!(
            "  DAIRY ".parse::<Restriction>().unwrap(),
            Restriction::Allergen(Allergen::Dairy)
        );
        assert_eq!(
            "egg".parse::<Restriction>().unwrap(),
            Restriction::Allergen(Allergen::Eggs)
        );
        assert_eq!(
            "Vegan".parse::<Restriction>().unwrap(),
            Restriction::Preference(Preference::Vegan)
        );
        assert!("keto".parse::<Restriction>().is_err());
    }

    #[test]
    fn test_restriction_serializes_as_key() {
        let json = serde_json::to_string(&Restriction::Preference(Preference::Halal)).unwrap();
        assert_eq!(json, "\"halal\"");
        let back: Restriction = serde_json::from_str("\"shellfish\"").unwrap();
        assert_eq!(back, Restriction::Allergen(Allergen::Shellfish));
    }
}
