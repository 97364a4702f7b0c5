//! Meal-type follow-ups after a photo has been screened.
//!
//! A safe meal waits for the user to say which meal it was. The answer
//! completes it; a later "change to <meal>" relabels the last logged meal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::{normalize, Intent};

pub const MEAL_TYPE_REPROMPT: &str =
    "Please reply with: breakfast, lunch, dinner, or snack. You can also use numbers 1 through 4.";

pub const CHANGE_MEAL_TYPE_HELP: &str = "Please specify: 'change to breakfast', \
'change to lunch', 'change to dinner', or 'change to snack'";

pub const NO_MEAL_TO_UPDATE: &str = "No recent meal found to update.";

const CHANGE_PHRASE: &str = "change to";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

const MEAL_KEYWORDS: &[(MealType, &[&str])] = &[
    (MealType::Breakfast, &["breakfast", "morning"]),
    (MealType::Lunch, &["lunch", "noon"]),
    (MealType::Dinner, &["dinner", "supper", "evening"]),
    (MealType::Snack, &["snack"]),
];

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }

    /// Meal type named in free text, or a bare 1-4 in prompt order.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = normalize(text);
        if let Ok(n) = text.trim_end_matches(['.', '!']).parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        MEAL_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|word| text.contains(word)))
            .map(|(meal_type, _)| *meal_type)
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a text message relates to the user's meals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealReply {
    /// Answer to the meal-type prompt.
    Confirm(MealType),
    /// Pending meal, but the message names no meal type.
    Reprompt,
    /// Relabel the last logged meal.
    Change(MealType),
    /// "change to" without a recognisable meal type.
    ChangeHelp,
}

impl MealReply {
    /// Decide whether a text message is about a meal.
    ///
    /// With a meal awaiting its type, anything naming a meal type answers
    /// it. Messages that classify as a real request keep their normal route
    /// so the user is never stuck behind the prompt.
    pub fn from_message(text: &str, awaiting_meal_type: bool, intent: &Intent) -> Option<Self> {
        let meal_type = MealType::from_text(text);

        if awaiting_meal_type {
            return match meal_type {
                Some(meal_type) => Some(MealReply::Confirm(meal_type)),
                None if *intent == Intent::General => Some(MealReply::Reprompt),
                None => None,
            };
        }

        if normalize(text).contains(CHANGE_PHRASE) {
            return Some(meal_type.map_or(MealReply::ChangeHelp, MealReply::Change));
        }
        None
    }
}

pub fn logged_reply(meal_type: MealType) -> String {
    format!(
        "✅ Logged as {}! Reply \"change to <meal>\" if that's not right.",
        meal_type.label()
    )
}

pub fn changed_reply(meal_type: MealType) -> String {
    format!(
        "Updated! Your last meal is now logged as {}.",
        meal_type.label()
    )
}
