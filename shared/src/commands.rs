//! Restriction management commands and canned help replies.
//!
//! Commands are pure: they take the stored restriction string and return
//! the reply plus the value to write back, if any.

use crate::allergens::{Allergen, Preference, Restriction};
use crate::intent::Intent;
use crate::restrictions::RestrictionSet;

/// Result of a restriction command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionUpdate {
    pub reply: String,
    /// `Some(value)` when the stored column must be rewritten. The inner
    /// `None` clears it.
    pub store: Option<Option<String>>,
}

impl RestrictionUpdate {
    fn reply_only(reply: String) -> Self {
        Self { reply, store: None }
    }

    fn write(reply: String, set: &RestrictionSet) -> Self {
        Self {
            reply,
            store: Some(set.to_stored()),
        }
    }
}

/// Run the command for a restriction intent. Returns `None` for any other
/// intent.
pub fn handle_restriction_intent(
    intent: &Intent,
    stored: Option<&str>,
    message: &str,
) -> Option<RestrictionUpdate> {
    let current = RestrictionSet::from_stored(stored);

    let update = match intent {
        Intent::ViewRestrictions => view(&current),
        Intent::SetRestrictions => set(message),
        Intent::AddRestriction { restriction } => add(current, *restriction),
        Intent::RemoveRestriction { restriction } => remove(current, *restriction),
        _ => return None,
    };
    Some(update)
}

fn view(current: &RestrictionSet) -> RestrictionUpdate {
    if current.is_empty() {
        return RestrictionUpdate::reply_only(format!(
            "You don't have any dietary restrictions set.\n\n{}",
            supported_restrictions()
        ));
    }
    RestrictionUpdate::reply_only(format!(
        "🥗 Your dietary restrictions: {}\n\nSay \"add <item>\" or \"remove <item>\" to change them.",
        current.display()
    ))
}

fn set(message: &str) -> RestrictionUpdate {
    let parsed = RestrictionSet::parse(message);
    if parsed.is_empty() {
        return RestrictionUpdate::reply_only(format!(
            "I didn't recognise any restrictions in that message.\n\n{}",
            supported_restrictions()
        ));
    }
    RestrictionUpdate::write(
        format!(
            "✅ Dietary restrictions saved: {}\n\nI'll warn you before logging any meal that conflicts.",
            parsed.display()
        ),
        &parsed,
    )
}

fn add(mut current: RestrictionSet, restriction: Restriction) -> RestrictionUpdate {
    if !current.insert(restriction) {
        return RestrictionUpdate::reply_only(format!(
            "{} is already in your restrictions ({}).",
            restriction.label(),
            current.display()
        ));
    }
    RestrictionUpdate::write(
        format!(
            "✅ Added {}. Your restrictions: {}",
            restriction.label(),
            current.display()
        ),
        &current,
    )
}

fn remove(mut current: RestrictionSet, restriction: Restriction) -> RestrictionUpdate {
    if !current.remove(restriction) {
        return RestrictionUpdate::reply_only(format!(
            "{} isn't in your restrictions ({}).",
            restriction.label(),
            current.display()
        ));
    }
    RestrictionUpdate::write(
        format!(
            "✅ Removed {}. Your restrictions: {}",
            restriction.label(),
            current.display()
        ),
        &current,
    )
}

/// Every allergen and preference the assistant understands.
pub fn supported_restrictions() -> String {
    let allergens: Vec<&str> = Allergen::ALL.iter().map(|a| a.label()).collect();
    let preferences: Vec<&str> = Preference::ALL.iter().map(|p| p.label()).collect();
    format!(
        "Supported allergens: {}\nDietary preferences: {}\n\nExample: \"my allergies are dairy, nuts\" or \"add vegan\"",
        allergens.join(", "),
        preferences.join(", ")
    )
}

pub fn help_text() -> String {
    [
        "🥗 *Nutrition Assistant*",
        "",
        "📸 *Track meals*: send a photo of your meal and I'll log it.",
        "📊 *Check in*: \"how am I doing today?\" or \"how much protein this week?\"",
        "🕑 *History*: \"what did I eat yesterday?\"",
        "🍽️ *Planning*: \"what should I eat for dinner?\"",
        "🎯 *Goals*: \"my goal is 2000 calories\" or \"am I on track?\"",
        "🚫 *Restrictions*: \"show my restrictions\", \"add dairy\", \"remove nuts\"",
    ]
    .join("\n")
}
