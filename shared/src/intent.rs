//! Rule-based intent classification for inbound text.
//!
//! The classifier is an ordered list of named rules. Each rule looks at the
//! normalised message and either returns an [`Intent`] or passes. The first
//! rule to return wins; nothing matching falls back to [`Intent::General`].

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allergens::Restriction;
use crate::{Error, Result};

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    ViewRestrictions,
    SetRestrictions,
    AddRestriction { restriction: Restriction },
    RemoveRestriction { restriction: Restriction },
    GoalSetting,
    HistoryQuery { timeframe: Timeframe },
    DailySummary,
    NutrientQuery { nutrient: Nutrient, timeframe: Timeframe },
    GoalProgress,
    Comparison,
    PatternAnalysis,
    Recommendation,
    Help,
    General,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ViewRestrictions => "view_restrictions",
            Intent::SetRestrictions => "set_restrictions",
            Intent::AddRestriction { .. } => "add_restriction",
            Intent::RemoveRestriction { .. } => "remove_restriction",
            Intent::GoalSetting => "goal_setting",
            Intent::HistoryQuery { .. } => "history_query",
            Intent::DailySummary => "daily_summary",
            Intent::NutrientQuery { .. } => "nutrient_query",
            Intent::GoalProgress => "goal_progress",
            Intent::Comparison => "comparison",
            Intent::PatternAnalysis => "pattern_analysis",
            Intent::Recommendation => "recommendation",
            Intent::Help => "help",
            Intent::General => "general",
        }
    }

    /// Intents handled by the restriction commands rather than the agent.
    pub fn is_restriction_intent(&self) -> bool {
        matches!(
            self,
            Intent::ViewRestrictions
                | Intent::SetRestrictions
                | Intent::AddRestriction { .. }
                | Intent::RemoveRestriction { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Protein,
    #[default]
    Calories,
    Carbs,
    Fat,
    Fiber,
    Sugar,
    Sodium,
}

const NUTRIENT_WORDS: &[(&str, Nutrient)] = &[
    ("protein", Nutrient::Protein),
    ("calorie", Nutrient::Calories),
    ("carb", Nutrient::Carbs),
    ("fat", Nutrient::Fat),
    ("fiber", Nutrient::Fiber),
    ("sugar", Nutrient::Sugar),
    ("sodium", Nutrient::Sodium),
];

impl Nutrient {
    /// First nutrient mentioned, by table order. Calories when none is.
    pub fn from_message(text: &str) -> Self {
        NUTRIENT_WORDS
            .iter()
            .find(|(word, _)| text.contains(word))
            .map(|(_, nutrient)| *nutrient)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
}

impl Timeframe {
    pub fn from_message(text: &str) -> Self {
        if text.contains("today") {
            Timeframe::Today
        } else if text.contains("yesterday") {
            Timeframe::Yesterday
        } else if text.contains("week") {
            Timeframe::ThisWeek
        } else if text.contains("month") {
            Timeframe::ThisMonth
        } else {
            Timeframe::Today
        }
    }
}

const VIEW_VERBS: &[&str] = &["show", "what", "list", "view", "check", "display", "tell me"];

/// View verbs that never appear inside an add/remove command.
const EXPLICIT_VIEW_VERBS: &[&str] = &["show", "view", "check", "display", "tell me"];

const RESTRICTION_WORDS: &[&str] = &[
    "restrict", "allerg", "allegy", "allegies", "alergy", "alergies", "dietary",
];

const SET_PHRASES: &[&str] = &[
    "my allergies are",
    "my allergy is",
    "my restrictions are",
    "my restriction is",
    "my dietary restrictions are",
    "i'm allergic to",
    "i’m allergic to",
    "im allergic to",
    "i am allergic to",
    "set restrictions",
    "set restriction",
    "set my restrictions",
];

const HISTORY_PHRASES: &[&str] = &[
    "what did i eat",
    "what did i have",
    "what did i had",
    "show me what",
    "what have i eaten",
];

const TIMEFRAME_ONLY: &[&str] = &["yesterday", "last week", "last month", "this week"];

const SUMMARY_WORDS: &[&str] = &["total", "doing", "summary", "how am i", "how's my", "hows my"];

const GOAL_PROGRESS_PHRASES: &[&str] = &[
    "what is my goal",
    "what's my goal",
    "whats my goal",
    "my progress",
    "goal progress",
    "am i meeting",
    "meeting my goal",
    "am i on track",
    "check my goal",
    "show my goal",
    "show goal",
    "hit my goal",
    "how am i doing",
];

const COMPARISON_WORDS: &[&str] = &["compare", "versus", "difference"];

const PATTERN_WORDS: &[&str] = &["pattern", "usually", "tend to", "eating habits", "habits"];

const RECOMMENDATION_WORDS: &[&str] = &["what should", "recommend", "suggest", "should i eat"];

const HELP_WORDS: &[&str] = &["help", "what can", "how do", "commands"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Lowercase and trim.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

type Matcher = Box<dyn Fn(&str) -> Option<Intent> + Send + Sync>;

/// One named step of the classifier.
pub struct IntentRule {
    name: &'static str,
    matcher: Matcher,
}

impl IntentRule {
    pub fn new<F>(name: &'static str, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<Intent> + Send + Sync + 'static,
    {
        Self {
            name,
            matcher: Box::new(matcher),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the rule against already-normalised text.
    pub fn apply(&self, normalized: &str) -> Option<Intent> {
        (self.matcher)(normalized)
    }
}

impl std::fmt::Debug for IntentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentRule").field("name", &self.name).finish()
    }
}

/// Finds "add <restriction>" and "remove <restriction>" commands.
///
/// The restriction must come after the verb and is matched on word
/// boundaries, so "shellfish" never reads as "fish".
struct RestrictionCommandMatcher {
    verb: Regex,
    name: Regex,
}

impl RestrictionCommandMatcher {
    fn new() -> Result<Self> {
        let mut names: Vec<&'static str> = Restriction::all().flat_map(Restriction::names).collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");

        let verb = Regex::new(r"\b(add|remove|delete)\b")
            .map_err(|e| Error::Internal(format!("invalid verb pattern: {}", e)))?;
        let name = Regex::new(&format!(r"\b({})\b", alternation))
            .map_err(|e| Error::Internal(format!("invalid restriction pattern: {}", e)))?;

        Ok(Self { verb, name })
    }

    fn matches(&self, text: &str) -> Option<Intent> {
        let verb = self.verb.find(text)?;
        let found = self.name.find_at(text, verb.end())?;
        let restriction = found.as_str().parse::<Restriction>().ok()?;

        Some(match verb.as_str() {
            "add" => Intent::AddRestriction { restriction },
            _ => Intent::RemoveRestriction { restriction },
        })
    }
}

/// Ordered rule list mapping text to an [`Intent`].
#[derive(Debug)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    /// Build the standard rule set.
    pub fn new() -> Result<Self> {
        let command = Arc::new(RestrictionCommandMatcher::new()?);
        let view_command = Arc::clone(&command);
        let goal = Regex::new(r"(my goal is|goal is|set.+goal).+\d+")
            .map_err(|e| Error::Internal(format!("invalid goal pattern: {}", e)))?;

        let rules = vec![
            IntentRule::new("view_restrictions", move |text| {
                if !(contains_any(text, VIEW_VERBS) && contains_any(text, RESTRICTION_WORDS)) {
                    return None;
                }
                // "add dairy to my list of allergies" is a command, not a view.
                if !contains_any(text, EXPLICIT_VIEW_VERBS) && view_command.matches(text).is_some() {
                    return None;
                }
                Some(Intent::ViewRestrictions)
            }),
            IntentRule::new("restriction_command", move |text| command.matches(text)),
            IntentRule::new("set_restrictions", |text| {
                contains_any(text, SET_PHRASES).then_some(Intent::SetRestrictions)
            }),
            IntentRule::new("goal_setting", move |text| {
                goal.is_match(text).then_some(Intent::GoalSetting)
            }),
            IntentRule::new("history_query", |text| {
                (contains_any(text, HISTORY_PHRASES) || TIMEFRAME_ONLY.contains(&text)).then(|| {
                    Intent::HistoryQuery {
                        timeframe: Timeframe::from_message(text),
                    }
                })
            }),
            IntentRule::new("daily_summary", |text| {
                (contains_any(text, &["today", "so far"]) && contains_any(text, SUMMARY_WORDS))
                    .then_some(Intent::DailySummary)
            }),
            IntentRule::new("nutrient_query", |text| {
                NUTRIENT_WORDS
                    .iter()
                    .any(|(word, _)| text.contains(word))
                    .then(|| Intent::NutrientQuery {
                        nutrient: Nutrient::from_message(text),
                        timeframe: Timeframe::from_message(text),
                    })
            }),
            IntentRule::new("goal_progress", |text| {
                contains_any(text, GOAL_PROGRESS_PHRASES).then_some(Intent::GoalProgress)
            }),
            IntentRule::new("comparison", |text| {
                (contains_any(text, COMPARISON_WORDS) || has_word(text, "vs"))
                    .then_some(Intent::Comparison)
            }),
            IntentRule::new("pattern_analysis", |text| {
                contains_any(text, PATTERN_WORDS).then_some(Intent::PatternAnalysis)
            }),
            IntentRule::new("recommendation", |text| {
                contains_any(text, RECOMMENDATION_WORDS).then_some(Intent::Recommendation)
            }),
            IntentRule::new("help", |text| {
                contains_any(text, HELP_WORDS).then_some(Intent::Help)
            }),
        ];

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Look up a rule by name.
    pub fn rule(&self, name: &str) -> Option<&IntentRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Classify a message. Never fails; unmatched text is [`Intent::General`].
    pub fn classify(&self, text: &str) -> Intent {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Intent::General;
        }

        for rule in &self.rules {
            if let Some(intent) = rule.apply(&normalized) {
                debug!(rule = rule.name, intent = intent.name(), "Classified message");
                return intent;
            }
        }

        debug!("No rule matched, falling back to general");
        Intent::General
    }
}
