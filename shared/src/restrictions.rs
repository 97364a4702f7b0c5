//! Parsing of the stored dietary-restriction string.
//!
//! The user record keeps restrictions as one comma-separated field, e.g.
//! `"dairy,nuts,vegan"`. That string is the source of truth; a
//! [`RestrictionSet`] is derived from it on every access.

use serde::Serialize;

use crate::allergens::{Allergen, Preference, Restriction};

/// Structured view of a user's restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictionSet {
    allergens: Vec<Allergen>,
    preferences: Vec<Preference>,
    display: String,
}

impl Default for RestrictionSet {
    fn default() -> Self {
        Self {
            allergens: Vec::new(),
            preferences: Vec::new(),
            display: "None".to_string(),
        }
    }
}

impl RestrictionSet {
    /// Parse free text or a stored value into a restriction set.
    ///
    /// Tokens are split on commas and whitespace, trimmed of punctuation and
    /// lowercased. Unknown tokens are dropped; duplicates keep their first
    /// position.
    pub fn parse(raw: &str) -> Self {
        let mut set = Self::default();
        for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            if let Ok(restriction) = token.parse::<Restriction>() {
                set.push(restriction);
            }
        }
        set.refresh_display();
        set
    }

    /// Parse the nullable column straight off the user record.
    pub fn from_stored(stored: Option<&str>) -> Self {
        Self::parse(stored.unwrap_or_default())
    }

    pub fn allergens(&self) -> &[Allergen] {
        &self.allergens
    }

    pub fn preferences(&self) -> &[Preference] {
        &self.preferences
    }

    /// Title-cased labels, allergens first, or `"None"` when empty.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn is_empty(&self) -> bool {
        self.allergens.is_empty() && self.preferences.is_empty()
    }

    pub fn contains(&self, restriction: Restriction) -> bool {
        match restriction {
            Restriction::Allergen(a) => self.allergens.contains(&a),
            Restriction::Preference(p) => self.preferences.contains(&p),
        }
    }

    /// Whether an allergen was declared explicitly rather than implied by a
    /// preference.
    pub fn lists_allergen(&self, allergen: Allergen) -> bool {
        self.allergens.contains(&allergen)
    }

    /// Add a restriction. Returns false if it was already present.
    pub fn insert(&mut self, restriction: Restriction) -> bool {
        if self.contains(restriction) {
            return false;
        }
        self.push(restriction);
        self.refresh_display();
        true
    }

    /// Remove a restriction. Returns false if it was not present.
    pub fn remove(&mut self, restriction: Restriction) -> bool {
        let before = self.allergens.len() + self.preferences.len();
        match restriction {
            Restriction::Allergen(a) => self.allergens.retain(|x| *x != a),
            Restriction::Preference(p) => self.preferences.retain(|x| *x != p),
        }
        let removed = before != self.allergens.len() + self.preferences.len();
        if removed {
            self.refresh_display();
        }
        removed
    }

    /// Serialize back to the stored column format, `None` when empty.
    pub fn to_stored(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.restrictions().map(Restriction::key).collect::<Vec<_>>().join(","))
    }

    /// All restrictions, allergens first.
    pub fn restrictions(&self) -> impl Iterator<Item = Restriction> + '_ {
        self.allergens
            .iter()
            .copied()
            .map(Restriction::Allergen)
            .chain(self.preferences.iter().copied().map(Restriction::Preference))
    }

    fn push(&mut self, restriction: Restriction) {
        match restriction {
            Restriction::Allergen(a) if !self.allergens.contains(&a) => self.allergens.push(a),
            Restriction::Preference(p) if !self.preferences.contains(&p) => {
                self.preferences.push(p)
            }
            _ => {}
        }
    }

    fn refresh_display(&mut self) {
        self.display = if self.is_empty() {
            "None".to_string()
        } else {
            self.restrictions()
                .map(Restriction::label)
                .collect::<Vec<_>>()
                .join(", ")
        };
    }
}
