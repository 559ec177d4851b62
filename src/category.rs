use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Label assigned to a spot at creation time from its title and description.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Desert,
    Mountain,
    Beach,
    Forest,
    Lake,
    Sky,
    General,
}

// Tested top to bottom; the first category with a matching keyword wins.
const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Desert, &["desert", "dune"]),
    (Category::Mountain, &["mountain", "peak", "himalaya"]),
    (Category::Beach, &["beach", "coast"]),
    (Category::Forest, &["forest", "woods"]),
    (Category::Lake, &["lake", "pond"]),
    (Category::Sky, &["milky way", "stars", "sky"]),
];

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Desert,
        Category::Mountain,
        Category::Beach,
        Category::Forest,
        Category::Lake,
        Category::Sky,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Desert => "desert",
            Category::Mountain => "mountain",
            Category::Beach => "beach",
            Category::Forest => "forest",
            Category::Lake => "lake",
            Category::Sky => "sky",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Picks a category by keyword containment over `"{title} {description}"`, lowercased.
/// Falls back to [`Category::General`] when nothing matches.
pub fn categorize(title: &str, description: &str) -> Category {
    let content = format!("{} {}", title, description).to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, terms)| terms.iter().any(|term| content.contains(term)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dunes_are_desert_even_with_sky_words() {
        assert_eq!(categorize("Milky Way over the dunes", "desert camp"), Category::Desert);
    }

    #[test]
    fn earlier_category_wins() {
        // "peak" (mountain) and "lake" both present; mountain is tested first.
        assert_eq!(categorize("Lake view", "from the peak"), Category::Mountain);
        assert_eq!(categorize("Pond", "under the stars"), Category::Lake);
    }

    #[test]
    fn matching_is_case_insensitive_and_substring() {
        assert_eq!(categorize("HIMALAYAN base", ""), Category::Mountain);
        assert_eq!(categorize("", "Coastline walk"), Category::Beach);
        assert_eq!(categorize("Backwoods", "clearing"), Category::Forest);
    }

    #[test]
    fn keyword_may_span_title_and_description() {
        // The two fields are joined with a space before matching.
        assert_eq!(categorize("Milky", "way"), Category::Sky);
    }

    #[test]
    fn nothing_matches_gives_general() {
        assert_eq!(categorize("Rooftop", "city outskirts"), Category::General);
        assert_eq!(categorize("", ""), Category::General);
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("Desert".parse::<Category>(), Ok(Category::Desert));
        assert_eq!(" sky ".parse::<Category>(), Ok(Category::Sky));
        assert_eq!("general".parse::<Category>(), Ok(Category::General));
        assert!("volcano".parse::<Category>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Category::Mountain).unwrap();
        assert_eq!(json, "\"mountain\"");
    }
}
