//! Keyword-presence department classifier.
//!
//! Each category scores one point per distinct keyword found anywhere in the
//! text (case-insensitive substring match). Repeating a keyword does not raise
//! the score. The highest score wins; on a tie the category declared first
//! wins; if nothing matches the result is [`GENERAL_CATEGORY`].

use super::schema::{ClassificationInput, ClassificationResult, Priority};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Fallback category when no keyword matches. Reserved: a taxonomy may not
/// declare a category with this name.
pub const GENERAL_CATEGORY: &str = "General";

const CONFIDENCE_FLOOR: f64 = 0.6;
const CONFIDENCE_CEILING: f64 = 0.95;
const CONFIDENCE_PER_MATCH: f64 = 0.1;
const MAX_TAGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// The shipped department taxonomy, in declaration order.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new(
            "Engineering",
            &["project", "technical", "infrastructure", "development", "specifications"],
        ),
        Category::new(
            "HR",
            &["employee", "policy", "training", "recruitment", "performance"],
        ),
        Category::new(
            "Procurement",
            &["vendor", "purchase", "contract", "supplier", "procurement"],
        ),
        Category::new(
            "Safety",
            &["safety", "compliance", "risk", "hazard", "incident"],
        ),
        Category::new(
            "Legal",
            &["legal", "contract", "agreement", "compliance", "regulatory"],
        ),
        Category::new(
            "Finance",
            &["budget", "cost", "financial", "expense", "revenue"],
        ),
    ]
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("taxonomy must declare at least one category")]
    Empty,

    #[error("category names must not be blank")]
    BlankName,

    #[error("category name \"{0}\" is reserved for unmatched documents")]
    ReservedName(String),

    #[error("category \"{0}\" is declared more than once")]
    DuplicateName(String),

    #[error("category \"{0}\" has no keywords")]
    NoKeywords(String),

    #[error("category \"{0}\" has a blank keyword")]
    BlankKeyword(String),
}

/// Validated, ordered list of categories with lowercased keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}

impl Taxonomy {
    pub fn new(categories: Vec<Category>) -> Result<Self, TaxonomyError> {
        if categories.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut names = HashSet::new();
        let mut validated = Vec::with_capacity(categories.len());

        for category in categories {
            let name = category.name.trim().to_string();
            if name.is_empty() {
                return Err(TaxonomyError::BlankName);
            }
            if name.eq_ignore_ascii_case(GENERAL_CATEGORY) {
                return Err(TaxonomyError::ReservedName(name));
            }
            if !names.insert(name.clone()) {
                return Err(TaxonomyError::DuplicateName(name));
            }
            if category.keywords.is_empty() {
                return Err(TaxonomyError::NoKeywords(name));
            }

            // Duplicate keywords would count twice; keep the first occurrence.
            let mut seen = HashSet::new();
            let mut keywords = Vec::with_capacity(category.keywords.len());
            for keyword in &category.keywords {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    return Err(TaxonomyError::BlankKeyword(name));
                }
                if seen.insert(keyword.clone()) {
                    keywords.push(keyword);
                }
            }

            validated.push(Category { name, keywords });
        }

        Ok(Self {
            categories: validated,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("text content required")]
    EmptyText,
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::EmptyText => "EmptyText",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    taxonomy: Taxonomy,
}

impl Classifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify the input text. Metadata is not examined.
    pub fn classify(&self, input: &ClassificationInput) -> Result<ClassificationResult, ClassifyError> {
        self.classify_text(&input.text)
    }

    pub fn classify_text(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        if text.trim().is_empty() {
            return Err(ClassifyError::EmptyText);
        }

        let haystack = text.to_lowercase();

        let mut best: Option<&Category> = None;
        let mut best_score = 0usize;
        for category in &self.taxonomy.categories {
            let score = match_score(category, &haystack);
            // Strict comparison keeps the earliest category on ties.
            if score > best_score {
                best_score = score;
                best = Some(category);
            }
        }

        let (category, subcategories, tags) = match best {
            Some(winner) => (
                winner.name.clone(),
                vec![winner.name.clone()],
                winner.keywords.iter().take(MAX_TAGS).cloned().collect(),
            ),
            None => (GENERAL_CATEGORY.to_string(), Vec::new(), Vec::new()),
        };

        Ok(ClassificationResult {
            category,
            confidence: confidence(best_score),
            subcategories,
            tags,
            priority: Priority::from_score(best_score),
            match_score: best_score,
        })
    }
}

/// Number of the category's keywords present in `haystack` (already lowercased).
fn match_score(category: &Category, haystack: &str) -> usize {
    category
        .keywords
        .iter()
        .filter(|keyword| haystack.contains(keyword.as_str()))
        .count()
}

fn confidence(score: usize) -> f64 {
    (CONFIDENCE_FLOOR + score as f64 * CONFIDENCE_PER_MATCH).min(CONFIDENCE_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Result<ClassificationResult, ClassifyError> {
        Classifier::default().classify(&ClassificationInput::new(text))
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(classify(""), Err(ClassifyError::EmptyText));
        assert_eq!(classify("   "), Err(ClassifyError::EmptyText));
        assert_eq!(classify("\n\t"), Err(ClassifyError::EmptyText));
    }

    #[test]
    fn full_finance_match_is_clamped() {
        let result = classify("budget cost financial expense revenue").unwrap();
        assert_eq!(result.category, "Finance");
        assert_eq!(result.match_score, 5);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.priority, Priority::High);
        assert_eq!(result.subcategories, vec!["Finance"]);
        assert_eq!(result.tags, vec!["budget", "cost", "financial"]);
    }

    #[test]
    fn no_match_falls_back_to_general() {
        let result = classify("no relevant keywords here").unwrap();
        assert_eq!(result.category, GENERAL_CATEGORY);
        assert_eq!(result.match_score, 0);
        assert_eq!(result.confidence, 0.6);
        assert!(result.subcategories.is_empty());
        assert!(result.tags.is_empty());
        assert_eq!(result.priority, Priority::Low);
    }

    #[test]
    fn score_of_two_is_medium() {
        let result = classify("safety hazard").unwrap();
        assert_eq!(result.category, "Safety");
        assert_eq!(result.match_score, 2);
        assert_eq!(result.priority, Priority::Medium);
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn single_match_is_low_priority() {
        let result = classify("Annual revenue summary").unwrap();
        assert_eq!(result.category, "Finance");
        assert_eq!(result.priority, Priority::Low);
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn tie_resolves_to_declaration_order() {
        let result = classify("employee vendor").unwrap();
        assert_eq!(result.category, "HR");
        assert_eq!(result.match_score, 1);

        // "contract" belongs to both Procurement and Legal.
        let result = classify("the contract").unwrap();
        assert_eq!(result.category, "Procurement");
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let result = classify("budget budget budget budget, and one incident and hazard").unwrap();
        assert_eq!(result.category, "Safety");
        assert_eq!(result.match_score, 2);
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let result = classify("INFRASTRUCTURE Projects under Development").unwrap();
        assert_eq!(result.category, "Engineering");
        assert_eq!(result.match_score, 3);
        assert_eq!(result.priority, Priority::High);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "Submit compliance report to regulatory body; budget within limits";
        let first = classify(text).unwrap();
        let second = classify(text).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
    }

    #[test]
    fn metadata_is_ignored() {
        let mut input = ClassificationInput::new("purchase order from supplier");
        let mut metadata = serde_json::Map::new();
        metadata.insert("category".into(), serde_json::json!("Legal"));
        input.metadata = Some(metadata);

        let with = Classifier::default().classify(&input).unwrap();
        let without = classify("purchase order from supplier").unwrap();
        assert_eq!(with, without);
        assert_eq!(with.category, "Procurement");
    }

    #[test]
    fn confidence_is_monotonic_and_bounded() {
        let mut previous = 0.0;
        for score in 0..10 {
            let c = confidence(score);
            assert!(c >= previous);
            assert!((0.6..=0.95).contains(&c));
            previous = c;
        }
    }

    #[test]
    fn custom_taxonomy_is_used_in_order() {
        let taxonomy = Taxonomy::new(vec![
            Category::new("Rolling Stock", &["Bogie", "coach", "traction"]),
            Category::new("Signalling", &["interlocking", "signal", "track circuit"]),
        ])
        .unwrap();
        let classifier = Classifier::new(taxonomy);

        let result = classifier.classify_text("Bogie inspection: signal fault").unwrap();
        assert_eq!(result.category, "Rolling Stock");
        assert_eq!(result.tags, vec!["bogie", "coach", "traction"]);
    }

    #[test]
    fn taxonomy_validation() {
        assert_eq!(Taxonomy::new(vec![]), Err(TaxonomyError::Empty));
        assert_eq!(
            Taxonomy::new(vec![Category::new("general", &["x"])]),
            Err(TaxonomyError::ReservedName("general".into()))
        );
        assert_eq!(
            Taxonomy::new(vec![Category::new("A", &["x"]), Category::new("A", &["y"])]),
            Err(TaxonomyError::DuplicateName("A".into()))
        );
        assert_eq!(
            Taxonomy::new(vec![Category::new("A", &[])]),
            Err(TaxonomyError::NoKeywords("A".into()))
        );
        assert_eq!(
            Taxonomy::new(vec![Category::new("A", &["x", " "])]),
            Err(TaxonomyError::BlankKeyword("A".into()))
        );
        assert_eq!(
            Taxonomy::new(vec![Category::new(" ", &["x"])]),
            Err(TaxonomyError::BlankName)
        );
    }

    #[test]
    fn duplicate_keywords_are_collapsed() {
        let taxonomy =
            Taxonomy::new(vec![Category::new("Ops", &["shift", "Shift", "roster"])]).unwrap();
        assert_eq!(taxonomy.categories()[0].keywords, vec!["shift", "roster"]);

        let result = Classifier::new(taxonomy).classify_text("shift roster").unwrap();
        assert_eq!(result.match_score, 2);
    }
}
