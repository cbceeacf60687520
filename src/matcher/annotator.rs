//! Question annotation: which phrase to retrieve with, per category.

use std::collections::BTreeMap;

use crate::component::Category;

/// Phrases to embed, grouped by the category they should be matched against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPhrases {
    phrases: BTreeMap<Category, Vec<String>>,
}

impl QueryPhrases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: Category, phrase: impl Into<String>) -> Self {
        self.insert(category, phrase);
        self
    }

    /// Add a phrase. Blank phrases are ignored.
    pub fn insert(&mut self, category: Category, phrase: impl Into<String>) {
        let phrase = phrase.into();
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return;
        }
        let entry = self.phrases.entry(category).or_default();
        if !entry.iter().any(|p| p == phrase) {
            entry.push(phrase.to_string());
        }
    }

    pub fn get(&self, category: Category) -> &[String] {
        self.phrases.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> {
        self.phrases
            .iter()
            .flat_map(|(cat, list)| list.iter().map(move |p| (*cat, p.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Splits a question into per-category phrases.
pub trait PhraseAnnotator: Send + Sync {
    fn annotate(&self, text: &str) -> QueryPhrases;
}

/// Uses the whole question as the phrase for every category.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeQuestionAnnotator;

impl PhraseAnnotator for WholeQuestionAnnotator {
    fn annotate(&self, text: &str) -> QueryPhrases {
        let mut phrases = QueryPhrases::new();
        for category in Category::ALL {
            phrases.insert(category, text);
        }
        phrases
    }
}
