use serde::{Deserialize, Serialize};

/// The content of a recipe that participates in its fingerprint.
///
/// Identifiers, publication status, ratings, view counts, and timestamps
/// live on the owning recipe entity and never influence the hash. Every
/// field is optional; absent values hash as empty strings or zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeContent {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<RecipeStep>,
    /// Treated as a set: order and duplicates do not affect the hash.
    pub tags: Vec<String>,
    pub category: Option<String>,
    /// Preparation time in minutes.
    pub prep_time: Option<u32>,
    /// Cooking time in minutes.
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
}

impl RecipeContent {
    /// Start a content value with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    pub fn with_step(mut self, step: RecipeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// One line of a recipe's ingredient list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ingredient {
    pub name: Option<String>,
    /// Free-form quantity such as `"1/2"` or `"200"`.
    pub amount: Option<String>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

impl Ingredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// One step of a recipe's method.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeStep {
    pub order: Option<u32>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Duration in minutes.
    pub duration: Option<u32>,
    /// Free-form temperature such as `"180°C"`.
    pub temperature: Option<String>,
}
