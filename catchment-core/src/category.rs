//! Ordered category definitions and first-match POI classification.
//!
//! A [`CategorySet`] is an ordered list of named categories, each holding
//! `key=value` tag filters. Classification walks the categories in priority
//! order and returns the first filter that matches a feature's tags.
//!
//! # Examples
//! ```
//! use geo::Coord;
//! use catchment_core::{Category, CategorySet, PointFeature, TagFilter, Tags};
//!
//! let set = CategorySet::new(vec![
//!     Category::new("green", vec![TagFilter::new("leisure", "park")]),
//!     Category::new("historic", vec![TagFilter::new("historic", "castle")]),
//! ])?;
//!
//! let park = PointFeature::new(
//!     1,
//!     Coord { x: 0.0, y: 0.0 },
//!     Tags::from([("leisure".into(), "park".into())]),
//! )?;
//! let hit = set.classify(&park).expect("park is green");
//! assert_eq!(hit.category, "green");
//! assert_eq!(hit.tag.to_string(), "leisure=park");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::PointFeature;

/// A single `key=value` tag predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagFilter {
    /// Tag key, e.g. `leisure`.
    pub key: String,
    /// Required tag value, e.g. `park`.
    pub value: String,
}

impl TagFilter {
    /// Construct a filter matching `key=value`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Return `true` when the feature carries exactly this tag.
    #[must_use]
    pub fn matches(&self, feature: &PointFeature) -> bool {
        feature.tag(&self.key) == Some(self.value.as_str())
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A named group of tag filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Category name used in results, e.g. `green`.
    pub name: String,
    /// Filters evaluated in declaration order.
    pub filters: Vec<TagFilter>,
}

impl Category {
    /// Construct a category from its name and filters.
    #[must_use]
    pub fn new(name: impl Into<String>, filters: Vec<TagFilter>) -> Self {
        Self {
            name: name.into(),
            filters,
        }
    }

    /// Render the filters as a feature-source query, joined with `or`.
    ///
    /// # Examples
    /// ```
    /// use catchment_core::{Category, TagFilter};
    ///
    /// let category = Category::new(
    ///     "green",
    ///     vec![TagFilter::new("leisure", "park"), TagFilter::new("landuse", "forest")],
    /// );
    /// assert_eq!(category.filter_query(), "leisure=park or landuse=forest");
    /// ```
    #[must_use]
    pub fn filter_query(&self) -> String {
        self.filters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    fn first_match(&self, feature: &PointFeature) -> Option<&TagFilter> {
        self.filters.iter().find(|filter| filter.matches(feature))
    }
}

/// Result of classifying a feature against a [`CategorySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch<'a> {
    /// Name of the winning category.
    pub category: &'a str,
    /// Filter that matched inside that category.
    pub tag: &'a TagFilter,
}

/// Errors raised while validating category definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    /// No categories were supplied.
    #[error("at least one category is required")]
    Empty,
    /// A category declared no filters.
    #[error("category {name:?} has no tag filters")]
    NoFilters {
        /// Offending category.
        name: String,
    },
    /// Two categories share a name.
    #[error("category {name:?} is defined more than once")]
    DuplicateName {
        /// Repeated category name.
        name: String,
    },
    /// The same filter appears in more than one category.
    #[error("tag {tag} is claimed by both {first:?} and {second:?}")]
    OverlappingFilter {
        /// Filter claimed twice.
        tag: TagFilter,
        /// Category that declared the filter first.
        first: String,
        /// Category that declared it again.
        second: String,
    },
}

/// Validated, ordered collection of categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Validate and construct a [`CategorySet`].
    ///
    /// Rejects empty input, categories without filters, repeated names and
    /// filters declared by more than one category. Repeating a filter inside
    /// a single category is tolerated and collapsed.
    pub fn new(categories: Vec<Category>) -> Result<Self, CategoryError> {
        validate(&categories)?;
        Ok(Self {
            categories: categories
                .into_iter()
                .map(|mut category| {
                    let mut seen = HashSet::new();
                    category.filters.retain(|filter| seen.insert(filter.clone()));
                    category
                })
                .collect(),
        })
    }

    /// Classify a feature; the first matching category in priority order wins.
    #[must_use]
    pub fn classify(&self, feature: &PointFeature) -> Option<TagMatch<'_>> {
        self.categories.iter().find_map(|category| {
            category.first_match(feature).map(|tag| TagMatch {
                category: category.name.as_str(),
                tag,
            })
        })
    }

    /// Iterate over the categories in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Look up a category by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.name == name)
    }

    /// Number of categories.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.categories.len()
    }

    /// Always `false` for a validated set; provided for API symmetry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn validate(categories: &[Category]) -> Result<(), CategoryError> {
    if categories.is_empty() {
        return Err(CategoryError::Empty);
    }
    let mut names = HashSet::new();
    let mut owners: HashMap<&TagFilter, &str> = HashMap::new();
    for category in categories {
        if category.filters.is_empty() {
            return Err(CategoryError::NoFilters {
                name: category.name.clone(),
            });
        }
        if !names.insert(category.name.as_str()) {
            return Err(CategoryError::DuplicateName {
                name: category.name.clone(),
            });
        }
        for filter in &category.filters {
            let owner = *owners.entry(filter).or_insert(category.name.as_str());
            if owner != category.name {
                return Err(CategoryError::OverlappingFilter {
                    tag: filter.clone(),
                    first: owner.to_owned(),
                    second: category.name.clone(),
                });
            }
        }
    }
    Ok(())
}
