//! Tag declaration and resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::validation::is_valid_tag;
use crate::Error;

/// A map of tag name to tag value.
pub type TagMap = BTreeMap<String, String>;

/// Converts a property name into a tag name.
pub type PropertyToTagName = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Rewrites a tag value given its tag name and raw value.
pub type TagValueConverter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagName {
    Explicit(String),
    Property(String),
}

/// The tags declared for a metric instance.
///
/// Tags declared with [`with_tag`](Self::with_tag) keep their name as given.
/// Tags declared with [`with_property`](Self::with_property) have their name
/// passed through the configured
/// [`property_to_tag_name`](crate::ReporterOptions::property_to_tag_name)
/// transform first.
///
/// ```
/// use bosun_metrics::Tags;
///
/// let tags = Tags::new()
///     .with_tag("route", "/home")
///     .with_property("StatusCode", "200");
/// assert!(!tags.is_empty());
/// ```
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: Vec<(TagName, String)>,
}

impl Tags {
    /// Creates an empty tag declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag with an explicit name.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .push((TagName::Explicit(name.into()), value.into()));
        self
    }

    /// Adds a tag named after a property.
    pub fn with_property(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .push((TagName::Property(property.into()), value.into()));
        self
    }

    /// Returns `true` if no tags were declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Tags::new(), |tags, (k, v)| tags.with_tag(k, v))
    }
}

/// A fully resolved, validated tag set.
///
/// The canonical form is the JSON object of the sorted tag map. It is part of
/// the identity of a metric instance and is embedded verbatim in every sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagSet {
    tags: TagMap,
    canonical: String,
}

impl TagSet {
    fn new(tags: TagMap) -> Result<Self, Error> {
        let canonical = serde_json::to_string(&tags)?;
        Ok(Self { tags, canonical })
    }

    /// The tags as a sorted map.
    pub fn as_map(&self) -> &TagMap {
        &self.tags
    }

    /// The canonical JSON serialization.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Applies name transforms, value conversion, default tags and validation.
#[derive(Clone)]
pub(crate) struct TagResolver {
    property_to_tag_name: Option<PropertyToTagName>,
    tag_value_converter: Option<TagValueConverter>,
    default_tags: TagMap,
}

impl TagResolver {
    /// Creates a resolver, converting and validating the default tags once.
    pub fn new(
        property_to_tag_name: Option<PropertyToTagName>,
        tag_value_converter: Option<TagValueConverter>,
        default_tags: &TagMap,
    ) -> Result<Self, Error> {
        let mut resolver = Self {
            property_to_tag_name,
            tag_value_converter,
            default_tags: TagMap::new(),
        };
        let mut defaults = TagMap::new();
        for (name, value) in default_tags {
            let (name, value) = resolver.finish_tag(name.clone(), value)?;
            defaults.insert(name, value);
        }
        resolver.default_tags = defaults;
        Ok(resolver)
    }

    /// Resolves declared tags into a [`TagSet`].
    pub fn resolve(&self, tags: &Tags, include_default_tags: bool) -> Result<TagSet, Error> {
        let mut map = if include_default_tags {
            self.default_tags.clone()
        } else {
            TagMap::new()
        };

        for (name, value) in &tags.entries {
            let name = match name {
                TagName::Explicit(name) => name.clone(),
                TagName::Property(property) => match self.property_to_tag_name {
                    Some(ref transform) => transform(property),
                    None => property.clone(),
                },
            };
            let (name, value) = self.finish_tag(name, value)?;
            map.insert(name, value);
        }

        TagSet::new(map)
    }

    fn finish_tag(&self, name: String, value: &str) -> Result<(String, String), Error> {
        let value = match self.tag_value_converter {
            Some(ref convert) => convert(&name, value),
            None => value.to_owned(),
        };
        if !is_valid_tag(&name) || !is_valid_tag(&value) {
            return Err(Error::InvalidTag { name, value });
        }
        Ok((name, value))
    }
}

impl fmt::Debug for TagResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagResolver")
            .field("default_tags", &self.default_tags)
            .finish_non_exhaustive()
    }
}
