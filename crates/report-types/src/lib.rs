//! Validated value types shared by the reports admin surfaces.
//!
//! The core reports manager stores whatever it is handed. The policy that a published report has
//! a real title and enough category tags lives here so the REST API and the CLI apply it the same
//! way.

/// Minimum number of non-empty category tags a published report must carry.
pub const MIN_CATEGORIES: usize = 3;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// Fewer category tags than the publishing policy requires
    #[error("at least {min} categories are required, got {found}")]
    TooFewCategories { min: usize, found: usize },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An ordered list of category tags with at least [`MIN_CATEGORIES`] non-empty entries.
///
/// Tags are trimmed and blank tags are dropped before counting. Order is preserved because the
/// published site shows tags in the order the author picked them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryList(Vec<String>);

impl CategoryList {
    /// # Errors
    ///
    /// Returns `TextError::TooFewCategories` when fewer than [`MIN_CATEGORIES`] tags remain
    /// after dropping blanks.
    pub fn new<I, S>(tags: I) -> Result<Self, TextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();

        if tags.len() < MIN_CATEGORIES {
            return Err(TextError::TooFewCategories {
                min: MIN_CATEGORIES,
                found: tags.len(),
            });
        }

        Ok(Self(tags))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl serde::Serialize for CategoryList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for CategoryList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tags = Vec::<String>::deserialize(deserializer)?;
        CategoryList::new(tags).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Quarterly results \n").unwrap();
        assert_eq!(text.as_str(), "Quarterly results");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   ").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn category_list_keeps_order_and_drops_blanks() {
        let list = CategoryList::new(["finance", " ", "q3 ", "board"]).unwrap();
        assert_eq!(list.as_slice(), ["finance", "q3", "board"]);
    }

    #[test]
    fn category_list_requires_three_real_tags() {
        let err = CategoryList::new(["finance", "", "q3"]).unwrap_err();
        assert_eq!(err, TextError::TooFewCategories { min: 3, found: 2 });
    }

    #[test]
    fn category_list_deserialise_applies_policy() {
        let ok: CategoryList = serde_json::from_str(r#"["a","b","c"]"#).unwrap();
        assert_eq!(ok.into_vec().len(), 3);

        let err = serde_json::from_str::<CategoryList>(r#"["a","b"]"#).unwrap_err();
        assert!(err.to_string().contains("at least 3 categories"));
    }
}
