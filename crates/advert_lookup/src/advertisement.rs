// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The record resolved by an [`AdvertLookup`][crate::AdvertLookup].
///
/// # Examples
///
/// ```
/// use advert_lookup::Advertisement;
///
/// let advert = Advertisement::new("42", "Advertisement #42").with_description("spring sale");
///
/// assert_eq!(advert.web_id(), "42");
/// assert_eq!(advert.description(), Some("spring sale"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
pub struct Advertisement {
    web_id: String,
    name: String,
    #[cfg_attr(any(feature = "serde", test), serde(default, skip_serializing_if = "Option::is_none"))]
    description: Option<String>,
}

impl Advertisement {
    /// Creates an advertisement without a description.
    #[must_use]
    pub fn new(web_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            web_id: web_id.into(),
            name: name.into(),
            description: None,
        }
    }

    /// Attaches a description to the advertisement.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// The identifier the advertisement is published under.
    #[must_use]
    pub fn web_id(&self) -> &str {
        &self.web_id
    }

    /// The display name of the advertisement.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The optional long-form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
