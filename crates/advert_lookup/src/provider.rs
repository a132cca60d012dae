// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Advertisement, ProviderError};

/// A synchronous client of an external advertisement store.
///
/// Providers are the raw, possibly flaky, back ends behind a source. Any [`ProviderError`] is
/// treated as transient by [`RetryingSource`][crate::RetryingSource].
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertProvider, Advertisement, ProviderError};
///
/// struct Catalog;
///
/// impl AdvertProvider for Catalog {
///     fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
///         Ok(Some(Advertisement::new(id, format!("Advertisement #{id}"))))
///     }
/// }
///
/// assert_eq!(Catalog.get_advert("1").unwrap().unwrap().name(), "Advertisement #1");
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait AdvertProvider: Send {
    /// Looks up the advertisement published under `id`.
    ///
    /// Returns `Ok(None)` when the store has nothing for `id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the store could not be reached or failed to answer.
    fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError>;
}

impl<P: AdvertProvider + ?Sized> AdvertProvider for Box<P> {
    fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
        (**self).get_advert(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_provider_delegates() {
        let mut mock = MockAdvertProvider::new();
        mock.expect_get_advert()
            .withf(|id| id == "3")
            .times(1)
            .returning(|_| Err(ProviderError::new("timed out")));

        let boxed: Box<dyn AdvertProvider> = Box::new(mock);

        assert_eq!(boxed.get_advert("3").unwrap_err().message(), "timed out");
    }
}
