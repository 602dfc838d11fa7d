//! In-memory image references with displayable locators
//!
//! An [`ImageHandle`] pairs the raw bytes of an image with a locator string
//! that a view can dereference, the way a browser object URL points at a blob.
//! Locators are issued and revoked by a [`HandleRegistry`]; a handle whose
//! locator was released can no longer be resolved, while its bytes stay
//! readable for whoever still owns the handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Scheme prefix of every locator issued by a registry
pub const LOCATOR_PREFIX: &str = "blob:bg-reveal/";

/// Reference to image bytes plus a displayable locator and MIME type
#[derive(Clone)]
pub struct ImageHandle {
    locator: Arc<str>,
    mime_type: Arc<str>,
    bytes: Arc<[u8]>,
}

impl ImageHandle {
    /// Locator string, valid until released through its registry
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// MIME type of the image data
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw image bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared reference to the image bytes
    #[must_use]
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Size of the image data in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the handle carries no data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the image data
    ///
    /// # Errors
    /// - Bytes are not a decodable image in an enabled format
    pub fn decode(&self) -> crate::Result<image::DynamicImage> {
        Ok(image::load_from_memory(&self.bytes)?)
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for ImageHandle {}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("locator", &self.locator)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Counters describing locator allocation over the registry's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Locators issued
    pub created: u64,
    /// Locators revoked
    pub released: u64,
    /// Release requests for locators that were not live
    pub redundant_releases: u64,
}

impl RegistryStats {
    /// Locators issued and not yet revoked
    #[must_use]
    pub fn live(&self) -> u64 {
        self.created - self.released
    }
}

#[derive(Default)]
struct RegistryInner {
    live: HashMap<Arc<str>, Arc<[u8]>>,
    stats: RegistryStats,
}

/// Issues and revokes image locators
///
/// Cloning the registry yields another reference to the same table.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl HandleRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Wrap bytes in a new handle with a freshly issued locator
    pub fn create(&self, bytes: impl Into<Arc<[u8]>>, mime_type: &str) -> ImageHandle {
        let bytes: Arc<[u8]> = bytes.into();
        let locator: Arc<str> = format!("{}{}", LOCATOR_PREFIX, uuid::Uuid::new_v4()).into();

        let mut inner = self.lock();
        inner.live.insert(Arc::clone(&locator), Arc::clone(&bytes));
        inner.stats.created += 1;
        log::debug!(
            "Issued locator {} ({} bytes, {})",
            locator,
            bytes.len(),
            mime_type
        );

        ImageHandle {
            locator,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Revoke a handle's locator
    ///
    /// Returns `false` if the locator was already revoked or never issued
    /// by this registry.
    pub fn release(&self, handle: &ImageHandle) -> bool {
        let mut inner = self.lock();
        if inner.live.remove(&handle.locator).is_some() {
            inner.stats.released += 1;
            log::debug!("Released locator {}", handle.locator);
            true
        } else {
            inner.stats.redundant_releases += 1;
            log::warn!("Locator {} was not live; release ignored", handle.locator);
            false
        }
    }

    /// Dereference a live locator
    #[must_use]
    pub fn resolve(&self, locator: &str) -> Option<Arc<[u8]>> {
        self.lock().live.get(locator).cloned()
    }

    /// Whether the handle's locator is still live
    #[must_use]
    pub fn is_live(&self, handle: &ImageHandle) -> bool {
        self.lock().live.contains_key(&handle.locator)
    }

    /// Allocation counters
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.lock().stats
    }

    /// Number of live locators
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}
