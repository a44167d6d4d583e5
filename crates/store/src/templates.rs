//! Access to book template assets: manifest, workflow document, base
//! illustrations, and explicit region masks.

use std::sync::Arc;

use storyloom_core::artifacts::explicit_mask_key;
use storyloom_core::manifest::BookManifest;
use tracing::debug;

use crate::object_store::ObjectStore;
use crate::StoreError;

pub struct TemplateStore {
    store: Arc<dyn ObjectStore>,
}

impl TemplateStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn manifest_key(slug: &str) -> String {
        format!("templates/{slug}/manifest.json")
    }

    pub fn workflow_key(slug: &str) -> String {
        format!("templates/{slug}/workflow.json")
    }

    /// Load and parse a template manifest. Loaded fresh per use; the
    /// document is immutable for a given slug.
    pub async fn load_manifest(&self, slug: &str) -> Result<BookManifest, StoreError> {
        let bytes = self.store.get(&Self::manifest_key(slug)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load the raw workflow template document. Kept as text; the
    /// workflow engine owns parsing and dialect detection.
    pub async fn load_workflow(&self, slug: &str) -> Result<String, StoreError> {
        let bytes = self.store.get(&Self::workflow_key(slug)).await?;
        String::from_utf8(bytes)
            .map_err(|_| StoreError::Backend(format!("workflow for {slug} is not UTF-8")))
    }

    /// Fetch a base illustration. Templates occasionally ship JPEG
    /// sources under a `.png` manifest entry (and vice versa), so the
    /// sibling extension is tried before giving up.
    pub async fn load_illustration(&self, base_uri: &str) -> Result<Vec<u8>, StoreError> {
        match self.store.get(base_uri).await {
            Ok(bytes) => Ok(bytes),
            Err(StoreError::NotFound(_)) => {
                let sibling = swap_extension(base_uri);
                debug!(base_uri, sibling, "illustration missing, trying sibling extension");
                self.store.get(&sibling).await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the explicit region mask next to an illustration, if the
    /// template author provided one.
    pub async fn load_explicit_mask(&self, base_uri: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.store.get(&explicit_mask_key(base_uri)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `foo.png` -> `foo.jpg` and back.
fn swap_extension(key: &str) -> String {
    match key.rsplit_once('.') {
        Some((stem, "png")) => format!("{stem}.jpg"),
        Some((stem, "jpg")) | Some((stem, "jpeg")) => format!("{stem}.png"),
        _ => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryStore;
    use assert_matches::assert_matches;

    fn seeded() -> TemplateStore {
        let mut store = MemoryStore::new();
        store.seed(
            "templates/wonderland/manifest.json",
            br#"{
                "slug": "wonderland",
                "typography": { "font_uri": "fonts/body.ttf" },
                "pages": [
                    { "page_num": 0, "base_uri": "templates/wonderland/pages/page_00_base.png" }
                ]
            }"#
            .to_vec(),
        );
        store.seed("templates/wonderland/workflow.json", b"{}".to_vec());
        store.seed("templates/wonderland/pages/page_00_base.jpg", vec![1]);
        store.seed("templates/wonderland/pages/page_01_base.png", vec![2]);
        store.seed(
            "templates/wonderland/pages/page_01_base_mask.png",
            vec![3],
        );
        TemplateStore::new(Arc::new(store))
    }

    #[tokio::test]
    async fn loads_and_parses_manifest() {
        let m = seeded().load_manifest("wonderland").await.unwrap();
        assert_eq!(m.slug, "wonderland");
        assert_eq!(m.pages.len(), 1);
    }

    #[tokio::test]
    async fn missing_manifest_is_not_found() {
        assert_matches!(
            seeded().load_manifest("atlantis").await,
            Err(StoreError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn illustration_falls_back_to_sibling_extension() {
        // Manifest says .png; only the .jpg exists.
        let bytes = seeded()
            .load_illustration("templates/wonderland/pages/page_00_base.png")
            .await
            .unwrap();
        assert_eq!(bytes, vec![1]);
    }

    #[tokio::test]
    async fn explicit_mask_present_and_absent() {
        let ts = seeded();
        let mask = ts
            .load_explicit_mask("templates/wonderland/pages/page_01_base.png")
            .await
            .unwrap();
        assert_eq!(mask, Some(vec![3]));

        let none = ts
            .load_explicit_mask("templates/wonderland/pages/page_00_base.png")
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
