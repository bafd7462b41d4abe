//! Administrative key and project operations.
//!
//! Mint writes the key document first, then the project index, then the usage
//! hash: a failure between writes can leave a readable document missing from
//! the index, never a listed key that cannot be read.

use crate::{
    credential::{self, Credential},
    store::{KeyDoc, ManagerStore, ProjectDoc, StoreError},
    verifier::Verifier,
};
use thiserror::Error;
use tracing::{info, warn};

/// Key-id collisions trigger regeneration this many times before giving up.
pub const MINT_MAX_ATTEMPTS: usize = 5;

/// Largest accepted `metadata` payload in bytes.
pub const METADATA_MAX_BYTES: usize = 4096;

/// Pagination bounds for key listing.
pub const LIST_LIMIT_DEFAULT: usize = 50;
pub const LIST_LIMIT_MAX: usize = 200;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("API key not found")]
    KeyNotFound,
    #[error("project not found")]
    ProjectNotFound,
    #[error("project already exists")]
    ProjectExists,
    #[error("store unavailable")]
    Unavailable,
    #[error("internal failure: {0}")]
    Internal(String),
}

fn store_failure(err: StoreError) -> AdminError {
    match err {
        StoreError::Transient(_) => AdminError::Unavailable,
        other => AdminError::Internal(other.to_string()),
    }
}

/// Store operations the admin paths depend on. [`ManagerStore`] is the
/// production implementation; tests substitute an in-memory double.
#[allow(async_fn_in_trait)]
pub trait AdminStore {
    async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError>;
    async fn put_key(&self, doc: &KeyDoc) -> Result<(), StoreError>;
    async fn set_key_disabled(&self, project_id: &str, key_id: &str) -> Result<(), StoreError>;
    async fn add_key_to_index(&self, project_id: &str, key_id: &str) -> Result<(), StoreError>;
    async fn scan_index(
        &self,
        project_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<String>, Option<u64>), StoreError>;
    async fn get_project(&self, project_id: &str) -> Result<ProjectDoc, StoreError>;
    async fn put_project(&self, doc: &ProjectDoc) -> Result<(), StoreError>;
    async fn init_usage(&self, project_id: &str, key_id: &str) -> Result<(), StoreError>;
}

impl AdminStore for ManagerStore {
    async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
        Self::get_key(self, project_id, key_id).await
    }

    async fn put_key(&self, doc: &KeyDoc) -> Result<(), StoreError> {
        Self::put_key(self, doc).await
    }

    async fn set_key_disabled(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        Self::set_key_disabled(self, project_id, key_id).await
    }

    async fn add_key_to_index(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        Self::add_key_to_index(self, project_id, key_id).await
    }

    async fn scan_index(
        &self,
        project_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<String>, Option<u64>), StoreError> {
        Self::scan_index(self, project_id, offset, limit).await
    }

    async fn get_project(&self, project_id: &str) -> Result<ProjectDoc, StoreError> {
        Self::get_project(self, project_id).await
    }

    async fn put_project(&self, doc: &ProjectDoc) -> Result<(), StoreError> {
        Self::put_project(self, doc).await
    }

    async fn init_usage(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        Self::init_usage(self, project_id, key_id).await
    }
}

/// Inputs for minting one key. Field constraints are enforced at the API
/// boundary before this type is built.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub project_id: String,
    pub owner: String,
    pub metadata: String,
    pub expires_at: Option<f64>,
}

/// Result of a successful mint. The bearer string is handed out exactly once.
#[derive(Debug, Clone)]
pub struct MintedKey {
    pub api_key: String,
    pub key_id: String,
}

/// Mint a new API key.
///
/// # Errors
/// Returns `Internal` when the key-id space keeps colliding or the verifier
/// cannot be derived, and the mapped store error otherwise.
pub async fn mint_key<S: AdminStore>(
    store: &S,
    verifier: &Verifier,
    request: &MintRequest,
    now: f64,
) -> Result<MintedKey, AdminError> {
    let secret =
        credential::generate_secret().map_err(|err| AdminError::Internal(err.to_string()))?;
    let secret_hash = verifier
        .hash(&secret)
        .map_err(|err| AdminError::Internal(err.to_string()))?;

    for _ in 0..MINT_MAX_ATTEMPTS {
        let key_id =
            credential::generate_key_id().map_err(|err| AdminError::Internal(err.to_string()))?;

        let doc = KeyDoc {
            key_id: key_id.clone(),
            project_id: request.project_id.clone(),
            owner: request.owner.clone(),
            metadata: request.metadata.clone(),
            secret_hash: secret_hash.clone(),
            disabled: false,
            created_at: now,
            expires_at: request.expires_at,
        };

        match store.put_key(&doc).await {
            Ok(()) => {
                // The document is durable; index and usage failures leave a
                // readable key that is merely unlisted, so the mint still
                // reports success.
                if let Err(err) = store.add_key_to_index(&request.project_id, &key_id).await {
                    warn!(
                        "failed to index minted key {}:{key_id}: {err}",
                        request.project_id
                    );
                } else if let Err(err) = store.init_usage(&request.project_id, &key_id).await {
                    warn!(
                        "failed to initialize usage for {}:{key_id}: {err}",
                        request.project_id
                    );
                }

                info!(
                    "Minted new API key for project {}, key {key_id}",
                    request.project_id
                );

                let api_key = Credential {
                    project_id: request.project_id.clone(),
                    key_id: key_id.clone(),
                    secret: secret.clone(),
                }
                .format();

                return Ok(MintedKey { api_key, key_id });
            }
            Err(StoreError::AlreadyExists) => {
                // Key-id collision; draw a fresh identifier.
                continue;
            }
            Err(err) => return Err(store_failure(err)),
        }
    }

    Err(AdminError::Internal(
        "key id generation kept colliding".to_string(),
    ))
}

/// Disable a key. Idempotent: revoking an already-disabled key succeeds.
///
/// # Errors
/// `KeyNotFound` when the key document does not exist.
pub async fn revoke_key<S: AdminStore>(
    store: &S,
    project_id: &str,
    key_id: &str,
) -> Result<(), AdminError> {
    // Existence check first: a partial update on a missing document is not
    // expressible as a single store call.
    match store.get_key(project_id, key_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => return Err(AdminError::KeyNotFound),
        Err(err) => return Err(store_failure(err)),
    }

    match store.set_key_disabled(project_id, key_id).await {
        Ok(()) => {
            info!("Revoked API key for project {project_id}, key {key_id}");
            Ok(())
        }
        Err(StoreError::NotFound) => Err(AdminError::KeyNotFound),
        Err(err) => Err(store_failure(err)),
    }
}

/// One page of key listings plus the follow-up offset.
#[derive(Debug)]
pub struct KeyPage {
    pub items: Vec<KeyDoc>,
    pub next: Option<u64>,
}

/// List a project's keys ordered by `key_id` ascending.
///
/// `limit` is clamped into `[1, 200]`.
///
/// # Errors
/// Returns the mapped store error when the index scan or a document fetch
/// fails.
pub async fn list_keys<S: AdminStore>(
    store: &S,
    project_id: &str,
    offset: usize,
    limit: usize,
) -> Result<KeyPage, AdminError> {
    let limit = limit.clamp(1, LIST_LIMIT_MAX);

    let (key_ids, next) = store
        .scan_index(project_id, offset, limit)
        .await
        .map_err(store_failure)?;

    let mut items = Vec::with_capacity(key_ids.len());
    for key_id in key_ids {
        match store.get_key(project_id, &key_id).await {
            Ok(doc) => items.push(doc),
            // Mint orders document before index, so a listed id without a
            // document means the document was deleted externally; skip it.
            Err(StoreError::NotFound) => continue,
            Err(err) => return Err(store_failure(err)),
        }
    }

    Ok(KeyPage { items, next })
}

/// Create a project record. Create-only.
///
/// # Errors
/// `ProjectExists` on conflict.
pub async fn create_project<S: AdminStore>(
    store: &S,
    doc: &ProjectDoc,
) -> Result<(), AdminError> {
    match store.put_project(doc).await {
        Ok(()) => {
            info!("Created project {}", doc.project_id);
            Ok(())
        }
        Err(StoreError::AlreadyExists) => Err(AdminError::ProjectExists),
        Err(err) => Err(store_failure(err)),
    }
}

/// Fetch a project record.
///
/// # Errors
/// `ProjectNotFound` when absent.
pub async fn get_project<S: AdminStore>(
    store: &S,
    project_id: &str,
) -> Result<ProjectDoc, AdminError> {
    match store.get_project(project_id).await {
        Ok(doc) => Ok(doc),
        Err(StoreError::NotFound) => Err(AdminError::ProjectNotFound),
        Err(err) => Err(store_failure(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifierParams;
    use anyhow::Result;
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
        sync::Mutex,
    };

    const NOW: f64 = 1_700_000_000.0;

    #[derive(Default)]
    struct MockStore {
        keys: Mutex<BTreeMap<(String, String), KeyDoc>>,
        projects: Mutex<BTreeMap<String, ProjectDoc>>,
        index: Mutex<BTreeMap<String, Vec<String>>>,
        usage_inits: AtomicUsize,
        put_key_collisions: AtomicUsize,
        index_fails: bool,
    }

    impl MockStore {
        fn with_collisions(count: usize) -> Self {
            let store = Self::default();
            store.put_key_collisions.store(count, Ordering::SeqCst);
            store
        }

        fn insert_key(&self, doc: KeyDoc) {
            if let Ok(mut keys) = self.keys.lock() {
                keys.insert((doc.project_id.clone(), doc.key_id.clone()), doc);
            }
        }
    }

    impl AdminStore for MockStore {
        async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
            self.keys
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?
                .get(&(project_id.to_string(), key_id.to_string()))
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn put_key(&self, doc: &KeyDoc) -> Result<(), StoreError> {
            let remaining = self.put_key_collisions.load(Ordering::SeqCst);
            if remaining > 0 {
                self.put_key_collisions.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::AlreadyExists);
            }
            let mut keys = self
                .keys
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?;
            let name = (doc.project_id.clone(), doc.key_id.clone());
            if keys.contains_key(&name) {
                return Err(StoreError::AlreadyExists);
            }
            keys.insert(name, doc.clone());
            Ok(())
        }

        async fn set_key_disabled(
            &self,
            project_id: &str,
            key_id: &str,
        ) -> Result<(), StoreError> {
            let mut keys = self
                .keys
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?;
            match keys.get_mut(&(project_id.to_string(), key_id.to_string())) {
                Some(doc) => {
                    doc.disabled = true;
                    Ok(())
                }
                None => Err(StoreError::NotFound),
            }
        }

        async fn add_key_to_index(
            &self,
            project_id: &str,
            key_id: &str,
        ) -> Result<(), StoreError> {
            if self.index_fails {
                return Err(StoreError::Transient("down".to_string()));
            }
            let mut index = self
                .index
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?;
            index
                .entry(project_id.to_string())
                .or_default()
                .push(key_id.to_string());
            Ok(())
        }

        async fn scan_index(
            &self,
            project_id: &str,
            offset: usize,
            limit: usize,
        ) -> Result<(Vec<String>, Option<u64>), StoreError> {
            let mut members = self
                .index
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?
                .get(project_id)
                .cloned()
                .unwrap_or_default();
            members.sort();
            let total = members.len();
            let page: Vec<String> = members.into_iter().skip(offset).take(limit).collect();
            let next = if offset + limit < total {
                Some((offset + limit) as u64)
            } else {
                None
            };
            Ok((page, next))
        }

        async fn get_project(&self, project_id: &str) -> Result<ProjectDoc, StoreError> {
            self.projects
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?
                .get(project_id)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn put_project(&self, doc: &ProjectDoc) -> Result<(), StoreError> {
            let mut projects = self
                .projects
                .lock()
                .map_err(|_| StoreError::Permanent("poisoned".to_string()))?;
            if projects.contains_key(&doc.project_id) {
                return Err(StoreError::AlreadyExists);
            }
            projects.insert(doc.project_id.clone(), doc.clone());
            Ok(())
        }

        async fn init_usage(&self, _project_id: &str, _key_id: &str) -> Result<(), StoreError> {
            self.usage_inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn cheap_verifier() -> Result<Verifier> {
        Verifier::new(VerifierParams {
            time_cost: 1,
            memory_kib: 8,
            parallelism: 1,
        })
    }

    fn mint_request() -> MintRequest {
        MintRequest {
            project_id: "merlin".to_string(),
            owner: "Mario".to_string(),
            metadata: "research-west".to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn mint_stores_document_index_and_usage() -> Result<()> {
        let store = MockStore::default();
        let verifier = cheap_verifier()?;

        let minted = mint_key(&store, &verifier, &mint_request(), NOW)
            .await
            .map_err(|err| anyhow::anyhow!("mint failed: {err}"))?;

        let credential = crate::credential::Credential::parse(&minted.api_key)
            .map_err(|err| anyhow::anyhow!("unparseable bearer: {err}"))?;
        assert_eq!(credential.project_id, "merlin");
        assert_eq!(credential.key_id, minted.key_id);

        let doc = store.get_key("merlin", &minted.key_id).await?;
        assert_eq!(doc.owner, "Mario");
        assert!(!doc.disabled);
        assert_eq!(doc.created_at, NOW);

        // The stored verifier accepts exactly the generated secret.
        verifier.verify(&credential.secret, &doc.secret_hash)?;
        assert!(verifier.verify("something-else-entirely", &doc.secret_hash).is_err());

        let (ids, _) = store.scan_index("merlin", 0, 10).await?;
        assert_eq!(ids, vec![minted.key_id]);
        assert_eq!(store.usage_inits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn mint_retries_on_key_id_collisions() -> Result<()> {
        let store = MockStore::with_collisions(4);
        let verifier = cheap_verifier()?;

        let minted = mint_key(&store, &verifier, &mint_request(), NOW).await;
        assert!(minted.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn mint_gives_up_after_five_collisions() -> Result<()> {
        let store = MockStore::with_collisions(5);
        let verifier = cheap_verifier()?;

        let minted = mint_key(&store, &verifier, &mint_request(), NOW).await;
        assert!(matches!(minted, Err(AdminError::Internal(_))));
        Ok(())
    }

    #[tokio::test]
    async fn mint_survives_index_failure() -> Result<()> {
        let mut store = MockStore::default();
        store.index_fails = true;
        let verifier = cheap_verifier()?;

        // Document write succeeded, so the mint reports success even though
        // the key will not show up in listings.
        let minted = mint_key(&store, &verifier, &mint_request(), NOW)
            .await
            .map_err(|err| anyhow::anyhow!("mint failed: {err}"))?;
        assert!(store.get_key("merlin", &minted.key_id).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn revoke_disables_and_is_idempotent() -> Result<()> {
        let store = MockStore::default();
        let verifier = cheap_verifier()?;
        let minted = mint_key(&store, &verifier, &mint_request(), NOW)
            .await
            .map_err(|err| anyhow::anyhow!("mint failed: {err}"))?;

        revoke_key(&store, "merlin", &minted.key_id)
            .await
            .map_err(|err| anyhow::anyhow!("revoke failed: {err}"))?;
        let doc = store.get_key("merlin", &minted.key_id).await?;
        assert!(doc.disabled);

        // Second revocation is a success, not an error.
        revoke_key(&store, "merlin", &minted.key_id)
            .await
            .map_err(|err| anyhow::anyhow!("second revoke failed: {err}"))?;
        Ok(())
    }

    #[tokio::test]
    async fn revoke_missing_key_is_not_found() -> Result<()> {
        let store = MockStore::default();
        let result = revoke_key(&store, "merlin", "k_missing").await;
        assert!(matches!(result, Err(AdminError::KeyNotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn list_pages_in_ascending_key_order() -> Result<()> {
        let store = MockStore::default();
        for idx in 0..75 {
            let key_id = format!("k_{idx:04}");
            store.insert_key(KeyDoc {
                key_id: key_id.clone(),
                project_id: "p".to_string(),
                owner: "owner".to_string(),
                metadata: String::new(),
                secret_hash: "$argon2id$...".to_string(),
                disabled: false,
                created_at: NOW,
                expires_at: None,
            });
            store.add_key_to_index("p", &key_id).await?;
        }

        let first = list_keys(&store, "p", 0, 50)
            .await
            .map_err(|err| anyhow::anyhow!("list failed: {err}"))?;
        assert_eq!(first.items.len(), 50);
        assert_eq!(first.next, Some(50));
        let mut sorted = first
            .items
            .iter()
            .map(|doc| doc.key_id.clone())
            .collect::<Vec<_>>();
        let original = sorted.clone();
        sorted.sort();
        assert_eq!(sorted, original);

        let second = list_keys(&store, "p", 50, 50)
            .await
            .map_err(|err| anyhow::anyhow!("list failed: {err}"))?;
        assert_eq!(second.items.len(), 25);
        assert_eq!(second.next, None);
        Ok(())
    }

    #[tokio::test]
    async fn list_clamps_limit() -> Result<()> {
        let store = MockStore::default();
        for idx in 0..5 {
            let key_id = format!("k_{idx:04}");
            store.insert_key(KeyDoc {
                key_id: key_id.clone(),
                project_id: "p".to_string(),
                owner: "owner".to_string(),
                metadata: String::new(),
                secret_hash: String::new(),
                disabled: false,
                created_at: NOW,
                expires_at: None,
            });
            store.add_key_to_index("p", &key_id).await?;
        }

        // A zero limit is clamped up to one item.
        let page = list_keys(&store, "p", 0, 0)
            .await
            .map_err(|err| anyhow::anyhow!("list failed: {err}"))?;
        assert_eq!(page.items.len(), 1);

        // An oversized limit is clamped down to the maximum.
        let page = list_keys(&store, "p", 0, 10_000)
            .await
            .map_err(|err| anyhow::anyhow!("list failed: {err}"))?;
        assert_eq!(page.items.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn list_empty_project_is_empty() -> Result<()> {
        let store = MockStore::default();
        let page = list_keys(&store, "ghost", 0, 50)
            .await
            .map_err(|err| anyhow::anyhow!("list failed: {err}"))?;
        assert!(page.items.is_empty());
        assert_eq!(page.next, None);
        Ok(())
    }

    #[tokio::test]
    async fn project_create_is_create_only() -> Result<()> {
        let store = MockStore::default();
        let doc = ProjectDoc {
            project_id: "merlin".to_string(),
            label: "Research".to_string(),
            owner: "Mario".to_string(),
            created_at: NOW,
        };

        create_project(&store, &doc)
            .await
            .map_err(|err| anyhow::anyhow!("create failed: {err}"))?;
        let fetched = get_project(&store, "merlin")
            .await
            .map_err(|err| anyhow::anyhow!("get failed: {err}"))?;
        assert_eq!(fetched, doc);

        let conflict = create_project(&store, &doc).await;
        assert!(matches!(conflict, Err(AdminError::ProjectExists)));
        Ok(())
    }

    #[tokio::test]
    async fn missing_project_is_not_found() -> Result<()> {
        let store = MockStore::default();
        let result = get_project(&store, "ghost").await;
        assert!(matches!(result, Err(AdminError::ProjectNotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn mint_accepts_already_expired_timestamp() -> Result<()> {
        // Expiry in the past is representable; validation is where it bites.
        let store = MockStore::default();
        let verifier = cheap_verifier()?;
        let request = MintRequest {
            expires_at: Some(NOW - 1.0),
            ..mint_request()
        };
        let minted = mint_key(&store, &verifier, &request, NOW)
            .await
            .map_err(|err| anyhow::anyhow!("mint failed: {err}"))?;
        let doc = store.get_key("merlin", &minted.key_id).await?;
        assert!(doc.is_expired(NOW));
        Ok(())
    }
}
