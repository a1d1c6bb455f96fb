//! The Artefact Store itself: content-addressed, chunked, atomically
//! visible blobs.
//!
//! Content hashes use the same hash-then-hex-encode idiom and `Database`
//! connection shape as the Run Store; this store talks to its own
//! namespace (`muxcore`/`artefacts`) so artefact bytes never share a
//! table space with Run Store records.

use crate::error::{ArtefactError, ArtefactResult};
use crate::retention::RetentionPolicy;
use base64::Engine;
use muxcore_core::{ArtefactId, Timestamp};
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::{debug, info};

const MANIFESTS: &str = "artefact_manifests";
const CHUNKS: &str = "artefact_chunks";

/// Blobs are split at this size so a single artefact never requires one
/// unbounded record write.
const CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    artefact_id: String,
    media_type: String,
    size: u64,
    chunk_count: u32,
    created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Chunk {
    data_b64: String,
}

/// Content-addressed blob store.
pub struct ArtefactStore {
    db: Surreal<Any>,
}

impl ArtefactStore {
    /// Connect to an embedded, on-disk store.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::Backend`] if the connection cannot be
    /// established.
    pub async fn connect_embedded(path: &str) -> ArtefactResult<Self> {
        let endpoint = format!("surrealkv://{path}");
        let db = surrealdb::engine::any::connect(endpoint)
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        db.use_ns("muxcore")
            .use_db("artefacts")
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Connect to an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::Backend`] if the connection cannot be
    /// established.
    pub async fn connect_memory() -> ArtefactResult<Self> {
        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        db.use_ns("muxcore")
            .use_db("test")
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Store `bytes`, returning its content-addressed id. Idempotent:
    /// storing the same bytes twice returns the same id and writes the
    /// chunks only once.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::Backend`] on a storage failure.
    pub async fn put(&self, bytes: &[u8], media_type: impl Into<String>) -> ArtefactResult<ArtefactId> {
        let id = ArtefactId(hex::encode(blake3::hash(bytes).as_bytes()));

        let existing: Option<Manifest> = self
            .db
            .select((MANIFESTS, id.0.as_str()))
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        if existing.is_some() {
            debug!(artefact_id = %id, "put is a no-op: artefact already stored");
            return Ok(id);
        }

        let chunks: Vec<&[u8]> = bytes.chunks(CHUNK_SIZE).collect();
        let chunk_count = u32::try_from(chunks.len().max(1)).unwrap_or(u32::MAX);
        for (idx, chunk) in chunks.iter().enumerate() {
            let record = Chunk {
                data_b64: base64::engine::general_purpose::STANDARD.encode(chunk),
            };
            let _existing: Option<Chunk> = self
                .db
                .update((CHUNKS, chunk_key(&id, idx)))
                .content(record)
                .await
                .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        }
        if chunks.is_empty() {
            let record = Chunk { data_b64: String::new() };
            let _existing: Option<Chunk> = self
                .db
                .update((CHUNKS, chunk_key(&id, 0)))
                .content(record)
                .await
                .map_err(|e| ArtefactError::Backend(e.to_string()))?;
        }

        let manifest = Manifest {
            artefact_id: id.0.clone(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            chunk_count,
            created_at: muxcore_core::time::now(),
        };
        // Written last: a reader only ever sees a manifest once every
        // chunk it names has already landed, giving atomic visibility.
        let _existing: Option<Manifest> = self
            .db
            .update((MANIFESTS, id.0.as_str()))
            .content(manifest)
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;

        Ok(id)
    }

    /// Fetch the bytes for an artefact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::NotFound`] if no artefact with this id has
    /// been (fully) stored.
    pub async fn get(&self, id: &ArtefactId) -> ArtefactResult<Vec<u8>> {
        let manifest: Manifest = self
            .db
            .select((MANIFESTS, id.0.as_str()))
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?
            .ok_or_else(|| ArtefactError::NotFound(id.0.clone()))?;

        let mut bytes = Vec::with_capacity(manifest.size as usize);
        for idx in 0..manifest.chunk_count {
            let chunk: Chunk = self
                .db
                .select((CHUNKS, chunk_key(id, idx as usize)))
                .await
                .map_err(|e| ArtefactError::Backend(e.to_string()))?
                .ok_or_else(|| ArtefactError::NotFound(id.0.clone()))?;
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(chunk.data_b64)
                .map_err(|e| ArtefactError::Backend(e.to_string()))?;
            bytes.extend_from_slice(&decoded);
        }
        Ok(bytes)
    }

    /// Return the media type and size for a stored artefact, without
    /// reading its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::NotFound`] if no such artefact exists.
    pub async fn stat(&self, id: &ArtefactId) -> ArtefactResult<(String, u64)> {
        let manifest: Manifest = self
            .db
            .select((MANIFESTS, id.0.as_str()))
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?
            .ok_or_else(|| ArtefactError::NotFound(id.0.clone()))?;
        Ok((manifest.media_type, manifest.size))
    }

    /// Delete every artefact whose manifest is older than `policy`'s
    /// `max_age`, independent of whether any run still references it.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::Backend`] on a storage failure.
    pub async fn enforce_retention(&self, policy: RetentionPolicy) -> ArtefactResult<u64> {
        let Some(max_age) = policy.max_age else {
            return Ok(0);
        };
        let manifests: Vec<Manifest> = self
            .db
            .select(MANIFESTS)
            .await
            .map_err(|e| ArtefactError::Backend(e.to_string()))?;

        let cutoff = muxcore_core::time::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut removed = 0u64;
        for manifest in manifests {
            if manifest.created_at < cutoff {
                for idx in 0..manifest.chunk_count {
                    let _: Option<Chunk> = self
                        .db
                        .delete((CHUNKS, format!("{}_{idx}", manifest.artefact_id)))
                        .await
                        .map_err(|e| ArtefactError::Backend(e.to_string()))?;
                }
                let _: Option<Manifest> = self
                    .db
                    .delete((MANIFESTS, manifest.artefact_id.clone()))
                    .await
                    .map_err(|e| ArtefactError::Backend(e.to_string()))?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "retention sweep deleted expired artefacts");
        }
        Ok(removed)
    }
}

fn chunk_key(id: &ArtefactId, idx: usize) -> String {
    format!("{}_{idx}", id.0)
}

impl std::fmt::Debug for ArtefactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtefactStore").finish_non_exhaustive()
    }
}
