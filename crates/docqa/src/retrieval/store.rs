//! SQLite-persisted vector collection searched through an HNSW graph
//!
//! SQLite is the durable record: ids, texts, metadata and embeddings. The graph
//! is rebuilt from the stored embeddings on open and maps graph points back to
//! chunk ids; texts and metadata are read from SQLite for each hit. Writes
//! commit to SQLite before the graph changes.

use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::{Metadata, SearchHit, StoredChunk};

/// Upper bound on graph layers accepted by hnsw_rs
const MAX_LAYERS: usize = 16;

/// HNSW construction and search parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Connections per layer
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Expected number of points
    pub max_elements: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 32,
            ef_construction: 200,
            ef_search: 100,
            max_elements: 100_000,
        }
    }
}

impl From<&VectorDbConfig> for HnswParams {
    fn from(config: &VectorDbConfig) -> Self {
        Self {
            m: config.hnsw_m,
            ef_construction: config.hnsw_ef_construction,
            ef_search: config.hnsw_ef_search,
            max_elements: config.hnsw_max_elements,
        }
    }
}

/// HNSW graph over the live chunks
///
/// hnsw_rs cannot remove points, so replaced and deleted chunks are dropped
/// from `points` and skipped at search time until the next rebuild.
struct Graph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    /// Live graph point -> chunk id
    points: HashMap<usize, String>,
    /// Chunk id -> live graph point
    by_id: HashMap<String, usize>,
    next_point: usize,
}

impl Graph {
    fn new(params: &HnswParams, expected: usize) -> Self {
        let hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
            params.m,
            params.max_elements.max(expected).max(1),
            MAX_LAYERS,
            params.ef_construction,
            DistCosine,
        );
        Self {
            hnsw,
            points: HashMap::new(),
            by_id: HashMap::new(),
            next_point: 0,
        }
    }

    fn insert(&mut self, id: String, vector: &[f32]) {
        self.remove(&id);
        let point = self.next_point;
        self.next_point += 1;
        self.hnsw.insert((vector, point));
        self.points.insert(point, id.clone());
        self.by_id.insert(id, point);
    }

    fn remove(&mut self, id: &str) {
        if let Some(point) = self.by_id.remove(id) {
            self.points.remove(&point);
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    /// Points still in the graph that no longer belong to a chunk
    fn dead(&self) -> usize {
        self.next_point - self.points.len()
    }

    /// Up to `knbn` live chunk ids nearest to `vector`, ascending by cosine distance
    fn search(&self, vector: &[f32], knbn: usize, ef_search: usize) -> Vec<(String, f32)> {
        if self.points.is_empty() {
            return Vec::new();
        }

        let neighbours: Vec<Neighbour> = self.hnsw.search(vector, knbn, ef_search.max(knbn));
        let mut hits: Vec<(String, f32)> = neighbours
            .into_iter()
            .filter_map(|n| self.points.get(&n.d_id).map(|id| (id.clone(), n.distance)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }
}

struct Collection {
    embedding_model: String,
    dimension: usize,
    graph: Graph,
}

/// A single named vector collection
pub struct VectorStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    name: String,
    params: HnswParams,
    collection: RwLock<Collection>,
}

impl VectorStore {
    /// Open (or create) the collection; an existing collection keeps its own model
    pub fn open<P: AsRef<Path>>(
        path: P,
        name: &str,
        embedding_model: &str,
        dimension: usize,
        params: HnswParams,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)
            .map_err(|e| Error::vector_db(format!("Failed to open {}: {}", path.display(), e)))?;
        Self::from_connection(conn, path, name, embedding_model, dimension, params)
    }

    /// Create an in-memory store (for testing)
    #[cfg(test)]
    pub fn in_memory(name: &str, embedding_model: &str, dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(
            conn,
            PathBuf::from(":memory:"),
            name,
            embedding_model,
            dimension,
            HnswParams::default(),
        )
    }

    fn from_connection(
        conn: Connection,
        path: PathBuf,
        name: &str,
        embedding_model: &str,
        dimension: usize,
        params: HnswParams,
    ) -> Result<Self> {
        Self::migrate(&conn)?;

        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT embedding_model, dimension FROM collections WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (model, dimension) = match existing {
            Some((model, dim)) => {
                if model != embedding_model {
                    tracing::info!(
                        "Collection '{}' was built with '{}', keeping it",
                        name,
                        model
                    );
                }
                (model, dim as usize)
            }
            None => {
                conn.execute(
                    "INSERT INTO collections (name, embedding_model, dimension, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, embedding_model, dimension as i64, chrono::Utc::now().to_rfc3339()],
                )?;
                (embedding_model.to_string(), dimension)
            }
        };

        let graph = build_graph(&conn, name, dimension, &params)?;
        tracing::info!(
            "Loaded collection '{}' ({} vectors, dim {})",
            name,
            graph.len(),
            dimension
        );

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            name: name.to_string(),
            params,
            collection: RwLock::new(Collection {
                embedding_model: model,
                dimension,
                graph,
            }),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embedding_model TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                filename TEXT,
                file_hash TEXT,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection);
            CREATE INDEX IF NOT EXISTS idx_chunks_file_hash ON chunks(collection, file_hash);
            CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(collection, filename);
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace entries, all or nothing
    pub fn upsert(
        &self,
        ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<()> {
        if ids.len() != vectors.len() || ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(Error::vector_db(format!(
                "Mismatched upsert lengths: {} ids, {} vectors, {} texts, {} metadatas",
                ids.len(),
                vectors.len(),
                texts.len(),
                metadatas.len()
            )));
        }

        let mut collection = self.collection.write();
        if let Some(bad) = vectors.iter().find(|v| v.len() != collection.dimension) {
            return Err(Error::DimensionMismatch {
                expected: collection.dimension,
                actual: bad.len(),
            });
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO chunks
                     (id, collection, filename, file_hash, text, metadata, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for i in 0..ids.len() {
                    stmt.execute(params![
                        ids[i],
                        self.name,
                        str_field(&metadatas[i], "filename"),
                        str_field(&metadatas[i], "file_hash"),
                        texts[i],
                        serde_json::to_string(&metadatas[i])?,
                        encode_vector(&vectors[i]),
                    ])?;
                }
            }
            tx.commit()?;
        }

        for (id, vector) in ids.into_iter().zip(vectors.iter()) {
            collection.graph.insert(id, vector);
        }
        Ok(())
    }

    /// Up to `k` nearest entries by cosine distance, ascending
    ///
    /// With a filter the candidate set is widened until `k` matches are found
    /// or the whole graph has been considered.
    pub fn query(&self, vector: &[f32], k: usize, filter: Option<&Metadata>) -> Result<Vec<SearchHit>> {
        let collection = self.collection.read();
        if vector.len() != collection.dimension {
            return Err(Error::DimensionMismatch {
                expected: collection.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 || collection.graph.len() == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let total = collection.graph.next_point;
        let mut fetch = k.min(total);
        loop {
            let mut hits = Vec::with_capacity(k);
            for (id, distance) in collection.graph.search(vector, fetch, self.params.ef_search) {
                let Some((text, metadata)) = load_chunk(&conn, &self.name, &id)? else {
                    continue;
                };
                if filter.map_or(true, |f| matches_filter(&metadata, f)) {
                    hits.push(SearchHit {
                        id,
                        text,
                        metadata,
                        distance,
                    });
                    if hits.len() == k {
                        break;
                    }
                }
            }

            if hits.len() == k || fetch >= total {
                return Ok(hits);
            }
            fetch = (fetch * 4).min(total);
        }
    }

    /// Whether any entry carries this content hash
    pub fn exists_by_hash(&self, file_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chunks WHERE collection = ?1 AND file_hash = ?2)",
            params![self.name, file_hash],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    /// Delete every entry matching `filter`, returning how many were removed
    pub fn delete(&self, filter: &Metadata) -> Result<usize> {
        let mut collection = self.collection.write();
        let mut conn = self.conn.lock();

        let doomed = matching_ids(&conn, &self.name, filter)?;
        if doomed.is_empty() {
            return Ok(0);
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM chunks WHERE id = ?1 AND collection = ?2")?;
            for id in &doomed {
                stmt.execute(params![id, self.name])?;
            }
        }
        tx.commit()?;

        for id in &doomed {
            collection.graph.remove(id);
        }
        if collection.graph.dead() > collection.graph.len() {
            tracing::debug!(
                "Compacting graph for '{}' ({} dead points)",
                self.name,
                collection.graph.dead()
            );
            collection.graph = build_graph(&conn, &self.name, collection.dimension, &self.params)?;
        }
        Ok(doomed.len())
    }

    /// Number of stored vectors
    pub fn count(&self) -> usize {
        self.collection.read().graph.len()
    }

    /// First `limit` entries in insertion order
    pub fn peek(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, text, metadata FROM chunks WHERE collection = ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![self.name, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut sample = Vec::new();
        for row in rows {
            let (id, text, metadata) = row?;
            sample.push(StoredChunk {
                id,
                text,
                metadata: serde_json::from_str(&metadata)?,
            });
        }
        Ok(sample)
    }

    /// Names of every collection in the database file
    pub fn collections(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Drop every entry and rebind the collection to a new model
    pub fn recreate(&self, embedding_model: &str, dimension: usize) -> Result<()> {
        let mut collection = self.collection.write();
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM chunks WHERE collection = ?1", params![self.name])?;
            tx.execute(
                "INSERT OR REPLACE INTO collections (name, embedding_model, dimension, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.name,
                    embedding_model,
                    dimension as i64,
                    chrono::Utc::now().to_rfc3339()
                ],
            )?;
            tx.commit()?;
        }

        tracing::warn!(
            "Recreated collection '{}' for model '{}' (dim {}), {} vectors dropped",
            self.name,
            embedding_model,
            dimension,
            collection.graph.len()
        );
        *collection = Collection {
            embedding_model: embedding_model.to_string(),
            dimension,
            graph: Graph::new(&self.params, 0),
        };
        Ok(())
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model the stored vectors were produced with
    pub fn embedding_model(&self) -> String {
        self.collection.read().embedding_model.clone()
    }

    /// Vector dimension accepted by the collection
    pub fn dimension(&self) -> usize {
        self.collection.read().dimension
    }
}

/// Build a graph from every stored embedding of the collection
fn build_graph(conn: &Connection, name: &str, dimension: usize, params: &HnswParams) -> Result<Graph> {
    let stored: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
        params![name],
        |row| row.get(0),
    )?;
    let mut graph = Graph::new(params, stored as usize);

    let mut stmt = conn.prepare("SELECT id, embedding FROM chunks WHERE collection = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map(params![name], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;
    for row in rows {
        let (id, blob) = row?;
        let vector = decode_vector(&blob);
        if vector.len() != dimension {
            return Err(Error::vector_db(format!(
                "Stored vector {} has {} dimensions, collection '{}' expects {}",
                id,
                vector.len(),
                name,
                dimension
            )));
        }
        graph.insert(id, &vector);
    }
    Ok(graph)
}

fn load_chunk(conn: &Connection, collection: &str, id: &str) -> Result<Option<(String, Metadata)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT text, metadata FROM chunks WHERE id = ?1 AND collection = ?2",
            params![id, collection],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((text, metadata)) => Ok(Some((text, serde_json::from_str(&metadata)?))),
        None => Ok(None),
    }
}

/// Ids of entries matching every key of `filter`
///
/// `file_hash` and `filename` narrow the scan through their indexed columns.
fn matching_ids(conn: &Connection, collection: &str, filter: &Metadata) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id, metadata FROM chunks
         WHERE collection = ?1
           AND (?2 IS NULL OR file_hash = ?2)
           AND (?3 IS NULL OR filename = ?3)
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map(
        params![collection, str_field(filter, "file_hash"), str_field(filter, "filename")],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    let mut ids = Vec::new();
    for row in rows {
        let (id, metadata) = row?;
        let metadata: Metadata = serde_json::from_str(&metadata)?;
        if matches_filter(&metadata, filter) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn str_field<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|v| v.as_str())
}

fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
