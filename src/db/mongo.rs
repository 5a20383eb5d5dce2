//! MongoDB client and collection wrapper
//!
//! Pattern adapted from holo-host/rust/util_libs/db/src/mongodb

use bson::{doc, oid::ObjectId, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::types::MannaError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client and verify it with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, MannaError> {
        info!("Connecting to MongoDB at {}", redact_uri(uri));

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = with_option(uri, "serverSelectionTimeoutMS=3000&connectTimeoutMS=3000");

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            MannaError::StoreUnavailable(format!("Failed to connect to MongoDB: {}", e))
        })?;

        let mongo = Self {
            client,
            db_name: db_name.to_string(),
        };
        mongo.ping().await?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(mongo)
    }

    /// Round-trip to the server
    pub async fn ping(&self) -> Result<(), MannaError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MannaError::StoreUnavailable(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, MannaError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, MannaError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), MannaError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| classify_error(e, "Failed to create indexes"))?;

        Ok(())
    }

    /// Insert a document; the server assigns `_id`
    pub async fn insert_one(&self, item: T) -> Result<ObjectId, MannaError> {
        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| classify_error(e, "Insert failed"))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MannaError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by `_id`
    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<T>, MannaError> {
        self.inner
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| classify_error(e, "Find failed"))
    }
}

/// Map a driver error onto the crate taxonomy
pub fn classify_error(err: MongoError, context: &str) -> MannaError {
    let detail = format!("{}: {}", context, err);
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => MannaError::StoreUnavailable(detail),
        ErrorKind::Write(WriteFailure::WriteError(_))
        | ErrorKind::InvalidArgument { .. }
        | ErrorKind::BsonSerialization(_) => MannaError::StoreRejected(detail),
        // Write concern failures land here
        _ => MannaError::Database(detail),
    }
}

/// Append query options, adding the `/` the URI grammar needs before `?`
fn with_option(uri: &str, options: &str) -> String {
    if uri.contains('?') {
        return format!("{}&{}", uri, options);
    }
    let has_path = uri
        .split_once("://")
        .map(|(_, rest)| rest.contains('/'))
        .unwrap_or(false);
    if has_path {
        format!("{}?{}", uri, options)
    } else {
        format!("{}/?{}", uri, options)
    }
}

/// Strip credentials from a connection string before logging it
pub fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
