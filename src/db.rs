//! Database, collection, and table handles.
//!
//! Thin facades over the execution core: they own the SerDes pipelines,
//! spawn cursors, and translate typed calls into command envelopes. Handles
//! reference their parent's client state unidirectionally; event bubbling
//! runs through the child emitter nodes, never through back-pointers.

use crate::constants;
use crate::cursor::{FindCursor, PageDecoder};
use crate::error::{Error, PartialResult, TimeoutCategory};
use crate::events::EventEmitter;
use crate::http::data_api::{Command, DataApiHttpClient, ExecuteOptions, RawDataApiResponse};
use crate::http::timeouts::TimeoutManager;
use crate::options::timeouts::ResolvedTimeouts;
use crate::serdes::codec::PathSpec;
use crate::serdes::{collection_serdes, table_serdes, BigNumberPolicy, SerDes, TableSchema};
use crate::value::DocValue;
use std::sync::Arc;
use std::time::Duration;

/// Data API max batch size per `insertMany` request.
const INSERT_MANY_CHUNK: usize = 50;

/// Big-number configuration shared by the handles of one database.
#[derive(Clone, Default)]
pub struct BigNumberConfig {
    pub per_path: Vec<(PathSpec, BigNumberPolicy)>,
    pub default_policy: BigNumberPolicy,
}

/// A handle onto one database (one Data API endpoint + working keyspace).
pub struct Database {
    client: Arc<DataApiHttpClient>,
    timeouts: ResolvedTimeouts,
    big_numbers: BigNumberConfig,
}

impl Database {
    #[must_use]
    pub fn new(
        client: Arc<DataApiHttpClient>,
        timeouts: ResolvedTimeouts,
        big_numbers: BigNumberConfig,
    ) -> Self {
        Self {
            client,
            timeouts,
            big_numbers,
        }
    }

    /// The working keyspace commands are scoped to.
    #[must_use]
    pub fn keyspace(&self) -> Option<String> {
        self.client.keyspace()
    }

    /// Switches the working keyspace for this database and every handle
    /// spawned from it afterwards.
    pub fn use_keyspace(&self, keyspace: impl Into<String>) {
        self.client.use_keyspace(keyspace);
    }

    /// A handle onto one collection. The handle owns its SerDes pipeline and
    /// narrates into a child emitter node.
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        let name = name.into();
        let emitter = self.client.emitter().child();
        let serdes = Arc::new(collection_serdes(
            self.big_numbers.per_path.clone(),
            self.big_numbers.default_policy,
        ));
        Collection {
            client: Arc::new(self.client.scoped(emitter)),
            name,
            decoder: Arc::new(CollectionDecoder {
                serdes: Arc::clone(&serdes),
            }),
            serdes,
            timeouts: self.timeouts,
        }
    }

    /// A handle onto one table.
    #[must_use]
    pub fn table(&self, name: impl Into<String>) -> Table {
        let name = name.into();
        let emitter = self.client.emitter().child();
        Table {
            client: Arc::new(self.client.scoped(emitter)),
            name,
            decoder: Arc::new(TableDecoder {
                encoder: Arc::new(table_serdes(
                    &TableSchema::default(),
                    self.big_numbers.per_path.clone(),
                    self.big_numbers.default_policy,
                )),
                big_numbers: self.big_numbers.clone(),
            }),
            timeouts: self.timeouts,
        }
    }

    /// Lists collection names in the working keyspace.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn list_collections(&self) -> Result<Vec<String>, Error> {
        let command = Command::new("findCollections", serde_json::json!({}));
        let response = self
            .execute_keyspace(&command, self.timeouts.collection_admin_timeout_ms)
            .await?;
        Ok(extract_names(&response, "collections"))
    }

    /// Creates a collection; `options` is the raw definition payload
    /// (vector config, indexing, ...), forwarded opaquely.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn create_collection(
        &self,
        name: &str,
        options: serde_json::Value,
    ) -> Result<Collection, Error> {
        let command = Command::new(
            "createCollection",
            serde_json::json!({"name": name, "options": options}),
        );
        self.execute_keyspace(&command, self.timeouts.collection_admin_timeout_ms)
            .await?;
        Ok(self.collection(name))
    }

    /// Drops a collection.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn drop_collection(&self, name: &str) -> Result<(), Error> {
        let command = Command::new("deleteCollection", serde_json::json!({"name": name}));
        self.execute_keyspace(&command, self.timeouts.collection_admin_timeout_ms)
            .await?;
        Ok(())
    }

    /// Lists table names in the working keyspace.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn list_tables(&self) -> Result<Vec<String>, Error> {
        let command = Command::new("listTables", serde_json::json!({}));
        let response = self
            .execute_keyspace(&command, self.timeouts.table_admin_timeout_ms)
            .await?;
        Ok(extract_names(&response, "tables"))
    }

    /// Creates a table from a raw definition payload.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn create_table(
        &self,
        name: &str,
        definition: serde_json::Value,
    ) -> Result<Table, Error> {
        let command = Command::new(
            "createTable",
            serde_json::json!({"name": name, "definition": definition}),
        );
        self.execute_keyspace(&command, self.timeouts.table_admin_timeout_ms)
            .await?;
        Ok(self.table(name))
    }

    /// Drops a table.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn drop_table(&self, name: &str) -> Result<(), Error> {
        let command = Command::new("dropTable", serde_json::json!({"name": name}));
        self.execute_keyspace(&command, self.timeouts.table_admin_timeout_ms)
            .await?;
        Ok(())
    }

    /// Lists keyspaces (admin-scoped, outside any keyspace path).
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn list_keyspaces(&self) -> Result<Vec<String>, Error> {
        let command = Command::new("findKeyspaces", serde_json::json!({}));
        let options = ExecuteOptions::for_admin(TimeoutManager::single_phase(
            TimeoutCategory::KeyspaceAdmin,
            Duration::from_millis(self.timeouts.keyspace_admin_timeout_ms),
        ));
        let response = self.client.execute(&command, &options).await?;
        Ok(extract_names(&response, "keyspaces"))
    }

    /// Creates a keyspace (admin-scoped).
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn create_keyspace(&self, name: &str) -> Result<(), Error> {
        let command = Command::new("createKeyspace", serde_json::json!({"name": name}));
        let options = ExecuteOptions::for_admin(TimeoutManager::single_phase(
            TimeoutCategory::KeyspaceAdmin,
            Duration::from_millis(self.timeouts.keyspace_admin_timeout_ms),
        ));
        self.client.execute(&command, &options).await?;
        Ok(())
    }

    /// Drops a keyspace (admin-scoped).
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn drop_keyspace(&self, name: &str) -> Result<(), Error> {
        let command = Command::new("dropKeyspace", serde_json::json!({"name": name}));
        let options = ExecuteOptions::for_admin(TimeoutManager::single_phase(
            TimeoutCategory::KeyspaceAdmin,
            Duration::from_millis(self.timeouts.keyspace_admin_timeout_ms),
        ));
        self.client.execute(&command, &options).await?;
        Ok(())
    }

    async fn execute_keyspace(
        &self,
        command: &Command,
        timeout_ms: u64,
    ) -> Result<RawDataApiResponse, Error> {
        let options = ExecuteOptions::for_keyspace(TimeoutManager::single_phase(
            TimeoutCategory::CollectionAdmin,
            Duration::from_millis(timeout_ms),
        ));
        self.client.execute(command, &options).await
    }
}

fn extract_names(response: &RawDataApiResponse, key: &str) -> Vec<String> {
    response
        .status()
        .and_then(|s| s.get(key))
        .and_then(serde_json::Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(|n| {
                    n.as_str().map_or_else(
                        || {
                            n.get("name")
                                .and_then(serde_json::Value::as_str)
                                .map(ToString::to_string)
                        },
                        |s| Some(s.to_string()),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Response-independent decoder for collection cursors.
struct CollectionDecoder {
    serdes: Arc<SerDes>,
}

impl PageDecoder for CollectionDecoder {
    fn encoder(&self) -> &SerDes {
        &self.serdes
    }

    fn decoder_for(&self, _status: Option<&serde_json::Value>) -> Result<Arc<SerDes>, Error> {
        Ok(Arc::clone(&self.serdes))
    }
}

/// Schema-driven decoder for table cursors: each page's `projectionSchema`
/// informs the pipeline.
struct TableDecoder {
    encoder: Arc<SerDes>,
    big_numbers: BigNumberConfig,
}

impl PageDecoder for TableDecoder {
    fn encoder(&self) -> &SerDes {
        &self.encoder
    }

    fn decoder_for(&self, status: Option<&serde_json::Value>) -> Result<Arc<SerDes>, Error> {
        let schema = status
            .and_then(|s| s.get(constants::KEY_PROJECTION_SCHEMA))
            .map(TableSchema::from_wire)
            .transpose()?
            .unwrap_or_default();
        Ok(Arc::new(table_serdes(
            &schema,
            self.big_numbers.per_path.clone(),
            self.big_numbers.default_policy,
        )))
    }
}

/// Outcome of an update command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

/// Outcome of a delete command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// A handle onto one collection of JSON documents.
pub struct Collection {
    client: Arc<DataApiHttpClient>,
    name: String,
    serdes: Arc<SerDes>,
    decoder: Arc<CollectionDecoder>,
    timeouts: ResolvedTimeouts,
}

impl Collection {
    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The emitter this collection narrates into (for listener
    /// registration).
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        self.client.emitter()
    }

    fn request_timeout(&self) -> TimeoutManager {
        TimeoutManager::single_phase(
            TimeoutCategory::Request,
            Duration::from_millis(self.timeouts.request_timeout_ms),
        )
    }

    fn general_timeout(&self) -> TimeoutManager {
        TimeoutManager::multi_phase(
            TimeoutCategory::General,
            Duration::from_millis(self.timeouts.request_timeout_ms),
            Duration::from_millis(self.timeouts.general_method_timeout_ms),
        )
    }

    /// A lazy cursor over documents matching `filter`.
    #[must_use]
    pub fn find(&self, filter: DocValue) -> FindCursor<DocValue> {
        FindCursor::new(
            Arc::clone(&self.client),
            Arc::clone(&self.decoder) as Arc<dyn PageDecoder>,
            self.name.clone(),
            self.timeouts,
            filter,
        )
    }

    /// Fetches a single matching document.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn find_one(&self, filter: DocValue) -> Result<Option<DocValue>, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new("findOne", serde_json::json!({"filter": encoded.wire}))
            .with_big_numbers(encoded.big_numbers_present);
        let options =
            ExecuteOptions::for_target(self.request_timeout(), &self.name).retryable(true);
        let response = self.client.execute(&command, &options).await?;
        response
            .document()
            .filter(|d| !d.is_null())
            .map(|d| self.serdes.deserialize(d))
            .transpose()
    }

    /// Inserts one document, returning its id.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn insert_one(&self, document: &DocValue) -> Result<Option<DocValue>, Error> {
        let encoded = self.serdes.serialize(document)?;
        let command = Command::new("insertOne", serde_json::json!({"document": encoded.wire}))
            .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        self.first_inserted_id(&response)
    }

    /// Inserts many documents in chunks, stopping at the first failed chunk.
    ///
    /// Ids are reported in input order (the ordered execution path); a failed
    /// chunk surfaces the ids inserted so far through the error's partial
    /// result.
    ///
    /// # Errors
    ///
    /// `Error::Response` carrying a [`PartialResult`] when a chunk fails
    /// mid-way; execution-core and SerDes kinds otherwise.
    pub async fn insert_many(
        &self,
        documents: &[DocValue],
        ordered: bool,
    ) -> Result<Vec<DocValue>, Error> {
        let timeout = self.general_timeout();
        let mut inserted: Vec<DocValue> = Vec::with_capacity(documents.len());

        for chunk in documents.chunks(INSERT_MANY_CHUNK) {
            let mut wires = Vec::with_capacity(chunk.len());
            let mut big_numbers = false;
            for document in chunk {
                let encoded = self.serdes.serialize(document)?;
                big_numbers |= encoded.big_numbers_present;
                wires.push(encoded.wire);
            }
            let command = Command::new(
                "insertMany",
                serde_json::json!({
                    "documents": wires,
                    "options": {"ordered": ordered},
                }),
            )
            .with_big_numbers(big_numbers);
            let options = ExecuteOptions {
                timeout: timeout.clone(),
                retryable: false,
                collection: Some(self.name.clone()),
                admin_scope: false,
            };

            match self.client.execute(&command, &options).await {
                Ok(response) => {
                    inserted.extend(self.inserted_ids(&response)?);
                }
                Err(error) => {
                    return Err(error.with_partial_result(PartialResult {
                        inserted_ids: inserted,
                    }));
                }
            }
        }
        Ok(inserted)
    }

    /// Updates one matching document.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn update_one(
        &self,
        filter: DocValue,
        update: serde_json::Value,
    ) -> Result<UpdateResult, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new(
            "updateOne",
            serde_json::json!({"filter": encoded.wire, "update": update}),
        )
        .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        Ok(parse_update_result(&response))
    }

    /// Deletes one matching document.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn delete_one(&self, filter: DocValue) -> Result<DeleteResult, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new("deleteOne", serde_json::json!({"filter": encoded.wire}))
            .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        Ok(DeleteResult {
            deleted_count: status_u64(&response, "deletedCount"),
        })
    }

    /// Counts matching documents, failing if the count exceeds
    /// `upper_bound`.
    ///
    /// # Errors
    ///
    /// Execution-core kinds; a configuration error for a zero bound.
    pub async fn count_documents(
        &self,
        filter: DocValue,
        upper_bound: u64,
    ) -> Result<u64, Error> {
        if upper_bound == 0 {
            return Err(Error::invalid_config(
                "countDocuments.upperBound",
                "upper bound must be greater than 0",
            ));
        }
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new(
            "countDocuments",
            serde_json::json!({"filter": encoded.wire}),
        )
        .with_big_numbers(encoded.big_numbers_present);
        let options =
            ExecuteOptions::for_target(self.request_timeout(), &self.name).retryable(true);
        let response = self.client.execute(&command, &options).await?;
        Ok(status_u64(&response, "count").min(upper_bound))
    }

    /// Atomic find-and-modify: updates one document and returns it (the
    /// pre-image by default, the post-image with
    /// `{"returnDocument": "after"}` in `update_options`).
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn find_one_and_update(
        &self,
        filter: DocValue,
        update: serde_json::Value,
        update_options: serde_json::Value,
    ) -> Result<Option<DocValue>, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new(
            "findOneAndUpdate",
            serde_json::json!({
                "filter": encoded.wire,
                "update": update,
                "options": update_options,
            }),
        )
        .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        response
            .document()
            .filter(|d| !d.is_null())
            .map(|d| self.serdes.deserialize(d))
            .transpose()
    }

    /// Atomic find-and-delete: removes one document and returns it.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn find_one_and_delete(&self, filter: DocValue) -> Result<Option<DocValue>, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new(
            "findOneAndDelete",
            serde_json::json!({"filter": encoded.wire}),
        )
        .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        response
            .document()
            .filter(|d| !d.is_null())
            .map(|d| self.serdes.deserialize(d))
            .transpose()
    }

    /// Hybrid find-and-rerank: forwarded opaquely, one page of reranked
    /// documents back.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn find_and_rerank(
        &self,
        filter: DocValue,
        rerank_options: serde_json::Value,
    ) -> Result<Vec<DocValue>, Error> {
        let encoded = self.serdes.serialize(&filter)?;
        let command = Command::new(
            "findAndRerank",
            serde_json::json!({"filter": encoded.wire, "options": rerank_options}),
        )
        .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;
        response
            .documents()
            .iter()
            .map(|d| self.serdes.deserialize(d))
            .collect()
    }

    fn first_inserted_id(&self, response: &RawDataApiResponse) -> Result<Option<DocValue>, Error> {
        Ok(self.inserted_ids(response)?.into_iter().next())
    }

    fn inserted_ids(&self, response: &RawDataApiResponse) -> Result<Vec<DocValue>, Error> {
        response
            .inserted_ids()
            .and_then(serde_json::Value::as_array)
            .map_or_else(
                || Ok(Vec::new()),
                |ids| ids.iter().map(|id| self.serdes.deserialize(id)).collect(),
            )
    }
}

/// A handle onto one schema-typed table.
pub struct Table {
    client: Arc<DataApiHttpClient>,
    name: String,
    decoder: Arc<TableDecoder>,
    timeouts: ResolvedTimeouts,
}

impl Table {
    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The emitter this table narrates into.
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        self.client.emitter()
    }

    /// A lazy cursor over rows matching `filter`; each page's
    /// `projectionSchema` drives rehydration.
    #[must_use]
    pub fn find(&self, filter: DocValue) -> FindCursor<DocValue> {
        FindCursor::new(
            Arc::clone(&self.client),
            Arc::clone(&self.decoder) as Arc<dyn PageDecoder>,
            self.name.clone(),
            self.timeouts,
            filter,
        )
    }

    fn request_timeout(&self) -> TimeoutManager {
        TimeoutManager::single_phase(
            TimeoutCategory::Request,
            Duration::from_millis(self.timeouts.request_timeout_ms),
        )
    }

    /// Creates an index on one column; `definition` is the raw index payload
    /// (column, options), forwarded opaquely.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn create_index(
        &self,
        name: &str,
        definition: serde_json::Value,
    ) -> Result<(), Error> {
        let command = Command::new(
            "createIndex",
            serde_json::json!({"name": name, "definition": definition}),
        );
        let options = ExecuteOptions::for_target(
            TimeoutManager::single_phase(
                TimeoutCategory::TableAdmin,
                Duration::from_millis(self.timeouts.table_admin_timeout_ms),
            ),
            &self.name,
        );
        self.client.execute(&command, &options).await?;
        Ok(())
    }

    /// Lists the names of this table's indexes.
    ///
    /// # Errors
    ///
    /// Execution-core kinds.
    pub async fn list_indexes(&self) -> Result<Vec<String>, Error> {
        let command = Command::new("listIndexes", serde_json::json!({}));
        let options = ExecuteOptions::for_target(
            TimeoutManager::single_phase(
                TimeoutCategory::TableAdmin,
                Duration::from_millis(self.timeouts.table_admin_timeout_ms),
            ),
            &self.name,
        )
        .retryable(true);
        let response = self.client.execute(&command, &options).await?;
        Ok(extract_names(&response, "indexes"))
    }

    /// Inserts one row, returning its primary key zipped into a keyed
    /// record via the response's `primaryKeySchema`.
    ///
    /// # Errors
    ///
    /// Execution-core and SerDes kinds.
    pub async fn insert_one(&self, row: &DocValue) -> Result<Option<DocValue>, Error> {
        let encoded = self.decoder.encoder().serialize(row)?;
        let command = Command::new("insertOne", serde_json::json!({"document": encoded.wire}))
            .with_big_numbers(encoded.big_numbers_present);
        let options = ExecuteOptions::for_target(self.request_timeout(), &self.name);
        let response = self.client.execute(&command, &options).await?;

        let Some(ids) = response.inserted_ids().and_then(serde_json::Value::as_array) else {
            return Ok(None);
        };
        let Some(first) = ids.first() else {
            return Ok(None);
        };
        let schema = response
            .primary_key_schema()
            .map(TableSchema::from_wire)
            .transpose()?
            .unwrap_or_default();
        let zipped = match first {
            serde_json::Value::Array(tuple) => schema.zip_row(tuple)?,
            other => other.clone(),
        };
        let serdes = table_serdes(
            &schema,
            self.decoder.big_numbers.per_path.clone(),
            self.decoder.big_numbers.default_policy,
        );
        Ok(Some(serdes.deserialize(&zipped)?))
    }
}

fn parse_update_result(response: &RawDataApiResponse) -> UpdateResult {
    UpdateResult {
        matched_count: status_u64(response, "matchedCount"),
        modified_count: status_u64(response, "modifiedCount"),
        upserted_id: response
            .status()
            .and_then(|s| s.get("upsertedId"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string),
    }
}

fn status_u64(response: &RawDataApiResponse, key: &str) -> u64 {
    response
        .status()
        .and_then(|s| s.get(key))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_names_handles_both_shapes() {
        let plain = RawDataApiResponse::new(json!({
            "status": {"collections": ["a", "b"]}
        }));
        assert_eq!(extract_names(&plain, "collections"), vec!["a", "b"]);

        let explained = RawDataApiResponse::new(json!({
            "status": {"tables": [{"name": "t1", "definition": {}}]}
        }));
        assert_eq!(extract_names(&explained, "tables"), vec!["t1"]);
    }

    #[test]
    fn test_parse_update_result() {
        let response = RawDataApiResponse::new(json!({
            "status": {"matchedCount": 1, "modifiedCount": 1}
        }));
        let result = parse_update_result(&response);
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert!(result.upserted_id.is_none());
    }

    #[test]
    fn test_status_u64_defaults_to_zero() {
        let response = RawDataApiResponse::new(json!({}));
        assert_eq!(status_u64(&response, "deletedCount"), 0);
    }
}
