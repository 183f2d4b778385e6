//! Chunked submission of large record sets.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use spark_sdk_client::SparkClient;

use crate::error::{Error, ErrorKind, Result};
use crate::types::{BatchOptions, BatchResult, Chunk, ChunkOutcome, ChunkResult, Dispatch};

/// Splits records into chunks and posts one request per chunk.
///
/// A failed chunk is recorded and the remaining chunks still run.
///
/// # Example
///
/// ```rust,ignore
/// use spark_sdk_jobs::{BatchOptions, BatchRunner};
///
/// let runner = BatchRunner::new(client.clone(), client.uri("folders/f/services/s/execute", &Default::default()));
/// let result = runner.run(&records, &BatchOptions::default().parallel(4)).await?;
/// println!("{} of {} records failed", result.total_failed, result.total_submitted);
/// ```
#[derive(Debug, Clone)]
pub struct BatchRunner {
    client: SparkClient,
    url: String,
    body_fields: Map<String, Value>,
}

impl BatchRunner {
    pub fn new(client: SparkClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            body_fields: Map::new(),
        }
    }

    /// Add a field sent with every chunk next to `inputs`.
    pub fn with_body_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body_fields.insert(key.into(), value);
        self
    }

    /// Submit all records and aggregate the per-chunk outcomes.
    ///
    /// Only invalid options or unserializable records fail the whole run.
    #[instrument(skip(self, records, options), fields(url = %self.url, records = records.len()))]
    pub async fn run<T: Serialize>(&self, records: &[T], options: &BatchOptions) -> Result<BatchResult> {
        validate(options)?;

        let chunks = partition(records, options.chunk_size)?;
        let total_submitted = records.len();
        debug!(chunks = chunks.len(), "Dispatching batch");

        let mut results: Vec<ChunkResult> = match options.dispatch {
            Dispatch::Sequential => {
                let mut results = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    results.push(self.submit_chunk(chunk).await);
                }
                results
            }
            Dispatch::Parallel { concurrency } => {
                stream::iter(chunks)
                    .map(|chunk| self.submit_chunk(chunk))
                    .buffer_unordered(concurrency)
                    .collect()
                    .await
            }
        };
        results.sort_by_key(|r| r.index);

        let total_failed = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.size)
            .sum::<usize>();

        if total_failed > 0 {
            warn!(total_submitted, total_failed, "Batch completed with errors");
        } else {
            info!(total_submitted, "Batch completed");
        }

        Ok(BatchResult {
            chunks: results,
            total_submitted,
            total_failed,
        })
    }

    async fn submit_chunk(&self, chunk: Chunk) -> ChunkResult {
        let size = chunk.records.len();
        let mut body = self.body_fields.clone();
        body.insert("inputs".to_string(), Value::Array(chunk.records));

        let outcome = match self.client.post_json::<Value, _>(&self.url, &body).await {
            Ok(response) => {
                let (outputs, errors) = split_response(response);
                ChunkOutcome::Succeeded { outputs, errors }
            }
            Err(err) => {
                warn!(chunk = chunk.index, size, error = %err, "Chunk failed");
                ChunkOutcome::Failed(err)
            }
        };

        ChunkResult {
            index: chunk.index,
            offset: chunk.offset,
            size,
            outcome,
        }
    }
}

fn validate(options: &BatchOptions) -> Result<()> {
    if options.chunk_size == 0 {
        return Err(Error::new(ErrorKind::Config(
            "chunk_size must be at least 1".to_string(),
        )));
    }
    if let Dispatch::Parallel { concurrency: 0 } = options.dispatch {
        return Err(Error::new(ErrorKind::Config(
            "concurrency must be at least 1".to_string(),
        )));
    }
    Ok(())
}

/// Ordered chunks of at most `chunk_size` records.
fn partition<T: Serialize>(records: &[T], chunk_size: usize) -> Result<Vec<Chunk>> {
    records
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, slice)| -> Result<Chunk> {
            let records = slice
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Chunk {
                index,
                offset: index * chunk_size,
                records,
            })
        })
        .collect()
}

/// Outputs come from `outputs`, else from an array body, else the body itself.
fn split_response(response: Value) -> (Vec<Value>, Vec<Value>) {
    match response {
        Value::Object(mut map) => {
            let errors = match map.remove("errors") {
                Some(Value::Array(errors)) => errors,
                _ => Vec::new(),
            };
            let outputs = match map.remove("outputs") {
                Some(Value::Array(outputs)) => outputs,
                Some(other) => vec![other],
                None => vec![Value::Object(map)],
            };
            (outputs, errors)
        }
        Value::Array(outputs) => (outputs, Vec::new()),
        Value::Null => (Vec::new(), Vec::new()),
        other => (vec![other], Vec::new()),
    }
}
