//! HTTP fetching and persistence gateways for the intelligence pipeline.

pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod postgrest;

pub use gateway::{
    row_payload, FailureKind, GatewayError, PersistFailure, PersistedRow, PersistenceGateway,
    RowOutcome, UpsertOutcome,
};
pub use http::{
    BackoffPolicy, FetchError, FetchedResponse, HttpClientConfig, HttpFetcher, TokenBucketConfig,
};
pub use memory::{InMemoryGateway, StoredRow};
pub use postgres::PgGateway;
pub use postgrest::RestGateway;

pub const CRATE_NAME: &str = "intel-storage";
