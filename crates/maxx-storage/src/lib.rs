pub mod db;
pub mod entities;
pub mod seaorm;
pub mod snapshot;
pub mod storage;

pub use seaorm::SeaOrmStorage;
pub use snapshot::StorageSnapshot;
pub use storage::{
    NewProxyRequest, NewUpstreamAttempt, Storage, StorageError, StorageResult, TokenMetrics,
};
