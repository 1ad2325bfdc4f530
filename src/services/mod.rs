pub mod ingestion;
pub mod retrieval;
pub mod store_policy;

pub use ingestion::{IngestOutcome, IngestionService};
pub use retrieval::RetrievalService;
pub use store_policy::StorePolicy;
