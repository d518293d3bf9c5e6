//! Query path: intent classification and evidence retrieval.

pub mod classifier;
pub mod mmr;
pub mod retriever;

pub use classifier::{QueryClass, QueryClassifier};
pub use mmr::cosine_similarity;
pub use retriever::{Evidence, RetrievalError, RetrievalMode, RetrievalResult, Retriever};
