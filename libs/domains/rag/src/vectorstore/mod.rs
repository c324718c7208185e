mod grpc;
mod index;
mod memory;

pub use grpc::GrpcVectorStore;
pub use index::TextIndex;
pub use memory::{InMemoryVectorStore, load_seed_file};
