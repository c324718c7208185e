// @generated
// Wires up the checked-in protobuf code under `generated/`.
// The prost files include!() their tonic counterparts.

pub mod rag {
    include!("generated/rag/v1/rag.v1.rs");
}

pub mod vectorstore {
    include!("generated/vectorstore/v1/vectorstore.v1.rs");
}
