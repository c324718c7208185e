// @generated
// This file is @generated by prost-build.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InsertTextsRequest {
    #[prost(message, repeated, tag = "1")]
    pub texts: ::prost::alloc::vec::Vec<insert_texts_request::Text>,
}
/// Nested message and enum types in `InsertTextsRequest`.
pub mod insert_texts_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Text {
        #[prost(string, tag = "1")]
        pub text: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub metadata: ::core::option::Option<::prost_types::Struct>,
    }
}
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct InsertTextsResponse {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchTextRequest {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub top_k: i64,
    #[prost(message, optional, tag = "3")]
    pub filter: ::core::option::Option<::prost_types::Struct>,
    #[prost(float, tag = "4")]
    pub min_score: f32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchTextResponse {
    #[prost(message, repeated, tag = "1")]
    pub similar_texts: ::prost::alloc::vec::Vec<search_text_response::SimilarText>,
}
/// Nested message and enum types in `SearchTextResponse`.
pub mod search_text_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SimilarText {
        #[prost(string, tag = "1")]
        pub text: ::prost::alloc::string::String,
        #[prost(float, tag = "2")]
        pub score: f32,
        #[prost(message, optional, tag = "3")]
        pub metadata: ::core::option::Option<::prost_types::Struct>,
    }
}
include!("vectorstore.v1.tonic.rs");
// @@protoc_insertion_point(module)
