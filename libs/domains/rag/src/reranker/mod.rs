mod http;

pub use http::HttpReranker;
