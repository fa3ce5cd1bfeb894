//! Asset store infrastructure.
//!
//! Implements the `AssetStore` trait from `buildrelay-core` for any object
//! store that accepts plain HTTP `PUT` uploads (S3 presigned prefixes,
//! MinIO, R2 custom domains, WebDAV).

pub mod http_store;

pub use http_store::HttpObjectStore;
