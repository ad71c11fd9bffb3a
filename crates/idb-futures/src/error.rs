//! Error types for the IndexedDB wrapping layer

use thiserror::Error;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IdbError>;

/// Errors surfaced by the async convenience functions.
///
/// Raw promises produced by this layer reject with the engine's native
/// error objects untouched; conversion into this enum only happens at the
/// `async fn` boundary.
#[derive(Debug, Error)]
pub enum IdbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade/delete error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Request error from an IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// Transaction error or abort
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),
}

impl From<wasm_bindgen::JsValue> for IdbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IdbError::Request(msg)
    }
}
