//! Promise-style wrapping layer over the browser IndexedDB API (browser WASM)
//!
//! IndexedDB is callback-based: every operation hands back an `IDBRequest`
//! that later fires `success` or `error`. This crate converts that surface
//! into one that can be awaited linearly. A single entry point,
//! [`transform_idb_value`], takes any value crossing out of the engine and
//! returns what the caller should see:
//!
//! - one-shot requests become `js_sys::Promise`s that settle with the
//!   transformed result, or reject with the engine's native error;
//! - engine handles (`IDBDatabase`, `IDBObjectStore`, `IDBIndex`,
//!   `IDBCursor`, `IDBTransaction`) become transparent facades whose every
//!   property read is itself routed through the transformation, so the
//!   whole object graph stays wrapped;
//! - transaction facades gain one synthetic `done` property that resolves
//!   on commit and rejects on error or abort;
//! - cursor step methods (`advance`, `continue`, `continuePrimaryKey`)
//!   return the promise of the next cursor position instead of `undefined`;
//! - everything else passes through untouched.
//!
//! Wrapping is idempotent by JS reference identity, and a method called
//! through a facade always executes against the original handle, so the
//! engine never sees a foreign receiver. All side tables are weakly keyed;
//! entries vanish together with the handles they describe.
//!
//! # Example
//!
//! ```rust,ignore
//! use idb_futures::open_database;
//! use js_sys::Reflect;
//! use wasm_bindgen_futures::JsFuture;
//!
//! // Open (or create) the database; the result is a wrapped facade.
//! let db = open_database("app", 1, Some(Box::new(|db, _old, _new| {
//!     if !db.object_store_names().contains("items") {
//!         db.create_object_store("items").expect("create object store");
//!     }
//! })))
//! .await?;
//!
//! // Reads on the facade come back wrapped; a method call that would
//! // normally hand back an IDBRequest returns a promise instead.
//! let tx = call(&db, "transaction", &["items".into(), "readonly".into()])?;
//! let store = call(&tx, "objectStore", &["items".into()])?;
//! let record = JsFuture::from(call(&store, "get", &[1.into()])?.into()).await?;
//! let done = JsFuture::from(Reflect::get(&tx, &"done".into())?.into()).await?;
//! ```

pub mod done;
pub mod error;
pub mod open;
pub mod promote;
pub mod transform;

pub use done::{await_transaction, transaction_done};
pub use error::{IdbError, Result};
pub use open::{delete_database, idb_factory, open_database, UpgradeHook};
pub use promote::{await_request, promote_request};
pub use transform::{transform_idb_value, unwrap_idb_value};
