//! Database lifecycle helpers using web-sys
//!
//! Opening and deleting databases go through the same promotion path as
//! every other request, so `open_database` resolves with the wrapped
//! database facade rather than the raw `IdbDatabase`.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbVersionChangeEvent};

use crate::error::{IdbError, Result};
use crate::promote::promote_request;

/// Caller-supplied schema upgrade hook: database, old version, new version.
pub type UpgradeHook = Box<dyn FnMut(&IdbDatabase, u32, Option<u32>)>;

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(IdbVersionChangeEvent)>>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IdbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IdbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IdbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Open (or create) a database, returning the wrapped database facade.
///
/// The upgrade hook, when given, runs inside the engine's `upgradeneeded`
/// event with the raw database and the old/new schema versions; that is
/// the only place object stores and indexes may be created.
pub async fn open_database(
    name: &str,
    version: u32,
    upgrade: Option<UpgradeHook>,
) -> Result<JsValue> {
    let factory = idb_factory()?;

    tracing::debug!("opening IndexedDB database '{}' at version {}", name, version);

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(name, version)
        .map_err(|e| IdbError::Open(format!("{:?}", e)))?;

    // Store upgrade closure to manage its lifetime without leaking
    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let upgrade_closure_for_drop = upgrade_closure.clone();

    if let Some(mut hook) = upgrade {
        let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
            let target = event.target().expect("upgrade event has target");
            let req: IdbOpenDbRequest = target.unchecked_into();
            let db: IdbDatabase = req.result().expect("result on upgrade").unchecked_into();

            let old_version = event.old_version() as u32;
            let new_version = event.new_version().map(|v| v as u32);
            tracing::debug!("running schema upgrade {} -> {:?}", old_version, new_version);

            hook(&db, old_version, new_version);
        }) as Box<dyn FnMut(IdbVersionChangeEvent)>);

        open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
        *upgrade_closure.borrow_mut() = Some(on_upgrade);
    }

    // The promoted promise resolves with the wrapped database facade.
    let wrapped = wasm_bindgen_futures::JsFuture::from(promote_request(&open_req))
        .await
        .map_err(|e| IdbError::Open(format!("{:?}", e)))?;

    // Clean up upgrade closure now that open is complete
    *upgrade_closure_for_drop.borrow_mut() = None;

    Ok(wrapped)
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(name: &str) -> Result<()> {
    let factory = idb_factory()?;

    tracing::debug!("deleting IndexedDB database '{}'", name);

    let req = factory
        .delete_database(name)
        .map_err(|e| IdbError::Open(format!("delete db: {:?}", e)))?;
    wasm_bindgen_futures::JsFuture::from(promote_request(&req))
        .await
        .map_err(|e| IdbError::Open(format!("delete db: {:?}", e)))?;
    Ok(())
}
