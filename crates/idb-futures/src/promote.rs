//! Result promotion: one-shot `IDBRequest` handles into JS promises.
//!
//! Wraps the request's `success`/`error` event pair into a single
//! `js_sys::Promise`, in the same closure-lifecycle style as the rest of
//! this crate: both listeners live in an `Rc<RefCell<Option<_>>>` and are
//! detached and dropped by whichever event fires first.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Promise, WeakMap};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, IdbCursor, IdbRequest};

use crate::error::Result;
use crate::transform::transform_idb_value;

thread_local! {
    /// wrapped cursor -> the request whose next settlement is that
    /// cursor's next position
    static CURSOR_REQUESTS: WeakMap = WeakMap::new();
}

pub(crate) fn record_cursor_request(wrapped_cursor: &JsValue, request: &IdbRequest) {
    CURSOR_REQUESTS.with(|map| {
        map.set(wrapped_cursor.unchecked_ref(), request.as_ref());
    });
}

pub(crate) fn cursor_request_for(wrapped_cursor: &JsValue) -> JsValue {
    if !wrapped_cursor.is_object() {
        return JsValue::UNDEFINED;
    }
    CURSOR_REQUESTS.with(|map| map.get(wrapped_cursor.unchecked_ref()))
}

/// Convert an `IdbRequest` into a JS Promise that settles with the
/// transformed result, or rejects with the engine's native error.
///
/// When the result is a cursor, the wrapped cursor is associated with this
/// request so that a later step call on the cursor can return the request's
/// next settlement. The engine reuses the same request object across cursor
/// steps, so promotion is never cached: each call installs a fresh pair of
/// listeners.
pub fn promote_request(request: &IdbRequest) -> Promise {
    let req_success = request.clone();
    let req_error = request.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ListenerPair = (Closure<dyn FnMut(Event)>, Closure<dyn FnMut(Event)>);
        let listeners: Rc<RefCell<Option<ListenerPair>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let listeners_for_success = listeners.clone();
        let on_success = Closure::wrap(Box::new(move |_event: Event| {
            let raw = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let wrapped = transform_idb_value(&raw, None);
            if wrapped.dyn_ref::<IdbCursor>().is_some() {
                record_cursor_request(&wrapped, &req_s);
            }
            let _ = resolve.call1(&JsValue::UNDEFINED, &wrapped);
            // Detach both listeners after success
            req_s.set_onsuccess(None);
            req_s.set_onerror(None);
            *listeners_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(Event)>);

        let req_e = req_error.clone();
        let listeners_for_error = listeners.clone();
        let on_error = Closure::wrap(Box::new(move |_event: Event| {
            let err = req_e
                .error()
                .ok()
                .flatten()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("unknown IDB error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            // Detach both listeners after error
            req_e.set_onsuccess(None);
            req_e.set_onerror(None);
            *listeners_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until one of them fires
        *listeners.borrow_mut() = Some((on_success, on_error));
    })
}

/// Await an `IdbRequest`, resolving to its transformed result.
pub async fn await_request(request: &IdbRequest) -> Result<JsValue> {
    let promise = promote_request(request);
    Ok(wasm_bindgen_futures::JsFuture::from(promise).await?)
}
