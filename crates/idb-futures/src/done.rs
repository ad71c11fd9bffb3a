//! Completion tracking for `IDBTransaction` instances.
//!
//! Each transaction gets at most one completion promise, created lazily
//! when the transaction is first wrapped and cached in a weakly-keyed side
//! table. The same promise instance is served on every read of the
//! facade's synthetic `done` property.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Promise, WeakMap};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{DomException, Event, IdbTransaction};

use crate::error::{IdbError, Result};

thread_local! {
    /// transaction -> completion promise, created at most once
    static TX_DONE: WeakMap = WeakMap::new();
}

/// Ensure a completion promise exists for `transaction`. No-op when one is
/// already cached.
pub(crate) fn register(transaction: &IdbTransaction) {
    TX_DONE.with(|map| {
        if map.has(transaction.unchecked_ref()) {
            return;
        }
        let promise = completion_promise(transaction);
        map.set(transaction.unchecked_ref(), promise.as_ref());
    });
}

/// The completion promise for `transaction`: resolves once the engine
/// fires `complete`, rejects with the transaction's native error on
/// `error` or `abort`. The same promise instance is returned for the life
/// of the transaction; it also backs the facade's synthetic `done`
/// property.
pub fn transaction_done(transaction: &IdbTransaction) -> Promise {
    register(transaction);
    TX_DONE
        .with(|map| map.get(transaction.unchecked_ref()))
        .unchecked_into()
}

/// Await a transaction's completion signal: resolves once the engine fires
/// `complete`, errors on `error` or `abort`.
pub async fn await_transaction(transaction: &IdbTransaction) -> Result<()> {
    let promise = transaction_done(transaction);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IdbError::Transaction(format!("{:?}", e)))?;
    Ok(())
}

fn detach(transaction: &IdbTransaction) {
    transaction.set_oncomplete(None);
    transaction.set_onerror(None);
    transaction.set_onabort(None);
}

/// A manual abort carries no error object on the transaction; stand in
/// with a DOMException the way the engine itself would name it.
fn abort_error() -> JsValue {
    DomException::new_with_message_and_name("transaction aborted", "AbortError")
        .map(JsValue::from)
        .unwrap_or_else(|_| JsValue::from_str("AbortError"))
}

fn completion_promise(transaction: &IdbTransaction) -> Promise {
    let tx_complete = transaction.clone();
    let tx_error = transaction.clone();
    let tx_abort = transaction.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ListenerSet = (
            Closure<dyn FnMut(Event)>,
            Closure<dyn FnMut(Event)>,
            Closure<dyn FnMut(Event)>,
        );
        let listeners: Rc<RefCell<Option<ListenerSet>>> = Rc::new(RefCell::new(None));

        let tx_c = tx_complete.clone();
        let listeners_for_complete = listeners.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            // Detach all three listeners after completion
            detach(&tx_c);
            *listeners_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(Event)>);

        let tx_e = tx_error.clone();
        let reject_on_error = reject.clone();
        let listeners_for_error = listeners.clone();
        let on_error = Closure::wrap(Box::new(move |_event: Event| {
            let err = tx_e.error().map(JsValue::from).unwrap_or_else(abort_error);
            let _ = reject_on_error.call1(&JsValue::UNDEFINED, &err);
            // Detach all three listeners after error
            detach(&tx_e);
            *listeners_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(Event)>);

        let tx_a = tx_abort.clone();
        let listeners_for_abort = listeners.clone();
        let on_abort = Closure::wrap(Box::new(move |_event: Event| {
            let err = tx_a.error().map(JsValue::from).unwrap_or_else(abort_error);
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            // Detach all three listeners after abort
            detach(&tx_a);
            *listeners_for_abort.borrow_mut() = None;
        }) as Box<dyn FnMut(Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_abort.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

        // Keep all three closures alive until one of them fires
        *listeners.borrow_mut() = Some((on_complete, on_error, on_abort));
    })
}
