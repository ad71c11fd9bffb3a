#![cfg(target_arch = "wasm32")]

//! Result promotion and passthrough tests against a mock request object.
//!
//! An `IDBRequest` is structurally just `result`/`error` plus the
//! `onsuccess`/`onerror` slots, so a plain JS object stands in for one and
//! the tests fire the handlers by hand. This pins down settlement and
//! listener-detachment behavior without a live database.

use idb_futures::{promote_request, transform_idb_value, unwrap_idb_value, IdbError};
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{DomException, IdbRequest};

wasm_bindgen_test_configure!(run_in_browser);

/// Helper to build a request stand-in with a preset result
fn mock_request(result: &JsValue) -> Object {
    let obj = Object::new();
    Reflect::set(&obj, &"result".into(), result).unwrap();
    obj
}

fn handler(mock: &Object, slot: &str) -> Function {
    Reflect::get(mock, &slot.into()).unwrap().dyn_into().unwrap()
}

fn fire(mock: &Object, slot: &str) {
    handler(mock, slot)
        .call1(&JsValue::UNDEFINED, &Object::new())
        .unwrap();
}

#[wasm_bindgen_test]
async fn test_success_settles_once_and_detaches_listeners() {
    let mock = mock_request(&"payload".into());
    let req: &IdbRequest = mock.unchecked_ref();

    let promise = promote_request(req);
    assert!(Reflect::get(&mock, &"onsuccess".into()).unwrap().is_function());
    assert!(Reflect::get(&mock, &"onerror".into()).unwrap().is_function());

    fire(&mock, "onsuccess");

    let settled = JsFuture::from(promise).await.unwrap();
    assert_eq!(settled.as_string().as_deref(), Some("payload"));

    // Both listeners are gone once the request settles, so a misbehaving
    // engine firing error afterwards has nothing left to call.
    assert!(Reflect::get(&mock, &"onsuccess".into()).unwrap().is_null());
    assert!(Reflect::get(&mock, &"onerror".into()).unwrap().is_null());
}

#[wasm_bindgen_test]
async fn test_error_rejects_with_native_error() {
    let mock = Object::new();
    let dom_err = DomException::new_with_message_and_name("boom", "DataError").unwrap();
    Reflect::set(&mock, &"error".into(), dom_err.as_ref()).unwrap();
    let req: &IdbRequest = mock.unchecked_ref();

    let promise = promote_request(req);
    fire(&mock, "onerror");

    let err = JsFuture::from(promise).await.unwrap_err();
    // The engine's error object passes through unmodified
    assert!(Object::is(&err, dom_err.as_ref()));

    assert!(Reflect::get(&mock, &"onsuccess".into()).unwrap().is_null());
    assert!(Reflect::get(&mock, &"onerror".into()).unwrap().is_null());
}

#[wasm_bindgen_test]
fn test_promotion_is_never_cached() {
    let mock = mock_request(&1.into());
    let req: &IdbRequest = mock.unchecked_ref();

    let first = promote_request(req);
    let second = promote_request(req);
    assert!(!Object::is(first.as_ref(), second.as_ref()));
}

#[wasm_bindgen_test]
fn test_primitives_pass_through_uncached() {
    let n = JsValue::from_f64(42.0);
    assert_eq!(transform_idb_value(&n, None).as_f64(), Some(42.0));

    let s = JsValue::from_str("plain");
    assert_eq!(
        transform_idb_value(&s, None).as_string().as_deref(),
        Some("plain")
    );

    let obj: JsValue = Object::new().into();
    assert!(Object::is(&obj, &transform_idb_value(&obj, None)));
    assert!(unwrap_idb_value(&obj).is_none());

    let arr: JsValue = Array::of2(&1.into(), &2.into()).into();
    assert!(Object::is(&arr, &transform_idb_value(&arr, None)));
}

#[wasm_bindgen_test]
fn test_methods_are_wrapped_per_parent_handle() {
    let method = Function::new_no_args("return this.tag");
    let first_parent = Object::new();
    Reflect::set(&first_parent, &"tag".into(), &"first".into()).unwrap();
    let second_parent = Object::new();
    Reflect::set(&second_parent, &"tag".into(), &"second".into()).unwrap();

    // Same parent, same wrap; different parent, different wrap. A shared
    // prototype method must not carry the first handle it was read from
    // over to the others.
    let wrap_first = transform_idb_value(method.as_ref(), Some(first_parent.as_ref()));
    assert!(Object::is(
        &wrap_first,
        &transform_idb_value(method.as_ref(), Some(first_parent.as_ref()))
    ));
    let wrap_second = transform_idb_value(method.as_ref(), Some(second_parent.as_ref()));
    assert!(!Object::is(&wrap_first, &wrap_second));

    // A bare call falls back to the parent the method was read from
    let wrap_first: Function = wrap_first.dyn_into().unwrap();
    let out = wrap_first.call0(&JsValue::UNDEFINED).unwrap();
    assert_eq!(out.as_string().as_deref(), Some("first"));

    let wrap_second: Function = wrap_second.dyn_into().unwrap();
    let out = wrap_second.call0(&JsValue::UNDEFINED).unwrap();
    assert_eq!(out.as_string().as_deref(), Some("second"));
}

#[wasm_bindgen_test]
fn test_js_error_converts_to_request_variant() {
    let err: IdbError = JsValue::from_str("boom").into();
    assert!(matches!(err, IdbError::Request(_)));
    assert!(err.to_string().contains("boom"));
}

#[wasm_bindgen_test]
fn test_function_wrapping_is_idempotent_and_delegates() {
    let func = Function::new_no_args("return 42");

    let first = transform_idb_value(func.as_ref(), None);
    let second = transform_idb_value(func.as_ref(), None);
    assert!(Object::is(&first, &second));
    assert!(!Object::is(&first, func.as_ref()));

    let wrapped: Function = first.dyn_into().unwrap();
    let out = wrapped.call0(&JsValue::UNDEFINED).unwrap();
    assert_eq!(out.as_f64(), Some(42.0));
}
