//! Transparent wrapping of values crossing out of the IndexedDB engine.
//!
//! [`transform_idb_value`] is the single entry point: every value the
//! engine hands back goes through it before reaching the caller. Requests
//! are promoted to promises, engine handles become `js_sys::Proxy` facades
//! whose property reads re-enter the transformation, functions become
//! proxies that unwrap their receiver before delegating, and plain data
//! passes through untouched.
//!
//! Identity is tracked in weakly-keyed side tables: original → wrapped
//! (wrapping is idempotent by JS reference) and wrapped → original (so a
//! call made through a facade executes against the handle the engine
//! actually knows, never the facade itself). Callables are cached per
//! parent handle, since the same prototype method is shared by every
//! handle of its class.

use js_sys::{Array, Function, Object, Proxy, Reflect, WeakMap};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{throw_val, JsCast};
use web_sys::{IdbCursor, IdbDatabase, IdbIndex, IdbObjectStore, IdbRequest, IdbTransaction};

use crate::done;
use crate::promote;

thread_local! {
    /// original -> wrapped
    static TRANSFORM_CACHE: WeakMap = WeakMap::new();
    /// wrapped -> original
    static REVERSE_CACHE: WeakMap = WeakMap::new();
    /// parent handle -> (method -> the wrap of that method bound to that
    /// parent)
    static METHOD_CACHE: WeakMap = WeakMap::new();
    /// The three mutating step methods of `IDBCursor.prototype`.
    static CURSOR_ADVANCE_METHODS: Vec<JsValue> = cursor_advance_methods();
    /// One `get`-trap handler shared by every facade.
    static FACADE_HANDLER: Object = facade_handler();
}

/// Transform a value coming out of the IndexedDB engine into the value the
/// caller should receive.
///
/// `parent` is the original handle the value was read from, if any. A
/// callable is cached and bound per parent: invoked without a receiver it
/// falls back to the parent it was read from, and the same method read
/// from two different handles yields two distinct wraps.
pub fn transform_idb_value(value: &JsValue, parent: Option<&JsValue>) -> JsValue {
    // Requests are single-use and may be produced once per cursor step, so
    // they are classified before any cache lookup and promoted fresh on
    // every pass.
    if let Some(request) = value.dyn_ref::<IdbRequest>() {
        return promote::promote_request(request).into();
    }

    if value.is_function() {
        return wrap_callable(value.unchecked_ref(), parent);
    }

    if let Some(cached) = cache_lookup(value) {
        return cached;
    }

    if is_proxyable(value) {
        // Registration is a side effect only; the transaction still gets
        // the same facade treatment as any other handle.
        if let Some(transaction) = value.dyn_ref::<IdbTransaction>() {
            done::register(transaction);
        }
        let wrapped = wrap_handle(value);
        record_pair(value, &wrapped);
        wrapped
    } else {
        // Primitives and plain data pass through unchanged and uncached.
        value.clone()
    }
}

/// Recover the original engine handle behind a wrapped value, if there is
/// one.
pub fn unwrap_idb_value(value: &JsValue) -> Option<JsValue> {
    if !value.is_object() && !value.is_function() {
        return None;
    }
    REVERSE_CACHE.with(|map| {
        let original = map.get(value.unchecked_ref());
        if original.is_undefined() {
            None
        } else {
            Some(original)
        }
    })
}

fn cache_lookup(value: &JsValue) -> Option<JsValue> {
    if !value.is_object() && !value.is_function() {
        return None;
    }
    TRANSFORM_CACHE.with(|map| {
        let wrapped = map.get(value.unchecked_ref());
        if wrapped.is_undefined() {
            None
        } else {
            Some(wrapped)
        }
    })
}

fn record_pair(original: &JsValue, wrapped: &JsValue) {
    TRANSFORM_CACHE.with(|map| {
        map.set(original.unchecked_ref(), wrapped);
    });
    record_reverse(original, wrapped);
}

fn record_reverse(original: &JsValue, wrapped: &JsValue) {
    REVERSE_CACHE.with(|map| {
        map.set(wrapped.unchecked_ref(), original);
    });
}

/// The closed set of engine handle types eligible for facade-wrapping.
fn is_proxyable(value: &JsValue) -> bool {
    value.dyn_ref::<IdbDatabase>().is_some()
        || value.dyn_ref::<IdbObjectStore>().is_some()
        || value.dyn_ref::<IdbIndex>().is_some()
        || value.dyn_ref::<IdbCursor>().is_some()
        || value.dyn_ref::<IdbTransaction>().is_some()
}

fn wrap_handle(value: &JsValue) -> JsValue {
    FACADE_HANDLER.with(|handler| Proxy::new(value, handler).into())
}

fn facade_handler() -> Object {
    let get = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>::new(
        |target: JsValue, prop: JsValue, _receiver: JsValue| {
            // Synthetic completion property on transaction facades.
            if let Some(transaction) = target.dyn_ref::<IdbTransaction>() {
                if prop.as_string().as_deref() == Some("done") {
                    return done::transaction_done(transaction).into();
                }
            }
            let raw = match Reflect::get(&target, &prop) {
                Ok(raw) => raw,
                Err(err) => throw_val(err),
            };
            transform_idb_value(&raw, Some(&target))
        },
    );
    let handler = Object::new();
    Reflect::set(&handler, &"get".into(), get.as_ref()).expect("set proxy get trap");
    // The handler is shared by every facade for the life of the program.
    get.forget();
    handler
}

/// Per-parent caching for callables. A prototype method is one shared
/// function object across every handle of its class, so a single global
/// entry would pin the wrap (and its receiver fallback) to whichever
/// handle happened to be read first.
fn wrap_callable(func: &Function, parent: Option<&JsValue>) -> JsValue {
    match parent {
        Some(parent) => {
            let cache = method_cache_for(parent);
            let cached = cache.get(func.unchecked_ref());
            if !cached.is_undefined() {
                return cached;
            }
            let wrapped = wrap_function(func, Some(parent));
            cache.set(func.unchecked_ref(), &wrapped);
            record_reverse(func.as_ref(), &wrapped);
            wrapped
        }
        None => {
            if let Some(cached) = cache_lookup(func.as_ref()) {
                return cached;
            }
            let wrapped = wrap_function(func, None);
            record_pair(func.as_ref(), &wrapped);
            wrapped
        }
    }
}

fn method_cache_for(parent: &JsValue) -> WeakMap {
    METHOD_CACHE.with(|maps| {
        let existing = maps.get(parent.unchecked_ref());
        if existing.is_undefined() {
            let fresh = WeakMap::new();
            maps.set(parent.unchecked_ref(), fresh.as_ref());
            fresh
        } else {
            existing.unchecked_into()
        }
    })
}

/// Wrap a callable so that invocation unwraps the receiver, delegates to
/// the original function, and re-enters the transformation with the raw
/// return value.
fn wrap_function(func: &Function, parent: Option<&JsValue>) -> JsValue {
    let fallback = parent.cloned().unwrap_or(JsValue::UNDEFINED);
    let apply = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>::new(
        move |target: JsValue, this_arg: JsValue, args: JsValue| {
            let original: &Function = target.unchecked_ref();
            let args: &Array = args.unchecked_ref();
            let receiver = unwrap_idb_value(&this_arg).unwrap_or_else(|| {
                if this_arg.is_undefined() || this_arg.is_null() {
                    fallback.clone()
                } else {
                    this_arg.clone()
                }
            });

            if is_cursor_advance(&target) {
                // Stepping mutates the cursor in place and returns nothing
                // useful; the observable result is the next settlement of
                // the request that produced this cursor.
                if let Err(err) = Reflect::apply(original, &receiver, args) {
                    throw_val(err);
                }
                let request = promote::cursor_request_for(&this_arg);
                return transform_idb_value(&request, None);
            }

            match Reflect::apply(original, &receiver, args) {
                Ok(raw) => transform_idb_value(&raw, Some(&receiver)),
                Err(err) => throw_val(err),
            }
        },
    );
    let handler = Object::new();
    Reflect::set(&handler, &"apply".into(), &apply.into_js_value()).expect("set proxy apply trap");
    Proxy::new(func.as_ref(), &handler).into()
}

fn is_cursor_advance(func: &JsValue) -> bool {
    CURSOR_ADVANCE_METHODS.with(|methods| methods.iter().any(|method| method == func))
}

fn cursor_advance_methods() -> Vec<JsValue> {
    let global = js_sys::global();
    let ctor = Reflect::get(&global, &"IDBCursor".into()).unwrap_or(JsValue::UNDEFINED);
    if ctor.is_undefined() || ctor.is_null() {
        return Vec::new();
    }
    let proto = Reflect::get(&ctor, &"prototype".into()).unwrap_or(JsValue::UNDEFINED);
    ["advance", "continue", "continuePrimaryKey"]
        .iter()
        .filter_map(|name| Reflect::get(&proto, &(*name).into()).ok())
        .filter(|method| method.is_function())
        .collect()
}
