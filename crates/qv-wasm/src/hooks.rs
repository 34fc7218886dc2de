//! JS hook surface
//!
//! Implements the core's [`HookSurface`] seam against the real page
//! globals: constant getters via `Reflect.defineProperty`, and wrapper
//! functions around the `EventTarget` prototype methods that consult a
//! wasm-exported blocked-name predicate while preserving `this` and
//! arguments for everything that passes through.

use std::collections::HashSet;

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use qv_core::suppress::{HookError, HookSurface, OverrideTarget, PinnedValue, PropertyOverride};

/// Builds `function(type, listener, options)` around the real
/// `addEventListener`, dropping blocked registrations.
const REGISTRATION_WRAPPER: &str = "return function (type, listener, options) {\
     if (isBlocked(String(type))) { return; }\
     return real.call(this, type, listener, options);\
 };";

/// Builds `function(event)` around the real `dispatchEvent`, reporting
/// blocked events as handled without running listeners.
const DISPATCH_WRAPPER: &str = "return function (event) {\
     if (event && isBlocked(String(event.type))) { return true; }\
     return real.call(this, event);\
 };";

pub struct JsHookSurface {
    window: Object,
    document: Object,
}

impl JsHookSurface {
    /// Acquire the page globals. Fails outside a page world (workers,
    /// detached contexts).
    pub fn acquire() -> Option<Self> {
        let window = js_sys::global();
        let document = Reflect::get(&window, &JsValue::from_str("document"))
            .ok()?
            .dyn_into::<Object>()
            .ok()?;
        Some(Self { window, document })
    }

    fn target(&self, target: OverrideTarget) -> &Object {
        match target {
            OverrideTarget::Window => &self.window,
            OverrideTarget::Document => &self.document,
        }
    }

    fn event_target_prototype(&self) -> Result<Object, HookError> {
        let constructor = Reflect::get(&self.window, &JsValue::from_str("EventTarget"))
            .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?;
        Reflect::get(&constructor, &JsValue::from_str("prototype"))
            .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?
            .dyn_into::<Object>()
            .map_err(|_| HookError::NotPatchable("EventTarget.prototype missing".into()))
    }

    /// Replace `prototype[method]` with `wrapper(real, isBlocked)`.
    fn wrap_prototype_method(
        &self,
        method: &str,
        wrapper_body: &str,
        blocked: &[&'static str],
    ) -> Result<(), HookError> {
        let prototype = self.event_target_prototype()?;
        let real = Reflect::get(&prototype, &JsValue::from_str(method))
            .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?
            .dyn_into::<Function>()
            .map_err(|_| HookError::NotPatchable(format!("{method} is not a function")))?;

        let blocked: HashSet<String> = blocked.iter().map(|s| s.to_string()).collect();
        let predicate =
            Closure::wrap(Box::new(move |name: String| blocked.contains(&name))
                as Box<dyn Fn(String) -> bool>);

        let factory = Function::new_with_args("real, isBlocked", wrapper_body);
        let wrapped = factory
            .call2(&JsValue::NULL, &real, predicate.as_ref())
            .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?;
        predicate.forget();

        Reflect::set(&prototype, &JsValue::from_str(method), &wrapped)
            .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?;
        Ok(())
    }

    /// Pin a property to a constant getter with a swallowing setter.
    fn define_pinned(
        &self,
        target: &Object,
        property: &str,
        value: JsValue,
        configurable: bool,
    ) -> Result<(), HookError> {
        let descriptor = Object::new();

        let getter = Closure::wrap(Box::new(move || value.clone()) as Box<dyn Fn() -> JsValue>);
        Reflect::set(&descriptor, &JsValue::from_str("get"), getter.as_ref())
            .map_err(|err| HookError::RedefinitionBlocked(format!("{err:?}")))?;
        getter.forget();

        let setter = Closure::wrap(Box::new(move |_: JsValue| {}) as Box<dyn Fn(JsValue)>);
        Reflect::set(&descriptor, &JsValue::from_str("set"), setter.as_ref())
            .map_err(|err| HookError::RedefinitionBlocked(format!("{err:?}")))?;
        setter.forget();

        Reflect::set(
            &descriptor,
            &JsValue::from_str("configurable"),
            &JsValue::from_bool(configurable),
        )
        .map_err(|err| HookError::RedefinitionBlocked(format!("{err:?}")))?;

        match Reflect::define_property(target, &JsValue::from_str(property), &descriptor) {
            Ok(true) => Ok(()),
            _ => Err(HookError::RedefinitionBlocked(property.to_string())),
        }
    }
}

fn pinned_js_value(value: PinnedValue) -> JsValue {
    match value {
        PinnedValue::Str(s) => JsValue::from_str(s),
        PinnedValue::Bool(b) => JsValue::from_bool(b),
    }
}

impl HookSurface for JsHookSurface {
    fn override_property(&mut self, ov: &PropertyOverride) -> Result<(), HookError> {
        let target = self.target(ov.target).clone();
        self.define_pinned(&target, ov.property, pinned_js_value(ov.value), false)
    }

    fn force_focus_query(&mut self) -> Result<(), HookError> {
        let always_focused = Closure::wrap(Box::new(|| true) as Box<dyn Fn() -> bool>);
        Reflect::set(
            &self.document,
            &JsValue::from_str("hasFocus"),
            always_focused.as_ref(),
        )
        .map_err(|err| HookError::NotPatchable(format!("{err:?}")))?;
        always_focused.forget();
        Ok(())
    }

    fn intercept_registration(&mut self, blocked: &[&'static str]) -> Result<(), HookError> {
        // Removal is deliberately left untouched: removing a listener that
        // was never added is a platform no-op.
        self.wrap_prototype_method("addEventListener", REGISTRATION_WRAPPER, blocked)
    }

    fn null_inline_handler(
        &mut self,
        target: OverrideTarget,
        event: &'static str,
    ) -> Result<(), HookError> {
        let target = self.target(target).clone();
        self.define_pinned(&target, &format!("on{event}"), JsValue::NULL, true)
    }

    fn intercept_dispatch(&mut self, blocked: &[&'static str]) -> Result<(), HookError> {
        self.wrap_prototype_method("dispatchEvent", DISPATCH_WRAPPER, blocked)
    }

    fn property_holds(&self, ov: &PropertyOverride) -> bool {
        let current = match Reflect::get(self.target(ov.target), &JsValue::from_str(ov.property)) {
            Ok(value) => value,
            Err(_) => return false,
        };
        match ov.value {
            PinnedValue::Str(expected) => current.as_string().as_deref() == Some(expected),
            PinnedValue::Bool(expected) => current.as_bool() == Some(expected),
        }
    }
}
