//! Signal-suppression policy
//!
//! Once a page is classified as protected, the extension neutralizes the
//! signals a remote owner could use to detect the user looking away: the
//! visibility read properties, the focus query, and the eight
//! visibility/focus event channels (listener registration, inline `on*`
//! handlers, and synthetic dispatch).
//!
//! The policy is data: an ordered list of install directives. The actual
//! JS monkey-patching lives behind [`HookSurface`], so each directive is
//! independently testable and independently failure-isolated. A directive
//! that fails (the host page may have made a property non-configurable
//! first) is logged and skipped; partial application is acceptable.

use bitflags::bitflags;

// =============================================================================
// Blocked Events
// =============================================================================

/// The eight suppressed event names, in policy order.
pub const BLOCKED_EVENT_NAMES: [&str; 8] = [
    "visibilitychange",
    "webkitvisibilitychange",
    "blur",
    "focus",
    "pagehide",
    "pageshow",
    "mouseleave",
    "mouseout",
];

bitflags! {
    /// Bit set over [`BLOCKED_EVENT_NAMES`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalEvents: u8 {
        const VISIBILITY_CHANGE        = 1 << 0;
        const WEBKIT_VISIBILITY_CHANGE = 1 << 1;
        const BLUR                     = 1 << 2;
        const FOCUS                    = 1 << 3;
        const PAGE_HIDE                = 1 << 4;
        const PAGE_SHOW                = 1 << 5;
        const MOUSE_LEAVE              = 1 << 6;
        const MOUSE_OUT                = 1 << 7;

        const ALL = 0xFF;
    }
}

impl SignalEvents {
    /// Map an event name onto its flag. Unknown names map to none.
    pub fn from_event_name(name: &str) -> Option<Self> {
        let idx = BLOCKED_EVENT_NAMES.iter().position(|n| *n == name)?;
        Self::from_bits(1 << idx)
    }

    /// Is this event name suppressed under the full policy?
    #[inline]
    pub fn is_blocked(name: &str) -> bool {
        Self::from_event_name(name).is_some()
    }
}

// =============================================================================
// Directives
// =============================================================================

/// Which global object a directive patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideTarget {
    Window,
    Document,
}

/// Constant value a read property is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinnedValue {
    Str(&'static str),
    Bool(bool),
}

/// A visibility read property pinned to its "page is visible" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyOverride {
    pub target: OverrideTarget,
    pub property: &'static str,
    pub value: PinnedValue,
}

/// The four visibility read properties, in install order.
pub const VISIBILITY_OVERRIDES: [PropertyOverride; 4] = [
    PropertyOverride {
        target: OverrideTarget::Document,
        property: "visibilityState",
        value: PinnedValue::Str("visible"),
    },
    PropertyOverride {
        target: OverrideTarget::Document,
        property: "hidden",
        value: PinnedValue::Bool(false),
    },
    PropertyOverride {
        target: OverrideTarget::Document,
        property: "webkitVisibilityState",
        value: PinnedValue::Str("visible"),
    },
    PropertyOverride {
        target: OverrideTarget::Document,
        property: "webkitHidden",
        value: PinnedValue::Bool(false),
    },
];

/// One unit of monkey-patching. Directives are applied in order and fail
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDirective {
    /// Pin a visibility read property to a constant.
    OverrideProperty(PropertyOverride),
    /// Make the focus query (`document.hasFocus()`) always report focus.
    ForceFocusQuery,
    /// Drop listener registration for blocked events; removal and all
    /// other event types pass through.
    InterceptRegistration,
    /// Make an inline `on<event>` handler property read absent and ignore
    /// writes.
    NullInlineHandler {
        target: OverrideTarget,
        event: &'static str,
    },
    /// Short-circuit dispatch of blocked event types to "handled, not
    /// canceled" without invoking listeners.
    InterceptDispatch,
}

// =============================================================================
// Policy
// =============================================================================

/// The full suppression policy for one page.
#[derive(Debug, Clone)]
pub struct SuppressionPolicy {
    pub blocked: SignalEvents,
    directives: Vec<InstallDirective>,
}

impl SuppressionPolicy {
    /// The standard policy: pin the four visibility properties, force the
    /// focus query, then close the three event channels for all eight
    /// blocked events on both window and document.
    pub fn standard() -> Self {
        let mut directives = Vec::with_capacity(7 + 2 * BLOCKED_EVENT_NAMES.len());
        for ov in VISIBILITY_OVERRIDES {
            directives.push(InstallDirective::OverrideProperty(ov));
        }
        directives.push(InstallDirective::ForceFocusQuery);
        directives.push(InstallDirective::InterceptRegistration);
        for event in BLOCKED_EVENT_NAMES {
            directives.push(InstallDirective::NullInlineHandler {
                target: OverrideTarget::Window,
                event,
            });
            directives.push(InstallDirective::NullInlineHandler {
                target: OverrideTarget::Document,
                event,
            });
        }
        directives.push(InstallDirective::InterceptDispatch);

        Self {
            blocked: SignalEvents::ALL,
            directives,
        }
    }

    pub fn directives(&self) -> &[InstallDirective] {
        &self.directives
    }
}

// =============================================================================
// Hook Surface
// =============================================================================

/// A directive could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("property redefinition blocked: {0}")]
    RedefinitionBlocked(String),
    #[error("event machinery not patchable: {0}")]
    NotPatchable(String),
}

/// The seam between the policy and the page's JS globals. The wasm
/// bindings implement this over `js-sys`; tests implement it over a fake
/// page model.
pub trait HookSurface {
    fn override_property(&mut self, ov: &PropertyOverride) -> Result<(), HookError>;
    fn force_focus_query(&mut self) -> Result<(), HookError>;
    fn intercept_registration(&mut self, blocked: &[&'static str]) -> Result<(), HookError>;
    fn null_inline_handler(
        &mut self,
        target: OverrideTarget,
        event: &'static str,
    ) -> Result<(), HookError>;
    fn intercept_dispatch(&mut self, blocked: &[&'static str]) -> Result<(), HookError>;

    /// Does the property currently read as its pinned value? Used by the
    /// re-assertion loop to detect a later script stomping the override.
    fn property_holds(&self, ov: &PropertyOverride) -> bool;
}

/// Outcome of applying a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub applied: usize,
    pub failed: usize,
}

/// Apply every directive in order, isolating failures per directive.
pub fn install<S: HookSurface + ?Sized>(
    policy: &SuppressionPolicy,
    surface: &mut S,
) -> InstallReport {
    let mut report = InstallReport::default();

    for directive in policy.directives() {
        let result = match directive {
            InstallDirective::OverrideProperty(ov) => surface.override_property(ov),
            InstallDirective::ForceFocusQuery => surface.force_focus_query(),
            InstallDirective::InterceptRegistration => {
                surface.intercept_registration(&BLOCKED_EVENT_NAMES)
            }
            InstallDirective::NullInlineHandler { target, event } => {
                surface.null_inline_handler(*target, event)
            }
            InstallDirective::InterceptDispatch => surface.intercept_dispatch(&BLOCKED_EVENT_NAMES),
        };

        match result {
            Ok(()) => report.applied += 1,
            Err(err) => {
                log::debug!("suppression directive skipped: {err}");
                report.failed += 1;
            }
        }
    }

    report
}
