/// Resource usage states and the per-context state tracker
///
/// A resource's usage state is the set of roles the context believes it is
/// bound in. UNORDERED_ACCESS excludes every read role: before a resource
/// gains one side, the commit engine unbinds it from every slot of the other.
///
/// A resource without any role is indistinguishable from one the context has
/// never seen, so such entries are dropped and read back as UNDEFINED.
///
/// The tracker belongs to one device context and is only touched from that
/// context's thread, so it takes no locks. Contexts never share beliefs;
/// deferred and immediate contexts reconcile when a command list is
/// finished and executed.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use crate::device::NativeHandle;

bitflags! {
    /// Roles a resource can be bound in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// The context has no knowledge of the resource yet
        const UNDEFINED = 1 << 0;
        const SHADER_RESOURCE = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const VERTEX_BUFFER = 1 << 3;
        const INDEX_BUFFER = 1 << 4;
        const UNORDERED_ACCESS = 1 << 5;
        const RENDER_TARGET = 1 << 6;
        const DEPTH_STENCIL = 1 << 7;

        /// Roles that conflict with UNORDERED_ACCESS
        const READ_ROLES = Self::SHADER_RESOURCE.bits() | Self::CONSTANT_BUFFER.bits()
            | Self::VERTEX_BUFFER.bits() | Self::INDEX_BUFFER.bits()
            | Self::RENDER_TARGET.bits() | Self::DEPTH_STENCIL.bits();

        /// Roles that live in per-stage shader slots
        const SHADER_SLOT_ROLES = Self::SHADER_RESOURCE.bits() | Self::CONSTANT_BUFFER.bits()
            | Self::UNORDERED_ACCESS.bits();

        const ALL_ROLES = Self::READ_ROLES.bits() | Self::UNORDERED_ACCESS.bits();
    }
}

impl ResourceState {
    /// Roles that must be dropped before `self` can be established
    pub fn conflicting_roles(self) -> ResourceState {
        let mut conflicts = ResourceState::empty();
        if self.contains(ResourceState::UNORDERED_ACCESS) {
            conflicts |= ResourceState::READ_ROLES;
        }
        if self.intersects(ResourceState::READ_ROLES) {
            conflicts |= ResourceState::UNORDERED_ACCESS;
        }
        if self.contains(ResourceState::SHADER_RESOURCE) {
            conflicts |= ResourceState::RENDER_TARGET | ResourceState::DEPTH_STENCIL;
        }
        if self.intersects(ResourceState::RENDER_TARGET | ResourceState::DEPTH_STENCIL) {
            conflicts |= ResourceState::SHADER_RESOURCE;
        }
        conflicts
    }

    pub fn is_known(self) -> bool {
        !self.contains(ResourceState::UNDEFINED)
    }
}

/// Per-context usage beliefs, keyed by the resource's native handle
#[derive(Debug, Default, Clone)]
pub struct UsageStateTracker {
    states: FxHashMap<NativeHandle, ResourceState>,
}

impl UsageStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; UNDEFINED for resources the context has never seen
    pub fn state(&self, resource: NativeHandle) -> ResourceState {
        self.states.get(&resource).copied().unwrap_or(ResourceState::UNDEFINED)
    }

    pub fn is_known(&self, resource: NativeHandle) -> bool {
        self.state(resource).is_known()
    }

    /// Add `roles`, keeping every other bit (including UNDEFINED)
    pub fn add_state(&mut self, resource: NativeHandle, roles: ResourceState) {
        *self.states.entry(resource).or_insert(ResourceState::UNDEFINED) |= roles;
    }

    /// Remove `roles`; a resource left without any role is forgotten
    pub fn clear_state(&mut self, resource: NativeHandle, roles: ResourceState) {
        if let Some(state) = self.states.get_mut(&resource) {
            state.remove(roles);
            if !state.intersects(ResourceState::ALL_ROLES) {
                self.states.remove(&resource);
            }
        }
    }

    /// True when every bit of `roles` is set
    pub fn check_state(&self, resource: NativeHandle, roles: ResourceState) -> bool {
        self.state(resource).contains(roles)
    }

    /// True when any bit of `roles` is set
    pub fn check_any_state(&self, resource: NativeHandle, roles: ResourceState) -> bool {
        self.state(resource).intersects(roles)
    }

    /// Replace the state with exactly `roles`; this is how a resource leaves UNDEFINED
    pub fn reset_state(&mut self, resource: NativeHandle, roles: ResourceState) {
        self.states.insert(resource, roles);
    }

    /// Establish `roles`: reset from UNDEFINED, add otherwise
    pub fn establish(&mut self, resource: NativeHandle, roles: ResourceState) {
        if self.is_known(resource) {
            self.add_state(resource, roles);
        } else {
            self.reset_state(resource, roles);
        }
    }

    /// Drop `roles` from every tracked resource, forgetting those left without a role
    pub fn clear_roles_everywhere(&mut self, roles: ResourceState) {
        self.states.retain(|_, state| {
            state.remove(roles);
            state.intersects(ResourceState::ALL_ROLES)
        });
    }

    /// Forget everything; all resources become UNDEFINED again
    pub fn reset(&mut self) {
        self.states.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    /// Resources currently holding any of `roles`
    pub fn resources_with(&self, roles: ResourceState) -> Vec<NativeHandle> {
        self.states
            .iter()
            .filter(|(_, state)| state.intersects(roles))
            .map(|(&resource, _)| resource)
            .collect()
    }
}

#[cfg(test)]
#[path = "usage_state_tests.rs"]
mod tests;
