//! A component value plus everything the lifecycle manager tracks for it.

use std::fmt;

use super::{Component, ComponentScope};
use crate::error::{LifecycleError, StateAccessError};
use crate::lifecycle::{InstanceId, LifecyclePhase};

/// One instance of a component.
///
/// Created with [`new`](Self::new) and driven through a
/// [`LifecycleManager`](crate::lifecycle::LifecycleManager). The instance
/// gets its id at mount and keeps it for the rest of its life.
pub struct ComponentInstance<C: Component> {
    pub(crate) id: Option<InstanceId>,
    pub(crate) phase: LifecyclePhase,
    pub(crate) component: C,
    pub(crate) props: Option<C::Props>,
    pub(crate) state: Option<C::State>,
    pub(crate) scope: Option<ComponentScope>,
    pub(crate) last_error: Option<LifecycleError>,
}

impl<C: Component> ComponentInstance<C> {
    pub fn new(component: C) -> Self {
        Self {
            id: None,
            phase: LifecyclePhase::Initializing,
            component,
            props: None,
            state: None,
            scope: None,
            last_error: None,
        }
    }

    /// The id assigned at mount, if mounted yet.
    pub fn id(&self) -> Option<InstanceId> {
        self.id
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn props(&self) -> Option<&C::Props> {
        self.props.as_ref()
    }

    /// The current state. Only available while mounted or updating.
    pub fn state(&self) -> Result<&C::State, StateAccessError> {
        let error = self.access_error();
        if !self.phase.is_live() {
            return Err(error);
        }
        self.state.as_ref().ok_or(error)
    }

    pub fn state_mut(&mut self) -> Result<&mut C::State, StateAccessError> {
        let error = self.access_error();
        if !self.phase.is_live() {
            return Err(error);
        }
        self.state.as_mut().ok_or(error)
    }

    /// The scope owning this instance's reactive resources. Gone after
    /// unmount.
    pub fn scope(&self) -> Option<&ComponentScope> {
        self.scope.as_ref()
    }

    /// The most recent failed operation, kept for fallback rendering.
    pub fn last_error(&self) -> Option<&LifecycleError> {
        self.last_error.as_ref()
    }

    /// Render the current props and state.
    pub fn render(&self) -> Result<C::View, StateAccessError> {
        let state = self.state()?;
        let props = self.props.as_ref().ok_or_else(|| self.access_error())?;
        Ok(self.component.render(props, state))
    }

    fn access_error(&self) -> StateAccessError {
        StateAccessError {
            instance_id: self.id,
            phase: self.phase,
        }
    }
}

impl<C: Component> fmt::Debug for ComponentInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("component", &std::any::type_name::<C>())
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}
