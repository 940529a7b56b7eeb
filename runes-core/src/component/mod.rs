//! Reactive Components
//!
//! A component is any type implementing [`Component`]: it turns props into
//! state, state into a view, and may hold reactive resources created through
//! its [`ComponentScope`]. The core never looks inside `View`; rendering
//! targets are the caller's business.
//!
//! Components opt into mount/update/unmount callbacks by implementing
//! [`LifecycleHooks`]; an empty `impl` takes the no-op defaults.

mod instance;
mod scope;

pub use instance::ComponentInstance;
pub use scope::ComponentScope;

use crate::error::BoxError;

/// The contract a component fulfils for the lifecycle manager.
pub trait Component {
    type Props;
    type State;
    type View;

    /// Build the initial state. Reactive resources created through `scope`
    /// live until the instance unmounts.
    fn init(&mut self, props: &Self::Props, scope: &ComponentScope) -> Result<Self::State, BoxError>;

    /// Build the next state from new props and the current state.
    fn update(
        &mut self,
        props: &Self::Props,
        state: &Self::State,
        scope: &ComponentScope,
    ) -> Result<Self::State, BoxError>;

    fn render(&self, props: &Self::Props, state: &Self::State) -> Self::View;

    /// Release anything `init` acquired outside the scope.
    fn cleanup(&mut self, _state: &mut Self::State) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Optional callbacks around lifecycle transitions.
pub trait LifecycleHooks: Component {
    /// After `init`, before the instance becomes `Mounted`.
    fn on_mount(
        &mut self,
        _props: &Self::Props,
        _state: &Self::State,
        _scope: &ComponentScope,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// After `update` produced `next`, before it replaces `prev`.
    fn on_update(
        &mut self,
        _props: &Self::Props,
        _next: &Self::State,
        _prev: &Self::State,
        _scope: &ComponentScope,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// First step of unmount, before `cleanup` and scope teardown.
    fn on_unmount(&mut self, _state: &Self::State) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecyclePhase;

    struct Label;

    impl Component for Label {
        type Props = String;
        type State = usize;
        type View = String;

        fn init(&mut self, props: &String, _scope: &ComponentScope) -> Result<usize, BoxError> {
            Ok(props.len())
        }

        fn update(&mut self, props: &String, _state: &usize, _scope: &ComponentScope) -> Result<usize, BoxError> {
            Ok(props.len())
        }

        fn render(&self, props: &String, state: &usize) -> String {
            format!("{props} ({state})")
        }
    }

    #[test]
    fn fresh_instance_has_no_identity_or_state() {
        let instance = ComponentInstance::new(Label);
        assert_eq!(instance.id(), None);
        assert_eq!(instance.phase(), LifecyclePhase::Initializing);

        let err = instance.state().unwrap_err();
        assert_eq!(err.instance_id, None);
        assert_eq!(err.phase, LifecyclePhase::Initializing);
        assert!(instance.render().is_err());
    }

    #[test]
    fn default_cleanup_is_a_no_op() {
        let mut state = 3;
        assert!(Label.cleanup(&mut state).is_ok());
    }
}
