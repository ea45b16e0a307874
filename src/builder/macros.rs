//! Macros for ergonomic state construction.

/// Generate a unit-variant state enum, its `State` implementation and a
/// `factory()` registering every variant as a named constructor.
///
/// # Example
///
/// ```
/// use matryoshka::core::State;
/// use matryoshka::state_enum;
///
/// state_enum! {
///     pub enum WorkflowState {
///         Start,
///         Processing,
///         Done,
///         Failed,
///     }
///     final: [Done, Failed]
/// }
///
/// let factory = WorkflowState::factory();
/// assert_eq!(factory.create("Done", &[]), Some(WorkflowState::Done));
/// assert!(factory.is_final("Failed"));
/// assert!(!WorkflowState::Start.is_final());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }
        }

        impl $name {
            /// Named constructors for every variant.
            #[allow(dead_code)]
            $vis fn factory() -> $crate::core::StateFactory<Self> {
                $crate::core::StateFactory::new()
                    $(.unit(Self::$variant))*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::State;

    state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
            Failed,
        }
        final: [Complete, Failed]
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        let state = TestState::Initial;
        assert_eq!(state.name(), "Initial");
        assert!(!state.is_final());

        assert!(TestState::Complete.is_final());
        assert!(TestState::Failed.is_final());
        assert!(TestState::Processing.child().is_none());
    }

    #[test]
    fn state_enum_generates_factory() {
        let factory = TestState::factory();
        assert_eq!(factory.len(), 4);
        assert_eq!(factory.create("Processing", &[]), Some(TestState::Processing));
        assert!(factory.is_final("Complete"));
        assert!(!factory.is_final("Initial"));
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            pub enum PublicState {
                A,
                B,
            }
            final: [B]
        }

        let _state = PublicState::A;
        assert!(PublicState::B.is_final());
    }

    #[test]
    fn state_enum_works_without_final() {
        state_enum! {
            enum MinimalState {
                One,
                Two,
            }
        }

        let state = MinimalState::One;
        assert!(!state.is_final());
        assert!(!MinimalState::Two.is_final());
    }
}
