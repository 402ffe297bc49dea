use crate::bean::{BeanId, ContextualPtr};
use crate::context::{Context, Creation, Scope, DEPENDENT};
use crate::creational::ContextualInstance;
use crate::error::{ContextError, InstanceProviderError};
use crate::instance_provider::InstanceAnyPtr;

static DEPENDENT_SCOPE: Scope = DEPENDENT;

/// Context for the [DEPENDENT] pseudo-scope. Always active, creates a new instance on every
/// request and registers it as a dependent of the requesting creational context.
#[derive(Default, Copy, Clone, Debug)]
pub struct DependentContext;

impl Context for DependentContext {
    fn scope(&self) -> &Scope {
        &DEPENDENT_SCOPE
    }

    #[inline]
    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        contextual: &ContextualPtr,
        creation: Option<Creation<'_>>,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        let Some(creation) = creation else {
            return Ok(None);
        };

        let instance = contextual.create(creation.creational_context, creation.provider)?;
        creation
            .creational_context
            .add_dependent_instance(ContextualInstance::new(
                contextual.clone(),
                instance.clone(),
                creation.creational_context.clone(),
            ));

        Ok(Some(instance))
    }

    fn destroy(&self, _contextual: &BeanId) -> Result<bool, ContextError> {
        Err(ContextError::DestroyUnsupported(DEPENDENT.to_string()))
    }
}
