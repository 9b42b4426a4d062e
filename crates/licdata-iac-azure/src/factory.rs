use crate::stack::AzureStack;
use licdata_iac_core::{Stack, StackFactory, StackIdentity};

/// Builds an [`AzureStack`] per request
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureStackFactory;

impl AzureStackFactory {
    pub fn new() -> Self {
        Self
    }
}

impl StackFactory for AzureStackFactory {
    fn create(&self, identity: &StackIdentity) -> Box<dyn Stack> {
        tracing::debug!("Creating Azure stack {}", identity);
        Box::new(AzureStack::new(identity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_keeps_identity_verbatim() {
        let identity = StackIdentity::new("Acme Prod", "licdata", "westeurope");
        let stack = AzureStackFactory::new().create(&identity);
        assert_eq!(stack.identity(), &identity);
    }
}
