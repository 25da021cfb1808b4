use super::base::ChildCore;
use super::manageable::{Manageable, ManagedType};
use crate::errors::BoxError;

/// Default child type with no state beyond its binding
#[derive(Debug, Default)]
pub struct BasicChild {
    core: ChildCore,
}

impl BasicChild {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Manageable for BasicChild {
    fn core(&self) -> &ChildCore {
        &self.core
    }
}

impl ManagedType for BasicChild {
    const TYPE_ID: &'static str = "custodian.basic";

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::new())
    }
}
