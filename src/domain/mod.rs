//! Sample capabilities served by this binary
//!
//! Math, string, utility and data tools, three resources and four prompt
//! templates, all registered into one [`Registry`].

pub mod prompts;
pub mod resources;
pub mod tools;

use tracing::info;

use crate::engine::{Category, Registry};
use crate::errors::RegistryError;

/// Builds the registry with every sample capability. Any registration error
/// aborts startup.
pub fn build_registry() -> Result<Registry, RegistryError> {
    let registry = Registry::new();
    tools::register(&registry)?;
    resources::register(&registry)?;
    prompts::register(&registry)?;

    info!(
        tools = registry.len(Category::Tool),
        resources = registry.len(Category::Resource),
        prompts = registry.len(Category::Prompt),
        "capability registry ready"
    );
    Ok(registry)
}
