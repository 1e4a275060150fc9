//! Capability registry
//!
//! Three independent tables (tools, resources, prompts) mapping a unique name or
//! URI template to a descriptor and its handler. Append-only: entries are never
//! replaced or removed once registered.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use regex::Regex;
use tracing::debug;

use crate::engine::{
    handler::Handler,
    signature::{HandlerDescriptor, ParamType},
    template::UriTemplate,
};
use crate::errors::{InvocationError, RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tool,
    Resource,
    Prompt,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn handler_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid handler name pattern")
    })
}

/// A registered capability: its descriptor and the handler that executes it.
pub struct Registration {
    descriptor: HandlerDescriptor,
    handler: Arc<dyn Handler>,
}

impl Registration {
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

/// Result of a successful lookup. For resources, `bindings` holds the values
/// bound to the template placeholders.
#[derive(Clone)]
pub struct Resolved {
    pub entry: Arc<Registration>,
    pub bindings: Vec<(String, String)>,
}

impl Resolved {
    pub fn descriptor(&self) -> &HandlerDescriptor {
        self.entry.descriptor()
    }
}

#[derive(Default)]
struct NamedTable {
    entries: Vec<Arc<Registration>>,
    index: HashMap<String, usize>,
}

impl NamedTable {
    fn get(&self, name: &str) -> Option<&Arc<Registration>> {
        self.index.get(name).map(|position| &self.entries[*position])
    }

    fn insert(&mut self, entry: Registration) {
        self.index
            .insert(entry.descriptor.name.clone(), self.entries.len());
        self.entries.push(Arc::new(entry));
    }
}

#[derive(Default)]
struct Tables {
    tools: NamedTable,
    prompts: NamedTable,
    resources: Vec<(UriTemplate, Arc<Registration>)>,
}

/// Read-mostly registry. Lookups may run concurrently; registrations are
/// serialized by the write lock.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(
        &self,
        descriptor: HandlerDescriptor,
        handler: impl Handler + 'static,
    ) -> Result<(), RegistryError> {
        self.register(Category::Tool, descriptor, Arc::new(handler))
    }

    pub fn register_resource(
        &self,
        descriptor: HandlerDescriptor,
        handler: impl Handler + 'static,
    ) -> Result<(), RegistryError> {
        self.register(Category::Resource, descriptor, Arc::new(handler))
    }

    pub fn register_prompt(
        &self,
        descriptor: HandlerDescriptor,
        handler: impl Handler + 'static,
    ) -> Result<(), RegistryError> {
        self.register(Category::Prompt, descriptor, Arc::new(handler))
    }

    /// Adds a capability. Validation happens before the write lock is taken
    /// and the tables are only touched once every check has passed, so a
    /// failed registration leaves the registry unchanged.
    pub fn register(
        &self,
        category: Category,
        descriptor: HandlerDescriptor,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistryError> {
        descriptor
            .check_parameters()
            .map_err(|reason| RegistryError::invalid(category, &descriptor.name, reason))?;

        match category {
            Category::Tool | Category::Prompt => {
                check_handler_name(category, &descriptor)?;
                let mut tables = self.write();
                let table = match category {
                    Category::Tool => &mut tables.tools,
                    _ => &mut tables.prompts,
                };
                if table.get(&descriptor.name).is_some() {
                    return Err(RegistryError::DuplicateName {
                        category,
                        name: descriptor.name,
                    });
                }
                debug!(category = %category, name = %descriptor.name, "capability registered");
                table.insert(Registration {
                    descriptor,
                    handler,
                });
            }
            Category::Resource => {
                let template = UriTemplate::parse(&descriptor.name)
                    .map_err(|reason| RegistryError::invalid(category, &descriptor.name, reason))?;
                check_resource_parameters(&template, &descriptor)?;

                let mut tables = self.write();
                if let Some((existing, _)) = tables
                    .resources
                    .iter()
                    .find(|(existing, _)| existing.same_shape(&template))
                {
                    return Err(if existing.as_str() == template.as_str() {
                        RegistryError::DuplicateName {
                            category,
                            name: descriptor.name,
                        }
                    } else {
                        RegistryError::Conflict {
                            template: descriptor.name,
                            existing: existing.to_string(),
                        }
                    });
                }
                debug!(category = %category, name = %descriptor.name, "capability registered");
                tables.resources.push((
                    template,
                    Arc::new(Registration {
                        descriptor,
                        handler,
                    }),
                ));
            }
        }

        Ok(())
    }

    /// Looks up a tool or prompt by name, or matches a resource URI against
    /// the registered templates.
    pub fn resolve(&self, category: Category, name: &str) -> Result<Resolved, InvocationError> {
        let tables = self.read();
        let found = match category {
            Category::Tool => tables.tools.get(name).map(|entry| Resolved {
                entry: Arc::clone(entry),
                bindings: Vec::new(),
            }),
            Category::Prompt => tables.prompts.get(name).map(|entry| Resolved {
                entry: Arc::clone(entry),
                bindings: Vec::new(),
            }),
            Category::Resource => tables
                .resources
                .iter()
                .filter_map(|(template, entry)| {
                    template
                        .bind(name)
                        .map(|bindings| (template.specificity(), entry, bindings))
                })
                .max_by(|left, right| left.0.cmp(&right.0))
                .map(|(_, entry, bindings)| Resolved {
                    entry: Arc::clone(entry),
                    bindings,
                }),
        };

        found.ok_or_else(|| InvocationError::not_found(category, name))
    }

    pub fn tools(&self) -> Vec<HandlerDescriptor> {
        collect(&self.read().tools.entries)
    }

    pub fn prompts(&self) -> Vec<HandlerDescriptor> {
        collect(&self.read().prompts.entries)
    }

    /// Resources whose URI has no placeholders.
    pub fn resources(&self) -> Vec<HandlerDescriptor> {
        self.resources_where(true)
    }

    /// Resources addressed through a URI template with placeholders.
    pub fn resource_templates(&self) -> Vec<HandlerDescriptor> {
        self.resources_where(false)
    }

    pub fn len(&self, category: Category) -> usize {
        let tables = self.read();
        match category {
            Category::Tool => tables.tools.entries.len(),
            Category::Prompt => tables.prompts.entries.len(),
            Category::Resource => tables.resources.len(),
        }
    }

    fn resources_where(&self, is_static: bool) -> Vec<HandlerDescriptor> {
        self.read()
            .resources
            .iter()
            .filter(|(template, _)| template.is_static() == is_static)
            .map(|(_, entry)| entry.descriptor.clone())
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn collect(entries: &[Arc<Registration>]) -> Vec<HandlerDescriptor> {
    entries
        .iter()
        .map(|entry| entry.descriptor.clone())
        .collect()
}

fn check_handler_name(
    category: Category,
    descriptor: &HandlerDescriptor,
) -> Result<(), RegistryError> {
    if handler_name_pattern().is_match(&descriptor.name) {
        Ok(())
    } else {
        Err(RegistryError::invalid(
            category,
            &descriptor.name,
            "names must start with a letter or underscore and contain only letters, digits, `_`, `.` and `-`",
        ))
    }
}

/// Every placeholder must be a declared string parameter and every parameter
/// must be bound by a placeholder.
fn check_resource_parameters(
    template: &UriTemplate,
    descriptor: &HandlerDescriptor,
) -> Result<(), RegistryError> {
    let invalid = |reason: String| {
        RegistryError::invalid(Category::Resource, &descriptor.name, reason)
    };

    for placeholder in template.placeholders() {
        match descriptor.parameter(placeholder) {
            Some(spec) if spec.param_type == ParamType::String && spec.required => {}
            Some(_) => {
                return Err(invalid(format!(
                    "placeholder `{placeholder}` must be a required string parameter"
                )))
            }
            None => {
                return Err(invalid(format!(
                    "placeholder `{placeholder}` has no matching parameter"
                )))
            }
        }
    }

    if let Some(spec) = descriptor
        .parameters
        .iter()
        .find(|spec| !template.placeholders().any(|name| name == spec.name))
    {
        return Err(invalid(format!(
            "parameter `{}` is not bound by the template",
            spec.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        handler::sync_handler,
        signature::{ArgValue, ParameterSpec},
    };

    fn add_descriptor() -> HandlerDescriptor {
        HandlerDescriptor::new("add", "Add two numbers", ParamType::Number)
            .param(ParameterSpec::required("a", ParamType::Number))
            .param(ParameterSpec::required("b", ParamType::Number))
    }

    fn greeting_descriptor(template: &str) -> HandlerDescriptor {
        HandlerDescriptor::new(template, "Greeting", ParamType::String)
            .param(ParameterSpec::required("name", ParamType::String))
    }

    fn constant(value: &'static str) -> impl Handler + 'static {
        sync_handler(move |_| Ok(ArgValue::from(value)))
    }

    #[test]
    fn resolve_returns_registered_descriptor() {
        let registry = Registry::new();
        registry
            .register_tool(add_descriptor(), constant("ok"))
            .expect("registration succeeds");

        let resolved = registry.resolve(Category::Tool, "add").expect("tool exists");
        assert_eq!(resolved.descriptor(), &add_descriptor());
        assert!(resolved.bindings.is_empty());
    }

    #[test]
    fn duplicate_tool_leaves_registry_unchanged() {
        let registry = Registry::new();
        registry
            .register_tool(add_descriptor(), constant("first"))
            .expect("registration succeeds");

        let other = HandlerDescriptor::new("add", "Another add", ParamType::String);
        let error = registry
            .register_tool(other, constant("second"))
            .expect_err("duplicate must fail");

        assert!(matches!(error, RegistryError::DuplicateName { category: Category::Tool, .. }));
        assert_eq!(registry.len(Category::Tool), 1);
        assert_eq!(registry.tools(), vec![add_descriptor()]);
    }

    #[test]
    fn same_name_in_other_category_is_allowed() {
        let registry = Registry::new();
        registry
            .register_tool(add_descriptor(), constant("tool"))
            .expect("tool registration");
        registry
            .register_prompt(add_descriptor(), constant("prompt"))
            .expect("prompt registration");

        assert!(registry.resolve(Category::Prompt, "add").is_ok());
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = Registry::new();
        let error = registry
            .resolve(Category::Tool, "missing")
            .err()
            .expect("lookup must fail");
        assert_eq!(error, InvocationError::not_found(Category::Tool, "missing"));
    }

    #[test]
    fn rejects_invalid_tool_names() {
        let registry = Registry::new();
        let descriptor = HandlerDescriptor::new("bad name", "Nope", ParamType::String);

        let error = registry
            .register_tool(descriptor, constant("x"))
            .expect_err("invalid name");
        assert!(matches!(error, RegistryError::InvalidDescriptor { .. }));
    }

    #[test]
    fn resource_template_binds_placeholders() {
        let registry = Registry::new();
        registry
            .register_resource(greeting_descriptor("greeting://{name}"), constant("hi"))
            .expect("registration succeeds");

        let resolved = registry
            .resolve(Category::Resource, "greeting://Alice")
            .expect("uri matches");
        assert_eq!(
            resolved.bindings,
            vec![("name".to_string(), "Alice".to_string())]
        );

        let error = registry
            .resolve(Category::Resource, "greeting://Alice/extra")
            .err()
            .expect("segment mismatch");
        assert_eq!(error.kind(), crate::errors::ErrorKind::NotFound);
    }

    #[test]
    fn ambiguous_template_is_a_conflict() {
        let registry = Registry::new();
        registry
            .register_resource(greeting_descriptor("greeting://{name}"), constant("hi"))
            .expect("registration succeeds");

        let conflicting = HandlerDescriptor::new("greeting://{who}", "Other", ParamType::String)
            .param(ParameterSpec::required("who", ParamType::String));
        let error = registry
            .register_resource(conflicting, constant("hey"))
            .expect_err("same shape must conflict");

        assert!(matches!(error, RegistryError::Conflict { .. }));
        assert_eq!(registry.len(Category::Resource), 1);

        let error = registry
            .register_resource(greeting_descriptor("greeting://{name}"), constant("again"))
            .expect_err("identical template");
        assert!(matches!(error, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn static_resource_wins_over_template() {
        let registry = Registry::new();
        registry
            .register_resource(
                HandlerDescriptor::new("info://{topic}", "Topic", ParamType::String)
                    .param(ParameterSpec::required("topic", ParamType::String)),
                constant("topic"),
            )
            .expect("template registration");
        registry
            .register_resource(
                HandlerDescriptor::new("info://server", "Server", ParamType::String),
                constant("server"),
            )
            .expect("static registration");

        let resolved = registry
            .resolve(Category::Resource, "info://server")
            .expect("uri matches");
        assert_eq!(resolved.descriptor().name, "info://server");
        assert_eq!(registry.resources().len(), 1);
        assert_eq!(registry.resource_templates().len(), 1);
    }

    #[test]
    fn resource_parameters_must_match_placeholders() {
        let registry = Registry::new();

        let unbound = greeting_descriptor("greeting://{name}")
            .param(ParameterSpec::required("extra", ParamType::String));
        assert!(registry.register_resource(unbound, constant("x")).is_err());

        let missing = HandlerDescriptor::new("greeting://{name}", "No params", ParamType::String);
        assert!(registry.register_resource(missing, constant("x")).is_err());

        let malformed = greeting_descriptor("greeting://hi-{name}");
        assert!(registry.register_resource(malformed, constant("x")).is_err());
        assert_eq!(registry.len(Category::Resource), 0);
    }
}
