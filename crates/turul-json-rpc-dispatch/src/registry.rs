//! Method registry
//!
//! Handlers are offered to the registry as [`HandlerDefinition`] candidates,
//! enumerated explicitly by the application at startup. A candidate only
//! contributes a method when it declares itself an RPC unit (via
//! [`HandlerDefinition::expose`] or [`HandlerDefinition::expose_as`]); such a
//! unit must also provide its `execute` entry point, otherwise the build
//! reports a [`BuildError`] for it.
//!
//! A built [`MethodRegistry`] is immutable. Hot reload goes through
//! [`RegistryHandle`], which swaps whole snapshots so in-flight dispatches keep
//! the registry they started with.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error, trace};

use crate::error::{BuildError, HandlerError};
use crate::request::RequestParams;
use crate::types::{RequestId, TransportMetadata};

/// Per-call information handed to a handler alongside its params
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub method: &'a str,
    pub id: Option<&'a RequestId>,
    pub metadata: &'a TransportMetadata,
}

impl CallContext<'_> {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// The designated entry operation of an RPC unit
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn execute(
        &self,
        params: RequestParams,
        context: CallContext<'_>,
    ) -> Result<Value, HandlerError>;
}

/// A closure-based handler; the call context is not forwarded
pub struct FunctionHandler<F> {
    handler_fn: F,
}

impl<F, Fut> FunctionHandler<F>
where
    F: Fn(RequestParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F, Fut> MethodHandler for FunctionHandler<F>
where
    F: Fn(RequestParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn execute(
        &self,
        params: RequestParams,
        _context: CallContext<'_>,
    ) -> Result<Value, HandlerError> {
        (self.handler_fn)(params).await
    }
}

/// A declared parameter. Only presence is checked, never the value's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
}

/// A candidate handler unit offered to [`MethodRegistry::build`]
#[derive(Clone)]
pub struct HandlerDefinition {
    identity: String,
    exposed: bool,
    method_name: Option<String>,
    roles: BTreeSet<String>,
    params: Vec<ParamSpec>,
    description: Option<String>,
    entry: Option<Arc<dyn MethodHandler>>,
}

impl HandlerDefinition {
    /// A candidate with the given identity; not an RPC unit until exposed
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            exposed: false,
            method_name: None,
            roles: BTreeSet::new(),
            params: Vec::new(),
            description: None,
            entry: None,
        }
    }

    /// Shorthand for an exposed unit named after its identity
    pub fn method<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        Self::new(name).expose().execute(handler)
    }

    /// Declare this candidate an RPC unit, named after its identity
    pub fn expose(mut self) -> Self {
        self.exposed = true;
        self
    }

    /// Declare this candidate an RPC unit under an explicit method name
    pub fn expose_as(mut self, method_name: impl Into<String>) -> Self {
        self.exposed = true;
        self.method_name = Some(method_name.into());
        self
    }

    /// Roles the caller must be granted; any declared role is checked by the
    /// authorization capability
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            required: true,
        });
        self
    }

    pub fn optional_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            required: false,
        });
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Provide the `execute` entry point
    pub fn execute<H>(mut self, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        self.entry = Some(Arc::new(handler));
        self
    }

    /// Provide the `execute` entry point as an async closure over the params
    pub fn execute_fn<F, Fut>(self, handler_fn: F) -> Self
    where
        F: Fn(RequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.execute(FunctionHandler::new(handler_fn))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    /// Validate the candidate.
    ///
    /// `Ok(None)` means "not an RPC unit"; errors are only produced for
    /// exposed units.
    pub fn into_descriptor(self) -> Result<Option<MethodDescriptor>, BuildError> {
        if !self.exposed {
            return Ok(None);
        }

        let Some(handler) = self.entry else {
            return Err(BuildError::MissingEntryPoint {
                candidate: self.identity,
            });
        };

        let name = self.method_name.unwrap_or_else(|| self.identity.clone());
        if name.trim().is_empty() {
            return Err(BuildError::EmptyMethodName {
                candidate: self.identity,
            });
        }

        Ok(Some(MethodDescriptor {
            name,
            source: self.identity,
            required_roles: (!self.roles.is_empty()).then_some(self.roles),
            params: self.params,
            description: self.description,
            handler,
        }))
    }
}

impl std::fmt::Debug for HandlerDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDefinition")
            .field("identity", &self.identity)
            .field("exposed", &self.exposed)
            .field("method_name", &self.method_name)
            .field("roles", &self.roles)
            .field("params", &self.params)
            .field("has_entry", &self.entry.is_some())
            .finish()
    }
}

/// Registry record binding a method name to its entry point and metadata
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    /// Identity of the definition this descriptor was built from
    pub source: String,
    pub required_roles: Option<BTreeSet<String>>,
    pub params: Vec<ParamSpec>,
    pub description: Option<String>,
    handler: Arc<dyn MethodHandler>,
}

impl MethodDescriptor {
    /// Bind positional params to declared names and check required ones are present
    pub fn prepare_params(&self, params: RequestParams) -> Result<RequestParams, HandlerError> {
        if self.params.is_empty() {
            return Ok(params);
        }

        let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        let params = params.into_named(&names);

        let missing: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required && params.get(&p.name).is_none())
            .map(|p| p.name.as_str())
            .collect();

        if missing.is_empty() {
            Ok(params)
        } else {
            Err(HandlerError::InvalidParams {
                message: format!("Missing required params: {}", missing.join(", ")),
                data: Some(json!({ "missing": missing })),
            })
        }
    }

    /// Run the entry point
    pub async fn invoke(
        &self,
        params: RequestParams,
        context: CallContext<'_>,
    ) -> Result<Value, HandlerError> {
        self.handler.execute(params, context).await
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("required_roles", &self.required_roles)
            .field("params", &self.params)
            .finish()
    }
}

/// Immutable mapping from method name to descriptor
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl MethodRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry, collecting per-candidate failures.
    ///
    /// Candidates that are not RPC units are skipped silently. A duplicate
    /// method name is rejected and the first registration kept.
    pub fn build<I>(candidates: I) -> (Self, Vec<BuildError>)
    where
        I: IntoIterator<Item = HandlerDefinition>,
    {
        let mut methods: HashMap<String, Arc<MethodDescriptor>> = HashMap::new();
        let mut errors = Vec::new();

        for candidate in candidates {
            let identity = candidate.identity().to_string();
            match candidate.into_descriptor() {
                Ok(None) => trace!(candidate = %identity, "Skipping candidate: not an RPC unit"),
                Ok(Some(descriptor)) => {
                    if methods.contains_key(&descriptor.name) {
                        let err = BuildError::DuplicateMethod {
                            method: descriptor.name,
                            candidate: identity,
                        };
                        error!("Registry build failed: {}", err);
                        errors.push(err);
                        continue;
                    }
                    debug!(
                        method = %descriptor.name,
                        candidate = %identity,
                        "Registered RPC method"
                    );
                    methods.insert(descriptor.name.clone(), Arc::new(descriptor));
                }
                Err(err) => {
                    error!("Registry build failed: {}", err);
                    errors.push(err);
                }
            }
        }

        (Self { methods }, errors)
    }

    /// Build a registry, failing on the first invalid candidate
    pub fn try_build<I>(candidates: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = HandlerDefinition>,
    {
        let (registry, errors) = Self::build(candidates);
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(registry),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Shared, atomically replaceable registry snapshot.
///
/// Readers load the current registry without locking; a reload swaps in a
/// whole new registry, so in-flight envelopes keep the one they started with.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<ArcSwap<MethodRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// The registry in effect right now; stays valid after a reload
    pub fn snapshot(&self) -> Arc<MethodRegistry> {
        self.current.load_full()
    }

    /// Replace the registry, returning the previous snapshot
    pub fn publish(&self, registry: MethodRegistry) -> Arc<MethodRegistry> {
        self.current.swap(Arc::new(registry))
    }
}
