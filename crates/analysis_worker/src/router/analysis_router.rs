use crate::router::{Predicate, WidgetAction};
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EventRecord, Environment};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

/// Business logic bound to one route
#[async_trait]
pub trait AnalysisHandler: Send + Sync {
    async fn handle(&self, batch: &[EventRecord], env: &Environment) -> DomainResult<()>;
}

/// Type alias for a closure handler registered with `register_fn`
pub type HandlerFn =
    Box<dyn Fn(Vec<EventRecord>, Environment) -> BoxFuture<'static, DomainResult<()>> + Send + Sync>;

struct FnHandler(HandlerFn);

#[async_trait]
impl AnalysisHandler for FnHandler {
    async fn handle(&self, batch: &[EventRecord], env: &Environment) -> DomainResult<()> {
        (self.0)(batch.to_vec(), env.clone()).await
    }
}

struct Route {
    name: String,
    handler: Arc<dyn AnalysisHandler>,
    predicates: Vec<Predicate>,
}

impl Route {
    fn matches(&self, batch: &[EventRecord], env: &Environment) -> bool {
        self.predicates.iter().all(|p| p.matches(batch, env))
    }
}

/// Chains further predicates onto a registration; all of them must hold
pub struct RouteBuilder<'a> {
    route: &'a mut Route,
}

impl RouteBuilder<'_> {
    pub fn when(self, predicate: Predicate) -> Self {
        self.route.predicates.push(predicate);
        self
    }

    pub fn when_input_form(self, button_id: impl Into<String>) -> Self {
        self.when(Predicate::InputForm(button_id.into()))
    }

    pub fn when_widget_exec(self, action: WidgetAction) -> Self {
        self.when(Predicate::WidgetExec(action))
    }

    pub fn when_device_list(self, widget_id: impl Into<String>) -> Self {
        self.when(Predicate::DeviceList(widget_id.into()))
    }

    pub fn when_variables<I, S>(self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.when(Predicate::Variables(
            variables.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn when_variable_prefix(self, prefix: impl Into<String>) -> Self {
        self.when(Predicate::VariablePrefix(prefix.into()))
    }

    pub fn when_env(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.when(Predicate::Env {
            key: key.into(),
            value: value.into(),
        })
    }
}

/// Aggregate result of one `exec`
#[derive(Debug, Default)]
pub struct RouterOutcome {
    /// Every handler invoked, in route order, whether it failed or not
    pub handlers_run: Vec<String>,
    pub errors: HashMap<String, DomainError>,
}

impl RouterOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.handlers_run
            .iter()
            .filter(|name| !self.errors.contains_key(*name))
            .map(String::as_str)
    }
}

/// Insertion-ordered route table that runs every matching handler
#[derive(Default)]
pub struct AnalysisRouter {
    routes: Vec<Route>,
}

impl AnalysisRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; chain more predicates on the returned builder
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn AnalysisHandler>,
        predicates: Vec<Predicate>,
    ) -> RouteBuilder<'_> {
        self.routes.push(Route {
            name: name.into(),
            handler,
            predicates,
        });
        let index = self.routes.len() - 1;
        RouteBuilder {
            route: &mut self.routes[index],
        }
    }

    /// Register an async closure as a handler
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        predicates: Vec<Predicate>,
    ) -> RouteBuilder<'_>
    where
        F: Fn(Vec<EventRecord>, Environment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DomainResult<()>> + Send + 'static,
    {
        let handler: HandlerFn = Box::new(move |batch, env| Box::pin(handler(batch, env)));
        self.register(name, Arc::new(FnHandler(handler)), predicates)
    }

    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name.as_str()).collect()
    }

    /// Every route needs a trigger and a unique name
    pub fn validate(&self) -> DomainResult<()> {
        let mut names = HashSet::new();
        for route in &self.routes {
            if route.predicates.is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "route {} declares no trigger predicate",
                    route.name
                )));
            }
            if !names.insert(route.name.as_str()) {
                return Err(DomainError::ValidationError(format!(
                    "route {} is registered twice",
                    route.name
                )));
            }
        }
        Ok(())
    }

    /// Run every route whose predicates all hold, in registration order.
    ///
    /// A failing or panicking handler is recorded under its name and never stops the
    /// handlers after it.
    pub async fn exec(&self, batch: &[EventRecord], env: &Environment) -> DomainResult<RouterOutcome> {
        self.validate()?;

        let mut outcome = RouterOutcome::default();
        if batch.is_empty() {
            info!("empty batch, no handler run");
            return Ok(outcome);
        }

        for route in &self.routes {
            if !route.matches(batch, env) {
                debug!(route = %route.name, "route did not match");
                continue;
            }

            let predicates = route
                .predicates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" && ");
            let span = info_span!("handler", route = %route.name, predicates = %predicates);
            let result = AssertUnwindSafe(route.handler.handle(batch, env))
                .catch_unwind()
                .instrument(span)
                .await
                .unwrap_or_else(|payload| {
                    Err(DomainError::HandlerPanic(panic_message(payload.as_ref())))
                });

            outcome.handlers_run.push(route.name.clone());
            match result {
                Ok(()) => debug!(route = %route.name, "handler completed"),
                Err(e) => {
                    error!(route = %route.name, error = %e, "handler failed");
                    outcome.errors.insert(route.name.clone(), e);
                }
            }
        }

        info!(
            records = batch.len(),
            handlers_run = outcome.handlers_run.len(),
            failed = outcome.errors.len(),
            "batch routed"
        );
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
