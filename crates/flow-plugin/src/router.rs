//! Selects the search handler for a query and runs it.
//!
//! Handlers are evaluated in reverse declaration order and the first whose
//! restriction matches wins, so a catch-all declared first acts as the
//! fallback. Regex handlers may declare parameters that are bound from the
//! match's capture groups before the handler runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::cancel::{CancellationSignal, Generation};
use crate::context::PluginContext;
use crate::query::{Query, QueryData, RegexMatch};
use crate::restriction::Restriction;
use crate::results::{ResultRecord, handler_error, normalize};

/// Target type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Captured text as is.
    Text,
    /// Signed integer.
    Integer,
    /// Floating-point number.
    Float,
    /// `true` or `false`, ignoring case.
    Boolean,
}

/// A handler parameter bound from a capture group.
///
/// The group is looked up by name, except that a name of the form `_N`
/// refers to numbered group `N`.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
    optional: bool,
}

impl Param {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            optional: false,
        }
    }

    /// A text parameter.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Text)
    }

    /// An integer parameter.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    /// A floating-point parameter.
    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    /// A boolean parameter.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    /// Binds `null` when the group did not participate.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Binds `value` when the group did not participate.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn group<'m>(&self, found: &'m RegexMatch) -> Option<&'m str> {
        match self.name.strip_prefix('_').map(str::parse::<usize>) {
            Some(Ok(index)) => found.get(index),
            _ => found.name(&self.name),
        }
    }

    fn convert(&self, text: &str) -> Result<Value, String> {
        let invalid = |target: &str| {
            format!("cannot convert `{text}` to {target} for parameter `{}`", self.name)
        };
        match self.kind {
            ParamKind::Text => Ok(Value::String(text.to_string())),
            ParamKind::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("an integer")),
            ParamKind::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("a number")),
            ParamKind::Boolean => match text.trim().to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid("a boolean")),
            },
        }
    }

    fn bind(&self, found: &RegexMatch) -> Result<Value, String> {
        match self.group(found) {
            Some(text) => self.convert(text),
            None => match &self.default {
                Some(value) => Ok(value.clone()),
                None if self.optional => Ok(Value::Null),
                None => Err(format!(
                    "no capture group for parameter `{}` took part in the match",
                    self.name
                )),
            },
        }
    }
}

/// Parameter values bound for one handler call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: HashMap<String, Value>,
}

impl Arguments {
    fn bind(params: &[Param], found: &RegexMatch) -> Result<Self, String> {
        let values = params
            .iter()
            .map(|param| Ok((param.name.clone(), param.bind(found)?)))
            .collect::<Result<_, String>>()?;
        Ok(Self { values })
    }

    /// The raw bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// A text parameter.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// An integer parameter.
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// A floating-point parameter.
    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// A boolean parameter.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a search handler receives.
#[derive(Clone)]
pub struct SearchRequest {
    /// The query as derived by the matching restriction.
    pub query: Query,
    /// Bound parameters; empty unless a regex restriction matched.
    pub args: Arguments,
    /// Fires when a newer query supersedes this one.
    pub signal: CancellationSignal,
    /// Plugin context.
    pub context: PluginContext,
}

/// A search callback.
#[async_trait]
pub trait SearchHandler: Send + Sync {
    /// Produces results for the query.
    async fn search(&self, request: SearchRequest) -> anyhow::Result<crate::results::Output>;
}

#[async_trait]
impl<F, Fut, O> SearchHandler for F
where
    F: Fn(SearchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Into<crate::results::Output> + Send + 'static,
{
    async fn search(&self, request: SearchRequest) -> anyhow::Result<crate::results::Output> {
        (self)(request).await.map(Into::into)
    }
}

/// A named search handler with its restriction and parameters.
#[derive(Clone)]
pub struct Registration {
    name: String,
    restriction: Restriction,
    params: Vec<Param>,
    handler: Arc<dyn SearchHandler>,
}

impl Registration {
    /// Registers `handler` under `name`, selected by `restriction`.
    #[must_use]
    pub fn new(name: impl Into<String>, restriction: Restriction, handler: Arc<dyn SearchHandler>) -> Self {
        Self {
            name: name.into(),
            restriction,
            params: Vec::new(),
            handler,
        }
    }

    /// Declares the parameters bound from the regex match.
    #[must_use]
    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    /// The handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The restriction.
    #[must_use]
    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }
}

/// Result of routing one query.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Records to send to the host.
    Results(Vec<ResultRecord>),
    /// A newer query arrived before the handler ran.
    Cancelled,
}

/// Ordered set of search handlers.
pub struct Router {
    registrations: Vec<Registration>,
}

impl Router {
    /// Builds a router from handlers in declaration order.
    #[must_use]
    pub fn new(mut declared: Vec<Registration>) -> Self {
        declared.reverse();
        Self {
            registrations: declared,
        }
    }

    /// Handlers in evaluation order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter()
    }

    /// Finds the first handler whose restriction matches `data`.
    #[must_use]
    pub fn select(&self, data: &QueryData) -> Option<(&Registration, Query)> {
        self.registrations.iter().find_map(|registration| {
            registration
                .restriction
                .evaluate(data)
                .map(|query| (registration, query))
        })
    }

    /// Routes `data` to its handler and normalizes the output.
    ///
    /// No matching handler yields no records. A parameter that cannot be
    /// bound yields a single record describing the failure instead of
    /// running the handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn route(
        &self,
        data: &QueryData,
        generation: &Generation,
        context: &PluginContext,
    ) -> anyhow::Result<RouteOutcome> {
        let Some((registration, query)) = self.select(data) else {
            debug!(search = %data.search, "No handler matched");
            return Ok(RouteOutcome::Results(Vec::new()));
        };
        debug!(handler = %registration.name, generation = generation.number(), "Routing query");

        if !generation
            .debounce(registration.restriction.debounce_delay())
            .await
        {
            debug!(handler = %registration.name, "Query superseded during debounce");
            return Ok(RouteOutcome::Cancelled);
        }

        let args = match query.regex_match() {
            Some(found) => match Arguments::bind(&registration.params, found) {
                Ok(args) => args,
                Err(reason) => {
                    warn!(handler = %registration.name, "Parameter binding failed: {reason}");
                    return Ok(RouteOutcome::Results(vec![handler_error(
                        &registration.name,
                        &reason,
                        context.default_icon(),
                    )]));
                }
            },
            None => Arguments::default(),
        };

        let output = registration
            .handler
            .search(SearchRequest {
                query,
                args,
                signal: generation.signal(),
                context: context.clone(),
            })
            .await?;
        Ok(RouteOutcome::Results(normalize(output, context.default_icon())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::GenerationController;
    use crate::context::PluginMetadata;
    use crate::results::{Output, SearchResult};
    use crate::session::Session;
    use std::time::Duration;

    fn context() -> PluginContext {
        let metadata = PluginMetadata {
            ico_path: "icon.png".to_string(),
            ..PluginMetadata::default()
        };
        PluginContext::new(metadata, Session::new().client())
    }

    fn data(search: &str) -> QueryData {
        QueryData {
            search: search.to_string(),
            ..QueryData::default()
        }
    }

    fn echo(label: &'static str) -> Arc<dyn SearchHandler> {
        Arc::new(move |request: SearchRequest| async move {
            Ok::<_, anyhow::Error>(format!("{label}:{}", request.query.search()))
        })
    }

    fn titles(outcome: RouteOutcome) -> Vec<String> {
        match outcome {
            RouteOutcome::Results(records) => records.into_iter().map(|r| r.title).collect(),
            RouteOutcome::Cancelled => panic!("query was cancelled"),
        }
    }

    #[tokio::test]
    async fn later_declaration_wins() {
        let router = Router::new(vec![
            Registration::new("a", Restriction::none(), echo("A")),
            Registration::new("b", Restriction::starts_with("hi "), echo("B")),
        ]);
        let generation = GenerationController::new().begin();

        let outcome = router
            .route(&data("hi there"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["B:there"]);

        let outcome = router
            .route(&data("other"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["A:other"]);
    }

    #[tokio::test]
    async fn no_match_yields_nothing() {
        let router = Router::new(vec![Registration::new(
            "time",
            Restriction::equal_to("time"),
            echo("T"),
        )]);
        let generation = GenerationController::new().begin();
        let outcome = router
            .route(&data("nope"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Results(Vec::new()));
    }

    #[tokio::test]
    async fn regex_params_are_bound() {
        let handler: Arc<dyn SearchHandler> = Arc::new(|request: SearchRequest| async move {
            let sum = request.args.i64("a").unwrap_or(0) + request.args.i64("_2").unwrap_or(0);
            Ok::<_, anyhow::Error>(SearchResult::new(sum.to_string()))
        });
        let router = Router::new(vec![
            Registration::new(
                "add",
                Restriction::regex(r"^add (?<a>\d+) (\d+)$").unwrap(),
                handler,
            )
            .with_params(vec![Param::integer("a"), Param::integer("_2")]),
        ]);
        let generation = GenerationController::new().begin();

        let outcome = router
            .route(&data("add 2 40"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["42"]);
    }

    #[tokio::test]
    async fn named_group_binds_text() {
        let handler: Arc<dyn SearchHandler> = Arc::new(|request: SearchRequest| async move {
            Ok::<_, anyhow::Error>(request.args.str("name").unwrap_or_default().to_string())
        });
        let router = Router::new(vec![
            Registration::new("greet", Restriction::regex(r"^greet (?<name>\w+)$").unwrap(), handler)
                .with_params(vec![Param::text("name")]),
        ]);
        let generation = GenerationController::new().begin();

        let outcome = router
            .route(&data("greet Sam"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["Sam"]);
    }

    #[tokio::test]
    async fn binding_failure_reports_handler() {
        let router = Router::new(vec![
            Registration::new("add", Restriction::regex(r"^add (?<a>\w+)$").unwrap(), echo("X"))
                .with_params(vec![Param::integer("a")]),
        ]);
        let generation = GenerationController::new().begin();

        let RouteOutcome::Results(records) = router
            .route(&data("add two"), &generation, &context())
            .await
            .unwrap()
        else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Error: in handler `add`");
        assert!(records[0].subtitle.as_deref().unwrap().contains("`two`"));
    }

    #[tokio::test]
    async fn missing_group_uses_default_then_optional() {
        let handler: Arc<dyn SearchHandler> = Arc::new(|request: SearchRequest| async move {
            Ok::<_, anyhow::Error>(format!(
                "{}|{}",
                request.args.i64("count").unwrap_or(-1),
                request.args.get("flag").cloned().unwrap_or_default()
            ))
        });
        let router = Router::new(vec![
            Registration::new(
                "opt",
                Restriction::regex(r"^opt(?: (?<count>\d+))?(?: (?<flag>true|false))?$").unwrap(),
                handler,
            )
            .with_params(vec![
                Param::integer("count").default_value(7),
                Param::boolean("flag").optional(),
            ]),
        ]);
        let generation = GenerationController::new().begin();

        let outcome = router
            .route(&data("opt"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["7|null"]);
    }

    #[tokio::test]
    async fn missing_required_group_is_an_error() {
        let router = Router::new(vec![
            Registration::new("x", Restriction::regex(r"^x(?: (?<n>\d+))?$").unwrap(), echo("X"))
                .with_params(vec![Param::integer("n")]),
        ]);
        let generation = GenerationController::new().begin();

        let outcome = router
            .route(&data("x"), &generation, &context())
            .await
            .unwrap();
        assert_eq!(titles(outcome), vec!["Error: in handler `x`"]);
    }

    #[tokio::test]
    async fn handler_error_propagates() {
        let failing: Arc<dyn SearchHandler> = Arc::new(|_: SearchRequest| async move {
            Err::<Output, _>(anyhow::anyhow!("boom"))
        });
        let router = Router::new(vec![Registration::new("f", Restriction::none(), failing)]);
        let generation = GenerationController::new().begin();

        let err = router
            .route(&data("x"), &generation, &context())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_query_is_cancelled_by_newer_one() {
        let router = Router::new(vec![Registration::new(
            "slow",
            Restriction::none().debounce(Duration::from_millis(300)),
            echo("S"),
        )]);
        let controller = Arc::new(GenerationController::new());
        let first = controller.begin();

        let racer = Arc::clone(&controller);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            racer.begin();
        });

        let outcome = router
            .route(&data("a"), &first, &context())
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Cancelled);
    }
}
