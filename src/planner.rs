//! Itinerary generation: context lookup, prompting and streaming into a session.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ai::client::{CompletionStream, CompletionStreamClient};
use crate::ai::facts::FactProviders;
use crate::ai::prompt_builder::PromptBuilder;
use crate::core::config::AppConfig;
use crate::core::models::{TripRecord, TripRequest};
use crate::errors::PlannerError;
use crate::session::{GenerationSession, Phase};
use crate::store::{JsonlTripStore, TripStore};

pub struct TripPlanner {
    client: CompletionStreamClient,
    prompts: PromptBuilder,
    facts: FactProviders,
    store: Option<Arc<dyn TripStore>>,
}

impl std::fmt::Debug for TripPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripPlanner")
            .field("client", &self.client)
            .field("prompts", &self.prompts)
            .field("facts", &self.facts)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl TripPlanner {
    /// A planner with no auxiliary providers and no history store.
    #[must_use]
    pub fn new(client: CompletionStreamClient) -> Self {
        Self {
            client,
            prompts: PromptBuilder::default(),
            facts: FactProviders::none(),
            store: None,
        }
    }

    /// Built-in providers, the configured language and, if a history path is
    /// set, a JSON-lines store.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PlannerError> {
        let client = CompletionStreamClient::new(config.client.clone())?;
        let mut planner = Self::new(client)
            .with_prompt_builder(PromptBuilder::new(config.language.clone()))
            .with_facts(FactProviders::builtin());
        if let Some(path) = &config.history_path {
            planner = planner.with_store(Arc::new(JsonlTripStore::new(path.clone())));
        }
        Ok(planner)
    }

    #[must_use]
    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub fn with_facts(mut self, facts: FactProviders) -> Self {
        self.facts = facts;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TripStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Runs one generation to a terminal phase and returns the itinerary.
    ///
    /// A session runs at most one generation: calling this on a session that
    /// is not `Idle` is rejected and leaves the session untouched.
    ///
    /// # Errors
    ///
    /// - `GenerationActive` / `SessionFinished` if the session is not `Idle`.
    /// - Otherwise the error that moved the session to `Failed`; the same
    ///   message is in the session's `error_detail`.
    pub async fn generate(
        &self,
        session: &GenerationSession,
        request: &TripRequest,
    ) -> Result<String, PlannerError> {
        session.try_begin()?;

        match self.run(session, request).await {
            Ok(()) => {
                session.advance(Phase::Completed);
                let itinerary = session.accumulated_text();
                info!(
                    destination = request.destination(),
                    chars = itinerary.chars().count(),
                    "Itinerary generated"
                );
                self.persist(request, &itinerary).await;
                Ok(itinerary)
            }
            Err(e) => {
                error!(destination = request.destination(), error = %e, "Itinerary generation failed");
                session.fail(&e);
                Err(e)
            }
        }
    }

    /// Starts a generation on a fresh session in the background.
    #[must_use]
    pub fn spawn(
        self: &Arc<Self>,
        request: TripRequest,
    ) -> (GenerationSession, JoinHandle<Result<String, PlannerError>>) {
        let session = GenerationSession::new();
        let planner = Arc::clone(self);
        let handle = {
            let session = session.clone();
            tokio::spawn(async move { planner.generate(&session, &request).await })
        };
        (session, handle)
    }

    async fn run(
        &self,
        session: &GenerationSession,
        request: &TripRequest,
    ) -> Result<(), PlannerError> {
        let cancel = session.cancellation_token();

        let facts = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlannerError::Cancelled),
            facts = self.facts.gather(request) => facts,
        };

        session.advance(Phase::Requesting);
        let conversation = self.prompts.build(request, &facts);

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlannerError::Cancelled),
            opened = self.client.open_stream(&conversation) => opened?,
        };

        drive_stream(session, stream).await
    }

    async fn persist(&self, request: &TripRequest, itinerary: &str) {
        let Some(store) = &self.store else {
            return;
        };
        let record = TripRecord::from_generation(request, itinerary.to_string());
        if let Err(e) = store.append(record).await {
            warn!(error = %e, "Failed to save trip history");
        }
    }
}

/// Moves the session to `Streaming` and appends fragments until the stream
/// ends. Returning drops `stream`, which closes the connection.
pub(crate) async fn drive_stream(
    session: &GenerationSession,
    mut stream: CompletionStream,
) -> Result<(), PlannerError> {
    session.advance(Phase::Streaming);
    let cancel = session.cancellation_token();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlannerError::Cancelled),
            next = stream.next_fragment() => next?,
        };
        match next {
            Some(fragment) => {
                session.append(&fragment);
            }
            None => return Ok(()),
        }
    }
}
