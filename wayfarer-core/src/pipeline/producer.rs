//! Producer agents: one candidate per step per category

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WayfarerError};
use crate::llm::{generate_text, LLMConfig, LLMProvider};
use crate::model::{ContentCandidate, ContentCategory, RouteStep};
use crate::parsing::{parse_object_lenient, str_field};
use crate::prompts::{PromptTemplate, PromptTemplates};
use crate::search::{self, format_results, SearchKind, SearchProvider};

use super::events::EventEmitter;
use super::{poll_next, CandidateMessage, Polled, Signal};

impl ContentCategory {
    /// Name of the prompt template this category renders
    pub fn template_name(&self) -> &'static str {
        self.as_str()
    }

    /// Search endpoint consulted when the model asks for one
    pub fn search_kind(&self) -> SearchKind {
        match self {
            ContentCategory::Video => SearchKind::Videos,
            ContentCategory::Music | ContentCategory::History => SearchKind::Web,
        }
    }

    /// Build a candidate from the model's parsed answer.
    ///
    /// Missing fields become placeholders; this never fails.
    pub fn candidate_from(&self, data: &Map<String, Value>) -> ContentCandidate {
        match self {
            ContentCategory::Video => {
                let video = data.get("selected_video");
                ContentCandidate {
                    category: *self,
                    title: str_field(video, "title", "Unknown Video"),
                    description: str_field(video, "description", ""),
                    url: Some(str_field(video, "url", "")).filter(|u| !u.is_empty()),
                    reasoning: str_field(video, "reasoning", ""),
                }
            }
            ContentCategory::Music => {
                let song = data.get("selected_song");
                ContentCandidate {
                    category: *self,
                    title: format!(
                        "{} by {}",
                        str_field(song, "title", "Unknown"),
                        str_field(song, "artist", "Unknown")
                    ),
                    description: str_field(song, "description", ""),
                    url: None,
                    reasoning: str_field(song, "reasoning", ""),
                }
            }
            ContentCategory::History => {
                let story = data.get("selected_story");
                ContentCandidate {
                    category: *self,
                    title: str_field(story, "title", "Unknown Story"),
                    description: str_field(story, "content", ""),
                    url: None,
                    reasoning: str_field(story, "reasoning", ""),
                }
            }
        }
    }
}

/// A producer for a single content category.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct ContentAgent {
    category: ContentCategory,
    llm: Arc<dyn LLMProvider>,
    search: Arc<dyn SearchProvider>,
    template: PromptTemplate,
    llm_config: LLMConfig,
    result_limit: usize,
    events: EventEmitter,
}

impl ContentAgent {
    pub fn new(
        category: ContentCategory,
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
        templates: &PromptTemplates,
        llm_config: LLMConfig,
    ) -> Self {
        Self {
            category,
            llm,
            search,
            template: templates.get(category.template_name()),
            llm_config,
            result_limit: 5,
            events: EventEmitter::disabled(),
        }
    }

    /// Set how many search results are shown on the refinement call
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    /// Propose a candidate for `step`.
    ///
    /// One model call, plus a search and a second call when the first answer
    /// carries a `search_query`.
    pub async fn produce(&self, step: &RouteStep) -> ContentCandidate {
        let location = step.location_description();
        let prompt = self.template.render(&[
            ("location", location.as_str()),
            ("instruction", step.instruction.as_str()),
        ]);

        let response = generate_text(self.llm.as_ref(), &prompt, &self.llm_config).await;
        let mut data = parse_object_lenient(&response);

        if let Some(query) = data.get("search_query").map(query_text) {
            tracing::info!(category = %self.category, step_id = %step.id, query = %query, "Searching");
            let results = search::search(self.search.as_ref(), self.category.search_kind(), &query).await;

            let follow_up = format!(
                "{}\n\nSearch Results:\n{}\n\nNow select the best option based on these results.",
                prompt,
                format_results(&results, self.result_limit)
            );
            let response = generate_text(self.llm.as_ref(), &follow_up, &self.llm_config).await;
            data = parse_object_lenient(&response);
        }

        self.category.candidate_from(&data)
    }

    /// Run `produce` on its own task so a panicking collaborator only costs
    /// this step. Returns `None` if `cancel` fires first.
    ///
    /// The task lives in a `JoinSet`, so it is aborted on cancellation and
    /// also when this future is dropped.
    async fn produce_isolated(
        &self,
        step: RouteStep,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentCandidate>> {
        let agent = self.clone();
        let mut task = JoinSet::new();
        task.spawn(async move { agent.produce(&step).await });

        tokio::select! {
            joined = task.join_next() => match joined {
                Some(candidate) => Ok(Some(candidate?)),
                None => Err(WayfarerError::Pipeline("producer task vanished".to_string())),
            },
            _ = cancel.cancelled() => {
                task.abort_all();
                Ok(None)
            }
        }
    }

    /// Consume steps until a stop marker, a closed channel or cancellation.
    pub async fn run(
        self,
        mut rx: UnboundedReceiver<Signal<RouteStep>>,
        tx: UnboundedSender<Signal<CandidateMessage>>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        tracing::info!(category = %self.category, "Producer started");

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(category = %self.category, "Producer cancelled");
                break;
            }

            let step = match poll_next(&mut rx, poll_interval).await {
                Polled::Idle => continue,
                Polled::Closed | Polled::Item(Signal::Stop) => break,
                Polled::Item(Signal::Data(step)) => step,
            };

            let step_id = step.id.clone();
            match self.produce_isolated(step, &cancel).await {
                Ok(None) => {
                    tracing::debug!(category = %self.category, step_id = %step_id, "Producer cancelled mid-step");
                    break;
                }
                Ok(Some(candidate)) => {
                    self.events
                        .candidate_produced(&step_id, self.category, &candidate.title);
                    let message = CandidateMessage { step_id, candidate };
                    if tx.send(Signal::Data(message)).is_err() {
                        tracing::warn!(category = %self.category, "Arbiter channel closed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(category = %self.category, step_id = %step_id, error = %e, "Producer failed on step");
                    self.events
                        .producer_failed(&step_id, self.category, &e.to_string());
                }
            }
        }

        tracing::info!(category = %self.category, "Producer stopped");
    }
}

fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLLMProvider;
    use crate::model::SearchResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers by call index; repeats the last answer once exhausted.
    struct ScriptedLLM {
        answers: Vec<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLLM {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedLLM {
        async fn generate(&self, prompt: &str, _config: &LLMConfig) -> Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            let index = (prompts.len() - 1).min(self.answers.len() - 1);
            Ok(self.answers[index].clone())
        }
    }

    #[derive(Default)]
    struct RecordingSearch {
        queries: Mutex<Vec<(SearchKind, String)>>,
    }

    #[async_trait]
    impl SearchProvider for RecordingSearch {
        async fn search_videos(&self, query: &str) -> Result<Vec<SearchResult>> {
            self.queries
                .lock()
                .unwrap()
                .push((SearchKind::Videos, query.to_string()));
            Ok(vec![SearchResult {
                title: "Dashcam".to_string(),
                description: "Full drive".to_string(),
                url: "https://v.example/1".to_string(),
            }])
        }

        async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>> {
            self.queries
                .lock()
                .unwrap()
                .push((SearchKind::Web, query.to_string()));
            Ok(Vec::new())
        }
    }

    fn step() -> RouteStep {
        RouteStep {
            id: "step_4".to_string(),
            instruction: "Turn left onto Main St".to_string(),
            distance: 300.0,
            duration: 40.0,
            start_location: None,
            end_location: Some(crate::model::Coordinates::new(45.5, -122.6)),
            address: None,
        }
    }

    fn agent(
        category: ContentCategory,
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> ContentAgent {
        let templates = PromptTemplates::builtin()
            .with_template(category.template_name(), "Near {{location}}: {{instruction}}");
        ContentAgent::new(category, llm, search, &templates, LLMConfig::default())
    }

    #[tokio::test]
    async fn test_single_pass_without_search_query() {
        let llm = Arc::new(ScriptedLLM::new(&[
            r#"{"selected_story": {"title": "Gold Rush", "content": "1849", "reasoning": "Local"}}"#,
        ]));
        let search = Arc::new(RecordingSearch::default());
        let candidate = agent(ContentCategory::History, llm.clone(), search.clone())
            .produce(&step())
            .await;

        assert_eq!(candidate.title, "Gold Rush");
        assert_eq!(candidate.description, "1849");
        assert!(candidate.url.is_none());

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.as_slice(), ["Near 45.5,-122.6: Turn left onto Main St"]);
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_refinement_pass() {
        let llm = Arc::new(ScriptedLLM::new(&[
            r#"{"search_query": "drive portland"}"#,
            r#"Here you go: {"selected_video": {"title": "Dashcam", "description": "Full drive", "url": "https://v.example/1", "reasoning": "Matches"}}"#,
        ]));
        let search = Arc::new(RecordingSearch::default());
        let candidate = agent(ContentCategory::Video, llm.clone(), search.clone())
            .produce(&step())
            .await;

        assert_eq!(candidate.category, ContentCategory::Video);
        assert_eq!(candidate.url.as_deref(), Some("https://v.example/1"));

        let queries = search.queries.lock().unwrap();
        assert_eq!(queries.as_slice(), [(SearchKind::Videos, "drive portland".to_string())]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(
            prompts[1],
            "Near 45.5,-122.6: Turn left onto Main St\n\nSearch Results:\n- Dashcam: Full drive (https://v.example/1)\n\nNow select the best option based on these results."
        );
    }

    #[tokio::test]
    async fn test_music_uses_web_search_and_artist_title() {
        let llm = Arc::new(ScriptedLLM::new(&[
            r#"{"search_query": "songs about rain"}"#,
            r#"{"selected_song": {"title": "Rain", "artist": "The Beatles"}}"#,
        ]));
        let search = Arc::new(RecordingSearch::default());
        let candidate = agent(ContentCategory::Music, llm.clone(), search.clone())
            .produce(&step())
            .await;

        assert_eq!(candidate.title, "Rain by The Beatles");
        assert_eq!(candidate.description, "");
        assert_eq!(search.queries.lock().unwrap()[0].0, SearchKind::Web);
        assert!(llm.prompts.lock().unwrap()[1].contains("Search Results:\n\n\nNow select"));
    }

    #[tokio::test]
    async fn test_unparsable_answer_yields_placeholders() {
        let search: Arc<dyn SearchProvider> = Arc::new(RecordingSearch::default());
        for (category, title) in [
            (ContentCategory::Video, "Unknown Video"),
            (ContentCategory::Music, "Unknown by Unknown"),
            (ContentCategory::History, "Unknown Story"),
        ] {
            let candidate = agent(category, Arc::new(MockLLMProvider), search.clone())
                .produce(&step())
                .await;
            assert_eq!(candidate.category, category);
            assert_eq!(candidate.title, title);
            assert!(candidate.url.is_none());
        }
    }

    #[test]
    fn test_candidate_from_ignores_wrong_types() {
        let data = json!({"selected_video": {"title": 12, "url": ""}});
        let candidate = ContentCategory::Video.candidate_from(data.as_object().unwrap());
        assert_eq!(candidate.title, "Unknown Video");
        assert!(candidate.url.is_none());
    }

    #[tokio::test]
    async fn test_run_emits_in_order_and_stops() {
        let llm = Arc::new(ScriptedLLM::new(&[r#"{"selected_story": {"title": "Same"}}"#]));
        let producer = agent(ContentCategory::History, llm, Arc::new(RecordingSearch::default()));

        let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();
        for i in 0..3 {
            let mut s = step();
            s.id = RouteStep::id_for(i);
            in_tx.send(Signal::Data(s)).unwrap();
        }
        in_tx.send(Signal::Stop).unwrap();

        producer
            .run(in_rx, out_tx, Duration::from_millis(10), CancellationToken::new())
            .await;

        let mut ids = Vec::new();
        while let Some(Signal::Data(message)) = out_rx.recv().await {
            ids.push(message.step_id);
        }
        assert_eq!(ids, ["step_0", "step_1", "step_2"]);
    }

    #[tokio::test]
    async fn test_run_exits_on_cancel() {
        let producer = agent(
            ContentCategory::Video,
            Arc::new(MockLLMProvider),
            Arc::new(RecordingSearch::default()),
        );
        let (_in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, _out_rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(1),
            producer.run(in_rx, out_tx, Duration::from_millis(10), cancel),
        )
        .await
        .expect("producer should stop when cancelled");
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_step() {
        struct SlowLLM {
            started: AtomicUsize,
            finished: AtomicUsize,
        }

        #[async_trait]
        impl LLMProvider for SlowLLM {
            async fn generate(&self, _prompt: &str, _config: &LLMConfig) -> Result<String> {
                self.started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(300)).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                Ok(String::new())
            }
        }

        let llm = Arc::new(SlowLLM {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let producer = agent(ContentCategory::Music, llm.clone(), Arc::new(RecordingSearch::default()));
        let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();
        in_tx.send(Signal::Data(step())).unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn(producer.run(in_rx, out_tx, Duration::from_millis(10), cancel.clone()));
        while llm.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("producer should stop when cancelled")
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(llm.finished.load(Ordering::SeqCst), 0);
        assert!(out_rx.try_recv().is_err());
    }
}
