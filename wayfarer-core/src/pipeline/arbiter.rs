//! Arbiter: buffers candidates per step and judges complete sets

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::llm::{generate_text, LLMConfig, LLMProvider};
use crate::model::{ContentCandidate, ContentCategory, SelectedContent};
use crate::parsing::{parse_object_lenient, str_field};
use crate::prompts::{PromptTemplate, PromptTemplates, JUDGE_TEMPLATE};

use super::events::EventEmitter;
use super::{poll_next, CandidateMessage, Polled, Signal};

/// Stand-ins for the step context the arbiter never receives
const JUDGE_LOCATION: &str = "Current Step Location";
const JUDGE_INSTRUCTION: &str = "Follow route instructions";

/// One candidate per category, ready to judge
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub video: ContentCandidate,
    pub music: ContentCandidate,
    pub history: ContentCandidate,
}

impl CandidateSet {
    /// Take a complete set out of a partial mapping, or `None` if a category is missing.
    fn take(partial: &mut HashMap<ContentCategory, ContentCandidate>) -> Option<Self> {
        if !ContentCategory::ALL.iter().all(|c| partial.contains_key(c)) {
            return None;
        }
        Some(Self {
            video: partial.remove(&ContentCategory::Video)?,
            music: partial.remove(&ContentCategory::Music)?,
            history: partial.remove(&ContentCategory::History)?,
        })
    }

    pub fn get(&self, category: ContentCategory) -> &ContentCandidate {
        match category {
            ContentCategory::Video => &self.video,
            ContentCategory::Music => &self.music,
            ContentCategory::History => &self.history,
        }
    }
}

/// Judges each step once all three categories have reported.
pub struct Arbiter {
    llm: Arc<dyn LLMProvider>,
    template: PromptTemplate,
    llm_config: LLMConfig,
    events: EventEmitter,
    buffer: HashMap<String, HashMap<ContentCategory, ContentCandidate>>,
    judged: HashSet<String>,
}

impl Arbiter {
    pub fn new(llm: Arc<dyn LLMProvider>, templates: &PromptTemplates, llm_config: LLMConfig) -> Self {
        Self {
            llm,
            template: templates.get(JUDGE_TEMPLATE),
            llm_config,
            events: EventEmitter::disabled(),
            buffer: HashMap::new(),
            judged: HashSet::new(),
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Buffer a candidate. Returns the selection when this completes its step.
    ///
    /// A repeated category for a step replaces the earlier candidate.
    /// Candidates for a step that was already judged are dropped.
    pub async fn accept(&mut self, message: CandidateMessage) -> Option<SelectedContent> {
        let CandidateMessage { step_id, candidate } = message;
        let category = candidate.category;

        if self.judged.contains(&step_id) {
            tracing::warn!(step_id = %step_id, %category, "Dropping candidate for already judged step");
            return None;
        }

        let partial = self.buffer.entry(step_id.clone()).or_default();
        partial.insert(category, candidate);
        tracing::info!(step_id = %step_id, %category, "Arbiter received candidate ({}/3)", partial.len());

        let set = CandidateSet::take(partial)?;
        self.buffer.remove(&step_id);
        let selection = self.judge(&step_id, &set).await;
        self.judged.insert(step_id);
        Some(selection)
    }

    /// Ask the model to pick one candidate. Anything unusable selects video.
    pub async fn judge(&self, step_id: &str, set: &CandidateSet) -> SelectedContent {
        let slot = |c: &ContentCandidate| format!("{}: {}", c.title, c.description);
        let (video, music, history) = (slot(&set.video), slot(&set.music), slot(&set.history));

        let prompt = self.template.render(&[
            ("location", JUDGE_LOCATION),
            ("instruction", JUDGE_INSTRUCTION),
            ("video_candidate", video.as_str()),
            ("music_candidate", music.as_str()),
            ("history_candidate", history.as_str()),
        ]);

        let response = generate_text(self.llm.as_ref(), &prompt, &self.llm_config).await;
        let data = serde_json::Value::Object(parse_object_lenient(&response));

        let raw = str_field(Some(&data), "selected_type", ContentCategory::Video.as_str());
        let selected = ContentCategory::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(step_id, selected_type = %raw, "Invalid selection from judge; falling back to video");
            ContentCategory::Video
        });
        let reasoning = str_field(Some(&data), "reasoning", "");

        tracing::info!(step_id, %selected, "Step judged");
        self.events.step_judged(step_id, selected, &reasoning);

        SelectedContent {
            step_id: step_id.to_string(),
            chosen_candidate: set.get(selected).clone(),
            judge_reasoning: reasoning,
        }
    }

    /// Steps still collecting candidates, sorted by id
    pub fn pending(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.buffer.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Consume candidates until a stop marker, a closed channel or cancellation.
    pub async fn run(
        mut self,
        mut rx: UnboundedReceiver<Signal<CandidateMessage>>,
        tx: UnboundedSender<Signal<SelectedContent>>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        tracing::info!("Arbiter started");

        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Arbiter cancelled");
                break;
            }

            let message = match poll_next(&mut rx, poll_interval).await {
                Polled::Idle => continue,
                Polled::Closed | Polled::Item(Signal::Stop) => break,
                Polled::Item(Signal::Data(message)) => message,
            };

            if let Some(selection) = self.accept(message).await {
                if tx.send(Signal::Data(selection)).is_err() {
                    tracing::warn!("Collector channel closed");
                    break;
                }
            }
        }

        let stranded = self.pending();
        if !stranded.is_empty() {
            for id in &stranded {
                let have = self.buffer.get(id).map_or(0, HashMap::len);
                tracing::warn!(step_id = %id, have, "Step never received all candidates");
            }
            self.events.stranded_steps(stranded);
        }

        tracing::info!("Arbiter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedJudge {
        answer: String,
        calls: AtomicUsize,
    }

    impl FixedJudge {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for FixedJudge {
        async fn generate(&self, _prompt: &str, _config: &LLMConfig) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    fn message(step_id: &str, category: ContentCategory) -> CandidateMessage {
        CandidateMessage {
            step_id: step_id.to_string(),
            candidate: ContentCandidate {
                category,
                title: format!("{} title", category),
                description: format!("{} description", category),
                url: None,
                reasoning: String::new(),
            },
        }
    }

    fn arbiter(llm: Arc<dyn LLMProvider>) -> Arbiter {
        Arbiter::new(llm, &PromptTemplates::builtin(), LLMConfig::default())
    }

    #[tokio::test]
    async fn test_judges_exactly_on_third_category() {
        let llm = FixedJudge::new(r#"{"selected_type": "music", "reasoning": "Upbeat"}"#);
        let mut arbiter = arbiter(llm.clone());

        assert!(arbiter.accept(message("step_0", ContentCategory::History)).await.is_none());
        assert!(arbiter.accept(message("step_0", ContentCategory::Video)).await.is_none());
        assert_eq!(arbiter.pending(), ["step_0"]);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);

        let selection = arbiter
            .accept(message("step_0", ContentCategory::Music))
            .await
            .unwrap();
        assert_eq!(selection.step_id, "step_0");
        assert_eq!(selection.chosen_candidate.category, ContentCategory::Music);
        assert_eq!(selection.chosen_candidate.title, "music title");
        assert_eq!(selection.judge_reasoning, "Upbeat");
        assert!(arbiter.pending().is_empty());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_category_overwrites() {
        let llm = FixedJudge::new(r#"{"selected_type": "video"}"#);
        let mut arbiter = arbiter(llm);

        let mut first = message("step_1", ContentCategory::Video);
        first.candidate.title = "first".to_string();
        assert!(arbiter.accept(first).await.is_none());
        let mut second = message("step_1", ContentCategory::Video);
        second.candidate.title = "second".to_string();
        assert!(arbiter.accept(second).await.is_none());
        assert!(arbiter.accept(message("step_1", ContentCategory::Music)).await.is_none());

        let selection = arbiter
            .accept(message("step_1", ContentCategory::History))
            .await
            .unwrap();
        assert_eq!(selection.chosen_candidate.title, "second");
    }

    #[tokio::test]
    async fn test_invalid_selection_falls_back_to_video() {
        for answer in [
            r#"{"selected_type": "podcast", "reasoning": "x"}"#,
            r#"{"reasoning": "no type"}"#,
            "I like them all",
            r#"{"selected_type": 3}"#,
            r#"{"selected_type": " Music "}"#,
            r#"{"selected_type": "History"}"#,
        ] {
            let mut arbiter = arbiter(FixedJudge::new(answer));
            for category in [ContentCategory::Music, ContentCategory::History] {
                arbiter.accept(message("step_2", category)).await;
            }
            let selection = arbiter
                .accept(message("step_2", ContentCategory::Video))
                .await
                .unwrap();
            assert_eq!(selection.chosen_candidate.category, ContentCategory::Video, "{}", answer);
        }
    }

    #[tokio::test]
    async fn test_run_never_judges_step_twice() {
        let llm = FixedJudge::new(r#"{"selected_type": "history"}"#);
        let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();

        // A full second set for the same id arrives after the first judgement.
        for _ in 0..2 {
            for category in ContentCategory::ALL {
                in_tx.send(Signal::Data(message("step_0", category))).unwrap();
            }
        }
        in_tx.send(Signal::Stop).unwrap();

        let (events_tx, mut events_rx) = super::super::events::event_channel();
        arbiter(llm.clone())
            .with_events(EventEmitter::new(Some(events_tx)))
            .run(in_rx, out_tx, Duration::from_millis(10), CancellationToken::new())
            .await;

        let mut selections = Vec::new();
        while let Ok(Signal::Data(s)) = out_rx.try_recv() {
            selections.push(s);
        }
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].step_id, "step_0");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

        let mut judged = 0;
        while let Ok(event) = events_rx.try_recv() {
            match event {
                super::super::PipelineEvent::StepJudged { .. } => judged += 1,
                super::super::PipelineEvent::StrandedSteps { step_ids, .. } => {
                    panic!("unexpected stranded steps: {:?}", step_ids)
                }
                _ => {}
            }
        }
        assert_eq!(judged, 1);
    }

    #[tokio::test]
    async fn test_late_candidate_after_judgement_is_dropped() {
        let llm = FixedJudge::new(r#"{"selected_type": "video"}"#);
        let mut arbiter = arbiter(llm.clone());

        for category in ContentCategory::ALL {
            arbiter.accept(message("step_3", category)).await;
        }
        assert!(arbiter.accept(message("step_3", ContentCategory::Music)).await.is_none());
        assert!(arbiter.pending().is_empty());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_judge_prompt_uses_placeholders() {
        #[derive(Default)]
        struct RecordingJudge {
            prompt: std::sync::Mutex<String>,
        }

        #[async_trait]
        impl LLMProvider for RecordingJudge {
            async fn generate(&self, prompt: &str, _config: &LLMConfig) -> Result<String> {
                *self.prompt.lock().unwrap() = prompt.to_string();
                Ok(r#"{"selected_type": "history", "reasoning": "Old mill"}"#.to_string())
            }
        }

        let set = CandidateSet {
            video: message("s_0", ContentCategory::Video).candidate,
            music: message("s_0", ContentCategory::Music).candidate,
            history: message("s_0", ContentCategory::History).candidate,
        };
        let llm = Arc::new(RecordingJudge::default());
        let selection = arbiter(llm.clone()).judge("s_0", &set).await;
        assert_eq!(selection.chosen_candidate.category, ContentCategory::History);

        let prompt = llm.prompt.lock().unwrap().clone();
        assert!(prompt.contains(JUDGE_LOCATION));
        assert!(prompt.contains(JUDGE_INSTRUCTION));
        assert!(prompt.contains("video title: video description"));
        assert!(prompt.contains("history title: history description"));
        assert!(!prompt.contains("{{"));
    }
}
