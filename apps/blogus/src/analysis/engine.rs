//! Operation orchestrators, one method per public operation.
//!
//! Flow: resolve goal (inferring it with the judge when absent) →
//!       build meta-prompt → call judge → parse & validate → build record.
//!
//! `execute_prompt` is the exception: the user's prompt goes to the target
//! model verbatim and the raw text comes back unparsed.

use futures::future::join_all;
use tracing::{debug, info};

use crate::analysis::parser::{self, ScorePolicy};
use crate::analysis::prompts::{build_meta_prompt, extract_placeholders, OperationKind};
use crate::analysis::records::{fragment_coverage, Fragment, Log, PromptAnalysis, ResolvedGoal, Test};
use crate::errors::AnalysisError;
use crate::llm_client::registry::{JudgeModel, ModelId, TargetModel};
use crate::llm_client::LlmClient;

const EXECUTION_LABEL: &str = "prompt execution";

/// Below this share of prompt words found in the fragments, the split is logged as suspect.
const MIN_FRAGMENT_COVERAGE: f64 = 0.5;

/// Stateless entry point for every analysis operation. Cheap to clone and
/// safe to share across tasks.
#[derive(Clone)]
pub struct Analyzer {
    llm: LlmClient,
    policy: ScorePolicy,
}

impl Analyzer {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            policy: ScorePolicy::default(),
        }
    }

    pub fn with_score_policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn score_policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn max_tokens(&self) -> u32 {
        self.llm.max_tokens()
    }

    /// Asks the judge for the most likely goal of `prompt`.
    pub async fn infer_goal(&self, prompt: &str, judge: &JudgeModel) -> Result<String, AnalysisError> {
        let meta_prompt = build_meta_prompt(OperationKind::GoalInference, prompt, None);
        let raw = self
            .invoke(judge.id(), OperationKind::GoalInference.label(), &meta_prompt)
            .await?;
        let goal = parser::parse_goal(&raw)?;
        info!("Inferred goal with {}: {}", judge, goal);
        Ok(goal)
    }

    /// Uses the caller's goal when it has content, otherwise infers one.
    pub async fn resolve_goal(
        &self,
        prompt: &str,
        judge: &JudgeModel,
        goal: Option<&str>,
    ) -> Result<ResolvedGoal, AnalysisError> {
        match goal.map(str::trim).filter(|g| !g.is_empty()) {
            Some(text) => Ok(ResolvedGoal {
                text: text.to_string(),
                inferred: false,
            }),
            None => Ok(ResolvedGoal {
                text: self.infer_goal(prompt, judge).await?,
                inferred: true,
            }),
        }
    }

    pub async fn analyze_prompt(
        &self,
        prompt: &str,
        judge: &JudgeModel,
        goal: Option<&str>,
    ) -> Result<PromptAnalysis, AnalysisError> {
        let goal = self.resolve_goal(prompt, judge, goal).await?;
        let raw = self.judge(OperationKind::Analysis, prompt, judge, &goal).await?;
        let draft = parser::parse_analysis(&raw, self.policy)?;
        let analysis = PromptAnalysis::build(draft, &goal);
        info!(
            "Prompt analysis: alignment={}/10 effectiveness={}/10 improvements={}",
            analysis.overall_goal_alignment,
            analysis.estimated_effectiveness,
            analysis.suggested_improvements.len()
        );
        Ok(analysis)
    }

    pub async fn analyze_fragments(
        &self,
        prompt: &str,
        judge: &JudgeModel,
        goal: Option<&str>,
    ) -> Result<Vec<Fragment>, AnalysisError> {
        let goal = self.resolve_goal(prompt, judge, goal).await?;
        let raw = self.judge(OperationKind::Fragments, prompt, judge, &goal).await?;
        let fragments: Vec<Fragment> = parser::parse_fragments(&raw, self.policy)?
            .into_iter()
            .map(Fragment::from)
            .collect();

        if fragment_coverage(prompt, &fragments) < MIN_FRAGMENT_COVERAGE {
            debug!(
                "{} fragments cover less than half of the prompt's words",
                fragments.len()
            );
        }
        info!("Fragment analysis returned {} fragments", fragments.len());
        Ok(fragments)
    }

    pub async fn analyze_logs(
        &self,
        prompt: &str,
        judge: &JudgeModel,
        goal: Option<&str>,
    ) -> Result<Vec<Log>, AnalysisError> {
        let goal = self.resolve_goal(prompt, judge, goal).await?;
        let raw = self.judge(OperationKind::Logs, prompt, judge, &goal).await?;
        let logs: Vec<Log> = parser::parse_logs(&raw)?
            .into_iter()
            .map(Log::from)
            .collect();
        info!("Log analysis returned {} logs", logs.len());
        Ok(logs)
    }

    pub async fn generate_test(
        &self,
        prompt: &str,
        judge: &JudgeModel,
        goal: Option<&str>,
    ) -> Result<Test, AnalysisError> {
        let goal = self.resolve_goal(prompt, judge, goal).await?;
        let raw = self
            .judge(OperationKind::TestGeneration, prompt, judge, &goal)
            .await?;
        let draft = parser::parse_test(&raw, self.policy)?;
        let test = Test::build(draft, &extract_placeholders(prompt), &raw)?;
        info!(
            "Generated test with {} input(s), relevance={}/5",
            test.input.len(),
            test.goal_relevance
        );
        Ok(test)
    }

    /// Runs `prompt` on the target model and returns its answer untouched.
    pub async fn execute_prompt(&self, prompt: &str, target: &TargetModel) -> Result<String, AnalysisError> {
        info!("Executing prompt on target model {}", target);
        self.invoke(target.id(), EXECUTION_LABEL, prompt).await
    }

    /// Executes one prompt on several target models concurrently. Results
    /// come back in the order of `targets`; one model failing does not
    /// affect the others.
    pub async fn compare_targets(
        &self,
        prompt: &str,
        targets: &[TargetModel],
    ) -> Vec<(TargetModel, Result<String, AnalysisError>)> {
        let runs = targets.iter().map(|target| async move {
            (*target, self.execute_prompt(prompt, target).await)
        });
        join_all(runs).await
    }

    async fn judge(
        &self,
        kind: OperationKind,
        prompt: &str,
        judge: &JudgeModel,
        goal: &ResolvedGoal,
    ) -> Result<String, AnalysisError> {
        let meta_prompt = build_meta_prompt(kind, prompt, Some(goal));
        self.invoke(judge.id(), kind.label(), &meta_prompt).await
    }

    async fn invoke(&self, model: ModelId, operation: &'static str, text: &str) -> Result<String, AnalysisError> {
        self.llm
            .call(model, text)
            .await
            .map_err(|source| AnalysisError::ModelInvocation {
                model,
                operation,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::records::{FragmentType, LogLevel};
    use crate::llm_client::mock::MockTransport;
    use crate::llm_client::LlmError;

    const SAMPLE_PROMPT: &str = "You are an AI assistant that helps people find information.";
    const SAMPLE_GOAL: &str = "Help users find information";
    const ANALYSIS_JSON: &str = r#"{"overall_goal_alignment":6,"suggested_improvements":["Add examples"],"estimated_effectiveness":5}"#;

    fn analyzer(mock: &Arc<MockTransport>) -> Analyzer {
        Analyzer::new(LlmClient::new(mock.clone()))
    }

    fn gpt4o() -> JudgeModel {
        JudgeModel::parse("gpt-4o").unwrap()
    }

    #[tokio::test]
    async fn test_analyze_prompt_without_goal_infers_it_first() {
        let mock = Arc::new(
            MockTransport::new()
                .respond(r#"{"goal": "Be a helpful general assistant"}"#)
                .respond(ANALYSIS_JSON),
        );

        let analysis = analyzer(&mock)
            .analyze_prompt("You are a helpful assistant.", &gpt4o(), None)
            .await
            .unwrap();

        assert_eq!(analysis.overall_goal_alignment, 6);
        assert_eq!(analysis.estimated_effectiveness, 5);
        assert_eq!(analysis.suggested_improvements, vec!["Add examples".to_string()]);
        assert!(analysis.is_goal_inferred);
        assert_eq!(
            analysis.inferred_goal.as_deref(),
            Some("Be a helpful general assistant")
        );

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].prompt.contains("infer the likely goal"));
        assert!(calls[1].prompt.contains("Inferred Goal: Be a helpful general assistant"));
        assert!(calls.iter().all(|c| c.model == ModelId::Gpt4o));
    }

    #[tokio::test]
    async fn test_analyze_prompt_with_goal_skips_inference() {
        let mock = Arc::new(MockTransport::new().respond(ANALYSIS_JSON));

        let analysis = analyzer(&mock)
            .analyze_prompt(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap();

        assert!(!analysis.is_goal_inferred);
        assert_eq!(analysis.inferred_goal, None);
        assert_eq!(mock.calls().len(), 1);
        assert!(mock.calls()[0].prompt.contains("Provided Goal: Help users find information"));
    }

    #[tokio::test]
    async fn test_blank_goal_counts_as_absent() {
        let mock = Arc::new(
            MockTransport::new()
                .respond("Help users find information")
                .respond(ANALYSIS_JSON),
        );

        let analysis = analyzer(&mock)
            .analyze_prompt(SAMPLE_PROMPT, &gpt4o(), Some("   "))
            .await
            .unwrap();

        assert!(analysis.is_goal_inferred);
        assert_eq!(analysis.inferred_goal.as_deref(), Some(SAMPLE_GOAL));
    }

    #[tokio::test]
    async fn test_scores_stay_in_range() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"{"overall_goal_alignment": 12, "suggested_improvements": [], "estimated_effectiveness": -1}"#,
        ));

        let analysis = analyzer(&mock)
            .analyze_prompt(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap();

        assert!((1..=10).contains(&analysis.overall_goal_alignment));
        assert!((1..=10).contains(&analysis.estimated_effectiveness));
    }

    #[tokio::test]
    async fn test_reject_policy_surfaces_out_of_range_score() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"{"overall_goal_alignment": 12, "suggested_improvements": [], "estimated_effectiveness": 5}"#,
        ));

        let err = analyzer(&mock)
            .with_score_policy(ScorePolicy::Reject)
            .analyze_prompt(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("overall_goal_alignment"));
    }

    #[tokio::test]
    async fn test_analyze_fragments_clamps_alignment() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"Here you go:
```json
{"fragments": [{"text": "You are an AI assistant", "type": "context", "goal_alignment": 7, "improvement_suggestion": "Name the domain"}]}
```"#,
        ));

        let fragments = analyzer(&mock)
            .analyze_fragments(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].goal_alignment, 5);
        assert_eq!(fragments[0].fragment_type, FragmentType::Context);
    }

    #[tokio::test]
    async fn test_analyze_fragments_missing_field_returns_no_partial_list() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"[
                {"text": "a", "type": "instruction", "goal_alignment": 4, "improvement_suggestion": "x"},
                {"text": "b", "type": "constraint", "goal_alignment": 3}
            ]"#,
        ));

        let err = analyzer(&mock)
            .analyze_fragments(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap_err();

        match err {
            AnalysisError::ResponseFormat { field, raw, .. } => {
                assert!(field.ends_with("improvement_suggestion"));
                assert!(raw.contains("\"constraint\""));
            }
            other => panic!("expected ResponseFormat, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_fragments_without_goal_calls_inference() {
        let mock = Arc::new(
            MockTransport::new()
                .respond(r#"{"goal": "Help users find information"}"#)
                .respond("[]"),
        );

        let fragments = analyzer(&mock)
            .analyze_fragments(SAMPLE_PROMPT, &gpt4o(), None)
            .await
            .unwrap();

        assert!(fragments.is_empty());
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_logs() {
        let mock = Arc::new(
            MockTransport::new().respond(r#"{"logs": [{"type": "info", "message": "Test log message"}]}"#),
        );

        let logs = analyzer(&mock)
            .analyze_logs(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].message, "Test log message");
    }

    #[tokio::test]
    async fn test_generate_test_for_parameterized_prompt() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"{"input": {"text": "Good morning", "tone": "formal"}, "expected_output": "Bonjour", "goal_relevance": 5}"#,
        ));

        let test = analyzer(&mock)
            .generate_test(
                "Translate the following English text to French: {text}",
                &gpt4o(),
                Some("Translate English to French"),
            )
            .await
            .unwrap();

        assert_eq!(test.input.len(), 1);
        assert_eq!(test.input["text"], "Good morning");
        assert_eq!(test.expected_output, "Bonjour");
        assert!(mock.calls()[0].prompt.contains("Variables found in the prompt: text"));
    }

    #[tokio::test]
    async fn test_generate_test_ignores_inline_json_in_prompt() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"{"input": {"text": "I loved it"}, "expected_output": "{\"label\": \"pos\"}", "goal_relevance": 4}"#,
        ));

        let test = analyzer(&mock)
            .generate_test(
                r#"Classify {text}. Reply as {"label": "pos"}."#,
                &gpt4o(),
                Some("Sentiment labels"),
            )
            .await
            .unwrap();

        assert_eq!(test.input.keys().collect::<Vec<_>>(), vec!["text"]);
        assert!(mock.calls()[0].prompt.contains("Variables found in the prompt: text\n"));
    }

    #[tokio::test]
    async fn test_generate_test_without_placeholders_has_empty_input() {
        let mock = Arc::new(MockTransport::new().respond(
            r#"{"input": {"question": "What is AI?"}, "expected_output": "AI is artificial intelligence", "goal_relevance": 5}"#,
        ));

        let test = analyzer(&mock)
            .generate_test(SAMPLE_PROMPT, &gpt4o(), Some(SAMPLE_GOAL))
            .await
            .unwrap();

        assert!(test.input.is_empty());
        assert_eq!(test.goal_relevance, 5);
    }

    #[tokio::test]
    async fn test_execute_prompt_returns_raw_text_verbatim() {
        let mock = Arc::new(MockTransport::new().respond("X is ..."));
        let target = TargetModel::parse("gpt-4o").unwrap();

        let result = analyzer(&mock).execute_prompt("Explain X.", &target).await.unwrap();

        assert_eq!(result, "X is ...");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "Explain X.");
    }

    #[tokio::test]
    async fn test_execute_prompt_does_not_parse_json_looking_output() {
        let raw = "```json\n{\"a\": 1}\n```";
        let mock = Arc::new(MockTransport::new().respond(raw));
        let target = TargetModel::default();

        let result = analyzer(&mock).execute_prompt("Give JSON", &target).await.unwrap();

        assert_eq!(result, raw);
    }

    #[tokio::test]
    async fn test_transport_failure_is_model_invocation_error() {
        let mock = Arc::new(MockTransport::new().fail(500, "provider down"));
        let judge = JudgeModel::new(ModelId::Claude3Opus);

        let err = analyzer(&mock)
            .analyze_logs(SAMPLE_PROMPT, &judge, Some(SAMPLE_GOAL))
            .await
            .unwrap_err();

        match err {
            AnalysisError::ModelInvocation {
                model,
                operation,
                source,
            } => {
                assert_eq!(model, ModelId::Claude3Opus);
                assert_eq!(operation, "log analysis");
                assert!(matches!(source, LlmError::Api { status: 500, .. }));
            }
            other => panic!("expected ModelInvocation, got {other:?}"),
        }
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_goal_inference_failure_aborts_before_main_call() {
        let mock = Arc::new(MockTransport::new().respond("   ").respond(ANALYSIS_JSON));

        let err = analyzer(&mock)
            .analyze_prompt(SAMPLE_PROMPT, &gpt4o(), None)
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("goal"));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_targets_keeps_order_and_isolates_failures() {
        let mock = Arc::new(MockTransport::new().respond("first").fail(429, "slow down"));
        let targets = [
            TargetModel::new(ModelId::Gpt35Turbo),
            TargetModel::new(ModelId::Claude3Haiku),
        ];

        let results = analyzer(&mock).compare_targets("Explain photosynthesis.", &targets).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, targets[0]);
        assert_eq!(results[1].0, targets[1]);
        assert_eq!(results.iter().filter(|(_, r)| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 1);
    }
}
