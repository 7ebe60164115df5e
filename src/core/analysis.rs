use crate::config::{ModelConfig, StageConfig, StageKind};
use crate::core::poll::{EventSender, PipelineEvent, emit};
use crate::error::{Error, Result};
use async_openai::{
    self,
    types::responses::{
        CreateResponseArgs, EasyInputMessageArgs, InputItem, InputParam, OutputItem,
        OutputMessageContent, Role,
    },
};
use std::env;
use std::future::Future;
use std::path::PathBuf;

const OPENAI_OPT_IN_ENV: &str = "VIDTREND_ALLOW_OPENAI";
const FILE_PATHS_PLACEHOLDER: &str = "{file_paths}";
const MAX_TRANSCRIPT_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

pub trait LanguageModel {
    fn complete(&self, request: CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct OpenAiModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiModel {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: async_openai::Client::new(),
            model: config.name.clone(),
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        enforce_openai_opt_in()?;

        let request = CreateResponseArgs::default()
            .max_output_tokens(self.max_output_tokens)
            .model(self.model.as_str())
            .input(InputParam::Items(vec![
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::System)
                        .content(request.system)
                        .build()?,
                ),
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::User)
                        .content(request.user)
                        .build()?,
                ),
            ]))
            .build()?;

        let response = self.client.responses().create(request).await?;

        let mut content = String::new();
        for output in response.output {
            if let OutputItem::Message(out) = output {
                for c in out.content {
                    match c {
                        OutputMessageContent::OutputText(text) => content.push_str(&text.text),
                        other => tracing::warn!("unexpected content type: {other:?}"),
                    }
                }
            }
        }

        Ok(content)
    }
}

fn enforce_openai_opt_in() -> Result<()> {
    match env::var(OPENAI_OPT_IN_ENV) {
        Ok(val)
            if matches!(
                val.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ) =>
        {
            Ok(())
        }
        _ => Err(opt_in_error()),
    }
}

fn opt_in_error() -> Error {
    Error::Analysis(format!(
        "Trend analysis requires explicit opt-in. \
         Set {OPENAI_OPT_IN_ENV}=1 to enable uploads to OpenAI."
    ))
}

/// What a stage consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum StageInput {
    TranscriptFiles(Vec<PathBuf>),
    PriorReport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub stage: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Stage {
    config: StageConfig,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> StageKind {
        self.config.kind
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {}.\n{}\n\nYour goal: {}",
            self.config.role.trim(),
            self.config.backstory.trim(),
            self.config.goal.trim()
        )
    }

    async fn user_prompt(&self, input: &StageInput) -> Result<String> {
        let mut prompt = String::new();

        match input {
            StageInput::TranscriptFiles(paths) => {
                let joined = join_paths(paths);
                prompt.push_str(&self.config.description.replace(FILE_PATHS_PLACEHOLDER, &joined));
                prompt.push_str("\n\n### Transcript files\n");
                for path in paths {
                    let content = tokio::fs::read_to_string(path).await?;
                    prompt.push_str(&format!(
                        "\n<FILE path=\"{}\">\n{}\n</FILE>\n",
                        path.display(),
                        truncate_chars(&content, MAX_TRANSCRIPT_CHARS)
                    ));
                }
            }
            StageInput::PriorReport(text) => {
                prompt.push_str(&self.config.description.replace(FILE_PATHS_PLACEHOLDER, ""));
                prompt.push_str("\n\n### Previous analysis\n");
                prompt.push_str(text);
                prompt.push('\n');
            }
        }

        prompt.push_str("\n### Expected output\n");
        prompt.push_str(self.config.expected_output.trim());
        prompt.push('\n');
        Ok(prompt)
    }
}

/// The transcript paths as the single ", "-joined string handed to analysis.
pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ordered analysis stages; each one feeds the next.
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    stages: Vec<Stage>,
}

impl AnalysisPipeline {
    pub fn new(stages: &[StageConfig]) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::configuration("no analysis stages are defined"));
        }
        Ok(Self {
            stages: stages
                .iter()
                .cloned()
                .map(|config| Stage { config })
                .collect(),
        })
    }

    pub async fn run<M: LanguageModel>(
        &self,
        model: &M,
        transcript_files: &[PathBuf],
        events: Option<&EventSender>,
    ) -> Result<Vec<StageOutput>> {
        if transcript_files.is_empty() {
            return Err(Error::Analysis("there are no transcripts to analyze".to_string()));
        }

        let mut outputs: Vec<StageOutput> = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let input = match (stage.kind(), outputs.last()) {
                (StageKind::Synthesis, Some(previous)) => {
                    StageInput::PriorReport(previous.text.clone())
                }
                (StageKind::Synthesis, None) => {
                    return Err(Error::Analysis(format!(
                        "stage '{}' has no previous output to work from",
                        stage.name()
                    )));
                }
                (StageKind::TranscriptAnalysis, _) => {
                    StageInput::TranscriptFiles(transcript_files.to_vec())
                }
            };

            emit(events, PipelineEvent::Log(format!("Running stage '{}'...", stage.name())));
            tracing::info!(stage = stage.name(), "running analysis stage");

            let request = CompletionRequest {
                system: stage.system_prompt(),
                user: stage.user_prompt(&input).await?,
            };
            let text = model.complete(request).await.map_err(|e| match e {
                Error::Analysis(_) => e,
                other => Error::Analysis(format!("stage '{}' failed: {other}", stage.name())),
            })?;

            outputs.push(StageOutput {
                stage: stage.name().to_string(),
                text,
            });
        }

        Ok(outputs)
    }

    /// Runs every stage and returns the last stage's text as the report.
    pub async fn report<M: LanguageModel>(
        &self,
        model: &M,
        transcript_files: &[PathBuf],
        events: Option<&EventSender>,
    ) -> Result<String> {
        let outputs = self.run(model, transcript_files, events).await?;
        outputs
            .into_iter()
            .last()
            .map(|output| output.text)
            .ok_or_else(|| Error::Analysis("the pipeline produced no output".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CompletionRequest, LanguageModel};
    use crate::error::{Error, Result};
    use std::sync::{Arc, Mutex};

    /// Records every request and answers with `report #<n>`.
    #[derive(Clone, Default)]
    pub struct EchoModel {
        pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
        pub fail: bool,
    }

    impl LanguageModel for EchoModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            if self.fail {
                return Err(Error::custom("model unavailable"));
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            Ok(format!("report #{}", requests.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::EchoModel;
    use super::*;

    fn stage(name: &str, kind: StageKind) -> StageConfig {
        StageConfig {
            name: name.to_string(),
            kind,
            role: "Trend Analyst".to_string(),
            goal: "Spot trends".to_string(),
            backstory: "Has watched every video".to_string(),
            description: "Analyze the transcripts in {file_paths}.".to_string(),
            expected_output: "A markdown list".to_string(),
        }
    }

    #[test]
    fn joins_paths_with_comma_space() {
        let paths = vec![PathBuf::from("transcripts/a.txt"), PathBuf::from("transcripts/b.txt")];
        assert_eq!(join_paths(&paths), "transcripts/a.txt, transcripts/b.txt");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[tokio::test]
    async fn stages_feed_each_other_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.txt");
        std::fs::write(&file, "(0-1): hello world\n").unwrap();

        let pipeline = AnalysisPipeline::new(&[
            stage("analysis", StageKind::TranscriptAnalysis),
            stage("synthesis", StageKind::Synthesis),
        ])
        .unwrap();
        let model = EchoModel::default();

        let report = pipeline.report(&model, &[file.clone()], None).await.unwrap();
        assert_eq!(report, "report #2");

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].system.starts_with("You are Trend Analyst."));
        let expected = format!("Analyze the transcripts in {}.", file.display());
        assert!(requests[0].user.contains(&expected));
        assert!(requests[0].user.contains("(0-1): hello world"));
        assert!(requests[1].user.contains("### Previous analysis\nreport #1"));
        assert!(!requests[1].user.contains("hello world"));
    }

    #[tokio::test]
    async fn model_errors_become_analysis_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.txt");
        std::fs::write(&file, "x").unwrap();

        let pipeline =
            AnalysisPipeline::new(&[stage("analysis", StageKind::TranscriptAnalysis)]).unwrap();
        let model = EchoModel {
            fail: true,
            ..EchoModel::default()
        };

        let err = pipeline.report(&model, &[file], None).await.unwrap_err();
        assert!(matches!(err, Error::Analysis(ref msg) if msg.contains("stage 'analysis' failed")));
    }

    #[tokio::test]
    async fn no_transcripts_is_an_error() {
        let pipeline =
            AnalysisPipeline::new(&[stage("analysis", StageKind::TranscriptAnalysis)]).unwrap();
        assert!(pipeline.report(&EchoModel::default(), &[], None).await.is_err());
    }

    #[tokio::test]
    async fn synthesis_without_prior_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.txt");
        std::fs::write(&file, "x").unwrap();

        let pipeline = AnalysisPipeline::new(&[stage("summary", StageKind::Synthesis)]).unwrap();
        let err = pipeline.report(&EchoModel::default(), &[file], None).await.unwrap_err();
        assert!(err.to_string().contains("no previous output"));
    }

    #[test]
    fn opt_in_error_names_the_variable() {
        assert!(opt_in_error().to_string().contains(OPENAI_OPT_IN_ENV));
    }
}
