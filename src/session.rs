use crate::agents::AgentStore;
use crate::context::assemble_context;
use crate::error::AppError;
use crate::gemini::ContentGenerator;
use crate::models::{Agent, AnalysisStatus, FileNode, StatusResponse};
use crate::report::{build_word_document, convert_markdown_to_html, generate_report, report_file_name};
use crate::source::SourceFile;
use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

pub struct Report {
    pub markdown: String,
    /// Filled on the first download.
    pub html: Option<String>,
}

/// The single in-memory analysis session.
pub struct Session {
    pub agents: AgentStore,
    files: Vec<Arc<dyn SourceFile>>,
    tree: Option<FileNode>,
    listing: Option<String>,
    report: Option<Report>,
    progress: String,
    status: AnalysisStatus,
    last_error: Option<String>,
}

/// What an analysis needs once the session lock is released.
pub struct AnalysisJob {
    pub files: Vec<Arc<dyn SourceFile>>,
    pub agent: Agent,
}

impl Session {
    pub fn new(agents: AgentStore) -> Self {
        Session {
            agents,
            files: Vec::new(),
            tree: None,
            listing: None,
            report: None,
            progress: String::new(),
            status: AnalysisStatus::Idle,
            last_error: None,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn files(&self) -> &[Arc<dyn SourceFile>] {
        &self.files
    }

    pub fn tree(&self) -> Option<&FileNode> {
        self.tree.as_ref()
    }

    pub fn listing(&self) -> Option<&str> {
        self.listing.as_deref()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn progress(&self) -> &str {
        &self.progress
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.status.is_running() {
            return Err(AppError::Precondition(
                "An analysis is already in progress.".to_string(),
            ));
        }
        Ok(())
    }

    /// Replaces the current upload; the previous tree and report go with it.
    pub fn set_files(&mut self, files: Vec<Arc<dyn SourceFile>>) -> Result<usize, AppError> {
        self.ensure_idle()?;
        self.files = files;
        self.tree = None;
        self.listing = None;
        self.report = None;
        self.last_error = None;
        self.status = AnalysisStatus::Idle;
        Ok(self.files.len())
    }

    pub fn reset(&mut self) -> Result<(), AppError> {
        self.set_files(Vec::new()).map(|_| ())
    }

    pub fn begin_analysis(&mut self) -> Result<AnalysisJob, AppError> {
        self.ensure_idle()?;
        if self.files.is_empty() || self.agents.selected_id().is_none() {
            return Err(AppError::Precondition(
                "Please upload files and select an agent first.".to_string(),
            ));
        }
        let agent = self
            .agents
            .selected()
            .cloned()
            .ok_or_else(|| AppError::Precondition("The selected agent was not found.".to_string()))?;

        self.report = None;
        self.last_error = None;
        self.status = AnalysisStatus::Processing;
        self.progress = "Processing files and extracting content...".to_string();
        Ok(AnalysisJob {
            files: self.files.clone(),
            agent,
        })
    }

    pub fn set_progress(&mut self, message: String) {
        self.progress = message;
    }

    pub fn begin_generation(&mut self, tree: FileNode, listing: String) {
        self.tree = Some(tree);
        self.listing = Some(listing);
        self.status = AnalysisStatus::Generating;
        self.progress = "Generating the final report with the selected agent...".to_string();
    }

    pub fn finish_analysis(&mut self, markdown: String) {
        self.report = Some(Report {
            markdown,
            html: None,
        });
        self.status = AnalysisStatus::Success;
        self.progress.clear();
    }

    pub fn fail_analysis(&mut self, message: String) {
        self.last_error = Some(message);
        self.status = AnalysisStatus::Error;
        self.progress.clear();
    }

    pub fn cache_html(&mut self, html: String) {
        if let Some(report) = self.report.as_mut() {
            report.html = Some(html);
        }
    }

    /// Top-level folder name of the upload, used to name the exported file.
    pub fn subject(&self) -> Option<String> {
        let first = self.files.iter().map(|f| f.path()).min()?;
        first.split_once('/').map(|(top, _)| top.to_string())
    }
}

/// Marks the running analysis as failed if it is dropped before finishing,
/// so an abandoned request does not leave the session busy.
struct RunningAnalysis<'a> {
    session: &'a Mutex<Session>,
    done: bool,
}

impl RunningAnalysis<'_> {
    fn finish(mut self, markdown: String) {
        self.session.lock().finish_analysis(markdown);
        self.done = true;
    }

    fn fail(mut self, message: String) {
        self.session.lock().fail_analysis(message);
        self.done = true;
    }
}

impl Drop for RunningAnalysis<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!("Analysis was interrupted before it finished.");
            self.session
                .lock()
                .fail_analysis("The analysis was interrupted before it finished.".to_string());
        }
    }
}

pub struct AppState {
    pub session: Mutex<Session>,
    pub generator: Option<Arc<dyn ContentGenerator>>,
    pub config_error: Option<String>,
}

impl AppState {
    pub fn new(generator: Option<Arc<dyn ContentGenerator>>, agents: AgentStore) -> Self {
        let config_error = match generator {
            Some(_) => None,
            None => Some(AppError::missing_api_key().to_string()),
        };
        AppState {
            session: Mutex::new(Session::new(agents)),
            generator,
            config_error,
        }
    }

    pub fn generator(&self) -> Result<Arc<dyn ContentGenerator>, AppError> {
        self.generator.clone().ok_or_else(AppError::missing_api_key)
    }

    pub fn status(&self) -> StatusResponse {
        let session = self.session.lock();
        StatusResponse {
            success: true,
            config_error: self.config_error.clone(),
            status: session.status(),
            progress: session.progress().to_string(),
            file_count: session.files().len(),
            has_report: session.report().is_some(),
            selected_agent_id: session.agents.selected_id().map(str::to_string),
            error: session.last_error.clone(),
        }
    }

    /// Assembles the context and generates the report. The session lock is
    /// only taken between awaits.
    pub async fn run_analysis(&self) -> Result<(FileNode, String), AppError> {
        let generator = self.generator()?;
        let job = self.session.lock().begin_analysis()?;
        let running = RunningAnalysis {
            session: &self.session,
            done: false,
        };
        info!(
            "Starting analysis of {} files with agent '{}'.",
            job.files.len(),
            job.agent.name
        );
        let start_time = Instant::now();

        let assembled = assemble_context(generator.as_ref(), &job.files, |index, total, name| {
            self.session
                .lock()
                .set_progress(format!("Processing file {}/{}: {}", index, total, name));
        })
        .await;

        self.session
            .lock()
            .begin_generation(assembled.tree.clone(), assembled.listing);

        match generate_report(generator.as_ref(), &job.agent.master_prompt, &assembled.context).await
        {
            Ok(markdown) => {
                running.finish(markdown.clone());
                info!("Analysis finished in {:.2?}.", start_time.elapsed());
                Ok((assembled.tree, markdown))
            }
            Err(e) => {
                error!("Analysis failed after {:.2?}: {}", start_time.elapsed(), e);
                running.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Returns `(file name, document)` for the current report, converting it
    /// to HTML on first use.
    pub async fn export_report(&self) -> Result<(String, String), AppError> {
        let generator = self.generator()?;
        let (markdown, cached, subject) = {
            let session = self.session.lock();
            let report = session
                .report()
                .ok_or_else(|| AppError::Precondition("There is no report to download.".to_string()))?;
            (report.markdown.clone(), report.html.clone(), session.subject())
        };

        let html = match cached {
            Some(html) => html,
            None => {
                let html = convert_markdown_to_html(generator.as_ref(), &markdown).await?;
                self.session.lock().cache_html(html.clone());
                html
            }
        };

        Ok((report_file_name(subject.as_deref()), build_word_document(&html)))
    }
}
