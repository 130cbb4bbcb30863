use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{self, ResumeAnalysis};
use crate::models::{
    CredentialField, CredentialStore, LogEntry, LogKind, Platform, RunResults, SearchConfig,
};
use crate::runner::RunEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Config,
    Search,
    Results,
    Whatsapp,
    Resume,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Config, Tab::Search, Tab::Results, Tab::Whatsapp, Tab::Resume];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Config => "Config",
            Tab::Search => "Search",
            Tab::Results => "Results",
            Tab::Whatsapp => "WhatsApp",
            Tab::Resume => "Resume",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

/// One editable control on a form tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Credential(Platform, CredentialField),
    Location,
    SalaryMin,
    Modality,
    Platform(Platform),
    RequiresEnglish,
    RequiresDegree,
    ResumeFile,
}

impl Field {
    /// Text fields are edited by typing; the rest are toggled or cycled.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Field::Credential(..) | Field::Location | Field::SalaryMin | Field::ResumeFile
        )
    }

    pub fn label(self) -> String {
        match self {
            Field::Credential(p, CredentialField::Username) => format!("{} email/username", p),
            Field::Credential(p, CredentialField::Password) => format!("{} password", p),
            Field::Location => "Location".to_string(),
            Field::SalaryMin => "Minimum salary (R$)".to_string(),
            Field::Modality => "Modality".to_string(),
            Field::Platform(p) => p.label().to_string(),
            Field::RequiresEnglish => "Requires English".to_string(),
            Field::RequiresDegree => "Requires degree".to_string(),
            Field::ResumeFile => "Resume file (.txt/.pdf)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Stopped => "stopped",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Identity of one spawned sequence. Travels with the sequence so that
/// overlapping runs each finish under their own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

impl RunSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished run leaves behind for the history database.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub search: SearchConfig,
    pub results: RunResults,
}

/// All state behind the dashboard screen.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub active_tab: Tab,
    pub running: bool,
    pub progress: u8,
    pub logs: Vec<LogEntry>,
    pub credentials: CredentialStore,
    pub search: SearchConfig,
    pub results: RunResults,
    pub resume_path: String,
    pub resume: Option<ResumeAnalysis>,
    stopped: bool,
    failed: bool,
}

impl Dashboard {
    pub fn new(search: SearchConfig) -> Self {
        Self {
            search,
            ..Self::default()
        }
    }

    pub fn add_log(&mut self, kind: LogKind, message: impl Into<String>) {
        let entry = LogEntry::now(kind, message);
        debug!(kind = entry.kind.label(), message = %entry.message, "log");
        self.logs.push(entry);
    }

    pub fn set_credential(&mut self, platform: Platform, field: CredentialField, value: &str) {
        self.credentials.set(platform, field, value);
    }

    pub fn toggle_platform(&mut self, platform: Platform) {
        self.search.toggle_platform(platform);
    }

    // --- Form surface ---

    pub fn fields(tab: Tab) -> Vec<Field> {
        match tab {
            Tab::Config => Platform::ALL
                .into_iter()
                .flat_map(|p| {
                    [
                        Field::Credential(p, CredentialField::Username),
                        Field::Credential(p, CredentialField::Password),
                    ]
                })
                .collect(),
            Tab::Search => {
                let mut fields = vec![Field::Location, Field::SalaryMin, Field::Modality];
                fields.extend(Platform::ALL.into_iter().map(Field::Platform));
                fields.push(Field::RequiresEnglish);
                fields.push(Field::RequiresDegree);
                fields
            }
            Tab::Resume => vec![Field::ResumeFile],
            Tab::Results | Tab::Whatsapp => Vec::new(),
        }
    }

    /// Raw value of a field, passwords included.
    pub fn field_value(&self, field: Field) -> String {
        match field {
            Field::Credential(p, CredentialField::Username) => self.credentials.get(p).username.clone(),
            Field::Credential(p, CredentialField::Password) => self.credentials.get(p).password.clone(),
            Field::Location => self.search.location.clone(),
            Field::SalaryMin => self.search.salary_min.to_string(),
            Field::Modality => self.search.modality.label().to_string(),
            Field::Platform(p) => {
                if self.search.is_selected(p) { "[x]" } else { "[ ]" }.to_string()
            }
            Field::RequiresEnglish => self.search.requires_english.label().to_string(),
            Field::RequiresDegree => self.search.requires_degree.label().to_string(),
            Field::ResumeFile => self.resume_path.clone(),
        }
    }

    /// Commit typed text into a text field. Salary input that is not a
    /// whole number leaves the previous value in place.
    pub fn edit_field(&mut self, field: Field, text: &str) {
        match field {
            Field::Credential(p, f) => self.set_credential(p, f, text),
            Field::Location => self.search.location = text.to_string(),
            Field::SalaryMin => {
                if let Ok(value) = text.trim().parse::<i64>() {
                    self.search.salary_min = value;
                }
            }
            Field::ResumeFile => self.resume_path = text.trim().to_string(),
            _ => {}
        }
    }

    /// Toggle a checkbox or cycle a select.
    pub fn activate_field(&mut self, field: Field) {
        match field {
            Field::Modality => self.search.modality = self.search.modality.next(),
            Field::Platform(p) => self.toggle_platform(p),
            Field::RequiresEnglish => self.search.requires_english = self.search.requires_english.next(),
            Field::RequiresDegree => self.search.requires_degree = self.search.requires_degree.next(),
            _ => {}
        }
    }

    /// Analyze the file at `resume_path`. A failed analysis keeps the
    /// previous report.
    pub fn load_resume(&mut self) -> Result<&ResumeAnalysis> {
        let analysis = analysis::analyze_file(Path::new(&self.resume_path))?;
        info!(path = %self.resume_path, rating = analysis.overall_rating, "resume analyzed");
        Ok(self.resume.insert(analysis))
    }

    // --- Run lifecycle ---

    /// Reset progress and logs, then log the start line. No guard against
    /// a run already in flight; each call hands out a fresh session.
    pub fn begin_run(&mut self) -> RunSession {
        self.running = true;
        self.progress = 0;
        self.logs.clear();
        self.stopped = false;
        self.failed = false;
        let session = RunSession::new();
        info!(session = %session.id, "run started");
        self.add_log(LogKind::Success, "Iniciando automação JobHunter Pro...");
        session
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.stopped = true;
        info!("run stopped by user");
        self.add_log(LogKind::Warning, "Automação interrompida pelo usuário");
    }

    /// Fold one event from the run controller into the screen state.
    /// Returns a summary when a run finishes.
    pub fn apply(&mut self, event: RunEvent) -> Option<RunSummary> {
        match event {
            RunEvent::Log(entry) => self.logs.push(entry),
            RunEvent::Progress(value) => self.progress = value,
            RunEvent::Results(results) => self.results = results,
            RunEvent::Failed(err) => {
                self.failed = true;
                self.add_log(LogKind::Error, format!("Erro durante a automação: {}", err));
            }
            RunEvent::Finished(session) => {
                self.running = false;
                return Some(self.summary(session));
            }
        }
        None
    }

    fn summary(&self, session: RunSession) -> RunSummary {
        let outcome = if self.failed {
            RunOutcome::Failed
        } else if self.stopped {
            RunOutcome::Stopped
        } else {
            RunOutcome::Completed
        };
        let finished_at = Utc::now();
        RunSummary {
            session_id: session.id,
            started_at: session.started_at,
            finished_at,
            outcome,
            search: self.search.clone(),
            results: self.results.clone(),
        }
    }

    pub fn success_rate(&self) -> u32 {
        self.results.success_rate()
    }
}
