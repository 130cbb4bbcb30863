use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Infojobs,
    Catho,
    Gupy,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Linkedin,
        Platform::Infojobs,
        Platform::Catho,
        Platform::Gupy,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Infojobs => "infojobs",
            Platform::Catho => "catho",
            Platform::Gupy => "gupy",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Linkedin => "LinkedIn",
            Platform::Infojobs => "Infojobs",
            Platform::Catho => "Catho",
            Platform::Gupy => "Gupy",
        }
    }

    pub fn from_key(key: &str) -> Option<Platform> {
        Platform::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(key) || p.label().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Credentials ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Username,
    Password,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Per-platform login form state. Held in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    entries: BTreeMap<Platform, Credential>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self {
            entries: Platform::ALL
                .into_iter()
                .map(|p| (p, Credential::default()))
                .collect(),
        }
    }
}

impl CredentialStore {
    pub fn get(&self, platform: Platform) -> &Credential {
        // every platform is seeded in Default and never removed
        &self.entries[&platform]
    }

    pub fn set(&mut self, platform: Platform, field: CredentialField, value: &str) {
        let entry = self.entries.entry(platform).or_default();
        match field {
            CredentialField::Username => entry.username = value.to_string(),
            CredentialField::Password => entry.password = value.to_string(),
        }
    }
}

// --- Search configuration ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    All,
    Remote,
    Hybrid,
    Onsite,
}

impl Modality {
    pub fn label(self) -> &'static str {
        match self {
            Modality::All => "All",
            Modality::Remote => "Remote",
            Modality::Hybrid => "Hybrid",
            Modality::Onsite => "On-site",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Modality::All => Modality::Remote,
            Modality::Remote => Modality::Hybrid,
            Modality::Hybrid => Modality::Onsite,
            Modality::Onsite => Modality::All,
        }
    }
}

/// Yes / no / don't care filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Both,
}

impl TriState {
    pub fn label(self) -> &'static str {
        match self {
            TriState::Yes => "Yes",
            TriState::No => "No",
            TriState::Both => "Either",
        }
    }

    pub fn next(self) -> Self {
        match self {
            TriState::Both => TriState::Yes,
            TriState::Yes => TriState::No,
            TriState::No => TriState::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub job_types: Vec<String>,
    pub location: String,
    pub salary_min: i64,
    pub platforms: Vec<Platform>,
    pub modality: Modality,
    pub requires_english: TriState,
    pub requires_degree: TriState,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            job_types: [
                "Analista financeiro",
                "Contas a pagar",
                "Contas a receber",
                "Analista de precificação",
                "Custos",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            location: "São Paulo".to_string(),
            salary_min: 1900,
            platforms: vec![Platform::Linkedin],
            modality: Modality::All,
            requires_english: TriState::Both,
            requires_degree: TriState::Both,
        }
    }
}

impl SearchConfig {
    pub fn toggle_platform(&mut self, platform: Platform) {
        if self.platforms.contains(&platform) {
            self.platforms.retain(|p| *p != platform);
        } else {
            self.platforms.push(platform);
        }
    }

    pub fn is_selected(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

// --- Run results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Found,
    Applied,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Found => "found",
            JobStatus::Applied => "applied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "found" => Some(JobStatus::Found),
            "applied" => Some(JobStatus::Applied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub platform: Platform,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTally {
    pub jobs: u32,
    pub applications: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResults {
    pub total_jobs: u32,
    pub total_applications: u32,
    pub platform_results: BTreeMap<Platform, PlatformTally>,
    pub jobs: Vec<JobRecord>,
}

impl RunResults {
    /// The fixed payload every simulated run ends with.
    pub fn simulated() -> Self {
        let job = |id, title: &str, company: &str, platform, status| JobRecord {
            id,
            title: title.to_string(),
            company: company.to_string(),
            platform,
            status,
        };

        Self {
            total_jobs: 15,
            total_applications: 8,
            platform_results: BTreeMap::from([
                (Platform::Linkedin, PlatformTally { jobs: 10, applications: 5 }),
                (Platform::Infojobs, PlatformTally { jobs: 3, applications: 2 }),
                (Platform::Catho, PlatformTally { jobs: 2, applications: 1 }),
            ]),
            jobs: vec![
                job(1, "Analista Financeiro Jr", "Tech Corp", Platform::Linkedin, JobStatus::Applied),
                job(2, "Contas a Pagar", "Finance Ltd", Platform::Infojobs, JobStatus::Applied),
                job(3, "Analista de Custos", "Industry SA", Platform::Linkedin, JobStatus::Found),
            ],
        }
    }

    pub fn success_rate(&self) -> u32 {
        success_rate(u64::from(self.total_applications), u64::from(self.total_jobs))
    }
}

/// Applications as a whole percentage of jobs, rounded half up. Zero jobs is 0%.
pub fn success_rate(applications: u64, jobs: u64) -> u32 {
    if jobs == 0 {
        return 0;
    }
    (applications as f64 / jobs as f64 * 100.0).round() as u32
}

// --- Terminal log ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Warning,
    Error,
}

impl LogKind {
    pub fn label(self) -> &'static str {
        match self {
            LogKind::Info => "INFO",
            LogKind::Success => "OK",
            LogKind::Warning => "WARN",
            LogKind::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub kind: LogKind,
    pub message: String,
}

impl LogEntry {
    pub fn now(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            kind,
            message: message.into(),
        }
    }
}

// --- Run history ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub session_id: String,
    pub outcome: String, // "completed", "stopped", "failed"
    pub total_jobs: u32,
    pub total_applications: u32,
    pub search_json: String,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub company: String,
    pub total: u32,
    pub applied: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub runs: u32,
    pub completed_runs: u32,
    pub total_jobs: u64,
    pub total_applications: u64,
    pub platforms: BTreeMap<Platform, PlatformTally>,
    pub companies: Vec<CompanyStats>,
}

impl Statistics {
    pub fn success_rate(&self) -> u32 {
        success_rate(self.total_applications, self.total_jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_platform_twice_restores_selection() {
        let mut search = SearchConfig::default();
        let original = search.platforms.clone();

        search.toggle_platform(Platform::Catho);
        assert!(search.is_selected(Platform::Catho));
        search.toggle_platform(Platform::Catho);
        assert_eq!(search.platforms, original);

        search.toggle_platform(Platform::Linkedin);
        assert!(search.platforms.is_empty());
        search.toggle_platform(Platform::Linkedin);
        assert_eq!(search.platforms, original);
    }

    #[test]
    fn test_credential_edit_is_isolated_per_platform() {
        let mut creds = CredentialStore::default();
        creds.set(Platform::Gupy, CredentialField::Username, "ana@example.com");
        creds.set(Platform::Gupy, CredentialField::Password, "hunter2");

        assert_eq!(creds.get(Platform::Gupy).username, "ana@example.com");
        assert_eq!(creds.get(Platform::Gupy).password, "hunter2");
        for platform in [Platform::Linkedin, Platform::Infojobs, Platform::Catho] {
            assert_eq!(creds.get(platform), &Credential::default());
        }
    }

    #[test]
    fn test_success_rate_rounding() {
        assert_eq!(success_rate(8, 15), 53);
        assert_eq!(success_rate(1, 8), 13); // 12.5 rounds up
        assert_eq!(success_rate(2, 3), 67);
        assert_eq!(success_rate(5, 5), 100);
        assert_eq!(success_rate(0, 0), 0);
        assert_eq!(success_rate(3, 0), 0);
    }

    #[test]
    fn test_simulated_results_are_consistent() {
        let results = RunResults::simulated();
        assert!(results.total_applications <= results.total_jobs);
        assert_eq!(results.success_rate(), 53);
        assert_eq!(results.jobs.len(), 3);

        let tallied: u32 = results.platform_results.values().map(|t| t.jobs).sum();
        assert_eq!(tallied, results.total_jobs);
        for tally in results.platform_results.values() {
            assert!(tally.applications <= tally.jobs);
        }
    }

    #[test]
    fn test_default_search_config() {
        let search = SearchConfig::default();
        assert_eq!(search.job_types.len(), 5);
        assert_eq!(search.location, "São Paulo");
        assert_eq!(search.salary_min, 1900);
        assert_eq!(search.platforms, vec![Platform::Linkedin]);
        assert_eq!(search.modality, Modality::All);
        assert_eq!(search.requires_english, TriState::Both);
    }

    #[test]
    fn test_platform_from_key() {
        assert_eq!(Platform::from_key("linkedin"), Some(Platform::Linkedin));
        assert_eq!(Platform::from_key("LinkedIn"), Some(Platform::Linkedin));
        assert_eq!(Platform::from_key("GUPY"), Some(Platform::Gupy));
        assert_eq!(Platform::from_key("indeed"), None);
    }

    #[test]
    fn test_selects_cycle_back() {
        let mut modality = Modality::All;
        for _ in 0..4 {
            modality = modality.next();
        }
        assert_eq!(modality, Modality::All);
        assert_eq!(TriState::Both.next().next().next(), TriState::Both);
    }
}
