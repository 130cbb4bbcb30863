mod analysis;
mod config;
mod dashboard;
mod db;
mod logging;
mod models;
mod runner;
mod tui;

use analysis::{GENERAL_TIPS, JobType, ResumeAnalysis};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use config::Config;
use dashboard::{Dashboard, RunSummary};
use db::Database;
use models::{LogEntry, RunResults, SearchConfig};
use runner::RunController;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Parser)]
#[command(name = "jobhunter")]
#[command(about = "JobHunter Pro - job application automation dashboard (simulated)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the history database and a default config file
    Init,

    /// Open the interactive dashboard (default)
    Dashboard,

    /// Play one automation run without the dashboard
    Run {
        /// Press stop after this many milliseconds
        #[arg(long)]
        stop_after: Option<u64>,

        /// Make the run reject at this step (1-5)
        #[arg(long)]
        fail_at: Option<usize>,

        /// Do not record the run in the history database
        #[arg(long)]
        no_save: bool,
    },

    /// List recorded runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one recorded run
    Show {
        /// Run ID
        id: i64,
    },

    /// Aggregate statistics over all recorded runs
    Stats,

    /// Score a resume (.txt or .pdf) against the target job types
    Analyze {
        /// Resume file
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the keywords each job type is scored on
    Keywords {
        /// Only this job type (e.g. contas_pagar)
        job_type: Option<String>,
    },

    /// Resume writing tips, general or per job type
    Tips {
        /// Job type key (e.g. custos)
        job_type: Option<String>,
    },

    /// Inspect or reset the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

impl Commands {
    /// Only commands that play runs or read files leave a log behind.
    fn writes_log(&self) -> bool {
        matches!(self, Commands::Dashboard | Commands::Run { .. } | Commands::Analyze { .. })
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the config file location
    Path,

    /// Overwrite the config file with defaults
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = Config::default_path()?;
    let config = Config::load_from(&config_path)?;

    let command = cli.command.unwrap_or(Commands::Dashboard);
    if command.writes_log() {
        logging::init(&config.log_path()?, &config.log.level)?;
    }

    match command {
        Commands::Init => {
            let db = open_history()?;
            if !config_path.exists() {
                Config::default().save_to(&config_path)?;
                println!("Wrote default config to {}", config_path.display());
            }
            println!("History database initialized at {}", db.path().display());
        }

        Commands::Dashboard => {
            let db = open_history()?;
            tui::run_dashboard(&config, &config_path, &db)?;
        }

        Commands::Run {
            stop_after,
            fail_at,
            no_save,
        } => {
            if let Some(step) = fail_at {
                if !(1..=5).contains(&step) {
                    return Err(anyhow!("--fail-at must be between 1 and 5, got {}", step));
                }
            }
            let summary = run_headless(&config, stop_after, fail_at)?;
            print_results(&summary.results);
            println!("Outcome: {}", summary.outcome.as_str());
            if !no_save {
                let id = open_history()?.record_run(&summary)?;
                println!("Recorded as run #{}", id);
            }
        }

        Commands::History { limit } => {
            let runs = open_history()?.list_runs(limit)?;
            if runs.is_empty() {
                println!("No runs recorded.");
            } else {
                println!("{:<6} {:<10} {:>6} {:>8} {:>6}  {:<20}", "ID", "OUTCOME", "JOBS", "APPLIED", "RATE", "STARTED");
                println!("{}", "-".repeat(62));
                for run in runs {
                    println!(
                        "{:<6} {:<10} {:>6} {:>8} {:>5}%  {:<20}",
                        run.id,
                        run.outcome,
                        run.total_jobs,
                        run.total_applications,
                        models::success_rate(run.total_applications.into(), run.total_jobs.into()),
                        truncate(&run.started_at, 19)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let db = open_history()?;
            match db.get_run(id)? {
                Some(run) => {
                    println!("Run #{}", run.id);
                    println!("Session: {}", run.session_id);
                    println!("Outcome: {}", run.outcome);
                    println!("Started: {}", run.started_at);
                    println!("Finished: {}", run.finished_at);
                    if let Ok(search) = serde_json::from_str::<SearchConfig>(&run.search_json) {
                        let platforms: Vec<&str> = search.platforms.iter().map(|p| p.label()).collect();
                        println!(
                            "Search: {} | min R${} | {} | {}",
                            search.location,
                            search.salary_min,
                            search.modality.label(),
                            platforms.join(", ")
                        );
                    }
                    println!(
                        "Jobs: {}  Applied: {}  Success rate: {}%",
                        run.total_jobs,
                        run.total_applications,
                        models::success_rate(run.total_applications.into(), run.total_jobs.into())
                    );
                    let jobs = db.run_jobs(run.id)?;
                    if !jobs.is_empty() {
                        println!("\nJobs ({}):", jobs.len());
                        for job in jobs {
                            println!("  #{} - {} at {} [{}] ({})", job.id, job.title, job.company, job.platform, job.status.as_str());
                        }
                    }
                }
                None => {
                    println!("Run #{} not found.", id);
                }
            }
        }

        Commands::Stats => {
            let stats = open_history()?.statistics()?;
            if stats.runs == 0 {
                println!("No runs recorded.");
            } else {
                println!("Runs:          {} ({} completed)", stats.runs, stats.completed_runs);
                println!("Jobs found:    {}", stats.total_jobs);
                println!("Applications:  {}", stats.total_applications);
                println!("Success rate:  {}%", stats.success_rate());

                if !stats.platforms.is_empty() {
                    println!("\n{:<12} {:>6} {:>8} {:>6}", "PLATFORM", "JOBS", "APPLIED", "RATE");
                    println!("{}", "-".repeat(35));
                    for (platform, tally) in &stats.platforms {
                        println!(
                            "{:<12} {:>6} {:>8} {:>5}%",
                            platform.label(),
                            tally.jobs,
                            tally.applications,
                            models::success_rate(tally.applications.into(), tally.jobs.into())
                        );
                    }
                }

                if !stats.companies.is_empty() {
                    println!("\n{:<24} {:>6} {:>8}", "COMPANY", "SEEN", "APPLIED");
                    println!("{}", "-".repeat(40));
                    for company in &stats.companies {
                        println!("{:<24} {:>6} {:>8}", truncate(&company.company, 22), company.total, company.applied);
                    }
                }
            }
        }

        Commands::Analyze { file, json } => {
            let report = analysis::analyze_file(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_analysis(&report);
            }
        }

        Commands::Keywords { job_type } => {
            for job in job_types(job_type.as_deref())? {
                println!("{} ({})", job.label(), job.key());
                let wrapped = textwrap::fill(&job.keywords().join(", "), 76);
                for line in wrapped.lines() {
                    println!("  {}", line);
                }
                println!();
            }
        }

        Commands::Tips { job_type } => match job_type {
            None => {
                for tip in GENERAL_TIPS {
                    println!("- {}", tip);
                }
            }
            Some(key) => {
                for job in job_types(Some(key.as_str()))? {
                    println!("{}:", job.label());
                    for tip in job.tips() {
                        println!("- {}", tip);
                    }
                }
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => print!("{}", toml::to_string_pretty(&config)?),
            ConfigCommands::Path => println!("{}", config_path.display()),
            ConfigCommands::Reset => {
                Config::default().save_to(&config_path)?;
                println!("Reset config at {}", config_path.display());
            }
        },
    }

    Ok(())
}

fn open_history() -> Result<Database> {
    let db = Database::open()?;
    db.init()?;
    Ok(db)
}

fn job_types(key: Option<&str>) -> Result<Vec<JobType>> {
    match key {
        None => Ok(JobType::ALL.to_vec()),
        Some(key) => JobType::from_key(key)
            .map(|job| vec![job])
            .ok_or_else(|| anyhow!("Unknown job type '{}'", key)),
    }
}

fn print_analysis(report: &ResumeAnalysis) {
    println!("Overall rating: {:.1}/5", report.overall_rating);
    println!("\n{:<26} {:>7} {:>6}", "JOB TYPE", "SCORE", "STARS");
    println!("{}", "-".repeat(41));
    for (job, score) in &report.job_scores {
        println!("{:<26} {:>6.1}% {:>6.1}", job.label(), score, report.stars(*job));
    }
    println!();
    println!("Technical skills:  {:.1}%", report.technical_score);
    println!("Soft skills:       {:.1}%", report.soft_skills_score);
    println!(
        "Experience:        {} years ({})",
        report.experience_years,
        report.experience_level.label()
    );
    let edu = &report.education;
    println!(
        "Education:         degree={} postgrad={} mba={} relevant_area={}",
        edu.degree, edu.postgraduate, edu.mba, edu.relevant_area
    );
    println!("\nRecommendations:");
    for rec in &report.recommendations {
        println!("- {}", rec);
    }
}

/// Play a run on stdout, printing log lines as they arrive.
fn run_headless(config: &Config, stop_after: Option<u64>, fail_at: Option<usize>) -> Result<RunSummary> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (mut controller, mut events) = RunController::new(Handle::current(), config.run.clone());
        controller.inject_failure(fail_at);

        let mut dashboard = Dashboard::new(config.search.clone());
        controller.start(&mut dashboard);
        let mut printed = print_logs(&dashboard.logs, 0);

        let stop_timer = tokio::time::sleep(Duration::from_millis(stop_after.unwrap_or(0)));
        tokio::pin!(stop_timer);
        let mut stop_pending = stop_after.is_some();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(anyhow!("run ended without finishing"));
                    };
                    let summary = dashboard.apply(event);
                    printed = print_logs(&dashboard.logs, printed);
                    if let Some(summary) = summary {
                        return Ok(summary);
                    }
                }
                _ = &mut stop_timer, if stop_pending => {
                    stop_pending = false;
                    controller.stop(&mut dashboard);
                    printed = print_logs(&dashboard.logs, printed);
                }
            }
        }
    })
}

fn print_logs(logs: &[LogEntry], from: usize) -> usize {
    for log in logs.iter().skip(from) {
        println!("[{}] {:<5} {}", log.timestamp, log.kind.label(), log.message);
    }
    logs.len()
}

fn print_results(results: &RunResults) {
    println!();
    println!("Jobs found:    {}", results.total_jobs);
    println!("Applications:  {}", results.total_applications);
    println!("Success rate:  {}%", results.success_rate());
    if results.jobs.is_empty() {
        return;
    }
    println!("\n{:<4} {:<28} {:<16} {:<10} {:<8}", "ID", "TITLE", "COMPANY", "PLATFORM", "STATUS");
    println!("{}", "-".repeat(70));
    for job in &results.jobs {
        println!(
            "{:<4} {:<28} {:<16} {:<10} {:<8}",
            job.id,
            truncate(&job.title, 26),
            truncate(&job.company, 14),
            job.platform.label(),
            job.status.as_str()
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Analista de precificação", 12), "Analista ...");
        assert_eq!(truncate("São Paulo", 9), "São Paulo");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from(["jobhunter", "run", "--stop-after", "1200", "--fail-at", "4", "--no-save"]).unwrap();
        match cli.command {
            Some(Commands::Run { stop_after, fail_at, no_save }) => {
                assert_eq!(stop_after, Some(1200));
                assert_eq!(fail_at, Some(4));
                assert!(no_save);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from(["jobhunter", "analyze", "cv.pdf", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Analyze { file, json }) => {
                assert_eq!(file, PathBuf::from("cv.pdf"));
                assert!(json);
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn test_only_working_commands_write_a_log() {
        let parse = |args: &[&str]| {
            Cli::try_parse_from(args)
                .unwrap()
                .command
                .unwrap_or(Commands::Dashboard)
        };
        assert!(parse(&["jobhunter"]).writes_log());
        assert!(parse(&["jobhunter", "run", "--no-save"]).writes_log());
        assert!(parse(&["jobhunter", "analyze", "cv.txt"]).writes_log());
        assert!(!parse(&["jobhunter", "config", "path"]).writes_log());
        assert!(!parse(&["jobhunter", "config", "show"]).writes_log());
        assert!(!parse(&["jobhunter", "history"]).writes_log());
        assert!(!parse(&["jobhunter", "tips", "custos"]).writes_log());
    }

    #[test]
    fn test_job_type_selection() {
        assert_eq!(job_types(None).unwrap().len(), 5);
        assert_eq!(job_types(Some("custos")).unwrap(), vec![JobType::Custos]);
        assert!(job_types(Some("marketing")).is_err());
    }

    #[test]
    fn test_cli_defaults_to_dashboard() {
        let cli = Cli::try_parse_from(["jobhunter"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_headless_run_with_stop_keeps_playing() {
        let config = Config {
            run: config::RunSettings {
                step_delays_ms: vec![5, 5, 5, 5],
                cancel_on_stop: false,
            },
            ..Config::default()
        };
        let summary = run_headless(&config, Some(1), None).unwrap();
        assert_eq!(summary.outcome, dashboard::RunOutcome::Stopped);
        assert_eq!(summary.results, RunResults::simulated());
    }

    #[test]
    fn test_headless_run_failure() {
        let config = Config {
            run: config::RunSettings {
                step_delays_ms: vec![0, 0, 0, 0],
                cancel_on_stop: false,
            },
            ..Config::default()
        };
        let summary = run_headless(&config, None, Some(2)).unwrap();
        assert_eq!(summary.outcome, dashboard::RunOutcome::Failed);
        assert_eq!(summary.results, RunResults::default());
    }
}
