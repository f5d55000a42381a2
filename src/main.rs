use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use repolens_core::Config;
use repolens_core::bootstrap::{App, health_check, resolve_config_path};
use repolens_core::qa::{QaOutcome, QaResponse};
use repolens_index::queue::JobStatus;
use repolens_memory::{NewRepository, RepositoryCatalog};

const DEFAULT_USER: i64 = 1;

#[derive(Debug, Parser)]
#[command(name = "repolens", version, about = "Ask questions about your repositories")]
struct Cli {
    /// Path to the TOML config (defaults to `REPOLENS_CONFIG`, then config/default.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register, list and select repositories.
    #[command(subcommand)]
    Repo(RepoCommand),
    /// Index repositories and wait for the results.
    Index {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Show whether repositories are indexed.
    Status {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Ask a question across repositories.
    Ask(AskArgs),
}

#[derive(Debug, Subcommand)]
enum RepoCommand {
    Add {
        /// Display name, usually `owner/name`.
        full_name: String,
        /// Existing checkout; defaults to `{repos_dir}/{id}`.
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_USER)]
        user: i64,
        /// Select the repository for questions right away.
        #[arg(long)]
        select: bool,
    },
    List {
        #[arg(long)]
        user: Option<i64>,
    },
    Select {
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Deselect instead.
        #[arg(long)]
        off: bool,
    },
}

#[derive(Debug, Args)]
struct AskArgs {
    question: String,
    /// Repositories to search; defaults to the user's selection.
    #[arg(long = "repo")]
    repos: Vec<i64>,
    #[arg(long, default_value_t = DEFAULT_USER)]
    user: i64,
    /// Print the full response as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    tracing::debug!(path = %config_path.display(), "loading config");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let app = App::build(config).await?;

    match cli.command {
        Command::Repo(cmd) => run_repo(&app, cmd).await,
        Command::Index { ids } => {
            health_check(&app.provider).await;
            run_index(&app, &ids).await
        }
        Command::Status { ids } => run_status(&app, &ids).await,
        Command::Ask(args) => {
            health_check(&app.provider).await;
            run_ask(&app, &args).await
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run_repo(app: &App, cmd: RepoCommand) -> anyhow::Result<()> {
    match cmd {
        RepoCommand::Add {
            full_name,
            path,
            user,
            select,
        } => {
            let name = full_name
                .rsplit('/')
                .next()
                .unwrap_or(&full_name)
                .to_owned();
            let local_path = path
                .map(|p| std::path::absolute(&p).unwrap_or(p))
                .map(|p| p.to_string_lossy().into_owned());
            let record = app
                .catalog
                .add(NewRepository {
                    user_id: user,
                    name,
                    full_name,
                    local_path,
                })
                .await?;
            if select {
                app.catalog.set_selected(record.id, true).await?;
            }
            println!("added {} {}", record.id, record.full_name);
        }
        RepoCommand::List { user } => {
            let records = app.catalog.list(user).await?;
            if records.is_empty() {
                println!("no repositories");
            }
            for r in records {
                println!(
                    "{:>4} {} {:<12} {}{}",
                    r.id,
                    if r.selected { "*" } else { " " },
                    if r.indexed { "indexed" } else { "not indexed" },
                    r.full_name,
                    r.local_path
                        .map(|p| format!(" ({p})"))
                        .unwrap_or_default(),
                );
            }
        }
        RepoCommand::Select { ids, off } => {
            for id in ids {
                app.catalog
                    .set_selected(id, !off)
                    .await
                    .with_context(|| format!("failed to update repository {id}"))?;
                println!("{} {id}", if off { "deselected" } else { "selected" });
            }
        }
    }
    Ok(())
}

async fn run_index(app: &App, ids: &[i64]) -> anyhow::Result<()> {
    let tickets: Vec<_> = ids.iter().map(|&id| app.queue.enqueue(id)).collect();

    let mut failed = 0usize;
    for ticket in tickets {
        let repo_id = ticket.repo_id;
        match ticket.wait().await {
            JobStatus::Completed(report) => println!(
                "indexed {repo_id}: {} code chunks, {} commits from {}/{} files ({} failed) in {} ms",
                report.code_chunks,
                report.commit_chunks,
                report.files_parsed,
                report.files_scanned,
                report.files_failed,
                report.elapsed_ms,
            ),
            JobStatus::Failed(message) => {
                failed += 1;
                println!("failed to index {repo_id}: {message}");
            }
            JobStatus::Running => {}
        }
    }

    if failed > 0 {
        bail!("{failed} of {} repositories failed to index", ids.len());
    }
    Ok(())
}

async fn run_status(app: &App, ids: &[i64]) -> anyhow::Result<()> {
    for &id in ids {
        let state = app.queue.state(id).await?;
        println!("{id}: {}", state.as_str());
    }
    Ok(())
}

async fn run_ask(app: &App, args: &AskArgs) -> anyhow::Result<()> {
    let response = if args.repos.is_empty() {
        app.qa.answer_for_user(args.user, &args.question).await
    } else {
        app.qa.answer(&args.question, &args.repos).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &QaResponse) {
    println!("{}", response.answer.answer);
    if response.answer.sources.is_empty() {
        return;
    }
    if response.outcome == QaOutcome::Answered {
        println!("\nSources:");
    } else {
        println!();
    }
    for source in &response.answer.sources {
        println!("--- {}", source.repo);
        println!("{}", source.text.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_collects_repeated_repo_flags() {
        let cli = Cli::try_parse_from([
            "repolens", "ask", "where is login?", "--repo", "1", "--repo", "3",
        ])
        .unwrap();
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question, "where is login?");
        assert_eq!(args.repos, vec![1, 3]);
        assert_eq!(args.user, DEFAULT_USER);
        assert!(!args.json);
    }

    #[test]
    fn index_requires_at_least_one_id() {
        assert!(Cli::try_parse_from(["repolens", "index"]).is_err());
        let cli = Cli::try_parse_from(["repolens", "index", "4", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Index { ids } if ids == vec![4, 5]));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "repolens", "repo", "list", "--config", "alt.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(
            cli.command,
            Command::Repo(RepoCommand::List { user: None })
        ));
    }

    #[test]
    fn repo_add_defaults() {
        let cli = Cli::try_parse_from(["repolens", "repo", "add", "acme/app"]).unwrap();
        let Command::Repo(RepoCommand::Add {
            full_name,
            path,
            user,
            select,
        }) = cli.command
        else {
            panic!("expected repo add");
        };
        assert_eq!(full_name, "acme/app");
        assert!(path.is_none());
        assert_eq!(user, DEFAULT_USER);
        assert!(!select);
    }
}
