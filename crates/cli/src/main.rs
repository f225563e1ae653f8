use anyhow::Context;
use clap::{Parser, Subcommand};
use report_types::{CategoryList, NonEmptyText};
use reports_core::constants::DEFAULT_CONFIG_PATH;
use reports_core::{
    ConfigStore, GitHubClient, NewReport, RepoStore, ReportMeta, ReportUpdate, ReportsManager,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reports")]
#[command(about = "Manage HTML reports stored in a GitHub repository")]
struct Cli {
    /// Path of the admin config file
    #[arg(long, env = "REPORTS_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the GitHub config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List all reports
    List,
    /// Print one report with its HTML
    Get {
        /// Report id
        id: String,
    },
    /// Create a report from an HTML file
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Category tag (repeat at least three times)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// HTML file to publish
        #[arg(long)]
        html: PathBuf,
    },
    /// Update a report's metadata and HTML
    Update {
        /// Report id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Category tag; replaces all current tags when given
        #[arg(long = "category")]
        categories: Vec<String>,
        /// HTML file to publish
        #[arg(long)]
        html: PathBuf,
    },
    /// Delete a report
    Delete {
        /// Report id
        id: String,
    },
    /// Check the configured credentials against GitHub
    TestConnection,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current config (the token is never printed)
    Show,
    /// Overwrite the config file
    Save {
        owner: String,
        repo: String,
        token: String,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn open_manager(store: &ConfigStore) -> anyhow::Result<ReportsManager> {
    let github = store
        .get_config()?
        .and_then(|cfg| cfg.github_config())
        .with_context(|| {
            format!(
                "{} is missing or incomplete; run `reports config save <owner> <repo> <token>`",
                store.path().display()
            )
        })?;
    let client: Arc<dyn RepoStore> = Arc::new(GitHubClient::new(github)?);
    Ok(ReportsManager::new(client))
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    NonEmptyText::new(&html).with_context(|| format!("{} is empty", path.display()))?;
    Ok(html)
}

fn print_meta(meta: &ReportMeta) {
    println!(
        "{}  {}  [{}]  updated {}",
        meta.id,
        meta.title,
        meta.categories.join(", "),
        meta.updated_at.format("%Y-%m-%d %H:%M")
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reports_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = ConfigStore::new(cli.config);

    match cli.command {
        Some(Commands::Config {
            action: ConfigAction::Show,
        }) => match store.get_config()? {
            Some(cfg) => {
                println!("File:   {}", store.path().display());
                println!("Owner:  {}", cfg.owner.as_deref().unwrap_or("-"));
                println!("Repo:   {}", cfg.repo.as_deref().unwrap_or("-"));
                println!("Token:  {}", if cfg.token.is_some() { "set" } else { "not set" });
                println!("Port:   {}", cfg.port);
                println!("Valid:  {}", cfg.is_complete());
            }
            None => println!("No config at {}", store.path().display()),
        },
        Some(Commands::Config {
            action:
                ConfigAction::Save {
                    owner,
                    repo,
                    token,
                    port,
                },
        }) => {
            let owner = NonEmptyText::new(owner).context("owner")?;
            let repo = NonEmptyText::new(repo).context("repo")?;
            let token = NonEmptyText::new(token).context("token")?;
            store.save_config(owner.as_str(), repo.as_str(), token.as_str(), port)?;
            println!("Saved config to {}", store.path().display());
        }
        Some(Commands::List) => {
            let reports = open_manager(&store)?.get_all_reports().await?;
            if reports.is_empty() {
                println!("No reports found.");
            } else {
                reports.iter().for_each(print_meta);
            }
        }
        Some(Commands::Get { id }) => {
            match open_manager(&store)?.get_report(&id).await? {
                Some(report) => {
                    print_meta(&report.meta);
                    if !report.meta.description.is_empty() {
                        println!("{}", report.meta.description);
                    }
                    println!();
                    println!("{}", report.html_code);
                }
                None => anyhow::bail!("report not found: {id}"),
            }
        }
        Some(Commands::Create {
            title,
            description,
            categories,
            html,
        }) => {
            let title = NonEmptyText::new(title).context("title")?;
            let categories = CategoryList::new(categories)?;
            let html_code = read_html(&html)?;

            let report = open_manager(&store)?
                .create_report(NewReport {
                    title: Some(title.into_string()),
                    description,
                    categories: Some(categories.into_vec()),
                    html_code,
                })
                .await?;
            println!("Created {}", report.meta.id);
        }
        Some(Commands::Update {
            id,
            title,
            description,
            categories,
            html,
        }) => {
            let title = title
                .map(NonEmptyText::new)
                .transpose()
                .context("title")?
                .map(NonEmptyText::into_string);
            let categories = if categories.is_empty() {
                None
            } else {
                Some(CategoryList::new(categories)?.into_vec())
            };
            let html_code = read_html(&html)?;

            let report = open_manager(&store)?
                .update_report(
                    &id,
                    ReportUpdate {
                        title,
                        description,
                        categories,
                        html_code: Some(html_code),
                    },
                )
                .await?;
            println!("Updated {}", report.meta.id);
        }
        Some(Commands::Delete { id }) => {
            let deleted = open_manager(&store)?.delete_report(&id).await?;
            println!(
                "Deleted {} ({})",
                deleted.deleted_report.id, deleted.deleted_report.title
            );
        }
        Some(Commands::TestConnection) => {
            let info = open_manager(&store)?.store().repo_info().await?;
            println!(
                "Connected to {} ({}, default branch {})",
                info.full_name,
                if info.private { "private" } else { "public" },
                info.default_branch
            );
        }
        None => {
            println!("Use 'reports --help' for commands");
        }
    }

    Ok(())
}
