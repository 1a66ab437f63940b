use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::ai::CompletionClient;
use crate::ai::openai::OpenAiCompatibleClient;
use crate::config::loader::load_settings;
use crate::error::ReviewerError;
use crate::git::ChangeSource;
use crate::git::github::GithubSource;
use crate::review::comment::RepoContext;
use crate::review::orchestrate::Reviewer;

/// Code reviewer: context-budgeted AI review of pull request diffs.
#[derive(Parser, Debug)]
#[command(name = "code-reviewer", version, about)]
pub struct Cli {
    /// Path to a TOML file layered over the embedded defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Review a pull request and print the resulting comment.
    Review {
        /// Repository in `owner/name` form.
        #[arg(long)]
        repo: String,
        /// Pull request number.
        #[arg(long)]
        pr: u64,
        /// List the reviewable files and stop, without calling the model.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective configuration.
    Config,
}

fn split_repo(repo: &str) -> Result<(String, String), ReviewerError> {
    repo.split_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .map(|(owner, name)| (owner.to_string(), name.to_string()))
        .ok_or_else(|| {
            ReviewerError::ContentSource(format!("expected owner/name, got '{repo}'"))
        })
}

pub async fn run() -> Result<(), ReviewerError> {
    let cli = Cli::parse();
    let settings = Arc::new(load_settings(cli.config.as_deref())?);

    match cli.command {
        Command::Config => {
            println!("Model: {}", settings.config.model);
            println!("Temperature: {}", settings.config.temperature);
            println!("Max model tokens: {}", settings.config.max_model_tokens);
            println!("Inline fixes: {}", settings.config.enable_inline_fixes);
            Ok(())
        }
        Command::Review { repo, pr, dry_run } => {
            let (owner, name) = split_repo(&repo)?;
            tracing::info!(
                repo = %repo,
                pr,
                model = %settings.config.model,
                dry_run,
                "starting review"
            );

            let source: Arc<dyn ChangeSource> =
                Arc::new(GithubSource::new(&settings, &owner, &name, pr)?);
            let client: Arc<dyn CompletionClient> =
                Arc::new(OpenAiCompatibleClient::from_settings(&settings)?);
            let ctx = RepoContext {
                owner,
                repo: name,
            };

            if dry_run {
                let mut files = source.list_changed_files().await?;
                crate::processing::filter::filter_files(&mut files);
                println!("{} reviewable files:", files.len());
                for file in &files {
                    println!("  {}", file.filename);
                }
                return Ok(());
            }

            let reviewer = Reviewer::new(settings.clone(), client, source, ctx);
            let result = reviewer.run().await?;

            println!("{}", result.comment);

            for fix in &result.fixes {
                println!();
                println!(
                    "Suggested fix for {} (lines {}-{}):",
                    fix.filename, fix.line_start, fix.line_end
                );
                println!("```suggestion\n{}\n```", fix.replacement);
            }

            Ok(())
        }
    }
}
