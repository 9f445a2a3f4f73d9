use std::sync::Arc;

use clap::Parser;
use git_analyzer::ai::{load_review_template, PromptBuilder, ProviderFactory};
use git_analyzer::cli::args::{Args, OutputFormat};
use git_analyzer::cli::render::{format_event, render_json, render_text};
use git_analyzer::config::Config;
use git_analyzer::github::{GitHubFetcher, GitHubHttpClient};
use git_analyzer::infrastructure::{setup_logging, CancellationToken};
use git_analyzer::models::RunState;
use git_analyzer::orchestrator::Orchestrator;
use git_analyzer::quality::{CommitClassifier, CommitEnhancer};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::new();
    config.update_from_args(&args);

    setup_logging(config.logging_config())?;
    for warning in config.take_warnings() {
        tracing::warn!("{}", warning);
    }
    config.validate()?;

    let token = config
        .github_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GitHub token is required"))?;

    let client = GitHubHttpClient::new(config.github_api_url.clone(), config.request_timeout())?;
    let fetcher = GitHubFetcher::new(Arc::new(client), config.fetch.clone());
    let classifier = CommitClassifier::new(config.quality.clone())?;

    let enhancer = if config.orchestrator.enable_ai {
        let provider = ProviderFactory::create(&config.ai_provider)?;
        let mut enhancer =
            CommitEnhancer::new(Arc::from(provider), config.provider_config(), config.quality.ai_timeout)
                .with_types(config.quality.conventional_types.clone());
        if let Some(path) = &config.prompt_file {
            let template = load_review_template(path)?;
            enhancer = enhancer.with_prompts(PromptBuilder::new().with_template(template));
        }
        Some(enhancer)
    } else {
        None
    };

    let orchestrator = Orchestrator::new(fetcher, classifier, enhancer, config.orchestrator.clone());

    // 进度输出到 stderr，报告输出到 stdout
    let mut events = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    eprintln!("{}", format_event(&event));
                    if event.state.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("正在取消...");
            ctrl_c.cancel();
        }
    });

    let report = orchestrator.run(token, cancel).await;
    progress.await.ok();

    match args.format {
        OutputFormat::Json => println!("{}", render_json(&report)?),
        OutputFormat::Text => print!("{}", render_text(&report)),
    }

    match report.final_state {
        RunState::Failed { .. } => std::process::exit(1),
        RunState::Cancelled => std::process::exit(130),
        _ => Ok(()),
    }
}
