use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use super::config::OrchestratorConfig;
use super::gate::RateLimitGate;
use crate::activity::{aggregate_summary, merge_buckets, report_from_buckets};
use crate::github::{GitHubFetcher, SecretToken};
use crate::infrastructure::{AnalysisError, CancellationToken, Result, RunTracker};
use crate::models::{
    BucketMap, EnhancementStatus, QualitySummary, QualityVerdict, Report, RepositoryOutcome,
    RepositorySummary, RunEvent, RunState, UserProfile,
};
use crate::quality::{CommitClassifier, CommitEnhancer};

/// 状态事件发布器
#[derive(Clone)]
struct EventPublisher {
    run_id: String,
    sender: broadcast::Sender<RunEvent>,
}

impl EventPublisher {
    fn publish(&self, state: RunState) {
        // 没有订阅者时 send 返回错误，忽略
        let _ = self.sender.send(RunEvent {
            run_id: self.run_id.clone(),
            state,
            at: Utc::now(),
        });
    }
}

/// 单个仓库抓取任务所需的共享状态
#[derive(Clone)]
struct WorkerContext {
    fetcher: GitHubFetcher,
    token: SecretToken,
    since: Option<DateTime<Utc>>,
    gate: Arc<RateLimitGate>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    publisher: EventPublisher,
    retry: RetryPolicy,
}

/// 速率限制重试上限
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    max_wait: Duration,
}

/// 运行中途终止的原因
enum Abort {
    Cancelled,
    Failed(AnalysisError),
}

/// 分析编排器
///
/// 驱动一次运行的状态机：列出仓库、并发抓取提交、聚合活动、评估提交质量、组装报告。
/// 每次状态变化都通过 [`Orchestrator::subscribe`] 广播。
pub struct Orchestrator {
    fetcher: GitHubFetcher,
    classifier: CommitClassifier,
    enhancer: Option<Arc<CommitEnhancer>>,
    config: OrchestratorConfig,
    events: broadcast::Sender<RunEvent>,
}

impl Orchestrator {
    pub fn new(
        fetcher: GitHubFetcher,
        classifier: CommitClassifier,
        enhancer: Option<CommitEnhancer>,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            fetcher,
            classifier,
            enhancer: enhancer.map(Arc::new),
            config,
            events,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 订阅运行状态事件
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// 执行一次完整分析
    ///
    /// 总是返回报告：失败与取消也会带上已完成的部分。令牌只在本次调用内使用。
    pub async fn run(&self, token: SecretToken, cancel: CancellationToken) -> Report {
        let tracker = RunTracker::new();
        let started_at = Utc::now();
        let publisher = EventPublisher {
            run_id: tracker.run_id().to_string(),
            sender: self.events.clone(),
        };
        let transition = |state: RunState| {
            tracker.log_stage(state.name());
            publisher.publish(state);
        };

        let mut user = None;
        let mut outcomes: Vec<RepositoryOutcome> = Vec::new();

        let gate = Arc::new(RateLimitGate::new());

        let abort = match self.prepare(&token, &cancel, &gate, &transition).await {
            Err(abort) => Some(abort),
            Ok((profile, repositories)) => {
                user = profile;
                let (fetched, abort) = self
                    .fetch_all(&token, repositories, &cancel, &gate, &publisher)
                    .instrument(info_span!("fetch", run_id = %publisher.run_id))
                    .await;
                outcomes = fetched;
                abort
            }
        };

        let summaries: Vec<&RepositorySummary> = outcomes.iter().filter_map(|o| o.summary()).collect();

        if abort.is_none() {
            transition(RunState::Aggregating);
        }
        let mut buckets = BucketMap::new();
        for summary in &summaries {
            merge_buckets(&mut buckets, aggregate_summary(summary));
        }
        let activity = report_from_buckets(buckets);

        let mut abort = abort;
        if abort.is_none() {
            transition(RunState::ScoringMessages);
        }
        let mut verdicts = self.classify_all(&summaries);
        if abort.is_none() {
            if let Err(e) = self.enhance_all(&summaries, &mut verdicts, &cancel).await {
                abort = Some(match e {
                    AnalysisError::Cancelled => Abort::Cancelled,
                    other => Abort::Failed(other),
                });
            }
        } else if matches!(abort, Some(Abort::Cancelled)) {
            for verdict in verdicts.iter_mut() {
                if self.classifier.needs_enhancement(verdict) && self.enhancer.is_some() {
                    verdict.mark_skipped();
                }
            }
        }

        if abort.is_none() {
            transition(RunState::Assembling);
        }
        let final_state = final_state(abort, &outcomes);

        let quality = QualitySummary::from_verdicts(&verdicts);
        let succeeded = outcomes.iter().filter(|o| !o.is_failed()).count();
        let failed = outcomes.len() - succeeded;

        publisher.publish(final_state.clone());
        tracker.complete(final_state.name(), succeeded, failed);

        Report {
            run_id: publisher.run_id.clone(),
            final_state,
            user,
            repositories: outcomes,
            activity,
            verdicts,
            quality,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// 校验输入、读取用户资料并确定要分析的仓库
    async fn prepare(
        &self,
        token: &SecretToken,
        cancel: &CancellationToken,
        gate: &RateLimitGate,
        transition: &impl Fn(RunState),
    ) -> std::result::Result<(Option<UserProfile>, Vec<String>), Abort> {
        if cancel.is_cancelled() {
            return Err(Abort::Cancelled);
        }
        if token.is_empty() {
            return Err(Abort::Failed(AnalysisError::invalid_input("GitHub token must not be empty")));
        }
        if let Some(since) = self.config.since {
            if since >= Utc::now() {
                return Err(Abort::Failed(AnalysisError::invalid_input(format!(
                    "since must be in the past, got {}",
                    since.to_rfc3339()
                ))));
            }
        }

        transition(RunState::FetchingRepos);

        let profile = match self.fetcher.fetch_profile(token).await {
            Ok(profile) => profile,
            Err(e) if e.is_fatal() => return Err(Abort::Failed(e)),
            Err(e) => {
                warn!(error = %e, severity = ?e.severity(), "User profile unavailable");
                None
            }
        };

        if cancel.is_cancelled() {
            return Err(Abort::Cancelled);
        }

        if !self.config.repositories.is_empty() {
            let mut seen = HashSet::new();
            let repositories = self
                .config
                .repositories
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty() && seen.insert(r.clone()))
                .collect();
            return Ok((profile, repositories));
        }

        let listed = with_rate_limit_retry(gate, cancel, self.retry_policy(), || {
            self.fetcher.fetch_repositories(token)
        })
        .await;

        let repositories = listed
            .map_err(|e| match e {
                AnalysisError::Cancelled => Abort::Cancelled,
                other => Abort::Failed(other),
            })?
            .into_iter()
            .filter(|repo| self.config.include_forks || !repo.fork)
            .map(|repo| repo.id)
            .collect::<Vec<_>>();

        info!(count = repositories.len(), "Repositories selected");
        Ok((profile, repositories))
    }

    /// 并发抓取全部仓库，结果顺序与请求顺序一致
    async fn fetch_all(
        &self,
        token: &SecretToken,
        repositories: Vec<String>,
        cancel: &CancellationToken,
        gate: &Arc<RateLimitGate>,
        publisher: &EventPublisher,
    ) -> (Vec<RepositoryOutcome>, Option<Abort>) {
        let context = WorkerContext {
            fetcher: self.fetcher.clone(),
            token: token.clone(),
            since: self.config.since,
            gate: gate.clone(),
            semaphore: Arc::new(Semaphore::new(self.config.concurrency.max(1))),
            cancel: cancel.clone(),
            publisher: publisher.clone(),
            retry: self.retry_policy(),
        };

        let mut tasks = JoinSet::new();
        for (index, repository_id) in repositories.iter().enumerate() {
            let context = context.clone();
            let repository_id = repository_id.clone();
            let span = info_span!("repository", repository = %repository_id);
            tasks.spawn(
                async move {
                    let result = fetch_repository(&context, &repository_id).await;
                    (index, result)
                }
                .instrument(span),
            );
        }

        let mut results: Vec<Option<Result<RepositorySummary>>> = repositories.iter().map(|_| None).collect();
        let mut abort = None;

        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    abort = Some(Abort::Cancelled);
                    break;
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else { break };
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Repository worker terminated abnormally");
                    continue;
                }
            };

            match result {
                Err(AnalysisError::Cancelled) => {
                    abort = Some(Abort::Cancelled);
                    break;
                }
                Err(e) if e.is_fatal() => {
                    warn!(
                        repository = %repositories[index],
                        error = %e,
                        severity = ?e.severity(),
                        category = ?e.category(),
                        "Fatal error, aborting run"
                    );
                    results[index] = Some(Err(e.clone()));
                    abort = Some(Abort::Failed(e));
                    break;
                }
                other => results[index] = Some(other),
            }
        }

        if abort.is_some() {
            tasks.abort_all();
        }

        let outcomes = repositories
            .into_iter()
            .zip(results)
            .map(|(repository_id, result)| match result {
                Some(Ok(summary)) if summary.is_partial => RepositoryOutcome::Partial {
                    summary,
                    reason: String::from("commit history truncated by page cap or a failed page"),
                },
                Some(Ok(summary)) => RepositoryOutcome::Completed { summary },
                Some(Err(error)) => RepositoryOutcome::Failed { repository_id, error },
                None if abort.is_some() => RepositoryOutcome::Failed {
                    repository_id,
                    error: AnalysisError::Cancelled,
                },
                None => RepositoryOutcome::Failed {
                    repository_id,
                    error: AnalysisError::transport("repository worker terminated abnormally"),
                },
            })
            .collect();

        (outcomes, abort)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_rate_limit_retries,
            max_wait: self.config.max_rate_limit_wait,
        }
    }

    fn classify_all(&self, summaries: &[&RepositorySummary]) -> Vec<QualityVerdict> {
        summaries
            .iter()
            .flat_map(|summary| {
                summary.commits.iter().map(|commit| {
                    self.classifier
                        .classify(commit.message())
                        .for_commit(summary.repository_id.clone(), commit.hash())
                })
            })
            .collect()
    }

    /// 为需要的提交请求 AI 建议，调用次数受 `max_enhancements` 限制
    async fn enhance_all(
        &self,
        summaries: &[&RepositorySummary],
        verdicts: &mut [QualityVerdict],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(enhancer) = self.enhancer.as_ref().filter(|_| self.config.enable_ai) else {
            return Ok(());
        };

        let quality = self.classifier.config();
        let messages: Vec<&str> = summaries
            .iter()
            .flat_map(|summary| summary.commits.iter().map(|c| c.message()))
            .collect();

        let candidates: Vec<usize> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| self.classifier.needs_enhancement(v))
            .map(|(index, _)| index)
            .collect();

        if candidates.len() > quality.max_enhancements {
            info!(
                candidates = candidates.len(),
                budget = quality.max_enhancements,
                "AI enhancement budget exceeded, remaining verdicts not requested"
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let futures = candidates
            .into_iter()
            .take(quality.max_enhancements)
            .map(|index| {
                let mut verdict = verdicts[index].clone();
                let message = messages[index];
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    let error = enhancer
                        .enhance_verdict(&mut verdict, message, quality.threshold, cancel)
                        .await;
                    (index, verdict, error)
                }
            });

        let mut cancelled = false;
        for (index, verdict, error) in join_all(futures).await {
            cancelled |= matches!(error, Some(AnalysisError::Cancelled));
            verdicts[index] = verdict;
        }

        let unavailable = verdicts
            .iter()
            .filter(|v| matches!(v.enhancement, EnhancementStatus::Unavailable { .. }))
            .count();
        if unavailable > 0 {
            warn!(unavailable, provider = enhancer.provider_name(), "Some AI suggestions unavailable");
        }

        if cancelled || cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }
}

/// 在共享闸门下执行请求；速率限制时暂停闸门并重试，超出重试次数或等待上限则返回原错误
async fn with_rate_limit_retry<T, F, Fut>(
    gate: &RateLimitGate,
    cancel: &CancellationToken,
    policy: RetryPolicy,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        gate.wait(cancel).await?;

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            result = call() => result,
        };

        match result {
            Err(AnalysisError::RateLimited { retry_after })
                if attempts < policy.max_retries && retry_after <= policy.max_wait =>
            {
                attempts += 1;
                warn!(
                    attempt = attempts,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "Rate limited, pausing all workers"
                );
                gate.pause(retry_after);
            }
            other => return other,
        }
    }
}

/// 单个仓库的抓取
async fn fetch_repository(context: &WorkerContext, repository_id: &str) -> Result<RepositorySummary> {
    let _permit = tokio::select! {
        _ = context.cancel.cancelled() => return Err(AnalysisError::Cancelled),
        permit = context.semaphore.acquire() => permit.map_err(|_| AnalysisError::Cancelled)?,
    };

    context.publisher.publish(RunState::FetchingCommits {
        repository: repository_id.to_string(),
    });

    let result = with_rate_limit_retry(&context.gate, &context.cancel, context.retry, || {
        context.fetcher.fetch_commits(&context.token, repository_id, context.since)
    })
    .await;

    match &result {
        Ok(summary) => {
            info!(commits = summary.commit_count(), partial = summary.is_partial, "Repository fetched");
        }
        Err(AnalysisError::Cancelled) => {}
        Err(e) => {
            warn!(
                error = %e,
                severity = ?e.severity(),
                category = ?e.category(),
                "Repository fetch failed"
            );
        }
    }
    result
}

fn final_state(abort: Option<Abort>, outcomes: &[RepositoryOutcome]) -> RunState {
    match abort {
        Some(Abort::Cancelled) => return RunState::Cancelled,
        Some(Abort::Failed(e)) => return RunState::Failed { cause: e.to_string() },
        None => {}
    }

    let failures: Vec<&AnalysisError> = outcomes
        .iter()
        .filter_map(|o| match o {
            RepositoryOutcome::Failed { error, .. } => Some(error),
            _ => None,
        })
        .collect();

    match failures.first() {
        None => RunState::Done,
        Some(first) if failures.len() == outcomes.len() => RunState::Failed {
            cause: first.to_string(),
        },
        Some(_) => RunState::PartiallyCompleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(id: &str) -> RepositoryOutcome {
        RepositoryOutcome::Failed {
            repository_id: id.to_string(),
            error: AnalysisError::not_found(id),
        }
    }

    fn completed(id: &str) -> RepositoryOutcome {
        RepositoryOutcome::Completed {
            summary: RepositorySummary::new(id, Vec::new(), false),
        }
    }

    #[test]
    fn test_final_state_rules() {
        assert_eq!(final_state(None, &[]), RunState::Done);
        assert_eq!(final_state(None, &[completed("a/b")]), RunState::Done);
        assert_eq!(
            final_state(None, &[completed("a/b"), failed("c/d")]),
            RunState::PartiallyCompleted
        );
        assert!(matches!(
            final_state(None, &[failed("a/b"), failed("c/d")]),
            RunState::Failed { cause } if cause.contains("a/b")
        ));
        assert_eq!(
            final_state(Some(Abort::Cancelled), &[completed("a/b")]),
            RunState::Cancelled
        );
        assert!(matches!(
            final_state(Some(Abort::Failed(AnalysisError::authentication("bad"))), &[]),
            RunState::Failed { .. }
        ));
    }
}
