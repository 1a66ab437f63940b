use std::sync::Arc;

use futures_util::future::join_all;

use super::comment::{RepoContext, render_review_comment};
use super::fallback_parser::parse_freeform_reply;
use super::inline::{InlineFix, derive_inline_fix};
use super::prompts::{PromptKind, Strategy, build_conversation, default_strategies};
use super::suggestion::{Suggestion, dedup_suggestions};
use super::tagged_parser::parse_review_reply;
use crate::ai::CompletionClient;
use crate::ai::token::{ModelLimits, TokenEstimator};
use crate::config::types::Settings;
use crate::error::ReviewerError;
use crate::git::types::FileChange;
use crate::git::{ChangeSource, prefetch_contents};
use crate::processing::batch::{BatchPlan, plan_batches};
use crate::processing::filter::filter_files;
use crate::processing::patch::render_file_patch;

/// The artifact returned to the caller: a rendered comment body, the
/// suggestions that produced it, and the inline fixes derived from them.
#[derive(Debug, Clone, Default)]
pub struct ReviewResult {
    pub comment: String,
    pub suggestions: Vec<Suggestion>,
    pub fixes: Vec<InlineFix>,
}

/// Ordered state machine over review strategies.
///
/// `advance` hands out strategies in fallback order; once it returns `None`
/// the runner is in its terminal exhausted state.
#[derive(Debug)]
pub struct StrategyRunner {
    strategies: Vec<Strategy>,
    next: usize,
}

impl StrategyRunner {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies, next: 0 }
    }

    pub fn advance(&mut self) -> Option<Strategy> {
        let strategy = self.strategies.get(self.next).copied();
        if strategy.is_some() {
            self.next += 1;
        }
        strategy
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.strategies.len()
    }
}

/// Render each file once and cache its patch token cost on the record;
/// returns the total across the change set.
fn cache_patch_tokens(files: &mut [FileChange], estimator: &TokenEstimator) -> u32 {
    let mut total = 0;
    for file in files {
        let tokens = estimator.estimate(&render_file_patch(file));
        file.patch_tokens = Some(tokens);
        total += tokens;
    }
    total
}

/// End-to-end review pipeline: fetch, plan, query, parse, refine.
pub struct Reviewer {
    settings: Arc<Settings>,
    client: Arc<dyn CompletionClient>,
    source: Arc<dyn ChangeSource>,
    ctx: RepoContext,
}

impl Reviewer {
    pub fn new(
        settings: Arc<Settings>,
        client: Arc<dyn CompletionClient>,
        source: Arc<dyn ChangeSource>,
        ctx: RepoContext,
    ) -> Self {
        Self {
            settings,
            client,
            source,
            ctx,
        }
    }

    /// Run the full review.
    ///
    /// The only fatal outcome is strategy exhaustion: every (prompt, parser)
    /// pair failed end-to-end. Oversized files and unparsable replies are
    /// degradations, not errors.
    pub async fn run(&self) -> Result<ReviewResult, ReviewerError> {
        let mut files = self.source.list_changed_files().await?;
        let total = files.len();
        filter_files(&mut files);
        tracing::info!(total, reviewable = files.len(), "fetched changed files");

        if files.is_empty() {
            return Ok(ReviewResult {
                comment: "No reviewable changes in this change set.".to_string(),
                ..Default::default()
            });
        }

        // Best effort: missing content just means raw-diff rendering
        if let Err(e) = prefetch_contents(self.source.as_ref(), &mut files).await {
            tracing::warn!(error = %e, "content prefetch unavailable, rendering raw diffs");
        }

        let estimator = TokenEstimator::new(ModelLimits::new(
            self.settings.model_token_limits.clone(),
            self.settings.config.max_model_tokens,
        ));
        let model = self.settings.config.model.as_str();

        let diff_tokens = cache_patch_tokens(&mut files, &estimator);

        // Budget check: a batch fits when its rendered text, wrapped in the
        // tagged review conversation, leaves room for the reply.
        let fits = |text: &str| {
            build_conversation(&self.settings, PromptKind::Tagged, &self.ctx, text)
                .map(|conv| estimator.fits(&conv, model))
                .unwrap_or(false)
        };

        let plan = plan_batches(&files, render_file_patch, fits);
        tracing::info!(
            batches = plan.batches.len(),
            excluded = plan.oversized.len(),
            diff_tokens,
            "planned review batches"
        );
        for name in &plan.oversized {
            let tokens = files
                .iter()
                .find(|f| f.filename == *name)
                .and_then(|f| f.patch_tokens);
            tracing::warn!(file = %name, tokens, "file excluded from review");
        }

        if plan.batches.is_empty() {
            return Ok(ReviewResult {
                comment: "All changed files exceed the review budget; nothing was reviewed."
                    .to_string(),
                ..Default::default()
            });
        }

        let mut runner = StrategyRunner::new(default_strategies());
        let mut last_err = String::from("no strategies configured");

        while let Some(strategy) = runner.advance() {
            match self.attempt(strategy, &plan).await {
                Ok(mut result) => {
                    result.fixes = self.derive_fixes(&result.suggestions, &files).await;
                    tracing::info!(
                        strategy = strategy.name,
                        suggestions = result.suggestions.len(),
                        fixes = result.fixes.len(),
                        "review strategy succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name,
                        error = %e,
                        "review strategy failed, advancing"
                    );
                    last_err = e.to_string();
                }
            }
        }

        Err(ReviewerError::StrategiesExhausted(last_err))
    }

    /// Run one strategy end to end over all planned batches.
    async fn attempt(
        &self,
        strategy: Strategy,
        plan: &BatchPlan,
    ) -> Result<ReviewResult, ReviewerError> {
        let conversations = plan
            .batches
            .iter()
            .map(|b| build_conversation(&self.settings, strategy.kind, &self.ctx, &b.rendered))
            .collect::<Result<Vec<_>, _>>()?;

        // One concurrent request per batch; a single failure fails the
        // attempt so the reviewer never sees silently incomplete coverage.
        let outcomes = join_all(
            conversations
                .iter()
                .map(|conv| self.client.complete(conv, None)),
        )
        .await;

        let mut replies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            replies.push(outcome?.content);
        }

        match strategy.kind {
            PromptKind::Tagged => self.extract_tagged(strategy, &replies),
            PromptKind::Plain => {
                let comment = replies
                    .iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n---\n\n");
                if comment.is_empty() {
                    return Err(ReviewerError::EmptyStrategyOutput {
                        strategy: strategy.name,
                    });
                }
                Ok(ReviewResult {
                    comment,
                    ..Default::default()
                })
            }
        }
    }

    /// Structured extraction with the parser-internal heuristic fallback.
    fn extract_tagged(
        &self,
        strategy: Strategy,
        replies: &[String],
    ) -> Result<ReviewResult, ReviewerError> {
        let mut suggestions: Vec<Suggestion> =
            replies.iter().flat_map(|r| parse_review_reply(r)).collect();

        if suggestions.is_empty() {
            tracing::info!("structured parse found nothing, trying freeform recovery");
            suggestions = replies
                .iter()
                .flat_map(|r| parse_freeform_reply(r, &self.settings.fallback_parser))
                .collect();
        }

        if suggestions.is_empty() {
            return Err(ReviewerError::EmptyStrategyOutput {
                strategy: strategy.name,
            });
        }

        let suggestions = dedup_suggestions(suggestions);
        let comment = render_review_comment(
            &suggestions,
            &self.ctx,
            self.settings.config.max_issue_url_chars,
        );

        Ok(ReviewResult {
            comment,
            suggestions,
            fixes: Vec::new(),
        })
    }

    /// Derive inline fixes for the suggestions of a finished review, against
    /// the already-prefetched change set.
    ///
    /// Focused, single-suggestion requests; every failure or no-op simply
    /// produces no fix for that suggestion.
    async fn derive_fixes(
        &self,
        suggestions: &[Suggestion],
        files: &[FileChange],
    ) -> Vec<InlineFix> {
        if !self.settings.config.enable_inline_fixes || suggestions.is_empty() {
            return Vec::new();
        }

        let mut fixes = Vec::new();
        for suggestion in suggestions {
            let Some(file) = files.iter().find(|f| f.filename == suggestion.filename) else {
                tracing::debug!(
                    file = %suggestion.filename,
                    "suggestion targets a file outside the change set, no fix derived"
                );
                continue;
            };
            if let Some(fix) =
                derive_inline_fix(self.client.as_ref(), &self.settings, suggestion, file).await
            {
                fixes.push(fix);
            }
        }
        fixes
    }
}
