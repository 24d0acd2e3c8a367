//! Built-in task bodies.
//!
//! Both bodies follow the same staged shape the ingestion pipeline uses:
//! validate the source, work through the fetch/convert stages with
//! progress ticks, then suspend on a publish approval before the dataset
//! leaves the machine. The content-producing internals (fetching, markdown
//! conversion, upload) hang off these stages behind the orchestrator's
//! contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use quarry_core::events::MessageKind;
use quarry_core::human::{Argument, HumanResolution, ResponseKind};
use quarry_runtime::body::{BodyError, HumanGateSpec, StepContext, StepOutcome, TaskBody};

/// Delay between crawl batches, so the target site is not hammered.
const CRAWL_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Dataset name fallback: last path segment of the source.
fn derive_dataset_name(source: &str) -> String {
    source
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("dataset")
        .to_owned()
}

/// The dataset name to publish under, honoring an operator edit.
fn resolved_dataset_name(ctx: &StepContext, fallback: &str) -> String {
    let from_resolution = ctx.resolution().and_then(|res| match res {
        HumanResolution::Accept { arguments } | HumanResolution::Edit { arguments } => arguments
            .iter()
            .find(|a| a.name == "dataset_name")
            .and_then(|a| a.value.as_str())
            .map(str::to_owned),
        HumanResolution::Respond { text } => Some(text.clone()),
    });
    from_resolution.unwrap_or_else(|| fallback.to_owned())
}

fn publish_gate(dataset_name: &str, source: &str, resume_cursor: u32) -> HumanGateSpec {
    HumanGateSpec {
        action_name: "publish_dataset".into(),
        arguments: vec![
            Argument::new("dataset_name", json!(dataset_name)),
            Argument::new("source", json!(source)),
        ],
        allowed_responses: vec![
            ResponseKind::Accept,
            ResponseKind::Edit,
            ResponseKind::Ignore,
        ],
        description: format!("Publish dataset '{dataset_name}' built from {source}?"),
        resume_cursor,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository ingest
// ─────────────────────────────────────────────────────────────────────────────

/// Ingest a source-code repository into a dataset.
///
/// Stages: validate → fetch tree → convert files → publish approval →
/// publish.
pub struct RepositoryIngestBody;

#[async_trait]
impl TaskBody for RepositoryIngestBody {
    async fn step(&self, cursor: u32, ctx: &StepContext) -> Result<StepOutcome, BodyError> {
        let task = ctx.task().map_err(|e| BodyError::new(e.to_string()))?;
        match cursor {
            0 => {
                let trimmed = task.source.trim();
                if trimmed.is_empty() || !trimmed.contains('/') {
                    return Err(BodyError::new(format!(
                        "'{}' is not a repository location",
                        task.source
                    )));
                }
                let _ = ctx.emit_message(
                    MessageKind::System,
                    format!("Ingesting repository {}", task.source),
                );
                let _ = ctx.emit_progress(10);
                Ok(StepOutcome::Continue(1))
            }
            1 => {
                // Fetch stage: enumerate the repository tree.
                let _ = ctx.emit_progress(40);
                Ok(StepOutcome::Continue(2))
            }
            2 => {
                // Convert stage: normalize file contents into records.
                let _ = ctx.emit_progress(70);
                Ok(StepOutcome::Continue(3))
            }
            3 => {
                let name = task
                    .dataset_name
                    .clone()
                    .unwrap_or_else(|| derive_dataset_name(&task.source));
                Ok(StepOutcome::AwaitHuman(publish_gate(&name, &task.source, 4)))
            }
            4 => {
                let fallback = task
                    .dataset_name
                    .clone()
                    .unwrap_or_else(|| derive_dataset_name(&task.source));
                let name = resolved_dataset_name(ctx, &fallback);
                let _ = ctx.emit_message(
                    MessageKind::System,
                    format!("Publishing dataset '{name}'"),
                );
                let _ = ctx.emit_progress(95);
                Ok(StepOutcome::Done)
            }
            other => Err(BodyError::new(format!("unknown ingest stage {other}"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web crawl
// ─────────────────────────────────────────────────────────────────────────────

/// Crawl a website into a dataset, batch by batch.
///
/// Stages: validate → three crawl batches (paced by
/// [`CRAWL_BATCH_DELAY`]) → publish approval → publish.
pub struct WebCrawlBody;

/// Number of crawl batches between validation and publish.
const CRAWL_BATCHES: u32 = 3;

#[async_trait]
impl TaskBody for WebCrawlBody {
    async fn step(&self, cursor: u32, ctx: &StepContext) -> Result<StepOutcome, BodyError> {
        let task = ctx.task().map_err(|e| BodyError::new(e.to_string()))?;
        match cursor {
            0 => {
                if !task.source.starts_with("http://") && !task.source.starts_with("https://") {
                    return Err(BodyError::new(format!(
                        "'{}' is not an http(s) URL",
                        task.source
                    )));
                }
                let _ = ctx.emit_message(
                    MessageKind::System,
                    format!("Crawling {}", task.source),
                );
                let _ = ctx.emit_progress(5);
                Ok(StepOutcome::Continue(1))
            }
            batch @ 1..=CRAWL_BATCHES => {
                tokio::time::sleep(CRAWL_BATCH_DELAY).await;
                let progress = 5 + i32::try_from(batch).unwrap_or(0) * 25;
                let _ = ctx.emit_progress(progress.min(80));
                Ok(StepOutcome::Continue(batch + 1))
            }
            c if c == CRAWL_BATCHES + 1 => {
                let name = task
                    .dataset_name
                    .clone()
                    .unwrap_or_else(|| derive_dataset_name(&task.source));
                Ok(StepOutcome::AwaitHuman(publish_gate(
                    &name,
                    &task.source,
                    CRAWL_BATCHES + 2,
                )))
            }
            c if c == CRAWL_BATCHES + 2 => {
                let fallback = task
                    .dataset_name
                    .clone()
                    .unwrap_or_else(|| derive_dataset_name(&task.source));
                let name = resolved_dataset_name(ctx, &fallback);
                let _ = ctx.emit_message(
                    MessageKind::System,
                    format!("Publishing crawl dataset '{name}'"),
                );
                let _ = ctx.emit_progress(95);
                Ok(StepOutcome::Done)
            }
            other => Err(BodyError::new(format!("unknown crawl stage {other}"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
