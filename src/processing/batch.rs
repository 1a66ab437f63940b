use indexmap::IndexMap;

use super::patch::strip_deletions;
use crate::git::types::FileChange;

/// An ordered, non-empty set of files whose rendered patches fit the token
/// budget together, or a single oversized file processed in degraded mode.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Filenames in batch order.
    pub files: Vec<String>,
    /// Concatenated rendered patch text for the batch.
    pub rendered: String,
    /// True when the file's deletion lines were stripped to make it fit.
    pub degraded: bool,
}

/// Result of planning: disjoint batches whose union, together with the
/// excluded oversized files, equals the input set exactly.
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub batches: Vec<Batch>,
    /// Files too large for the budget even after deletion stripping.
    pub oversized: Vec<String>,
}

/// Partition `files` into budget-fitting batches.
///
/// `render` produces the patch text sent for one file; `fits` answers
/// whether a given concatenation of patch texts stays under the active
/// budget once wrapped in a conversation.
///
/// 1. If the whole set fits rendered together, one batch.
/// 2. Otherwise files are grouped by extension and each group tested as a
///    unit.
/// 3. A group that does not fit is sorted by ascending rendered size and
///    packed greedily; the file that overflows a batch seeds the next one.
/// 4. A file whose rendering alone exceeds the budget gets a degraded
///    pre-pass stripping its deletion lines; if still oversized it is
///    excluded from the review (logged, never an error).
pub fn plan_batches<R, F>(files: &[FileChange], render: R, fits: F) -> BatchPlan
where
    R: Fn(&FileChange) -> String,
    F: Fn(&str) -> bool,
{
    if files.is_empty() {
        return BatchPlan::default();
    }

    let rendered: Vec<String> = files.iter().map(&render).collect();

    // 1. Whole set at once
    let joined = rendered.concat();
    if fits(&joined) {
        return BatchPlan {
            batches: vec![Batch {
                files: files.iter().map(|f| f.filename.clone()).collect(),
                rendered: joined,
                degraded: false,
            }],
            oversized: Vec::new(),
        };
    }

    // 2. Group by extension, preserving first-appearance order
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (i, file) in files.iter().enumerate() {
        groups
            .entry(extension_key(&file.filename))
            .or_default()
            .push(i);
    }

    let mut plan = BatchPlan::default();

    for (ext, indices) in groups {
        let group_text: String = indices.iter().map(|&i| rendered[i].as_str()).collect();
        if fits(&group_text) {
            plan.batches.push(Batch {
                files: indices.iter().map(|&i| files[i].filename.clone()).collect(),
                rendered: group_text,
                degraded: false,
            });
            continue;
        }

        tracing::debug!(group = %ext, files = indices.len(), "group over budget, packing");
        pack_group(files, &rendered, &indices, &render, &fits, &mut plan);
    }

    plan
}

/// Greedy pack of one extension group, smallest rendered patch first.
fn pack_group<R, F>(
    files: &[FileChange],
    rendered: &[String],
    indices: &[usize],
    render: &R,
    fits: &F,
    plan: &mut BatchPlan,
) where
    R: Fn(&FileChange) -> String,
    F: Fn(&str) -> bool,
{
    let mut packable: Vec<usize> = Vec::new();

    // 4. Peel off files that don't fit even alone
    for &i in indices {
        if fits(&rendered[i]) {
            packable.push(i);
        } else {
            handle_oversized(&files[i], render, fits, plan);
        }
    }

    // 3. Smallest first maximizes files per batch; simple and deterministic
    packable.sort_by_key(|&i| rendered[i].len());

    let mut batch_files: Vec<String> = Vec::new();
    let mut batch_text = String::new();

    for &i in &packable {
        let candidate_len = batch_text.len() + rendered[i].len();
        let mut candidate = String::with_capacity(candidate_len);
        candidate.push_str(&batch_text);
        candidate.push_str(&rendered[i]);

        if batch_files.is_empty() || fits(&candidate) {
            batch_files.push(files[i].filename.clone());
            batch_text = candidate;
        } else {
            // Close the current batch; the overflowing file seeds the next
            plan.batches.push(Batch {
                files: std::mem::take(&mut batch_files),
                rendered: std::mem::take(&mut batch_text),
                degraded: false,
            });
            batch_files.push(files[i].filename.clone());
            batch_text = rendered[i].clone();
        }
    }

    if !batch_files.is_empty() {
        plan.batches.push(Batch {
            files: batch_files,
            rendered: batch_text,
            degraded: false,
        });
    }
}

/// Degraded-mode pre-pass for a file that is over budget on its own.
fn handle_oversized<R, F>(file: &FileChange, render: &R, fits: &F, plan: &mut BatchPlan)
where
    R: Fn(&FileChange) -> String,
    F: Fn(&str) -> bool,
{
    let stripped = FileChange::new(file.filename.clone(), strip_deletions(&file.diff));
    let degraded_text = render(&stripped);

    if fits(&degraded_text) {
        tracing::info!(file = %file.filename, "oversized file included with deletions stripped");
        plan.batches.push(Batch {
            files: vec![file.filename.clone()],
            rendered: degraded_text,
            degraded: true,
        });
    } else {
        tracing::warn!(
            file = %file.filename,
            "file exceeds token budget even in degraded mode, excluded from review"
        );
        plan.oversized.push(file.filename.clone());
    }
}

fn extension_key(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => ext.to_lowercase(),
        _ => "none".to_string(),
    }
}
