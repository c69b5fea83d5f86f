//! Reassembly of subtask outputs into a job result

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

use tessera_core::{
    CompletedOutput, JobId, JobResult, MergedOutput, MissingSubtask, PartialFailure, Region,
    Result, Subtask, SubtaskShape, TesseraError, TileOutput,
};

use crate::strategy::DecomposeStrategy;

/// Tile output laid out as a row-major grid over a region
#[derive(Debug, Deserialize)]
struct GridOutput {
    region: Region,
    values: Vec<JsonValue>,
}

/// Crop a grid-shaped output to `core`; anything else is returned unchanged
fn crop_to_core(output: JsonValue, core: &Region) -> JsonValue {
    let grid = match GridOutput::deserialize(&output) {
        Ok(grid) if grid.values.len() as u64 == grid.region.area() => grid,
        _ => return output,
    };
    if !grid.region.contains(core) {
        return output;
    }

    let mut values = Vec::with_capacity(core.area() as usize);
    for cy in core.y..core.bottom() {
        for cx in core.x..core.right() {
            if let Some(value) = grid.region.index_of(cx, cy).and_then(|i| grid.values.get(i)) {
                values.push(value.clone());
            }
        }
    }
    json!({"region": core, "values": values})
}

/// Merge the outputs of a job whose subtasks all succeeded.
///
/// `parts` pairs each subtask with its output, in any order.
pub fn merge(
    job_id: JobId,
    strategy: &DecomposeStrategy,
    mut parts: Vec<(&Subtask, JsonValue)>,
) -> Result<JobResult> {
    parts.sort_by_key(|(subtask, _)| subtask.sequence);
    let subtask_count = parts.len();

    let output = match strategy {
        DecomposeStrategy::Spatial(_) => {
            let mut tiles = Vec::with_capacity(parts.len());
            for (subtask, output) in parts {
                match &subtask.shape {
                    SubtaskShape::Tile { core, .. } => tiles.push(TileOutput {
                        region: *core,
                        output: crop_to_core(output, core),
                    }),
                    other => return Err(shape_mismatch(subtask, strategy, other)),
                }
            }
            MergedOutput::Spatial { tiles }
        }
        DecomposeStrategy::Functional(_) => {
            let mut roles = BTreeMap::new();
            for (subtask, output) in parts {
                match &subtask.shape {
                    SubtaskShape::Role { role } => {
                        roles.insert(role.clone(), output);
                    }
                    other => return Err(shape_mismatch(subtask, strategy, other)),
                }
            }
            MergedOutput::Functional { roles }
        }
        DecomposeStrategy::Pipeline(_) => {
            let mut last: Option<(usize, JsonValue)> = None;
            for (subtask, output) in parts {
                match &subtask.shape {
                    SubtaskShape::Stage { index, .. } => {
                        if last.as_ref().is_none_or(|(best, _)| index >= best) {
                            last = Some((*index, output));
                        }
                    }
                    other => return Err(shape_mismatch(subtask, strategy, other)),
                }
            }
            MergedOutput::Pipeline {
                output: last.map(|(_, output)| output).unwrap_or(JsonValue::Null),
            }
        }
    };

    Ok(JobResult {
        job_id,
        subtask_count,
        output,
        completed_at: Utc::now(),
    })
}

fn shape_mismatch(subtask: &Subtask, strategy: &DecomposeStrategy, shape: &SubtaskShape) -> TesseraError {
    TesseraError::Other(format!(
        "subtask {} has shape {:?}, which a {} merge cannot place",
        subtask.id,
        shape,
        strategy.kind()
    ))
}

/// Build the partial result of a job with permanently failed subtasks
pub fn partial_failure(
    job_id: JobId,
    completed: Vec<(&Subtask, JsonValue)>,
    missing: Vec<(&Subtask, String)>,
) -> PartialFailure {
    let mut completed: Vec<CompletedOutput> = completed
        .into_iter()
        .map(|(subtask, output)| CompletedOutput {
            subtask_id: subtask.id,
            label: subtask.label.clone(),
            sequence: subtask.sequence,
            output,
        })
        .collect();
    completed.sort_by_key(|c| c.sequence);

    let mut missing: Vec<(usize, MissingSubtask)> = missing
        .into_iter()
        .map(|(subtask, reason)| {
            (
                subtask.sequence,
                MissingSubtask {
                    subtask_id: subtask.id,
                    label: subtask.label.clone(),
                    reason,
                },
            )
        })
        .collect();
    missing.sort_by_key(|(sequence, _)| *sequence);

    PartialFailure {
        job_id,
        completed,
        missing: missing.into_iter().map(|(_, m)| m).collect(),
    }
}
