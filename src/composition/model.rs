use crate::{
    assets::media::{VideoAsset, VideoTrackDescriptor},
    foundation::core::{Affine, CropRect, Fps, RenderSize, TimeRange},
    foundation::error::{ReframeError, ReframeResult},
    transform::affine::compute_layer_transform,
};

/// Transform applied to one source track, starting at `start_sec`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerInstruction {
    pub stream_index: u32,
    pub start_sec: f64,
    pub transform: Affine,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    pub time_range: TimeRange,
    pub layers: Vec<LayerInstruction>,
}

/// Everything the source reader needs to turn decoded frames into render-size frames.
///
/// Built once per job by [`build_composition`] and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompositionDescriptor {
    pub render_size: RenderSize,
    pub fps: Fps,
    pub instructions: Vec<Instruction>,
}

impl CompositionDescriptor {
    pub fn validate(&self) -> ReframeResult<()> {
        self.render_size.validate()?;
        if self.instructions.is_empty() {
            return Err(ReframeError::configuration(
                "composition must contain at least one instruction",
            ));
        }
        for (i, instr) in self.instructions.iter().enumerate() {
            if instr.layers.is_empty() {
                return Err(ReframeError::configuration(format!(
                    "composition instruction {i} has no layers"
                )));
            }
        }
        Ok(())
    }

    /// Transform of the first layer active at presentation time `t`.
    ///
    /// Frames past the last instruction (container durations are rounded) keep the last
    /// instruction's transform.
    pub fn layer_transform_at(&self, t: f64) -> Option<Affine> {
        let instr = self
            .instructions
            .iter()
            .find(|i| i.time_range.contains(t))
            .or_else(|| self.instructions.last())?;
        instr
            .layers
            .iter()
            .rev()
            .find(|l| l.start_sec <= t)
            .or_else(|| instr.layers.first())
            .map(|l| l.transform)
    }

    pub fn to_json_pretty(&self) -> ReframeResult<String> {
        use anyhow::Context as _;
        Ok(serde_json::to_string_pretty(self).context("serialize composition descriptor")?)
    }
}

/// Build the single-instruction, single-layer composition for a crop/scale job.
#[tracing::instrument(skip(asset, track), fields(stream = track.stream_index))]
pub fn build_composition(
    asset: &VideoAsset,
    track: &VideoTrackDescriptor,
    crop: CropRect,
    render_size: RenderSize,
) -> ReframeResult<CompositionDescriptor> {
    render_size.validate()?;

    let transform = compute_layer_transform(
        track.natural_size(),
        track.orientation_transform(),
        crop,
        render_size,
    );

    let descriptor = CompositionDescriptor {
        render_size,
        fps: track.fps,
        instructions: vec![Instruction {
            time_range: TimeRange::new(0.0, asset.duration_sec)?,
            layers: vec![LayerInstruction {
                stream_index: track.stream_index,
                start_sec: 0.0,
                transform,
            }],
        }],
    };
    tracing::debug!(coeffs = ?transform.as_coeffs(), "built composition");
    Ok(descriptor)
}

#[cfg(test)]
#[path = "../../tests/unit/composition/model.rs"]
mod tests;
