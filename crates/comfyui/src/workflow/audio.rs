//! Audio generation workflow (text/lyrics to music).

use serde_json::json;

use genstudio_core::generation::AudioGenerationConfig;

use super::{seed_or_random, WorkflowGraph};

/// Checkpoint -> latent -> tag/lyric encoders -> sampler -> decode -> save.
pub fn build(cfg: &AudioGenerationConfig) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();

    let ckpt = graph.add_node(
        "CheckpointLoaderSimple",
        json!({ "ckpt_name": cfg.checkpoint }),
    );

    let latent = graph.add_node(
        "EmptyAceStepLatentAudio",
        json!({
            "seconds": cfg.duration_secs,
            "batch_size": 1,
        }),
    );

    let positive = graph.add_node(
        "TextEncodeAceStepAudio",
        json!({
            "tags": cfg.prompt,
            "lyrics": cfg.lyrics,
            "lyrics_strength": 1.0,
            "clip": ckpt.output(1),
        }),
    );

    // Empty negative conditioning; the audio model has no negative prompt.
    let negative = graph.add_node(
        "TextEncodeAceStepAudio",
        json!({
            "tags": "",
            "lyrics": "",
            "lyrics_strength": 1.0,
            "clip": ckpt.output(1),
        }),
    );

    let sampler = graph.add_node(
        "KSampler",
        json!({
            "model": ckpt.output(0),
            "positive": positive.output(0),
            "negative": negative.output(0),
            "latent_image": latent.output(0),
            "seed": seed_or_random(cfg.seed),
            "steps": cfg.steps,
            "cfg": cfg.cfg_scale,
            "sampler_name": "euler",
            "scheduler": "simple",
            "denoise": 1.0,
        }),
    );

    let decoded = graph.add_node(
        "VAEDecodeAudio",
        json!({
            "samples": sampler.output(0),
            "vae": ckpt.output(2),
        }),
    );

    graph.add_node(
        "SaveAudio",
        json!({
            "audio": decoded.output(0),
            "filename_prefix": "audio/genstudio",
        }),
    );

    graph
}
