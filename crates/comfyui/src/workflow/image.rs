//! Image generation workflow (text to image).

use serde_json::json;

use genstudio_core::generation::ImageGenerationConfig;

use super::{seed_or_random, WorkflowGraph};

/// Checkpoint -> text encoders -> empty latent -> sampler -> decode -> save.
pub fn build(cfg: &ImageGenerationConfig) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();

    let ckpt = graph.add_node(
        "CheckpointLoaderSimple",
        json!({ "ckpt_name": cfg.checkpoint }),
    );

    let positive = graph.add_node(
        "CLIPTextEncode",
        json!({
            "text": cfg.prompt,
            "clip": ckpt.output(1),
        }),
    );

    let negative = graph.add_node(
        "CLIPTextEncode",
        json!({
            "text": cfg.negative_prompt,
            "clip": ckpt.output(1),
        }),
    );

    let latent = graph.add_node(
        "EmptyLatentImage",
        json!({
            "width": cfg.width,
            "height": cfg.height,
            "batch_size": 1,
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
            "sampler_name": cfg.sampler,
            "scheduler": "normal",
            "denoise": 1.0,
        }),
    );

    let decoded = graph.add_node(
        "VAEDecode",
        json!({
            "samples": sampler.output(0),
            "vae": ckpt.output(2),
        }),
    );

    graph.add_node(
        "SaveImage",
        json!({
            "images": decoded.output(0),
            "filename_prefix": "image/genstudio",
        }),
    );

    graph
}
