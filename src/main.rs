// src/main.rs
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reelquest::app::ReelQuestApp;
use reelquest::config::load_config;

const RENDERER_VAR: &str = "REELQUEST_RENDERER";

/// Backend named by `REELQUEST_RENDERER` (`glow` or `wgpu`, any case), else
/// the platform default.
fn renderer_for(choice: Option<&str>) -> eframe::Renderer {
    match choice.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("glow") => eframe::Renderer::Glow,
        Some("wgpu") => eframe::Renderer::Wgpu,
        Some(other) => {
            warn!("{RENDERER_VAR}={other:?} not recognised; using the platform default");
            default_renderer()
        }
        None => default_renderer(),
    }
}

fn default_renderer() -> eframe::Renderer {
    if cfg!(target_os = "windows") {
        eframe::Renderer::Wgpu
    } else {
        eframe::Renderer::Glow
    }
}

fn main() -> eframe::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let cfg = load_config();
    info!(
        "warehouse={:?} tmdb_key={} cache_ttl={:?}",
        cfg.warehouse,
        cfg.tmdb_api_key.is_some(),
        cfg.cache_ttl
    );

    let options = eframe::NativeOptions {
        renderer: renderer_for(env::var(RENDERER_VAR).ok().as_deref()),
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };

    match eframe::run_native(
        "ReelQuest",
        options,
        Box::new(move |_cc| Ok(Box::new(ReelQuestApp::new(cfg)))),
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("could not open the ReelQuest window: {e:?}");
            error!(
                "The catalogue_explorer binary works without a display. To retry the window, set {RENDERER_VAR}=glow or {RENDERER_VAR}=wgpu."
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::mem::discriminant;

    #[test]
    fn renderer_choice_ignores_case_and_falls_back() {
        assert!(matches!(renderer_for(Some("WGPU")), eframe::Renderer::Wgpu));
        assert!(matches!(renderer_for(Some(" glow ")), eframe::Renderer::Glow));
        let fallback = discriminant(&default_renderer());
        assert_eq!(discriminant(&renderer_for(Some("vulkan"))), fallback);
        assert_eq!(discriminant(&renderer_for(None)), fallback);
    }
}
