use frontend::{resolve_options, FrontendOptions, LoopConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) options: FrontendOptions,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Fantasy Console Startup ===");

    let options = match resolve_options() {
        Ok(options) => options,
        Err(error) => {
            warn!(error = %error, "config_load_failed");
            FrontendOptions::default()
        }
    };
    info!(
        crt_monitor = options.crt_monitor,
        crt_shader = ?options.crt_shader_path,
        touch_overlay_alpha = options.touch_overlay_alpha,
        volume = options.volume,
        fullscreen = options.fullscreen,
        "options_loaded"
    );

    AppWiring {
        config: LoopConfig::default(),
        options,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
