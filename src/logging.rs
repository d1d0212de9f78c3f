use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, Settings};

/// Directives used when `RUST_LOG` is not set. Outgoing HTTP clients
/// (OpenAI, Stripe, VIES) are kept at `warn` so request bodies stay out of
/// the logs.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "smartshop_backend=debug,tower_http=debug,sqlx=warn,reqwest=warn,info",
        Environment::Staging => "smartshop_backend=debug,tower_http=info,sqlx=warn,reqwest=warn,info",
        Environment::Prod => "smartshop_backend=info,tower_http=info,reqwest=warn,warn",
    }
}

pub fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&settings.env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(settings.env.is_dev())
        .with_line_number(settings.env.is_dev());

    let registry = tracing_subscriber::registry().with(filter);
    if settings.log_json {
        registry.with(fmt_layer.json().flatten_event(true)).init();
    } else {
        registry.with(fmt_layer.compact()).init();
    }

    tracing::info!(env = ?settings.env, json = settings.log_json, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let directives = default_directives(&env);
            assert!(EnvFilter::try_new(directives).is_ok(), "{}", directives);
            assert!(directives.contains("reqwest=warn"));
        }
    }
}
