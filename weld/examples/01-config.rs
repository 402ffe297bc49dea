// note: this example assumes you've analyzed the previous one

use weld::config::{StaticConfigProvider, WeldConfig};
use weld::container::Weld;

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // container config is provided by a WeldConfigProvider, which by default uses environment
    // variables and a configuration file (see module documentation)
    // start with a default config and override what's needed
    let mut config = WeldConfig::default();
    config.install_tracing_logger = false;
    config.resolution_cache_size = 1024;

    let container = Weld::new()
        .with_config_provider(Box::new(StaticConfigProvider::new(config)))
        .initialize()
        .expect("error initializing container");

    // the config is available as an application scoped bean, so it can be injected anywhere
    let config = container.config().expect("error retrieving config");
    println!("Using built-in logger: {}", config.install_tracing_logger);
    println!("Resolution cache size: {}", config.resolution_cache_size);
}
