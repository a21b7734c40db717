// cli.rs - Command-line interface configuration
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "lumen-viewer")]
#[command(about = "Photometric COLLADA scene viewer", long_about = None)]
pub struct Cli {
    /// URL of the zip-packed scene archive; paths without an http(s) scheme
    /// are read from the local filesystem
    #[arg(long, default_value = "http://localhost:8000/models/scene/scene.dae.zip")]
    pub url: String,

    /// Entry name inside the archive
    #[arg(long, default_value = "scene.dae")]
    pub entry: String,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Hide the lighting panel
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,
}
