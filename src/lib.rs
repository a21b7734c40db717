pub mod assets;
pub mod camera;
pub mod cli;
pub mod loaders;
pub mod photometry;
pub mod renderer;
pub mod scene;
pub mod ui;

pub use assets::{LoadEvent, LoadState};
pub use photometry::{FrameLighting, LightingParams};
pub use scene::Scene;
