//! Photometric lighting model: translates the user-facing illumination units
//! (lumens, lux, a normalized exposure slider) into the quantities the
//! renderer consumes every frame.

/// Radius of the visible bulb sphere, in scene units.
pub const BULB_RADIUS: f32 = 0.02;

// === Preset Tables ===

/// Ordered label -> value mapping for a photometric preset.
///
/// Order is display order in the GUI; the tables are fixed at startup and
/// never mutated.
#[derive(Debug, Clone, Copy)]
pub struct PresetTable {
    entries: &'static [(&'static str, f32)],
}

impl PresetTable {
    pub const fn new(entries: &'static [(&'static str, f32)]) -> Self {
        Self { entries }
    }

    /// Labels in display order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    /// Looks up a label that is guaranteed valid by construction (the GUI
    /// only ever writes table keys). An unknown label means the parameter
    /// record was tampered with and is a fatal configuration error.
    pub fn value_of(&self, label: &str) -> f32 {
        match self.get(label) {
            Some(value) => value,
            None => panic!("unknown photometric preset: {label:?}"),
        }
    }

    pub fn label_at(&self, index: usize) -> &'static str {
        self.entries[index].0
    }
}

/// Bulb luminous power presets, in lumens.
pub const BULB_LUMINOUS_POWERS: PresetTable = PresetTable::new(&[
    ("110000 lm (1000W)", 110_000.0),
    ("3500 lm (300W)", 3500.0),
    ("1700 lm (100W)", 1700.0),
    ("800 lm (60W)", 800.0),
    ("400 lm (40W)", 400.0),
    ("180 lm (25W)", 180.0),
    ("20 lm (4W)", 20.0),
    ("Off", 0.0),
]);

/// Hemisphere (sky) irradiance presets, in lux.
pub const HEMI_LUMINOUS_IRRADIANCES: PresetTable = PresetTable::new(&[
    ("0.0001 lx (Moonless Night)", 0.0001),
    ("0.002 lx (Night Airglow)", 0.002),
    ("0.5 lx (Full Moon)", 0.5),
    ("3.4 lx (City Twilight)", 3.4),
    ("50 lx (Living Room)", 50.0),
    ("100 lx (Very Overcast)", 100.0),
    ("350 lx (Office Room)", 350.0),
    ("400 lx (Sunrise/Sunset)", 400.0),
    ("1000 lx (Overcast)", 1000.0),
    ("18000 lx (Daylight)", 18000.0),
    ("50000 lx (Direct Sun)", 50000.0),
]);

// === Lighting Parameters ===

/// The user-adjustable lighting parameters, mutated in place by the GUI and
/// read once per frame. Invariant: the two labels are always valid keys into
/// their tables.
#[derive(Debug, Clone)]
pub struct LightingParams {
    /// Normalized exposure slider in [0, 1].
    pub exposure: f32,
    pub shadows: bool,
    pub bulb_power: String,
    pub hemi_irradiance: String,
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            exposure: 0.68,
            shadows: true,
            bulb_power: BULB_LUMINOUS_POWERS.label_at(4).to_string(),
            hemi_irradiance: HEMI_LUMINOUS_IRRADIANCES.label_at(0).to_string(),
        }
    }
}

// === Per-Frame Derivation ===

/// Maps the normalized slider onto the renderer's tone-mapping exposure.
/// The fifth power keeps the slider usable across several orders of
/// magnitude of scene brightness: 0 -> 0, 1 -> 1, strictly increasing.
pub fn tone_mapping_exposure(exposure: f32) -> f32 {
    exposure.powf(5.0)
}

/// Emissive intensity of the bulb surface, from the point light intensity
/// the renderer derived for it. Spreads the light's intensity over the bulb
/// sphere so the visible glow matches the light it casts.
pub fn bulb_emissive_intensity(point_light_intensity: f32) -> f32 {
    point_light_intensity / (BULB_RADIUS * BULB_RADIUS)
}

/// Renderer-facing lighting quantities for one frame. A pure function of
/// `LightingParams`; recomputed every frame before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLighting {
    pub tone_mapping_exposure: f32,
    pub shadows_enabled: bool,
    /// Bulb luminous power in lumens.
    pub bulb_power_lm: f32,
    /// Hemisphere light intensity in lux.
    pub hemi_intensity_lx: f32,
}

impl FrameLighting {
    pub fn derive(params: &LightingParams) -> Self {
        Self {
            tone_mapping_exposure: tone_mapping_exposure(params.exposure),
            shadows_enabled: params.shadows,
            bulb_power_lm: BULB_LUMINOUS_POWERS.value_of(&params.bulb_power),
            hemi_intensity_lx: HEMI_LUMINOUS_IRRADIANCES.value_of(&params.hemi_irradiance),
        }
    }
}
