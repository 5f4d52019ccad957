//! Slope-dependent traversal cost models
//!
//! A cost model maps the directional slope of a move (`dz / horizontal`,
//! positive uphill) to a cost per horizontal metre. Time models return
//! seconds per metre (the inverse of walking speed); the Pandolf model
//! returns joules per metre.
//!
//! References:
//! - Tobler, W. (1993). Three presentations on geographical analysis and modeling.
//! - Naismith, W. (1892). Rule for hill walking times.
//! - Herzog, I. (2013). The potential and limits of optimal path analysis.
//! - Conolly, J. & Lake, M. (2006). Geographical Information Systems in Archaeology.
//! - Pandolf, K. et al. (1977). Predicting energy expenditure with loads while
//!   standing or walking very slowly. J. Appl. Physiol. 43(4).

use serde::{Deserialize, Serialize};

use archterra_core::{Error, Result};

/// Unit of accumulated cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostUnits {
    Seconds,
    Joules,
}

impl CostUnits {
    pub fn symbol(self) -> &'static str {
        match self {
            CostUnits::Seconds => "s",
            CostUnits::Joules => "J",
        }
    }

    /// Convert a cost to its reporting unit: minutes or kilocalories
    pub fn to_display(self, value: f64) -> (f64, &'static str) {
        match self {
            CostUnits::Seconds => (value / 60.0, "min"),
            CostUnits::Joules => (value / 4184.0, "kcal"),
        }
    }
}

/// A pure function from directional slope to cost per metre.
///
/// Implementations must return a finite, non-negative value for every
/// finite slope.
pub trait SlopeCost: Send + Sync {
    /// Cost of one horizontal metre at `slope` (rise over run, signed)
    fn cost_per_metre(&self, slope: f64) -> f64;

    fn units(&self) -> CostUnits {
        CostUnits::Seconds
    }

    fn name(&self) -> &str;
}

fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * 1000.0 / 3600.0
}

/// Tobler's hiking function: `v = a * exp(-b * |s + c|)` km/h
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToblerParams {
    pub base_kmh: f64,
    pub slope_factor: f64,
    pub slope_offset: f64,
    pub min_speed_mps: f64,
}

impl Default for ToblerParams {
    fn default() -> Self {
        Self {
            base_kmh: 6.0,
            slope_factor: 3.5,
            slope_offset: 0.05,
            min_speed_mps: 0.05,
        }
    }
}

impl SlopeCost for ToblerParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        let speed = kmh_to_mps(self.base_kmh * (-self.slope_factor * (slope + self.slope_offset).abs()).exp());
        1.0 / speed.max(self.min_speed_mps)
    }

    fn name(&self) -> &str {
        "tobler"
    }
}

/// Naismith's rule: flat pace plus a fixed time per metre climbed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaismithParams {
    pub horizontal_kmh: f64,
    pub ascent_m_per_h: f64,
}

impl Default for NaismithParams {
    fn default() -> Self {
        Self {
            horizontal_kmh: 5.0,
            ascent_m_per_h: 600.0,
        }
    }
}

impl SlopeCost for NaismithParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        3600.0 / (self.horizontal_kmh * 1000.0) + slope.max(0.0) * 3600.0 / self.ascent_m_per_h
    }

    fn name(&self) -> &str {
        "naismith"
    }
}

/// Herzog's metabolic relative-speed polynomial, normalised to the flat speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HerzogMetabolicParams {
    pub base_kmh: f64,
    pub min_speed_mps: f64,
}

impl Default for HerzogMetabolicParams {
    fn default() -> Self {
        Self {
            base_kmh: 5.0,
            min_speed_mps: 0.05,
        }
    }
}

/// Herzog's polynomial; equals 1.64 on the flat
fn herzog_polynomial(s: f64) -> f64 {
    1337.8 * s.powi(6) + 278.19 * s.powi(5) - 517.39 * s.powi(4) - 78.199 * s.powi(3)
        + 93.419 * s.powi(2)
        + 19.825 * s
        + 1.64
}

impl SlopeCost for HerzogMetabolicParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        let relative = 1.64 / herzog_polynomial(slope.abs()).max(1e-9);
        let base = kmh_to_mps(self.base_kmh).max(self.min_speed_mps);
        1.0 / (base * relative).max(self.min_speed_mps)
    }

    fn name(&self) -> &str {
        "herzog_metabolic"
    }
}

/// Conolly & Lake: flat pace scaled by `max(1, |s| / tan(reference))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConollyLakeParams {
    pub base_kmh: f64,
    pub reference_slope_deg: f64,
    pub min_speed_mps: f64,
}

impl Default for ConollyLakeParams {
    fn default() -> Self {
        Self {
            base_kmh: 5.0,
            reference_slope_deg: 1.0,
            min_speed_mps: 0.05,
        }
    }
}

impl SlopeCost for ConollyLakeParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        let factor = (slope.abs() / self.reference_slope_deg.to_radians().tan()).max(1.0);
        factor / kmh_to_mps(self.base_kmh).max(self.min_speed_mps)
    }

    fn name(&self) -> &str {
        "conolly_lake"
    }
}

/// Herzog's wheeled-vehicle model: `v = v0 / (1 + (s% / critical%)^2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HerzogWheeledParams {
    pub base_kmh: f64,
    pub critical_slope_deg: f64,
    pub min_speed_mps: f64,
}

impl Default for HerzogWheeledParams {
    fn default() -> Self {
        Self {
            base_kmh: 4.0,
            critical_slope_deg: 12.0,
            min_speed_mps: 0.05,
        }
    }
}

impl SlopeCost for HerzogWheeledParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        let critical_percent = self.critical_slope_deg.to_radians().tan() * 100.0;
        let ratio = slope.abs() * 100.0 / critical_percent;
        let base = kmh_to_mps(self.base_kmh).max(self.min_speed_mps);
        1.0 / (base / (1.0 + ratio * ratio)).max(self.min_speed_mps)
    }

    fn name(&self) -> &str {
        "herzog_wheeled"
    }
}

/// Pandolf load-carriage metabolic rate, converted to joules per metre.
///
/// `M = 1.5 W + 2 (W + L)(L / W)^2 + η (W + L)(1.5 V^2 + 0.35 V G)` watts,
/// with the grade `G` in percent counted uphill only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PandolfParams {
    pub body_kg: f64,
    pub load_kg: f64,
    pub speed_kmh: f64,
    pub terrain_factor: f64,
}

impl Default for PandolfParams {
    fn default() -> Self {
        Self {
            body_kg: 70.0,
            load_kg: 0.0,
            speed_kmh: 5.0,
            terrain_factor: 1.0,
        }
    }
}

impl PandolfParams {
    /// Metabolic rate in watts at `slope`
    pub fn metabolic_rate(&self, slope: f64) -> f64 {
        let (w, l, eta) = (self.body_kg, self.load_kg, self.terrain_factor);
        let v = kmh_to_mps(self.speed_kmh);
        let grade = slope.max(0.0) * 100.0;
        1.5 * w + 2.0 * (w + l) * (l / w).powi(2) + eta * (w + l) * (1.5 * v * v + 0.35 * v * grade)
    }
}

impl SlopeCost for PandolfParams {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        self.metabolic_rate(slope) / kmh_to_mps(self.speed_kmh)
    }

    fn units(&self) -> CostUnits {
        CostUnits::Joules
    }

    fn name(&self) -> &str {
        "pandolf"
    }
}

/// Slope-independent cost; distance-only baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformParams {
    pub cost_per_metre: f64,
}

impl Default for UniformParams {
    fn default() -> Self {
        Self { cost_per_metre: 1.0 }
    }
}

impl SlopeCost for UniformParams {
    fn cost_per_metre(&self, _slope: f64) -> f64 {
        self.cost_per_metre
    }

    fn name(&self) -> &str {
        "uniform"
    }
}

/// Named cost model with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CostPreset {
    Tobler(ToblerParams),
    Naismith(NaismithParams),
    HerzogMetabolic(HerzogMetabolicParams),
    ConollyLake(ConollyLakeParams),
    HerzogWheeled(HerzogWheeledParams),
    Pandolf(PandolfParams),
    Uniform(UniformParams),
}

impl Default for CostPreset {
    fn default() -> Self {
        CostPreset::Tobler(ToblerParams::default())
    }
}

impl CostPreset {
    fn inner(&self) -> &dyn SlopeCost {
        match self {
            CostPreset::Tobler(p) => p,
            CostPreset::Naismith(p) => p,
            CostPreset::HerzogMetabolic(p) => p,
            CostPreset::ConollyLake(p) => p,
            CostPreset::HerzogWheeled(p) => p,
            CostPreset::Pandolf(p) => p,
            CostPreset::Uniform(p) => p,
        }
    }

    /// Parameter ranges; slope behaviour is probed by [`validate_model`]
    pub fn validate(&self) -> Result<()> {
        let positive: Vec<(&str, f64)> = match self {
            CostPreset::Tobler(p) => vec![
                ("base_kmh", p.base_kmh),
                ("min_speed_mps", p.min_speed_mps),
            ],
            CostPreset::Naismith(p) => vec![
                ("horizontal_kmh", p.horizontal_kmh),
                ("ascent_m_per_h", p.ascent_m_per_h),
            ],
            CostPreset::HerzogMetabolic(p) => vec![
                ("base_kmh", p.base_kmh),
                ("min_speed_mps", p.min_speed_mps),
            ],
            CostPreset::ConollyLake(p) => vec![
                ("base_kmh", p.base_kmh),
                ("reference_slope_deg", p.reference_slope_deg),
                ("min_speed_mps", p.min_speed_mps),
            ],
            CostPreset::HerzogWheeled(p) => vec![
                ("base_kmh", p.base_kmh),
                ("critical_slope_deg", p.critical_slope_deg),
                ("min_speed_mps", p.min_speed_mps),
            ],
            CostPreset::Pandolf(p) => vec![("body_kg", p.body_kg), ("speed_kmh", p.speed_kmh)],
            CostPreset::Uniform(_) => Vec::new(),
        };

        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidCostModel {
                    model: self.name().to_string(),
                    reason: format!("{} must be > 0, got {}", field, value),
                });
            }
        }

        let angle = match self {
            CostPreset::ConollyLake(p) => Some(p.reference_slope_deg),
            CostPreset::HerzogWheeled(p) => Some(p.critical_slope_deg),
            _ => None,
        };
        if let Some(deg) = angle {
            if deg >= 90.0 {
                return Err(Error::InvalidCostModel {
                    model: self.name().to_string(),
                    reason: format!("slope angle {} must be below 90 degrees", deg),
                });
            }
        }
        Ok(())
    }
}

impl SlopeCost for CostPreset {
    fn cost_per_metre(&self, slope: f64) -> f64 {
        self.inner().cost_per_metre(slope)
    }

    fn units(&self) -> CostUnits {
        self.inner().units()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// Slopes probed by [`validate_model`]: -300 % to +300 % in 1 % steps
const PROBE_LIMIT: i32 = 300;

/// Reject models that yield a negative or non-finite cost on the probe range.
pub fn validate_model(model: &dyn SlopeCost) -> Result<()> {
    for pct in -PROBE_LIMIT..=PROBE_LIMIT {
        let slope = pct as f64 / 100.0;
        let cost = model.cost_per_metre(slope);
        if !(cost.is_finite() && cost >= 0.0) {
            return Err(Error::InvalidCostModel {
                model: model.name().to_string(),
                reason: format!("cost per metre {} at slope {}", cost, slope),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tobler_peaks_slightly_downhill() {
        let t = ToblerParams::default();
        // 6 km/h at s = -0.05
        assert_relative_eq!(t.cost_per_metre(-0.05), 0.6, epsilon = 1e-12);
        assert!(t.cost_per_metre(0.0) > t.cost_per_metre(-0.05));
        assert!(t.cost_per_metre(0.2) > t.cost_per_metre(-0.2));
    }

    #[test]
    fn tobler_respects_min_speed() {
        let t = ToblerParams::default();
        assert_relative_eq!(t.cost_per_metre(10.0), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn naismith_adds_climb_time() {
        let n = NaismithParams::default();
        assert_relative_eq!(n.cost_per_metre(0.0), 0.72, epsilon = 1e-12);
        assert_relative_eq!(n.cost_per_metre(-0.3), 0.72, epsilon = 1e-12);
        // 0.1 m climb per metre at 600 m/h = 0.6 s
        assert_relative_eq!(n.cost_per_metre(0.1), 1.32, epsilon = 1e-12);
    }

    #[test]
    fn isotropic_models_are_symmetric() {
        let (h, c, w) = (
            HerzogMetabolicParams::default(),
            ConollyLakeParams::default(),
            HerzogWheeledParams::default(),
        );
        let models: [&dyn SlopeCost; 3] = [&h, &c, &w];
        for m in models {
            assert_relative_eq!(m.cost_per_metre(0.25), m.cost_per_metre(-0.25), epsilon = 1e-12);
        }
    }

    #[test]
    fn flat_costs_match_base_speed() {
        assert_relative_eq!(HerzogMetabolicParams::default().cost_per_metre(0.0), 0.72, epsilon = 1e-12);
        assert_relative_eq!(ConollyLakeParams::default().cost_per_metre(0.0), 0.72, epsilon = 1e-12);
        assert_relative_eq!(HerzogWheeledParams::default().cost_per_metre(0.0), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn wheeled_halves_speed_at_critical_slope() {
        let w = HerzogWheeledParams::default();
        let s = 12f64.to_radians().tan();
        assert_relative_eq!(w.cost_per_metre(s), 1.8, epsilon = 1e-9);
    }

    #[test]
    fn pandolf_energy() {
        let p = PandolfParams::default();
        assert_eq!(p.units(), CostUnits::Joules);
        let v = 5.0 / 3.6;
        let flat = 1.5 * 70.0 + 70.0 * 1.5 * v * v;
        assert_relative_eq!(p.cost_per_metre(0.0), flat / v, epsilon = 1e-9);
        assert_relative_eq!(p.cost_per_metre(-0.2), flat / v, epsilon = 1e-9);
        assert!(p.cost_per_metre(0.1) > p.cost_per_metre(0.0));
    }

    #[test]
    fn presets_pass_validation() {
        for preset in [
            CostPreset::default(),
            CostPreset::Naismith(NaismithParams::default()),
            CostPreset::HerzogMetabolic(HerzogMetabolicParams::default()),
            CostPreset::ConollyLake(ConollyLakeParams::default()),
            CostPreset::HerzogWheeled(HerzogWheeledParams::default()),
            CostPreset::Pandolf(PandolfParams::default()),
            CostPreset::Uniform(UniformParams::default()),
        ] {
            preset.validate().unwrap();
            validate_model(&preset).unwrap();
        }
    }

    #[test]
    fn invalid_models_rejected() {
        let bad = CostPreset::Naismith(NaismithParams { horizontal_kmh: 0.0, ..Default::default() });
        assert!(matches!(bad.validate(), Err(Error::InvalidCostModel { .. })));

        let negative = UniformParams { cost_per_metre: -1.0 };
        assert!(matches!(validate_model(&negative), Err(Error::InvalidCostModel { .. })));

        let nan = UniformParams { cost_per_metre: f64::NAN };
        assert!(validate_model(&nan).is_err());
    }

    #[test]
    fn preset_from_json() {
        let p: CostPreset = serde_json::from_str(r#"{"model":"naismith","ascent_m_per_h":300}"#).unwrap();
        assert_eq!(
            p,
            CostPreset::Naismith(NaismithParams { horizontal_kmh: 5.0, ascent_m_per_h: 300.0 })
        );
        let t: CostPreset = serde_json::from_str(r#"{"model":"tobler"}"#).unwrap();
        assert_eq!(t, CostPreset::default());
    }

    #[test]
    fn display_units() {
        assert_eq!(CostUnits::Seconds.to_display(120.0), (2.0, "min"));
        assert_eq!(CostUnits::Joules.to_display(4184.0), (1.0, "kcal"));
    }
}
