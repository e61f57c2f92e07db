//! Packing entry points and strategy dispatch.
//!
//! A packing run validates the container and box specs, expands specs into unit
//! instances, hands them to the selected placement strategy and derives the
//! summary metrics. Every run owns its state; nothing is shared between calls.
//!
//! Failures to place a box are data, not errors: they show up in
//! [`PackingResult::unplaced_boxes`] with a reason code.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::best_fit::BestFitPacker;
use crate::constrained::ConstrainedPacker;
use crate::geometry::Orientation;
use crate::layer::LayerPacker;
use crate::metrics::PackingMetrics;
use crate::model::{BoxSpec, BoxUnit, Container, PlacedBox, UnplacedBox, UnplacedReason};
use crate::types::{EPSILON_GENERAL, EPSILON_HEIGHT, Vec3};

/// Numerical tolerances and scoring weights of the packing algorithms.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Relative tolerance for containment comparisons
    pub general_epsilon: f64,
    /// Absolute tolerance when matching a box top against a box bottom
    pub support_epsilon: f64,
    /// Allowed center-of-gravity deviation as a share of the smaller floor side
    pub stability_ratio: f64,
    /// Weight of the surface area term in the best-fit score
    pub surface_weight: f64,
}

impl PackingConfig {
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_SUPPORT_EPSILON: f64 = EPSILON_HEIGHT;
    pub const DEFAULT_STABILITY_RATIO: f64 = 0.15;
    pub const DEFAULT_SURFACE_WEIGHT: f64 = 0.1;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            support_epsilon: Self::DEFAULT_SUPPORT_EPSILON,
            stability_ratio: Self::DEFAULT_STABILITY_RATIO,
            surface_weight: Self::DEFAULT_SURFACE_WEIGHT,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn support_epsilon(mut self, epsilon: f64) -> Self {
        self.config.support_epsilon = epsilon;
        self
    }

    pub fn stability_ratio(mut self, ratio: f64) -> Self {
        self.config.stability_ratio = ratio;
        self
    }

    pub fn surface_weight(mut self, weight: f64) -> Self {
        self.config.surface_weight = weight;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Placement strategy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Row/column/layer fill in input order, no rotation.
    Layer,
    /// Volume-descending search over all free spaces and orientations.
    #[default]
    BestFit,
    /// First-fit decreasing with weight, support and stacking checks.
    Constrained,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Layer => "layer",
            Algorithm::BestFit => "best-fit",
            Algorithm::Constrained => "constrained",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "layer" => Ok(Algorithm::Layer),
            "best-fit" | "best_fit" | "bestfit" => Ok(Algorithm::BestFit),
            "constrained" | "heuristic" => Ok(Algorithm::Constrained),
            other => Err(format!("unknown packing algorithm '{}'", other)),
        }
    }
}

/// Per-call packing options.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PackingOptions {
    pub algorithm: Algorithm,
    /// Defaults to `true` for best-fit and constrained. The layer strategy never rotates.
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
    pub respect_stackability: bool,
    pub respect_fragility: bool,
    /// Reserved, currently without effect.
    pub optimize_for_weight: bool,
    /// Reserved, currently without effect.
    #[schema(nullable = true)]
    pub max_iterations: Option<u32>,
    /// Layer strategy only: stop placing after the first unit hits the ceiling.
    pub stop_on_overflow: bool,
}

impl PackingOptions {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, allow: bool) -> Self {
        self.allow_rotation = Some(allow);
        self
    }

    pub fn with_stackability(mut self, respect: bool) -> Self {
        self.respect_stackability = respect;
        self
    }

    pub fn with_fragility(mut self, respect: bool) -> Self {
        self.respect_fragility = respect;
        self
    }

    pub fn with_stop_on_overflow(mut self, stop: bool) -> Self {
        self.stop_on_overflow = stop;
        self
    }

    /// Whether the selected strategy searches over orientations.
    pub fn rotation_enabled(&self) -> bool {
        match self.algorithm {
            Algorithm::Layer => false,
            Algorithm::BestFit | Algorithm::Constrained => self.allow_rotation.unwrap_or(true),
        }
    }
}

/// Supplies display colors for box specs that do not carry one.
///
/// Implementations must be deterministic so repeated runs stay identical.
pub trait ColorAssigner {
    fn assign(&self, spec_index: usize, spec: &BoxSpec) -> Option<String>;
}

impl<F> ColorAssigner for F
where
    F: Fn(usize, &BoxSpec) -> Option<String>,
{
    fn assign(&self, spec_index: usize, spec: &BoxSpec) -> Option<String> {
        self(spec_index, spec)
    }
}

/// Cycles through a fixed list of colors by spec index.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    pub const DEFAULT_COLORS: [&'static str; 6] =
        ["#f87171", "#60a5fa", "#34d399", "#facc15", "#a78bfa", "#8b5cf6"];

    pub fn new(colors: Vec<String>) -> Self {
        Self { colors }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COLORS.iter().map(|c| c.to_string()).collect())
    }
}

impl ColorAssigner for Palette {
    fn assign(&self, spec_index: usize, _spec: &BoxSpec) -> Option<String> {
        if self.colors.is_empty() {
            return None;
        }
        Some(self.colors[spec_index % self.colors.len()].clone())
    }
}

/// Events emitted during packing, for live visualization.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// The run started with this many valid units.
    Started {
        algorithm: Algorithm,
        container: Vec3,
        units: usize,
    },
    /// A unit was placed.
    BoxPlaced {
        spec_index: usize,
        instance: usize,
        id: Option<String>,
        position: Vec3,
        dims: Vec3,
        orientation: Orientation,
        total_weight: f64,
    },
    /// `quantity` units of a spec could not be placed.
    BoxRejected {
        spec_index: usize,
        id: Option<String>,
        dims: Vec3,
        quantity: u32,
        reason_code: String,
        reason_text: String,
    },
    /// The run finished.
    Finished { placed: usize, unplaced: usize },
}

/// Outcome of a packing run.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PackingResult {
    pub algorithm: Algorithm,
    /// Placed units in placement order.
    pub placed_boxes: Vec<PlacedBox>,
    pub unplaced_boxes: Vec<UnplacedBox>,
    pub metrics: PackingMetrics,
}

impl PackingResult {
    /// Whether every unit was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced_boxes.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placed_boxes.len()
    }

    /// Number of unplaced units (sum of quantities).
    pub fn unplaced_count(&self) -> usize {
        self.unplaced_boxes
            .iter()
            .map(|entry| entry.quantity() as usize)
            .sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.metrics.total_weight
    }
}

/// Common contract of the placement strategies.
pub trait PlacementStrategy {
    /// Places `units` into `container`, reporting each outcome to `run`.
    fn place(&self, container: &Container, units: Vec<BoxUnit>, run: &mut PackingRun<'_>);
}

/// Unplaced unit counts aggregated per (spec, reason), in first-seen order.
#[derive(Clone, Debug, Default)]
struct UnplacedLedger {
    entries: Vec<(usize, UnplacedReason, u32)>,
}

impl UnplacedLedger {
    fn record(&mut self, spec_index: usize, reason: UnplacedReason, count: u32) {
        match self
            .entries
            .iter_mut()
            .find(|(index, r, _)| *index == spec_index && *r == reason)
        {
            Some((_, _, total)) => *total += count,
            None => self.entries.push((spec_index, reason, count)),
        }
    }

    fn into_unplaced(self, specs: &[BoxSpec]) -> Vec<UnplacedBox> {
        self.entries
            .into_iter()
            .map(|(spec_index, reason, count)| {
                let mut spec = specs[spec_index].clone();
                spec.quantity = count;
                UnplacedBox {
                    spec_index,
                    spec,
                    reason,
                }
            })
            .collect()
    }
}

/// Mutable state of one packing run, shared with the strategy.
pub struct PackingRun<'a> {
    placed: Vec<PlacedBox>,
    ledger: UnplacedLedger,
    total_weight: f64,
    on_event: &'a mut dyn FnMut(&PackEvent),
}

impl<'a> PackingRun<'a> {
    fn new(on_event: &'a mut dyn FnMut(&PackEvent)) -> Self {
        Self {
            placed: Vec::new(),
            ledger: UnplacedLedger::default(),
            total_weight: 0.0,
            on_event,
        }
    }

    /// Boxes placed so far.
    pub fn placed(&self) -> &[PlacedBox] {
        &self.placed
    }

    /// Weight of all boxes placed so far.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Commits a placement.
    pub fn place(&mut self, placed: PlacedBox) {
        self.total_weight += placed.unit.weight;
        log::trace!(
            "placed spec {} #{} at {:?} as {:?}",
            placed.unit.spec_index,
            placed.unit.instance,
            placed.position,
            placed.dims
        );
        (self.on_event)(&PackEvent::BoxPlaced {
            spec_index: placed.unit.spec_index,
            instance: placed.unit.instance,
            id: placed.unit.id.clone(),
            position: placed.position,
            dims: placed.dims,
            orientation: placed.orientation,
            total_weight: self.total_weight,
        });
        self.placed.push(placed);
    }

    /// Reports a unit that could not be placed.
    pub fn reject(&mut self, unit: &BoxUnit, reason: UnplacedReason) {
        log::debug!(
            "spec {} #{} unplaced: {}",
            unit.spec_index,
            unit.instance,
            reason.code()
        );
        (self.on_event)(&PackEvent::BoxRejected {
            spec_index: unit.spec_index,
            id: unit.id.clone(),
            dims: unit.dims,
            quantity: 1,
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
        self.ledger.record(unit.spec_index, reason, 1);
    }

    fn reject_spec(&mut self, spec_index: usize, spec: &BoxSpec, reason: UnplacedReason) {
        (self.on_event)(&PackEvent::BoxRejected {
            spec_index,
            id: spec.id.clone(),
            dims: spec.dims,
            quantity: spec.quantity,
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
        self.ledger.record(spec_index, reason, spec.quantity);
    }
}

/// A configured packing engine.
///
/// # Examples
/// ```
/// use boxfit::model::{BoxSpec, Container};
/// use boxfit::optimizer::{Algorithm, Packer, PackingOptions, Palette};
///
/// let container = Container::new((100.0, 100.0, 100.0), None).unwrap();
/// let boxes = vec![BoxSpec::new((20.0, 20.0, 20.0), 3)];
///
/// let packer = Packer::new(PackingOptions::new(Algorithm::Layer))
///     .with_color_assigner(Palette::default());
/// let result = packer.pack(&container, &boxes);
///
/// assert_eq!(result.placed_count(), 3);
/// assert!(result.is_complete());
/// assert_eq!(result.placed_boxes[0].unit.color.as_deref(), Some("#f87171"));
/// ```
#[derive(Clone, Default)]
pub struct Packer {
    options: PackingOptions,
    config: PackingConfig,
    color_assigner: Option<Arc<dyn ColorAssigner + Send + Sync>>,
}

impl fmt::Debug for Packer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packer")
            .field("options", &self.options)
            .field("config", &self.config)
            .field("color_assigner", &self.color_assigner.is_some())
            .finish()
    }
}

impl Packer {
    pub fn new(options: PackingOptions) -> Self {
        Self {
            options,
            config: PackingConfig::default(),
            color_assigner: None,
        }
    }

    pub fn with_config(mut self, config: PackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_color_assigner(mut self, assigner: impl ColorAssigner + Send + Sync + 'static) -> Self {
        self.color_assigner = Some(Arc::new(assigner));
        self
    }

    pub fn options(&self) -> &PackingOptions {
        &self.options
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Packs `boxes` into `container`.
    pub fn pack(&self, container: &Container, boxes: &[BoxSpec]) -> PackingResult {
        self.pack_with_progress(container, boxes, |_| {})
    }

    /// Packs `boxes` into `container`, calling `on_event` for every step.
    pub fn pack_with_progress(
        &self,
        container: &Container,
        boxes: &[BoxSpec],
        mut on_event: impl FnMut(&PackEvent),
    ) -> PackingResult {
        let options = &self.options;
        if options.optimize_for_weight || options.max_iterations.is_some() {
            log::debug!("optimize_for_weight and max_iterations are reserved and have no effect");
        }
        if options.algorithm == Algorithm::Layer && options.allow_rotation == Some(true) {
            log::debug!("layer strategy ignores allow_rotation");
        }

        let mut run = PackingRun::new(&mut on_event);

        if let Err(err) = container.validate() {
            log::warn!("rejecting all boxes, container is invalid: {}", err);
            (run.on_event)(&PackEvent::Started {
                algorithm: options.algorithm,
                container: container.dims,
                units: 0,
            });
            for (spec_index, spec) in boxes.iter().enumerate() {
                run.reject_spec(spec_index, spec, UnplacedReason::InvalidContainer);
            }
            return self.finish(container, boxes, run);
        }

        let mut units = Vec::new();
        let mut invalid = Vec::new();
        for (spec_index, spec) in boxes.iter().enumerate() {
            match spec.validate() {
                Ok(()) => {
                    let color = spec.color.clone().or_else(|| {
                        self.color_assigner
                            .as_ref()
                            .and_then(|assigner| assigner.assign(spec_index, spec))
                    });
                    units.extend(spec.units(spec_index, color));
                }
                Err(err) => {
                    log::warn!("box spec {} excluded from packing: {}", spec_index, err);
                    invalid.push(spec_index);
                }
            }
        }

        log::debug!(
            "packing {} units with {} ({} invalid specs)",
            units.len(),
            options.algorithm,
            invalid.len()
        );
        (run.on_event)(&PackEvent::Started {
            algorithm: options.algorithm,
            container: container.dims,
            units: units.len(),
        });
        for spec_index in invalid {
            run.reject_spec(spec_index, &boxes[spec_index], UnplacedReason::InvalidBox);
        }

        self.strategy().place(container, units, &mut run);
        self.finish(container, boxes, run)
    }

    fn strategy(&self) -> Box<dyn PlacementStrategy> {
        let options = &self.options;
        let config = &self.config;
        match options.algorithm {
            Algorithm::Layer => Box::new(LayerPacker::new(options, config)),
            Algorithm::BestFit => Box::new(BestFitPacker::new(options, config)),
            Algorithm::Constrained => Box::new(ConstrainedPacker::new(options, config)),
        }
    }

    fn finish(&self, container: &Container, boxes: &[BoxSpec], run: PackingRun<'_>) -> PackingResult {
        let PackingRun {
            placed: placed_boxes,
            ledger,
            on_event,
            ..
        } = run;
        let unplaced_boxes = ledger.into_unplaced(boxes);
        let metrics = PackingMetrics::compute(container, &placed_boxes, &unplaced_boxes, &self.config);
        on_event(&PackEvent::Finished {
            placed: metrics.placed_count,
            unplaced: metrics.unplaced_count,
        });
        PackingResult {
            algorithm: self.options.algorithm,
            placed_boxes,
            unplaced_boxes,
            metrics,
        }
    }
}

/// Packs `boxes` into `container` with default tolerances and no color assignment.
///
/// Never panics: invalid input and boxes that do not fit are reported in
/// [`PackingResult::unplaced_boxes`].
pub fn pack(container: &Container, boxes: &[BoxSpec], options: &PackingOptions) -> PackingResult {
    Packer::new(options.clone()).pack(container, boxes)
}
