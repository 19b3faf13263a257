//! Dormand-Prince 8(5,3) integrator with adaptive step control and event detection.
//!
//! The 12-stage DOP853 pair of Hairer, Nørsett & Wanner (Solving ODEs I, II.10)
//! propagates the eighth-order solution. Its local error blends the fifth- and
//! third-order embedded estimates the way `DOP853` and scipy's `solve_ivp` do.
//!
//! Event crossings are located with Brent's method on re-stepped states. A step that
//! runs past a crossing by more than a relative resolution is rejected and retried over
//! a fixed fraction of the distance to the located root, so no accepted step straddles
//! an event. Right-hand sides that jump where an event fires, such as an equation of
//! state with a first-order phase transition, are never smeared across the jump, and
//! the root found from a polluted step is refined as the steps shrink.

use super::roots::{Brent, Point, RootError};
use nalgebra::SVector;
use std::fmt;
use thiserror::Error;

pub type State<const N: usize> = SVector<f64, N>;

const STAGES: usize = 12;

#[rustfmt::skip]
const C: [f64; STAGES] = [
    0.0,
    0.052_600_151_958_767_731_878_558_754_448_8,
    0.078_900_227_938_151_597_817_838_131_673_2,
    0.118_350_341_907_227_396_726_757_197_510,
    0.281_649_658_092_772_603_273_242_802_490,
    1.0 / 3.0,
    0.25,
    0.307_692_307_692_307_692_307_692_307_692,
    0.651_282_051_282_051_282_051_282_051_282,
    0.6,
    0.857_142_857_142_857_142_857_142_857_142,
    1.0,
];

#[rustfmt::skip]
const A: [[f64; STAGES - 1]; STAGES] = [
    [0.0; 11],
    [5.260_015_195_876_773_187_855_875_444_88e-2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.972_505_698_453_789_945_445_953_291_83e-2, 5.917_517_095_361_369_836_337_859_875_49e-2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2.958_758_547_680_684_918_168_929_937_75e-2, 0.0, 8.876_275_643_042_054_754_506_789_813_24e-2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2.413_651_341_592_666_855_023_697_986_65e-1, 0.0, -8.845_494_793_282_860_853_448_649_627_17e-1, 9.248_340_032_617_920_031_157_379_665_43e-1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.703_703_703_703_703_703_703_703_703_70e-2, 0.0, 0.0, 1.708_286_087_294_738_712_796_044_821_73e-1, 1.254_676_875_668_224_250_166_918_141_23e-1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.710_937_5e-2, 0.0, 0.0, 1.702_522_110_195_440_393_149_780_602_72e-1, 6.021_653_898_045_596_068_502_193_972_83e-2, -1.757_812_5e-2, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.709_200_011_850_479_271_087_793_198_36e-2, 0.0, 0.0, 1.703_839_257_122_399_938_102_140_547_05e-1, 1.072_620_304_463_732_846_518_091_991_68e-1, -1.531_943_774_862_440_175_279_361_582_36e-2, 8.273_789_163_814_022_887_584_737_660_02e-3, 0.0, 0.0, 0.0, 0.0],
    [6.241_109_587_160_757_171_144_295_778_12e-1, 0.0, 0.0, -3.360_892_629_446_941_294_068_571_098_25, -8.682_193_468_417_260_068_181_898_914_53e-1, 2.759_209_969_944_670_830_494_156_007_97e1, 2.015_406_755_047_789_340_861_867_889_79e1, -4.348_988_418_106_995_884_773_662_551_44e1, 0.0, 0.0, 0.0],
    [4.776_625_364_382_643_658_904_339_085_27e-1, 0.0, 0.0, -2.488_114_619_971_667_641_926_425_864_68, -5.902_908_268_368_429_963_714_464_757_43e-1, 2.123_005_144_818_119_423_472_889_498_97e1, 1.527_923_363_288_242_358_325_969_229_38e1, -3.328_821_096_898_486_291_944_532_655_87e1, -2.033_120_170_850_862_613_582_229_285_93e-2, 0.0, 0.0],
    [-9.371_424_300_859_873_257_170_402_165_8e-1, 0.0, 0.0, 5.186_372_428_844_063_708_300_238_532_09, 1.091_437_348_996_729_578_185_002_546_54, -8.149_787_010_746_926_125_139_972_673_57, -1.852_006_565_999_695_986_415_661_807_01e1, 2.273_948_709_935_050_428_189_700_567_34e1, 2.493_605_552_679_652_389_870_893_967_62, -3.046_764_471_898_219_500_382_366_902_2, 0.0],
    [2.273_310_147_516_538_207_923_597_684_49, 0.0, 0.0, -1.053_449_546_673_725_019_840_666_898_79e1, -2.000_872_058_224_862_499_096_757_184_44, -1.795_893_186_311_879_891_727_659_505_34e1, 2.794_888_452_941_996_005_084_998_088_37e1, -2.858_998_277_135_023_694_740_655_086_74, -8.872_856_933_530_629_544_335_492_892_58, 1.236_056_717_579_430_306_472_662_015_28e1, 6.433_927_460_157_635_303_559_704_840_46e-1],
];

/// Eighth-order weights.
#[rustfmt::skip]
const B: [f64; STAGES] = [
    5.429_373_411_656_876_223_805_357_663_63e-2,
    0.0,
    0.0,
    0.0,
    0.0,
    4.450_312_892_752_408_881_441_139_505_66,
    1.891_517_899_314_500_383_042_815_990_44,
    -5.801_203_960_010_584_781_467_211_422_7,
    3.111_643_669_578_198_944_089_160_623_7e-1,
    -1.521_609_496_625_160_785_561_788_068_05e-1,
    2.013_654_008_040_303_483_747_765_375_01e-1,
    4.471_061_572_777_259_051_768_855_690_43e-2,
];

/// Fifth-order error weights.
#[rustfmt::skip]
const E5: [f64; STAGES] = [
    0.131_200_449_941_948_807_325_010_299_6e-1,
    0.0,
    0.0,
    0.0,
    0.0,
    -0.122_515_644_637_620_444_072_056_975_3e1,
    -0.495_758_949_657_250_191_521_407_995_2,
    0.166_437_718_245_498_653_696_153_041_5e1,
    -0.350_328_848_749_973_681_688_648_729_0,
    0.334_179_118_713_017_479_029_731_884_1,
    0.819_232_064_851_157_124_657_074_261_3e-1,
    -0.223_553_078_638_862_952_588_442_784_5e-1,
];

/// Third-order error weights: `B` minus the third-order solution.
#[rustfmt::skip]
const E3: [f64; STAGES] = [
    B[0] - 0.244_094_488_188_976_377_952_755_905_512,
    0.0,
    0.0,
    0.0,
    0.0,
    B[5],
    B[6],
    B[7],
    B[8] - 0.733_846_688_281_611_857_341_361_741_547,
    B[9],
    B[10],
    B[11] - 0.220_588_235_294_117_647_058_823_529_412e-1,
];

/// The blended estimate behaves like a seventh-order error.
const ERROR_EXPONENT: f64 = -1.0 / 8.0;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const NON_FINITE_FACTOR: f64 = 0.1;

/// A step may run past a crossing by at most twice this fraction of `|t|`.
const EVENT_RESOLUTION: f64 = 1e-12;
/// Fraction of the distance to a located crossing covered by the next approach step.
const EVENT_APPROACH: f64 = 0.9;

pub trait OdeSystem<const N: usize> {
    fn rhs(&self, t: f64, y: &State<N>) -> State<N>;
}

impl<F, const N: usize> OdeSystem<N> for F
where
    F: Fn(f64, &State<N>) -> State<N>,
{
    #[inline]
    fn rhs(&self, t: f64, y: &State<N>) -> State<N> {
        self(t, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDirection {
    Rising,
    Falling,
    #[default]
    Either,
}

impl EventDirection {
    fn crossed(self, before: f64, after: f64) -> bool {
        let rising = before < 0.0 && after >= 0.0;
        let falling = before > 0.0 && after <= 0.0;
        match self {
            EventDirection::Rising => rising,
            EventDirection::Falling => falling,
            EventDirection::Either => rising || falling,
        }
    }
}

pub type EventFn<'a, const N: usize> = Box<dyn Fn(f64, &State<N>) -> f64 + Send + Sync + 'a>;

/// A scalar function of the state whose zero crossings are recorded during integration.
pub struct Event<'a, const N: usize> {
    function: EventFn<'a, N>,
    pub terminal: bool,
    pub direction: EventDirection,
}

impl<'a, const N: usize> Event<'a, N> {
    pub fn new(function: impl Fn(f64, &State<N>) -> f64 + Send + Sync + 'a) -> Self {
        Self {
            function: Box::new(function),
            terminal: false,
            direction: EventDirection::Either,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn direction(mut self, direction: EventDirection) -> Self {
        self.direction = direction;
        self
    }

    #[inline]
    pub fn eval(&self, t: f64, y: &State<N>) -> f64 {
        (self.function)(t, y)
    }
}

impl<const N: usize> fmt::Debug for Event<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("terminal", &self.terminal)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord<const N: usize> {
    pub t: f64,
    pub y: State<N>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The end of the interval was reached.
    Completed,
    /// The terminal event with this index fired.
    Event(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
}

#[derive(Debug, Clone)]
pub struct Solution<const N: usize> {
    pub t: Vec<f64>,
    pub y: Vec<State<N>>,
    /// Crossings per event, in the order the events were supplied.
    pub events: Vec<Vec<EventRecord<N>>>,
    pub termination: Termination,
    pub stats: Stats,
}

impl<const N: usize> Solution<N> {
    pub fn last(&self) -> Option<(f64, &State<N>)> {
        self.t.last().copied().zip(self.y.last())
    }

    /// Component `index` of every recorded state.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.y.iter().map(|y| y[index]).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("Invalid integration interval [{start}, {end}]: the end must lie beyond the start")]
    InvalidInterval { start: f64, end: f64 },

    #[error("Checkpoints must increase strictly from the start to the end of the interval")]
    InvalidCheckpoints,

    #[error("Initial state is not finite at t = {t}")]
    NonFiniteInitialState { t: f64 },

    #[error("Step size {step:e} became too small at t = {t}")]
    StepSizeUnderflow { t: f64, step: f64 },

    #[error("Exceeded the budget of {max_steps} step attempts at t = {t}")]
    TooManySteps { t: f64, max_steps: usize },

    #[error("Event location failed: {0}")]
    EventLocation(#[from] RootError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances<const N: usize> {
    pub relative: f64,
    pub absolute: State<N>,
}

impl<const N: usize> Tolerances<N> {
    pub fn new(relative: f64, absolute: [f64; N]) -> Self {
        Self {
            relative,
            absolute: State::from(absolute),
        }
    }

    pub fn uniform(relative: f64, absolute: f64) -> Self {
        Self {
            relative,
            absolute: State::repeat(absolute),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dop853<const N: usize> {
    tolerances: Tolerances<N>,
    max_steps: usize,
}

impl<const N: usize> Dop853<N> {
    pub const DEFAULT_MAX_STEPS: usize = 100_000;

    pub fn new(tolerances: Tolerances<N>) -> Self {
        Self {
            tolerances,
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Integrates forward over `t_span`.
    ///
    /// Without checkpoints every accepted step is recorded; with checkpoints the steps
    /// are shortened to land exactly on each of them and only those states are kept.
    /// Checkpoints must start at `t_span.0` and end at `t_span.1`. A terminal event
    /// stops the integration and its crossing becomes the last recorded state.
    pub fn integrate<S: OdeSystem<N>>(
        &self,
        system: &S,
        t_span: (f64, f64),
        y0: State<N>,
        checkpoints: Option<&[f64]>,
        events: &[Event<'_, N>],
    ) -> Result<Solution<N>, IntegrationError> {
        let (t0, t1) = t_span;
        if !(t1 > t0) || !t0.is_finite() || !t1.is_finite() {
            return Err(IntegrationError::InvalidInterval { start: t0, end: t1 });
        }
        let stops: Vec<f64> = match checkpoints {
            Some(points) => {
                let valid = points.len() >= 2
                    && points[0] == t0
                    && points[points.len() - 1] == t1
                    && points.windows(2).all(|w| w[1] > w[0]);
                if !valid {
                    return Err(IntegrationError::InvalidCheckpoints);
                }
                points[1..].to_vec()
            }
            None => vec![t1],
        };
        let record_every_step = checkpoints.is_none();

        if !y0.iter().all(|v| v.is_finite()) {
            return Err(IntegrationError::NonFiniteInitialState { t: t0 });
        }

        let mut stats = Stats::default();
        let mut t = t0;
        let mut y = y0;
        let mut f = system.rhs(t, &y);
        stats.rhs_evaluations += 1;

        let mut solution = Solution {
            t: vec![t0],
            y: vec![y0],
            events: vec![Vec::new(); events.len()],
            termination: Termination::Completed,
            stats,
        };

        let mut h = self.initial_step(system, t0, &y0, &f, t1 - t0, &mut stats);
        let mut g_previous: Vec<f64> = events.iter().map(|e| e.eval(t, &y)).collect();
        let mut next_stop = 0;
        let mut attempts = 0;
        // Step size in use before the last crossing was first seen.
        let mut h_resume: Option<f64> = None;
        let mut approaching = false;

        loop {
            attempts += 1;
            if attempts > self.max_steps {
                return Err(IntegrationError::TooManySteps {
                    t,
                    max_steps: self.max_steps,
                });
            }

            let stop = stops[next_stop];
            let hits_stop = h >= stop - t;
            let h_try = if hits_stop { stop - t } else { h };

            let (y_new, k) = self.step(system, t, &y, &f, h_try);
            stats.rhs_evaluations += STAGES - 1;
            let error_norm = self.error_norm(&y, &y_new, &k, h_try);

            if !(error_norm <= 1.0) || !y_new.iter().all(|v| v.is_finite()) {
                stats.rejected_steps += 1;
                approaching = false;
                let factor = if error_norm.is_finite() {
                    (SAFETY * error_norm.powf(ERROR_EXPONENT)).max(MIN_FACTOR)
                } else {
                    NON_FINITE_FACTOR
                };
                h = h_try * factor;
                if h < min_step(t) {
                    return Err(IntegrationError::StepSizeUnderflow { t, step: h });
                }
                continue;
            }

            let t_new = if hits_stop { stop } else { t + h_try };
            let g_new: Vec<f64> = events.iter().map(|e| e.eval(t_new, &y_new)).collect();

            let mut crossings = Vec::new();
            for (index, event) in events.iter().enumerate() {
                if event.direction.crossed(g_previous[index], g_new[index]) {
                    let lower = Point {
                        x: t,
                        f: g_previous[index],
                    };
                    let upper = Point {
                        x: t_new,
                        f: g_new[index],
                    };
                    let located = Brent::default().search(lower, upper, |at| {
                        let (state, _) = self.step(system, t, &y, &f, at - t);
                        Ok::<_, RootError>(event.eval(at, &state))
                    })?;
                    stats.rhs_evaluations += (located.evals as usize) * (STAGES - 1);
                    crossings.push((located.root, index));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let resolution = (EVENT_RESOLUTION * t.abs()).max(min_step(t));
            if let Some(&(t_first, _)) = crossings.first() {
                if t_new - t_first > 2.0 * resolution {
                    // Retry short of the crossing so the step never spans it.
                    stats.rejected_steps += 1;
                    h_resume.get_or_insert(h_try);
                    h = (EVENT_APPROACH * (t_first - t)).max(resolution);
                    approaching = true;
                    continue;
                }
            }

            let located = !crossings.is_empty();
            for (t_event, index) in crossings {
                let y_event = if t_event == t_new {
                    y_new
                } else {
                    self.step(system, t, &y, &f, t_event - t).0
                };
                solution.events[index].push(EventRecord {
                    t: t_event,
                    y: y_event,
                });
                if events[index].terminal {
                    stats.accepted_steps += 1;
                    if t_event > solution.t[solution.t.len() - 1] {
                        solution.t.push(t_event);
                        solution.y.push(y_event);
                    }
                    solution.termination = Termination::Event(index);
                    solution.stats = stats;
                    return Ok(solution);
                }
                if record_every_step && t_event > solution.t[solution.t.len() - 1] {
                    solution.t.push(t_event);
                    solution.y.push(y_event);
                }
            }
            g_previous = g_new;

            stats.accepted_steps += 1;
            let growth = if error_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * error_norm.powf(ERROR_EXPONENT)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            let proposed = h_try * growth;
            h = if hits_stop { h.max(proposed) } else { proposed };
            if located {
                if let Some(resume) = h_resume.take() {
                    h = h.max(resume);
                }
            }

            t = t_new;
            y = y_new;
            f = system.rhs(t, &y);
            stats.rhs_evaluations += 1;

            let regular = !approaching && !located;
            if (record_every_step && regular) || hits_stop {
                solution.t.push(t);
                solution.y.push(y);
            }
            approaching = false;

            if hits_stop {
                next_stop += 1;
                if next_stop == stops.len() {
                    solution.stats = stats;
                    return Ok(solution);
                }
            }
        }
    }

    /// One DOP853 step of size `h`: the eighth-order state and the stage derivatives.
    fn step<S: OdeSystem<N>>(
        &self,
        system: &S,
        t: f64,
        y: &State<N>,
        f0: &State<N>,
        h: f64,
    ) -> (State<N>, [State<N>; STAGES]) {
        let mut k = [State::<N>::zeros(); STAGES];
        k[0] = *f0;
        for i in 1..STAGES {
            let mut stage = *y;
            for j in 0..i {
                if A[i][j] != 0.0 {
                    stage += k[j] * (h * A[i][j]);
                }
            }
            k[i] = system.rhs(t + C[i] * h, &stage);
        }

        let mut y_new = *y;
        for i in 0..STAGES {
            if B[i] != 0.0 {
                y_new += k[i] * (h * B[i]);
            }
        }

        (y_new, k)
    }

    /// Hairer's blended norm `|h| e5² / sqrt(N (e5² + 0.01 e3²))` of the embedded errors.
    fn error_norm(&self, y: &State<N>, y_new: &State<N>, k: &[State<N>; STAGES], h: f64) -> f64 {
        let mut err5 = State::<N>::zeros();
        let mut err3 = State::<N>::zeros();
        for i in 0..STAGES {
            err5 += k[i] * E5[i];
            err3 += k[i] * E3[i];
        }
        let (mut e5, mut e3) = (0.0, 0.0);
        for i in 0..N {
            let scale = self.tolerances.absolute[i]
                + self.tolerances.relative * y[i].abs().max(y_new[i].abs());
            e5 += (err5[i] / scale).powi(2);
            e3 += (err3[i] / scale).powi(2);
        }
        if e5 == 0.0 && e3 == 0.0 {
            return 0.0;
        }
        h.abs() * e5 / ((e5 + 0.01 * e3) * N as f64).sqrt()
    }

    fn scaled_norm(&self, v: &State<N>, reference: &State<N>) -> f64 {
        let sum: f64 = (0..N)
            .map(|i| {
                let scale =
                    self.tolerances.absolute[i] + self.tolerances.relative * reference[i].abs();
                (v[i] / scale).powi(2)
            })
            .sum();
        (sum / N as f64).sqrt()
    }

    /// Starting step following Hairer, Nørsett & Wanner (II.4).
    fn initial_step<S: OdeSystem<N>>(
        &self,
        system: &S,
        t0: f64,
        y0: &State<N>,
        f0: &State<N>,
        span: f64,
        stats: &mut Stats,
    ) -> f64 {
        let d0 = self.scaled_norm(y0, y0);
        let d1 = self.scaled_norm(f0, y0);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6_f64.min(span)
        } else {
            (0.01 * d0 / d1).min(span)
        };

        let y1 = y0 + f0 * h0;
        let f1 = system.rhs(t0 + h0, &y1);
        stats.rhs_evaluations += 1;
        let mut d2 = self.scaled_norm(&(f1 - f0), y0) / h0;
        if !d2.is_finite() {
            d2 = 1e300;
        }

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(-ERROR_EXPONENT)
        };

        (100.0 * h0).min(h1).min(span)
    }
}

#[inline]
fn min_step(t: f64) -> f64 {
    10.0 * f64::EPSILON * t.abs().max(f64::MIN_POSITIVE)
}
