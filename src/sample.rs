//! Sampling a name's value while sweeping another name across a range, e.g.
//! to draw a graph.

use crate::{ops::Context, Solver, SolveError};
use log::debug;
use std::ops::Range;

/// The half-open range of inputs `start..end`, visited `step` apart.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sweep {
    start: f64,
    end: f64,
    step: f64,
}

impl Sweep {
    /// Create a new [`Sweep`], failing unless `step` is finite and positive.
    pub fn new(range: Range<f64>, step: f64) -> Result<Self, SolveError> {
        if step.is_finite() && step > 0.0 {
            Ok(Sweep {
                start: range.start,
                end: range.end,
                step,
            })
        } else {
            Err(SolveError::InvalidStep { step })
        }
    }

    /// The `i`'th input.
    ///
    /// Inputs are calculated by multiplication rather than by repeatedly
    /// adding `step`, so rounding errors don't accumulate.
    fn input(&self, i: usize) -> f64 { self.start + i as f64 * self.step }

    pub fn len(&self) -> usize {
        if !(self.start < self.end) {
            return 0;
        }

        let mut len = ((self.end - self.start) / self.step).ceil() as usize;

        // rounding may put the last point on the end
        if len > 0 && self.input(len - 1) >= self.end {
            len -= 1;
        }

        len
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn inputs(&self) -> impl Iterator<Item = f64> {
        let sweep = *self;
        (0..self.len()).map(move |i| sweep.input(i))
    }
}

impl<C: Context> Solver<C> {
    /// Evaluate `target` once for every input in a [`Sweep`], binding
    /// `sweep_var` to that input first.
    ///
    /// `sweep_var` stays bound to the last input afterwards.
    pub fn sample(
        &mut self,
        target: &str,
        sweep_var: &str,
        sweep: Sweep,
    ) -> Result<Vec<(f64, f64)>, SolveError> {
        let sweep_var = self.check_name(sweep_var)?;
        let limit = self.config().max_samples;
        let len = sweep.len();

        if len > limit {
            return Err(SolveError::TooManySamples { limit });
        }

        debug!(
            "Sampling {} at {} values of {} ({:?})",
            target, len, sweep_var, sweep
        );

        let mut points = Vec::with_capacity(len);

        for input in sweep.inputs() {
            self.set_value(&sweep_var, input)?;
            let output = self.evaluate(target)?;
            points.push((input, output));
        }

        Ok(points)
    }
}
