// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

use std::fmt::Display;

/// Number of decimals price changes are rounded to before averaging.
const CHANGE_DECIMALS: i32 = 2;

/// One output record of the [`RelativeStrengthIndex`] transform.
///
/// Averages, relative strength and RSI are `None` until `period` changes have been
/// observed (i.e. for the first `period` records).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RsiPoint {
    /// The input value.
    pub value: f64,
    /// Change from the previous value (rounded to 2 decimals, zero for the first).
    pub change: f64,
    /// Positive part of the change.
    pub gain: f64,
    /// Absolute negative part of the change.
    pub loss: f64,
    /// Smoothed average gain.
    pub avg_gain: Option<f64>,
    /// Smoothed average loss.
    pub avg_loss: Option<f64>,
    /// Relative strength `avg_gain / avg_loss`.
    pub rs: Option<f64>,
    /// Relative strength index in the range [0, 100].
    pub rsi: Option<f64>,
}

/// Relative Strength Index using Wilder's smoothing.
///
/// The first average is the simple mean of the first `period` changes, subsequent
/// averages follow `avg[i] = (avg[i-1] * (period - 1) + x[i]) / period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelativeStrengthIndex {
    /// The smoothing period.
    pub period: usize,
}

impl Display for RelativeStrengthIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", stringify!(RelativeStrengthIndex), self.period)
    }
}

#[derive(Clone, Copy, Debug)]
enum Side {
    Gain,
    Loss,
}

impl RelativeStrengthIndex {
    /// Creates a new [`RelativeStrengthIndex`] instance.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    #[must_use]
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "`period` must be positive, was {period}");
        Self { period }
    }

    /// Computes the indicator over chronologically ordered `values`.
    #[must_use]
    pub fn calculate(&self, values: &[f64]) -> Vec<RsiPoint> {
        let mut points = gains_and_losses(values);
        self.smooth(&mut points, Side::Gain);
        self.smooth(&mut points, Side::Loss);
        relative_strength(&mut points);
        relative_strength_index(&mut points);
        points
    }

    fn smooth(&self, points: &mut [RsiPoint], side: Side) {
        let period = self.period as f64;
        let mut sum = 0.0;
        let mut prev_avg = 0.0;

        for (idx, point) in points.iter_mut().enumerate() {
            let x = match side {
                Side::Gain => point.gain,
                Side::Loss => point.loss,
            };

            let avg = if idx < self.period {
                sum += x;
                continue;
            } else if idx == self.period {
                (sum + x) / period
            } else {
                (prev_avg * (period - 1.0) + x) / period
            };

            prev_avg = avg;
            match side {
                Side::Gain => point.avg_gain = Some(avg),
                Side::Loss => point.avg_loss = Some(avg),
            }
        }
    }
}

fn round_change(change: f64) -> f64 {
    let factor = 10f64.powi(CHANGE_DECIMALS);
    (change * factor).round() / factor
}

fn gains_and_losses(values: &[f64]) -> Vec<RsiPoint> {
    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|&value| {
            let change = prev.map_or(0.0, |p| round_change(value - p));
            prev = Some(value);
            RsiPoint {
                value,
                change,
                gain: change.max(0.0),
                loss: (-change).max(0.0),
                ..RsiPoint::default()
            }
        })
        .collect()
}

fn relative_strength(points: &mut [RsiPoint]) {
    for point in points {
        if let (Some(avg_gain), Some(avg_loss)) = (point.avg_gain, point.avg_loss) {
            point.rs = Some(avg_gain / avg_loss);
        }
    }
}

fn relative_strength_index(points: &mut [RsiPoint]) {
    for point in points {
        let (Some(rs), Some(avg_loss)) = (point.rs, point.avg_loss) else {
            continue;
        };

        point.rsi = if avg_loss == 0.0 {
            Some(100.0)
        } else {
            Some(100.0 - 100.0 / (1.0 + rs))
        };
    }
}
