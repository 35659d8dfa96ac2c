//! Boundary conditions bound to groups.

use serde::{Deserialize, Serialize};

/// Time dependence of a boundary condition.
///
/// [`scale`](TimeScaling::scale) is a pure function of the variant and the
/// time; the prescribed value at time `t` is `value * scale(t)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TimeScaling {
    #[default]
    Constant,
    /// 0 before `t_start`, 1 after `t_end`, linear in between.
    Ramp { t_start: f64, t_end: f64 },
    /// `sin(2π·frequency·t + phase)`
    Sine { frequency: f64, phase: f64 },
    /// 0 before `t_on`, 1 from `t_on` on.
    Step { t_on: f64 },
    /// Piecewise linear through `(times[i], values[i])`, constant outside.
    Table { times: Vec<f64>, values: Vec<f64> },
}

impl TimeScaling {
    pub fn scale(&self, t: f64) -> f64 {
        match self {
            TimeScaling::Constant => 1.0,
            TimeScaling::Ramp { t_start, t_end } => {
                if t <= *t_start {
                    0.0
                } else if t >= *t_end {
                    1.0
                } else {
                    (t - t_start) / (t_end - t_start)
                }
            }
            TimeScaling::Sine { frequency, phase } => {
                (2.0 * std::f64::consts::PI * frequency * t + phase).sin()
            }
            TimeScaling::Step { t_on } => {
                if t >= *t_on {
                    1.0
                } else {
                    0.0
                }
            }
            TimeScaling::Table { times, values } => table_lookup(times, values, t),
        }
    }
}

fn table_lookup(times: &[f64], values: &[f64], t: f64) -> f64 {
    let n = times.len().min(values.len());
    if n == 0 {
        return 1.0;
    }
    if t <= times[0] {
        return values[0];
    }
    if t >= times[n - 1] {
        return values[n - 1];
    }
    let k = times[..n].partition_point(|&x| x <= t);
    let (t0, t1) = (times[k - 1], times[k]);
    let (v0, v1) = (values[k - 1], values[k]);
    if t1 == t0 {
        return v1;
    }
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

/// What a boundary condition prescribes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BcKind {
    /// Fix every DOF of type `dof_type` in the group to `value`.
    Dirichlet { dof_type: usize, value: f64 },
    /// Load on DOF type `dof_type`: a point load on a bearing, a surface load
    /// on a sideset, a volume load on a block.
    Load { dof_type: usize, value: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub kind: BcKind,
    #[serde(default)]
    pub scaling: TimeScaling,
}

impl BoundaryCondition {
    pub fn dirichlet(dof_type: usize, value: f64) -> Self {
        Self {
            kind: BcKind::Dirichlet { dof_type, value },
            scaling: TimeScaling::Constant,
        }
    }

    pub fn load(dof_type: usize, value: f64) -> Self {
        Self {
            kind: BcKind::Load { dof_type, value },
            scaling: TimeScaling::Constant,
        }
    }

    pub fn with_scaling(mut self, scaling: TimeScaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn dof_type(&self) -> usize {
        match self.kind {
            BcKind::Dirichlet { dof_type, .. } | BcKind::Load { dof_type, .. } => dof_type,
        }
    }

    pub fn is_dirichlet(&self) -> bool {
        matches!(self.kind, BcKind::Dirichlet { .. })
    }

    /// Prescribed value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let v = match self.kind {
            BcKind::Dirichlet { value, .. } | BcKind::Load { value, .. } => value,
        };
        v * self.scaling.scale(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_and_step() {
        let r = TimeScaling::Ramp {
            t_start: 1.0,
            t_end: 3.0,
        };
        assert_eq!(r.scale(0.0), 0.0);
        assert_eq!(r.scale(2.0), 0.5);
        assert_eq!(r.scale(5.0), 1.0);
        let s = TimeScaling::Step { t_on: 2.0 };
        assert_eq!(s.scale(1.999), 0.0);
        assert_eq!(s.scale(2.0), 1.0);
    }

    #[test]
    fn table_interpolates_and_clamps() {
        let t = TimeScaling::Table {
            times: vec![0.0, 1.0, 2.0],
            values: vec![0.0, 10.0, 0.0],
        };
        assert_eq!(t.scale(-1.0), 0.0);
        assert_eq!(t.scale(0.5), 5.0);
        assert_eq!(t.scale(1.5), 5.0);
        assert_eq!(t.scale(9.0), 0.0);
    }

    #[test]
    fn sine_quarter_period() {
        let s = TimeScaling::Sine {
            frequency: 0.25,
            phase: 0.0,
        };
        assert!((s.scale(1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bc_value_follows_scaling() {
        let bc = BoundaryCondition::dirichlet(0, 4.0).with_scaling(TimeScaling::Ramp {
            t_start: 0.0,
            t_end: 2.0,
        });
        assert_eq!(bc.value_at(1.0), 2.0);
        assert!(bc.is_dirichlet());
        assert_eq!(BoundaryCondition::load(3, 1.0).dof_type(), 3);
    }

    #[test]
    fn json_form() {
        let bc = BoundaryCondition::load(1, 2.5);
        let s = serde_json::to_string(&bc).unwrap();
        let back: BoundaryCondition = serde_json::from_str(&s).unwrap();
        assert_eq!(back, bc);
    }
}
