//! Canonical surface variables and a per-variable container.

use serde::{Deserialize, Serialize};

/// The three near-surface variables the engine works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// 2-meter air temperature.
    Temperature,
    /// 10-meter eastward wind component.
    WindU,
    /// 10-meter northward wind component.
    WindV,
}

impl Variable {
    /// All canonical variables in storage order.
    pub const ALL: [Variable; 3] = [Variable::Temperature, Variable::WindU, Variable::WindV];

    /// Canonical short name used for store paths and logs.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Variable::Temperature => "t2m",
            Variable::WindU => "u10",
            Variable::WindV => "v10",
        }
    }

    /// Units after normalization.
    pub fn canonical_units(&self) -> &'static str {
        match self {
            Variable::Temperature => "degC",
            Variable::WindU | Variable::WindV => "m s-1",
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// One value per canonical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFields<T> {
    pub t2m: T,
    pub u10: T,
    pub v10: T,
}

impl<T> SurfaceFields<T> {
    pub fn new(t2m: T, u10: T, v10: T) -> Self {
        Self { t2m, u10, v10 }
    }

    /// Build by calling `f` once per variable.
    pub fn from_fn(mut f: impl FnMut(Variable) -> T) -> Self {
        Self {
            t2m: f(Variable::Temperature),
            u10: f(Variable::WindU),
            v10: f(Variable::WindV),
        }
    }

    /// Like [`SurfaceFields::from_fn`] but short-circuits on the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Variable) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            t2m: f(Variable::Temperature)?,
            u10: f(Variable::WindU)?,
            v10: f(Variable::WindV)?,
        })
    }

    pub fn get(&self, variable: Variable) -> &T {
        match variable {
            Variable::Temperature => &self.t2m,
            Variable::WindU => &self.u10,
            Variable::WindV => &self.v10,
        }
    }

    pub fn get_mut(&mut self, variable: Variable) -> &mut T {
        match variable {
            Variable::Temperature => &mut self.t2m,
            Variable::WindU => &mut self.u10,
            Variable::WindV => &mut self.v10,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Variable, T) -> U) -> SurfaceFields<U> {
        SurfaceFields {
            t2m: f(Variable::Temperature, self.t2m),
            u10: f(Variable::WindU, self.u10),
            v10: f(Variable::WindV, self.v10),
        }
    }

    /// Iterate as (variable, value) pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Variable, &T)> {
        [
            (Variable::Temperature, &self.t2m),
            (Variable::WindU, &self.u10),
            (Variable::WindV, &self.v10),
        ]
        .into_iter()
    }
}
