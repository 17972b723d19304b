//! Run options
//!
//! Controllers and sweepers read a small set of named options once, during
//! their `set_options()` call, and only override their compiled-in defaults
//! when an option is present:
//!
//! | Key           | Type    | Read by     |
//! |---------------|---------|-------------|
//! | `max_iters`   | `usize` | controller  |
//! | `t_end`       | `f64`   | controller  |
//! | `dt`          | `f64`   | controller  |
//! | `num_steps`   | `usize` | controller  |
//! | `abs_res_tol` | `f64`   | sweeper     |
//! | `rel_res_tol` | `f64`   | sweeper     |
//!
//! Options are stored as strings and parsed on lookup, so any
//! `FromStr` type can be requested. On the command line the same keys are
//! read by [`RunArgs`], which programs flatten into their own clap parser.
//!
//! # Example
//!
//! ```rust
//! use clap::Parser;
//! use pfasst_rs::config::{Options, RunArgs};
//!
//! let args = RunArgs::try_parse_from(["demo", "--t_end=0.5", "--max_iters", "4"]).unwrap();
//! let options = Options::from(&args);
//! assert_eq!(options.get::<usize>("max_iters").unwrap(), Some(4));
//! assert_eq!(options.get_or("dt", 0.01).unwrap(), 0.01);
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use clap::Parser;

use crate::error::{PfasstError, Result};

/// Key-value option store
#[derive(Clone, Debug, Default)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    /// Empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Builder variant of [`Options::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Whether `key` was given
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Parse the value of `key`, `Ok(None)` when absent
    pub fn get<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| PfasstError::InvalidOption {
                    key: key.to_string(),
                    value: raw.clone(),
                }),
        }
    }

    /// Parse the value of `key`, falling back to `default` when absent
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Number of stored options
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no option is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Command-line arguments for the keys read by `set_options()`
///
/// Only arguments that were given end up in the [`Options`].
#[derive(Clone, Debug, Default, Parser)]
pub struct RunArgs {
    /// Time step width
    #[arg(long)]
    pub dt: Option<f64>,

    /// End of the time domain
    #[arg(long = "t_end")]
    pub t_end: Option<f64>,

    /// Number of time steps, sets `t_end = num_steps * dt` when `t_end` is absent
    #[arg(long = "num_steps")]
    pub num_steps: Option<usize>,

    /// Maximum number of iterations per step
    #[arg(long = "max_iters")]
    pub max_iters: Option<usize>,

    /// Absolute residual tolerance on every level
    #[arg(long = "abs_res_tol")]
    pub abs_res_tol: Option<f64>,

    /// Relative residual tolerance on every level
    #[arg(long = "rel_res_tol")]
    pub rel_res_tol: Option<f64>,
}

impl From<&RunArgs> for Options {
    fn from(args: &RunArgs) -> Self {
        let mut options = Options::new();
        let given = [
            ("dt", args.dt.map(|v| v.to_string())),
            ("t_end", args.t_end.map(|v| v.to_string())),
            ("num_steps", args.num_steps.map(|v| v.to_string())),
            ("max_iters", args.max_iters.map(|v| v.to_string())),
            ("abs_res_tol", args.abs_res_tol.map(|v| v.to_string())),
            ("rel_res_tol", args.rel_res_tol.map(|v| v.to_string())),
        ];
        for (key, value) in given {
            if let Some(value) = value {
                options.set(key, value);
            }
        }
        options
    }
}
