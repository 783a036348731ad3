//! A small safe layer over the HiGHS C API, only supporting problems that
//! are assembled row by row and solved once.

use std::borrow::Borrow;
use std::convert::TryFrom;
use std::ffi::{c_void, CString};
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Bound, RangeBounds};
use std::os::raw::c_char;

use highs_sys::*;
use tracing::warn;

use crate::error::{Error, Result};

/// The kinds of results of an optimization
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsModelStatus {
    /// not initialized
    NotSet = MODEL_STATUS_NOTSET as isize,
    /// Unable to load model
    LoadError = MODEL_STATUS_LOAD_ERROR as isize,
    /// invalid model
    ModelError = MODEL_STATUS_MODEL_ERROR as isize,
    /// Unable to run the pre-solve phase
    PresolveError = MODEL_STATUS_PRESOLVE_ERROR as isize,
    /// Unable to solve
    SolveError = MODEL_STATUS_SOLVE_ERROR as isize,
    /// Unable to clean after solve
    PostsolveError = MODEL_STATUS_POSTSOLVE_ERROR as isize,
    /// No variables in the model: nothing to optimize
    ModelEmpty = MODEL_STATUS_MODEL_EMPTY as isize,
    /// There is no solution to the problem
    Infeasible = MODEL_STATUS_INFEASIBLE as isize,
    /// The problem in unbounded or infeasible
    UnboundedOrInfeasible = MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE as isize,
    /// The problem is unbounded: there is no single optimal value
    Unbounded = MODEL_STATUS_UNBOUNDED as isize,
    /// An optimal solution was found
    Optimal = MODEL_STATUS_OPTIMAL as isize,
    /// objective bound
    ObjectiveBound = MODEL_STATUS_OBJECTIVE_BOUND as isize,
    /// objective target
    ObjectiveTarget = MODEL_STATUS_OBJECTIVE_TARGET as isize,
    /// reached limit
    ReachedTimeLimit = MODEL_STATUS_REACHED_TIME_LIMIT as isize,
    /// reached limit
    ReachedIterationLimit = MODEL_STATUS_REACHED_ITERATION_LIMIT as isize,
    /// Unknown model status
    Unknown = MODEL_STATUS_UNKNOWN as isize,
}

impl TryFrom<HighsInt> for HighsModelStatus {
    type Error = Error;

    fn try_from(value: HighsInt) -> Result<Self> {
        match value {
            MODEL_STATUS_NOTSET => Ok(Self::NotSet),
            MODEL_STATUS_LOAD_ERROR => Ok(Self::LoadError),
            MODEL_STATUS_MODEL_ERROR => Ok(Self::ModelError),
            MODEL_STATUS_PRESOLVE_ERROR => Ok(Self::PresolveError),
            MODEL_STATUS_SOLVE_ERROR => Ok(Self::SolveError),
            MODEL_STATUS_POSTSOLVE_ERROR => Ok(Self::PostsolveError),
            MODEL_STATUS_MODEL_EMPTY => Ok(Self::ModelEmpty),
            MODEL_STATUS_INFEASIBLE => Ok(Self::Infeasible),
            MODEL_STATUS_UNBOUNDED => Ok(Self::Unbounded),
            MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE => {
                Ok(Self::UnboundedOrInfeasible)
            }
            MODEL_STATUS_OPTIMAL => Ok(Self::Optimal),
            MODEL_STATUS_OBJECTIVE_BOUND => Ok(Self::ObjectiveBound),
            MODEL_STATUS_OBJECTIVE_TARGET => Ok(Self::ObjectiveTarget),
            MODEL_STATUS_REACHED_TIME_LIMIT => Ok(Self::ReachedTimeLimit),
            MODEL_STATUS_REACHED_ITERATION_LIMIT => {
                Ok(Self::ReachedIterationLimit)
            }
            MODEL_STATUS_UNKNOWN => Ok(Self::Unknown),
            n => Err(Error::Solver(format!(
                "{} is not a valid HiGHS model status",
                n
            ))),
        }
    }
}

/// The status of a highs operation
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsStatus {
    /// Success
    OK = 0,
    /// Done, with warning
    Warning = 1,
    /// An error occurred
    Error = 2,
}

impl Display for HighsStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<HighsInt> for HighsStatus {
    type Error = Error;

    fn try_from(value: HighsInt) -> Result<Self> {
        match value {
            STATUS_OK => Ok(HighsStatus::OK),
            STATUS_WARNING => Ok(HighsStatus::Warning),
            STATUS_ERROR => Ok(HighsStatus::Error),
            n => Err(Error::Solver(format!(
                "{} is not a valid HiGHS status",
                n
            ))),
        }
    }
}

pub trait HighsOptionValue {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> HighsInt;
}

impl HighsOptionValue for bool {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> HighsInt {
        Highs_setBoolOptionValue(highs, option, if self { 1 } else { 0 })
    }
}

impl HighsOptionValue for i32 {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> HighsInt {
        Highs_setIntOptionValue(highs, option, self)
    }
}

impl HighsOptionValue for f64 {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> HighsInt {
        Highs_setDoubleOptionValue(highs, option, self)
    }
}

impl<'a> HighsOptionValue for &'a str {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> HighsInt {
        match CString::new(self) {
            Ok(value) => {
                Highs_setStringOptionValue(highs, option, value.as_ptr())
            }
            Err(_) => STATUS_ERROR,
        }
    }
}

fn bound_value<N: Into<f64> + Copy>(b: Bound<&N>) -> Option<f64> {
    match b {
        Bound::Included(v) | Bound::Excluded(v) => Some((*v).into()),
        Bound::Unbounded => None,
    }
}

fn c(n: usize) -> Result<HighsInt> {
    n.try_into()
        .map_err(|_| Error::Solver(format!("{} is too large for HiGHS", n)))
}

macro_rules! highs_call {
    ($function_name:ident ($($param:expr),+)) => {
        try_handle_status(
            $function_name($($param),+),
            stringify!($function_name)
        )
    }
}

fn try_handle_status(status: HighsInt, msg: &str) -> Result<HighsStatus> {
    match HighsStatus::try_from(status)? {
        status @ HighsStatus::OK => Ok(status),
        status @ HighsStatus::Warning => {
            warn!(call = msg, "HiGHS emitted a warning");
            Ok(status)
        }
        error => Err(Error::Solver(format!("{} returned {}", msg, error))),
    }
}

/// A linear problem, built column by column and then row by row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Problem {
    pub num_col: usize,
    pub num_row: usize,
    pub num_nz: usize,
    pub col_cost: Vec<f64>,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
    columns: Vec<(Vec<HighsInt>, Vec<f64>)>,
}

impl Problem {
    /// Create a new problem instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint over already existing columns and returns its
    /// index. Factors on the same column are accumulated.
    pub fn add_row<
        N: Into<f64> + Copy,
        B: RangeBounds<N>,
        ITEM: Borrow<(usize, f64)>,
        I: IntoIterator<Item = ITEM>,
    >(
        &mut self,
        bounds: B,
        row_factors: I,
    ) -> usize {
        let row = self.num_row as HighsInt;
        for r in row_factors {
            let &(col, factor) = r.borrow();
            let c = &mut self.columns[col];
            if c.0.last() == Some(&row) {
                if let Some(last) = c.1.last_mut() {
                    *last += factor;
                }
                continue;
            }
            c.0.push(row);
            c.1.push(factor);
            self.num_nz += 1;
        }
        let low =
            bound_value(bounds.start_bound()).unwrap_or(f64::NEG_INFINITY);
        let high = bound_value(bounds.end_bound()).unwrap_or(f64::INFINITY);
        self.row_lower.push(low);
        self.row_upper.push(high);
        let old_row_count = self.num_row;
        self.num_row += 1;
        old_row_count
    }

    pub fn add_column<N: Into<f64> + Copy, B: RangeBounds<N>>(
        &mut self,
        col_factor: f64,
        bounds: B,
    ) -> usize {
        self.col_cost.push(col_factor);
        let low =
            bound_value(bounds.start_bound()).unwrap_or(f64::NEG_INFINITY);
        let high = bound_value(bounds.end_bound()).unwrap_or(f64::INFINITY);
        self.col_lower.push(low);
        self.col_upper.push(high);
        self.columns.push((vec![], vec![]));
        let old_col_count = self.num_col;
        self.num_col += 1;
        old_col_count
    }

    fn to_compressed_matrix_form(
        &self,
    ) -> Result<(Vec<HighsInt>, Vec<HighsInt>, Vec<f64>)> {
        let mut astart = Vec::with_capacity(self.num_col + 1);
        astart.push(0);
        let mut aindex = Vec::with_capacity(self.num_nz);
        let mut avalue = Vec::with_capacity(self.num_nz);
        for (row_indices, factors) in self.columns.iter() {
            aindex.extend_from_slice(row_indices);
            avalue.extend_from_slice(factors);
            astart.push(c(aindex.len())?);
        }
        Ok((astart, aindex, avalue))
    }

    /// Create a minimisation model based on this problem. Don't solve it
    /// yet.
    pub fn optimise(self) -> Result<Model> {
        Model::try_new(self)
    }
}

#[derive(Debug)]
struct HighsPtr(*mut c_void);

impl Drop for HighsPtr {
    fn drop(&mut self) {
        unsafe { Highs_destroy(self.0) }
    }
}

impl Default for HighsPtr {
    fn default() -> Self {
        Self(unsafe { Highs_create() })
    }
}

impl HighsPtr {
    fn mut_ptr(&mut self) -> *mut c_void {
        self.0
    }

    // Some getters of the C API are not const-correct
    unsafe fn unsafe_mut_ptr(&self) -> *mut c_void {
        self.0
    }

    /// Prevents writing anything to the standard output when solving the model
    fn make_quiet(&mut self) -> Result<()> {
        self.set_option("output_flag", false)?;
        self.set_option("log_to_console", false)
    }

    fn set_option<V: HighsOptionValue>(
        &mut self,
        option: &str,
        value: V,
    ) -> Result<()> {
        let c_str = CString::new(option).map_err(|_| {
            Error::Solver(format!("invalid option name {}", option))
        })?;
        let status =
            unsafe { value.apply_to_highs(self.mut_ptr(), c_str.as_ptr()) };
        try_handle_status(status, option)?;
        Ok(())
    }

    fn num_cols(&self) -> usize {
        let n = unsafe { Highs_getNumCols(self.unsafe_mut_ptr()) };
        n.try_into().unwrap_or(0)
    }

    fn num_rows(&self) -> usize {
        let n = unsafe { Highs_getNumRows(self.unsafe_mut_ptr()) };
        n.try_into().unwrap_or(0)
    }
}

/// A model loaded into a HiGHS instance
#[derive(Debug)]
pub struct Model {
    highs: HighsPtr,
}

impl Model {
    /// Loads the problem into a fresh, quiet HiGHS instance
    pub fn try_new(problem: Problem) -> Result<Self> {
        let mut highs = HighsPtr::default();
        highs.make_quiet()?;
        let (astart, aindex, avalue) = problem.to_compressed_matrix_form()?;
        unsafe {
            highs_call!(Highs_passLp(
                highs.mut_ptr(),
                c(problem.num_col)?,
                c(problem.num_row)?,
                c(problem.num_nz)?,
                MATRIX_FORMAT_COLUMN_WISE,
                OBJECTIVE_SENSE_MINIMIZE,
                0.0,
                problem.col_cost.as_ptr(),
                problem.col_lower.as_ptr(),
                problem.col_upper.as_ptr(),
                problem.row_lower.as_ptr(),
                problem.row_upper.as_ptr(),
                astart.as_ptr(),
                aindex.as_ptr(),
                avalue.as_ptr()
            ))
        }?;
        Ok(Self { highs })
    }

    pub fn set_option<V: HighsOptionValue>(
        &mut self,
        option: &str,
        value: V,
    ) -> Result<()> {
        self.highs.set_option(option, value)
    }

    /// Runs the solver. An `Ok` only means HiGHS ran: check [Model::status].
    pub fn solve(&mut self) -> Result<()> {
        unsafe { highs_call!(Highs_run(self.highs.mut_ptr())) }?;
        Ok(())
    }

    /// Drops any previous solution, so the next solve starts from scratch
    pub fn clear_solver(&mut self) {
        unsafe { Highs_clearSolver(self.highs.mut_ptr()) };
    }

    /// Sets every objective coefficient to zero, turning the model into a
    /// pure feasibility problem
    pub fn clear_objective(&mut self) -> Result<()> {
        for col in 0..self.num_cols() {
            unsafe {
                highs_call!(Highs_changeColCost(
                    self.highs.mut_ptr(),
                    c(col)?,
                    0.0
                ))
            }?;
        }
        Ok(())
    }

    pub fn status(&self) -> Result<HighsModelStatus> {
        let model_status =
            unsafe { Highs_getModelStatus(self.highs.unsafe_mut_ptr()) };
        HighsModelStatus::try_from(model_status)
    }

    /// Get the primal and dual values of the solution
    pub fn get_solution(&self) -> Solution {
        let cols = self.num_cols();
        let rows = self.num_rows();
        let mut colvalue: Vec<f64> = vec![0.; cols];
        let mut coldual: Vec<f64> = vec![0.; cols];
        let mut rowvalue: Vec<f64> = vec![0.; rows];
        let mut rowdual: Vec<f64> = vec![0.; rows];

        // HiGHS fills every buffer, only primal columns and row duals are
        // kept

        unsafe {
            Highs_getSolution(
                self.highs.unsafe_mut_ptr(),
                colvalue.as_mut_ptr(),
                coldual.as_mut_ptr(),
                rowvalue.as_mut_ptr(),
                rowdual.as_mut_ptr(),
            );
        }

        Solution { colvalue, rowdual }
    }

    pub fn get_objective_value(&self) -> f64 {
        unsafe { Highs_getObjectiveValue(self.highs.unsafe_mut_ptr()) }
    }

    /// Number of variables
    pub fn num_cols(&self) -> usize {
        self.highs.num_cols()
    }

    /// Number of constraints
    pub fn num_rows(&self) -> usize {
        self.highs.num_rows()
    }
}

/// Concrete values of the solution
#[derive(Clone, Debug)]
pub struct Solution {
    pub colvalue: Vec<f64>,
    pub rowdual: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_compressed_matrix_form() {
        let mut pb = Problem::new();
        let x = pb.add_column(1.0, 0.0..);
        let y = pb.add_column(2.0, 0.0..10.0);
        pb.add_row(1.0.., &[(x, 1.0), (y, 1.0)]);
        pb.add_row(..=4.0, &[(y, 3.0)]);
        let (astart, aindex, avalue) = pb.to_compressed_matrix_form().unwrap();
        assert_eq!(astart, vec![0, 1, 3]);
        assert_eq!(aindex, vec![0, 0, 1]);
        assert_eq!(avalue, vec![1.0, 1.0, 3.0]);
        assert_eq!(pb.row_lower, vec![1.0, f64::NEG_INFINITY]);
        assert_eq!(pb.row_upper, vec![f64::INFINITY, 4.0]);
    }

    #[test]
    fn test_repeated_factors_are_accumulated() {
        let mut pb = Problem::new();
        let x = pb.add_column(1.0, 0.0..);
        pb.add_row(0.0..=0.0, &[(x, 1.0), (x, -0.5)]);
        assert_eq!(pb.num_nz, 1);
        let (_, _, avalue) = pb.to_compressed_matrix_form().unwrap();
        assert_eq!(avalue, vec![0.5]);
    }

    #[test]
    fn test_solve_small_problem() {
        // min x + 2y s.t. x + y >= 3, y >= 1
        let mut pb = Problem::new();
        let x = pb.add_column(1.0, 0.0..);
        let y = pb.add_column(2.0, 1.0..);
        pb.add_row(3.0.., &[(x, 1.0), (y, 1.0)]);
        let mut model = pb.optimise().unwrap();
        model.solve().unwrap();
        assert_eq!(model.status().unwrap(), HighsModelStatus::Optimal);
        let solution = model.get_solution();
        assert_abs_diff_eq!(solution.colvalue[x], 2.0, epsilon = 1e-7);
        assert_abs_diff_eq!(solution.colvalue[y], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(model.get_objective_value(), 4.0, epsilon = 1e-7);
        assert_abs_diff_eq!(solution.rowdual[0].abs(), 1.0, epsilon = 1e-7);
    }

    #[test]
    fn test_cleared_objective_turns_unbounded_into_feasible() {
        // min -x s.t. x >= 1
        let mut pb = Problem::new();
        let x = pb.add_column(-1.0, 0.0..);
        pb.add_row(1.0.., &[(x, 1.0)]);
        let mut model = pb.optimise().unwrap();
        model.set_option("presolve", "off").unwrap();
        model.solve().unwrap();
        assert!(matches!(
            model.status().unwrap(),
            HighsModelStatus::Unbounded
                | HighsModelStatus::UnboundedOrInfeasible
        ));

        model.clear_objective().unwrap();
        model.clear_solver();
        model.solve().unwrap();
        assert_eq!(model.status().unwrap(), HighsModelStatus::Optimal);
        assert_abs_diff_eq!(model.get_objective_value(), 0.0);
        assert!(model.get_solution().colvalue[x] >= 1.0 - 1e-7);
    }

    #[test]
    fn test_infeasible_problem_status() {
        let mut pb = Problem::new();
        let x = pb.add_column(1.0, 0.0..1.0);
        pb.add_row(2.0.., &[(x, 1.0)]);
        let mut model = pb.optimise().unwrap();
        model.set_option("presolve", "off").unwrap();
        model.solve().unwrap();
        assert_eq!(model.status().unwrap(), HighsModelStatus::Infeasible);
    }
}
