//! Python bindings for the nlo optimizer.
//!
//! This crate exposes the optimizer handle to Python via PyO3. Callables
//! cross the boundary as plain Python functions with an optional user-data
//! object; points and gradients are marshaled as lists, with gradient and
//! result lists read back element by element after each invocation.
//!
//! Exceptions raised by a Python callable during `optimize` are contained:
//! the evaluation reports a neutral value and the solve runs on until a
//! stopping criterion fires. Setters return the status integer as data;
//! only `create` raises (`ValueError` for bad arguments, `MemoryError` for
//! allocation failure).

use pyo3::exceptions::{PyMemoryError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyList;

use nlo_core::{Algorithm, EvalError, ScalarEval, Status, VectorEval};

fn to_py_err(err: nlo_core::Error) -> PyErr {
    match &err {
        nlo_core::Error::InvalidArgument(_) => PyValueError::new_err(err.to_string()),
        nlo_core::Error::OutOfMemory(_) => PyMemoryError::new_err(err.to_string()),
    }
}

/// Copy a mutated Python list back into an engine buffer.
fn read_back(list: &Bound<'_, PyList>, out: &mut [f64]) -> Result<(), EvalError> {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = list
            .get_item(i)
            .and_then(|v| v.extract::<f64>())
            .map_err(|e| EvalError::new(e.to_string()))?;
    }
    Ok(())
}

/// A Python scalar callable plus its user-data object.
///
/// Called as `f(n, x, grad, user_data)` where `x` is a list of length `n`
/// and `grad` is a pre-populated list of length `n`, or `None` when the
/// active algorithm needs no gradient. The callable mutates `grad` in place
/// and returns the objective value.
struct PyScalarFn {
    func: Py<PyAny>,
    data: Option<Py<PyAny>>,
}

impl PyScalarFn {
    fn data_arg(&self, py: Python<'_>) -> PyObject {
        match &self.data {
            Some(d) => d.clone_ref(py),
            None => py.None(),
        }
    }
}

impl ScalarEval for PyScalarFn {
    fn eval(&self, x: &[f64], grad: Option<&mut [f64]>) -> Result<f64, EvalError> {
        Python::with_gil(|py| {
            let x_list = PyList::new_bound(py, x);
            let grad_list = grad
                .as_ref()
                .map(|g| PyList::new_bound(py, g.iter().copied()));
            let grad_arg = match &grad_list {
                Some(l) => l.to_object(py),
                None => py.None(),
            };
            let value = self
                .func
                .bind(py)
                .call1((x.len(), x_list, grad_arg, self.data_arg(py)))
                .and_then(|v| v.extract::<f64>())
                .map_err(|e| EvalError::new(e.to_string()))?;
            if let (Some(g), Some(list)) = (grad, &grad_list) {
                read_back(list, g)?;
            }
            Ok(value)
        })
    }
}

/// A Python vector callable plus its user-data object.
///
/// Called as `f(m, result, n, x, grad, user_data)`; the callable writes its
/// `m` outputs into `result` and, when `grad` is a list (length `m * n`,
/// row-major, output index major), the full gradient into it.
struct PyVectorFn {
    func: Py<PyAny>,
    data: Option<Py<PyAny>>,
}

impl VectorEval for PyVectorFn {
    fn eval(
        &self,
        result: &mut [f64],
        x: &[f64],
        grad: Option<&mut [f64]>,
    ) -> Result<(), EvalError> {
        Python::with_gil(|py| {
            let result_list = PyList::new_bound(py, result.iter().copied());
            let x_list = PyList::new_bound(py, x);
            let grad_list = grad
                .as_ref()
                .map(|g| PyList::new_bound(py, g.iter().copied()));
            let grad_arg = match &grad_list {
                Some(l) => l.to_object(py),
                None => py.None(),
            };
            let data = match &self.data {
                Some(d) => d.clone_ref(py),
                None => py.None(),
            };
            self.func
                .bind(py)
                .call1((
                    result.len(),
                    result_list.clone(),
                    x.len(),
                    x_list,
                    grad_arg,
                    data,
                ))
                .map_err(|e| EvalError::new(e.to_string()))?;
            read_back(&result_list, result)?;
            if let (Some(g), Some(list)) = (grad, &grad_list) {
                read_back(list, g)?;
            }
            Ok(())
        })
    }
}

/// An optimizer handle.
#[pyclass]
struct Opt {
    inner: nlo_core::Opt,
}

#[pymethods]
impl Opt {
    fn get_algorithm(&self) -> i64 {
        self.inner.get_algorithm().index() as i64
    }

    fn get_algorithm_name(&self) -> &'static str {
        self.inner.get_algorithm().name()
    }

    fn get_dimension(&self) -> usize {
        self.inner.get_dimension()
    }

    /// Duplicate this handle: independent copy with its own registrations
    /// of the same callables.
    fn copy(&self) -> Opt {
        Opt {
            inner: self.inner.clone(),
        }
    }

    #[pyo3(signature = (func, data=None))]
    fn set_min_objective(&mut self, func: Py<PyAny>, data: Option<Py<PyAny>>) -> i32 {
        self.inner.set_min_objective(PyScalarFn { func, data }).into()
    }

    #[pyo3(signature = (func, data=None))]
    fn set_max_objective(&mut self, func: Py<PyAny>, data: Option<Py<PyAny>>) -> i32 {
        self.inner.set_max_objective(PyScalarFn { func, data }).into()
    }

    #[pyo3(signature = (func, tolerance=0.0, data=None))]
    fn add_inequality_constraint(
        &mut self,
        func: Py<PyAny>,
        tolerance: f64,
        data: Option<Py<PyAny>>,
    ) -> i32 {
        self.inner
            .add_inequality_constraint(PyScalarFn { func, data }, tolerance)
            .into()
    }

    #[pyo3(signature = (func, tolerance=0.0, data=None))]
    fn add_equality_constraint(
        &mut self,
        func: Py<PyAny>,
        tolerance: f64,
        data: Option<Py<PyAny>>,
    ) -> i32 {
        self.inner
            .add_equality_constraint(PyScalarFn { func, data }, tolerance)
            .into()
    }

    #[pyo3(signature = (func, m, tolerances=None, data=None))]
    fn add_inequality_mconstraint(
        &mut self,
        func: Py<PyAny>,
        m: usize,
        tolerances: Option<Vec<f64>>,
        data: Option<Py<PyAny>>,
    ) -> i32 {
        self.inner
            .add_inequality_mconstraint(PyVectorFn { func, data }, m, tolerances.as_deref())
            .into()
    }

    #[pyo3(signature = (func, m, tolerances=None, data=None))]
    fn add_equality_mconstraint(
        &mut self,
        func: Py<PyAny>,
        m: usize,
        tolerances: Option<Vec<f64>>,
        data: Option<Py<PyAny>>,
    ) -> i32 {
        self.inner
            .add_equality_mconstraint(PyVectorFn { func, data }, m, tolerances.as_deref())
            .into()
    }

    fn remove_inequality_constraints(&mut self) -> i32 {
        self.inner.remove_inequality_constraints().into()
    }

    fn remove_equality_constraints(&mut self) -> i32 {
        self.inner.remove_equality_constraints().into()
    }

    fn set_lower_bounds(&mut self, bounds: Vec<f64>) -> i32 {
        self.inner.set_lower_bounds(&bounds).into()
    }

    fn set_upper_bounds(&mut self, bounds: Vec<f64>) -> i32 {
        self.inner.set_upper_bounds(&bounds).into()
    }

    fn set_lower_bounds1(&mut self, bound: f64) -> i32 {
        self.inner.set_lower_bounds1(bound).into()
    }

    fn set_upper_bounds1(&mut self, bound: f64) -> i32 {
        self.inner.set_upper_bounds1(bound).into()
    }

    fn get_lower_bounds(&self) -> Vec<f64> {
        self.inner.get_lower_bounds().to_vec()
    }

    fn get_upper_bounds(&self) -> Vec<f64> {
        self.inner.get_upper_bounds().to_vec()
    }

    fn set_stopval(&mut self, stopval: f64) -> i32 {
        self.inner.set_stopval(stopval).into()
    }

    fn get_stopval(&self) -> f64 {
        self.inner.get_stopval()
    }

    fn set_ftol_rel(&mut self, tol: f64) -> i32 {
        self.inner.set_ftol_rel(tol).into()
    }

    fn get_ftol_rel(&self) -> f64 {
        self.inner.get_ftol_rel()
    }

    fn set_ftol_abs(&mut self, tol: f64) -> i32 {
        self.inner.set_ftol_abs(tol).into()
    }

    fn get_ftol_abs(&self) -> f64 {
        self.inner.get_ftol_abs()
    }

    fn set_xtol_rel(&mut self, tol: f64) -> i32 {
        self.inner.set_xtol_rel(tol).into()
    }

    fn get_xtol_rel(&self) -> f64 {
        self.inner.get_xtol_rel()
    }

    fn set_xtol_abs(&mut self, tols: Vec<f64>) -> i32 {
        self.inner.set_xtol_abs(&tols).into()
    }

    fn set_xtol_abs1(&mut self, tol: f64) -> i32 {
        self.inner.set_xtol_abs1(tol).into()
    }

    fn get_xtol_abs(&self) -> Vec<f64> {
        self.inner.get_xtol_abs().to_vec()
    }

    fn set_maxeval(&mut self, maxeval: i64) -> i32 {
        self.inner.set_maxeval(maxeval).into()
    }

    fn get_maxeval(&self) -> i64 {
        self.inner.get_maxeval()
    }

    fn set_maxtime(&mut self, seconds: f64) -> i32 {
        self.inner.set_maxtime(seconds).into()
    }

    fn get_maxtime(&self) -> f64 {
        self.inner.get_maxtime()
    }

    fn force_stop(&self) -> i32 {
        self.inner.force_stop().into()
    }

    fn set_force_stop(&self, value: i32) -> i32 {
        self.inner.set_force_stop(value).into()
    }

    fn get_force_stop(&self) -> i32 {
        self.inner.get_force_stop()
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.inner.set_verbose(verbose);
    }

    /// Run the solve from the point in `x`, a list of length `dimension`.
    /// The best point found is written back into `x` in place. Returns
    /// `(status, value)`.
    fn optimize(&mut self, x: Bound<'_, PyList>) -> PyResult<(i32, f64)> {
        let mut point: Vec<f64> = x.extract()?;
        let (status, value) = self.inner.optimize(&mut point);
        for (i, &xi) in point.iter().enumerate() {
            x.set_item(i, xi)?;
        }
        Ok((status.into(), value))
    }

    fn __repr__(&self) -> String {
        format!(
            "Opt(algorithm={}, n={})",
            self.inner.get_algorithm().ident(),
            self.inner.get_dimension()
        )
    }
}

/// Create an optimizer handle for an algorithm index and dimension.
#[pyfunction]
fn create(algorithm: i64, n: i64) -> PyResult<Opt> {
    let inner = nlo_core::Opt::with_index(algorithm, n).map_err(to_py_err)?;
    Ok(Opt { inner })
}

/// Library version as a `(major, minor, patch)` tuple.
#[pyfunction]
fn version() -> (u32, u32, u32) {
    nlo_core::version()
}

/// Human-readable name for an algorithm index, or `None` if out of range.
#[pyfunction]
fn algorithm_name(index: i64) -> Option<&'static str> {
    nlo_core::algorithm_name(index)
}

/// Seed the process RNG used by the global algorithms.
#[pyfunction]
fn srand(seed: u64) {
    nlo_core::srand(seed);
}

/// Seed the process RNG from the wall clock.
#[pyfunction]
fn srand_time() {
    nlo_core::srand_time();
}

/// Python module definition.
#[pymodule]
fn nlo(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Opt>()?;
    m.add_function(wrap_pyfunction!(create, m)?)?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(algorithm_name, m)?)?;
    m.add_function(wrap_pyfunction!(srand, m)?)?;
    m.add_function(wrap_pyfunction!(srand_time, m)?)?;

    for alg in Algorithm::all() {
        m.add(alg.ident(), alg.index())?;
    }
    m.add("NUM_ALGORITHMS", Algorithm::COUNT)?;

    m.add("FAILURE", i32::from(Status::Failure))?;
    m.add("INVALID_ARGS", i32::from(Status::InvalidArgs))?;
    m.add("OUT_OF_MEMORY", i32::from(Status::OutOfMemory))?;
    m.add("ROUNDOFF_LIMITED", i32::from(Status::RoundoffLimited))?;
    m.add("FORCED_STOP", i32::from(Status::ForcedStop))?;
    m.add("SUCCESS", i32::from(Status::Success))?;
    m.add("STOPVAL_REACHED", i32::from(Status::StopvalReached))?;
    m.add("FTOL_REACHED", i32::from(Status::FtolReached))?;
    m.add("XTOL_REACHED", i32::from(Status::XtolReached))?;
    m.add("MAXEVAL_REACHED", i32::from(Status::MaxevalReached))?;
    m.add("MAXTIME_REACHED", i32::from(Status::MaxtimeReached))?;

    Ok(())
}
