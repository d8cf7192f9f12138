//! Assertion helpers shared by the test suites of the workspace.

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Asserts that every listed entry of a vector is exactly zero.
#[macro_export]
macro_rules! assert_entries_zero {
    ($v:expr, $indices:expr) => {{
        let v = &$v;
        for &idx in $indices.iter() {
            assert!(v[idx] == 0.0, "entry {} is {:e}, expected zero", idx, v[idx]);
        }
    }};
}

/// Euclidean norm of `b - a`, computed entrywise over two equally long slices.
pub fn difference_norm(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "Slices must have equal length.");
    a.iter()
        .zip(b)
        .map(|(a_i, b_i)| (b_i - a_i) * (b_i - a_i))
        .sum::<f64>()
        .sqrt()
}
