//! Unit-hypercube lattices.

use anyhow::Result;

use crate::error::ModelFitError;

/// Number of lattice values per dimension for `step_size`.
pub fn steps_per_dimension(step_size: f64, include_upper_limit: bool) -> Result<usize> {
    if !(step_size > 0.0 && step_size <= 1.0) {
        return Err(ModelFitError::Search(format!(
            "grid step size must lie in (0, 1], got {step_size}"
        ))
        .into());
    }
    let steps = (1.0 / step_size + 1e-9).floor() as usize;
    Ok(if include_upper_limit { steps + 1 } else { steps })
}

/// Every lattice point with coordinates `step_size * i`, first dimension
/// varying slowest.
///
/// With `include_upper_limit` a step of 0.5 gives 0.0, 0.5 and 1.0 per
/// dimension; without it, 0.0 and 0.5. Zero dimensions give one empty point.
pub fn make_lists(
    dimensions: usize,
    step_size: f64,
    include_upper_limit: bool,
) -> Result<Vec<Vec<f64>>> {
    let steps = steps_per_dimension(step_size, include_upper_limit)?;
    let values: Vec<f64> = (0..steps).map(|i| step_size * i as f64).collect();

    let mut lists: Vec<Vec<f64>> = vec![Vec::with_capacity(dimensions)];
    for _ in 0..dimensions {
        lists = lists
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&value| {
                    let mut list = prefix.clone();
                    list.push(value);
                    list
                })
            })
            .collect();
    }
    Ok(lists)
}

/// Evaluates `fitness` at every point of the lattice (upper limit included)
/// and returns the point with the highest value.
pub fn grid<F>(mut fitness: F, dimensions: usize, step_size: f64) -> Result<Vec<f64>>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut best: Option<(Vec<f64>, f64)> = None;
    for list in make_lists(dimensions, step_size, true)? {
        let fit = fitness(&list);
        if best.as_ref().map_or(true, |(_, best_fit)| fit > *best_fit) {
            best = Some((list, fit));
        }
    }
    best.map(|(list, _)| list).ok_or_else(|| {
        ModelFitError::Search("grid produced no points".to_string()).into()
    })
}

/// `centre_0.5_sigma_0.2` style label of a lattice point, used as a search
/// name. Values are rounded to hide lattice noise.
pub fn cell_label<S: AsRef<str>>(names: &[S], values: &[f64]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}_{:?}", name.as_ref(), (value * 1e10).round() / 1e10))
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_labels_round_lattice_noise() {
        let names = ["a_x", "a_y"];
        assert_eq!(cell_label(&names, &[0.30000000000000004, 0.0]), "a_x_0.3_a_y_0.0");
    }

    #[test]
    fn upper_limit_is_optional() {
        assert_eq!(
            make_lists(1, 0.5, true).unwrap(),
            vec![vec![0.0], vec![0.5], vec![1.0]]
        );
        assert_eq!(make_lists(1, 0.5, false).unwrap(), vec![vec![0.0], vec![0.5]]);
    }

    #[test]
    fn first_dimension_varies_slowest() {
        let lists = make_lists(2, 0.5, false).unwrap();
        assert_eq!(
            lists,
            vec![
                vec![0.0, 0.0],
                vec![0.0, 0.5],
                vec![0.5, 0.0],
                vec![0.5, 0.5]
            ]
        );
    }

    #[test]
    fn tenth_steps_give_ten_cells() {
        assert_eq!(make_lists(1, 0.1, false).unwrap().len(), 10);
        assert_eq!(make_lists(3, 0.1, false).unwrap().len(), 1000);
        assert_eq!(make_lists(1, 0.1, true).unwrap().len(), 11);
    }

    #[test]
    fn zero_dimensions_give_one_empty_list() {
        assert_eq!(make_lists(0, 0.1, true).unwrap(), vec![Vec::<f64>::new()]);
    }

    #[test]
    fn invalid_step_sizes_are_rejected() {
        assert!(make_lists(1, 0.0, true).is_err());
        assert!(make_lists(1, 1.5, true).is_err());
        assert!(make_lists(1, f64::NAN, true).is_err());
    }

    #[test]
    fn grid_returns_best_point() {
        let best = grid(|x| -((x[0] - 0.5).powi(2) + (x[1] - 1.0).powi(2)), 2, 0.25).unwrap();
        assert_eq!(best, vec![0.5, 1.0]);
    }
}
