use crate::mapper::{GridCell, GridSpec};
use crate::template::Template;

/// Default per-axis tolerance, in cells
pub const DEFAULT_TOLERANCE: i32 = 1;

/// True iff some template cell is within Chebyshev `tolerance` of `cell`.
///
/// Scans every cell of every path; there is no early ordering or tie-break
/// beyond "any", so the answer only depends on the inputs.
pub fn is_near_template(cell: GridCell, template: &Template, tolerance: i32) -> bool {
    template.cells().any(|t| t.chebyshev(cell) <= tolerance)
}

/// Like [`is_near_template`], but cells outside the drawing surface never match.
pub fn is_near_on_grid(cell: GridCell, template: &Template, tolerance: i32, grid: &GridSpec) -> bool {
    grid.contains(cell) && is_near_template(cell, template, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplatePath;

    fn letter_a() -> Template {
        Template {
            paths: vec![TemplatePath {
                points: vec![GridCell::new(5, 5), GridCell::new(10, 0), GridCell::new(15, 5)],
            }],
        }
    }

    #[test]
    fn test_exact_and_adjacent_cells_match() {
        let t = letter_a();
        assert!(is_near_template(GridCell::new(5, 5), &t, 1));
        assert!(is_near_template(GridCell::new(6, 6), &t, 1));
        assert!(is_near_template(GridCell::new(9, 1), &t, 1));
        assert!(is_near_template(GridCell::new(16, 4), &t, 1));
    }

    #[test]
    fn test_far_cells_do_not_match() {
        let t = letter_a();
        assert!(!is_near_template(GridCell::new(7, 5), &t, 1));
        assert!(!is_near_template(GridCell::new(20, 20), &t, 1));
    }

    #[test]
    fn test_tolerance_widens_match() {
        let t = letter_a();
        assert!(!is_near_template(GridCell::new(7, 7), &t, 1));
        assert!(is_near_template(GridCell::new(7, 7), &t, 2));
        assert!(!is_near_template(GridCell::new(6, 5), &t, 0));
        assert!(is_near_template(GridCell::new(5, 5), &t, 0));
    }

    #[test]
    fn test_repeated_queries_agree() {
        let t = letter_a();
        for x in -2..20 {
            for y in -2..8 {
                let cell = GridCell::new(x, y);
                assert_eq!(
                    is_near_template(cell, &t, DEFAULT_TOLERANCE),
                    is_near_template(cell, &t, DEFAULT_TOLERANCE)
                );
            }
        }
    }

    #[test]
    fn test_out_of_grid_cells_are_skipped() {
        let t = Template {
            paths: vec![TemplatePath {
                points: vec![GridCell::new(0, 0)],
            }],
        };
        let grid = GridSpec::default();

        assert!(is_near_template(GridCell::new(-1, 0), &t, 1));
        assert!(!is_near_on_grid(GridCell::new(-1, 0), &t, 1, &grid));
        assert!(is_near_on_grid(GridCell::new(1, 1), &t, 1, &grid));
    }
}
