use ratatui::layout::Rect;

use crate::shared::{CANVAS_HEIGHT, CANVAS_WIDTH};

// state local to tui: where the canvas landed on screen last frame, so a
// mouse click can be mapped back into canvas coordinates
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub canvas_area: Option<Rect>, // inner area, borders excluded
}

impl TuiState {
    // terminal cell -> canvas point, y grows downward like the simulation
    pub fn to_canvas(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let area = self.canvas_area?;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return None;
        }
        let fx = (column - area.x) as f64 + 0.5;
        let fy = (row - area.y) as f64 + 0.5;
        Some((
            fx / area.width as f64 * CANVAS_WIDTH,
            fy / area.height as f64 * CANVAS_HEIGHT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_maps_into_canvas() {
        let ts = TuiState {
            canvas_area: Some(Rect::new(10, 5, 100, 34)),
        };
        let (x, y) = ts.to_canvas(60, 5).unwrap();
        assert!((x - 505.0).abs() < 1e-9);
        assert!((y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_outside_canvas_is_ignored() {
        let ts = TuiState {
            canvas_area: Some(Rect::new(10, 5, 100, 34)),
        };
        assert_eq!(ts.to_canvas(9, 10), None);
        assert_eq!(ts.to_canvas(50, 39), None);
        assert_eq!(TuiState::default().to_canvas(0, 0), None);
    }
}
