use glam::DVec2;

/// Closed boundary polygon of the play area.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapBounds {
    points: Vec<DVec2>,
}

impl MapBounds {
    pub fn new(points: impl IntoIterator<Item = DVec2>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn from_points(points: &[[f64; 2]]) -> Self {
        Self::new(points.iter().map(|p| DVec2::from_array(*p)))
    }

    pub fn rectangle(min: DVec2, max: DVec2) -> Self {
        Self::new([
            min,
            DVec2::new(min.x, max.y),
            max,
            DVec2::new(max.x, min.y),
        ])
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn to_points(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| p.to_array()).collect()
    }

    /// Even-odd test. A polygon with fewer than three points contains nothing.
    pub fn contains(&self, point: DVec2) -> bool {
        if self.points.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = self.points.len() - 1;
        for i in 0..self.points.len() {
            let (a, b) = (self.points[i], self.points[j]);
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
