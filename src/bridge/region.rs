//! Location to region mapping.

use crate::model::{Location, NamedRegion, RegionLabel};

/// Country code used for grid cells outside every configured region.
pub const GRID_COUNTRY: &str = "GRID";

pub trait RegionResolver: Send + Sync {
    fn resolve(&self, location: &Location) -> RegionLabel;
}

/// Named regions first, in configuration order, then a lat/lon grid.
#[derive(Debug, Clone)]
pub struct ConfiguredRegionResolver {
    named: Vec<NamedRegion>,
    grid_degrees: f64,
}

impl ConfiguredRegionResolver {
    pub fn new(named: Vec<NamedRegion>, grid_degrees: f64) -> Self {
        Self {
            named,
            grid_degrees,
        }
    }

    fn grid_cell(&self, location: &Location) -> RegionLabel {
        let row = (location.latitude / self.grid_degrees).floor() as i64;
        let col = (location.longitude / self.grid_degrees).floor() as i64;
        RegionLabel::new(GRID_COUNTRY, &format!("{}:{}", row, col))
    }
}

impl RegionResolver for ConfiguredRegionResolver {
    fn resolve(&self, location: &Location) -> RegionLabel {
        self.named
            .iter()
            .find(|region| region.contains(location))
            .map(NamedRegion::label)
            .unwrap_or_else(|| self.grid_cell(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ConfiguredRegionResolver {
        ConfiguredRegionResolver::new(
            vec![NamedRegion {
                country: "DE".to_string(),
                city: "Berlin".to_string(),
                latitude: 52.52,
                longitude: 13.405,
                radius_m: 20_000.0,
            }],
            0.1,
        )
    }

    #[test]
    fn test_named_region_wins() {
        let label = resolver().resolve(&Location::new(52.50, 13.42, 5.0));
        assert_eq!(label, RegionLabel::new("DE", "Berlin"));
    }

    #[test]
    fn test_grid_fallback() {
        let r = resolver();
        let a = r.resolve(&Location::new(48.851, 2.351, 5.0));
        let b = r.resolve(&Location::new(48.859, 2.359, 5.0));
        let c = r.resolve(&Location::new(-33.86, 151.21, 5.0));
        assert_eq!(a, b);
        assert_eq!(a, RegionLabel::new("GRID", "488:23"));
        assert_eq!(c.country, GRID_COUNTRY);
        assert_ne!(a, c);
    }
}
