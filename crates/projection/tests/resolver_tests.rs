//! Integration tests for coordinate axes of projected grids.

use grid_common::{EpsgCode, SpatialGrid};
use projection::{CoordinateAxes, CoordinateResolver, Ellipsoid, TransverseMercator};
use test_utils::{assert_approx_eq, assert_coords_approx_eq};

fn utm_grid() -> SpatialGrid {
    // 3 x 4 grid of 1 km cells just north of Amsterdam in UTM 31N
    SpatialGrid::new(3, 4, 1000.0, 626_000.0, 5_806_000.0, EpsgCode::new(32631)).unwrap()
}

#[test]
fn test_projected_axes_shape() {
    let grid = utm_grid();
    let axes = CoordinateResolver::default()
        .resolve(&grid.crs.to_string(), &grid.x_coords(), &grid.y_coords())
        .unwrap();

    assert!(axes.is_projected());
    assert_eq!(axes.shape(), (3, 4));
    assert_eq!(axes.dimension_names(), ["y", "x"]);

    match axes {
        CoordinateAxes::Projected { y, x, lat, lon } => {
            assert_eq!(x, grid.x_coords());
            assert_eq!(y, grid.y_coords());
            assert_eq!(lat.len(), 12);
            assert_eq!(lon.len(), 12);
            // Around 52.4N 4.8E
            assert_approx_eq!(lat[0], 52.39, 0.1);
            assert_approx_eq!(lon[0], 4.86, 0.1);
        }
        other => panic!("expected projected axes, got {:?}", other),
    }
}

#[test]
fn test_lat_lon_fields_roundtrip_through_inverse_projection() {
    let grid = utm_grid();
    let axes = CoordinateResolver::default()
        .resolve("EPSG:32631", &grid.x_coords(), &grid.y_coords())
        .unwrap();
    let CoordinateAxes::Projected { lat, lon, .. } = axes else {
        panic!("expected projected axes");
    };

    let utm = TransverseMercator::utm(31, true, Ellipsoid::WGS84);
    let xs = grid.x_coords();
    let ys = grid.y_coords();
    for (r, &y) in ys.iter().enumerate() {
        for (c, &x) in xs.iter().enumerate() {
            let (lon_expected, lat_expected) = utm.to_geographic(x, y);
            let i = r * xs.len() + c;
            assert_coords_approx_eq!((lon[i], lat[i]), (lon_expected, lat_expected), 1e-6);

            let (x_back, y_back) = utm.from_geographic(lon[i], lat[i]);
            assert_approx_eq!(x_back, x, 1e-3);
            assert_approx_eq!(y_back, y, 1e-3);
        }
    }
}

#[test]
fn test_latitude_decreases_down_the_rows() {
    let grid = utm_grid();
    let axes = CoordinateResolver::default()
        .resolve("EPSG:32631", &grid.x_coords(), &grid.y_coords())
        .unwrap();
    let CoordinateAxes::Projected { lat, .. } = axes else {
        panic!("expected projected axes");
    };
    assert!(lat[0] > lat[4]);
    assert!(lat[4] > lat[8]);
}
