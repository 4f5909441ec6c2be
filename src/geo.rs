//! Geodesic helpers built on top of the `geo` crate's Haversine-based metric space.
//!
//! Every distance/length here is in meters and every bearing in degrees, matching the
//! conventions of [`crate::model::Length`] and [`crate::model::Bearing`]; these helpers operate
//! on raw `geo` types so that the road map, buffer overlay and analyzer can share one geometry
//! vocabulary instead of each hand-rolling their own.

use geo::{
    Bearing as GeoBearing, BooleanOps, Closest, Coord, Covers, Destination, Distance, Haversine,
    HaversineClosestPoint, InterpolatableLine, InterpolatePoint, Length as GeoLength, LineString,
    MultiLineString, Point, Polygon,
};

use crate::error::GeometryError;
use crate::model::{Coordinate, Length};

fn to_point(coordinate: Coordinate) -> Point<f64> {
    Point::new(coordinate.lon, coordinate.lat)
}

/// Geodesic distance between two coordinates.
pub fn distance(a: Coordinate, b: Coordinate) -> Length {
    Length::from_meters(Haversine.distance(to_point(a), to_point(b)))
}

/// Geodesic bearing from `from` towards `to`, in degrees `[0, 360)`.
pub fn bearing(from: Coordinate, to: Coordinate) -> crate::model::Bearing {
    crate::model::Bearing::from_degrees(Haversine.bearing(to_point(from), to_point(to)))
}

/// Total geodesic length of a line string, in meters.
pub fn line_string_length(line: &LineString<f64>) -> f64 {
    Haversine.length(line)
}

/// Point at `distance_m` along `line`, measured from its start.
pub fn interpolate(line: &LineString<f64>, distance_m: f64) -> Result<Point<f64>, GeometryError> {
    if line.0.len() < 2 {
        return Err(GeometryError::EmptyGeometry);
    }

    line.point_at_distance_from_start(&Haversine, distance_m)
        .ok_or(GeometryError::OperationFailed("failed to interpolate point along line"))
}

/// Distance from `point` to the closest point on `line`, in meters.
pub fn distance_between(line: &LineString<f64>, point: Point<f64>) -> f64 {
    line.lines()
        .filter_map(|segment| match segment.haversine_closest_point(&point) {
            Closest::SinglePoint(p) | Closest::Intersection(p) => Some(Haversine.distance(p, point)),
            Closest::Indeterminate => None,
        })
        .fold(f64::INFINITY, f64::min)
}

/// Distance from the start of `line` to the point on it closest to `point`, in meters, following
/// `line`'s own coordinate order (i.e. "project `point` onto `line`").
fn distance_along_line(line: &LineString<f64>, point: Point<f64>) -> Option<f64> {
    let mut closest_distance = f64::INFINITY;
    let mut distance_along = 0.0;
    let mut accumulated = 0.0;

    for segment in line.lines() {
        match segment.haversine_closest_point(&point) {
            Closest::SinglePoint(p) | Closest::Intersection(p) => {
                let distance_to_segment = Haversine.distance(p, point);
                if distance_to_segment < closest_distance {
                    closest_distance = distance_to_segment;
                    distance_along = accumulated + Haversine.distance(segment.start.into(), p);
                }
                accumulated += Haversine.distance(segment.start.into(), segment.end.into());
            }
            Closest::Indeterminate => return None,
        }
    }

    Some(distance_along)
}

/// Splits `line` at the given distance (meters) from its start. A `None` half means the split
/// point coincides with that end of `line`.
pub fn split_line(
    line: &LineString<f64>,
    distance_m: f64,
) -> Result<(Option<LineString<f64>>, Option<LineString<f64>>), GeometryError> {
    if line.0.len() < 2 {
        return Err(GeometryError::EmptyGeometry);
    }

    let total = line_string_length(line);

    if distance_m <= 0.0 {
        return Ok((None, Some(line.clone())));
    }
    if distance_m >= total {
        return Ok((Some(line.clone()), None));
    }

    let coords: Vec<Coord<f64>> = line.0.clone();
    let mut accumulated = 0.0;

    for (i, window) in coords.windows(2).enumerate() {
        let (start, end) = (Point::from(window[0]), Point::from(window[1]));
        let segment_length = Haversine.distance(start, end);

        if accumulated + segment_length >= distance_m {
            let ratio = if segment_length > 0.0 {
                (distance_m - accumulated) / segment_length
            } else {
                0.0
            };

            let split = Haversine.point_at_ratio_between(start, end, ratio);
            let split_coord = Coord::from(split);

            let mut head = coords[..=i].to_vec();
            head.push(split_coord);

            let mut tail = vec![split_coord];
            tail.extend_from_slice(&coords[i + 1..]);

            return Ok((Some(LineString::new(head)), Some(LineString::new(tail))));
        }

        accumulated += segment_length;
    }

    // Numerically the split point lands exactly on the last vertex.
    Ok((Some(line.clone()), None))
}

/// Splits `line` into a prefix/suffix pair at the point on it closest to `point`.
pub fn split_line_at_point(
    line: &LineString<f64>,
    point: Point<f64>,
) -> Result<(LineString<f64>, LineString<f64>), GeometryError> {
    let distance_m =
        distance_along_line(line, point).ok_or(GeometryError::OperationFailed("point does not project onto line"))?;

    let (head, tail) = split_line(line, distance_m)?;

    Ok((
        head.unwrap_or_else(|| LineString::new(vec![line.0[0]])),
        tail.unwrap_or_else(|| LineString::new(vec![*line.0.last().unwrap()])),
    ))
}

/// Concatenates consecutive line strings into one, dropping the duplicated vertex shared by
/// each pair of adjoining ends.
pub fn join_lines(lines: &[LineString<f64>]) -> Result<LineString<f64>, GeometryError> {
    let mut coords: Vec<Coord<f64>> = Vec::new();

    for line in lines {
        if line.0.is_empty() {
            continue;
        }

        match coords.last() {
            Some(last) if *last == line.0[0] => coords.extend_from_slice(&line.0[1..]),
            _ => coords.extend_from_slice(&line.0),
        }
    }

    if coords.len() < 2 {
        return Err(GeometryError::EmptyGeometry);
    }

    Ok(LineString::new(coords))
}

/// Average of two bearings (degrees), taking the shorter angular path between them so that a
/// buffer corridor doesn't pinch at a bend.
fn average_bearing(a: f64, b: f64) -> f64 {
    let (ax, ay) = (a.to_radians().sin(), a.to_radians().cos());
    let (bx, by) = (b.to_radians().sin(), b.to_radians().cos());
    let (sx, sy) = (ax + bx, ay + by);

    if sx.abs() < 1e-9 && sy.abs() < 1e-9 {
        a
    } else {
        sx.atan2(sy).to_degrees()
    }
}

/// Points swept from `start_bearing` through `start_bearing + sweep_degrees`, excluding both
/// endpoints, used to round the corners of a buffer corridor's end caps.
fn arc(center: Point<f64>, start_bearing: f64, sweep_degrees: f64, radius_m: f64, steps: usize) -> Vec<Point<f64>> {
    (1..steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            Haversine.destination(center, start_bearing + sweep_degrees * t, radius_m)
        })
        .collect()
}

/// Builds a polygonal corridor of `radius_m` meters around `line`, approximated by offsetting
/// every vertex perpendicular to the local bearing and rounding the two end caps with a short
/// bearing sweep through the line's forward/backward direction.
pub fn buffer_wgs84(line: &LineString<f64>, radius_m: f64) -> Result<Polygon<f64>, GeometryError> {
    if line.0.len() < 2 {
        return Err(GeometryError::EmptyGeometry);
    }
    if radius_m <= 0.0 {
        return Err(GeometryError::OperationFailed("buffer radius must be positive"));
    }

    let points: Vec<Point<f64>> = line.0.iter().map(|&c| Point::from(c)).collect();
    let segment_bearings: Vec<f64> = points
        .windows(2)
        .map(|w| Haversine.bearing(w[0], w[1]))
        .collect();

    let vertex_bearings: Vec<f64> = (0..points.len())
        .map(|i| {
            if i == 0 {
                segment_bearings[0]
            } else if i == points.len() - 1 {
                segment_bearings[segment_bearings.len() - 1]
            } else {
                average_bearing(segment_bearings[i - 1], segment_bearings[i])
            }
        })
        .collect();

    let left: Vec<Point<f64>> = points
        .iter()
        .zip(&vertex_bearings)
        .map(|(p, b)| Haversine.destination(*p, b - 90.0, radius_m))
        .collect();
    let right: Vec<Point<f64>> = points
        .iter()
        .zip(&vertex_bearings)
        .map(|(p, b)| Haversine.destination(*p, b + 90.0, radius_m))
        .collect();

    const CAP_STEPS: usize = 6;

    let mut ring: Vec<Point<f64>> = Vec::with_capacity(left.len() + right.len() + 2 * CAP_STEPS);
    ring.extend(left.iter().copied());
    ring.extend(arc(
        *points.last().unwrap(),
        vertex_bearings[vertex_bearings.len() - 1] - 90.0,
        180.0,
        radius_m,
        CAP_STEPS,
    ));
    ring.extend(right.iter().rev().copied());
    ring.extend(arc(points[0], vertex_bearings[0] + 90.0, 180.0, radius_m, CAP_STEPS));
    ring.push(left[0]);

    let coords: Vec<Coord<f64>> = ring.into_iter().map(Coord::from).collect();
    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Whether every point of `line` lies inside or on the boundary of `polygon` (the exact
/// DE-9IM "covers" predicate, matching shapely's `Polygon.covers`).
pub fn buffer_covers(polygon: &Polygon<f64>, line: &LineString<f64>) -> bool {
    polygon.covers(line)
}

/// `intersection(polygon, line).length / line.length`: clips `line` to the portion of it that
/// falls within `polygon` and returns that portion's share of the total geodesic length.
pub fn buffer_overlap_fraction(polygon: &Polygon<f64>, line: &LineString<f64>) -> f64 {
    let total = line_string_length(line);
    if total <= 0.0 {
        return 0.0;
    }

    let multi_line = MultiLineString::new(vec![line.clone()]);
    let clipped = polygon.clip(&multi_line, false);
    let covered: f64 = clipped.0.iter().map(line_string_length).sum();

    (covered / total).clamp(0.0, 1.0)
}

pub(crate) fn from_coordinates<I: IntoIterator<Item = Coordinate>>(coordinates: I) -> LineString<f64> {
    LineString::from_iter(coordinates.into_iter().map(|c| Coord { x: c.lon, y: c.lat }))
}
