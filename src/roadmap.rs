//! Concrete, GeoJSON-backed [`DirectedGraph`] implementation standing in for a live spatial
//! database connection: Point features become vertices, LineString features become directed
//! edges. This is the engine's full-map target-map reader; [`crate::overlay::BufferOverlay`]
//! implements the same trait over a restricted view of it.

use std::collections::HashMap;
use std::path::Path;

use geo::{
    BoundingRect, Closest, ConcaveHull, ConvexHull, Distance, Haversine, HaversineClosestPoint,
    InterpolatableLine, LineString, MultiPoint, Point, Polygon, coord,
};
use geojson::{Feature, FeatureCollection, Value};
use graph::prelude::{DirectedCsrGraph, DirectedNeighborsWithValues, GraphBuilder};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::error::RoadMapError;
use crate::{Bearing, Coordinate, DirectedGraph, Fow, Frc, Length};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u64);

/// Identifies a directed edge. The sign is the peer marker: a negative id is the reversed twin
/// of the positive edge with the same magnitude (`undirected()` strips it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub i64);

impl EdgeId {
    pub const fn is_reversed(&self) -> bool {
        self.0.is_negative()
    }

    pub const fn undirected(&self) -> Self {
        Self(self.0.abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct EdgeProperties {
    length: Length,
    frc: Frc,
    fow: Fow,
    geometry: LineString,
    vertices: [VertexId; 2],
}

#[derive(Debug)]
struct GeospatialNode {
    vertex: VertexId,
    coordinate: Coordinate,
}

impl RTreeObject for GeospatialNode {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        Point::new(self.coordinate.lon, self.coordinate.lat).envelope()
    }
}

impl PointDistance for GeospatialNode {
    fn distance_2(&self, destination: &Point) -> f64 {
        let origin = Point::new(self.coordinate.lon, self.coordinate.lat);
        Haversine.distance(origin, *destination).powf(2.0)
    }
}

#[derive(Debug)]
struct GeospatialEdge {
    edge: EdgeId,
    geometry: LineString,
}

impl RTreeObject for GeospatialEdge {
    type Envelope = AABB<Point>;
    fn envelope(&self) -> Self::Envelope {
        let bbox = self.geometry.bounding_rect().unwrap();
        AABB::from_corners(
            Point::new(bbox.min().x, bbox.min().y),
            Point::new(bbox.max().x, bbox.max().y),
        )
    }
}

impl PointDistance for GeospatialEdge {
    fn distance_2(&self, point: &Point) -> f64 {
        use Closest::*;
        match self.geometry.haversine_closest_point(point) {
            SinglePoint(p) | Intersection(p) => Haversine.distance(p, *point).powf(2.0),
            Indeterminate => f64::INFINITY,
        }
    }
}

/// Target map reader backed by a parsed GeoJSON `FeatureCollection`. Immutable once built: every
/// worker thread shares one instance behind an `Arc` (no interior mutability is needed).
pub struct RoadMap {
    network: DirectedCsrGraph<u64, (), EdgeId>,
    geospatial_nodes: RTree<GeospatialNode>,
    geospatial_edges: RTree<GeospatialEdge>,
    edge_properties: HashMap<EdgeId, EdgeProperties>,
    node_coordinates: HashMap<VertexId, Coordinate>,
}

impl RoadMap {
    /// Reads and parses a GeoJSON road-graph snapshot from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RoadMapError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&contents)
    }

    /// Parses a GeoJSON road-graph snapshot. Point features (property `id`) become vertices;
    /// LineString features (properties `id`, `length`, `frc`, `fow`, `direction`, `startId`,
    /// `endId`) become edges. `direction == 3` is one-way reversed (swap endpoints, reverse
    /// geometry); `direction == 1` is two-way (also inserts the negated peer edge); any other
    /// value is one-way forward.
    pub fn from_geojson_str(geojson: &str) -> Result<Self, RoadMapError> {
        let FeatureCollection { features, .. } =
            geojson.parse().map_err(|error: geojson::Error| RoadMapError::Parse(error.to_string()))?;

        let mut node_coordinates: HashMap<VertexId, Coordinate> = HashMap::new();
        let mut exiting_lines: HashMap<VertexId, Vec<(EdgeId, VertexId)>> = HashMap::new();
        let mut edge_properties: HashMap<EdgeId, EdgeProperties> = HashMap::new();

        for feature in &features {
            let Feature { geometry: Some(geometry), properties: Some(properties), .. } = feature else {
                continue;
            };

            if let Value::Point(point) = &geometry.value {
                let id = properties
                    .get("id")
                    .and_then(|v| v.as_i64())
                    .ok_or(RoadMapError::MissingProperty("id"))? as u64;

                node_coordinates.insert(
                    VertexId(id),
                    Coordinate {
                        lon: point[0],
                        lat: point[1],
                    },
                );
            }
        }

        for feature in &features {
            let Feature { geometry: Some(geometry), properties: Some(properties), .. } = feature else {
                continue;
            };

            let Value::LineString(coords) = &geometry.value else {
                continue;
            };

            let id = properties.get("id").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("id"))?;
            let length = properties.get("length").and_then(|v| v.as_f64()).ok_or(RoadMapError::MissingProperty("length"))?;
            let frc = properties.get("frc").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("frc"))?;
            let fow = properties.get("fow").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("fow"))?;
            let direction = properties.get("direction").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("direction"))?;
            let mut start_id = properties.get("startId").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("startId"))? as u64;
            let mut end_id = properties.get("endId").and_then(|v| v.as_i64()).ok_or(RoadMapError::MissingProperty("endId"))? as u64;

            let geometry = coords.iter().map(|c| coord! { x: c[0], y: c[1] });

            let geometry = if direction == 3 {
                std::mem::swap(&mut start_id, &mut end_id);
                LineString::from_iter(geometry.collect::<Vec<_>>().into_iter().rev())
            } else {
                LineString::from_iter(geometry)
            };

            let start = VertexId(start_id);
            let end = VertexId(end_id);
            let edge_id = EdgeId(id);

            exiting_lines.entry(start).or_default().push((edge_id, end));

            if direction == 1 && start != end {
                exiting_lines.entry(end).or_default().push((EdgeId(-id), start));
            }

            edge_properties.insert(
                edge_id,
                EdgeProperties {
                    length: Length::from_meters(length),
                    frc: Frc::from_value(frc).ok_or(RoadMapError::Parse(format!("invalid frc {frc}")))?,
                    fow: Fow::from_value(fow).ok_or(RoadMapError::Parse(format!("invalid fow {fow}")))?,
                    geometry,
                    vertices: [start, end],
                },
            );
        }

        if edge_properties.is_empty() {
            return Err(RoadMapError::Empty);
        }

        let network_edges = exiting_lines.iter().flat_map(|(&from, edges)| {
            edges.iter().map(move |&(edge_id, to)| (from.0, to.0, edge_id))
        });

        let geospatial_nodes: Vec<GeospatialNode> = node_coordinates
            .iter()
            .map(|(&vertex, &coordinate)| GeospatialNode { vertex, coordinate })
            .collect();

        let geospatial_edges: Vec<GeospatialEdge> = edge_properties
            .iter()
            .map(|(&edge, properties)| GeospatialEdge {
                edge,
                geometry: properties.geometry.clone(),
            })
            .collect();

        Ok(RoadMap {
            network: GraphBuilder::new().edges_with_values(network_edges).build(),
            geospatial_nodes: RTree::bulk_load(geospatial_nodes),
            geospatial_edges: RTree::bulk_load(geospatial_edges),
            edge_properties,
            node_coordinates,
        })
    }

    fn edge_line_string(&self, edge: EdgeId) -> LineString {
        LineString::from_iter(self.get_edge_coordinates(edge).map(|c| coord! { x: c.lon, y: c.lat }))
    }

    pub fn get_linecount(&self) -> usize {
        self.edge_properties.len()
    }

    pub fn get_nodecount(&self) -> usize {
        self.node_coordinates.len()
    }

    /// Computes the map-bounds polygon used by the analyzer's bounds check: a concave hull over
    /// every vertex coordinate when `concave_ratio` is in `[0, 1)`, falling back to the convex
    /// hull when `concave_ratio >= 1.0` or the concave hull degenerates (fewer than 3 vertices,
    /// or the resulting ring isn't a valid closed polygon).
    pub fn bounds(&self, concave_ratio: f64) -> Polygon<f64> {
        let points: MultiPoint<f64> = self
            .node_coordinates
            .values()
            .map(|c| Point::new(c.lon, c.lat))
            .collect();

        if concave_ratio >= 1.0 || points.0.len() < 3 {
            return points.convex_hull();
        }

        let hull = points.concave_hull(concave_ratio);
        if hull.exterior().0.len() < 4 {
            points.convex_hull()
        } else {
            hull
        }
    }
}

impl DirectedGraph for RoadMap {
    type EdgeId = EdgeId;
    type VertexId = VertexId;

    fn get_vertex_coordinate(&self, vertex: Self::VertexId) -> Option<Coordinate> {
        self.node_coordinates.get(&vertex).copied()
    }

    fn get_edge_start_vertex(&self, edge: Self::EdgeId) -> Option<Self::VertexId> {
        self.edge_properties.get(&edge.undirected()).map(|EdgeProperties { vertices, .. }| {
            if edge.is_reversed() { vertices[1] } else { vertices[0] }
        })
    }

    fn get_edge_end_vertex(&self, edge: Self::EdgeId) -> Option<Self::VertexId> {
        self.edge_properties.get(&edge.undirected()).map(|EdgeProperties { vertices, .. }| {
            if edge.is_reversed() { vertices[0] } else { vertices[1] }
        })
    }

    fn get_edge_length(&self, edge: Self::EdgeId) -> Option<Length> {
        self.edge_properties.get(&edge.undirected()).map(|p| p.length)
    }

    fn get_edge_frc(&self, edge: Self::EdgeId) -> Option<Frc> {
        self.edge_properties.get(&edge.undirected()).map(|p| p.frc)
    }

    fn get_edge_fow(&self, edge: Self::EdgeId) -> Option<Fow> {
        self.edge_properties.get(&edge.undirected()).map(|p| p.fow)
    }

    fn get_edge_coordinates(&self, edge: Self::EdgeId) -> impl Iterator<Item = Coordinate> {
        self.edge_properties.get(&edge.undirected()).into_iter().flat_map(move |EdgeProperties { geometry, .. }| {
            let coords = geometry.coords().map(|c| Coordinate { lon: c.x, lat: c.y });
            let coords: Box<dyn Iterator<Item = Coordinate>> = if edge.is_reversed() {
                Box::new(coords.collect::<Vec<_>>().into_iter().rev())
            } else {
                Box::new(coords)
            };
            coords
        })
    }

    fn vertex_exiting_edges(&self, vertex: Self::VertexId) -> impl Iterator<Item = (Self::EdgeId, Self::VertexId)> {
        let mut edges: Vec<_> = self
            .network
            .out_neighbors_with_values(vertex.0)
            .map(|item| (item.value, VertexId(item.target)))
            .collect();
        edges.sort();
        edges.into_iter()
    }

    fn vertex_entering_edges(&self, vertex: Self::VertexId) -> impl Iterator<Item = (Self::EdgeId, Self::VertexId)> {
        let mut edges: Vec<_> = self
            .network
            .in_neighbors_with_values(vertex.0)
            .map(|item| (item.value, VertexId(item.target)))
            .collect();
        edges.sort();
        edges.into_iter()
    }

    fn nearest_vertices_within_distance(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (Self::VertexId, Length)> {
        let max_distance_2 = max_distance.meters() * max_distance.meters();
        let point = Point::new(coordinate.lon, coordinate.lat);

        self.geospatial_nodes
            .nearest_neighbor_iter_with_distance_2(&point)
            .take_while(move |(_, distance_2)| *distance_2 <= max_distance_2)
            .map(|(node, distance_2)| (node.vertex, Length::from_meters(distance_2.sqrt())))
    }

    fn nearest_edges_within_distance(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (Self::EdgeId, Length)> {
        let max_distance_2 = max_distance.meters() * max_distance.meters();
        let point = Point::new(coordinate.lon, coordinate.lat);

        self.geospatial_edges
            .nearest_neighbor_iter_with_distance_2(&point)
            .take_while(move |(_, distance_2)| *distance_2 <= max_distance_2)
            .map(|(edge, distance_2)| (edge.edge, Length::from_meters(distance_2.sqrt())))
    }

    fn get_distance_along_edge(&self, edge: Self::EdgeId, coordinate: Coordinate) -> Option<Length> {
        let mut closest_distance = f64::INFINITY;
        let mut distance_along_edge = 0.0;
        let mut distance_acc = 0.0;

        let point = Point::new(coordinate.lon, coordinate.lat);

        for line in self.edge_line_string(edge).lines() {
            match line.haversine_closest_point(&point) {
                Closest::SinglePoint(p) | Closest::Intersection(p) => {
                    let distance_to_line = Haversine.distance(point, p);
                    if distance_to_line < closest_distance {
                        closest_distance = distance_to_line;
                        distance_along_edge = distance_acc + Haversine.distance(line.start_point(), p);
                    }
                    use geo::Length as _;
                    distance_acc += Haversine.length(&line);
                }
                Closest::Indeterminate => return None,
            }
        }

        Some(Length::from_meters(distance_along_edge).min(self.get_edge_length(edge)?))
    }

    fn get_coordinate_along_edge(&self, edge: Self::EdgeId, distance: Length) -> Option<Coordinate> {
        let ratio = distance.meters() / self.get_edge_length(edge)?.meters();
        let geometry = self.edge_line_string(edge);
        let point = geometry.point_at_ratio_from_start(&Haversine, ratio)?;
        Some(Coordinate { lon: point.x(), lat: point.y() })
    }

    fn get_edge_bearing(&self, edge: Self::EdgeId, distance_from_start: Length, segment_length: Length) -> Option<Bearing> {
        let edge_length = self.get_edge_length(edge)?;
        let distance_start = distance_from_start.clamp(Length::ZERO, edge_length);
        let distance_end = (distance_start + segment_length).clamp(Length::ZERO, edge_length);

        let c1 = self.get_coordinate_along_edge(edge, distance_start)?;
        let p1 = Point::new(c1.lon, c1.lat);
        let c2 = self.get_coordinate_along_edge(edge, distance_end)?;
        let p2 = Point::new(c2.lon, c2.lat);

        let degrees = {
            use geo::Bearing as _;
            Haversine.bearing(p1, p2).round()
        };

        Some(Bearing::from_degrees(degrees))
    }

    fn is_turn_restricted(&self, _start: Self::EdgeId, _end: Self::EdgeId) -> bool {
        false
    }
}
