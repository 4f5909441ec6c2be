//! Restricted view of a [`DirectedGraph`] limited to the lines and nodes that fall near a
//! polygonal corridor around the source geometry of a single location under analysis.
//!
//! Grounded directly on the reference decoder's own SQLite-backed buffer reader: lines partially
//! outside the corridor are kept but flagged, and are only handed back to the decoder when the
//! query coordinate is one of the location reference's two endpoints (the entry/exit exception).
//! Everywhere else, out-of-buffer lines are invisible, forcing a re-decode to either fail or
//! route entirely within the corridor.

use std::cell::Cell;
use std::collections::HashMap;

use geo::{Contains, Intersects, LineString, Point, Polygon};

use crate::graph::DirectedGraph;
use crate::model::{Bearing, Coordinate, Fow, Frc, Length};

struct EdgeEntry {
    contained_in_buffer: bool,
    entry_or_exit: Cell<bool>,
}

/// A read-only restriction of `G` to the lines and nodes within (or bordering) `polygon`.
/// Built fresh per analyzed location and discarded once the analysis completes.
pub struct BufferOverlay<'a, G: DirectedGraph> {
    inner: &'a G,
    polygon: Polygon<f64>,
    first_point: Coordinate,
    last_point: Coordinate,
    edges: HashMap<G::EdgeId, EdgeEntry>,
    vertices: HashMap<G::VertexId, bool>,
}

impl<'a, G: DirectedGraph> BufferOverlay<'a, G> {
    /// Builds the overlay by querying `graph` for every edge within the polygon's bounding
    /// radius of its centroid, then refining that prefilter with an exact `Intersects` test.
    /// `first_point`/`last_point` are the two endpoints of the location reference under
    /// analysis; they drive the entry/exit exception in [`Self::find_lines_close_to`].
    pub fn new(graph: &'a G, polygon: Polygon<f64>, first_point: Coordinate, last_point: Coordinate) -> Self {
        let center = polygon_center(&polygon);
        let radius = polygon_radius(&polygon, center);

        let candidate_edges: Vec<_> = graph
            .nearest_edges_within_distance(center, radius)
            .map(|(edge, _)| edge)
            .collect();

        let mut edges = HashMap::new();
        let mut vertices: HashMap<G::VertexId, bool> = HashMap::new();

        for edge in candidate_edges {
            let geometry = edge_line_string(graph, edge);
            if !polygon.intersects(&geometry) {
                continue;
            }

            let contained_in_buffer = polygon.contains(&geometry);
            edges.insert(
                edge,
                EdgeEntry {
                    contained_in_buffer,
                    entry_or_exit: Cell::new(false),
                },
            );

            for vertex in [graph.get_edge_start_vertex(edge), graph.get_edge_end_vertex(edge)]
                .into_iter()
                .flatten()
            {
                let coordinate = graph.get_vertex_coordinate(vertex);
                let contained = coordinate.is_some_and(|c| polygon.contains(&Point::new(c.lon, c.lat)));
                vertices.entry(vertex).or_insert(contained);
            }
        }

        BufferOverlay {
            inner: graph,
            polygon,
            first_point,
            last_point,
            edges,
            vertices,
        }
    }

    pub fn get_linecount(&self) -> usize {
        self.edges.len()
    }

    pub fn get_nodecount(&self) -> usize {
        self.vertices.len()
    }

    fn is_entry_or_exit_coordinate(&self, coordinate: Coordinate) -> bool {
        coordinate == self.first_point || coordinate == self.last_point
    }

    /// Nodes within `max_distance` of `coordinate`, restricted to those the buffer contains.
    pub fn find_nodes_close_to(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (G::VertexId, Length)> + '_ {
        self.inner
            .nearest_vertices_within_distance(coordinate, max_distance)
            .filter(move |(vertex, _)| *self.vertices.get(vertex).unwrap_or(&false))
    }

    /// Lines within `max_distance` of `coordinate`. When `coordinate` is one of the location
    /// reference's two endpoints, every nearby line is returned regardless of containment and
    /// each out-of-buffer line returned is marked `entry_or_exit`; otherwise only lines fully
    /// contained in the buffer are returned.
    pub fn find_lines_close_to(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (G::EdgeId, Length)> + '_ {
        let allow_entry_exit = self.is_entry_or_exit_coordinate(coordinate);

        self.inner
            .nearest_edges_within_distance(coordinate, max_distance)
            .filter_map(move |(edge, distance)| {
                let entry = self.edges.get(&edge)?;

                if entry.contained_in_buffer {
                    return Some((edge, distance));
                }

                if allow_entry_exit {
                    entry.entry_or_exit.set(true);
                    return Some((edge, distance));
                }

                None
            })
    }

    pub fn is_contained_in_buffer(&self, edge: G::EdgeId) -> bool {
        self.edges.get(&edge).is_some_and(|e| e.contained_in_buffer)
    }

    pub fn is_entry_or_exit(&self, edge: G::EdgeId) -> bool {
        self.edges.get(&edge).is_some_and(|e| e.entry_or_exit.get())
    }

    fn is_visible(&self, edge: G::EdgeId) -> bool {
        self.edges
            .get(&edge)
            .is_some_and(|e| e.contained_in_buffer || e.entry_or_exit.get())
    }
}

fn edge_line_string<G: DirectedGraph>(graph: &G, edge: G::EdgeId) -> LineString<f64> {
    crate::geo::from_coordinates(graph.get_edge_coordinates(edge))
}

fn polygon_center(polygon: &Polygon<f64>) -> Coordinate {
    let coords: Vec<_> = polygon.exterior().0.iter().collect();
    let (sum_lon, sum_lat) = coords.iter().fold((0.0, 0.0), |(lon, lat), c| (lon + c.x, lat + c.y));
    let n = coords.len().max(1) as f64;
    Coordinate {
        lon: sum_lon / n,
        lat: sum_lat / n,
    }
}

fn polygon_radius(polygon: &Polygon<f64>, center: Coordinate) -> Length {
    polygon
        .exterior()
        .0
        .iter()
        .map(|c| crate::geo::distance(center, Coordinate { lon: c.x, lat: c.y }))
        .max()
        .unwrap_or(Length::ZERO)
}

impl<'a, G: DirectedGraph> DirectedGraph for BufferOverlay<'a, G> {
    type VertexId = G::VertexId;
    type EdgeId = G::EdgeId;

    fn get_vertex_coordinate(&self, vertex: Self::VertexId) -> Option<Coordinate> {
        self.inner.get_vertex_coordinate(vertex)
    }

    fn get_edge_start_vertex(&self, edge: Self::EdgeId) -> Option<Self::VertexId> {
        self.is_visible(edge).then(|| self.inner.get_edge_start_vertex(edge)).flatten()
    }

    fn get_edge_end_vertex(&self, edge: Self::EdgeId) -> Option<Self::VertexId> {
        self.is_visible(edge).then(|| self.inner.get_edge_end_vertex(edge)).flatten()
    }

    fn get_edge_length(&self, edge: Self::EdgeId) -> Option<Length> {
        self.is_visible(edge).then(|| self.inner.get_edge_length(edge)).flatten()
    }

    fn get_edge_frc(&self, edge: Self::EdgeId) -> Option<Frc> {
        self.is_visible(edge).then(|| self.inner.get_edge_frc(edge)).flatten()
    }

    fn get_edge_fow(&self, edge: Self::EdgeId) -> Option<Fow> {
        self.is_visible(edge).then(|| self.inner.get_edge_fow(edge)).flatten()
    }

    fn get_edge_coordinates(&self, edge: Self::EdgeId) -> impl Iterator<Item = Coordinate> {
        let coordinates: Vec<_> = if self.is_visible(edge) {
            self.inner.get_edge_coordinates(edge).collect()
        } else {
            Vec::new()
        };
        coordinates.into_iter()
    }

    fn vertex_exiting_edges(&self, vertex: Self::VertexId) -> impl Iterator<Item = (Self::EdgeId, Self::VertexId)> {
        let edges: Vec<_> = self
            .inner
            .vertex_exiting_edges(vertex)
            .filter(|(edge, _)| self.is_visible(*edge))
            .collect();
        edges.into_iter()
    }

    fn vertex_entering_edges(&self, vertex: Self::VertexId) -> impl Iterator<Item = (Self::EdgeId, Self::VertexId)> {
        let edges: Vec<_> = self
            .inner
            .vertex_entering_edges(vertex)
            .filter(|(edge, _)| self.is_visible(*edge))
            .collect();
        edges.into_iter()
    }

    fn nearest_vertices_within_distance(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (Self::VertexId, Length)> {
        self.find_nodes_close_to(coordinate, max_distance).collect::<Vec<_>>().into_iter()
    }

    fn nearest_edges_within_distance(
        &self,
        coordinate: Coordinate,
        max_distance: Length,
    ) -> impl Iterator<Item = (Self::EdgeId, Length)> {
        self.find_lines_close_to(coordinate, max_distance).collect::<Vec<_>>().into_iter()
    }

    fn get_distance_along_edge(&self, edge: Self::EdgeId, coordinate: Coordinate) -> Option<Length> {
        self.is_visible(edge).then(|| self.inner.get_distance_along_edge(edge, coordinate)).flatten()
    }

    fn get_coordinate_along_edge(&self, edge: Self::EdgeId, distance: Length) -> Option<Coordinate> {
        self.is_visible(edge).then(|| self.inner.get_coordinate_along_edge(edge, distance)).flatten()
    }

    fn get_edge_bearing(
        &self,
        edge: Self::EdgeId,
        distance_from_start: Length,
        segment_length: Length,
    ) -> Option<Bearing> {
        self.is_visible(edge)
            .then(|| self.inner.get_edge_bearing(edge, distance_from_start, segment_length))
            .flatten()
    }

    fn is_turn_restricted(&self, start: Self::EdgeId, end: Self::EdgeId) -> bool {
        self.inner.is_turn_restricted(start, end)
    }
}
