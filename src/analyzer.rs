//! Orchestrates the per-input decision tree: decode an OpenLR code against a target map,
//! judge whether the result is spatially faithful to the source geometry it was encoded
//! from, and when it isn't, run a cascade of controlled re-decodings to attribute the
//! discrepancy to a specific cause.
//!
//! Grounded on the decoder's own `decode_line`/`decode_line_with_candidates` split: the
//! candidate sequence a successful decode produces is this module's only need for the
//! "confirmed candidate per LRP" observer the cascade compares against.

use geo::{LineString, Point as GeoPoint, Polygon};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, instrument, warn};

use crate::decoder::candidates::{CandidateLine, score_candidate_line};
use crate::error::GeometryError;
use crate::model::{Coordinate, Line, LineAttributes, Offsets, PathAttributes, Point};
use crate::overlay::BufferOverlay;
use crate::{
    DecoderConfig, DirectedGraph, LineLocation, LocationReference, Length, decode_line,
    decode_line_with_candidates, deserialize_binary_openlr,
};

/// The closed verdict taxonomy returned by [`analyze`]. Every input produces exactly one of
/// these; there is no other way out of the decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisResult {
    Ok,
    MissingOrMisconfiguredRoad,
    AlternateShortestPath,
    FrcMismatch,
    FowMismatch,
    BearingMismatch,
    PathLengthMismatch,
    UnsupportedLocationType,
    MultipleAttributeMismatches,
    UnknownError,
    OutsideMapBounds,
    DuplicateOpenlrCode,
    BetterGeolocationFound,
    BetterBearingFound,
    BetterFrcFound,
    BetterFowFound,
    BetterScoreFound,
    InvalidGeometry,
}

/// The validated, per-run parameters the analyzer needs, independent of I/O or concurrency
/// concerns (those live in [`crate::worker`] and the CLI).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Baseline configuration used for the initial full-map decode: `Strict` or `Relaxed`.
    pub decoder_config: DecoderConfig,
    /// Radius (meters) of the corridor built around the source geometry.
    pub buffer_radius: Length,
    /// Overrides `max_node_distance` for every decode performed against a buffer overlay,
    /// keeping the overlay's own candidate search tightly bound to the corridor regardless
    /// of how wide the baseline `decoder_config` is.
    pub lrp_radius: Length,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            decoder_config: DecoderConfig::strict(),
            buffer_radius: Length::from_meters(20.0),
            lrp_radius: Length::from_meters(20.0),
        }
    }
}

/// Decodes `olr_hex` against `graph`, compares the result to `source`, and returns a verdict
/// plus the fraction of the decoded geometry that falls within the buffer built around
/// `source`. `map_bounds`, when supplied, short-circuits inputs whose source geometry falls
/// entirely outside the map's coverage.
#[instrument(skip(config, graph, map_bounds, source), fields(olr = %olr_hex))]
pub fn analyze<G: DirectedGraph>(
    config: &AnalyzerConfig,
    graph: &G,
    map_bounds: Option<&Polygon<f64>>,
    olr_hex: &str,
    source: &LineString<f64>,
) -> (AnalysisResult, f64) {
    if let Some(bounds) = map_bounds {
        if !crate::geo::buffer_covers(bounds, source) {
            return (AnalysisResult::OutsideMapBounds, 0.0);
        }
    }

    let bytes = match crate::wkb::decode_hex(olr_hex) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "failed to hex-decode location reference");
            return (AnalysisResult::UnknownError, 0.0);
        }
    };

    let location_reference = match deserialize_binary_openlr(&bytes) {
        Ok(location_reference) => location_reference,
        Err(error) => {
            warn!(%error, "failed to parse OpenLR payload");
            return (AnalysisResult::UnknownError, 0.0);
        }
    };

    let line_ref = match location_reference {
        LocationReference::Line(line) => line,
        other => {
            debug!(location_type = ?other.location_type(), "unsupported location type");
            return (AnalysisResult::UnsupportedLocationType, 0.0);
        }
    };

    analyze_line(config, graph, &line_ref, source)
}

/// The master decision tree, starting from an already-parsed line location reference: builds
/// the source buffer, performs the full-map decode, and routes into the buffer cascade, the
/// adjuster, or the candidate comparator depending on how the decode came back.
fn analyze_line<G: DirectedGraph>(
    config: &AnalyzerConfig,
    graph: &G,
    line_ref: &Line,
    source: &LineString<f64>,
) -> (AnalysisResult, f64) {
    let buffer = match crate::geo::buffer_wgs84(source, config.buffer_radius.meters()) {
        Ok(buffer) => buffer,
        Err(error) => {
            warn!(%error, "failed to build source buffer");
            return (AnalysisResult::InvalidGeometry, 0.0);
        }
    };

    match decode_line_with_candidates(&config.decoder_config, graph, line_ref.clone()) {
        Err(error) => {
            info!(%error, "full-map decode failed; falling back to a buffer-overlay cascade");
            let overlay = build_overlay(graph, &buffer, line_ref);
            (cascade(&overlay, line_ref, config.lrp_radius), 0.0)
        }
        Ok((loc, outside_candidates)) => {
            let decoded_ls = match decoded_linestring(graph, &loc) {
                Ok(ls) => ls,
                Err(error) => {
                    warn!(%error, "failed to reconstruct decoded geometry");
                    return (AnalysisResult::InvalidGeometry, 0.0);
                }
            };

            if crate::geo::buffer_covers(&buffer, &decoded_ls) {
                return (AnalysisResult::Ok, 1.0);
            }

            let frac = crate::geo::buffer_overlap_fraction(&buffer, &decoded_ls);

            let result = if !loc.pos_offset.is_zero() || !loc.neg_offset.is_zero() {
                adjust_and_match(config, graph, &buffer, line_ref, &decoded_ls, &outside_candidates)
            } else {
                analyze_within_buffer(config, graph, &buffer, line_ref, &outside_candidates)
            };

            (result, frac)
        }
    }
}

fn build_overlay<'a, G: DirectedGraph>(graph: &'a G, buffer: &Polygon<f64>, line_ref: &Line) -> BufferOverlay<'a, G> {
    let first = line_ref.points.first().expect("a Line always has at least 2 points").coordinate;
    let last = line_ref.points.last().expect("a Line always has at least 2 points").coordinate;
    BufferOverlay::new(graph, buffer.clone(), first, last)
}

/// Overrides `max_node_distance` on `base` so every overlay-bound decode in the cascade stays
/// within the configured `lrp_radius`, independently of whichever baseline tolerance the
/// diagnostic preset otherwise carries.
fn overlay_config(base: DecoderConfig, lrp_radius: Length) -> DecoderConfig {
    DecoderConfig {
        max_node_distance: lrp_radius,
        ..base
    }
}

/// Runs overlay decodes with increasing relaxation and returns the first positive result.
/// Ordering is normative: the first config that succeeds names the fault.
fn cascade<G: DirectedGraph>(overlay: &BufferOverlay<G>, line_ref: &Line, lrp_radius: Length) -> AnalysisResult {
    let mut try_decode = |label: &str, preset: DecoderConfig| {
        let config = overlay_config(preset, lrp_radius);
        let outcome = decode_line(&config, overlay, line_ref.clone());
        if let Err(ref error) = outcome {
            debug!(cascade_step = label, %error, "cascade step failed");
        } else {
            debug!(cascade_step = label, "cascade step succeeded");
        }
        outcome.is_ok()
    };

    if !try_decode("any_path", DecoderConfig::any_path()) {
        return AnalysisResult::MissingOrMisconfiguredRoad;
    }
    if try_decode("ignore_frc", DecoderConfig::ignore_frc()) {
        return AnalysisResult::FrcMismatch;
    }
    if try_decode("ignore_fow", DecoderConfig::ignore_fow()) {
        return AnalysisResult::FowMismatch;
    }
    if try_decode("ignore_path_length", DecoderConfig::ignore_path_length()) {
        return AnalysisResult::PathLengthMismatch;
    }
    if try_decode("ignore_bearing", DecoderConfig::ignore_bearing()) {
        return AnalysisResult::BearingMismatch;
    }

    AnalysisResult::MultipleAttributeMismatches
}

fn analyze_within_buffer<G: DirectedGraph>(
    config: &AnalyzerConfig,
    graph: &G,
    buffer: &Polygon<f64>,
    line_ref: &Line,
    outside_candidates: &[CandidateLine<G::EdgeId>],
) -> AnalysisResult {
    let overlay = build_overlay(graph, buffer, line_ref);
    let strict = overlay_config(DecoderConfig::strict(), config.lrp_radius);

    match decode_line_with_candidates(&strict, &overlay, line_ref.clone()) {
        Ok((_, inside_candidates)) => {
            compare_candidates(&strict, graph, &line_ref.points, outside_candidates, &inside_candidates)
        }
        Err(error) => {
            debug!(%error, "overlay strict decode failed; running cascade");
            cascade(&overlay, line_ref, config.lrp_radius)
        }
    }
}

fn adjust_and_match<G: DirectedGraph>(
    config: &AnalyzerConfig,
    graph: &G,
    buffer: &Polygon<f64>,
    line_ref: &Line,
    decoded_ls: &LineString<f64>,
    outside_candidates: &[CandidateLine<G::EdgeId>],
) -> AnalysisResult {
    let adjusted = match adjust_locref(line_ref, decoded_ls) {
        Ok(adjusted) => adjusted,
        Err(error) => {
            warn!(%error, "location reference adjustment failed");
            return AnalysisResult::InvalidGeometry;
        }
    };

    match decode_line_with_candidates(&config.decoder_config, graph, adjusted.clone()) {
        Err(error) => {
            debug!(%error, "full-map decode of adjusted reference failed; running cascade");
            let overlay = build_overlay(graph, buffer, &adjusted);
            cascade(&overlay, &adjusted, config.lrp_radius)
        }
        Ok((loc, inside_candidates)) => match decoded_linestring(graph, &loc) {
            Ok(new_ls) if crate::geo::buffer_covers(buffer, &new_ls) => {
                compare_candidates(&config.decoder_config, graph, &adjusted.points, outside_candidates, &inside_candidates)
            }
            Ok(_) => analyze_within_buffer(config, graph, buffer, &adjusted, &inside_candidates),
            Err(error) => {
                warn!(%error, "failed to reconstruct adjusted decoded geometry");
                AnalysisResult::InvalidGeometry
            }
        },
    }
}

/// Walks a pair of equal-length, LRP-ordered candidate sequences and attributes the first
/// divergence found to a cause. Returns `ALTERNATE_SHORTEST_PATH` when every LRP is aligned.
fn compare_candidates<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    lrps: &[Point],
    outside: &[CandidateLine<G::EdgeId>],
    inside: &[CandidateLine<G::EdgeId>],
) -> AnalysisResult {
    debug_assert_eq!(outside.len(), inside.len());
    debug_assert_eq!(outside.len(), lrps.len());

    let last = outside.len().saturating_sub(1);

    for (i, (out, inn)) in outside.iter().zip(inside.iter()).enumerate() {
        if out.edge == inn.edge {
            continue;
        }

        if i == 0 {
            let trivially_adjacent = graph.get_edge_end_vertex(out.edge) == graph.get_edge_start_vertex(inn.edge);
            if trivially_adjacent {
                continue;
            }
        } else if i == last {
            let trivially_adjacent = graph.get_edge_start_vertex(out.edge) == graph.get_edge_end_vertex(inn.edge);
            if trivially_adjacent {
                continue;
            }
        }

        return diagnose_score(config, graph, lrps[i], out.edge, inn.edge);
    }

    AnalysisResult::AlternateShortestPath
}

/// Rescoes the two competing edges against `lrp` and attributes the divergence to whichever
/// axis the `inside` candidate lost on, or, if `inside` was not itself outright rejected, to
/// the axis on which `outside` scored the furthest ahead.
fn diagnose_score<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    lrp: Point,
    outside: G::EdgeId,
    inside: G::EdgeId,
) -> AnalysisResult {
    let Some(inside_score) = score_candidate_line(config, graph, lrp, inside) else {
        return AnalysisResult::BetterScoreFound;
    };

    if inside_score.frc_reject {
        return AnalysisResult::BetterFrcFound;
    }
    if inside_score.bearing_reject {
        return AnalysisResult::BetterBearingFound;
    }
    if inside_score.score_reject {
        return AnalysisResult::BetterScoreFound;
    }

    let Some(outside_score) = score_candidate_line(config, graph, lrp, outside) else {
        return AnalysisResult::BetterScoreFound;
    };

    let deltas = [
        (AnalysisResult::BetterGeolocationFound, (outside_score.geo - inside_score.geo) * config.node_factor),
        (AnalysisResult::BetterBearingFound, (outside_score.bearing - inside_score.bearing) * config.line_factor),
        (AnalysisResult::BetterFrcFound, (outside_score.frc - inside_score.frc) * config.line_factor),
        (AnalysisResult::BetterFowFound, (outside_score.fow - inside_score.fow) * config.line_factor),
    ];

    let (result, _) = deltas
        .into_iter()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .expect("deltas is non-empty");

    result
}

/// Rewrites `line_ref` into an equivalent offset-free reference whose endpoints are shifted
/// onto `decoded_ls` (the already-decoded geometry), so a subsequent re-decode is forced to
/// place its terminal LRPs on in-buffer geometry. A no-op when both offsets are zero.
fn adjust_locref(line_ref: &Line, decoded_ls: &LineString<f64>) -> Result<Line, GeometryError> {
    let has_pos_offset = line_ref.offsets.pos.range() != 0.0;
    let has_neg_offset = line_ref.offsets.neg.range() != 0.0;

    if !has_pos_offset && !has_neg_offset {
        return Ok(line_ref.clone());
    }

    let mut points = line_ref.points.clone();

    if has_pos_offset {
        let second = points[1].coordinate;
        let (prefix, _) = crate::geo::split_line_at_point(decoded_ls, to_geo_point(second))?;
        points[0] = adjusted_lrp_from_prefix(points[0], &prefix)?;
    }

    if has_neg_offset {
        let n = points.len();
        let penultimate = points[n - 2].coordinate;
        let (_, suffix) = crate::geo::split_line_at_point(decoded_ls, to_geo_point(penultimate))?;

        let suffix_length = crate::geo::line_string_length(&suffix);
        points[n - 2] = Point {
            path: points[n - 2].path.map(|path| PathAttributes {
                dnp: Length::from_meters(suffix_length),
                ..path
            }),
            ..points[n - 2]
        };
        points[n - 1] = adjusted_last_lrp_from_suffix(points[n - 1], &suffix, suffix_length)?;
    }

    Ok(Line {
        points,
        offsets: Offsets::default(),
    })
}

fn adjusted_lrp_from_prefix(lrp: Point, prefix: &LineString<f64>) -> Result<Point, GeometryError> {
    let length = crate::geo::line_string_length(prefix);
    let interpolated = crate::geo::interpolate(prefix, length.min(20.0))?;
    let start = *prefix.0.first().ok_or(GeometryError::EmptyGeometry)?;
    let new_coordinate = Coordinate { lon: start.x, lat: start.y };
    let bearing = crate::geo::bearing(new_coordinate, from_geo_point(interpolated));

    Ok(Point {
        coordinate: new_coordinate,
        line: LineAttributes { bearing, ..lrp.line },
        path: lrp.path.map(|path| PathAttributes {
            dnp: Length::from_meters(length),
            ..path
        }),
    })
}

fn adjusted_last_lrp_from_suffix(
    lrp: Point,
    suffix: &LineString<f64>,
    suffix_length: f64,
) -> Result<Point, GeometryError> {
    let reversed = LineString::from_iter(suffix.0.iter().rev().copied());
    let interpolated = crate::geo::interpolate(&reversed, suffix_length.min(20.0))?;
    let end = *suffix.0.last().ok_or(GeometryError::EmptyGeometry)?;
    let new_coordinate = Coordinate { lon: end.x, lat: end.y };
    let bearing = crate::geo::bearing(new_coordinate, from_geo_point(interpolated));

    Ok(Point {
        coordinate: new_coordinate,
        line: LineAttributes { bearing, ..lrp.line },
        path: None,
    })
}

fn to_geo_point(coordinate: Coordinate) -> GeoPoint<f64> {
    GeoPoint::new(coordinate.lon, coordinate.lat)
}

fn from_geo_point(point: GeoPoint<f64>) -> Coordinate {
    Coordinate { lon: point.x(), lat: point.y() }
}

/// Reconstructs the decoded path's geometry (joined edge coordinates, trimmed by the decoded
/// offsets) so the analyzer can compare it against the source-geometry buffer.
fn decoded_linestring<G: DirectedGraph>(
    graph: &G,
    loc: &LineLocation<G::EdgeId>,
) -> Result<LineString<f64>, GeometryError> {
    let segments: Vec<LineString<f64>> =
        loc.path.iter().map(|&edge| crate::geo::from_coordinates(graph.get_edge_coordinates(edge))).collect();
    let joined = crate::geo::join_lines(&segments)?;

    let (_, after_pos) = crate::geo::split_line(&joined, loc.pos_offset.meters())?;
    let after_pos = after_pos.unwrap_or_else(|| joined.clone());

    let remaining_length = crate::geo::line_string_length(&after_pos);
    let cut_at = (remaining_length - loc.neg_offset.meters()).max(0.0);

    let (before_neg, _) = crate::geo::split_line(&after_pos, cut_at)?;
    Ok(before_neg.unwrap_or(after_pos))
}
