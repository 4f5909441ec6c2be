//! The concurrent worker pool: one loader thread reads the input file and feeds a bounded
//! channel, N worker threads each run the full analyzer decision tree against a shared,
//! read-only road map, and the aggregator on the main thread receives verdicts in completion
//! order, recognizes duplicate `(location reference, fraction)` pairs, and hands every result
//! to the caller as it arrives.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use geo::Polygon;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::analyzer::{AnalysisResult, AnalyzerConfig, analyze};
use crate::roadmap::{EdgeId, RoadMap};

/// One input record, read by the loader from the `"locations"` array of the input JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "locationReference")]
    pub location_reference: String,
    pub geometry: String,
    pub category: String,
    pub frc: i64,
}

/// One output record: a verdict plus the input fields it should be reported alongside.
#[derive(Debug, Clone, Serialize)]
pub struct WorkResult {
    #[serde(rename = "locationReference")]
    pub location_reference: String,
    pub category: String,
    pub frc: i64,
    pub result: AnalysisResult,
    pub fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateRef>>,
}

/// One `{lrp_index, edge_id}` pair from the final full-map decode's candidate sequence, emitted
/// only when the run is configured with `detailed`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandidateRef {
    pub lrp_index: usize,
    pub edge_id: i64,
}

/// Parameters the worker pool needs beyond the shared map and analyzer configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub num_threads: usize,
    pub detailed: bool,
}

/// Reads `input_path`, analyzes every record against `graph`/`bounds` with `num_threads`
/// worker threads, and invokes `on_result` on the main thread as each verdict is aggregated —
/// in completion order, with duplicate `(location reference, fraction)` pairs within the same
/// verdict bucket reassigned to `DUPLICATE_OPENLR_CODE` and excluded from `on_result`'s caller's
/// own aggregate statistics (the reassignment is visible to `on_result`, which still receives
/// exactly one call per loaded record).
pub fn run_workers(
    graph: Arc<RoadMap>,
    bounds: Option<Arc<Polygon<f64>>>,
    analyzer_config: AnalyzerConfig,
    pool_config: WorkerPoolConfig,
    input_path: &Path,
    mut on_result: impl FnMut(WorkResult),
) -> std::io::Result<()> {
    let num_threads = pool_config.num_threads.max(1);
    let (tx_in, rx_in) = crossbeam_channel::bounded::<Option<WorkItem>>(num_threads * 4);
    let (tx_out, rx_out) = crossbeam_channel::bounded::<Option<WorkResult>>(num_threads * 4);

    let input_path_owned = input_path.to_path_buf();
    let loader = thread::spawn(move || load_items(&input_path_owned, &tx_in, num_threads));

    let workers: Vec<_> = (0..num_threads)
        .map(|_| {
            let rx_in = rx_in.clone();
            let tx_out = tx_out.clone();
            let graph = Arc::clone(&graph);
            let bounds = bounds.clone();
            let config = analyzer_config.clone();
            thread::spawn(move || worker_loop(&rx_in, &tx_out, &graph, bounds.as_deref(), &config, pool_config.detailed))
        })
        .collect();
    drop(tx_out);
    drop(rx_in);

    let mut seen: FxHashSet<(AnalysisResult, String)> = FxHashSet::default();
    let mut sentinels = 0;

    while sentinels < num_threads {
        match rx_out.recv() {
            Ok(None) => sentinels += 1,
            Ok(Some(mut result)) => {
                let key = (result.result, result.location_reference.clone());

                if !seen.insert(key) {
                    result.result = AnalysisResult::DuplicateOpenlrCode;
                    result.candidates = None;
                }

                on_result(result);
            }
            Err(_) => break,
        }
    }

    for worker in workers {
        let _ = worker.join();
    }
    loader.join().expect("loader thread panicked")
}

fn load_items(
    input_path: &Path,
    tx_in: &crossbeam_channel::Sender<Option<WorkItem>>,
    num_threads: usize,
) -> std::io::Result<()> {
    let raw = std::fs::read_to_string(input_path)?;
    let document: serde_json::Value = serde_json::from_str(&raw)?;

    let locations = document.get("locations").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    for entry in locations {
        match serde_json::from_value::<WorkItem>(entry) {
            Ok(item) => {
                if tx_in.send(Some(item)).is_err() {
                    break;
                }
            }
            Err(error) => warn!(%error, "skipping malformed input record"),
        }
    }

    for _ in 0..num_threads {
        let _ = tx_in.send(None);
    }

    Ok(())
}

fn worker_loop(
    rx_in: &crossbeam_channel::Receiver<Option<WorkItem>>,
    tx_out: &crossbeam_channel::Sender<Option<WorkResult>>,
    graph: &RoadMap,
    bounds: Option<&Polygon<f64>>,
    config: &AnalyzerConfig,
    detailed: bool,
) {
    loop {
        match rx_in.recv() {
            Ok(Some(item)) => {
                let result = analyze_one(graph, bounds, config, &item, detailed);
                if tx_out.send(Some(result)).is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => {
                let _ = tx_out.send(None);
                break;
            }
        }
    }
}

fn analyze_one(
    graph: &RoadMap,
    bounds: Option<&Polygon<f64>>,
    config: &AnalyzerConfig,
    item: &WorkItem,
    detailed: bool,
) -> WorkResult {
    let source = match crate::wkb::parse_hex_wkb_linestring(&item.geometry) {
        Ok(source) => source,
        Err(error) => {
            warn!(%error, category = %item.category, "failed to parse source geometry");
            return WorkResult {
                location_reference: item.location_reference.clone(),
                category: item.category.clone(),
                frc: item.frc,
                result: AnalysisResult::InvalidGeometry,
                fraction: 0.0,
                candidates: None,
            };
        }
    };

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| analyze(config, graph, bounds, &item.location_reference, &source)));

    let (analysis_result, fraction) = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(category = %item.category, "analyzer panicked while processing record");
            (AnalysisResult::UnknownError, 0.0)
        }
    };

    let candidates = if detailed && analysis_result == AnalysisResult::Ok {
        detailed_candidates(graph, config, &item.location_reference)
    } else {
        None
    };

    info!(result = %analysis_result, fraction, category = %item.category, "analyzed record");

    WorkResult {
        location_reference: item.location_reference.clone(),
        category: item.category.clone(),
        frc: item.frc,
        result: analysis_result,
        fraction,
        candidates,
    }
}

/// Re-decodes `olr_hex` against the full map to recover the final candidate sequence for a
/// `detailed` run. Only called when `analyze` already reported `OK`, so this is expected to
/// succeed; any failure here is logged and simply omits the `candidates` field.
fn detailed_candidates(graph: &RoadMap, config: &AnalyzerConfig, olr_hex: &str) -> Option<Vec<CandidateRef>> {
    let bytes = crate::wkb::decode_hex(olr_hex).ok()?;
    let location_reference = crate::deserialize_binary_openlr(&bytes).ok()?;
    let crate::LocationReference::Line(line) = location_reference else {
        return None;
    };

    let (_, candidates) = crate::decode_line_with_candidates(&config.decoder_config, graph, line).ok()?;

    Some(
        candidates
            .into_iter()
            .enumerate()
            .map(|(lrp_index, candidate)| CandidateRef {
                lrp_index,
                edge_id: edge_id_value(candidate.edge),
            })
            .collect(),
    )
}

const fn edge_id_value(edge: EdgeId) -> i64 {
    edge.0
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use test_log::test;

    use super::*;

    fn write_temp_json(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_items_skips_malformed_records_and_still_emits_sentinels() {
        let file = write_temp_json(
            r#"{"locations": [
                {"locationReference": "00", "geometry": "00", "category": "a", "frc": 3},
                {"locationReference": "00"},
                {"geometry": "00", "category": "b", "frc": 5}
            ]}"#,
        );

        let (tx_in, rx_in) = crossbeam_channel::unbounded::<Option<WorkItem>>();
        load_items(file.path(), &tx_in, 2).unwrap();
        drop(tx_in);

        let received: Vec<_> = rx_in.iter().collect();
        let items: Vec<_> = received.iter().filter(|item| item.is_some()).collect();
        let sentinels = received.iter().filter(|item| item.is_none()).count();

        assert_eq!(items.len(), 1);
        assert_eq!(sentinels, 2);
    }

    const MINIMAL_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"id": 1}, "geometry": {"type": "Point", "coordinates": [13.0, 52.0]}},
            {"type": "Feature", "properties": {"id": 2}, "geometry": {"type": "Point", "coordinates": [13.001, 52.001]}},
            {"type": "Feature",
             "properties": {"id": 100, "length": 100.0, "frc": 3, "fow": 1, "direction": 1, "startId": 1, "endId": 2},
             "geometry": {"type": "LineString", "coordinates": [[13.0, 52.0], [13.001, 52.001]]}}
        ]
    }"#;

    #[test]
    fn analyze_one_reports_invalid_geometry_for_unparsable_wkb() {
        let graph = RoadMap::from_geojson_str(MINIMAL_GEOJSON).unwrap();

        let item = WorkItem {
            location_reference: "00".to_string(),
            geometry: "not-hex".to_string(),
            category: "test".to_string(),
            frc: 3,
        };

        let result = analyze_one(&graph, None, &AnalyzerConfig::default(), &item, false);

        assert_eq!(result.result, AnalysisResult::InvalidGeometry);
        assert_eq!(result.fraction, 0.0);
    }
}
