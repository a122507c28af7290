//! Graph construction run
//!
//! Locate the event table, engineer features, build every configured graph
//! type and persist the results. Only a missing table is fatal; a graph type
//! that fails is skipped and reported.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::data::{DataLoader, DatasetLocator, EventTable};
use crate::error::Result;
use crate::features::{FeatureDimensions, FeatureEngineer, FeatureSet};
use crate::graph::{
    GraphMetadata, GraphStatistics, GraphStore, HeterogeneousGraphBuilder, SimilarityGraphBuilder,
    SimilaritySource, StoredGraph,
};
use crate::utils::{Config, GraphKind};

/// What happened to one part of the run
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded,
    /// Completed using a documented fallback
    Fallback(String),
    /// Not produced; the reason is attached
    Skipped(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "ok"),
            Outcome::Fallback(reason) => write!(f, "fallback ({})", reason),
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReport {
    pub component: String,
    pub outcome: Outcome,
}

/// Summary of a construction run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub input: Option<PathBuf>,
    pub total_events: usize,
    pub feature_dimensions: FeatureDimensions,
    pub graphs: BTreeMap<String, StoredGraph>,
    pub statistics: BTreeMap<String, GraphStatistics>,
    pub components: Vec<ComponentReport>,
}

impl RunReport {
    pub fn graphs_created(&self) -> Vec<String> {
        self.graphs.keys().cloned().collect()
    }

    pub fn outcome(&self, component: &str) -> Option<&Outcome> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .map(|c| &c.outcome)
    }

    fn record(&mut self, component: &str, outcome: Outcome) {
        self.components.push(ComponentReport {
            component: component.to_string(),
            outcome,
        });
    }

    pub fn print_summary(&self) {
        println!("=== Graph Construction Summary ===");
        if let Some(input) = &self.input {
            println!("Input: {}", input.display());
        }
        println!("Events: {}", self.total_events);
        println!(
            "Feature dimension: {} (textual {}, categorical {}, numerical {})",
            self.feature_dimensions.total(),
            self.feature_dimensions.textual,
            self.feature_dimensions.categorical,
            self.feature_dimensions.numerical
        );
        for (name, stats) in &self.statistics {
            match stats {
                GraphStatistics::Similarity(s) => println!(
                    "{}: {} nodes, {} edges, density {:.4}, avg degree {:.2}",
                    name, s.nodes, s.edges, s.density, s.avg_degree
                ),
                GraphStatistics::Heterogeneous(s) => println!(
                    "{}: {} events, {} organizers, {} venues, {} event-organizer and {} event-venue edges",
                    name,
                    s.event_nodes,
                    s.organizer_nodes,
                    s.venue_nodes,
                    s.event_org_edges,
                    s.event_venue_edges
                ),
            }
        }
        for component in &self.components {
            println!("  {:<24} {}", component.component, component.outcome);
        }
    }
}

/// Orchestrates table loading, feature engineering and graph building
#[derive(Debug, Clone, Default)]
pub struct GraphConstructor {
    config: Config,
}

impl GraphConstructor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Explicit `data_dir` if configured, the search list otherwise
    pub fn locator(&self) -> DatasetLocator {
        match &self.config.data.data_dir {
            Some(dir) => DatasetLocator::explicit(dir),
            None => DatasetLocator::new(self.config.data.search_paths.clone()),
        }
    }

    /// Full run from the located CSV; fails only when no table can be read
    pub fn run(&self) -> Result<RunReport> {
        let path = self.locator().locate()?;
        info!("Loading events from {}", path.display());
        let table = DataLoader::load_events(&path)?;
        let mut report = self.construct(&table)?;
        report.input = Some(path);
        Ok(report)
    }

    /// Build, save and report every configured graph type for `table`
    pub fn construct(&self, table: &EventTable) -> Result<RunReport> {
        let features = FeatureEngineer::new(self.config.features.clone()).build(table);
        let mut report = RunReport {
            input: table.path().cloned(),
            total_events: table.len(),
            feature_dimensions: features.dimensions(),
            graphs: BTreeMap::new(),
            statistics: BTreeMap::new(),
            components: Vec::new(),
        };

        let features_outcome = if features.textual.is_dummy() {
            Outcome::Fallback("placeholder textual block".to_string())
        } else {
            Outcome::Succeeded
        };
        report.record("features", features_outcome);

        let store = GraphStore::new(&self.config.data.output_dir);
        for &kind in &self.config.graph.graph_types {
            let name = kind.name();
            let (graph, stats, outcome) = match self.build_graph(kind, table, &features) {
                Ok(built) => built,
                Err(e) => {
                    error!("Building '{}' failed: {}", name, e);
                    report.record(name, Outcome::Skipped(e.to_string()));
                    continue;
                }
            };
            if let Err(e) = store.save_graph(name, &graph) {
                error!("Saving '{}' failed: {}", name, e);
                report.record(name, Outcome::Skipped(e.to_string()));
                continue;
            }
            report.statistics.insert(name.to_string(), stats);
            report.graphs.insert(name.to_string(), graph);
            report.record(name, outcome);
        }

        let metadata = GraphMetadata {
            created_at: Utc::now(),
            total_events: report.total_events,
            graphs_created: report.graphs_created(),
            feature_dimensions: report.feature_dimensions,
            textual_block: Some(features.textual.kind.clone()),
            statistics: report.statistics.clone(),
            data_columns: table.source_columns().to_vec(),
        };
        store.save_metadata(&metadata)?;

        if report.graphs.is_empty() {
            warn!("No graphs were built");
        }
        Ok(report)
    }

    fn build_graph(
        &self,
        kind: GraphKind,
        table: &EventTable,
        features: &FeatureSet,
    ) -> Result<(StoredGraph, GraphStatistics, Outcome)> {
        match kind {
            GraphKind::EventSimilarity => {
                let built = SimilarityGraphBuilder::new(&self.config.graph, self.config.training.seed)
                    .build(table, features)?;
                let stats = GraphStatistics::Similarity(built.stats());
                let outcome = match (built.source, built.relaxed) {
                    (SimilaritySource::Synthetic, _) => {
                        Outcome::Fallback("synthetic similarity".to_string())
                    }
                    (_, true) => Outcome::Fallback(format!("relaxed threshold {}", built.threshold)),
                    _ => Outcome::Succeeded,
                };
                info!("Similarity graph has {} connected components", built.components);
                let graph = StoredGraph::Similarity {
                    graph: built.graph,
                    threshold: built.threshold,
                    source: built.source,
                };
                Ok((graph, stats, outcome))
            }
            GraphKind::Heterogeneous => {
                let built = HeterogeneousGraphBuilder::new(self.config.features.free_flag_default)
                    .build(table, features)?;
                let stats = GraphStatistics::Heterogeneous(built.stats());
                Ok((StoredGraph::Heterogeneous { graph: built }, stats, Outcome::Succeeded))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, ColumnSet, EventRecord};
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.data.data_dir = Some(dir.join("data"));
        config.data.output_dir = dir.join("graphs");
        config
    }

    fn table() -> EventTable {
        let records = vec![
            EventRecord::new(0, "Jazz night", "Live jazz in the park")
                .with_category("Music")
                .with_organizer("MKC"),
            EventRecord::new(1, "Jazz evening", "Jazz quartet live")
                .with_category("Music")
                .with_organizer("MKC"),
            EventRecord::new(2, "Film premiere", "Drama screening")
                .with_category("Film")
                .with_organizer("Cinematheque"),
        ];
        let columns = ColumnSet::empty()
            .with(Column::Title)
            .with(Column::Description)
            .with(Column::Category)
            .with(Column::Organizer);
        EventTable::new(records, columns)
    }

    #[test]
    fn test_construct_writes_graphs_and_metadata() {
        let dir = tempdir().unwrap();
        let constructor = GraphConstructor::new(config_in(dir.path()));
        let report = constructor.construct(&table()).unwrap();

        assert_eq!(report.total_events, 3);
        assert_eq!(
            report.graphs_created(),
            vec!["event_similarity".to_string(), "heterogeneous".to_string()]
        );
        assert!(dir.path().join("graphs/event_similarity_graph.json").exists());
        assert!(dir.path().join("graphs/heterogeneous_graph.json").exists());

        let metadata = GraphStore::new(dir.path().join("graphs"))
            .load_metadata()
            .unwrap();
        assert_eq!(metadata.total_events, 3);
        assert_eq!(metadata.graphs_created.len(), 2);
        assert_eq!(metadata.feature_dimensions, report.feature_dimensions);
    }

    #[test]
    fn test_run_without_input_is_fatal() {
        let dir = tempdir().unwrap();
        let constructor = GraphConstructor::new(config_in(dir.path()));
        assert!(matches!(
            constructor.run(),
            Err(crate::Error::MissingInput { .. })
        ));
    }

    #[test]
    fn test_graph_types_follow_config() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.graph.graph_types = vec![GraphKind::Heterogeneous];
        let report = GraphConstructor::new(config).construct(&table()).unwrap();
        assert_eq!(report.graphs_created(), vec!["heterogeneous".to_string()]);
        assert_eq!(report.outcome("heterogeneous"), Some(&Outcome::Succeeded));
        assert_eq!(report.outcome("event_similarity"), None);
    }
}
